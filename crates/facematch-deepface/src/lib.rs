//! facematch-deepface — [`Comparator`](facematch_core::Comparator) backed by
//! the DeepFace REST API.
//!
//! All detection, alignment and embedding work happens on the DeepFace
//! server; this crate only speaks its `/verify` protocol.

pub mod client;

pub use client::{DeepFaceClient, DeepFaceConfig, DeepFaceError};
