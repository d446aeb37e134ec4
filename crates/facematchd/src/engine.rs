use facematch_core::{
    BatchEvaluator, Catalog, CatalogMatcher, Comparator, ComparisonError, EvaluationRecord,
    ImageRef, ModelId, SearchReport, TracingObserver, VerificationResult,
};
use std::fmt::Display;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::Span;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Comparison(#[from] ComparisonError),
    #[error("comparator initialization failed: {0}")]
    Startup(String),
    #[error("spawning engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Messages sent from HTTP handlers to the engine thread.
///
/// Each carries the handler's span so engine-side events nest under the
/// request that caused them.
enum EngineRequest {
    Verify {
        query: ImageRef,
        candidate: ImageRef,
        model: ModelId,
        span: Span,
        reply: oneshot::Sender<Result<VerificationResult, ComparisonError>>,
    },
    Search {
        query: ImageRef,
        catalog: Catalog,
        model: ModelId,
        span: Span,
        reply: oneshot::Sender<SearchReport>,
    },
    Evaluate {
        test_images: Vec<ImageRef>,
        catalog_images: Vec<ImageRef>,
        models: Vec<ModelId>,
        span: Span,
        reply: oneshot::Sender<Vec<EvaluationRecord>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Compare two images; comparator failures are returned as errors.
    pub async fn verify(
        &self,
        query: ImageRef,
        candidate: ImageRef,
        model: ModelId,
    ) -> Result<VerificationResult, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Verify {
            query,
            candidate,
            model,
            span: Span::current(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| EngineError::ChannelClosed)??)
    }

    /// First-hit search of `query` over a catalog snapshot.
    pub async fn search(
        &self,
        query: ImageRef,
        catalog: Catalog,
        model: ModelId,
    ) -> Result<SearchReport, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Search {
            query,
            catalog,
            model,
            span: Span::current(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    /// Full batch evaluation. Occupies the engine until every pair is done.
    pub async fn evaluate(
        &self,
        test_images: Vec<ImageRef>,
        catalog_images: Vec<ImageRef>,
        models: Vec<ModelId>,
    ) -> Result<Vec<EvaluationRecord>, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Evaluate {
            test_images,
            catalog_images,
            models,
            span: Span::current(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    async fn send(&self, req: EngineRequest) -> Result<(), EngineError> {
        self.tx.send(req).await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The comparator is built on that thread by `make_comparator`, since
/// blocking HTTP clients must not be created inside the async runtime.
/// Fails fast if construction fails. Requests are served one at a time.
pub fn spawn_engine<C, E, F>(make_comparator: F) -> Result<EngineHandle, EngineError>
where
    C: Comparator + 'static,
    E: Display,
    F: FnOnce() -> Result<C, E> + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(16);
    let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<Result<(), String>>(1);

    std::thread::Builder::new()
        .name("facematch-engine".into())
        .spawn(move || {
            let comparator = match make_comparator() {
                Ok(c) => {
                    let _ = ready_tx.send(Ok(()));
                    c
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };

            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                handle_request(&comparator, req);
            }
            tracing::info!("engine thread exiting");
        })?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(EngineHandle { tx }),
        Ok(Err(msg)) => Err(EngineError::Startup(msg)),
        Err(_) => Err(EngineError::ChannelClosed),
    }
}

fn handle_request<C: Comparator>(comparator: &C, req: EngineRequest) {
    match req {
        EngineRequest::Verify {
            query,
            candidate,
            model,
            span,
            reply,
        } => {
            let observer = TracingObserver::new(span);
            let result =
                CatalogMatcher::new(comparator, &observer).verify(&query, &candidate, model);
            let _ = reply.send(result);
        }
        EngineRequest::Search {
            query,
            catalog,
            model,
            span,
            reply,
        } => {
            let observer = TracingObserver::new(span);
            let report = CatalogMatcher::new(comparator, &observer).search(&query, &catalog, model);
            let _ = reply.send(report);
        }
        EngineRequest::Evaluate {
            test_images,
            catalog_images,
            models,
            span,
            reply,
        } => {
            let observer = TracingObserver::new(span);
            let records = BatchEvaluator::new(comparator, &observer).evaluate(
                &test_images,
                &catalog_images,
                &models,
            );
            let _ = reply.send(records);
        }
    }
}
