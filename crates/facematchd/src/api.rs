use crate::config::Config;
use crate::engine::EngineHandle;
use crate::error::{ApiError, Result};
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use facematch_core::{discover_images, Catalog, ImageRef, ModelId, SearchOutcome};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

/// Shared state for all handlers. Read-only after startup.
pub struct AppState {
    pub engine: EngineHandle,
    pub config: Arc<Config>,
}

#[derive(Debug, Deserialize)]
pub struct MatchParams {
    pub input_url: String,
    pub check_url: String,
}

#[derive(Debug, Deserialize)]
pub struct FindParams {
    pub input: String,
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/match", get(match_handler))
        .route("/find", get(find_handler))
        .route("/images", get(images_handler))
        .route("/tests", get(tests_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn root_handler() -> Json<Value> {
    Json(json!({ "message": "Server is running..." }))
}

/// Check whether two pictures show the same person.
pub async fn match_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MatchParams>,
) -> Result<Json<Value>> {
    let model = state.config.model;
    let span = tracing::info_span!(
        "match",
        request_id = %Uuid::new_v4(),
        input_url = %params.input_url,
        check_url = %params.check_url,
        %model
    );

    async move {
        let result = state
            .engine
            .verify(params.input_url.into(), params.check_url.into(), model)
            .await?;
        tracing::info!(verified = result.verified, distance = result.distance, "match checked");
        Ok::<_, ApiError>(Json(json!({ "result": result })))
    }
    .instrument(span)
    .await
}

/// Check whether a face exists in the catalog.
pub async fn find_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<FindParams>,
) -> Result<Json<Value>> {
    let model = state.config.model;
    let span = tracing::info_span!(
        "find",
        request_id = %Uuid::new_v4(),
        input = %params.input,
        %model
    );

    async move {
        let catalog = load_catalog(state.config.catalog_path.clone()).await?;
        tracing::debug!(entries = catalog.len(), "catalog loaded");

        let report = state
            .engine
            .search(ImageRef::from(params.input), catalog, model)
            .await?;

        let message = match &report.outcome {
            SearchOutcome::Found(image) => format!("Person Found {image}"),
            SearchOutcome::NotFound => "Processed all URLs, person not found".to_string(),
        };
        tracing::info!(
            found = ?report.outcome.found(),
            attempts = report.attempts,
            skipped = report.skipped.len(),
            "search finished"
        );

        Ok::<_, ApiError>(Json(json!({
            "message": message,
            "found": report.outcome.found(),
            "attempts": report.attempts,
            "skipped": report.skipped,
        })))
    }
    .instrument(span)
    .await
}

/// List every image in the catalog.
pub async fn images_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let catalog = load_catalog(state.config.catalog_path.clone()).await?;
    Ok(Json(json!({ "images": catalog.images })))
}

/// Run the batch evaluation over every model, `testing_dir` and `faces_dir`.
pub async fn tests_handler(State(state): State<Arc<AppState>>) -> Result<Json<Value>> {
    let span = tracing::info_span!("tests", request_id = %Uuid::new_v4());

    async move {
        let testing_dir = state.config.testing_dir.clone();
        let faces_dir = state.config.faces_dir.clone();
        let (test_images, db_images) = tokio::task::spawn_blocking(move || {
            Ok::<_, facematch_core::DiscoveryError>((
                discover_images(&testing_dir)?,
                discover_images(&faces_dir)?,
            ))
        })
        .await??;

        let models = ModelId::ALL.to_vec();
        tracing::info!(
            models = models.len(),
            test_images = test_images.len(),
            db_images = db_images.len(),
            "batch evaluation started"
        );

        let test_count = test_images.len();
        let db_count = db_images.len();
        let records = state.engine.evaluate(test_images, db_images, models).await?;
        let failures = records.iter().filter(|r| r.is_failure()).count();
        tracing::info!(records = records.len(), failures, "batch evaluation finished");

        Ok::<_, ApiError>(Json(json!({
            "models": ModelId::names(),
            "test_images": test_count,
            "db_images": db_count,
            "failures": failures,
            "records": records,
        })))
    }
    .instrument(span)
    .await
}

/// Re-read the catalog for this request.
async fn load_catalog(path: PathBuf) -> Result<Catalog> {
    Ok(tokio::task::spawn_blocking(move || Catalog::load(&path)).await??)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::stub_engine;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn state_with(config: Config) -> Arc<AppState> {
        Arc::new(AppState {
            engine: stub_engine(),
            config: Arc::new(config),
        })
    }

    fn write_catalog(dir: &std::path::Path, images: &[&str]) -> PathBuf {
        let path = dir.join("files.json");
        std::fs::write(&path, json!({ "images": images }).to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_root() {
        let Json(body) = root_handler().await;
        assert_eq!(body["message"], "Server is running...");
    }

    #[tokio::test]
    async fn test_match_same_person() {
        let state = state_with(Config::default());
        let Json(body) = match_handler(
            State(state),
            Query(MatchParams {
                input_url: "https://cdn.example.com/alice-1.jpg".into(),
                check_url: "faces/alice-7.jpg".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body["result"]["verified"], true);
        assert_eq!(body["result"]["model"], "DeepID");
    }

    #[tokio::test]
    async fn test_match_failure_maps_to_422() {
        let state = state_with(Config::default());
        let err = match_handler(
            State(state),
            Query(MatchParams {
                input_url: "alice-1.jpg".into(),
                check_url: "broken.jpg".into(),
            }),
        )
        .await
        .unwrap_err();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_find_found() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = write_catalog(
            dir.path(),
            &["faces/carol-1.jpg", "faces/broken.jpg", "faces/alice-2.jpg", "faces/alice-3.jpg"],
        );
        let state = state_with(Config {
            catalog_path,
            ..Config::default()
        });

        let Json(body) = find_handler(
            State(state),
            Query(FindParams {
                input: "alice-1.jpg".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body["message"], "Person Found faces/alice-2.jpg");
        assert_eq!(body["found"], "faces/alice-2.jpg");
        assert_eq!(body["attempts"], 3);
        assert_eq!(body["skipped"][0]["candidate"], "faces/broken.jpg");
    }

    #[tokio::test]
    async fn test_find_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = write_catalog(dir.path(), &["faces/bob-1.jpg", "faces/carol-1.jpg"]);
        let state = state_with(Config {
            catalog_path,
            ..Config::default()
        });

        let Json(body) = find_handler(
            State(state),
            Query(FindParams {
                input: "alice-1.jpg".into(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(body["message"], "Processed all URLs, person not found");
        assert!(body["found"].is_null());
        assert_eq!(body["attempts"], 2);
    }

    #[tokio::test]
    async fn test_find_missing_catalog_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Config {
            catalog_path: dir.path().join("missing.json"),
            ..Config::default()
        });

        let err = find_handler(
            State(state),
            Query(FindParams {
                input: "alice-1.jpg".into(),
            }),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Catalog(_)));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_images_lists_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog_path = write_catalog(dir.path(), &["b.jpg", "a.jpg"]);
        let state = state_with(Config {
            catalog_path,
            ..Config::default()
        });

        let Json(body) = images_handler(State(state)).await.unwrap();
        assert_eq!(body["images"], json!(["b.jpg", "a.jpg"]));
    }

    #[tokio::test]
    async fn test_tests_runs_every_model() {
        let dir = tempfile::tempdir().unwrap();
        let testing_dir = dir.path().join("testing");
        let faces_dir = dir.path().join("faces");
        std::fs::create_dir_all(&testing_dir).unwrap();
        std::fs::create_dir_all(&faces_dir).unwrap();
        std::fs::write(testing_dir.join("alice-1.jpg"), b"").unwrap();
        std::fs::write(faces_dir.join("alice-2.jpg"), b"").unwrap();
        std::fs::write(faces_dir.join("broken.jpg"), b"").unwrap();

        let state = state_with(Config {
            testing_dir,
            faces_dir,
            ..Config::default()
        });

        let Json(body) = tests_handler(State(state)).await.unwrap();
        let records = body["records"].as_array().unwrap();
        assert_eq!(records.len(), ModelId::ALL.len() * 2);
        assert_eq!(body["failures"], ModelId::ALL.len());
        assert_eq!(records[0]["model_name"], "VGG-Face");
        assert_eq!(records[0]["status"], "compared");
        assert_eq!(records[0]["verified"], true);
        assert_eq!(records[1]["status"], "failed");
    }

    #[tokio::test]
    async fn test_tests_missing_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_with(Config {
            testing_dir: dir.path().join("testing"),
            faces_dir: dir.path().join("faces"),
            ..Config::default()
        });

        let err = tests_handler(State(state)).await.unwrap_err();
        assert!(matches!(err, ApiError::Discovery(_)));
    }
}
