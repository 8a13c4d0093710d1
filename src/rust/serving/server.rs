use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::error::{ModelLoadError, PredictionError, ServeError};
use crate::modeling::LoadedModel;
use crate::models::{HealthStatus, ModelInfo, PredictionInput, PredictionOutput};
use crate::registry::{ModelRef, RegistryClient};
use crate::serving::executor::PredictionExecutor;
use crate::serving::metrics::{MetricsServer, ServingMetrics};
use crate::serving::slot::ModelSlot;
use crate::serving::telemetry::AuditSink;
use crate::validation::InputValidator;

/// Seconds spent handling the request, set on every response.
pub const PROCESS_TIME_HEADER: HeaderName = HeaderName::from_static("x-process-time");

pub const SERVICE_ACTOR: &str = "prediction_service";

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub metrics_port: u16,
    pub num_workers: usize,
    pub model_ref: ModelRef,
}

/// Everything a handler needs, injected at construction.
#[derive(Clone)]
pub struct AppState {
    slot: Arc<ModelSlot>,
    validator: InputValidator,
    executor: Arc<PredictionExecutor>,
    registry: RegistryClient,
    model_ref: ModelRef,
}

impl AppState {
    pub fn new(
        model: LoadedModel,
        registry: RegistryClient,
        model_ref: ModelRef,
        metrics: ServingMetrics,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            slot: Arc::new(ModelSlot::new(model)),
            validator: InputValidator::new(metrics.data_validation_errors_total.clone()),
            executor: Arc::new(PredictionExecutor::new(metrics, audit, SERVICE_ACTOR)),
            registry,
            model_ref,
        }
    }

    pub fn slot(&self) -> &ModelSlot {
        &self.slot
    }
}

pub struct ApiServer {
    pub config: ServerConfig,
    state: AppState,
    metrics: ServingMetrics,
}

impl ApiServer {
    /// Loads the configured model before anything binds. A load failure is
    /// returned to the caller and the server never starts.
    pub fn new(
        config: ServerConfig,
        registry: RegistryClient,
        metrics: ServingMetrics,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ModelLoadError> {
        let model = registry.load(&config.model_ref)?;
        info!("Model loaded successfully on startup: {}", model.version());

        let state = AppState::new(
            model,
            registry,
            config.model_ref.clone(),
            metrics.clone(),
            audit,
        );

        Ok(Self {
            config,
            state,
            metrics,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = router(self.state);

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("API server listening on {}", addr);

        let metrics_addr = format!("{}:{}", self.config.host, self.config.metrics_port);
        let metrics_server = MetricsServer::new(self.metrics, metrics_addr);

        tokio::try_join!(
            async {
                axum::serve(listener, app).await?;
                Ok::<_, anyhow::Error>(())
            },
            metrics_server.run(),
        )?;

        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/model", get(model_info))
        .route("/model/reload", post(reload_model))
        .layer(middleware::from_fn(process_time))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn process_time(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let mut response = next.run(request).await;
    let elapsed = start.elapsed().as_secs_f64();
    if let Ok(value) = HeaderValue::from_str(&elapsed.to_string()) {
        response.headers_mut().insert(PROCESS_TIME_HEADER, value);
    }
    response
}

// Handlers

async fn root() -> &'static str {
    "Health Insurance Claim Prediction API"
}

/// Liveness only: never touches the model or the registry.
async fn health() -> Json<HealthStatus> {
    Json(HealthStatus::healthy())
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictionInput>, JsonRejection>,
) -> Result<Json<PredictionOutput>, ServeError> {
    let Json(input) = payload.map_err(|rejection| {
        let reason = rejection.body_text();
        state.validator.reject_malformed(&reason);
        ServeError::MalformedRequest(reason)
    })?;

    let factors = state
        .validator
        .validate(&input)
        .map_err(ServeError::ValidationViolation)?;

    let model = state.slot.current();
    let executor = state.executor.clone();
    let task_model = model.clone();
    let prediction = tokio::task::spawn_blocking(move || executor.execute(&task_model, &factors))
        .await
        .map_err(|err| {
            error!("Prediction task failed: {}", err);
            PredictionError::Aborted(err.to_string())
        })??;

    Ok(Json(PredictionOutput::new(prediction, model.version())))
}

async fn model_info(State(state): State<AppState>) -> Json<ModelInfo> {
    Json(describe(&state.slot.current()))
}

/// Re-resolves the configured reference and swaps it in. On failure the
/// previous model keeps serving.
async fn reload_model(State(state): State<AppState>) -> Result<impl IntoResponse, ServeError> {
    let registry = state.registry.clone();
    let reference = state.model_ref.clone();
    let requested = reference.to_string();

    let model = tokio::task::spawn_blocking(move || registry.load(&reference))
        .await
        .map_err(|err| ModelLoadError::new(requested, err))??;

    Ok(Json(install(&state.slot, model)))
}

/// Swaps `model` in and describes it. The description is taken from the
/// model this call installed, not from whatever the slot holds afterwards.
fn install(slot: &ModelSlot, model: LoadedModel) -> ModelInfo {
    let installed = describe(&model);
    let previous = slot.replace(model);
    info!(
        "Reloaded model: {} -> {}",
        previous.version(),
        installed.model_version
    );
    installed
}

fn describe(model: &LoadedModel) -> ModelInfo {
    ModelInfo {
        model_version: model.version().to_string(),
        source: model.source().to_string(),
        loaded_at: model.loaded_at().to_rfc3339(),
    }
}
