// HTTP server with prediction and health routes

use crate::config::ServerConfig;
use axum::{
    body::Body,
    error_handling::HandleErrorLayer,
    extract::{
        multipart::MultipartRejection, rejection::QueryRejection, DefaultBodyLimit, Multipart,
        Query, State,
    },
    http::{Request, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use lossteach_core::{AnalysisError, PredictionResponse, Stage};
use lossteach_eye::FragmentService;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::timeout::error::Elapsed;
use tower::{BoxError, ServiceBuilder};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, info_span, warn};

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

// API state
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<FragmentService>,
    /// Held by each inference until the blocking task returns, even after
    /// the request itself has timed out.
    inference_slots: Arc<Semaphore>,
}

impl ApiState {
    pub fn new(service: Arc<FragmentService>, max_inflight: usize) -> Self {
        Self {
            service,
            inference_slots: Arc::new(Semaphore::new(max_inflight.max(1))),
        }
    }

    /// Inference slots not taken by a running model call
    pub fn idle_inference_slots(&self) -> usize {
        self.inference_slots.available_permits()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Query string of `POST /predict`
#[derive(Debug, Default, Deserialize)]
pub struct PredictParams {
    pub score_threshold: Option<f32>,
    #[serde(default)]
    pub include_mask: bool,
    #[serde(default)]
    pub include_metrics: bool,
}

/// Errors returned by handlers
#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    Internal(String),
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        ApiError::Analysis(err)
    }
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Analysis(AnalysisError::InputValidation(message.into()))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Analysis(err) => match err {
                AnalysisError::InputValidation(_) | AnalysisError::Image(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                AnalysisError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                AnalysisError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
                AnalysisError::Io(_) | AnalysisError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Analysis(err) => err.code(),
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Internal details stay in the logs
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            match &self {
                ApiError::Analysis(err) => error!("Prediction failed: {}", err),
                ApiError::Internal(msg) => error!("Prediction failed: {}", msg),
            }
            "An error occurred".to_string()
        } else {
            match &self {
                ApiError::Analysis(err) => err.to_string(),
                ApiError::Internal(msg) => msg.clone(),
            }
        };

        let response = Json(ErrorResponse {
            error: message,
            code: self.code().to_string(),
        });
        (status, response).into_response()
    }
}

/// Create HTTP router with all API routes
pub fn create_router(state: ApiState, config: &ServerConfig) -> Router {
    let request_timeout = config.request_timeout();
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(GlobalConcurrencyLimitLayer::new(config.max_concurrency))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(move |err: BoxError| async move {
                    transport_error(err, request_timeout)
                }))
                .timeout(request_timeout),
        )
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                info_span!(
                    "request",
                    id = %uuid::Uuid::new_v4(),
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .with_state(state)
}

/// Errors raised by the transport layers, reported in the handlers' format
fn transport_error(err: BoxError, limit: Duration) -> ApiError {
    if err.is::<Elapsed>() {
        warn!("Request exceeded transport timeout {:?}", limit);
        AnalysisError::Timeout {
            stage: Stage::Inference,
            elapsed_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }
        .into()
    } else {
        ApiError::Internal(format!("Unhandled transport error: {}", err))
    }
}

/// Health check: 200 while the model can serve, 503 otherwise
async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let ready = state.service.is_ready();
    let body = HealthResponse {
        status: if ready { "healthy" } else { "unavailable" }.to_string(),
        model: state.service.model_name().to_string(),
        version: state.service.vision_config().model_version.clone(),
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

/// Run fragment analysis on an uploaded image
async fn predict_handler(
    State(state): State<ApiState>,
    params: Result<Query<PredictParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let started = Instant::now();
    let Query(params) = params.map_err(|e| ApiError::invalid(e.body_text()))?;
    let mut multipart = multipart.map_err(|e| ApiError::invalid(e.body_text()))?;

    let options = state.service.options(
        params.score_threshold,
        params.include_mask,
        params.include_metrics,
    );
    options.validate()?;

    let upload = read_upload(&mut multipart).await?;
    info!("Received prediction request with {} bytes", upload.len());

    let permit = state
        .inference_slots
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| ApiError::Internal(format!("Inference slots closed: {}", e)))?;

    let service = state.service.clone();
    let budget = service.analysis_config().timeout();
    let task = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        service.predict_bytes(&upload, &options)
    });

    let response = match tokio::time::timeout(budget, task).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_error)) => {
            return Err(ApiError::Internal(format!("Prediction task failed: {}", join_error)));
        }
        Err(_) => {
            warn!("Prediction exceeded {:?}", budget);
            return Err(AnalysisError::Timeout {
                stage: Stage::Inference,
                elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            }
            .into());
        }
    };

    info!(
        "Prediction finished: {} fragments in {:?}",
        response.fragment_count(),
        started.elapsed()
    );
    Ok(Json(response))
}

async fn read_upload(multipart: &mut Multipart) -> Result<Bytes, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::invalid(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() == Some(UPLOAD_FIELD) {
            return field
                .bytes()
                .await
                .map_err(|e| ApiError::invalid(format!("Failed to read upload: {}", e)));
        }
    }
    Err(ApiError::invalid(format!(
        "Missing multipart field '{}'",
        UPLOAD_FIELD
    )))
}
