//! REST API for the prediction service
//!
//! Exposes single and batch prediction, health probes and model
//! introspection over a shared [`PredictionService`].

use lendscore_core::{
    InferenceError, PredictionResult, PredictionService, ServeError, ValidationError, Violation,
};
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

/// Largest accepted body for a single prediction.
pub const MAX_PREDICT_BODY_BYTES: u64 = 64 * 1024;
/// Largest accepted body for a batch prediction.
pub const MAX_BATCH_BODY_BYTES: u64 = 4 * 1024 * 1024;

pub type SharedService = Arc<PredictionService>;

// =============================================================================
// Request/Response types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<Violation>,
}

#[derive(Debug, Serialize)]
pub struct BannerResponse {
    pub service: &'static str,
    pub description: &'static str,
    pub version: &'static str,
    pub model_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<usize>,
    pub max_batch_size: usize,
    pub endpoints: Vec<&'static str>,
}

/// One row of a batch response.
#[derive(Debug, Serialize)]
pub struct BatchItem {
    pub index: usize,
    #[serde(flatten)]
    pub result: PredictionResult,
}

// =============================================================================
// API Routes
// =============================================================================

/// Build the complete API route tree
pub fn api_routes(
    service: SharedService,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let banner = warp::path::end()
        .and(warp::get())
        .and(with_service(service.clone()))
        .map(handle_banner);

    let health = warp::path("health")
        .or(warp::path("ping"))
        .unify()
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(service.clone()))
        .map(handle_health);

    let predict = warp::path("predict")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_PREDICT_BODY_BYTES))
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(handle_predict);

    let predict_batch = warp::path("predict-batch")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BATCH_BODY_BYTES))
        .and(warp::body::json())
        .and(with_service(service.clone()))
        .and_then(handle_predict_batch);

    let model_info = warp::path("model-info")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_service(service))
        .and_then(handle_model_info);

    // CORS configuration for browser-based clients
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    banner
        .or(health)
        .or(predict)
        .or(predict_batch)
        .or(model_info)
        .with(cors)
}

// =============================================================================
// Filters
// =============================================================================

fn with_service(
    service: SharedService,
) -> impl Filter<Extract = (SharedService,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

// =============================================================================
// Handlers
// =============================================================================

fn handle_banner(service: SharedService) -> warp::reply::Json {
    let info = service.model_info().ok();
    warp::reply::json(&BannerResponse {
        service: "lendscore",
        description: "Mortgage default prediction service",
        version: env!("CARGO_PKG_VERSION"),
        model_loaded: info.is_some(),
        feature_count: info.map(|i| i.feature_count),
        max_batch_size: service.max_batch_size(),
        endpoints: vec![
            "GET /health",
            "GET /ping",
            "POST /predict",
            "POST /predict-batch",
            "GET /model-info",
        ],
    })
}

fn handle_health(service: SharedService) -> warp::reply::Json {
    warp::reply::json(&service.health())
}

async fn handle_predict(
    body: serde_json::Value,
    service: SharedService,
) -> Result<impl Reply, Infallible> {
    match service.predict(&body) {
        Ok(result) => Ok(warp::reply::json(&result).into_response()),
        Err(e) => Ok(serve_error_response(e)),
    }
}

async fn handle_predict_batch(
    body: Vec<serde_json::Value>,
    service: SharedService,
) -> Result<impl Reply, Infallible> {
    match service.predict_batch(&body) {
        Ok(results) => {
            let items: Vec<BatchItem> = results
                .into_iter()
                .enumerate()
                .map(|(index, result)| BatchItem { index, result })
                .collect();
            Ok(warp::reply::json(&items).into_response())
        }
        Err(e) => Ok(serve_error_response(e)),
    }
}

async fn handle_model_info(service: SharedService) -> Result<impl Reply, Infallible> {
    match service.model_info() {
        Ok(info) => Ok(warp::reply::json(&info).into_response()),
        Err(e) => Ok(inference_error_response(e)),
    }
}

// =============================================================================
// Error mapping
// =============================================================================

fn error_response(status: StatusCode, code: &str, message: &str) -> warp::reply::Response {
    let body = ApiError {
        error: message.to_string(),
        code: code.to_string(),
        violations: Vec::new(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn validation_error_response(err: ValidationError) -> warp::reply::Response {
    let body = ApiError {
        error: err.to_string(),
        code: "validation_error".to_string(),
        violations: err.violations,
    };
    warp::reply::with_status(warp::reply::json(&body), StatusCode::UNPROCESSABLE_ENTITY)
        .into_response()
}

fn inference_error_response(err: InferenceError) -> warp::reply::Response {
    let (status, code) = match &err {
        InferenceError::ModelNotLoaded => (StatusCode::SERVICE_UNAVAILABLE, "model_not_loaded"),
        InferenceError::BatchTooLarge { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "batch_too_large")
        }
        InferenceError::DimensionMismatch { .. } | InferenceError::NonFiniteScore => {
            (StatusCode::INTERNAL_SERVER_ERROR, "inference_error")
        }
    };
    error_response(status, code, &err.to_string())
}

fn serve_error_response(err: ServeError) -> warp::reply::Response {
    match err {
        ServeError::Validation(e) => validation_error_response(e),
        ServeError::Inference(e) => inference_error_response(e),
    }
}

/// Map filter rejections to JSON error bodies
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, code, message): (StatusCode, &str, String) =
        if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_body",
                format!("Invalid request body: {}", e),
            )
        } else if err.find::<warp::reject::LengthRequired>().is_some() {
            (
                StatusCode::LENGTH_REQUIRED,
                "length_required",
                "Content-Length header required".into(),
            )
        } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "Request payload too large".into(),
            )
        } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
            (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_media_type",
                "Unsupported media type".into(),
            )
        } else if err.is_not_found() {
            (StatusCode::NOT_FOUND, "not_found", "Not found".into())
        } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
            (
                StatusCode::METHOD_NOT_ALLOWED,
                "method_not_allowed",
                "Method not allowed".into(),
            )
        } else {
            tracing::error!("Unhandled rejection: {:?}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error".into(),
            )
        };

    Ok(error_response(status, code, &message))
}
