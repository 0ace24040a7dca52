use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use log::{error, info};
use serde_json::json;

use crate::config::ServerConfig;
use crate::data::{DiagnosticsReport, SchedulingOutput, SolveRequest};
use crate::error::SolveError;
use crate::solver;

/// Failure of a request, rendered as `{ "error": message }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<SolveError> for ApiError {
    fn from(err: SolveError) -> Self {
        let status = if err.is_configuration() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::UNPROCESSABLE_ENTITY
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

// the search is CPU bound, keep it off the async workers
async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, SolveError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(join_err) => {
            error!("Solver task failed: {join_err}");
            Err(ApiError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "solver task failed".to_string(),
            })
        }
    }
}

async fn solve_handler(Json(request): Json<SolveRequest>) -> Result<Json<SchedulingOutput>, ApiError> {
    let output = run_blocking(move || solver::solve(&request.input, &request.config)).await?;
    Ok(Json(output))
}

async fn diagnose_handler(
    Json(request): Json<SolveRequest>,
) -> Result<Json<DiagnosticsReport>, ApiError> {
    let report = run_blocking(move || solver::diagnose(&request.input)).await?;
    Ok(Json(report))
}

pub fn router() -> Router {
    Router::new()
        .route("/v1/timetable/solve", post(solve_handler))
        .route("/v1/timetable/diagnose", post(diagnose_handler))
}

pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, router()).await
}
