//! HTTP server for the resolver API.
//!
//! # API Endpoints
//!
//! | Method | Path                  | Description                              |
//! |--------|-----------------------|------------------------------------------|
//! | GET    | `/health`             | Health check                             |
//! | POST   | `/jobs/{type}`        | Submit a job (multipart `file` field)    |
//! | GET    | `/jobs/{id}`          | Job status and failure                   |
//! | DELETE | `/jobs/{id}`          | Delete a job with its tasks and results  |
//! | GET    | `/jobs/{id}/results`  | Results as `?format=csv` or `json`       |
//! | GET    | `/api/logs`           | SSE stream of job progress               |

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::get,
    Router,
};
use chrono::Utc;
use futures::stream::{self, Stream};
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::logs::{JobLogListener, LOG_BROADCASTER};
use super::types::{ExportFormat, JobResponse, ResultsQuery, SubmitQuery, SubmitResponse};
use crate::config::Config;
use crate::error::{ExportError, ServerError, ServerResult};
use crate::export;
use crate::models::{JobId, JobStatus, JobType};
use crate::pipeline::Pipeline;
use crate::registry::InMemoryRegistry;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
}

/// Routes without the background workers, usable in tests.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    // One parameter name per segment: a job type on POST, a job id otherwise
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/jobs/{job}", get(get_job).post(submit_job).delete(delete_job))
        .route("/jobs/{job}/results", get(job_results))
        .route("/api/logs", get(sse_logs))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server with its dispatcher and expiry cleanup.
pub async fn start_server(config: Config, registry: Arc<InMemoryRegistry>) -> Result<(), Box<dyn std::error::Error>> {
    let (pipeline, dispatcher) = Pipeline::builder()
        .registry(registry)
        .job_ttl(config.job_ttl())
        .listener(Arc::new(JobLogListener::default()))
        .build_with_dispatcher(config.dispatcher.clone());
    let pipeline = Arc::new(pipeline);

    let _workers = dispatcher.spawn();
    let _cleanup = spawn_cleanup(pipeline.clone(), config.cleanup_interval);

    let app = router(AppState { pipeline });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "Resolver server listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically delete expired jobs. A zero interval disables the cleanup.
fn spawn_cleanup(pipeline: Arc<Pipeline>, every: Duration) -> Option<JoinHandle<()>> {
    if every.is_zero() {
        warn!("Cleanup interval is zero, expired jobs will not be deleted");
        return None;
    }
    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = pipeline.factory.delete_expired_jobs(Utc::now()).await {
                warn!(error = %e, "Expired job cleanup failed");
            }
        }
    }))
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "resolver",
        "version": env!("CARGO_PKG_VERSION"),
        "jobTypes": JobType::ALL.iter().map(JobType::as_str).collect::<Vec<_>>(),
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    // Lagged receivers skip the entries they missed
    let stream = BroadcastStream::new(rx).filter_map(|result| {
        let entry = result.ok()?;
        let json = serde_json::to_string(&entry).ok()?;
        Some(Ok(Event::default().data(json)))
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn submit_job(
    State(state): State<AppState>,
    Path(job_type): Path<String>,
    Query(query): Query<SubmitQuery>,
    mut multipart: Multipart,
) -> ServerResult<(StatusCode, Json<SubmitResponse>)> {
    let job_type: JobType = job_type.parse().map_err(ServerError::BadRequest)?;
    let metadata = query.into_metadata()?;

    let mut file_data: Option<Vec<u8>> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
            file_data = Some(bytes.to_vec());
        }
    }
    let bytes = file_data.ok_or_else(|| ServerError::BadRequest("No file provided".into()))?;

    let job_id = state.pipeline.factory.create_job(job_type, bytes, metadata).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            job_id,
            status: JobStatus::Created,
        }),
    ))
}

fn parse_job_id(raw: &str) -> ServerResult<JobId> {
    raw.parse()
        .map_err(|_| ServerError::BadRequest(format!("Invalid job id: {}", raw)))
}

async fn get_job(State(state): State<AppState>, Path(job): Path<String>) -> ServerResult<Json<JobResponse>> {
    let job = state.pipeline.job(parse_job_id(&job)?).await?;
    Ok(Json(job.into()))
}

async fn delete_job(State(state): State<AppState>, Path(job): Path<String>) -> ServerResult<StatusCode> {
    state.pipeline.factory.delete_job(parse_job_id(&job)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn job_results(
    State(state): State<AppState>,
    Path(job): Path<String>,
    Query(query): Query<ResultsQuery>,
) -> ServerResult<Response> {
    let job_id = parse_job_id(&job)?;
    let job = state.pipeline.job(job_id).await?;
    let results = state.pipeline.results(job_id).await?;

    match query.format {
        ExportFormat::Csv => {
            let mut body = Vec::new();
            export::write_csv(&job, &results, &mut body)?;
            Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], body).into_response())
        }
        ExportFormat::Json => {
            let job_type = job.job_type;
            let items = results
                .into_iter()
                .enumerate()
                .map(move |(i, result)| export::json_item(&result, job_type, i == 0));
            let body = stream::once(async { Ok::<_, ExportError>(export::JSON_OPEN.to_vec()) })
                .chain(stream::iter(items))
                .chain(stream::once(async { Ok(export::JSON_CLOSE.to_vec()) }));
            Ok(([(header::CONTENT_TYPE, "application/json")], Body::from_stream(body)).into_response())
        }
    }
}
