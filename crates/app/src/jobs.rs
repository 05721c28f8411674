use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::{counter, histogram};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use jobtrack_core::validation::{parse_days_ahead, parse_sort, parse_status_filter};
use jobtrack_core::{JobFilter, JobPatch, NewJobInput};

use crate::auth::authenticate;
use crate::problem::ProblemResponse;
use crate::router::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RemindersQuery {
    #[serde(default)]
    days: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();
    let result = list_jobs(&state, &headers, query).await;
    record("list", start, &result);
    result
}

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();
    let result = create_job(&state, &headers, &body).await;
    record("create", start, &result);
    result
}

pub async fn stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();
    let result = job_stats(&state, &headers).await;
    record("stats", start, &result);
    result
}

pub async fn reminders(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RemindersQuery>,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();
    let result = upcoming_reminders(&state, &headers, query).await;
    record("reminders", start, &result);
    result
}

pub async fn get_one(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();
    let result = get_job(&state, &headers, &id).await;
    record("get", start, &result);
    result
}

pub async fn update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();
    let result = update_job(&state, &headers, &id, &body).await;
    record("update", start, &result);
    result
}

pub async fn remove(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();
    let result = delete_job(&state, &headers, &id).await;
    record("delete", start, &result);
    result
}

async fn list_jobs(
    state: &AppState,
    headers: &HeaderMap,
    query: ListQuery,
) -> Result<Response, ProblemResponse> {
    let principal = authenticate(state, headers)?;
    let filter = JobFilter {
        status: parse_status_filter(query.status.as_deref()).map_err(invalid)?,
        search: query
            .search
            .map(|raw| raw.trim().to_string())
            .filter(|term| !term.is_empty()),
    };
    let sort = parse_sort(query.sort.as_deref()).map_err(invalid)?;

    let jobs = state
        .jobs()
        .list_jobs(&principal.user_id, &filter, sort)
        .await?;
    Ok(Json(jobs).into_response())
}

async fn create_job(
    state: &AppState,
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Response, ProblemResponse> {
    let principal = authenticate(state, headers)?;
    let input: NewJobInput = parse_body(body)?;

    let job = state.jobs().create_job(&principal.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(job)).into_response())
}

async fn job_stats(state: &AppState, headers: &HeaderMap) -> Result<Response, ProblemResponse> {
    let principal = authenticate(state, headers)?;
    let stats = state.jobs().get_stats(&principal.user_id).await?;
    Ok(Json(stats).into_response())
}

async fn upcoming_reminders(
    state: &AppState,
    headers: &HeaderMap,
    query: RemindersQuery,
) -> Result<Response, ProblemResponse> {
    let principal = authenticate(state, headers)?;
    let days = parse_days_ahead(query.days.as_deref()).map_err(invalid)?;

    let jobs = state
        .jobs()
        .get_reminders(&principal.user_id, Some(days))
        .await?;
    Ok(Json(jobs).into_response())
}

async fn get_job(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Response, ProblemResponse> {
    let principal = authenticate(state, headers)?;
    let job = state.jobs().get_job(&principal.user_id, id).await?;
    Ok(Json(job).into_response())
}

async fn update_job(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
    body: &Bytes,
) -> Result<Response, ProblemResponse> {
    let principal = authenticate(state, headers)?;
    let patch: JobPatch = parse_body(body)?;

    let job = state
        .jobs()
        .update_job(&principal.user_id, id, patch)
        .await?;
    Ok(Json(job).into_response())
}

async fn delete_job(
    state: &AppState,
    headers: &HeaderMap,
    id: &str,
) -> Result<Response, ProblemResponse> {
    let principal = authenticate(state, headers)?;
    state.jobs().delete_job(&principal.user_id, id).await?;
    Ok(Json(json!({ "message": "Job removed" })).into_response())
}

fn record(op: &'static str, start: Instant, result: &Result<Response, ProblemResponse>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(problem) => problem.problem_type(),
    };
    counter!("jobs_requests_total", "op" => op, "result" => outcome).increment(1);
    histogram!("jobs_request_duration_seconds", "op" => op).record(start.elapsed().as_secs_f64());
}

/// Well-formed JSON carrying out-of-domain values is reported as a validation failure.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ProblemResponse> {
    serde_json::from_slice(body).map_err(|err| {
        if err.is_data() {
            ProblemResponse::new(StatusCode::BAD_REQUEST, "validation_failed", err.to_string())
        } else {
            ProblemResponse::new(
                StatusCode::BAD_REQUEST,
                "invalid_json",
                format!("failed to parse payload: {err}"),
            )
        }
    })
}

fn invalid(err: jobtrack_core::ValidationError) -> ProblemResponse {
    ProblemResponse::new(StatusCode::BAD_REQUEST, "validation_failed", err.to_string())
}
