//! Axum read API over the aggregator.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::aggregator::{ContractDataAggregator, VoteReport};
use crate::gateway::ChainGateway;
use crate::query::QueryState;
use crate::types::{Milestone, Project};

pub struct ApiState<G> {
    pub aggregator: ContractDataAggregator<G>,
}

// ─────────────────────────────────────────────────────────
// Response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ProjectsResponse {
    pub count: usize,
    pub projects: Vec<Project>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestonesResponse {
    pub project_id: u64,
    pub count: usize,
    pub milestones: Vec<Milestone>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn router<G: ChainGateway + 'static>(state: Arc<ApiState<G>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/projects", get(list_projects::<G>))
        .route("/projects/:id", get(get_project::<G>))
        .route("/projects/:id/milestones", get(get_milestones::<G>))
        .route("/projects/:id/milestones/:milestone/votes", get(get_vote_status::<G>))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /projects`
pub async fn list_projects<G: ChainGateway>(State(state): State<Arc<ApiState<G>>>) -> Response {
    let query = state.aggregator.all_projects().await;
    if let Some(resp) = failure(&query) {
        return resp;
    }
    let projects = query.data;
    (
        StatusCode::OK,
        Json(ProjectsResponse {
            count: projects.len(),
            projects,
        }),
    )
        .into_response()
}

/// `GET /projects/:id`
pub async fn get_project<G: ChainGateway>(
    State(state): State<Arc<ApiState<G>>>,
    Path(id): Path<u64>,
) -> Response {
    let query = state.aggregator.project(id).await;
    if let Some(resp) = failure(&query) {
        return resp;
    }
    match query.data {
        Some(project) => (StatusCode::OK, Json(project)).into_response(),
        None => not_found(format!("project {id} not found")),
    }
}

/// `GET /projects/:id/milestones`
pub async fn get_milestones<G: ChainGateway>(
    State(state): State<Arc<ApiState<G>>>,
    Path(project_id): Path<u64>,
) -> Response {
    let query = state.aggregator.project_milestones(project_id).await;
    if let Some(resp) = failure(&query) {
        return resp;
    }
    let milestones = query.data;
    (
        StatusCode::OK,
        Json(MilestonesResponse {
            project_id,
            count: milestones.len(),
            milestones,
        }),
    )
        .into_response()
}

/// `GET /projects/:id/milestones/:milestone/votes`
///
/// The contract's `canRelease` and the advisory quorum are returned side by side.
pub async fn get_vote_status<G: ChainGateway>(
    State(state): State<Arc<ApiState<G>>>,
    Path((project_id, milestone_id)): Path<(u64, u64)>,
) -> Response {
    let query = state.aggregator.vote_status(project_id, milestone_id).await;
    if let Some(resp) = failure(&query) {
        return resp;
    }
    match query.data {
        Some(report) => (StatusCode::OK, Json::<VoteReport>(report)).into_response(),
        None => not_found(format!(
            "no vote status for milestone {milestone_id} of project {project_id}"
        )),
    }
}

fn failure<T>(query: &QueryState<T>) -> Option<Response> {
    if !query.is_error {
        return None;
    }
    let error = query
        .error
        .as_ref()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "read failed".to_string());
    Some((StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error })).into_response())
}

fn not_found(error: String) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorResponse { error })).into_response()
}
