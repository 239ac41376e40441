use axum::{
    Json,
    extract::{Path, State},
};
use coach_store::KnowledgeStatus;
use std::sync::Arc;

use super::dto::{self, *};
use super::error::ApiError;
use super::state::AppState;
use crate::models::AthleteProfile;
use crate::profile::ProfileError;

/// GET / - Welcome
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Welcome to the Coach Carter API",
        status: "active",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /api/health - Health check with knowledge base state
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "coach-carter",
        version: env!("CARGO_PKG_VERSION"),
        knowledge: state.engine.knowledge().status(),
    })
}

/// POST /api/profile/create - Validate and store an athlete profile
pub async fn create_profile(
    State(state): State<Arc<AppState>>,
    Json(profile): Json<AthleteProfile>,
) -> Result<Json<ProfileResponse>, ApiError> {
    state.profiles.save(&profile)?;

    Ok(Json(ProfileResponse {
        success: true,
        message: format!("Profile created for {}", profile.name),
        user_id: profile.user_id,
    }))
}

/// GET /api/profile/{user_id}
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<AthleteProfile>, ApiError> {
    state
        .profiles
        .get(&user_id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No profile for user '{user_id}'")))
}

/// POST /api/chat - Ask the coach
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::BadRequest("Query text cannot be empty".into()));
    }

    // Chat accepts any user id; one that cannot name a stored profile has none.
    let profile = match state.profiles.get(&req.user_id) {
        Err(ProfileError::InvalidUserId(_)) => None,
        other => other?,
    };
    let bag = profile.as_ref().map(AthleteProfile::to_bag);

    let answer = state.engine.answer(text, req.mode, bag.as_ref()).await?;

    // Post-processing runs on the raw model text
    let exercises = state.catalog.extract(&answer.text);
    let risk_scores = profile
        .as_ref()
        .map(|p| dto::build_risk_scores(&exercises, p))
        .unwrap_or_default();
    let youtube_links = dto::build_links(&exercises, &state.catalog);
    tracing::info!(
        user_id = %req.user_id,
        exercises = exercises.len(),
        has_profile = profile.is_some(),
        "chat answered"
    );

    Ok(Json(ChatResponse {
        sources: dto::build_sources(&answer.sources),
        response_text: answer.text,
        risk_scores,
        youtube_links,
    }))
}

/// POST /api/admin/rebuild - Re-chunk and re-embed the corpus
pub async fn rebuild(State(state): State<Arc<AppState>>) -> Result<Json<KnowledgeStatus>, ApiError> {
    let knowledge = Arc::clone(state.engine.knowledge());

    let status = tokio::task::spawn_blocking(move || knowledge.rebuild())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(status))
}
