use coach_store::{KnowledgeStatus, RetrievedChunk};
use serde::{Deserialize, Serialize};

use crate::coaching::{ExerciseCatalog, risk};
use crate::engine::context::truncate;
use crate::models::{AthleteProfile, ChatMode};

const PREVIEW_CHARS: usize = 160;

/// POST /api/chat request
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    pub user_id: String,
    pub mode: ChatMode,
}

/// POST /api/chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response_text: String,
    pub risk_scores: Vec<RiskScoreItem>,
    pub youtube_links: Vec<YouTubeLinkItem>,
    pub sources: Vec<SourceInfo>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RiskScoreItem {
    pub exercise: String,
    pub risk: u8,
    pub effectiveness: u8,
    pub reason: String,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct YouTubeLinkItem {
    pub exercise: String,
    pub url: String,
}

/// Retrieved chunk the answer was grounded on
#[derive(Debug, Serialize, Clone)]
pub struct SourceInfo {
    pub chunk_id: usize,
    /// Euclidean (L2) distance to the query, lower = closer
    pub distance: f32,
    pub preview: String,
}

/// POST /api/profile/create response
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub success: bool,
    pub message: String,
    pub user_id: String,
}

/// GET / response
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /api/health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub knowledge: KnowledgeStatus,
}

pub fn build_sources(chunks: &[RetrievedChunk]) -> Vec<SourceInfo> {
    chunks
        .iter()
        .map(|c| SourceInfo {
            chunk_id: c.chunk_id,
            distance: c.distance,
            preview: truncate(&c.text, PREVIEW_CHARS).to_string(),
        })
        .collect()
}

/// Scores for each exercise against the athlete's injuries and primary goal
pub fn build_risk_scores(exercises: &[String], profile: &AthleteProfile) -> Vec<RiskScoreItem> {
    exercises
        .iter()
        .map(|exercise| {
            let a = risk::assess(exercise, &profile.injuries, profile.primary_goal());
            RiskScoreItem {
                exercise: a.exercise,
                risk: a.risk,
                effectiveness: a.effectiveness,
                reason: a.reason,
            }
        })
        .collect()
}

/// First tutorial link for each exercise that has one
pub fn build_links(exercises: &[String], catalog: &ExerciseCatalog) -> Vec<YouTubeLinkItem> {
    exercises
        .iter()
        .filter_map(|exercise| {
            catalog.links(exercise).first().map(|url| YouTubeLinkItem {
                exercise: exercise.clone(),
                url: url.clone(),
            })
        })
        .collect()
}
