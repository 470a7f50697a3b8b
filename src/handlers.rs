use crate::error::AppError;
use crate::models::Question;
use crate::recorder;
use crate::state::{AppState, FinalScore};
use crate::store::StoreError;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::warn;

static RATE_LIMIT: Lazy<DashMap<String, (u32, Instant)>> = Lazy::new(DashMap::new);

fn check_rate_limit(scope: &str, key: &str, limit_per_minute: u32) -> bool {
    let now = Instant::now();
    let full_key = format!("{scope}:{key}");
    if let Some(mut entry) = RATE_LIMIT.get_mut(&full_key) {
        if now.duration_since(entry.1) > Duration::from_secs(60) {
            *entry = (1, now);
            true
        } else if entry.0 >= limit_per_minute {
            false
        } else {
            entry.0 += 1;
            true
        }
    } else {
        RATE_LIMIT.insert(full_key, (1, now));
        true
    }
}

fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn client_key(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("local")
}

pub async fn list_questions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Question>>, AppError> {
    let req_id = request_id_from_headers(&headers);
    match state.load_questions().await {
        Ok(questions) => Ok(Json(questions)),
        Err(err) if state.fail_open => {
            warn!("question sheet read failed, serving empty list: {}", err);
            Ok(Json(Vec::new()))
        }
        Err(err) => {
            warn!("question sheet read failed: {}", err);
            Err(AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_READ_ERROR",
                "Failed to fetch questions",
                req_id,
            ))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitPayload {
    pub username: Option<String>,
    #[serde(rename = "qId")]
    pub q_id: String,
    #[serde(rename = "selectedAnswer")]
    pub selected_answer: String,
    // Accepted for wire compatibility; correctness is always recomputed
    // server-side from the stored answer key.
    #[serde(default, rename = "isCorrect")]
    pub is_correct: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SubmitPayload>,
) -> Result<Json<MessageResponse>, AppError> {
    let req_id = request_id_from_headers(&headers);
    if !check_rate_limit("submit", client_key(&headers), 240) {
        return Err(AppError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "too many requests",
            req_id,
        ));
    }

    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            AppError::new(
                StatusCode::NOT_FOUND,
                "VALIDATION_ERROR",
                "Username is required!",
                req_id.clone(),
            )
        })?;

    match recorder::submit_response(&state, username, &payload.q_id, &payload.selected_answer).await
    {
        Ok(_) => {}
        Err(err) if state.fail_open => {
            warn!(username, "response submission not persisted: {}", err);
        }
        Err(err) => {
            warn!(username, "response submission failed: {}", err);
            let code = match err {
                StoreError::Read(_) => "STORE_READ_ERROR",
                StoreError::Write(_) => "STORE_WRITE_ERROR",
            };
            return Err(AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                code,
                "Failed to submit response",
                req_id,
            ));
        }
    }

    Ok(Json(MessageResponse {
        message: "Response submitted successfully!".to_string(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct FinalScorePayload {
    pub username: Option<String>,
    pub score: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct FinalScoreSaved {
    pub message: String,
    pub username: String,
    pub score: i64,
}

pub async fn submit_final_score(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<FinalScorePayload>,
) -> Result<Json<FinalScoreSaved>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let (username, score) = match (payload.username.filter(|u| !u.trim().is_empty()), payload.score)
    {
        (Some(username), Some(score)) => (username, score),
        _ => {
            return Err(AppError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Invalid request",
                req_id,
            ))
        }
    };

    state.final_scores.record(&username, score).await;
    Ok(Json(FinalScoreSaved {
        message: "Final score saved!".to_string(),
        username,
        score,
    }))
}

pub async fn get_final_score(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Json<FinalScore>, AppError> {
    let req_id = request_id_from_headers(&headers);
    let record = state.final_score(&username).await.map_err(|err| {
        warn!(%username, "final score lookup failed: {}", err);
        AppError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "STORE_READ_ERROR",
            "Failed to fetch final score",
            req_id.clone(),
        )
    })?;

    record.map(Json).ok_or_else(|| {
        AppError::new(
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Final score not found",
            req_id,
        )
    })
}
