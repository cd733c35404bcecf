use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{Result as WebResult, WebError};
use crate::game_logic::{AnswerOutcome, Lifeline, LifelineOutcome, Theme};
use crate::leaderboard::HighScoreEntry;
use crate::session::{AnswerChoice, SessionActorHandle, SessionView};
use crate::state::AppState;

#[derive(Deserialize, Debug)]
pub struct CreateSessionRequest {
    pub player_name: String,
    pub theme: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct LifelineRequest {
    pub lifeline: String,
}

#[derive(Deserialize, Debug)]
pub struct AnswerRequest {
    pub choice: AnswerChoice,
}

#[derive(Deserialize, Debug)]
pub struct RestartRequest {
    pub theme: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct LifelineResponse {
    pub outcome: LifelineOutcome,
    pub session: SessionView,
}

#[derive(Serialize, Debug)]
pub struct AnswerResponse {
    pub outcome: AnswerOutcome,
    pub session: SessionView,
}

fn resolve_theme(requested: Option<&str>, default_theme: Theme) -> WebResult<Theme> {
    match requested.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(default_theme),
        Some(label) => label.parse().map_err(WebError::BadRequest),
    }
}

async fn session_handle(app_state: &AppState, session_id: Uuid) -> WebResult<SessionActorHandle> {
    app_state
        .session_manager
        .get_session_handle(session_id)
        .await
        .ok_or(WebError::SessionNotFound(session_id))
}

pub async fn list_themes_handler() -> Json<Vec<&'static str>> {
    Json(Theme::all().iter().map(Theme::label).collect())
}

pub async fn create_session_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> WebResult<Json<SessionView>> {
    tracing::info!("HTTP: Received create_session request: {:?}", payload);

    let player_name = payload.player_name.trim().to_string();
    if player_name.is_empty() {
        return Err(WebError::BadRequest("player_name must not be empty".to_string()));
    }
    let theme = resolve_theme(payload.theme.as_deref(), app_state.default_theme)?;

    let details = app_state
        .session_manager
        .create_session(player_name, theme)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create session: {}", e);
            WebError::InternalServerError(e)
        })?;

    let session = session_handle(&app_state, details.session_id).await?;
    match session.view().await {
        Ok(view) => Ok(Json(view)),
        Err(e) => {
            // Its id never reached the client.
            tracing::warn!(session.id = %details.session_id, error = %e, "First question failed, dropping session");
            if let Err(notify_err) = app_state
                .session_manager
                .remove_session(details.session_id)
                .await
            {
                tracing::error!("Failed to drop session {}: {}", details.session_id, notify_err);
            }
            Err(e.into())
        }
    }
}

pub async fn get_session_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> WebResult<Json<SessionView>> {
    let session = session_handle(&app_state, session_id).await?;
    Ok(Json(session.view().await?))
}

pub async fn use_lifeline_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<LifelineRequest>,
) -> WebResult<Json<LifelineResponse>> {
    let lifeline: Lifeline = payload.lifeline.parse().map_err(WebError::BadRequest)?;
    let session = session_handle(&app_state, session_id).await?;
    let (outcome, view) = session.use_lifeline(lifeline).await?;

    match outcome {
        LifelineOutcome::NoActiveQuestion => Err(WebError::Conflict(
            "No question is currently active".to_string(),
        )),
        LifelineOutcome::RoundOver => Err(WebError::Conflict(
            "The round is already over".to_string(),
        )),
        outcome => Ok(Json(LifelineResponse {
            outcome,
            session: view,
        })),
    }
}

pub async fn submit_answer_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> WebResult<Json<AnswerResponse>> {
    let session = session_handle(&app_state, session_id).await?;
    let (outcome, view) = session.submit_answer(payload.choice).await?;
    tracing::info!(
        session.id = %session_id,
        correct = outcome.correct,
        score = outcome.score,
        "HTTP: Answer submitted"
    );
    Ok(Json(AnswerResponse {
        outcome,
        session: view,
    }))
}

pub async fn restart_session_handler(
    State(app_state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<RestartRequest>,
) -> WebResult<Json<SessionView>> {
    let theme = match payload.theme.as_deref().map(str::trim) {
        Some(label) if !label.is_empty() => Some(label.parse().map_err(WebError::BadRequest)?),
        _ => None,
    };
    let session = session_handle(&app_state, session_id).await?;
    Ok(Json(session.restart(theme).await?))
}

pub async fn leaderboard_handler(
    State(app_state): State<AppState>,
) -> WebResult<Json<Vec<HighScoreEntry>>> {
    let entries = app_state.leaderboard.load().await.map_err(|e| {
        tracing::error!("Failed to read leaderboard: {}", e);
        WebError::InternalServerError(format!("Failed to read leaderboard: {}", e))
    })?;
    Ok(Json(entries))
}
