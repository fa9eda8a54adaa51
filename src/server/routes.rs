//! API handlers

use axum::Json;
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::{Form, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::ApiError;
use super::extract::CurrentUser;
use super::state::ApiState;
use crate::auth::{RegisterRequest, TokenResponse};
use crate::qa::{AnswerOutcome, QaStatus};

/// Set to `unavailable` when a chat answer could not be produced
pub const ANSWER_STATUS_HEADER: &str = "x-answer-status";

const REFRESH_TOKEN_HEADER: &str = "refresh-token";

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct HelloQuery {
    text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub qa: QaStatus,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub registered_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    token: String,
}

#[derive(Debug, Deserialize)]
pub struct ResendQuery {
    email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
}

pub async fn hello(
    query: Result<Query<HelloQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Query(query) = query?;
    let text = query.text.unwrap_or_else(|| "Hello World".to_string());
    Ok(Json(MessageResponse { message: text }))
}

pub async fn health(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        qa: state.qa.status().await,
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

pub async fn create_user(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(request) = body?;
    state.auth.register(request).await?;

    Ok((
        StatusCode::CREATED,
        MessageResponse::new(
            "User account has been successfully created. Please check your email to verify your account.",
        ),
    ))
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserProfile> {
    Json(UserProfile {
        id: user.id,
        first_name: user.first_name,
        last_name: user.last_name,
        email: user.email,
        registered_at: user.registered_at,
    })
}

pub async fn issue_token(
    State(state): State<Arc<ApiState>>,
    form: Result<Form<TokenForm>, FormRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Form(form) = form?;
    let tokens = state.auth.issue_tokens(&form.username, &form.password).await?;
    debug!("Issued tokens for {}", form.username);
    Ok(Json(tokens))
}

pub async fn refresh_token(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Missing refresh-token header",
            )
        })?;

    Ok(Json(state.auth.refresh(token).await?))
}

pub async fn verify_email(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<VerifyQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Query(query) = query?;
    state.auth.verify_email(&query.token).await?;
    Ok(MessageResponse::new("Email has been verified."))
}

pub async fn resend_verification(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<ResendQuery>, QueryRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Query(query) = query?;
    state.auth.resend_verification(&query.email).await?;
    Ok(MessageResponse::new("Email verification token has been sent."))
}

pub async fn chat(
    State(state): State<Arc<ApiState>>,
    CurrentUser(user): CurrentUser,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    info!("Chat query from user {}", user.id);

    let answer = state.qa.run(&request.query).await?;
    let unavailable = answer.outcome == AnswerOutcome::Unavailable;
    let mut response = (
        StatusCode::CREATED,
        Json(ChatResponse {
            answer: answer.text,
        }),
    )
        .into_response();

    if unavailable {
        response
            .headers_mut()
            .insert(ANSWER_STATUS_HEADER, HeaderValue::from_static("unavailable"));
    }

    Ok(response)
}
