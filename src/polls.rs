use crate::engine::{DeadlineSpec, PollDuration, TemplateQuery};
use crate::error::PollError;
use crate::startup::AppState;
use axum::{
    async_trait,
    extract::{Extension, FromRequest, FromRequestParts, Json, Path, Query, Request},
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{StatusCode, request::Parts},
    response::IntoResponse,
};
use serde::de::DeserializeOwned;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// Header set by the gateway once it has verified the caller's session.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller.
#[derive(Debug, Clone, Copy)]
pub struct ActorId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for ActorId
where
    S: Send + Sync,
{
    type Rejection = PollError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .map(ActorId)
            .ok_or(PollError::Unauthorized)
    }
}

/// `Json` whose rejections use the API error body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = PollError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| PollError::InvalidRequest(rejection.body_text()))?;
        Ok(ApiJson(value))
    }
}

/// `Path` whose rejections use the API error body.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = PollError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: PathRejection| PollError::InvalidRequest(rejection.body_text()))?;
        Ok(ApiPath(value))
    }
}

/// `Query` whose rejections use the API error body.
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = PollError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| PollError::InvalidRequest(rejection.body_text()))?;
        Ok(ApiQuery(value))
    }
}

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct ListTemplatesQuery {
    pub category: Option<String>,
    #[serde(default)]
    pub popular: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub template_id: Uuid,
    pub duration: Option<PollDuration>,
    pub deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub candidate_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub success: bool,
    pub message: String,
}

/// List active templates
pub async fn list_templates(
    Extension(app_state): Extension<AppState>,
    ApiQuery(params): ApiQuery<ListTemplatesQuery>,
) -> Result<impl IntoResponse, PollError> {
    let query = TemplateQuery {
        category: params.category,
        popular: params.popular,
        limit: params.limit,
        offset: params.offset,
    };
    let (items, total) = app_state.engine.templates.list(&query).await?;

    Ok((StatusCode::OK, Json(json!({ "items": items, "total": total }))))
}

pub async fn get_template(
    Extension(app_state): Extension<AppState>,
    ApiPath(template_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    let template = app_state.engine.templates.get(template_id).await?;
    Ok((StatusCode::OK, Json(template)))
}

/// Create a poll in a circle; the caller becomes its creator
pub async fn create_poll(
    Extension(app_state): Extension<AppState>,
    ActorId(user_id): ActorId,
    ApiPath(circle_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CreatePollRequest>,
) -> Result<impl IntoResponse, PollError> {
    let deadline = match (payload.duration, payload.deadline) {
        (Some(duration), None) => DeadlineSpec::In(duration),
        (None, Some(at)) => DeadlineSpec::At(at),
        _ => {
            return Err(PollError::InvalidRequest(
                "exactly one of duration or deadline is required".to_string(),
            ));
        }
    };

    let poll = app_state
        .engine
        .create_poll(circle_id, user_id, payload.template_id, deadline)
        .await?;

    let view = app_state.engine.poll_view(poll.id, user_id).await?;

    Ok((StatusCode::CREATED, Json(view)))
}

/// Polls of a circle, newest first
pub async fn list_circle_polls(
    Extension(app_state): Extension<AppState>,
    ActorId(user_id): ActorId,
    ApiPath(circle_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    let polls = app_state
        .engine
        .lifecycle
        .list_circle_polls(circle_id, user_id)
        .await?;

    let polls: Vec<_> = polls
        .into_iter()
        .map(|poll| {
            let status = app_state.engine.lifecycle.status(&poll);
            json!({
                "id": poll.id,
                "question_text": poll.question_text,
                "creator_id": poll.creator_id,
                "created_at": poll.created_at.to_rfc3339(),
                "deadline": poll.deadline.to_rfc3339(),
                "status": status,
            })
        })
        .collect();

    Ok((StatusCode::OK, Json(polls)))
}

/// Get a poll with its candidates
pub async fn get_poll(
    Extension(app_state): Extension<AppState>,
    ActorId(user_id): ActorId,
    ApiPath(poll_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    let view = app_state.engine.poll_view(poll_id, user_id).await?;
    Ok((StatusCode::OK, Json(view)))
}

/// Cast the caller's ballot
pub async fn vote_on_poll(
    Extension(app_state): Extension<AppState>,
    ActorId(user_id): ActorId,
    ApiPath(poll_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CastVoteRequest>,
) -> Result<impl IntoResponse, PollError> {
    app_state
        .engine
        .cast_vote(poll_id, user_id, payload.candidate_id)
        .await?;

    let response = VoteResponse {
        success: true,
        message: "Vote recorded successfully".to_string(),
    };
    Ok((StatusCode::OK, Json(response)))
}

/// Close a poll (only creator can close)
pub async fn close_poll(
    Extension(app_state): Extension<AppState>,
    ActorId(user_id): ActorId,
    ApiPath(poll_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    app_state.engine.close_poll(poll_id, user_id).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "success": true,
            "message": "Poll closed successfully"
        })),
    ))
}

/// Delete a poll (only creator, only shortly after creation)
pub async fn delete_poll(
    Extension(app_state): Extension<AppState>,
    ActorId(user_id): ActorId,
    ApiPath(poll_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    app_state.engine.delete_poll(poll_id, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn poll_results(
    Extension(app_state): Extension<AppState>,
    ActorId(user_id): ActorId,
    ApiPath(poll_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    let results = app_state.engine.results_for(poll_id, user_id).await?;
    Ok((StatusCode::OK, Json(results)))
}
