//! HTTP handlers for the account API.
//!
//! Handlers only translate between HTTP and [`AccountService`] calls: they
//! pull the path, query and body apart, build a [`RequestContext`] from the
//! `Authorization` header, and serialise the outcome.

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use roster_types::{AccountId, AccountView, StatusResponse};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;

use crate::error::ServiceError;
use crate::service::RequestContext;
use crate::AppState;

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // A non-UTF-8 header is treated like a garbled one: present but unusable.
        let authorization = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| value.to_str().unwrap_or_default().to_string());
        Ok(RequestContext { authorization })
    }
}

/// JSON request body.
///
/// Unlike bare [`Json`], a body that is not valid JSON or lacks a field is
/// answered with a 400 in the usual `{"error": ...}` shape. Oversized bodies
/// keep their 413.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                Err(rejection.into_response())
            }
            Err(rejection) => Err(ServiceError::from(rejection).into_response()),
        }
    }
}

/// Query string for `GET /api/accounts/lookup`.
#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    /// Email address or username.
    pub identifier: String,
}

/// Request body for `DELETE /api/me`.
#[derive(Deserialize)]
pub struct DeleteAccountRequest {
    pub password: String,
    /// Must be exactly `"SUBMIT"`.
    pub confirmation: String,
}

/// Request body for `PUT /api/me/username`.
#[derive(Debug, Deserialize)]
pub struct ChangeUsernameRequest {
    pub username: String,
}

/// Request body for `PUT /api/me/password`.
#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub password: String,
}

/// Request body for `POST /api/me/password/reset`.
#[derive(Deserialize)]
pub struct ResetPasswordRequest {
    pub verification_code: i32,
    pub new_password: String,
}

/// Response body for `GET /api/accounts/{id}/subscribers`.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubscribersResponse {
    pub account_id: AccountId,
    pub subscribers: Vec<AccountId>,
}

/// Handler for `GET /api/accounts`.
pub async fn list_accounts_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<AccountView>>, ServiceError> {
    state.service.list_all().await.map(Json)
}

/// Handler for `GET /api/accounts/lookup?identifier=`.
pub async fn lookup_account_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<AccountView>, ServiceError> {
    state
        .service
        .get_by_identifier(&query.identifier)
        .await
        .map(Json)
}

/// Handler for `GET /api/accounts/{id}`.
pub async fn get_account_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AccountView>, ServiceError> {
    state.service.get_by_id(&id).await.map(Json)
}

/// Handler for `GET /api/accounts/{id}/subscribers`.
pub async fn list_subscribers_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SubscribersResponse>, ServiceError> {
    let subscribers = state.service.list_subscribers(&id).await?;
    let account_id = id
        .parse()
        .map_err(|e: roster_types::ParseAccountIdError| ServiceError::Malformed(e.to_string()))?;
    Ok(Json(SubscribersResponse {
        account_id,
        subscribers,
    }))
}

/// Handler for `POST /api/accounts/{id}/subscribers`.
pub async fn subscribe_handler(
    Extension(state): Extension<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ServiceError> {
    state.service.subscribe(&ctx, &id).await.map(Json)
}

/// Handler for `DELETE /api/accounts/{id}/subscribers`.
pub async fn unsubscribe_handler(
    Extension(state): Extension<Arc<AppState>>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ServiceError> {
    state.service.unsubscribe(&ctx, &id).await.map(Json)
}

/// Handler for `GET /api/me`.
pub async fn get_me_handler(
    Extension(state): Extension<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<AccountView>, ServiceError> {
    state.service.get_by_token(&ctx).await.map(Json)
}

/// Handler for `DELETE /api/me`.
pub async fn delete_me_handler(
    Extension(state): Extension<Arc<AppState>>,
    ctx: RequestContext,
    JsonBody(body): JsonBody<DeleteAccountRequest>,
) -> Result<Json<StatusResponse>, ServiceError> {
    state
        .service
        .delete_account(&ctx, &body.password, &body.confirmation)
        .await
        .map(Json)
}

/// Handler for `PUT /api/me/username`.
pub async fn change_username_handler(
    Extension(state): Extension<Arc<AppState>>,
    ctx: RequestContext,
    JsonBody(body): JsonBody<ChangeUsernameRequest>,
) -> Result<Json<AccountView>, ServiceError> {
    state
        .service
        .change_username(&ctx, &body.username)
        .await
        .map(Json)
}

/// Handler for `PUT /api/me/password`.
pub async fn change_password_handler(
    Extension(state): Extension<Arc<AppState>>,
    ctx: RequestContext,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<Json<StatusResponse>, ServiceError> {
    state
        .service
        .change_password(&ctx, &body.password)
        .await
        .map(Json)
}

/// Handler for `POST /api/me/verification-code`.
pub async fn issue_code_handler(
    Extension(state): Extension<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<StatusResponse>, ServiceError> {
    state.service.issue_verification_code(&ctx).await.map(Json)
}

/// Handler for `POST /api/me/password/reset`.
pub async fn reset_password_handler(
    Extension(state): Extension<Arc<AppState>>,
    ctx: RequestContext,
    JsonBody(body): JsonBody<ResetPasswordRequest>,
) -> Result<Json<StatusResponse>, ServiceError> {
    state
        .service
        .reset_password(&ctx, body.verification_code, &body.new_password)
        .await
        .map(Json)
}

/// Handler for `DELETE /internal/accounts`.
pub async fn delete_all_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<StatusResponse>, ServiceError> {
    state.service.delete_all().await.map(Json)
}
