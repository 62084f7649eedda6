use crate::{
    app::App,
    auth::Caller,
    db::DbError,
    error::LinkError,
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use std::sync::Arc;
use tinylink_rs::{CreateLinkRequest, ErrorResponse};
use tracing::{error, info, warn};

// Wraps the engine error so it can be turned into a response.
pub struct AppError(LinkError);

// Internal detail never reaches the client.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            LinkError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            LinkError::Unauthorized => (StatusCode::UNAUTHORIZED, self.0.to_string()),
            LinkError::Forbidden => (StatusCode::FORBIDDEN, self.0.to_string()),
            LinkError::NotFound | LinkError::Store(DbError::NotFound) => {
                (StatusCode::NOT_FOUND, LinkError::NotFound.to_string())
            }
            LinkError::AllocationExhausted { .. } | LinkError::Store(_) => {
                error!("request failed: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    String::from("Something went wrong"),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<LinkError> for AppError {
    fn from(err: LinkError) -> Self {
        Self(err)
    }
}

pub async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "revision": option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
    }))
}

pub async fn handle_redirect(
    Path(code): Path<String>,
    State(app): State<Arc<App>>,
) -> Result<impl IntoResponse, AppError> {
    info!("handle_redirect: {}", code);

    let url = app.redirect(&code).await?;

    Ok(Redirect::temporary(&url))
}

pub async fn handle_create(
    Caller(caller): Caller,
    State(app): State<Arc<App>>,
    payload: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(create) = payload.map_err(|rejection| {
        warn!("handle_create: rejected body: {rejection}");
        LinkError::Validation(String::from("Invalid request body"))
    })?;

    info!("handle_create: {:?}", create.url);

    Ok(Json(app.create_link(caller.as_ref(), create).await?))
}

pub async fn handle_list(
    Caller(caller): Caller,
    State(app): State<Arc<App>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(app.list_links(caller.as_ref()).await?))
}

pub async fn handle_stats(
    Caller(caller): Caller,
    Path(code): Path<String>,
    State(app): State<Arc<App>>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(app.link_stats(&code, caller.as_ref()).await?))
}

pub async fn handle_delete(
    Caller(caller): Caller,
    Path(code): Path<String>,
    State(app): State<Arc<App>>,
) -> Result<impl IntoResponse, AppError> {
    info!("handle_delete: {}", code);

    app.delete_link(&code, caller.as_ref()).await?;

    Ok(Json(json!({ "ok": true })))
}

pub async fn handle_me(Caller(caller): Caller) -> Json<serde_json::Value> {
    Json(json!({ "user": caller }))
}
