//! HTTP front end: `POST /setup` commits the form, every other path renders it.

use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::page;
use crate::probe;
use crate::setup::SetupRequest;
use crate::state::AppState;

/// Fields posted by the setup form.
#[derive(Debug, Deserialize)]
struct SetupForm {
    #[serde(default)]
    hostname: String,
    /// `"true"` when the checkbox is ticked, absent otherwise.
    #[serde(default)]
    vhost: Option<String>,
    #[serde(default)]
    key: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/setup", post(handle_setup).fallback(method_not_allowed))
        .fallback(handle_root)
        .with_state(state)
}

async fn handle_root(State(state): State<Arc<AppState>>) -> Html<String> {
    let controller = &state.controller;
    let settings = controller.settings();
    debug!(state = %controller.state(), "rendering setup form");

    let admin_key = probe::resolve_admin_key(&settings.paths).unwrap_or_else(|e| {
        warn!(error = %e, "no default admin key");
        String::new()
    });

    let hostname = probe::resolve_hostname(settings).await.unwrap_or_else(|e| {
        warn!(error = %e, "could not determine hostname");
        String::new()
    });

    Html(page::render(state.version, &admin_key, &hostname))
}

async fn handle_setup(
    State(state): State<Arc<AppState>>,
    form: Result<Form<SetupForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(reason = %rejection, "unreadable setup form");
            return (StatusCode::INTERNAL_SERVER_ERROR, rejection.body_text()).into_response();
        }
    };

    let use_vhost = form.vhost.as_deref() == Some("true");
    let request = match SetupRequest::new(&form.hostname, use_vhost, &form.key) {
        Ok(r) => r,
        Err(e) => {
            warn!(reason = %e, "setup rejected");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    let controller = state.controller.clone();
    match tokio::task::spawn_blocking(move || controller.submit(&request)).await {
        Ok(Ok(next)) => {
            info!(state = %next, "setup accepted");
            StatusCode::OK.into_response()
        }
        Ok(Err(e)) => {
            error!(error = %e, "setup failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "setup task panicked");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn method_not_allowed() -> (StatusCode, &'static str) {
    (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}
