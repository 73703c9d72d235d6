// Request principal - the opaque identity of the current requester.
// Session handling lives in an upstream auth layer; it forwards the
// authenticated user id in the `x-user-id` header, which this middleware
// resolves against the store and injects into request extensions.
// Handlers only ever see the Principal, never session internals.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::app_state::AppState;

#[derive(Debug, Clone)]
pub enum Principal {
    Anonymous,
    User { id: i64, username: String },
}

impl Principal {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Principal::User { .. })
    }

    pub fn id(&self) -> Option<i64> {
        match self {
            Principal::Anonymous => None,
            Principal::User { id, .. } => Some(*id),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::User { username, .. } => Some(username.as_str()),
        }
    }
}

/// Resolves the principal for this request and stores it in extensions.
pub async fn resolve_principal(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let request_id = format!("req-{}", Uuid::new_v4());

    let principal = match forwarded_user_id(request.headers()) {
        Some(user_id) => match state.store.get_user(user_id).await {
            Ok(Some(user)) => Principal::User {
                id: user.id,
                username: user.username,
            },
            // Unknown ids degrade to anonymous rather than erroring.
            Ok(None) => Principal::Anonymous,
            Err(err) => {
                tracing::error!(%request_id, "principal lookup failed: {}", err);
                return Err(StatusCode::INTERNAL_SERVER_ERROR);
            }
        },
        None => Principal::Anonymous,
    };

    tracing::debug!(
        %request_id,
        authenticated = principal.is_authenticated(),
        "resolved principal"
    );

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn forwarded_user_id(headers: &HeaderMap) -> Option<i64> {
    headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.parse().ok())
}
