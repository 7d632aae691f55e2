//! Route guard checking the caller's bearer token against a [`Requirement`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use bookshelf_authz::{Authz, Requirement};

use crate::error::AppError;

const UNAUTHENTICATED: &str = "Please authenticate";

/// State handed to [`authorize`] for one route.
#[derive(Clone)]
pub struct Guard {
    authz: Arc<Authz>,
    requirement: Requirement,
}

impl Guard {
    pub fn new(authz: Arc<Authz>, requirement: Requirement) -> Self {
        Self { authz, requirement }
    }
}

/// Middleware for `middleware::from_fn_with_state(guard, authorize)`.
///
/// Missing or bad credentials give 401, insufficient rights give 403. On
/// success the resolved [`bookshelf_authz::Principal`] is stored in the
/// request extensions for handlers.
pub async fn authorize(
    State(guard): State<Guard>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token =
        bearer_token(request.headers()).ok_or_else(|| AppError::unauthorized(UNAUTHENTICATED))?;

    let principal = guard.authz.authenticate(token).map_err(|err| {
        tracing::debug!(error = %err, "bearer token rejected");
        AppError::unauthorized(UNAUTHENTICATED)
    })?;

    if !principal.satisfies(&guard.requirement) {
        tracing::debug!(
            subject = %principal.subject,
            role = %principal.role,
            requirement = ?guard.requirement,
            "insufficient rights"
        );
        return Err(AppError::forbidden("Forbidden"));
    }

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Extension, Router,
    };
    use bookshelf_authz::{Claims, Principal};
    use time::Duration;
    use tower::ServiceExt;

    use super::*;

    fn authz() -> Arc<Authz> {
        let roles = HashMap::from([
            ("user".to_string(), vec![]),
            ("admin".to_string(), vec!["manageBooks".to_string()]),
        ]);
        Arc::new(Authz::new("guard-secret", &roles))
    }

    fn app(authz: Arc<Authz>) -> Router {
        let guard = Guard::new(authz, Requirement::AllOf(&["manageBooks"]));
        Router::new().route(
            "/",
            get(|Extension(p): Extension<Principal>| async move { p.subject })
                .route_layer(middleware::from_fn_with_state(guard, authorize)),
        )
    }

    async fn call(authz: Arc<Authz>, header: Option<String>) -> StatusCode {
        let mut request = Request::get("/");
        if let Some(value) = header {
            request = request.header(AUTHORIZATION, value);
        }
        app(authz)
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    fn token(authz: &Authz, role: &str) -> String {
        authz
            .sign(&Claims::access("u-1", role, Duration::minutes(5)))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        assert_eq!(call(authz(), None).await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn garbage_token_is_unauthorized() {
        let status = call(authz(), Some("Bearer nonsense".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let status = call(authz(), Some("Basic abc".into())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn role_without_right_is_forbidden() {
        let authz = authz();
        let header = format!("Bearer {}", token(&authz, "user"));
        assert_eq!(call(authz, Some(header)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn role_with_right_passes_principal_through() {
        let authz = authz();
        let header = format!("Bearer {}", token(&authz, "admin"));
        assert_eq!(call(authz, Some(header)).await, StatusCode::OK);
    }

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(AUTHORIZATION, "Bearer ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
