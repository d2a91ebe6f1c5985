//! Caller identity extraction.
//!
//! Token introspection happens in front of this service. By the time a
//! request arrives, the fronting layer has put the caller's effective identity
//! in `X-Caller-Identity` and any linked identities, comma-separated, in
//! `X-Caller-Identities`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use whattime_core::Caller;

use crate::error::AppError;

pub const CALLER_IDENTITY_HEADER: &str = "x-caller-identity";
pub const CALLER_IDENTITIES_HEADER: &str = "x-caller-identities";

/// Extractor yielding the authenticated [`Caller`]. Rejects with 401 when
/// no effective identity is present.
#[derive(Debug, Clone)]
pub struct AuthedCaller(pub Caller);

impl<S> FromRequestParts<S> for AuthedCaller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let effective = parts
            .headers
            .get(CALLER_IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::unauthorized("missing caller identity"))?;

        let linked = parts
            .headers
            .get_all(CALLER_IDENTITIES_HEADER)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(str::to_string)
            .collect::<Vec<_>>();

        Ok(Self(Caller::new(effective).with_linked(linked)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    async fn extract(req: Request<()>) -> Result<AuthedCaller, AppError> {
        let (mut parts, _) = req.into_parts();
        AuthedCaller::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_effective_and_linked_identities() {
        let req = Request::builder()
            .header(CALLER_IDENTITY_HEADER, "alice")
            .header(CALLER_IDENTITIES_HEADER, "alice@lab, group:ops")
            .body(())
            .unwrap();
        let AuthedCaller(caller) = extract(req).await.unwrap();
        assert_eq!(caller.effective_identity, "alice");
        assert_eq!(
            caller.identities.into_iter().collect::<Vec<_>>(),
            vec!["alice", "alice@lab", "group:ops"]
        );
    }

    #[tokio::test]
    async fn missing_identity_is_401() {
        let req = Request::builder().body(()).unwrap();
        let err = extract(req).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn blank_identity_is_401() {
        let req = Request::builder()
            .header(CALLER_IDENTITY_HEADER, "  ")
            .body(())
            .unwrap();
        assert!(extract(req).await.is_err());
    }
}
