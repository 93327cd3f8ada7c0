//! Per-request identity.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::domain::value_objects::Identity;
use crate::{Result, StoreError};

/// Authenticated user id, set by the upstream auth proxy.
pub const USER_HEADER: &str = "x-user-id";
/// Anonymous session token. Minted by the router when the client sends none.
pub const SESSION_HEADER: &str = "x-session-id";

const MAX_SESSION_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub identity: Identity,
    pub session: String,
}

impl RequestContext {
    pub fn require_user(&self) -> Result<Uuid> { self.identity.user_id().ok_or(StoreError::Unauthenticated) }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>> {
    match parts.headers.get(name) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(|v| Some(v.trim()).filter(|v| !v.is_empty()))
            .map_err(|_| StoreError::BadRequest(format!("{name} header is not valid text"))),
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = StoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let session = header(parts, SESSION_HEADER)?
            .ok_or_else(|| StoreError::BadRequest(format!("missing {SESSION_HEADER} header")))?;
        if session.len() > MAX_SESSION_LEN {
            return Err(StoreError::BadRequest(format!("{SESSION_HEADER} header is too long")));
        }
        let session = session.to_string();
        let identity = match header(parts, USER_HEADER)? {
            Some(raw) => Identity::User(
                Uuid::parse_str(raw).map_err(|_| StoreError::BadRequest(format!("{USER_HEADER} must be a UUID")))?,
            ),
            None => Identity::Guest(session.clone()),
        };
        Ok(Self { identity, session })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(headers: &[(&str, &str)]) -> Result<RequestContext> {
        let mut builder = Request::builder().uri("/");
        for (k, v) in headers { builder = builder.header(*k, *v); }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        RequestContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_guest_and_user_identity() {
        let guest = extract(&[(SESSION_HEADER, "abc")]).await.unwrap();
        assert_eq!(guest.identity, Identity::Guest("abc".into()));

        let id = Uuid::now_v7();
        let user = extract(&[(SESSION_HEADER, "abc"), (USER_HEADER, &id.to_string())]).await.unwrap();
        assert_eq!(user.identity, Identity::User(id));
        assert_eq!(user.require_user().unwrap(), id);
        assert!(matches!(guest.require_user(), Err(StoreError::Unauthenticated)));
    }

    #[tokio::test]
    async fn test_malformed_headers_are_bad_requests() {
        assert!(matches!(extract(&[(SESSION_HEADER, "abc"), (USER_HEADER, "root")]).await, Err(StoreError::BadRequest(_))));
        assert!(matches!(extract(&[]).await, Err(StoreError::BadRequest(_))));
        let long = "x".repeat(200);
        assert!(matches!(extract(&[(SESSION_HEADER, long.as_str())]).await, Err(StoreError::BadRequest(_))));
    }
}
