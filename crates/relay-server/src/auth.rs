use std::sync::Arc;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;

use crate::config::AccessPolicy;

/// Pass/fail decision on an inbound completion request.
pub trait Authorizer: Send + Sync {
    fn authorize(&self, headers: &HeaderMap) -> bool;
}

/// Accepts requests carrying `Authorization: Bearer <token>`.
pub struct BearerTokenAuthorizer {
    token: String,
}

impl BearerTokenAuthorizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Authorizer for BearerTokenAuthorizer {
    fn authorize(&self, headers: &HeaderMap) -> bool {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|presented| presented.trim() == self.token)
    }
}

/// Accepts every request.
pub struct AllowAnonymous;

impl Authorizer for AllowAnonymous {
    fn authorize(&self, _headers: &HeaderMap) -> bool {
        true
    }
}

impl From<&AccessPolicy> for Arc<dyn Authorizer> {
    fn from(policy: &AccessPolicy) -> Self {
        match policy {
            AccessPolicy::BearerToken(token) => Arc::new(BearerTokenAuthorizer::new(token.clone())),
            AccessPolicy::Anonymous => Arc::new(AllowAnonymous),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(auth));
        headers
    }

    #[test]
    fn bearer_token_must_match_exactly() {
        let auth = BearerTokenAuthorizer::new("s3cret");
        assert!(auth.authorize(&headers("Bearer s3cret")));
        assert!(!auth.authorize(&headers("Bearer s3cret2")));
        assert!(!auth.authorize(&headers("Basic s3cret")));
        assert!(!auth.authorize(&HeaderMap::new()));
    }

    #[test]
    fn anonymous_policy_accepts_missing_header() {
        let auth: Arc<dyn Authorizer> = (&AccessPolicy::Anonymous).into();
        assert!(auth.authorize(&HeaderMap::new()));
    }
}
