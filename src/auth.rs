use std::{collections::HashMap, convert::Infallible, sync::Arc};

use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::{error::LinkError, handler::AppError};

/// The authenticated caller, resolved once at the HTTP boundary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

// Store your API keys
#[derive(Clone, Default)]
pub struct ApiKeys {
    keys: Arc<HashMap<String, Identity>>,
}

impl ApiKeys {
    /// Parses `id:email:key` entries separated by commas. Malformed entries are skipped.
    pub fn new(keys: &str) -> Self {
        let keys: HashMap<String, Identity> = keys
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|entry| {
                let mut parts = entry.splitn(3, ':');
                match (parts.next(), parts.next(), parts.next()) {
                    (Some(id), Some(email), Some(key))
                        if !id.is_empty() && !key.is_empty() =>
                    {
                        Some((
                            key.to_string(),
                            Identity {
                                id: id.to_string(),
                                email: email.to_string(),
                            },
                        ))
                    }
                    _ => {
                        warn!("ignoring malformed key entry");
                        None
                    }
                }
            })
            .collect();

        info!("keys configured: {}", keys.len());

        Self {
            keys: Arc::new(keys),
        }
    }

    /// Returns the identity behind a credential, `None` if it is unknown.
    pub fn identify(&self, key: &str) -> Option<Identity> {
        self.keys.get(key).cloned()
    }
}

/// Attaches the caller's [`Identity`] to the request.
///
/// A request without credentials passes through anonymously; a request with an
/// unknown credential is rejected.
pub async fn identify(
    State(api_keys): State<ApiKeys>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v).trim());

    match auth_header {
        None => Ok(next.run(request).await),
        Some(key) => match api_keys.identify(key) {
            Some(identity) => {
                request.extensions_mut().insert(identity);
                Ok(next.run(request).await)
            }
            None => Err(LinkError::Unauthorized.into()),
        },
    }
}

/// Extracts the identity attached by [`identify`], if any.
#[derive(Clone, Debug)]
pub struct Caller(pub Option<Identity>);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Identity>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys() {
        let keys = ApiKeys::new("u1:alice@example.com:secret1, u2:bob@example.com:s:2,broken,");

        assert_eq!(
            keys.identify("secret1"),
            Some(Identity {
                id: String::from("u1"),
                email: String::from("alice@example.com"),
            })
        );
        assert_eq!(keys.identify("s:2").map(|i| i.id), Some(String::from("u2")));
        assert_eq!(keys.identify("broken"), None);
        assert_eq!(keys.identify(""), None);
    }

    #[test]
    fn test_empty_config_has_no_keys() {
        let keys = ApiKeys::new("");

        assert_eq!(keys.identify(""), None);
    }
}
