//! Caller identity forwarded by the upstream gateway.
//!
//! Authentication happens before requests reach this service; the gateway
//! passes the user name along in `X-User-Preferred-Username`. It is only used
//! for logging, so a missing header is never rejected.

use axum::{extract::FromRequestParts, http::request::Parts};
use std::{convert::Infallible, fmt};

pub const USER_HEADER: &str = "x-user-preferred-username";

const UNKNOWN_USER: &str = "unknown";

#[derive(Debug, Clone)]
pub struct Caller(Option<String>);

impl Caller {
    pub fn name(&self) -> &str {
        self.0.as_deref().unwrap_or(UNKNOWN_USER)
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let name = parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Self(name))
    }
}
