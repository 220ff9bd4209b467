use std::sync::Arc;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use super::jwt::{verify_jwt_session, SessionData};

#[derive(Debug)]
pub struct Unauthorized;

impl reject::Reject for Unauthorized {}

/// Token of an `Authorization: Bearer <token>` (or `Token <token>`) header.
pub fn bearer_token(header: &str) -> Option<&str> {
    let header = header.trim();
    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("Token "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn resolve(header: Option<String>, secret: &str) -> Result<Option<SessionData>, Rejection> {
    match header {
        None => Ok(None),
        Some(header) => bearer_token(&header)
            .and_then(|token| verify_jwt_session(token, secret).ok())
            .map(|session| Some(session.into()))
            .ok_or_else(|| reject::custom(Unauthorized)),
    }
}

/// Requires a valid session.
pub fn with_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move {
            match resolve(header, &secret)? {
                Some(session) => Ok(session),
                None => Err(reject::custom(Unauthorized)),
            }
        }
    })
}

/// Anonymous requests pass through as `None`; a present but invalid token is still rejected.
pub fn with_possible_session(
    secret: Arc<str>,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(move |header: Option<String>| {
        let secret = secret.clone();
        async move { resolve(header, &secret) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Token abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("Basic dXNlcg=="), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
