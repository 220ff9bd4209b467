use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use potion::HtmlError;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::constants::SESSION_LIFETIME_HOURS;
use crate::error::PermissionDenied;
use crate::schema::{UserRole, Uuid};

use super::permissions::ActionType;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, username: String, role: UserRole) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + Duration::hours(SESSION_LIFETIME_HOURS)).timestamp();

        Self {
            user_id: id,
            username,
            role,
            iat,
            exp,
        }
    }
}

/// Authenticated requester.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
}

impl SessionData {
    pub fn authenticate(&self, action: ActionType) -> Result<(), potion::Error> {
        if !action.authenticate(self) {
            return Err(PermissionDenied::default().into());
        }
        Ok(())
    }

    /// Owner-or-admin check for objects authored by `author_id`.
    pub fn authenticate_owner(
        &self,
        author_id: Uuid,
        own: ActionType,
        all: ActionType,
    ) -> Result<(), potion::Error> {
        self.authenticate(own)?;
        if author_id == self.user_id || all.authenticate(self) {
            return Ok(());
        }
        Err(PermissionDenied::default().into())
    }
}

impl From<JwtSessionData> for SessionData {
    fn from(session: JwtSessionData) -> Self {
        SessionData {
            username: session.username,
            user_id: session.user_id,
            role: session.role,
        }
    }
}

fn signing_key(secret: &str) -> Result<Hmac<Sha256>, potion::Error> {
    Hmac::new_from_slice(secret.as_bytes()).map_err(|e| {
        log::error!("Invalid signing key: {e}");
        HtmlError::InternalServerError.new("Invalid signing key")
    })
}

pub fn sign_jwt_session(claims: &JwtSessionData, secret: &str) -> Result<String, potion::Error> {
    let key = signing_key(secret)?;

    claims.sign_with_key(&key).map_err(|e| {
        log::error!("Could not sign session: {e}");
        HtmlError::InternalServerError.new("Could not sign session")
    })
}

pub fn verify_jwt_session(token: &str, secret: &str) -> Result<JwtSessionData, potion::Error> {
    let key = signing_key(secret)?;

    let session: JwtSessionData = token
        .verify_with_key(&key)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid Session; Invalid token"))?;

    let now = Local::now().timestamp();
    if (session.exp - now).is_negative() {
        return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
    }

    Ok(session)
}
