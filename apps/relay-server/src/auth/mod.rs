pub mod jwt;
pub mod middleware;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RelayError;

pub use jwt::JwtValidator;

/// Claims carried by client tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id; the issuing application may encode it as a string or a number.
    pub sub: Value,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: String,
    pub username: String,
    pub email: String,
}

/// Validates client tokens for the `authenticate` action.
pub trait TokenValidator: Send + Sync {
    fn validate_token(&self, token: &str) -> Result<Claims, RelayError>;

    fn extract_user_info(&self, claims: &Claims) -> UserInfo {
        let user_id = match &claims.sub {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        UserInfo {
            user_id,
            username: claims
                .username
                .clone()
                .or_else(|| claims.name.clone())
                .unwrap_or_default(),
            email: claims.email.clone().unwrap_or_default(),
        }
    }
}
