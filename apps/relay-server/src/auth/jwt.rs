//! HS256 client token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::error::RelayError;

use super::{Claims, TokenValidator};

/// Validates tokens signed with the shared application secret.
///
/// Checks the signature and `exp`; audience and issuer are not enforced.
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_aud = false;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

impl TokenValidator for JwtValidator {
    fn validate_token(&self, token: &str) -> Result<Claims, RelayError> {
        jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| RelayError::Authentication(e.to_string()))
    }
}
