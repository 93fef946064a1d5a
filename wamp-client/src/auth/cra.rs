use anyhow::{
    Error,
    Result,
};
use base64::{
    Engine,
    prelude::BASE64_STANDARD,
};
use hmac::Mac;

use crate::{
    auth::{
        auth_method::AuthMethod,
        challenge::ChallengeHandler,
    },
    core::types::{
        Dictionary,
        Value,
    },
};

/// Default number of PBKDF2 iterations for salted secrets.
pub const DEFAULT_ITERATIONS: u32 = 1000;

/// Default derived key length, in bytes, for salted secrets.
pub const DEFAULT_KEY_LENGTH: usize = 32;

/// Signs a challenge with the given secret.
///
/// The signature is HMAC-SHA256 over the challenge, base64-encoded.
pub fn sign(secret: &[u8], challenge: &str) -> Result<String> {
    let mut mac = hmac::Hmac::<sha2::Sha256>::new_from_slice(secret)?;
    mac.update(challenge.as_bytes());
    Ok(BASE64_STANDARD.encode(mac.finalize().into_bytes()))
}

/// Derives the key for a salted secret using PBKDF2-HMAC-SHA256.
///
/// The derived key is base64-encoded and used as the signing secret.
pub fn derive_key(secret: &str, salt: &str, iterations: u32, key_length: usize) -> String {
    let mut key = vec![0u8; key_length];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(secret.as_bytes(), salt.as_bytes(), iterations, &mut key);
    BASE64_STANDARD.encode(key)
}

/// A [`ChallengeHandler`] for WAMP-CRA.
///
/// Salted challenges (those carrying `salt` in the challenge extra) are signed with the derived
/// key.
#[derive(Clone)]
pub struct CraChallengeHandler {
    secret: String,
}

impl CraChallengeHandler {
    pub fn new<S>(secret: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            secret: secret.into(),
        }
    }

    fn signing_key(&self, extra: &Dictionary) -> Result<String> {
        let salt = match extra.get("salt") {
            None => return Ok(self.secret.clone()),
            Some(salt) => salt
                .string()
                .ok_or_else(|| Error::msg("challenge salt must be a string"))?,
        };
        let iterations = match extra.get("iterations") {
            None => DEFAULT_ITERATIONS,
            Some(value) => value
                .integer()
                .and_then(|value| u32::try_from(value).ok())
                .ok_or_else(|| Error::msg("challenge iterations must be an integer"))?,
        };
        let key_length = match extra.get("keylen") {
            None => DEFAULT_KEY_LENGTH,
            Some(value) => value
                .integer()
                .and_then(|value| usize::try_from(value).ok())
                .ok_or_else(|| Error::msg("challenge keylen must be an integer"))?,
        };
        Ok(derive_key(&self.secret, salt, iterations, key_length))
    }
}

impl std::fmt::Debug for CraChallengeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CraChallengeHandler").finish_non_exhaustive()
    }
}

impl ChallengeHandler for CraChallengeHandler {
    fn handle_challenge(&self, auth_method: &str, extra: &Dictionary) -> Result<String> {
        if auth_method != AuthMethod::WampCra.name() {
            return Err(Error::msg(format!(
                "unsupported auth method: {auth_method}"
            )));
        }
        let challenge = match extra.get("challenge") {
            Some(Value::String(challenge)) => challenge,
            _ => return Err(Error::msg("challenge is missing")),
        };
        let key = self.signing_key(extra)?;
        sign(key.as_bytes(), challenge)
    }
}
