use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use argon2::{Config, Variant, Version};
use data_encoding::BASE64URL_NOPAD;
use rand::Rng;
use rocket::{serde::json::serde_json, tokio};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

// 16 bytes is recommended for password hashing:
//  https://en.wikipedia.org/wiki/Argon2
const SALT_LEN: usize = 16;

/// Length of `bytes` once encoded as unpadded base64, as in a PHC string.
fn unpadded_base64_len(bytes: usize) -> usize {
    (bytes * 4 + 2) / 3
}

/// The exact shape that gets hashed into a token.
///
/// Field order is part of the token format: reordering these fields makes
/// every previously issued token unverifiable.
#[derive(Serialize)]
struct TokenPayload<'a> {
    id: String,
    user_id: &'a str,
    secret: &'a str,
}

impl<'a> TokenPayload<'a> {
    fn to_bytes(question_id: Id, user_id: &'a str, secret: &'a str) -> Result<Vec<u8>> {
        let payload = Self {
            id: question_id.to_hex(),
            user_id,
            secret,
        };
        serde_json::to_vec(&payload)
            .map_err(|e| Error::Internal(format!("Failed to serialize token payload: {e}")))
    }
}

/// Cost parameters for the token hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCost {
    /// Memory cost in KiB.
    pub mem_cost: u32,
    /// Number of passes.
    pub time_cost: u32,
}

impl Default for TokenCost {
    fn default() -> Self {
        Self {
            mem_cost: 4096,
            time_cost: 3,
        }
    }
}

struct Inner {
    secret: String,
    cost: TokenCost,
    verify_timeout: Duration,
}

/// Mints and checks capability tokens.
///
/// A token is the unpadded URL-safe base64 encoding of a salted Argon2 hash of
/// `{"id": question, "user_id": user, "secret": secret}`. Nothing is stored
/// server side: a token verifies iff it was minted for the same question and
/// user with the same secret. Tokens do not expire.
///
/// Cheap to clone; all clones share the same immutable secret.
#[derive(Clone)]
pub struct CapabilityTokens(Arc<Inner>);

impl Debug for CapabilityTokens {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityTokens")
            .field("secret", &"<redacted>")
            .field("cost", &self.0.cost)
            .field("verify_timeout", &self.0.verify_timeout)
            .finish()
    }
}

impl CapabilityTokens {
    pub fn new(secret: impl Into<String>, cost: TokenCost, verify_timeout: Duration) -> Self {
        Self(Arc::new(Inner {
            secret: secret.into(),
            cost,
            verify_timeout,
        }))
    }

    fn hash_config(&self) -> Config<'static> {
        Config {
            variant: Variant::Argon2id,
            version: Version::Version13,
            mem_cost: self.0.cost.mem_cost,
            time_cost: self.0.cost.time_cost,
            ..Config::default()
        }
    }

    /// Does this PHC string use exactly our variant, version, costs, salt
    /// length and hash length?
    fn has_configured_parameters(&self, encoded: &str) -> bool {
        let config = self.hash_config();
        let prefix = format!(
            "${}$v={}$m={},t={},p={}$",
            config.variant, config.version, config.mem_cost, config.time_cost, config.lanes
        );
        let Some(rest) = encoded.strip_prefix(&prefix) else {
            return false;
        };
        match rest.split_once('$') {
            Some((salt, hash)) => {
                salt.len() == unpadded_base64_len(SALT_LEN)
                    && hash.len() == unpadded_base64_len(config.hash_length as usize)
                    && !hash.contains('$')
            }
            None => false,
        }
    }

    /// Mint a token authorizing `user_id` to answer `question_id`.
    ///
    /// Each call uses a fresh salt, so two tokens for the same pair differ.
    /// This is CPU-bound; prefer [`Self::issue`] from async code.
    pub fn generate(&self, question_id: Id, user_id: &str) -> Result<String> {
        let payload = TokenPayload::to_bytes(question_id, user_id, &self.0.secret)?;

        let mut salt = [0_u8; SALT_LEN];
        rand::thread_rng().fill(&mut salt);
        let encoded = argon2::hash_encoded(&payload, &salt, &self.hash_config())?;

        Ok(BASE64URL_NOPAD.encode(encoded.as_bytes()))
    }

    /// Check that `token` was minted for exactly this question and user.
    /// This is CPU-bound; prefer [`Self::authorize`] from async code.
    pub fn verify(&self, token: &str, question_id: Id, user_id: &str) -> Result<()> {
        let malformed = || Error::Unauthorized("malformed token".to_string());

        let decoded = BASE64URL_NOPAD.decode(token.as_bytes()).map_err(|_| malformed())?;
        let encoded = String::from_utf8(decoded).map_err(|_| malformed())?;
        // The hash parameters travel inside the token, so only ever accept
        // exactly the configured ones.
        if !self.has_configured_parameters(&encoded) {
            return Err(malformed());
        }

        let payload = TokenPayload::to_bytes(question_id, user_id, &self.0.secret)?;
        match argon2::verify_encoded(&encoded, &payload) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::Unauthorized("invalid token".to_string())),
            Err(_) => Err(malformed()),
        }
    }

    /// [`Self::generate`] on the blocking thread pool.
    pub async fn issue(&self, question_id: Id, user_id: &str) -> Result<String> {
        let tokens = self.clone();
        let user_id = user_id.to_string();
        tokio::task::spawn_blocking(move || tokens.generate(question_id, &user_id))
            .await
            .map_err(|e| Error::Internal(format!("Token generation task failed: {e}")))?
    }

    /// [`Self::verify`] on the blocking thread pool, bounded by the configured
    /// deadline.
    ///
    /// If the deadline passes, or the returned future is dropped because the
    /// caller went away, the result of the hash is discarded.
    pub async fn authorize(&self, token: &str, question_id: Id, user_id: &str) -> Result<()> {
        let tokens = self.clone();
        let token = token.to_string();
        let user_id = user_id.to_string();
        let task = tokio::task::spawn_blocking(move || tokens.verify(&token, question_id, &user_id));

        match tokio::time::timeout(self.0.verify_timeout, task).await {
            Ok(joined) => joined
                .map_err(|e| Error::Internal(format!("Token verification task failed: {e}")))?,
            Err(_) => Err(Error::Internal(
                "Token verification timed out".to_string(),
            )),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let tokens = CapabilityTokens::example();
        let question = Id::new();

        let token = tokens.generate(question, "alice").unwrap();
        tokens.verify(&token, question, "alice").unwrap();
    }

    #[test]
    fn token_is_bound_to_user() {
        let tokens = CapabilityTokens::example();
        let question = Id::new();

        let token = tokens.generate(question, "alice").unwrap();
        let err = tokens.verify(&token, question, "bob").unwrap_err();
        assert!(matches!(err, Error::Unauthorized(msg) if msg == "invalid token"));
    }

    #[test]
    fn token_is_bound_to_question() {
        let tokens = CapabilityTokens::example();
        let question = Id::new();

        let token = tokens.generate(question, "alice").unwrap();
        assert!(matches!(
            tokens.verify(&token, Id::new(), "alice"),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn fresh_salt_each_time() {
        let tokens = CapabilityTokens::example();
        let question = Id::new();

        let first = tokens.generate(question, "alice").unwrap();
        let second = tokens.generate(question, "alice").unwrap();
        assert_ne!(first, second);
        tokens.verify(&first, question, "alice").unwrap();
        tokens.verify(&second, question, "alice").unwrap();
    }

    #[test]
    fn token_is_bound_to_secret() {
        let question = Id::new();
        let token = CapabilityTokens::example()
            .generate(question, "alice")
            .unwrap();

        let rotated = CapabilityTokens::example_with_secret("a brand new secret");
        assert!(matches!(
            rotated.verify(&token, question, "alice"),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn token_is_ascii_and_hides_secret() {
        let tokens = CapabilityTokens::example();
        let token = tokens.generate(Id::new(), "alice").unwrap();
        assert!(token.is_ascii());

        let decoded = String::from_utf8(BASE64URL_NOPAD.decode(token.as_bytes()).unwrap()).unwrap();
        assert!(decoded.starts_with("$argon2id$"));
        assert!(!decoded.contains("correct horse battery staple"));
        assert!(!format!("{tokens:?}").contains("correct horse battery staple"));
    }

    #[test]
    fn malformed_tokens_are_unauthorized() {
        let tokens = CapabilityTokens::example();
        let question = Id::new();

        for token in ["", "%%% not base64 %%%", "aGVsbG8gd29ybGQ="] {
            let err = tokens.verify(token, question, "alice").unwrap_err();
            assert!(matches!(err, Error::Unauthorized(msg) if msg == "malformed token"));
        }
    }

    #[test]
    fn payload_field_order_is_fixed() {
        let question = Id::new();
        let bytes = TokenPayload::to_bytes(question, "alice", "s3cret").unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            format!(
                r#"{{"id":"{}","user_id":"alice","secret":"s3cret"}}"#,
                question.to_hex()
            )
        );
    }

    /// Decode a token, apply `edit` to its PHC string, and encode it again.
    fn tamper(token: &str, edit: impl FnOnce(String) -> String) -> String {
        let encoded = String::from_utf8(BASE64URL_NOPAD.decode(token.as_bytes()).unwrap()).unwrap();
        BASE64URL_NOPAD.encode(edit(encoded).as_bytes())
    }

    #[test]
    fn token_cannot_choose_its_own_cost() {
        let tokens = CapabilityTokens::example();
        let question = Id::new();
        let token = tokens.generate(question, "alice").unwrap();

        for forged in [
            tamper(&token, |e| e.replace("m=1024,t=1", "m=4294967295,t=1")),
            tamper(&token, |e| e.replace("m=1024,t=1", "m=262144,t=20")),
            tamper(&token, |e| e.replace(",p=1$", ",p=4$")),
            tamper(&token, |e| e.replace("$argon2id$", "$argon2i$")),
            tamper(&token, |e| e.replace("$v=19$", "$v=16$")),
        ] {
            let err = tokens.verify(&forged, question, "alice").unwrap_err();
            assert!(matches!(err, Error::Unauthorized(msg) if msg == "malformed token"));
        }
    }

    #[test]
    fn token_cannot_choose_its_own_lengths() {
        let tokens = CapabilityTokens::example();
        let question = Id::new();
        let token = tokens.generate(question, "alice").unwrap();

        for forged in [
            // Longer digest.
            tamper(&token, |e| format!("{e}AAAA")),
            // Shorter salt.
            tamper(&token, |e| {
                let (head, hash) = e.rsplit_once('$').unwrap();
                let (params, salt) = head.rsplit_once('$').unwrap();
                format!("{params}${}${hash}", &salt[4..])
            }),
        ] {
            assert!(matches!(
                tokens.verify(&forged, question, "alice"),
                Err(Error::Unauthorized(_))
            ));
        }
        tokens.verify(&token, question, "alice").unwrap();
    }

    #[test]
    fn rotated_cost_rejects_old_tokens() {
        let question = Id::new();
        let token = CapabilityTokens::example()
            .generate(question, "alice")
            .unwrap();

        let heavier = CapabilityTokens::new(
            "correct horse battery staple",
            TokenCost {
                mem_cost: 2048,
                time_cost: 2,
            },
            Duration::from_secs(10),
        );
        assert!(matches!(
            heavier.verify(&token, question, "alice"),
            Err(Error::Unauthorized(_))
        ));
    }

    #[rocket::async_test]
    async fn slow_verification_times_out() {
        let tokens = CapabilityTokens::new(
            "correct horse battery staple",
            TokenCost {
                mem_cost: 8192,
                time_cost: 4,
            },
            Duration::from_millis(1),
        );
        let question = Id::new();
        let token = tokens.generate(question, "alice").unwrap();

        let err = tokens.authorize(&token, question, "alice").await.unwrap_err();
        assert!(matches!(err, Error::Internal(msg) if msg == "Token verification timed out"));
    }

    #[rocket::async_test]
    async fn async_wrappers_agree() {
        let tokens = CapabilityTokens::example();
        let question = Id::new();

        let token = tokens.issue(question, "alice").await.unwrap();
        tokens.authorize(&token, question, "alice").await.unwrap();
        assert!(tokens.authorize(&token, question, "mallory").await.is_err());
    }
}
