//! Bearer credential verification
//!
//! Tokens are never stored in the clear: the configuration carries
//! `(user_id, sha256 hex digest)` pairs and presented tokens are hashed
//! before lookup.

use std::collections::HashMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};

/// Identity resolved from a bearer credential
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: String,
}

/// Seam between the endpoint and the identity provider
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser>;
}

/// Verifier over a configured digest table
pub struct StaticTokenVerifier {
    /// sha256 hex digest -> user id
    by_digest: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: &[(String, String)]) -> Self {
        let by_digest = tokens
            .iter()
            .map(|(user_id, digest)| (digest.to_ascii_lowercase(), user_id.clone()))
            .collect();
        Self { by_digest }
    }

    pub fn digest(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser> {
        let digest = Self::digest(token);
        self.by_digest
            .get(&digest)
            .map(|user_id| AuthenticatedUser {
                user_id: user_id.clone(),
            })
            .ok_or_else(|| AppError::Auth("Invalid authentication token".to_string()))
    }
}
