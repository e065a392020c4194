use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::require_text;
use crate::db::UserStore;
use crate::error::Result;
use crate::models::{User, MAX_USERNAME_LEN};

/// SHA-256 hex digest stored in place of the raw key
pub fn hash_api_key(api_key: &str) -> String {
    hex::encode(Sha256::digest(api_key.as_bytes()))
}

/// Fresh random key, 32 bytes hex-encoded
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Resolves callers from their API key
#[derive(Clone)]
pub struct IdentityService {
    users: Arc<dyn UserStore>,
}

impl IdentityService {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn resolve(&self, api_key: &str) -> Result<Option<User>> {
        self.users.find_by_api_key_hash(&hash_api_key(api_key)).await
    }

    /// Create a user and return it with its raw key; only the hash is persisted
    pub async fn register(&self, username: &str) -> Result<(User, String)> {
        let username = require_text("username", username, MAX_USERNAME_LEN)?;
        let api_key = generate_api_key();
        let user = self
            .users
            .create_user(&username, &hash_api_key(&api_key))
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok((user, api_key))
    }
}
