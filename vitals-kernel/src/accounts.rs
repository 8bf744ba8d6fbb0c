//! Comptes du personnel : hachage PBKDF2-SHA256 salé, vue publique sans secret.

use crate::store::UserRecord;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
const KEY_LENGTH: usize = 32;
const SALT_LENGTH: usize = 16;

#[derive(Debug, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct UserView {
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self { username: user.username, role: user.role }
    }
}

/// Format stocké : `pbkdf2-sha256$<iterations>$<salt b64>$<hash b64>`
pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut key = [0u8; KEY_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut key);

    format!("pbkdf2-sha256${iterations}${}${}", B64.encode(salt), B64.encode(key))
}

pub fn build_user(new_user: NewUser, iterations: u32) -> UserRecord {
    UserRecord {
        password_hash: hash_password(&new_user.password, iterations),
        username: new_user.username,
        role: new_user.role,
    }
}
