//! Credential store for admin users.
//!
//! Users live in a single `users.json` under the data root. Passwords are
//! stored as argon2id PHC strings and verified with constant-time comparison
//! via the argon2 crate. Authentication answers a plain yes/no; callers that
//! need anti-enumeration semantics collapse every failure into one message.

use anyhow::{Result, anyhow, Context};
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use password_hash::{SaltString, PasswordHash};
use chrono::{DateTime, Utc};

/// Typed failures from the credential store. Carried through anyhow so
/// callers can downcast instead of matching on message text.
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("user already exists: {0}")]
    UserExists(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

fn users_path(data_root: &str) -> PathBuf { Path::new(data_root).join("users.json") }

fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

fn read_users(path: &Path) -> Result<Vec<UserRecord>> {
    if !path.exists() { return Ok(Vec::new()); }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading user store at {}", path.display()))?;
    let users: Vec<UserRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing user store at {}", path.display()))?;
    Ok(users)
}

fn write_users(path: &Path, users: &[UserRecord]) -> Result<()> {
    if let Some(dir) = path.parent() { std::fs::create_dir_all(dir).ok(); }
    let raw = serde_json::to_string_pretty(users)?;
    std::fs::write(path, raw)
        .with_context(|| format!("writing user store at {}", path.display()))?;
    Ok(())
}

/// Register a new user. Emails are compared case-insensitively; registering an
/// already-known email is a conflict, reported as an error.
pub fn add_user(data_root: &str, email: &str, password: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() { return Err(SecurityError::EmptyEmail.into()); }
    if password.is_empty() { return Err(SecurityError::EmptyPassword.into()); }
    let p = users_path(data_root);
    let mut users = read_users(&p)?;
    if users.iter().any(|u| u.email.eq_ignore_ascii_case(email)) {
        return Err(SecurityError::UserExists(email.to_string()).into());
    }
    let hash = hash_password(password)?;
    users.push(UserRecord {
        email: email.to_string(),
        password_hash: hash,
        created_at: Utc::now(),
    });
    write_users(&p, &users)
}

pub fn delete_user(data_root: &str, email: &str) -> Result<()> {
    let p = users_path(data_root);
    let mut users = read_users(&p)?;
    users.retain(|u| !u.email.eq_ignore_ascii_case(email));
    write_users(&p, &users)
}

/// Verify a credential pair against the user store. Unknown emails and wrong
/// passwords both return Ok(false); only store corruption surfaces as Err.
pub fn authenticate(data_root: &str, email: &str, password: &str) -> Result<bool> {
    let p = users_path(data_root);
    let users = read_users(&p)?;
    for u in &users {
        if u.email.eq_ignore_ascii_case(email.trim()) {
            return Ok(verify_password(&u.password_hash, password));
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_then_authenticate() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        add_user(root, "admin@vhf.com", "s3cret").unwrap();
        assert!(authenticate(root, "admin@vhf.com", "s3cret").unwrap());
        assert!(!authenticate(root, "admin@vhf.com", "wrong").unwrap());
        assert!(!authenticate(root, "nobody@vhf.com", "s3cret").unwrap());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        add_user(root, "admin@vhf.com", "one").unwrap();
        let err = add_user(root, "ADMIN@vhf.com", "two").unwrap_err();
        assert!(matches!(err.downcast_ref::<SecurityError>(), Some(SecurityError::UserExists(_))));
    }

    #[test]
    fn delete_removes_credentials() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        add_user(root, "admin@vhf.com", "s3cret").unwrap();
        delete_user(root, "admin@vhf.com").unwrap();
        assert!(!authenticate(root, "admin@vhf.com", "s3cret").unwrap());
    }

    #[test]
    fn empty_credentials_are_rejected() {
        let tmp = tempdir().unwrap();
        let root = tmp.path().to_str().unwrap();
        let err = add_user(root, "", "pw").unwrap_err();
        assert!(matches!(err.downcast_ref::<SecurityError>(), Some(SecurityError::EmptyEmail)));
        let err = add_user(root, "a@b.com", "").unwrap_err();
        assert!(matches!(err.downcast_ref::<SecurityError>(), Some(SecurityError::EmptyPassword)));
    }
}
