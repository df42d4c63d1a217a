use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::Row;
use time::{Duration, OffsetDateTime};

use crate::app::users::{user_from_row, USER_COLUMNS};
use crate::domain::user::User;
use crate::infra::db::Db;

/// Cookie carrying the opaque session token.
pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone)]
pub struct AuthService {
    db: Db,
    session_ttl_days: i64,
}

impl AuthService {
    pub fn new(db: Db, session_ttl_days: i64) -> Self {
        Self {
            db,
            session_ttl_days,
        }
    }

    /// Creates the account. `None` means the username is taken.
    pub async fn signup(&self, new_user: NewUser) -> Result<Option<User>> {
        let password_hash = hash_password(&new_user.password)?;
        let sql = format!(
            "INSERT INTO users (username, first_name, last_name, email, password_hash, date_joined) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {}",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(&new_user.username)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(&new_user.email)
            .bind(password_hash)
            .bind(OffsetDateTime::now_utc())
            .fetch_one(self.db.pool())
            .await;

        match row {
            Ok(row) => Ok(Some(user_from_row(&row)?)),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Option<User>> {
        let sql = format!(
            "SELECT {}, password_hash FROM users WHERE username = ?",
            USER_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let password_hash: String = row.get("password_hash");
        if password_hash.is_empty() {
            return Ok(None);
        }

        if !verify_password(password, &password_hash)? {
            return Ok(None);
        }

        Ok(Some(user_from_row(&row)?))
    }

    /// Opens a session and returns the raw token for the cookie. Only its hash is stored.
    /// Expired rows from any user are swept first.
    pub async fn start_session(&self, user_id: i64) -> Result<String> {
        // julianday: the stored RFC 3339 text does not compare as a string.
        let purged = sqlx::query(
            "DELETE FROM sessions WHERE julianday(expires_at) <= julianday('now')",
        )
        .execute(self.db.pool())
        .await?
        .rows_affected();
        if purged > 0 {
            tracing::debug!(purged, "removed expired sessions");
        }

        let mut raw = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);

        let now = OffsetDateTime::now_utc();
        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(now)
        .bind(now + Duration::days(self.session_ttl_days))
        .execute(self.db.pool())
        .await?;

        Ok(token)
    }

    pub async fn authenticate_session(&self, token: &str) -> Result<Option<User>> {
        let token_hash = hash_token(token);
        let sql = format!(
            "SELECT u.{}, s.expires_at \
             FROM sessions s JOIN users u ON u.id = s.user_id \
             WHERE s.token_hash = ?",
            USER_COLUMNS.replace(", ", ", u.")
        );
        let row = sqlx::query(&sql)
            .bind(&token_hash)
            .fetch_optional(self.db.pool())
            .await?;

        let row = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let expires_at: OffsetDateTime = row.try_get("expires_at")?;
        if expires_at <= OffsetDateTime::now_utc() {
            sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
                .bind(&token_hash)
                .execute(self.db.pool())
                .await?;
            return Ok(None);
        }

        Ok(Some(user_from_row(&row)?))
    }

    pub async fn end_session(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn token_hash_is_hex_sha256() {
        let hashed = hash_token("abc");
        assert_eq!(hashed.len(), 64);
        assert_eq!(
            hashed,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
