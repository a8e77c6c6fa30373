use serde::Serialize;
use sqlx::SqlitePool;
use time::Duration;
use tracing::instrument;

use crate::{db, ids::UserId, AppError, AppResult};

use super::{
    password::{hash_password, verify_password},
    SessionClaims,
};

/// A registered user as seen by the rest of the service. The password hash
/// never leaves this module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub nickname: String,
}

/// Repository for user identities and their password hashes.
pub struct CredentialStore<'a> {
    pool: &'a SqlitePool,
    bcrypt_cost: u32,
}

impl<'a> CredentialStore<'a> {
    pub fn new(pool: &'a SqlitePool, bcrypt_cost: u32) -> Self {
        Self { pool, bcrypt_cost }
    }

    #[instrument(skip(self, password), fields(user_id))]
    pub async fn register(&self, email: &str, nickname: &str, password: &str) -> AppResult<UserId> {
        let email = email.trim();
        let nickname = nickname.trim();
        if email.is_empty() || nickname.is_empty() || password.is_empty() {
            return Err(AppError::invalid("email, nickname and password are required"));
        }

        let password_hash = hash_password(password, self.bcrypt_cost).await?;
        let id = UserId::new();

        // UNIQUE(email) settles concurrent registrations
        sqlx::query("INSERT INTO users (id,email,nickname,password_hash) VALUES (?,?,?,?)")
            .bind(id)
            .bind(email)
            .bind(nickname)
            .bind(&password_hash)
            .execute(self.pool)
            .await
            .map_err(|err| {
                if db::is_unique_violation(&err) {
                    AppError::DuplicateEmail
                } else {
                    err.into()
                }
            })?;

        tracing::Span::current().record("user_id", tracing::field::display(id));
        tracing::info!("user registered");
        Ok(id)
    }

    /// Checks `password` and returns claims for a session of `lifetime`.
    #[instrument(skip(self, password, lifetime))]
    pub async fn authenticate(
        &self,
        email: &str,
        password: &str,
        lifetime: Duration,
    ) -> AppResult<SessionClaims> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AppError::invalid("email and password are required"));
        }

        let row: Option<(UserId, String, String)> =
            sqlx::query_as("SELECT id,nickname,password_hash FROM users WHERE email=?")
                .bind(email)
                .fetch_optional(self.pool)
                .await?;
        let Some((id, nickname, password_hash)) = row else {
            return Err(AppError::UserNotFound);
        };

        if !verify_password(password, &password_hash).await? {
            tracing::info!(user_id = %id, "wrong password");
            return Err(AppError::BadCredentials);
        }

        Ok(SessionClaims::new(id, nickname, email.to_owned(), lifetime))
    }

    pub async fn lookup_by_email(&self, email: &str) -> AppResult<User> {
        sqlx::query_as("SELECT id,email,nickname FROM users WHERE email=?")
            .bind(email.trim())
            .fetch_optional(self.pool)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    pub async fn lookup_by_id(&self, id: UserId) -> AppResult<User> {
        sqlx::query_as("SELECT id,email,nickname FROM users WHERE id=?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(AppError::UserNotFound)
    }

    pub async fn list_nicknames(&self) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT nickname FROM users ORDER BY nickname")
            .fetch_all(self.pool)
            .await?;
        Ok(rows.into_iter().map(|(nickname,)| nickname).collect())
    }

    pub async fn nickname(&self, id: UserId) -> AppResult<String> {
        let (nickname,): (String,) = sqlx::query_as("SELECT nickname FROM users WHERE id=?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(AppError::UserNotFound)?;
        Ok(nickname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn register_then_login() {
        let db = testing::database().await;
        let store = db.credentials();

        let id = store.register("a@x.com", "alice", "pw1").await.unwrap();
        let claims = store.authenticate("a@x.com", "pw1", Duration::hours(1)).await.unwrap();

        assert_eq!(claims.user_id, id);
        assert_eq!(claims.nickname, "alice");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.expires_at - claims.issued_at, 3600);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email() {
        let db = testing::database().await;
        let store = db.credentials();
        store.register("a@x.com", "alice", "pw1").await.unwrap();

        let wrong = store.authenticate("a@x.com", "wrong", Duration::hours(1)).await;
        assert!(matches!(wrong, Err(AppError::BadCredentials)));

        let unknown = store.authenticate("nobody@x.com", "pw1", Duration::hours(1)).await;
        assert!(matches!(unknown, Err(AppError::UserNotFound)));
    }

    #[tokio::test]
    async fn login_trims_email_before_validating() {
        let db = testing::database().await;
        let store = db.credentials();
        let id = store.register("a@x.com", "alice", "pw1").await.unwrap();

        let blank = store.authenticate("   ", "pw1", Duration::hours(1)).await;
        assert!(matches!(blank, Err(AppError::InvalidInput(_))));

        let padded = store.authenticate(" a@x.com ", "pw1", Duration::hours(1)).await.unwrap();
        assert_eq!(padded.user_id, id);
        assert_eq!(padded.email, "a@x.com");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let db = testing::database().await;
        let store = db.credentials();
        store.register("a@x.com", "alice", "pw1").await.unwrap();

        let again = store.register("a@x.com", "alice2", "pw2").await;
        assert!(matches!(again, Err(AppError::DuplicateEmail)));
    }

    #[tokio::test]
    async fn empty_fields_are_invalid() {
        let db = testing::database().await;
        let store = db.credentials();

        for (email, nickname, password) in [("", "a", "p"), ("a@x.com", " ", "p"), ("a@x.com", "a", "")] {
            let result = store.register(email, nickname, password).await;
            assert!(matches!(result, Err(AppError::InvalidInput(_))), "{email:?} {nickname:?} {password:?}");
        }
    }

    #[tokio::test]
    async fn stores_hash_not_plaintext() {
        let db = testing::database().await;
        let id = db.credentials().register("a@x.com", "alice", "pw1").await.unwrap();

        let (hash,): (String,) = sqlx::query_as("SELECT password_hash FROM users WHERE id=?")
            .bind(id)
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_ne!(hash, "pw1");
        assert!(bcrypt::verify("pw1", &hash).unwrap());
    }

    #[tokio::test]
    async fn read_accessors() {
        let db = testing::database().await;
        let store = db.credentials();
        let alice = store.register("a@x.com", "alice", "pw1").await.unwrap();
        store.register("b@x.com", "bob", "pw2").await.unwrap();

        assert_eq!(store.lookup_by_email("a@x.com").await.unwrap().id, alice);
        assert_eq!(store.lookup_by_id(alice).await.unwrap().nickname, "alice");
        assert_eq!(store.nickname(alice).await.unwrap(), "alice");
        assert_eq!(store.list_nicknames().await.unwrap(), ["alice", "bob"]);

        assert!(matches!(store.lookup_by_id(UserId::new()).await, Err(AppError::UserNotFound)));
        assert!(matches!(store.lookup_by_email("c@x.com").await, Err(AppError::UserNotFound)));
        assert!(matches!(store.nickname(UserId::new()).await, Err(AppError::UserNotFound)));
    }
}
