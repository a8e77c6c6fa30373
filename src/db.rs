use std::{str::FromStr, time::Duration};

use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Sqlite, SqlitePool, Transaction,
};

use crate::{auth::CredentialStore, rooms::{MembershipRegistry, MessageLedger}};

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_BCRYPT_COST: u32 = 10;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            BLOB PRIMARY KEY NOT NULL,
    email         TEXT NOT NULL UNIQUE,
    nickname      TEXT NOT NULL,
    password_hash TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lobbies (
    id       BLOB PRIMARY KEY NOT NULL,
    name     TEXT NOT NULL,
    admin_id BLOB NOT NULL REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS lobby_members (
    lobby_id BLOB NOT NULL REFERENCES lobbies(id) ON DELETE CASCADE,
    user_id  BLOB NOT NULL REFERENCES users(id),
    PRIMARY KEY (lobby_id, user_id)
);

CREATE TABLE IF NOT EXISTS messages (
    id         BLOB PRIMARY KEY NOT NULL,
    lobby_id   BLOB NOT NULL REFERENCES lobbies(id) ON DELETE CASCADE,
    author_id  BLOB NOT NULL REFERENCES users(id),
    text       TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    edited_at  INTEGER
);

CREATE INDEX IF NOT EXISTS messages_by_lobby ON messages (lobby_id, created_at);
"#;

/// Shared handle to the store. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
    bcrypt_cost: u32,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(16)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await?;

        tracing::info!(url, "database connected");
        Self::with_pool(pool).await
    }

    /// Private memory store, unique per call so parallel tests never share one.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        // sqlx numbers each ":memory:" parse, so every call gets a fresh store
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // the store lives as long as its one connection does
        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Self { pool, bcrypt_cost: DEFAULT_BCRYPT_COST })
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn credentials(&self) -> CredentialStore<'_> {
        CredentialStore::new(&self.pool, self.bcrypt_cost)
    }

    pub fn rooms(&self) -> MembershipRegistry<'_> {
        MembershipRegistry::new(&self.pool)
    }

    pub fn messages(&self) -> MessageLedger<'_> {
        MessageLedger::new(&self.pool)
    }
}

/// Transaction holding the write lock from its first statement, for
/// read-then-write operations. Concurrent writers wait on the busy timeout
/// rather than failing with `SQLITE_BUSY_SNAPSHOT`.
pub(crate) async fn begin_write(pool: &SqlitePool) -> sqlx::Result<Transaction<'static, Sqlite>> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation())
}
