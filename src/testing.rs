//! Fixtures shared by the unit tests.

use tempfile::TempDir;
use time::Duration;

use crate::{db::Database, session::SessionContext};

pub(crate) async fn database() -> Database {
    Database::in_memory().await.unwrap().with_bcrypt_cost(4)
}

/// A WAL store on disk behind a full pool, for tests that need real
/// concurrent connections. The store lives as long as the returned dir.
pub(crate) async fn file_database() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("lobbychat.db").display());
    let db = Database::connect(&url).await.unwrap().with_bcrypt_cost(4);
    (db, dir)
}

/// Registers a user and returns the session they would get after logging in.
pub(crate) async fn user(db: &Database, nickname: &str) -> SessionContext {
    let email = format!("{nickname}@x.com");
    let store = db.credentials();
    store.register(&email, nickname, "pw").await.unwrap();
    store
        .authenticate(&email, "pw", Duration::hours(1))
        .await
        .unwrap()
        .into()
}
