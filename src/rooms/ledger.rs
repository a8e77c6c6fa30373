use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    access::{self, Action, ResourceFacts},
    db,
    ids::{MessageId, RoomId, UserId},
    session::SessionContext,
    AppError, AppResult,
};

use super::registry::room_facts;

/// A message in a lobby. Timestamps are unix milliseconds; `edited_at` stays
/// empty until the author first edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: MessageId,
    #[serde(rename = "lobby_id")]
    pub room_id: RoomId,
    pub author_id: UserId,
    pub text: String,
    pub created_at: i64,
    pub edited_at: Option<i64>,
}

const MESSAGE_COLUMNS: &str = "id, lobby_id AS room_id, author_id, text, created_at, edited_at";

fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Append-only log of messages per lobby.
pub struct MessageLedger<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageLedger<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Members only.
    #[instrument(skip(self, session, text), fields(author_id = %session.user_id(), message_id))]
    pub async fn post(&self, session: &SessionContext, room_id: RoomId, text: &str) -> AppResult<MessageId> {
        if text.trim().is_empty() {
            return Err(AppError::invalid("message text is required"));
        }

        let mut tx = db::begin_write(self.pool).await?;

        let facts = ResourceFacts::room(room_facts(&mut tx, room_id, session.user_id()).await?);
        access::decide(&Action::PostMessage(room_id), session, &facts).into_result()?;

        let id = MessageId::new();
        sqlx::query("INSERT INTO messages (id,lobby_id,author_id,text,created_at) VALUES (?,?,?,?,?)")
            .bind(id)
            .bind(room_id)
            .bind(session.user_id())
            .bind(text)
            .bind(now_millis())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::Span::current().record("message_id", tracing::field::display(id));
        tracing::debug!("message posted");
        Ok(id)
    }

    /// Author only. `edited_at` never moves backwards, even if the clock does.
    #[instrument(skip(self, session, text), fields(user_id = %session.user_id()))]
    pub async fn edit(
        &self,
        session: &SessionContext,
        room_id: RoomId,
        message_id: MessageId,
        text: &str,
    ) -> AppResult<()> {
        let mut tx = db::begin_write(self.pool).await?;

        let row: Option<(UserId, i64, Option<i64>)> =
            sqlx::query_as("SELECT author_id,created_at,edited_at FROM messages WHERE id=? AND lobby_id=?")
                .bind(message_id)
                .bind(room_id)
                .fetch_optional(&mut *tx)
                .await?;

        let facts = ResourceFacts::message(row.map(|(author_id, _, _)| author_id));
        access::decide(&Action::EditMessage(message_id), session, &facts).into_result()?;
        let Some((_, created_at, edited_at)) = row else {
            return Err(AppError::MessageNotFound);
        };

        if text.trim().is_empty() {
            return Err(AppError::invalid("message text is required"));
        }

        let edited_at = now_millis().max(created_at).max(edited_at.unwrap_or(created_at));
        sqlx::query("UPDATE messages SET text=?, edited_at=? WHERE id=?")
            .bind(text)
            .bind(edited_at)
            .bind(message_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!("message edited");
        Ok(())
    }

    pub async fn list_by_room(&self, session: &SessionContext, room_id: RoomId) -> AppResult<Vec<Message>> {
        let mut conn = self.pool.acquire().await?;

        let facts = ResourceFacts::room(room_facts(&mut conn, room_id, session.user_id()).await?);
        access::decide(&Action::ReadMessages(room_id), session, &facts).into_result()?;

        let messages = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE lobby_id=? ORDER BY created_at, id"
        ))
        .bind(room_id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(messages)
    }

    pub async fn get(&self, session: &SessionContext, room_id: RoomId, message_id: MessageId) -> AppResult<Message> {
        let mut conn = self.pool.acquire().await?;

        let facts = ResourceFacts::room(room_facts(&mut conn, room_id, session.user_id()).await?);
        access::decide(&Action::ReadMessages(room_id), session, &facts).into_result()?;

        sqlx::query_as(&format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id=? AND lobby_id=?"))
            .bind(message_id)
            .bind(room_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(AppError::MessageNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{access::DenyReason, testing};

    #[tokio::test]
    async fn non_member_cannot_post() {
        let db = testing::database().await;
        let alice = testing::user(&db, "alice").await;
        let bob = testing::user(&db, "bob").await;
        let general = db.rooms().create_room(&alice, "general").await.unwrap();

        for who in [&alice, &bob] {
            let result = db.messages().post(who, general, "hi").await;
            assert!(matches!(result, Err(AppError::Forbidden(DenyReason::NotMember))));
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn member_posts_and_reads_back() {
        let db = testing::database().await;
        let alice = testing::user(&db, "alice").await;
        let bob = testing::user(&db, "bob").await;
        let general = db.rooms().create_room(&alice, "general").await.unwrap();
        db.rooms().add_member(&alice, general, bob.user_id()).await.unwrap();

        let id = db.messages().post(&bob, general, "hi").await.unwrap();

        // reading needs no membership
        let message = db.messages().get(&alice, general, id).await.unwrap();
        assert_eq!(message.author_id, bob.user_id());
        assert_eq!(message.text, "hi");
        assert_eq!(message.edited_at, None);
        assert_eq!(db.messages().list_by_room(&alice, general).await.unwrap(), [message]);
    }

    #[tokio::test]
    async fn post_validates_text_and_room() {
        let db = testing::database().await;
        let alice = testing::user(&db, "alice").await;

        let empty = db.messages().post(&alice, RoomId::new(), " ").await;
        assert!(matches!(empty, Err(AppError::InvalidInput(_))));

        let gone = db.messages().post(&alice, RoomId::new(), "hi").await;
        assert!(matches!(gone, Err(AppError::RoomNotFound)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn posts_racing_room_deletion_fail_cleanly() {
        let (db, _dir) = testing::file_database().await;
        let alice = testing::user(&db, "alice").await;
        let bob = testing::user(&db, "bob").await;

        for round in 0..20 {
            let room = db.rooms().create_room(&alice, &format!("room {round}")).await.unwrap();
            db.rooms().add_member(&alice, room, bob.user_id()).await.unwrap();

            let posts: Vec<_> = (0..6)
                .map(|i| {
                    let db = db.clone();
                    let bob = bob.clone();
                    tokio::spawn(async move { db.messages().post(&bob, room, &format!("msg {i}")).await })
                })
                .collect();
            let delete = {
                let db = db.clone();
                let alice = alice.clone();
                tokio::spawn(async move { db.rooms().delete_room(&alice, room).await })
            };

            for post in posts {
                let result = post.await.unwrap();
                assert!(
                    matches!(result, Ok(_) | Err(AppError::RoomNotFound)),
                    "round {round}: {result:?}"
                );
            }
            let deleted = delete.await.unwrap();
            assert!(deleted.is_ok(), "round {round}: {deleted:?}");

            let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE lobby_id=?")
                .bind(room)
                .fetch_one(db.pool())
                .await
                .unwrap();
            assert_eq!(count, 0);
        }
    }

    #[tokio::test]
    async fn only_author_edits() {
        let db = testing::database().await;
        let alice = testing::user(&db, "alice").await;
        let bob = testing::user(&db, "bob").await;
        let general = db.rooms().create_room(&alice, "general").await.unwrap();
        db.rooms().add_member(&alice, general, alice.user_id()).await.unwrap();
        db.rooms().add_member(&alice, general, bob.user_id()).await.unwrap();
        let ledger = db.messages();
        let id = ledger.post(&alice, general, "hello").await.unwrap();

        let denied = ledger.edit(&bob, general, id, "hijacked").await;
        assert!(matches!(denied, Err(AppError::Forbidden(DenyReason::NotAuthor))));
        assert_eq!(ledger.get(&alice, general, id).await.unwrap().text, "hello");

        ledger.edit(&alice, general, id, "hello, world").await.unwrap();
        let edited = ledger.get(&alice, general, id).await.unwrap();
        assert_eq!(edited.text, "hello, world");
        assert!(edited.edited_at.unwrap() >= edited.created_at);
    }

    #[tokio::test]
    async fn edit_errors() {
        let db = testing::database().await;
        let alice = testing::user(&db, "alice").await;
        let general = db.rooms().create_room(&alice, "general").await.unwrap();
        let other = db.rooms().create_room(&alice, "other").await.unwrap();
        db.rooms().add_member(&alice, general, alice.user_id()).await.unwrap();
        let ledger = db.messages();
        let id = ledger.post(&alice, general, "hello").await.unwrap();

        let missing = ledger.edit(&alice, general, MessageId::new(), "x").await;
        assert!(matches!(missing, Err(AppError::MessageNotFound)));

        let wrong_room = ledger.edit(&alice, other, id, "x").await;
        assert!(matches!(wrong_room, Err(AppError::MessageNotFound)));

        let empty = ledger.edit(&alice, general, id, "").await;
        assert!(matches!(empty, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn edited_at_is_monotonic() {
        let db = testing::database().await;
        let alice = testing::user(&db, "alice").await;
        let general = db.rooms().create_room(&alice, "general").await.unwrap();
        db.rooms().add_member(&alice, general, alice.user_id()).await.unwrap();
        let ledger = db.messages();
        let id = ledger.post(&alice, general, "v1").await.unwrap();

        // pretend a previous edit happened with a clock far ahead of ours
        let future = now_millis() + 3_600_000;
        sqlx::query("UPDATE messages SET edited_at=? WHERE id=?")
            .bind(future)
            .bind(id)
            .execute(db.pool())
            .await
            .unwrap();

        ledger.edit(&alice, general, id, "v2").await.unwrap();
        let message = ledger.get(&alice, general, id).await.unwrap();
        assert_eq!(message.edited_at, Some(future));
    }

    #[tokio::test]
    async fn reading_a_missing_room_or_message() {
        let db = testing::database().await;
        let alice = testing::user(&db, "alice").await;
        let general = db.rooms().create_room(&alice, "general").await.unwrap();

        assert!(db.messages().list_by_room(&alice, general).await.unwrap().is_empty());
        assert!(matches!(
            db.messages().list_by_room(&alice, RoomId::new()).await,
            Err(AppError::RoomNotFound)
        ));
        assert!(matches!(
            db.messages().get(&alice, general, MessageId::new()).await,
            Err(AppError::MessageNotFound)
        ));
    }
}
