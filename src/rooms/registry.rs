use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::instrument;

use crate::{
    access::{self, Action, ResourceFacts, RoomFacts},
    db,
    ids::{RoomId, UserId},
    session::SessionContext,
    AppError, AppResult,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub admin_id: UserId,
}

/// Rooms, their admins and their members.
pub struct MembershipRegistry<'a> {
    pool: &'a SqlitePool,
}

/// Facts about `room_id` as seen by `requester`, `None` if the room is gone.
pub(crate) async fn room_facts(
    conn: &mut SqliteConnection,
    room_id: RoomId,
    requester: UserId,
) -> sqlx::Result<Option<RoomFacts>> {
    let row: Option<(UserId, bool)> = sqlx::query_as(
        "SELECT admin_id, EXISTS(SELECT 1 FROM lobby_members WHERE lobby_id=lobbies.id AND user_id=?) \
         FROM lobbies WHERE id=?",
    )
    .bind(requester)
    .bind(room_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(|(admin_id, requester_is_member)| RoomFacts { admin_id, requester_is_member }))
}

impl<'a> MembershipRegistry<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// The requester becomes the room's admin. Admins are not members until
    /// someone adds them.
    #[instrument(skip(self, session), fields(admin_id = %session.user_id(), room_id))]
    pub async fn create_room(&self, session: &SessionContext, name: &str) -> AppResult<RoomId> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid("lobby name is required"));
        }
        access::decide(&Action::CreateRoom, session, &ResourceFacts::default()).into_result()?;

        let id = RoomId::new();
        sqlx::query("INSERT INTO lobbies (id,name,admin_id) VALUES (?,?,?)")
            .bind(id)
            .bind(name)
            .bind(session.user_id())
            .execute(self.pool)
            .await
            .map_err(|err| {
                if db::is_foreign_key_violation(&err) {
                    AppError::UserNotFound
                } else {
                    err.into()
                }
            })?;

        tracing::Span::current().record("room_id", tracing::field::display(id));
        tracing::info!("lobby created");
        Ok(id)
    }

    /// Deletes the room together with its memberships and messages.
    #[instrument(skip(self, session), fields(user_id = %session.user_id()))]
    pub async fn delete_room(&self, session: &SessionContext, room_id: RoomId) -> AppResult<()> {
        let mut tx = db::begin_write(self.pool).await?;

        let facts = ResourceFacts::room(room_facts(&mut tx, room_id, session.user_id()).await?);
        access::decide(&Action::DeleteRoom(room_id), session, &facts).into_result()?;

        sqlx::query("DELETE FROM messages WHERE lobby_id=?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM lobby_members WHERE lobby_id=?")
            .bind(room_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM lobbies WHERE id=? AND admin_id=?")
            .bind(room_id)
            .bind(session.user_id())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("lobby deleted");
        Ok(())
    }

    /// Adding an existing member is a successful no-op.
    #[instrument(skip(self, session), fields(requester = %session.user_id()))]
    pub async fn add_member(
        &self,
        session: &SessionContext,
        room_id: RoomId,
        user_id: UserId,
    ) -> AppResult<()> {
        let mut tx = db::begin_write(self.pool).await?;

        let facts = ResourceFacts::room(room_facts(&mut tx, room_id, session.user_id()).await?);
        access::decide(&Action::AddMember(room_id), session, &facts).into_result()?;

        // the primary key makes the upsert race free
        let result = sqlx::query(
            "INSERT INTO lobby_members (lobby_id,user_id) VALUES (?,?) \
             ON CONFLICT (lobby_id,user_id) DO NOTHING",
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| {
            if db::is_foreign_key_violation(&err) {
                AppError::UserNotFound
            } else {
                err.into()
            }
        })?;

        tx.commit().await?;
        if result.rows_affected() == 0 {
            tracing::debug!("already a member");
        } else {
            tracing::info!("member added");
        }
        Ok(())
    }

    /// Admin only. Non-admins learn nothing about who is a member.
    #[instrument(skip(self, session), fields(requester = %session.user_id()))]
    pub async fn remove_member(
        &self,
        session: &SessionContext,
        room_id: RoomId,
        user_id: UserId,
    ) -> AppResult<()> {
        let mut tx = db::begin_write(self.pool).await?;

        let facts = ResourceFacts::room(room_facts(&mut tx, room_id, session.user_id()).await?);
        access::decide(&Action::RemoveMember(room_id), session, &facts).into_result()?;

        let result = sqlx::query("DELETE FROM lobby_members WHERE lobby_id=? AND user_id=?")
            .bind(room_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotMember);
        }

        tx.commit().await?;
        tracing::info!("member removed");
        Ok(())
    }

    pub async fn is_member(&self, room_id: RoomId, user_id: UserId) -> AppResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM lobby_members WHERE lobby_id=? AND user_id=?)")
                .bind(room_id)
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    pub async fn is_admin(&self, room_id: RoomId, user_id: UserId) -> AppResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM lobbies WHERE id=? AND admin_id=?)")
                .bind(room_id)
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    pub async fn get_room(&self, session: &SessionContext, room_id: RoomId) -> AppResult<Room> {
        let mut conn = self.pool.acquire().await?;

        let facts = ResourceFacts::room(room_facts(&mut conn, room_id, session.user_id()).await?);
        access::decide(&Action::ReadRoom(room_id), session, &facts).into_result()?;

        sqlx::query_as("SELECT id,name,admin_id FROM lobbies WHERE id=?")
            .bind(room_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(AppError::RoomNotFound)
    }

    pub async fn list_rooms(&self, session: &SessionContext) -> AppResult<Vec<Room>> {
        access::decide(&Action::ReadRoomList, session, &ResourceFacts::default()).into_result()?;

        let rooms = sqlx::query_as("SELECT id,name,admin_id FROM lobbies ORDER BY name, id")
            .fetch_all(self.pool)
            .await?;
        Ok(rooms)
    }
}
