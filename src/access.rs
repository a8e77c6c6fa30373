//! Authorization decisions.
//!
//! Every protected operation describes itself as an [`Action`], gathers the
//! [`ResourceFacts`] it needs inside its own transaction and asks [`decide`].
//! The engine does no IO and cannot fail; it only allows or denies.

use std::fmt;

use crate::{
    appresult::AppResult,
    ids::{MessageId, RoomId, UserId},
    session::SessionContext,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ReadRoomList,
    ReadUserList,
    ReadRoom(RoomId),
    ReadMessages(RoomId),
    PostMessage(RoomId),
    EditMessage(MessageId),
    CreateRoom,
    AddMember(RoomId),
    RemoveMember(RoomId),
    DeleteRoom(RoomId),
}

/// What the store knows about the room an action targets, from the
/// requester's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomFacts {
    pub admin_id: UserId,
    pub requester_is_member: bool,
}

impl RoomFacts {
    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admin_id == user_id
    }
}

/// `None` means the resource does not exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceFacts {
    pub room: Option<RoomFacts>,
    pub message_author: Option<UserId>,
}

impl ResourceFacts {
    pub fn room(room: Option<RoomFacts>) -> Self {
        Self { room, message_author: None }
    }

    pub fn message(author: Option<UserId>) -> Self {
        Self { room: None, message_author: author }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    RoomNotFound,
    MessageNotFound,
    NotMember,
    NotAdmin,
    NotAuthor,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DenyReason::RoomNotFound => "lobby does not exist",
            DenyReason::MessageNotFound => "message does not exist",
            DenyReason::NotMember => "user is not a member of this lobby",
            DenyReason::NotAdmin => "user is not admin",
            DenyReason::NotAuthor => "user is not the author of this message",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> AppResult<()> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => Err(reason.into()),
        }
    }
}

/// May `session` perform `action`, given `facts` about its target?
pub fn decide(action: &Action, session: &SessionContext, facts: &ResourceFacts) -> Decision {
    use Action::*;

    let requester = session.user_id();
    let decision = match action {
        ReadRoomList | ReadUserList | CreateRoom => Decision::Allow,

        // existence is the only gate, membership is not required to read
        ReadRoom(_) | ReadMessages(_) | AddMember(_) => match facts.room {
            Some(_) => Decision::Allow,
            None => Decision::Deny(DenyReason::RoomNotFound),
        },

        PostMessage(_) => match facts.room {
            None => Decision::Deny(DenyReason::RoomNotFound),
            Some(room) if room.requester_is_member => Decision::Allow,
            Some(_) => Decision::Deny(DenyReason::NotMember),
        },

        EditMessage(_) => match facts.message_author {
            None => Decision::Deny(DenyReason::MessageNotFound),
            Some(author) if author == requester => Decision::Allow,
            Some(_) => Decision::Deny(DenyReason::NotAuthor),
        },

        RemoveMember(_) | DeleteRoom(_) => match facts.room {
            None => Decision::Deny(DenyReason::RoomNotFound),
            Some(room) if room.is_admin(requester) => Decision::Allow,
            Some(_) => Decision::Deny(DenyReason::NotAdmin),
        },
    };

    if let Decision::Deny(reason) = decision {
        tracing::debug!(?action, user_id = %requester, %reason, "access denied");
    }

    decision
}
