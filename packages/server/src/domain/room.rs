//! The room entity: the live coordination unit for one class.
//!
//! A room owns the presence list, the bounded chat log and the attendance
//! session for its class. All methods are pure state transitions returning
//! `Result`; broadcasting and persistence are the use-case layer's job. One
//! room is always mutated under a single lock, which is what gives every
//! member the same relative order of events.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use thiserror::Error;

use super::attendance::{AttendanceRecord, AttendanceSession, MarkError};
use super::value_object::{
    AttendanceStatus, ClassId, ConnectionId, ContentError, InvalidStatus, MessageContent, RoleSet,
    Timestamp, UserId,
};

/// Maximum number of chat entries kept per room; oldest entries are dropped.
pub const MAX_CHAT_LOG: usize = 200;

/// A connected member of a room (one channel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Member {
    pub user_id: UserId,
    pub name: String,
    pub roles: RoleSet,
}

/// One enrolled user from the external roster collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterMember {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

/// One entry in the room's chat log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEntry {
    pub sender: UserId,
    pub sender_name: String,
    pub text: MessageContent,
    pub timestamp: Timestamp,
}

/// Rejections for room operations. All of these are recovered locally as a
/// response to the offending message; none of them terminates a channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("caller lacks the teacher/admin role required for this action")]
    Forbidden,
    #[error("user {0} is neither enrolled in this class nor teacher/admin")]
    NotEnrolledOrUnauthorized(UserId),
    #[error("user {0} is not enrolled in this class")]
    NotEnrolled(UserId),
    #[error("no attendance session is open for this class")]
    NoOpenSession,
    #[error("an attendance session is already open for this class")]
    SessionAlreadyOpen,
    #[error(transparent)]
    InvalidMessage(#[from] ContentError),
    #[error(transparent)]
    InvalidStatus(#[from] InvalidStatus),
}

/// Live state for one class.
#[derive(Debug, Clone, Serialize)]
pub struct Room {
    class_id: ClassId,
    created_at: Timestamp,
    members: HashMap<ConnectionId, Member>,
    chat_log: VecDeque<ChatEntry>,
    roster: HashMap<UserId, RosterMember>,
    session: Option<AttendanceSession>,
}

impl Room {
    /// Create a room with a roster snapshot taken at creation time.
    pub fn new(class_id: ClassId, created_at: Timestamp, roster: Vec<RosterMember>) -> Self {
        Self {
            class_id,
            created_at,
            members: HashMap::new(),
            chat_log: VecDeque::new(),
            roster: roster
                .into_iter()
                .map(|member| (member.user_id, member))
                .collect(),
            session: None,
        }
    }

    pub fn class_id(&self) -> ClassId {
        self.class_id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Replace the roster snapshot with a fresh fetch.
    fn replace_roster(&mut self, roster: Vec<RosterMember>) {
        self.roster = roster
            .into_iter()
            .map(|member| (member.user_id, member))
            .collect();
    }

    pub fn roster_ids(&self) -> Vec<UserId> {
        self.roster.keys().copied().collect()
    }

    pub fn is_in_roster(&self, user_id: UserId) -> bool {
        self.roster.contains_key(&user_id)
    }

    /// Add a channel to the member set. A user may join when enrolled in the
    /// roster snapshot or holding a staff role; room size is unconstrained.
    pub fn join(&mut self, connection_id: ConnectionId, member: Member) -> Result<(), RoomError> {
        if !member.roles.is_staff() && !self.is_in_roster(member.user_id) {
            return Err(RoomError::NotEnrolledOrUnauthorized(member.user_id));
        }
        self.members.insert(connection_id, member);
        Ok(())
    }

    /// Remove a channel from the member set. Unknown channels are a no-op so
    /// the disconnect path can always call this.
    pub fn leave(&mut self, connection_id: ConnectionId) -> Option<Member> {
        self.members.remove(&connection_id)
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn contains_member(&self, connection_id: ConnectionId) -> bool {
        self.members.contains_key(&connection_id)
    }

    pub fn member(&self, connection_id: ConnectionId) -> Option<&Member> {
        self.members.get(&connection_id)
    }

    /// All member channels, for whole-room broadcasts.
    pub fn member_ids(&self) -> Vec<ConnectionId> {
        self.members.keys().copied().collect()
    }

    /// Member channels held by teacher/admin users, for staff-only events.
    pub fn staff_member_ids(&self) -> Vec<ConnectionId> {
        self.members
            .iter()
            .filter(|(_, member)| member.roles.is_staff())
            .map(|(connection_id, _)| *connection_id)
            .collect()
    }

    /// Currently present users, deduplicated by user id and sorted for a
    /// stable `online_users` snapshot.
    pub fn online_users(&self) -> Vec<Member> {
        let mut by_user: HashMap<UserId, &Member> = HashMap::new();
        for member in self.members.values() {
            by_user.entry(member.user_id).or_insert(member);
        }
        let mut users: Vec<Member> = by_user.into_values().cloned().collect();
        users.sort_by_key(|member| member.user_id);
        users
    }

    /// Append a chat message to the bounded log.
    pub fn append_chat(
        &mut self,
        sender: &Member,
        text: MessageContent,
        timestamp: Timestamp,
    ) -> ChatEntry {
        let entry = ChatEntry {
            sender: sender.user_id,
            sender_name: sender.name.clone(),
            text,
            timestamp,
        };
        if self.chat_log.len() == MAX_CHAT_LOG {
            self.chat_log.pop_front();
        }
        self.chat_log.push_back(entry.clone());
        entry
    }

    pub fn chat_log(&self) -> impl Iterator<Item = &ChatEntry> {
        self.chat_log.iter()
    }

    pub fn session(&self) -> Option<&AttendanceSession> {
        self.session.as_ref()
    }

    pub fn has_open_session(&self) -> bool {
        self.session
            .as_ref()
            .map(AttendanceSession::is_open)
            .unwrap_or(false)
    }

    /// Open an attendance session, replacing the roster snapshot with the
    /// freshly fetched one. Requires a staff caller and no session currently
    /// open; a closed previous session is replaced by a fresh one. A rejected
    /// open leaves the room untouched, the roster snapshot included.
    pub fn open_session(
        &mut self,
        opened_by: UserId,
        caller_roles: &RoleSet,
        opened_at: Timestamp,
        roster: Vec<RosterMember>,
    ) -> Result<&AttendanceSession, RoomError> {
        if !caller_roles.is_staff() {
            return Err(RoomError::Forbidden);
        }
        if self.has_open_session() {
            return Err(RoomError::SessionAlreadyOpen);
        }
        self.replace_roster(roster);
        let session =
            AttendanceSession::open(self.class_id, opened_by, opened_at, self.roster_ids());
        self.session = Some(session);
        Ok(self.session.as_ref().unwrap())
    }

    /// Close the open session, producing the record for the persistence
    /// collaborator. The closer need not be the opener.
    pub fn close_session(
        &mut self,
        caller_roles: &RoleSet,
        closed_at: Timestamp,
    ) -> Result<AttendanceRecord, RoomError> {
        if !caller_roles.is_staff() {
            return Err(RoomError::Forbidden);
        }
        match self.session.as_mut() {
            Some(session) if session.is_open() => Ok(session.close(closed_at)),
            _ => Err(RoomError::NoOpenSession),
        }
    }

    /// Student self-check-in. Only `present` and `late` are accepted; absence
    /// is never self-reported. Last write wins against teacher marks.
    pub fn mark_self(
        &mut self,
        user_id: UserId,
        status: AttendanceStatus,
    ) -> Result<(), RoomError> {
        if !self.has_open_session() {
            return Err(RoomError::NoOpenSession);
        }
        if !status.is_self_markable() {
            return Err(RoomError::InvalidStatus(InvalidStatus(
                status.as_str().to_string(),
            )));
        }
        self.apply_mark(user_id, status)
    }

    /// Teacher/admin mark for any roster member, any status.
    pub fn mark_other(
        &mut self,
        caller_roles: &RoleSet,
        target: UserId,
        status: AttendanceStatus,
    ) -> Result<(), RoomError> {
        if !caller_roles.is_staff() {
            return Err(RoomError::Forbidden);
        }
        if !self.has_open_session() {
            return Err(RoomError::NoOpenSession);
        }
        self.apply_mark(target, status)
    }

    fn apply_mark(&mut self, user_id: UserId, status: AttendanceStatus) -> Result<(), RoomError> {
        // has_open_session was checked by the caller; a closed session here
        // would be a logic error and still maps to NoOpenSession.
        let session = self.session.as_mut().ok_or(RoomError::NoOpenSession)?;
        session.mark(user_id, status).map_err(|err| match err {
            MarkError::SessionClosed => RoomError::NoOpenSession,
            MarkError::NotInRoster(user_id) => RoomError::NotEnrolled(user_id),
        })
    }

    /// A room may be destroyed once no channel is connected and no session is
    /// open. An open session keeps the room alive for late check-ins.
    pub fn can_be_destroyed(&self) -> bool {
        self.members.is_empty() && !self.has_open_session()
    }
}
