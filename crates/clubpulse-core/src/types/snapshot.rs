//! Per-club presence snapshots and the online-set diff between them.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ClubId, UserId};
use super::transition::{PresenceTransitionEvent, TransitionKind};
use super::view::MemberPresenceView;

/// The derived presence state of one club at one instant.
///
/// Rebuilt wholesale on every observer tick; the previous snapshot is
/// kept only long enough to diff online sets, then dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClubPresenceSnapshot {
    /// The club this snapshot describes.
    pub club_id: ClubId,
    /// Human-readable club name, carried through to toasts.
    pub club_name: String,
    /// One derived view per club member, in roster order.
    pub members: Vec<MemberPresenceView>,
    /// When the views were derived.
    pub taken_at: DateTime<Utc>,
}

impl ClubPresenceSnapshot {
    pub fn new(
        club_id: ClubId,
        club_name: impl Into<String>,
        members: Vec<MemberPresenceView>,
        taken_at: DateTime<Utc>,
    ) -> Self {
        Self {
            club_id,
            club_name: club_name.into(),
            members,
            taken_at,
        }
    }

    /// Members currently considered online, in roster order.
    pub fn online_members(&self) -> Vec<MemberPresenceView> {
        self.members
            .iter()
            .filter(|view| view.is_online)
            .cloned()
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.members.iter().filter(|view| view.is_online).count()
    }

    pub fn is_online(&self, user_id: UserId) -> bool {
        self.members
            .iter()
            .any(|view| view.user_id == user_id && view.is_online)
    }

    /// The set of online member IDs, for diffing.
    pub fn online_ids(&self) -> HashSet<UserId> {
        self.members
            .iter()
            .filter(|view| view.is_online)
            .map(|view| view.user_id)
            .collect()
    }
}

/// Diff two consecutive snapshots of the same club into transition events.
///
/// Pure set logic keyed by `user_id`: members online in `next` but not in
/// `previous` yield ONLINE events, members online in `previous` but not in
/// `next` yield OFFLINE events (including members dropped from the roster
/// entirely). `local_user_id` is excluded from both sets so a user never
/// hears about their own transitions.
///
/// With no previous snapshot (first tick of a watch) every online member
/// yields an ONLINE event, so "who is already here" surfaces on first
/// render instead of being swallowed.
///
/// Events come out in roster order, offline before online, which keeps
/// repeated diffs byte-for-byte stable.
pub fn diff_online_transitions(
    previous: Option<&ClubPresenceSnapshot>,
    next: &ClubPresenceSnapshot,
    local_user_id: UserId,
) -> Vec<PresenceTransitionEvent> {
    let previous_online: HashSet<UserId> = previous.map(|s| s.online_ids()).unwrap_or_default();
    let next_online = next.online_ids();

    let mut events = Vec::new();

    if let Some(previous) = previous {
        for view in &previous.members {
            if view.user_id == local_user_id || !view.is_online {
                continue;
            }
            if !next_online.contains(&view.user_id) {
                events.push(PresenceTransitionEvent {
                    user_id: view.user_id,
                    club_id: next.club_id,
                    kind: TransitionKind::Offline,
                    display_name: view.display_name.clone(),
                    at: next.taken_at,
                });
            }
        }
    }

    for view in &next.members {
        if view.user_id == local_user_id || !view.is_online {
            continue;
        }
        if !previous_online.contains(&view.user_id) {
            events.push(PresenceTransitionEvent {
                user_id: view.user_id,
                club_id: next.club_id,
                kind: TransitionKind::Online,
                display_name: view.display_name.clone(),
                at: next.taken_at,
            });
        }
    }

    events
}
