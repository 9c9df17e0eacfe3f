//! End-to-end tests for the presence session: local agent, club
//! watches, aggregation, and notification fan-out wired together over
//! the in-memory store.

mod support;

use std::sync::Arc;
use std::time::Duration;

use clubpulse_core::config::presence::PresenceConfig;
use clubpulse_core::types::{ClubId, TransitionKind, UserId};
use clubpulse_presence::PresenceSession;
use clubpulse_store::{MemoryDirectory, MemoryRecordStore};

use support::{online_record, FailingDirectory, RecordingSink};

fn session_fixture() -> (
    PresenceSession,
    MemoryRecordStore,
    MemoryDirectory,
    Arc<RecordingSink>,
    UserId,
) {
    let store = MemoryRecordStore::new();
    let directory = MemoryDirectory::new();
    let sink = Arc::new(RecordingSink::default());
    let local_user_id = UserId::new();
    let session = PresenceSession::with_sink(
        local_user_id,
        PresenceConfig::default(),
        Arc::new(store.clone()),
        Arc::new(directory.clone()),
        sink.clone(),
    );
    (session, store, directory, sink, local_user_id)
}

#[tokio::test(start_paused = true)]
async fn test_tracked_club_is_fully_visible_after_initial_load() {
    let (session, store, directory, sink, local) = session_fixture();
    let (asha, bram) = (UserId::new(), UserId::new());
    store.insert_record(online_record(asha, "Asha", 0));
    store.insert_record(online_record(bram, "Bram", 0));
    let club_id = ClubId::new();
    directory.set_members(club_id, vec![local, asha, bram]);

    session.start().await;
    session.track_club(club_id, "Rustaceans").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.all_members(club_id).len(), 3);
    assert_eq!(session.online_count(club_id), 3);
    assert!(session.is_online(club_id, asha));
    assert!(session.is_locally_online());

    let metrics = session.metrics();
    assert!(metrics.polls_completed >= 1);
    assert_eq!(metrics.transitions_emitted, sink.len() as u64);
}

#[tokio::test(start_paused = true)]
async fn test_initial_load_announces_existing_members_excluding_self() {
    let (session, store, directory, sink, local) = session_fixture();
    let (asha, bram) = (UserId::new(), UserId::new());
    store.insert_record(online_record(asha, "Asha", 0));
    store.insert_record(online_record(bram, "Bram", 0));
    let club_id = ClubId::new();
    directory.set_members(club_id, vec![local, asha, bram]);

    session.start().await;
    session.track_club(club_id, "Rustaceans").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(
        sink.sequence(),
        vec![
            (TransitionKind::Online, "Asha".to_string()),
            (TransitionKind::Online, "Bram".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_member_transitions_arrive_on_the_next_poll() {
    let (session, store, directory, sink, local) = session_fixture();
    let (asha, bram) = (UserId::new(), UserId::new());
    store.insert_record(online_record(asha, "Asha", 0));
    let club_id = ClubId::new();
    directory.set_members(club_id, vec![local, asha, bram]);

    session.start().await;
    session.track_club(club_id, "Rustaceans").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.sequence(), vec![(TransitionKind::Online, "Asha".to_string())]);

    // Asha's heartbeat goes stale, Bram heartbeats for the first time.
    store.insert_record(online_record(asha, "Asha", 130));
    store.insert_record(online_record(bram, "Bram", 0));
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(
        sink.sequence(),
        vec![
            (TransitionKind::Online, "Asha".to_string()),
            (TransitionKind::Offline, "Asha".to_string()),
            (TransitionKind::Online, "Bram".to_string()),
        ]
    );
    assert!(!session.is_online(club_id, asha));
    assert!(session.is_online(club_id, bram));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_club_lookups_return_empty_defaults() {
    let (session, _, _, _, _) = session_fixture();
    let club_id = ClubId::new();

    assert!(session.all_members(club_id).is_empty());
    assert!(session.online_members(club_id).is_empty());
    assert_eq!(session.online_count(club_id), 0);
    assert!(!session.is_online(club_id, UserId::new()));
    assert_eq!(session.stats().clubs_tracked, 0);
}

#[tokio::test(start_paused = true)]
async fn test_untrack_club_forgets_state_and_stops_toasts() {
    let (session, store, directory, sink, local) = session_fixture();
    let asha = UserId::new();
    store.insert_record(online_record(asha, "Asha", 0));
    let club_id = ClubId::new();
    directory.set_members(club_id, vec![local, asha]);

    session.start().await;
    session.track_club(club_id, "Rustaceans").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let announced = sink.len();
    assert!(announced > 0);

    session.untrack_club(club_id);
    assert!(session.all_members(club_id).is_empty());
    assert_eq!(session.online_count(club_id), 0);

    store.insert_record(online_record(asha, "Asha", 130));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sink.len(), announced, "untracked club must not produce toasts");
}

#[tokio::test(start_paused = true)]
async fn test_refresh_picks_up_new_members_without_reannouncing() {
    let (session, store, directory, sink, local) = session_fixture();
    let (asha, bram) = (UserId::new(), UserId::new());
    store.insert_record(online_record(asha, "Asha", 0));
    let club_id = ClubId::new();
    directory.set_members(club_id, vec![local, asha]);

    session.start().await;
    session.track_club(club_id, "Rustaceans").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    directory.add_member(club_id, bram);
    store.insert_record(online_record(bram, "Bram", 0));
    session.refresh_club(club_id).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Asha stayed online across the refresh and is not re-announced.
    assert_eq!(
        sink.sequence(),
        vec![
            (TransitionKind::Online, "Asha".to_string()),
            (TransitionKind::Online, "Bram".to_string()),
        ]
    );
    assert_eq!(session.all_members(club_id).len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_directory_failure_tracks_empty_roster_until_refreshed() {
    let store = MemoryRecordStore::new();
    let directory = MemoryDirectory::new();
    let failing = FailingDirectory::new(directory.clone());
    let sink = Arc::new(RecordingSink::default());
    let local = UserId::new();
    let session = PresenceSession::with_sink(
        local,
        PresenceConfig::default(),
        Arc::new(store.clone()),
        Arc::new(failing.clone()),
        sink.clone(),
    );

    let asha = UserId::new();
    store.insert_record(online_record(asha, "Asha", 0));
    let club_id = ClubId::new();
    directory.set_members(club_id, vec![local, asha]);

    session.start().await;
    failing.set_fail(true);
    session.track_club(club_id, "Rustaceans").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(session.all_members(club_id).is_empty());
    assert_eq!(sink.len(), 0);

    failing.set_fail(false);
    session.refresh_club(club_id).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session.all_members(club_id).len(), 2);
    assert_eq!(session.online_count(club_id), 2);
    assert_eq!(sink.sequence(), vec![(TransitionKind::Online, "Asha".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_tears_down_and_is_idempotent() {
    let (session, store, directory, sink, local) = session_fixture();
    let asha = UserId::new();
    store.insert_record(online_record(asha, "Asha", 0));
    let club_id = ClubId::new();
    directory.set_members(club_id, vec![local, asha]);

    session.start().await;
    session.track_club(club_id, "Rustaceans").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let announced = sink.len();

    session.shutdown().await;

    assert!(!session.is_locally_online());
    assert!(!store.get(local).unwrap().is_online);
    assert_eq!(session.stats().clubs_tracked, 0);

    store.insert_record(online_record(asha, "Asha", 130));
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(sink.len(), announced, "shut-down session must not produce toasts");

    // A second teardown is a no-op.
    session.shutdown().await;
    assert!(!store.get(local).unwrap().is_online);
}

#[tokio::test(start_paused = true)]
async fn test_sessions_are_independent_of_each_other() {
    let store = MemoryRecordStore::new();
    let directory = MemoryDirectory::new();
    let (local_a, local_b, asha) = (UserId::new(), UserId::new(), UserId::new());
    store.insert_record(online_record(asha, "Asha", 0));
    let club_id = ClubId::new();
    directory.set_members(club_id, vec![local_a, local_b, asha]);

    let build = |user_id| {
        PresenceSession::with_sink(
            user_id,
            PresenceConfig::default(),
            Arc::new(store.clone()),
            Arc::new(directory.clone()),
            Arc::new(RecordingSink::default()),
        )
    };
    let session_a = build(local_a);
    let session_b = build(local_b);

    session_a.start().await;
    session_b.start().await;
    session_a.track_club(club_id, "Rustaceans").await;
    session_b.track_club(club_id, "Rustaceans").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(session_a.online_count(club_id), 3);
    assert_eq!(session_b.online_count(club_id), 3);

    // Tearing one session down leaves the other polling; the survivor
    // observes the departed user going offline.
    session_a.shutdown().await;
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(session_a.stats().clubs_tracked, 0);
    assert_eq!(session_b.stats().clubs_tracked, 1);
    assert!(!session_b.is_online(club_id, local_a));
    assert!(session_b.is_online(club_id, local_b));
}
