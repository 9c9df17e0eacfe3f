//! Shared test support for the presence integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};

use clubpulse_core::error::AppError;
use clubpulse_core::result::AppResult;
use clubpulse_core::traits::{ClubMembershipDirectory, NotificationSink, UserRecordStore};
use clubpulse_core::types::{
    ClubId, PresencePatch, PresenceToast, TransitionKind, UserId, UserPresenceRecord,
};
use clubpulse_store::{MemoryDirectory, MemoryRecordStore};

/// A record that self-reports online with a heartbeat `age_seconds` in
/// the past. Staleness scenarios are driven by back-dating heartbeats,
/// not by advancing wall-clock time.
pub fn online_record(user_id: UserId, name: &str, age_seconds: i64) -> UserPresenceRecord {
    let now = Utc::now();
    UserPresenceRecord {
        user_id,
        display_name: Some(name.to_string()),
        photo_url: None,
        is_online: true,
        last_seen: Some(now),
        last_heartbeat: Some(now - ChronoDuration::seconds(age_seconds)),
    }
}

/// Sink that records every toast synchronously, bypassing pacing, so
/// tests can assert on exact transition sequences.
#[derive(Debug, Default)]
pub struct RecordingSink {
    toasts: Mutex<Vec<PresenceToast>>,
}

impl RecordingSink {
    pub fn toasts(&self) -> Vec<PresenceToast> {
        self.toasts.lock().unwrap().clone()
    }

    /// Display names of recorded toasts, paired with their kind.
    pub fn sequence(&self) -> Vec<(TransitionKind, String)> {
        self.toasts()
            .into_iter()
            .map(|toast| (toast.kind, toast.display_name.unwrap_or_default()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.toasts.lock().unwrap().len()
    }
}

impl NotificationSink for RecordingSink {
    fn enqueue(&self, toast: PresenceToast) {
        self.toasts.lock().unwrap().push(toast);
    }
}

/// Record store wrapper that counts calls and can be told to fail
/// batch reads, for fault-injection scenarios.
#[derive(Debug, Clone)]
pub struct InstrumentedStore {
    inner: MemoryRecordStore,
    reads: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl InstrumentedStore {
    pub fn new(inner: MemoryRecordStore) -> Self {
        Self {
            inner,
            reads: Arc::new(AtomicU64::new(0)),
            writes: Arc::new(AtomicU64::new(0)),
            fail_reads: Arc::new(AtomicBool::new(false)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn read_many_calls(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn write_calls(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserRecordStore for InstrumentedStore {
    async fn read(&self, user_id: UserId) -> AppResult<Option<UserPresenceRecord>> {
        self.inner.read(user_id).await
    }

    async fn read_many(&self, user_ids: &[UserId]) -> AppResult<Vec<UserPresenceRecord>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::store("injected read failure"));
        }
        self.inner.read_many(user_ids).await
    }

    async fn write(&self, user_id: UserId, patch: PresencePatch) -> AppResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::store("injected write failure"));
        }
        self.inner.write(user_id, patch).await
    }
}

/// Directory wrapper that can be told to fail enumeration.
#[derive(Debug, Clone)]
pub struct FailingDirectory {
    inner: MemoryDirectory,
    fail: Arc<AtomicBool>,
}

impl FailingDirectory {
    pub fn new(inner: MemoryDirectory) -> Self {
        Self {
            inner,
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClubMembershipDirectory for FailingDirectory {
    async fn list_member_ids(&self, club_id: ClubId) -> AppResult<Vec<UserId>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::directory("injected directory failure"));
        }
        self.inner.list_member_ids(club_id).await
    }
}
