//! # Rule History
//!
//! Append-only log of every restriction-state change of a course. Each
//! entry stores the full post-event snapshot (or the `DELETED` marker) and
//! a SHA-256 digest over its canonical body, chained to the digest of the
//! previous entry for the same course. A course's history is therefore a
//! tamper-evident chain that [`HistoryRecorder::verify`] can re-check.
//!
//! The recorder reads the store directly and is safe to call while a
//! [`Commit`](crate::evaluator::Commit) is held.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use embargo_core::{sha256_digest, CanonicalBytes, ContentDigest, CourseKey};
use embargo_store::{HistoryEntry, HistorySnapshot, RuleSnapshot, RuleStore, StoreResult};
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineResult;

/// The digested body of a history entry.
#[derive(Serialize)]
struct DigestBody<'a> {
    id: &'a Uuid,
    course: &'a CourseKey,
    snapshot: &'a HistorySnapshot,
    created_at: &'a DateTime<Utc>,
    previous_digest: Option<&'a ContentDigest>,
}

/// Compute the digest of an entry's canonical body.
pub fn entry_digest(entry: &HistoryEntry) -> EngineResult<ContentDigest> {
    let body = DigestBody {
        id: &entry.id,
        course: &entry.course,
        snapshot: &entry.snapshot,
        created_at: &entry.created_at,
        previous_digest: entry.previous_digest.as_ref(),
    };
    Ok(sha256_digest(&CanonicalBytes::new(&body)?))
}

/// Result of re-checking a course's history chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainVerification {
    /// Entries examined.
    pub total_entries: usize,
    /// Entries whose `previous_digest` does not match their predecessor.
    pub broken_links: usize,
    /// Entries whose stored digest does not match their body.
    pub tampered_entries: usize,
    /// Whether the chain is intact.
    pub chain_valid: bool,
}

/// Appends and reads history entries.
#[derive(Clone)]
pub struct HistoryRecorder {
    store: Arc<dyn RuleStore>,
}

impl std::fmt::Debug for HistoryRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryRecorder").finish_non_exhaustive()
    }
}

impl HistoryRecorder {
    /// Create a recorder over `store`.
    pub fn new(store: Arc<dyn RuleStore>) -> Self {
        Self { store }
    }

    /// Snapshot the current rule state of `course`.
    ///
    /// A course with no restricted-course row snapshots as `DELETED`.
    pub fn capture(&self, course: &CourseKey) -> StoreResult<HistorySnapshot> {
        Ok(match self.store.course_rule_set(course)? {
            Some(set) => HistorySnapshot::Rules(RuleSnapshot::capture(&set.course, &set.rules)),
            None => HistorySnapshot::Deleted,
        })
    }

    /// Append `snapshot` to the chain of `course`.
    pub fn append(
        &self,
        course: &CourseKey,
        snapshot: HistorySnapshot,
    ) -> EngineResult<HistoryEntry> {
        let previous_digest = self.store.latest_history(course)?.map(|e| e.digest);
        let mut entry = HistoryEntry {
            id: Uuid::new_v4(),
            sequence: 0,
            course: course.clone(),
            snapshot,
            created_at: Utc::now(),
            previous_digest,
            digest: ContentDigest::from_bytes([0; 32]),
        };
        entry.digest = entry_digest(&entry)?;
        let stored = self.store.append_history(entry)?;
        tracing::debug!(
            course = %course,
            sequence = stored.sequence,
            deleted = stored.snapshot.is_deleted(),
            "history entry appended"
        );
        Ok(stored)
    }

    /// Capture the current state of `course` and append it.
    pub fn record(&self, course: &CourseKey) -> EngineResult<HistoryEntry> {
        let snapshot = self.capture(course)?;
        self.append(course, snapshot)
    }

    /// The most recent entry for `course`.
    pub fn latest(&self, course: &CourseKey) -> StoreResult<Option<HistoryEntry>> {
        self.store.latest_history(course)
    }

    /// Every entry for `course`, oldest first.
    pub fn entries(&self, course: &CourseKey) -> StoreResult<Vec<HistoryEntry>> {
        self.store.history(course)
    }

    /// Re-check digests and links of the chain of `course`.
    pub fn verify(&self, course: &CourseKey) -> EngineResult<ChainVerification> {
        verify_chain(&self.store.history(course)?)
    }
}

/// Re-check the digests and links of one course's entries, oldest first.
pub fn verify_chain(entries: &[HistoryEntry]) -> EngineResult<ChainVerification> {
    let mut broken_links = 0;
    let mut tampered_entries = 0;
    let mut last: Option<&ContentDigest> = None;

    for entry in entries {
        if entry.previous_digest.as_ref() != last {
            broken_links += 1;
        }
        if entry_digest(entry)? != entry.digest {
            tampered_entries += 1;
        }
        last = Some(&entry.digest);
    }

    Ok(ChainVerification {
        total_entries: entries.len(),
        broken_links,
        tampered_entries,
        chain_valid: broken_links == 0 && tampered_entries == 0,
    })
}
