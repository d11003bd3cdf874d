//! Batch cleanup of persisted rooms
//!
//! The offline counterpart of the idle sweep: it works on the document store
//! rather than on live rooms, and is meant to run from a scheduler.

use crate::store::{delete_room, list_room_codes, load_room, load_roster, RoomStore, StoreResult};
use crate::types::RoomCode;
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct MaintenanceOptions {
    /// Rooms created longer ago than this are deleted
    pub max_age: Duration,
    /// Rooms whose whole roster has been disconnected this long are deleted
    pub stale_after: Duration,
    /// Only apply the disconnected-roster rule
    pub disconnected_only: bool,
    /// Report what would be deleted without deleting it
    pub dry_run: bool,
}

impl Default for MaintenanceOptions {
    fn default() -> Self {
        Self {
            max_age: Duration::hours(24),
            stale_after: Duration::minutes(30),
            disconnected_only: false,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionReason {
    TooOld,
    AllDisconnected,
    /// Player or message documents without a room document
    Orphaned,
}

#[derive(Debug, Default)]
pub struct MaintenanceReport {
    pub examined: usize,
    pub deleted: Vec<(RoomCode, DeletionReason)>,
    pub dry_run: bool,
}

/// Decide whether one stored room should go
async fn judge(
    store: &dyn RoomStore,
    code: &str,
    options: &MaintenanceOptions,
    now: DateTime<Utc>,
) -> StoreResult<Option<DeletionReason>> {
    let Some(room) = load_room(store, code).await? else {
        return Ok(Some(DeletionReason::Orphaned));
    };

    if !options.disconnected_only && now - room.created_at > options.max_age {
        return Ok(Some(DeletionReason::TooOld));
    }

    // A missing roster reads as empty: the room document was written first
    let players = load_roster(store, code)
        .await?
        .map(|r| r.players)
        .unwrap_or_default();
    let stale_since = now - options.stale_after;
    let all_stale = if players.is_empty() {
        room.updated_at < stale_since
    } else {
        players
            .iter()
            .all(|p| !p.connected && p.last_seen < stale_since)
    };

    Ok(all_stale.then_some(DeletionReason::AllDisconnected))
}

/// Examine every stored room and delete the expired ones.
///
/// A room that fails to load is logged and skipped; the run continues.
pub async fn run_maintenance(
    store: &dyn RoomStore,
    options: &MaintenanceOptions,
    now: DateTime<Utc>,
) -> StoreResult<MaintenanceReport> {
    let mut report = MaintenanceReport {
        dry_run: options.dry_run,
        ..Default::default()
    };

    for code in list_room_codes(store).await? {
        report.examined += 1;
        let reason = match judge(store, &code, options, now).await {
            Ok(Some(reason)) => reason,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(room = %code, "Skipping room that failed to load: {}", e);
                continue;
            }
        };

        if options.dry_run {
            tracing::info!(room = %code, ?reason, "Would delete room");
        } else {
            delete_room(store, &code).await?;
            tracing::info!(room = %code, ?reason, "Deleted room");
        }
        report.deleted.push((code, reason));
    }

    Ok(report)
}
