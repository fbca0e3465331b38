//! Heartbeat-based leader election over the shared record.
//!
//! Each tick runs two locked sections: the election step (refresh or
//! takeover) and a read-back of `owner_pid`. Only the read-back decides
//! whether leader duties run, so a node that was overthrown while stalled
//! stops acting as leader on its next tick.

use std::fmt;
use std::time::Duration;

use crate::core::{Clock, RecordStore, SharedRecord};
use crate::platform::{probe_or_dead, ProcessControl};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Leader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TakeoverReason {
    Unclaimed,
    OwnerDead,
    HeartbeatStale,
}

impl fmt::Display for TakeoverReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TakeoverReason::Unclaimed => f.write_str("unclaimed"),
            TakeoverReason::OwnerDead => f.write_str("owner dead"),
            TakeoverReason::HeartbeatStale => f.write_str("heartbeat stale"),
        }
    }
}

/// What the election step did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectionStep {
    /// We already owned the record and refreshed the heartbeat.
    Refreshed,
    TookOver {
        previous_owner: i64,
        reason: TakeoverReason,
    },
    /// Another live owner with a fresh heartbeat holds the record.
    Deferred { owner: i64 },
}

pub struct Election {
    self_pid: i64,
    stale_after_ms: i64,
    role: Role,
}

impl Election {
    pub fn new(self_pid: i64, stale_after: Duration) -> Self {
        Self {
            self_pid,
            stale_after_ms: stale_after.as_millis() as i64,
            role: Role::Follower,
        }
    }

    pub fn self_pid(&self) -> i64 {
        self.self_pid
    }

    /// Role as of the last successful read-back.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Why a non-owner may claim `record` at `now_ms`, if it may.
    pub fn takeover_reason(
        record: &SharedRecord,
        now_ms: i64,
        stale_after_ms: i64,
        procs: &dyn ProcessControl,
    ) -> Option<TakeoverReason> {
        if record.owner_pid == 0 {
            return Some(TakeoverReason::Unclaimed);
        }
        if !probe_or_dead(procs, record.owner_pid) {
            return Some(TakeoverReason::OwnerDead);
        }
        // A heartbeat ahead of `now` was written against an earlier clock
        // epoch (the record outlives reboots), so it proves nothing.
        let age = now_ms.saturating_sub(record.owner_heartbeat_ms);
        if !(0..=stale_after_ms).contains(&age) {
            return Some(TakeoverReason::HeartbeatStale);
        }
        None
    }

    /// Refreshes our heartbeat or claims the record under the lock.
    pub fn step(
        &self,
        store: &RecordStore,
        clock: &dyn Clock,
        procs: &dyn ProcessControl,
    ) -> Result<ElectionStep> {
        let self_pid = self.self_pid;
        let stale_after_ms = self.stale_after_ms;
        store.with_record(|record| {
            let now = clock.now_ms();
            if record.owner_pid == self_pid {
                record.owner_heartbeat_ms = now;
                return ElectionStep::Refreshed;
            }
            match Self::takeover_reason(record, now, stale_after_ms, procs) {
                Some(reason) => {
                    let previous_owner = record.owner_pid;
                    record.owner_pid = self_pid;
                    record.owner_heartbeat_ms = now;
                    ElectionStep::TookOver {
                        previous_owner,
                        reason,
                    }
                }
                None => ElectionStep::Deferred {
                    owner: record.owner_pid,
                },
            }
        })
    }

    /// Reads the current owner under the lock.
    pub fn current_owner(store: &RecordStore) -> Result<i64> {
        store.with_record(|record| record.owner_pid)
    }

    /// Runs one election tick and returns the role for this tick.
    pub fn tick(
        &mut self,
        store: &RecordStore,
        clock: &dyn Clock,
        procs: &dyn ProcessControl,
    ) -> Result<Role> {
        if let ElectionStep::TookOver {
            previous_owner,
            reason,
        } = self.step(store, clock, procs)?
        {
            log::info!(
                "pid={} became owner ({reason}, previous owner {previous_owner})",
                self.self_pid
            );
        }

        let owner = Self::current_owner(store)?;
        let role = if owner == self.self_pid {
            Role::Leader
        } else {
            Role::Follower
        };
        if self.role == Role::Leader && role == Role::Follower {
            log::warn!("pid={} lost ownership to pid={owner}", self.self_pid);
        }
        self.role = role;
        Ok(role)
    }
}
