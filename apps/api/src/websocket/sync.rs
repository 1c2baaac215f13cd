//! Drift reconciliation
//!
//! Members periodically report their own playback position. When the party
//! is playing and a report strays from the authoritative position by more
//! than the threshold, that member alone receives a `sync` directive with
//! `resync: true`. The server never polls: stragglers are corrected only
//! when they report.

use std::time::Duration;

use potluck_shared_config::PartyConfig;
use tokio::time::Instant;

use super::connection::send_to_member;
use super::messages::{ServerMessage, SyncPayload};
use crate::models::party::{Member, PartyState, PlaybackState};

/// Drift correction settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftPolicy {
    /// Allowed divergence, in seconds
    pub threshold_secs: f64,

    /// Minimum gap between two resyncs to the same member (zero disables)
    pub cooldown: Duration,
}

impl DriftPolicy {
    pub fn from_config(config: &PartyConfig) -> Self {
        Self {
            threshold_secs: config.sync_threshold_secs,
            cooldown: config.resync_cooldown,
        }
    }
}

impl Default for DriftPolicy {
    fn default() -> Self {
        Self::from_config(&PartyConfig::default())
    }
}

/// What a time report led to
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriftOutcome {
    /// Party is paused; reports are only recorded
    Paused,
    /// Member is within the threshold
    InSync { drift: f64 },
    /// Member is out of sync but was corrected too recently
    CoolingDown { drift: f64 },
    /// A resync directive was issued
    Resynced { drift: f64, delivered: bool },
    /// Reporter is not in the party
    UnknownMember,
}

/// Distance between a member's last report and the authoritative position
pub fn drift_of(authoritative: PlaybackState, member: &Member) -> f64 {
    (member.last_position - authoritative.position).abs()
}

/// Record a member's reported position and correct them if they drifted
pub fn handle_time_update(
    policy: &DriftPolicy,
    party: &mut PartyState,
    participant_id: &str,
    reported: f64,
    now: Instant,
) -> DriftOutcome {
    let authoritative = party.playback.state_at(now);

    let Some(member) = party.member_mut(participant_id) else {
        return DriftOutcome::UnknownMember;
    };
    member.last_position = reported.max(0.0);

    if !authoritative.is_playing {
        return DriftOutcome::Paused;
    }

    let drift = drift_of(authoritative, member);
    if drift <= policy.threshold_secs {
        return DriftOutcome::InSync { drift };
    }

    let cooling_down = !policy.cooldown.is_zero()
        && member
            .last_resync_at
            .is_some_and(|at| now.saturating_duration_since(at) < policy.cooldown);
    if cooling_down {
        return DriftOutcome::CoolingDown { drift };
    }

    member.last_resync_at = Some(now);

    tracing::debug!(
        code = %party.code,
        participant_id = %participant_id,
        drift = drift,
        position = authoritative.position,
        "Member drifted, sending resync"
    );

    let Some(member) = party.member(participant_id) else {
        return DriftOutcome::UnknownMember;
    };
    let delivered = send_to_member(
        member,
        ServerMessage::Sync(SyncPayload::resync(authoritative)),
    );

    DriftOutcome::Resynced { drift, delivered }
}
