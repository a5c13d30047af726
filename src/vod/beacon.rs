//! Video-beacon wire contract (form-encoded POSTs to the action endpoint).

use async_trait::async_trait;
use serde::Serialize;

use crate::error::LmsError;

use super::bootstrap::ProgressArgs;

pub const TRACK_STATE_START: u32 = 3;
pub const TRACK_STATE_HEARTBEAT: u32 = 99;
pub const TRACK_STATE_COMPLETE: u32 = 5;
pub const LOG_STATE_START: u32 = 1;
pub const LOG_STATE_HEARTBEAT: u32 = 8;

/// Window-tracking beacon (`vod_track_for_onwindow`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackBeacon {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub track: i64,
    pub state: u32,
    pub position: u64,
    pub attempts: i64,
    pub interval: u64,
}

impl TrackBeacon {
    pub fn new(args: &ProgressArgs, state: u32, position: u64) -> Self {
        Self {
            kind: "vod_track_for_onwindow",
            track: args.track_id,
            state,
            position,
            attempts: args.attempt,
            interval: args.interval_ms,
        }
    }
}

/// Progress-log beacon (`vod_log`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogBeacon {
    pub courseid: i64,
    pub cmid: i64,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub track: i64,
    pub attempt: i64,
    pub state: u32,
    pub positionfrom: u64,
    pub positionto: u64,
    pub logtime: String,
}

impl LogBeacon {
    pub fn new(args: &ProgressArgs, state: u32, position: u64) -> Self {
        Self {
            courseid: args.course_id,
            cmid: args.cmid,
            kind: "vod_log",
            track: args.track_id,
            attempt: args.attempt,
            state,
            positionfrom: position,
            positionto: position,
            logtime: args.logtime.clone(),
        }
    }
}

/// Delivery seam for beacons. Implemented by the session (real POSTs);
/// tests record instead. Beacons are idempotent upserts on the remote side,
/// so re-sending a whole sequence is safe.
#[async_trait]
pub trait BeaconSink: Send + Sync {
    async fn send_track(&self, beacon: &TrackBeacon) -> Result<(), LmsError>;
    async fn send_log(&self, beacon: &LogBeacon) -> Result<(), LmsError>;
}
