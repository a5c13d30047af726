//! Video-watch emulation.
//!
//! Reproduces the site player's beacon protocol closely enough to satisfy
//! server-side validation: one start exchange, heartbeats paced by the
//! decoded interval with monotonically non-decreasing positions, one final
//! completion beacon at exactly the duration. Reported positions always
//! follow real-time consumption; a speed multiplier compresses only the
//! local wait between beacons.

pub mod beacon;
pub mod bootstrap;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::LmsConfig;
use crate::session::Fetcher;

use beacon::{
    BeaconSink, LogBeacon, TrackBeacon, LOG_STATE_HEARTBEAT, LOG_STATE_START, TRACK_STATE_COMPLETE,
    TRACK_STATE_HEARTBEAT, TRACK_STATE_START,
};
use bootstrap::decode_progress_args;

/// Lifecycle of one watch sequence. `Failed` absorbs from any point; there
/// is no cancellation primitive, a sequence runs to `Completed` or
/// `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Started,
    Progressing,
    Completed,
    Failed,
}

pub struct WatchEmulator {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn BeaconSink>,
    base_url: String,
    fallback_duration_secs: u64,
    watch_concurrency: usize,
}

impl WatchEmulator {
    pub fn new(fetcher: Arc<dyn Fetcher>, sink: Arc<dyn BeaconSink>, config: &LmsConfig) -> Self {
        Self {
            fetcher,
            sink,
            base_url: config.base_url.clone(),
            fallback_duration_secs: config.vod_fallback_duration_secs,
            watch_concurrency: config.watch_concurrency,
        }
    }

    /// Drive one lecture to completion. Returns simple success/failure; a
    /// lecture with tracking disabled or an undecodable bootstrap is
    /// unsuccessful, not an error. Nothing is retried — beacons are
    /// idempotent remotely, so the caller may safely invoke again.
    pub async fn watch(&self, vod_id: i64, speed: f64) -> bool {
        let mut state = WatchState::Idle;
        debug!(vod_id, ?state, "watch sequence begins");

        let viewer_url = format!("{}/mod/vod/viewer.php?id={vod_id}", self.base_url);
        let page = match self.fetcher.get_page(&viewer_url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(vod_id, error = %e, "viewer page fetch failed");
                return self.fail(vod_id, &mut state);
            }
        };

        let Some(args) = decode_progress_args(&page) else {
            warn!(vod_id, "bootstrap call missing or shape mismatch");
            return self.fail(vod_id, &mut state);
        };
        if !args.progress_enabled {
            info!(vod_id, "progress tracking disabled for this lecture");
            return self.fail(vod_id, &mut state);
        }

        let duration = if args.duration_secs == 0 {
            // Zero duration is a known artifact of unparseable embeds, not
            // an instantly-done lecture.
            warn!(
                vod_id,
                fallback = self.fallback_duration_secs,
                "embed reports zero duration, using fallback"
            );
            self.fallback_duration_secs
        } else {
            args.duration_secs
        };
        let interval_secs = (args.interval_ms / 1000).max(1);

        let speed = if speed > 0.0 { speed } else { 1.0 };
        if speed > 1.0 {
            warn!(vod_id, speed, "speeds above 1.0 risk server-side rejection");
        }
        let wait = Duration::from_secs_f64(interval_secs as f64 / speed);

        info!(
            vod_id,
            track_id = args.track_id,
            duration,
            interval_secs,
            "watch parameters decoded"
        );

        // Idle -> Started: one track beacon and one log beacon at position 0.
        let start_track = TrackBeacon::new(&args, TRACK_STATE_START, 0);
        let start_log = LogBeacon::new(&args, LOG_STATE_START, 0);
        if let Err(e) = self.sink.send_track(&start_track).await {
            warn!(vod_id, error = %e, "start track beacon failed");
            return self.fail(vod_id, &mut state);
        }
        if let Err(e) = self.sink.send_log(&start_log).await {
            warn!(vod_id, error = %e, "start log beacon failed");
            return self.fail(vod_id, &mut state);
        }
        state = WatchState::Started;
        debug!(vod_id, ?state, "start beacons acknowledged");

        // Started -> Progressing: paced heartbeats up to the duration.
        state = WatchState::Progressing;
        for position in heartbeat_positions(duration, interval_secs) {
            tokio::time::sleep(wait).await;
            let heartbeat_log = LogBeacon::new(&args, LOG_STATE_HEARTBEAT, position);
            let heartbeat_track = TrackBeacon::new(&args, TRACK_STATE_HEARTBEAT, position);
            if let Err(e) = self.sink.send_log(&heartbeat_log).await {
                warn!(vod_id, position, error = %e, "heartbeat log beacon failed");
                return self.fail(vod_id, &mut state);
            }
            if let Err(e) = self.sink.send_track(&heartbeat_track).await {
                warn!(vod_id, position, error = %e, "heartbeat track beacon failed");
                return self.fail(vod_id, &mut state);
            }
        }

        // Progressing -> Completed: one completion beacon at exactly the
        // duration, never beyond it.
        let complete = TrackBeacon::new(&args, TRACK_STATE_COMPLETE, duration);
        if let Err(e) = self.sink.send_track(&complete).await {
            warn!(vod_id, error = %e, "completion beacon failed");
            return self.fail(vod_id, &mut state);
        }
        state = WatchState::Completed;
        info!(vod_id, ?state, "watch sequence completed");
        true
    }

    fn fail(&self, vod_id: i64, state: &mut WatchState) -> bool {
        *state = WatchState::Failed;
        debug!(vod_id, state = ?*state, "watch sequence failed");
        false
    }

    /// Watch several lectures concurrently through a bounded worker pool.
    /// Lectures are independent units of work; ordering is only enforced
    /// inside each lecture's own beacon sequence.
    pub async fn watch_batch(self: &Arc<Self>, vod_ids: &[i64], speed: f64) -> Vec<(i64, bool)> {
        let semaphore = Arc::new(Semaphore::new(self.watch_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for &vod_id in vod_ids {
            let emulator = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (vod_id, false),
                };
                (vod_id, emulator.watch(vod_id, speed).await)
            });
        }

        let mut results = Vec::with_capacity(vod_ids.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => warn!(error = %e, "watch task aborted"),
            }
        }
        results.sort_by_key(|(vod_id, _)| *vod_id);
        results
    }
}

/// Heartbeat schedule: positions advance by the interval (minimum one
/// second, to avoid a degenerate tight loop) and are clamped to the
/// duration, so the count is ⌈duration/interval⌉ and the last reported
/// position is exactly the duration.
pub fn heartbeat_positions(duration_secs: u64, interval_secs: u64) -> Vec<u64> {
    let step = interval_secs.max(1);
    let mut positions = Vec::new();
    let mut position = 0;
    while position < duration_secs {
        position = (position + step).min(duration_secs);
        positions.push(position);
    }
    positions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_count_is_ceil_of_duration_over_interval() {
        for (duration, interval, expected) in
            [(180, 60, 3), (190, 60, 4), (59, 60, 1), (60, 60, 1), (0, 60, 0)]
        {
            let positions = heartbeat_positions(duration, interval);
            assert_eq!(positions.len(), expected, "D={duration} I={interval}");
            if let Some(last) = positions.last() {
                assert_eq!(*last, duration, "final position is exactly the duration");
            }
        }
    }

    #[test]
    fn positions_never_decrease_and_never_exceed_duration() {
        let positions = heartbeat_positions(1000, 37);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(positions.iter().all(|p| *p <= 1000));
    }

    #[test]
    fn zero_interval_degenerates_to_one_second_steps() {
        assert_eq!(heartbeat_positions(3, 0), vec![1, 2, 3]);
    }
}
