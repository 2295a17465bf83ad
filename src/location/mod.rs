//! Continuous location observation and the current-best city reading.
//!
//! The tracker is the single writer of [`LocationSnapshot`]; every other
//! component reads it through a non-blocking [`CityHandle`]. Geocode lookups
//! complete out of order, so each raw fix is tagged with a monotonically
//! increasing sequence number and a completed lookup is discarded when a
//! lookup for a newer fix has already landed.

pub mod geocode;

use chrono::{DateTime, Utc};
use self::geocode::{GeocodeError, Place};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Latest raw coordinates plus the last successfully resolved city.
///
/// `city` starts out `None` and is never reset once resolved; a stale but
/// valid reading beats blocking on a lookup.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub city: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl Default for LocationSnapshot {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            city: None,
            observed_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

pub struct LocationTracker {
    snapshot: watch::Sender<LocationSnapshot>,
    tracking: bool,
    next_seq: u64,
    // Sequence number of the fix whose city is currently stored.
    resolved_seq: u64,
}

impl LocationTracker {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(LocationSnapshot::default());
        Self {
            snapshot,
            tracking: false,
            next_seq: 0,
            resolved_seq: 0,
        }
    }

    pub fn start(&mut self) {
        self.tracking = true;
        debug!("location tracking started");
    }

    pub fn stop(&mut self) {
        self.tracking = false;
        debug!("location tracking stopped");
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Records a raw provider fix and returns the sequence number to tag the
    /// geocode lookup with. Returns `None` while tracking is stopped.
    pub fn record_fix(&mut self, latitude: f64, longitude: f64) -> Option<u64> {
        if !self.tracking {
            debug!(latitude, longitude, "fix ignored, tracking is stopped");
            return None;
        }
        self.next_seq += 1;
        self.snapshot.send_modify(|s| {
            s.latitude = latitude;
            s.longitude = longitude;
            s.observed_at = Utc::now();
        });
        Some(self.next_seq)
    }

    /// Applies a completed geocode lookup. Returns whether the city changed.
    ///
    /// Results are discarded when tracking has since been stopped or when a
    /// lookup for a newer fix already resolved. A failed lookup leaves the
    /// last known city in place.
    pub fn apply_geocode(&mut self, seq: u64, result: Result<Place, GeocodeError>) -> bool {
        if !self.tracking {
            debug!(seq, "geocode result discarded, tracking is stopped");
            return false;
        }
        match result {
            Ok(place) => {
                if seq < self.resolved_seq {
                    debug!(seq, newest = self.resolved_seq, "stale geocode result discarded");
                    return false;
                }
                self.resolved_seq = seq;
                debug!(seq, city = %place.city, "current city updated");
                self.snapshot.send_modify(|s| s.city = Some(place.city));
                true
            }
            Err(err) => {
                warn!(seq, %err, "geocode lookup failed, keeping last known city");
                false
            }
        }
    }

    /// Latest resolved city, without blocking.
    pub fn current_city(&self) -> Option<String> {
        self.snapshot.borrow().city.clone()
    }

    pub fn city_handle(&self) -> CityHandle {
        CityHandle(self.snapshot.subscribe())
    }
}

impl Default for LocationTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for LocationTracker {
    // Tracking must not outlive the tracker, even on abnormal teardown.
    fn drop(&mut self) {
        if self.tracking {
            self.stop();
        }
    }
}

/// Read-only, non-blocking view of the tracker's snapshot.
#[derive(Clone)]
pub struct CityHandle(watch::Receiver<LocationSnapshot>);

impl CityHandle {
    pub fn current_city(&self) -> Option<String> {
        self.0.borrow().city.clone()
    }

    pub fn snapshot(&self) -> LocationSnapshot {
        self.0.borrow().clone()
    }

    /// Waits for the next snapshot change. Returns `false` once the tracker
    /// is gone and no further change can happen.
    pub async fn changed(&mut self) -> bool {
        self.0.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(city: &str) -> Place {
        Place {
            city: city.to_string(),
            country_code: "AU".to_string(),
            country_name: Some("Australia".to_string()),
        }
    }

    #[test]
    fn city_is_none_until_first_resolution() {
        let mut tracker = LocationTracker::new();
        tracker.start();

        assert_eq!(tracker.current_city(), None);
        let seq = tracker.record_fix(-33.8688, 151.2093).unwrap();
        assert_eq!(tracker.current_city(), None, "no lookup has completed yet");

        assert!(tracker.apply_geocode(seq, Ok(place("Sydney"))));
        assert_eq!(tracker.current_city(), Some("Sydney".to_string()));
    }

    #[test]
    fn fix_is_ignored_while_stopped() {
        let mut tracker = LocationTracker::new();

        assert_eq!(tracker.record_fix(-33.8688, 151.2093), None);
        assert_eq!(tracker.city_handle().snapshot(), LocationSnapshot::default());
    }

    #[test]
    fn stale_completion_does_not_overwrite_newer_city() {
        let mut tracker = LocationTracker::new();
        tracker.start();

        let older = tracker.record_fix(-33.8688, 151.2093).unwrap();
        let newer = tracker.record_fix(-37.8136, 144.9631).unwrap();

        // The newer fix resolves first; the older completion must be dropped.
        assert!(tracker.apply_geocode(newer, Ok(place("Melbourne"))));
        assert!(!tracker.apply_geocode(older, Ok(place("Sydney"))));

        assert_eq!(tracker.current_city(), Some("Melbourne".to_string()));
    }

    #[test]
    fn in_order_completions_follow_the_latest_fix() {
        let mut tracker = LocationTracker::new();
        tracker.start();

        let first = tracker.record_fix(-33.8688, 151.2093).unwrap();
        let second = tracker.record_fix(-37.8136, 144.9631).unwrap();

        assert!(tracker.apply_geocode(first, Ok(place("Sydney"))));
        assert!(tracker.apply_geocode(second, Ok(place("Melbourne"))));

        assert_eq!(tracker.current_city(), Some("Melbourne".to_string()));
    }

    #[test]
    fn failed_lookup_keeps_last_known_city() {
        let mut tracker = LocationTracker::new();
        tracker.start();

        let first = tracker.record_fix(-33.8688, 151.2093).unwrap();
        assert!(tracker.apply_geocode(first, Ok(place("Sydney"))));

        let second = tracker.record_fix(0.0, 0.0).unwrap();
        let lookup_failed = Err(GeocodeError::Lookup("network unreachable".to_string()));
        assert!(!tracker.apply_geocode(second, lookup_failed));

        assert_eq!(tracker.current_city(), Some("Sydney".to_string()));
    }

    #[test]
    fn results_arriving_after_stop_are_discarded() {
        let mut tracker = LocationTracker::new();
        tracker.start();

        let seq = tracker.record_fix(-33.8688, 151.2093).unwrap();
        tracker.stop();

        assert!(!tracker.apply_geocode(seq, Ok(place("Sydney"))));
        assert_eq!(tracker.current_city(), None);
    }

    #[tokio::test]
    async fn handle_observes_city_updates_and_tracker_teardown() {
        let mut tracker = LocationTracker::new();
        tracker.start();
        let mut handle = tracker.city_handle();

        let seq = tracker.record_fix(-33.8688, 151.2093).unwrap();
        tracker.apply_geocode(seq, Ok(place("Sydney")));
        assert!(handle.changed().await);
        assert_eq!(handle.current_city(), Some("Sydney".to_string()));

        drop(tracker);
        assert!(!handle.changed().await);
    }
}
