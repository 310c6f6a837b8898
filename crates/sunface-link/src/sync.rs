//! Weather snapshot synchronization over a live [`Session`]
//!
//! Requests are tagged with a monotonic [`RequestId`]. Responses are applied
//! field by field: each snapshot field remembers the id of the response that
//! last set it, and is only overwritten by a newer one. A slow reply can
//! therefore never clobber fresher data, and the final snapshot does not
//! depend on the order in which replies arrive.
//!
//! Push updates are the peer's authoritative latest state. They apply
//! immediately and stamp their fields with the newest issued id.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sunface_core::prelude::*;
use sunface_core::{FetchOutcome, RequestId, WeatherSnapshot};

use crate::session::Session;

/// Timing policy for fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// In-flight requests older than this are treated as failed
    pub request_timeout: Duration,
    /// Wait at least this long after a failed fetch before resyncing
    pub retry_interval: Duration,
    /// Resync once the last successful data is this old
    pub refresh_interval: Duration,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_secs(30),
            refresh_interval: Duration::from_secs(30 * 60),
        }
    }
}

/// What applying a completion did to the snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// At least one field changed; carries the new snapshot
    Updated(WeatherSnapshot),
    /// Accepted, but every value was already current
    Unchanged,
    /// Completion was older than already-applied data and was dropped
    StaleDiscarded { id: RequestId },
    /// Peer reported it has no data for this request
    FetchFailed,
}

/// Id of the response that last set each field (0 = never set)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct FieldStamps {
    high: RequestId,
    low: RequestId,
    icon: RequestId,
}

impl FieldStamps {
    fn newest(&self) -> RequestId {
        self.high.max(self.low).max(self.icon)
    }
}

/// Fetches and holds the latest [`WeatherSnapshot`]
#[derive(Debug, Clone)]
pub struct WeatherSync {
    policy: SyncPolicy,
    snapshot: WeatherSnapshot,
    stamps: FieldStamps,
    last_issued: RequestId,
    /// Issued requests awaiting a reply, with their issue time
    in_flight: BTreeMap<RequestId, DateTime<Utc>>,
    last_attempt_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    failed_since_success: bool,
}

impl Default for WeatherSync {
    fn default() -> Self {
        Self::new(SyncPolicy::default())
    }
}

impl WeatherSync {
    pub fn new(policy: SyncPolicy) -> Self {
        Self {
            policy,
            snapshot: WeatherSnapshot::default(),
            stamps: FieldStamps::default(),
            last_issued: 0,
            in_flight: BTreeMap::new(),
            last_attempt_at: None,
            last_success_at: None,
            failed_since_success: false,
        }
    }

    /// The latest accepted snapshot
    pub fn snapshot(&self) -> &WeatherSnapshot {
        &self.snapshot
    }

    pub fn last_issued(&self) -> RequestId {
        self.last_issued
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Issue a fetch request if the session is usable.
    ///
    /// Best effort: while the session is not `Connected` the request is
    /// silently dropped, nothing is mutated, and `None` is returned. The
    /// caller sends the returned id to the transport.
    pub fn request_snapshot(
        &mut self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> Option<RequestId> {
        if !session.is_usable() {
            trace!("Snapshot request dropped, session {}", session.state());
            return None;
        }

        self.last_issued = self.last_issued.saturating_add(1);
        let id = self.last_issued;
        self.in_flight.insert(id, now);
        self.last_attempt_at = Some(now);
        debug!("Issuing snapshot request #{}", id);
        Some(id)
    }

    /// Apply the completion of request `id`
    pub fn apply_response(
        &mut self,
        id: RequestId,
        outcome: FetchOutcome,
        now: DateTime<Utc>,
    ) -> SyncOutcome {
        if id == 0 || id > self.last_issued {
            warn!(
                "Discarding response for unknown request #{} (last issued #{})",
                id, self.last_issued
            );
            return SyncOutcome::StaleDiscarded { id };
        }
        self.in_flight.remove(&id);

        match outcome {
            FetchOutcome::Snapshot(update) => self.apply_requested(id, update, now),
            FetchOutcome::NoData { message } => {
                // Failures follow the same ordering rule as successes
                if id <= self.stamps.newest() {
                    debug!("Discarding stale failure for request #{}", id);
                    return SyncOutcome::StaleDiscarded { id };
                }
                info!("Peer has no weather data (request #{}): {}", id, message);
                self.failed_since_success = true;
                SyncOutcome::FetchFailed
            }
        }
    }

    /// Apply a peer-initiated update, bypassing the id check
    pub fn apply_push(&mut self, update: WeatherSnapshot, now: DateTime<Utc>) -> SyncOutcome {
        let stamp = self.last_issued;
        let carried = !update.is_empty();
        let mut changed = false;

        if let Some(high) = update.high {
            changed |= self.snapshot.high != Some(high);
            self.snapshot.high = Some(high);
            self.stamps.high = self.stamps.high.max(stamp);
        }
        if let Some(low) = update.low {
            changed |= self.snapshot.low != Some(low);
            self.snapshot.low = Some(low);
            self.stamps.low = self.stamps.low.max(stamp);
        }
        if let Some(icon) = update.icon {
            changed |= self.snapshot.icon.as_ref() != Some(&icon);
            self.snapshot.icon = Some(icon);
            self.stamps.icon = self.stamps.icon.max(stamp);
        }

        if carried {
            self.mark_success(now);
        }
        debug!("Applied push update (changed={})", changed);

        if changed {
            SyncOutcome::Updated(self.snapshot.clone())
        } else {
            SyncOutcome::Unchanged
        }
    }

    /// The session failed; abandon in-flight requests.
    ///
    /// Returns `true` when a request was outstanding, i.e. a fetch failure
    /// must be reported.
    pub fn on_session_failed(&mut self) -> bool {
        if self.in_flight.is_empty() {
            return false;
        }
        debug!(
            "Abandoning {} in-flight request(s) after session failure",
            self.in_flight.len()
        );
        self.in_flight.clear();
        self.failed_since_success = true;
        true
    }

    /// Expire in-flight requests older than the request timeout.
    ///
    /// Returns the expired ids. Late replies to them are still subject to
    /// the ordering rule.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<RequestId> {
        let timeout = to_chrono(self.policy.request_timeout);
        let expired: Vec<RequestId> = self
            .in_flight
            .iter()
            .filter(|(_, issued)| now - **issued >= timeout)
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            self.in_flight.remove(id);
        }
        if !expired.is_empty() {
            warn!("Snapshot request(s) timed out: {:?}", expired);
            self.failed_since_success = true;
        }
        expired
    }

    /// When the oldest in-flight request will expire
    pub fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.in_flight
            .values()
            .min()
            .map(|issued| {
                issued
                    .checked_add_signed(to_chrono(self.policy.request_timeout))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            })
    }

    /// Whether a periodic resync should issue a new request now
    pub fn resync_due(&self, now: DateTime<Utc>) -> bool {
        if !self.in_flight.is_empty() {
            return false;
        }
        if self.failed_since_success {
            return self
                .last_attempt_at
                .map_or(true, |at| now - at >= to_chrono(self.policy.retry_interval));
        }
        match self.last_success_at {
            Some(at) => now - at >= to_chrono(self.policy.refresh_interval),
            None => self.last_attempt_at.is_none(),
        }
    }

    fn apply_requested(
        &mut self,
        id: RequestId,
        update: WeatherSnapshot,
        now: DateTime<Utc>,
    ) -> SyncOutcome {
        if update.is_empty() {
            if id <= self.stamps.newest() {
                return SyncOutcome::StaleDiscarded { id };
            }
            self.mark_success(now);
            return SyncOutcome::Unchanged;
        }

        let mut accepted = false;
        let mut changed = false;

        if let Some(high) = update.high {
            if id > self.stamps.high {
                accepted = true;
                changed |= self.snapshot.high != Some(high);
                self.snapshot.high = Some(high);
                self.stamps.high = id;
            }
        }
        if let Some(low) = update.low {
            if id > self.stamps.low {
                accepted = true;
                changed |= self.snapshot.low != Some(low);
                self.snapshot.low = Some(low);
                self.stamps.low = id;
            }
        }
        if let Some(icon) = update.icon {
            if id > self.stamps.icon {
                accepted = true;
                changed |= self.snapshot.icon.as_ref() != Some(&icon);
                self.snapshot.icon = Some(icon);
                self.stamps.icon = id;
            }
        }

        if !accepted {
            debug!("Discarding stale response for request #{}", id);
            return SyncOutcome::StaleDiscarded { id };
        }

        self.mark_success(now);
        if changed {
            SyncOutcome::Updated(self.snapshot.clone())
        } else {
            SyncOutcome::Unchanged
        }
    }

    fn mark_success(&mut self, now: DateTime<Utc>) {
        self.last_success_at = Some(now);
        self.failed_since_success = false;
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sunface_core::WeatherIcon;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn secs(n: i64) -> chrono::Duration {
        chrono::Duration::seconds(n)
    }

    fn connected() -> Session {
        let mut session = Session::default();
        let attempt = session.connect().unwrap();
        session.on_connected(attempt).unwrap();
        session
    }

    fn temps(high: f64, low: f64) -> FetchOutcome {
        FetchOutcome::Snapshot(WeatherSnapshot::temperatures(high, low))
    }

    fn icon(tag: &str) -> WeatherIcon {
        WeatherIcon::new(tag.as_bytes().to_vec())
    }

    #[test]
    fn test_request_dropped_when_session_not_connected() {
        let mut sync = WeatherSync::default();
        let session = Session::default();

        assert_eq!(sync.request_snapshot(&session, t0()), None);
        assert_eq!(sync.last_issued(), 0);
        assert_eq!(sync.in_flight_count(), 0);
        assert!(sync.resync_due(t0()));
    }

    #[test]
    fn test_request_ids_are_monotonic_from_one() {
        let mut sync = WeatherSync::default();
        let session = connected();

        assert_eq!(sync.request_snapshot(&session, t0()), Some(1));
        assert_eq!(sync.request_snapshot(&session, t0()), Some(2));
        assert_eq!(sync.in_flight_count(), 2);
    }

    #[test]
    fn test_response_updates_snapshot() {
        let mut sync = WeatherSync::default();
        let id = sync.request_snapshot(&connected(), t0()).unwrap();

        let outcome = sync.apply_response(id, temps(20.0, 10.0), t0());

        let expected = WeatherSnapshot::temperatures(20.0, 10.0);
        assert_eq!(outcome, SyncOutcome::Updated(expected.clone()));
        assert_eq!(*sync.snapshot(), expected);
        assert_eq!(sync.in_flight_count(), 0);
    }

    #[test]
    fn test_older_response_after_newer_is_discarded() {
        let mut sync = WeatherSync::default();
        let session = connected();
        let first = sync.request_snapshot(&session, t0()).unwrap();
        let second = sync.request_snapshot(&session, t0()).unwrap();

        sync.apply_response(second, temps(25.0, 15.0), t0());
        let outcome = sync.apply_response(first, temps(20.0, 10.0), t0());

        assert_eq!(outcome, SyncOutcome::StaleDiscarded { id: first });
        assert_eq!(*sync.snapshot(), WeatherSnapshot::temperatures(25.0, 15.0));
    }

    #[test]
    fn test_unknown_request_ids_are_discarded() {
        let mut sync = WeatherSync::default();
        let id = sync.request_snapshot(&connected(), t0()).unwrap();
        sync.apply_response(id, temps(20.0, 10.0), t0());

        assert_eq!(
            sync.apply_response(0, temps(1.0, 0.0), t0()),
            SyncOutcome::StaleDiscarded { id: 0 }
        );
        assert_eq!(
            sync.apply_response(9, temps(1.0, 0.0), t0()),
            SyncOutcome::StaleDiscarded { id: 9 }
        );
        assert_eq!(*sync.snapshot(), WeatherSnapshot::temperatures(20.0, 10.0));
    }

    #[test]
    fn test_arrival_order_does_not_change_final_snapshot() {
        let responses = vec![
            (1, WeatherSnapshot::temperatures(18.0, 9.0)),
            (2, WeatherSnapshot::icon_only(icon("cloudy"))),
            (3, WeatherSnapshot::temperatures(21.0, 11.0)),
            (4, WeatherSnapshot::temperatures(22.0, 12.0).with_icon(icon("sunny"))),
            (5, WeatherSnapshot::icon_only(icon("rain"))),
        ];
        let orders: [[usize; 5]; 4] = [
            [0, 1, 2, 3, 4],
            [4, 3, 2, 1, 0],
            [2, 0, 4, 1, 3],
            [1, 4, 0, 3, 2],
        ];

        let mut finals = Vec::new();
        for order in orders {
            let mut sync = WeatherSync::default();
            let session = connected();
            for _ in 0..responses.len() {
                sync.request_snapshot(&session, t0());
            }
            for idx in order {
                let (id, snap) = responses[idx].clone();
                sync.apply_response(id, FetchOutcome::Snapshot(snap), t0());
            }
            finals.push(sync.snapshot().clone());
        }

        let expected = WeatherSnapshot::temperatures(22.0, 12.0).with_icon(icon("rain"));
        for snapshot in finals {
            assert_eq!(snapshot, expected);
        }
    }

    #[test]
    fn test_partial_response_merges() {
        let mut sync = WeatherSync::default();
        let session = connected();
        let first = sync.request_snapshot(&session, t0()).unwrap();
        sync.apply_response(first, temps(20.0, 10.0), t0());

        let second = sync.request_snapshot(&session, t0()).unwrap();
        let outcome = sync.apply_response(
            second,
            FetchOutcome::Snapshot(WeatherSnapshot::icon_only(icon("sunny"))),
            t0(),
        );

        let expected = WeatherSnapshot::temperatures(20.0, 10.0).with_icon(icon("sunny"));
        assert_eq!(outcome, SyncOutcome::Updated(expected));
    }

    #[test]
    fn test_icon_push_keeps_temperatures() {
        let mut sync = WeatherSync::default();
        let id = sync.request_snapshot(&connected(), t0()).unwrap();
        sync.apply_response(id, temps(20.0, 10.0), t0());

        sync.apply_push(WeatherSnapshot::icon_only(icon("storm")), t0());

        assert_eq!(sync.snapshot().high, Some(20.0));
        assert_eq!(sync.snapshot().low, Some(10.0));
        assert_eq!(sync.snapshot().icon, Some(icon("storm")));
    }

    #[test]
    fn test_push_applies_while_disconnected() {
        let mut sync = WeatherSync::default();
        let outcome = sync.apply_push(WeatherSnapshot::temperatures(5.0, -2.0), t0());
        assert_eq!(
            outcome,
            SyncOutcome::Updated(WeatherSnapshot::temperatures(5.0, -2.0))
        );
    }

    #[test]
    fn test_reply_issued_before_push_cannot_overwrite_it() {
        let mut sync = WeatherSync::default();
        let id = sync.request_snapshot(&connected(), t0()).unwrap();
        sync.apply_push(WeatherSnapshot::temperatures(30.0, 20.0), t0());

        let outcome = sync.apply_response(id, temps(10.0, 5.0), t0());

        assert_eq!(outcome, SyncOutcome::StaleDiscarded { id });
        assert_eq!(sync.snapshot().high, Some(30.0));
    }

    #[test]
    fn test_identical_response_is_unchanged() {
        let mut sync = WeatherSync::default();
        let session = connected();
        let first = sync.request_snapshot(&session, t0()).unwrap();
        sync.apply_response(first, temps(20.0, 10.0), t0());
        let second = sync.request_snapshot(&session, t0()).unwrap();

        assert_eq!(
            sync.apply_response(second, temps(20.0, 10.0), t0()),
            SyncOutcome::Unchanged
        );
    }

    #[test]
    fn test_no_data_is_fetch_failure_without_snapshot_change() {
        let mut sync = WeatherSync::default();
        let session = connected();
        let first = sync.request_snapshot(&session, t0()).unwrap();
        sync.apply_response(first, temps(20.0, 10.0), t0());
        let second = sync.request_snapshot(&session, t0()).unwrap();

        let outcome = sync.apply_response(
            second,
            FetchOutcome::NoData {
                message: "no forecast".to_string(),
            },
            t0(),
        );

        assert_eq!(outcome, SyncOutcome::FetchFailed);
        assert_eq!(*sync.snapshot(), WeatherSnapshot::temperatures(20.0, 10.0));
    }

    #[test]
    fn test_stale_failure_is_discarded() {
        let mut sync = WeatherSync::default();
        let session = connected();
        let first = sync.request_snapshot(&session, t0()).unwrap();
        let second = sync.request_snapshot(&session, t0()).unwrap();
        sync.apply_response(second, temps(20.0, 10.0), t0());

        let outcome = sync.apply_response(
            first,
            FetchOutcome::NoData {
                message: "late".to_string(),
            },
            t0(),
        );
        assert_eq!(outcome, SyncOutcome::StaleDiscarded { id: first });
    }

    #[test]
    fn test_session_failure_abandons_in_flight() {
        let mut sync = WeatherSync::default();
        assert!(!sync.on_session_failed());

        sync.request_snapshot(&connected(), t0());
        assert!(sync.on_session_failed());
        assert_eq!(sync.in_flight_count(), 0);
        assert!(!sync.on_session_failed());
    }

    #[test]
    fn test_expire_times_out_old_requests() {
        let mut sync = WeatherSync::default();
        let session = connected();
        let first = sync.request_snapshot(&session, t0()).unwrap();
        let second = sync.request_snapshot(&session, t0() + secs(5)).unwrap();

        assert_eq!(sync.next_expiry(), Some(t0() + secs(10)));
        assert!(sync.expire(t0() + secs(9)).is_empty());
        assert_eq!(sync.expire(t0() + secs(10)), vec![first]);
        assert_eq!(sync.next_expiry(), Some(t0() + secs(15)));
        assert_eq!(sync.expire(t0() + secs(15)), vec![second]);
        assert_eq!(sync.next_expiry(), None);
    }

    #[test]
    fn test_unrepresentable_timeout_never_expires() {
        let mut sync = WeatherSync::new(SyncPolicy {
            request_timeout: Duration::from_millis(u64::MAX),
            ..SyncPolicy::default()
        });
        sync.request_snapshot(&connected(), t0()).unwrap();

        assert_eq!(sync.next_expiry(), Some(DateTime::<Utc>::MAX_UTC));
        assert!(sync.expire(t0() + secs(365 * 24 * 3600)).is_empty());
        assert_eq!(sync.in_flight_count(), 1);
    }

    #[test]
    fn test_late_reply_after_timeout_still_applies() {
        let mut sync = WeatherSync::default();
        let id = sync.request_snapshot(&connected(), t0()).unwrap();
        sync.expire(t0() + secs(10));

        let outcome = sync.apply_response(id, temps(20.0, 10.0), t0() + secs(11));
        assert!(matches!(outcome, SyncOutcome::Updated(_)));
    }

    #[test]
    fn test_resync_policy() {
        let mut sync = WeatherSync::default();
        let session = connected();
        assert!(sync.resync_due(t0()));

        let id = sync.request_snapshot(&session, t0()).unwrap();
        assert!(!sync.resync_due(t0()));

        sync.apply_response(
            id,
            FetchOutcome::NoData {
                message: "none".to_string(),
            },
            t0(),
        );
        assert!(!sync.resync_due(t0() + secs(29)));
        assert!(sync.resync_due(t0() + secs(30)));

        let id = sync.request_snapshot(&session, t0() + secs(30)).unwrap();
        sync.apply_response(id, temps(20.0, 10.0), t0() + secs(31));
        assert!(!sync.resync_due(t0() + secs(60)));
        assert!(sync.resync_due(t0() + secs(31 + 30 * 60)));
    }
}
