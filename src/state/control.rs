//! King-of-the-Hill control arbitration: one current holder per station,
//! closed intervals for everything before it, and the per-team aggregation
//! the standings and win checks are computed from.

use std::collections::HashMap;
use std::time::SystemTime;

use dashmap::DashMap;
use uuid::Uuid;

use crate::dao::models::ControlIntervalEntity;

/// Whole seconds between two instants, floored and clamped at zero so clock
/// skew can never produce a negative duration.
pub fn elapsed_secs(from: SystemTime, to: SystemTime) -> u64 {
    to.duration_since(from)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Current holder of a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Holder {
    /// Team currently controlling the station.
    pub team_id: Uuid,
    /// Instant the control interval started.
    pub controlled_at: SystemTime,
}

impl Holder {
    fn close(self, now: SystemTime) -> ClosedInterval {
        ClosedInterval {
            team_id: self.team_id,
            controlled_at: self.controlled_at,
            duration_secs: elapsed_secs(self.controlled_at, now),
        }
    }
}

/// Control interval that has been closed by a handover or session end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedInterval {
    /// Team that held the station over the interval.
    pub team_id: Uuid,
    /// Instant the interval started.
    pub controlled_at: SystemTime,
    /// Interval length in whole seconds.
    pub duration_secs: u64,
}

/// Result of arbitrating a single King-of-the-Hill scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Control changed hands; the previous holder's interval was closed.
    Captured {
        /// Team that held the station before the scan, when any.
        previous: Option<Uuid>,
    },
    /// The scanning team already holds the station; nothing changed.
    Unchanged,
    /// The station is not part of this session's station set.
    UnknownStation,
}

/// Per-team aggregation across every station of the board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeamControlTotal {
    /// Accumulated control time in whole seconds, live intervals included.
    pub seconds: u64,
    /// Number of stations the team currently holds.
    pub held_stations: u32,
}

#[derive(Default, Debug)]
struct StationSlot {
    holder: Option<Holder>,
    closed: Vec<ClosedInterval>,
}

/// Arbitration state of a King-of-the-Hill session.
///
/// Slots live in a [`DashMap`] so scans at different stations proceed in
/// parallel while every read-modify-write of one station runs under that
/// station's entry guard, which is what keeps the one-holder invariant safe
/// under same-station contention.
#[derive(Debug)]
pub struct ControlBoard {
    stations: DashMap<Uuid, StationSlot>,
}

impl ControlBoard {
    /// Build a board seeded with the session's station set. Scans at any
    /// other station are reported as [`CaptureOutcome::UnknownStation`].
    pub fn new(stations: impl IntoIterator<Item = Uuid>) -> Self {
        let slots = DashMap::new();
        for station_id in stations {
            slots.insert(station_id, StationSlot::default());
        }
        Self { stations: slots }
    }

    /// Arbitrate a scan by `team_id` at `station_id`.
    ///
    /// A handover closes the previous holder's interval (floored to whole
    /// seconds, clamped at zero) and installs the scanning team with
    /// `controlled_at = now`. A scan by the current holder changes nothing.
    pub fn record_capture(
        &self,
        station_id: Uuid,
        team_id: Uuid,
        now: SystemTime,
    ) -> CaptureOutcome {
        let Some(mut slot) = self.stations.get_mut(&station_id) else {
            return CaptureOutcome::UnknownStation;
        };

        let mut previous = None;
        if let Some(prior) = slot.holder.take() {
            if prior.team_id == team_id {
                slot.holder = Some(prior);
                return CaptureOutcome::Unchanged;
            }
            previous = Some(prior.team_id);
            let closed = prior.close(now);
            slot.closed.push(closed);
        }

        slot.holder = Some(Holder {
            team_id,
            controlled_at: now,
        });
        CaptureOutcome::Captured { previous }
    }

    /// Current holder of `station_id`, read under the station's guard.
    pub fn holder_of(&self, station_id: Uuid) -> Option<Holder> {
        self.stations
            .get(&station_id)
            .and_then(|slot| slot.holder)
    }

    /// Close every live interval, typically when the session ends, so the
    /// final totals stop accruing.
    pub fn close_all(&self, now: SystemTime) {
        for mut slot in self.stations.iter_mut() {
            if let Some(prior) = slot.holder.take() {
                let closed = prior.close(now);
                slot.closed.push(closed);
            }
        }
    }

    /// Aggregate per-team control totals: the sum of closed interval
    /// durations plus the live interval of each currently held station.
    ///
    /// Each station is read under its entry guard, so a concurrent handover
    /// can never be observed half applied.
    pub fn control_totals(&self, now: SystemTime) -> HashMap<Uuid, TeamControlTotal> {
        let mut totals: HashMap<Uuid, TeamControlTotal> = HashMap::new();

        for slot in self.stations.iter() {
            for interval in &slot.closed {
                totals.entry(interval.team_id).or_default().seconds += interval.duration_secs;
            }
            if let Some(holder) = &slot.holder {
                let entry = totals.entry(holder.team_id).or_default();
                entry.seconds += elapsed_secs(holder.controlled_at, now);
                entry.held_stations += 1;
            }
        }

        totals
    }

    /// Total controlled seconds accumulated at one station, closed intervals
    /// plus the live holder.
    pub fn station_seconds(&self, station_id: Uuid, now: SystemTime) -> u64 {
        self.stations
            .get(&station_id)
            .map(|slot| {
                let closed: u64 = slot.closed.iter().map(|interval| interval.duration_secs).sum();
                let live = slot
                    .holder
                    .as_ref()
                    .map(|holder| elapsed_secs(holder.controlled_at, now))
                    .unwrap_or(0);
                closed + live
            })
            .unwrap_or(0)
    }

    /// Export every interval, closed and live, as persistence entities.
    pub fn export_intervals(&self) -> Vec<ControlIntervalEntity> {
        let mut intervals = Vec::new();
        for entry in self.stations.iter() {
            let station_id = *entry.key();
            for interval in &entry.closed {
                intervals.push(ControlIntervalEntity {
                    station_id,
                    team_id: interval.team_id,
                    controlled_at: interval.controlled_at,
                    duration_secs: interval.duration_secs,
                    is_current: false,
                });
            }
            if let Some(holder) = &entry.holder {
                intervals.push(ControlIntervalEntity {
                    station_id,
                    team_id: holder.team_id,
                    controlled_at: holder.controlled_at,
                    duration_secs: 0,
                    is_current: true,
                });
            }
        }
        intervals
    }
}

/// First team in `evaluation_order` whose total has reached `target_secs`.
///
/// The caller passes team ids sorted ascending, which is the documented
/// tie-break for several teams crossing the threshold in the same tick.
pub fn first_to_threshold(
    totals: &HashMap<Uuid, TeamControlTotal>,
    evaluation_order: &[Uuid],
    target_secs: u64,
) -> Option<Uuid> {
    evaluation_order.iter().copied().find(|team_id| {
        totals
            .get(team_id)
            .is_some_and(|total| total.seconds >= target_secs)
    })
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use super::*;

    fn t(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn team(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn first_capture_installs_holder() {
        let station = Uuid::from_u128(100);
        let board = ControlBoard::new([station]);

        let outcome = board.record_capture(station, team(1), t(0));

        assert_eq!(outcome, CaptureOutcome::Captured { previous: None });
        let holder = board.holder_of(station).unwrap();
        assert_eq!(holder.team_id, team(1));
        assert_eq!(holder.controlled_at, t(0));
    }

    #[test]
    fn same_team_scan_is_unchanged() {
        let station = Uuid::from_u128(100);
        let board = ControlBoard::new([station]);
        board.record_capture(station, team(1), t(0));

        let outcome = board.record_capture(station, team(1), t(10));

        assert_eq!(outcome, CaptureOutcome::Unchanged);
        // The original interval keeps running from its first timestamp.
        assert_eq!(board.holder_of(station).unwrap().controlled_at, t(0));
        assert_eq!(board.station_seconds(station, t(30)), 30);
    }

    #[test]
    fn handover_closes_interval_with_elapsed_seconds() {
        let station = Uuid::from_u128(100);
        let board = ControlBoard::new([station]);
        board.record_capture(station, team(1), t(0));

        let outcome = board.record_capture(station, team(2), t(30));

        assert_eq!(
            outcome,
            CaptureOutcome::Captured {
                previous: Some(team(1))
            }
        );

        let totals = board.control_totals(t(30));
        assert_eq!(totals[&team(1)].seconds, 30);
        assert_eq!(totals[&team(1)].held_stations, 0);
        assert_eq!(totals[&team(2)].seconds, 0);
        assert_eq!(totals[&team(2)].held_stations, 1);
    }

    #[test]
    fn scan_at_station_outside_the_set_is_rejected() {
        let board = ControlBoard::new([Uuid::from_u128(100)]);

        let outcome = board.record_capture(Uuid::from_u128(999), team(1), t(0));

        assert_eq!(outcome, CaptureOutcome::UnknownStation);
    }

    #[test]
    fn clock_skew_clamps_durations_to_zero() {
        let station = Uuid::from_u128(100);
        let board = ControlBoard::new([station]);
        board.record_capture(station, team(1), t(100));

        // Handover with a timestamp before the interval started.
        let outcome = board.record_capture(station, team(2), t(50));
        assert_eq!(
            outcome,
            CaptureOutcome::Captured {
                previous: Some(team(1))
            }
        );

        let totals = board.control_totals(t(50));
        assert_eq!(totals[&team(1)].seconds, 0);
    }

    #[test]
    fn totals_cover_elapsed_time_without_gaps() {
        let station = Uuid::from_u128(100);
        let board = ControlBoard::new([station]);

        board.record_capture(station, team(1), t(0));
        board.record_capture(station, team(2), t(30));
        board.record_capture(station, team(1), t(50));

        // Closed: team1 30s, team2 20s. Live: team1 since t(50).
        let totals = board.control_totals(t(80));
        assert_eq!(totals[&team(1)].seconds, 60);
        assert_eq!(totals[&team(2)].seconds, 20);

        // Closed plus live always equals wall-clock time since the first
        // capture while exactly one holder exists.
        assert_eq!(board.station_seconds(station, t(80)), 80);
    }

    #[test]
    fn totals_aggregate_across_stations() {
        let a = Uuid::from_u128(100);
        let b = Uuid::from_u128(101);
        let board = ControlBoard::new([a, b]);

        board.record_capture(a, team(1), t(0));
        board.record_capture(b, team(1), t(10));

        let totals = board.control_totals(t(40));
        assert_eq!(totals[&team(1)].seconds, 40 + 30);
        assert_eq!(totals[&team(1)].held_stations, 2);
    }

    #[test]
    fn close_all_freezes_totals() {
        let station = Uuid::from_u128(100);
        let board = ControlBoard::new([station]);
        board.record_capture(station, team(1), t(0));

        board.close_all(t(25));

        assert!(board.holder_of(station).is_none());
        let later = board.control_totals(t(500));
        assert_eq!(later[&team(1)].seconds, 25);
    }

    #[test]
    fn threshold_tie_breaks_by_evaluation_order() {
        let mut totals = HashMap::new();
        totals.insert(team(2), TeamControlTotal { seconds: 120, held_stations: 1 });
        totals.insert(team(1), TeamControlTotal { seconds: 120, held_stations: 0 });
        totals.insert(team(3), TeamControlTotal { seconds: 10, held_stations: 0 });

        let order = [team(1), team(2), team(3)];
        assert_eq!(first_to_threshold(&totals, &order, 120), Some(team(1)));
        assert_eq!(first_to_threshold(&totals, &order, 121), None);
    }

    #[test]
    fn concurrent_same_station_scans_serialize() {
        let station = Uuid::from_u128(100);
        let board = std::sync::Arc::new(ControlBoard::new([station]));

        let mut handles = Vec::new();
        for n in 1..=2u128 {
            let board = board.clone();
            handles.push(std::thread::spawn(move || {
                board.record_capture(station, team(n), t(0))
            }));
        }
        let outcomes: Vec<CaptureOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        // Exactly one scan can observe the neutral station; the other must
        // see it already held.
        let neutral_captures = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, CaptureOutcome::Captured { previous: None }))
            .count();
        assert_eq!(neutral_captures, 1);
        assert!(board.holder_of(station).is_some());
    }

    #[test]
    fn export_carries_closed_and_live_rows() {
        let station = Uuid::from_u128(100);
        let board = ControlBoard::new([station]);
        board.record_capture(station, team(1), t(0));
        board.record_capture(station, team(2), t(30));

        let intervals = board.export_intervals();
        assert_eq!(intervals.len(), 2);
        assert_eq!(
            intervals.iter().filter(|row| row.is_current).count(),
            1,
            "exactly one live row per held station"
        );
        let closed = intervals.iter().find(|row| !row.is_current).unwrap();
        assert_eq!(closed.team_id, team(1));
        assert_eq!(closed.duration_secs, 30);
    }
}
