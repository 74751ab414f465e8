//! Tick-level race logic, independent of the task that drives it.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use chrono::Utc;

use super::events::RaceObserver;
use super::stats::{HorsePerformance, RaceSummary, Termination};
use crate::horse::{Horse, HorseSnapshot};
use crate::track::Track;

pub const DEFAULT_MAX_ROUNDS: u32 = 1000;
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Speed multiplier while passing the figure-eight crossing.
pub const CROSSING_SPEED_PENALTY: f64 = 0.7;

pub const WINNER_CONFIDENCE_BOOST: f64 = 1.10;
pub const FALLEN_CONFIDENCE_PENALTY: f64 = 0.95;
pub const CLOSE_FINISH_CONFIDENCE_BOOST: f64 = 1.02;
/// Fraction of the track a non-winner must exceed to earn the close-finish boost.
pub const CLOSE_FINISH_THRESHOLD: f64 = 0.8;

/// Order in which horses are updated each round. The first horse in this
/// order to reach the line wins, so it also decides same-round ties and ties
/// in the greatest-distance fallback.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum TieBreak {
    /// Order in which horses were entered.
    #[default]
    RosterOrder,
    /// Ascending lane index.
    LaneOrder,
}

impl TieBreak {
    fn order(self, entries: &[Entry]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..entries.len()).collect();
        if self == TieBreak::LaneOrder {
            order.sort_by_key(|&i| entries[i].lane);
        }
        order
    }
}

#[derive(Debug, Clone)]
pub struct RaceConfig {
    /// Sleep between rounds; zero runs the loop flat out.
    pub tick_interval: Duration,
    /// Hard cap guaranteeing the loop terminates.
    pub max_rounds: u32,
    pub tie_break: TieBreak,
}

impl Default for RaceConfig {
    fn default() -> Self {
        RaceConfig {
            tick_interval: DEFAULT_TICK_INTERVAL,
            max_rounds: DEFAULT_MAX_ROUNDS,
            tie_break: TieBreak::default(),
        }
    }
}

/// A horse entered in a lane.
#[derive(Debug, Clone)]
pub struct Entry {
    pub horse: Horse,
    pub lane: usize,
}

/// What a concluded race hands back to its owner.
pub struct RaceRun<R> {
    pub entries: Vec<Entry>,
    pub rng: R,
    pub summary: RaceSummary,
}

impl<R> RaceRun<R> {
    pub fn winner_snapshot(&self) -> Option<HorseSnapshot> {
        let winner = self.summary.winner.as_deref()?;
        self.entries
            .iter()
            .find(|e| e.horse.name() == winner)
            .map(|e| e.horse.snapshot())
    }
}

/// Owns the roster, track and generator for the duration of one race.
pub struct RaceEngine<R> {
    track: Track,
    entries: Vec<Entry>,
    order: Vec<usize>,
    rng: R,
    observers: Vec<Arc<dyn RaceObserver>>,
    max_rounds: u32,
    round: u32,
    winner: Option<usize>,
    finishes: Vec<(usize, Duration)>,
    confidence_before: Vec<f64>,
    started: Instant,
}

fn notify(observers: &[Arc<dyn RaceObserver>], f: impl Fn(&dyn RaceObserver)) {
    for observer in observers {
        f(observer.as_ref());
    }
}

/// Call `f` on every listener outside the tick loop. A listener that panics
/// is logged and skipped; the others still run.
pub(super) fn fan_out<T: ?Sized>(listeners: &[Arc<T>], event: &str, f: impl Fn(&T)) {
    for listener in listeners {
        if catch_unwind(AssertUnwindSafe(|| f(listener.as_ref()))).is_err() {
            error!("A race listener panicked handling {}", event);
        }
    }
}

impl<R: Rng> RaceEngine<R> {
    pub fn new(
        track: Track,
        entries: Vec<Entry>,
        rng: R,
        observers: Vec<Arc<dyn RaceObserver>>,
        config: &RaceConfig,
    ) -> Self {
        let order = config.tie_break.order(&entries);
        RaceEngine {
            track,
            entries,
            order,
            rng,
            observers,
            max_rounds: config.max_rounds.max(1),
            round: 0,
            winner: None,
            finishes: Vec::new(),
            confidence_before: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn winner(&self) -> Option<&Horse> {
        self.winner.map(|i| &self.entries[i].horse)
    }

    fn snapshots(&self) -> Vec<HorseSnapshot> {
        self.entries.iter().map(|e| e.horse.snapshot()).collect()
    }

    /// Snapshot pre-race confidence, put every horse back on the start line
    /// and announce the start.
    pub fn begin(&mut self) {
        self.confidence_before = self.entries.iter().map(|e| e.horse.confidence()).collect();
        for entry in &mut self.entries {
            entry.horse.reset_for_race();
            entry
                .horse
                .set_position(self.track.position_at(0.0, entry.lane));
        }
        self.round = 0;
        self.winner = None;
        self.finishes.clear();
        self.started = Instant::now();
        info!(
            "Race started on {} ({}, {}, length {}) with {} horse(s)",
            self.track.name(),
            self.track.shape(),
            self.track.condition(),
            self.track.length(),
            self.entries.len()
        );
        let horses = self.snapshots();
        fan_out(&self.observers, "on_start", |o| o.on_start(&horses));
    }

    /// Play one round. Returns why the race should stop, if it should.
    pub fn tick(&mut self) -> Option<Termination> {
        self.round += 1;
        let condition = self.track.condition();
        let length = self.track.length() as f64;

        for k in 0..self.order.len() {
            let idx = self.order[k];
            let entry = &mut self.entries[idx];
            let horse = &mut entry.horse;
            if horse.has_fallen() {
                continue;
            }

            let distance = horse.distance();
            let curve = self.track.curve_factor(distance);
            let fall_probability =
                condition.fall_probability(horse.confidence(), curve, horse.turn_handling());
            if self.rng.gen::<f64>() < fall_probability {
                horse.fall();
                debug!(
                    "{} fell at {:.1} (p={:.3}, round {})",
                    horse.name(),
                    distance,
                    fall_probability,
                    self.round
                );
                let snapshot = horse.snapshot();
                notify(&self.observers, |o| o.on_fallen(&snapshot));
                continue;
            }

            if self.rng.gen::<f64>() < horse.confidence() {
                if self.track.is_at_crossing(distance) {
                    horse.apply_speed_penalty(CROSSING_SPEED_PENALTY);
                } else {
                    horse.restore_speed();
                }
                let progress = (distance / length).clamp(0.0, 1.0);
                horse.advance(condition.speed_factor(), curve, progress);
                horse.set_position(self.track.position_at(horse.distance(), entry.lane));
            }

            if self.track.is_complete(horse.distance())
                && !self.finishes.iter().any(|&(i, _)| i == idx)
            {
                self.finishes.push((idx, self.started.elapsed()));
                if self.winner.is_none() {
                    self.winner = Some(idx);
                    info!("{} crossed the line first (round {})", horse.name(), self.round);
                    let snapshot = horse.snapshot();
                    notify(&self.observers, |o| o.on_winner(&snapshot));
                }
            }
        }

        if !self.observers.is_empty() {
            let horses = self.snapshots();
            let round = self.round;
            notify(&self.observers, |o| o.on_tick(round, &horses));
        }

        if self.winner.is_some() {
            Some(Termination::Finished)
        } else if self.entries.iter().all(|e| e.horse.has_fallen()) {
            Some(Termination::AllFallen)
        } else if self.round >= self.max_rounds {
            Some(Termination::RoundCap)
        } else {
            None
        }
    }

    /// Tick until the race ends, without pausing.
    pub fn run_to_end(&mut self) -> Termination {
        loop {
            if let Some(termination) = self.tick() {
                return termination;
            }
        }
    }

    /// Greatest distance wins; earlier horses in update order win ties.
    fn furthest(&self) -> Option<usize> {
        let mut best: Option<usize> = None;
        for &idx in &self.order {
            let distance = self.entries[idx].horse.distance();
            match best {
                Some(b) if distance <= self.entries[b].horse.distance() => {}
                _ => best = Some(idx),
            }
        }
        best
    }

    fn apply_confidence_feedback(&mut self) {
        let length = self.track.length() as f64;
        for (idx, entry) in self.entries.iter_mut().enumerate() {
            let horse = &mut entry.horse;
            let is_winner = self.winner == Some(idx);
            if is_winner {
                horse.scale_confidence(WINNER_CONFIDENCE_BOOST);
            }
            if horse.has_fallen() {
                horse.scale_confidence(FALLEN_CONFIDENCE_PENALTY);
            } else if !is_winner && horse.distance() / length > CLOSE_FINISH_THRESHOLD {
                horse.scale_confidence(CLOSE_FINISH_CONFIDENCE_BOOST);
            }
        }
    }

    /// Settle the outcome: fallback winner where needed, confidence
    /// feedback and the summary. Does not announce the end; the caller does
    /// that once the race status is published.
    pub fn conclude(mut self, termination: Termination) -> RaceRun<R> {
        let needs_fallback = matches!(
            termination,
            Termination::AllFallen | Termination::RoundCap | Termination::Aborted
        );
        if self.winner.is_none() && needs_fallback {
            if let Some(idx) = self.furthest() {
                self.winner = Some(idx);
                let horse = &self.entries[idx].horse;
                info!(
                    "{} declared winner by distance ({:.1}) after {}",
                    horse.name(),
                    horse.distance(),
                    termination
                );
                let snapshot = horse.snapshot();
                fan_out(&self.observers, "on_winner", |o| o.on_winner(&snapshot));
            }
        }

        self.apply_confidence_feedback();

        let duration = self.started.elapsed();
        let length = self.track.length() as f64;
        let performances = self
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let horse = &entry.horse;
                let finish = self.finishes.iter().position(|&(i, _)| i == idx);
                let finish_time = finish
                    .map(|pos| self.finishes[pos].1.as_secs_f64())
                    .unwrap_or(0.0);
                let average_speed = if finish_time > 0.0 {
                    horse.distance() / finish_time
                } else {
                    0.0
                };
                HorsePerformance {
                    horse: horse.name().to_string(),
                    finish_time,
                    distance: horse.distance(),
                    fell: horse.has_fallen(),
                    confidence_before: self.confidence_before.get(idx).copied().unwrap_or(0.5),
                    confidence_after: horse.confidence(),
                    finishing_position: finish.map(|pos| pos as u32 + 1).unwrap_or(0),
                    average_speed,
                    completion: (horse.distance() / length * 100.0).min(100.0),
                }
            })
            .collect();

        let winner = self.winner.map(|i| self.entries[i].horse.name().to_string());
        info!(
            "Race on {} ended after {} round(s): {} (winner: {})",
            self.track.name(),
            self.round,
            termination,
            winner.as_deref().unwrap_or("none")
        );

        let summary = RaceSummary {
            track: self.track.name().to_string(),
            condition: self.track.condition(),
            length: self.track.length(),
            rounds: self.round,
            duration: duration.as_secs_f64(),
            termination,
            winner,
            finished_at: Utc::now(),
            performances,
        };

        RaceRun {
            entries: self.entries,
            rng: self.rng,
            summary,
        }
    }
}
