//! Per-race statistics records handed to external collectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::track::TrackCondition;

/// Why the tick loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// A horse crossed the line.
    Finished,
    AllFallen,
    RoundCap,
    /// Stop was requested.
    Cancelled,
    /// A tick panicked; the race was closed with the best-known winner.
    Aborted,
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Termination::Finished => "finished",
            Termination::AllFallen => "all horses fell",
            Termination::RoundCap => "round cap reached",
            Termination::Cancelled => "cancelled",
            Termination::Aborted => "aborted",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorsePerformance {
    pub horse: String,
    /// Seconds from race start to crossing the line; zero for a did-not-finish.
    pub finish_time: f64,
    pub distance: f64,
    pub fell: bool,
    pub confidence_before: f64,
    pub confidence_after: f64,
    /// 1-based crossing order among finishers, 0 if the horse did not finish.
    pub finishing_position: u32,
    pub average_speed: f64,
    pub completion: f64,
}

impl HorsePerformance {
    pub fn finished(&self) -> bool {
        self.finishing_position > 0
    }

    pub fn confidence_change(&self) -> f64 {
        self.confidence_after - self.confidence_before
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceSummary {
    pub track: String,
    pub condition: TrackCondition,
    pub length: u32,
    pub rounds: u32,
    /// Wall-clock seconds.
    pub duration: f64,
    pub termination: Termination,
    pub winner: Option<String>,
    pub finished_at: DateTime<Utc>,
    pub performances: Vec<HorsePerformance>,
}

impl RaceSummary {
    pub fn performance(&self, horse: &str) -> Option<&HorsePerformance> {
        self.performances.iter().find(|p| p.horse == horse)
    }
}

/// Receives one summary per completed race, from the race task.
pub trait StatisticsSink: Send + Sync {
    fn record(&self, summary: &RaceSummary);
}

/// In-memory sink keeping every summary in arrival order.
#[derive(Debug, Default)]
pub struct StatisticsLog {
    summaries: Mutex<Vec<RaceSummary>>,
}

impl StatisticsLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summaries(&self) -> Vec<RaceSummary> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn wins(&self, horse: &str) -> usize {
        self.lock()
            .iter()
            .filter(|s| s.winner.as_deref() == Some(horse))
            .count()
    }

    pub fn falls(&self, horse: &str) -> usize {
        self.lock()
            .iter()
            .filter_map(|s| s.performance(horse))
            .filter(|p| p.fell)
            .count()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<RaceSummary>> {
        self.summaries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StatisticsSink for StatisticsLog {
    fn record(&self, summary: &RaceSummary) {
        self.lock().push(summary.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perf(horse: &str, fell: bool, position: u32) -> HorsePerformance {
        HorsePerformance {
            horse: horse.into(),
            finish_time: if position > 0 { 2.0 } else { 0.0 },
            distance: 80.0,
            fell,
            confidence_before: 0.5,
            confidence_after: 0.55,
            finishing_position: position,
            average_speed: 40.0,
            completion: 100.0,
        }
    }

    fn summary(winner: &str) -> RaceSummary {
        RaceSummary {
            track: "Downs".into(),
            condition: TrackCondition::Dry,
            length: 80,
            rounds: 40,
            duration: 2.0,
            termination: Termination::Finished,
            winner: Some(winner.into()),
            finished_at: Utc::now(),
            performances: vec![perf("a", false, 1), perf("b", true, 0)],
        }
    }

    #[test]
    fn log_aggregates_by_horse() {
        let log = StatisticsLog::new();
        assert!(log.is_empty());
        log.record(&summary("a"));
        log.record(&summary("b"));
        assert_eq!(log.len(), 2);
        assert_eq!(log.wins("a"), 1);
        assert_eq!(log.falls("b"), 2);
        assert_eq!(log.falls("a"), 0);
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn performance_derived_fields() {
        let p = perf("a", false, 1);
        assert!(p.finished());
        assert!((p.confidence_change() - 0.05).abs() < 1e-12);
        assert!(!perf("b", true, 0).finished());
    }
}
