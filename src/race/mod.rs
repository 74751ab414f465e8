//! Race lifecycle: roster management, the PENDING → IN_PROGRESS → COMPLETED
//! state machine, and the background task that drives the tick loop.
//!
//! While a race runs, the roster and the generator are moved into the task,
//! which is their only mutator. [`RaceManager::wait`] is the join point that
//! hands them back. Status changes are published on a `watch` channel so
//! other components (the betting service) can observe the phase without
//! holding a reference to the manager. The track and roster are published
//! the same way as a [`RaceCard`], so a betting book can price the field the
//! race will actually run.

pub mod engine;
pub mod events;
pub mod stats;

pub use engine::{Entry, RaceConfig, RaceEngine, RaceRun, TieBreak};

use engine::fan_out;
pub use events::{ChannelObserver, RaceEvent, RaceObserver};
pub use stats::{HorsePerformance, RaceSummary, StatisticsLog, StatisticsSink, Termination};

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::error::RaceError;
use crate::horse::Horse;
use crate::track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RaceStatus {
    Pending,
    InProgress,
    Completed,
}

impl std::fmt::Display for RaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RaceStatus::Pending => "PENDING",
            RaceStatus::InProgress => "IN_PROGRESS",
            RaceStatus::Completed => "COMPLETED",
        })
    }
}

/// The field as it stands: the track and the entered horses in roster
/// order. Republished whenever either changes between races.
#[derive(Debug, Clone)]
pub struct RaceCard {
    pub track: Track,
    pub horses: Vec<Horse>,
}

impl RaceCard {
    fn of(track: &Track, roster: &[Entry]) -> Self {
        RaceCard {
            track: track.clone(),
            horses: roster.iter().map(|e| e.horse.clone()).collect(),
        }
    }
}

/// Mutable access to the manager's track. The card is republished when the
/// guard is dropped.
pub struct TrackMut<'a> {
    track: &'a mut Track,
    roster: &'a [Entry],
    card: &'a watch::Sender<RaceCard>,
}

impl Deref for TrackMut<'_> {
    type Target = Track;

    fn deref(&self) -> &Track {
        &*self.track
    }
}

impl DerefMut for TrackMut<'_> {
    fn deref_mut(&mut self) -> &mut Track {
        &mut *self.track
    }
}

impl Drop for TrackMut<'_> {
    fn drop(&mut self) {
        self.card.send_replace(RaceCard::of(&*self.track, self.roster));
    }
}

/// Mutable access to one entered horse, e.g. to change its kit. The card is
/// republished when the guard is dropped.
pub struct HorseMut<'a> {
    roster: &'a mut [Entry],
    index: usize,
    track: &'a Track,
    card: &'a watch::Sender<RaceCard>,
}

impl Deref for HorseMut<'_> {
    type Target = Horse;

    fn deref(&self) -> &Horse {
        &self.roster[self.index].horse
    }
}

impl DerefMut for HorseMut<'_> {
    fn deref_mut(&mut self) -> &mut Horse {
        &mut self.roster[self.index].horse
    }
}

impl Drop for HorseMut<'_> {
    fn drop(&mut self) {
        self.card.send_replace(RaceCard::of(self.track, &*self.roster));
    }
}

/// Cloneable stop signal for a running race.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    /// Returns false if the race task has already gone away.
    pub fn stop(&self) -> bool {
        self.0.send(true).is_ok()
    }
}

pub struct RaceManager<R = StdRng> {
    track: Track,
    roster: Vec<Entry>,
    rng: Option<R>,
    config: RaceConfig,
    observers: Vec<Arc<dyn RaceObserver>>,
    sinks: Vec<Arc<dyn StatisticsSink>>,
    status: Arc<watch::Sender<RaceStatus>>,
    card: watch::Sender<RaceCard>,
    stop: Option<StopHandle>,
    task: Option<JoinHandle<RaceRun<R>>>,
    winner: Option<String>,
    last_summary: Option<RaceSummary>,
}

impl<R> RaceManager<R>
where
    R: Rng + Send + 'static,
{
    pub fn new(track: Track, rng: R, config: RaceConfig) -> Self {
        let (status, _) = watch::channel(RaceStatus::Pending);
        let (card, _) = watch::channel(RaceCard::of(&track, &[]));
        RaceManager {
            card,
            track,
            roster: Vec::new(),
            rng: Some(rng),
            config,
            observers: Vec::new(),
            sinks: Vec::new(),
            status: Arc::new(status),
            stop: None,
            task: None,
            winner: None,
            last_summary: None,
        }
    }

    pub fn status(&self) -> RaceStatus {
        *self.status.borrow()
    }

    /// A receiver following every status change.
    pub fn subscribe_status(&self) -> watch::Receiver<RaceStatus> {
        self.status.subscribe()
    }

    /// A receiver following the track and roster. It is not updated while
    /// a race is running; the returned roster is published at the join.
    pub fn subscribe_card(&self) -> watch::Receiver<RaceCard> {
        self.card.subscribe()
    }

    fn publish_card(&self) {
        self.card.send_replace(RaceCard::of(&self.track, &self.roster));
    }

    pub fn config(&self) -> &RaceConfig {
        &self.config
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn add_observer(&mut self, observer: Arc<dyn RaceObserver>) {
        self.observers.push(observer);
    }

    pub fn add_statistics_sink(&mut self, sink: Arc<dyn StatisticsSink>) {
        self.sinks.push(sink);
    }

    fn ensure_pending(&self) -> Result<(), RaceError> {
        if self.task.is_some() {
            return Err(RaceError::NotPending(RaceStatus::InProgress));
        }
        match self.status() {
            RaceStatus::Pending => Ok(()),
            status => Err(RaceError::NotPending(status)),
        }
    }

    /// Swap the track. Every entered lane must exist on the new one.
    pub fn set_track(&mut self, track: Track) -> Result<(), RaceError> {
        self.ensure_pending()?;
        if let Some(entry) = self.roster.iter().find(|e| e.lane >= track.lanes()) {
            return Err(RaceError::LaneOutOfRange {
                lane: entry.lane,
                lanes: track.lanes(),
            });
        }
        self.track = track;
        self.publish_card();
        Ok(())
    }

    /// Mutable track access for condition, length or lane changes between
    /// races.
    pub fn track_mut(&mut self) -> Result<TrackMut<'_>, RaceError> {
        self.ensure_pending()?;
        Ok(TrackMut {
            track: &mut self.track,
            roster: &self.roster,
            card: &self.card,
        })
    }

    pub fn add_horse(&mut self, horse: Horse, lane: usize) -> Result<(), RaceError> {
        self.ensure_pending()?;
        if lane >= self.track.lanes() {
            return Err(RaceError::LaneOutOfRange {
                lane,
                lanes: self.track.lanes(),
            });
        }
        if self.roster.iter().any(|e| e.lane == lane) {
            return Err(RaceError::LaneOccupied(lane));
        }
        if self.roster.iter().any(|e| e.horse.name() == horse.name()) {
            return Err(RaceError::DuplicateHorse(horse.name().to_string()));
        }
        info!("{} entered in lane {}", horse.name(), lane);
        self.roster.push(Entry { horse, lane });
        self.publish_card();
        Ok(())
    }

    pub fn remove_horse(&mut self, name: &str) -> Result<Option<Horse>, RaceError> {
        self.ensure_pending()?;
        let index = self.roster.iter().position(|e| e.horse.name() == name);
        let removed = index.map(|i| self.roster.remove(i).horse);
        if removed.is_some() {
            self.publish_card();
        }
        Ok(removed)
    }

    pub fn lane_of(&self, name: &str) -> Option<usize> {
        self.roster
            .iter()
            .find(|e| e.horse.name() == name)
            .map(|e| e.lane)
    }

    /// Entered horses in roster order. Empty while a race task holds them.
    pub fn horses(&self) -> impl Iterator<Item = &Horse> {
        self.roster.iter().map(|e| &e.horse)
    }

    pub fn horse(&self, name: &str) -> Option<&Horse> {
        self.horses().find(|h| h.name() == name)
    }

    pub fn horse_mut(&mut self, name: &str) -> Option<HorseMut<'_>> {
        let index = self.roster.iter().position(|e| e.horse.name() == name)?;
        Some(HorseMut {
            roster: &mut self.roster,
            index,
            track: &self.track,
            card: &self.card,
        })
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn last_summary(&self) -> Option<&RaceSummary> {
        self.last_summary.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start the race on a background task. Returns immediately; the race is
    /// IN_PROGRESS and `on_start` has fired by the time this returns.
    ///
    /// Must be called from within a Tokio runtime; otherwise nothing changes
    /// and [`RaceError::NoRuntime`] is returned.
    pub fn start(&mut self) -> Result<(), RaceError> {
        if self.task.is_some() || self.status() == RaceStatus::InProgress {
            return Err(RaceError::AlreadyRunning);
        }
        if self.status() != RaceStatus::Pending {
            return Err(RaceError::NotPending(self.status()));
        }
        if self.roster.is_empty() {
            return Err(RaceError::EmptyRoster);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RaceError::NoRuntime)?;
        let rng = self.rng.take().ok_or(RaceError::Unjoined)?;

        let mut engine = RaceEngine::new(
            self.track.clone(),
            std::mem::take(&mut self.roster),
            rng,
            self.observers.clone(),
            &self.config,
        );
        self.winner = None;
        self.status.send_replace(RaceStatus::InProgress);
        engine.begin();

        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop = Some(StopHandle(Arc::new(stop_tx)));
        self.task = Some(runtime.spawn(drive(
            engine,
            stop_rx,
            self.config.tick_interval,
            self.status.clone(),
            self.observers.clone(),
            self.sinks.clone(),
        )));
        Ok(())
    }

    /// Ask the running race to stop. The loop notices at the next round
    /// boundary, so one more round may still be played. Returns whether a
    /// race was signalled.
    pub fn stop(&self) -> bool {
        match &self.stop {
            Some(handle) if self.task.is_some() => {
                info!("Stop requested for race on {}", self.track.name());
                handle.stop()
            }
            _ => false,
        }
    }

    /// A stop signal usable from another task while this manager is busy
    /// in [`RaceManager::wait`]. `None` when no race has been started.
    pub fn stop_handle(&self) -> Option<StopHandle> {
        self.stop.clone()
    }

    /// Join the race task and take the roster back.
    pub async fn wait(&mut self) -> Result<RaceSummary, RaceError> {
        let task = self.task.take().ok_or(RaceError::NotStarted)?;
        let joined = task.await;
        self.stop = None;
        match joined {
            Ok(run) => {
                self.roster = run.entries;
                self.rng = Some(run.rng);
                self.winner = run.summary.winner.clone();
                self.last_summary = Some(run.summary.clone());
                self.publish_card();
                Ok(run.summary)
            }
            Err(err) => {
                // The roster went down with the task.
                error!("Race task failed: {}", err);
                self.status.send_replace(RaceStatus::Completed);
                Err(RaceError::Join(err.to_string()))
            }
        }
    }

    /// Start and wait. Needs a Tokio runtime, like [`RaceManager::start`].
    pub async fn run(&mut self) -> Result<RaceSummary, RaceError> {
        self.start()?;
        self.wait().await
    }

    /// Back to PENDING so the roster can race again. Confidence is kept.
    pub fn reset(&mut self) -> Result<(), RaceError> {
        if self.task.is_some() {
            return Err(if self.status() == RaceStatus::InProgress {
                RaceError::AlreadyRunning
            } else {
                RaceError::Unjoined
            });
        }
        for entry in &mut self.roster {
            entry.horse.reset_for_race();
        }
        self.winner = None;
        self.status.send_replace(RaceStatus::Pending);
        Ok(())
    }
}

async fn drive<R: Rng>(
    mut engine: RaceEngine<R>,
    mut stop: watch::Receiver<bool>,
    tick_interval: std::time::Duration,
    status: Arc<watch::Sender<RaceStatus>>,
    observers: Vec<Arc<dyn RaceObserver>>,
    sinks: Vec<Arc<dyn StatisticsSink>>,
) -> RaceRun<R> {
    let termination = loop {
        if *stop.borrow() {
            break Termination::Cancelled;
        }
        match catch_unwind(AssertUnwindSafe(|| engine.tick())) {
            Ok(Some(termination)) => break termination,
            Ok(None) => {}
            Err(_) => {
                error!("Race tick {} panicked; closing the race", engine.round());
                break Termination::Aborted;
            }
        }
        if tick_interval.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::select! {
                _ = tokio::time::sleep(tick_interval) => {}
                Ok(()) = stop.changed() => {}
            }
        }
    };

    if termination == Termination::RoundCap {
        warn!("Race hit the round cap after {} rounds", engine.round());
    }

    let run = engine.conclude(termination);
    status.send_replace(RaceStatus::Completed);
    fan_out(&sinks, "record", |sink| sink.record(&run.summary));
    let winner = run.winner_snapshot();
    fan_out(&observers, "on_end", |o| o.on_end(winner.as_ref()));
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::horse::{Attributes, HorseSnapshot};
    use crate::track::{TrackCondition, TrackShape};
    use rand::rngs::mock::StepRng;
    use std::sync::Mutex;
    use std::time::Duration;

    fn horse(name: &str, confidence: f64) -> Horse {
        Horse::with_attributes(
            name,
            name.chars().next().unwrap_or('?'),
            confidence,
            Attributes {
                base_speed: 1.0,
                turn_handling: 1.0,
                stamina: 1.0,
                luck: 0.5,
            },
        )
    }

    fn fast_config() -> RaceConfig {
        RaceConfig {
            tick_interval: Duration::ZERO,
            ..RaceConfig::default()
        }
    }

    fn manager(length: u32, rng: StepRng) -> RaceManager<StepRng> {
        let track = Track::new("Downs", TrackShape::Oval, length, 3, TrackCondition::Dry).unwrap();
        RaceManager::new(track, rng, fast_config())
    }

    #[derive(Default)]
    struct Ordering(Mutex<Vec<String>>);

    impl RaceObserver for Ordering {
        fn on_start(&self, _: &[HorseSnapshot]) {
            self.0.lock().unwrap().push("start".into());
        }
        fn on_winner(&self, h: &HorseSnapshot) {
            self.0.lock().unwrap().push(format!("winner:{}", h.name));
        }
        fn on_end(&self, w: Option<&HorseSnapshot>) {
            let name = w.map(|h| h.name.clone()).unwrap_or_default();
            self.0.lock().unwrap().push(format!("end:{name}"));
        }
    }

    struct PanicsOnTick;

    impl RaceObserver for PanicsOnTick {
        fn on_tick(&self, round: u32, _: &[HorseSnapshot]) {
            if round == 3 {
                panic!("observer blew up");
            }
        }
    }

    #[tokio::test]
    async fn lifecycle_runs_forward_and_requires_reset() {
        let mut race = manager(50, StepRng::new(u64::MAX, 0));
        let observer = Arc::new(Ordering::default());
        let log = Arc::new(StatisticsLog::new());
        race.add_observer(observer.clone());
        race.add_statistics_sink(log.clone());
        race.add_horse(horse("Solo", 1.0), 0).unwrap();
        let mut status = race.subscribe_status();
        assert_eq!(*status.borrow_and_update(), RaceStatus::Pending);

        race.start().unwrap();
        assert_eq!(race.start(), Err(RaceError::AlreadyRunning));
        assert!(race.horses().next().is_none());

        let summary = race.wait().await.unwrap();
        assert_eq!(summary.winner.as_deref(), Some("Solo"));
        assert_eq!(race.status(), RaceStatus::Completed);
        assert_eq!(race.winner(), Some("Solo"));
        assert_eq!(log.len(), 1);
        assert_eq!(
            *observer.0.lock().unwrap(),
            vec!["start", "winner:Solo", "end:Solo"]
        );

        // Confidence feedback persisted on the returned roster.
        assert_eq!(race.horse("Solo").unwrap().confidence(), 1.0);
        assert_eq!(race.start(), Err(RaceError::NotPending(RaceStatus::Completed)));
        assert!(race.add_horse(horse("Late", 0.5), 1).is_err());

        race.reset().unwrap();
        assert_eq!(race.status(), RaceStatus::Pending);
        assert_eq!(race.horse("Solo").unwrap().distance(), 0.0);
        assert!(race.run().await.is_ok());
    }

    #[tokio::test]
    async fn empty_roster_and_unstarted_joins_are_rejected() {
        let mut race = manager(50, StepRng::new(0, 0));
        assert_eq!(race.start(), Err(RaceError::EmptyRoster));
        assert_eq!(race.status(), RaceStatus::Pending);
        assert_eq!(race.wait().await.unwrap_err(), RaceError::NotStarted);
        assert!(!race.stop());
    }

    #[tokio::test]
    async fn roster_validation() {
        let mut race = manager(50, StepRng::new(0, 0));
        race.add_horse(horse("A", 0.5), 0).unwrap();
        assert_eq!(
            race.add_horse(horse("B", 0.5), 3),
            Err(RaceError::LaneOutOfRange { lane: 3, lanes: 3 })
        );
        assert_eq!(race.add_horse(horse("B", 0.5), 0), Err(RaceError::LaneOccupied(0)));
        assert_eq!(
            race.add_horse(horse("A", 0.5), 1),
            Err(RaceError::DuplicateHorse("A".into()))
        );
        race.add_horse(horse("B", 0.5), 2).unwrap();
        assert_eq!(race.lane_of("B"), Some(2));

        let narrow = Track::new("Narrow", TrackShape::Zigzag, 80, 2, TrackCondition::Wet).unwrap();
        assert_eq!(
            race.set_track(narrow.clone()),
            Err(RaceError::LaneOutOfRange { lane: 2, lanes: 2 })
        );
        assert!(race.remove_horse("B").unwrap().is_some());
        assert!(race.remove_horse("B").unwrap().is_none());
        race.set_track(narrow).unwrap();
        assert_eq!(race.track().shape(), TrackShape::Zigzag);

        race.track_mut().unwrap().set_condition(TrackCondition::Icy);
        assert_eq!(race.track().condition(), TrackCondition::Icy);
    }

    #[tokio::test]
    async fn stop_ends_the_race_without_a_winner() {
        // Confidence zero never advances and a near-1.0 draw never falls, so
        // the race would otherwise run to the cap.
        let track = Track::new("Downs", TrackShape::Oval, 50, 3, TrackCondition::Dry).unwrap();
        let config = RaceConfig {
            tick_interval: Duration::from_millis(5),
            max_rounds: 100_000,
            ..RaceConfig::default()
        };
        let mut race = RaceManager::new(track, StepRng::new(u64::MAX, 0), config);
        race.add_horse(horse("Idle", 0.0), 0).unwrap();
        assert!(race.stop_handle().is_none());
        race.start().unwrap();
        let handle = race.stop_handle().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(race.stop());
        assert!(handle.stop());
        let summary = race.wait().await.unwrap();
        assert_eq!(summary.termination, Termination::Cancelled);
        assert_eq!(summary.winner, None);
        assert_eq!(race.status(), RaceStatus::Completed);
    }

    #[tokio::test]
    async fn panicking_tick_aborts_to_completed() {
        let mut race = manager(1000, StepRng::new(u64::MAX, 0));
        race.add_observer(Arc::new(PanicsOnTick));
        race.add_horse(horse("A", 1.0), 0).unwrap();
        race.add_horse(horse("B", 0.0), 1).unwrap();
        race.start().unwrap();
        let summary = race.wait().await.unwrap();
        assert_eq!(summary.termination, Termination::Aborted);
        assert_eq!(summary.rounds, 3);
        assert_eq!(summary.winner.as_deref(), Some("A"));
        assert_eq!(race.status(), RaceStatus::Completed);
        assert_eq!(race.horses().count(), 2);
    }

    struct PanicsAtTheEnd;

    impl RaceObserver for PanicsAtTheEnd {
        fn on_end(&self, _: Option<&HorseSnapshot>) {
            panic!("end observer blew up");
        }
    }

    struct PanickingSink;

    impl StatisticsSink for PanickingSink {
        fn record(&self, _: &RaceSummary) {
            panic!("sink blew up");
        }
    }

    #[tokio::test]
    async fn panicking_end_listeners_do_not_lose_the_roster() {
        let mut race = manager(50, StepRng::new(u64::MAX, 0));
        let observer = Arc::new(Ordering::default());
        let log = Arc::new(StatisticsLog::new());
        race.add_observer(Arc::new(PanicsAtTheEnd));
        race.add_statistics_sink(Arc::new(PanickingSink));
        race.add_observer(observer.clone());
        race.add_statistics_sink(log.clone());
        race.add_horse(horse("A", 1.0), 0).unwrap();
        race.add_horse(horse("B", 1.0), 1).unwrap();

        let summary = race.run().await.unwrap();
        assert_eq!(summary.winner.as_deref(), Some("A"));
        assert_eq!(race.status(), RaceStatus::Completed);
        assert_eq!(race.horses().count(), 2);
        // Listeners after the faulty ones still heard about the result.
        assert_eq!(log.len(), 1);
        assert_eq!(observer.0.lock().unwrap().last().map(String::as_str), Some("end:A"));

        race.reset().unwrap();
        let again = race.run().await.unwrap();
        assert_eq!(again.winner.as_deref(), Some("A"));
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn starting_outside_a_runtime_is_an_error() {
        let mut race = manager(50, StepRng::new(u64::MAX, 0));
        race.add_horse(horse("A", 1.0), 0).unwrap();
        assert_eq!(race.start(), Err(RaceError::NoRuntime));
        assert_eq!(race.status(), RaceStatus::Pending);
        assert_eq!(race.horses().count(), 1);
        assert!(race.stop_handle().is_none());
    }

    #[tokio::test]
    async fn card_follows_track_and_roster_changes() {
        let mut race = manager(50, StepRng::new(u64::MAX, 0));
        let mut card = race.subscribe_card();
        assert!(card.borrow_and_update().horses.is_empty());

        race.add_horse(horse("A", 1.0), 0).unwrap();
        race.add_horse(horse("B", 0.5), 1).unwrap();
        assert!(card.has_changed().unwrap());
        assert_eq!(card.borrow_and_update().horses.len(), 2);

        race.track_mut().unwrap().set_condition(TrackCondition::Muddy);
        assert!(card.has_changed().unwrap());
        assert_eq!(card.borrow_and_update().track.condition(), TrackCondition::Muddy);

        race.horse_mut("B").unwrap().set_confidence(0.9);
        assert_eq!(card.borrow_and_update().horses[1].confidence(), 0.9);

        race.remove_horse("B").unwrap();
        assert_eq!(card.borrow_and_update().horses.len(), 1);
        assert!(race.remove_horse("B").unwrap().is_none());
        assert!(!card.has_changed().unwrap());

        // The roster handed back at the join carries post-race confidence.
        race.run().await.unwrap();
        assert!(card.has_changed().unwrap());
        let confidence = card.borrow_and_update().horses[0].confidence();
        assert_eq!(confidence, race.horse("A").unwrap().confidence());
    }

    #[tokio::test]
    async fn all_falling_resolves_by_distance() {
        let mut race = manager(50, StepRng::new(0, 0));
        race.add_horse(horse("A", 0.5), 0).unwrap();
        race.add_horse(horse("B", 0.5), 1).unwrap();
        let summary = race.run().await.unwrap();
        assert_eq!(summary.termination, Termination::AllFallen);
        assert_eq!(summary.winner.as_deref(), Some("A"));
        assert!(summary.performances.iter().all(|p| p.fell));
    }
}
