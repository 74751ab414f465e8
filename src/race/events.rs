//! Race notifications.
//!
//! Observers are invoked synchronously from inside the tick loop, in the
//! order the loop produces events. They receive snapshots and must not call
//! back into the race manager.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::horse::HorseSnapshot;

pub trait RaceObserver: Send + Sync {
    fn on_start(&self, _horses: &[HorseSnapshot]) {}

    fn on_fallen(&self, _horse: &HorseSnapshot) {}

    fn on_winner(&self, _horse: &HorseSnapshot) {}

    /// Once per round, after every horse has been updated.
    fn on_tick(&self, _round: u32, _horses: &[HorseSnapshot]) {}

    fn on_end(&self, _winner: Option<&HorseSnapshot>) {}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RaceEvent {
    Started { horses: Vec<HorseSnapshot> },
    Fell { horse: HorseSnapshot },
    Winner { horse: HorseSnapshot },
    Tick { round: u32, horses: Vec<HorseSnapshot> },
    Ended { winner: Option<HorseSnapshot> },
}

/// Forwards every notification into an unbounded channel so a consumer on
/// another task sees them in loop order.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<RaceEvent>,
    ticks: bool,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RaceEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelObserver { tx, ticks: true }, rx)
    }

    /// Drop per-round `Tick` events.
    pub fn without_ticks(mut self) -> Self {
        self.ticks = false;
        self
    }

    fn send(&self, event: RaceEvent) {
        // A closed receiver only means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

impl RaceObserver for ChannelObserver {
    fn on_start(&self, horses: &[HorseSnapshot]) {
        self.send(RaceEvent::Started {
            horses: horses.to_vec(),
        });
    }

    fn on_fallen(&self, horse: &HorseSnapshot) {
        self.send(RaceEvent::Fell {
            horse: horse.clone(),
        });
    }

    fn on_winner(&self, horse: &HorseSnapshot) {
        self.send(RaceEvent::Winner {
            horse: horse.clone(),
        });
    }

    fn on_tick(&self, round: u32, horses: &[HorseSnapshot]) {
        if self.ticks {
            self.send(RaceEvent::Tick {
                round,
                horses: horses.to_vec(),
            });
        }
    }

    fn on_end(&self, winner: Option<&HorseSnapshot>) {
        self.send(RaceEvent::Ended {
            winner: winner.cloned(),
        });
    }
}
