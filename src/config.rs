use clap::Parser;
use std::time::Duration;

use crate::race::{RaceConfig, TieBreak};
use crate::track::{Track, TrackCondition, TrackShape};

/// Headless horse-race simulation with a live odds book
#[derive(Parser, Debug, Clone)]
#[command(name = "paddock", version, about)]
pub struct Config {
    /// Starting wallet balance
    #[arg(long, env = "INITIAL_BALANCE", default_value = "1000.0")]
    pub initial_balance: f64,

    /// Track name
    #[arg(long, env = "TRACK_NAME", default_value = "Paddock Park")]
    pub track_name: String,

    /// Track layout
    #[arg(long, env = "TRACK_SHAPE", value_enum, default_value = "oval")]
    pub track_shape: TrackShape,

    /// Race length in track units
    #[arg(long, env = "TRACK_LENGTH", default_value = "300")]
    pub track_length: u32,

    /// Number of lanes
    #[arg(long, env = "LANES", default_value = "6")]
    pub lanes: usize,

    /// Track condition
    #[arg(long, env = "TRACK_CONDITION", value_enum, default_value = "dry")]
    pub condition: TrackCondition,

    /// Horses in the field (at most one per lane)
    #[arg(long, env = "FIELD_SIZE", default_value = "5")]
    pub field_size: usize,

    /// Pause between simulation rounds in milliseconds (0 = run flat out)
    #[arg(long, env = "TICK_MS", default_value = "50")]
    pub tick_ms: u64,

    /// Hard cap on simulation rounds
    #[arg(long, env = "MAX_ROUNDS", default_value = "1000")]
    pub max_rounds: u32,

    /// Who wins same-round finishes
    #[arg(long, env = "TIE_BREAK", value_enum, default_value = "roster-order")]
    pub tie_break: TieBreak,

    /// Seed for every random draw; omit for a fresh run each time
    #[arg(long, env = "SEED")]
    pub seed: Option<u64>,

    /// Stake for the demo wager
    #[arg(long, env = "STAKE", default_value = "100.0")]
    pub stake: f64,

    /// Horse to back; defaults to the favourite
    #[arg(long, env = "BACK")]
    pub back: Option<String>,

    /// Print the race summary and ledger as JSON
    #[arg(long, env = "JSON_OUTPUT", default_value = "false")]
    pub json: bool,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.initial_balance.is_finite() || self.initial_balance < 0.0 {
            anyhow::bail!("initial_balance must be a non-negative number");
        }
        if self.track_length == 0 {
            anyhow::bail!("track_length must be positive");
        }
        if self.lanes == 0 {
            anyhow::bail!("lanes must be at least 1");
        }
        if self.field_size == 0 {
            anyhow::bail!("field_size must be at least 1");
        }
        if self.field_size > self.lanes {
            anyhow::bail!(
                "field_size ({}) cannot exceed the number of lanes ({})",
                self.field_size,
                self.lanes
            );
        }
        if self.max_rounds == 0 {
            anyhow::bail!("max_rounds must be positive");
        }
        if !self.stake.is_finite() || self.stake < 0.0 {
            anyhow::bail!("stake must be a non-negative number");
        }
        if self.stake > self.initial_balance {
            anyhow::bail!("stake cannot exceed initial_balance");
        }
        Ok(())
    }

    pub fn race_config(&self) -> RaceConfig {
        RaceConfig {
            tick_interval: Duration::from_millis(self.tick_ms),
            max_rounds: self.max_rounds,
            tie_break: self.tie_break,
        }
    }

    pub fn track(&self) -> anyhow::Result<Track> {
        Ok(Track::new(
            self.track_name.clone(),
            self.track_shape,
            self.track_length,
            self.lanes,
            self.condition,
        )?)
    }
}
