use serde::{Deserialize, Serialize};

/// Lower clamp for the per-tick fall probability.
pub const MIN_FALL_PROBABILITY: f64 = 0.01;
/// Upper clamp for the per-tick fall probability.
pub const MAX_FALL_PROBABILITY: f64 = 0.50;

/// Named environmental preset affecting speed, grip and base fall risk.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum TrackCondition {
    Dry,
    Muddy,
    Icy,
    Wet,
    Windy,
}

impl TrackCondition {
    pub const ALL: [TrackCondition; 5] = [
        TrackCondition::Dry,
        TrackCondition::Muddy,
        TrackCondition::Icy,
        TrackCondition::Wet,
        TrackCondition::Windy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TrackCondition::Dry => "Dry",
            TrackCondition::Muddy => "Muddy",
            TrackCondition::Icy => "Icy",
            TrackCondition::Wet => "Wet",
            TrackCondition::Windy => "Windy",
        }
    }

    /// Multiplier on per-tick movement (1.0 = unaffected).
    pub fn speed_factor(self) -> f64 {
        match self {
            TrackCondition::Dry => 1.0,
            TrackCondition::Muddy => 0.7,
            TrackCondition::Icy => 0.8,
            TrackCondition::Wet => 0.85,
            TrackCondition::Windy => 0.9,
        }
    }

    /// Divisor on fall risk (1.0 = perfect grip, lower = slippery).
    pub fn grip_factor(self) -> f64 {
        match self {
            TrackCondition::Dry => 1.0,
            TrackCondition::Muddy => 0.9,
            TrackCondition::Icy => 0.7,
            TrackCondition::Wet => 0.95,
            TrackCondition::Windy => 1.0,
        }
    }

    pub fn base_fall_probability(self) -> f64 {
        match self {
            TrackCondition::Dry => 0.05,
            TrackCondition::Muddy => 0.10,
            TrackCondition::Icy => 0.15,
            TrackCondition::Wet => 0.08,
            TrackCondition::Windy => 0.07,
        }
    }

    /// Per-tick probability that a horse falls.
    ///
    /// ```text
    /// curve_penalty = (1 - curve_factor) * (1 - turn_handling)
    /// raw           = base + 0.1 * confidence + 0.2 * curve_penalty
    /// p             = clamp(raw / grip, 0.01, 0.50)
    /// ```
    ///
    /// Confidence raises the risk (fast but unstable); poor handling on sharp
    /// curves compounds it; low grip amplifies everything.
    ///
    /// # Arguments
    /// * `confidence`    – The horse's confidence (0.0–1.0).
    /// * `curve_factor`  – Local track sharpness at the horse's distance
    ///                     (1.0 = straight).
    /// * `turn_handling` – The horse's turn handling (0.0–1.0).
    ///
    /// # Returns
    /// The chance of falling this tick, always within `[0.01, 0.50]`.
    pub fn fall_probability(self, confidence: f64, curve_factor: f64, turn_handling: f64) -> f64 {
        let curve_penalty = (1.0 - curve_factor) * (1.0 - turn_handling);
        let raw = self.base_fall_probability() + 0.1 * confidence + 0.2 * curve_penalty;
        (raw / self.grip_factor()).clamp(MIN_FALL_PROBABILITY, MAX_FALL_PROBABILITY)
    }

    /// Case-insensitive preset lookup.
    pub fn by_name(name: &str) -> Option<TrackCondition> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for TrackCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
