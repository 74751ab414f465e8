//! Odds from performance scores and the live stake distribution.
//!
//! ```text
//! score       = base_speed * confidence * curve_handling * condition_effect
//!               * stamina * breed_advantage * equipment_advantage
//! probability = score / Σ score                     (uniform if Σ == 0)
//! odds        = quote((1 / probability) * jitter)   jitter ~ U[0.9, 1.1]
//! adjusted    = quote(odds * (1 - stake_share * 0.3))
//! ```
//!
//! `quote` rounds to one decimal place and then clamps to `[1.1, 50.0]`, so
//! every quoted price is inside the band.

use rand::Rng;
use std::collections::{BTreeMap, HashMap};

use crate::horse::{Accessory, Breed, Horse, Horseshoes, Saddle};
use crate::track::{Track, TrackCondition, TrackShape};

pub const MIN_ODDS: f64 = 1.1;
pub const MAX_ODDS: f64 = 50.0;
pub const BETTING_PATTERN_WEIGHT: f64 = 0.3;

/// Horse name → decimal odds.
pub type Odds = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct OddsConfig {
    pub min_odds: f64,
    pub max_odds: f64,
    pub pattern_weight: f64,
    /// Inclusive bounds of the multiplicative noise applied to base odds.
    pub jitter: (f64, f64),
}

impl Default for OddsConfig {
    fn default() -> Self {
        OddsConfig {
            min_odds: MIN_ODDS,
            max_odds: MAX_ODDS,
            pattern_weight: BETTING_PATTERN_WEIGHT,
            jitter: (0.9, 1.1),
        }
    }
}

/// Typical sharpness of each layout, used when scoring rather than the
/// position-dependent curve factor.
pub fn shape_curve_factor(shape: TrackShape) -> f64 {
    match shape {
        TrackShape::Oval => 0.8,
        TrackShape::FigureEight => 0.6,
        TrackShape::Zigzag => 0.4,
    }
}

pub fn condition_effect(horse: &Horse, condition: TrackCondition) -> f64 {
    let breed_bonus = match (condition, horse.breed()) {
        (TrackCondition::Muddy, Breed::Arabian) => 0.1,
        (TrackCondition::Icy, Breed::Clydesdale) => 0.15,
        (TrackCondition::Windy, Breed::Thoroughbred) => 0.05,
        _ => 0.0,
    };
    let equipment = horse.equipment();
    let equipment_bonus = if condition == TrackCondition::Muddy
        && equipment.horseshoes == Horseshoes::Traction
    {
        0.1
    } else if condition == TrackCondition::Windy && equipment.accessory == Accessory::Blinders {
        0.05
    } else {
        0.0
    };
    condition.speed_factor() + breed_bonus + equipment_bonus
}

pub fn breed_advantage(breed: Breed) -> f64 {
    match breed {
        Breed::Thoroughbred => 1.2,
        Breed::QuarterHorse => 1.15,
        Breed::Arabian => 1.1,
        Breed::Standardbred => 1.05,
        _ => 1.0,
    }
}

pub fn equipment_advantage(horse: &Horse, shape: TrackShape) -> f64 {
    let equipment = horse.equipment();
    let twisty = matches!(shape, TrackShape::FigureEight | TrackShape::Zigzag);

    let saddle = match equipment.saddle {
        Saddle::Racing => 1.1,
        Saddle::Western if shape == TrackShape::Zigzag => 1.05,
        _ => 1.0,
    };
    let shoes = match equipment.horseshoes {
        Horseshoes::Lightweight => 1.08,
        Horseshoes::Traction if twisty => 1.05,
        _ => 1.0,
    };
    let accessory = match equipment.accessory {
        Accessory::Blinders => 1.03,
        Accessory::LuckyCharm => 1.01,
        _ => 1.0,
    };
    saddle * shoes * accessory
}

#[derive(Debug, Clone, Default)]
pub struct OddsCalculator {
    config: OddsConfig,
}

impl OddsCalculator {
    pub fn new(config: OddsConfig) -> Self {
        OddsCalculator { config }
    }

    pub fn config(&self) -> &OddsConfig {
        &self.config
    }

    /// Round to one decimal place, then clamp into the odds band.
    /// Non-finite prices (a zero probability) become the maximum.
    pub fn quote(&self, raw: f64) -> f64 {
        if !raw.is_finite() {
            return self.config.max_odds;
        }
        ((raw * 10.0).round() / 10.0).clamp(self.config.min_odds, self.config.max_odds)
    }

    /// Relative strength of a horse on a track.
    ///
    /// # Arguments
    /// * `horse` – The horse to rate; its breed and equipment select the
    ///             synergy terms.
    /// * `track` – Supplies the layout (curve handling, equipment advantage)
    ///             and the condition (condition effect).
    ///
    /// # Returns
    /// A non-negative score. Only ratios between scores matter.
    pub fn score(&self, horse: &Horse, track: &Track) -> f64 {
        let curve = shape_curve_factor(track.shape());
        let curve_handling = 1.0 - (1.0 - curve) * (1.0 - horse.turn_handling());
        let score = horse.base_speed()
            * horse.confidence()
            * curve_handling
            * condition_effect(horse, track.condition())
            * horse.stamina()
            * breed_advantage(horse.breed())
            * equipment_advantage(horse, track.shape());
        score.max(0.0)
    }

    /// Win probabilities aligned with `horses`. They sum to one for a
    /// non-empty roster; an all-zero field gets a uniform split.
    pub fn win_probabilities(&self, horses: &[Horse], track: &Track) -> Vec<f64> {
        if horses.is_empty() {
            return Vec::new();
        }
        let scores: Vec<f64> = horses.iter().map(|h| self.score(h, track)).collect();
        let total: f64 = scores.iter().sum();
        if total > 0.0 && total.is_finite() {
            scores.into_iter().map(|s| s / total).collect()
        } else {
            vec![1.0 / horses.len() as f64; horses.len()]
        }
    }

    /// Probability-implied odds with fresh jitter, one draw per horse in
    /// roster order.
    pub fn base_odds<R: Rng + ?Sized>(&self, horses: &[Horse], track: &Track, rng: &mut R) -> Odds {
        let (lo, hi) = self.config.jitter;
        horses
            .iter()
            .zip(self.win_probabilities(horses, track))
            .map(|(horse, probability)| {
                let jitter = if hi > lo { rng.gen_range(lo..=hi) } else { lo };
                (horse.name().to_string(), self.quote(jitter / probability))
            })
            .collect()
    }

    /// Shorten each horse's odds in proportion to its share of `stakes`.
    /// With nothing staked the odds come back unchanged.
    ///
    /// # Arguments
    /// * `odds`   – Base odds for the horses in the book.
    /// * `stakes` – Open stake per horse. Stakes on horses no longer in the
    ///              book still count towards the total staked, so a
    ///              scratched horse does not inflate the others' shares.
    ///
    /// # Returns
    /// The adjusted odds, re-quoted into the odds band.
    pub fn adjust_for_betting_patterns(&self, odds: &Odds, stakes: &HashMap<String, f64>) -> Odds {
        let total: f64 = stakes.values().map(|stake| stake.max(0.0)).sum();
        if total <= 0.0 {
            return odds.clone();
        }
        odds.iter()
            .map(|(horse, &price)| {
                let share = stakes.get(horse).copied().unwrap_or(0.0).max(0.0) / total;
                let adjustment = 1.0 - share * self.config.pattern_weight;
                (horse.clone(), self.quote(price * adjustment))
            })
            .collect()
    }

    pub fn calculate_odds<R: Rng + ?Sized>(
        &self,
        horses: &[Horse],
        track: &Track,
        stakes: &HashMap<String, f64>,
        rng: &mut R,
    ) -> Odds {
        let base = self.base_odds(horses, track, rng);
        self.adjust_for_betting_patterns(&base, stakes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::horse::{Attributes, Equipment};
    use crate::rng::seeded;
    use approx::assert_relative_eq;

    fn track(shape: TrackShape, condition: TrackCondition) -> Track {
        Track::new("Odds Park", shape, 400, 6, condition).unwrap()
    }

    fn flat(name: &str, confidence: f64) -> Horse {
        Horse::with_attributes(
            name,
            'h',
            confidence,
            Attributes {
                base_speed: 1.0,
                turn_handling: 0.5,
                stamina: 0.8,
                luck: 0.5,
            },
        )
    }

    fn no_jitter() -> OddsCalculator {
        OddsCalculator::new(OddsConfig {
            jitter: (1.0, 1.0),
            ..OddsConfig::default()
        })
    }

    #[test]
    fn score_multiplies_every_term() {
        let horse = flat("A", 0.5);
        let t = track(TrackShape::Oval, TrackCondition::Dry);
        // curve handling 1 - 0.2*0.5; Thoroughbred 1.2; Racing saddle 1.1
        let expected = 1.0 * 0.5 * 0.9 * 1.0 * 0.8 * 1.2 * 1.1;
        assert_relative_eq!(OddsCalculator::default().score(&horse, &t), expected, epsilon = 1e-12);
    }

    #[test]
    fn synergy_tables() {
        let mut horse = flat("A", 0.5);
        horse.set_breed(Breed::Arabian);
        horse.set_equipment(Equipment::new(Saddle::Western, Horseshoes::Traction, Accessory::Blinders));
        assert_relative_eq!(condition_effect(&horse, TrackCondition::Muddy), 0.7 + 0.1 + 0.1);
        assert_relative_eq!(condition_effect(&horse, TrackCondition::Windy), 0.9 + 0.05);
        assert_relative_eq!(
            equipment_advantage(&horse, TrackShape::Zigzag),
            1.05 * 1.05 * 1.03,
            epsilon = 1e-12
        );
        assert_relative_eq!(equipment_advantage(&horse, TrackShape::Oval), 1.03);
        assert_relative_eq!(breed_advantage(Breed::Mustang), 1.0);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let mut rng = seeded(Some(5));
        let horses: Vec<Horse> = (0..7)
            .map(|i| {
                Horse::builder(format!("H{i}"), 'h')
                    .breed(Breed::ALL[i])
                    .confidence(0.1 + 0.12 * i as f64)
                    .build(&mut rng)
            })
            .collect();
        for condition in TrackCondition::ALL {
            let p = OddsCalculator::default()
                .win_probabilities(&horses, &track(TrackShape::FigureEight, condition));
            assert_relative_eq!(p.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_scores_fall_back_to_uniform() {
        let horses = vec![flat("A", 0.0), flat("B", 0.0), flat("C", 0.0), flat("D", 0.0)];
        let p = OddsCalculator::default()
            .win_probabilities(&horses, &track(TrackShape::Oval, TrackCondition::Dry));
        assert_eq!(p, vec![0.25; 4]);
        assert!(OddsCalculator::default()
            .win_probabilities(&[], &track(TrackShape::Oval, TrackCondition::Dry))
            .is_empty());
    }

    #[test]
    fn every_quote_is_inside_the_band() {
        let calc = OddsCalculator::default();
        let mut rng = seeded(Some(17));
        let mut horses: Vec<Horse> = (0..12)
            .map(|i| {
                Horse::builder(format!("H{i}"), 'h')
                    .confidence(i as f64 / 11.0)
                    .build(&mut rng)
            })
            .collect();
        horses.push(flat("Zero", 0.0));
        let stakes: HashMap<String, f64> =
            [("H3".to_string(), 500.0), ("H11".to_string(), 20.0)].into_iter().collect();
        for shape in [TrackShape::Oval, TrackShape::FigureEight, TrackShape::Zigzag] {
            for condition in TrackCondition::ALL {
                let odds = calc.calculate_odds(&horses, &track(shape, condition), &stakes, &mut rng);
                assert_eq!(odds.len(), horses.len());
                for price in odds.values() {
                    assert!((MIN_ODDS..=MAX_ODDS).contains(price), "{price}");
                }
                assert_eq!(odds["Zero"], MAX_ODDS);
            }
        }
        assert_eq!(calc.quote(f64::INFINITY), MAX_ODDS);
        assert_eq!(calc.quote(0.3), MIN_ODDS);
        assert_eq!(calc.quote(3.04), 3.0);
    }

    #[test]
    fn concentrated_stake_shortens_only_the_backed_horse() {
        let calc = OddsCalculator::default();
        let base: Odds = [("A".to_string(), 3.0), ("B".to_string(), 5.0)].into_iter().collect();
        let stakes: HashMap<String, f64> = [("A".to_string(), 100.0)].into_iter().collect();
        let adjusted = calc.adjust_for_betting_patterns(&base, &stakes);
        assert!(adjusted["A"] < 3.0);
        assert!(adjusted["A"] >= MIN_ODDS);
        assert_relative_eq!(adjusted["A"], 2.1);
        assert_relative_eq!(adjusted["B"], 5.0);

        assert_eq!(calc.adjust_for_betting_patterns(&base, &HashMap::new()), base);
    }

    #[test]
    fn stakes_on_scratched_horses_still_count_towards_the_total() {
        let calc = OddsCalculator::default();
        let base: Odds = [("A".to_string(), 4.0), ("B".to_string(), 5.0)]
            .into_iter()
            .collect();
        let stakes: HashMap<String, f64> = [
            ("A".to_string(), 100.0),
            ("Scratched".to_string(), 100.0),
        ]
        .into_iter()
        .collect();
        let adjusted = calc.adjust_for_betting_patterns(&base, &stakes);
        // A holds half the money: 4.0 * (1 - 0.5 * 0.3).
        assert_relative_eq!(adjusted["A"], 3.4);
        assert_relative_eq!(adjusted["B"], 5.0);
        assert!(!adjusted.contains_key("Scratched"));
    }

    #[test]
    fn even_field_prices_at_evens_times_two() {
        let horses = vec![flat("A", 0.5), flat("B", 0.5)];
        let t = track(TrackShape::Oval, TrackCondition::Dry);
        let odds = no_jitter().base_odds(&horses, &t, &mut seeded(Some(1)));
        assert_relative_eq!(odds["A"], 2.0);
        assert_relative_eq!(odds["B"], 2.0);
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let horses = vec![flat("A", 0.5), flat("B", 0.5)];
        let t = track(TrackShape::Oval, TrackCondition::Dry);
        let mut rng = seeded(Some(2));
        for _ in 0..200 {
            let odds = OddsCalculator::default().base_odds(&horses, &t, &mut rng);
            assert!((1.8..=2.2).contains(&odds["A"]));
        }
    }
}
