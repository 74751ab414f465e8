//! Horse model: identity, customisation, derived attributes and per-race state.
//!
//! Attributes are derived once from breed and equipment multipliers applied to
//! aptitude rolls drawn at creation; they are not re-derived per tick.
//! Confidence is the exception: it persists across races and is adjusted by
//! race results.

pub mod breed;
pub mod equipment;

pub use breed::{Breed, CoatColor};
pub use equipment::{Accessory, Equipment, Horseshoes, Saddle};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::track::Point;

/// Performance attributes. All but `base_speed` lie in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    pub base_speed: f64,
    pub turn_handling: f64,
    pub stamina: f64,
    pub luck: f64,
}

/// Raw uniform draws behind the random part of each attribute. Kept so that
/// re-customising a horse re-derives the same attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct AptitudeRolls {
    handling: f64,
    stamina: f64,
    luck: f64,
}

impl AptitudeRolls {
    const NEUTRAL: AptitudeRolls = AptitudeRolls {
        handling: 0.5,
        stamina: 0.5,
        luck: 0.5,
    };

    fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        AptitudeRolls {
            handling: rng.gen(),
            stamina: rng.gen(),
            luck: rng.gen(),
        }
    }
}

fn derive_attributes(
    confidence: f64,
    breed: Breed,
    equipment: &Equipment,
    rolls: &AptitudeRolls,
) -> Attributes {
    let base_speed =
        (0.5 + confidence * 0.5) * breed.speed_factor() * equipment.speed_factor();
    let turn_handling = ((0.5 + rolls.handling * 0.3)
        * breed.agility_factor()
        * equipment.stability_factor())
    .clamp(0.0, 1.0);
    let stamina = ((0.6 + rolls.stamina * 0.3)
        * breed.stamina_factor()
        * equipment.endurance_factor())
    .clamp(0.0, 1.0);
    let luck = (rolls.luck * equipment.luck_factor()).clamp(0.0, 1.0);
    Attributes {
        base_speed,
        turn_handling,
        stamina,
        luck,
    }
}

/// Read-only view of a horse handed to observers and statistics sinks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorseSnapshot {
    pub name: String,
    pub symbol: char,
    pub distance: f64,
    pub position: Point,
    pub fallen: bool,
    pub confidence: f64,
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Horse {
    name: String,
    symbol: char,
    display_symbol: String,
    breed: Breed,
    coat: CoatColor,
    equipment: Equipment,
    rolls: AptitudeRolls,
    attributes: Attributes,
    confidence: f64,
    // Per-race state, cleared by `reset_for_race`.
    distance: f64,
    position: Point,
    fallen: bool,
    speed: f64,
}

impl Horse {
    pub fn builder(name: impl Into<String>, symbol: char) -> HorseBuilder {
        HorseBuilder::new(name, symbol)
    }

    /// A horse with explicitly chosen attributes and default customisation.
    ///
    /// Later re-customisation derives from neutral aptitude rolls.
    pub fn with_attributes(
        name: impl Into<String>,
        symbol: char,
        confidence: f64,
        attributes: Attributes,
    ) -> Self {
        let attributes = Attributes {
            base_speed: attributes.base_speed.max(0.0),
            turn_handling: attributes.turn_handling.clamp(0.0, 1.0),
            stamina: attributes.stamina.clamp(0.0, 1.0),
            luck: attributes.luck.clamp(0.0, 1.0),
        };
        Horse {
            name: name.into(),
            symbol,
            display_symbol: symbol.to_string(),
            breed: Breed::default(),
            coat: CoatColor::default(),
            equipment: Equipment::default(),
            rolls: AptitudeRolls::NEUTRAL,
            attributes,
            confidence: clamp_unit(confidence, 0.5),
            distance: 0.0,
            position: Point::default(),
            fallen: false,
            speed: attributes.base_speed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn symbol(&self) -> char {
        self.symbol
    }

    pub fn display_symbol(&self) -> &str {
        &self.display_symbol
    }

    pub fn set_display_symbol(&mut self, display_symbol: impl Into<String>) {
        self.display_symbol = display_symbol.into();
    }

    pub fn breed(&self) -> Breed {
        self.breed
    }

    pub fn coat(&self) -> CoatColor {
        self.coat
    }

    pub fn set_coat(&mut self, coat: CoatColor) {
        self.coat = coat;
    }

    pub fn equipment(&self) -> &Equipment {
        &self.equipment
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn base_speed(&self) -> f64 {
        self.attributes.base_speed
    }

    pub fn turn_handling(&self) -> f64 {
        self.attributes.turn_handling
    }

    pub fn stamina(&self) -> f64 {
        self.attributes.stamina
    }

    pub fn luck(&self) -> f64 {
        self.attributes.luck
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Current speed; equals `base_speed` except while a transient penalty
    /// is applied.
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn has_fallen(&self) -> bool {
        self.fallen
    }

    /// Clamped to `[0, 1]`; a NaN leaves the current value in place.
    pub fn set_confidence(&mut self, confidence: f64) {
        self.confidence = clamp_unit(confidence, self.confidence);
    }

    /// Multiply confidence by `factor` and re-clamp.
    pub fn scale_confidence(&mut self, factor: f64) {
        self.set_confidence(self.confidence * factor);
    }

    pub fn set_turn_handling(&mut self, turn_handling: f64) {
        self.attributes.turn_handling = clamp_unit(turn_handling, self.attributes.turn_handling);
    }

    pub fn set_stamina(&mut self, stamina: f64) {
        self.attributes.stamina = clamp_unit(stamina, self.attributes.stamina);
    }

    pub fn set_breed(&mut self, breed: Breed) {
        self.breed = breed;
        self.rederive();
    }

    pub fn set_equipment(&mut self, equipment: Equipment) {
        self.equipment = equipment;
        self.rederive();
    }

    fn rederive(&mut self) {
        self.attributes = derive_attributes(self.confidence, self.breed, &self.equipment, &self.rolls);
        self.speed = self.attributes.base_speed;
    }

    /// Back to the start line: distance, position and fallen flag cleared,
    /// speed restored. Confidence is kept.
    pub fn reset_for_race(&mut self) {
        self.distance = 0.0;
        self.position = Point::default();
        self.fallen = false;
        self.speed = self.attributes.base_speed;
    }

    /// Terminal for the rest of the race.
    pub fn fall(&mut self) {
        self.fallen = true;
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = position;
    }

    /// Slow to `factor × base_speed` until [`Horse::restore_speed`].
    pub fn apply_speed_penalty(&mut self, factor: f64) {
        self.speed = self.attributes.base_speed * factor.max(0.0);
    }

    pub fn restore_speed(&mut self) {
        self.speed = self.attributes.base_speed;
    }

    /// Per-tick movement update; returns the distance gained.
    ///
    /// ```text
    /// stamina_effect = 1 - (1 - stamina) * progress
    /// turn_effect    = 1 - (1 - curve_factor) * (1 - turn_handling)
    /// luck_factor    = 0.95 + luck * 0.10
    /// increment      = speed * speed_factor * turn_effect * stamina_effect * luck_factor
    /// ```
    ///
    /// # Arguments
    /// * `speed_factor` – The track condition's speed multiplier.
    /// * `curve_factor` – Local sharpness at the current distance (1.0 = straight).
    /// * `progress`     – Fraction of the race covered so far; clamped to 0.0–1.0.
    ///
    /// # Returns
    /// The distance gained this tick. Always `0.0` for a fallen horse, which
    /// never moves again until [`Horse::reset_for_race`].
    pub fn advance(&mut self, speed_factor: f64, curve_factor: f64, progress: f64) -> f64 {
        if self.fallen {
            return 0.0;
        }
        let a = &self.attributes;
        let stamina_effect = 1.0 - (1.0 - a.stamina) * progress.clamp(0.0, 1.0);
        let turn_effect = 1.0 - (1.0 - curve_factor.clamp(0.0, 1.0)) * (1.0 - a.turn_handling);
        let luck_factor = 0.95 + a.luck * 0.10;
        let increment =
            (self.speed * speed_factor * turn_effect * stamina_effect * luck_factor).max(0.0);
        if increment.is_finite() {
            self.distance += increment;
            increment
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> HorseSnapshot {
        HorseSnapshot {
            name: self.name.clone(),
            symbol: self.symbol,
            distance: self.distance,
            position: self.position,
            fallen: self.fallen,
            confidence: self.confidence,
            speed: self.speed,
        }
    }
}

fn clamp_unit(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Customisation front-end producing a [`Horse`] with derived attributes.
#[derive(Debug, Clone)]
pub struct HorseBuilder {
    name: String,
    symbol: char,
    display_symbol: Option<String>,
    confidence: f64,
    breed: Breed,
    coat: CoatColor,
    equipment: Equipment,
}

impl HorseBuilder {
    pub fn new(name: impl Into<String>, symbol: char) -> Self {
        HorseBuilder {
            name: name.into(),
            symbol,
            display_symbol: None,
            confidence: 0.5,
            breed: Breed::default(),
            coat: CoatColor::default(),
            equipment: Equipment::default(),
        }
    }

    pub fn confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_unit(confidence, 0.5);
        self
    }

    pub fn display_symbol(mut self, display_symbol: impl Into<String>) -> Self {
        self.display_symbol = Some(display_symbol.into());
        self
    }

    pub fn breed(mut self, breed: Breed) -> Self {
        self.breed = breed;
        self
    }

    pub fn coat(mut self, coat: CoatColor) -> Self {
        self.coat = coat;
        self
    }

    pub fn equipment(mut self, equipment: Equipment) -> Self {
        self.equipment = equipment;
        self
    }

    /// Draw aptitude rolls from `rng` and derive the attributes.
    pub fn build<R: Rng + ?Sized>(self, rng: &mut R) -> Horse {
        let rolls = AptitudeRolls::draw(rng);
        let attributes = derive_attributes(self.confidence, self.breed, &self.equipment, &rolls);
        Horse {
            display_symbol: self
                .display_symbol
                .unwrap_or_else(|| self.symbol.to_string()),
            name: self.name,
            symbol: self.symbol,
            breed: self.breed,
            coat: self.coat,
            equipment: self.equipment,
            rolls,
            attributes,
            confidence: self.confidence,
            distance: 0.0,
            position: Point::default(),
            fallen: false,
            speed: attributes.base_speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::seeded;
    use approx::assert_relative_eq;

    fn plain(confidence: f64) -> Horse {
        Horse::with_attributes(
            "Plain",
            'P',
            confidence,
            Attributes {
                base_speed: 1.0,
                turn_handling: 0.5,
                stamina: 0.8,
                luck: 0.5,
            },
        )
    }

    #[test]
    fn movement_formula() {
        let mut horse = plain(0.5);
        // stamina 1 - 0.2*0.5 = 0.9, turn 1 - 0.4*0.5 = 0.8, luck 1.0
        let gained = horse.advance(0.9, 0.6, 0.5);
        assert_relative_eq!(gained, 1.0 * 0.9 * 0.8 * 0.9 * 1.0, epsilon = 1e-12);
        assert_relative_eq!(horse.distance(), gained);
    }

    #[test]
    fn fallen_horse_never_moves() {
        let mut horse = plain(0.5);
        horse.advance(1.0, 1.0, 0.0);
        let before = horse.distance();
        horse.fall();
        assert_eq!(horse.advance(1.0, 1.0, 0.0), 0.0);
        assert_eq!(horse.distance(), before);
        horse.reset_for_race();
        assert!(!horse.has_fallen());
        assert_eq!(horse.distance(), 0.0);
    }

    #[test]
    fn confidence_is_clamped_on_every_path() {
        let mut horse = plain(0.95);
        horse.scale_confidence(1.10);
        assert_eq!(horse.confidence(), 1.0);
        horse.set_confidence(-3.0);
        assert_eq!(horse.confidence(), 0.0);
        horse.set_confidence(f64::NAN);
        assert_eq!(horse.confidence(), 0.0);
        let built = Horse::builder("B", 'B').confidence(7.0).build(&mut seeded(Some(1)));
        assert_eq!(built.confidence(), 1.0);
    }

    #[test]
    fn derived_attributes_stay_in_range() {
        let mut rng = seeded(Some(42));
        for breed in Breed::ALL {
            for saddle in [Saddle::Racing, Saddle::Western, Saddle::Bareback] {
                let horse = Horse::builder("H", 'H')
                    .confidence(0.9)
                    .breed(breed)
                    .equipment(Equipment::new(saddle, Horseshoes::Traction, Accessory::LuckyCharm))
                    .build(&mut rng);
                let a = horse.attributes();
                assert!(a.base_speed > 0.0);
                assert!((0.0..=1.0).contains(&a.turn_handling));
                assert!((0.0..=1.0).contains(&a.stamina));
                assert!((0.0..=1.0).contains(&a.luck));
            }
        }
    }

    #[test]
    fn base_speed_follows_breed_and_kit() {
        let horse = Horse::builder("Q", 'Q')
            .confidence(0.6)
            .breed(Breed::QuarterHorse)
            .build(&mut seeded(Some(3)));
        // (0.5 + 0.3) * 1.3 * 1.1
        assert_relative_eq!(horse.base_speed(), 0.8 * 1.3 * 1.1, epsilon = 1e-12);
    }

    #[test]
    fn recustomising_is_deterministic() {
        let mut horse = Horse::builder("R", 'R').build(&mut seeded(Some(9)));
        let original = *horse.attributes();
        horse.set_breed(Breed::Clydesdale);
        assert_ne!(*horse.attributes(), original);
        horse.set_breed(Breed::Thoroughbred);
        assert_eq!(*horse.attributes(), original);
    }

    #[test]
    fn speed_penalty_is_transient() {
        let mut horse = plain(0.5);
        horse.apply_speed_penalty(0.7);
        assert_relative_eq!(horse.speed(), 0.7);
        horse.restore_speed();
        assert_relative_eq!(horse.speed(), 1.0);
    }
}
