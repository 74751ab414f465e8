use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Saddle {
    #[default]
    Racing,
    English,
    Western,
    Bareback,
    Dressage,
}

impl Saddle {
    /// `(speed, stability)` multipliers.
    fn factors(self) -> (f64, f64) {
        match self {
            Saddle::Racing => (1.1, 0.95),
            Saddle::English => (1.0, 1.0),
            Saddle::Western => (0.9, 1.1),
            Saddle::Bareback => (1.15, 0.85),
            Saddle::Dressage => (0.95, 1.05),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Horseshoes {
    #[default]
    Standard,
    Lightweight,
    Traction,
    Therapeutic,
    None,
}

impl Horseshoes {
    /// `(speed, grip, endurance)` multipliers.
    fn factors(self) -> (f64, f64, f64) {
        match self {
            Horseshoes::Standard => (1.0, 1.0, 1.0),
            Horseshoes::Lightweight => (1.1, 0.9, 0.95),
            Horseshoes::Traction => (0.95, 1.15, 1.1),
            Horseshoes::Therapeutic => (0.9, 1.05, 1.2),
            Horseshoes::None => (1.05, 0.95, 0.9),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Accessory {
    #[default]
    None,
    Blinders,
    Blanket,
    Plume,
    LuckyCharm,
    PerformanceBridle,
}

impl Accessory {
    /// `(speed boost, luck boost)`, both additive.
    fn boosts(self) -> (f64, f64) {
        match self {
            Accessory::None | Accessory::Plume => (0.0, 0.0),
            Accessory::Blinders => (0.05, 0.0),
            Accessory::Blanket => (0.03, 0.0),
            Accessory::LuckyCharm => (0.0, 0.05),
            Accessory::PerformanceBridle => (0.0, 0.03),
        }
    }
}

/// Saddle, shoes and accessory fitted to a horse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Equipment {
    pub saddle: Saddle,
    pub horseshoes: Horseshoes,
    pub accessory: Accessory,
}

impl Equipment {
    pub fn new(saddle: Saddle, horseshoes: Horseshoes, accessory: Accessory) -> Self {
        Equipment {
            saddle,
            horseshoes,
            accessory,
        }
    }

    pub fn speed_factor(&self) -> f64 {
        let (saddle_speed, _) = self.saddle.factors();
        let (shoe_speed, _, _) = self.horseshoes.factors();
        saddle_speed * shoe_speed + self.accessory.boosts().0
    }

    pub fn stability_factor(&self) -> f64 {
        let (_, stability) = self.saddle.factors();
        let (_, grip, _) = self.horseshoes.factors();
        stability * grip
    }

    pub fn endurance_factor(&self) -> f64 {
        self.horseshoes.factors().2
    }

    pub fn luck_factor(&self) -> f64 {
        1.0 + self.accessory.boosts().1
    }
}
