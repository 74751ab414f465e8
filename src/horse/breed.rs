use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Breed {
    #[default]
    Thoroughbred,
    Arabian,
    QuarterHorse,
    Standardbred,
    Appaloosa,
    Mustang,
    Clydesdale,
}

impl Breed {
    pub const ALL: [Breed; 7] = [
        Breed::Thoroughbred,
        Breed::Arabian,
        Breed::QuarterHorse,
        Breed::Standardbred,
        Breed::Appaloosa,
        Breed::Mustang,
        Breed::Clydesdale,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Breed::Thoroughbred => "Thoroughbred",
            Breed::Arabian => "Arabian",
            Breed::QuarterHorse => "Quarter Horse",
            Breed::Standardbred => "Standardbred",
            Breed::Appaloosa => "Appaloosa",
            Breed::Mustang => "Mustang",
            Breed::Clydesdale => "Clydesdale",
        }
    }

    pub fn speed_factor(self) -> f64 {
        match self {
            Breed::Thoroughbred => 1.2,
            Breed::Arabian => 1.0,
            Breed::QuarterHorse => 1.3,
            Breed::Standardbred => 0.9,
            Breed::Appaloosa => 0.95,
            Breed::Mustang => 1.0,
            Breed::Clydesdale => 0.7,
        }
    }

    pub fn stamina_factor(self) -> f64 {
        match self {
            Breed::Thoroughbred => 0.8,
            Breed::Arabian => 1.1,
            Breed::QuarterHorse => 0.7,
            Breed::Standardbred => 1.0,
            Breed::Appaloosa => 0.95,
            Breed::Mustang => 1.2,
            Breed::Clydesdale => 1.3,
        }
    }

    /// Multiplier on turn handling.
    pub fn agility_factor(self) -> f64 {
        match self {
            Breed::Thoroughbred => 0.9,
            Breed::Arabian => 1.2,
            Breed::QuarterHorse => 0.8,
            Breed::Standardbred => 1.0,
            Breed::Appaloosa => 1.1,
            Breed::Mustang => 0.9,
            Breed::Clydesdale => 0.8,
        }
    }

    /// Case-insensitive lookup; unknown names fall back to Thoroughbred.
    pub fn by_name(name: &str) -> Breed {
        Self::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Breed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Cosmetic only; no effect on performance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CoatColor {
    #[default]
    Bay,
    Black,
    Chestnut,
    Gray,
    White,
    Palomino,
    Pinto,
    Buckskin,
    DappleGray,
    Roan,
}

impl CoatColor {
    pub const ALL: [CoatColor; 10] = [
        CoatColor::Bay,
        CoatColor::Black,
        CoatColor::Chestnut,
        CoatColor::Gray,
        CoatColor::White,
        CoatColor::Palomino,
        CoatColor::Pinto,
        CoatColor::Buckskin,
        CoatColor::DappleGray,
        CoatColor::Roan,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CoatColor::Bay => "Bay",
            CoatColor::Black => "Black",
            CoatColor::Chestnut => "Chestnut",
            CoatColor::Gray => "Gray",
            CoatColor::White => "White",
            CoatColor::Palomino => "Palomino",
            CoatColor::Pinto => "Pinto",
            CoatColor::Buckskin => "Buckskin",
            CoatColor::DappleGray => "Dapple Gray",
            CoatColor::Roan => "Roan",
        }
    }

    /// Case-insensitive lookup; unknown names fall back to Bay.
    pub fn by_name(name: &str) -> CoatColor {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
            .unwrap_or_default()
    }
}
