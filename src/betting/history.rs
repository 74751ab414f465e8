//! Wagers and the append-only wager ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WagerStatus {
    Unsettled,
    Won,
    Lost,
    /// Race cancelled; stake refunded.
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wager {
    pub id: u64,
    pub horse: String,
    pub stake: f64,
    /// Odds frozen at placement.
    pub odds: f64,
    pub status: WagerStatus,
    pub payout: f64,
    pub placed_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Wager {
    pub fn new(id: u64, horse: impl Into<String>, stake: f64, odds: f64) -> Self {
        Wager {
            id,
            horse: horse.into(),
            stake,
            odds,
            status: WagerStatus::Unsettled,
            payout: 0.0,
            placed_at: Utc::now(),
            settled_at: None,
        }
    }

    pub fn is_unsettled(&self) -> bool {
        self.status == WagerStatus::Unsettled
    }

    /// Won or lost. Voided wagers are closed but not settled.
    pub fn is_settled(&self) -> bool {
        matches!(self.status, WagerStatus::Won | WagerStatus::Lost)
    }

    pub fn is_won(&self) -> bool {
        self.status == WagerStatus::Won
    }

    pub fn potential_payout(&self) -> f64 {
        self.stake * self.odds
    }

    /// Settle against `winner` and return the payout. Once closed, the
    /// wager keeps its payout and later calls return it unchanged.
    pub fn settle(&mut self, winner: &str) -> f64 {
        if self.is_unsettled() {
            let won = self.horse == winner;
            self.status = if won { WagerStatus::Won } else { WagerStatus::Lost };
            self.payout = if won { self.potential_payout() } else { 0.0 };
            self.settled_at = Some(Utc::now());
        }
        self.payout
    }

    /// Close without a result, refunding the stake. No effect once closed.
    pub fn void(&mut self) -> f64 {
        if self.is_unsettled() {
            self.status = WagerStatus::Void;
            self.payout = self.stake;
            self.settled_at = Some(Utc::now());
            self.payout
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BettingHistory {
    wagers: Vec<Wager>,
}

impl BettingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, wager: Wager) {
        self.wagers.push(wager);
    }

    pub fn get(&self, id: u64) -> Option<&Wager> {
        self.wagers.iter().find(|w| w.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut Wager> {
        self.wagers.iter_mut().find(|w| w.id == id)
    }

    pub(crate) fn unsettled_mut(&mut self) -> impl Iterator<Item = &mut Wager> {
        self.wagers.iter_mut().filter(|w| w.is_unsettled())
    }

    pub fn all(&self) -> &[Wager] {
        &self.wagers
    }

    pub fn settled(&self) -> impl Iterator<Item = &Wager> {
        self.wagers.iter().filter(|w| w.is_settled())
    }

    pub fn unsettled(&self) -> impl Iterator<Item = &Wager> {
        self.wagers.iter().filter(|w| w.is_unsettled())
    }

    pub fn won(&self) -> impl Iterator<Item = &Wager> {
        self.wagers.iter().filter(|w| w.status == WagerStatus::Won)
    }

    pub fn lost(&self) -> impl Iterator<Item = &Wager> {
        self.wagers.iter().filter(|w| w.status == WagerStatus::Lost)
    }

    pub fn len(&self) -> usize {
        self.wagers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wagers.is_empty()
    }

    fn count_by_horse<'a>(wagers: impl Iterator<Item = &'a Wager>) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for wager in wagers {
            *counts.entry(wager.horse.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn wager_count_by_horse(&self) -> HashMap<String, usize> {
        Self::count_by_horse(self.wagers.iter())
    }

    pub fn win_count_by_horse(&self) -> HashMap<String, usize> {
        Self::count_by_horse(self.won())
    }

    pub fn loss_count_by_horse(&self) -> HashMap<String, usize> {
        Self::count_by_horse(self.lost())
    }

    pub fn total_staked(&self) -> f64 {
        self.wagers.iter().map(|w| w.stake).sum()
    }

    pub fn total_staked_on(&self, horse: &str) -> f64 {
        self.wagers
            .iter()
            .filter(|w| w.horse == horse)
            .map(|w| w.stake)
            .sum()
    }

    /// Stake per horse over the open (unsettled) wagers only.
    pub fn open_stakes(&self) -> HashMap<String, f64> {
        let mut stakes = HashMap::new();
        for wager in self.unsettled() {
            *stakes.entry(wager.horse.clone()).or_insert(0.0) += wager.stake;
        }
        stakes
    }

    pub fn total_winnings(&self) -> f64 {
        self.won().map(|w| w.payout).sum()
    }

    /// Won over settled; zero when nothing has settled.
    pub fn win_rate(&self) -> f64 {
        let settled = self.settled().count();
        if settled == 0 {
            0.0
        } else {
            self.won().count() as f64 / settled as f64
        }
    }

    pub fn win_rate_for(&self, horse: &str) -> f64 {
        let (wins, settled) = self
            .settled()
            .filter(|w| w.horse == horse)
            .fold((0usize, 0usize), |(wins, n), w| {
                (wins + usize::from(w.is_won()), n + 1)
            });
        if settled == 0 {
            0.0
        } else {
            wins as f64 / settled as f64
        }
    }

    pub fn clear(&mut self) {
        self.wagers.clear();
    }
}
