use super::history::Wager;
use super::odds::Odds;

/// Betting notifications, delivered synchronously from the service call that
/// caused them.
pub trait BettingObserver: Send + Sync {
    fn on_odds_changed(&self, _odds: &Odds) {}

    fn on_wager_placed(&self, _wager: &Wager) {}

    fn on_race_settled(&self, _winner: &str, _total_payout: f64) {}

    /// The book closed without settlement.
    fn on_race_ended(&self) {}

    fn on_reset(&self) {}
}
