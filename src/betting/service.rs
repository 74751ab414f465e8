//! Wager placement and settlement against the wallet.
//!
//! A book is opened for a roster on a track; it quotes odds, accepts wagers
//! while the linked race is PENDING, and is closed either by settlement
//! against a winner or by [`BettingService::close_book`] when the race is
//! abandoned.
//!
//! A book opened with [`BettingService::open_live_book`] follows the race
//! manager's [`RaceCard`], so changes to the track or roster re-price the
//! book before the next wager is accepted.

use rand::rngs::StdRng;
use rand::Rng;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::events::BettingObserver;
use super::history::{BettingHistory, Wager};
use super::odds::{Odds, OddsCalculator};
use super::wallet::VirtualWallet;
use crate::error::BettingError;
use crate::horse::Horse;
use crate::race::{RaceCard, RaceStatus};
use crate::track::Track;

/// The roster and track odds are quoted for.
#[derive(Debug)]
struct Book {
    horses: Vec<Horse>,
    track: Track,
    card: Option<watch::Receiver<RaceCard>>,
}

impl Book {
    /// Pull a newer race card, if any. Returns whether the book changed.
    fn sync(&mut self) -> bool {
        let Some(card) = self.card.as_mut() else {
            return false;
        };
        if !card.has_changed().unwrap_or(false) {
            return false;
        }
        let latest = card.borrow_and_update();
        self.horses = latest.horses.clone();
        self.track = latest.track.clone();
        true
    }
}

pub struct BettingService<R = StdRng> {
    calculator: OddsCalculator,
    history: BettingHistory,
    wallet: VirtualWallet,
    odds: Odds,
    book: Option<Book>,
    race_status: watch::Receiver<RaceStatus>,
    rng: R,
    observers: Vec<Arc<dyn BettingObserver>>,
    next_wager_id: u64,
}

impl<R: Rng> BettingService<R> {
    /// `race_status` follows the race the wagers are on; bets are only
    /// accepted while it reads PENDING.
    pub fn new(
        calculator: OddsCalculator,
        wallet: VirtualWallet,
        race_status: watch::Receiver<RaceStatus>,
        rng: R,
    ) -> Self {
        BettingService {
            calculator,
            history: BettingHistory::new(),
            wallet,
            odds: Odds::new(),
            book: None,
            race_status,
            rng,
            observers: Vec::new(),
            next_wager_id: 1,
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn BettingObserver>) {
        self.observers.push(observer);
    }

    fn notify(&self, f: impl Fn(&dyn BettingObserver)) {
        for observer in &self.observers {
            f(observer.as_ref());
        }
    }

    pub fn wallet(&self) -> &VirtualWallet {
        &self.wallet
    }

    pub fn history(&self) -> &BettingHistory {
        &self.history
    }

    pub fn race_status(&self) -> RaceStatus {
        *self.race_status.borrow()
    }

    pub fn is_book_open(&self) -> bool {
        self.book.is_some()
    }

    pub fn current_odds(&self) -> &Odds {
        &self.odds
    }

    pub fn odds_for(&self, horse: &str) -> Option<f64> {
        self.odds.get(horse).copied()
    }

    /// `stake × current odds`; zero for a horse without a price.
    pub fn potential_payout(&self, horse: &str, stake: f64) -> f64 {
        self.odds_for(horse).map_or(0.0, |odds| stake * odds)
    }

    /// Start quoting a fixed roster on a fixed track. Later changes are
    /// applied with [`BettingService::update_track`] and
    /// [`BettingService::update_roster`].
    pub fn open_book(&mut self, horses: &[Horse], track: &Track) -> Result<&Odds, BettingError> {
        if self.book.is_some() {
            return Err(BettingError::BookAlreadyOpen);
        }
        self.book = Some(Book {
            horses: horses.to_vec(),
            track: track.clone(),
            card: None,
        });
        info!(
            "Book opened for {} horse(s) on {}",
            horses.len(),
            track.name()
        );
        self.recalculate_odds()?;
        Ok(&self.odds)
    }

    /// Start quoting the field published by a race manager
    /// ([`crate::race::RaceManager::subscribe_card`]). The book re-prices
    /// whenever the card changes.
    pub fn open_live_book(
        &mut self,
        mut card: watch::Receiver<RaceCard>,
    ) -> Result<&Odds, BettingError> {
        if self.book.is_some() {
            return Err(BettingError::BookAlreadyOpen);
        }
        let current = card.borrow_and_update().clone();
        info!(
            "Live book opened for {} horse(s) on {}",
            current.horses.len(),
            current.track.name()
        );
        self.book = Some(Book {
            horses: current.horses,
            track: current.track,
            card: Some(card),
        });
        self.recalculate_odds()?;
        Ok(&self.odds)
    }

    /// Re-price the open book from the roster, track and open stakes.
    pub fn recalculate_odds(&mut self) -> Result<(), BettingError> {
        let book = self.book.as_mut().ok_or(BettingError::NoOpenBook)?;
        book.sync();
        let stakes = self.history.open_stakes();
        self.odds = self
            .calculator
            .calculate_odds(&book.horses, &book.track, &stakes, &mut self.rng);
        debug!("Odds recalculated: {:?}", self.odds);
        self.notify(|o| o.on_odds_changed(&self.odds));
        Ok(())
    }

    /// Re-price for a different track. On a live book this lasts until the
    /// race card next changes.
    pub fn update_track(&mut self, track: &Track) -> Result<(), BettingError> {
        let book = self.book.as_mut().ok_or(BettingError::NoOpenBook)?;
        book.track = track.clone();
        self.recalculate_odds()
    }

    /// Replace the quoted roster, e.g. after a horse is scratched.
    pub fn update_roster(&mut self, horses: &[Horse]) -> Result<(), BettingError> {
        let book = self.book.as_mut().ok_or(BettingError::NoOpenBook)?;
        book.horses = horses.to_vec();
        self.recalculate_odds()
    }

    /// Place a wager at the current price. A live book whose race card has
    /// changed is re-priced first, so the frozen odds match the field as it
    /// stands. Validation failures leave the wallet and the ledger untouched.
    pub fn place_bet(&mut self, horse: &str, stake: f64) -> Result<Wager, BettingError> {
        let status = self.race_status();
        if status != RaceStatus::Pending {
            return Err(BettingError::WrongPhase(status));
        }
        let book = self.book.as_mut().ok_or(BettingError::NoOpenBook)?;
        if book.sync() {
            debug!("Race card changed; re-pricing before the wager");
            self.recalculate_odds()?;
        }
        let odds = self
            .odds_for(horse)
            .ok_or_else(|| BettingError::UnknownHorse(horse.to_string()))?;
        if !(stake.is_finite() && stake > 0.0) {
            return Err(BettingError::InvalidStake(stake));
        }
        self.wallet.debit(stake)?;

        let wager = Wager::new(self.next_wager_id, horse, stake, odds);
        self.next_wager_id += 1;
        info!(
            "Wager #{} placed: {:.2} on {} at {:.1} (balance {:.2})",
            wager.id,
            stake,
            horse,
            odds,
            self.wallet.balance()
        );
        self.history.push(wager.clone());
        self.recalculate_odds()?;
        self.notify(|o| o.on_wager_placed(&wager));
        Ok(wager)
    }

    /// Settle every open wager against `winner`, credit the total and close
    /// the book. Returns the total paid out.
    pub fn settle_race(&mut self, winner: Option<&str>) -> Result<f64, BettingError> {
        if self.book.is_none() {
            return Err(BettingError::NoOpenBook);
        }
        let winner = winner.ok_or(BettingError::NoWinner)?;

        let mut total = 0.0;
        let mut settled = 0usize;
        for wager in self.history.unsettled_mut() {
            total += wager.settle(winner);
            settled += 1;
        }
        if total > 0.0 {
            self.wallet.credit(total)?;
        }
        self.book = None;
        info!(
            "Race settled: {} won, {} wager(s), paid {:.2} (balance {:.2})",
            winner,
            settled,
            total,
            self.wallet.balance()
        );
        self.notify(|o| o.on_race_settled(winner, total));
        Ok(total)
    }

    /// Settle a single wager. A wager that is already closed returns its
    /// recorded payout and nothing is credited again.
    pub fn settle_wager(&mut self, id: u64, winner: &str) -> Result<f64, BettingError> {
        let wager = self
            .history
            .get_mut(id)
            .ok_or(BettingError::UnknownWager(id))?;
        if !wager.is_unsettled() {
            return Ok(wager.payout);
        }
        let payout = wager.settle(winner);
        if payout > 0.0 {
            self.wallet.credit(payout)?;
        }
        Ok(payout)
    }

    /// Close the book without a result: open wagers are voided and their
    /// stakes refunded. Returns whether a book was open.
    pub fn close_book(&mut self) -> Result<bool, BettingError> {
        if self.book.take().is_none() {
            return Ok(false);
        }
        let refund: f64 = self.history.unsettled_mut().map(|w| w.void()).sum();
        if refund > 0.0 {
            self.wallet.credit(refund)?;
        }
        warn!("Book closed without settlement; refunded {:.2}", refund);
        self.notify(|o| o.on_race_ended());
        Ok(true)
    }

    /// Clear the ledger and the odds, and restore the starting balance.
    pub fn reset(&mut self) {
        self.history.clear();
        self.wallet.reset();
        self.odds.clear();
        self.book = None;
        self.next_wager_id = 1;
        info!("Betting reset (balance {:.2})", self.wallet.balance());
        self.notify(|o| o.on_reset());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::betting::odds::OddsConfig;
    use crate::error::WalletError;
    use crate::horse::{Attributes, Breed};
    use crate::race::{RaceConfig, RaceManager};
    use rand::rngs::mock::StepRng;
    use crate::rng::seeded;
    use crate::track::{TrackCondition, TrackShape};
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    fn flat(name: &str) -> Horse {
        Horse::with_attributes(
            name,
            'h',
            0.5,
            Attributes {
                base_speed: 1.0,
                turn_handling: 0.5,
                stamina: 0.8,
                luck: 0.5,
            },
        )
    }

    fn track() -> Track {
        Track::new("Ledger Lane", TrackShape::Oval, 300, 4, TrackCondition::Dry).unwrap()
    }

    fn no_jitter() -> OddsCalculator {
        OddsCalculator::new(OddsConfig {
            jitter: (1.0, 1.0),
            ..OddsConfig::default()
        })
    }

    fn service(
        status: RaceStatus,
    ) -> (BettingService<StdRng>, watch::Sender<RaceStatus>) {
        let (tx, rx) = watch::channel(status);
        let service = BettingService::new(no_jitter(), VirtualWallet::default(), rx, seeded(Some(3)));
        (service, tx)
    }

    #[derive(Default)]
    struct Log(Mutex<Vec<String>>);

    impl BettingObserver for Log {
        fn on_odds_changed(&self, _: &Odds) {
            self.0.lock().unwrap().push("odds".into());
        }
        fn on_wager_placed(&self, w: &Wager) {
            self.0.lock().unwrap().push(format!("wager:{}", w.horse));
        }
        fn on_race_settled(&self, winner: &str, total: f64) {
            self.0.lock().unwrap().push(format!("settled:{winner}:{total}"));
        }
        fn on_race_ended(&self) {
            self.0.lock().unwrap().push("ended".into());
        }
        fn on_reset(&self) {
            self.0.lock().unwrap().push("reset".into());
        }
    }

    #[test]
    fn winning_wager_round_trip_through_the_wallet() {
        let (mut svc, _tx) = service(RaceStatus::Pending);
        let log = Arc::new(Log::default());
        svc.add_observer(log.clone());
        svc.open_book(&[flat("A"), flat("B")], &track()).unwrap();
        assert_relative_eq!(svc.odds_for("A").unwrap(), 2.0);
        assert_relative_eq!(svc.potential_payout("A", 100.0), 200.0);

        let wager = svc.place_bet("A", 100.0).unwrap();
        assert_relative_eq!(wager.odds, 2.0);
        assert_relative_eq!(svc.wallet().balance(), 900.0);
        // Stake on A shortened its price; the wager keeps the frozen one.
        assert!(svc.odds_for("A").unwrap() < 2.0);

        let total = svc.settle_race(Some("A")).unwrap();
        assert_relative_eq!(total, 200.0);
        assert_relative_eq!(svc.wallet().balance(), 1100.0);
        assert!(!svc.is_book_open());
        assert_eq!(
            *log.0.lock().unwrap(),
            vec!["odds", "odds", "wager:A", "settled:A:200"]
        );
    }

    #[test]
    fn repeated_settlement_credits_once() {
        let (mut svc, _tx) = service(RaceStatus::Pending);
        svc.open_book(&[flat("A"), flat("B")], &track()).unwrap();
        let wager = svc.place_bet("A", 100.0).unwrap();

        assert_relative_eq!(svc.settle_wager(wager.id, "A").unwrap(), 200.0);
        assert_relative_eq!(svc.wallet().balance(), 1100.0);
        assert_relative_eq!(svc.settle_wager(wager.id, "A").unwrap(), 200.0);
        assert_relative_eq!(svc.wallet().balance(), 1100.0);

        // Whole-race settlement finds nothing left to pay.
        assert_relative_eq!(svc.settle_race(Some("A")).unwrap(), 0.0);
        assert_relative_eq!(svc.wallet().balance(), 1100.0);
        assert_eq!(svc.settle_wager(99, "A"), Err(BettingError::UnknownWager(99)));
    }

    #[test]
    fn validation_failures_change_nothing() {
        let (mut svc, tx) = service(RaceStatus::Pending);
        assert_eq!(svc.place_bet("A", 10.0), Err(BettingError::NoOpenBook));
        svc.open_book(&[flat("A"), flat("B")], &track()).unwrap();
        let odds = svc.current_odds().clone();

        assert_eq!(
            svc.place_bet("Ghost", 10.0),
            Err(BettingError::UnknownHorse("Ghost".into()))
        );
        assert_eq!(svc.place_bet("A", 0.0), Err(BettingError::InvalidStake(0.0)));
        assert!(matches!(
            svc.place_bet("A", -5.0),
            Err(BettingError::InvalidStake(_))
        ));
        assert!(matches!(
            svc.place_bet("A", 5000.0),
            Err(BettingError::Wallet(WalletError::InsufficientFunds { .. }))
        ));

        tx.send_replace(RaceStatus::InProgress);
        assert_eq!(
            svc.place_bet("A", 10.0),
            Err(BettingError::WrongPhase(RaceStatus::InProgress))
        );

        assert_relative_eq!(svc.wallet().balance(), 1000.0);
        assert!(svc.history().is_empty());
        assert_eq!(svc.current_odds(), &odds);
    }

    #[test]
    fn settlement_needs_a_book_and_a_winner() {
        let (mut svc, _tx) = service(RaceStatus::Pending);
        assert_eq!(svc.settle_race(Some("A")), Err(BettingError::NoOpenBook));
        svc.open_book(&[flat("A")], &track()).unwrap();
        assert_eq!(
            svc.open_book(&[flat("A")], &track()).unwrap_err(),
            BettingError::BookAlreadyOpen
        );
        assert_eq!(svc.settle_race(None), Err(BettingError::NoWinner));
        assert!(svc.is_book_open());
    }

    #[test]
    fn losing_wagers_pay_nothing() {
        let (mut svc, _tx) = service(RaceStatus::Pending);
        svc.open_book(&[flat("A"), flat("B"), flat("C")], &track()).unwrap();
        svc.place_bet("A", 50.0).unwrap();
        svc.place_bet("B", 25.0).unwrap();
        let b_odds = svc.history().all()[1].odds;
        let total = svc.settle_race(Some("B")).unwrap();
        assert_relative_eq!(total, 25.0 * b_odds);
        assert_relative_eq!(svc.wallet().balance(), 925.0 + 25.0 * b_odds);
        assert_eq!(svc.history().lost().count(), 1);
        assert_eq!(svc.history().won().count(), 1);
    }

    #[test]
    fn closing_the_book_refunds_open_stakes() {
        let (mut svc, _tx) = service(RaceStatus::Pending);
        let log = Arc::new(Log::default());
        svc.add_observer(log.clone());
        svc.open_book(&[flat("A"), flat("B")], &track()).unwrap();
        svc.place_bet("B", 40.0).unwrap();
        assert!(svc.close_book().unwrap());
        assert!(!svc.close_book().unwrap());
        assert_relative_eq!(svc.wallet().balance(), 1000.0);
        assert_eq!(svc.history().unsettled().count(), 0);
        assert_eq!(log.0.lock().unwrap().last().map(String::as_str), Some("ended"));
    }

    #[test]
    fn track_changes_reprice_and_reset_clears() {
        let (mut svc, _tx) = service(RaceStatus::Pending);
        let mut arabian = flat("Sand");
        arabian.set_breed(crate::horse::Breed::Arabian);
        svc.open_book(&[arabian, flat("B")], &track()).unwrap();
        let dry = svc.odds_for("Sand").unwrap();

        let mut muddy = track();
        muddy.set_condition(TrackCondition::Muddy);
        svc.update_track(&muddy).unwrap();
        assert_ne!(svc.odds_for("Sand").unwrap(), dry);

        svc.update_roster(&[flat("B"), flat("C")]).unwrap();
        assert_eq!(svc.odds_for("Sand"), None);
        assert_eq!(svc.potential_payout("Sand", 10.0), 0.0);

        svc.place_bet("C", 100.0).unwrap();
        svc.reset();
        assert!(svc.history().is_empty());
        assert!(svc.current_odds().is_empty());
        assert_relative_eq!(svc.wallet().balance(), 1000.0);
        assert_eq!(svc.recalculate_odds(), Err(BettingError::NoOpenBook));
    }

    #[test]
    fn live_book_follows_the_race_card() {
        let mut race = RaceManager::new(track(), StepRng::new(0, 0), RaceConfig::default());
        let mut sand = flat("Sand");
        sand.set_breed(Breed::Arabian);
        race.add_horse(sand, 0).unwrap();
        race.add_horse(flat("Turf"), 1).unwrap();

        let mut svc = BettingService::new(
            no_jitter(),
            VirtualWallet::default(),
            race.subscribe_status(),
            seeded(Some(3)),
        );
        svc.open_live_book(race.subscribe_card()).unwrap();
        assert_relative_eq!(svc.odds_for("Sand").unwrap(), 2.2);
        assert_relative_eq!(svc.odds_for("Turf").unwrap(), 1.8);
        assert_eq!(
            svc.open_live_book(race.subscribe_card()).unwrap_err(),
            BettingError::BookAlreadyOpen
        );

        // Arabians like the mud; the wager is frozen at the muddy price.
        race.track_mut().unwrap().set_condition(TrackCondition::Muddy);
        let wager = svc.place_bet("Sand", 100.0).unwrap();
        assert_relative_eq!(wager.odds, 2.1);

        race.remove_horse("Turf").unwrap();
        assert_eq!(
            svc.place_bet("Turf", 10.0).unwrap_err(),
            BettingError::UnknownHorse("Turf".into())
        );
        assert!(svc.odds_for("Turf").is_none());
        assert_relative_eq!(svc.wallet().balance(), 900.0);
        assert_eq!(svc.history().len(), 1);
    }
}
