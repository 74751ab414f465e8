use thiserror::Error;

/// Balance ledger failures. A failed debit leaves the balance untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    #[error("amount must be non-negative and finite, got {0}")]
    InvalidAmount(f64),

    #[error("insufficient funds: requested {requested:.2}, available {available:.2}")]
    InsufficientFunds { requested: f64, available: f64 },
}

/// Wager placement and settlement failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BettingError {
    #[error("bets are only accepted while the race is pending (status: {0})")]
    WrongPhase(crate::race::RaceStatus),

    #[error("horse {0:?} is not in the current odds book")]
    UnknownHorse(String),

    #[error("stake must be positive and finite, got {0}")]
    InvalidStake(f64),

    #[error("no betting book is open")]
    NoOpenBook,

    #[error("a betting book is already open")]
    BookAlreadyOpen,

    #[error("cannot settle without a winner")]
    NoWinner,

    #[error("no wager with id {0}")]
    UnknownWager(u64),

    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Race lifecycle and roster failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RaceError {
    #[error("cannot start a race with an empty roster")]
    EmptyRoster,

    #[error("a race is already in progress")]
    AlreadyRunning,

    #[error("race must be pending for this operation (status: {0})")]
    NotPending(crate::race::RaceStatus),

    #[error("no race has been started")]
    NotStarted,

    #[error("lane {lane} does not exist (track has {lanes} lanes)")]
    LaneOutOfRange { lane: usize, lanes: usize },

    #[error("lane {0} is already occupied")]
    LaneOccupied(usize),

    #[error("a horse named {0:?} is already entered")]
    DuplicateHorse(String),

    #[error("the race task has not been joined yet")]
    Unjoined,

    #[error("races run on a Tokio runtime; none is active on this thread")]
    NoRuntime,

    #[error("race task failed: {0}")]
    Join(String),
}

/// Track construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    #[error("track length must be positive")]
    ZeroLength,

    #[error("track must have at least one lane")]
    ZeroLanes,
}
