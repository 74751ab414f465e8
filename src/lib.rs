//! Stochastic horse-race simulation with a dynamic odds market and wager
//! settlement.
//!
//! - [`track`]: course geometry and conditions
//! - [`horse`]: attributes, customisation and per-tick movement
//! - [`race`]: the race lifecycle and its background tick loop
//! - [`betting`]: odds, wallet, wager ledger and settlement

pub mod betting;
pub mod config;
pub mod error;
pub mod horse;
pub mod race;
pub mod rng;
pub mod track;
