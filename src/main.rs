use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use std::sync::Arc;
use tracing::{info, warn};

use paddock::betting::{BettingService, Odds, OddsCalculator, VirtualWallet};
use paddock::config::Config;
use paddock::horse::{Accessory, Breed, CoatColor, Equipment, Horse, Horseshoes, Saddle};
use paddock::race::{ChannelObserver, RaceEvent, RaceManager, StatisticsLog, Termination};
use paddock::rng;

const STABLE: [(&str, char); 8] = [
    ("Thunder Bolt", 'T'),
    ("Silver Arrow", 'S'),
    ("Midnight Run", 'M'),
    ("Dust Devil", 'D'),
    ("Lucky Clover", 'L'),
    ("Red Comet", 'R'),
    ("Gale Force", 'G'),
    ("Iron Duke", 'I'),
];

const SADDLES: [Saddle; 5] = [
    Saddle::Racing,
    Saddle::English,
    Saddle::Western,
    Saddle::Bareback,
    Saddle::Dressage,
];

const SHOES: [Horseshoes; 5] = [
    Horseshoes::Standard,
    Horseshoes::Lightweight,
    Horseshoes::Traction,
    Horseshoes::Therapeutic,
    Horseshoes::None,
];

const ACCESSORIES: [Accessory; 6] = [
    Accessory::None,
    Accessory::Blinders,
    Accessory::Blanket,
    Accessory::Plume,
    Accessory::LuckyCharm,
    Accessory::PerformanceBridle,
];

fn demo_field<R: Rng>(size: usize, rng: &mut R) -> Vec<Horse> {
    (0..size)
        .map(|i| {
            let (name, symbol) = STABLE
                .get(i)
                .map(|&(n, s)| (n.to_string(), s))
                .unwrap_or_else(|| (format!("Runner {}", i + 1), char::from(b'a' + (i % 26) as u8)));
            let equipment = Equipment::new(
                SADDLES[rng.gen_range(0..SADDLES.len())],
                SHOES[rng.gen_range(0..SHOES.len())],
                ACCESSORIES[rng.gen_range(0..ACCESSORIES.len())],
            );
            let confidence = rng.gen_range(0.4..0.9);
            Horse::builder(name, symbol)
                .breed(Breed::ALL[i % Breed::ALL.len()])
                .coat(CoatColor::ALL[i % CoatColor::ALL.len()])
                .equipment(equipment)
                .confidence(confidence)
                .build(rng)
        })
        .collect()
}

fn favourite(odds: &Odds) -> Option<String> {
    odds.iter()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(name, _)| name.clone())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    match config.seed {
        Some(seed) => info!("Seeded run ({})", seed),
        None => info!("Unseeded run"),
    }

    let track = config.track()?;
    let mut race = RaceManager::new(track, rng::stream(config.seed, 1), config.race_config());

    let stats = Arc::new(StatisticsLog::new());
    race.add_statistics_sink(stats.clone());
    let (observer, mut events) = ChannelObserver::new();
    race.add_observer(Arc::new(observer.without_ticks()));

    let mut roster_rng = rng::stream(config.seed, 0);
    for (lane, horse) in demo_field(config.field_size, &mut roster_rng)
        .into_iter()
        .enumerate()
    {
        info!(
            "Lane {}: {} ({}, {}, confidence {:.2}, speed {:.2})",
            lane,
            horse.name(),
            horse.breed(),
            horse.coat().name(),
            horse.confidence(),
            horse.base_speed()
        );
        race.add_horse(horse, lane)?;
    }

    let mut betting = BettingService::new(
        OddsCalculator::default(),
        VirtualWallet::new(config.initial_balance),
        race.subscribe_status(),
        rng::stream(config.seed, 2),
    );
    for (name, odds) in betting.open_live_book(race.subscribe_card())? {
        info!("  {:<14} {:>5.1}", name, odds);
    }

    if config.stake > 0.0 {
        let pick = config
            .back
            .clone()
            .or_else(|| favourite(betting.current_odds()))
            .context("no horse to back")?;
        let wager = betting.place_bet(&pick, config.stake)?;
        info!(
            "Backing {} for {:.2} at {:.1} (returns {:.2} if it wins)",
            wager.horse,
            wager.stake,
            wager.odds,
            wager.potential_payout()
        );
    }

    race.start()?;

    if let Some(stop) = race.stop_handle() {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; stopping the race");
                stop.stop();
            }
        });
    }

    let commentary = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                RaceEvent::Started { horses } => info!("And they're off! {} runners", horses.len()),
                RaceEvent::Fell { horse } => info!("{} has fallen at {:.1}", horse.name, horse.distance),
                RaceEvent::Winner { horse } => info!("{} takes it!", horse.name),
                RaceEvent::Tick { .. } => {}
                RaceEvent::Ended { .. } => break,
            }
        }
    });

    let summary = race.wait().await?;
    commentary.await?;

    let total = match summary.termination {
        Termination::Cancelled => {
            betting.close_book()?;
            0.0
        }
        _ => betting.settle_race(summary.winner.as_deref())?,
    };

    for p in &summary.performances {
        info!(
            "{:<14} pos {} dist {:>6.1} ({:>5.1}%) fell {:<5} confidence {:.2} -> {:.2}",
            p.horse,
            p.finishing_position,
            p.distance,
            p.completion,
            p.fell,
            p.confidence_before,
            p.confidence_after
        );
    }
    info!(
        "Paid out {:.2}; balance {:.2} (started at {:.2})",
        total,
        betting.wallet().balance(),
        betting.wallet().initial_balance()
    );

    if config.json {
        let report = serde_json::json!({
            "race": summary,
            "wagers": betting.history().all(),
            "balance": betting.wallet().balance(),
            "races_recorded": stats.len(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
