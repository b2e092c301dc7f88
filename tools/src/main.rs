//! anthill-runner: runs the colony forever, one tick per second.
//!
//! Usage:
//!   anthill-runner                                  # catch up, then run forever
//!   anthill-runner --ticks 120                      # bounded real-time run
//!   anthill-runner --advance 500                    # 500 ticks now, with events
//!   anthill-runner --fast-forward 10000             # 10000 ticks now, no events
//!   anthill-runner --status
//!   anthill-runner --reset
//!   anthill-runner --command '{"cmd":"add_resource","resource":"dirt","amount":5}'
//!
//! Common flags: --config <path> (default anthill.json), --state <path>,
//! --no-catch-up.

use anthill_core::{
    command::WorldCommand,
    config::SimConfig,
    engine::SimEngine,
    snapshot::WorldStatus,
    store::StateStore,
};
use anyhow::Result;
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_path = string_arg(&args, "--config").unwrap_or("anthill.json");
    let mut config = SimConfig::load(config_path)?;
    if let Some(state) = string_arg(&args, "--state") {
        config.state_path = state.into();
    }

    let store = StateStore::open(config.state_path.clone());

    if has_flag(&args, "--reset") {
        let world = store.reset()?;
        println!("{}", WorldStatus::of(&world));
        return Ok(());
    }

    if let Some(raw) = string_arg(&args, "--command") {
        let command: WorldCommand = serde_json::from_str(raw)?;
        let world = command.execute(&store)?;
        println!("{}", WorldStatus::of(&world));
        return Ok(());
    }

    if has_flag(&args, "--status") {
        println!("{}", WorldStatus::of(&store.load()));
        return Ok(());
    }

    if let Some(ticks) = parse_arg::<u64>(&args, "--fast-forward") {
        let mut engine = SimEngine::new(config, store, Box::new(anthill_core::clock::SystemClock));
        engine.fast_forward(ticks)?;
        println!("{}", engine.status());
        return Ok(());
    }

    log::info!("anthill-runner: state at {}", config.state_path.display());
    let mut engine = SimEngine::build(config);
    log::info!("anthill-runner: loaded extensions {:?}", engine.registry().loaded());

    if let Some(ticks) = parse_arg::<u64>(&args, "--advance") {
        engine.advance(ticks)?;
        println!("{}", engine.status());
        return Ok(());
    }

    if has_flag(&args, "--no-catch-up") {
        engine.save()?;
    } else {
        let report = engine.start();
        if report.applied > 0 {
            log::info!(
                "anthill-runner: caught up {} ticks ({}s offline{})",
                report.applied,
                report.elapsed_secs,
                if report.capped { ", capped" } else { "" }
            );
        }
    }

    match parse_arg::<u64>(&args, "--ticks") {
        Some(ticks) => {
            engine.run_for(ticks);
            println!("{}", engine.status());
            Ok(())
        }
        None => engine.run(),
    }
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    string_arg(args, flag).and_then(|v| v.parse().ok())
}
