mod chart;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use stim_core::clock::{to_local, SECONDS_PER_HOUR};
use stim_core::decay::decay_amount;
use stim_core::timeseries::{self, DEFAULT_INTERVAL_MINUTES};
use stim_core::*;

const INVALID_INPUT_HINT: &str = "Invalid input. Use 'stim help' to see usage instructions";

#[derive(Parser)]
#[command(name = "stim")]
#[command(about = "Caffeine intake tracker with half-life decay projections", long_about = None)]
#[command(disable_help_subcommand = true, disable_help_flag = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// `<amount> [-h <hours> | <minutes>]`: record a dose
    #[arg(value_name = "AMOUNT", allow_hyphen_values = true, trailing_var_arg = true)]
    dose: Vec<String>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove the most recently added dose
    Undo,

    /// Restore the last undone dose
    Redo,

    /// Show recent doses with remaining amounts
    History,

    /// Chart past and projected levels
    Graph {
        /// Hours of history to show
        hours: Option<String>,

        /// Hours to project ahead
        projection_hours: Option<String>,
    },

    /// Project the effect of a dose without recording it
    Check {
        /// Dose in mg
        #[arg(allow_hyphen_values = true)]
        amount: Option<String>,
    },

    /// Drop doses that have fully decayed
    Prune,

    /// Write the time series snapshot file
    Export,

    /// Show usage
    Help,

    /// Show version and disclaimer
    About,
}

fn main() -> Result<()> {
    // Initialize logging
    stim_core::logging::init();

    let cli = Cli::parse_from(normalize_command_word(std::env::args()));

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let paths = DataPaths::new(&data_dir);
    let mut store = DoseStore::open(&paths, &config);

    match cli.command {
        None if cli.dose.is_empty() => cmd_level(&mut store),
        None => cmd_dose(&mut store, &cli.dose),
        Some(Commands::Undo) => cmd_undo(&mut store),
        Some(Commands::Redo) => cmd_redo(&mut store),
        Some(Commands::History) => cmd_history(&store, &config),
        Some(Commands::Graph {
            hours,
            projection_hours,
        }) => cmd_graph(&store, &config, hours, projection_hours),
        Some(Commands::Check { amount }) => cmd_check(&store, &config, amount),
        Some(Commands::Prune) => cmd_prune(&mut store),
        Some(Commands::Export) => cmd_export(&store, &paths),
        Some(Commands::Help) => {
            print_help();
            Ok(())
        }
        Some(Commands::About) => {
            print_about();
            Ok(())
        }
    }
}

/// Lowercase the command word so `stim UNDO` behaves like `stim undo`
fn normalize_command_word(args: impl IntoIterator<Item = String>) -> Vec<String> {
    let cli = Cli::command();
    let mut args: Vec<String> = args.into_iter().collect();

    let mut i = 1;
    while i < args.len() {
        let arg = &args[i];
        if arg == "--data-dir" {
            i += 2;
            continue;
        }
        if arg.starts_with("--") {
            i += 1;
            continue;
        }
        let lower = arg.to_lowercase();
        if cli.get_subcommands().any(|sc| sc.get_name() == lower) {
            args[i] = lower;
        }
        break;
    }
    args
}

fn cmd_level(store: &mut DoseStore) -> Result<()> {
    let entry = store.current()?;
    println!("Current caffeine level: {}mg ☕", entry.level);
    Ok(())
}

/// Amount and offset in minutes from `<amount> [-h <hours> | <minutes>]`
fn parse_dose_args(args: &[String]) -> Result<(f64, f64)> {
    let parse = |s: &str| {
        s.parse::<f64>()
            .map_err(|_| Error::InvalidNumericInput(s.to_string()))
    };

    let amount = match args.first() {
        Some(raw) => parse(raw.as_str())?,
        None => return Err(Error::InvalidNumericInput(String::new())),
    };

    let offset_minutes = match (args.get(1).map(String::as_str), args.get(2)) {
        (None, _) => 0.0,
        (Some("-h"), Some(hours)) => parse(hours.as_str())? * 60.0,
        (Some(minutes), _) => parse(minutes)?,
    };

    Ok((amount, offset_minutes))
}

fn cmd_dose(store: &mut DoseStore, args: &[String]) -> Result<()> {
    let (amount, offset_minutes) = match parse_dose_args(args) {
        Ok(parsed) => parsed,
        Err(Error::InvalidNumericInput(_)) => {
            println!("{}", INVALID_INPUT_HINT);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let level = match store.add(amount, offset_minutes) {
        Ok(level) => level,
        Err(e @ Error::InvalidAmount { .. }) => {
            println!("{}", e);
            return Ok(());
        }
        Err(Error::InvalidNumericInput(_)) => {
            println!("{}", INVALID_INPUT_HINT);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    // Offsets of either sign are recorded in the past
    let hours = offset_minutes.abs() / 60.0;
    if offset_minutes == 0.0 {
        println!("Added {}mg. Current level: {}mg ☕", amount, level);
    } else if hours >= 1.0 {
        println!(
            "Added {}mg ({:.1}h ago). Current level: {}mg ☕",
            amount, hours, level
        );
    } else {
        println!(
            "Added {}mg ({:.0}min ago). Current level: {}mg ☕",
            amount,
            offset_minutes.abs(),
            level
        );
    }
    Ok(())
}

fn print_recent(store: &DoseStore) -> Result<()> {
    let recent = store.recent(5)?;
    if !recent.is_empty() {
        println!("\nLast 5 doses:");
        for dose in recent {
            println!("{}: {}mg", dose.datetime, dose.amount);
        }
    }
    Ok(())
}

fn cmd_undo(store: &mut DoseStore) -> Result<()> {
    let Some(removed) = store.undo()? else {
        println!("No doses to undo");
        return Ok(());
    };

    print_recent(store)?;
    println!(
        "\nRemoved dose: {}mg from {} ↩",
        removed.amount, removed.datetime
    );
    println!("Current level: {}mg ☕", store.level_at(store.now())?);
    Ok(())
}

fn cmd_redo(store: &mut DoseStore) -> Result<()> {
    let Some(restored) = store.redo()? else {
        println!("No doses to redo");
        return Ok(());
    };

    print_recent(store)?;
    println!(
        "\nRestored dose: {}mg from {} ↪",
        restored.amount, restored.datetime
    );
    println!("Current level: {}mg ☕", store.level_at(store.now())?);
    Ok(())
}

fn cmd_history(store: &DoseStore, config: &Config) -> Result<()> {
    let history = store.history(config.history.limit)?;

    if history.is_empty() {
        println!("No doses recorded yet.");
    } else {
        println!("\nRecent doses:");
        for entry in &history {
            println!(
                "{} ({:.1}h ago): {}mg -> {}mg remaining",
                entry.datetime, entry.hours_ago, entry.amount, entry.remaining
            );
        }
    }

    println!("\nCurrent total: {}mg ☕", store.level_at(store.now())?);
    Ok(())
}

fn cmd_graph(
    store: &DoseStore,
    config: &Config,
    hours: Option<String>,
    projection_hours: Option<String>,
) -> Result<()> {
    let parse = |raw: Option<String>, default: u32| match raw {
        Some(s) => s.parse::<u32>().ok(),
        None => Some(default),
    };

    let (Some(hours), Some(projection_hours)) = (
        parse(hours, config.graph.hours_back),
        parse(projection_hours, config.graph.projection_hours),
    ) else {
        println!("Invalid hours value");
        return Ok(());
    };

    let series = chart::build_series(
        store,
        hours,
        projection_hours,
        config.graph.resolution_minutes,
    )?;
    print!("{}", chart::render(&series, chart::WIDTH, chart::HEIGHT));
    println!("Current level: {}mg ☕", series.current_level());
    Ok(())
}

fn cmd_check(store: &DoseStore, config: &Config, amount: Option<String>) -> Result<()> {
    let Some(raw) = amount else {
        println!("Please provide an amount to check");
        return Ok(());
    };
    let Ok(amount) = raw.parse::<f64>() else {
        println!("Invalid amount. Please provide a number");
        return Ok(());
    };

    let projection = match store.check_future_dose(amount, 0.0) {
        Ok(projection) => projection,
        Err(e @ Error::InvalidAmount { .. }) => {
            println!("{}", e);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let now = store.now();
    println!("\nCurrent level: {:.1}mg ☕", projection.current_level);
    println!(
        "After {}mg dose: {:.1}mg",
        amount, projection.with_dose_level
    );

    println!("\nProjected levels:");
    for checkpoint in &projection.checkpoints {
        let at = to_local(checkpoint.timestamp).format("%d/%m/%Y %H:%M");
        println!(
            "  At {} ({}, in {:.1}h): {:.1}mg",
            at,
            checkpoint.reference.label(),
            (checkpoint.timestamp - now) / SECONDS_PER_HOUR,
            checkpoint.level
        );

        let threshold = match checkpoint.reference {
            ReferenceTime::Evening => Some(("Evening", config.check.evening_warning_mg)),
            ReferenceTime::Night => Some(("Night", config.check.night_warning_mg)),
            ReferenceTime::Morning => None,
        };
        if let Some((name, limit)) = threshold {
            if checkpoint.level > limit {
                println!(
                    "  ⚠ Warning: {} level above {}mg may affect sleep",
                    name, limit
                );
            }
        }
    }

    println!("\nHalf-life progression:");
    let initial = projection.with_dose_level;
    println!("  t=0 (now): {:.1}mg", initial);
    for i in 1..=3u32 {
        let hours = HALF_LIFE_HOURS * f64::from(i);
        println!("  t={}h: {:.1}mg", hours, decay_amount(initial, hours));
    }
    Ok(())
}

fn cmd_prune(store: &mut DoseStore) -> Result<()> {
    let removed = store.prune()?;
    println!("✓ Removed {} fully decayed doses", removed);
    Ok(())
}

fn cmd_export(store: &DoseStore, paths: &DataPaths) -> Result<()> {
    let points = store.timeseries(None, None, DEFAULT_INTERVAL_MINUTES)?;
    timeseries::write_snapshot(&paths.timeseries_file, &points)?;
    println!("✓ Wrote {} points", points.len());
    println!("  Snapshot: {}", paths.timeseries_file.display());
    Ok(())
}

fn print_help() {
    let version = env!("CARGO_PKG_VERSION");
    println!("Caffeine Tracker v{} Usage:", version);
    println!("  stim                              Show current caffeine level");
    println!("  stim <amount>                     Add caffeine dose in mg");
    println!("  stim <amount> -h <hours>          Add dose taken <hours> ago");
    println!("  stim <amount> <minutes>           Add dose taken <minutes> ago");
    println!("  stim check <amount>               Project levels for a potential dose");
    println!("  stim undo                         Show last 5 doses and remove most recent");
    println!("  stim redo                         Restore the last undone dose");
    println!("  stim history                      Show recent doses with remaining amounts");
    println!("  stim graph [hours] [projection]   Chart caffeine levels over time");
    println!("  stim prune                        Drop fully decayed doses");
    println!("  stim export                       Write the time series snapshot");
    println!("  stim help                         Show this help message");
    println!("  stim about                        Show about message");
    println!();
    println!("Options:");
    println!("  --data-dir <path>                 Override data directory");
}

fn print_about() {
    println!("\nCaffeine Tracker v{}", env!("CARGO_PKG_VERSION"));
    println!("\nA command-line tool for tracking caffeine intake and projecting");
    println!(
        "levels over time, assuming a {}-hour half-life.",
        HALF_LIFE_HOURS
    );
    print_disclaimer();
}

fn print_disclaimer() {
    println!("\nDISCLAIMER:");
    println!("This software is for informational purposes only. Its numbers are");
    println!("approximations from a single average half-life and are not a");
    println!("substitute for professional medical advice. Ask a qualified health");
    println!("provider about caffeine consumption or any medical condition.");
}
