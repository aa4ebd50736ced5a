//! `roverd` – rover motion control daemon
//!
//! 1. Loads `~/.rover/config.toml` (or `--config PATH`) and applies `ROVER_*`
//!    environment overrides.
//! 2. `run` (default): opens the configured GPIO backend, builds the motion
//!    context and runs the sync loop against the dashboard backend until
//!    Ctrl-C / SIGTERM, then stops the rover.
//! 3. `hwtest`: interactive bench tester for single servos and motors.
//! 4. `show-config`: prints the effective configuration.

mod config;
mod hwtest;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use colored::Colorize;
use rover_hal::{GpioBackend, RoverDriver, open_backend};
use rover_kernel::Kinematics;
use rover_runtime::{HttpCommandSource, MotionContext, SyncLoop, init_tracing};
use rover_types::{RoverStatus, WatchdogState};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "roverd", version, about = "Rover motion control and safety supervisor")]
struct Cli {
    /// Config file (default: ~/.rover/config.toml)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Follow the command backend and drive the rover (default)
    Run,
    /// Interactive servo / motor tester
    Hwtest,
    /// Print the effective configuration
    ShowConfig {
        /// Also write it to the config file
        #[arg(long)]
        save: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing("roverd");

    print_banner();

    let path = cli.config.unwrap_or_else(config::config_path);
    let cfg = load_config(&path);

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(cfg),
        Command::Hwtest => hwtest(&cfg),
        Command::ShowConfig { save } => show_config(&cfg, &path, save),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Config {
    let mut cfg = match config::load_from(path) {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            println!(
                "  No config at {}; using defaults.",
                path.display().to_string().dimmed()
            );
            Config::default()
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            Config::default()
        }
    };
    config::apply_env_overrides(&mut cfg);
    cfg
}

fn show_config(cfg: &Config, path: &Path, save: bool) -> ExitCode {
    match config::to_toml(cfg) {
        Ok(raw) => println!("\n{raw}"),
        Err(e) => {
            println!("{}: {}", "Error".red(), e);
            return ExitCode::FAILURE;
        }
    }
    if save {
        if let Err(e) = config::save_to(cfg, path) {
            println!("{}: {}", "Error saving config".red(), e);
            return ExitCode::FAILURE;
        }
        println!(
            "  {} Config saved to {}",
            "✓".green().bold(),
            path.display().to_string().bold()
        );
    }
    ExitCode::SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// Subcommands
// ─────────────────────────────────────────────────────────────────────────────

fn open_driver(cfg: &Config) -> Option<RoverDriver> {
    let mut backend: Box<dyn GpioBackend> = match open_backend(cfg.hardware) {
        Ok(backend) => backend,
        Err(e) => {
            error!(hardware = %cfg.hardware, error = %e, "cannot open GPIO backend");
            println!("{}: {}", "Hardware error".red(), e);
            return None;
        }
    };
    Some(RoverDriver::new(backend.as_mut(), &cfg.actuation))
}

fn run(cfg: Config) -> ExitCode {
    let Some(driver) = open_driver(&cfg) else {
        return ExitCode::FAILURE;
    };
    let source = match HttpCommandSource::new(&cfg.backend_url, cfg.sync.fetch_timeout()) {
        Ok(source) => source,
        Err(e) => {
            println!("{}: {}", "Startup error".red(), e);
            return ExitCode::FAILURE;
        }
    };
    let ctx = MotionContext::new(
        driver,
        Kinematics::new(&cfg.kinematics),
        cfg.sync.watchdog_timeout(),
        Instant::now(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Shutdown requested – stopping rover …".yellow().bold());
        let _ = shutdown_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; the rover will only stop on its watchdog");
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            println!("{}: {}", "Runtime error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        backend_url = %cfg.backend_url,
        hardware = %cfg.hardware,
        mode = %cfg.kinematics.mode,
        "roverd starting"
    );
    println!(
        "  Following {} on {} hardware ({} drive). Ctrl-C to stop.\n",
        cfg.backend_url.bold(),
        cfg.hardware.to_string().bold(),
        cfg.kinematics.mode
    );

    let status = runtime.block_on(async move {
        let mut sync = SyncLoop::new(ctx, source, cfg.sync);
        sync.run(shutdown_rx).await;
        sync.status(Instant::now())
    });

    print_final_status(&status);
    ExitCode::SUCCESS
}

fn print_final_status(status: &RoverStatus) {
    let watchdog = match status.watchdog {
        WatchdogState::Active => "active".green(),
        WatchdogState::Stopped => "tripped".yellow(),
    };
    println!(
        "{}",
        format!("  ✓ Rover halted (last sequence {}).", status.last_sequence).green()
    );
    println!("  Watchdog: {watchdog}");
    match status.last_command_age_secs {
        Some(age) => println!("  Last command: {age:.1} s ago"),
        None => println!("  Last command: {}", "none received".dimmed()),
    }
}

fn hwtest(cfg: &Config) -> ExitCode {
    let Some(mut driver) = open_driver(cfg) else {
        return ExitCode::FAILURE;
    };
    println!("  Testing on {} hardware.", cfg.hardware.to_string().bold());
    hwtest::run(&mut driver);
    ExitCode::SUCCESS
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ________  _____  _____ ___/ /"#.bold().cyan());
    println!("{}", r#"  / __/ _ \/ |/ / -_) __/ _  / "#.bold().cyan());
    println!("{}", r#" /_/  \___/|___/\__/_/  \_,_/  "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "roverd".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Rover Motion Control & Safety Supervisor");
    println!();
}
