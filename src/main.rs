use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use joyspyck::joystick::UinputFactory;
use joyspyck::{ConfigError, JoyspyckConfig, Joyspyck, JoystickError};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

const EXIT_CONFIG_UNREADABLE: i32 = -1;
const EXIT_CONFIG_MISSING: i32 = -2;
const EXIT_CONFIG_INVALID: i32 = -3;
const EXIT_DEVICE_FAILED: i32 = -4;

/// Publish I2C/FTDI input hardware as virtual joysticks
#[derive(Parser, Debug)]
#[command(name = "joyspyck", version, about)]
struct Cli {
    /// Joystick configuration (JSON, or TOML with a .toml extension)
    config_file: Option<PathBuf>,

    /// Poll everything on one loop with this interval in seconds
    #[arg(long = "wait_time", value_name = "SECONDS")]
    wait_time: Option<f64>,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup(cli.verbose)?;

    let Some(path) = cli.config_file else {
        error!("No config file given");
        process::exit(EXIT_CONFIG_MISSING);
    };

    let config = match JoyspyckConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}: {}", path.display(), e);
            process::exit(load_exit_code(&e));
        }
    };

    let cooperative_wait = cooperative_interval(cli.wait_time)?;

    let runtime = match Joyspyck::build(&config, &UinputFactory) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Cannot create joysticks: {}", e);
            process::exit(build_exit_code(&e));
        }
    };
    info!("Created {} joysticks", runtime.joysticks().len());

    let _signal_handler = runtime.install_signal_handler();
    let result = match cooperative_wait {
        Some(wait) => runtime.run_cooperative(wait).await,
        None => runtime.run_parallel().await,
    };
    result.map_err(|e| eyre!("Polling stopped: {}", e))?;

    info!("Shut down cleanly");
    Ok(())
}

/// Exit code for a config file that failed to load
fn load_exit_code(error: &ConfigError) -> i32 {
    match error {
        ConfigError::Io(_) => EXIT_CONFIG_UNREADABLE,
        _ => EXIT_CONFIG_INVALID,
    }
}

/// Exit code for a joystick that could not be built from a loaded config
fn build_exit_code(error: &JoystickError) -> i32 {
    match error {
        JoystickError::Config(_) => EXIT_CONFIG_INVALID,
        JoystickError::Sink(_) => EXIT_DEVICE_FAILED,
    }
}

/// Interval of the cooperative loop, `None` selects one worker per joystick dimension
fn cooperative_interval(wait_time: Option<f64>) -> Result<Option<Duration>> {
    match wait_time {
        None => Ok(None),
        Some(secs) if secs == 0.0 => Ok(None),
        Some(secs) => Duration::try_from_secs_f64(secs)
            .map(Some)
            .map_err(|e| eyre!("Invalid --wait_time {}: {}", secs, e)),
    }
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging_env(verbose);
    Ok(())
}

fn setup_logging_env(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
