mod cli;

use std::{fs::File, time::Duration};

use anyhow::{Context, Result, anyhow};
use argononed::{
    application::Application,
    config::{Config, ConfigManager},
    display::Panel,
    drivers::{I2cFanBus, OledPanel, i2c_fan::default_bus},
    fan_driver::{FanDriver, SpeedMarker},
};
use clap::Parser;
use daemonize::Daemonize;
use log::{LevelFilter, info, warn};
use syslog::{BasicLogger, Facility, Formatter3164};

use cli::{Cli, Command};

const DAEMON_LOG: &str = "/var/tmp/argononed.log";

fn init_log(level: LevelFilter) -> Result<()> {
    syslog::unix(Formatter3164 {
        facility: Facility::LOG_DAEMON,
        hostname: None,
        process: "argononed".into(),
        pid: std::process::id(),
    })
    .map_err(|e| anyhow!("{e}"))
    .and_then(|logger| {
        log::set_boxed_logger(Box::new(BasicLogger::new(logger)))
            .map(|()| log::set_max_level(level))
            .map_err(|e| anyhow!("{e}"))
    })
}

fn into_daemon() -> Result<()> {
    File::create(DAEMON_LOG)
        .and_then(|out| Ok((out.try_clone()?, out)))
        .map_err(|e| anyhow!("{e}"))
        .and_then(|(stderr, stdout)| {
            Daemonize::new()
                .stdout(stdout)
                .stderr(stderr)
                .start()
                .map_err(|e| anyhow!("{e}"))
        })
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")
}

/// Fan handle for the one-shot verbs.
fn open_fan(config: &Config) -> Result<FanDriver> {
    let bus = I2cFanBus::open(config.fan.i2c_bus, config.fan.i2c_address)?;
    Ok(FanDriver::new(
        Box::new(bus),
        config.driver_timing(),
        Some(SpeedMarker::new(&config.fan.speed_marker)),
    ))
}

async fn fan_off(config: &Config) -> Result<()> {
    open_fan(config)?.set_off().await;

    if config.oled.enabled {
        let bus = config.fan.i2c_bus.unwrap_or_else(default_bus);
        match OledPanel::open(bus, config.oled.i2c_address) {
            Ok(mut panel) => {
                panel.clear();
                panel.flush().context("Failed to clear OLED")?;
            }
            Err(e) => warn!("OLED not cleared: {e:#}"),
        }
    }
    Ok(())
}

async fn power_cut(config: &Config) -> Result<()> {
    let fan = open_fan(config)?;
    fan.set_off().await;
    fan.signal_power_cut().await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.command == Command::Version {
        println!("Version: {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if let Err(e) = init_log(LevelFilter::Info) {
        eprintln!("argononed: syslog unavailable, running without logs: {e}");
    }

    // Loaded on a throwaway runtime: daemonizing must happen before the
    // worker threads exist.
    let (config_manager, config) = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async {
            let manager = ConfigManager::load(cli.config.clone()).await?;
            let config = manager.clone_config().await;
            Ok::<_, anyhow::Error>((manager, config))
        })
        .context("Failed to load configuration")?;

    if config.general.debug {
        log::set_max_level(LevelFilter::Debug);
    }

    match cli.command {
        Command::Service { daemonize } => {
            if daemonize {
                into_daemon()?;
            }
            let runtime = runtime()?;
            let result = runtime.block_on(async {
                #[cfg(feature = "tokio-console")]
                console_subscriber::init();

                info!("argononed {} starting", env!("CARGO_PKG_VERSION"));
                Application::builder()
                    .with_config_manager(config_manager)
                    .build()?
                    .run()
                    .await
            });
            // Blocking GPIO waits do not observe cancellation.
            runtime.shutdown_timeout(Duration::from_secs(1));
            result
        }
        Command::Fanoff => runtime()?.block_on(fan_off(&config)),
        Command::Shutdown => runtime()?.block_on(power_cut(&config)),
        Command::Version => Ok(()),
    }
}
