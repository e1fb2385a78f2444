//! # argononed
//!
//! A Linux daemon for the Argon ONE Raspberry Pi case: fan control over I2C,
//! the power button on a GPIO line and status screens on the case OLED.
//!
//! ## Features
//!
//! - **Async Architecture**: three independent Tokio tasks that never block
//!   each other
//! - **Fan Control**: temperature thresholds for CPU and disks, with a
//!   cooldown before the fan slows down
//! - **Power Button**: pulse-width gestures for reboot, shutdown and screen
//!   switching
//! - **Status Screens**: clock, CPU, storage, bandwidth, RAID, RAM,
//!   temperature and IP pages with a screensaver
//! - **Live Thresholds**: threshold edits apply on the next fan cycle
//!
//! ## Architecture
//!
//! The daemon uses a provider-based dependency injection system with:
//! - [`SystemCoordinator`](coordinator::SystemCoordinator) - Main lifecycle manager
//! - [`AppState`](app_context::AppState) - Shared application state
//! - [`gesture_channel`](event::gesture_channel) - Button to display signalling
//! - Service providers for the fan, button and display loops
//!
//! ## Example
//!
//! ```no_run
//! use argononed::{application::Application, config::ConfigManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config_manager = ConfigManager::load(None).await?;
//!     Application::builder()
//!         .with_config_manager(config_manager)
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```

pub mod app_context;
pub mod application;
pub mod button;
pub mod config;
pub mod coordinator;
pub mod display;
pub mod drivers;
pub mod event;
pub mod fan_driver;
pub mod fan_policy;
pub mod metrics;
pub mod power;
pub mod providers;
pub mod task_manager;
