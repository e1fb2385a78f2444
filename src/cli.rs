use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// argononed: fan, power button and OLED daemon for the Argon ONE case
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML config file path (default: search ARGONONED_CONFIG, ~/.config, /etc)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the fan, button and display loops
    Service {
        /// Detach from the terminal and log to /var/tmp/argononed.log
        #[arg(short = 'd', long = "daemonize", default_value = "false")]
        daemonize: bool,
    },
    /// Stop the fan and clear the OLED
    Fanoff,
    /// Stop the fan and tell the case to cut power
    Shutdown,
    /// Print the daemon version
    Version,
}
