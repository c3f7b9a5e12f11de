//! Command-line interface for bloodbank.
//!
//! This module provides the CLI structure for the `bloodbank` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AccountCommand, ConfigCommand, DonationArgs, DonationCommand, DonorArgs, DonorCommand,
    InventoryCommand, OutputFormat, StatsCommand, TransactArgs,
};

use crate::forms::LoginForm;
use crate::logging::Verbosity;

/// bloodbank - Blood bank records and inventory
///
/// Registers donors, logs donations, and tracks per-blood-group stock.
#[derive(Debug, Parser)]
#[command(name = "bloodbank")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Account name
    #[arg(short, long, global = true, value_name = "NAME")]
    pub user: Option<String>,

    /// Account password
    #[arg(long, global = true, env = "BLOODBANK_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign up or log in
    #[command(subcommand)]
    Account(AccountCommand),

    /// Manage donors
    #[command(subcommand)]
    Donor(DonorCommand),

    /// Record and list donations
    #[command(subcommand)]
    Donation(DonationCommand),

    /// Inspect and move blood stock
    #[command(subcommand)]
    Inventory(InventoryCommand),

    /// Show donor and donation totals
    Stats(StatsCommand),

    /// View configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }

    /// The credentials given on the command line, unvalidated.
    ///
    /// Missing values become empty fields so the login form reports them.
    #[must_use]
    pub fn login_form(&self) -> LoginForm {
        LoginForm {
            name: self.user.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
        }
    }

    /// Whether the command works on stored records and needs a login.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(
            self.command,
            Command::Donor(_) | Command::Donation(_) | Command::Inventory(_) | Command::Stats(_)
        )
    }
}
