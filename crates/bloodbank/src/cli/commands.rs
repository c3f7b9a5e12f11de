//! CLI command definitions.
//!
//! Field values are passed through as strings so the form layer applies the
//! same validation and messages as any other front end.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::forms::{DonationForm, DonorForm, TransactionForm};

/// Account commands.
#[derive(Debug, Subcommand)]
pub enum AccountCommand {
    /// Create an account for `--user` with `--password`
    Register {
        /// Date of birth (YYYY-MM-DD)
        #[arg(long, value_name = "DATE")]
        dob: String,
    },

    /// Check that `--user` and `--password` are valid
    Login,
}

/// Donor registry commands.
#[derive(Debug, Subcommand)]
pub enum DonorCommand {
    /// Register a donor
    Add(DonorArgs),

    /// List registered donors
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Donation log commands.
#[derive(Debug, Subcommand)]
pub enum DonationCommand {
    /// Record a donation dated today and credit the inventory
    Record(DonationArgs),

    /// List recorded donations
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Inventory commands.
#[derive(Debug, Subcommand)]
pub enum InventoryCommand {
    /// Show stock for one blood group, or all of them
    Show {
        /// Blood group to show (e.g. "O+")
        #[arg(short, long)]
        blood_group: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Collect units from, or deposit units into, the inventory
    Transact(TransactArgs),
}

/// Donor fields.
#[derive(Debug, Args)]
pub struct DonorArgs {
    /// Donor name
    #[arg(short, long)]
    pub name: String,

    /// Age in years
    #[arg(short, long)]
    pub age: String,

    /// Gender (male, female, prefer not to say)
    #[arg(short, long)]
    pub gender: String,

    /// Blood group (A+, A-, B+, B-, AB+, AB-, O+, O-)
    #[arg(short, long)]
    pub blood_group: String,
}

impl From<DonorArgs> for DonorForm {
    fn from(args: DonorArgs) -> Self {
        Self {
            name: args.name,
            age: args.age,
            gender: args.gender,
            blood_group: args.blood_group,
        }
    }
}

/// Donation fields.
#[derive(Debug, Args)]
pub struct DonationArgs {
    /// Who donated
    #[command(flatten)]
    pub donor: DonorArgs,

    /// Units donated
    #[arg(long)]
    pub units: String,
}

impl From<DonationArgs> for DonationForm {
    fn from(args: DonationArgs) -> Self {
        Self {
            name: args.donor.name,
            age: args.donor.age,
            gender: args.donor.gender,
            blood_group: args.donor.blood_group,
            units: args.units,
        }
    }
}

/// Inventory transaction fields.
#[derive(Debug, Args)]
pub struct TransactArgs {
    /// Transaction type (collect or deposit)
    #[arg(short, long)]
    pub kind: String,

    /// Blood group
    #[arg(short, long)]
    pub blood_group: String,

    /// Customer or hospital name
    #[arg(long)]
    pub counterparty: String,

    /// Units moved
    #[arg(long)]
    pub units: String,
}

impl From<TransactArgs> for TransactionForm {
    fn from(args: TransactArgs) -> Self {
        Self {
            kind: args.kind,
            blood_group: args.blood_group,
            counterparty: args.counterparty,
            units: args.units,
        }
    }
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns
    #[default]
    Table,
    /// JSON output
    Json,
}
