//! `bloodbank` - CLI for the blood bank records
//!
//! This binary signs staff in and drives the donor registry, donation log and
//! inventory ledger.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use bloodbank::cli::{
    AccountCommand, Cli, Command, ConfigCommand, DonationCommand, DonorCommand, InventoryCommand,
    OutputFormat,
};
use bloodbank::forms::{LoginForm, SignupForm};
use bloodbank::{init_logging, BloodBank, BloodGroup, Config, Error, Session, SqliteStore};

type Bank = BloodBank<SqliteStore>;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<Error>() {
                Some(err) if err.is_user_error() => eprintln!("Error: {err}"),
                _ => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;
    let requires_login = cli.requires_login();
    let credentials = cli.login_form();
    let has_user = cli.user.is_some();

    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(&config, config_cmd),
        other => other,
    };

    // A missing store is fatal; nothing below can run without it.
    let bank = BloodBank::open(&config).context("blood bank store is unavailable")?;

    if let Command::Account(account_cmd) = command {
        return handle_account(&bank, credentials, account_cmd);
    }

    if requires_login && !has_user {
        return Err(Error::NotAuthenticated.into());
    }
    let session = bank.login(&credentials)?;

    match command {
        Command::Donor(donor_cmd) => handle_donor(&bank, &session, donor_cmd),
        Command::Donation(donation_cmd) => handle_donation(&bank, &session, donation_cmd),
        Command::Inventory(inventory_cmd) => handle_inventory(&bank, &session, inventory_cmd),
        Command::Stats(stats_cmd) => {
            let summary = bank.summary(&session)?;
            if stats_cmd.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Total donors:    {}", summary.total_donors);
                println!("Total donations: {}", summary.total_donations);
            }
            Ok(())
        }
        Command::Account(_) | Command::Config(_) => Ok(()),
    }
}

fn handle_account(bank: &Bank, credentials: LoginForm, cmd: AccountCommand) -> anyhow::Result<()> {
    match cmd {
        AccountCommand::Register { dob } => {
            let user = bank.register(&SignupForm {
                name: credentials.name,
                password: credentials.password,
                dob,
            })?;
            println!("Account '{}' created.", user.name);
        }
        AccountCommand::Login => {
            let session = bank.login(&credentials)?;
            println!("Logged in as '{}'.", session.user_name());
        }
    }
    Ok(())
}

fn handle_donor(bank: &Bank, session: &Session, cmd: DonorCommand) -> anyhow::Result<()> {
    match cmd {
        DonorCommand::Add(args) => {
            let donor = bank.add_donor(session, &args.into())?;
            println!("Donor '{}' added.", donor.name);
        }
        DonorCommand::List { format } => {
            let donors = bank.list_donors(session)?;
            print_listing(format, &donors, || {
                println!("{:<24} {:>4}  {:<18} {:<5}", "NAME", "AGE", "GENDER", "GROUP");
                for donor in &donors {
                    println!(
                        "{:<24} {:>4}  {:<18} {:<5}",
                        donor.name,
                        donor.age,
                        donor.gender.label(),
                        donor.blood_group
                    );
                }
            })?;
        }
    }
    Ok(())
}

fn handle_donation(bank: &Bank, session: &Session, cmd: DonationCommand) -> anyhow::Result<()> {
    match cmd {
        DonationCommand::Record(args) => {
            let event = bank.record_donation(session, &args.into())?;
            println!(
                "Recorded {} {} units from '{}' on {}.",
                event.units, event.blood_group, event.name, event.date
            );
        }
        DonationCommand::List { format } => {
            let donations = bank.list_donations(session)?;
            print_listing(format, &donations, || {
                println!(
                    "{:<10}  {:<24} {:>4}  {:<18} {:<5} {:>5}",
                    "DATE", "NAME", "AGE", "GENDER", "GROUP", "UNITS"
                );
                for event in &donations {
                    println!(
                        "{:<10}  {:<24} {:>4}  {:<18} {:<5} {:>5}",
                        event.date,
                        event.name,
                        event.age,
                        event.gender.label(),
                        event.blood_group,
                        event.units
                    );
                }
            })?;
        }
    }
    Ok(())
}

fn handle_inventory(bank: &Bank, session: &Session, cmd: InventoryCommand) -> anyhow::Result<()> {
    match cmd {
        InventoryCommand::Show {
            blood_group: Some(label),
            format,
        } => {
            let blood_group: BloodGroup = label.parse()?;
            let amount = bank.inventory(session, blood_group)?;
            match format {
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::json!({ "blood_group": blood_group, "amount": amount })
                ),
                OutputFormat::Table => println!("{blood_group}: {amount} units"),
            }
        }
        InventoryCommand::Show {
            blood_group: None,
            format,
        } => {
            let records = bank.overview(session)?;
            print_listing(format, &records, || {
                println!("{:<5} {:>6}", "GROUP", "UNITS");
                for record in &records {
                    println!("{:<5} {:>6}", record.blood_group, record.amount);
                }
            })?;
        }
        InventoryCommand::Transact(args) => {
            let record = bank.process_transaction(session, &args.into())?;
            println!(
                "Transaction complete. {} now has {} units.",
                record.blood_group, record.amount
            );
        }
    }
    Ok(())
}

fn print_listing<T: Serialize>(
    format: OutputFormat,
    items: &[T],
    table: impl FnOnce(),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Table if items.is_empty() => println!("No records."),
        OutputFormat::Table => table(),
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Busy timeout (ms):  {}", config.storage.busy_timeout_ms);
                println!();
                println!("[Security]");
                println!("  PBKDF2 iterations:  {}", config.security.pbkdf2_iterations);
                println!();
                println!("[Inventory]");
                println!(
                    "  Missing records:    {}",
                    serde_json::to_value(config.inventory.missing_record_policy)?
                        .as_str()
                        .unwrap_or_default()
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
