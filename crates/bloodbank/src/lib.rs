//! `bloodbank` - Records and inventory for a blood bank
//!
//! This library provides staff accounts, a donor registry, a donation log and
//! a per-blood-group inventory ledger over a pluggable document store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod accounts;
pub mod app;
pub mod cli;
pub mod config;
pub mod donations;
pub mod donors;
pub mod error;
pub mod forms;
pub mod inventory;
pub mod logging;
pub mod model;
pub mod store;

pub use app::{BloodBank, Session, Summary};
pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{BloodGroup, DonationEvent, Donor, Gender, InventoryRecord, TransactionKind, User};
pub use store::{DocumentStore, SqliteStore};
