//! Application facade.
//!
//! [`BloodBank`] owns the store handle and the four components, and exposes
//! one handler per user action. Business handlers take the [`Session`]
//! returned by [`BloodBank::login`] plus the form values.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::accounts::AccountStore;
use crate::config::Config;
use crate::donations::DonationLog;
use crate::donors::DonorRegistry;
use crate::error::Result;
use crate::forms::{DonationForm, DonorForm, LoginForm, SignupForm, TransactionForm};
use crate::inventory::InventoryLedger;
use crate::model::{BloodGroup, DonationEvent, Donor, InventoryRecord, User};
use crate::store::{DocumentStore, SqliteStore};

/// An authenticated user.
///
/// Only [`BloodBank::login`] creates one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    user: User,
}

impl Session {
    /// Display name of the logged-in user.
    #[must_use]
    pub fn user_name(&self) -> &str {
        &self.user.name
    }

    /// The logged-in user.
    #[must_use]
    pub fn user(&self) -> &User {
        &self.user
    }
}

/// Dashboard counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Registered donors.
    pub total_donors: u64,
    /// Recorded donations.
    pub total_donations: u64,
}

/// The blood bank application.
#[derive(Debug)]
pub struct BloodBank<S> {
    store: Arc<S>,
    accounts: AccountStore<S>,
    donors: DonorRegistry<S>,
    donations: DonationLog<S>,
    inventory: InventoryLedger<S>,
}

impl BloodBank<SqliteStore> {
    /// Open the configured `SQLite` store and build the application.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::StoreUnavailable`] if the database cannot be
    /// opened; callers should treat this as fatal.
    pub fn open(config: &Config) -> Result<Self> {
        let store = SqliteStore::open(config.database_path(), config.busy_timeout())?;
        Ok(Self::with_store(Arc::new(store), config))
    }
}

impl<S: DocumentStore> BloodBank<S> {
    /// Build the application over an existing store.
    pub fn with_store(store: Arc<S>, config: &Config) -> Self {
        let inventory =
            InventoryLedger::new(Arc::clone(&store), config.inventory.missing_record_policy);
        Self {
            accounts: AccountStore::new(Arc::clone(&store), config.security.pbkdf2_iterations),
            donors: DonorRegistry::new(Arc::clone(&store)),
            donations: DonationLog::new(Arc::clone(&store), inventory.clone()),
            inventory,
            store,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// See [`AccountStore::register`].
    pub fn register(&self, form: &SignupForm) -> Result<User> {
        self.accounts.register(form)
    }

    /// Authenticate and start a session.
    ///
    /// # Errors
    ///
    /// See [`AccountStore::authenticate`].
    pub fn login(&self, form: &LoginForm) -> Result<Session> {
        let user = self.accounts.authenticate(form)?;
        Ok(Session { user })
    }

    /// Register a donor.
    ///
    /// # Errors
    ///
    /// See [`DonorRegistry::add_donor`].
    pub fn add_donor(&self, session: &Session, form: &DonorForm) -> Result<Donor> {
        let donor = self.donors.add_donor(form)?;
        info!("'{}' added donor '{}'", session.user_name(), donor.name);
        Ok(donor)
    }

    /// All donors.
    ///
    /// # Errors
    ///
    /// See [`DonorRegistry::list_donors`].
    pub fn list_donors(&self, _session: &Session) -> Result<Vec<Donor>> {
        self.donors.list_donors()
    }

    /// Record a donation dated today and credit the inventory.
    ///
    /// # Errors
    ///
    /// See [`DonationLog::record_donation_on`].
    pub fn record_donation(&self, session: &Session, form: &DonationForm) -> Result<DonationEvent> {
        let event = self.donations.record_donation(form)?;
        info!("'{}' recorded a donation by '{}'", session.user_name(), event.name);
        Ok(event)
    }

    /// All donations.
    ///
    /// # Errors
    ///
    /// See [`DonationLog::list_donations`].
    pub fn list_donations(&self, _session: &Session) -> Result<Vec<DonationEvent>> {
        self.donations.list_donations()
    }

    /// Apply a collect or deposit transaction from the transaction form.
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad fields, or any error from
    /// [`InventoryLedger::transact`].
    pub fn process_transaction(
        &self,
        session: &Session,
        form: &TransactionForm,
    ) -> Result<InventoryRecord> {
        let request = form.validate()?;
        let record = self
            .inventory
            .transact(request.blood_group, request.kind, request.units)?;
        info!(
            "'{}' processed {} of {} {} units for '{}'",
            session.user_name(),
            request.kind,
            request.units,
            request.blood_group,
            request.counterparty
        );
        Ok(record)
    }

    /// Units in stock for one group.
    ///
    /// # Errors
    ///
    /// See [`InventoryLedger::get_inventory`].
    pub fn inventory(&self, _session: &Session, blood_group: BloodGroup) -> Result<i64> {
        self.inventory.get_inventory(blood_group)
    }

    /// Stock for every group.
    ///
    /// # Errors
    ///
    /// See [`InventoryLedger::overview`].
    pub fn overview(&self, _session: &Session) -> Result<Vec<InventoryRecord>> {
        self.inventory.overview()
    }

    /// Donor and donation totals for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns an error if a store count fails.
    pub fn summary(&self, _session: &Session) -> Result<Summary> {
        Ok(Summary {
            total_donors: self.donors.count()?,
            total_donations: self.donations.count()?,
        })
    }

    /// The account store.
    #[must_use]
    pub fn accounts(&self) -> &AccountStore<S> {
        &self.accounts
    }

    /// The inventory ledger.
    #[must_use]
    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.inventory
    }
}
