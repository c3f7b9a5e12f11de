//! The donation log.
//!
//! Recording a donation appends a [`DonationEvent`] and then increments the
//! ledger. The two writes are independent: if the increment fails after the
//! event is stored, the log and the ledger disagree until corrected by hand.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{error, info};

use crate::error::Result;
use crate::forms::DonationForm;
use crate::inventory::InventoryLedger;
use crate::model::DonationEvent;
use crate::store::{from_document, to_document, DocumentStore, Filter, DONATIONS};

/// Stores donation events and feeds the inventory ledger.
#[derive(Debug)]
pub struct DonationLog<S> {
    store: Arc<S>,
    ledger: InventoryLedger<S>,
}

impl<S: DocumentStore> DonationLog<S> {
    /// Create a log over `store` that credits `ledger`.
    pub fn new(store: Arc<S>, ledger: InventoryLedger<S>) -> Self {
        Self { store, ledger }
    }

    /// Record a donation dated today.
    ///
    /// # Errors
    ///
    /// See [`DonationLog::record_donation_on`].
    pub fn record_donation(&self, form: &DonationForm) -> Result<DonationEvent> {
        self.record_donation_on(form, Local::now().date_naive())
    }

    /// Record a donation with an explicit date.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty or malformed fields. A store
    /// error from the ledger increment is returned after the event has
    /// already been written.
    pub fn record_donation_on(&self, form: &DonationForm, date: NaiveDate) -> Result<DonationEvent> {
        let donation = form.validate()?;
        let event = DonationEvent {
            name: donation.donor.name,
            age: donation.donor.age,
            gender: donation.donor.gender,
            blood_group: donation.donor.blood_group,
            units: donation.units,
            date,
        };

        self.store
            .insert_one(DONATIONS, &to_document(DONATIONS, &event)?)?;

        if let Err(e) = self.ledger.increment(event.blood_group, event.units) {
            error!(
                "Donation by '{}' was logged but {} inventory was not credited with {} units: {}",
                event.name, event.blood_group, event.units, e
            );
            return Err(e);
        }

        info!(
            "Recorded donation of {} {} units by '{}'",
            event.units, event.blood_group, event.name
        );
        Ok(event)
    }

    /// Every donation, in the order recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails or a document is malformed.
    pub fn list_donations(&self) -> Result<Vec<DonationEvent>> {
        self.store
            .find_many(DONATIONS, &Filter::all())?
            .into_iter()
            .map(|document| from_document(DONATIONS, document))
            .collect()
    }

    /// Number of recorded donations.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn count(&self) -> Result<u64> {
        self.store.count(DONATIONS, &Filter::all())
    }
}
