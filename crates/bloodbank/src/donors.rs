//! The donor registry: append-only donor records.

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::forms::DonorForm;
use crate::model::Donor;
use crate::store::{from_document, to_document, DocumentStore, Filter, DONORS};

/// Stores and lists donors.
#[derive(Debug)]
pub struct DonorRegistry<S> {
    store: Arc<S>,
}

impl<S: DocumentStore> DonorRegistry<S> {
    /// Create a registry over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Validate and store a donor.
    ///
    /// # Errors
    ///
    /// Returns a validation error for empty or malformed fields, or a store
    /// error.
    pub fn add_donor(&self, form: &DonorForm) -> Result<Donor> {
        let donor = form.validate()?;
        self.store.insert_one(DONORS, &to_document(DONORS, &donor)?)?;
        info!("Added donor '{}' ({})", donor.name, donor.blood_group);
        Ok(donor)
    }

    /// Every donor, in the order they were added.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails or a document is malformed.
    pub fn list_donors(&self) -> Result<Vec<Donor>> {
        self.store
            .find_many(DONORS, &Filter::all())?
            .into_iter()
            .map(|document| from_document(DONORS, document))
            .collect()
    }

    /// Number of registered donors.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn count(&self) -> Result<u64> {
        self.store.count(DONORS, &Filter::all())
    }
}
