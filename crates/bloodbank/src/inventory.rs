//! Per-blood-group stock levels.
//!
//! Every mutation is a single [`DocumentStore::update_one`] call. A collect
//! carries its sufficiency check in the filter (`amount >= units`), so the
//! check and the decrement cannot be separated by another writer and the
//! amount never goes negative.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::MissingRecordPolicy;
use crate::error::{Error, Result};
use crate::forms::ensure_positive_units;
use crate::model::{BloodGroup, InventoryRecord, TransactionKind};
use crate::store::{from_document, Document, DocumentStore, Filter, Update, INVENTORY};

/// The inventory ledger.
#[derive(Debug)]
pub struct InventoryLedger<S> {
    store: Arc<S>,
    policy: MissingRecordPolicy,
}

impl<S> Clone for InventoryLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            policy: self.policy,
        }
    }
}

fn group_filter(blood_group: BloodGroup) -> Filter {
    Filter::all().eq("blood_group", blood_group.as_str())
}

fn record_from(document: Option<Document>, blood_group: BloodGroup) -> Result<InventoryRecord> {
    match document {
        Some(document) => from_document(INVENTORY, document),
        None => Err(Error::invalid_document(
            INVENTORY,
            format!("update returned no document for {blood_group}"),
        )),
    }
}

impl<S: DocumentStore> InventoryLedger<S> {
    /// Create a ledger over `store`.
    pub fn new(store: Arc<S>, policy: MissingRecordPolicy) -> Self {
        Self { store, policy }
    }

    /// The configured policy for groups with no record.
    #[must_use]
    pub fn policy(&self) -> MissingRecordPolicy {
        self.policy
    }

    /// Add donated units, creating the record on first use.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `units` is not positive, or a store error.
    pub fn increment(&self, blood_group: BloodGroup, units: i64) -> Result<InventoryRecord> {
        let units = ensure_positive_units(units)?;
        let outcome = self.store.update_one(
            INVENTORY,
            &group_filter(blood_group),
            &Update::new().inc("amount", units),
            true,
        )?;
        let record = record_from(outcome.document, blood_group)?;
        debug!("{} inventory incremented by {} to {}", blood_group, units, record.amount);
        Ok(record)
    }

    /// Apply a manual collect or deposit transaction.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `units` is not positive,
    /// [`Error::InsufficientStock`] if a collect exceeds the stock,
    /// [`Error::UnknownBloodGroup`] if the group has no record and the policy
    /// is [`MissingRecordPolicy::Reject`], or a store error.
    pub fn transact(
        &self,
        blood_group: BloodGroup,
        kind: TransactionKind,
        units: i64,
    ) -> Result<InventoryRecord> {
        let units = ensure_positive_units(units)?;
        let record = match kind {
            TransactionKind::Deposit => self.deposit(blood_group, units)?,
            TransactionKind::Collect => self.collect(blood_group, units)?,
        };
        info!(
            "{} transaction processed for {}: {} units, {} remaining",
            kind, blood_group, units, record.amount
        );
        Ok(record)
    }

    fn deposit(&self, blood_group: BloodGroup, units: i64) -> Result<InventoryRecord> {
        let upsert = self.policy == MissingRecordPolicy::TreatAsZero;
        let outcome = self.store.update_one(
            INVENTORY,
            &group_filter(blood_group),
            &Update::new().inc("amount", units),
            upsert,
        )?;
        if !outcome.matched && !outcome.upserted {
            warn!("Deposit rejected, no inventory record for {}", blood_group);
            return Err(Error::UnknownBloodGroup { blood_group });
        }
        record_from(outcome.document, blood_group)
    }

    fn collect(&self, blood_group: BloodGroup, units: i64) -> Result<InventoryRecord> {
        let outcome = self.store.update_one(
            INVENTORY,
            &group_filter(blood_group).gte("amount", units),
            &Update::new().inc("amount", -units),
            false,
        )?;
        if outcome.matched {
            return record_from(outcome.document, blood_group);
        }

        // Nothing matched: either no record, or not enough stock.
        match self.find(blood_group)? {
            None if self.policy == MissingRecordPolicy::Reject => {
                warn!("Collect rejected, no inventory record for {}", blood_group);
                Err(Error::UnknownBloodGroup { blood_group })
            }
            current => {
                let available = current.map_or(0, |r| r.amount);
                warn!(
                    "Collect rejected, {} units of {} requested but {} available",
                    units, blood_group, available
                );
                Err(Error::InsufficientStock {
                    blood_group,
                    requested: units,
                    available,
                })
            }
        }
    }

    /// Units in stock, or 0 if the group has never been stocked.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn get_inventory(&self, blood_group: BloodGroup) -> Result<i64> {
        Ok(self.find(blood_group)?.map_or(0, |r| r.amount))
    }

    /// Stock for all eight groups in display order, zero where unstocked.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn overview(&self) -> Result<Vec<InventoryRecord>> {
        let mut amounts = BTreeMap::new();
        for document in self.store.find_many(INVENTORY, &Filter::all())? {
            let record: InventoryRecord = from_document(INVENTORY, document)?;
            amounts.entry(record.blood_group).or_insert(record.amount);
        }

        Ok(BloodGroup::ALL
            .into_iter()
            .map(|blood_group| InventoryRecord {
                blood_group,
                amount: amounts.get(&blood_group).copied().unwrap_or(0),
            })
            .collect())
    }

    fn find(&self, blood_group: BloodGroup) -> Result<Option<InventoryRecord>> {
        self.store
            .find_one(INVENTORY, &group_filter(blood_group))?
            .map(|document| from_document(INVENTORY, document))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    fn ledger() -> InventoryLedger<SqliteStore> {
        ledger_with(MissingRecordPolicy::Reject)
    }

    fn ledger_with(policy: MissingRecordPolicy) -> InventoryLedger<SqliteStore> {
        let store = SqliteStore::open_in_memory().expect("failed to create test store");
        InventoryLedger::new(Arc::new(store), policy)
    }

    #[test]
    fn test_get_inventory_unstocked_is_zero() {
        let ledger = ledger();
        assert_eq!(ledger.get_inventory(BloodGroup::OPos).unwrap(), 0);
    }

    #[test]
    fn test_increment_creates_then_accumulates() {
        let ledger = ledger();
        let record = ledger.increment(BloodGroup::OPos, 2).unwrap();
        assert_eq!(record.amount, 2);
        ledger.increment(BloodGroup::OPos, 3).unwrap();
        assert_eq!(ledger.get_inventory(BloodGroup::OPos).unwrap(), 5);
        assert_eq!(ledger.get_inventory(BloodGroup::ONeg).unwrap(), 0);
    }

    #[test]
    fn test_increment_adds_to_prior_amount() {
        let ledger = ledger();
        for (group, units) in [(BloodGroup::APos, 1), (BloodGroup::BNeg, 7), (BloodGroup::APos, 4)] {
            let before = ledger.get_inventory(group).unwrap();
            ledger.increment(group, units).unwrap();
            assert_eq!(ledger.get_inventory(group).unwrap(), before + units);
        }
    }

    #[test]
    fn test_increment_rejects_non_positive() {
        let ledger = ledger();
        assert!(ledger.increment(BloodGroup::APos, 0).unwrap_err().is_validation());
        assert!(ledger.increment(BloodGroup::APos, -1).unwrap_err().is_validation());
    }

    #[test]
    fn test_collect_within_stock() {
        let ledger = ledger();
        ledger.increment(BloodGroup::BPos, 5).unwrap();

        let record = ledger
            .transact(BloodGroup::BPos, TransactionKind::Collect, 3)
            .unwrap();
        assert_eq!(record.amount, 2);
        assert_eq!(ledger.get_inventory(BloodGroup::BPos).unwrap(), 2);
    }

    #[test]
    fn test_collect_entire_stock() {
        let ledger = ledger();
        ledger.increment(BloodGroup::BPos, 5).unwrap();
        ledger
            .transact(BloodGroup::BPos, TransactionKind::Collect, 5)
            .unwrap();
        assert_eq!(ledger.get_inventory(BloodGroup::BPos).unwrap(), 0);

        // The record now exists at zero, so this is a stock failure.
        let err = ledger
            .transact(BloodGroup::BPos, TransactionKind::Collect, 1)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientStock { available: 0, .. }));
    }

    #[test]
    fn test_collect_over_stock_leaves_amount() {
        let ledger = ledger();
        ledger.increment(BloodGroup::AbPos, 4).unwrap();

        let err = ledger
            .transact(BloodGroup::AbPos, TransactionKind::Collect, 5)
            .unwrap_err();
        match err {
            Error::InsufficientStock {
                blood_group,
                requested,
                available,
            } => {
                assert_eq!(blood_group, BloodGroup::AbPos);
                assert_eq!(requested, 5);
                assert_eq!(available, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ledger.get_inventory(BloodGroup::AbPos).unwrap(), 4);
    }

    #[test]
    fn test_deposit_accumulates() {
        let ledger = ledger();
        ledger.increment(BloodGroup::ONeg, 1).unwrap();

        ledger
            .transact(BloodGroup::ONeg, TransactionKind::Deposit, 3)
            .unwrap();
        let record = ledger
            .transact(BloodGroup::ONeg, TransactionKind::Deposit, 3)
            .unwrap();
        assert_eq!(record.amount, 7);
    }

    #[test]
    fn test_transact_rejects_non_positive_units() {
        let ledger = ledger();
        ledger.increment(BloodGroup::AbNeg, 2).unwrap();

        for units in [0, -1] {
            let err = ledger
                .transact(BloodGroup::AbNeg, TransactionKind::Collect, units)
                .unwrap_err();
            assert!(err.is_validation());
            let err = ledger
                .transact(BloodGroup::AbNeg, TransactionKind::Deposit, units)
                .unwrap_err();
            assert!(err.is_validation());
        }
        assert_eq!(ledger.get_inventory(BloodGroup::AbNeg).unwrap(), 2);
    }

    #[test]
    fn test_transact_unknown_group_rejected() {
        let ledger = ledger();
        for kind in [TransactionKind::Collect, TransactionKind::Deposit] {
            let err = ledger.transact(BloodGroup::AbNeg, kind, 1).unwrap_err();
            assert!(matches!(
                err,
                Error::UnknownBloodGroup {
                    blood_group: BloodGroup::AbNeg
                }
            ));
        }
        // Reads still report zero for the same group.
        assert_eq!(ledger.get_inventory(BloodGroup::AbNeg).unwrap(), 0);
        assert!(ledger.overview().unwrap().iter().all(|r| r.amount == 0));
    }

    #[test]
    fn test_treat_as_zero_policy() {
        let ledger = ledger_with(MissingRecordPolicy::TreatAsZero);
        let err = ledger
            .transact(BloodGroup::ANeg, TransactionKind::Collect, 1)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientStock { available: 0, .. }));

        let record = ledger
            .transact(BloodGroup::ANeg, TransactionKind::Deposit, 2)
            .unwrap();
        assert_eq!(record.amount, 2);
        assert_eq!(ledger.policy(), MissingRecordPolicy::TreatAsZero);
    }

    #[test]
    fn test_overview_lists_all_groups() {
        let ledger = ledger();
        ledger.increment(BloodGroup::OPos, 3).unwrap();
        ledger.increment(BloodGroup::ANeg, 1).unwrap();

        let overview = ledger.overview().unwrap();
        assert_eq!(overview.len(), 8);
        assert_eq!(overview[0].blood_group, BloodGroup::APos);
        assert_eq!(overview[0].amount, 0);
        assert_eq!(overview[1].amount, 1);
        assert_eq!(overview[6].blood_group, BloodGroup::OPos);
        assert_eq!(overview[6].amount, 3);
    }

    #[test]
    fn test_one_record_per_group() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let ledger = InventoryLedger::new(Arc::clone(&store), MissingRecordPolicy::Reject);
        for _ in 0..3 {
            ledger.increment(BloodGroup::BNeg, 1).unwrap();
        }
        ledger
            .transact(BloodGroup::BNeg, TransactionKind::Deposit, 1)
            .unwrap();
        assert_eq!(store.count(INVENTORY, &Filter::all()).unwrap(), 1);
    }

    #[test]
    fn test_clone_shares_store() {
        let ledger = ledger();
        let other = ledger.clone();
        other.increment(BloodGroup::APos, 2).unwrap();
        assert_eq!(ledger.get_inventory(BloodGroup::APos).unwrap(), 2);
    }
}
