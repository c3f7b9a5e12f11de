//! Core record types for bloodbank.
//!
//! These are the shapes written to and read from the document store. Field
//! names match the stored documents.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One of the eight ABO/Rh blood groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BloodGroup {
    /// A positive.
    #[serde(rename = "A+")]
    APos,
    /// A negative.
    #[serde(rename = "A-")]
    ANeg,
    /// B positive.
    #[serde(rename = "B+")]
    BPos,
    /// B negative.
    #[serde(rename = "B-")]
    BNeg,
    /// AB positive.
    #[serde(rename = "AB+")]
    AbPos,
    /// AB negative.
    #[serde(rename = "AB-")]
    AbNeg,
    /// O positive.
    #[serde(rename = "O+")]
    OPos,
    /// O negative.
    #[serde(rename = "O-")]
    ONeg,
}

impl BloodGroup {
    /// All blood groups in display order.
    pub const ALL: [Self; 8] = [
        Self::APos,
        Self::ANeg,
        Self::BPos,
        Self::BNeg,
        Self::AbPos,
        Self::AbNeg,
        Self::OPos,
        Self::ONeg,
    ];

    /// The stored label, e.g. `AB-`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::APos => "A+",
            Self::ANeg => "A-",
            Self::BPos => "B+",
            Self::BNeg => "B-",
            Self::AbPos => "AB+",
            Self::AbNeg => "AB-",
            Self::OPos => "O+",
            Self::ONeg => "O-",
        }
    }
}

impl fmt::Display for BloodGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BloodGroup {
    type Err = Error;

    /// Parses a label such as `O+`, `ab-` or `A−` (Unicode minus).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('\u{2212}', "-").to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|group| group.as_str() == normalized)
            .ok_or_else(|| Error::validation(format!("unknown blood group: '{}'", s.trim())))
    }
}

/// Donor gender as recorded on the donor form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    /// Male.
    Male,
    /// Female.
    Female,
    /// The donor chose not to say.
    PreferNotToSay,
}

impl Gender {
    /// Human-readable label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::PreferNotToSay => "Prefer not to say",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Male => write!(f, "male"),
            Self::Female => write!(f, "female"),
            Self::PreferNotToSay => write!(f, "prefer_not_to_say"),
        }
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "male" => Ok(Self::Male),
            "female" => Ok(Self::Female),
            "prefer_not_to_say" => Ok(Self::PreferNotToSay),
            _ => Err(Error::validation(format!("unknown gender: '{}'", s.trim()))),
        }
    }
}

/// Direction of a manual inventory transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Withdraw units, subject to a sufficiency check.
    Collect,
    /// Add units outside the donation path.
    Deposit,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Collect => write!(f, "collect"),
            Self::Deposit => write!(f, "deposit"),
        }
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "collect" | "borrow" => Ok(Self::Collect),
            "deposit" => Ok(Self::Deposit),
            other => Err(Error::validation(format!(
                "unknown transaction type: '{other}'"
            ))),
        }
    }
}

/// A registered application user.
///
/// The stored credential never leaves the account store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique account name.
    pub name: String,
    /// Date of birth.
    pub dob: NaiveDate,
}

/// A registered blood donor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donor {
    /// Donor name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Gender.
    pub gender: Gender,
    /// Blood group.
    pub blood_group: BloodGroup,
}

/// A single recorded donation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationEvent {
    /// Donor name.
    pub name: String,
    /// Donor age in years.
    pub age: u32,
    /// Donor gender.
    pub gender: Gender,
    /// Blood group donated.
    pub blood_group: BloodGroup,
    /// Units donated.
    pub units: i64,
    /// Day the donation was recorded.
    pub date: NaiveDate,
}

/// Stock level for one blood group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    /// Blood group.
    pub blood_group: BloodGroup,
    /// Units in stock, never negative.
    pub amount: i64,
}
