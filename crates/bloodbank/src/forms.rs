//! Raw form input and its validation.
//!
//! The presentation layer hands over field values as strings. Each form
//! checks for empty fields first, naming the field in the error, then parses
//! the remaining values into typed records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{BloodGroup, Donor, Gender, TransactionKind};

/// Date format used for dates of birth and donation dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Signup fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupForm {
    /// Requested account name.
    pub name: String,
    /// Chosen password.
    pub password: String,
    /// Date of birth as `YYYY-MM-DD`.
    pub dob: String,
}

/// Login fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    /// Account name.
    pub name: String,
    /// Password.
    pub password: String,
}

/// Donor registration fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonorForm {
    /// Donor name.
    pub name: String,
    /// Age in years.
    pub age: String,
    /// Gender label.
    pub gender: String,
    /// Blood group label.
    pub blood_group: String,
}

/// Donation recording fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationForm {
    /// Donor name.
    pub name: String,
    /// Age in years.
    pub age: String,
    /// Gender label.
    pub gender: String,
    /// Blood group label.
    pub blood_group: String,
    /// Units donated.
    pub units: String,
}

/// Inventory transaction fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionForm {
    /// `collect` or `deposit`.
    pub kind: String,
    /// Blood group label.
    pub blood_group: String,
    /// Customer or hospital on the other side of the transaction.
    pub counterparty: String,
    /// Units moved.
    pub units: String,
}

/// A validated signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    /// Account name, trimmed.
    pub name: String,
    /// Password, as entered.
    pub password: String,
    /// Date of birth.
    pub dob: NaiveDate,
}

/// A validated donation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDonation {
    /// Who donated.
    pub donor: Donor,
    /// Units donated, positive.
    pub units: i64,
}

/// A validated inventory transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Direction.
    pub kind: TransactionKind,
    /// Blood group.
    pub blood_group: BloodGroup,
    /// Customer or hospital name.
    pub counterparty: String,
    /// Units moved, positive.
    pub units: i64,
}

impl SignupForm {
    /// Validate into a new account.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a field is empty or the date is malformed.
    pub fn validate(&self) -> Result<NewAccount> {
        let name = required("Name", &self.name)?;
        if self.password.is_empty() {
            return Err(Error::required("Password"));
        }
        let dob = parse_date("Date of birth", required("Date of birth", &self.dob)?)?;
        Ok(NewAccount {
            name: name.to_string(),
            password: self.password.clone(),
            dob,
        })
    }
}

impl LoginForm {
    /// Check that both fields are present.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a field is empty.
    pub fn validate(&self) -> Result<(&str, &str)> {
        let name = required("Name", &self.name)?;
        if self.password.is_empty() {
            return Err(Error::required("Password"));
        }
        Ok((name, self.password.as_str()))
    }
}

impl DonorForm {
    /// Validate into a donor record.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a field is empty, the age is not a
    /// non-negative integer, or gender / blood group are unrecognised.
    pub fn validate(&self) -> Result<Donor> {
        let name = required("Name", &self.name)?;
        let age = required("Age", &self.age)?;
        let gender = required("Gender", &self.gender)?;
        let blood_group = required("Blood group", &self.blood_group)?;

        Ok(Donor {
            name: name.to_string(),
            age: parse_count("Age", age)?,
            gender: gender.parse()?,
            blood_group: blood_group.parse()?,
        })
    }
}

impl DonationForm {
    /// Validate into a donation.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a field is empty, or age / units are not
    /// positive integers.
    pub fn validate(&self) -> Result<NewDonation> {
        let name = required("Name", &self.name)?;
        let age = required("Age", &self.age)?;
        let gender = required("Gender", &self.gender)?;
        let blood_group = required("Blood group", &self.blood_group)?;
        let units = required("Units", &self.units)?;

        let age = parse_count("Age", age)?;
        if age == 0 {
            return Err(Error::validation("Age must be a positive whole number"));
        }

        Ok(NewDonation {
            donor: Donor {
                name: name.to_string(),
                age,
                gender: gender.parse()?,
                blood_group: blood_group.parse()?,
            },
            units: parse_units(units)?,
        })
    }
}

impl TransactionForm {
    /// Validate into a transaction request.
    ///
    /// # Errors
    ///
    /// Returns a validation error if a field is empty, the type or blood group
    /// is unrecognised, or units are not a positive integer.
    pub fn validate(&self) -> Result<TransactionRequest> {
        let kind = required("Transaction type", &self.kind)?;
        let blood_group = required("Blood group", &self.blood_group)?;
        let counterparty = required("Name", &self.counterparty)?;
        let units = required("Units", &self.units)?;

        Ok(TransactionRequest {
            kind: kind.parse()?,
            blood_group: blood_group.parse()?,
            counterparty: counterparty.to_string(),
            units: parse_units(units)?,
        })
    }
}

/// Check that a unit count is positive.
///
/// # Errors
///
/// Returns a validation error for zero or negative values.
pub fn ensure_positive_units(units: i64) -> Result<i64> {
    if units > 0 {
        Ok(units)
    } else {
        Err(Error::validation(format!(
            "Units must be a positive whole number, got {units}"
        )))
    }
}

fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(Error::required(field))
    } else {
        Ok(trimmed)
    }
}

fn parse_count(field: &str, value: &str) -> Result<u32> {
    value.parse().map_err(|_| {
        Error::validation(format!(
            "{field} must be a non-negative whole number, got '{value}'"
        ))
    })
}

fn parse_units(value: &str) -> Result<i64> {
    let units = value.parse::<i64>().map_err(|_| {
        Error::validation(format!("Invalid units entry: '{value}' is not a valid number"))
    })?;
    ensure_positive_units(units)
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
        Error::validation(format!("{field} must be a date in YYYY-MM-DD form, got '{value}'"))
    })
}
