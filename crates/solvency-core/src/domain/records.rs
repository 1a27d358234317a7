use serde::{Deserialize, Serialize};

use crate::{DataCategory, ValidationError};

/// Identity record returned by the client directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientIdentity {
    pub name: String,
    pub address: String,
}

impl ClientIdentity {
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::EmptyField { field: "name" });
        }

        Ok(Self {
            name,
            address: address.into(),
        })
    }
}

/// Monthly income and expenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Financials {
    pub monthly_income: f64,
    pub monthly_expenses: f64,
}

impl Financials {
    pub fn new(monthly_income: f64, monthly_expenses: f64) -> Result<Self, ValidationError> {
        validate_non_negative("monthly_income", monthly_income)?;
        validate_non_negative("monthly_expenses", monthly_expenses)?;

        Ok(Self {
            monthly_income,
            monthly_expenses,
        })
    }

    /// Income minus expenses; negative when expenses exceed income.
    pub fn net_income(&self) -> f64 {
        self.monthly_income - self.monthly_expenses
    }
}

/// Credit bureau history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditHistory {
    pub debt: f64,
    pub late_payments: u32,
    pub has_bankruptcy: bool,
}

impl CreditHistory {
    pub fn new(debt: f64, late_payments: u32, has_bankruptcy: bool) -> Result<Self, ValidationError> {
        validate_non_negative("debt", debt)?;

        Ok(Self {
            debt,
            late_payments,
            has_bankruptcy,
        })
    }
}

/// Opaque cached payload: one record per data category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum SubjectRecord {
    Identity(ClientIdentity),
    Financials(Financials),
    History(CreditHistory),
}

impl SubjectRecord {
    pub const fn category(&self) -> DataCategory {
        match self {
            Self::Identity(_) => DataCategory::Identity,
            Self::Financials(_) => DataCategory::Financials,
            Self::History(_) => DataCategory::History,
        }
    }
}

/// Typed view over a [`SubjectRecord`] variant.
pub trait CategoryRecord: Sized {
    const CATEGORY: DataCategory;

    fn from_record(record: SubjectRecord) -> Option<Self>;
}

impl CategoryRecord for ClientIdentity {
    const CATEGORY: DataCategory = DataCategory::Identity;

    fn from_record(record: SubjectRecord) -> Option<Self> {
        match record {
            SubjectRecord::Identity(identity) => Some(identity),
            _ => None,
        }
    }
}

impl CategoryRecord for Financials {
    const CATEGORY: DataCategory = DataCategory::Financials;

    fn from_record(record: SubjectRecord) -> Option<Self> {
        match record {
            SubjectRecord::Financials(financials) => Some(financials),
            _ => None,
        }
    }
}

impl CategoryRecord for CreditHistory {
    const CATEGORY: DataCategory = DataCategory::History;

    fn from_record(record: SubjectRecord) -> Option<Self> {
        match record {
            SubjectRecord::History(history) => Some(history),
            _ => None,
        }
    }
}

impl From<ClientIdentity> for SubjectRecord {
    fn from(value: ClientIdentity) -> Self {
        Self::Identity(value)
    }
}

impl From<Financials> for SubjectRecord {
    fn from(value: Financials) -> Self {
        Self::Financials(value)
    }
}

impl From<CreditHistory> for SubjectRecord {
    fn from(value: CreditHistory) -> Self {
        Self::History(value)
    }
}

pub(crate) fn validate_non_negative(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteValue { field });
    }

    if value < 0.0 {
        return Err(ValidationError::NegativeValue { field });
    }

    Ok(())
}
