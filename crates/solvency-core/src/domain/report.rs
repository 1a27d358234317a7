use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{ClientIdentity, CreditHistory, Financials, SubjectId, ValidationError};

/// Upper bound of the credit score scale.
pub const MAX_CREDIT_SCORE: u16 = 1000;

/// Credit score in `0..=1000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u16")]
pub struct CreditScore(u16);

impl CreditScore {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if !(0..=i64::from(MAX_CREDIT_SCORE)).contains(&value) {
            return Err(ValidationError::ScoreOutOfRange { value });
        }
        Ok(Self(value as u16))
    }

    /// Clamp a raw (possibly negative) score onto the valid scale.
    pub fn clamped(raw: i64) -> Self {
        Self(raw.clamp(0, i64::from(MAX_CREDIT_SCORE)) as u16)
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    pub const fn band(self) -> ScoreBand {
        ScoreBand::classify(self)
    }
}

impl Display for CreditScore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for CreditScore {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CreditScore> for u16 {
    fn from(value: CreditScore) -> Self {
        value.0
    }
}

/// Qualitative score band used by explanations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl ScoreBand {
    pub const fn classify(score: CreditScore) -> Self {
        match score.value() {
            800.. => Self::Excellent,
            700..=799 => Self::Good,
            500..=699 => Self::Fair,
            _ => Self::Poor,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
        }
    }
}

/// Monthly surplus/deficit band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashFlowBand {
    Strong,
    Tight,
    BreakEven,
    Deficit,
}

impl CashFlowBand {
    pub fn classify(net_income: f64) -> Self {
        if net_income > 1000.0 {
            Self::Strong
        } else if net_income > 0.0 {
            Self::Tight
        } else if net_income == 0.0 {
            Self::BreakEven
        } else {
            Self::Deficit
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Tight => "tight",
            Self::BreakEven => "break-even",
            Self::Deficit => "deficit",
        }
    }
}

/// Solvency decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolvencyStatus {
    Solvent,
    NotSolvent,
}

impl SolvencyStatus {
    pub const fn from_decision(solvent: bool) -> Self {
        if solvent {
            Self::Solvent
        } else {
            Self::NotSolvent
        }
    }

    pub const fn is_solvent(self) -> bool {
        matches!(self, Self::Solvent)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Solvent => "solvent",
            Self::NotSolvent => "not_solvent",
        }
    }
}

impl Display for SolvencyStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three natural-language explanations attached to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanations {
    pub credit_score: String,
    pub income_vs_expenses: String,
    pub credit_history: String,
}

impl Explanations {
    pub fn new(
        credit_score: impl Into<String>,
        income_vs_expenses: impl Into<String>,
        credit_history: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let explanations = Self {
            credit_score: credit_score.into(),
            income_vs_expenses: income_vs_expenses.into(),
            credit_history: credit_history.into(),
        };

        for line in explanations.lines() {
            if line.trim().is_empty() {
                return Err(ValidationError::EmptyField {
                    field: "explanation",
                });
            }
        }

        Ok(explanations)
    }

    /// Explanations in report order: score, cash flow, history.
    pub fn lines(&self) -> [&str; 3] {
        [
            self.credit_score.as_str(),
            self.income_vs_expenses.as_str(),
            self.credit_history.as_str(),
        ]
    }
}

/// Final per-subject solvency report.
///
/// Holds no per-request data, so identical inputs serialize to identical bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolvencyReport {
    pub subject_id: SubjectId,
    pub client_identity: ClientIdentity,
    pub financials: Financials,
    pub credit_history: CreditHistory,
    pub credit_score: CreditScore,
    pub solvency_status: SolvencyStatus,
    pub explanations: Explanations,
}
