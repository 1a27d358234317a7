//! Scoring, decision and explanation rules.
//!
//! The gateway only talks to the [`SolvencyRules`] trait; [`StandardRules`] is the
//! production rule set.

use crate::domain::{validate_non_negative, CashFlowBand, ScoreBand};
use crate::{CreditHistory, CreditScore, Explanations, Financials, SolvencyStatus, ValidationError};

/// Minimum score for a solvent decision.
pub const SOLVENT_SCORE_THRESHOLD: u16 = 700;

const BASE_SCORE: f64 = 1000.0;
const DEBT_DIVISOR: f64 = 10.0;
const LATE_PAYMENT_PENALTY: f64 = 50.0;
const BANKRUPTCY_PENALTY: f64 = 200.0;

/// Pure computation stages run after all lookups succeed.
pub trait SolvencyRules: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the history holds non-finite or negative values.
    fn score(&self, history: &CreditHistory) -> Result<CreditScore, ValidationError>;

    fn decide(
        &self,
        financials: &Financials,
        score: CreditScore,
    ) -> Result<SolvencyStatus, ValidationError>;

    fn explain(
        &self,
        score: CreditScore,
        financials: &Financials,
        history: &CreditHistory,
    ) -> Result<Explanations, ValidationError>;
}

/// `1000 - debt/10 - 50 per late payment - 200 on bankruptcy`, truncated then clamped.
/// Solvent when the score reaches 700 and income exceeds expenses.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardRules;

impl StandardRules {
    pub const fn new() -> Self {
        Self
    }
}

impl SolvencyRules for StandardRules {
    fn score(&self, history: &CreditHistory) -> Result<CreditScore, ValidationError> {
        validate_non_negative("debt", history.debt)?;

        let mut raw = BASE_SCORE
            - history.debt / DEBT_DIVISOR
            - LATE_PAYMENT_PENALTY * f64::from(history.late_payments);
        if history.has_bankruptcy {
            raw -= BANKRUPTCY_PENALTY;
        }

        // `as` truncates toward zero and saturates, so huge debts still clamp to 0.
        Ok(CreditScore::clamped(raw.trunc() as i64))
    }

    fn decide(
        &self,
        financials: &Financials,
        score: CreditScore,
    ) -> Result<SolvencyStatus, ValidationError> {
        validate_non_negative("monthly_income", financials.monthly_income)?;
        validate_non_negative("monthly_expenses", financials.monthly_expenses)?;

        let solvent = score.value() >= SOLVENT_SCORE_THRESHOLD
            && financials.monthly_income > financials.monthly_expenses;
        Ok(SolvencyStatus::from_decision(solvent))
    }

    fn explain(
        &self,
        score: CreditScore,
        financials: &Financials,
        history: &CreditHistory,
    ) -> Result<Explanations, ValidationError> {
        validate_non_negative("monthly_income", financials.monthly_income)?;
        validate_non_negative("monthly_expenses", financials.monthly_expenses)?;
        validate_non_negative("debt", history.debt)?;

        Explanations::new(
            explain_score(score),
            explain_cash_flow(financials.net_income()),
            explain_history(history),
        )
    }
}

fn explain_score(score: CreditScore) -> String {
    match score.band() {
        ScoreBand::Excellent => format!("Excellent credit score of {score}. Strong creditworthiness."),
        ScoreBand::Good => format!("Good credit score of {score}. Acceptable credit risk."),
        ScoreBand::Fair => format!("Fair credit score of {score}. Moderate credit risk."),
        ScoreBand::Poor => format!("Poor credit score of {score}. High credit risk."),
    }
}

fn explain_cash_flow(net_income: f64) -> String {
    match CashFlowBand::classify(net_income) {
        CashFlowBand::Strong => {
            format!("Strong financial position with ${net_income:.2} monthly surplus.")
        }
        CashFlowBand::Tight => format!("Tight budget with only ${net_income:.2} monthly surplus."),
        CashFlowBand::BreakEven => "Break-even situation. Income exactly matches expenses.".to_owned(),
        CashFlowBand::Deficit => format!(
            "Negative cash flow of ${:.2} per month. Expenses exceed income.",
            net_income.abs()
        ),
    }
}

fn explain_history(history: &CreditHistory) -> String {
    let debt = if history.debt > 0.0 {
        format!("${:.2} in outstanding debt", history.debt)
    } else {
        "no outstanding debt".to_owned()
    };
    let late = match history.late_payments {
        0 => "no late payments".to_owned(),
        count => format!("{count} late payment(s)"),
    };
    let bankruptcy = if history.has_bankruptcy {
        "bankruptcy on record"
    } else {
        "no bankruptcy history"
    };

    format!("Credit history shows {debt}, {late}, {bankruptcy}.")
}
