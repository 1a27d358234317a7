use serde::Serialize;

use solvency_core::{ClientIdentity, CreditHistory, Financials, InMemoryDirectory, SubjectId};

use crate::error::CliError;

use super::CommandResult;

#[derive(Debug, Serialize)]
struct FixtureSubject {
    subject_id: SubjectId,
    identity: ClientIdentity,
    financials: Financials,
    credit_history: CreditHistory,
}

#[derive(Debug, Serialize)]
struct FixturesResponseData {
    subjects: Vec<FixtureSubject>,
}

pub fn run() -> Result<CommandResult, CliError> {
    let subjects = InMemoryDirectory::with_fixtures()
        .subjects()
        .into_iter()
        .map(|(subject_id, entry)| FixtureSubject {
            subject_id,
            identity: entry.identity,
            financials: entry.financials,
            credit_history: entry.history,
        })
        .collect();

    let data = serde_json::to_value(FixturesResponseData { subjects })?;
    Ok(CommandResult::ok(data))
}
