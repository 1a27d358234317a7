use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use crate::directory::{LookupFuture, LookupRequest, SubjectDirectory, UpstreamFault};
use crate::{ClientIdentity, CreditHistory, DataCategory, Financials, SubjectId, SubjectRecord};

/// Everything the directory knows about one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectoryEntry {
    pub identity: ClientIdentity,
    pub financials: Financials,
    pub history: CreditHistory,
}

impl DirectoryEntry {
    pub fn record(&self, category: DataCategory) -> SubjectRecord {
        match category {
            DataCategory::Identity => SubjectRecord::Identity(self.identity.clone()),
            DataCategory::Financials => SubjectRecord::Financials(self.financials.clone()),
            DataCategory::History => SubjectRecord::History(self.history.clone()),
        }
    }
}

/// Deterministic in-process directory.
///
/// Unknown subjects answer with a `Client.NotFound` remote fault, as a real directory would.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    entries: RwLock<BTreeMap<SubjectId, DirectoryEntry>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory seeded with the three reference applicants.
    pub fn with_fixtures() -> Self {
        let directory = Self::new();
        for (id, entry) in fixture_entries() {
            directory.insert(id, entry);
        }
        directory
    }

    /// Insert or replace a subject. Returns the previous entry, if any.
    pub fn insert(&self, subject: SubjectId, entry: DirectoryEntry) -> Option<DirectoryEntry> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject, entry)
    }

    pub fn remove(&self, subject: &SubjectId) -> Option<DirectoryEntry> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subject)
    }

    pub fn get(&self, subject: &SubjectId) -> Option<DirectoryEntry> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject)
            .cloned()
    }

    /// Known subjects in id order.
    pub fn subjects(&self) -> Vec<(SubjectId, DirectoryEntry)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }
}

impl SubjectDirectory for InMemoryDirectory {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    fn lookup<'a>(&'a self, req: LookupRequest) -> LookupFuture<'a> {
        Box::pin(async move {
            self.get(&req.subject)
                .map(|entry| entry.record(req.category))
                .ok_or_else(|| UpstreamFault::not_found(req.operation(), req.subject.as_str()))
        })
    }
}

fn fixture_entries() -> Vec<(SubjectId, DirectoryEntry)> {
    let rows: [(&str, &str, &str, f64, f64, f64, u32, bool); 3] = [
        ("client-001", "John Doe", "123 Main St", 4000.0, 3000.0, 5000.0, 2, false),
        ("client-002", "Alice Smith", "456 Elm St", 3000.0, 2500.0, 0.0, 0, false),
        ("client-003", "Bob Johnson", "789 Oak St", 6000.0, 5500.0, 10000.0, 5, true),
    ];

    rows.into_iter()
        .filter_map(
            |(id, name, address, income, expenses, debt, late_payments, has_bankruptcy)| {
                let subject = SubjectId::parse(id).ok()?;
                let entry = DirectoryEntry {
                    identity: ClientIdentity {
                        name: name.to_owned(),
                        address: address.to_owned(),
                    },
                    financials: Financials {
                        monthly_income: income,
                        monthly_expenses: expenses,
                    },
                    history: CreditHistory {
                        debt,
                        late_payments,
                        has_bankruptcy,
                    },
                };
                Some((subject, entry))
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::NOT_FOUND_CODE;
    use crate::CorrelationId;

    fn request(category: DataCategory, id: &str) -> LookupRequest {
        LookupRequest::new(
            category,
            SubjectId::parse(id).expect("valid id"),
            CorrelationId::new_v4(),
        )
    }

    #[tokio::test]
    async fn fixtures_answer_every_category() {
        let directory = InMemoryDirectory::with_fixtures();

        for category in DataCategory::ALL {
            let record = directory
                .lookup(request(category, "client-001"))
                .await
                .expect("fixture should resolve");
            assert_eq!(record.category(), category);
        }
        assert_eq!(directory.subjects().len(), 3);
    }

    #[tokio::test]
    async fn unknown_subject_is_remote_not_found() {
        let directory = InMemoryDirectory::with_fixtures();

        let fault = directory
            .lookup(request(DataCategory::Financials, "client-999"))
            .await
            .expect_err("unknown subject");

        assert_eq!(fault.code(), Some(NOT_FOUND_CODE));
        assert_eq!(fault.operation(), "GetClientFinancials");
    }

    #[tokio::test]
    async fn insert_replaces_existing_entry() {
        let directory = InMemoryDirectory::with_fixtures();
        let subject = SubjectId::parse("client-002").expect("valid id");
        let mut entry = directory.get(&subject).expect("fixture present");
        entry.history.late_payments = 3;

        let previous = directory.insert(subject.clone(), entry);
        assert_eq!(previous.map(|e| e.history.late_payments), Some(0));

        let record = directory
            .lookup(request(DataCategory::History, "client-002"))
            .await
            .expect("present");
        assert!(matches!(record, SubjectRecord::History(h) if h.late_payments == 3));
    }
}
