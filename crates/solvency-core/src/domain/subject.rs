use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const SUBJECT_PREFIX: &str = "client-";
const SUBJECT_DIGITS: usize = 3;

/// Validated loan applicant identifier (`client-` followed by exactly 3 digits).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Parse a subject identifier. The input is matched verbatim; no trimming or case folding.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        if input.is_empty() {
            return Err(ValidationError::EmptySubjectId);
        }

        let valid = input.strip_prefix(SUBJECT_PREFIX).is_some_and(|suffix| {
            suffix.len() == SUBJECT_DIGITS && suffix.bytes().all(|byte| byte.is_ascii_digit())
        });
        if !valid {
            return Err(ValidationError::InvalidSubjectId {
                value: input.to_owned(),
            });
        }

        Ok(Self(input.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SubjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for SubjectId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for SubjectId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<SubjectId> for String {
    fn from(value: SubjectId) -> Self {
        value.0
    }
}

/// Independent data categories fetched for every subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    Identity,
    Financials,
    History,
}

impl DataCategory {
    pub const ALL: [Self; 3] = [Self::Identity, Self::Financials, Self::History];

    /// Tag used in cache keys and URLs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Financials => "financials",
            Self::History => "history",
        }
    }

    /// Collaborator operation name, used for logs and metrics.
    pub const fn operation(self) -> &'static str {
        match self {
            Self::Identity => "GetClientIdentity",
            Self::Financials => "GetClientFinancials",
            Self::History => "GetClientCreditHistory",
        }
    }
}

impl Display for DataCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key unique per (category, subject).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub category: DataCategory,
    pub subject: SubjectId,
}

impl CacheKey {
    pub fn new(category: DataCategory, subject: SubjectId) -> Self {
        Self { category, subject }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.category, self.subject)
    }
}
