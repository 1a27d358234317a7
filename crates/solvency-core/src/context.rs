use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation identifier (UUID v4) shared by every log line and metric of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Per-request correlation state. Created at request entry and dropped on completion.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationContext {
    id: CorrelationId,
    started_at: Instant,
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CorrelationContext {
    pub fn new() -> Self {
        Self {
            id: CorrelationId::new_v4(),
            started_at: Instant::now(),
        }
    }

    pub const fn id(&self) -> CorrelationId {
        self.id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
