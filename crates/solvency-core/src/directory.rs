//! Subject directory contract and upstream fault types.
//!
//! A [`SubjectDirectory`] is the data collaborator behind the gateway: it answers the
//! three read-only lookups (identity, financials, credit history) for a validated subject.
//! Failures are reported as an [`UpstreamFault`], a closed set of shapes that the
//! [`FaultTranslator`](crate::FaultTranslator) normalizes into the client-facing taxonomy.
//!
//! # Example Implementation
//!
//! ```rust,ignore
//! use solvency_core::{LookupRequest, SubjectDirectory, SubjectRecord, UpstreamFault};
//!
//! struct StaticDirectory;
//!
//! impl SubjectDirectory for StaticDirectory {
//!     fn name(&self) -> &'static str {
//!         "static"
//!     }
//!
//!     fn lookup<'a>(&'a self, req: LookupRequest) -> LookupFuture<'a> {
//!         Box::pin(async move {
//!             Err(UpstreamFault::not_found(req.category.operation(), req.subject.as_str()))
//!         })
//!     }
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

use crate::{CorrelationId, DataCategory, SubjectId, SubjectRecord};

/// Fault code raised by directories for unknown subjects.
pub const NOT_FOUND_CODE: &str = "Client.NotFound";
/// Fault code raised by directories for malformed lookups.
pub const VALIDATION_CODE: &str = "Client.ValidationError";

/// One lookup against a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub category: DataCategory,
    pub subject: SubjectId,
    pub correlation_id: CorrelationId,
}

impl LookupRequest {
    pub fn new(category: DataCategory, subject: SubjectId, correlation_id: CorrelationId) -> Self {
        Self {
            category,
            subject,
            correlation_id,
        }
    }

    pub const fn operation(&self) -> &'static str {
        self.category.operation()
    }
}

/// Boxed lookup future returned by [`SubjectDirectory::lookup`].
pub type LookupFuture<'a> =
    Pin<Box<dyn Future<Output = Result<SubjectRecord, UpstreamFault>> + Send + 'a>>;

/// Data collaborator contract.
///
/// Implementations must be `Send + Sync`; one directory is shared by every request.
/// Lookups are read-only and therefore safe to retry.
pub trait SubjectDirectory: Send + Sync {
    /// Short collaborator name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch the record of `req.category` for `req.subject`.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamFault`] if the subject is unknown, the request is rejected,
    /// the transport fails, or the response cannot be decoded.
    fn lookup<'a>(&'a self, req: LookupRequest) -> LookupFuture<'a>;
}

/// Shape classification of an [`UpstreamFault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFaultKind {
    Remote,
    Status,
    Transport,
    Timeout,
    Decode,
}

impl UpstreamFaultKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Status => "status",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::Decode => "decode",
        }
    }
}

impl Display for UpstreamFaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw collaborator failure, before translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamFault {
    /// The collaborator answered with a fault response.
    #[error("{operation} for '{subject}' failed with {code}: {message}")]
    Remote {
        operation: &'static str,
        subject: String,
        code: String,
        message: String,
    },
    /// The collaborator rejected the lookup without a structured fault body.
    #[error("{operation} for '{subject}' failed with HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        subject: String,
        status: u16,
        body: String,
    },
    /// The round trip itself failed.
    #[error("{operation} transport error: {message}")]
    Transport {
        operation: &'static str,
        message: String,
        retryable: bool,
    },
    /// The attempt exceeded its deadline.
    #[error("{operation} timed out after {}ms", .after.as_millis())]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    /// The collaborator answered but the payload was unusable.
    #[error("{operation} returned an undecodable payload: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl UpstreamFault {
    pub fn remote(
        operation: &'static str,
        subject: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Remote {
            operation,
            subject: subject.into(),
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn status(
        operation: &'static str,
        subject: impl Into<String>,
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self::Status {
            operation,
            subject: subject.into(),
            status,
            body: body.into(),
        }
    }

    pub fn not_found(operation: &'static str, subject: impl Into<String>) -> Self {
        let subject = subject.into();
        let message = format!("Client with ID '{subject}' not found in directory.");
        Self::remote(operation, subject, NOT_FOUND_CODE, message)
    }

    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn transport_fatal(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn timeout(operation: &'static str, after: Duration) -> Self {
        Self::Timeout { operation, after }
    }

    pub fn decode(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Decode {
            operation,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> UpstreamFaultKind {
        match self {
            Self::Remote { .. } => UpstreamFaultKind::Remote,
            Self::Status { .. } => UpstreamFaultKind::Status,
            Self::Transport { .. } => UpstreamFaultKind::Transport,
            Self::Timeout { .. } => UpstreamFaultKind::Timeout,
            Self::Decode { .. } => UpstreamFaultKind::Decode,
        }
    }

    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Remote { operation, .. }
            | Self::Status { operation, .. }
            | Self::Transport { operation, .. }
            | Self::Timeout { operation, .. }
            | Self::Decode { operation, .. } => operation,
        }
    }

    /// Remote fault code, when the collaborator supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Remote or local human-readable message. For an unstructured rejection this is the
    /// raw body excerpt, which is not client-safe.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Remote { message, .. }
            | Self::Transport { message, .. }
            | Self::Decode { message, .. } => Some(message.as_str()),
            Self::Status { body, .. } => Some(body.as_str()),
            Self::Timeout { .. } => None,
        }
    }

    /// Only transport failures and timeouts are worth another attempt.
    pub const fn retryable(&self) -> bool {
        match self {
            Self::Transport { retryable, .. } => *retryable,
            Self::Timeout { .. } => true,
            Self::Remote { .. } | Self::Status { .. } | Self::Decode { .. } => false,
        }
    }
}
