//! Client-facing fault taxonomy and the translator that produces it.
//!
//! Clients only ever see two kinds: `Client.NotFound` and `Client.ValidationError`.
//! Every raw [`UpstreamFault`] is normalized here exactly once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::directory::{UpstreamFault, NOT_FOUND_CODE, VALIDATION_CODE};
use crate::{CorrelationId, ValidationError};

/// Reason reported for collaborator failures that carry no client-safe classification.
pub const UPSTREAM_UNAVAILABLE_REASON: &str =
    "Unable to verify solvency: an upstream service failed to respond correctly.";

const NOT_FOUND_MARKERS: [&str; 3] = ["notfound", "not_found", "not found"];
const VALIDATION_MARKERS: [&str; 2] = ["validation", "invalid"];

/// The two client-visible fault kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultKind {
    NotFound { subject: String },
    ValidationError { reason: String },
}

impl FaultKind {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => NOT_FOUND_CODE,
            Self::ValidationError { .. } => VALIDATION_CODE,
        }
    }
}

/// Translated fault returned to callers of the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{}: {}", .kind.code(), self.message())]
pub struct Fault {
    pub kind: FaultKind,
    pub correlation_id: CorrelationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Fault {
    pub fn not_found(subject: impl Into<String>, correlation_id: CorrelationId) -> Self {
        Self {
            kind: FaultKind::NotFound {
                subject: subject.into(),
            },
            correlation_id,
            detail: None,
        }
    }

    pub fn validation(reason: impl Into<String>, correlation_id: CorrelationId) -> Self {
        Self {
            kind: FaultKind::ValidationError {
                reason: reason.into(),
            },
            correlation_id,
            detail: None,
        }
    }

    /// Translate a locally detected input error.
    pub fn from_validation(error: &ValidationError, correlation_id: CorrelationId) -> Self {
        Self::validation(error.to_string(), correlation_id)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Stable fault code (`Client.NotFound` or `Client.ValidationError`).
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn message(&self) -> String {
        match &self.kind {
            FaultKind::NotFound { subject } => format!("client '{subject}' not found"),
            FaultKind::ValidationError { reason } => reason.clone(),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self.kind, FaultKind::NotFound { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    NotFound,
    Validation,
}

fn classify(text: &str) -> Option<Family> {
    let lowered = text.to_ascii_lowercase();
    if NOT_FOUND_MARKERS.iter().any(|marker| lowered.contains(marker)) || lowered.contains("404") {
        Some(Family::NotFound)
    } else if VALIDATION_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        Some(Family::Validation)
    } else {
        None
    }
}

/// Maps raw collaborator faults onto [`FaultKind`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FaultTranslator;

impl FaultTranslator {
    pub const fn new() -> Self {
        Self
    }

    /// Client-visible kind for `fault`, without logging.
    pub fn kind_of(&self, fault: &UpstreamFault) -> FaultKind {
        self.classify_remote(fault)
            .unwrap_or_else(|| FaultKind::ValidationError {
                reason: UPSTREAM_UNAVAILABLE_REASON.to_owned(),
            })
    }

    /// Normalize `fault`.
    ///
    /// Structured remote faults are classified by code, then by message. Rejections without
    /// a structured body are classified by HTTP status alone, so their raw body never
    /// reaches the client. Everything unclassifiable becomes a validation fault with a
    /// generic reason; the raw detail is only logged.
    pub fn translate(&self, fault: &UpstreamFault, correlation_id: CorrelationId) -> Fault {
        match self.classify_remote(fault) {
            Some(kind @ FaultKind::NotFound { .. }) => Fault {
                kind,
                correlation_id,
                detail: remote_message(fault),
            },
            Some(kind) => Fault {
                kind,
                correlation_id,
                detail: None,
            },
            None => {
                tracing::warn!(
                    %correlation_id,
                    operation = fault.operation(),
                    fault_kind = %fault.kind(),
                    raw = %fault,
                    "unclassified upstream fault"
                );
                Fault::validation(UPSTREAM_UNAVAILABLE_REASON, correlation_id)
            }
        }
    }

    fn classify_remote(&self, fault: &UpstreamFault) -> Option<FaultKind> {
        match fault {
            UpstreamFault::Remote {
                subject,
                code,
                message,
                ..
            } => match classify(code).or_else(|| classify(message))? {
                Family::NotFound => Some(FaultKind::NotFound {
                    subject: subject.clone(),
                }),
                Family::Validation => Some(FaultKind::ValidationError {
                    reason: message.clone(),
                }),
            },
            UpstreamFault::Status {
                subject,
                status: 404,
                ..
            } => Some(FaultKind::NotFound {
                subject: subject.clone(),
            }),
            _ => None,
        }
    }
}

fn remote_message(fault: &UpstreamFault) -> Option<String> {
    match fault {
        UpstreamFault::Remote { message, .. } => Some(message.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn translate(fault: UpstreamFault) -> Fault {
        FaultTranslator::new().translate(&fault, CorrelationId::new_v4())
    }

    #[test]
    fn not_found_codes_map_to_not_found() {
        for code in ["Client.NotFound", "CLIENT_NOT_FOUND", "HTTP 404"] {
            let fault = translate(UpstreamFault::remote(
                "GetClientIdentity",
                "client-404",
                code,
                "missing",
            ));
            assert_eq!(
                fault.kind,
                FaultKind::NotFound {
                    subject: "client-404".to_string()
                },
                "code {code}"
            );
            assert_eq!(fault.code(), "Client.NotFound");
        }
    }

    #[test]
    fn message_is_consulted_when_code_is_unclassified() {
        let fault = translate(UpstreamFault::remote(
            "GetClientFinancials",
            "client-123",
            "Server",
            "Record Not Found for subject",
        ));
        assert!(fault.is_not_found());
        assert_eq!(fault.detail.as_deref(), Some("Record Not Found for subject"));
    }

    #[test]
    fn validation_codes_keep_remote_message() {
        let fault = translate(UpstreamFault::remote(
            "GetClientCreditHistory",
            "client-123",
            "Client.ValidationError",
            "late_payments must be non-negative",
        ));
        assert_eq!(
            fault.kind,
            FaultKind::ValidationError {
                reason: "late_payments must be non-negative".to_string()
            }
        );
    }

    #[test]
    fn transport_faults_get_generic_reason() {
        let faults = [
            UpstreamFault::transport("GetClientIdentity", "connection reset; not found in pool"),
            UpstreamFault::timeout("GetClientIdentity", Duration::from_millis(10)),
            UpstreamFault::decode("GetClientIdentity", "invalid json"),
            UpstreamFault::remote("GetClientIdentity", "client-001", "Server", "boom"),
        ];

        for raw in faults {
            let fault = translate(raw);
            assert_eq!(
                fault.kind,
                FaultKind::ValidationError {
                    reason: UPSTREAM_UNAVAILABLE_REASON.to_string()
                }
            );
            assert!(fault.detail.is_none());
        }
    }

    #[test]
    fn unstructured_rejections_never_expose_their_body() {
        let body = "<html>Invalid credentials for db user admin@10.0.0.5</html>";
        for status in [400, 401, 403, 422] {
            let fault = translate(UpstreamFault::status(
                "GetClientIdentity",
                "client-001",
                status,
                body,
            ));
            assert_eq!(
                fault.kind,
                FaultKind::ValidationError {
                    reason: UPSTREAM_UNAVAILABLE_REASON.to_string()
                },
                "status {status}"
            );
            assert!(fault.detail.is_none());
            assert!(!fault.to_string().contains("admin@"));
        }
    }

    #[test]
    fn unstructured_404_is_not_found_without_detail() {
        let fault = translate(UpstreamFault::status(
            "GetClientCreditHistory",
            "client-002",
            404,
            "<html>Not Found</html>",
        ));

        assert_eq!(
            fault.kind,
            FaultKind::NotFound {
                subject: "client-002".to_string()
            }
        );
        assert!(fault.detail.is_none());
    }

    #[test]
    fn local_validation_errors_translate_to_validation() {
        let id = CorrelationId::new_v4();
        let error = ValidationError::InvalidSubjectId {
            value: "abc".to_string(),
        };
        let fault = Fault::from_validation(&error, id);

        assert_eq!(fault.correlation_id, id);
        assert_eq!(fault.code(), "Client.ValidationError");
        assert!(fault.message().contains("abc"));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let fault = Fault::not_found("client-999", CorrelationId::new_v4());
        let value = serde_json::to_value(&fault).expect("serialize fault");

        assert_eq!(value["kind"]["kind"], "not_found");
        assert_eq!(value["kind"]["subject"], "client-999");
        assert!(value.get("detail").is_none());
    }
}
