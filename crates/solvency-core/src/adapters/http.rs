use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::directory::{LookupFuture, LookupRequest, SubjectDirectory, UpstreamFault};
use crate::http_client::{HttpClient, HttpRequest, HttpResponse, CORRELATION_HEADER};
use crate::{ClientIdentity, CreditHistory, DataCategory, Financials, SubjectRecord};

const RETRYABLE_STATUSES: [u16; 2] = [408, 429];
const MAX_BODY_EXCERPT: usize = 200;

/// Directory reached over HTTP: `GET {base}/clients/{id}/{category}`.
#[derive(Clone)]
pub struct HttpDirectory {
    base_url: String,
    http_client: Arc<dyn HttpClient>,
    request_timeout: Duration,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            http_client,
            request_timeout: Duration::from_secs(3),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, req: &LookupRequest) -> String {
        format!(
            "{}/clients/{}/{}",
            self.base_url,
            urlencoding::encode(req.subject.as_str()),
            req.category.as_str()
        )
    }

    async fn fetch(&self, req: LookupRequest) -> Result<SubjectRecord, UpstreamFault> {
        let operation = req.operation();
        let request = HttpRequest::get(self.endpoint(&req))
            .with_header("accept", "application/json")
            .with_header(CORRELATION_HEADER, req.correlation_id.to_string())
            .with_timeout(self.request_timeout);

        let response = self.http_client.execute(request).await.map_err(|err| {
            if err.retryable() {
                UpstreamFault::transport(operation, err.message())
            } else {
                UpstreamFault::transport_fatal(operation, err.message())
            }
        })?;

        if !response.is_success() {
            return Err(status_fault(&req, &response));
        }

        decode_record(req.category, operation, &response.body)
    }
}

impl SubjectDirectory for HttpDirectory {
    fn name(&self) -> &'static str {
        "http"
    }

    fn lookup<'a>(&'a self, req: LookupRequest) -> LookupFuture<'a> {
        Box::pin(self.fetch(req))
    }
}

#[derive(Debug, Deserialize)]
struct RemoteFaultBody {
    code: String,
    message: String,
}

fn status_fault(req: &LookupRequest, response: &HttpResponse) -> UpstreamFault {
    let operation = req.operation();
    if RETRYABLE_STATUSES.contains(&response.status) || response.status >= 500 {
        return UpstreamFault::transport(
            operation,
            format!("directory returned status {}", response.status),
        );
    }

    match serde_json::from_str::<RemoteFaultBody>(&response.body) {
        Ok(body) => UpstreamFault::remote(operation, req.subject.as_str(), body.code, body.message),
        Err(_) => UpstreamFault::status(
            operation,
            req.subject.as_str(),
            response.status,
            excerpt(&response.body),
        ),
    }
}

fn decode_record(
    category: DataCategory,
    operation: &'static str,
    body: &str,
) -> Result<SubjectRecord, UpstreamFault> {
    let decode_error = |err: &dyn std::fmt::Display| {
        UpstreamFault::decode(operation, format!("failed to parse {category} record: {err}"))
    };

    match category {
        DataCategory::Identity => {
            let payload: ClientIdentity =
                serde_json::from_str(body).map_err(|err| decode_error(&err))?;
            ClientIdentity::new(payload.name, payload.address)
                .map(SubjectRecord::Identity)
                .map_err(|err| decode_error(&err))
        }
        DataCategory::Financials => {
            let payload: Financials =
                serde_json::from_str(body).map_err(|err| decode_error(&err))?;
            Financials::new(payload.monthly_income, payload.monthly_expenses)
                .map(SubjectRecord::Financials)
                .map_err(|err| decode_error(&err))
        }
        DataCategory::History => {
            let payload: CreditHistory =
                serde_json::from_str(body).map_err(|err| decode_error(&err))?;
            CreditHistory::new(payload.debt, payload.late_payments, payload.has_bankruptcy)
                .map(SubjectRecord::History)
                .map_err(|err| decode_error(&err))
        }
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((index, _)) => format!("{}...", &trimmed[..index]),
        None => trimmed.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;

    use super::*;
    use crate::directory::UpstreamFaultKind;
    use crate::http_client::HttpError;
    use crate::{CorrelationId, SubjectId};

    #[derive(Debug)]
    struct RecordingHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl RecordingHttpClient {
        fn replying(response: Result<HttpResponse, HttpError>) -> Arc<Self> {
            Arc::new(Self {
                response,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(
            &'a self,
            request: HttpRequest,
        ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }
    }

    fn lookup(category: DataCategory) -> LookupRequest {
        LookupRequest::new(
            category,
            SubjectId::parse("client-001").expect("valid id"),
            CorrelationId::new_v4(),
        )
    }

    #[tokio::test]
    async fn builds_category_url_and_decodes_body() {
        let client = RecordingHttpClient::replying(Ok(HttpResponse::ok_json(
            r#"{"monthly_income":4000.0,"monthly_expenses":3000.0}"#,
        )));
        let directory = HttpDirectory::new("http://directory.test/", client.clone());
        let req = lookup(DataCategory::Financials);
        let correlation = req.correlation_id.to_string();

        let record = directory.lookup(req).await.expect("decodes");

        assert_eq!(
            record,
            SubjectRecord::Financials(Financials {
                monthly_income: 4000.0,
                monthly_expenses: 3000.0,
            })
        );
        let requests = client.recorded_requests();
        assert_eq!(
            requests[0].url,
            "http://directory.test/clients/client-001/financials"
        );
        assert_eq!(
            requests[0].headers.get(CORRELATION_HEADER),
            Some(&correlation)
        );
    }

    #[tokio::test]
    async fn fault_body_becomes_remote_fault() {
        let client = RecordingHttpClient::replying(Ok(HttpResponse::new(
            404,
            r#"{"code":"Client.NotFound","message":"Client with ID 'client-001' not found"}"#,
        )));
        let directory = HttpDirectory::new("http://directory.test", client);

        let fault = directory
            .lookup(lookup(DataCategory::Identity))
            .await
            .expect_err("404 should fail");

        assert_eq!(fault.code(), Some("Client.NotFound"));
        assert!(!fault.retryable());
    }

    #[tokio::test]
    async fn server_errors_are_retryable_transport_faults() {
        for status in [408, 429, 500, 503] {
            let client = RecordingHttpClient::replying(Ok(HttpResponse::new(status, "busy")));
            let directory = HttpDirectory::new("http://directory.test", client);

            let fault = directory
                .lookup(lookup(DataCategory::History))
                .await
                .expect_err("status should fail");

            assert_eq!(fault.kind(), UpstreamFaultKind::Transport, "status {status}");
            assert!(fault.retryable());
        }
    }

    #[tokio::test]
    async fn unstructured_error_body_becomes_status_fault() {
        let client = RecordingHttpClient::replying(Ok(HttpResponse::new(400, "<html>bad</html>")));
        let directory = HttpDirectory::new("http://directory.test", client);

        let fault = directory
            .lookup(lookup(DataCategory::Identity))
            .await
            .expect_err("400 should fail");

        assert_eq!(fault.kind(), UpstreamFaultKind::Status);
        assert_eq!(fault.code(), None);
        assert!(matches!(fault, UpstreamFault::Status { status: 400, .. }));
        assert!(!fault.retryable());
    }

    #[tokio::test]
    async fn malformed_or_invalid_payload_is_decode_fault() {
        for body in ["not json", r#"{"debt":-5.0,"late_payments":0,"has_bankruptcy":false}"#] {
            let client = RecordingHttpClient::replying(Ok(HttpResponse::ok_json(body)));
            let directory = HttpDirectory::new("http://directory.test", client);

            let fault = directory
                .lookup(lookup(DataCategory::History))
                .await
                .expect_err("payload should be rejected");

            assert_eq!(fault.kind(), UpstreamFaultKind::Decode, "body {body}");
        }
    }

    #[tokio::test]
    async fn transport_errors_keep_retryability() {
        let client = RecordingHttpClient::replying(Err(HttpError::non_retryable("invalid url")));
        let directory = HttpDirectory::new("http://directory.test", client);

        let fault = directory
            .lookup(lookup(DataCategory::Identity))
            .await
            .expect_err("transport failure");

        assert_eq!(fault.kind(), UpstreamFaultKind::Transport);
        assert!(!fault.retryable());
    }
}
