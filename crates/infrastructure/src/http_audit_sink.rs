use async_trait::async_trait;
use reqwest::header;
use url::Url;

use shopkeep_application::AuditSink;
use shopkeep_core::{AppError, AppResult};
use shopkeep_domain::AuditRow;

/// Audit sink writing rows through a hosted backend's REST insert endpoint.
///
/// Each write is a single `POST {base}/rest/v1/{collection}` carrying the whole
/// batch as a JSON array. Failed requests are not retried.
#[derive(Clone)]
pub struct HttpAuditSink {
    http_client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpAuditSink {
    /// Creates a sink for the backend at `base_url`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, base_url: Url, api_key: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url,
            api_key: api_key.into(),
        }
    }

    /// Returns the insert endpoint for `collection`.
    pub fn endpoint(&self, collection: &str) -> AppResult<Url> {
        if collection.is_empty() || collection.contains(['/', '?', '#']) {
            return Err(AppError::Validation(format!(
                "audit collection '{collection}' is not a valid REST resource"
            )));
        }

        let mut base_url = self.base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(path.as_str());
        }

        base_url
            .join(format!("rest/v1/{collection}").as_str())
            .map_err(|error| {
                AppError::Validation(format!(
                    "failed to build audit endpoint for '{collection}': {error}"
                ))
            })
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn write(&self, collection: &str, rows: &[AuditRow]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let endpoint = self.endpoint(collection)?;
        let response = self
            .http_client
            .post(endpoint)
            .header("apikey", self.api_key.as_str())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!(
                    "failed to call audit insert endpoint for '{collection}': {error}"
                ))
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_owned());
        let message = format!(
            "audit insert endpoint for '{collection}' returned status {}: {body}",
            status.as_u16()
        );

        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(AppError::Unavailable(message))
        } else {
            Err(AppError::Validation(message))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use serde_json::Value;
    use shopkeep_application::AuditSink;
    use shopkeep_core::AppError;
    use shopkeep_domain::AuditRow;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpListener;
    use url::Url;
    use uuid::Uuid;

    use super::HttpAuditSink;

    #[derive(Debug, Clone)]
    struct CapturedRequest {
        request_line: String,
        headers: HashMap<String, String>,
        body: Vec<u8>,
    }

    type Captured = Arc<Mutex<Vec<CapturedRequest>>>;

    fn sink(base_url: &str) -> HttpAuditSink {
        let base_url = match Url::parse(base_url) {
            Ok(url) => url,
            Err(error) => panic!("invalid test url: {error}"),
        };
        HttpAuditSink::new(reqwest::Client::new(), base_url, "anon-key")
    }

    fn row(action: &str) -> AuditRow {
        AuditRow {
            id: Uuid::new_v4(),
            user_id: Some("cashier-1".to_owned()),
            action: action.to_owned(),
            table_name: Some("sales".to_owned()),
            record_id: Some("sale-1".to_owned()),
            old_data: None,
            new_data: Some(r#"{"total":40}"#.to_owned()),
            ip_address: None,
            user_agent: "shopkeep-tests".to_owned(),
            created_at: Utc::now(),
        }
    }

    fn captured(requests: &Captured) -> Vec<CapturedRequest> {
        requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Serves every connection with one canned response and records the requests.
    async fn serve_stub(status: &'static str, body: &'static str) -> (Url, Captured) {
        let listener = match TcpListener::bind("127.0.0.1:0").await {
            Ok(listener) => listener,
            Err(error) => panic!("failed to bind stub listener: {error}"),
        };
        let address = match listener.local_addr() {
            Ok(address) => address,
            Err(error) => panic!("failed to read stub address: {error}"),
        };
        let requests = Captured::default();

        let recorded = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut stream = BufReader::new(stream);
                let Some(request) = read_request(&mut stream).await else {
                    continue;
                };
                if let Ok(mut guard) = recorded.lock() {
                    guard.push(request);
                }

                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: text/plain\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let stream = stream.get_mut();
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        let base_url = match Url::parse(format!("http://{address}").as_str()) {
            Ok(url) => url,
            Err(error) => panic!("invalid stub url: {error}"),
        };
        (base_url, requests)
    }

    async fn read_request(
        stream: &mut BufReader<tokio::net::TcpStream>,
    ) -> Option<CapturedRequest> {
        let mut request_line = String::new();
        stream.read_line(&mut request_line).await.ok()?;

        let mut headers = HashMap::new();
        loop {
            let mut line = String::new();
            stream.read_line(&mut line).await.ok()?;
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            let (name, value) = line.split_once(':')?;
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_owned());
        }

        let length = headers
            .get("content-length")
            .and_then(|value| value.parse::<usize>().ok())
            .unwrap_or(0);
        let mut body = vec![0; length];
        stream.read_exact(&mut body).await.ok()?;

        Some(CapturedRequest {
            request_line: request_line.trim_end().to_owned(),
            headers,
            body,
        })
    }

    #[test]
    fn endpoint_appends_rest_path_to_base_url() {
        let endpoint = sink("https://shop.example.com").endpoint("audit_logs");
        assert_eq!(
            endpoint.map(String::from).ok().as_deref(),
            Some("https://shop.example.com/rest/v1/audit_logs")
        );
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let endpoint = sink("https://gateway.example.com/backend").endpoint("audit_logs");
        assert_eq!(
            endpoint.map(String::from).ok().as_deref(),
            Some("https://gateway.example.com/backend/rest/v1/audit_logs")
        );
    }

    #[test]
    fn endpoint_rejects_path_like_collections() {
        let sink = sink("https://shop.example.com");
        assert!(sink.endpoint("audit_logs/../users").is_err());
        assert!(sink.endpoint("audit_logs?select=*").is_err());
        assert!(sink.endpoint("").is_err());
    }

    #[tokio::test]
    async fn write_posts_the_batch_once_as_a_json_array() {
        let (base_url, requests) = serve_stub("201 Created", "").await;
        let sink = HttpAuditSink::new(reqwest::Client::new(), base_url, "anon-key");
        let rows = vec![row("sale.create"), row("sale.update")];

        let result = sink.write("audit_logs", &rows).await;
        assert!(result.is_ok(), "write failed: {result:?}");

        let requests = captured(&requests);
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.request_line, "POST /rest/v1/audit_logs HTTP/1.1");
        assert_eq!(
            request.headers.get("apikey").map(String::as_str),
            Some("anon-key")
        );
        assert_eq!(
            request.headers.get("authorization").map(String::as_str),
            Some("Bearer anon-key")
        );
        assert_eq!(
            request.headers.get("prefer").map(String::as_str),
            Some("return=minimal")
        );
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("application/json")
        );

        let body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(error) => panic!("request body is not JSON: {error}"),
        };
        let Some(sent) = body.as_array() else {
            panic!("request body is not a JSON array: {body}");
        };
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0]["action"], "sale.create");
        assert_eq!(sent[1]["action"], "sale.update");
        assert_eq!(sent[0]["old_data"], Value::Null);
        assert_eq!(sent[0]["new_data"], r#"{"total":40}"#);
    }

    #[tokio::test]
    async fn server_error_is_unavailable_and_not_retried() {
        let (base_url, requests) = serve_stub("503 Service Unavailable", "backend offline").await;
        let sink = HttpAuditSink::new(reqwest::Client::new(), base_url, "anon-key");

        let result = sink.write("audit_logs", &[row("sale.delete")]).await;

        match result {
            Err(AppError::Unavailable(message)) => {
                assert!(message.contains("503"), "missing status: {message}");
                assert!(message.contains("backend offline"), "missing body: {message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(captured(&requests).len(), 1);
    }

    #[tokio::test]
    async fn client_error_is_a_validation_error() {
        let (base_url, requests) = serve_stub("400 Bad Request", "unknown column").await;
        let sink = HttpAuditSink::new(reqwest::Client::new(), base_url, "anon-key");

        let result = sink.write("audit_logs", &[row("sale.create")]).await;

        match result {
            Err(AppError::Validation(message)) => {
                assert!(message.contains("400"), "missing status: {message}");
                assert!(message.contains("unknown column"), "missing body: {message}");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(captured(&requests).len(), 1);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_request() {
        let (base_url, requests) = serve_stub("201 Created", "").await;
        let sink = HttpAuditSink::new(reqwest::Client::new(), base_url, "anon-key");

        assert!(sink.write("audit_logs", &[]).await.is_ok());
        assert!(captured(&requests).is_empty());
    }
}
