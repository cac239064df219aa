//! # Forwarder
//!
//! Delivers a hydrated invoice to the receiving side.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Forwarding Targets                             │
//! │                                                                         │
//! │  HttpForwarder        POST {endpoint}                                  │
//! │                       Content-Type: application/json                   │
//! │                       X-API-Key: <key>          (when configured)      │
//! │                       { "header": {...}, "lines": [...] }              │
//! │                       2xx → Ok, anything else → ForwardFailed          │
//! │                                                                         │
//! │  RepositoryForwarder  InvoiceRepository::create_full_invoice           │
//! │                       (receiving store on the same machine)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A forwarder makes exactly one attempt. Whether a failed invoice is tried
//! again is the poller's decision.

use async_trait::async_trait;
use facturapid_core::FullInvoice;
use facturapid_db::InvoiceRepository;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::config::ForwardSettings;
use crate::error::{SyncError, SyncResult};

/// Header carrying the receiving API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Delivery target for hydrated invoices.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, invoice: &FullInvoice) -> SyncResult<()>;
}

// =============================================================================
// HTTP
// =============================================================================

/// JSON POST to the receiving API.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpForwarder {
    pub fn new(settings: &ForwardSettings) -> SyncResult<Self> {
        let endpoint = Url::parse(&settings.endpoint)?;

        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        info!(%endpoint, "HTTP forwarder ready");
        Ok(HttpForwarder {
            client,
            endpoint,
            api_key: settings.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, invoice: &FullInvoice) -> SyncResult<()> {
        let code = invoice.code();
        let failed = |reason: String| SyncError::ForwardFailed { code, reason };

        let mut request = self.client.post(self.endpoint.clone()).json(invoice);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(|e| failed(e.to_string()))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(failed(format!("HTTP {}: {}", status, body.trim())));
        }

        debug!(code, %status, "Invoice accepted by receiving API");
        Ok(())
    }
}

// =============================================================================
// Local Receiving Store
// =============================================================================

/// Writes straight into a receiving store.
#[derive(Debug, Clone)]
pub struct RepositoryForwarder {
    repository: InvoiceRepository,
}

impl RepositoryForwarder {
    pub fn new(repository: InvoiceRepository) -> Self {
        RepositoryForwarder { repository }
    }
}

#[async_trait]
impl Forwarder for RepositoryForwarder {
    async fn forward(&self, invoice: &FullInvoice) -> SyncResult<()> {
        let outcome = self
            .repository
            .create_full_invoice(invoice)
            .await
            .map_err(|e| SyncError::ForwardFailed {
                code: invoice.code(),
                reason: e.to_string(),
            })?;

        debug!(
            code = invoice.code(),
            header_inserted = outcome.header_inserted,
            lines_inserted = outcome.lines_inserted,
            "Invoice stored"
        );
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use facturapid_core::{Flag, InvoiceHeader, InvoiceLine, Money};
    use facturapid_db::{Database, DbConfig};
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<FullInvoice>>>;

    /// Receiving API stub: requires key "secret", rejects invoice 4.
    async fn receive(
        State(received): State<Received>,
        headers: HeaderMap,
        Json(invoice): Json<FullInvoice>,
    ) -> StatusCode {
        if headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) != Some("secret") {
            return StatusCode::UNAUTHORIZED;
        }
        if invoice.code() == 4 {
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
        received.lock().unwrap().push(invoice);
        StatusCode::CREATED
    }

    async fn spawn_stub() -> (String, Received) {
        let received = Received::default();
        let app = Router::new()
            .route("/api/invoices", post(receive))
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/api/invoices", addr), received)
    }

    fn settings(endpoint: String, api_key: Option<&str>) -> ForwardSettings {
        ForwardSettings {
            endpoint,
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
            ..ForwardSettings::default()
        }
    }

    fn invoice(code: i64) -> FullInvoice {
        let mut header = InvoiceHeader::new(code, "1", Flag::new('A'));
        header.total = Some("121.00".parse::<Money>().unwrap());
        FullInvoice::new(header, vec![InvoiceLine::new(code, 1, "Product A")])
    }

    #[tokio::test]
    async fn test_http_forward_success() {
        let (endpoint, received) = spawn_stub().await;
        let forwarder = HttpForwarder::new(&settings(endpoint, Some("secret"))).unwrap();

        forwarder.forward(&invoice(1)).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0], invoice(1));
    }

    #[tokio::test]
    async fn test_http_forward_rejected() {
        let (endpoint, received) = spawn_stub().await;
        let forwarder = HttpForwarder::new(&settings(endpoint, Some("secret"))).unwrap();

        let err = forwarder.forward(&invoice(4)).await.unwrap_err();
        assert!(matches!(err, SyncError::ForwardFailed { code: 4, ref reason } if reason.contains("500")));
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_http_forward_without_key() {
        let (endpoint, _) = spawn_stub().await;
        let forwarder = HttpForwarder::new(&settings(endpoint, None)).unwrap();

        let err = forwarder.forward(&invoice(1)).await.unwrap_err();
        assert!(matches!(err, SyncError::ForwardFailed { ref reason, .. } if reason.contains("401")));
    }

    #[tokio::test]
    async fn test_http_forward_unreachable() {
        // Bind then drop to get a port with nothing listening
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let forwarder = HttpForwarder::new(&settings(format!("http://{}/api/invoices", addr), None)).unwrap();
        let err = forwarder.forward(&invoice(1)).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_http_forwarder_rejects_bad_endpoint() {
        let err = HttpForwarder::new(&settings("::not a url::".into(), None)).unwrap_err();
        assert!(err.is_config_error());
    }

    #[tokio::test]
    async fn test_repository_forward_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let forwarder = RepositoryForwarder::new(db.invoices());

        forwarder.forward(&invoice(1)).await.unwrap();
        forwarder.forward(&invoice(1)).await.unwrap();

        assert_eq!(db.invoices().count().await.unwrap(), 1);
        assert_eq!(db.invoices().count_lines(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_repository_failure_is_forward_failed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let forwarder = RepositoryForwarder::new(db.invoices());
        db.close().await;

        let err = forwarder.forward(&invoice(6)).await.unwrap_err();
        assert!(matches!(err, SyncError::ForwardFailed { code: 6, .. }));
        assert!(err.is_retryable());
        assert_eq!(err.invoice_code(), Some(6));
    }
}
