//! # Detail Hydrator
//!
//! Expands a listed invoice code into the full header + lines document.

use facturapid_core::validation::validate_full_invoice;
use facturapid_core::FullInvoice;
use std::sync::Arc;
use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::source::InvoiceSource;

/// Builds [`FullInvoice`] documents from an [`InvoiceSource`].
#[derive(Clone)]
pub struct Hydrator {
    source: Arc<dyn InvoiceSource>,
}

impl Hydrator {
    pub fn new(source: Arc<dyn InvoiceSource>) -> Self {
        Hydrator { source }
    }

    /// Reads header and lines for `code`.
    ///
    /// ## Errors
    /// - `RecordNotFound`: the header vanished between listing and reading
    /// - `SourceUnavailable`: the store could not be queried
    /// - `HydrationFailed`: the rows do not form a valid invoice
    pub async fn hydrate(&self, code: i64) -> SyncResult<FullInvoice> {
        let header = self
            .source
            .header(code)
            .await?
            .ok_or(SyncError::RecordNotFound { code })?;

        let lines = self.source.lines(code).await?;

        let mut invoice = FullInvoice::new(header, lines);
        invoice.sort_lines();

        validate_full_invoice(&invoice).map_err(|e| SyncError::HydrationFailed {
            code,
            reason: e.to_string(),
        })?;

        debug!(code, lines = invoice.lines.len(), "Invoice hydrated");
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::Checkpoint;
    use async_trait::async_trait;
    use facturapid_core::{Flag, InvoiceHeader, InvoiceLine, InvoiceSummary};

    /// Fixed in-memory source.
    struct FixedSource {
        header: Option<InvoiceHeader>,
        lines: Vec<InvoiceLine>,
    }

    #[async_trait]
    impl InvoiceSource for FixedSource {
        async fn eligible_since(&self, _: Checkpoint, _: u32) -> SyncResult<Vec<InvoiceSummary>> {
            Ok(Vec::new())
        }

        async fn header(&self, _: i64) -> SyncResult<Option<InvoiceHeader>> {
            Ok(self.header.clone())
        }

        async fn lines(&self, _: i64) -> SyncResult<Vec<InvoiceLine>> {
            Ok(self.lines.clone())
        }
    }

    fn hydrator(header: Option<InvoiceHeader>, lines: Vec<InvoiceLine>) -> Hydrator {
        Hydrator::new(Arc::new(FixedSource { header, lines }))
    }

    #[tokio::test]
    async fn test_hydrate_sorts_lines() {
        let h = hydrator(
            Some(InvoiceHeader::new(1, "1", Flag::new('A'))),
            vec![
                InvoiceLine::new(1, 3, "Product C"),
                InvoiceLine::new(1, 1, "Product A"),
                InvoiceLine::new(1, 2, "Product B"),
            ],
        );

        let invoice = h.hydrate(1).await.unwrap();
        let numbers: Vec<i32> = invoice.lines.iter().map(|l| l.line_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_hydrate_without_lines() {
        let h = hydrator(Some(InvoiceHeader::new(1, "1", Flag::new('A'))), Vec::new());
        assert!(h.hydrate(1).await.unwrap().lines.is_empty());
    }

    #[tokio::test]
    async fn test_missing_header_is_not_found() {
        let err = hydrator(None, Vec::new()).hydrate(4).await.unwrap_err();
        assert!(matches!(err, SyncError::RecordNotFound { code: 4 }));
    }

    #[tokio::test]
    async fn test_invalid_invoice_fails_hydration() {
        let h = hydrator(
            Some(InvoiceHeader::new(1, "", Flag::new('A'))),
            vec![InvoiceLine::new(1, 1, "Product A")],
        );
        let err = h.hydrate(1).await.unwrap_err();
        assert!(matches!(err, SyncError::HydrationFailed { code: 1, .. }));

        let h = hydrator(
            Some(InvoiceHeader::new(1, "1", Flag::new('A'))),
            vec![InvoiceLine::new(1, 0, "Product A")],
        );
        assert!(matches!(
            h.hydrate(1).await.unwrap_err(),
            SyncError::HydrationFailed { .. }
        ));
    }
}
