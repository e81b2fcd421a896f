// ==========================================
// 包装 ERP - 发票 API
// ==========================================
// 职责: 组装完全解析的发票文档并交给渲染器
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::domain::{ClientSnapshot, InvoiceDocument, InvoiceLine};
use crate::render::{DocumentRenderer, RenderedDocument};
use chrono::NaiveDate;

pub struct InvoiceApi<D: DocumentRenderer> {
    config: ConfigManager,
    renderer: D,
}

impl<D: DocumentRenderer> InvoiceApi<D> {
    pub fn new(config: ConfigManager, renderer: D) -> Self {
        Self { config, renderer }
    }

    /// 生成并渲染发票（税率读取 invoice.tax_rate）
    pub async fn render_invoice(
        &self,
        document_id: &str,
        issued_on: NaiveDate,
        client: ClientSnapshot,
        lines: Vec<InvoiceLine>,
        currency: &str,
    ) -> ApiResult<RenderedDocument> {
        if lines.is_empty() {
            return Err(ApiError::InvalidInput(
                "an invoice needs at least one line".to_string(),
            ));
        }
        let tax_rate = self
            .config
            .get_invoice_tax_rate()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;

        let document =
            InvoiceDocument::new(document_id, issued_on, client, lines, currency, tax_rate);
        Ok(self.renderer.render(&document)?)
    }
}
