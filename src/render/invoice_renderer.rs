// ==========================================
// 包装 ERP - 发票渲染器（Tera）
// ==========================================

use crate::domain::{InvoiceDocument, InvoiceLine};
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;
use tracing::debug;

const INVOICE_TEMPLATE: &str = "invoice.html";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template load failed: {0}")]
    TemplateError(String),

    #[error("document render failed: {0}")]
    RenderFailed(String),
}

/// 渲染结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedDocument {
    pub document_id: String,
    pub html: String,
}

/// 文档渲染器
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, document: &InvoiceDocument) -> Result<RenderedDocument, RenderError>;
}

pub struct TeraInvoiceRenderer {
    tera: Tera,
}

impl TeraInvoiceRenderer {
    /// 使用内嵌模板创建渲染器
    pub fn new() -> Result<Self, RenderError> {
        Self::with_template(include_str!("templates/invoice.html"))
    }

    /// 使用自定义模板（模板名以 .html 结尾，自动转义开启）
    pub fn with_template(template: &str) -> Result<Self, RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template(INVOICE_TEMPLATE, template)
            .map_err(|e| RenderError::TemplateError(e.to_string()))?;
        Ok(Self { tera })
    }
}

// 金额统一预格式化为两位小数文本
#[derive(Serialize)]
struct LineView<'a> {
    description: &'a str,
    quantity: String,
    unit_price: String,
    amount: String,
}

#[derive(Serialize)]
struct TotalsView {
    subtotal: String,
    tax: String,
    tax_percent: String,
    total: String,
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

fn line_view(line: &InvoiceLine) -> LineView<'_> {
    LineView {
        description: &line.description,
        quantity: format!("{}", line.quantity),
        unit_price: money(line.unit_price),
        amount: money(line.amount),
    }
}

impl DocumentRenderer for TeraInvoiceRenderer {
    fn render(&self, document: &InvoiceDocument) -> Result<RenderedDocument, RenderError> {
        let lines: Vec<LineView<'_>> = document.lines.iter().map(line_view).collect();
        let totals = TotalsView {
            subtotal: money(document.totals.subtotal),
            tax: money(document.totals.tax),
            tax_percent: format!("{}", (document.totals.tax_rate * 10_000.0).round() / 100.0),
            total: money(document.totals.total),
        };

        let mut context = Context::new();
        context.insert("document_id", &document.document_id);
        context.insert("issued_on", &document.issued_on.format("%Y-%m-%d").to_string());
        context.insert("client", &document.client);
        context.insert("lines", &lines);
        context.insert("currency", &document.currency);
        context.insert("totals", &totals);

        let html = self
            .tera
            .render(INVOICE_TEMPLATE, &context)
            .map_err(|e| RenderError::RenderFailed(e.to_string()))?;

        debug!(document_id = %document.document_id, bytes = html.len(), "发票已渲染");
        Ok(RenderedDocument {
            document_id: document.document_id.clone(),
            html,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ClientSnapshot;
    use chrono::NaiveDate;

    fn document() -> InvoiceDocument {
        InvoiceDocument::new(
            "FAC-2026-0001",
            NaiveDate::from_ymd_opt(2026, 3, 5).unwrap(),
            ClientSnapshot {
                name: "Farmacias <del> Norte".into(),
                rfc: Some("FNO010101AAA".into()),
                address: None,
                email: None,
            },
            vec![InvoiceLine::new("Caja plegadiza 95x45x28", 1000.0, 2.35)],
            "MXN",
            0.16,
        )
    }

    #[test]
    fn test_render_invoice() {
        let renderer = TeraInvoiceRenderer::new().unwrap();
        let rendered = renderer.render(&document()).unwrap();

        assert_eq!(rendered.document_id, "FAC-2026-0001");
        assert!(rendered.html.contains("2350.00"));
        assert!(rendered.html.contains("IVA (16%)"));
        assert!(rendered.html.contains("2726.00 MXN"));
        assert!(rendered.html.contains("RFC: FNO010101AAA"));
        // 自动转义
        assert!(rendered.html.contains("Farmacias &lt;del&gt; Norte"));
    }

    #[test]
    fn test_bad_template_is_rejected() {
        assert!(matches!(
            TeraInvoiceRenderer::with_template("{% for x in %}"),
            Err(RenderError::TemplateError(_))
        ));
    }
}
