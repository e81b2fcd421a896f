// ==========================================
// 包装 ERP - 发票文档（渲染输入）
// ==========================================
// 红线: 交给渲染器的文档必须是完全解析后的记录，渲染器不做任何查询
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSnapshot {
    pub name: String,
    pub rfc: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub amount: f64,
}

impl InvoiceLine {
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            amount: round2(quantity * unit_price),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurrencyTotals {
    pub subtotal: f64,
    pub tax_rate: f64,
    pub tax: f64,
    pub total: f64,
}

impl CurrencyTotals {
    /// 按行金额汇总，税额按税率计算，均保留两位小数
    pub fn from_lines(lines: &[InvoiceLine], tax_rate: f64) -> Self {
        let subtotal = round2(lines.iter().map(|l| l.amount).sum());
        let tax = round2(subtotal * tax_rate);
        Self {
            subtotal,
            tax_rate,
            tax,
            total: round2(subtotal + tax),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDocument {
    /// 稳定文档标识（渲染结果以此为键）
    pub document_id: String,
    pub issued_on: NaiveDate,
    pub client: ClientSnapshot,
    pub lines: Vec<InvoiceLine>,
    pub currency: String,
    pub totals: CurrencyTotals,
}

impl InvoiceDocument {
    pub fn new(
        document_id: impl Into<String>,
        issued_on: NaiveDate,
        client: ClientSnapshot,
        lines: Vec<InvoiceLine>,
        currency: impl Into<String>,
        tax_rate: f64,
    ) -> Self {
        let totals = CurrencyTotals::from_lines(&lines, tax_rate);
        Self {
            document_id: document_id.into(),
            issued_on,
            client,
            lines,
            currency: currency.into(),
            totals,
        }
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_with_tax() {
        let lines = vec![
            InvoiceLine::new("Caja plegadiza 95x45x28", 1000.0, 2.35),
            InvoiceLine::new("Troquel", 1.0, 850.0),
        ];
        let totals = CurrencyTotals::from_lines(&lines, 0.16);

        assert_eq!(totals.subtotal, 3200.0);
        assert_eq!(totals.tax, 512.0);
        assert_eq!(totals.total, 3712.0);
    }
}
