// ==========================================
// 包装 ERP - 银行对账领域对象
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// PaymentDirection - 款项方向
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDirection {
    /// 应收（对应银行入账）
    Receivable,
    /// 应付（对应银行出账）
    Payable,
}

impl PaymentDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentDirection::Receivable => "receivable",
            PaymentDirection::Payable => "payable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "receivable" => Some(PaymentDirection::Receivable),
            "payable" => Some(PaymentDirection::Payable),
            _ => None,
        }
    }

    /// 银行流水金额符号对应的方向（正数入账）
    pub fn of_statement_amount(amount: f64) -> Self {
        if amount >= 0.0 {
            PaymentDirection::Receivable
        } else {
            PaymentDirection::Payable
        }
    }
}

impl fmt::Display for PaymentDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// PaymentRecord - 内部款项（未对账）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: i64,
    pub direction: PaymentDirection,
    pub counterparty: String,
    /// 金额（正数）
    pub amount: f64,
    pub date: NaiveDate,
    pub reference: Option<String>,
}

// ==========================================
// BankStatementLine - 银行流水行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankStatementLine {
    pub row_index: usize,
    pub date: NaiveDate,
    pub description: Option<String>,
    /// 带符号金额（正数入账，负数出账）
    pub amount: f64,
    pub reference: Option<String>,
}

// ==========================================
// ProposalConfidence
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalConfidence {
    Exact,
    Probable,
}

// ==========================================
// ReconciliationProposal - 对账建议
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationProposal {
    pub statement_row: usize,
    pub payment_id: i64,
    pub amount_diff: f64,
    pub days_apart: i64,
    pub reference_match: bool,
    pub confidence: ProposalConfidence,
    /// 确认时回写到款项上的银行参考号
    pub bank_reference: Option<String>,
}

/// 被拒绝的流水行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedStatementRow {
    pub row_index: usize,
    pub messages: Vec<String>,
}

// ==========================================
// ReconciliationReport
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub proposals: Vec<ReconciliationProposal>,
    /// 无候选款项的流水行号
    pub unmatched_rows: Vec<usize>,
    pub rejected_rows: Vec<RejectedStatementRow>,
}
