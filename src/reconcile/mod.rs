// ==========================================
// 包装 ERP - 银行对账层
// ==========================================
// 职责: 银行流水解析 → 对账建议；确认由 API 层回写款项
// ==========================================

pub mod matcher;
pub mod statement_parser;

pub use matcher::{ReconcileParams, ReconciliationEngine};
pub use statement_parser::{parse_statement, parse_statement_file, ParsedStatement};
