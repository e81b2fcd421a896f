// ==========================================
// 包装 ERP - 领域模型层
// ==========================================
// 职责: 定义导入行、参考实体、落库实体、审计日志、对账与发票对象
// 红线: 不含数据访问逻辑，不含导入管道逻辑
// ==========================================

pub mod bank;
pub mod cell;
pub mod entities;
pub mod import_log;
pub mod import_row;
pub mod invoice;
pub mod reference;
pub mod types;

// 重导出核心类型
pub use bank::{
    BankStatementLine, PaymentDirection, PaymentRecord, ProposalConfidence,
    ReconciliationProposal, ReconciliationReport, RejectedStatementRow,
};
pub use cell::CellValue;
pub use entities::{ClientRecord, DielineRecord, QuotationRecord};
pub use import_log::{
    AuthContext, ErrorReportRow, ImportCounts, ImportLogEntry, ImportProgress, ImportSource,
    ManifestEntry, StatusCounts,
};
pub use import_row::{FieldMap, ImportRow, RawRecord, ResolvedReferences, RowMessage};
pub use invoice::{ClientSnapshot, CurrencyTotals, InvoiceDocument, InvoiceLine};
pub use reference::{ClientRef, ReferenceSnapshot, TechnicalRecord};
pub use types::{ImportVariant, MatchType, MessageStage, RowStatus, Severity};
