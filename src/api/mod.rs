// ==========================================
// 包装 ERP - API 层
// ==========================================
// 职责: 提供业务 API 接口，供前端或命令行调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod invoice_api;
pub mod reconcile_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{ImportApi, DEFAULT_LOG_LIMIT};
pub use invoice_api::InvoiceApi;
pub use reconcile_api::ReconcileApi;
