// ==========================================
// 包装 ERP - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 说明: 行级问题记为 RowMessage，不走错误通道；
//       这里只有格式错误与会话级致命错误
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file format: '{0}' (expected .xlsx, .xls or .csv)")]
    UnsupportedFormat(String),

    #[error("file read failed: {0}")]
    FileReadError(String),

    #[error("spreadsheet parse failed: {0}")]
    ExcelParseError(String),

    #[error("CSV parse failed: {0}")]
    CsvParseError(String),

    #[error("required column(s) missing: {0}")]
    MissingColumns(String),

    // ===== 会话级错误 =====
    #[error("no authenticated user; import aborted before processing any row")]
    Unauthenticated,

    #[error("backing store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("row {0} not found in session")]
    RowNotFound(usize),

    #[error("technical record {0} not found")]
    TechnicalRecordNotFound(i64),

    #[error("import blocked: {0} row(s) still have errors")]
    BlockingRows(usize),

    // ===== 输出错误 =====
    #[error("report write failed: {0}")]
    ReportWriteError(String),

    // ===== 下游错误 =====
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("configuration read failed: {0}")]
    Config(String),

    // ===== 通用错误 =====
    #[error("internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<calamine::Error>
impl From<calamine::Error> for ImportError {
    fn from(err: calamine::Error) -> Self {
        ImportError::ExcelParseError(err.to_string())
    }
}

// 实现 From<rust_xlsxwriter::XlsxError>
impl From<rust_xlsxwriter::XlsxError> for ImportError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        ImportError::ReportWriteError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
