// ==========================================
// 包装 ERP - 导入审计日志
// ==========================================
// ImportLogEntry: 每次导入运行结束时写入一条，之后不再修改（只追加）
// ==========================================

use crate::domain::import_row::RowMessage;
use crate::domain::types::ImportVariant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// AuthContext - 操作人上下文
// ==========================================
// 导入运行前必须存在，否则整次运行中止
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: String,
}

impl AuthContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

// ==========================================
// ImportSource - 源文件信息
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSource {
    pub file_name: String,
    pub file_size_bytes: u64,
}

// ==========================================
// ManifestEntry - 错误清单条目
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub row_index: usize,
    pub messages: Vec<String>,
}

// ==========================================
// ImportCounts - 运行计数
// ==========================================
// 未取消的运行: inserted + updated + errored == eligible
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    /// 文件数据行总数
    pub total_rows: usize,
    /// 因 error 状态被排除的行
    pub blocked: usize,
    /// 提交给导入器的行
    pub eligible: usize,
    pub inserted: usize,
    pub updated: usize,
    pub errored: usize,
    /// 取消后未处理的行
    pub skipped: usize,
}

impl ImportCounts {
    pub fn processed(&self) -> usize {
        self.inserted + self.updated + self.errored
    }
}

// ==========================================
// ImportLogEntry
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportLogEntry {
    pub log_id: String,
    pub variant: ImportVariant,
    pub source: ImportSource,
    pub counts: ImportCounts,
    pub cancelled: bool,
    pub error_manifest: Vec<ManifestEntry>,
    pub imported_by: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

// ==========================================
// ImportProgress - 逐行进度
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub processed: usize,
    pub total: usize,
    pub row_index: usize,
}

impl ImportProgress {
    /// 完成比例 [0, 1]（0 行时视为已完成）
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f64 / self.total as f64
        }
    }
}

// ==========================================
// StatusCounts - 预览统计
// ==========================================
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub valid: usize,
    pub warning: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.valid + self.warning + self.error
    }
}

/// 错误报告行（error 状态行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReportRow {
    pub row_index: usize,
    /// （列名, 值）— 变体的自然键列
    pub key_fields: Vec<(String, String)>,
    pub messages: Vec<RowMessage>,
}
