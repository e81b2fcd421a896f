// ==========================================
// 包装 ERP - 导入管道 Trait
// ==========================================
// 职责: 定义导入管道的可替换接口（不包含实现）
// ==========================================

use crate::domain::ImportProgress;
use crate::importer::error::ImportResult;
use crate::importer::file_parser::ParsedSheet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 文件解析接口（解析阶段）
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为有序原始行（首行为表头）
    ///
    /// # 参数
    /// - file_path: 文件路径
    ///
    /// # 返回
    /// - Ok(ParsedSheet): 表头 + 数据行（保持文件顺序，空白行跳过）
    /// - Err: 文件读取错误、格式错误
    fn parse_file(&self, file_path: &Path) -> ImportResult<ParsedSheet>;
}

// ==========================================
// ProgressSink Trait
// ==========================================
// 用途: 逐行进度回报（每处理一行回报一次，不做批量合并）
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: ImportProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(ImportProgress) + Send + Sync,
{
    fn on_progress(&self, progress: ImportProgress) {
        self(progress)
    }
}

/// 不关心进度时使用
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _progress: ImportProgress) {}
}

// ==========================================
// CancelToken - 取消令牌
// ==========================================
// 最小取消粒度: 下一行开始前
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
