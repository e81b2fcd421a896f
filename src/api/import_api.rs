// ==========================================
// 包装 ERP - 导入 API
// ==========================================
// 职责: 封装 导入会话/提交/错误报告/模板/导入日志 的调用入口
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::db::open_sqlite_connection;
use crate::domain::{AuthContext, ImportLogEntry, ImportVariant};
use crate::importer::{
    error_report, BulkImporter, CancelToken, ImportSession, ProgressSink,
};
use crate::repository::{ImportRepository, ImportRepositoryImpl};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// 导入日志默认返回条数
pub const DEFAULT_LOG_LIMIT: usize = 20;

/// 导入 API
pub struct ImportApi {
    importer: BulkImporter<ImportRepositoryImpl, ConfigManager>,
}

impl ImportApi {
    /// 按数据库路径创建
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 共享已有连接（仓储与配置使用同一连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let repo = ImportRepositoryImpl::from_connection(conn.clone())?;
        let config = ConfigManager::from_connection(conn)
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(Self {
            importer: BulkImporter::new(repo, config),
        })
    }

    /// 打开导入会话（解析 + 校验 + 解析引用 + 匹配）
    ///
    /// # 返回
    /// - Err(ImportError): 文件格式错误，整次会话失败
    pub async fn open_session(
        &self,
        variant: ImportVariant,
        file_path: &Path,
    ) -> ApiResult<ImportSession> {
        let session = ImportSession::open(variant, file_path, self.importer.repository()).await?;
        Ok(session)
    }

    /// 提交会话
    ///
    /// # 返回
    /// - Err(ImportBlocked): 仍有 error 行
    /// - Err(Unauthenticated): 缺少操作人
    pub async fn commit(
        &self,
        session: &ImportSession,
        auth: Option<&AuthContext>,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> ApiResult<ImportLogEntry> {
        let entry = session.commit(&self.importer, auth, progress, cancel).await?;
        info!(
            log_id = %entry.log_id,
            inserted = entry.counts.inserted,
            updated = entry.counts.updated,
            errored = entry.counts.errored,
            "导入已提交"
        );
        Ok(entry)
    }

    /// 导出会话的错误报告（.xlsx / .csv）
    pub fn export_error_report(&self, session: &ImportSession, output: &Path) -> ApiResult<usize> {
        Ok(error_report::write_error_report(
            session.variant(),
            session.rows(),
            output,
        )?)
    }

    /// 导出导入模板（.xlsx / .csv）
    pub fn write_template(&self, variant: ImportVariant, output: &Path) -> ApiResult<()> {
        Ok(error_report::write_template(variant, output)?)
    }

    /// 最近的导入日志（新在前）
    pub async fn list_import_logs(&self, limit: usize) -> ApiResult<Vec<ImportLogEntry>> {
        if limit == 0 {
            return Err(ApiError::InvalidInput("limit must be greater than 0".to_string()));
        }
        Ok(self.importer.repository().list_import_logs(limit).await?)
    }
}
