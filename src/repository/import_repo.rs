// ==========================================
// 包装 ERP - 导入 Repository Trait
// ==========================================
// 职责: 定义导入相关数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::domain::{
    ClientRecord, ClientRef, DielineRecord, ImportLogEntry, QuotationRecord, TechnicalRecord,
};
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;

// ==========================================
// ImportRepository Trait
// ==========================================
// 用途: 导入管道的参考数据加载与逐行落库
// 实现者: ImportRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait ImportRepository: Send + Sync {
    // ===== 连通性 =====

    /// 检查存储是否可用（导入运行开始前调用，失败即中止整次运行）
    async fn ping(&self) -> RepositoryResult<()>;

    // ===== 参考数据 =====

    /// 加载客户投影（会话开始时一次性加载）
    async fn load_clients(&self) -> RepositoryResult<Vec<ClientRef>>;

    /// 加载刀模投影（尺寸单位 mm）
    async fn load_dielines(&self) -> RepositoryResult<Vec<TechnicalRecord>>;

    // ===== 逐行写入 =====

    /// 新建客户
    ///
    /// # 返回
    /// - Ok(i64): 新客户 ID
    /// - Err: client_code 冲突等数据库错误
    async fn insert_client(&self, client: &ClientRecord) -> RepositoryResult<i64>;

    /// 原地更新客户（client_code 不变；传入为空的可选字段保留原值）
    async fn update_client(&self, client_id: i64, client: &ClientRecord) -> RepositoryResult<()>;

    /// 新建刀模
    async fn insert_dieline(&self, dieline: &DielineRecord) -> RepositoryResult<i64>;

    /// 原地更新刀模
    async fn update_dieline(
        &self,
        dieline_id: i64,
        dieline: &DielineRecord,
    ) -> RepositoryResult<()>;

    /// 新建报价
    async fn insert_quotation(&self, quotation: &QuotationRecord) -> RepositoryResult<i64>;

    // ===== 审计日志 =====

    /// 写入导入日志（只追加）
    async fn insert_import_log(&self, entry: &ImportLogEntry) -> RepositoryResult<()>;

    /// 查询最近的导入日志（按结束时间倒序）
    async fn list_import_logs(&self, limit: usize) -> RepositoryResult<Vec<ImportLogEntry>>;
}
