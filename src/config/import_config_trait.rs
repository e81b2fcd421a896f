// ==========================================
// 包装 ERP - 导入/对账配置读取 Trait
// ==========================================
// 职责: 定义导入、对账、发票模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

/// 配置读取结果（错误可跨线程传递）
pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入管道与对账所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 导入配置 =====

    /// 单行落库超时（毫秒）
    ///
    /// # 默认值
    /// - 10000
    ///
    /// # 用途
    /// - 单次仓储调用超时后该行记为 error，继续处理下一行
    async fn get_persist_timeout_ms(&self) -> ConfigResult<u64>;

    // ===== 银行对账配置 =====

    /// 金额容差
    ///
    /// # 默认值
    /// - 0.01
    async fn get_reconcile_amount_tolerance(&self) -> ConfigResult<f64>;

    /// 日期窗口（天）
    ///
    /// # 默认值
    /// - 3
    async fn get_reconcile_date_window_days(&self) -> ConfigResult<i64>;

    // ===== 发票配置 =====

    /// 税率
    ///
    /// # 默认值
    /// - 0.16
    async fn get_invoice_tax_rate(&self) -> ConfigResult<f64>;
}
