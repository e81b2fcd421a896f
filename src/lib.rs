// ==========================================
// 包装 ERP - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 表格批量导入、刀模匹配、银行对账与发票渲染边界
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 导入层 - 表格导入管道
pub mod importer;

// 对账层 - 银行流水
pub mod reconcile;

// 渲染层 - 发票文档
pub mod render;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    CellValue, ImportLogEntry, ImportRow, ImportVariant, MatchType, RowStatus, Severity,
};
pub use importer::{BulkImporter, ImportError, ImportResult, ImportSession};
pub use api::{ApiError, ApiResult, ImportApi, InvoiceApi, ReconcileApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "包装 ERP 导入核心";
