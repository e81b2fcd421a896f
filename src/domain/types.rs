// ==========================================
// 包装 ERP - 领域类型定义
// ==========================================
// 行状态/消息级别/匹配类型/导入变体
// 序列化格式: snake_case（与前端及 import_log 一致）
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 消息级别 (Severity)
// ==========================================
// Info 仅作提示，不参与行状态推导
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

// ==========================================
// 行状态 (Row Status)
// ==========================================
// 红线: 只能由 messages 推导，不可直接设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Valid,
    Warning,
    Error,
}

impl RowStatus {
    /// 是否允许提交给导入器
    pub fn is_eligible(self) -> bool {
        !matches!(self, RowStatus::Error)
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowStatus::Valid => write!(f, "valid"),
            RowStatus::Warning => write!(f, "warning"),
            RowStatus::Error => write!(f, "error"),
        }
    }
}

// ==========================================
// 刀模匹配类型 (Match Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    #[default]
    None,
    ExactKey,
    DimensionalTolerance,
    Manual,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::None => "none",
            MatchType::ExactKey => "exact_key",
            MatchType::DimensionalTolerance => "dimensional_tolerance",
            MatchType::Manual => "manual",
        }
    }
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 消息来源阶段 (Pipeline Stage)
// ==========================================
// 每个阶段重跑时只替换自己产生的消息，保证幂等
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStage {
    Validation,
    Resolution,
    Matching,
}

// ==========================================
// 导入变体 (Import Variant)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportVariant {
    /// 客户批量导入（支持按名称/RFC 原地更新）
    Clients,
    /// 刀模/技术档案导入（支持按 SKU 原地更新）
    Dielines,
    /// 报价批量导入（带刀模匹配）
    Quotations,
}

impl ImportVariant {
    pub const ALL: [ImportVariant; 3] = [
        ImportVariant::Clients,
        ImportVariant::Dielines,
        ImportVariant::Quotations,
    ];

    /// 数据库/日志中的标识
    pub fn as_str(self) -> &'static str {
        match self {
            ImportVariant::Clients => "clients",
            ImportVariant::Dielines => "dielines",
            ImportVariant::Quotations => "quotations",
        }
    }

    /// 解析用户输入（兼容西语模板名）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "clients" | "clientes" => Some(ImportVariant::Clients),
            "dielines" | "suajes" | "troqueles" => Some(ImportVariant::Dielines),
            "quotations" | "cotizaciones" => Some(ImportVariant::Quotations),
            _ => None,
        }
    }

    /// 是否支持按业务键原地更新
    pub fn supports_update(self) -> bool {
        matches!(self, ImportVariant::Clients | ImportVariant::Dielines)
    }
}

impl fmt::Display for ImportVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
