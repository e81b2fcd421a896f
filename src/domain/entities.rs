// ==========================================
// 包装 ERP - 落库实体
// ==========================================
// 由导入器从已校验行构造；可选字段缺失时为 None（落库为 NULL）
// ==========================================

use crate::domain::types::MatchType;
use serde::{Deserialize, Serialize};

// ==========================================
// ClientRecord - 客户
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// 唯一业务编码（新建时生成占位编码）
    pub client_code: String,
    pub name: String,
    pub rfc: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub client_type: Option<String>,
    pub credit_days: Option<f64>,
    pub credit_limit: Option<f64>,
    /// 导入过程中按引用自动创建（信息待补全）
    pub is_placeholder: bool,
}

impl ClientRecord {
    /// 仅有名称/RFC 的占位客户
    pub fn placeholder(client_code: String, name: String, rfc: Option<String>) -> Self {
        Self {
            client_code,
            name,
            rfc,
            email: None,
            phone: None,
            city: None,
            client_type: None,
            credit_days: None,
            credit_limit: None,
            is_placeholder: true,
        }
    }
}

// ==========================================
// DielineRecord - 刀模/技术档案（尺寸 mm）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DielineRecord {
    pub sku: String,
    pub product_name: String,
    pub height_mm: f64,
    pub width_mm: f64,
    pub depth_mm: f64,
    pub die_id: Option<String>,
    pub material: Option<String>,
    pub layout: Option<String>,
    pub client_id: Option<i64>,
}

// ==========================================
// QuotationRecord - 报价（尺寸 cm）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotationRecord {
    pub client_id: i64,
    pub dieline_id: Option<i64>,
    pub match_type: MatchType,
    pub sku: Option<String>,
    pub product_name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub currency: Option<String>,
    pub packaging_type: Option<String>,
    pub height_cm: Option<f64>,
    pub width_cm: Option<f64>,
    pub depth_cm: Option<f64>,
    pub die_id: Option<String>,
    pub material: Option<String>,
    pub layout: Option<String>,
    pub finish: Option<String>,
    pub validity_days: Option<f64>,
    pub notes: Option<String>,
    /// 源文件行号（追溯用）
    pub source_row: usize,
    pub created_by: String,
}
