// ==========================================
// 包装 ERP - 参考实体投影
// ==========================================
// 用途: 导入会话开始时一次性加载，会话内只读
// 说明: 新实体通过仓储创建，不回写本地快照
// ==========================================

use crate::domain::cell::CellValue;
use serde::{Deserialize, Serialize};

/// 表格列名（报价/刀模共用）
pub mod columns {
    pub const SKU: &str = "sku";
    pub const PRODUCT_NAME: &str = "producto_nombre";
    pub const HEIGHT_MM: &str = "alto_mm";
    pub const WIDTH_MM: &str = "ancho_mm";
    pub const DEPTH_MM: &str = "profundidad_mm";
    pub const DIE_ID: &str = "troquel_id";
    pub const MATERIAL: &str = "material";
    pub const LAYOUT: &str = "montaje";
    pub const CLIENT_NAME: &str = "cliente_nombre";
    pub const CLIENT_RFC: &str = "cliente_rfc";

    // 报价
    pub const QUANTITY: &str = "cantidad";
    pub const UNIT_PRICE: &str = "precio_unitario";
    pub const VALIDITY_DAYS: &str = "vigencia_dias";
    pub const CURRENCY: &str = "moneda";
    pub const PACKAGING_TYPE: &str = "tipo_empaque";
    pub const FINISH: &str = "acabado";
    pub const NOTES: &str = "notas";

    // 客户
    pub const NAME: &str = "nombre";
    pub const RFC: &str = "rfc";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "telefono";
    pub const CITY: &str = "ciudad";
    pub const CLIENT_TYPE: &str = "tipo_cliente";
    pub const CREDIT_DAYS: &str = "dias_credito";
    pub const CREDIT_LIMIT: &str = "limite_credito";

    /// 三个尺寸轴（高/宽/深）
    pub const DIMENSIONS: [&str; 3] = [HEIGHT_MM, WIDTH_MM, DEPTH_MM];
}

// ==========================================
// ClientRef - 客户投影
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRef {
    pub client_id: i64,
    pub client_code: String,
    pub name: String,
    pub rfc: Option<String>,
}

// ==========================================
// TechnicalRecord - 刀模/技术档案投影
// ==========================================
// 尺寸单位: mm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalRecord {
    pub dieline_id: i64,
    pub sku: Option<String>,
    pub product_name: String,
    pub height_mm: f64,
    pub width_mm: f64,
    pub depth_mm: f64,
    pub die_id: Option<String>,
    pub material: Option<String>,
    pub layout: Option<String>,
}

impl TechnicalRecord {
    /// 尺寸（与 columns::DIMENSIONS 顺序一致）
    pub fn dimensions(&self) -> [f64; 3] {
        [self.height_mm, self.width_mm, self.depth_mm]
    }

    /// 可并入报价行的技术字段（列名, 值）
    pub fn technical_fields(&self) -> Vec<(&'static str, CellValue)> {
        vec![
            (columns::HEIGHT_MM, CellValue::Number(self.height_mm)),
            (columns::WIDTH_MM, CellValue::Number(self.width_mm)),
            (columns::DEPTH_MM, CellValue::Number(self.depth_mm)),
            (columns::DIE_ID, CellValue::from(self.die_id.clone())),
            (columns::MATERIAL, CellValue::from(self.material.clone())),
            (columns::LAYOUT, CellValue::from(self.layout.clone())),
        ]
    }
}

// ==========================================
// ReferenceSnapshot - 会话级参考数据快照
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSnapshot {
    pub clients: Vec<ClientRef>,
    pub dielines: Vec<TechnicalRecord>,
}

impl ReferenceSnapshot {
    pub fn new(clients: Vec<ClientRef>, dielines: Vec<TechnicalRecord>) -> Self {
        Self { clients, dielines }
    }

    pub fn find_dieline(&self, dieline_id: i64) -> Option<&TechnicalRecord> {
        self.dielines.iter().find(|d| d.dieline_id == dieline_id)
    }

    /// 按 SKU 查找刀模（不区分大小写）
    pub fn find_dieline_by_sku(&self, sku: &str) -> Option<&TechnicalRecord> {
        let key = normalize_key(sku);
        if key.is_empty() {
            return None;
        }
        self.dielines
            .iter()
            .find(|d| d.sku.as_deref().map(normalize_key).as_deref() == Some(key.as_str()))
    }

    /// 客户查找: 先按名称，再按 RFC（均为 TRIM 后不区分大小写的精确比较）
    pub fn find_client(&self, name: Option<&str>, rfc: Option<&str>) -> Option<&ClientRef> {
        let by_name = name.map(normalize_key).filter(|k| !k.is_empty()).and_then(|key| {
            self.clients
                .iter()
                .find(|c| normalize_key(&c.name) == key)
        });

        by_name.or_else(|| {
            let key = rfc.map(normalize_key).filter(|k| !k.is_empty())?;
            self.clients
                .iter()
                .find(|c| c.rfc.as_deref().map(normalize_key).as_deref() == Some(key.as_str()))
        })
    }
}

/// 自然键规范化（TRIM + 小写），用于不区分大小写比较及会话缓存键
pub fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}
