// ==========================================
// 包装 ERP - 落库实体构造
// ==========================================
// 职责: 由已校验（并已匹配）的导入行构造落库实体
// 规则:
// - 可选字段缺失 → None（落库为 NULL，不省略）
// - 报价尺寸 mm → cm（保留两位小数）；刀模尺寸保持 mm
// ==========================================

use crate::domain::reference::columns as col;
use crate::domain::{ClientRecord, DielineRecord, ImportRow, QuotationRecord};
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

/// 行数据不足以构造实体（正常情况下已被校验拦截）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BuildError(pub String);

/// mm → cm（保留两位小数）
pub fn mm_to_cm(mm: f64) -> f64 {
    (mm / 10.0 * 100.0).round() / 100.0
}

/// 生成客户编码: CLI-<unix 微秒>-<6 位随机十六进制>
pub fn generate_client_code() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("CLI-{}-{}", Utc::now().timestamp_micros(), &suffix[..6])
}

fn required_text(row: &ImportRow, field: &str) -> Result<String, BuildError> {
    row.display(field)
        .ok_or_else(|| BuildError(format!("field '{}' is empty", field)))
}

fn required_number(row: &ImportRow, field: &str) -> Result<f64, BuildError> {
    row.number(field)
        .ok_or_else(|| BuildError(format!("field '{}' is not a number", field)))
}

/// 客户实体（客户变体）
pub fn build_client(row: &ImportRow, client_code: String) -> Result<ClientRecord, BuildError> {
    Ok(ClientRecord {
        client_code,
        name: required_text(row, col::NAME)?,
        rfc: row.display(col::RFC),
        email: row.display(col::EMAIL),
        phone: row.display(col::PHONE),
        city: row.display(col::CITY),
        client_type: row.display(col::CLIENT_TYPE),
        credit_days: row.number(col::CREDIT_DAYS),
        credit_limit: row.number(col::CREDIT_LIMIT),
        is_placeholder: false,
    })
}

/// 按引用自动创建的占位客户
pub fn build_placeholder_client(name: String, rfc: Option<String>) -> ClientRecord {
    ClientRecord::placeholder(generate_client_code(), name, rfc)
}

/// 刀模实体（尺寸 mm）
pub fn build_dieline(
    row: &ImportRow,
    client_id: Option<i64>,
) -> Result<DielineRecord, BuildError> {
    Ok(DielineRecord {
        sku: required_text(row, col::SKU)?,
        product_name: required_text(row, col::PRODUCT_NAME)?,
        height_mm: required_number(row, col::HEIGHT_MM)?,
        width_mm: required_number(row, col::WIDTH_MM)?,
        depth_mm: required_number(row, col::DEPTH_MM)?,
        die_id: row.display(col::DIE_ID),
        material: row.display(col::MATERIAL),
        layout: row.display(col::LAYOUT),
        client_id,
    })
}

/// 报价实体（尺寸 cm；技术字段取行生效值，即行自带值优先、匹配值补空）
pub fn build_quotation(
    row: &ImportRow,
    client_id: i64,
    created_by: &str,
) -> Result<QuotationRecord, BuildError> {
    Ok(QuotationRecord {
        client_id,
        dieline_id: row.resolved.technical_record_id,
        match_type: row.match_type,
        sku: row.display(col::SKU),
        product_name: required_text(row, col::PRODUCT_NAME)?,
        quantity: required_number(row, col::QUANTITY)?,
        unit_price: required_number(row, col::UNIT_PRICE)?,
        currency: row.display(col::CURRENCY),
        packaging_type: row.display(col::PACKAGING_TYPE),
        height_cm: row.number(col::HEIGHT_MM).map(mm_to_cm),
        width_cm: row.number(col::WIDTH_MM).map(mm_to_cm),
        depth_cm: row.number(col::DEPTH_MM).map(mm_to_cm),
        die_id: row.display(col::DIE_ID),
        material: row.display(col::MATERIAL),
        layout: row.display(col::LAYOUT),
        finish: row.display(col::FINISH),
        validity_days: row.number(col::VALIDITY_DAYS),
        notes: row.display(col::NOTES),
        source_row: row.row_index,
        created_by: created_by.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CellValue, FieldMap, MatchType};

    #[test]
    fn test_mm_to_cm_rounds_to_hundredths() {
        assert_eq!(mm_to_cm(95.0), 9.5);
        assert_eq!(mm_to_cm(95.5), 9.55);
        assert_eq!(mm_to_cm(0.04), 0.0);
    }

    #[test]
    fn test_client_code_shape() {
        let a = generate_client_code();
        let b = generate_client_code();
        assert!(a.starts_with("CLI-"));
        assert_eq!(a.rsplit('-').next().map(str::len), Some(6));
        assert_ne!(a, b);
    }

    #[test]
    fn test_quotation_uses_matched_values_and_nulls() {
        let mut row = ImportRow::new(4, FieldMap::new());
        row.typed_fields.insert("producto_nombre".into(), CellValue::from("Caja"));
        row.typed_fields.insert("cantidad".into(), CellValue::Number(500.0));
        row.typed_fields.insert("precio_unitario".into(), CellValue::Number(3.1));
        row.typed_fields.insert("alto_mm".into(), CellValue::Number(90.0));
        row.matched_fields.insert("alto_mm".into(), CellValue::Number(95.0));
        row.matched_fields.insert("ancho_mm".into(), CellValue::Number(45.0));
        row.resolved.technical_record_id = Some(9);
        row.match_type = MatchType::ExactKey;

        let quotation = build_quotation(&row, 1, "ana").unwrap();

        assert_eq!(quotation.height_cm, Some(9.0));
        assert_eq!(quotation.width_cm, Some(4.5));
        assert_eq!(quotation.depth_cm, None);
        assert_eq!(quotation.currency, None);
        assert_eq!(quotation.dieline_id, Some(9));
        assert_eq!(quotation.source_row, 4);
    }

    #[test]
    fn test_dieline_requires_dimensions() {
        let mut row = ImportRow::new(1, FieldMap::new());
        row.typed_fields.insert("sku".into(), CellValue::from("S-1"));
        row.typed_fields.insert("producto_nombre".into(), CellValue::from("Caja"));

        let err = build_dieline(&row, None).unwrap_err();
        assert!(err.0.contains("alto_mm"));
    }
}
