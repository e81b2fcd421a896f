// ==========================================
// 包装 ERP - 刀模匹配器（报价行 ↔ 技术档案）
// ==========================================
// 两级策略，先命中者胜，不打分:
// 1. 精确键: SKU 或产品名相等（不区分大小写）
// 2. 尺寸容差: 行自身提供三个尺寸，且三轴偏差均 ≤ 1.0 mm
// 合并策略:
// - 自动匹配: 只填补行中的空字段，行自带值优先
// - 人工指定: 尺寸字段以档案为准覆盖，其余字段仍只填空
// ==========================================

use crate::domain::reference::{columns as col, normalize_key};
use crate::domain::{
    CellValue, FieldMap, ImportRow, MatchType, MessageStage, RowMessage, Severity,
    TechnicalRecord,
};

/// 尺寸匹配容差（mm，含边界）
pub const DIMENSION_TOLERANCE_MM: f64 = 1.0;

// 浮点比较余量，保证恰好 1.0 mm 的偏差判定为命中
const TOLERANCE_EPSILON: f64 = 1e-9;

pub struct DielineMatcher<'a> {
    records: &'a [TechnicalRecord],
}

impl<'a> DielineMatcher<'a> {
    pub fn new(records: &'a [TechnicalRecord]) -> Self {
        Self { records }
    }

    /// 对全部行执行自动匹配（保持行顺序）
    pub fn match_all(&self, rows: &mut [ImportRow]) {
        for row in rows.iter_mut() {
            self.match_row(row);
        }
    }

    /// 自动匹配单行
    ///
    /// 人工指定的行保持不变；其余行每次从头计算，结果只取决于行自身值与档案集合
    pub fn match_row(&self, row: &mut ImportRow) {
        if row.match_type == MatchType::Manual {
            return;
        }

        row.clear_stage(MessageStage::Matching);
        row.matched_fields.clear();
        row.resolved.technical_record_id = None;
        row.match_type = MatchType::None;

        let found = self
            .find_exact(row)
            .map(|record| (record, MatchType::ExactKey))
            .or_else(|| {
                self.find_dimensional(row)
                    .map(|record| (record, MatchType::DimensionalTolerance))
            });

        match found {
            Some((record, match_type)) => {
                row.matched_fields = technical_field_map(record);
                row.resolved.technical_record_id = Some(record.dieline_id);
                row.match_type = match_type;
                row.push_message(RowMessage::new(
                    Severity::Info,
                    MessageStage::Matching,
                    None,
                    format!(
                        "matched technical record #{} ({}) by {}",
                        record.dieline_id,
                        record_label(record),
                        match_type
                    ),
                ));
            }
            None => {
                row.push_message(RowMessage::new(
                    Severity::Warning,
                    MessageStage::Matching,
                    None,
                    "no matching technical record found",
                ));
            }
        }
    }

    /// 人工指定技术档案
    ///
    /// 尺寸字段直接覆盖行值（并撤销这些字段的校验消息）；其他技术字段只填空
    pub fn assign_manual(row: &mut ImportRow, record: &TechnicalRecord) {
        row.clear_stage(MessageStage::Matching);
        row.matched_fields = technical_field_map(record);
        for (field, value) in col::DIMENSIONS.iter().zip(record.dimensions()) {
            row.typed_fields
                .insert((*field).to_string(), CellValue::Number(value));
            row.clear_field_messages(MessageStage::Validation, field);
        }
        row.resolved.technical_record_id = Some(record.dieline_id);
        row.match_type = MatchType::Manual;
        row.push_message(RowMessage::new(
            Severity::Info,
            MessageStage::Matching,
            None,
            format!(
                "technical record #{} ({}) assigned manually",
                record.dieline_id,
                record_label(record)
            ),
        ));
    }

    /// 第一级: SKU 或产品名精确匹配（只看行自身值）
    fn find_exact(&self, row: &ImportRow) -> Option<&'a TechnicalRecord> {
        let sku = own_text(row, col::SKU).map(|s| normalize_key(&s));
        let name = own_text(row, col::PRODUCT_NAME).map(|s| normalize_key(&s));
        if sku.is_none() && name.is_none() {
            return None;
        }

        self.records.iter().find(|record| {
            let sku_hit = match (&sku, &record.sku) {
                (Some(row_sku), Some(record_sku)) => normalize_key(record_sku) == *row_sku,
                _ => false,
            };
            let name_hit = name
                .as_ref()
                .is_some_and(|row_name| normalize_key(&record.product_name) == *row_name);
            sku_hit || name_hit
        })
    }

    /// 第二级: 三轴尺寸容差匹配（行必须自带三个尺寸）
    fn find_dimensional(&self, row: &ImportRow) -> Option<&'a TechnicalRecord> {
        let mut dims = [0.0_f64; 3];
        for (slot, field) in dims.iter_mut().zip(col::DIMENSIONS) {
            *slot = row.typed_fields.get(field).and_then(CellValue::as_number)?;
        }

        self.records.iter().find(|record| {
            record
                .dimensions()
                .iter()
                .zip(dims.iter())
                .all(|(a, b)| within_tolerance(*a, *b))
        })
    }
}

/// 含边界的容差判定
pub fn within_tolerance(a: f64, b: f64) -> bool {
    (a - b).abs() <= DIMENSION_TOLERANCE_MM + TOLERANCE_EPSILON
}

fn own_text(row: &ImportRow, field: &str) -> Option<String> {
    row.typed_fields
        .get(field)
        .filter(|v| !v.is_empty())
        .map(CellValue::display)
}

fn technical_field_map(record: &TechnicalRecord) -> FieldMap {
    record
        .technical_fields()
        .into_iter()
        .filter(|(_, value)| !value.is_empty())
        .map(|(field, value)| (field.to_string(), value))
        .collect()
}

fn record_label(record: &TechnicalRecord) -> &str {
    record.sku.as_deref().unwrap_or(&record.product_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RowStatus;

    fn record(id: i64, sku: Option<&str>, name: &str, dims: [f64; 3]) -> TechnicalRecord {
        TechnicalRecord {
            dieline_id: id,
            sku: sku.map(str::to_string),
            product_name: name.to_string(),
            height_mm: dims[0],
            width_mm: dims[1],
            depth_mm: dims[2],
            die_id: Some(format!("TRQ-{}", id)),
            material: Some("sulfatada".to_string()),
            layout: None,
        }
    }

    fn row(fields: &[(&str, CellValue)]) -> ImportRow {
        let mut row = ImportRow::new(1, FieldMap::new());
        for (k, v) in fields {
            if !v.is_empty() {
                row.typed_fields.insert(k.to_string(), v.clone());
            }
        }
        row
    }

    fn dims_row(sku: &str, dims: [f64; 3]) -> ImportRow {
        row(&[
            ("sku", CellValue::from(sku)),
            ("producto_nombre", CellValue::from("Caja genérica")),
            ("alto_mm", CellValue::Number(dims[0])),
            ("ancho_mm", CellValue::Number(dims[1])),
            ("profundidad_mm", CellValue::Number(dims[2])),
        ])
    }

    #[test]
    fn test_exact_sku_match_fills_empty_dimensions() {
        let records = vec![record(1, Some("FARM-001"), "Caja medicamento", [95.0, 45.0, 28.0])];
        let matcher = DielineMatcher::new(&records);
        let mut r = row(&[
            ("sku", CellValue::from("FARM-001")),
            ("alto_mm", CellValue::Empty),
            ("ancho_mm", CellValue::Empty),
            ("profundidad_mm", CellValue::Empty),
        ]);

        matcher.match_row(&mut r);

        assert_eq!(r.match_type, MatchType::ExactKey);
        assert_eq!(r.number("alto_mm"), Some(95.0));
        assert_eq!(r.number("ancho_mm"), Some(45.0));
        assert_eq!(r.number("profundidad_mm"), Some(28.0));
        assert_eq!(r.resolved.technical_record_id, Some(1));
    }

    #[test]
    fn test_exact_match_by_product_name_keeps_row_values() {
        let records = vec![record(1, None, "Caja Medicamento", [95.0, 45.0, 28.0])];
        let matcher = DielineMatcher::new(&records);
        let mut r = row(&[
            ("producto_nombre", CellValue::from("caja medicamento")),
            ("alto_mm", CellValue::Number(90.0)),
        ]);

        matcher.match_row(&mut r);

        assert_eq!(r.match_type, MatchType::ExactKey);
        assert_eq!(r.number("alto_mm"), Some(90.0));
        assert_eq!(r.number("ancho_mm"), Some(45.0));
        assert_eq!(r.text("troquel_id"), Some("TRQ-1"));
    }

    #[test]
    fn test_dimensional_match_within_tolerance() {
        let records = vec![record(2, Some("OTRO"), "Otra caja", [95.5, 45.0, 27.2])];
        let matcher = DielineMatcher::new(&records);
        let mut r = dims_row("X", [95.0, 45.0, 28.0]);

        matcher.match_row(&mut r);

        assert_eq!(r.match_type, MatchType::DimensionalTolerance);
        assert_eq!(r.number("alto_mm"), Some(95.0));
        assert_eq!(r.status(), RowStatus::Valid);
    }

    #[test]
    fn test_dimensional_miss_beyond_tolerance_is_warning() {
        let records = vec![record(2, Some("OTRO"), "Otra caja", [96.2, 45.0, 27.2])];
        let matcher = DielineMatcher::new(&records);
        let mut r = dims_row("X", [95.0, 45.0, 28.0]);

        matcher.match_row(&mut r);

        assert_eq!(r.match_type, MatchType::None);
        assert_eq!(r.status(), RowStatus::Warning);
        assert!(r.matched_fields.is_empty());
    }

    #[test]
    fn test_tolerance_boundary_inclusive() {
        let matcher_records = vec![record(2, None, "Otra", [96.0, 45.0, 28.0])];
        let matcher = DielineMatcher::new(&matcher_records);
        let mut on_edge = dims_row("X", [95.0, 45.0, 28.0]);
        matcher.match_row(&mut on_edge);
        assert_eq!(on_edge.match_type, MatchType::DimensionalTolerance);

        let beyond_records = vec![record(2, None, "Otra", [96.1, 45.0, 28.0])];
        let matcher = DielineMatcher::new(&beyond_records);
        let mut beyond = dims_row("X", [95.0, 45.0, 28.0]);
        matcher.match_row(&mut beyond);
        assert_eq!(beyond.match_type, MatchType::None);
    }

    #[test]
    fn test_dimensional_pass_requires_all_three_dimensions() {
        let records = vec![record(2, None, "Otra", [95.0, 45.0, 28.0])];
        let matcher = DielineMatcher::new(&records);
        let mut r = row(&[
            ("sku", CellValue::from("X")),
            ("alto_mm", CellValue::Number(95.0)),
            ("ancho_mm", CellValue::Number(45.0)),
        ]);

        matcher.match_row(&mut r);
        assert_eq!(r.match_type, MatchType::None);
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let records = vec![
            record(1, Some("FARM-001"), "Caja medicamento", [95.0, 45.0, 28.0]),
            record(2, None, "Otra", [120.0, 60.0, 30.0]),
        ];
        let matcher = DielineMatcher::new(&records);
        let mut rows = vec![
            row(&[("sku", CellValue::from("farm-001"))]),
            dims_row("Y", [120.4, 59.5, 30.0]),
        ];

        matcher.match_all(&mut rows);
        let first = rows.clone();
        matcher.match_all(&mut rows);

        assert_eq!(rows, first);
    }

    #[test]
    fn test_manual_assignment_overwrites_dimensions_only() {
        let records = vec![record(5, Some("FARM-005"), "Exhibidor", [300.0, 200.0, 150.0])];
        let matcher = DielineMatcher::new(&records);
        let mut r = row(&[
            ("sku", CellValue::from("SIN-MATCH")),
            ("alto_mm", CellValue::Number(10.0)),
            ("material", CellValue::from("kraft")),
        ]);

        DielineMatcher::assign_manual(&mut r, &records[0]);

        assert_eq!(r.match_type, MatchType::Manual);
        assert_eq!(r.number("alto_mm"), Some(300.0));
        assert_eq!(r.number("profundidad_mm"), Some(150.0));
        assert_eq!(r.text("material"), Some("kraft"));
        assert_eq!(r.text("troquel_id"), Some("TRQ-5"));

        // 自动匹配不改动人工指定
        matcher.match_row(&mut r);
        assert_eq!(r.match_type, MatchType::Manual);
        assert_eq!(r.resolved.technical_record_id, Some(5));
    }
}
