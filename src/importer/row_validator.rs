// ==========================================
// 包装 ERP - 行校验器
// ==========================================
// 职责: 按变体规则表校验原始行，生成 typed_fields 与校验消息
// 红线: 规则之间不短路，所有违规收集完毕后再由消息推导状态
// ==========================================

use crate::domain::{CellValue, ImportRow, ImportVariant, MessageStage, RawRecord, RowMessage, Severity};
use crate::importer::field_rules::{schema_for, FieldRule, Rule, VariantSchema};

pub struct RowValidator {
    schema: &'static VariantSchema,
    /// 表头中缺失的必填列
    missing_required: Vec<&'static str>,
}

impl RowValidator {
    /// 创建校验器
    ///
    /// # 参数
    /// - variant: 导入变体
    /// - headers: 文件表头（用于检测缺失的必填列）
    pub fn new(variant: ImportVariant, headers: &[String]) -> Self {
        let schema = schema_for(variant);
        let missing_required = schema
            .required_fields()
            .filter(|field| !headers.iter().any(|h| h == field))
            .collect();

        Self {
            schema,
            missing_required,
        }
    }

    pub fn missing_required_columns(&self) -> &[&'static str] {
        &self.missing_required
    }

    /// 从原始记录构造导入行并完成校验
    pub fn build_row(&self, record: RawRecord) -> ImportRow {
        let mut row = ImportRow::new(record.row_index, record.cells);
        self.validate(&mut row);
        row
    }

    /// 重新校验（替换此前的校验消息与 typed_fields）
    pub fn validate(&self, row: &mut ImportRow) {
        row.clear_stage(MessageStage::Validation);
        row.typed_fields.clear();

        for &missing in &self.missing_required {
            row.push_message(RowMessage::new(
                Severity::Error,
                MessageStage::Validation,
                Some(missing),
                format!("required column '{}' is missing from the file", missing),
            ));
        }

        for field_rule in self.schema.fields {
            let value = row
                .raw_fields
                .get(field_rule.field)
                .cloned()
                .unwrap_or_default();
            self.apply_rules(row, field_rule, &value);
        }
    }

    fn apply_rules(&self, row: &mut ImportRow, field_rule: &FieldRule, value: &CellValue) {
        let field = field_rule.field;
        let column_missing = self.missing_required.contains(&field);
        let mut typed: Option<CellValue> = (!value.is_empty()).then(|| {
            if field_rule.is_numeric() {
                value.clone()
            } else {
                // 非数值列统一按文本处理（如 Excel 中纯数字 SKU）
                CellValue::Text(value.display())
            }
        });

        for rule in field_rule.rules {
            match rule {
                Rule::Required => {
                    if value.is_empty() && !column_missing {
                        row.push_message(RowMessage::new(
                            Severity::Error,
                            MessageStage::Validation,
                            Some(field),
                            format!("required field '{}' is empty", field),
                        ));
                    }
                }
                Rule::Numeric => {
                    if value.is_empty() {
                        continue;
                    }
                    match value.as_number() {
                        Some(number) => typed = Some(CellValue::Number(number)),
                        None => {
                            typed = None;
                            row.push_message(RowMessage::new(
                                Severity::Error,
                                MessageStage::Validation,
                                Some(field),
                                format!("'{}' must be a number (got '{}')", field, value),
                            ));
                        }
                    }
                }
                Rule::Enum {
                    allowed,
                    case_insensitive,
                    severity,
                } => {
                    if value.is_empty() {
                        continue;
                    }
                    let raw = value.display();
                    let canonical = allowed.iter().find(|candidate| {
                        if *case_insensitive {
                            candidate.eq_ignore_ascii_case(raw.trim())
                        } else {
                            **candidate == raw.trim()
                        }
                    });
                    match canonical {
                        Some(canonical) => typed = Some(CellValue::Text((*canonical).to_string())),
                        None => {
                            // 不在允许集合内的值不进入 typed_fields（落库为 NULL）
                            typed = None;
                            row.push_message(RowMessage::new(
                                *severity,
                                MessageStage::Validation,
                                Some(field),
                                format!(
                                    "'{}' is not an allowed value for '{}' (allowed: {})",
                                    raw,
                                    field,
                                    allowed.join(", ")
                                ),
                            ));
                        }
                    }
                }
            }
        }

        if let Some(typed) = typed {
            row.typed_fields.insert(field.to_string(), typed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldMap, RowStatus};

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn record(row_index: usize, cells: &[(&str, &str)]) -> RawRecord {
        let mut map = FieldMap::new();
        for (k, v) in cells {
            map.insert(k.to_string(), CellValue::from_raw(v));
        }
        RawRecord { row_index, cells: map }
    }

    fn quotation_headers() -> Vec<String> {
        headers(&[
            "cliente_nombre",
            "producto_nombre",
            "cantidad",
            "precio_unitario",
            "moneda",
            "alto_mm",
        ])
    }

    #[test]
    fn test_valid_quotation_row_is_typed() {
        let validator = RowValidator::new(ImportVariant::Quotations, &quotation_headers());
        let row = validator.build_row(record(
            1,
            &[
                ("cliente_nombre", "Farmacias del Norte"),
                ("producto_nombre", "Caja plegadiza"),
                ("cantidad", "1,000"),
                ("precio_unitario", "2.35"),
                ("moneda", "usd"),
                ("alto_mm", ""),
                ("columna_extra", "ignorada"),
            ],
        ));

        assert_eq!(row.status(), RowStatus::Valid);
        assert_eq!(row.number("cantidad"), Some(1000.0));
        assert_eq!(row.text("moneda"), Some("USD"));
        assert!(!row.typed_fields.contains_key("alto_mm"));
        assert!(!row.typed_fields.contains_key("columna_extra"));
    }

    #[test]
    fn test_missing_client_name_is_error() {
        let validator = RowValidator::new(ImportVariant::Quotations, &quotation_headers());
        let row = validator.build_row(record(
            3,
            &[
                ("cliente_nombre", "  "),
                ("producto_nombre", "Caja"),
                ("cantidad", "10"),
                ("precio_unitario", "1"),
            ],
        ));

        assert_eq!(row.status(), RowStatus::Error);
        assert!(row
            .messages()
            .iter()
            .any(|m| m.field.as_deref() == Some("cliente_nombre")));
    }

    #[test]
    fn test_all_rules_run_without_short_circuit() {
        let validator = RowValidator::new(ImportVariant::Quotations, &quotation_headers());
        let row = validator.build_row(record(
            1,
            &[
                ("cliente_nombre", ""),
                ("producto_nombre", ""),
                ("cantidad", "mil"),
                ("precio_unitario", "NaN"),
                ("moneda", "yen"),
            ],
        ));

        let errors = row
            .messages()
            .iter()
            .filter(|m| m.severity == Severity::Error)
            .count();
        let warnings = row
            .messages()
            .iter()
            .filter(|m| m.severity == Severity::Warning)
            .count();
        assert_eq!(errors, 4);
        assert_eq!(warnings, 1);
        assert!(!row.typed_fields.contains_key("moneda"));
    }

    #[test]
    fn test_enum_mismatch_severity_per_variant() {
        let validator = RowValidator::new(ImportVariant::Clients, &headers(&["nombre", "tipo_cliente"]));
        let row = validator.build_row(record(
            1,
            &[("nombre", "Dulces Lupita"), ("tipo_cliente", "Mayorista")],
        ));
        // 客户类型区分大小写且为阻断级
        assert_eq!(row.status(), RowStatus::Error);

        let validator = RowValidator::new(
            ImportVariant::Dielines,
            &headers(&["sku", "producto_nombre", "alto_mm", "ancho_mm", "profundidad_mm", "material"]),
        );
        let row = validator.build_row(record(
            1,
            &[
                ("sku", "FARM-001"),
                ("producto_nombre", "Caja"),
                ("alto_mm", "95"),
                ("ancho_mm", "45"),
                ("profundidad_mm", "28"),
                ("material", "KRAFT"),
            ],
        ));
        assert_eq!(row.status(), RowStatus::Valid);
        assert_eq!(row.text("material"), Some("kraft"));
    }

    #[test]
    fn test_missing_required_column_flags_every_row() {
        let validator = RowValidator::new(
            ImportVariant::Quotations,
            &headers(&["producto_nombre", "cantidad", "precio_unitario"]),
        );
        assert_eq!(validator.missing_required_columns(), &["cliente_nombre"]);

        for index in 1..=3 {
            let row = validator.build_row(record(
                index,
                &[("producto_nombre", "Caja"), ("cantidad", "1"), ("precio_unitario", "1")],
            ));
            assert_eq!(row.status(), RowStatus::Error);
            assert_eq!(row.messages().len(), 1);
        }
    }

    #[test]
    fn test_revalidation_is_idempotent() {
        let validator = RowValidator::new(ImportVariant::Quotations, &quotation_headers());
        let mut row = validator.build_row(record(1, &[("cantidad", "x")]));
        let first = row.messages().to_vec();

        validator.validate(&mut row);
        assert_eq!(row.messages(), first.as_slice());
    }
}
