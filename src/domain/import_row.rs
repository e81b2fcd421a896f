// ==========================================
// 包装 ERP - 导入行
// ==========================================
// 用途: 导入管道中间产物（解析 → 校验 → 解析引用 → 匹配）
// 生命周期: 仅在一次导入会话内，会话结束即丢弃
// 红线: status 由 messages 推导，不单独存储
// ==========================================

use crate::domain::cell::CellValue;
use crate::domain::types::{MatchType, MessageStage, RowStatus, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 列名 → 单元格值
pub type FieldMap = BTreeMap<String, CellValue>;

// ==========================================
// RawRecord - 文件解析输出
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// 数据行序号（从 1 开始，不含表头）
    pub row_index: usize,
    /// 原始单元格（已 TRIM）
    pub cells: FieldMap,
}

// ==========================================
// RowMessage - 行级消息
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowMessage {
    pub severity: Severity,
    pub stage: MessageStage,
    pub field: Option<String>,
    pub text: String,
}

impl RowMessage {
    pub fn new(
        severity: Severity,
        stage: MessageStage,
        field: Option<&str>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            stage,
            field: field.map(str::to_string),
            text: text.into(),
        }
    }
}

// ==========================================
// ResolvedReferences - 已解析的引用
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReferences {
    /// 已存在客户 ID
    pub client_id: Option<i64>,
    /// 客户未找到，导入时将创建（自然键已规范化）
    pub client_to_create: Option<String>,
    /// 匹配到的刀模 ID
    pub technical_record_id: Option<i64>,
    /// 同业务键的已存在记录（客户/刀模变体的原地更新目标）
    pub existing_entity_id: Option<i64>,
}

// ==========================================
// ImportRow
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    pub row_index: usize,
    /// 原始单元格（包括未识别列）
    pub raw_fields: FieldMap,
    /// 校验/类型转换后的值（仅识别列；数值列为 Number，枚举列为规范写法）
    pub typed_fields: FieldMap,
    /// 自动匹配补入的刀模字段（只填补 typed_fields 中的空值）
    pub matched_fields: FieldMap,
    pub resolved: ResolvedReferences,
    pub match_type: MatchType,
    messages: Vec<RowMessage>,
}

impl ImportRow {
    pub fn new(row_index: usize, raw_fields: FieldMap) -> Self {
        Self {
            row_index,
            raw_fields,
            typed_fields: FieldMap::new(),
            matched_fields: FieldMap::new(),
            resolved: ResolvedReferences::default(),
            match_type: MatchType::None,
            messages: Vec::new(),
        }
    }

    /// 行状态（由消息推导）
    pub fn status(&self) -> RowStatus {
        status_of(&self.messages)
    }

    pub fn messages(&self) -> &[RowMessage] {
        &self.messages
    }

    pub(crate) fn push_message(&mut self, message: RowMessage) {
        self.messages.push(message);
    }

    /// 移除某阶段此前产生的消息（阶段重跑前调用）
    pub(crate) fn clear_stage(&mut self, stage: MessageStage) {
        self.messages.retain(|m| m.stage != stage);
    }

    /// 移除某阶段针对某字段的消息（字段值被覆盖后旧消息失效）
    pub(crate) fn clear_field_messages(&mut self, stage: MessageStage, field: &str) {
        self.messages
            .retain(|m| m.stage != stage || m.field.as_deref() != Some(field));
    }

    /// 生效值: 行自身非空值优先，其次为匹配补入值
    pub fn value(&self, field: &str) -> Option<&CellValue> {
        self.typed_fields
            .get(field)
            .filter(|v| !v.is_empty())
            .or_else(|| self.matched_fields.get(field).filter(|v| !v.is_empty()))
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.value(field).and_then(CellValue::as_text)
    }

    pub fn number(&self, field: &str) -> Option<f64> {
        self.value(field).and_then(CellValue::as_number)
    }

    /// 生效值的展示文本（数值也转为文本）
    pub fn display(&self, field: &str) -> Option<String> {
        self.value(field).map(CellValue::display)
    }

    /// 拼接消息（错误报告用）
    pub fn joined_messages(&self) -> String {
        join_messages(&self.messages)
    }
}

/// 消息拼接格式: "[级别] 文本; [级别] 文本"
pub fn join_messages(messages: &[RowMessage]) -> String {
    messages
        .iter()
        .map(|m| format!("[{}] {}", m.severity, m.text))
        .collect::<Vec<_>>()
        .join("; ")
}

/// 状态推导: 存在 error → Error；否则存在 warning → Warning；否则 Valid
pub fn status_of(messages: &[RowMessage]) -> RowStatus {
    if messages.iter().any(|m| m.severity == Severity::Error) {
        RowStatus::Error
    } else if messages.iter().any(|m| m.severity == Severity::Warning) {
        RowStatus::Warning
    } else {
        RowStatus::Valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(severity: Severity) -> RowMessage {
        RowMessage::new(severity, MessageStage::Validation, None, "m")
    }

    #[test]
    fn test_status_derived_from_messages() {
        let mut row = ImportRow::new(1, FieldMap::new());
        assert_eq!(row.status(), RowStatus::Valid);

        row.push_message(message(Severity::Info));
        assert_eq!(row.status(), RowStatus::Valid);

        row.push_message(message(Severity::Warning));
        assert_eq!(row.status(), RowStatus::Warning);

        row.push_message(message(Severity::Error));
        assert_eq!(row.status(), RowStatus::Error);

        row.clear_stage(MessageStage::Validation);
        assert_eq!(row.status(), RowStatus::Valid);
    }

    #[test]
    fn test_value_prefers_row_supplied() {
        let mut row = ImportRow::new(1, FieldMap::new());
        row.typed_fields.insert("alto_mm".into(), CellValue::Number(90.0));
        row.typed_fields.insert("ancho_mm".into(), CellValue::Empty);
        row.matched_fields.insert("alto_mm".into(), CellValue::Number(95.0));
        row.matched_fields.insert("ancho_mm".into(), CellValue::Number(45.0));

        assert_eq!(row.number("alto_mm"), Some(90.0));
        assert_eq!(row.number("ancho_mm"), Some(45.0));
        assert_eq!(row.number("profundidad_mm"), None);
    }
}
