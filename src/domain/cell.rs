// ==========================================
// 包装 ERP - 单元格值
// ==========================================
// 表格单元格统一为三态标签值: 文本 / 数值 / 空
// 校验规则对其做穷尽匹配，不做隐式类型猜测
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// 从原始文本构造（TRIM，空白 → Empty）
    pub fn from_raw(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    /// 空值判定（空白文本同样视为空）
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }

    /// 文本视图（数值不返回）
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) if !s.trim().is_empty() => Some(s.trim()),
            CellValue::Text(_) | CellValue::Empty | CellValue::Number(_) => None,
        }
    }

    /// 数值视图
    ///
    /// - Number: 有限值才返回
    /// - Text: 解析为有限浮点数（允许千分位逗号）
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Number(_) | CellValue::Empty => None,
            CellValue::Text(s) => parse_finite(s),
        }
    }

    /// 渲染为展示/导出文本
    pub fn display(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::from_raw(value)
    }
}

impl From<Option<String>> for CellValue {
    fn from(value: Option<String>) -> Self {
        match value {
            Some(s) => CellValue::from_raw(&s),
            None => CellValue::Empty,
        }
    }
}

fn parse_finite(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized: String = trimmed.chars().filter(|c| *c != ',').collect();
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_trims_and_empties() {
        assert_eq!(CellValue::from_raw("  FARM-001 "), CellValue::Text("FARM-001".into()));
        assert_eq!(CellValue::from_raw("   "), CellValue::Empty);
    }

    #[test]
    fn test_as_number() {
        assert_eq!(CellValue::Text("95.5".into()).as_number(), Some(95.5));
        assert_eq!(CellValue::Text("1,250".into()).as_number(), Some(1250.0));
        assert_eq!(CellValue::Text("abc".into()).as_number(), None);
        assert_eq!(CellValue::Text("NaN".into()).as_number(), None);
        assert_eq!(CellValue::Text("inf".into()).as_number(), None);
        assert_eq!(CellValue::Number(f64::INFINITY).as_number(), None);
        assert_eq!(CellValue::Empty.as_number(), None);
    }

    #[test]
    fn test_display_integral_numbers_without_fraction() {
        assert_eq!(CellValue::Number(95.0).to_string(), "95");
        assert_eq!(CellValue::Number(27.2).to_string(), "27.2");
        assert_eq!(CellValue::Empty.to_string(), "");
    }
}
