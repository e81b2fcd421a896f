// ==========================================
// 包装 ERP - 银行流水解析
// ==========================================
// 列: fecha（必填，YYYY-MM-DD 或 DD/MM/YYYY）
//     monto（必填，带符号；正数入账）
//     descripcion / referencia（可选）
// 红线: 坏行只拒绝该行，不中断解析
// ==========================================

use crate::domain::{BankStatementLine, CellValue, RawRecord, RejectedStatementRow};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{ParsedSheet, UniversalFileParser};
use chrono::NaiveDate;
use std::path::Path;
use tracing::{debug, info};

pub mod columns {
    pub const DATE: &str = "fecha";
    pub const AMOUNT: &str = "monto";
    pub const DESCRIPTION: &str = "descripcion";
    pub const REFERENCE: &str = "referencia";
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];

/// 解析结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedStatement {
    pub lines: Vec<BankStatementLine>,
    pub rejected: Vec<RejectedStatementRow>,
}

/// 读取流水文件
///
/// # 返回
/// - Err: 仅格式错误（扩展名不支持/文件不可读）或缺少必填列
pub fn parse_statement_file<P: AsRef<Path>>(file_path: P) -> ImportResult<ParsedStatement> {
    let sheet = UniversalFileParser.parse(file_path)?;
    parse_statement(sheet)
}

/// 由已解析表格构建流水行
pub fn parse_statement(sheet: ParsedSheet) -> ImportResult<ParsedStatement> {
    let missing: Vec<&str> = [columns::DATE, columns::AMOUNT]
        .into_iter()
        .filter(|c| !sheet.has_column(c))
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing.join(", ")));
    }

    let mut parsed = ParsedStatement::default();
    for record in sheet.records {
        match parse_line(&record) {
            Ok(line) => parsed.lines.push(line),
            Err(messages) => {
                debug!(row_index = record.row_index, ?messages, "流水行被拒绝");
                parsed.rejected.push(RejectedStatementRow {
                    row_index: record.row_index,
                    messages,
                });
            }
        }
    }

    info!(
        lines = parsed.lines.len(),
        rejected = parsed.rejected.len(),
        "银行流水解析完成"
    );
    Ok(parsed)
}

fn parse_line(record: &RawRecord) -> Result<BankStatementLine, Vec<String>> {
    let cell = |name: &str| record.cells.get(name).cloned().unwrap_or_default();
    let mut messages = Vec::new();

    let date = match cell(columns::DATE) {
        CellValue::Empty => {
            messages.push(format!("required field '{}' is empty", columns::DATE));
            None
        }
        value => {
            let parsed = parse_date(&value.display());
            if parsed.is_none() {
                messages.push(format!(
                    "'{}' is not a valid date (expected YYYY-MM-DD or DD/MM/YYYY)",
                    value
                ));
            }
            parsed
        }
    };

    let amount_cell = cell(columns::AMOUNT);
    let amount = amount_cell.as_number();
    if amount_cell.is_empty() {
        messages.push(format!("required field '{}' is empty", columns::AMOUNT));
    } else if amount.is_none() {
        messages.push(format!("'{}' is not a valid amount", amount_cell));
    }

    match (date, amount) {
        (Some(date), Some(amount)) if messages.is_empty() => Ok(BankStatementLine {
            row_index: record.row_index,
            date,
            description: non_empty(cell(columns::DESCRIPTION)),
            amount,
            reference: non_empty(cell(columns::REFERENCE)),
        }),
        _ => Err(messages),
    }
}

/// 支持 YYYY-MM-DD 与 DD/MM/YYYY
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
}

fn non_empty(value: CellValue) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldMap;

    fn sheet(rows: &[[&str; 4]]) -> ParsedSheet {
        let headers = ["fecha", "monto", "descripcion", "referencia"];
        ParsedSheet {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            records: rows
                .iter()
                .enumerate()
                .map(|(i, cells)| {
                    let mut map = FieldMap::new();
                    for (h, v) in headers.iter().zip(cells.iter()) {
                        map.insert(h.to_string(), CellValue::from_raw(v));
                    }
                    RawRecord {
                        row_index: i + 1,
                        cells: map,
                    }
                })
                .collect(),
        }
    }

    #[test]
    fn test_both_date_formats() {
        assert_eq!(parse_date("2026-03-05"), NaiveDate::from_ymd_opt(2026, 3, 5));
        assert_eq!(parse_date("05/03/2026"), NaiveDate::from_ymd_opt(2026, 3, 5));
        assert_eq!(parse_date("03-05-2026"), None);
    }

    #[test]
    fn test_bad_rows_are_rejected_not_fatal() {
        let parsed = parse_statement(sheet(&[
            ["2026-03-05", "1500.00", "SPEI Farmacias", "FAC-100"],
            ["", "20", "", ""],
            ["31/02/2026", "abc", "", ""],
            ["06/03/2026", "-320.5", "Proveedor cartón", ""],
        ]))
        .unwrap();

        assert_eq!(parsed.lines.len(), 2);
        assert_eq!(parsed.lines[0].reference.as_deref(), Some("FAC-100"));
        assert_eq!(parsed.lines[1].amount, -320.5);
        assert_eq!(parsed.lines[1].reference, None);

        assert_eq!(parsed.rejected.len(), 2);
        assert_eq!(parsed.rejected[0].row_index, 2);
        assert_eq!(parsed.rejected[1].messages.len(), 2);
    }

    #[test]
    fn test_missing_amount_column_fails() {
        let sheet = ParsedSheet {
            headers: vec!["fecha".into()],
            records: vec![],
        };
        assert!(matches!(
            parse_statement(sheet),
            Err(ImportError::MissingColumns(c)) if c == "monto"
        ));
    }
}
