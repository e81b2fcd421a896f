// ==========================================
// 包装 ERP - 错误报告与导入模板导出
// ==========================================
// 输出格式由目标文件扩展名决定: .xlsx（rust_xlsxwriter）/ .csv（csv）
// 其他扩展名 → UnsupportedFormat
// ==========================================

use crate::domain::import_row::join_messages;
use crate::domain::{ErrorReportRow, ImportRow, ImportVariant, RowStatus};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_rules::schema_for;
use rust_xlsxwriter::{Format, Workbook};
use std::path::Path;
use tracing::info;

const ROW_HEADER: &str = "fila";
const MESSAGES_HEADER: &str = "mensajes";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Xlsx,
    Csv,
}

fn output_format(path: &Path) -> ImportResult<OutputFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "xlsx" => Ok(OutputFormat::Xlsx),
        "csv" => Ok(OutputFormat::Csv),
        _ => Err(ImportError::UnsupportedFormat(ext)),
    }
}

/// 收集 error 状态行（保持文件顺序）
pub fn collect_error_rows(variant: ImportVariant, rows: &[ImportRow]) -> Vec<ErrorReportRow> {
    let schema = schema_for(variant);
    rows.iter()
        .filter(|row| row.status() == RowStatus::Error)
        .map(|row| ErrorReportRow {
            row_index: row.row_index,
            key_fields: schema
                .key_columns
                .iter()
                .map(|column| {
                    let value = row
                        .raw_fields
                        .get(*column)
                        .map(|v| v.display())
                        .unwrap_or_default();
                    (column.to_string(), value)
                })
                .collect(),
            messages: row.messages().to_vec(),
        })
        .collect()
}

fn report_table(variant: ImportVariant, rows: &[ImportRow]) -> (Vec<String>, Vec<Vec<String>>) {
    let schema = schema_for(variant);
    let mut headers = vec![ROW_HEADER.to_string()];
    headers.extend(schema.key_columns.iter().map(|c| c.to_string()));
    headers.push(MESSAGES_HEADER.to_string());

    let body = collect_error_rows(variant, rows)
        .into_iter()
        .map(|report_row| {
            let mut line = vec![report_row.row_index.to_string()];
            line.extend(report_row.key_fields.into_iter().map(|(_, value)| value));
            line.push(join_messages(&report_row.messages));
            line
        })
        .collect();

    (headers, body)
}

/// 导出错误报告
///
/// # 返回
/// - Ok(usize): 写入的错误行数
pub fn write_error_report(
    variant: ImportVariant,
    rows: &[ImportRow],
    output: &Path,
) -> ImportResult<usize> {
    let format = output_format(output)?;
    let (headers, body) = report_table(variant, rows);

    match format {
        OutputFormat::Xlsx => write_xlsx(output, "Errores", &headers, &body)?,
        OutputFormat::Csv => write_csv(output, &headers, &body)?,
    }

    info!(
        variant = %variant,
        error_rows = body.len(),
        output = %output.display(),
        "错误报告已导出"
    );
    Ok(body.len())
}

/// 导出导入模板（仅表头）
pub fn write_template(variant: ImportVariant, output: &Path) -> ImportResult<()> {
    let format = output_format(output)?;
    let headers: Vec<String> = schema_for(variant)
        .template_headers()
        .into_iter()
        .map(str::to_string)
        .collect();

    match format {
        OutputFormat::Xlsx => write_xlsx(output, "Plantilla", &headers, &[]),
        OutputFormat::Csv => write_csv(output, &headers, &[]),
    }
}

fn write_xlsx(
    output: &Path,
    sheet_name: &str,
    headers: &[String],
    body: &[Vec<String>],
) -> ImportResult<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    let bold = Format::new().set_bold();
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, header, &bold)?;
    }

    for (row_offset, line) in body.iter().enumerate() {
        let row = (row_offset + 1) as u32;
        for (col, value) in line.iter().enumerate() {
            sheet.write_string(row, col as u16, value)?;
        }
    }

    workbook.save(output)?;
    Ok(())
}

fn write_csv(output: &Path, headers: &[String], body: &[Vec<String>]) -> ImportResult<()> {
    let mut writer = csv::Writer::from_path(output)?;
    writer.write_record(headers)?;
    for line in body {
        writer.write_record(line)?;
    }
    writer.flush()?;
    Ok(())
}
