// ==========================================
// 包装 ERP - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls，仅第一个工作表) / CSV (.csv)
// 约定: 首行为表头；完全空白的行跳过；row_index 从 1 开始按输出顺序编号
// ==========================================

use crate::domain::{CellValue, FieldMap, RawRecord};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::FileParser;
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::fs::File;
use std::path::Path;

// ==========================================
// ParsedSheet - 解析结果
// ==========================================
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSheet {
    /// 表头（已 TRIM，去除空列名）
    pub headers: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl ParsedSheet {
    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

/// 按表头把一行单元格装配为 RawRecord（整行为空时返回 None）
fn assemble_record(
    headers: &[String],
    cells: impl Iterator<Item = CellValue>,
    row_index: usize,
) -> Option<RawRecord> {
    let mut row_map = FieldMap::new();
    for (header, value) in headers.iter().zip(cells) {
        if header.is_empty() {
            continue;
        }
        row_map.insert(header.clone(), value);
    }

    // 跳过完全空白的行
    if row_map.values().all(CellValue::is_empty) {
        return None;
    }

    Some(RawRecord {
        row_index,
        cells: row_map,
    })
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn ensure_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_file(&self, file_path: &Path) -> ImportResult<ParsedSheet> {
        let ext = extension_of(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }
        ensure_exists(file_path)?;

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        let headers: Vec<String> = reader.headers()?.iter().map(clean_header).collect();

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result?;
            let next_index = records.len() + 1;
            if let Some(raw) =
                assemble_record(&headers, record.iter().map(CellValue::from_raw), next_index)
            {
                records.push(raw);
            }
        }

        Ok(ParsedSheet {
            headers: headers.into_iter().filter(|h| !h.is_empty()).collect(),
            records,
        })
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl ExcelParser {
    /// 工作表单元格 → CellValue
    fn convert_cell(cell: &Data) -> CellValue {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::from_raw(s),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(value) if value.time() == chrono::NaiveTime::MIN => {
                    CellValue::Text(value.format("%Y-%m-%d").to_string())
                }
                Some(value) => CellValue::Text(value.format("%Y-%m-%d %H:%M:%S").to_string()),
                None => CellValue::Number(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::from_raw(s),
            Data::Error(e) => CellValue::Text(e.to_string()),
        }
    }
}

impl FileParser for ExcelParser {
    fn parse_file(&self, file_path: &Path) -> ImportResult<ParsedSheet> {
        let ext = extension_of(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }
        ensure_exists(file_path)?;

        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("workbook has no sheets".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）
        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| clean_header(&cell.to_string()))
                .collect(),
            None => return Ok(ParsedSheet::default()),
        };

        let mut records = Vec::new();
        for data_row in rows {
            let next_index = records.len() + 1;
            if let Some(raw) = assemble_record(
                &headers,
                data_row.iter().map(Self::convert_cell),
                next_index,
            ) {
                records.push(raw);
            }
        }

        Ok(ParsedSheet {
            headers: headers.into_iter().filter(|h| !h.is_empty()).collect(),
            records,
        })
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
// 不支持的扩展名在任何解析开始前即失败
pub struct UniversalFileParser;

impl UniversalFileParser {
    pub fn parse<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<ParsedSheet> {
        let path = file_path.as_ref();
        let ext = extension_of(path);

        match ext.as_str() {
            "csv" => CsvParser.parse_file(path),
            "xlsx" | "xls" => ExcelParser.parse_file(path),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}
