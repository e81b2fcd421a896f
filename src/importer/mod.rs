// ==========================================
// 包装 ERP - 导入层
// ==========================================
// 职责: 表格上传 → 校验 → 解析引用 → 刀模匹配 → 审阅 → 批量落库
// 支持: Excel (.xlsx/.xls), CSV
// ==========================================

// 模块声明
pub mod bulk_importer;
pub mod entity_resolver;
pub mod error;
pub mod error_report;
pub mod field_rules;
pub mod file_parser;
pub mod import_trait;
pub mod matcher;
pub mod record_builder;
pub mod row_validator;
pub mod session;

// 重导出核心类型
pub use bulk_importer::BulkImporter;
pub use entity_resolver::EntityResolver;
pub use error::{ImportError, ImportResult};
pub use error_report::{collect_error_rows, write_error_report, write_template};
pub use field_rules::{schema_for, FieldRule, Rule, VariantSchema};
pub use file_parser::{CsvParser, ExcelParser, ParsedSheet, UniversalFileParser};
pub use matcher::{DielineMatcher, DIMENSION_TOLERANCE_MM};
pub use row_validator::RowValidator;
pub use session::ImportSession;

// 重导出 Trait 接口
pub use import_trait::{CancelToken, FileParser, NoopProgress, ProgressSink};
