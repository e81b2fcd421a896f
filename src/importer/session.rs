// ==========================================
// 包装 ERP - 导入会话（无界面审阅面）
// ==========================================
// 职责: 持有一次上传的解析结果、参考快照与管道行
// 流程: 解析 → 校验 → 解析引用 → 匹配（仅报价）→ 审阅/修正 → 提交
// 红线: 存在 error 行时禁止提交
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::reference::columns as col;
use crate::domain::{
    AuthContext, CellValue, ImportLogEntry, ImportRow, ImportSource, ImportVariant,
    MatchType, MessageStage, ReferenceSnapshot, RowMessage, RowStatus, Severity, StatusCounts,
};
use crate::importer::bulk_importer::BulkImporter;
use crate::importer::entity_resolver::EntityResolver;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::{ParsedSheet, UniversalFileParser};
use crate::importer::import_trait::{CancelToken, ProgressSink};
use crate::importer::matcher::DielineMatcher;
use crate::importer::row_validator::RowValidator;
use crate::repository::ImportRepository;
use std::path::Path;
use tracing::{debug, info, instrument};

pub struct ImportSession {
    variant: ImportVariant,
    source: ImportSource,
    snapshot: ReferenceSnapshot,
    validator: RowValidator,
    rows: Vec<ImportRow>,
}

impl ImportSession {
    /// 打开文件并构建会话
    ///
    /// # 参数
    /// - variant: 导入变体
    /// - file_path: 上传文件（.xlsx/.xls/.csv）
    /// - repo: 用于一次性加载参考快照
    ///
    /// # 返回
    /// - Err(UnsupportedFormat/FileNotFound/...): 格式错误，整次会话失败
    #[instrument(skip(file_path, repo), fields(file = %file_path.as_ref().display()))]
    pub async fn open<P, R>(variant: ImportVariant, file_path: P, repo: &R) -> ImportResult<Self>
    where
        P: AsRef<Path>,
        R: ImportRepository + ?Sized,
    {
        let path = file_path.as_ref();
        let sheet = UniversalFileParser.parse(path)?;
        let source = ImportSource {
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string()),
            file_size_bytes: std::fs::metadata(path)?.len(),
        };

        let snapshot = ReferenceSnapshot::new(repo.load_clients().await?, repo.load_dielines().await?);
        debug!(
            clients = snapshot.clients.len(),
            dielines = snapshot.dielines.len(),
            "参考快照已加载"
        );

        Ok(Self::from_sheet(variant, source, sheet, snapshot))
    }

    /// 由已解析表格构建会话（全部行跑完 校验 → 解析引用 → 匹配）
    pub fn from_sheet(
        variant: ImportVariant,
        source: ImportSource,
        sheet: ParsedSheet,
        snapshot: ReferenceSnapshot,
    ) -> Self {
        let validator = RowValidator::new(variant, &sheet.headers);
        let rows = sheet
            .records
            .into_iter()
            .map(|record| validator.build_row(record))
            .collect();

        let mut session = Self {
            variant,
            source,
            snapshot,
            validator,
            rows,
        };
        session.resolve_all();
        session.rerun_matcher();

        let counts = session.status_counts();
        info!(
            variant = %variant,
            total = counts.total(),
            valid = counts.valid,
            warning = counts.warning,
            error = counts.error,
            "导入会话已构建"
        );
        session
    }

    pub fn variant(&self) -> ImportVariant {
        self.variant
    }

    pub fn source(&self) -> &ImportSource {
        &self.source
    }

    pub fn snapshot(&self) -> &ReferenceSnapshot {
        &self.snapshot
    }

    /// 全部行（文件顺序）
    pub fn rows(&self) -> &[ImportRow] {
        &self.rows
    }

    pub fn row(&self, row_index: usize) -> Option<&ImportRow> {
        self.rows.iter().find(|r| r.row_index == row_index)
    }

    /// 预览统计
    pub fn status_counts(&self) -> StatusCounts {
        self.rows
            .iter()
            .fold(StatusCounts::default(), |mut counts, row| {
                match row.status() {
                    RowStatus::Valid => counts.valid += 1,
                    RowStatus::Warning => counts.warning += 1,
                    RowStatus::Error => counts.error += 1,
                }
                counts
            })
    }

    /// 是否允许提交（仍有 error 行时为 false）
    pub fn can_import(&self) -> bool {
        self.status_counts().error == 0
    }

    /// 可提交的行（valid/warning）
    pub fn eligible_rows(&self) -> impl Iterator<Item = &ImportRow> {
        self.rows.iter().filter(|r| r.status().is_eligible())
    }

    /// 行内编辑: 修改一个单元格后仅对该行重跑 校验 → 解析引用 → 匹配
    ///
    /// 人工指定的匹配在编辑后保留；编辑尺寸列则撤销人工指定并重新自动匹配
    pub fn edit_cell(
        &mut self,
        row_index: usize,
        field: &str,
        value: CellValue,
    ) -> ImportResult<&ImportRow> {
        let position = self.position_of(row_index)?;
        let variant = self.variant;
        let row = &mut self.rows[position];

        row.raw_fields.insert(field.to_string(), value);
        self.validator.validate(row);
        EntityResolver::new(&self.snapshot).resolve(variant, row);

        if variant == ImportVariant::Quotations {
            let dimension_edit = col::DIMENSIONS.contains(&field);
            let manual = match (row.match_type, row.resolved.technical_record_id) {
                (MatchType::Manual, Some(id)) if !dimension_edit => self.snapshot.find_dieline(id),
                _ => None,
            };
            let released = row.match_type == MatchType::Manual && manual.is_none();

            match manual {
                Some(record) => DielineMatcher::assign_manual(row, record),
                None => {
                    row.match_type = MatchType::None;
                    DielineMatcher::new(&self.snapshot.dielines).match_row(row);
                }
            }

            if released {
                row.push_message(RowMessage::new(
                    Severity::Info,
                    MessageStage::Matching,
                    Some(field),
                    format!("manual technical record assignment cleared after editing '{}'", field),
                ));
                info!(row_index, field, "人工指定已撤销");
            }
        }

        debug!(row_index, field, status = %row.status(), "单元格已修改");
        Ok(&self.rows[position])
    }

    /// 人工指定技术档案（仅报价变体）
    pub fn assign_manual_match(
        &mut self,
        row_index: usize,
        dieline_id: i64,
    ) -> ImportResult<&ImportRow> {
        if self.variant != ImportVariant::Quotations {
            return Err(ImportError::InternalError(format!(
                "manual matching is not available for {} imports",
                self.variant
            )));
        }
        let position = self.position_of(row_index)?;
        let record = self
            .snapshot
            .find_dieline(dieline_id)
            .ok_or(ImportError::TechnicalRecordNotFound(dieline_id))?;

        DielineMatcher::assign_manual(&mut self.rows[position], record);
        info!(row_index, dieline_id, "已人工指定刀模");
        Ok(&self.rows[position])
    }

    /// 重跑自动匹配（仅报价变体；幂等）
    pub fn rerun_matcher(&mut self) {
        if self.variant == ImportVariant::Quotations {
            DielineMatcher::new(&self.snapshot.dielines).match_all(&mut self.rows);
        }
    }

    /// 提交导入
    ///
    /// # 返回
    /// - Err(BlockingRows): 仍有 error 行
    /// - 其余同 BulkImporter::run
    pub async fn commit<R, C>(
        &self,
        importer: &BulkImporter<R, C>,
        auth: Option<&AuthContext>,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> ImportResult<ImportLogEntry>
    where
        R: ImportRepository,
        C: ImportConfigReader,
    {
        let blocking = self.status_counts().error;
        if blocking > 0 {
            return Err(ImportError::BlockingRows(blocking));
        }

        importer
            .run(
                self.variant,
                self.source.clone(),
                &self.rows,
                auth,
                progress,
                cancel,
            )
            .await
    }

    fn resolve_all(&mut self) {
        let resolver = EntityResolver::new(&self.snapshot);
        for row in self.rows.iter_mut() {
            resolver.resolve(self.variant, row);
        }
    }

    fn position_of(&self, row_index: usize) -> ImportResult<usize> {
        self.rows
            .iter()
            .position(|r| r.row_index == row_index)
            .ok_or(ImportError::RowNotFound(row_index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientRef, FieldMap, RawRecord, TechnicalRecord};

    fn sheet(headers: &[&str], rows: &[&[&str]]) -> ParsedSheet {
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

    fn snapshot() -> ReferenceSnapshot {
        ReferenceSnapshot::new(
            vec![ClientRef {
                client_id: 1,
                client_code: "CLI-1".into(),
                name: "Farmacias del Norte".into(),
                rfc: None,
            }],
            vec![
                TechnicalRecord {
                    dieline_id: 10,
                    sku: Some("FARM-001".into()),
                    product_name: "Caja medicamento".into(),
                    height_mm: 95.0,
                    width_mm: 45.0,
                    depth_mm: 28.0,
                    die_id: Some("TRQ-10".into()),
                    material: None,
                    layout: None,
                },
                TechnicalRecord {
                    dieline_id: 11,
                    sku: Some("EXH-002".into()),
                    product_name: "Exhibidor".into(),
                    height_mm: 300.0,
                    width_mm: 200.0,
                    depth_mm: 150.0,
                    die_id: None,
                    material: None,
                    layout: None,
                },
            ],
        )
    }

    const HEADERS: &[&str] = &[
        "cliente_nombre",
        "producto_nombre",
        "sku",
        "cantidad",
        "precio_unitario",
        "alto_mm",
        "ancho_mm",
        "profundidad_mm",
    ];

    fn source() -> ImportSource {
        ImportSource {
            file_name: "cotizaciones.csv".into(),
            file_size_bytes: 100,
        }
    }

    #[test]
    fn test_session_builds_and_matches() {
        let session = ImportSession::from_sheet(
            ImportVariant::Quotations,
            source(),
            sheet(
                HEADERS,
                &[
                    &["Farmacias del Norte", "Caja", "FARM-001", "1000", "2.35", "", "", ""],
                    &["", "Caja", "", "10", "1", "", "", ""],
                ],
            ),
            snapshot(),
        );

        let first = session.row(1).unwrap();
        assert_eq!(first.match_type, MatchType::ExactKey);
        assert_eq!(first.number("alto_mm"), Some(95.0));
        assert_eq!(first.status(), RowStatus::Valid);

        assert_eq!(session.row(2).unwrap().status(), RowStatus::Error);
        assert!(!session.can_import());
        assert_eq!(session.eligible_rows().count(), 1);
    }

    #[test]
    fn test_inline_edit_fixes_error_row() {
        let mut session = ImportSession::from_sheet(
            ImportVariant::Quotations,
            source(),
            sheet(HEADERS, &[&["", "Caja", "", "10", "1", "", "", ""]]),
            snapshot(),
        );
        assert!(!session.can_import());

        let row = session
            .edit_cell(1, "cliente_nombre", CellValue::from("Farmacias del Norte"))
            .unwrap();
        assert_eq!(row.resolved.client_id, Some(1));
        // 无刀模命中 → warning，但可提交
        assert_eq!(row.status(), RowStatus::Warning);
        assert!(session.can_import());
    }

    #[test]
    fn test_manual_assignment_survives_inline_edit() {
        let mut session = ImportSession::from_sheet(
            ImportVariant::Quotations,
            source(),
            sheet(
                HEADERS,
                &[&["Farmacias del Norte", "Otro", "NADA", "10", "1", "90", "", ""]],
            ),
            snapshot(),
        );

        session.assign_manual_match(1, 11).unwrap();
        let row = session.edit_cell(1, "cantidad", CellValue::from("20")).unwrap();

        assert_eq!(row.match_type, MatchType::Manual);
        assert_eq!(row.number("alto_mm"), Some(300.0));
        assert_eq!(row.number("cantidad"), Some(20.0));

        session.rerun_matcher();
        assert_eq!(session.row(1).unwrap().match_type, MatchType::Manual);

        // 修改尺寸列: 撤销人工指定，保留新值并重新自动匹配
        let row = session.edit_cell(1, "alto_mm", CellValue::from("97")).unwrap();
        assert_eq!(row.match_type, MatchType::None);
        assert_eq!(row.resolved.technical_record_id, None);
        assert_eq!(row.number("alto_mm"), Some(97.0));
        assert_eq!(row.status(), RowStatus::Warning);
        assert!(row
            .joined_messages()
            .contains("manual technical record assignment cleared after editing 'alto_mm'"));
    }

    #[test]
    fn test_manual_assignment_makes_bad_dimension_row_eligible() {
        let mut session = ImportSession::from_sheet(
            ImportVariant::Quotations,
            source(),
            sheet(
                HEADERS,
                &[&["Farmacias del Norte", "Otro", "NADA", "10", "1", "noventa", "", ""]],
            ),
            snapshot(),
        );
        assert_eq!(session.row(1).unwrap().status(), RowStatus::Error);

        let row = session.assign_manual_match(1, 10).unwrap();
        assert_eq!(row.number("alto_mm"), Some(95.0));
        assert_eq!(row.status(), RowStatus::Valid);
        assert!(!row.joined_messages().contains("must be a number"));
        assert!(session.can_import());

        // 编辑其他列后重跑校验，人工指定仍覆盖坏值
        let row = session.edit_cell(1, "cantidad", CellValue::from("12")).unwrap();
        assert_eq!(row.status(), RowStatus::Valid);
        assert_eq!(row.match_type, MatchType::Manual);
    }

    #[test]
    fn test_unknown_row_and_record() {
        let mut session = ImportSession::from_sheet(
            ImportVariant::Quotations,
            source(),
            sheet(HEADERS, &[&["Farmacias del Norte", "Caja", "", "1", "1", "", "", ""]]),
            snapshot(),
        );

        assert!(matches!(
            session.edit_cell(99, "sku", CellValue::Empty),
            Err(ImportError::RowNotFound(99))
        ));
        assert!(matches!(
            session.assign_manual_match(1, 404),
            Err(ImportError::TechnicalRecordNotFound(404))
        ));
    }
}
