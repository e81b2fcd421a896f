// ==========================================
// 包装 ERP - 批量导入器
// ==========================================
// 职责: 逐行落库已审阅的导入行，并写入导入日志
// 流程: 鉴权检查 → 存储连通检查 → 逐行（建引用 → 构造 → 落库）→ 写日志
// 红线:
// - error 状态行永不提交
// - 单行落库失败不中止运行，记入错误清单后继续
// - 严格按文件顺序逐行处理，不并发（运行内客户缓存无需加锁）
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::reference::{columns as col, normalize_key};
use crate::domain::{
    AuthContext, ImportCounts, ImportLogEntry, ImportProgress, ImportRow, ImportSource,
    ImportVariant, ManifestEntry,
};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::import_trait::{CancelToken, ProgressSink};
use crate::importer::record_builder::{
    build_client, build_dieline, build_placeholder_client, build_quotation, generate_client_code,
};
use crate::repository::{ImportRepository, RepositoryResult};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// RunCache - 运行内新建实体缓存
// ==========================================
// 生命周期: 单次运行；键为规范化自然键
// 客户按名称与 RFC 双键登记，任一命中即复用
#[derive(Debug, Default)]
pub struct RunCache {
    clients: HashMap<String, i64>,
    client_rfcs: HashMap<String, i64>,
    dielines: HashMap<String, i64>,
}

impl RunCache {
    pub fn client(&self, name: &str, rfc: Option<&str>) -> Option<i64> {
        self.clients.get(&normalize_key(name)).copied().or_else(|| {
            rfc.filter(|r| !r.trim().is_empty())
                .and_then(|r| self.client_rfcs.get(&normalize_key(r)).copied())
        })
    }

    pub fn remember_client(&mut self, name: &str, rfc: Option<&str>, client_id: i64) {
        self.clients.insert(normalize_key(name), client_id);
        if let Some(rfc) = rfc.filter(|r| !r.trim().is_empty()) {
            self.client_rfcs.insert(normalize_key(rfc), client_id);
        }
    }

    pub fn dieline(&self, sku: &str) -> Option<i64> {
        self.dielines.get(&normalize_key(sku)).copied()
    }

    pub fn remember_dieline(&mut self, sku: &str, dieline_id: i64) {
        self.dielines.insert(normalize_key(sku), dieline_id);
    }
}

/// 单行落库结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowOutcome {
    Inserted,
    Updated,
}

// ==========================================
// BulkImporter
// ==========================================
pub struct BulkImporter<R, C>
where
    R: ImportRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    import_repo: R,

    // 配置读取器
    config: C,
}

impl<R, C> BulkImporter<R, C>
where
    R: ImportRepository,
    C: ImportConfigReader,
{
    pub fn new(import_repo: R, config: C) -> Self {
        Self {
            import_repo,
            config,
        }
    }

    pub fn repository(&self) -> &R {
        &self.import_repo
    }

    /// 执行一次导入运行
    ///
    /// # 参数
    /// - variant: 导入变体
    /// - source: 源文件信息
    /// - rows: 会话中的全部行（error 行在此被排除）
    /// - auth: 操作人（缺失则整次运行中止，不处理任何行）
    /// - progress: 逐行进度回报
    /// - cancel: 取消令牌（下一行开始前检查）
    ///
    /// # 返回
    /// - Ok(ImportLogEntry): 已写入的导入日志
    /// - Err: 鉴权缺失、存储不可用、配置读取失败、日志写入失败
    #[instrument(skip_all, fields(variant = %variant, file = %source.file_name))]
    pub async fn run(
        &self,
        variant: ImportVariant,
        source: ImportSource,
        rows: &[ImportRow],
        auth: Option<&AuthContext>,
        progress: &dyn ProgressSink,
        cancel: &CancelToken,
    ) -> ImportResult<ImportLogEntry> {
        // === 会话级前置检查 ===
        let auth = auth.ok_or(ImportError::Unauthenticated)?;
        self.import_repo.ping().await.map_err(|e| {
            warn!(error = %e, "存储不可用，导入中止");
            ImportError::StoreUnavailable(e.to_string())
        })?;

        let timeout_ms = self
            .config
            .get_persist_timeout_ms()
            .await
            .map_err(|e| ImportError::Config(e.to_string()))?;
        let timeout = Duration::from_millis(timeout_ms);

        let started_at = Utc::now();
        let clock = Instant::now();

        let eligible: Vec<&ImportRow> = rows.iter().filter(|r| r.status().is_eligible()).collect();
        let mut counts = ImportCounts {
            total_rows: rows.len(),
            blocked: rows.len() - eligible.len(),
            eligible: eligible.len(),
            ..ImportCounts::default()
        };
        info!(
            total_rows = counts.total_rows,
            blocked = counts.blocked,
            eligible = counts.eligible,
            timeout_ms,
            "开始导入"
        );

        let mut cache = RunCache::default();
        let mut manifest = Vec::new();
        let mut cancelled = false;

        // === 逐行处理 ===
        for (position, row) in eligible.iter().enumerate() {
            if cancel.is_cancelled() {
                cancelled = true;
                counts.skipped = eligible.len() - position;
                warn!(skipped = counts.skipped, "导入已取消");
                break;
            }

            match self
                .import_row(variant, row, &auth.user_id, &mut cache, timeout)
                .await
            {
                Ok(RowOutcome::Inserted) => counts.inserted += 1,
                Ok(RowOutcome::Updated) => counts.updated += 1,
                Err(message) => {
                    warn!(row_index = row.row_index, error = %message, "行落库失败");
                    counts.errored += 1;
                    manifest.push(ManifestEntry {
                        row_index: row.row_index,
                        messages: vec![message],
                    });
                }
            }

            progress.on_progress(ImportProgress {
                processed: position + 1,
                total: counts.eligible,
                row_index: row.row_index,
            });
        }

        // === 写入导入日志（无论成败） ===
        let entry = ImportLogEntry {
            log_id: Uuid::new_v4().to_string(),
            variant,
            source,
            counts,
            cancelled,
            error_manifest: manifest,
            imported_by: auth.user_id.clone(),
            started_at,
            finished_at: Utc::now(),
            elapsed_ms: clock.elapsed().as_millis() as i64,
        };

        persist(timeout, self.import_repo.insert_import_log(&entry))
            .await
            .map_err(|message| {
                ImportError::InternalError(format!("import log write failed: {}", message))
            })?;

        info!(
            log_id = %entry.log_id,
            inserted = counts.inserted,
            updated = counts.updated,
            errored = counts.errored,
            skipped = counts.skipped,
            elapsed_ms = entry.elapsed_ms,
            "导入完成"
        );

        Ok(entry)
    }

    async fn import_row(
        &self,
        variant: ImportVariant,
        row: &ImportRow,
        user_id: &str,
        cache: &mut RunCache,
        timeout: Duration,
    ) -> Result<RowOutcome, String> {
        match variant {
            ImportVariant::Clients => self.import_client_row(row, cache, timeout).await,
            ImportVariant::Dielines => self.import_dieline_row(row, cache, timeout).await,
            ImportVariant::Quotations => {
                self.import_quotation_row(row, user_id, cache, timeout).await
            }
        }
    }

    async fn import_client_row(
        &self,
        row: &ImportRow,
        cache: &mut RunCache,
        timeout: Duration,
    ) -> Result<RowOutcome, String> {
        let name = row.display(col::NAME).unwrap_or_default();
        let rfc = row.display(col::RFC);
        let existing = row
            .resolved
            .existing_entity_id
            .or_else(|| cache.client(&name, rfc.as_deref()));

        match existing {
            Some(client_id) => {
                let record = build_client(row, String::new()).map_err(|e| e.to_string())?;
                persist(timeout, self.import_repo.update_client(client_id, &record)).await?;
                cache.remember_client(&name, rfc.as_deref(), client_id);
                Ok(RowOutcome::Updated)
            }
            None => {
                let record = build_client(row, generate_client_code()).map_err(|e| e.to_string())?;
                let client_id = persist(timeout, self.import_repo.insert_client(&record)).await?;
                cache.remember_client(&name, rfc.as_deref(), client_id);
                Ok(RowOutcome::Inserted)
            }
        }
    }

    async fn import_dieline_row(
        &self,
        row: &ImportRow,
        cache: &mut RunCache,
        timeout: Duration,
    ) -> Result<RowOutcome, String> {
        let client_id = match row.display(col::CLIENT_NAME) {
            Some(_) => Some(self.ensure_client(row, cache, timeout).await?),
            None => None,
        };

        let record = build_dieline(row, client_id).map_err(|e| e.to_string())?;
        let existing = row
            .resolved
            .existing_entity_id
            .or_else(|| cache.dieline(&record.sku));

        match existing {
            Some(dieline_id) => {
                persist(timeout, self.import_repo.update_dieline(dieline_id, &record)).await?;
                cache.remember_dieline(&record.sku, dieline_id);
                Ok(RowOutcome::Updated)
            }
            None => {
                let dieline_id = persist(timeout, self.import_repo.insert_dieline(&record)).await?;
                cache.remember_dieline(&record.sku, dieline_id);
                Ok(RowOutcome::Inserted)
            }
        }
    }

    async fn import_quotation_row(
        &self,
        row: &ImportRow,
        user_id: &str,
        cache: &mut RunCache,
        timeout: Duration,
    ) -> Result<RowOutcome, String> {
        let client_id = self.ensure_client(row, cache, timeout).await?;
        let record = build_quotation(row, client_id, user_id).map_err(|e| e.to_string())?;
        persist(timeout, self.import_repo.insert_quotation(&record)).await?;
        Ok(RowOutcome::Inserted)
    }

    /// 取得行引用的客户 ID: 已解析 → 运行内缓存 → 新建占位客户并缓存
    async fn ensure_client(
        &self,
        row: &ImportRow,
        cache: &mut RunCache,
        timeout: Duration,
    ) -> Result<i64, String> {
        if let Some(client_id) = row.resolved.client_id {
            return Ok(client_id);
        }

        let name = row
            .display(col::CLIENT_NAME)
            .ok_or_else(|| "client reference is empty".to_string())?;
        let rfc = row.display(col::CLIENT_RFC);
        if let Some(client_id) = cache.client(&name, rfc.as_deref()) {
            debug!(row_index = row.row_index, client_id, "复用本次运行新建的客户");
            return Ok(client_id);
        }

        let placeholder = build_placeholder_client(name.clone(), rfc.clone());
        let client_id = persist(timeout, self.import_repo.insert_client(&placeholder)).await?;
        info!(
            row_index = row.row_index,
            client_id,
            client_code = %placeholder.client_code,
            "已新建占位客户"
        );
        cache.remember_client(&name, rfc.as_deref(), client_id);
        Ok(client_id)
    }
}

/// 带超时的仓储调用；超时与仓储错误统一转为行级错误文本
async fn persist<T, F>(timeout: Duration, call: F) -> Result<T, String>
where
    F: Future<Output = RepositoryResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "persistence call timed out after {} ms",
            timeout.as_millis()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigResult;
    use crate::importer::import_trait::NoopProgress;
    use crate::domain::{
        CellValue, ClientRecord, ClientRef, DielineRecord, FieldMap, QuotationRecord,
        TechnicalRecord,
    };
    use crate::repository::RepositoryError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::Mutex;

    // ===== 测试替身 =====

    #[derive(Default)]
    struct MockRepo {
        next_id: AtomicI64,
        fail_source_rows: Vec<usize>,
        hang_source_rows: Vec<usize>,
        clients: Mutex<Vec<ClientRecord>>,
        quotations: Mutex<Vec<QuotationRecord>>,
        logs: Mutex<Vec<ImportLogEntry>>,
    }

    impl MockRepo {
        fn id(&self) -> i64 {
            self.next_id.fetch_add(1, Ordering::SeqCst) + 1
        }
    }

    #[async_trait]
    impl ImportRepository for MockRepo {
        async fn ping(&self) -> RepositoryResult<()> {
            Ok(())
        }
        async fn load_clients(&self) -> RepositoryResult<Vec<ClientRef>> {
            Ok(Vec::new())
        }
        async fn load_dielines(&self) -> RepositoryResult<Vec<TechnicalRecord>> {
            Ok(Vec::new())
        }
        async fn insert_client(&self, client: &ClientRecord) -> RepositoryResult<i64> {
            self.clients.lock().unwrap().push(client.clone());
            Ok(self.id())
        }
        async fn update_client(&self, _id: i64, _c: &ClientRecord) -> RepositoryResult<()> {
            Ok(())
        }
        async fn insert_dieline(&self, _d: &DielineRecord) -> RepositoryResult<i64> {
            Ok(self.id())
        }
        async fn update_dieline(&self, _id: i64, _d: &DielineRecord) -> RepositoryResult<()> {
            Ok(())
        }
        async fn insert_quotation(&self, q: &QuotationRecord) -> RepositoryResult<i64> {
            if self.hang_source_rows.contains(&q.source_row) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            if self.fail_source_rows.contains(&q.source_row) {
                return Err(RepositoryError::DatabaseQueryError("disk I/O error".into()));
            }
            self.quotations.lock().unwrap().push(q.clone());
            Ok(self.id())
        }
        async fn insert_import_log(&self, entry: &ImportLogEntry) -> RepositoryResult<()> {
            self.logs.lock().unwrap().push(entry.clone());
            Ok(())
        }
        async fn list_import_logs(&self, _limit: usize) -> RepositoryResult<Vec<ImportLogEntry>> {
            Ok(self.logs.lock().unwrap().clone())
        }
    }

    struct FixedConfig(u64);

    #[async_trait]
    impl ImportConfigReader for FixedConfig {
        async fn get_persist_timeout_ms(&self) -> ConfigResult<u64> {
            Ok(self.0)
        }
        async fn get_reconcile_amount_tolerance(&self) -> ConfigResult<f64> {
            Ok(0.01)
        }
        async fn get_reconcile_date_window_days(&self) -> ConfigResult<i64> {
            Ok(3)
        }
        async fn get_invoice_tax_rate(&self) -> ConfigResult<f64> {
            Ok(0.16)
        }
    }

    fn quotation_row(index: usize, client: &str) -> ImportRow {
        let mut row = ImportRow::new(index, FieldMap::new());
        for (k, v) in [
            ("cliente_nombre", CellValue::from(client)),
            ("producto_nombre", CellValue::from("Caja plegadiza")),
            ("cantidad", CellValue::Number(1000.0)),
            ("precio_unitario", CellValue::Number(2.35)),
        ] {
            row.typed_fields.insert(k.to_string(), v);
        }
        row.resolved.client_to_create = Some(normalize_key(client));
        row
    }

    fn source() -> ImportSource {
        ImportSource {
            file_name: "cotizaciones.csv".to_string(),
            file_size_bytes: 512,
        }
    }

    #[tokio::test]
    async fn test_failed_row_does_not_abort_run() {
        let repo = MockRepo {
            fail_source_rows: vec![7],
            ..MockRepo::default()
        };
        let importer = BulkImporter::new(repo, FixedConfig(1_000));
        let rows: Vec<_> = (1..=10).map(|i| quotation_row(i, "Dulces Lupita")).collect();
        let auth = AuthContext::new("ana");
        let seen = Mutex::new(Vec::new());
        let progress = |p: ImportProgress| seen.lock().unwrap().push(p.row_index);

        let entry = importer
            .run(
                ImportVariant::Quotations,
                source(),
                &rows,
                Some(&auth),
                &progress,
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(entry.counts.inserted, 9);
        assert_eq!(entry.counts.errored, 1);
        assert_eq!(entry.counts.processed(), entry.counts.eligible);
        assert_eq!(entry.error_manifest.len(), 1);
        assert_eq!(entry.error_manifest[0].row_index, 7);
        assert!(entry.error_manifest[0].messages[0].contains("disk I/O error"));
        assert_eq!(*seen.lock().unwrap(), (1..=10).collect::<Vec<_>>());

        let repo = importer.repository();
        assert_eq!(repo.logs.lock().unwrap().len(), 1);
        // 同名客户只创建一次
        assert_eq!(repo.clients.lock().unwrap().len(), 1);
        assert_eq!(repo.quotations.lock().unwrap().len(), 9);
    }

    #[tokio::test]
    async fn test_missing_auth_aborts_before_any_row() {
        let importer = BulkImporter::new(MockRepo::default(), FixedConfig(1_000));
        let rows = vec![quotation_row(1, "A")];

        let err = importer
            .run(
                ImportVariant::Quotations,
                source(),
                &rows,
                None,
                &NoopProgress,
                &CancelToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ImportError::Unauthenticated));
        assert!(importer.repository().quotations.lock().unwrap().is_empty());
        assert!(importer.repository().logs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_eligible_rows_still_logs() {
        let importer = BulkImporter::new(MockRepo::default(), FixedConfig(1_000));
        let auth = AuthContext::new("ana");

        let entry = importer
            .run(
                ImportVariant::Quotations,
                source(),
                &[],
                Some(&auth),
                &NoopProgress,
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(entry.counts, ImportCounts::default());
        assert_eq!(importer.repository().logs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_hung_persistence_times_out_per_row() {
        let repo = MockRepo {
            hang_source_rows: vec![2],
            ..MockRepo::default()
        };
        let importer = BulkImporter::new(repo, FixedConfig(50));
        let rows: Vec<_> = (1..=3).map(|i| quotation_row(i, "A")).collect();
        let auth = AuthContext::new("ana");

        let entry = importer
            .run(
                ImportVariant::Quotations,
                source(),
                &rows,
                Some(&auth),
                &NoopProgress,
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(entry.counts.inserted, 2);
        assert_eq!(entry.counts.errored, 1);
        assert!(entry.error_manifest[0].messages[0].contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_row() {
        let importer = BulkImporter::new(MockRepo::default(), FixedConfig(1_000));
        let rows: Vec<_> = (1..=5).map(|i| quotation_row(i, "A")).collect();
        let auth = AuthContext::new("ana");
        let cancel = CancelToken::new();
        let cancel_after_second = {
            let cancel = cancel.clone();
            move |p: ImportProgress| {
                if p.processed == 2 {
                    cancel.cancel();
                }
            }
        };

        let entry = importer
            .run(
                ImportVariant::Quotations,
                source(),
                &rows,
                Some(&auth),
                &cancel_after_second,
                &cancel,
            )
            .await
            .unwrap();

        assert!(entry.cancelled);
        assert_eq!(entry.counts.inserted, 2);
        assert_eq!(entry.counts.skipped, 3);
        assert_eq!(importer.repository().logs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_rows_are_never_submitted() {
        let importer = BulkImporter::new(MockRepo::default(), FixedConfig(1_000));
        let mut bad = quotation_row(2, "A");
        bad.push_message(crate::domain::RowMessage::new(
            crate::domain::Severity::Error,
            crate::domain::MessageStage::Validation,
            Some("cliente_nombre"),
            "required field 'cliente_nombre' is empty",
        ));
        let rows = vec![quotation_row(1, "A"), bad];
        let auth = AuthContext::new("ana");

        let entry = importer
            .run(
                ImportVariant::Quotations,
                source(),
                &rows,
                Some(&auth),
                &NoopProgress,
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(entry.counts.total_rows, 2);
        assert_eq!(entry.counts.blocked, 1);
        assert_eq!(entry.counts.eligible, 1);
        assert_eq!(entry.counts.inserted, 1);
        let quotations = importer.repository().quotations.lock().unwrap();
        assert_eq!(quotations.len(), 1);
        assert_eq!(quotations[0].source_row, 1);
    }

    #[tokio::test]
    async fn test_placeholder_client_reused_by_rfc() {
        let importer = BulkImporter::new(MockRepo::default(), FixedConfig(1_000));
        let mut rows = vec![quotation_row(1, "Dulces La Fe"), quotation_row(2, "Dulces LaFe SA")];
        for row in &mut rows {
            row.typed_fields
                .insert("cliente_rfc".to_string(), CellValue::from("DLF020202BBB"));
        }
        let auth = AuthContext::new("ana");

        let entry = importer
            .run(
                ImportVariant::Quotations,
                source(),
                &rows,
                Some(&auth),
                &NoopProgress,
                &CancelToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(entry.counts.inserted, 2);
        assert_eq!(importer.repository().clients.lock().unwrap().len(), 1);
        let quotations = importer.repository().quotations.lock().unwrap();
        assert_eq!(quotations[0].client_id, quotations[1].client_id);
    }

    #[tokio::test]
    async fn test_persist_times_out_while_sqlite_connection_is_busy() {
        use crate::db::init_schema;
        use crate::repository::ImportRepositoryImpl;
        use rusqlite::Connection;
        use std::sync::{mpsc, Arc};

        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let shared = Arc::new(Mutex::new(conn));
        let repo = ImportRepositoryImpl::from_connection(Arc::clone(&shared)).unwrap();

        // 另一线程持有连接锁 800ms
        let (locked_tx, locked_rx) = mpsc::channel();
        let holder = Arc::clone(&shared);
        let blocker = std::thread::spawn(move || {
            let _guard = holder.lock().unwrap();
            locked_tx.send(()).unwrap();
            std::thread::sleep(Duration::from_millis(800));
        });
        locked_rx.recv().unwrap();

        let started = Instant::now();
        let result = persist(Duration::from_millis(50), repo.ping()).await;

        assert!(result.unwrap_err().contains("timed out after 50 ms"));
        assert!(started.elapsed() < Duration::from_millis(700));
        blocker.join().unwrap();

        // 锁释放后同一仓储恢复可用
        assert!(persist(Duration::from_millis(1_000), repo.ping()).await.is_ok());
    }
}
