// ==========================================
// 包装 ERP - 导入 Repository 实现
// ==========================================
// 职责: 实现导入相关数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则，只做数据 CRUD
// ==========================================

use crate::db::{configure_sqlite_connection, open_sqlite_connection};
use crate::domain::{
    ClientRecord, ClientRef, DielineRecord, ImportCounts, ImportLogEntry, ImportSource,
    ImportVariant, ManifestEntry, QuotationRecord, TechnicalRecord,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_repo::ImportRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// ImportRepositoryImpl
// ==========================================
pub struct ImportRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建（对传入连接再次应用统一 PRAGMA，幂等）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            configure_sqlite_connection(&guard)?;
        }
        Ok(Self { conn })
    }

    /// 在阻塞线程池中持锁执行数据库操作
    ///
    /// rusqlite 调用与连接锁等待都在阻塞线程上进行，
    /// 调用方包裹的 tokio::time::timeout 因此可以按时触发。
    /// 超时后该操作仍会在后台执行完毕。
    async fn with_conn<T, F>(&self, op: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> RepositoryResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            op(&*guard)
        })
        .await
        .map_err(|e| RepositoryError::InternalError(format!("blocking task failed: {}", e)))?
    }
}

/// import_log 行（未解析）
struct ImportLogRow {
    log_id: String,
    variant: String,
    file_name: String,
    file_size_bytes: i64,
    counts: [i64; 7],
    cancelled: bool,
    error_manifest_json: String,
    imported_by: String,
    started_at: String,
    finished_at: String,
    elapsed_ms: i64,
}

impl ImportLogRow {
    fn into_entry(self) -> RepositoryResult<ImportLogEntry> {
        let variant = ImportVariant::parse(&self.variant).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "variant".to_string(),
                message: format!("unknown import variant '{}'", self.variant),
            }
        })?;
        let error_manifest: Vec<ManifestEntry> = serde_json::from_str(&self.error_manifest_json)?;
        let [total_rows, blocked, eligible, inserted, updated, errored, skipped] =
            self.counts.map(|c| c.max(0) as usize);

        Ok(ImportLogEntry {
            log_id: self.log_id,
            variant,
            source: ImportSource {
                file_name: self.file_name,
                file_size_bytes: self.file_size_bytes.max(0) as u64,
            },
            counts: ImportCounts {
                total_rows,
                blocked,
                eligible,
                inserted,
                updated,
                errored,
                skipped,
            },
            cancelled: self.cancelled,
            error_manifest,
            imported_by: self.imported_by,
            started_at: parse_timestamp("started_at", &self.started_at)?,
            finished_at: parse_timestamp("finished_at", &self.finished_at)?,
            elapsed_ms: self.elapsed_ms,
        })
    }
}

fn parse_timestamp(field: &str, raw: &str) -> RepositoryResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::FieldValueError {
            field: field.to_string(),
            message: e.to_string(),
        })
}

#[async_trait]
impl ImportRepository for ImportRepositoryImpl {
    async fn ping(&self) -> RepositoryResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }

    async fn load_clients(&self) -> RepositoryResult<Vec<ClientRef>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT client_id, client_code, name, rfc FROM client ORDER BY client_id",
            )?;

            let clients = stmt
                .query_map([], |row| {
                    Ok(ClientRef {
                        client_id: row.get(0)?,
                        client_code: row.get(1)?,
                        name: row.get(2)?,
                        rfc: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(clients)
        })
        .await
    }

    async fn load_dielines(&self) -> RepositoryResult<Vec<TechnicalRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT dieline_id, sku, product_name, height_mm, width_mm, depth_mm,
                       die_id, material, layout
                FROM dieline
                ORDER BY dieline_id
                "#,
            )?;

            let dielines = stmt
                .query_map([], |row| {
                    Ok(TechnicalRecord {
                        dieline_id: row.get(0)?,
                        sku: row.get(1)?,
                        product_name: row.get(2)?,
                        height_mm: row.get(3)?,
                        width_mm: row.get(4)?,
                        depth_mm: row.get(5)?,
                        die_id: row.get(6)?,
                        material: row.get(7)?,
                        layout: row.get(8)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;

            Ok(dielines)
        })
        .await
    }

    async fn insert_client(&self, client: &ClientRecord) -> RepositoryResult<i64> {
        let client = client.clone();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();

            conn.execute(
                r#"
                INSERT INTO client (
                    client_code, name, rfc, email, phone, city, client_type,
                    credit_days, credit_limit, is_placeholder, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
                "#,
                params![
                    client.client_code,
                    client.name,
                    client.rfc,
                    client.email,
                    client.phone,
                    client.city,
                    client.client_type,
                    client.credit_days,
                    client.credit_limit,
                    client.is_placeholder as i32,
                    now,
                ],
            )?;

            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update_client(&self, client_id: i64, client: &ClientRecord) -> RepositoryResult<()> {
        let client = client.clone();
        self.with_conn(move |conn| {
            let affected = conn.execute(
                r#"
                UPDATE client SET
                    name = ?2,
                    rfc = COALESCE(?3, rfc),
                    email = COALESCE(?4, email),
                    phone = COALESCE(?5, phone),
                    city = COALESCE(?6, city),
                    client_type = COALESCE(?7, client_type),
                    credit_days = COALESCE(?8, credit_days),
                    credit_limit = COALESCE(?9, credit_limit),
                    is_placeholder = ?10,
                    updated_at = ?11
                WHERE client_id = ?1
                "#,
                params![
                    client_id,
                    client.name,
                    client.rfc,
                    client.email,
                    client.phone,
                    client.city,
                    client.client_type,
                    client.credit_days,
                    client.credit_limit,
                    client.is_placeholder as i32,
                    Utc::now().to_rfc3339(),
                ],
            )?;

            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "client".to_string(),
                    id: client_id.to_string(),
                });
            }
            Ok(())
        })
        .await
    }

    async fn insert_dieline(&self, dieline: &DielineRecord) -> RepositoryResult<i64> {
        let dieline = dieline.clone();
        self.with_conn(move |conn| {
            let now = Utc::now().to_rfc3339();

            conn.execute(
                r#"
                INSERT INTO dieline (
                    sku, product_name, height_mm, width_mm, depth_mm,
                    die_id, material, layout, client_id, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                "#,
                params![
                    dieline.sku,
                    dieline.product_name,
                    dieline.height_mm,
                    dieline.width_mm,
                    dieline.depth_mm,
                    dieline.die_id,
                    dieline.material,
                    dieline.layout,
                    dieline.client_id,
                    now,
                ],
            )?;

            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn update_dieline(
        &self,
        dieline_id: i64,
        dieline: &DielineRecord,
    ) -> RepositoryResult<()> {
        let dieline = dieline.clone();
        self.with_conn(move |conn| {
            let affected = conn.execute(
                r#"
                UPDATE dieline SET
                    sku = ?2,
                    product_name = ?3,
                    height_mm = ?4,
                    width_mm = ?5,
                    depth_mm = ?6,
                    die_id = COALESCE(?7, die_id),
                    material = COALESCE(?8, material),
                    layout = COALESCE(?9, layout),
                    client_id = COALESCE(?10, client_id),
                    updated_at = ?11
                WHERE dieline_id = ?1
                "#,
                params![
                    dieline_id,
                    dieline.sku,
                    dieline.product_name,
                    dieline.height_mm,
                    dieline.width_mm,
                    dieline.depth_mm,
                    dieline.die_id,
                    dieline.material,
                    dieline.layout,
                    dieline.client_id,
                    Utc::now().to_rfc3339(),
                ],
            )?;

            if affected == 0 {
                return Err(RepositoryError::NotFound {
                    entity: "dieline".to_string(),
                    id: dieline_id.to_string(),
                });
            }
            Ok(())
        })
        .await
    }

    async fn insert_quotation(&self, quotation: &QuotationRecord) -> RepositoryResult<i64> {
        let quotation = quotation.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO quotation (
                    client_id, dieline_id, match_type, sku, product_name, quantity, unit_price,
                    currency, packaging_type, height_cm, width_cm, depth_cm, die_id, material,
                    layout, finish, validity_days, notes, source_row, created_by, created_at
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                    ?15, ?16, ?17, ?18, ?19, ?20, ?21
                )
                "#,
                params![
                    quotation.client_id,
                    quotation.dieline_id,
                    quotation.match_type.as_str(),
                    quotation.sku,
                    quotation.product_name,
                    quotation.quantity,
                    quotation.unit_price,
                    quotation.currency,
                    quotation.packaging_type,
                    quotation.height_cm,
                    quotation.width_cm,
                    quotation.depth_cm,
                    quotation.die_id,
                    quotation.material,
                    quotation.layout,
                    quotation.finish,
                    quotation.validity_days,
                    quotation.notes,
                    quotation.source_row as i64,
                    quotation.created_by,
                    Utc::now().to_rfc3339(),
                ],
            )?;

            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn insert_import_log(&self, entry: &ImportLogEntry) -> RepositoryResult<()> {
        let manifest_json = serde_json::to_string(&entry.error_manifest)?;
        let entry = entry.clone();
        self.with_conn(move |conn| {
            conn.execute(
                r#"
                INSERT INTO import_log (
                    log_id, variant, file_name, file_size_bytes,
                    total_rows, blocked_rows, eligible_rows, inserted_rows, updated_rows,
                    errored_rows, skipped_rows, cancelled, error_manifest_json,
                    imported_by, started_at, finished_at, elapsed_ms
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
                "#,
                params![
                    entry.log_id,
                    entry.variant.as_str(),
                    entry.source.file_name,
                    entry.source.file_size_bytes as i64,
                    entry.counts.total_rows as i64,
                    entry.counts.blocked as i64,
                    entry.counts.eligible as i64,
                    entry.counts.inserted as i64,
                    entry.counts.updated as i64,
                    entry.counts.errored as i64,
                    entry.counts.skipped as i64,
                    entry.cancelled as i32,
                    manifest_json,
                    entry.imported_by,
                    entry.started_at.to_rfc3339(),
                    entry.finished_at.to_rfc3339(),
                    entry.elapsed_ms,
                ],
            )?;

            Ok(())
        })
        .await
    }

    async fn list_import_logs(&self, limit: usize) -> RepositoryResult<Vec<ImportLogEntry>> {
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT log_id, variant, file_name, file_size_bytes,
                           total_rows, blocked_rows, eligible_rows, inserted_rows, updated_rows,
                           errored_rows, skipped_rows, cancelled, error_manifest_json,
                           imported_by, started_at, finished_at, elapsed_ms
                    FROM import_log
                    ORDER BY finished_at DESC
                    LIMIT ?1
                    "#,
                )?;

                let rows = stmt
                    .query_map(params![limit as i64], |row| {
                        Ok(ImportLogRow {
                            log_id: row.get(0)?,
                            variant: row.get(1)?,
                            file_name: row.get(2)?,
                            file_size_bytes: row.get(3)?,
                            counts: [
                                row.get(4)?,
                                row.get(5)?,
                                row.get(6)?,
                                row.get(7)?,
                                row.get(8)?,
                                row.get(9)?,
                                row.get(10)?,
                            ],
                            cancelled: row.get::<_, i64>(11)? != 0,
                            error_manifest_json: row.get(12)?,
                            imported_by: row.get(13)?,
                            started_at: row.get(14)?,
                            finished_at: row.get(15)?,
                            elapsed_ms: row.get(16)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(ImportLogRow::into_entry).collect()
    }
}
