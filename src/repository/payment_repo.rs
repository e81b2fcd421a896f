// ==========================================
// 包装 ERP - 款项 Repository
// ==========================================
// 职责: 银行对账所需的未对账款项查询与对账回写
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::{PaymentDirection, PaymentRecord};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// PaymentRepository Trait
// ==========================================
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// 加载所有未对账款项（按日期、ID 升序）
    async fn load_open_payments(&self) -> RepositoryResult<Vec<PaymentRecord>>;

    /// 新建款项（返回 payment_id）
    async fn insert_payment(&self, payment: &PaymentRecord) -> RepositoryResult<i64>;

    /// 标记已对账并记录银行参考号
    ///
    /// # 返回
    /// - Err(NotFound): 款项不存在或已对账
    async fn mark_reconciled(
        &self,
        payment_id: i64,
        bank_reference: Option<&str>,
    ) -> RepositoryResult<()>;
}

// ==========================================
// PaymentRepositoryImpl
// ==========================================
pub struct PaymentRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl PaymentRepositoryImpl {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

#[async_trait]
impl PaymentRepository for PaymentRepositoryImpl {
    async fn load_open_payments(&self) -> RepositoryResult<Vec<PaymentRecord>> {
        let raw = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare(
                r#"
                SELECT payment_id, direction, counterparty, amount, payment_date, reference
                FROM payment
                WHERE reconciled = 0
                ORDER BY payment_date, payment_id
                "#,
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        raw.into_iter()
            .map(|(payment_id, direction, counterparty, amount, date, reference)| {
                let direction = PaymentDirection::parse(&direction).ok_or_else(|| {
                    RepositoryError::FieldValueError {
                        field: "direction".to_string(),
                        message: format!("unknown payment direction '{}'", direction),
                    }
                })?;
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
                    RepositoryError::FieldValueError {
                        field: "payment_date".to_string(),
                        message: e.to_string(),
                    }
                })?;
                Ok(PaymentRecord {
                    payment_id,
                    direction,
                    counterparty,
                    amount,
                    date,
                    reference,
                })
            })
            .collect()
    }

    async fn insert_payment(&self, payment: &PaymentRecord) -> RepositoryResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO payment (direction, counterparty, amount, payment_date, reference)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                payment.direction.as_str(),
                payment.counterparty,
                payment.amount,
                payment.date.format("%Y-%m-%d").to_string(),
                payment.reference,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn mark_reconciled(
        &self,
        payment_id: i64,
        bank_reference: Option<&str>,
    ) -> RepositoryResult<()> {
        let conn = self.lock()?;
        let affected = conn.execute(
            r#"
            UPDATE payment
            SET reconciled = 1, bank_reference = ?2, reconciled_at = ?3
            WHERE payment_id = ?1 AND reconciled = 0
            "#,
            params![payment_id, bank_reference, Utc::now().to_rfc3339()],
        )?;

        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "open payment".to_string(),
                id: payment_id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn create_repo() -> PaymentRepositoryImpl {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        PaymentRepositoryImpl::from_connection(Arc::new(Mutex::new(conn)))
    }

    fn payment(amount: f64, day: u32) -> PaymentRecord {
        PaymentRecord {
            payment_id: 0,
            direction: PaymentDirection::Receivable,
            counterparty: "Farmacias del Norte".to_string(),
            amount,
            date: NaiveDate::from_ymd_opt(2026, 3, day).unwrap(),
            reference: Some("FAC-100".to_string()),
        }
    }

    #[tokio::test]
    async fn test_reconciled_payment_leaves_open_set() {
        let repo = create_repo();
        let first = repo.insert_payment(&payment(1500.0, 2)).await.unwrap();
        repo.insert_payment(&payment(300.0, 1)).await.unwrap();

        let open = repo.load_open_payments().await.unwrap();
        assert_eq!(open.len(), 2);
        assert_eq!(open[0].amount, 300.0);

        repo.mark_reconciled(first, Some("BNK-77")).await.unwrap();
        let open = repo.load_open_payments().await.unwrap();
        assert_eq!(open.len(), 1);

        let err = repo.mark_reconciled(first, None).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
