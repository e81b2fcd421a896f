// ==========================================
// 包装 ERP - 银行对账 API
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::db::open_sqlite_connection;
use crate::domain::{ProposalConfidence, ReconciliationProposal, ReconciliationReport};
use crate::reconcile::{parse_statement_file, ReconcileParams, ReconciliationEngine};
use crate::repository::{PaymentRepository, PaymentRepositoryImpl};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{info, instrument};

pub struct ReconcileApi {
    payment_repo: PaymentRepositoryImpl,
    config: ConfigManager,
}

impl ReconcileApi {
    pub fn new(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let config = ConfigManager::from_connection(conn.clone())
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(Self {
            payment_repo: PaymentRepositoryImpl::from_connection(conn),
            config,
        })
    }

    async fn params(&self) -> ApiResult<ReconcileParams> {
        let amount_tolerance = self
            .config
            .get_reconcile_amount_tolerance()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        let date_window_days = self
            .config
            .get_reconcile_date_window_days()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(ReconcileParams {
            amount_tolerance,
            date_window_days,
        })
    }

    /// 读取银行流水并生成对账建议（不修改任何款项）
    #[instrument(skip(self, statement_path), fields(file = %statement_path.display()))]
    pub async fn propose(&self, statement_path: &Path) -> ApiResult<ReconciliationReport> {
        let statement = parse_statement_file(statement_path)?;
        let payments = self.payment_repo.load_open_payments().await?;
        let params = self.params().await?;

        Ok(ReconciliationEngine::new(params).propose(
            &statement.lines,
            &payments,
            statement.rejected,
        ))
    }

    /// 确认一条建议: 款项标记为已对账并记录银行参考号
    pub async fn confirm(&self, proposal: &ReconciliationProposal) -> ApiResult<()> {
        self.payment_repo
            .mark_reconciled(proposal.payment_id, proposal.bank_reference.as_deref())
            .await?;
        info!(
            payment_id = proposal.payment_id,
            statement_row = proposal.statement_row,
            "款项已对账"
        );
        Ok(())
    }

    /// 批量确认 exact 建议
    ///
    /// # 返回
    /// - 已确认条数
    pub async fn confirm_exact(&self, report: &ReconciliationReport) -> ApiResult<usize> {
        let mut confirmed = 0;
        for proposal in report
            .proposals
            .iter()
            .filter(|p| p.confidence == ProposalConfidence::Exact)
        {
            self.confirm(proposal).await?;
            confirmed += 1;
        }
        Ok(confirmed)
    }
}
