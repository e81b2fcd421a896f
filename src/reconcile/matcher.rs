// ==========================================
// 包装 ERP - 对账建议引擎
// ==========================================
// 规则（按流水顺序单遍处理，每笔款项至多被认领一次）:
// 1. 候选: 方向一致 且 |abs(monto) - amount| <= 金额容差 且 |日期差| <= 窗口天数
// 2. 参考号相同（不区分大小写）的候选优先
// 3. 否则取 (金额差, 相隔天数, payment_id) 最小者
// 4. 置信度: 参考号命中 或 (金额差为 0 且同日) → exact，否则 probable
// ==========================================

use crate::domain::reference::normalize_key;
use crate::domain::{
    BankStatementLine, PaymentDirection, PaymentRecord, ProposalConfidence,
    ReconciliationProposal, ReconciliationReport, RejectedStatementRow,
};
use std::collections::HashSet;
use tracing::{debug, info};

// 金额比较余量（分以下的浮点误差）
const AMOUNT_EPSILON: f64 = 1e-9;

/// 对账参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconcileParams {
    pub amount_tolerance: f64,
    pub date_window_days: i64,
}

impl Default for ReconcileParams {
    fn default() -> Self {
        Self {
            amount_tolerance: 0.01,
            date_window_days: 3,
        }
    }
}

pub struct ReconciliationEngine {
    params: ReconcileParams,
}

impl ReconciliationEngine {
    pub fn new(params: ReconcileParams) -> Self {
        Self { params }
    }

    /// 生成对账建议
    ///
    /// # 参数
    /// - lines: 已解析的流水行（文件顺序）
    /// - payments: 未对账款项
    /// - rejected: 解析阶段被拒绝的行（原样带入报告）
    pub fn propose(
        &self,
        lines: &[BankStatementLine],
        payments: &[PaymentRecord],
        rejected: Vec<RejectedStatementRow>,
    ) -> ReconciliationReport {
        let mut claimed: HashSet<i64> = HashSet::new();
        let mut report = ReconciliationReport {
            rejected_rows: rejected,
            ..ReconciliationReport::default()
        };

        for line in lines {
            match self.best_candidate(line, payments, &claimed) {
                Some(proposal) => {
                    debug!(
                        statement_row = line.row_index,
                        payment_id = proposal.payment_id,
                        confidence = ?proposal.confidence,
                        "流水行已匹配"
                    );
                    claimed.insert(proposal.payment_id);
                    report.proposals.push(proposal);
                }
                None => report.unmatched_rows.push(line.row_index),
            }
        }

        info!(
            proposals = report.proposals.len(),
            unmatched = report.unmatched_rows.len(),
            rejected = report.rejected_rows.len(),
            "对账建议已生成"
        );
        report
    }

    fn best_candidate(
        &self,
        line: &BankStatementLine,
        payments: &[PaymentRecord],
        claimed: &HashSet<i64>,
    ) -> Option<ReconciliationProposal> {
        let direction = PaymentDirection::of_statement_amount(line.amount);
        let line_amount = line.amount.abs();
        let line_reference = line.reference.as_deref().map(normalize_key);

        let candidates = payments.iter().filter_map(|payment| {
            if payment.direction != direction || claimed.contains(&payment.payment_id) {
                return None;
            }
            let amount_diff = (line_amount - payment.amount).abs();
            if amount_diff > self.params.amount_tolerance + AMOUNT_EPSILON {
                return None;
            }
            let days_apart = (line.date - payment.date).num_days().abs();
            if days_apart > self.params.date_window_days {
                return None;
            }
            let reference_match = match (&line_reference, &payment.reference) {
                (Some(line_ref), Some(payment_ref)) => normalize_key(payment_ref) == *line_ref,
                _ => false,
            };
            Some((payment, amount_diff, days_apart, reference_match))
        });

        // 参考号命中优先，其次 (金额差, 天数, id) 升序
        let (payment, amount_diff, days_apart, reference_match) =
            candidates.min_by(|a, b| {
                b.3.cmp(&a.3)
                    .then(a.1.total_cmp(&b.1))
                    .then(a.2.cmp(&b.2))
                    .then(a.0.payment_id.cmp(&b.0.payment_id))
            })?;

        let exact_amount = amount_diff <= AMOUNT_EPSILON;
        let confidence = if reference_match || (exact_amount && days_apart == 0) {
            ProposalConfidence::Exact
        } else {
            ProposalConfidence::Probable
        };

        Some(ReconciliationProposal {
            statement_row: line.row_index,
            payment_id: payment.payment_id,
            amount_diff: (amount_diff * 100.0).round() / 100.0,
            days_apart,
            reference_match,
            confidence,
            bank_reference: line.reference.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn line(row_index: usize, day: u32, amount: f64, reference: Option<&str>) -> BankStatementLine {
        BankStatementLine {
            row_index,
            date: date(day),
            description: None,
            amount,
            reference: reference.map(str::to_string),
        }
    }

    fn payment(
        payment_id: i64,
        direction: PaymentDirection,
        amount: f64,
        day: u32,
        reference: Option<&str>,
    ) -> PaymentRecord {
        PaymentRecord {
            payment_id,
            direction,
            counterparty: "Contraparte".into(),
            amount,
            date: date(day),
            reference: reference.map(str::to_string),
        }
    }

    fn engine() -> ReconciliationEngine {
        ReconciliationEngine::new(ReconcileParams::default())
    }

    #[test]
    fn test_exact_same_day_amount() {
        let report = engine().propose(
            &[line(1, 5, 1500.0, None)],
            &[payment(1, PaymentDirection::Receivable, 1500.0, 5, None)],
            vec![],
        );
        assert_eq!(report.proposals.len(), 1);
        assert_eq!(report.proposals[0].confidence, ProposalConfidence::Exact);
        assert!(report.unmatched_rows.is_empty());
    }

    #[test]
    fn test_direction_must_agree() {
        let report = engine().propose(
            &[line(1, 5, -1500.0, None)],
            &[payment(1, PaymentDirection::Receivable, 1500.0, 5, None)],
            vec![],
        );
        assert!(report.proposals.is_empty());
        assert_eq!(report.unmatched_rows, vec![1]);
    }

    #[test]
    fn test_reference_match_wins_over_closer_amount() {
        let report = engine().propose(
            &[line(1, 5, 1000.0, Some("fac-200"))],
            &[
                payment(1, PaymentDirection::Receivable, 1000.0, 5, None),
                payment(2, PaymentDirection::Receivable, 999.99, 7, Some("FAC-200")),
            ],
            vec![],
        );
        let proposal = &report.proposals[0];
        assert_eq!(proposal.payment_id, 2);
        assert!(proposal.reference_match);
        assert_eq!(proposal.confidence, ProposalConfidence::Exact);
    }

    #[test]
    fn test_window_and_tolerance_bounds() {
        let payments = [
            payment(1, PaymentDirection::Payable, 200.0, 1, None),
            payment(2, PaymentDirection::Payable, 300.0, 10, None),
        ];
        let report = engine().propose(
            &[line(1, 4, -200.01, None), line(2, 10, -300.02, None)],
            &payments,
            vec![],
        );

        // 第 1 行: 3 天、差 0.01 → 命中（probable）；第 2 行: 差 0.02 → 不命中
        assert_eq!(report.proposals.len(), 1);
        assert_eq!(report.proposals[0].payment_id, 1);
        assert_eq!(report.proposals[0].days_apart, 3);
        assert_eq!(report.proposals[0].confidence, ProposalConfidence::Probable);
        assert_eq!(report.unmatched_rows, vec![2]);
    }

    #[test]
    fn test_payment_claimed_once_in_statement_order() {
        let payments = [
            payment(5, PaymentDirection::Receivable, 100.0, 5, None),
            payment(3, PaymentDirection::Receivable, 100.0, 6, None),
        ];
        let report = engine().propose(
            &[
                line(1, 5, 100.0, None),
                line(2, 5, 100.0, None),
                line(3, 5, 100.0, None),
            ],
            &payments,
            vec![],
        );

        let claimed: Vec<i64> = report.proposals.iter().map(|p| p.payment_id).collect();
        assert_eq!(claimed, vec![5, 3]);
        assert_eq!(report.unmatched_rows, vec![3]);
    }
}
