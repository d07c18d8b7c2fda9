//! Score accumulation across the active rule set.
//!
//! Every rule is evaluated for every candidate; there is no early exit, so
//! a strong amount match and a weak label match both leave their trace.
//! Scores cap at 100. A score tie between candidates is only resolved when
//! one of them earned its score through a strictly higher-priority rule;
//! otherwise the tie is surfaced as ambiguous instead of silently picking
//! a winner.

use crate::matching::rule_eval::evaluate;
use crate::rules::ReconciliationRule;
use crate::types::{BankTransaction, Candidate, CandidateId, PartnerRef};

const SCORE_CAP: u8 = 100;

/// Accumulated score of one candidate for one transaction
#[derive(Debug, Clone)]
pub struct CandidateScore {
    /// Index into the candidate slice that was scored
    pub index: usize,
    pub candidate_id: CandidateId,
    /// Accumulated score, capped at 100
    pub total: u8,
    /// Ids of the rules that contributed, in evaluation order
    pub rule_trail: Vec<i64>,
    /// Lowest priority value among contributing rules
    pub best_priority: Option<i32>,
}

/// Winner selection over a scored candidate set
#[derive(Debug, Clone)]
pub struct BestSelection {
    /// Indices of the retained candidate(s), ordered by candidate id
    pub indices: Vec<usize>,
    pub score: u8,
    /// True when several candidates remain tied after the priority
    /// tie-break; the caller must not auto-resolve this
    pub ambiguous: bool,
}

/// Scores of all candidates for one transaction
#[derive(Debug, Clone)]
pub struct ScoreBoard {
    scores: Vec<CandidateScore>,
}

impl ScoreBoard {
    /// Evaluate all rules against all candidates for one transaction.
    ///
    /// `rules` must already be sorted for evaluation (priority, then id).
    pub fn score(
        transaction: &BankTransaction,
        detected_partner: Option<&PartnerRef>,
        candidates: &[&Candidate],
        rules: &[ReconciliationRule],
    ) -> Self {
        let mut scores = Vec::with_capacity(candidates.len());
        for (index, candidate) in candidates.iter().enumerate() {
            let mut total: u8 = 0;
            let mut rule_trail = Vec::new();
            let mut best_priority: Option<i32> = None;
            for rule in rules {
                let evaluation = evaluate(rule, transaction, detected_partner, candidate);
                if evaluation.applies {
                    total = total.saturating_add(evaluation.contribution).min(SCORE_CAP);
                    rule_trail.push(rule.id);
                    best_priority = Some(match best_priority {
                        Some(current) => current.min(rule.priority),
                        None => rule.priority,
                    });
                }
            }
            scores.push(CandidateScore {
                index,
                candidate_id: candidate.id(),
                total,
                rule_trail,
                best_priority,
            });
        }
        Self { scores }
    }

    pub fn scores(&self) -> &[CandidateScore] {
        &self.scores
    }

    /// Score entry for a candidate index
    pub fn entry(&self, index: usize) -> Option<&CandidateScore> {
        self.scores.iter().find(|score| score.index == index)
    }

    /// Select the best-scoring candidate(s).
    ///
    /// Returns `None` when no candidate scored above zero. A score tie goes
    /// to the candidate whose contributing rules include the strictly
    /// lowest priority value; candidates still tied after that are all
    /// returned with `ambiguous` set, ordered by candidate id so reports
    /// stay deterministic.
    pub fn best(&self) -> Option<BestSelection> {
        let top = self
            .scores
            .iter()
            .map(|score| score.total)
            .max()
            .filter(|total| *total > 0)?;

        let tied: Vec<&CandidateScore> = self
            .scores
            .iter()
            .filter(|score| score.total == top)
            .collect();

        let winning_priority = tied
            .iter()
            .filter_map(|score| score.best_priority)
            .min();
        let mut retained: Vec<&CandidateScore> = tied
            .iter()
            .filter(|score| score.best_priority == winning_priority)
            .copied()
            .collect();
        retained.sort_by(|a, b| a.candidate_id.cmp(&b.candidate_id));

        Some(BestSelection {
            indices: retained.iter().map(|score| score.index).collect(),
            score: top,
            ambiguous: retained.len() > 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleCondition;
    use crate::types::{Invoice, InvoiceDirection, PartnerRef};
    use bigdecimal::BigDecimal;
    use chrono::NaiveDate;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn invoice(number: &str, issued: NaiveDate, ttc: &str) -> Candidate {
        Candidate::Invoice(Invoice {
            number: number.to_string(),
            direction: InvoiceDirection::Purchase,
            issue_date: issued,
            partner: PartnerRef::named("ACME"),
            total_pre_tax: dec(ttc),
            total_vat: BigDecimal::from(0),
            total_inclusive: dec(ttc),
        })
    }

    fn rule(id: i64, priority: i32, score: u8, condition: RuleCondition) -> ReconciliationRule {
        ReconciliationRule {
            priority,
            score,
            ..ReconciliationRule::new(id, format!("rule {}", id), condition)
        }
    }

    fn amount_rule(id: i64, priority: i32, score: u8) -> ReconciliationRule {
        rule(
            id,
            priority,
            score,
            RuleCondition::Amount {
                tolerance: dec("0.01"),
            },
        )
    }

    #[test]
    fn test_applicable_rules_accumulate_without_early_exit() {
        let tx = BankTransaction::new(
            1,
            date(2024, 3, 5),
            "PRLV ACME",
            dec("100.00"),
            BigDecimal::from(0),
        );
        let candidate = invoice("F-1", date(2024, 3, 4), "100.00");
        let rules = vec![
            amount_rule(1, 10, 30),
            rule(2, 20, 25, RuleCondition::Date { window_days: 7 }),
            rule(3, 30, 15, RuleCondition::TransactionType),
        ];

        let board = ScoreBoard::score(&tx, None, &[&candidate], &rules);
        let entry = &board.scores()[0];
        assert_eq!(entry.total, 70);
        assert_eq!(entry.rule_trail, vec![1, 2, 3]);
        assert_eq!(entry.best_priority, Some(10));
    }

    #[test]
    fn test_score_caps_at_one_hundred() {
        let tx = BankTransaction::new(
            1,
            date(2024, 3, 5),
            "PRLV ACME",
            dec("100.00"),
            BigDecimal::from(0),
        );
        let candidate = invoice("F-1", date(2024, 3, 5), "100.00");
        let rules = vec![
            amount_rule(1, 10, 60),
            rule(2, 20, 60, RuleCondition::Date { window_days: 7 }),
        ];

        let board = ScoreBoard::score(&tx, None, &[&candidate], &rules);
        assert_eq!(board.scores()[0].total, 100);
    }

    #[test]
    fn test_score_tie_resolved_by_contributing_priority() {
        let tx = BankTransaction::new(
            1,
            date(2024, 3, 5),
            "PRLV ACME",
            dec("100.00"),
            BigDecimal::from(0),
        );
        // one candidate matched through a priority-10 amount rule, the
        // other through a priority-50 date rule, equal totals
        let by_amount = invoice("F-1", date(2024, 1, 1), "100.00");
        let by_date = invoice("F-2", date(2024, 3, 5), "42.00");
        let rules = vec![
            amount_rule(1, 10, 20),
            rule(2, 50, 20, RuleCondition::Date { window_days: 0 }),
        ];

        let board = ScoreBoard::score(&tx, None, &[&by_amount, &by_date], &rules);
        let best = board.best().unwrap();
        assert_eq!(best.score, 20);
        assert!(!best.ambiguous);
        assert_eq!(best.indices, vec![0]);
    }

    #[test]
    fn test_unresolvable_tie_is_flagged_ambiguous() {
        let tx = BankTransaction::new(
            1,
            date(2024, 3, 5),
            "PRLV ACME",
            dec("100.00"),
            BigDecimal::from(0),
        );
        let first = invoice("F-1", date(2024, 3, 1), "100.00");
        let second = invoice("F-2", date(2024, 3, 2), "100.00");
        let rules = vec![amount_rule(1, 10, 20)];

        let board = ScoreBoard::score(&tx, None, &[&second, &first], &rules);
        let best = board.best().unwrap();
        assert!(best.ambiguous);
        // ordered by candidate id, not by slice position
        let ids: Vec<CandidateId> = best
            .indices
            .iter()
            .map(|index| board.entry(*index).unwrap().candidate_id.clone())
            .collect();
        assert_eq!(
            ids,
            vec![
                CandidateId::Invoice("F-1".to_string()),
                CandidateId::Invoice("F-2".to_string()),
            ]
        );
    }

    #[test]
    fn test_no_positive_score_means_no_best() {
        let tx = BankTransaction::new(
            1,
            date(2024, 3, 5),
            "VIR SEPA INCONNU",
            BigDecimal::from(0),
            dec("77.70"),
        );
        let candidate = invoice("F-1", date(2024, 1, 1), "100.00");
        let rules = vec![amount_rule(1, 10, 20)];

        let board = ScoreBoard::score(&tx, None, &[&candidate], &rules);
        assert!(board.best().is_none());
    }
}
