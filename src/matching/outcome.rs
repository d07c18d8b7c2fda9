//! Construction of reconciliation result records.
//!
//! Classification:
//! - `matched` when the full amount is explained, by one candidate or an
//!   aggregated combination, or by an explicit manual link.
//! - `partial` when a combination explains some of the amount; the
//!   residual goes into the notes.
//! - `uncertain` when candidates scored but none survives, including
//!   ambiguous score ties.
//! - `unmatched` when nothing scored above zero.

use bigdecimal::BigDecimal;
use uuid::Uuid;

use crate::types::{CandidateId, MatchStatus, ReconciliationResult};

/// Accumulates the fields of one result record before sealing it
#[derive(Debug, Clone)]
pub struct ResultBuilder {
    numero_ligne: i64,
    linked: Vec<CandidateId>,
    matched_amount: BigDecimal,
    score: u8,
    status: MatchStatus,
    rule_trail: Vec<i64>,
    notes: Vec<String>,
    manual: bool,
}

impl ResultBuilder {
    /// No candidate scored above zero
    pub fn unmatched(numero_ligne: i64) -> Self {
        Self {
            numero_ligne,
            linked: Vec::new(),
            matched_amount: BigDecimal::from(0),
            score: 0,
            status: MatchStatus::Unmatched,
            rule_trail: Vec::new(),
            notes: Vec::new(),
            manual: false,
        }
    }

    /// Full amount explained by the linked candidate(s)
    pub fn matched(
        numero_ligne: i64,
        linked: Vec<CandidateId>,
        matched_amount: BigDecimal,
        score: u8,
        rule_trail: Vec<i64>,
    ) -> Self {
        Self {
            numero_ligne,
            linked,
            matched_amount,
            score,
            status: MatchStatus::Matched,
            rule_trail,
            notes: Vec::new(),
            manual: false,
        }
    }

    /// Candidates scored but none fully explains the amount
    pub fn uncertain(numero_ligne: i64, score: u8, rule_trail: Vec<i64>) -> Self {
        Self {
            numero_ligne,
            linked: Vec::new(),
            matched_amount: BigDecimal::from(0),
            score,
            status: MatchStatus::Uncertain,
            rule_trail,
            notes: Vec::new(),
            manual: false,
        }
    }

    /// Aggregation explained part of the amount; the residual is recorded
    pub fn partial(
        numero_ligne: i64,
        linked: Vec<CandidateId>,
        matched_amount: BigDecimal,
        residual: &BigDecimal,
        score: u8,
        rule_trail: Vec<i64>,
    ) -> Self {
        let mut builder = Self {
            numero_ligne,
            linked,
            matched_amount,
            score,
            status: MatchStatus::Partial,
            rule_trail,
            notes: Vec::new(),
            manual: false,
        };
        builder
            .notes
            .push(format!("unexplained residual: {}", residual));
        builder
    }

    /// Explicit manual link; always `matched`, bypasses scoring
    pub fn manual(numero_ligne: i64, linked: Vec<CandidateId>, matched_amount: BigDecimal) -> Self {
        Self {
            numero_ligne,
            linked,
            matched_amount,
            score: 100,
            status: MatchStatus::Matched,
            rule_trail: Vec::new(),
            notes: Vec::new(),
            manual: true,
        }
    }

    /// Append a free-text note
    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Seal the record with a fresh id and timestamp
    pub fn build(self) -> ReconciliationResult {
        let notes = if self.notes.is_empty() {
            None
        } else {
            Some(self.notes.join("; "))
        };
        ReconciliationResult {
            id: Uuid::new_v4(),
            numero_ligne: self.numero_ligne,
            linked: self.linked,
            matched_amount: self.matched_amount,
            score: self.score,
            status: self.status,
            rule_trail: self.rule_trail,
            notes,
            manual: self.manual,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}
