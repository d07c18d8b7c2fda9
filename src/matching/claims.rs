//! Explicit ledger of consumed candidates and transactions.
//!
//! Claim state is never ambient: the engine builds a ledger per run, seeds
//! it from persisted results, threads it through scoring and aggregation,
//! and returns it with the run report. All claims go through
//! compare-and-claim so a candidate can never be awarded to two lines.

use std::collections::{HashMap, HashSet};

use crate::types::CandidateId;

/// Tracks which candidates and statement lines are already consumed
#[derive(Debug, Clone, Default)]
pub struct ClaimLedger {
    candidate_claims: HashMap<CandidateId, i64>,
    consumed_lines: HashSet<i64>,
    inverse_lines: HashSet<i64>,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim one candidate for a statement line.
    ///
    /// Returns `false` when another line already holds the candidate.
    /// Re-claiming by the same line is idempotent and succeeds.
    pub fn try_claim(&mut self, candidate: CandidateId, numero_ligne: i64) -> bool {
        match self.candidate_claims.get(&candidate) {
            Some(holder) => *holder == numero_ligne,
            None => {
                self.candidate_claims.insert(candidate, numero_ligne);
                true
            }
        }
    }

    /// Claim several candidates for one line, all or nothing.
    ///
    /// Aggregated matches consume every member of the combination; if any
    /// member is held elsewhere, no claim is recorded at all.
    pub fn try_claim_all(&mut self, candidates: &[CandidateId], numero_ligne: i64) -> bool {
        let blocked = candidates.iter().any(|candidate| {
            self.candidate_claims
                .get(candidate)
                .map(|holder| *holder != numero_ligne)
                .unwrap_or(false)
        });
        if blocked {
            return false;
        }
        for candidate in candidates {
            self.candidate_claims
                .insert(candidate.clone(), numero_ligne);
        }
        true
    }

    pub fn is_claimed(&self, candidate: &CandidateId) -> bool {
        self.candidate_claims.contains_key(candidate)
    }

    /// Line currently holding a candidate, if any
    pub fn claimed_by(&self, candidate: &CandidateId) -> Option<i64> {
        self.candidate_claims.get(candidate).copied()
    }

    /// Release every candidate a line holds, for supersede flows
    pub fn release_line(&mut self, numero_ligne: i64) {
        self.candidate_claims
            .retain(|_, holder| *holder != numero_ligne);
        self.consumed_lines.remove(&numero_ligne);
    }

    /// Mark a line as consumed by a full match or manual link
    pub fn consume_line(&mut self, numero_ligne: i64) {
        self.consumed_lines.insert(numero_ligne);
    }

    pub fn is_line_consumed(&self, numero_ligne: i64) -> bool {
        self.consumed_lines.contains(&numero_ligne)
    }

    /// Mark both ends of an inverse pair; linked lines leave the pool of
    /// automatically matchable transactions
    pub fn mark_inverse_pair(&mut self, a: i64, b: i64) {
        self.inverse_lines.insert(a);
        self.inverse_lines.insert(b);
    }

    pub fn in_inverse_pair(&self, numero_ligne: i64) -> bool {
        self.inverse_lines.contains(&numero_ligne)
    }

    /// Number of candidates currently claimed
    pub fn claimed_count(&self) -> usize {
        self.candidate_claims.len()
    }
}
