//! Detection of offsetting transaction pairs.
//!
//! A refund, a bounced debit, or an internal transfer shows up as two
//! statement lines of opposite sign that cancel each other. Pairing them
//! takes both lines out of the pool of automatically matchable
//! transactions instead of leaving two permanently unexplained lines.

use bigdecimal::BigDecimal;

use crate::matching::tolerance::within_tolerance;
use crate::types::{BankTransaction, EngineError, EngineResult, InverseLink, PartnerRef};

/// One statement line of the scan pool, with its detected partner and
/// whether it is already out of reach (matched or inverse-linked)
#[derive(Debug, Clone)]
pub struct PoolLine<'a> {
    pub transaction: &'a BankTransaction,
    pub partner: Option<PartnerRef>,
    pub excluded: bool,
}

/// A candidate counterpart for an inverse pair
#[derive(Debug, Clone, PartialEq)]
pub struct InverseCandidate {
    pub numero_ligne: i64,
    /// Sum of the two signed amounts
    pub solde: BigDecimal,
    /// Whether the pair cancels out, `|solde|` strictly under the tolerance
    pub balanced: bool,
}

/// Whether a pair balance cancels out. The bound is strict: a residual of
/// exactly one cent (at the default tolerance) is not balanced.
pub fn is_balanced(solde: &BigDecimal, tolerance: &BigDecimal) -> bool {
    solde.abs() < *tolerance
}

/// Scan the pool for counterparts offsetting the source line.
///
/// A counterpart must be a different line, still reachable, of opposite
/// sign, with an absolute amount within `tolerance` of the source's.
/// Partner constraints apply when resolved: two resolved partners must be
/// the same identity, one-sided resolution disqualifies the pair, and two
/// unresolved sides pair freely. `filter` optionally narrows the scan by a
/// case-insensitive needle against label, line number, or partner name.
///
/// Balanced candidates come first, then ascending line numbers.
pub fn find_candidates(
    source: &BankTransaction,
    source_partner: Option<&PartnerRef>,
    pool: &[PoolLine<'_>],
    tolerance: &BigDecimal,
    filter: Option<&str>,
) -> Vec<InverseCandidate> {
    let zero = BigDecimal::from(0);
    let source_amount = source.signed_amount();
    if source_amount == zero {
        return Vec::new();
    }

    let needle = filter
        .map(str::trim)
        .filter(|needle| !needle.is_empty())
        .map(str::to_lowercase);

    let mut candidates: Vec<InverseCandidate> = pool
        .iter()
        .filter(|line| {
            let tx = line.transaction;
            if tx.numero_ligne == source.numero_ligne || line.excluded {
                return false;
            }
            let amount = tx.signed_amount();
            if amount == zero || (amount > zero) == (source_amount > zero) {
                return false;
            }
            if !within_tolerance(&source.amount_abs(), &tx.amount_abs(), tolerance) {
                return false;
            }
            match (source_partner, line.partner.as_ref()) {
                (Some(a), Some(b)) => {
                    if !a.same_identity(b) {
                        return false;
                    }
                }
                (None, None) => {}
                _ => return false,
            }
            if let Some(needle) = &needle {
                let partner_name = line
                    .partner
                    .as_ref()
                    .map(|partner| partner.name.to_lowercase())
                    .unwrap_or_default();
                let matches = tx.label.to_lowercase().contains(needle)
                    || tx.numero_ligne.to_string().contains(needle.as_str())
                    || (!partner_name.is_empty() && partner_name.contains(needle));
                if !matches {
                    return false;
                }
            }
            true
        })
        .map(|line| {
            let solde = &source_amount + line.transaction.signed_amount();
            let balanced = is_balanced(&solde, tolerance);
            InverseCandidate {
                numero_ligne: line.transaction.numero_ligne,
                solde,
                balanced,
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.balanced
            .cmp(&a.balanced)
            .then(a.numero_ligne.cmp(&b.numero_ligne))
    });
    candidates
}

/// Build the link record for a confirmed pair.
///
/// Same-line and same-sign pairs are rejected outright. An unbalanced
/// residual is a soft warning carried alongside the link, not an error;
/// the operator may still confirm the pair.
pub fn build_link(
    source: &BankTransaction,
    counterpart: &BankTransaction,
    tolerance: &BigDecimal,
) -> EngineResult<(InverseLink, Option<String>)> {
    if source.numero_ligne == counterpart.numero_ligne {
        return Err(EngineError::InverseLink(format!(
            "line {} cannot offset itself",
            source.numero_ligne
        )));
    }

    let zero = BigDecimal::from(0);
    let source_amount = source.signed_amount();
    let counterpart_amount = counterpart.signed_amount();
    if source_amount == zero || counterpart_amount == zero {
        return Err(EngineError::InverseLink(
            "zero-amount lines cannot form an offsetting pair".to_string(),
        ));
    }
    if (source_amount > zero) == (counterpart_amount > zero) {
        return Err(EngineError::InverseLink(format!(
            "lines {} and {} have the same sign",
            source.numero_ligne, counterpart.numero_ligne
        )));
    }

    let solde = &source_amount + &counterpart_amount;
    let balanced = is_balanced(&solde, tolerance);
    let warning = if balanced {
        None
    } else {
        Some(format!(
            "offsetting pair {} / {} leaves a residual of {}",
            source.numero_ligne, counterpart.numero_ligne, solde
        ))
    };

    Ok((
        InverseLink {
            source_ligne: source.numero_ligne,
            counterpart_ligne: counterpart.numero_ligne,
            solde,
            balanced,
            created_at: chrono::Utc::now().naive_utc(),
        },
        warning,
    ))
}
