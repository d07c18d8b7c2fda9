//! Evaluation of one rule against one transaction/candidate pair.
//!
//! Each rule kind has a closed, validated condition, so evaluation is a
//! straight match with no payload re-parsing. A rule that does not apply
//! contributes zero; it never vetoes other rules.

use chrono::Datelike;

use crate::matching::keywords::label_matches;
use crate::matching::tolerance::within_tolerance;
use crate::rules::{ReconciliationRule, RuleCondition};
use crate::types::{BankTransaction, Candidate, PartnerRef};

/// Outcome of one rule evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub applies: bool,
    /// Score contribution, the rule's flat score when it applies
    pub contribution: u8,
}

impl Evaluation {
    fn no_match() -> Self {
        Self {
            applies: false,
            contribution: 0,
        }
    }
}

/// Evaluate one rule for a transaction/candidate pair.
///
/// `detected_partner` is the counterparty resolved from the statement
/// label, when the partner directory recognized one.
pub fn evaluate(
    rule: &ReconciliationRule,
    transaction: &BankTransaction,
    detected_partner: Option<&PartnerRef>,
    candidate: &Candidate,
) -> Evaluation {
    let applies = match &rule.condition {
        RuleCondition::Amount { tolerance } => within_tolerance(
            &transaction.amount_abs(),
            candidate.amount_inclusive(),
            tolerance,
        ),
        RuleCondition::Date { window_days } => match candidate.relevant_date() {
            Some(anchor) => {
                let gap = transaction.date.signed_duration_since(anchor).num_days();
                gap.abs() <= *window_days
            }
            None => false,
        },
        RuleCondition::Label { keywords } => label_matches(&transaction.label, keywords),
        RuleCondition::TransactionType => transaction.is_debit() == candidate.expects_debit(),
        RuleCondition::Partner => match (detected_partner, candidate.partner()) {
            (Some(detected), Some(partner)) => detected.same_identity(partner),
            _ => false,
        },
        RuleCondition::MonthlySupplier {
            supplier,
            keywords,
            tolerance,
            same_month,
        } => {
            let label = transaction.label.to_lowercase();
            let supplier_present = label.contains(&supplier.to_lowercase());
            let amount_close = within_tolerance(
                &transaction.amount_abs(),
                candidate.amount_inclusive(),
                tolerance,
            );
            let month_ok = if *same_month {
                match candidate.relevant_date() {
                    Some(anchor) => {
                        (anchor.month(), anchor.year())
                            == (transaction.date.month(), transaction.date.year())
                    }
                    None => false,
                }
            } else {
                true
            };
            let keywords_ok = match keywords {
                Some(expression) => label_matches(&transaction.label, expression),
                None => true,
            };
            supplier_present && amount_close && month_ok && keywords_ok
        }
        RuleCondition::Subscription { subscription_id } => match candidate {
            Candidate::Subscription(subscription) => {
                let id_ok = subscription_id
                    .as_ref()
                    .map(|wanted| wanted == &subscription.id)
                    .unwrap_or(true);
                id_ok && label_matches(&transaction.label, &subscription.keywords)
            }
            _ => false,
        },
        RuleCondition::ChargeDeclaration { declaration_id } => match candidate {
            Candidate::Charge(charge) => {
                let id_ok = declaration_id
                    .as_ref()
                    .map(|wanted| wanted == &charge.declaration.id)
                    .unwrap_or(true);
                id_ok && label_matches(&transaction.label, &charge.declaration.keywords)
            }
            _ => false,
        },
    };

    if applies {
        Evaluation {
            applies: true,
            contribution: rule.score,
        }
    } else {
        Evaluation::no_match()
    }
}
