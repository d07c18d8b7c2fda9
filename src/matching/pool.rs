//! Candidate pool assembly for one engine run.
//!
//! All candidate documents are loaded once before scoring starts: invoices
//! and subscriptions as-is, charge payments joined to their declarations
//! with the effective accounting period resolved up front. The pool also
//! carries a partner directory used to detect which counterparty a
//! statement label refers to.

use std::collections::HashMap;

use crate::matching::period::{effective_period, ChargeSibling};
use crate::types::{
    Candidate, ChargeCandidate, ChargeCategory, ChargeDeclaration, ChargePayment, Invoice,
    PartnerRef, Subscription,
};

/// Immutable candidate pool for one run
#[derive(Debug, Clone)]
pub struct CandidatePool {
    candidates: Vec<Candidate>,
    partners: Vec<PartnerRef>,
}

impl CandidatePool {
    /// Build the pool from raw store listings.
    ///
    /// Charge payments referencing an unknown declaration are skipped and
    /// reported in the returned issue list rather than aborting the run.
    pub fn assemble(
        invoices: Vec<Invoice>,
        subscriptions: Vec<Subscription>,
        declarations: Vec<ChargeDeclaration>,
        payments: Vec<ChargePayment>,
    ) -> (Self, Vec<String>) {
        let mut issues = Vec::new();
        let mut partners: Vec<PartnerRef> = Vec::new();

        let remember_partner = |partner: &PartnerRef, partners: &mut Vec<PartnerRef>| {
            if !partners.iter().any(|known| known == partner) {
                partners.push(partner.clone());
            }
        };

        let mut candidates: Vec<Candidate> = Vec::new();
        for invoice in invoices {
            remember_partner(&invoice.partner, &mut partners);
            candidates.push(Candidate::Invoice(invoice));
        }
        for subscription in subscriptions {
            remember_partner(&subscription.partner, &mut partners);
            candidates.push(Candidate::Subscription(subscription));
        }

        let by_id: HashMap<&str, &ChargeDeclaration> = declarations
            .iter()
            .map(|declaration| (declaration.id.as_str(), declaration))
            .collect();

        // Same-day ranking needs the full sibling set per category before
        // any single payment can be resolved.
        let mut siblings: HashMap<ChargeCategory, Vec<ChargeSibling>> = HashMap::new();
        for payment in &payments {
            if let Some(declaration) = by_id.get(payment.declaration_id.as_str()) {
                siblings
                    .entry(declaration.category)
                    .or_default()
                    .push(ChargeSibling::new(declaration.id.clone(), payment.date));
            }
        }

        for payment in payments {
            match by_id.get(payment.declaration_id.as_str()) {
                Some(declaration) => {
                    let category_siblings = siblings
                        .get(&declaration.category)
                        .map(|set| set.as_slice())
                        .unwrap_or(&[]);
                    let period = effective_period(
                        payment.date,
                        declaration.category,
                        &declaration.id,
                        category_siblings,
                    );
                    candidates.push(Candidate::Charge(ChargeCandidate {
                        declaration: (*declaration).clone(),
                        payment,
                        effective_period: period,
                    }));
                }
                None => issues.push(format!(
                    "charge payment on {} references unknown declaration '{}'",
                    payment.date, payment.declaration_id
                )),
            }
        }

        (
            Self {
                candidates,
                partners,
            },
            issues,
        )
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Detect the counterparty a statement label refers to, by scanning the
    /// partner directory for names appearing in the label. The longest
    /// matching name wins so "ORANGE BUSINESS" beats "ORANGE"; remaining
    /// ties resolve alphabetically.
    pub fn detect_partner(&self, label: &str) -> Option<&PartnerRef> {
        let haystack = label.to_lowercase();
        self.partners
            .iter()
            .filter(|partner| {
                let name = partner.name.trim().to_lowercase();
                !name.is_empty() && haystack.contains(&name)
            })
            .max_by(|a, b| {
                a.name
                    .len()
                    .cmp(&b.name.len())
                    .then_with(|| b.name.cmp(&a.name))
            })
    }
}
