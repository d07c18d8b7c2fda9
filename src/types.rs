//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single bank-statement line.
///
/// Imported once from the statement feed and immutable afterwards; only its
/// reconciliation outcome (held in [`ReconciliationResult`] records) evolves.
/// The stable line number `numero_ligne` is the sole identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Stable statement line number, unique within the account
    pub numero_ligne: i64,
    /// Value date of the statement line
    pub date: NaiveDate,
    /// Free-text label as printed on the statement
    pub label: String,
    /// Debit amount; zero when the line is a credit
    pub debit: BigDecimal,
    /// Credit amount; zero when the line is a debit
    pub credit: BigDecimal,
}

impl BankTransaction {
    /// Create a new statement line
    pub fn new(
        numero_ligne: i64,
        date: NaiveDate,
        label: impl Into<String>,
        debit: BigDecimal,
        credit: BigDecimal,
    ) -> Self {
        Self {
            numero_ligne,
            date,
            label: label.into(),
            debit,
            credit,
        }
    }

    /// Signed amount of the line: the debit when positive, otherwise the
    /// negated credit
    pub fn signed_amount(&self) -> BigDecimal {
        if self.debit > BigDecimal::from(0) {
            self.debit.clone()
        } else {
            -self.credit.clone()
        }
    }

    /// Absolute amount of the line
    pub fn amount_abs(&self) -> BigDecimal {
        self.signed_amount().abs()
    }

    /// Whether the line is a debit (money out)
    pub fn is_debit(&self) -> bool {
        self.debit > BigDecimal::from(0)
    }

    /// Legacy `(date, label, amount)` tuple of the line. Kept only so that
    /// callers holding pre-migration references can be resolved to a
    /// `numero_ligne`; it is not an identity key and may collide.
    pub fn natural_key(&self) -> (NaiveDate, &str, BigDecimal) {
        (self.date, self.label.as_str(), self.signed_amount())
    }
}

/// Resolved counterparty of a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRef {
    /// Stable partner id, when the source record carries one
    pub id: Option<String>,
    /// Display name (supplier, client, organism)
    pub name: String,
}

impl PartnerRef {
    /// Partner identified by name only
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }

    /// Partner identified by id and name
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: name.into(),
        }
    }

    /// Identity comparison: by id when both sides carry one, otherwise by
    /// case-insensitive name equality
    pub fn same_identity(&self, other: &PartnerRef) -> bool {
        match (&self.id, &other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.name.eq_ignore_ascii_case(&other.name),
        }
    }
}

/// Direction of an invoice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceDirection {
    /// Sales invoice; its settlement arrives as a credit
    Sale,
    /// Purchase invoice; its settlement leaves as a debit
    Purchase,
}

/// Sales or purchase invoice exposed by the candidate store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice number, unique per direction
    pub number: String,
    pub direction: InvoiceDirection,
    pub issue_date: NaiveDate,
    pub partner: PartnerRef,
    /// Pre-tax total (HT)
    pub total_pre_tax: BigDecimal,
    /// VAT total (TVA)
    pub total_vat: BigDecimal,
    /// Tax-inclusive total (TTC)
    pub total_inclusive: BigDecimal,
}

/// Recurring partner subscription with a fixed monthly amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub name: String,
    pub partner: PartnerRef,
    /// Tax-inclusive monthly amount
    pub monthly_amount: BigDecimal,
    /// VAT-rate label used to derive the pre-tax amount, when taxable
    pub vat_label: Option<String>,
    /// Keyword expression matched against statement labels
    /// (comma separates alternatives, whitespace joins required words)
    pub keywords: String,
}

/// Category of a social/fiscal charge filing. The accounting period of a
/// payment diverges from its payment date differently per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChargeCategory {
    /// Retirement funds; several same-day debits settle consecutive
    /// prior months
    Retirement,
    /// Payroll-related charges; early-month payments settle the prior month
    Payroll,
    /// Any other organism; the payment date is the accounting period
    #[serde(other)]
    Other,
}

/// Periodic social/fiscal contribution filing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeDeclaration {
    pub id: String,
    pub name: String,
    /// Collecting organism (URSSAF, retirement fund, ...)
    pub organism: String,
    pub category: ChargeCategory,
    /// Keyword expression matched against statement labels
    pub keywords: String,
}

/// Payment event recorded against a charge declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargePayment {
    pub declaration_id: String,
    pub date: NaiveDate,
    pub amount: BigDecimal,
}

/// One charge payment joined to its declaration, with the accounting period
/// it settles already resolved (see `matching::period`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargeCandidate {
    pub declaration: ChargeDeclaration,
    pub payment: ChargePayment,
    /// Accounting period the payment settles; may precede the payment date
    /// depending on the charge category
    pub effective_period: NaiveDate,
}

/// A document that can explain a bank-statement line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Candidate {
    Invoice(Invoice),
    Subscription(Subscription),
    Charge(ChargeCandidate),
}

impl Candidate {
    /// Stable identity of the candidate, usable as a claim key
    pub fn id(&self) -> CandidateId {
        match self {
            Candidate::Invoice(inv) => CandidateId::Invoice(inv.number.clone()),
            Candidate::Subscription(sub) => CandidateId::Subscription(sub.id.clone()),
            Candidate::Charge(charge) => CandidateId::Charge {
                declaration: charge.declaration.id.clone(),
                payment_date: charge.payment.date,
            },
        }
    }

    /// Tax-inclusive amount the candidate would explain
    pub fn amount_inclusive(&self) -> &BigDecimal {
        match self {
            Candidate::Invoice(inv) => &inv.total_inclusive,
            Candidate::Subscription(sub) => &sub.monthly_amount,
            Candidate::Charge(charge) => &charge.payment.amount,
        }
    }

    /// Date the candidate is anchored to: issue date for invoices,
    /// effective period for charges. Subscriptions have no anchor date.
    pub fn relevant_date(&self) -> Option<NaiveDate> {
        match self {
            Candidate::Invoice(inv) => Some(inv.issue_date),
            Candidate::Subscription(_) => None,
            Candidate::Charge(charge) => Some(charge.effective_period),
        }
    }

    /// Counterparty of the candidate, when one is resolved
    pub fn partner(&self) -> Option<&PartnerRef> {
        match self {
            Candidate::Invoice(inv) => Some(&inv.partner),
            Candidate::Subscription(sub) => Some(&sub.partner),
            Candidate::Charge(_) => None,
        }
    }

    /// Expected transaction direction: purchases, subscriptions, and charge
    /// payments settle as debits; sales settle as credits
    pub fn expects_debit(&self) -> bool {
        match self {
            Candidate::Invoice(inv) => inv.direction == InvoiceDirection::Purchase,
            Candidate::Subscription(_) | Candidate::Charge(_) => true,
        }
    }
}

/// Claim key identifying a candidate document across runs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CandidateId {
    Invoice(String),
    Subscription(String),
    Charge {
        declaration: String,
        payment_date: NaiveDate,
    },
}

impl std::fmt::Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CandidateId::Invoice(number) => write!(f, "invoice:{}", number),
            CandidateId::Subscription(id) => write!(f, "subscription:{}", id),
            CandidateId::Charge {
                declaration,
                payment_date,
            } => write!(f, "charge:{}@{}", declaration, payment_date),
        }
    }
}

/// Outcome classification of one transaction after an engine pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// The full amount is explained by the linked document(s)
    Matched,
    /// Candidates scored but none survives the threshold and amount checks,
    /// or the best score is tied between unrelated candidates
    Uncertain,
    /// No candidate scored above zero
    Unmatched,
    /// Part of the amount is explained; the residual is reported
    Partial,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Uncertain => "uncertain",
            MatchStatus::Unmatched => "unmatched",
            MatchStatus::Partial => "partial",
        };
        f.write_str(s)
    }
}

/// Persisted outcome of reconciling one statement line.
///
/// Corrections supersede a result rather than rewriting it; the latest
/// record per `numero_ligne` is authoritative and earlier ones form the
/// audit history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    /// Record identity for auditing, distinct from the business key
    pub id: Uuid,
    /// Statement line this result belongs to
    pub numero_ligne: i64,
    /// Linked document references, empty when unmatched
    pub linked: Vec<CandidateId>,
    /// Total amount explained by the linked documents
    pub matched_amount: BigDecimal,
    /// Accumulated rule score, capped at 100
    pub score: u8,
    pub status: MatchStatus,
    /// Ids of the rules that contributed to the score, in evaluation order
    pub rule_trail: Vec<i64>,
    /// Free-text notes (ambiguity, residuals, warnings)
    pub notes: Option<String>,
    /// Set when the result came from an explicit user action; automatic
    /// runs never overwrite a manual result
    pub manual: bool,
    pub created_at: NaiveDateTime,
}

impl ReconciliationResult {
    /// Business fields of the result, excluding record identity and
    /// timestamp. Two runs over identical inputs agree on this view.
    pub fn business_view(&self) -> (i64, &[CandidateId], &BigDecimal, u8, MatchStatus, bool) {
        (
            self.numero_ligne,
            &self.linked,
            &self.matched_amount,
            self.score,
            self.status,
            self.manual,
        )
    }
}

/// Link between two offsetting statement lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InverseLink {
    pub source_ligne: i64,
    pub counterpart_ligne: i64,
    /// Sum of the two signed amounts
    pub solde: BigDecimal,
    /// Whether the pair cancels out within the inverse tolerance
    pub balanced: bool,
    pub created_at: NaiveDateTime,
}

impl InverseLink {
    /// Whether the link involves the given statement line
    pub fn involves(&self, numero_ligne: i64) -> bool {
        self.source_ligne == numero_ligne || self.counterpart_ligne == numero_ligne
    }
}

/// Inclusive date range of one statement, bounding a reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl StatementPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Calendar month period
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = start
            .checked_add_months(chrono::Months::new(1))?
            .pred_opt()?;
        Some(Self { start, end })
    }

    /// Calendar year period
    pub fn year(year: i32) -> Option<Self> {
        Some(Self {
            start: NaiveDate::from_ymd_opt(year, 1, 1)?,
            end: NaiveDate::from_ymd_opt(year, 12, 31)?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Whether the period covers any day of the given (year, month)
    pub fn contains_month(&self, year: i32, month: u32) -> bool {
        match NaiveDate::from_ymd_opt(year, month, 1) {
            Some(d) => {
                (d.year(), d.month()) >= (self.start.year(), self.start.month())
                    && (d.year(), d.month()) <= (self.end.year(), self.end.month())
            }
            None => false,
        }
    }
}

/// Errors that can occur in the reconciliation engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Rule {rule_id} has an invalid condition: {reason}")]
    RuleConfiguration { rule_id: i64, reason: String },
    #[error("Transaction not found: line {0}")]
    TransactionNotFound(i64),
    #[error("Candidate not found: {0}")]
    CandidateNotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Result for line {0} is manual and cannot be overwritten automatically")]
    PersistenceConflict(i64),
    #[error("Inverse link rejected: {0}")]
    InverseLink(String),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
