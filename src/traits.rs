//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::rules::ReconciliationRule;
use crate::types::*;

/// Storage abstraction for the reconciliation engine
///
/// This trait allows the engine to work with any storage backend
/// (PostgreSQL, MySQL, SQLite, in-memory, etc.) by implementing these
/// methods. The engine never talks to a database directly.
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    /// Save an imported statement line
    async fn save_transaction(&mut self, transaction: &BankTransaction) -> EngineResult<()>;

    /// Get a statement line by its line number
    async fn get_transaction(&self, numero_ligne: i64) -> EngineResult<Option<BankTransaction>>;

    /// List statement lines within a period
    async fn transactions_in_period(
        &self,
        period: &StatementPeriod,
    ) -> EngineResult<Vec<BankTransaction>>;

    /// Find statement lines matching a legacy `(date, label, amount)`
    /// reference. Several lines may share the tuple.
    async fn find_by_legacy_key(
        &self,
        date: NaiveDate,
        label: &str,
        amount: &BigDecimal,
    ) -> EngineResult<Vec<BankTransaction>>;

    /// List invoices available for matching
    async fn list_invoices(&self) -> EngineResult<Vec<Invoice>>;

    /// List subscriptions available for matching
    async fn list_subscriptions(&self) -> EngineResult<Vec<Subscription>>;

    /// List charge declarations
    async fn list_charge_declarations(&self) -> EngineResult<Vec<ChargeDeclaration>>;

    /// List charge payments across all declarations
    async fn list_charge_payments(&self) -> EngineResult<Vec<ChargePayment>>;

    /// Save a matching rule; implementations must reject invalid conditions
    async fn save_rule(&mut self, rule: &ReconciliationRule) -> EngineResult<()>;

    /// List active rules
    async fn active_rules(&self) -> EngineResult<Vec<ReconciliationRule>>;

    /// Append a reconciliation result; the newest record per line wins
    async fn save_result(&mut self, result: &ReconciliationResult) -> EngineResult<()>;

    /// Latest result for a statement line, if any
    async fn latest_result(&self, numero_ligne: i64) -> EngineResult<Option<ReconciliationResult>>;

    /// Latest result per statement line, across all periods. Claim seeding
    /// needs the full view: a document consumed in one period stays
    /// consumed in the next.
    async fn latest_results(&self) -> EngineResult<Vec<ReconciliationResult>>;

    /// Latest result per statement line within a period
    async fn latest_results_in_period(
        &self,
        period: &StatementPeriod,
    ) -> EngineResult<Vec<ReconciliationResult>>;

    /// Full result history for a statement line, oldest first
    async fn result_history(&self, numero_ligne: i64)
        -> EngineResult<Vec<ReconciliationResult>>;

    /// Save a link between two offsetting statement lines
    async fn save_inverse_link(&mut self, link: &InverseLink) -> EngineResult<()>;

    /// List all inverse links
    async fn inverse_links(&self) -> EngineResult<Vec<InverseLink>>;
}

/// Trait for implementing custom rule validation
pub trait RuleValidator: Send + Sync {
    /// Validate a rule before it is saved
    fn validate_rule(&self, rule: &ReconciliationRule) -> EngineResult<()>;
}

/// Trait for implementing custom statement-line validation
pub trait TransactionValidator: Send + Sync {
    /// Validate a statement line before it is saved
    fn validate_transaction(&self, transaction: &BankTransaction) -> EngineResult<()>;
}

/// Default rule validator applying the authoring-time checks
pub struct DefaultRuleValidator;

impl RuleValidator for DefaultRuleValidator {
    fn validate_rule(&self, rule: &ReconciliationRule) -> EngineResult<()> {
        rule.validate()
    }
}

/// Default statement-line validator with basic shape rules
pub struct DefaultTransactionValidator;

impl TransactionValidator for DefaultTransactionValidator {
    fn validate_transaction(&self, transaction: &BankTransaction) -> EngineResult<()> {
        if transaction.label.trim().is_empty() {
            return Err(EngineError::Validation(
                "Statement label cannot be empty".to_string(),
            ));
        }

        let zero = BigDecimal::from(0);
        if transaction.debit < zero || transaction.credit < zero {
            return Err(EngineError::Validation(
                "Debit and credit amounts cannot be negative".to_string(),
            ));
        }

        if transaction.debit > zero && transaction.credit > zero {
            return Err(EngineError::Validation(
                "A statement line carries either a debit or a credit, not both".to_string(),
            ));
        }

        Ok(())
    }
}
