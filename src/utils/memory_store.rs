//! In-memory store implementation for testing

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::rules::ReconciliationRule;
use crate::traits::*;
use crate::types::*;

/// In-memory store implementation for testing and development
#[derive(Debug, Clone)]
pub struct MemoryStore {
    transactions: Arc<RwLock<HashMap<i64, BankTransaction>>>,
    invoices: Arc<RwLock<Vec<Invoice>>>,
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
    declarations: Arc<RwLock<Vec<ChargeDeclaration>>>,
    payments: Arc<RwLock<Vec<ChargePayment>>>,
    rules: Arc<RwLock<HashMap<i64, ReconciliationRule>>>,
    /// Full result history per line, in append order; the last entry is
    /// the line's current result
    results: Arc<RwLock<HashMap<i64, Vec<ReconciliationResult>>>>,
    links: Arc<RwLock<Vec<InverseLink>>>,
}

impl MemoryStore {
    /// Create a new memory store instance
    pub fn new() -> Self {
        Self {
            transactions: Arc::new(RwLock::new(HashMap::new())),
            invoices: Arc::new(RwLock::new(Vec::new())),
            subscriptions: Arc::new(RwLock::new(Vec::new())),
            declarations: Arc::new(RwLock::new(Vec::new())),
            payments: Arc::new(RwLock::new(Vec::new())),
            rules: Arc::new(RwLock::new(HashMap::new())),
            results: Arc::new(RwLock::new(HashMap::new())),
            links: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.transactions.write().unwrap().clear();
        self.invoices.write().unwrap().clear();
        self.subscriptions.write().unwrap().clear();
        self.declarations.write().unwrap().clear();
        self.payments.write().unwrap().clear();
        self.rules.write().unwrap().clear();
        self.results.write().unwrap().clear();
        self.links.write().unwrap().clear();
    }

    pub fn add_invoice(&self, invoice: Invoice) {
        self.invoices.write().unwrap().push(invoice);
    }

    pub fn add_subscription(&self, subscription: Subscription) {
        self.subscriptions.write().unwrap().push(subscription);
    }

    pub fn add_charge_declaration(&self, declaration: ChargeDeclaration) {
        self.declarations.write().unwrap().push(declaration);
    }

    pub fn add_charge_payment(&self, payment: ChargePayment) {
        self.payments.write().unwrap().push(payment);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReconciliationStore for MemoryStore {
    async fn save_transaction(&mut self, transaction: &BankTransaction) -> EngineResult<()> {
        self.transactions
            .write()
            .unwrap()
            .insert(transaction.numero_ligne, transaction.clone());
        Ok(())
    }

    async fn get_transaction(&self, numero_ligne: i64) -> EngineResult<Option<BankTransaction>> {
        Ok(self.transactions.read().unwrap().get(&numero_ligne).cloned())
    }

    async fn transactions_in_period(
        &self,
        period: &StatementPeriod,
    ) -> EngineResult<Vec<BankTransaction>> {
        let transactions = self.transactions.read().unwrap();
        Ok(transactions
            .values()
            .filter(|tx| period.contains(tx.date))
            .cloned()
            .collect())
    }

    async fn find_by_legacy_key(
        &self,
        date: NaiveDate,
        label: &str,
        amount: &BigDecimal,
    ) -> EngineResult<Vec<BankTransaction>> {
        let transactions = self.transactions.read().unwrap();
        let mut found: Vec<BankTransaction> = transactions
            .values()
            .filter(|tx| tx.date == date && tx.label == label && tx.signed_amount() == *amount)
            .cloned()
            .collect();
        found.sort_by_key(|tx| tx.numero_ligne);
        Ok(found)
    }

    async fn list_invoices(&self) -> EngineResult<Vec<Invoice>> {
        Ok(self.invoices.read().unwrap().clone())
    }

    async fn list_subscriptions(&self) -> EngineResult<Vec<Subscription>> {
        Ok(self.subscriptions.read().unwrap().clone())
    }

    async fn list_charge_declarations(&self) -> EngineResult<Vec<ChargeDeclaration>> {
        Ok(self.declarations.read().unwrap().clone())
    }

    async fn list_charge_payments(&self) -> EngineResult<Vec<ChargePayment>> {
        Ok(self.payments.read().unwrap().clone())
    }

    async fn save_rule(&mut self, rule: &ReconciliationRule) -> EngineResult<()> {
        rule.validate()?;
        self.rules.write().unwrap().insert(rule.id, rule.clone());
        Ok(())
    }

    async fn active_rules(&self) -> EngineResult<Vec<ReconciliationRule>> {
        let rules = self.rules.read().unwrap();
        let mut active: Vec<ReconciliationRule> =
            rules.values().filter(|rule| rule.active).cloned().collect();
        active.sort_by_key(|rule| rule.id);
        Ok(active)
    }

    async fn save_result(&mut self, result: &ReconciliationResult) -> EngineResult<()> {
        let mut results = self.results.write().unwrap();
        let history = results.entry(result.numero_ligne).or_default();
        if let Some(latest) = history.last() {
            if latest.manual && !result.manual {
                return Err(EngineError::PersistenceConflict(result.numero_ligne));
            }
        }
        history.push(result.clone());
        Ok(())
    }

    async fn latest_result(&self, numero_ligne: i64) -> EngineResult<Option<ReconciliationResult>> {
        let results = self.results.read().unwrap();
        Ok(results
            .get(&numero_ligne)
            .and_then(|history| history.last())
            .cloned())
    }

    async fn latest_results(&self) -> EngineResult<Vec<ReconciliationResult>> {
        let results = self.results.read().unwrap();
        let mut latest: Vec<ReconciliationResult> = results
            .values()
            .filter_map(|history| history.last())
            .cloned()
            .collect();
        latest.sort_by_key(|result| result.numero_ligne);
        Ok(latest)
    }

    async fn latest_results_in_period(
        &self,
        period: &StatementPeriod,
    ) -> EngineResult<Vec<ReconciliationResult>> {
        // collect before taking the guard; a sync lock must not live
        // across an await
        let latest = self.latest_results().await?;
        let transactions = self.transactions.read().unwrap();
        Ok(latest
            .into_iter()
            .filter(|result| {
                transactions
                    .get(&result.numero_ligne)
                    .map(|tx| period.contains(tx.date))
                    .unwrap_or(false)
            })
            .collect())
    }

    async fn result_history(
        &self,
        numero_ligne: i64,
    ) -> EngineResult<Vec<ReconciliationResult>> {
        let results = self.results.read().unwrap();
        Ok(results.get(&numero_ligne).cloned().unwrap_or_default())
    }

    async fn save_inverse_link(&mut self, link: &InverseLink) -> EngineResult<()> {
        self.links.write().unwrap().push(link.clone());
        Ok(())
    }

    async fn inverse_links(&self) -> EngineResult<Vec<InverseLink>> {
        Ok(self.links.read().unwrap().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::outcome::ResultBuilder;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn tx(ligne: i64, label: &str, debit: &str) -> BankTransaction {
        BankTransaction::new(
            ligne,
            NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            label,
            dec(debit),
            BigDecimal::from(0),
        )
    }

    #[tokio::test]
    async fn test_results_append_and_latest_wins() {
        let mut store = MemoryStore::new();
        store
            .save_result(&ResultBuilder::unmatched(7).build())
            .await
            .unwrap();
        store
            .save_result(&ResultBuilder::uncertain(7, 20, vec![1]).build())
            .await
            .unwrap();

        let latest = store.latest_result(7).await.unwrap().unwrap();
        assert_eq!(latest.status, MatchStatus::Uncertain);

        let history = store.result_history(7).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].status, MatchStatus::Unmatched);
    }

    #[tokio::test]
    async fn test_period_filter_keeps_only_that_months_results() {
        let mut store = MemoryStore::new();
        store.save_transaction(&tx(1, "PRLV ACME", "50.00")).await.unwrap();
        let april = BankTransaction::new(
            2,
            NaiveDate::from_ymd_opt(2024, 4, 5).unwrap(),
            "PRLV ACME",
            dec("50.00"),
            BigDecimal::from(0),
        );
        store.save_transaction(&april).await.unwrap();
        store.save_result(&ResultBuilder::unmatched(1).build()).await.unwrap();
        store.save_result(&ResultBuilder::unmatched(2).build()).await.unwrap();

        let march = StatementPeriod::month(2024, 3).unwrap();
        let results = store.latest_results_in_period(&march).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].numero_ligne, 1);
    }

    #[tokio::test]
    async fn test_manual_result_blocks_automatic_overwrite() {
        let mut store = MemoryStore::new();
        let manual = ResultBuilder::manual(
            7,
            vec![CandidateId::Invoice("F-1".to_string())],
            dec("100.00"),
        )
        .build();
        store.save_result(&manual).await.unwrap();

        let automatic = ResultBuilder::unmatched(7).build();
        let error = store.save_result(&automatic).await.unwrap_err();
        assert!(matches!(error, EngineError::PersistenceConflict(7)));

        // a newer manual decision still goes through
        let corrected = ResultBuilder::manual(
            7,
            vec![CandidateId::Invoice("F-2".to_string())],
            dec("100.00"),
        )
        .build();
        store.save_result(&corrected).await.unwrap();
        assert_eq!(store.result_history(7).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_legacy_key_lookup_returns_every_shared_tuple() {
        let mut store = MemoryStore::new();
        store.save_transaction(&tx(1, "PRLV ACME", "50.00")).await.unwrap();
        store.save_transaction(&tx(2, "PRLV ACME", "50.00")).await.unwrap();
        store.save_transaction(&tx(3, "PRLV AUTRE", "50.00")).await.unwrap();

        let found = store
            .find_by_legacy_key(
                NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
                "PRLV ACME",
                &dec("50.00"),
            )
            .await
            .unwrap();
        let lignes: Vec<i64> = found.iter().map(|tx| tx.numero_ligne).collect();
        assert_eq!(lignes, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_save_rule_rejects_invalid_conditions() {
        let mut store = MemoryStore::new();
        let rule = ReconciliationRule::new(
            1,
            "label without keywords",
            crate::rules::RuleCondition::Label {
                keywords: String::new(),
            },
        );
        assert!(store.save_rule(&rule).await.is_err());
        assert!(store.active_rules().await.unwrap().is_empty());
    }
}
