//! Reconciliation engine orchestrating scoring, aggregation, claims, and
//! persistence over a pluggable store

use std::collections::{HashMap, HashSet};

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::engine::policy::MatchPolicy;
use crate::matching::aggregate::aggregate;
use crate::matching::claims::ClaimLedger;
use crate::matching::inverse::{build_link, find_candidates, InverseCandidate, PoolLine};
use crate::matching::outcome::ResultBuilder;
use crate::matching::pool::CandidatePool;
use crate::matching::scoring::ScoreBoard;
use crate::matching::tolerance::within_tolerance;
use crate::rules::{sort_for_evaluation, ReconciliationRule};
use crate::tax::vat::VatBreakdown;
use crate::traits::{
    DefaultRuleValidator, DefaultTransactionValidator, ReconciliationStore, RuleValidator,
    TransactionValidator,
};
use crate::types::*;

/// Outcome of one automatic reconciliation run
#[derive(Debug)]
pub struct RunReport {
    pub period: StatementPeriod,
    /// Latest result per processed line, newly written or carried over
    pub results: Vec<ReconciliationResult>,
    /// Non-fatal problems encountered: skipped rules, orphan payments,
    /// claim conflicts. One bad record never aborts the batch.
    pub issues: Vec<String>,
    /// Claim state at the end of the run
    pub claims: ClaimLedger,
}

/// Outcome of an automatic offsetting-pair pass
#[derive(Debug)]
pub struct InverseReport {
    pub links: Vec<InverseLink>,
    pub issues: Vec<String>,
}

/// One row of the annual ledger view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub numero_ligne: i64,
    pub date: NaiveDate,
    pub label: String,
    /// Counterparty detected from the label, when recognized
    pub partner: Option<String>,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    /// Pre-tax total of the linked documents (HT)
    pub matched_pre_tax: BigDecimal,
    /// VAT total of the linked documents (TVA)
    pub matched_vat: BigDecimal,
    /// Tax-inclusive total of the linked documents (TTC)
    pub matched_inclusive: BigDecimal,
    pub status: MatchStatus,
}

/// Aggregated annual ledger, one row per statement line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualLedger {
    pub year: i32,
    pub rows: Vec<LedgerRow>,
    pub total_debit: BigDecimal,
    pub total_credit: BigDecimal,
    pub total_matched_inclusive: BigDecimal,
}

/// Reconciliation engine over a storage backend
pub struct ReconciliationEngine<S: ReconciliationStore> {
    store: S,
    policy: MatchPolicy,
    rule_validator: Box<dyn RuleValidator>,
    transaction_validator: Box<dyn TransactionValidator>,
}

impl<S: ReconciliationStore> ReconciliationEngine<S> {
    /// Create an engine with the default policy and validators
    pub fn new(store: S) -> Self {
        Self::with_policy(store, MatchPolicy::default())
    }

    /// Create an engine with an explicit policy
    pub fn with_policy(store: S, policy: MatchPolicy) -> Self {
        Self {
            store,
            policy,
            rule_validator: Box::new(DefaultRuleValidator),
            transaction_validator: Box::new(DefaultTransactionValidator),
        }
    }

    /// Create an engine with custom validators
    pub fn with_validators(
        store: S,
        policy: MatchPolicy,
        rule_validator: Box<dyn RuleValidator>,
        transaction_validator: Box<dyn TransactionValidator>,
    ) -> Self {
        Self {
            store,
            policy,
            rule_validator,
            transaction_validator,
        }
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Validate and persist a statement line
    pub async fn record_transaction(&mut self, transaction: &BankTransaction) -> EngineResult<()> {
        self.transaction_validator.validate_transaction(transaction)?;
        self.store.save_transaction(transaction).await
    }

    /// Validate and persist a matching rule
    pub async fn upsert_rule(&mut self, rule: &ReconciliationRule) -> EngineResult<()> {
        self.rule_validator.validate_rule(rule)?;
        self.store.save_rule(rule).await
    }

    /// Reconcile every statement line of a period.
    ///
    /// Rules and candidates are snapshotted once at the start. Lines are
    /// processed in ascending `numero_ligne` order; each outcome is
    /// persisted before the next line starts, so an aborted run leaves
    /// only whole results behind. Manual results and inverse-linked lines
    /// are never touched. Unchanged outcomes are not rewritten, which
    /// keeps repeated runs over identical inputs free of record churn.
    #[instrument(skip(self), fields(start = %period.start, end = %period.end))]
    pub async fn run(&mut self, period: &StatementPeriod) -> EngineResult<RunReport> {
        let mut issues = Vec::new();

        let mut rules = Vec::new();
        for rule in self.store.active_rules().await? {
            if !rule.active {
                continue;
            }
            match rule.validate() {
                Ok(()) => rules.push(rule),
                Err(error) => {
                    warn!(rule_id = rule.id, %error, "skipping invalid rule");
                    issues.push(format!("rule {} skipped: {}", rule.id, error));
                }
            }
        }
        sort_for_evaluation(&mut rules);

        let (pool, pool_issues) = CandidatePool::assemble(
            self.store.list_invoices().await?,
            self.store.list_subscriptions().await?,
            self.store.list_charge_declarations().await?,
            self.store.list_charge_payments().await?,
        );
        issues.extend(pool_issues);

        let prior: HashMap<i64, ReconciliationResult> = self
            .store
            .latest_results()
            .await?
            .into_iter()
            .map(|result| (result.numero_ligne, result))
            .collect();

        let mut transactions = self.store.transactions_in_period(period).await?;
        transactions.sort_by_key(|tx| tx.numero_ligne);
        let in_period: HashSet<i64> = transactions.iter().map(|tx| tx.numero_ligne).collect();

        // Replay persisted claims in a fixed order: manual decisions first,
        // then ascending line number. A subscription is consumed per month,
        // so a plan held by a line outside this period is not replayed;
        // invoices and charge payments are settled once and stay claimed.
        let mut claims = ClaimLedger::new();
        let mut seeds: Vec<&ReconciliationResult> = prior
            .values()
            .filter(|result| matches!(result.status, MatchStatus::Matched | MatchStatus::Partial))
            .collect();
        seeds.sort_by_key(|result| (!result.manual, result.numero_ligne));
        for result in seeds {
            let replay: Vec<CandidateId> = result
                .linked
                .iter()
                .filter(|id| {
                    in_period.contains(&result.numero_ligne)
                        || !matches!(id, CandidateId::Subscription(_))
                })
                .cloned()
                .collect();
            if !claims.try_claim_all(&replay, result.numero_ligne) {
                issues.push(format!(
                    "line {}: prior result links documents now claimed by another line",
                    result.numero_ligne
                ));
                continue;
            }
            if result.status == MatchStatus::Matched {
                claims.consume_line(result.numero_ligne);
            }
        }
        for link in self.store.inverse_links().await? {
            claims.mark_inverse_pair(link.source_ligne, link.counterpart_ligne);
        }

        info!(
            transactions = transactions.len(),
            candidates = pool.len(),
            rules = rules.len(),
            "reconciliation run started"
        );

        let mut results = Vec::new();
        for transaction in &transactions {
            let previous = prior.get(&transaction.numero_ligne);

            if previous.map(|result| result.manual).unwrap_or(false) {
                if let Some(result) = previous {
                    results.push(result.clone());
                }
                continue;
            }
            if claims.in_inverse_pair(transaction.numero_ligne) {
                if let Some(result) = previous {
                    results.push(result.clone());
                }
                continue;
            }

            // release the line's own earlier claims before rescoring it;
            // claims held by other lines stay in force
            claims.release_line(transaction.numero_ligne);

            let built =
                self.reconcile_one(transaction, period, &pool, &rules, &mut claims, &mut issues);
            debug!(
                numero_ligne = transaction.numero_ligne,
                status = ?built.status,
                score = built.score,
                linked = built.linked.len(),
                "line classified"
            );

            let changed = previous
                .map(|result| result.business_view() != built.business_view())
                .unwrap_or(true);
            if changed {
                self.store.save_result(&built).await?;
                results.push(built);
            } else if let Some(previous) = previous {
                results.push(previous.clone());
            }
        }

        info!(
            results = results.len(),
            issues = issues.len(),
            claimed = claims.claimed_count(),
            "reconciliation run finished"
        );

        Ok(RunReport {
            period: *period,
            results,
            issues,
            claims,
        })
    }

    /// Re-run entrypoint for callers reacting to rule or candidate-pool
    /// edits. Identical to [`run`](Self::run): non-manual lines are
    /// rescored against the fresh snapshot and superseded only when their
    /// outcome changed.
    pub async fn rerun(&mut self, period: &StatementPeriod) -> EngineResult<RunReport> {
        self.run(period).await
    }

    /// Classify one transaction against the pool. Claims are taken as
    /// part of classification so a candidate can never be awarded twice
    /// within the run.
    fn reconcile_one(
        &self,
        transaction: &BankTransaction,
        period: &StatementPeriod,
        pool: &CandidatePool,
        rules: &[ReconciliationRule],
        claims: &mut ClaimLedger,
        issues: &mut Vec<String>,
    ) -> ReconciliationResult {
        let numero_ligne = transaction.numero_ligne;
        let detected_partner = pool.detect_partner(&transaction.label);

        let available: Vec<&Candidate> = pool
            .candidates()
            .iter()
            .filter(|candidate| !claims.is_claimed(&candidate.id()))
            .collect();

        let board = ScoreBoard::score(transaction, detected_partner, &available, rules);
        let best = match board.best() {
            Some(best) => best,
            None => return ResultBuilder::unmatched(numero_ligne).build(),
        };

        let representative = board.entry(best.indices[0]);
        let trail = representative
            .map(|entry| entry.rule_trail.clone())
            .unwrap_or_default();

        if best.score < self.policy.match_threshold {
            return ResultBuilder::uncertain(numero_ligne, best.score, trail)
                .note(format!(
                    "best score {} below the match threshold {}",
                    best.score, self.policy.match_threshold
                ))
                .build();
        }

        let amount = transaction.amount_abs();

        if !best.ambiguous {
            let winner = available[best.indices[0]];
            if within_tolerance(&amount, winner.amount_inclusive(), &self.policy.amount_tolerance)
            {
                let id = winner.id();
                if claims.try_claim(id.clone(), numero_ligne) {
                    claims.consume_line(numero_ligne);
                    return ResultBuilder::matched(
                        numero_ligne,
                        vec![id],
                        winner.amount_inclusive().clone(),
                        best.score,
                        trail,
                    )
                    .build();
                }
                issues.push(format!(
                    "line {}: candidate {} is already held by line {}",
                    numero_ligne,
                    id,
                    claims.claimed_by(&id).unwrap_or_default()
                ));
                return ResultBuilder::uncertain(numero_ligne, best.score, trail)
                    .note(format!("candidate {} already consumed", id))
                    .build();
            }
        }

        // one document does not explain the amount; a same-partner bundle
        // of invoices from the period still might
        if self.policy.auto_aggregate {
            if let Some(partner) = detected_partner {
                let bundle: Vec<&Invoice> = available
                    .iter()
                    .copied()
                    .filter_map(|candidate| match candidate {
                        Candidate::Invoice(invoice)
                            if invoice.partner.same_identity(partner)
                                && period.contains(invoice.issue_date) =>
                        {
                            Some(invoice)
                        }
                        _ => None,
                    })
                    .collect();

                if let Some(outcome) = aggregate(
                    &amount,
                    &bundle,
                    &self.policy.amount_tolerance,
                    self.policy.exhaustive_aggregation_limit,
                ) {
                    // single-member bundles are not aggregation; they are
                    // the single-candidate path that already failed above
                    if outcome.members.len() >= 2 {
                        let ids: Vec<CandidateId> = outcome
                            .members
                            .iter()
                            .map(|member| CandidateId::Invoice(bundle[*member].number.clone()))
                            .collect();
                        if claims.try_claim_all(&ids, numero_ligne) {
                            if outcome.complete {
                                claims.consume_line(numero_ligne);
                                return ResultBuilder::matched(
                                    numero_ligne,
                                    ids,
                                    outcome.total,
                                    best.score,
                                    trail,
                                )
                                .build();
                            }
                            return ResultBuilder::partial(
                                numero_ligne,
                                ids,
                                outcome.total,
                                &outcome.residual,
                                best.score,
                                trail,
                            )
                            .build();
                        }
                        issues.push(format!(
                            "line {}: aggregation bundle overlaps a concurrent claim",
                            numero_ligne
                        ));
                    }
                }
            }
        }

        if best.ambiguous {
            let tied: Vec<String> = best
                .indices
                .iter()
                .filter_map(|index| board.entry(*index))
                .map(|entry| entry.candidate_id.to_string())
                .collect();
            return ResultBuilder::uncertain(numero_ligne, best.score, trail)
                .note(format!("ambiguous best score between {}", tied.join(", ")))
                .build();
        }

        ResultBuilder::uncertain(numero_ligne, best.score, trail)
            .note("no candidate or combination explains the full amount")
            .build()
    }

    /// Scan a period for offsetting pairs and link the unambiguous ones.
    ///
    /// Only pairs that balance to zero within the inverse tolerance and
    /// are each other's sole balanced counterpart are linked; anything
    /// with several plausible counterparts is reported for manual review.
    #[instrument(skip(self), fields(start = %period.start, end = %period.end))]
    pub async fn inverse_pass(&mut self, period: &StatementPeriod) -> EngineResult<InverseReport> {
        let mut transactions = self.store.transactions_in_period(period).await?;
        transactions.sort_by_key(|tx| tx.numero_ligne);

        let lines = self.load_inverse_pool(&transactions).await?;

        let mut discovered: Vec<(i64, i64)> = Vec::new();
        for line in &lines {
            if line.excluded {
                continue;
            }
            let found = find_candidates(
                line.transaction,
                line.partner.as_ref(),
                &lines,
                &self.policy.inverse_tolerance,
                None,
            );
            for candidate in found.iter().filter(|candidate| candidate.balanced) {
                let pair = (
                    line.transaction.numero_ligne.min(candidate.numero_ligne),
                    line.transaction.numero_ligne.max(candidate.numero_ligne),
                );
                if !discovered.contains(&pair) {
                    discovered.push(pair);
                }
            }
        }

        let mut occurrences: HashMap<i64, usize> = HashMap::new();
        for (a, b) in &discovered {
            *occurrences.entry(*a).or_default() += 1;
            *occurrences.entry(*b).or_default() += 1;
        }

        let by_ligne: HashMap<i64, &BankTransaction> = transactions
            .iter()
            .map(|tx| (tx.numero_ligne, tx))
            .collect();

        let mut report = InverseReport {
            links: Vec::new(),
            issues: Vec::new(),
        };
        for (a, b) in discovered {
            if occurrences.get(&a) == Some(&1) && occurrences.get(&b) == Some(&1) {
                let source = by_ligne[&a];
                let counterpart = by_ligne[&b];
                let (link, _) =
                    build_link(source, counterpart, &self.policy.inverse_tolerance)?;
                self.store.save_inverse_link(&link).await?;
                info!(source = a, counterpart = b, "offsetting pair linked");
                report.links.push(link);
            } else {
                report.issues.push(format!(
                    "lines {} and {} balance but have competing counterparts; left for manual review",
                    a, b
                ));
            }
        }

        Ok(report)
    }

    /// List possible offsetting counterparts for one line, for the manual
    /// confirmation flow. `filter` narrows the scan by label, line
    /// number, or partner name.
    pub async fn find_inverse_candidates(
        &self,
        period: &StatementPeriod,
        numero_ligne: i64,
        filter: Option<&str>,
    ) -> EngineResult<Vec<InverseCandidate>> {
        let transactions = self.store.transactions_in_period(period).await?;
        let lines = self.load_inverse_pool(&transactions).await?;
        let source = lines
            .iter()
            .find(|line| line.transaction.numero_ligne == numero_ligne)
            .ok_or(EngineError::TransactionNotFound(numero_ligne))?;

        Ok(find_candidates(
            source.transaction,
            source.partner.as_ref(),
            &lines,
            &self.policy.inverse_tolerance,
            filter,
        ))
    }

    /// Confirm an offsetting pair between two lines.
    ///
    /// An unbalanced pair is accepted; the residual comes back as a
    /// warning string for the operator. Lines already in a pair are
    /// rejected.
    pub async fn link_inverse(
        &mut self,
        source_ligne: i64,
        counterpart_ligne: i64,
    ) -> EngineResult<(InverseLink, Option<String>)> {
        let source = self
            .store
            .get_transaction(source_ligne)
            .await?
            .ok_or(EngineError::TransactionNotFound(source_ligne))?;
        let counterpart = self
            .store
            .get_transaction(counterpart_ligne)
            .await?
            .ok_or(EngineError::TransactionNotFound(counterpart_ligne))?;

        let links = self.store.inverse_links().await?;
        for ligne in [source_ligne, counterpart_ligne] {
            if links.iter().any(|link| link.involves(ligne)) {
                return Err(EngineError::InverseLink(format!(
                    "line {} is already part of an offsetting pair",
                    ligne
                )));
            }
        }

        let (link, warning) = build_link(&source, &counterpart, &self.policy.inverse_tolerance)?;
        if let Some(warning) = &warning {
            warn!(source = source_ligne, counterpart = counterpart_ligne, %warning);
        }
        self.store.save_inverse_link(&link).await?;
        Ok((link, warning))
    }

    /// Record an explicit manual link between a line and one or more
    /// documents, with an optional operator note. Always produces a
    /// `matched` result with `manual` set; automatic runs will never
    /// overwrite it.
    #[instrument(skip(self, linked, note))]
    pub async fn link_manual(
        &mut self,
        numero_ligne: i64,
        linked: Vec<CandidateId>,
        note: Option<String>,
    ) -> EngineResult<ReconciliationResult> {
        let transaction = self
            .store
            .get_transaction(numero_ligne)
            .await?
            .ok_or(EngineError::TransactionNotFound(numero_ligne))?;
        if linked.is_empty() {
            return Err(EngineError::Validation(
                "a manual link needs at least one document".to_string(),
            ));
        }

        let (pool, _) = CandidatePool::assemble(
            self.store.list_invoices().await?,
            self.store.list_subscriptions().await?,
            self.store.list_charge_declarations().await?,
            self.store.list_charge_payments().await?,
        );
        let by_id: HashMap<CandidateId, &Candidate> = pool
            .candidates()
            .iter()
            .map(|candidate| (candidate.id(), candidate))
            .collect();

        let mut matched_amount = BigDecimal::from(0);
        for id in &linked {
            let candidate = by_id
                .get(id)
                .ok_or_else(|| EngineError::CandidateNotFound(id.to_string()))?;
            matched_amount += candidate.amount_inclusive();
        }

        let mut builder = ResultBuilder::manual(numero_ligne, linked, matched_amount.clone());
        if !within_tolerance(
            &transaction.amount_abs(),
            &matched_amount,
            &self.policy.amount_tolerance,
        ) {
            builder = builder.note(format!(
                "linked total {} differs from the line amount {}",
                matched_amount,
                transaction.amount_abs()
            ));
        }
        if let Some(note) = note {
            builder = builder.note(note);
        }

        let result = builder.build();
        self.store.save_result(&result).await?;
        info!(numero_ligne, "manual link recorded");
        Ok(result)
    }

    /// Resolve a legacy `(date, label, amount)` reference to a line
    /// number. Refuses ambiguous tuples; callers holding such references
    /// must migrate to `numero_ligne`.
    pub async fn resolve_by_natural_key(
        &self,
        date: NaiveDate,
        label: &str,
        amount: &BigDecimal,
    ) -> EngineResult<i64> {
        let found = self.store.find_by_legacy_key(date, label, amount).await?;
        match found.len() {
            0 => Err(EngineError::Validation(format!(
                "no statement line matches ({}, {}, {})",
                date, label, amount
            ))),
            1 => Ok(found[0].numero_ligne),
            n => Err(EngineError::Validation(format!(
                "legacy reference ({}, {}, {}) is ambiguous across {} lines",
                date, label, amount, n
            ))),
        }
    }

    /// Annual ledger view: one row per statement line of the year with
    /// the detected partner, matched document totals, and status.
    pub async fn annual_ledger(&self, year: i32) -> EngineResult<AnnualLedger> {
        let period = StatementPeriod::year(year)
            .ok_or_else(|| EngineError::Validation(format!("invalid year {}", year)))?;
        let mut transactions = self.store.transactions_in_period(&period).await?;
        transactions.sort_by_key(|tx| tx.numero_ligne);

        let latest: HashMap<i64, ReconciliationResult> = self
            .store
            .latest_results_in_period(&period)
            .await?
            .into_iter()
            .map(|result| (result.numero_ligne, result))
            .collect();

        let (pool, _) = CandidatePool::assemble(
            self.store.list_invoices().await?,
            self.store.list_subscriptions().await?,
            self.store.list_charge_declarations().await?,
            self.store.list_charge_payments().await?,
        );
        let by_id: HashMap<CandidateId, &Candidate> = pool
            .candidates()
            .iter()
            .map(|candidate| (candidate.id(), candidate))
            .collect();

        let mut rows = Vec::with_capacity(transactions.len());
        for transaction in &transactions {
            let result = latest.get(&transaction.numero_ligne);
            let status = result
                .map(|result| result.status)
                .unwrap_or(MatchStatus::Unmatched);

            let mut matched_pre_tax = BigDecimal::from(0);
            let mut matched_vat = BigDecimal::from(0);
            let mut matched_inclusive = BigDecimal::from(0);
            if let Some(result) = result {
                for id in &result.linked {
                    match by_id.get(id) {
                        Some(Candidate::Invoice(invoice)) => {
                            matched_pre_tax += &invoice.total_pre_tax;
                            matched_vat += &invoice.total_vat;
                            matched_inclusive += &invoice.total_inclusive;
                        }
                        Some(Candidate::Subscription(subscription)) => {
                            let breakdown = VatBreakdown::for_label(
                                subscription.monthly_amount.clone(),
                                subscription.vat_label.as_deref(),
                            );
                            matched_pre_tax += &breakdown.pre_tax;
                            matched_vat += &breakdown.vat;
                            matched_inclusive += &breakdown.total_inclusive;
                        }
                        Some(Candidate::Charge(charge)) => {
                            // social charges carry no VAT
                            matched_pre_tax += &charge.payment.amount;
                            matched_inclusive += &charge.payment.amount;
                        }
                        None => {}
                    }
                }
            }

            rows.push(LedgerRow {
                numero_ligne: transaction.numero_ligne,
                date: transaction.date,
                label: transaction.label.clone(),
                partner: pool
                    .detect_partner(&transaction.label)
                    .map(|partner| partner.name.clone()),
                debit: transaction.debit.clone(),
                credit: transaction.credit.clone(),
                matched_pre_tax,
                matched_vat,
                matched_inclusive,
                status,
            });
        }

        let total_debit: BigDecimal = rows.iter().map(|row| &row.debit).sum();
        let total_credit: BigDecimal = rows.iter().map(|row| &row.credit).sum();
        let total_matched_inclusive: BigDecimal =
            rows.iter().map(|row| &row.matched_inclusive).sum();

        Ok(AnnualLedger {
            year,
            rows,
            total_debit,
            total_credit,
            total_matched_inclusive,
        })
    }

    /// Load the scan pool for inverse matching: every given line with its
    /// detected partner, excluding matched and already-linked lines.
    async fn load_inverse_pool<'a>(
        &self,
        transactions: &'a [BankTransaction],
    ) -> EngineResult<Vec<PoolLine<'a>>> {
        let (pool, _) = CandidatePool::assemble(
            self.store.list_invoices().await?,
            self.store.list_subscriptions().await?,
            Vec::new(),
            Vec::new(),
        );

        let latest: HashMap<i64, MatchStatus> = self
            .store
            .latest_results()
            .await?
            .into_iter()
            .map(|result| (result.numero_ligne, result.status))
            .collect();
        let links = self.store.inverse_links().await?;

        Ok(transactions
            .iter()
            .map(|tx| {
                let matched = latest.get(&tx.numero_ligne) == Some(&MatchStatus::Matched);
                let linked = links.iter().any(|link| link.involves(tx.numero_ligne));
                PoolLine {
                    transaction: tx,
                    partner: pool.detect_partner(&tx.label).cloned(),
                    excluded: matched || linked,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleCondition;
    use crate::utils::memory_store::MemoryStore;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn march(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn debit(ligne: i64, label: &str, amount: &str) -> BankTransaction {
        BankTransaction::new(ligne, march(5), label, dec(amount), BigDecimal::from(0))
    }

    fn purchase(number: &str, partner: &str, ttc: &str) -> Invoice {
        Invoice {
            number: number.to_string(),
            direction: InvoiceDirection::Purchase,
            issue_date: march(4),
            partner: PartnerRef::named(partner),
            total_pre_tax: dec(ttc),
            total_vat: BigDecimal::from(0),
            total_inclusive: dec(ttc),
        }
    }

    fn amount_rule(id: i64) -> ReconciliationRule {
        ReconciliationRule::new(
            id,
            "montant exact",
            RuleCondition::Amount {
                tolerance: dec("0.01"),
            },
        )
    }

    #[tokio::test]
    async fn test_exact_amount_match_claims_the_invoice() {
        let mut store = MemoryStore::new();
        store
            .save_transaction(&debit(1, "PRLV ACME", "100.00"))
            .await
            .unwrap();
        store.add_invoice(purchase("F-1", "ACME", "100.00"));
        store.save_rule(&amount_rule(1)).await.unwrap();

        let mut engine = ReconciliationEngine::new(store.clone());
        let period = StatementPeriod::month(2024, 3).unwrap();
        let report = engine.run(&period).await.unwrap();

        assert_eq!(report.results.len(), 1);
        let result = &report.results[0];
        assert_eq!(result.status, MatchStatus::Matched);
        assert_eq!(result.linked, vec![CandidateId::Invoice("F-1".to_string())]);
        assert_eq!(result.matched_amount, dec("100.00"));
        assert_eq!(result.rule_trail, vec![1]);
        assert!(!result.manual);

        let saved = store.latest_result(1).await.unwrap().unwrap();
        assert_eq!(saved.status, MatchStatus::Matched);
        assert!(report
            .claims
            .is_claimed(&CandidateId::Invoice("F-1".to_string())));
    }

    #[tokio::test]
    async fn test_manual_results_survive_automatic_runs() {
        let mut store = MemoryStore::new();
        store
            .save_transaction(&debit(1, "PRLV ACME", "100.00"))
            .await
            .unwrap();
        store.add_invoice(purchase("F-1", "ACME", "100.00"));
        store.add_invoice(purchase("F-2", "ACME", "100.00"));
        store.save_rule(&amount_rule(1)).await.unwrap();

        let mut engine = ReconciliationEngine::new(store.clone());
        let chosen = engine
            .link_manual(
                1,
                vec![CandidateId::Invoice("F-2".to_string())],
                Some("confirmed with the supplier".to_string()),
            )
            .await
            .unwrap();
        assert!(chosen.manual);
        assert_eq!(chosen.notes.as_deref(), Some("confirmed with the supplier"));

        let period = StatementPeriod::month(2024, 3).unwrap();
        let report = engine.run(&period).await.unwrap();

        let result = &report.results[0];
        assert!(result.manual);
        assert_eq!(result.linked, vec![CandidateId::Invoice("F-2".to_string())]);
        assert_eq!(store.result_history(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_relink_moves_the_claim_to_the_chosen_line() {
        let mut store = MemoryStore::new();
        store
            .save_transaction(&debit(1, "PRLV ACME", "100.00"))
            .await
            .unwrap();
        store
            .save_transaction(&debit(2, "PRLV ACME", "100.00"))
            .await
            .unwrap();
        store.add_invoice(purchase("F-1", "ACME", "100.00"));
        store.save_rule(&amount_rule(1)).await.unwrap();

        let mut engine = ReconciliationEngine::new(store.clone());
        let period = StatementPeriod::month(2024, 3).unwrap();
        engine.run(&period).await.unwrap();
        let first = store.latest_result(1).await.unwrap().unwrap();
        assert_eq!(first.linked, vec![CandidateId::Invoice("F-1".to_string())]);

        // the operator decides the invoice belongs to line 2
        engine
            .link_manual(2, vec![CandidateId::Invoice("F-1".to_string())], None)
            .await
            .unwrap();
        let report = engine.run(&period).await.unwrap();

        let line1 = store.latest_result(1).await.unwrap().unwrap();
        assert_eq!(line1.status, MatchStatus::Unmatched);
        assert!(line1.linked.is_empty());
        let line2 = store.latest_result(2).await.unwrap().unwrap();
        assert!(line2.manual);
        assert_eq!(line2.linked, vec![CandidateId::Invoice("F-1".to_string())]);
        assert!(report.issues.iter().any(|issue| issue.contains("line 1")));
    }

    #[tokio::test]
    async fn test_unchanged_rerun_writes_no_new_records() {
        let mut store = MemoryStore::new();
        store
            .save_transaction(&debit(1, "PRLV ACME", "100.00"))
            .await
            .unwrap();
        store.add_invoice(purchase("F-1", "ACME", "100.00"));
        store.save_rule(&amount_rule(1)).await.unwrap();

        let mut engine = ReconciliationEngine::new(store.clone());
        let period = StatementPeriod::month(2024, 3).unwrap();

        engine.run(&period).await.unwrap();
        let first = store.latest_result(1).await.unwrap().unwrap();

        let report = engine.rerun(&period).await.unwrap();
        let second = store.latest_result(1).await.unwrap().unwrap();

        assert_eq!(store.result_history(1).await.unwrap().len(), 1);
        assert_eq!(first.id, second.id);
        assert_eq!(report.results[0].id, first.id);
    }

    #[tokio::test]
    async fn test_record_transaction_applies_the_validator() {
        let store = MemoryStore::new();
        let mut engine = ReconciliationEngine::new(store);

        let both_columns =
            BankTransaction::new(1, march(5), "PRLV ACME", dec("10.00"), dec("10.00"));
        assert!(engine.record_transaction(&both_columns).await.is_err());

        let fine = debit(2, "PRLV ACME", "10.00");
        engine.record_transaction(&fine).await.unwrap();
        assert!(engine.store().get_transaction(2).await.unwrap().is_some());
    }
}
