//! Matching rules and their condition grammar.
//!
//! A rule is plain data: a typed condition plus a score contribution and an
//! evaluation priority. Conditions are validated when a rule is authored,
//! not when it first runs, so a malformed rule is rejected before it can
//! silently skip transactions.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::types::{EngineError, EngineResult};

fn default_tolerance() -> BigDecimal {
    // one cent
    BigDecimal::from(1) / BigDecimal::from(100)
}

fn default_window_days() -> i64 {
    7
}

fn default_active() -> bool {
    true
}

/// Typed condition of a reconciliation rule.
///
/// Serialized with an explicit `kind` tag so stored rules remain readable
/// and unknown kinds fail loudly at load time instead of being ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCondition {
    /// Candidate amount equals the transaction amount within `tolerance`
    Amount {
        #[serde(default = "default_tolerance")]
        tolerance: BigDecimal,
    },
    /// Transaction date falls within `window_days` of the candidate's
    /// anchor date (issue date or effective charge period)
    Date {
        #[serde(default = "default_window_days")]
        window_days: i64,
    },
    /// Statement label matches a keyword expression: comma-separated
    /// alternatives of whitespace-joined required words
    Label { keywords: String },
    /// Transaction direction (debit/credit) agrees with the candidate kind
    TransactionType,
    /// Candidate counterparty equals the partner detected on the
    /// transaction label
    Partner,
    /// Recurring supplier paid monthly: label keywords plus amount
    /// tolerance, optionally restricted to the same calendar month
    MonthlySupplier {
        supplier: String,
        /// Extra keyword expression; the supplier name is matched when absent
        #[serde(default)]
        keywords: Option<String>,
        #[serde(default = "default_tolerance")]
        tolerance: BigDecimal,
        #[serde(default)]
        same_month: bool,
    },
    /// Candidate is a subscription, optionally one specific subscription
    Subscription {
        #[serde(default)]
        subscription_id: Option<String>,
    },
    /// Candidate is a charge payment, optionally for one declaration
    ChargeDeclaration {
        #[serde(default)]
        declaration_id: Option<String>,
    },
}

impl RuleCondition {
    /// Stable name of the condition kind, matching its serialized tag
    pub fn kind(&self) -> &'static str {
        match self {
            RuleCondition::Amount { .. } => "AMOUNT",
            RuleCondition::Date { .. } => "DATE",
            RuleCondition::Label { .. } => "LABEL",
            RuleCondition::TransactionType => "TRANSACTION_TYPE",
            RuleCondition::Partner => "PARTNER",
            RuleCondition::MonthlySupplier { .. } => "MONTHLY_SUPPLIER",
            RuleCondition::Subscription { .. } => "SUBSCRIPTION",
            RuleCondition::ChargeDeclaration { .. } => "CHARGE_DECLARATION",
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            RuleCondition::Amount { tolerance } => {
                if tolerance < &BigDecimal::from(0) {
                    return Err("amount tolerance must not be negative".to_string());
                }
            }
            RuleCondition::Date { window_days } => {
                if *window_days < 0 {
                    return Err("date window must not be negative".to_string());
                }
            }
            RuleCondition::Label { keywords } => {
                if keywords.trim().is_empty() {
                    return Err("label condition requires at least one keyword".to_string());
                }
            }
            RuleCondition::MonthlySupplier {
                supplier,
                keywords,
                tolerance,
                ..
            } => {
                if supplier.trim().is_empty() {
                    return Err("monthly supplier condition requires a supplier name".to_string());
                }
                if let Some(kw) = keywords {
                    if kw.trim().is_empty() {
                        return Err(
                            "monthly supplier keywords must be omitted or non-empty".to_string()
                        );
                    }
                }
                if tolerance < &BigDecimal::from(0) {
                    return Err("amount tolerance must not be negative".to_string());
                }
            }
            RuleCondition::TransactionType
            | RuleCondition::Partner
            | RuleCondition::Subscription { .. }
            | RuleCondition::ChargeDeclaration { .. } => {}
        }
        Ok(())
    }
}

/// A configurable matching rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationRule {
    /// Rule id, unique across the rule set
    pub id: i64,
    /// Human-readable rule name
    pub name: String,
    pub condition: RuleCondition,
    /// Score contribution when the condition holds, 0 to 100
    pub score: u8,
    /// Evaluation and tie-break order; lower runs first and wins ties
    pub priority: i32,
    /// Inactive rules are skipped without being deleted
    #[serde(default = "default_active")]
    pub active: bool,
}

impl ReconciliationRule {
    /// Create a rule with the default score contribution and priority
    pub fn new(id: i64, name: impl Into<String>, condition: RuleCondition) -> Self {
        Self {
            id,
            name: name.into(),
            condition,
            score: 10,
            priority: 100,
            active: true,
        }
    }

    /// Validate the rule at authoring time
    pub fn validate(&self) -> EngineResult<()> {
        if self.score > 100 {
            return Err(EngineError::RuleConfiguration {
                rule_id: self.id,
                reason: format!("score {} exceeds the maximum of 100", self.score),
            });
        }
        if self.name.trim().is_empty() {
            return Err(EngineError::RuleConfiguration {
                rule_id: self.id,
                reason: "rule name must not be empty".to_string(),
            });
        }
        self.condition
            .check()
            .map_err(|reason| EngineError::RuleConfiguration {
                rule_id: self.id,
                reason,
            })
    }
}

/// Order rules for evaluation: by priority, then by id for a stable order
/// between rules sharing a priority
pub fn sort_for_evaluation(rules: &mut [ReconciliationRule]) {
    rules.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_kind_tags_round_trip() {
        let rule = ReconciliationRule::new(
            1,
            "amount within a cent",
            RuleCondition::Amount {
                tolerance: default_tolerance(),
            },
        );
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"kind\":\"AMOUNT\""));
        let back: ReconciliationRule = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rule);

        let json = serde_json::to_string(&RuleCondition::TransactionType).unwrap();
        assert!(json.contains("\"kind\":\"TRANSACTION_TYPE\""));
        let json = serde_json::to_string(&RuleCondition::MonthlySupplier {
            supplier: "OVH".to_string(),
            keywords: None,
            tolerance: default_tolerance(),
            same_month: true,
        })
        .unwrap();
        assert!(json.contains("\"kind\":\"MONTHLY_SUPPLIER\""));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let raw = r#"{"id":9,"name":"mystery","condition":{"kind":"REGEX","pattern":".*"},"score":10,"priority":100}"#;
        assert!(serde_json::from_str::<ReconciliationRule>(raw).is_err());
    }

    #[test]
    fn test_defaults_fill_in_when_omitted() {
        let raw = r#"{"id":2,"name":"date near","condition":{"kind":"DATE"},"score":10,"priority":50}"#;
        let rule: ReconciliationRule = serde_json::from_str(raw).unwrap();
        assert_eq!(
            rule.condition,
            RuleCondition::Date {
                window_days: default_window_days()
            }
        );
        assert!(rule.active);
    }

    #[test]
    fn test_validation_rejects_bad_conditions() {
        let mut rule = ReconciliationRule::new(
            3,
            "empty keywords",
            RuleCondition::Label {
                keywords: "   ".to_string(),
            },
        );
        assert!(rule.validate().is_err());

        rule.condition = RuleCondition::Amount {
            tolerance: BigDecimal::from(-1),
        };
        assert!(rule.validate().is_err());

        rule.condition = RuleCondition::Date { window_days: -3 };
        assert!(rule.validate().is_err());

        rule.condition = RuleCondition::TransactionType;
        rule.score = 101;
        assert!(rule.validate().is_err());

        rule.score = 100;
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_sort_orders_by_priority_then_id() {
        let mut rules = vec![
            ReconciliationRule {
                priority: 20,
                ..ReconciliationRule::new(5, "b", RuleCondition::TransactionType)
            },
            ReconciliationRule {
                priority: 10,
                ..ReconciliationRule::new(7, "c", RuleCondition::TransactionType)
            },
            ReconciliationRule {
                priority: 20,
                ..ReconciliationRule::new(2, "a", RuleCondition::TransactionType)
            },
        ];
        sort_for_evaluation(&mut rules);
        let ids: Vec<i64> = rules.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![7, 2, 5]);
    }
}
