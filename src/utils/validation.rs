//! Validation utilities

use crate::rules::{ReconciliationRule, RuleCondition};
use crate::traits::*;
use crate::types::*;

/// Validate that a statement label is usable
pub fn validate_label(label: &str) -> EngineResult<()> {
    if label.trim().is_empty() {
        return Err(EngineError::Validation(
            "Statement label cannot be empty".to_string(),
        ));
    }

    if label.len() > 500 {
        return Err(EngineError::Validation(
            "Statement label cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a rule name is usable
pub fn validate_rule_name(name: &str) -> EngineResult<()> {
    if name.trim().is_empty() {
        return Err(EngineError::Validation(
            "Rule name cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(EngineError::Validation(
            "Rule name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a keyword expression keeps at least one searchable
/// alternative once blanks are trimmed away
pub fn validate_keyword_expression(expression: &str) -> EngineResult<()> {
    if !expression.split(',').any(|alt| !alt.trim().is_empty()) {
        return Err(EngineError::Validation(
            "Keyword expression needs at least one non-blank alternative".to_string(),
        ));
    }

    Ok(())
}

/// Enhanced statement-line validator with detailed checks
pub struct EnhancedTransactionValidator;

impl TransactionValidator for EnhancedTransactionValidator {
    fn validate_transaction(&self, transaction: &BankTransaction) -> EngineResult<()> {
        // Basic validation
        DefaultTransactionValidator.validate_transaction(transaction)?;

        validate_label(&transaction.label)?;

        if transaction.numero_ligne <= 0 {
            return Err(EngineError::Validation(
                "Statement line numbers start at 1".to_string(),
            ));
        }

        Ok(())
    }
}

/// Enhanced rule validator rejecting degenerate keyword expressions
pub struct EnhancedRuleValidator;

impl RuleValidator for EnhancedRuleValidator {
    fn validate_rule(&self, rule: &ReconciliationRule) -> EngineResult<()> {
        // Basic validation
        rule.validate()?;

        validate_rule_name(&rule.name)?;

        match &rule.condition {
            RuleCondition::Label { keywords } => validate_keyword_expression(keywords)?,
            RuleCondition::MonthlySupplier {
                keywords: Some(keywords),
                ..
            } => validate_keyword_expression(keywords)?,
            _ => {}
        }

        Ok(())
    }
}
