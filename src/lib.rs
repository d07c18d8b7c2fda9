//! # Reconciliation Core
//!
//! A bank reconciliation library matching statement lines against
//! invoices, subscriptions, and social charge payments through
//! configurable scoring rules.
//!
//! ## Features
//!
//! - **Rule-based scoring**: additive match rules over amount, date, label
//!   keywords, transaction direction, partner, and recurring suppliers
//! - **Mutual exclusion**: a claim ledger guarantees no document ever
//!   explains two statement lines
//! - **Many-to-one aggregation**: one payment settling several invoices,
//!   searched exhaustively for small pools and greedily beyond
//! - **Offsetting pairs**: refunds and bounced debits paired with their
//!   original line and taken out of the matching pool
//! - **VAT back-calculation**: pre-tax amounts recovered from inclusive
//!   totals and French VAT labels
//! - **Storage abstraction**: database-agnostic design with trait-based
//!   storage
//!
//! ## Quick Start
//!
//! ```rust
//! use reconciliation_core::{ReconciliationEngine, MatchPolicy, StatementPeriod};
//! use bigdecimal::BigDecimal;
//! use chrono::NaiveDate;
//!
//! // This example shows basic usage - you need to implement the
//! // ReconciliationStore trait, or use MemoryStore from utils for tests
//! // let store = YourStoreImplementation::new();
//! // let mut engine = ReconciliationEngine::new(store);
//! ```

pub mod engine;
pub mod matching;
pub mod rules;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use engine::*;
pub use rules::*;
pub use tax::vat::*;
pub use traits::*;
pub use types::*;

// Re-export the claim ledger for storage implementors
pub use matching::claims::ClaimLedger;
