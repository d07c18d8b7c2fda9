//! Matching module containing the rule evaluator, scoring, aggregation,
//! inverse-pair detection, and the claim ledger

pub mod aggregate;
pub mod claims;
pub mod inverse;
pub mod keywords;
pub mod outcome;
pub mod period;
pub mod pool;
pub mod rule_eval;
pub mod scoring;
pub mod tolerance;

pub use aggregate::*;
pub use claims::*;
pub use inverse::*;
pub use keywords::*;
pub use outcome::*;
pub use period::*;
pub use pool::*;
pub use rule_eval::*;
pub use scoring::*;
pub use tolerance::*;
