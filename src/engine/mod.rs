//! Engine orchestration and run policy

pub mod core;
pub mod policy;

pub use self::core::*;
pub use policy::*;
