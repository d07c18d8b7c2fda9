//! Tax module containing VAT rate resolution and back-calculation

pub mod vat;

pub use vat::*;
