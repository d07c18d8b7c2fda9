//! Tolerance-based monetary comparison.
//!
//! Every amount comparison in the engine routes through this module so a
//! single policy governs rounding. Amounts stay as `BigDecimal` end to end;
//! binary floating point never touches money.

use bigdecimal::BigDecimal;

/// One cent, the default tolerance for amount and balance checks
pub fn cent() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Whether two amounts are equal within `tolerance` (inclusive bound)
pub fn within_tolerance(a: &BigDecimal, b: &BigDecimal, tolerance: &BigDecimal) -> bool {
    (a - b).abs() <= *tolerance
}
