//! VAT back-calculation from tax-inclusive amounts and rate labels.
//!
//! Subscriptions and statement amounts are tax-inclusive (TTC); reporting
//! needs the pre-tax amount (HT). Rates are configured as free-text labels
//! ("normal", "réduit", ...) so resolution tolerates accents, case, and,
//! as a fallback, a percentage embedded in the label text.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Named French VAT rate categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VatCategory {
    /// Standard rate - 20%
    Normal,
    /// Intermediate rate - 10%
    Intermediate,
    /// Reduced rate - 5.5%
    Reduced,
    /// Exempt - 0%
    Exempt,
}

impl VatCategory {
    /// Percentage rate of this category
    pub fn rate(&self) -> BigDecimal {
        match self {
            VatCategory::Normal => BigDecimal::from(20),
            VatCategory::Intermediate => BigDecimal::from(10),
            VatCategory::Reduced => BigDecimal::from(55) / BigDecimal::from(10),
            VatCategory::Exempt => BigDecimal::from(0),
        }
    }

    /// Resolve a configured label to a category. Case-insensitive, accents
    /// normalized, both masculine/feminine spellings accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        match fold_accents(label.trim()).to_lowercase().as_str() {
            "normal" | "normale" => Some(VatCategory::Normal),
            "intermediaire" => Some(VatCategory::Intermediate),
            "reduit" | "reduite" => Some(VatCategory::Reduced),
            "exonere" | "exoneree" => Some(VatCategory::Exempt),
            _ => None,
        }
    }
}

/// Percentage rate for an arbitrary label: a named category when
/// recognized, otherwise the first numeric token embedded in the label
/// (e.g. `"TVA 8,5%"` resolves to 8.5), otherwise 0.
pub fn rate_for_label(label: &str) -> BigDecimal {
    if let Some(category) = VatCategory::from_label(label) {
        return category.rate();
    }
    first_numeric_token(label).unwrap_or_else(|| BigDecimal::from(0))
}

/// Derive the pre-tax amount from a tax-inclusive amount and an optional
/// rate label. A missing label returns the amount unchanged.
pub fn to_pre_tax(amount_inclusive: &BigDecimal, vat_label: Option<&str>) -> BigDecimal {
    match vat_label {
        None => amount_inclusive.clone(),
        Some(label) => {
            let divisor = BigDecimal::from(100) + rate_for_label(label);
            (amount_inclusive * BigDecimal::from(100)) / divisor
        }
    }
}

/// HT / TVA / TTC decomposition of a tax-inclusive amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatBreakdown {
    /// Pre-tax amount (HT)
    pub pre_tax: BigDecimal,
    /// VAT amount (TVA)
    pub vat: BigDecimal,
    /// Tax-inclusive amount (TTC)
    pub total_inclusive: BigDecimal,
    /// Percentage rate used
    pub rate: BigDecimal,
}

impl VatBreakdown {
    /// Decompose a tax-inclusive amount at an explicit rate
    pub fn from_inclusive(total_inclusive: BigDecimal, rate: BigDecimal) -> Self {
        let divisor = BigDecimal::from(100) + &rate;
        let pre_tax = (&total_inclusive * BigDecimal::from(100)) / divisor;
        let vat = &total_inclusive - &pre_tax;
        Self {
            pre_tax,
            vat,
            total_inclusive,
            rate,
        }
    }

    /// Decompose a tax-inclusive amount using a rate label; a missing
    /// label means no VAT
    pub fn for_label(total_inclusive: BigDecimal, vat_label: Option<&str>) -> Self {
        let rate = vat_label
            .map(rate_for_label)
            .unwrap_or_else(|| BigDecimal::from(0));
        Self::from_inclusive(total_inclusive, rate)
    }
}

/// Strip the accents found in French rate labels
fn fold_accents(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'À' | 'Â' | 'Ä' => 'A',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'Î' | 'Ï' => 'I',
            'Ô' | 'Ö' => 'O',
            'Ù' | 'Û' | 'Ü' => 'U',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

/// First number embedded in a label, commas accepted as decimal separators
fn first_numeric_token(label: &str) -> Option<BigDecimal> {
    let chars: Vec<char> = label.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let mut token = String::new();
            while i < chars.len() {
                let c = chars[i];
                if c.is_ascii_digit() {
                    token.push(c);
                    i += 1;
                } else if (c == ',' || c == '.')
                    && !token.contains('.')
                    && i + 1 < chars.len()
                    && chars[i + 1].is_ascii_digit()
                {
                    token.push('.');
                    i += 1;
                } else {
                    break;
                }
            }
            return BigDecimal::from_str(&token).ok();
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    fn close(a: &BigDecimal, b: &BigDecimal) -> bool {
        (a - b).abs() <= dec("0.01")
    }

    #[test]
    fn test_named_labels_resolve_with_and_without_accents() {
        assert_eq!(VatCategory::from_label("normal"), Some(VatCategory::Normal));
        assert_eq!(
            VatCategory::from_label("Normale"),
            Some(VatCategory::Normal)
        );
        assert_eq!(
            VatCategory::from_label("réduit"),
            Some(VatCategory::Reduced)
        );
        assert_eq!(VatCategory::from_label("REDUIT"), Some(VatCategory::Reduced));
        assert_eq!(
            VatCategory::from_label("intermédiaire"),
            Some(VatCategory::Intermediate)
        );
        assert_eq!(
            VatCategory::from_label("exonéré"),
            Some(VatCategory::Exempt)
        );
        assert_eq!(VatCategory::from_label("fantaisie"), None);
    }

    #[test]
    fn test_pre_tax_at_the_standard_rate() {
        let pre_tax = to_pre_tax(&dec("120.00"), Some("normal"));
        assert!(close(&pre_tax, &dec("100.00")));
    }

    #[test]
    fn test_pre_tax_at_the_reduced_rate() {
        let pre_tax = to_pre_tax(&dec("105.50"), Some("reduit"));
        assert!(close(&pre_tax, &dec("100.00")));
    }

    #[test]
    fn test_missing_label_returns_the_amount_unchanged() {
        assert_eq!(to_pre_tax(&dec("120.00"), None), dec("120.00"));
    }

    #[test]
    fn test_unknown_label_falls_back_to_the_embedded_number() {
        assert_eq!(rate_for_label("TVA 8,5%"), dec("8.5"));
        let pre_tax = to_pre_tax(&dec("108.50"), Some("TVA 8,5%"));
        assert!(close(&pre_tax, &dec("100.00")));
    }

    #[test]
    fn test_unknown_label_without_a_number_means_no_vat() {
        assert_eq!(rate_for_label("taux special"), BigDecimal::from(0));
        assert_eq!(to_pre_tax(&dec("99.00"), Some("taux special")), dec("99.00"));
    }

    #[test]
    fn test_breakdown_components_sum_to_the_inclusive_total() {
        let breakdown = VatBreakdown::for_label(dec("120.00"), Some("normal"));
        assert!(close(&breakdown.pre_tax, &dec("100.00")));
        assert!(close(&breakdown.vat, &dec("20.00")));
        assert_eq!(
            &breakdown.pre_tax + &breakdown.vat,
            breakdown.total_inclusive
        );
    }
}
