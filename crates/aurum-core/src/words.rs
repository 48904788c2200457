//! Amount in words, Indian numbering (crore, lakh, thousand, hundred).
//!
//! ```text
//! ₹1,180.00        One Thousand One Hundred Eighty Rupees
//! ₹12,34,567.89    Twelve Lakh Thirty Four Thousand Five Hundred Sixty Seven Rupees and Eighty Nine Paise
//! ```

use crate::money::Money;

const ONES: [&str; 20] = [
    "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
    "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen",
    "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

const CRORE: u64 = 10_000_000;
const LAKH: u64 = 100_000;
const THOUSAND: u64 = 1_000;

fn below_hundred(n: u64, out: &mut Vec<String>) {
    if n < 20 {
        out.push(ONES[n as usize].to_string());
    } else {
        out.push(TENS[(n / 10) as usize].to_string());
        if n % 10 != 0 {
            out.push(ONES[(n % 10) as usize].to_string());
        }
    }
}

fn push_words(n: u64, out: &mut Vec<String>) {
    let mut rest = n;

    if rest >= CRORE {
        // crores above 99 are themselves spelled in Indian grouping
        push_words(rest / CRORE, out);
        out.push("Crore".to_string());
        rest %= CRORE;
    }
    for (unit, name) in [(LAKH, "Lakh"), (THOUSAND, "Thousand"), (100, "Hundred")] {
        if rest >= unit {
            below_hundred(rest / unit, out);
            out.push(name.to_string());
            rest %= unit;
        }
    }
    if rest > 0 {
        below_hundred(rest, out);
    }
}

/// Spells a whole number, "Zero" for 0.
pub fn number_in_words(n: u64) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }
    let mut out = Vec::new();
    push_words(n, &mut out);
    out.join(" ")
}

/// Spells an amount for the invoice footer.
///
/// Always says "Rupees"; adds "and N Paise" when the paise part is non-zero;
/// negative amounts are prefixed with "Minus".
pub fn amount_in_words(amount: Money) -> String {
    let rupees = amount.rupees().unsigned_abs();
    let paise = amount.paise_part() as u64;

    let mut text = String::new();
    if amount.is_negative() {
        text.push_str("Minus ");
    }
    text.push_str(&number_in_words(rupees));
    text.push_str(" Rupees");
    if paise > 0 {
        text.push_str(" and ");
        text.push_str(&number_in_words(paise));
        text.push_str(" Paise");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoice_scenario() {
        assert_eq!(
            amount_in_words(Money::from_rupees(1180)),
            "One Thousand One Hundred Eighty Rupees"
        );
    }

    #[test]
    fn test_indian_grouping() {
        assert_eq!(number_in_words(100_000), "One Lakh");
        assert_eq!(
            number_in_words(1_234_567),
            "Twelve Lakh Thirty Four Thousand Five Hundred Sixty Seven"
        );
        assert_eq!(number_in_words(10_000_000), "One Crore");
        assert_eq!(
            number_in_words(1_205_000_019),
            "One Hundred Twenty Crore Fifty Lakh Nineteen"
        );
    }

    #[test]
    fn test_paise_zero_and_negative() {
        assert_eq!(amount_in_words(Money::zero()), "Zero Rupees");
        assert_eq!(
            amount_in_words(Money::from_paise(1_050)),
            "Ten Rupees and Fifty Paise"
        );
        assert_eq!(amount_in_words(Money::from_paise(-49)), "Minus Zero Rupees and Forty Nine Paise");
        assert_eq!(amount_in_words(Money::from_rupees(-15)), "Minus Fifteen Rupees");
    }
}
