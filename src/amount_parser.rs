use crate::error::{LedgerError, LedgerResult};

const CURRENCY_MARKS: &[char] = &['₹', '$', '€', '£'];

/// Largest accepted magnitude for a single amount (10^13 in major units).
pub const MAX_AMOUNT_CENTS: i64 = 1_000_000_000_000_000;

fn malformed(raw: &str) -> LedgerError {
    LedgerError::UnparseableAmount(raw.to_string())
}

/// Parses a statement amount token into signed integer cents.
///
/// Accepts comma grouping in any group size (`1,000.00`, `1,00,000.00`), at
/// most one decimal point followed by one or two digits, an optional leading
/// sign and a leading currency mark. Tokens without digits, with empty comma
/// groups, with more than two decimals, or above [`MAX_AMOUNT_CENTS`] fail
/// with [`LedgerError::UnparseableAmount`].
pub fn parse_amount_to_cents(raw: &str) -> LedgerResult<i64> {
    let mut s: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let negative = s.starts_with('-');
    if s.starts_with('-') || s.starts_with('+') {
        s.remove(0);
    }
    let s = s.trim_start_matches(CURRENCY_MARKS);
    if !s.chars().any(|c| c.is_ascii_digit()) {
        return Err(malformed(raw));
    }

    let parts = s.split('.').collect::<Vec<_>>();
    if parts.len() > 2 {
        return Err(malformed(raw));
    }

    let int_text = parts[0];
    let mut int_digits = String::with_capacity(int_text.len());
    if !int_text.is_empty() {
        for group in int_text.split(',') {
            if group.is_empty() || !group.chars().all(|c| c.is_ascii_digit()) {
                return Err(malformed(raw));
            }
            int_digits.push_str(group);
        }
    }
    if int_digits.is_empty() {
        int_digits.push('0');
    }

    let frac_text = parts.get(1).copied();
    let frac_val = match frac_text {
        None => 0_i64,
        Some(frac) => {
            if frac.is_empty() || frac.len() > 2 || !frac.chars().all(|c| c.is_ascii_digit()) {
                return Err(malformed(raw));
            }
            let v = frac.parse::<i64>().map_err(|_| malformed(raw))?;
            if frac.len() == 1 {
                v * 10
            } else {
                v
            }
        }
    };

    let int_val = int_digits.parse::<i64>().map_err(|_| malformed(raw))?;
    let cents = int_val
        .checked_mul(100)
        .and_then(|v| v.checked_add(frac_val))
        .filter(|v| *v <= MAX_AMOUNT_CENTS)
        .ok_or_else(|| malformed(raw))?;
    Ok(if negative { -cents } else { cents })
}

/// Parses an optional amount cell: blank cells are `None`, zero is `None`.
pub fn parse_optional_amount(raw: &str) -> LedgerResult<Option<i64>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let cents = parse_amount_to_cents(raw)?;
    Ok(if cents == 0 { None } else { Some(cents) })
}
