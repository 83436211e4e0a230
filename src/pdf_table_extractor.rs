use regex::Regex;
use std::sync::OnceLock;

use crate::amount_parser::parse_optional_amount;
use crate::date_normalizer::find_first_date;
use crate::error::{LedgerError, LedgerResult};
use crate::transaction_normalizer::RawStatementRow;

const MIN_DESCRIPTION_LEN: usize = 3;
const SAMPLE_LINES_ON_EMPTY: usize = 10;

fn amount_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{1,3}(?:,\d{2,3})+(?:\.\d{2})?|\d+(?:\.\d{2})?").expect("amount regex")
    })
}

fn bare_short_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}$").expect("short number regex"))
}

fn ws_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("ws regex"))
}

fn normalize_line(raw: &str) -> String {
    ws_re().replace_all(raw.trim(), " ").trim().to_string()
}

/// Pulls the text layer out of an in-memory PDF.
pub fn extract_pdf_text(bytes: &[u8]) -> LedgerResult<String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| LedgerError::UnreadablePdf(e.to_string()))
}

/// Extracts statement rows from a PDF file's bytes.
pub fn extract_pdf_rows(bytes: &[u8]) -> LedgerResult<Vec<RawStatementRow>> {
    let text = extract_pdf_text(bytes)?;
    parse_statement_text(&text)
}

/// Rebuilds statement rows from extracted PDF text.
///
/// Only a document without any text is an error; lines that do not look like
/// transactions are dropped silently.
pub fn parse_statement_text(text: &str) -> LedgerResult<Vec<RawStatementRow>> {
    if text.trim().is_empty() {
        return Err(LedgerError::NoExtractableText);
    }

    let mut rows = Vec::new();
    let mut line_no = 0_usize;
    for (page_idx, page_text) in text.split('\u{000C}').enumerate() {
        for raw_line in page_text.lines() {
            line_no += 1;
            let line = raw_line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(row) = parse_statement_line(line, line_no) {
                tracing::debug!(
                    page = page_idx + 1,
                    line = line_no,
                    "found transaction: {} | {} | Dr:{} | Cr:{}",
                    row.date,
                    row.description,
                    row.debit,
                    row.credit
                );
                rows.push(row);
            }
        }
    }

    if rows.is_empty() {
        let sample = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(SAMPLE_LINES_ON_EMPTY)
            .collect::<Vec<_>>();
        tracing::warn!(?sample, "no transactions found in PDF text");
    } else {
        tracing::info!("extracted {} transactions from PDF", rows.len());
    }
    Ok(rows)
}

struct AmountToken<'a> {
    start: usize,
    text: &'a str,
}

/// Interprets one text line as a statement row, if it is one.
///
/// The line must contain a date; numeric tokens after the date are amounts,
/// except bare one- or two-digit numbers. With more than two amounts the last
/// one is a running balance. Two amounts are read as (debit, credit), a single
/// amount as a debit.
pub fn parse_statement_line(line: &str, line_no: usize) -> Option<RawStatementRow> {
    let date = find_first_date(line)?;
    let rest = &line[date.end..];

    let tokens = amount_token_re()
        .find_iter(rest)
        .map(|m| AmountToken {
            start: m.start(),
            text: m.as_str(),
        })
        .filter(|t| !bare_short_number_re().is_match(t.text) && t.text != date.text)
        .collect::<Vec<_>>();
    let first = tokens.first()?;

    let description = normalize_line(&rest[..first.start]);
    if description.chars().count() < MIN_DESCRIPTION_LEN {
        return None;
    }

    let relevant = if tokens.len() > 2 {
        &tokens[..tokens.len() - 1]
    } else {
        &tokens[..]
    };
    let non_zero = |t: &AmountToken<'_>| -> String {
        match parse_optional_amount(t.text) {
            Ok(Some(_)) => t.text.to_string(),
            _ => String::new(),
        }
    };
    let (debit, credit) = match relevant {
        [dr, cr, ..] => (non_zero(dr), non_zero(cr)),
        [only] => (only.text.to_string(), String::new()),
        [] => return None,
    };
    if debit.is_empty() && credit.is_empty() {
        return None;
    }

    Some(RawStatementRow {
        line_no,
        date: date.text,
        description,
        debit,
        credit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn withdrawal_line_excludes_running_balance() {
        let row = parse_statement_line("15-01-2024 ATM WDL 2,000.00 0.00 48,000.00", 1).unwrap();
        assert_eq!(row.date, "15-01-2024");
        assert_eq!(row.description, "ATM WDL");
        assert_eq!(row.debit, "2,000.00");
        assert_eq!(row.credit, "");
    }

    #[test]
    fn withdrawal_line_normalizes_to_a_debit() {
        use crate::models::TransactionKind;
        use crate::transaction_normalizer::normalize_row;

        let row = parse_statement_line("15-01-2024 ATM WDL 2,000.00 0.00 48,000.00", 1).unwrap();
        let tx = normalize_row(&row).unwrap();
        assert_eq!((tx.date.year, tx.date.month, tx.date.day), (2024, 1, 15));
        assert_eq!(tx.amount_cents, 200_000);
        assert_eq!(tx.kind, TransactionKind::Debit);
        assert_eq!(tx.description, "ATM WDL");
    }

    #[test]
    fn deposit_line_keeps_credit_column() {
        let row =
            parse_statement_line("02/01/2024   NEFT   SALARY  ACME   0.00   50,000.00   98,000.00", 7)
                .unwrap();
        assert_eq!(row.line_no, 7);
        assert_eq!(row.description, "NEFT SALARY ACME");
        assert_eq!(row.debit, "");
        assert_eq!(row.credit, "50,000.00");
    }

    #[test]
    fn single_amount_is_read_as_debit() {
        let row = parse_statement_line("03 Jan 2024 Interest credited 125.50", 1).unwrap();
        assert_eq!(row.date, "03 Jan 2024");
        assert_eq!(row.debit, "125.50");
        assert_eq!(row.credit, "");
    }

    #[test]
    fn ungrouped_amounts_stay_whole() {
        let row = parse_statement_line("2024-01-20 UPI COFFEE 50000.00 0.00 98000.00", 1).unwrap();
        assert_eq!(row.debit, "50000.00");
        assert_eq!(row.credit, "");
    }

    #[test]
    fn noise_lines_are_dropped() {
        // no date
        assert!(parse_statement_line("Opening Balance 1,000.00", 1).is_none());
        // description too short
        assert!(parse_statement_line("15-01-2024 AB 500.00", 1).is_none());
        // only bare short numbers after the date
        assert!(parse_statement_line("15-01-2024 Page 1 of 3", 1).is_none());
        // both amounts zero
        assert!(parse_statement_line("15-01-2024 Reversal 0.00 0.00 1,000.00", 1).is_none());
    }

    #[test]
    fn text_without_rows_is_not_an_error() {
        let rows = parse_statement_text("Account Statement\nCustomer: Jane\n").unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn blank_text_has_no_extractable_text() {
        assert!(matches!(
            parse_statement_text("  \n\u{000C}\n "),
            Err(LedgerError::NoExtractableText)
        ));
    }

    #[test]
    fn parses_rows_across_pages() {
        let text = "Date Narration Withdrawal Deposit Balance\n\
                    01-01-2024 Salary Jan 0.00 50,000.00 50,000.00\n\
                    \u{000C}Page 2\n\
                    02-01-2024 Office Rent 5,000.00 0.00 45,000.00\n";
        let rows = parse_statement_text(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].credit, "50,000.00");
        assert_eq!(rows[1].description, "Office Rent");
        assert_eq!(rows[1].debit, "5,000.00");
    }

    #[test]
    fn garbage_bytes_are_an_unreadable_pdf() {
        assert!(matches!(
            extract_pdf_rows(b"definitely not a pdf"),
            Err(LedgerError::UnreadablePdf(_))
        ));
    }
}
