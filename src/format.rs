use time::macros::format_description;
use time::Date;

use crate::error::{LedgerError, Result};

/// `1234567.5` -> `1,234,567.50`
pub fn format_money(v: f64) -> String {
    let s = format!("{:.2}", v);
    let (sign, s) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };
    let parts = s.split('.').collect::<Vec<_>>();
    let int_part = parts[0];
    let dec_part = parts.get(1).copied().unwrap_or("00");

    let mut out = String::new();
    let chars: Vec<char> = int_part.chars().collect();
    let mut cnt = 0;
    for i in (0..chars.len()).rev() {
        if cnt == 3 {
            out.push(',');
            cnt = 0;
        }
        out.push(chars[i]);
        cnt += 1;
    }
    let int_with_sep: String = out.chars().rev().collect();
    format!("{}{}.{}", sign, int_with_sep, dec_part)
}

/// Grams, two decimals.
pub fn format_weight(v: f64) -> String {
    format!("{:.2}", v)
}

/// Fineness, three decimals (`0.999`).
pub fn format_purity(v: f64) -> String {
    format!("{:.3}", v)
}

/// Rate per gram without thousands separators, as in the ledger tables.
pub fn format_rate(v: f64) -> String {
    format!("{:.2}", v)
}

/// Display label for an order's invoice, e.g. `ORD-0007`. Not a sequence of its own.
pub fn invoice_label(prefix: &str, order_id: i64) -> String {
    format!("{}-{:0>4}", prefix, order_id)
}

pub fn format_date(d: Date) -> String {
    d.format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| d.to_string())
}

/// Parses `YYYY-MM-DD`.
pub fn parse_date(input: &str) -> Result<Date> {
    Date::parse(input.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|e| LedgerError::validation("date", format!("'{}' is not a YYYY-MM-DD date: {e}", input.trim())))
}

pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        let ok = ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' || ch == '.' || ch == ' ';
        out.push(if ok { ch } else { '_' });
    }
    let trimmed = out.trim().to_string();
    if trimmed.is_empty() { "document".to_string() } else { trimmed }
}
