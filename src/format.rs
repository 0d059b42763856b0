//! Display helpers for prices and dates.

use chrono::{DateTime, NaiveDate};

/// Format `value` with two decimals and the currency's symbol when known,
/// e.g. `€9.99`, `$1,250.00`, `12.00 CHF`.
pub fn format_currency(value: f64, currency: &str) -> String {
  let code = currency.to_uppercase();
  let amount = group_thousands(&format!("{:.2}", value.abs()));
  let sign = if value < 0.0 { "-" } else { "" };

  match currency_symbol(&code) {
    Some(symbol) => format!("{}{}{}", sign, symbol, amount),
    None => format!("{}{} {}", sign, amount, code),
  }
}

fn currency_symbol(code: &str) -> Option<&'static str> {
  match code {
    "EUR" => Some("€"),
    "USD" => Some("$"),
    "GBP" => Some("£"),
    "JPY" => Some("¥"),
    _ => None,
  }
}

/// Insert `,` between groups of three digits of the integer part.
fn group_thousands(amount: &str) -> String {
  let (int_part, frac_part) = amount.split_once('.').unwrap_or((amount, ""));
  let mut grouped = String::with_capacity(amount.len() + int_part.len() / 3);
  for (i, c) in int_part.chars().enumerate() {
    if i > 0 && (int_part.len() - i) % 3 == 0 {
      grouped.push(',');
    }
    grouped.push(c);
  }
  if !frac_part.is_empty() {
    grouped.push('.');
    grouped.push_str(frac_part);
  }
  grouped
}

/// `YYYY-MM-DD` of an RFC 3339 timestamp or a plain date. Unparseable input
/// is returned unchanged.
pub fn format_date(value: &str) -> String {
  if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
    return dt.date_naive().format("%Y-%m-%d").to_string();
  }
  if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
    return date.format("%Y-%m-%d").to_string();
  }
  value.to_string()
}
