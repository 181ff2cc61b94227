//! BRL money formatting and percentage helpers.
//!
//! Monetary quantities flow through the desk as `f64` reais. Arithmetic
//! stays in plain floats; this module only owns presentation (Brazilian
//! grouping: dot for thousands, comma for cents) and the percentage
//! convention used by allocation math (`20.0` means 20%).

use std::fmt;

/// A BRL amount for display purposes.
///
/// `Brl(1234.5)` renders as `R$ 1.234,50`.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Brl(pub f64);

impl fmt::Display for Brl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cents = (self.0.abs() * 100.0).round() as i64;
        let sign = if self.0 < 0.0 && cents > 0 { "-" } else { "" };
        let reais = cents / 100;
        let frac = cents % 100;
        write!(f, "{sign}R$ {},{frac:02}", group_thousands(reais))
    }
}

/// Render an integer with dots every three digits: `1234567` -> `1.234.567`.
fn group_thousands(mut n: i64) -> String {
    if n < 1000 {
        return n.to_string();
    }
    let mut parts = Vec::new();
    while n >= 1000 {
        parts.push(format!("{:03}", n % 1000));
        n /= 1000;
    }
    parts.push(n.to_string());
    parts.reverse();
    parts.join(".")
}

/// Position value as a percentage of allocated capital.
///
/// Returns 0.0 when capital is zero or negative; a bad allocation record
/// must not produce infinities downstream.
pub fn position_pct(value: f64, capital: f64) -> f64 {
    if capital <= 0.0 {
        return 0.0;
    }
    value / capital * 100.0
}

/// Format a share quantity with thousands grouping, sign preserved.
pub fn fmt_qty(quantity: i64) -> String {
    let grouped = group_thousands(quantity.abs());
    if quantity < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
