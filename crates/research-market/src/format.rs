//! Human-readable rendering of market figures
//!
//! Missing values render as `N/A` so templates and report slides never show
//! empty cells.

pub const NOT_AVAILABLE: &str = "N/A";

/// `$2.95T`, `$812.40B`, `$3.10M`, `$45.00K`, `$189.84`
///
/// Zero and missing amounts are `N/A`.
pub fn format_currency(amount: Option<f64>) -> String {
    let Some(amount) = amount.filter(|a| a.is_finite() && *a != 0.0) else {
        return NOT_AVAILABLE.to_string();
    };

    let abs = amount.abs();
    if abs >= 1e12 {
        format!("${:.2}T", amount / 1e12)
    } else if abs >= 1e9 {
        format!("${:.2}B", amount / 1e9)
    } else if abs >= 1e6 {
        format!("${:.2}M", amount / 1e6)
    } else if abs >= 1e3 {
        format!("${:.2}K", amount / 1e3)
    } else {
        format!("${amount:.2}")
    }
}

/// A fraction rendered as a percentage: `0.1234` → `12.34%`
pub fn format_percentage(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite()) {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Two-decimal ratio; zero and missing values are `N/A`
pub fn format_ratio(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite() && *v != 0.0) {
        Some(v) => format!("{v:.2}"),
        None => NOT_AVAILABLE.to_string(),
    }
}

/// Plain price without magnitude suffix: `$1234.50`
pub fn format_price(value: Option<f64>) -> String {
    match value.filter(|v| v.is_finite() && *v > 0.0) {
        Some(v) => format!("${v:.2}"),
        None => NOT_AVAILABLE.to_string(),
    }
}
