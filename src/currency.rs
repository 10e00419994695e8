//! Monetary formatting and parsing for the Brazilian real.
//!
//! Bills are plain `f64` values; every operation that embeds a value in a
//! payload or shows it to the operator rounds to 2 decimal places first.

/// Round a monetary value to 2 decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Format a value for display as Brazilian currency, e.g. `R$ 12,50`.
pub fn format_currency(value: f64) -> String {
    format!("R$ {}", format!("{:.2}", value).replace('.', ","))
}

/// Parse a currency string back into a number.
///
/// Accepts anything `format_currency` produced plus free-form operator input
/// (`"R$ 1234,56"`, `"12,5"`, `"8"`). Returns `0.0` when no number can be
/// extracted.
pub fn parse_currency(text: &str) -> f64 {
    let clean: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',')
        .collect();
    clean.replace(',', ".").parse::<f64>().unwrap_or(0.0)
}

/// Apply the currency input mask to a raw digit stream.
///
/// The digits are interpreted as centavos: `"1234"` becomes `R$ 12,34`.
/// An empty input stays empty; input with no digits renders the bare prefix
/// so the text field keeps its shape while the operator types.
pub fn mask_currency(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let digits: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    let cents: u64 = match digits.parse() {
        Ok(v) => v,
        Err(_) => return "R$ ".to_string(),
    };

    format_currency(cents as f64 / 100.0)
}

/// Process one keystroke's worth of text from the price field.
///
/// When the field already carries the `R$ ` prefix only the digits after it
/// are re-masked, so deleting and retyping inside the field behaves sanely.
pub fn handle_currency_input(text: &str) -> String {
    match text.strip_prefix("R$ ") {
        Some(rest) => {
            let digits: String = rest.chars().filter(|c| c.is_ascii_digit()).collect();
            if digits.is_empty() {
                return "R$ ".to_string();
            }
            let cents: u64 = digits.parse().unwrap_or(0);
            format_currency(cents as f64 / 100.0)
        }
        None => mask_currency(text),
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(12.5), "R$ 12,50");
        assert_eq!(format_currency(0.0), "R$ 0,00");
        assert_eq!(format_currency(1234.56), "R$ 1234,56");
        assert_eq!(format_currency(0.5), "R$ 0,50");
    }

    #[test]
    fn test_parse_currency() {
        assert!((parse_currency("R$ 12,50") - 12.5).abs() < 0.001);
        assert!((parse_currency("1234,56") - 1234.56).abs() < 0.001);
        assert!((parse_currency("8") - 8.0).abs() < 0.001);
        assert_eq!(parse_currency(""), 0.0);
        assert_eq!(parse_currency("abc"), 0.0);
    }

    #[test]
    fn test_format_parse_round_trip() {
        for value in [0.0, 0.5, 5.0, 12.34, 999.99] {
            assert!((parse_currency(&format_currency(value)) - value).abs() < 0.001);
        }
    }

    #[test]
    fn test_mask_currency() {
        assert_eq!(mask_currency("1234"), "R$ 12,34");
        assert_eq!(mask_currency("5"), "R$ 0,05");
        assert_eq!(mask_currency(""), "");
        assert_eq!(mask_currency("abc"), "R$ ");
    }

    #[test]
    fn test_handle_currency_input_with_prefix() {
        assert_eq!(handle_currency_input("R$ 12,34"), "R$ 12,34");
        assert_eq!(handle_currency_input("R$ 123"), "R$ 1,23");
        assert_eq!(handle_currency_input("R$ "), "R$ ");
    }

    #[test]
    fn test_handle_currency_input_without_prefix() {
        assert_eq!(handle_currency_input("2050"), "R$ 20,50");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(5.004), 5.0);
        assert_eq!(round2(5.006), 5.01);
        assert_eq!(round2(10.0), 10.0);
    }
}
