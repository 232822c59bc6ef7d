/// Coin formatting and amount parsing shared by every command.
use super::errors::{GameError, GameResult};

// ============================================================================
// Display Formatting
// ============================================================================

const UNITS: [(u64, &str); 3] = [(1_000_000_000, "b"), (1_000_000, "m"), (10_000, "k")];

/// Format a coin amount for chat output ("850 coins", "12.5k coins", "-3.2m coins").
pub fn format_coins(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    for (scale, suffix) in UNITS {
        if abs >= scale {
            let divisor = if suffix == "k" { 1_000 } else { scale };
            let value = abs as f64 / divisor as f64;
            let text = format!("{:.2}", value);
            let text = text.trim_end_matches('0').trim_end_matches('.');
            return format!("{}{}{} coins", sign, text, suffix);
        }
    }
    format!("{}{} coins", sign, abs)
}

/// Whole seconds remaining until `secs` elapses, rendered compactly.
pub fn format_wait(secs: i64) -> String {
    let secs = secs.max(0);
    if secs >= 3600 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

/// `a + b` for amounts that came from a player, rejecting sums that don't fit.
pub fn checked_total(a: i64, b: i64) -> GameResult<i64> {
    a.checked_add(b).ok_or_else(|| GameError::validation("That amount is too large."))
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a user-typed amount. Accepts plain integers and suffixed decimals:
/// `k` (thousand), `w`/`万` (ten thousand), `m` (million), `亿` (hundred million).
pub fn parse_amount(text: &str) -> GameResult<i64> {
    let text = text.trim().to_lowercase();
    let invalid = || GameError::validation(format!("Invalid amount: {}", text));
    if text.is_empty() {
        return Err(invalid());
    }
    if let Ok(value) = text.parse::<i64>() {
        return Ok(value);
    }
    let suffixes: [(&str, f64); 5] = [
        ("k", 1e3),
        ("w", 1e4),
        ("万", 1e4),
        ("m", 1e6),
        ("亿", 1e8),
    ];
    for (suffix, scale) in suffixes {
        if let Some(number) = text.strip_suffix(suffix) {
            let value: f64 = number.trim().parse().map_err(|_| invalid())?;
            let scaled = value * scale;
            if !scaled.is_finite() || scaled.abs() > i64::MAX as f64 {
                return Err(invalid());
            }
            return Ok(scaled as i64);
        }
    }
    Err(invalid())
}

/// First argument as an amount, with a usage hint when missing.
pub fn require_amount(args: &[String]) -> GameResult<i64> {
    match args.first() {
        Some(raw) => parse_amount(raw),
        None => Err(GameError::validation("Missing amount.")),
    }
}

pub fn require_positive(amount: i64) -> GameResult<i64> {
    if amount <= 0 {
        return Err(GameError::validation("Amount must be greater than 0."));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_small_and_large_amounts() {
        assert_eq!(format_coins(850), "850 coins");
        assert_eq!(format_coins(9_999), "9999 coins");
        assert_eq!(format_coins(12_500), "12.5k coins");
        assert_eq!(format_coins(-3_200_000), "-3.2m coins");
        assert_eq!(format_coins(2_000_000_000), "2b coins");
        assert_eq!(format_coins(i64::MIN), "-9223372036.85b coins");
    }

    #[test]
    fn oversized_totals_are_rejected() {
        assert_eq!(checked_total(2_000, 100).unwrap(), 2_100);
        assert!(matches!(checked_total(i64::MAX, 1), Err(GameError::Validation(_))));
    }

    #[test]
    fn parses_suffixed_amounts() {
        assert_eq!(parse_amount("300").unwrap(), 300);
        assert_eq!(parse_amount("1.5k").unwrap(), 1500);
        assert_eq!(parse_amount("2w").unwrap(), 20_000);
        assert_eq!(parse_amount("3万").unwrap(), 30_000);
        assert_eq!(parse_amount("1亿").unwrap(), 100_000_000);
        assert_eq!(parse_amount("-5").unwrap(), -5);
    }

    #[test]
    fn rejects_garbage_amounts() {
        for bad in ["", "abc", "k", "1.2.3m", "12x"] {
            let err = parse_amount(bad).unwrap_err();
            assert!(matches!(err, GameError::Validation(_)), "{bad}");
        }
    }

    #[test]
    fn wait_is_compact() {
        assert_eq!(format_wait(42), "42s");
        assert_eq!(format_wait(125), "2m5s");
        assert_eq!(format_wait(7260), "2h1m");
        assert_eq!(format_wait(-3), "0s");
    }
}
