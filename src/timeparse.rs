//! Duration text parsing for portal attendance figures.
//!
//! The portal renders elapsed time as free text like "1h 20m", "45m" or "2h".
//! Parsing is deliberately lenient: the source is operator-controlled UI copy,
//! not a trusted protocol, so unparseable input yields 0 instead of an error.

/// Parse a duration string like "1h 20m" into total minutes.
///
/// Missing components default to 0: "45m" is 45, "2h" is 120. Anything
/// unrecognizable parses as 0, and totals beyond u32 saturate instead of
/// overflowing; parsing never fails.
pub fn parse(text: &str) -> u32 {
    let clean = text.trim().to_lowercase();

    let hours = component(&clean, 'h');
    let minutes = component(&clean, 'm');

    hours.saturating_mul(60).saturating_add(minutes)
}

/// Extract the digits immediately preceding the given unit suffix.
fn component(text: &str, unit: char) -> u32 {
    let Some(pos) = text.find(unit) else {
        return 0;
    };

    let digits: String = text[..pos]
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    digits.parse().unwrap_or(0)
}

/// Render minutes as "Xh Ym", or just "Ym" when under an hour.
///
/// Inverse of [`parse`]: `parse(&format(n)) == n` for any n.
pub fn format(minutes: u32) -> String {
    let h = minutes / 60;
    let m = minutes % 60;
    if h > 0 { format!("{}h {}m", h, m) } else { format!("{}m", m) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hours_and_minutes() {
        assert_eq!(parse("1h 20m"), 80);
        assert_eq!(parse("0h 7m"), 7);
        assert_eq!(parse("8h 0m"), 480);
    }

    #[test]
    fn test_parse_minutes_only() {
        assert_eq!(parse("45m"), 45);
        assert_eq!(parse("0m"), 0);
    }

    #[test]
    fn test_parse_hours_only() {
        assert_eq!(parse("2h"), 120);
    }

    #[test]
    fn test_parse_tolerates_whitespace_and_case() {
        assert_eq!(parse("  4H 42M  "), 282);
        assert_eq!(parse("\t1h\t5m\n"), 65);
    }

    #[test]
    fn test_parse_garbage_is_zero() {
        assert_eq!(parse(""), 0);
        assert_eq!(parse("--"), 0);
        assert_eq!(parse("not a duration"), 0);
        assert_eq!(parse("h m"), 0);
    }

    #[test]
    fn test_parse_ignores_sign_characters() {
        // Only the digit run adjacent to the unit is captured, so a
        // negative total can never be produced.
        assert_eq!(parse("-1h"), 60);
        assert_eq!(parse("-1h -5m"), 65);
    }

    #[test]
    fn test_parse_huge_values_saturate() {
        // 71582789 * 60 exceeds u32::MAX
        assert_eq!(parse("71582789h"), u32::MAX);
        assert_eq!(parse("4294967295h 59m"), u32::MAX);
        // A digit run too large for the component itself reads as 0
        assert_eq!(parse("99999999999m"), 0);
    }

    #[test]
    fn test_format_under_an_hour() {
        assert_eq!(format(0), "0m");
        assert_eq!(format(59), "59m");
    }

    #[test]
    fn test_format_over_an_hour() {
        assert_eq!(format(60), "1h 0m");
        assert_eq!(format(80), "1h 20m");
        assert_eq!(format(480), "8h 0m");
    }

    #[test]
    fn test_round_trip() {
        for n in [0, 1, 59, 60, 61, 119, 120, 282, 358, 480, 540, 1440, 10_000, u32::MAX] {
            assert_eq!(parse(&format(n)), n, "round trip failed for {}", n);
        }
    }
}
