//! Amount parsing and display formatting.
//!
//! Parsing is exact integer arithmetic: a decimal string such as `"0.1"`
//! becomes `100000000000000000` at 18 decimals with no float in between.

use crate::errors::PreconditionError;

pub const ETHER_DECIMALS: u32 = 18;
pub const USDC_DECIMALS: u32 = 6;

/// Parse a human decimal amount into the token's smallest unit.
pub fn parse_units(amount: &str, decimals: u32) -> Result<u128, PreconditionError> {
    let invalid = || PreconditionError::InvalidAmount(amount.to_string());
    let trimmed = amount.trim();

    let (whole, frac) = match trimmed.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (trimmed, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > decimals as usize {
        return Err(invalid());
    }

    let scale = 10u128.checked_pow(decimals).ok_or_else(invalid)?;
    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().map_err(|_| invalid())? };
    let frac: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded.parse().map_err(|_| invalid())?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac))
        .ok_or_else(invalid)
}

/// Render a smallest-unit amount with `decimals` places, trailing zeros trimmed
/// but always at least one fractional digit (`1.0`, `0.25`).
pub fn format_units(amount: u128, decimals: u32) -> String {
    if decimals == 0 {
        return format!("{amount}.0");
    }
    let Some(scale) = 10u128.checked_pow(decimals) else {
        return "0".to_string();
    };
    let whole = amount / scale;
    let frac = format!("{:0>width$}", amount % scale, width = decimals as usize);
    let frac = frac.trim_end_matches('0');
    if frac.is_empty() {
        format!("{whole}.0")
    } else {
        format!("{whole}.{frac}")
    }
}

pub fn format_ether(amount: u128) -> String {
    format_units(amount, ETHER_DECIMALS)
}

pub fn format_usdc(amount: u128) -> String {
    format_units(amount, USDC_DECIMALS)
}

/// `0x1234567890abcdef...` → `0x1234...cdef`. Short input is returned unchanged.
pub fn format_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

/// Thousands separators: `1234567` → `1,234,567`.
pub fn format_number(n: u128) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `value / total` as a percentage with one decimal place; `"0.0"` when `total` is zero.
pub fn format_percentage(value: f64, total: f64) -> String {
    if total == 0.0 {
        return "0.0".to_string();
    }
    let percentage = (value / total) * 100.0;
    format!("{:.1}", (percentage * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_units_is_exact() {
        assert_eq!(parse_units("0.1", 18), Ok(100_000_000_000_000_000));
        assert_eq!(parse_units("1", 18), Ok(1_000_000_000_000_000_000));
        assert_eq!(parse_units("1.5", 6), Ok(1_500_000));
        assert_eq!(parse_units(".5", 6), Ok(500_000));
        assert_eq!(parse_units("2.", 6), Ok(2_000_000));
        assert_eq!(parse_units(" 0 ", 18), Ok(0));
    }

    #[test]
    fn parse_units_rejects_garbage() {
        for bad in ["", ".", "abc", "-1", "1e18", "1.2.3", "0.0000001", "+1"] {
            assert!(
                matches!(parse_units(bad, 6), Err(PreconditionError::InvalidAmount(_))),
                "{bad}"
            );
        }
        assert!(parse_units("999999999999999999999999", 18).is_err());
    }

    #[test]
    fn format_units_trims() {
        assert_eq!(format_ether(1_000_000_000_000_000_000), "1.0");
        assert_eq!(format_ether(250_000_000_000_000_000), "0.25");
        assert_eq!(format_ether(0), "0.0");
        assert_eq!(format_usdc(1_234_567), "1.234567");
    }

    #[test]
    fn address_and_number() {
        assert_eq!(
            format_address("0x1234567890123456789012345678901234567890"),
            "0x1234...7890"
        );
        assert_eq!(format_address("0x1234"), "0x1234");
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1_000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn percentage() {
        assert_eq!(format_percentage(1.0, 0.0), "0.0");
        assert_eq!(format_percentage(1.0, 4.0), "25.0");
        assert_eq!(format_percentage(1.0, 400.0), "0.3");
    }
}
