//! Numeric literal decoding.
//!
//! The lexer only classifies numbers; validation of digits and underscore
//! placement, and conversion to a value, happen here. Integers that do not
//! fit `i64` are kept as digit strings.

use crate::parser::lexer::TokenKind;
use crate::sst::Number;

pub fn parse_number(kind: TokenKind, text: &str) -> Result<Number, String> {
    match kind {
        TokenKind::DecimalInteger => parse_decimal(text),
        TokenKind::HexInteger => parse_radix(text, 16, "hexadecimal"),
        TokenKind::OctInteger => parse_radix(text, 8, "octal"),
        TokenKind::BinInteger => parse_radix(text, 2, "binary"),
        TokenKind::Float => parse_float(text, "decimal").map(Number::Float),
        TokenKind::Imaginary => {
            let body = text
                .strip_suffix(['j', 'J'])
                .ok_or_else(|| "invalid imaginary literal".to_string())?;
            parse_float(body, "imaginary").map(Number::Imaginary)
        }
        _ => Err(format!("invalid number literal '{text}'")),
    }
}

/// Every `_` must sit between two digits. `leading` also allows one directly
/// at the start, as in `0x_ff`.
fn underscores_ok(body: &str, is_digit: impl Fn(char) -> bool, leading: bool) -> bool {
    let chars: Vec<char> = body.chars().collect();
    chars.iter().enumerate().all(|(i, &c)| {
        if c != '_' {
            return true;
        }
        let prev_ok = match i.checked_sub(1) {
            Some(p) => is_digit(chars[p]),
            None => leading,
        };
        let next_ok = chars.get(i + 1).is_some_and(|&n| is_digit(n));
        prev_ok && next_ok
    })
}

fn parse_decimal(text: &str) -> Result<Number, String> {
    let invalid = || "invalid decimal literal".to_string();
    if !text.chars().all(|c| c.is_ascii_digit() || c == '_') {
        return Err(invalid());
    }
    if !underscores_ok(text, |c| c.is_ascii_digit(), false) {
        return Err(invalid());
    }
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    if digits.len() > 1 && digits.starts_with('0') && digits.chars().any(|c| c != '0') {
        return Err(
            "leading zeros in decimal integer literals are not permitted; \
             use an 0o prefix for octal integers"
                .to_string(),
        );
    }
    Ok(integer(&digits, 10))
}

fn parse_radix(text: &str, radix: u32, name: &str) -> Result<Number, String> {
    let invalid = || format!("invalid {name} literal");
    let body = text.get(2..).ok_or_else(invalid)?;
    if body.is_empty() {
        return Err(invalid());
    }
    if let Some(bad) = body
        .chars()
        .find(|c| c.is_ascii_digit() && !c.is_digit(radix))
    {
        return Err(format!("invalid digit '{bad}' in {name} literal"));
    }
    if !body.chars().all(|c| c == '_' || c.is_digit(radix)) {
        return Err(invalid());
    }
    if !underscores_ok(body, |c| c.is_digit(radix), true) {
        return Err(invalid());
    }
    let digits: String = body.chars().filter(|&c| c != '_').collect();
    Ok(integer(&digits, radix))
}

fn integer(digits: &str, radix: u32) -> Number {
    match i64::from_str_radix(digits, radix) {
        Ok(v) => Number::Int(v),
        Err(_) => {
            let trimmed = digits.trim_start_matches('0');
            Number::Big {
                negative: false,
                radix,
                digits: trimmed.to_ascii_lowercase(),
            }
        }
    }
}

fn parse_float(text: &str, name: &str) -> Result<f64, String> {
    let invalid = || format!("invalid {name} literal");
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-' | '_');
    if !text.chars().all(allowed) {
        return Err(invalid());
    }
    if !underscores_ok(text, |c| c.is_ascii_digit(), false) {
        return Err(invalid());
    }
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    cleaned.parse::<f64>().map_err(|_| invalid())
}
