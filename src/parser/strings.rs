//! String literal decoding and f-string splitting.
//!
//! Everything here works on slices of the original token text so the parser
//! can map positions inside an f-string back to the source.

// ── Literal shape ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StringPrefix {
    pub raw: bool,
    pub bytes: bool,
    pub formatted: bool,
}

/// A string token split into prefix, quotes and body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralShape<'src> {
    pub prefix: StringPrefix,
    pub body: &'src str,
    /// Byte offset of `body` inside the token text.
    pub body_offset: usize,
    pub triple: bool,
}

pub fn split_literal(raw: &str) -> Option<LiteralShape<'_>> {
    let quote_at = raw.find(['\'', '"'])?;
    let mut prefix = StringPrefix::default();
    for c in raw[..quote_at].chars() {
        match c.to_ascii_lowercase() {
            'r' => prefix.raw = true,
            'b' => prefix.bytes = true,
            'f' => prefix.formatted = true,
            'u' => {}
            _ => return None,
        }
    }
    let quote = &raw[quote_at..quote_at + 1];
    let rest = &raw[quote_at..];
    let triple_quote = quote.repeat(3);
    let triple = rest.len() >= 6 && rest.starts_with(&triple_quote) && rest.ends_with(&triple_quote);
    let delim = if triple { 3 } else { 1 };
    if rest.len() < delim * 2 {
        return None;
    }
    let body_offset = quote_at + delim;
    Some(LiteralShape {
        prefix,
        body: &raw[body_offset..raw.len() - delim],
        body_offset,
        triple,
    })
}

/// Whether a (possibly unterminated) string token opens with triple quotes.
pub fn is_triple_quoted(raw: &str) -> bool {
    raw.find(['\'', '"'])
        .map(|at| {
            let rest = raw.as_bytes();
            rest.get(at + 1) == rest.get(at) && rest.get(at + 2) == rest.get(at)
        })
        .unwrap_or(false)
}

// ── Escapes ───────────────────────────────────────────────────────────────────

/// Decode backslash escapes of a `str` literal body. Unknown escapes keep
/// their backslash; `\N{...}` is kept verbatim.
pub fn decode_str(body: &str, raw: bool) -> Result<String, String> {
    if raw || !body.contains('\\') {
        return Ok(body.to_string());
    }
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.push('\\');
            break;
        };
        match esc {
            '\n' => {}
            '\r' => {
                chars.next_if_eq(&'\n');
            }
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
            }
            'x' => out.push(hex_escape(&mut chars, 2, "\\xXX")?),
            'u' => out.push(hex_escape(&mut chars, 4, "\\uXXXX")?),
            'U' => out.push(hex_escape(&mut chars, 8, "\\UXXXXXXXX")?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

fn hex_escape(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    width: usize,
    form: &str,
) -> Result<char, String> {
    let mut value = 0u32;
    for _ in 0..width {
        let digit = chars
            .next_if(|c| c.is_ascii_hexdigit())
            .and_then(|c| c.to_digit(16))
            .ok_or_else(|| format!("truncated {form} escape"))?;
        value = value * 16 + digit;
    }
    char::from_u32(value).ok_or_else(|| "illegal Unicode character".to_string())
}

/// Decode a `bytes` literal body. Only ASCII characters may appear literally.
pub fn decode_bytes(body: &str, raw: bool) -> Result<Vec<u8>, String> {
    if !body.is_ascii() {
        return Err("bytes can only contain ASCII literal characters".to_string());
    }
    if raw || !body.contains('\\') {
        return Ok(body.as_bytes().to_vec());
    }
    let bytes = body.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        i += 1;
        if b != b'\\' {
            out.push(b);
            continue;
        }
        let Some(&esc) = bytes.get(i) else {
            out.push(b'\\');
            break;
        };
        i += 1;
        match esc {
            b'\n' => {}
            b'\r' => {
                if bytes.get(i) == Some(&b'\n') {
                    i += 1;
                }
            }
            b'\\' | b'\'' | b'"' => out.push(esc),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0b),
            b'0'..=b'7' => {
                let mut value = u32::from(esc - b'0');
                for _ in 0..2 {
                    match bytes.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            b'x' => {
                let hex = bytes
                    .get(i..i + 2)
                    .filter(|h| h.iter().all(u8::is_ascii_hexdigit))
                    .ok_or_else(|| "truncated \\xXX escape".to_string())?;
                let text = std::str::from_utf8(hex).map_err(|e| e.to_string())?;
                out.push(u8::from_str_radix(text, 16).map_err(|e| e.to_string())?);
                i += 2;
            }
            other => {
                out.push(b'\\');
                out.push(other);
            }
        }
    }
    Ok(out)
}

// ── f-strings ─────────────────────────────────────────────────────────────────

/// One piece of an f-string body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FSegment<'src> {
    /// Literal text, still escaped. `{{` / `}}` have been split so that only
    /// one brace of each pair remains in the slice.
    Text(&'src str),
    Field(FField<'src>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FField<'src> {
    /// Expression source between `{` and the first `!`, `:`, `=` or `}`.
    pub expr: &'src str,
    /// Byte offset of `expr` inside the scanned body.
    pub expr_offset: usize,
    pub conversion: Option<char>,
    pub spec: Vec<FSegment<'src>>,
    /// For `{expr=}`: the text `expr=` that is echoed before the value.
    pub debug_text: Option<&'src str>,
}

/// Split an f-string body into literal text and replacement fields.
pub fn scan_fstring(body: &str) -> Result<Vec<FSegment<'_>>, String> {
    let (segments, end) = scan_segments(body, 0, false)?;
    debug_assert_eq!(end, body.len());
    Ok(segments)
}

/// Scan from `start` to the end of `body`, or, inside a format spec, up to
/// the `}` that closes the enclosing field. Returns the segments and the
/// index where scanning stopped.
fn scan_segments(body: &str, start: usize, in_spec: bool) -> Result<(Vec<FSegment<'_>>, usize), String> {
    let bytes = body.as_bytes();
    let mut segments = Vec::new();
    let mut text_start = start;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' if bytes.get(i + 1) == Some(&b'{') => {
                segments.push(FSegment::Text(&body[text_start..=i]));
                i += 2;
                text_start = i;
            }
            b'}' if !in_spec && bytes.get(i + 1) == Some(&b'}') => {
                segments.push(FSegment::Text(&body[text_start..=i]));
                i += 2;
                text_start = i;
            }
            b'}' if in_spec => break,
            b'}' => return Err("f-string: single '}' is not allowed".to_string()),
            b'{' => {
                if text_start < i {
                    segments.push(FSegment::Text(&body[text_start..i]));
                }
                let (field, next) = scan_field(body, i + 1)?;
                segments.push(FSegment::Field(field));
                i = next;
                text_start = i;
            }
            _ => i += 1,
        }
    }
    if text_start < i {
        segments.push(FSegment::Text(&body[text_start..i]));
    }
    segments.retain(|s| !matches!(s, FSegment::Text("")));
    Ok((segments, i))
}

/// Scan one replacement field starting just after its `{`. Returns the field
/// and the index just after its closing `}`.
fn scan_field(body: &str, start: usize) -> Result<(FField<'_>, usize), String> {
    let bytes = body.as_bytes();
    let mut i = start;
    let mut depth = 0u32;
    let mut quote: Option<u8> = None;
    let mut debug = false;
    while i < bytes.len() {
        let c = bytes[i];
        if let Some(q) = quote {
            if c == b'\\' {
                return Err("f-string expression part cannot include a backslash".to_string());
            }
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match c {
            b'\\' => {
                return Err("f-string expression part cannot include a backslash".to_string());
            }
            b'#' => return Err("f-string expression part cannot include '#'".to_string()),
            b'\'' | b'"' => quote = Some(c),
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' if depth > 0 => depth -= 1,
            b'}' => break,
            b'!' if depth == 0 && bytes.get(i + 1) != Some(&b'=') => break,
            b':' if depth == 0 => break,
            b'=' if depth == 0
                && bytes.get(i + 1) != Some(&b'=')
                && !matches!(bytes.get(i.wrapping_sub(1)), Some(b'=' | b'!' | b'<' | b'>')) =>
            {
                debug = true;
                break;
            }
            _ => {}
        }
        i += 1;
    }
    if i >= bytes.len() {
        return Err("f-string: expecting '}'".to_string());
    }
    let expr = &body[start..i];
    if expr.trim().is_empty() {
        return Err("f-string: empty expression not allowed".to_string());
    }
    let mut debug_text = None;
    if debug {
        i += 1;
        debug_text = Some(&body[start..i]);
    }
    let mut conversion = None;
    if bytes.get(i) == Some(&b'!') {
        match bytes.get(i + 1) {
            Some(&c @ (b's' | b'r' | b'a')) => conversion = Some(char::from(c)),
            _ => {
                return Err(
                    "f-string: invalid conversion character: expected 's', 'r', or 'a'"
                        .to_string(),
                );
            }
        }
        i += 2;
    }
    let mut spec = Vec::new();
    if bytes.get(i) == Some(&b':') {
        let (segments, end) = scan_segments(body, i + 1, true)?;
        spec = segments;
        i = end;
    }
    if bytes.get(i) != Some(&b'}') {
        return Err("f-string: expecting '}'".to_string());
    }
    if debug_text.is_some() && conversion.is_none() && spec.is_empty() {
        conversion = Some('r');
    }
    Ok((
        FField {
            expr,
            expr_offset: start,
            conversion,
            spec,
            debug_text,
        },
        i + 1,
    ))
}
