//! Indentation-aware Python 3 lexer.
//!
//! Produces [`Token`]s that borrow `&'src str` slices directly from the
//! source buffer. Offsets on tokens are *character* offsets, not bytes: a
//! running count of UTF-8 continuation bytes converts between the two as the
//! lexer advances, so multi-byte identifiers and string contents never skew
//! positions.
//!
//! Handles:
//! - INDENT / DEDENT via a stack of [`IndentLevel`]s, with TAB_ERROR when
//!   tab-expanded and tab-as-one-column widths disagree
//! - Implicit line continuation inside `(`, `[`, `{`
//! - Explicit line continuation via trailing `\`
//! - Single and triple-quoted strings with any valid prefix
//! - Comments, emitted on the hidden channel
//! - End-of-input normalization: a NEWLINE if a logical line is still open,
//!   one DEDENT per open level, then EOF
//!
//! Lexical errors do not abort lexing. They surface as error tokens that the
//! parser turns into typed [`crate::error::ParseError`]s.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::trace;

use crate::sst::{BinOp, Offset};

/// Tab stops for indentation width.
const TAB_SIZE: u32 = 8;

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    Name,
    DecimalInteger,
    OctInteger,
    HexInteger,
    BinInteger,
    Float,
    Imaginary,
    /// Any string literal, prefix and quotes included in the text.
    String,
    Comment,

    // Structural
    Newline,
    Indent,
    Dedent,
    Eof,

    // Brackets
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    // Punctuation
    Colon,
    Comma,
    Semicolon,
    Dot,
    Ellipsis,
    Arrow,
    Assign,
    Walrus,
    At,

    // Operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,
    LeftShift,
    RightShift,
    Amper,
    Pipe,
    Caret,
    Tilde,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    EqEqual,
    NotEqual,
    AugAssign(BinOp),

    // Keywords
    KwFalse,
    KwNone,
    KwTrue,
    KwAnd,
    KwAs,
    KwAssert,
    KwAsync,
    KwAwait,
    KwBreak,
    KwClass,
    KwContinue,
    KwDef,
    KwDel,
    KwElif,
    KwElse,
    KwExcept,
    KwFinally,
    KwFor,
    KwFrom,
    KwGlobal,
    KwIf,
    KwImport,
    KwIn,
    KwIs,
    KwLambda,
    KwNonlocal,
    KwNot,
    KwOr,
    KwPass,
    KwRaise,
    KwReturn,
    KwTry,
    KwWhile,
    KwWith,
    KwYield,

    // Errors
    /// Dedent to a column that matches no enclosing indentation level.
    IndentError,
    /// Ambiguous mix of tabs and spaces.
    TabError,
    /// `\` continuation right before end of input.
    LineJoiningEofError,
    /// A string with no closing quote.
    UnterminatedString,
    /// Any character that starts no token.
    ErrorToken,
}

impl TokenKind {
    pub fn is_error(self) -> bool {
        matches!(
            self,
            TokenKind::IndentError
                | TokenKind::TabError
                | TokenKind::LineJoiningEofError
                | TokenKind::UnterminatedString
                | TokenKind::ErrorToken
        )
    }

    pub fn is_number(self) -> bool {
        matches!(
            self,
            TokenKind::DecimalInteger
                | TokenKind::OctInteger
                | TokenKind::HexInteger
                | TokenKind::BinInteger
                | TokenKind::Float
                | TokenKind::Imaginary
        )
    }
}

/// Hidden-channel tokens (comments) are produced but skipped by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Channel {
    Default,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Token<'src> {
    pub kind: TokenKind,
    /// Exact source text; empty for synthesized NEWLINE / DEDENT / EOF.
    pub text: &'src str,
    /// Character offset of the first character.
    pub start: Offset,
    /// Character offset one past the last character.
    pub stop: Offset,
    /// 1-indexed line of `start`.
    pub line: u32,
    /// 1-indexed column of `start`, in characters.
    pub column: u32,
    pub channel: Channel,
}

// ── Indentation ───────────────────────────────────────────────────────────────

/// The width of one indentation level measured two ways: tabs advancing to
/// the next multiple of 8 (`spaces`) and tabs counting as one column
/// (`altspaces`). Two lines are consistently indented only if both measures
/// agree on their ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndentLevel {
    pub spaces: u32,
    pub altspaces: u32,
}

/// Where a fragment's text sits inside the enclosing source; used to lex
/// f-string replacement fields with positions relative to the whole file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Origin {
    pub char_offset: u32,
    pub line: u32,
    pub line_start_char: u32,
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            char_offset: 0,
            line: 1,
            line_start_char: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Mark {
    byte: usize,
    char: u32,
    line: u32,
    column: u32,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

pub struct Lexer<'src> {
    src: &'src str,
    bytes: &'src [u8],
    /// Current byte position.
    pos: usize,
    origin: Origin,
    line: u32,
    /// Character offset where the current physical line starts.
    line_start_char: u32,
    /// Indentation stack; always starts with the zero level.
    indents: Vec<IndentLevel>,
    /// Tokens decided ahead of time (indentation, end-of-input).
    pending: VecDeque<Token<'src>>,
    /// Whether the next physical line needs indentation analysis.
    at_line_start: bool,
    /// Nesting depth of `()`, `[]`, `{}`. When > 0 newlines are ignored.
    opened: u32,
    in_long_single: bool,
    in_long_double: bool,
    /// Fragment lexers never produce NEWLINE / INDENT / DEDENT.
    fragment: bool,
    /// Byte position up to which continuation bytes have been counted.
    scanned_to: usize,
    /// UTF-8 continuation bytes seen before `scanned_to`.
    continuation_bytes: usize,
    last_default: Option<TokenKind>,
    finished: bool,
    peeked: Option<Token<'src>>,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self::with_origin(src, Origin::default(), false)
    }

    /// A lexer over a slice of a larger source, e.g. the expression inside an
    /// f-string replacement field. Newlines are treated as whitespace.
    pub fn fragment(src: &'src str, origin: Origin) -> Self {
        Self::with_origin(src, origin, true)
    }

    fn with_origin(src: &'src str, origin: Origin, fragment: bool) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            origin,
            line: origin.line,
            line_start_char: origin.line_start_char,
            indents: vec![IndentLevel::default()],
            pending: VecDeque::new(),
            at_line_start: !fragment,
            opened: 0,
            in_long_single: false,
            in_long_double: false,
            fragment,
            scanned_to: 0,
            continuation_bytes: 0,
            last_default: None,
            finished: false,
            peeked: None,
        }
    }

    // ── public interface ──────────────────────────────────────────────────────

    /// Return (but do not consume) the next default-channel token.
    pub fn peek(&mut self) -> Token<'src> {
        if let Some(tok) = self.peeked {
            return tok;
        }
        let tok = self.next_default();
        self.peeked = Some(tok);
        tok
    }

    /// Consume and return the next default-channel token.
    pub fn bump(&mut self) -> Token<'src> {
        match self.peeked.take() {
            Some(tok) => tok,
            None => self.next_default(),
        }
    }

    /// Consume the next token only if it has kind `kind`.
    pub fn eat(&mut self, kind: TokenKind) -> bool {
        if self.peek().kind == kind {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Current bracket nesting depth. Non-zero at end of input means the
    /// source was truncated inside a bracketed construct.
    pub fn open_brackets(&self) -> u32 {
        self.opened
    }

    /// Whether the lexer is inside a triple-quoted string of either style.
    pub fn in_long_string(&self) -> bool {
        self.in_long_single || self.in_long_double
    }

    pub fn source(&self) -> &'src str {
        self.src
    }

    fn next_default(&mut self) -> Token<'src> {
        loop {
            let tok = self.next_token();
            if tok.channel == Channel::Default {
                return tok;
            }
        }
    }

    /// Produce the next token on any channel. After end of input this keeps
    /// returning EOF.
    pub fn next_token(&mut self) -> Token<'src> {
        loop {
            if let Some(tok) = self.pending.pop_front() {
                return self.emit(tok);
            }

            if self.at_line_start {
                self.at_line_start = false;
                if self.opened == 0 && !self.fragment {
                    self.scan_indentation();
                    continue;
                }
            }

            if self.pos >= self.bytes.len() {
                self.finish_input();
                continue;
            }

            let start = self.pos;
            match self.bytes[start] {
                b' ' | b'\t' | b'\x0c' => {
                    self.pos += 1;
                }
                b'\n' | b'\r' => {
                    let mark = self.mark(start);
                    self.consume_line_break();
                    if self.opened > 0 || self.fragment {
                        continue;
                    }
                    self.at_line_start = true;
                    let tok = self.make(mark, TokenKind::Newline, self.pos);
                    return self.emit(tok);
                }
                b'#' => {
                    let tok = self.lex_comment(start);
                    return self.emit(tok);
                }
                b'\\' => {
                    let mark = self.mark(start);
                    self.pos += 1;
                    match self.bytes.get(self.pos) {
                        Some(b'\n') | Some(b'\r') => {
                            self.consume_line_break();
                            if self.pos >= self.bytes.len() {
                                let tok = self.make(mark, TokenKind::LineJoiningEofError, self.pos);
                                return self.emit(tok);
                            }
                        }
                        None => {
                            let tok = self.make(mark, TokenKind::LineJoiningEofError, self.pos);
                            return self.emit(tok);
                        }
                        Some(_) => {
                            let tok = self.make(mark, TokenKind::ErrorToken, self.pos);
                            return self.emit(tok);
                        }
                    }
                }
                b if b.is_ascii_digit()
                    || (b == b'.' && self.bytes.get(start + 1).is_some_and(u8::is_ascii_digit)) =>
                {
                    let tok = self.lex_number(start);
                    return self.emit(tok);
                }
                _ => {
                    if let Some(prefix_len) = self.string_prefix_len(start) {
                        let tok = self.lex_string(start, prefix_len);
                        return self.emit(tok);
                    }
                    if self.is_name_start(start) {
                        let tok = self.lex_name(start);
                        return self.emit(tok);
                    }
                    let tok = self.lex_operator(start);
                    return self.emit(tok);
                }
            }
        }
    }

    fn emit(&mut self, tok: Token<'src>) -> Token<'src> {
        if tok.channel == Channel::Default {
            self.last_default = Some(tok.kind);
        }
        tok
    }

    // ── positions ─────────────────────────────────────────────────────────────

    /// Character offset of byte position `byte`.
    ///
    /// Calls are almost always monotonic, so continuation bytes are counted
    /// incrementally; an earlier position falls back to a full recount.
    fn char_at(&mut self, byte: usize) -> u32 {
        let byte = byte.min(self.bytes.len());
        let continuation = |bytes: &[u8]| bytes.iter().filter(|&&b| b & 0xC0 == 0x80).count();
        let before = if byte >= self.scanned_to {
            self.continuation_bytes += continuation(&self.bytes[self.scanned_to..byte]);
            self.scanned_to = byte;
            self.continuation_bytes
        } else {
            continuation(&self.bytes[..byte])
        };
        self.origin.char_offset + (byte - before) as u32
    }

    fn mark(&mut self, byte: usize) -> Mark {
        let char = self.char_at(byte);
        Mark {
            byte,
            char,
            line: self.line,
            column: char.saturating_sub(self.line_start_char) + 1,
        }
    }

    fn make(&mut self, mark: Mark, kind: TokenKind, end: usize) -> Token<'src> {
        let end = end.min(self.bytes.len());
        let stop = self.char_at(end);
        Token {
            kind,
            text: &self.src[mark.byte..end],
            start: mark.char,
            stop,
            line: mark.line,
            column: mark.column,
            channel: Channel::Default,
        }
    }

    fn zero_width(&mut self, kind: TokenKind, at: usize) -> Token<'src> {
        let mark = self.mark(at);
        self.make(mark, kind, at)
    }

    /// Consume `\n`, `\r\n` or a lone `\r` and start a new physical line.
    fn consume_line_break(&mut self) {
        if self.bytes.get(self.pos) == Some(&b'\r') {
            self.pos += 1;
            if self.bytes.get(self.pos) == Some(&b'\n') {
                self.pos += 1;
            }
        } else {
            self.pos += 1;
        }
        self.line += 1;
        self.line_start_char = self.char_at(self.pos);
    }

    fn eat_while(&mut self, pred: impl Fn(u8) -> bool) {
        while self.bytes.get(self.pos).is_some_and(|&b| pred(b)) {
            self.pos += 1;
        }
    }

    fn char_len_at(&self, pos: usize) -> usize {
        self.src
            .get(pos..)
            .and_then(|rest| rest.chars().next())
            .map_or(1, char::len_utf8)
    }

    // ── indentation ───────────────────────────────────────────────────────────

    /// Skip blank and comment-only lines, then measure the indentation of the
    /// next line with content and queue INDENT / DEDENT / error tokens.
    fn scan_indentation(&mut self) {
        loop {
            let line_begin = self.pos;
            let mut level = IndentLevel::default();
            while let Some(&b) = self.bytes.get(self.pos) {
                match b {
                    b' ' => {
                        level.spaces += 1;
                        level.altspaces += 1;
                    }
                    b'\t' => {
                        level.spaces = (level.spaces / TAB_SIZE + 1) * TAB_SIZE;
                        level.altspaces += 1;
                    }
                    // Form feed resets the column count.
                    b'\x0c' => level = IndentLevel::default(),
                    _ => break,
                }
                self.pos += 1;
            }
            match self.bytes.get(self.pos) {
                None => return,
                Some(b'\n') | Some(b'\r') => self.consume_line_break(),
                Some(b'#') => {
                    let tok = self.lex_comment(self.pos);
                    self.pending.push_back(tok);
                }
                Some(_) => {
                    self.apply_indentation(level, line_begin);
                    return;
                }
            }
        }
    }

    fn apply_indentation(&mut self, level: IndentLevel, line_begin: usize) {
        let top = self.indents.last().copied().unwrap_or_default();
        if level.spaces == top.spaces {
            if level.altspaces != top.altspaces {
                self.queue_indent_error(TokenKind::TabError, line_begin);
            }
        } else if level.spaces > top.spaces {
            if level.altspaces <= top.altspaces {
                self.queue_indent_error(TokenKind::TabError, line_begin);
            } else {
                self.indents.push(level);
                let mark = self.mark(line_begin);
                let tok = self.make(mark, TokenKind::Indent, self.pos);
                self.pending.push_back(tok);
            }
        } else {
            while self.indents.len() > 1
                && self.indents.last().is_some_and(|l| l.spaces > level.spaces)
            {
                self.indents.pop();
                let tok = self.zero_width(TokenKind::Dedent, self.pos);
                self.pending.push_back(tok);
            }
            let top = self.indents.last().copied().unwrap_or_default();
            if top.spaces != level.spaces {
                self.queue_indent_error(TokenKind::IndentError, line_begin);
            } else if top.altspaces != level.altspaces {
                self.queue_indent_error(TokenKind::TabError, line_begin);
            }
        }
    }

    fn queue_indent_error(&mut self, kind: TokenKind, line_begin: usize) {
        trace!(?kind, line = self.line, "indentation error");
        let mark = self.mark(line_begin);
        let tok = self.make(mark, kind, self.pos);
        self.pending.push_back(tok);
    }

    /// Queue the end-of-input sequence once; afterwards queue bare EOFs.
    fn finish_input(&mut self) {
        let end = self.bytes.len();
        if !self.finished {
            self.finished = true;
            if !self.fragment {
                let line_open = !matches!(
                    self.last_default,
                    None | Some(TokenKind::Newline | TokenKind::Indent | TokenKind::Dedent)
                );
                if line_open && !self.in_long_string() {
                    trace!(line = self.line, "synthesizing NEWLINE at end of input");
                    let tok = self.zero_width(TokenKind::Newline, end);
                    self.pending.push_back(tok);
                }
                while self.indents.len() > 1 {
                    self.indents.pop();
                    let tok = self.zero_width(TokenKind::Dedent, end);
                    self.pending.push_back(tok);
                }
            }
        }
        let tok = self.zero_width(TokenKind::Eof, end);
        self.pending.push_back(tok);
    }

    // ── comments / names / numbers ────────────────────────────────────────────

    fn lex_comment(&mut self, start: usize) -> Token<'src> {
        let mark = self.mark(start);
        self.pos = start;
        self.eat_while(|b| b != b'\n' && b != b'\r');
        let mut tok = self.make(mark, TokenKind::Comment, self.pos);
        tok.channel = Channel::Hidden;
        tok
    }

    fn is_name_start(&self, start: usize) -> bool {
        self.src
            .get(start..)
            .and_then(|rest| rest.chars().next())
            .is_some_and(|c| c == '_' || c.is_alphabetic())
    }

    fn lex_name(&mut self, start: usize) -> Token<'src> {
        let mark = self.mark(start);
        let len: usize = self.src[start..]
            .chars()
            .take_while(|&c| c == '_' || c.is_alphanumeric())
            .map(char::len_utf8)
            .sum();
        self.pos = start + len;
        let kind = keyword_kind(&self.src[start..self.pos]).unwrap_or(TokenKind::Name);
        self.make(mark, kind, self.pos)
    }

    /// Scan a numeric literal. Letters glued to the literal stay in the token
    /// so the number parser can reject it as a whole.
    fn lex_number(&mut self, start: usize) -> Token<'src> {
        let mark = self.mark(start);
        self.pos = start;
        let radix_kind = match (self.bytes[start], self.bytes.get(start + 1)) {
            (b'0', Some(b'x' | b'X')) => Some(TokenKind::HexInteger),
            (b'0', Some(b'o' | b'O')) => Some(TokenKind::OctInteger),
            (b'0', Some(b'b' | b'B')) => Some(TokenKind::BinInteger),
            _ => None,
        };
        let kind = if let Some(kind) = radix_kind {
            self.pos += 2;
            self.eat_while(|b| b.is_ascii_alphanumeric() || b == b'_');
            kind
        } else {
            let mut kind = TokenKind::DecimalInteger;
            self.eat_while(|b| b.is_ascii_digit() || b == b'_');
            if self.bytes.get(self.pos) == Some(&b'.') {
                self.pos += 1;
                self.eat_while(|b| b.is_ascii_digit() || b == b'_');
                kind = TokenKind::Float;
            }
            if matches!(self.bytes.get(self.pos), Some(b'e' | b'E')) {
                let digits_at = match self.bytes.get(self.pos + 1) {
                    Some(b'+' | b'-') => self.pos + 2,
                    _ => self.pos + 1,
                };
                if self.bytes.get(digits_at).is_some_and(u8::is_ascii_digit) {
                    self.pos = digits_at;
                    self.eat_while(|b| b.is_ascii_digit() || b == b'_');
                    kind = TokenKind::Float;
                }
            }
            if matches!(self.bytes.get(self.pos), Some(b'j' | b'J')) {
                self.pos += 1;
                kind = TokenKind::Imaginary;
            }
            self.eat_while(|b| b.is_ascii_alphanumeric() || b == b'_');
            kind
        };
        self.make(mark, kind, self.pos)
    }

    // ── strings ───────────────────────────────────────────────────────────────

    /// Length of a valid string prefix at `start` followed by a quote, if any.
    fn string_prefix_len(&self, start: usize) -> Option<usize> {
        let letters = self.bytes[start..]
            .iter()
            .take(3)
            .take_while(|b| b.is_ascii_alphabetic())
            .count();
        let quote_at = start + letters;
        if !matches!(self.bytes.get(quote_at), Some(b'\'' | b'"')) {
            return None;
        }
        let prefix = self.src[start..quote_at].to_ascii_lowercase();
        matches!(
            prefix.as_str(),
            "" | "r" | "u" | "b" | "f" | "br" | "rb" | "fr" | "rf"
        )
        .then_some(letters)
    }

    fn set_long_flag(&mut self, quote: u8, value: bool) {
        if quote == b'\'' {
            self.in_long_single = value;
        } else {
            self.in_long_double = value;
        }
    }

    fn lex_string(&mut self, start: usize, prefix_len: usize) -> Token<'src> {
        let mark = self.mark(start);
        self.pos = start + prefix_len;
        let quote = self.bytes[self.pos];
        let triple = self.bytes.get(self.pos + 1) == Some(&quote)
            && self.bytes.get(self.pos + 2) == Some(&quote);

        if triple {
            self.pos += 3;
            self.set_long_flag(quote, true);
            loop {
                match self.bytes.get(self.pos) {
                    None => return self.make(mark, TokenKind::UnterminatedString, self.pos),
                    Some(b'\\') => {
                        self.pos += 1;
                        self.skip_escaped();
                    }
                    Some(b'\n') | Some(b'\r') => self.consume_line_break(),
                    Some(&b)
                        if b == quote
                            && self.bytes.get(self.pos + 1) == Some(&quote)
                            && self.bytes.get(self.pos + 2) == Some(&quote) =>
                    {
                        self.pos += 3;
                        self.set_long_flag(quote, false);
                        return self.make(mark, TokenKind::String, self.pos);
                    }
                    Some(_) => self.pos += 1,
                }
            }
        }

        self.pos += 1;
        loop {
            match self.bytes.get(self.pos) {
                None | Some(b'\n') | Some(b'\r') => {
                    return self.make(mark, TokenKind::UnterminatedString, self.pos);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    self.skip_escaped();
                }
                Some(&b) if b == quote => {
                    self.pos += 1;
                    return self.make(mark, TokenKind::String, self.pos);
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// Step over the character after a backslash inside a string.
    fn skip_escaped(&mut self) {
        match self.bytes.get(self.pos) {
            None => {}
            Some(b'\n') | Some(b'\r') => self.consume_line_break(),
            Some(_) => self.pos += self.char_len_at(self.pos),
        }
    }

    // ── operators ─────────────────────────────────────────────────────────────

    fn lex_operator(&mut self, start: usize) -> Token<'src> {
        use TokenKind as T;
        let mark = self.mark(start);
        let (kind, len) = match &self.bytes[start..] {
            [b'*', b'*', b'=', ..] => (T::AugAssign(BinOp::Pow), 3),
            [b'/', b'/', b'=', ..] => (T::AugAssign(BinOp::FloorDiv), 3),
            [b'>', b'>', b'=', ..] => (T::AugAssign(BinOp::RShift), 3),
            [b'<', b'<', b'=', ..] => (T::AugAssign(BinOp::LShift), 3),
            [b'.', b'.', b'.', ..] => (T::Ellipsis, 3),
            [b'+', b'=', ..] => (T::AugAssign(BinOp::Add), 2),
            [b'-', b'=', ..] => (T::AugAssign(BinOp::Sub), 2),
            [b'*', b'=', ..] => (T::AugAssign(BinOp::Mult), 2),
            [b'@', b'=', ..] => (T::AugAssign(BinOp::MatMult), 2),
            [b'/', b'=', ..] => (T::AugAssign(BinOp::Div), 2),
            [b'%', b'=', ..] => (T::AugAssign(BinOp::Mod), 2),
            [b'&', b'=', ..] => (T::AugAssign(BinOp::BitAnd), 2),
            [b'|', b'=', ..] => (T::AugAssign(BinOp::BitOr), 2),
            [b'^', b'=', ..] => (T::AugAssign(BinOp::BitXor), 2),
            [b'*', b'*', ..] => (T::DoubleStar, 2),
            [b'/', b'/', ..] => (T::DoubleSlash, 2),
            [b'<', b'<', ..] => (T::LeftShift, 2),
            [b'>', b'>', ..] => (T::RightShift, 2),
            [b'<', b'=', ..] => (T::LessEqual, 2),
            [b'>', b'=', ..] => (T::GreaterEqual, 2),
            [b'=', b'=', ..] => (T::EqEqual, 2),
            [b'!', b'=', ..] => (T::NotEqual, 2),
            [b'-', b'>', ..] => (T::Arrow, 2),
            [b':', b'=', ..] => (T::Walrus, 2),
            [b'(', ..] => (T::LParen, 1),
            [b')', ..] => (T::RParen, 1),
            [b'[', ..] => (T::LBracket, 1),
            [b']', ..] => (T::RBracket, 1),
            [b'{', ..] => (T::LBrace, 1),
            [b'}', ..] => (T::RBrace, 1),
            [b':', ..] => (T::Colon, 1),
            [b',', ..] => (T::Comma, 1),
            [b';', ..] => (T::Semicolon, 1),
            [b'.', ..] => (T::Dot, 1),
            [b'=', ..] => (T::Assign, 1),
            [b'@', ..] => (T::At, 1),
            [b'+', ..] => (T::Plus, 1),
            [b'-', ..] => (T::Minus, 1),
            [b'*', ..] => (T::Star, 1),
            [b'/', ..] => (T::Slash, 1),
            [b'%', ..] => (T::Percent, 1),
            [b'&', ..] => (T::Amper, 1),
            [b'|', ..] => (T::Pipe, 1),
            [b'^', ..] => (T::Caret, 1),
            [b'~', ..] => (T::Tilde, 1),
            [b'<', ..] => (T::Less, 1),
            [b'>', ..] => (T::Greater, 1),
            _ => (T::ErrorToken, self.char_len_at(start)),
        };
        match kind {
            T::LParen | T::LBracket | T::LBrace => self.opened += 1,
            T::RParen | T::RBracket | T::RBrace => self.opened = self.opened.saturating_sub(1),
            _ => {}
        }
        self.pos = start + len;
        self.make(mark, kind, self.pos)
    }
}

/// Tokenize a whole source, hidden-channel tokens included, up to and
/// including EOF.
pub fn tokenize(src: &str) -> Vec<Token<'_>> {
    let mut lex = Lexer::new(src);
    let mut out = Vec::new();
    loop {
        let tok = lex.next_token();
        let done = tok.kind == TokenKind::Eof;
        out.push(tok);
        if done {
            return out;
        }
    }
}

fn keyword_kind(s: &str) -> Option<TokenKind> {
    use TokenKind as T;
    let kind = match s {
        "False" => T::KwFalse,
        "None" => T::KwNone,
        "True" => T::KwTrue,
        "and" => T::KwAnd,
        "as" => T::KwAs,
        "assert" => T::KwAssert,
        "async" => T::KwAsync,
        "await" => T::KwAwait,
        "break" => T::KwBreak,
        "class" => T::KwClass,
        "continue" => T::KwContinue,
        "def" => T::KwDef,
        "del" => T::KwDel,
        "elif" => T::KwElif,
        "else" => T::KwElse,
        "except" => T::KwExcept,
        "finally" => T::KwFinally,
        "for" => T::KwFor,
        "from" => T::KwFrom,
        "global" => T::KwGlobal,
        "if" => T::KwIf,
        "import" => T::KwImport,
        "in" => T::KwIn,
        "is" => T::KwIs,
        "lambda" => T::KwLambda,
        "nonlocal" => T::KwNonlocal,
        "not" => T::KwNot,
        "or" => T::KwOr,
        "pass" => T::KwPass,
        "raise" => T::KwRaise,
        "return" => T::KwReturn,
        "try" => T::KwTry,
        "while" => T::KwWhile,
        "with" => T::KwWith,
        "yield" => T::KwYield,
        _ => return None,
    };
    Some(kind)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
