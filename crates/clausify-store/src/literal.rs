//! Parser for Python literal syntax as found in CUAD cells.
//!
//! Cells such as `['Either party may terminate...', 'Upon notice...']` are
//! Python list reprs. The parser accepts the literal subset that a safe literal
//! evaluator accepts for text data: strings and bytes (single, double and
//! triple quoted, `r`/`u`/`b` prefixes, escapes including `\N{NAME}`,
//! implicit concatenation), integers of any size, floats, `True`/`False`/`None`,
//! lists, tuples (bare `a, b` at the top level too), sets and dicts. Names,
//! calls, operators, f-strings and complex numbers are errors.

use thiserror::Error;

/// A parsed Python literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum PyLiteral {
    Str(String),
    Bytes(Vec<u8>),
    Int(i128),
    /// Integer outside the `i128` range, as exact decimal digits.
    BigInt(String),
    Float(f64),
    Bool(bool),
    None,
    List(Vec<PyLiteral>),
    Tuple(Vec<PyLiteral>),
    Set(Vec<PyLiteral>),
    Dict(Vec<(PyLiteral, PyLiteral)>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid literal at offset {offset}: {message}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

/// Parse `src` as a single Python literal expression.
///
/// Leading spaces and tabs are ignored, as is trailing whitespace. A bare
/// comma-separated sequence (`'a', 'b'` or `1,`) is a tuple.
pub fn parse_literal(src: &str) -> Result<PyLiteral, LiteralError> {
    let mut parser = Parser::new(src.trim_start_matches([' ', '\t']));
    parser.skip_ws();
    let first = parser.value()?;
    parser.skip_ws();
    let value = if parser.peek() == Some(',') {
        parser.pos += 1;
        let mut items = vec![first];
        items.extend(parser.bare_sequence()?);
        PyLiteral::Tuple(items)
    } else {
        first
    };
    parser.skip_ws();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

impl PyLiteral {
    /// The value as `str(value)` renders it: strings bare, everything else as repr.
    pub fn to_py_str(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            other => other.to_py_repr(),
        }
    }

    /// The value as `repr(value)` renders it.
    pub fn to_py_repr(&self) -> String {
        match self {
            Self::Str(s) => repr_str(s),
            Self::Bytes(b) => repr_bytes(b),
            Self::Int(i) => i.to_string(),
            Self::BigInt(digits) => digits.clone(),
            Self::Float(f) => repr_float(*f),
            Self::Bool(true) => "True".into(),
            Self::Bool(false) => "False".into(),
            Self::None => "None".into(),
            Self::List(items) => format!("[{}]", join_repr(items)),
            Self::Tuple(items) if items.len() == 1 => format!("({},)", items[0].to_py_repr()),
            Self::Tuple(items) => format!("({})", join_repr(items)),
            Self::Set(items) if items.is_empty() => "set()".into(),
            Self::Set(items) => format!("{{{}}}", join_repr(items)),
            Self::Dict(pairs) => {
                let body: Vec<String> = pairs
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.to_py_repr(), v.to_py_repr()))
                    .collect();
                format!("{{{}}}", body.join(", "))
            }
        }
    }
}

fn join_repr(items: &[PyLiteral]) -> String {
    items
        .iter()
        .map(PyLiteral::to_py_repr)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote a string the way Python's `repr` does.
fn repr_str(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn repr_bytes(bytes: &[u8]) -> String {
    let quote = if bytes.contains(&b'\'') && !bytes.contains(&b'"') {
        b'"'
    } else {
        b'\''
    };
    let mut out = String::with_capacity(bytes.len() + 3);
    out.push('b');
    out.push(quote as char);
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b if b == quote => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7e => out.push(b as char),
            b => out.push_str(&format!("\\x{b:02x}")),
        }
    }
    out.push(quote as char);
    out
}

/// Shortest round-trip float repr with Python's exponent rules.
fn repr_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".into() } else { "-inf".into() };
    }

    let sci = format!("{f:e}");
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if (-4..16).contains(&exp) {
        let plain = f.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    } else {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exp.abs())
    }
}

/// Decimal integer text as `Int`, or `BigInt` when it overflows `i128`.
fn integer(text: String) -> PyLiteral {
    match text.parse::<i128>() {
        Ok(i) => PyLiteral::Int(i),
        Err(_) => PyLiteral::BigInt(text.trim_start_matches('0').to_string()),
    }
}

/// Convert `digits` in `radix` to decimal text, for integers beyond `i128`.
fn to_decimal(digits: &str, radix: u32) -> String {
    const BASE: u64 = 1_000_000_000;
    // Little-endian limbs of nine decimal digits each.
    let mut limbs: Vec<u64> = Vec::new();
    for d in digits.chars().filter_map(|c| c.to_digit(radix)) {
        let mut carry = u64::from(d);
        for limb in &mut limbs {
            let v = *limb * u64::from(radix) + carry;
            *limb = v % BASE;
            carry = v / BASE;
        }
        while carry > 0 {
            limbs.push(carry % BASE);
            carry /= BASE;
        }
    }
    let Some((last, rest)) = limbs.split_last() else {
        return "0".into();
    };
    let mut out = last.to_string();
    for limb in rest.iter().rev() {
        out.push_str(&format!("{limb:09}"));
    }
    out
}

#[derive(Debug, Clone, Copy, Default)]
struct StringPrefix {
    len: usize,
    raw: bool,
    bytes: bool,
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected {want:?}, found {c:?}")))
            }
            None => Err(self.error(format!("expected {want:?}, found end of input"))),
        }
    }

    /// Skip whitespace, line breaks, backslash continuations and `#` comments.
    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\n' | '\r' | '\x0c' => self.pos += 1,
                '\\' if matches!(self.peek_at(1), Some('\n')) => self.pos += 2,
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn value(&mut self) -> Result<PyLiteral, LiteralError> {
        match self.peek() {
            None => Err(self.error("unexpected end of input")),
            Some('[') => {
                self.pos += 1;
                let items = self.sequence(']')?;
                Ok(PyLiteral::List(items))
            }
            Some('(') => self.paren(),
            Some('{') => self.brace(),
            Some('-') | Some('+') => {
                let negative = self.bump() == Some('-');
                self.skip_ws();
                match self.number()? {
                    PyLiteral::Int(i) if negative => Ok(PyLiteral::Int(-i)),
                    PyLiteral::BigInt(digits) if negative => Ok(integer(format!("-{digits}"))),
                    PyLiteral::Float(f) if negative => Ok(PyLiteral::Float(-f)),
                    n => Ok(n),
                }
            }
            Some(c) if c.is_ascii_digit() => self.number(),
            Some('.') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number(),
            Some(c) if c == '\'' || c == '"' => self.strings(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                if self.string_prefix().is_some() {
                    self.strings()
                } else {
                    self.keyword()
                }
            }
            Some(c) => Err(self.error(format!("unexpected character {c:?}"))),
        }
    }

    /// Comma-separated values up to `close`, trailing comma allowed.
    fn sequence(&mut self, close: char) -> Result<Vec<PyLiteral>, LiteralError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(items);
                }
                _ => return Err(self.error(format!("expected ',' or {close:?}"))),
            }
        }
    }

    /// Values after a top-level comma, up to the end of input.
    fn bare_sequence(&mut self) -> Result<Vec<PyLiteral>, LiteralError> {
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.at_end() {
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                None => return Ok(items),
                Some(_) => return Err(self.error("expected ',' or end of input")),
            }
        }
    }

    /// `()` empty tuple, `(x)` grouping, `(x,)` / `(x, y)` tuple.
    fn paren(&mut self) -> Result<PyLiteral, LiteralError> {
        self.expect('(')?;
        self.skip_ws();
        if self.peek() == Some(')') {
            self.pos += 1;
            return Ok(PyLiteral::Tuple(Vec::new()));
        }
        let first = self.value()?;
        self.skip_ws();
        match self.bump() {
            Some(')') => Ok(first),
            Some(',') => {
                let mut items = vec![first];
                items.extend(self.sequence(')')?);
                Ok(PyLiteral::Tuple(items))
            }
            _ => {
                self.pos = self.pos.saturating_sub(1);
                Err(self.error("expected ',' or ')'"))
            }
        }
    }

    /// `{}` empty dict, `{k: v, ...}` dict, `{x, ...}` set.
    fn brace(&mut self) -> Result<PyLiteral, LiteralError> {
        self.expect('{')?;
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(PyLiteral::Dict(Vec::new()));
        }

        let first = self.value()?;
        self.skip_ws();
        if self.peek() != Some(':') {
            let mut items = vec![first];
            match self.bump() {
                Some('}') => {}
                Some(',') => items.extend(self.sequence('}')?),
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected ',' or '}'"));
                }
            }
            let mut distinct: Vec<PyLiteral> = Vec::with_capacity(items.len());
            for item in items {
                if !distinct.contains(&item) {
                    distinct.push(item);
                }
            }
            return Ok(PyLiteral::Set(distinct));
        }

        let mut pairs: Vec<(PyLiteral, PyLiteral)> = Vec::new();
        let mut key = first;
        loop {
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.value()?;
            // Later duplicates replace the value but keep the first position.
            match pairs.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => pairs.push((key, value)),
            }
            self.skip_ws();
            match self.bump() {
                Some('}') => return Ok(PyLiteral::Dict(pairs)),
                Some(',') => {
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        self.pos += 1;
                        return Ok(PyLiteral::Dict(pairs));
                    }
                    key = self.value()?;
                }
                _ => {
                    self.pos = self.pos.saturating_sub(1);
                    return Err(self.error("expected ',' or '}'"));
                }
            }
        }
    }

    fn keyword(&mut self) -> Result<PyLiteral, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" => Ok(PyLiteral::Bool(true)),
            "False" => Ok(PyLiteral::Bool(false)),
            "None" => Ok(PyLiteral::None),
            _ => {
                self.pos = start;
                Err(self.error(format!("name {word:?} is not a literal")))
            }
        }
    }

    fn number(&mut self) -> Result<PyLiteral, LiteralError> {
        let start = self.pos;

        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let digits = self.take_while(|c| c.is_digit(radix) || c == '_');
                let digits = digits.replace('_', "");
                if digits.is_empty() {
                    return Err(self.error("invalid integer literal"));
                }
                return Ok(match i128::from_str_radix(&digits, radix) {
                    Ok(i) => PyLiteral::Int(i),
                    Err(_) => PyLiteral::BigInt(to_decimal(&digits, radix)),
                });
            }
        }

        let mut is_float = false;
        self.take_while(|c| c.is_ascii_digit() || c == '_');
        if self.peek() == Some('.') {
            is_float = true;
            self.pos += 1;
            self.take_while(|c| c.is_ascii_digit() || c == '_');
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.pos += 1;
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.take_while(|c| c.is_ascii_digit() || c == '_');
            } else {
                self.pos = save;
                return Err(self.error("invalid exponent"));
            }
        }
        if matches!(self.peek(), Some('j') | Some('J')) {
            return Err(self.error("complex literals are not supported"));
        }
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return Err(self.error("invalid numeric literal"));
        }

        let text: String = self.chars[start..self.pos]
            .iter()
            .filter(|&&c| c != '_')
            .collect();

        if is_float {
            text.parse::<f64>()
                .map(PyLiteral::Float)
                .map_err(|_| self.error("invalid float literal"))
        } else {
            if text.len() > 1 && text.starts_with('0') && text.chars().any(|c| c != '0') {
                return Err(self.error("leading zeros in decimal integer literals are not permitted"));
            }
            Ok(integer(text))
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    /// Prefix of a string literal starting here (`r`, `u`, `b`, `rb`, `br`, any case).
    fn string_prefix(&self) -> Option<StringPrefix> {
        let mut prefix = StringPrefix::default();
        let mut unicode = false;
        while let Some(c) = self.peek_at(prefix.len) {
            match c.to_ascii_lowercase() {
                '\'' | '"' => return Some(prefix),
                'r' if !prefix.raw && !unicode => prefix.raw = true,
                'b' if !prefix.bytes && !unicode => prefix.bytes = true,
                'u' if prefix.len == 0 => unicode = true,
                _ => return None,
            }
            prefix.len += 1;
        }
        None
    }

    /// One or more adjacent string literals, concatenated.
    fn strings(&mut self) -> Result<PyLiteral, LiteralError> {
        let mut out = String::new();
        let mut bytes = None;
        loop {
            let Some(prefix) = self.string_prefix() else {
                return Err(self.error("expected a string literal"));
            };
            if *bytes.get_or_insert(prefix.bytes) != prefix.bytes {
                return Err(self.error("cannot mix bytes and nonbytes literals"));
            }
            self.pos += prefix.len;
            self.string_body(prefix, &mut out)?;

            let save = self.pos;
            self.skip_ws();
            if self.string_prefix().is_none() {
                self.pos = save;
                if prefix.bytes {
                    // Bytes bodies only hold chars below U+0100.
                    return Ok(PyLiteral::Bytes(out.chars().map(|c| c as u8).collect()));
                }
                return Ok(PyLiteral::Str(out));
            }
        }
    }

    fn string_body(&mut self, prefix: StringPrefix, out: &mut String) -> Result<(), LiteralError> {
        let start = self.pos;
        let quote = self
            .bump()
            .ok_or_else(|| self.error("expected a quote"))?;
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        loop {
            let Some(c) = self.bump() else {
                self.pos = start;
                return Err(self.error("unterminated string literal"));
            };
            if prefix.bytes && !c.is_ascii() {
                self.pos -= 1;
                return Err(self.error("bytes can only contain ASCII literal characters"));
            }
            match c {
                c if c == quote => {
                    if !triple {
                        return Ok(());
                    }
                    if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                        self.pos += 2;
                        return Ok(());
                    }
                    out.push(c);
                }
                '\n' if !triple => {
                    self.pos -= 1;
                    return Err(self.error("unterminated string literal (line break)"));
                }
                '\\' => {
                    let Some(next) = self.bump() else {
                        self.pos = start;
                        return Err(self.error("unterminated string literal"));
                    };
                    if prefix.bytes && !next.is_ascii() {
                        self.pos -= 1;
                        return Err(self.error("bytes can only contain ASCII literal characters"));
                    }
                    if prefix.raw {
                        out.push('\\');
                        out.push(next);
                    } else {
                        self.escape(next, prefix.bytes, out)?;
                    }
                }
                c => out.push(c),
            }
        }
    }

    fn escape(&mut self, c: char, bytes: bool, out: &mut String) -> Result<(), LiteralError> {
        match c {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            '0'..='7' => {
                let mut value = c.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|d| d.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            self.pos += 1;
                        }
                        None => break,
                    }
                }
                // A byte escape above \377 keeps only its low eight bits.
                let value = if bytes { value & 0xff } else { value };
                out.push(self.code_point(value)?);
            }
            'x' => {
                let value = self.hex_digits(2)?;
                out.push(self.code_point(value)?);
            }
            'u' if !bytes => {
                let value = self.hex_digits(4)?;
                out.push(self.code_point(value)?);
            }
            'U' if !bytes => {
                let value = self.hex_digits(8)?;
                out.push(self.code_point(value)?);
            }
            'N' if !bytes => out.push(self.named_char()?),
            // Unknown escapes keep the backslash.
            other => {
                out.push('\\');
                out.push(other);
            }
        }
        Ok(())
    }

    /// The `{NAME}` part of a `\N{NAME}` escape, looked up in the Unicode name table.
    fn named_char(&mut self) -> Result<char, LiteralError> {
        let start = self.pos;
        if self.peek() != Some('{') {
            return Err(self.error("malformed \\N character escape"));
        }
        self.pos += 1;
        let name = self.take_while(|c| c != '}' && c != '\n');
        if name.is_empty() || self.bump() != Some('}') {
            self.pos = start;
            return Err(self.error("malformed \\N character escape"));
        }
        match unicode_names2::character(&name.to_ascii_uppercase()) {
            Some(c) => Ok(c),
            None => {
                self.pos = start;
                Err(self.error(format!("unknown Unicode character name {name:?}")))
            }
        }
    }

    fn hex_digits(&mut self, n: usize) -> Result<u32, LiteralError> {
        let mut value = 0u32;
        for _ in 0..n {
            let d = self
                .peek()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("truncated hex escape"))?;
            value = value.wrapping_mul(16).wrapping_add(d);
            self.pos += 1;
        }
        Ok(value)
    }

    fn code_point(&self, value: u32) -> Result<char, LiteralError> {
        char::from_u32(value).ok_or_else(|| self.error(format!("invalid code point {value:#x}")))
    }
}
