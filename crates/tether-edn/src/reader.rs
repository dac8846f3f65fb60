//! Incremental EDN reader.
//!
//! The reader consumes text and produces top-level [`Value`]s one at a
//! time. It is restartable: [`read_partial`] parses at most one value from
//! the front of a buffer and reports how many bytes it consumed, so a
//! caller feeding it from a socket can retry the same buffer once more
//! bytes arrive. Incomplete input is reported as [`ReadError::UnexpectedEof`]
//! rather than a syntax error; this includes malformed tokens that touch
//! the end of the buffer, since more data may still legitimise them.

use thiserror::Error;

use crate::value::{Keyword, Map, Ratio, Set, Symbol, Tagged, Value};

/// Errors raised while reading EDN text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    /// The input is malformed at the given byte position.
    #[error("syntax error at byte {position}: {message}")]
    Syntax {
        /// Byte offset of the offending token.
        position: usize,
        /// Description of the problem.
        message: String,
    },

    /// The input ended inside an unterminated form.
    #[error("unexpected end of input at byte {position}")]
    UnexpectedEof {
        /// Byte offset where input ran out.
        position: usize,
    },
}

/// Reads the first value from `input`.
///
/// # Errors
///
/// Returns [`ReadError::UnexpectedEof`] when the input holds no complete
/// value, or [`ReadError::Syntax`] when it is malformed.
pub fn read_str(input: &str) -> Result<Value, ReadError> {
    Reader::new(input)
        .next_value()?
        .ok_or(ReadError::UnexpectedEof {
            position: input.len(),
        })
}

/// Reads every top-level value in `input`.
///
/// # Errors
///
/// Returns the first read error encountered.
pub fn read_all(input: &str) -> Result<Vec<Value>, ReadError> {
    let mut reader = Reader::new(input);
    let mut values = Vec::new();
    while let Some(value) = reader.next_value()? {
        values.push(value);
    }
    Ok(values)
}

/// Reads at most one value from the front of `input`.
///
/// Returns the value and the number of bytes consumed, or `None` when the
/// input holds nothing but whitespace and comments. A caller streaming from
/// a socket should treat [`ReadError::UnexpectedEof`] as "append more input
/// and retry from the same buffer start".
///
/// Top-level atoms are committed as soon as the buffer ends, so streamed
/// values must be framed by trailing whitespace (this protocol terminates
/// every frame with a newline).
///
/// # Errors
///
/// Returns [`ReadError::Syntax`] on malformed input and
/// [`ReadError::UnexpectedEof`] on incomplete input.
pub fn read_partial(input: &str) -> Result<Option<(Value, usize)>, ReadError> {
    let mut reader = Reader::new(input);
    let value = reader.next_value()?;
    Ok(value.map(|value| (value, reader.position())))
}

/// A restartable cursor producing a sequence of top-level values.
pub struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Creates a reader over `input`.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Byte offset of the next unread character.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Produces the next top-level value, or `None` at clean end of input.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::Syntax`] on malformed input and
    /// [`ReadError::UnexpectedEof`] when the input ends inside a form.
    pub fn next_value(&mut self) -> Result<Option<Value>, ReadError> {
        loop {
            self.skip_trivia();
            if self.at_end() {
                return Ok(None);
            }
            if self.eat_discard_or_meta()? {
                continue;
            }
            return self.parse_value().map(Some);
        }
    }

    fn rest(&self) -> &str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.rest().chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.peek()?;
        self.pos += next.len_utf8();
        Some(next)
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.rest().starts_with(prefix)
    }

    fn syntax(&self, position: usize, message: impl Into<String>) -> ReadError {
        ReadError::Syntax {
            position,
            message: message.into(),
        }
    }

    fn eof(&self) -> ReadError {
        ReadError::UnexpectedEof { position: self.pos }
    }

    /// Reports a bad token as EOF when it touches the end of the buffer, so
    /// incremental callers can retry once more input arrives.
    fn token_error(&self, position: usize, message: impl Into<String>) -> ReadError {
        if self.at_end() {
            self.eof()
        } else {
            self.syntax(position, message)
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() || c == ',' => {
                    self.bump();
                }
                Some(';') => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => return,
            }
        }
    }

    /// Consumes a `#_` discard or `^`/`#^` metadata prefix, parsing and
    /// dropping the prefixed form. Returns true when a prefix was consumed.
    fn eat_discard_or_meta(&mut self) -> Result<bool, ReadError> {
        if self.starts_with("#_") {
            self.pos += 2;
            self.parse_form()?;
            return Ok(true);
        }
        if self.starts_with("#^") {
            self.pos += 2;
            self.parse_form()?;
            return Ok(true);
        }
        if self.peek() == Some('^') {
            self.pos += 1;
            self.parse_form()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Parses one form, skipping any leading trivia and prefixes.
    fn parse_form(&mut self) -> Result<Value, ReadError> {
        loop {
            self.skip_trivia();
            if self.eat_discard_or_meta()? {
                continue;
            }
            return self.parse_value();
        }
    }

    fn parse_value(&mut self) -> Result<Value, ReadError> {
        let Some(c) = self.peek() else {
            return Err(self.eof());
        };
        match c {
            '(' => {
                self.bump();
                self.parse_seq(')').map(Value::List)
            }
            '[' => {
                self.bump();
                self.parse_seq(']').map(Value::Vector)
            }
            '{' => {
                let open = self.pos;
                self.bump();
                self.parse_map(open)
            }
            ')' | ']' | '}' => Err(self.syntax(self.pos, format!("unmatched delimiter '{c}'"))),
            '"' => self.parse_string(),
            '\\' => self.parse_char(),
            ':' => self.parse_keyword(),
            '#' => self.parse_dispatch(),
            _ if c.is_ascii_digit() => self.parse_number(),
            '+' | '-' if self.peek_second().is_some_and(|d| d.is_ascii_digit()) => {
                self.parse_number()
            }
            _ if is_symbol_start(c) => self.parse_symbol(),
            _ => Err(self.syntax(self.pos, format!("unexpected character '{c}'"))),
        }
    }

    /// Parses elements up to the closing delimiter, which has already had
    /// its opening counterpart consumed.
    fn parse_seq(&mut self, close: char) -> Result<Vec<Value>, ReadError> {
        let mut items = Vec::new();
        while let Some(item) = self.parse_element(close)? {
            items.push(item);
        }
        Ok(items)
    }

    /// Parses one collection element, or `None` once the closing delimiter
    /// is reached. Discards and metadata are handled here so that a
    /// trailing `#_ form` before the delimiter is legal.
    fn parse_element(&mut self, close: char) -> Result<Option<Value>, ReadError> {
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(self.eof()),
                Some(c) if c == close => {
                    self.bump();
                    return Ok(None);
                }
                _ => {}
            }
            if self.eat_discard_or_meta()? {
                continue;
            }
            return self.parse_value().map(Some);
        }
    }

    fn parse_map(&mut self, open: usize) -> Result<Value, ReadError> {
        let forms = self.parse_seq('}')?;
        if forms.len() % 2 != 0 {
            return Err(self.syntax(open, "map literal requires an even number of forms"));
        }
        let mut map = Map::new();
        let mut forms = forms.into_iter();
        while let (Some(key), Some(value)) = (forms.next(), forms.next()) {
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }

    fn parse_string(&mut self) -> Result<Value, ReadError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.eof()),
                Some('"') => return Ok(Value::String(out)),
                Some('\\') => out.push(self.parse_string_escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_string_escape(&mut self) -> Result<char, ReadError> {
        let escape_pos = self.pos - 1;
        match self.bump() {
            None => Err(self.eof()),
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('f') => Ok('\u{000C}'),
            Some('b') => Ok('\u{0008}'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('u') => self.parse_unicode_escape(escape_pos),
            Some(other) => Err(self.token_error(escape_pos, format!("unsupported escape '\\{other}'"))),
        }
    }

    fn parse_unicode_escape(&mut self, start: usize) -> Result<char, ReadError> {
        let mut code = 0u32;
        for _ in 0..4 {
            match self.bump() {
                None => return Err(self.eof()),
                Some(digit) => match digit.to_digit(16) {
                    Some(nibble) => code = code * 16 + nibble,
                    None => {
                        return Err(self.token_error(start, "invalid unicode escape"));
                    }
                },
            }
        }
        char::from_u32(code).ok_or_else(|| self.syntax(start, "invalid unicode escape"))
    }

    fn parse_char(&mut self) -> Result<Value, ReadError> {
        let start = self.pos;
        self.bump();
        let Some(first) = self.bump() else {
            return Err(self.eof());
        };
        let mut token = String::new();
        token.push(first);
        if first.is_alphabetic() {
            while let Some(c) = self.peek() {
                if c.is_alphanumeric() {
                    token.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if token.chars().count() == 1 {
            return Ok(Value::Char(first));
        }
        match token.as_str() {
            "newline" => Ok(Value::Char('\n')),
            "space" => Ok(Value::Char(' ')),
            "tab" => Ok(Value::Char('\t')),
            "return" => Ok(Value::Char('\r')),
            "formfeed" => Ok(Value::Char('\u{000C}')),
            "backspace" => Ok(Value::Char('\u{0008}')),
            _ if token.len() == 5 && token.starts_with('u') => {
                let code = u32::from_str_radix(&token[1..], 16)
                    .map_err(|_| self.token_error(start, "invalid character literal"))?;
                char::from_u32(code)
                    .map(Value::Char)
                    .ok_or_else(|| self.syntax(start, "invalid character literal"))
            }
            _ => Err(self.token_error(start, format!("unrecognised character literal '\\{token}'"))),
        }
    }

    fn parse_keyword(&mut self) -> Result<Value, ReadError> {
        let start = self.pos;
        self.bump();
        let token = self.take_token();
        if token.is_empty() {
            return Err(self.token_error(start, "invalid keyword"));
        }
        if token.starts_with(':') {
            return Err(self.syntax(start, "auto-resolved keywords are not supported"));
        }
        Ok(Value::Keyword(Keyword::parse(&token)))
    }

    fn parse_symbol(&mut self) -> Result<Value, ReadError> {
        let token = self.take_token();
        match token.as_str() {
            "nil" => Ok(Value::Nil),
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Ok(Value::Symbol(Symbol::parse(&token))),
        }
    }

    fn parse_dispatch(&mut self) -> Result<Value, ReadError> {
        let start = self.pos;
        if self.starts_with("#{") {
            self.pos += 2;
            let items = self.parse_seq('}')?;
            return Ok(Value::Set(items.into_iter().collect::<Set>()));
        }
        if self.starts_with("##") {
            self.pos += 2;
            let token = self.take_token();
            return match token.as_str() {
                "Inf" => Ok(Value::Float(f64::INFINITY)),
                "-Inf" => Ok(Value::Float(f64::NEG_INFINITY)),
                "NaN" => Ok(Value::Float(f64::NAN)),
                _ => Err(self.token_error(start, format!("unknown symbolic value '##{token}'"))),
            };
        }
        self.bump();
        let Some(first) = self.peek() else {
            return Err(self.eof());
        };
        if !first.is_alphabetic() {
            return Err(self.syntax(start, format!("invalid dispatch character '{first}'")));
        }
        let tag = self.take_token();
        let value = self.parse_form()?;
        Ok(Value::Tagged(Tagged {
            tag: Symbol::parse(&tag),
            value: Box::new(value),
        }))
    }

    fn parse_number(&mut self) -> Result<Value, ReadError> {
        let start = self.pos;
        let token = self.take_token();
        if let Some((numerator, denominator)) = token.split_once('/') {
            let numerator: i64 = numerator
                .parse()
                .map_err(|_| self.token_error(start, "invalid ratio literal"))?;
            let denominator: i64 = denominator
                .parse()
                .map_err(|_| self.token_error(start, "invalid ratio literal"))?;
            return Ok(Value::Ratio(Ratio {
                numerator,
                denominator,
            }));
        }
        let is_float = token.contains(['.', 'e', 'E']) || token.ends_with('M');
        if is_float {
            let digits = token.strip_suffix('M').unwrap_or(&token);
            return digits
                .parse()
                .map(Value::Float)
                .map_err(|_| self.token_error(start, "invalid float literal"));
        }
        let digits = token.strip_suffix('N').unwrap_or(&token);
        digits
            .parse()
            .map(Value::Int)
            .map_err(|_| self.token_error(start, "invalid integer literal"))
    }

    /// Consumes characters up to the next delimiter.
    fn take_token(&mut self) -> String {
        let mut token = String::new();
        while let Some(c) = self.peek() {
            if is_delimiter(c) {
                break;
            }
            token.push(c);
            self.bump();
        }
        token
    }
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace()
        || matches!(c, ',' | ';' | '(' | ')' | '[' | ']' | '{' | '}' | '"' | '\\')
}

fn is_symbol_start(c: char) -> bool {
    c.is_alphabetic() || matches!(c, '*' | '+' | '!' | '-' | '_' | '?' | '$' | '%' | '&' | '=' | '<' | '>' | '.' | '/' | '\'')
}
