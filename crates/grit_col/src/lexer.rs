//! TCOL tokenizer
//!
//! Splits TCOL text into identifiers, string/integer/float literals and the
//! three punctuation symbols. Whitespace, `//` line comments and `/* */`
//! block comments are skipped. Every token records the line and column it
//! started at so the parser can report located errors.

use crate::error::ParseError;

/// Token type, with the decoded value for literals
#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    /// Keyword or bare word (`hull`, `TCOL1.0`, ...)
    Ident(String),
    /// Double-quoted string with escapes decoded
    Str(String),
    Integer(i64),
    Float(f32),
    LBrace,
    RBrace,
    Semicolon,
    Eof,
}

impl TokenKind {
    /// Short description used in error messages
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(s) => format!("'{}'", s),
            TokenKind::Str(s) => format!("string \"{}\"", s),
            TokenKind::Integer(i) => format!("integer {}", i),
            TokenKind::Float(f) => format!("float {}", f),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Eof => "end of file".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    pub column: usize,
}

pub struct Lexer<'a> {
    name: &'a str,
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(name: &'a str, input: &'a str) -> Self {
        Self {
            name,
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>, line: usize, column: usize) -> ParseError {
        ParseError::new(message, "lexer", self.name, line, column)
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') => {
                    let (line, column) = (self.line, self.column);
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    match ahead.peek() {
                        Some('/') => {
                            while let Some(c) = self.bump() {
                                if c == '\n' {
                                    break;
                                }
                            }
                        }
                        Some('*') => {
                            self.bump();
                            self.bump();
                            let mut prev = '\0';
                            loop {
                                match self.bump() {
                                    Some('/') if prev == '*' => break,
                                    Some(c) => prev = c,
                                    None => return Err(self.error("Unterminated comment", line, column)),
                                }
                            }
                        }
                        _ => return Err(self.error("Unexpected '/'", line, column)),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Produce the next token (`Eof` forever once input is exhausted)
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let token = |kind| Token { kind, line, column };

        let c = match self.chars.peek() {
            Some(&c) => c,
            None => return Ok(token(TokenKind::Eof)),
        };

        match c {
            '{' => {
                self.bump();
                Ok(token(TokenKind::LBrace))
            }
            '}' => {
                self.bump();
                Ok(token(TokenKind::RBrace))
            }
            ';' => {
                self.bump();
                Ok(token(TokenKind::Semicolon))
            }
            '"' => {
                self.bump();
                let mut s = String::new();
                loop {
                    match self.bump() {
                        Some('"') => break,
                        Some('\\') => match self.bump() {
                            Some('n') => s.push('\n'),
                            Some('t') => s.push('\t'),
                            Some(other) => s.push(other),
                            None => return Err(self.error("Unterminated string", line, column)),
                        },
                        Some('\n') | None => {
                            return Err(self.error("Unterminated string", line, column))
                        }
                        Some(other) => s.push(other),
                    }
                }
                Ok(token(TokenKind::Str(s)))
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let kind = self.number(line, column)?;
                Ok(token(kind))
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        s.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Ok(token(TokenKind::Ident(s)))
            }
            other => Err(self.error(format!("Unexpected character '{}'", other), line, column)),
        }
    }

    fn number(&mut self, line: usize, column: usize) -> Result<TokenKind, ParseError> {
        let mut text = String::new();
        let mut is_float = false;

        if let Some(&sign) = self.chars.peek() {
            if sign == '-' || sign == '+' {
                text.push(sign);
                self.bump();
            }
        }
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_digit() {
                text.push(c);
            } else if c == '.' {
                is_float = true;
                text.push(c);
            } else if c == 'e' || c == 'E' {
                is_float = true;
                text.push(c);
                self.bump();
                if let Some(&sign) = self.chars.peek() {
                    if sign == '-' || sign == '+' {
                        text.push(sign);
                        self.bump();
                    }
                }
                continue;
            } else {
                break;
            }
            self.bump();
        }

        if !is_float {
            if let Ok(i) = text.parse::<i64>() {
                return Ok(TokenKind::Integer(i));
            }
        }
        // Integers too wide for i64 still make valid reals
        text.parse::<f32>()
            .map(TokenKind::Float)
            .map_err(|_| self.error(format!("Malformed number \"{}\"", text), line, column))
    }
}
