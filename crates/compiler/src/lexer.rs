//! Tokenizer for HelmScript source text.
//!
//! The language is case-insensitive: identifiers and keywords are
//! lowercased here, string literals are preserved verbatim. Every
//! token carries its (line, column) so later stages can report
//! positions without re-scanning.

use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    /// Identifier or keyword, always lowercase.
    Ident(String),
    Number(f64),
    Str(String),
    Dot,
    LBrace,
    RBrace,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: u32,
    pub column: u32,
}

struct Cursor<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Cursor<'a> {
        Cursor {
            chars: text.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
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
}

/// Tokenize a full script.
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, ParseError> {
    let mut cursor = Cursor::new(text);
    let mut tokens = Vec::new();

    while let Some(c) = cursor.peek() {
        let (line, column) = (cursor.line, cursor.column);
        match c {
            ' ' | '\t' | '\r' | '\n' => {
                cursor.bump();
            }
            '/' => {
                cursor.bump();
                if cursor.peek() == Some('/') {
                    while let Some(c) = cursor.peek() {
                        if c == '\n' {
                            break;
                        }
                        cursor.bump();
                    }
                } else {
                    tokens.push(Token {
                        tok: Tok::Slash,
                        line,
                        column,
                    });
                }
            }
            '"' => {
                cursor.bump();
                let mut s = String::new();
                loop {
                    match cursor.bump() {
                        Some('"') => break,
                        Some(c) => s.push(c),
                        None => {
                            return Err(ParseError::new(line, column, "unterminated string"));
                        }
                    }
                }
                tokens.push(Token {
                    tok: Tok::Str(s),
                    line,
                    column,
                });
            }
            c if c.is_ascii_digit() => {
                let mut s = String::new();
                while let Some(c) = cursor.peek() {
                    if c.is_ascii_digit() || c == '.' {
                        // A dot not followed by a digit is a statement
                        // terminator, not a decimal point.
                        if c == '.' {
                            let mut ahead = cursor.chars.clone();
                            ahead.next();
                            match ahead.next() {
                                Some(d) if d.is_ascii_digit() => {}
                                _ => break,
                            }
                        }
                        s.push(c);
                        cursor.bump();
                    } else {
                        break;
                    }
                }
                let value: f64 = s
                    .parse()
                    .map_err(|_| ParseError::new(line, column, format!("bad number '{}'", s)))?;
                tokens.push(Token {
                    tok: Tok::Number(value),
                    line,
                    column,
                });
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut s = String::new();
                while let Some(c) = cursor.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        s.push(c.to_ascii_lowercase());
                        cursor.bump();
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    tok: Tok::Ident(s),
                    line,
                    column,
                });
            }
            _ => {
                cursor.bump();
                let tok = match c {
                    '.' => Tok::Dot,
                    '{' => Tok::LBrace,
                    '}' => Tok::RBrace,
                    '(' => Tok::LParen,
                    ')' => Tok::RParen,
                    '+' => Tok::Plus,
                    '-' => Tok::Minus,
                    '*' => Tok::Star,
                    '^' => Tok::Caret,
                    '=' => Tok::Eq,
                    '<' => match cursor.peek() {
                        Some('=') => {
                            cursor.bump();
                            Tok::Le
                        }
                        Some('>') => {
                            cursor.bump();
                            Tok::Ne
                        }
                        _ => Tok::Lt,
                    },
                    '>' => {
                        if cursor.peek() == Some('=') {
                            cursor.bump();
                            Tok::Ge
                        } else {
                            Tok::Gt
                        }
                    }
                    other => {
                        return Err(ParseError::new(
                            line,
                            column,
                            format!("unexpected character '{}'", other),
                        ));
                    }
                };
                tokens.push(Token { tok, line, column });
            }
        }
    }

    Ok(tokens)
}
