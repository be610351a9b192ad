//! Tokenizer for policy expressions.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::ConfigurationError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Str(String),
    Number(f64),
    True,
    False,
    And,
    Or,
    Not,
    In,
    EqEq,
    BangEq,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Eof,
}

impl TokenKind {
    /// Short form used in syntax error messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::Str(_) => "string literal".to_owned(),
            Self::Number(_) => "number".to_owned(),
            Self::True | Self::False => "boolean literal".to_owned(),
            Self::And => "'&&'".to_owned(),
            Self::Or => "'||'".to_owned(),
            Self::Not => "'!'".to_owned(),
            Self::In => "'in'".to_owned(),
            Self::EqEq => "'=='".to_owned(),
            Self::BangEq => "'!='".to_owned(),
            Self::Lt => "'<'".to_owned(),
            Self::Le => "'<='".to_owned(),
            Self::Gt => "'>'".to_owned(),
            Self::Ge => "'>='".to_owned(),
            Self::LParen => "'('".to_owned(),
            Self::RParen => "')'".to_owned(),
            Self::LBracket => "'['".to_owned(),
            Self::RBracket => "']'".to_owned(),
            Self::Comma => "','".to_owned(),
            Self::Dot => "'.'".to_owned(),
            Self::Eof => "end of expression".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset into the source.
    pub pos: usize,
}

pub(crate) fn syntax_error(position: usize, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidExpression {
        position,
        reason: reason.into(),
    }
}

struct Lexer<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

/// Split `src` into tokens, always terminated by [`TokenKind::Eof`].
pub(crate) fn tokenize(src: &str) -> Result<Vec<Token>, ConfigurationError> {
    let mut lexer = Lexer {
        src,
        chars: src.char_indices().peekable(),
    };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl Lexer<'_> {
    fn next_token(&mut self) -> Result<Token, ConfigurationError> {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}

        let Some((pos, c)) = self.chars.next() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                pos: self.src.len(),
            });
        };

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '=' => {
                if !self.eat('=') {
                    return Err(syntax_error(pos, "expected '==', found '='"));
                }
                TokenKind::EqEq
            }
            '!' => {
                if self.eat('=') {
                    TokenKind::BangEq
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.eat('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if !self.eat('&') {
                    return Err(syntax_error(pos, "expected '&&'"));
                }
                TokenKind::And
            }
            '|' => {
                if !self.eat('|') {
                    return Err(syntax_error(pos, "expected '||'"));
                }
                TokenKind::Or
            }
            '\'' | '"' => TokenKind::Str(self.string(pos, c)?),
            '-' if self.chars.peek().is_some_and(|(_, d)| d.is_ascii_digit()) => {
                TokenKind::Number(self.number(pos)?)
            }
            d if d.is_ascii_digit() => TokenKind::Number(self.number(pos)?),
            a if a.is_alphabetic() || a == '_' => self.word(pos),
            other => {
                return Err(syntax_error(pos, format!("unexpected character '{other}'")));
            }
        };
        Ok(Token { kind, pos })
    }

    fn eat(&mut self, expected: char) -> bool {
        self.chars.next_if(|(_, c)| *c == expected).is_some()
    }

    fn string(&mut self, start: usize, quote: char) -> Result<String, ConfigurationError> {
        let mut out = String::new();
        while let Some((_, c)) = self.chars.next() {
            match c {
                '\\' => match self.chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c if c == quote => return Ok(out),
                c => out.push(c),
            }
        }
        Err(syntax_error(start, "unterminated string literal"))
    }

    fn number(&mut self, start: usize) -> Result<f64, ConfigurationError> {
        let mut end = start + 1;
        while let Some((i, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit()) {
            end = i + c.len_utf8();
        }
        // A fractional part needs a digit after the dot.
        let rest = &self.src[end..];
        let mut lookahead = rest.chars();
        if lookahead.next() == Some('.') && lookahead.next().is_some_and(|c| c.is_ascii_digit()) {
            self.chars.next();
            while let Some((i, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit()) {
                end = i + c.len_utf8();
            }
        }
        self.src[start..end]
            .parse::<f64>()
            .map_err(|_| syntax_error(start, "malformed number"))
    }

    fn word(&mut self, start: usize) -> TokenKind {
        let mut end = start + 1;
        while let Some((i, c)) = self
            .chars
            .next_if(|(_, c)| c.is_alphanumeric() || *c == '_')
        {
            end = i + c.len_utf8();
        }
        match &self.src[start..end] {
            "true" | "TRUE" => TokenKind::True,
            "false" | "FALSE" => TokenKind::False,
            "and" | "AND" => TokenKind::And,
            "or" | "OR" => TokenKind::Or,
            "not" | "NOT" => TokenKind::Not,
            "in" | "IN" => TokenKind::In,
            word => TokenKind::Ident(word.to_owned()),
        }
    }
}
