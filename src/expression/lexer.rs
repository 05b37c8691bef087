// Tokenizer for formulas
// Author: Gabriel Demetrios Lafis

use super::ExpressionError;

/// A lexical token with its byte offset in the source
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Float(f64),
    Str(String),
    Ident(String),
    /// A backtick-quoted column name
    QuotedIdent(String),
    Plus,
    Minus,
    Star,
    Slash,
    DoubleSlash,
    Percent,
    Power,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
    LParen,
    RParen,
    Comma,
    /// `=`, only ever reported as a disallowed assignment
    Assign,
    /// `.`, only ever reported as disallowed attribute access
    Dot,
    /// `@`, only ever reported as a disallowed local reference
    At,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map_or(self.source.len(), |(offset, _)| *offset)
    }

    /// Split the whole source into tokens paired with their offsets
    pub fn tokenize(mut self) -> Result<Vec<(usize, Token)>, ExpressionError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
                continue;
            }

            let start = self.offset();
            let token = match c {
                '0'..='9' => self.number()?,
                '.' if self.peek_at(1).map_or(false, |n| n.is_ascii_digit()) => self.number()?,
                '\'' | '"' => self.string(c)?,
                '`' => self.quoted_ident()?,
                c if c.is_alphabetic() || c == '_' => self.ident(),
                _ => self.operator()?,
            };
            tokens.push((start, token));
        }

        Ok(tokens)
    }

    fn number(&mut self) -> Result<Token, ExpressionError> {
        let start = self.pos;
        let mut is_float = false;

        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => self.pos += 1,
                '.' if !is_float => {
                    is_float = true;
                    self.pos += 1;
                }
                'e' | 'E' => {
                    let sign = matches!(self.peek_at(1), Some('+') | Some('-'));
                    let digit_at = if sign { 2 } else { 1 };
                    if !self.peek_at(digit_at).map_or(false, |d| d.is_ascii_digit()) {
                        break;
                    }
                    is_float = true;
                    self.pos += digit_at;
                    while self.peek().map_or(false, |d| d.is_ascii_digit()) {
                        self.pos += 1;
                    }
                    break;
                }
                _ => break,
            }
        }

        let text: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();
        let offset = self.chars[start].0;
        if is_float {
            text.parse::<f64>()
                .map(Token::Float)
                .map_err(|_| ExpressionError::syntax(offset, format!("invalid number '{}'", text)))
        } else {
            match text.parse::<i64>() {
                Ok(i) => Ok(Token::Integer(i)),
                // Too large for an integer literal
                Err(_) => text
                    .parse::<f64>()
                    .map(Token::Float)
                    .map_err(|_| ExpressionError::syntax(offset, format!("invalid number '{}'", text))),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<Token, ExpressionError> {
        let start = self.offset();
        self.pos += 1;
        let mut text = String::new();

        loop {
            match self.peek() {
                None => return Err(ExpressionError::syntax(start, "unterminated string literal")),
                Some(c) if c == quote => {
                    self.pos += 1;
                    return Ok(Token::Str(text));
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some('n') => text.push('\n'),
                        Some('t') => text.push('\t'),
                        Some(other) => text.push(other),
                        None => {
                            return Err(ExpressionError::syntax(start, "unterminated string literal"))
                        }
                    }
                    self.pos += 1;
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn quoted_ident(&mut self) -> Result<Token, ExpressionError> {
        let start = self.offset();
        self.pos += 1;
        let mut name = String::new();

        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '`' {
                return Ok(Token::QuotedIdent(name));
            }
            name.push(c);
        }

        Err(ExpressionError::syntax(start, "unterminated quoted column name"))
    }

    fn ident(&mut self) -> Token {
        let start = self.pos;
        while self
            .peek()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().map(|(_, c)| c).collect();

        match word.as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Ident(word),
        }
    }

    fn operator(&mut self) -> Result<Token, ExpressionError> {
        let start = self.offset();
        let c = self.peek().unwrap_or_default();
        let next = self.peek_at(1);

        let (token, width) = match (c, next) {
            ('*', Some('*')) => (Token::Power, 2),
            ('/', Some('/')) => (Token::DoubleSlash, 2),
            ('=', Some('=')) => (Token::EqEq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('&', _) => (Token::And, 1),
            ('|', _) => (Token::Or, 1),
            ('!', _) | ('~', _) => (Token::Not, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            (',', _) => (Token::Comma, 1),
            ('=', _) => (Token::Assign, 1),
            ('.', _) => (Token::Dot, 1),
            ('@', _) => (Token::At, 1),
            (other, _) => {
                return Err(ExpressionError::syntax(
                    start,
                    format!("unexpected character '{}'", other),
                ))
            }
        };

        self.pos += width;
        Ok(token)
    }
}
