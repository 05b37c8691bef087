// Recursive-descent parser producing the formula tree
// Author: Gabriel Demetrios Lafis

use std::collections::BTreeSet;
use std::fmt;

use crate::data::Value;

use super::lexer::Token;
use super::ExpressionError;

/// Formula tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Function, Box<Expr>),
}

impl Expr {
    /// Every column the formula references
    pub fn columns(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Column(name) => {
                out.insert(name.clone());
            }
            Expr::Unary(_, inner) | Expr::Call(_, inner) => inner.collect_columns(out),
            Expr::Binary(_, left, right) => {
                left.collect_columns(out);
                right.collect_columns(out);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// The reductions a formula may call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sum,
    Mean,
    Max,
    Min,
    Count,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Function::Sum),
            "mean" => Some(Function::Mean),
            "max" => Some(Function::Max),
            "min" => Some(Function::Min),
            "count" => Some(Function::Count),
            _ => None,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Function::Sum => "sum",
            Function::Mean => "mean",
            Function::Max => "max",
            Function::Min => "min",
            Function::Count => "count",
        };
        f.write_str(name)
    }
}

pub struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    end: usize,
}

impl Parser {
    pub fn new(tokens: Vec<(usize, Token)>) -> Self {
        let end = tokens.last().map_or(0, |(offset, _)| offset + 1);
        Parser { tokens, pos: 0, end }
    }

    /// Parse the whole token stream into one expression
    pub fn parse(mut self) -> Result<Expr, ExpressionError> {
        if self.tokens.is_empty() {
            return Err(ExpressionError::syntax(0, "empty formula"));
        }

        let expr = self.or()?;
        match self.peek() {
            None => Ok(expr),
            Some(token) => {
                let token = token.clone();
                Err(self.unexpected(&token))
            }
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |(offset, _)| *offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Error for a token that cannot appear here. Forbidden constructs get
    /// their own error kind so callers can tell them from typos.
    fn unexpected(&self, token: &Token) -> ExpressionError {
        match token {
            Token::Assign => ExpressionError::DisallowedOperation("assignment".to_string()),
            Token::Dot => ExpressionError::DisallowedOperation("attribute access".to_string()),
            Token::At => ExpressionError::DisallowedOperation("local variable reference".to_string()),
            other => ExpressionError::syntax(self.offset(), format!("unexpected token {:?}", other)),
        }
    }

    fn or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            let right = self.and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.not()?;
        while self.eat(&Token::And) {
            let right = self.not()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Not) {
            let inner = self.not()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::EqEq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn additive(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::DoubleSlash) => BinaryOp::FloorDiv,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return Ok(Expr::Unary(UnaryOp::Plus, Box::new(self.unary()?)));
        }
        self.power()
    }

    fn power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.primary()?;
        if self.eat(&Token::Power) {
            // Right-associative, binds tighter than a unary minus on its left
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let offset = self.offset();
        let token = match self.advance() {
            Some(token) => token,
            None => return Err(ExpressionError::syntax(offset, "unexpected end of formula")),
        };

        let expr = match token {
            Token::Integer(i) => Expr::Literal(Value::Integer(i)),
            Token::Float(f) => Expr::Literal(Value::Float(f)),
            Token::Str(s) => Expr::Literal(Value::String(s)),
            Token::QuotedIdent(name) => Expr::Column(name),
            Token::LParen => {
                let inner = self.or()?;
                self.expect_close()?;
                inner
            }
            Token::Ident(name) => {
                if self.peek() == Some(&Token::LParen) {
                    return self.call(&name);
                }
                match name.as_str() {
                    "true" | "True" => Expr::Literal(Value::Boolean(true)),
                    "false" | "False" => Expr::Literal(Value::Boolean(false)),
                    "null" | "None" => Expr::Literal(Value::Null),
                    _ => Expr::Column(name),
                }
            }
            other => {
                self.pos -= 1;
                return Err(self.unexpected(&other));
            }
        };

        // `x.attr` is rejected here rather than as a trailing token so the
        // error names the construct
        if self.peek() == Some(&Token::Dot) {
            return Err(self.unexpected(&Token::Dot));
        }
        Ok(expr)
    }

    fn call(&mut self, name: &str) -> Result<Expr, ExpressionError> {
        let function = Function::from_name(name)
            .ok_or_else(|| ExpressionError::UnknownFunction(name.to_string()))?;
        self.pos += 1; // '('
        let arg = self.or()?;
        if self.peek() == Some(&Token::Comma) {
            return Err(ExpressionError::syntax(
                self.offset(),
                format!("{}() takes exactly one argument", function),
            ));
        }
        self.expect_close()?;
        Ok(Expr::Call(function, Box::new(arg)))
    }

    fn expect_close(&mut self) -> Result<(), ExpressionError> {
        if self.eat(&Token::RParen) {
            Ok(())
        } else {
            Err(ExpressionError::syntax(self.offset(), "expected ')'"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Expression;

    fn parse(source: &str) -> Result<Expr, ExpressionError> {
        Expression::parse(source).map(|e| e.root().clone())
    }

    fn col(name: &str) -> Box<Expr> {
        Box::new(Expr::Column(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * c > 10 and not d").unwrap();
        let expected = Expr::Binary(
            BinaryOp::And,
            Box::new(Expr::Binary(
                BinaryOp::Gt,
                Box::new(Expr::Binary(
                    BinaryOp::Add,
                    col("a"),
                    Box::new(Expr::Binary(BinaryOp::Mul, col("b"), col("c"))),
                )),
                Box::new(Expr::Literal(Value::Integer(10))),
            )),
            Box::new(Expr::Unary(UnaryOp::Not, col("d"))),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_unary_minus_binds_looser_than_power() {
        let expr = parse("-a ** 2").unwrap();
        assert_eq!(
            expr,
            Expr::Unary(
                UnaryOp::Neg,
                Box::new(Expr::Binary(
                    BinaryOp::Pow,
                    col("a"),
                    Box::new(Expr::Literal(Value::Integer(2)))
                ))
            )
        );
    }

    #[test]
    fn test_columns_are_collected() {
        let expr = parse("sum(`Sales Amount`) / count(qty)").unwrap();
        let columns: Vec<String> = expr.columns().into_iter().collect();
        assert_eq!(columns, vec!["Sales Amount".to_string(), "qty".to_string()]);
    }

    #[test]
    fn test_rejects_side_effects_and_unknown_functions() {
        assert_eq!(
            parse("x = 1"),
            Err(ExpressionError::DisallowedOperation("assignment".to_string()))
        );
        assert_eq!(
            parse("df.columns"),
            Err(ExpressionError::DisallowedOperation("attribute access".to_string()))
        );
        assert!(matches!(
            parse("quantity * @price"),
            Err(ExpressionError::DisallowedOperation(_))
        ));
        assert_eq!(
            parse("open('x')"),
            Err(ExpressionError::UnknownFunction("open".to_string()))
        );
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(parse(""), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("(a + b"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("a b"), Err(ExpressionError::Syntax { .. })));
        assert!(matches!(parse("a < b < c"), Err(ExpressionError::Syntax { .. })));
    }
}
