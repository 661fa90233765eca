//! Whitelisted numeric-sequence expressions for the `numtets` parameter
//!
//! A deliberately small grammar replaces general-purpose evaluation:
//!
//! ```text
//! seq     := list | call | expr
//! list    := '[' expr (',' expr)* ']'
//! expr    := term (('+'|'-') term)*
//! term    := factor (('*'|'/') factor)*
//! factor  := '-'? primary ('^' factor)?
//! primary := number | '(' expr ')'
//! call    := 'range' '(' start ',' stop ',' step ')'
//!          | 'logspace' '(' a ',' b ',' n ')'
//! ```
//!
//! `range` is half-open like its numpy counterpart; `logspace(a, b, n)`
//! yields `n` points from `10^a` to `10^b` inclusive. Any lexical or syntax
//! error is fatal.

use crate::error::{Result, TedbenchError};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
}

fn expr_error(message: impl Into<String>) -> TedbenchError {
    TedbenchError::Expr {
        message: message.into(),
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '^' => {
                tokens.push(Token::Caret);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // scientific notation: 1e6, 2.5e-3
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    i += 1;
                    if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| expr_error(format!("invalid number '{}' at position {}", text, start)))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(expr_error(format!(
                    "unexpected character '{}' at position {}",
                    other, i
                )))
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: Token, context: &str) -> Result<()> {
        match self.advance() {
            Some(ref t) if *t == token => Ok(()),
            Some(t) => Err(expr_error(format!(
                "expected {:?} {}, found {:?}",
                token, context, t
            ))),
            None => Err(expr_error(format!(
                "expected {:?} {}, found end of input",
                token, context
            ))),
        }
    }

    /// seq := list | expr (a single expression yields a one-element sequence)
    fn sequence(&mut self) -> Result<Vec<f64>> {
        let values = if self.peek() == Some(&Token::LBracket) {
            self.advance();
            let mut values = vec![self.expression()?];
            while self.peek() == Some(&Token::Comma) {
                self.advance();
                values.push(self.expression()?);
            }
            self.expect(Token::RBracket, "to close list")?;
            values
        } else if matches!(self.peek(), Some(Token::Ident(_))) {
            self.call()?
        } else {
            vec![self.expression()?]
        };
        if self.pos != self.tokens.len() {
            return Err(expr_error(format!(
                "trailing input after expression: {:?}",
                self.tokens[self.pos]
            )));
        }
        Ok(values)
    }

    fn call(&mut self) -> Result<Vec<f64>> {
        let name = match self.advance() {
            Some(Token::Ident(name)) => name,
            _ => return Err(expr_error("expected function name")),
        };
        self.expect(Token::LParen, "after function name")?;
        let mut args = vec![self.expression()?];
        while self.peek() == Some(&Token::Comma) {
            self.advance();
            args.push(self.expression()?);
        }
        self.expect(Token::RParen, "to close call")?;

        match name.as_str() {
            "range" => {
                if args.len() != 3 {
                    return Err(expr_error("range takes exactly (start, stop, step)"));
                }
                let (start, stop, step) = (args[0], args[1], args[2]);
                if step == 0.0 {
                    return Err(expr_error("range step must be non-zero"));
                }
                let mut values = Vec::new();
                let mut x = start;
                while (step > 0.0 && x < stop) || (step < 0.0 && x > stop) {
                    values.push(x);
                    x += step;
                }
                Ok(values)
            }
            "logspace" => {
                if args.len() != 3 {
                    return Err(expr_error("logspace takes exactly (a, b, n)"));
                }
                let (a, b, n) = (args[0], args[1], args[2]);
                if n < 1.0 || n.fract() != 0.0 {
                    return Err(expr_error("logspace point count must be a positive integer"));
                }
                let n = n as usize;
                if n == 1 {
                    return Ok(vec![10f64.powf(a)]);
                }
                Ok((0..n)
                    .map(|i| 10f64.powf(a + (b - a) * i as f64 / (n - 1) as f64))
                    .collect())
            }
            other => Err(expr_error(format!("unknown function '{}'", other))),
        }
    }

    fn expression(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64> {
        let mut value = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value *= self.factor()?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    value /= self.factor()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn factor(&mut self) -> Result<f64> {
        let negate = if self.peek() == Some(&Token::Minus) {
            self.advance();
            true
        } else {
            false
        };
        let base = self.primary()?;
        let value = if self.peek() == Some(&Token::Caret) {
            self.advance();
            base.powf(self.factor()?)
        } else {
            base
        };
        Ok(if negate { -value } else { value })
    }

    fn primary(&mut self) -> Result<f64> {
        match self.advance() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::LParen) => {
                let value = self.expression()?;
                self.expect(Token::RParen, "to close group")?;
                Ok(value)
            }
            Some(token) => Err(expr_error(format!("unexpected token {:?}", token))),
            None => Err(expr_error("unexpected end of input")),
        }
    }
}

/// Evaluate a size-sequence expression into an ordered list of counts
pub fn eval_sequence(input: &str) -> Result<Vec<f64>> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(expr_error("empty size expression"));
    }
    Parser { tokens, pos: 0 }.sequence()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_literal() {
        assert_eq!(eval_sequence("[48, 1296]").unwrap(), vec![48.0, 1296.0]);
    }

    #[test]
    fn test_arithmetic_in_list() {
        assert_eq!(
            eval_sequence("[6 * 2^3, 6 * (4 + 2)^3]").unwrap(),
            vec![48.0, 1296.0]
        );
    }

    #[test]
    fn test_single_expression() {
        assert_eq!(eval_sequence("6 * 10^3").unwrap(), vec![6000.0]);
    }

    #[test]
    fn test_scientific_notation() {
        assert_eq!(eval_sequence("[1e6, 2.5e3]").unwrap(), vec![1e6, 2500.0]);
    }

    #[test]
    fn test_range_is_half_open() {
        assert_eq!(
            eval_sequence("range(48, 200, 50)").unwrap(),
            vec![48.0, 98.0, 148.0, 198.0]
        );
    }

    #[test]
    fn test_logspace_endpoints() {
        let values = eval_sequence("logspace(2, 4, 3)").unwrap();
        assert_eq!(values.len(), 3);
        assert!((values[0] - 100.0).abs() < 1e-9);
        assert!((values[1] - 1000.0).abs() < 1e-6);
        assert!((values[2] - 10000.0).abs() < 1e-6);
    }

    #[test]
    fn test_order_preserved_not_sorted() {
        assert_eq!(
            eval_sequence("[1296, 48, 6000]").unwrap(),
            vec![1296.0, 48.0, 6000.0]
        );
    }

    #[test]
    fn test_malformed_is_fatal() {
        assert!(eval_sequence("[48,").is_err());
        assert!(eval_sequence("48 +").is_err());
        assert!(eval_sequence("import os").is_err());
        assert!(eval_sequence("range(1, 10)").is_err());
        assert!(eval_sequence("range(1, 10, 0)").is_err());
        assert!(eval_sequence("").is_err());
        assert!(eval_sequence("[48] extra").is_err());
    }

    #[test]
    fn test_negative_and_unary() {
        assert_eq!(eval_sequence("[-2 + 5]").unwrap(), vec![3.0]);
        assert_eq!(eval_sequence("[-2^2]").unwrap(), vec![-4.0]);
    }
}
