//! Arithmetic evaluation
//!
//! Provides:
//! - A recursive-descent evaluator for `+ - * / % ^` and parentheses
//! - Extraction of inline expressions from free text
//! - Series helpers (percentage change, moving average)

use super::Calculator;
use crate::errors::{AppError, Result};
use async_trait::async_trait;

const OPERATORS: [char; 6] = ['+', '-', '*', '/', '%', '^'];

/// Numeric collaborator backed by a local expression parser
#[derive(Debug, Clone, Default)]
pub struct ExpressionEvaluator;

impl ExpressionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate an expression synchronously
    pub fn eval(&self, expression: &str) -> Result<f64> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(invalid("empty expression"));
        }

        let mut parser = Parser { tokens, pos: 0 };
        let value = parser.expression()?;

        if parser.pos != parser.tokens.len() {
            return Err(invalid("unexpected trailing input"));
        }
        if !value.is_finite() {
            return Err(invalid("result is not a finite number"));
        }

        Ok(value)
    }
}

#[async_trait]
impl Calculator for ExpressionEvaluator {
    async fn evaluate(&self, expression: &str) -> Result<f64> {
        self.eval(expression)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(char),
    Open,
    Close,
}

fn invalid(message: &str) -> AppError {
    AppError::InvalidFormat {
        message: format!("expression: {}", message),
    }
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expression.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '0'..='9' | '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let value = literal
                    .parse::<f64>()
                    .map_err(|_| invalid(&format!("bad number '{}'", literal)))?;
                tokens.push(Token::Number(value));
            }
            '(' => {
                tokens.push(Token::Open);
                i += 1;
            }
            ')' => {
                tokens.push(Token::Close);
                i += 1;
            }
            c if OPERATORS.contains(&c) => {
                tokens.push(Token::Op(c));
                i += 1;
            }
            other => return Err(invalid(&format!("disallowed character '{}'", other))),
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    // expression = term (('+' | '-') term)*
    fn expression(&mut self) -> Result<f64> {
        let mut value = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    // term = unary (('*' | '/' | '%') unary)*
    fn term(&mut self) -> Result<f64> {
        let mut value = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/' | '%'))) = self.peek() {
            self.pos += 1;
            let rhs = self.unary()?;
            if op != '*' && rhs == 0.0 {
                return Err(invalid("division by zero"));
            }
            value = match op {
                '*' => value * rhs,
                '/' => value / rhs,
                _ => value % rhs,
            };
        }
        Ok(value)
    }

    // unary = ('-' | '+') unary | power
    fn unary(&mut self) -> Result<f64> {
        match self.peek() {
            Some(Token::Op('-')) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Op('+')) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    // power = primary ('^' unary)?   (right associative)
    fn power(&mut self) -> Result<f64> {
        let base = self.primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<f64> {
        match self.next() {
            Some(Token::Number(value)) => Ok(value),
            Some(Token::Open) => {
                let value = self.expression()?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err(invalid("missing closing parenthesis")),
                }
            }
            Some(token) => Err(invalid(&format!("unexpected token {:?}", token))),
            None => Err(invalid("unexpected end of input")),
        }
    }
}

fn is_expression_char(c: char) -> bool {
    c.is_ascii_digit() || c.is_whitespace() || OPERATORS.contains(&c) || matches!(c, '(' | ')' | '.')
}

/// Strip surrounding whitespace and trailing sentence punctuation
pub fn clean_expression(candidate: &str) -> &str {
    candidate
        .trim()
        .trim_end_matches(['?', '!', ',', ';', ':'])
        .trim_end_matches('.')
        .trim()
}

/// Whether a fragment looks like arithmetic: at least two numbers joined by an operator
pub fn looks_like_arithmetic(fragment: &str) -> bool {
    let mut numbers = 0;
    let mut in_number = false;
    let mut operators = 0;

    for c in fragment.chars() {
        if c.is_ascii_digit() {
            if !in_number {
                numbers += 1;
                in_number = true;
            }
        } else {
            if c != '.' {
                in_number = false;
            }
            if OPERATORS.contains(&c) {
                operators += 1;
            }
        }
    }

    numbers >= 2 && operators >= 1
}

/// Dates such as `2024-01-05` are not subtraction
fn is_date_like(fragment: &str) -> bool {
    let parts: Vec<&str> = fragment.split('-').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

fn push_candidate(current: &mut String, found: &mut Vec<String>) {
    let candidate = clean_expression(current);
    // Leading operators belong to the surrounding prose
    let candidate = candidate.trim_start_matches(['+', '*', '/', '%', '^']).trim();
    if looks_like_arithmetic(candidate)
        && !is_date_like(candidate)
        && !found.iter().any(|f| f == candidate)
    {
        found.push(candidate.to_string());
    }
    current.clear();
}

/// Find inline arithmetic expressions in free text, in order of appearance
pub fn extract_expressions(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in text.chars() {
        if is_expression_char(c) {
            current.push(c);
        } else {
            push_candidate(&mut current, &mut found);
        }
    }
    push_candidate(&mut current, &mut found);

    found
}

/// Period-over-period change in percent; a zero base yields infinity
pub fn percentage_change(values: &[f64]) -> Result<Vec<f64>> {
    if values.len() < 2 {
        return Err(invalid("need at least 2 values for percentage change"));
    }

    Ok(values
        .windows(2)
        .map(|pair| {
            if pair[0] == 0.0 {
                f64::INFINITY
            } else {
                (pair[1] - pair[0]) / pair[0] * 100.0
            }
        })
        .collect())
}

/// Simple moving average over a fixed window
pub fn moving_average(values: &[f64], window: usize) -> Result<Vec<f64>> {
    if window == 0 {
        return Err(invalid("moving average window must be positive"));
    }
    if values.len() < window {
        return Err(invalid(&format!(
            "need at least {} values for moving average",
            window
        )));
    }

    Ok(values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_precedence() {
        let calc = ExpressionEvaluator::new();
        assert_eq!(calc.eval("25 * 4 + 10").unwrap(), 110.0);
        assert_eq!(calc.eval("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(calc.eval("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(calc.eval("10 % 4").unwrap(), 2.0);
    }

    #[test]
    fn test_power_and_unary_minus() {
        let calc = ExpressionEvaluator::new();
        assert_eq!(calc.eval("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(calc.eval("-2 ^ 2").unwrap(), -4.0);
        assert_eq!(calc.eval("-(3 - 5)").unwrap(), 2.0);
        assert_eq!(calc.eval("1.5 * 2").unwrap(), 3.0);
    }

    #[test]
    fn test_rejects_bad_input() {
        let calc = ExpressionEvaluator::new();
        assert!(calc.eval("").is_err());
        assert!(calc.eval("2 +").is_err());
        assert!(calc.eval("(2 + 3").is_err());
        assert!(calc.eval("4 / 0").is_err());
        assert!(calc.eval("import os").is_err());
        assert!(calc.eval("2 3").is_err());
    }

    #[test]
    fn test_async_evaluate() {
        let calc = ExpressionEvaluator::new();
        let value = tokio_test::block_on(calc.evaluate("7 * 6")).unwrap();
        assert_eq!(value, 42.0);
    }

    #[test]
    fn test_extract_expressions() {
        assert_eq!(extract_expressions("What is 25 * 4 + 10?"), vec!["25 * 4 + 10"]);
        assert_eq!(
            extract_expressions("add (1 + 2) * 3 and then 8 / 2."),
            vec!["(1 + 2) * 3", "8 / 2"]
        );
        assert!(extract_expressions("The year 2024 was good").is_empty());
        assert!(extract_expressions("covid-19 cases").is_empty());
        assert!(extract_expressions("prices on 2024-01-05").is_empty());
    }

    #[test]
    fn test_clean_expression() {
        assert_eq!(clean_expression(" 3 + 4?  "), "3 + 4");
        assert_eq!(clean_expression("3 + 4."), "3 + 4");
    }

    #[test]
    fn test_percentage_change() {
        let changes = percentage_change(&[100.0, 110.0, 99.0]).unwrap();
        assert_eq!(changes.len(), 2);
        assert!((changes[0] - 10.0).abs() < 1e-9);
        assert!((changes[1] + 10.0).abs() < 1e-9);
        assert!(percentage_change(&[1.0]).is_err());
        assert!(percentage_change(&[0.0, 1.0]).unwrap()[0].is_infinite());
    }

    #[test]
    fn test_moving_average() {
        let ma = moving_average(&[1.0, 2.0, 3.0, 4.0, 5.0], 3).unwrap();
        assert_eq!(ma, vec![2.0, 3.0, 4.0]);
        assert!(moving_average(&[1.0, 2.0], 3).is_err());
        assert!(moving_average(&[1.0], 0).is_err());
    }
}
