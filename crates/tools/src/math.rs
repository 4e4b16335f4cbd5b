//! Math tool: evaluates arithmetic expressions.
//!
//! Input is first normalised (whitespace removed, lowercased) and checked
//! against an allow-list of arithmetic characters with balanced parentheses.
//! The accepted language is JavaScript arithmetic over numeric literals,
//! extended with two shorthands: `^` for exponentiation and `N%` for `N/100`.
//! Evaluation uses a recursive-descent parser; nothing is ever executed as
//! code.

use async_trait::async_trait;
use ragent_core::tool::{Plugin, ToolCallResult, ToolDefinition, ToolKind};
use tracing::debug;

use crate::json_number;

/// Failure text for expressions rejected before evaluation.
pub const INVALID_EXPRESSION: &str = "Expression contains invalid characters or syntax";
/// Failure text for expressions that could not be evaluated.
pub const CALCULATION_ERROR: &str = "Calculation error";

const ALLOWED: &str = "0123456789+-*/().%^";

/// Deepest nesting of parentheses, exponents and signs the parser accepts.
pub const MAX_NESTING: usize = 256;

/// Why an expression was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MathError {
    #[error("expression is empty")]
    Empty,

    #[error("disallowed character {0:?}")]
    DisallowedCharacter(char),

    #[error("unbalanced parentheses")]
    UnbalancedParentheses,

    #[error("cannot evaluate expression: {0}")]
    Calculation(String),
}

impl MathError {
    /// Validation failures are reported differently from evaluation failures.
    pub fn is_validation(&self) -> bool {
        !matches!(self, MathError::Calculation(_))
    }
}

pub struct MathPlugin;

#[async_trait]
impl Plugin for MathPlugin {
    fn kind(&self) -> ToolKind {
        ToolKind::Math
    }

    fn tool_details(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: "Perform mathematical calculations".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Mathematical expression to evaluate"
                    }
                },
                "required": ["expression"]
            }),
        }
    }

    async fn execute(&self, input: serde_json::Value) -> ToolCallResult {
        let Some(expression) = input.get("expression").and_then(|v| v.as_str()) else {
            return ToolCallResult::failure(
                self.name(),
                input.clone(),
                "invalid input: missing 'expression' string",
            );
        };

        match evaluate(expression) {
            Ok(value) => ToolCallResult::success(self.name(), input.clone(), json_number(value)),
            Err(e) => {
                debug!(expression, error = %e, "Math expression rejected");
                let reason = if e.is_validation() {
                    INVALID_EXPRESSION
                } else {
                    CALCULATION_ERROR
                };
                ToolCallResult::failure(self.name(), input.clone(), reason)
            }
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────

fn sanitize(expression: &str) -> String {
    expression
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

fn validate(expression: &str) -> Result<(), MathError> {
    if expression.is_empty() {
        return Err(MathError::Empty);
    }
    if let Some(c) = expression.chars().find(|c| !ALLOWED.contains(*c)) {
        return Err(MathError::DisallowedCharacter(c));
    }

    let mut depth: i32 = 0;
    let mut deepest: i32 = 0;
    for c in expression.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            _ => {}
        }
        if depth < 0 {
            return Err(MathError::UnbalancedParentheses);
        }
        deepest = deepest.max(depth);
    }
    if depth != 0 {
        return Err(MathError::UnbalancedParentheses);
    }
    if deepest as usize > MAX_NESTING {
        return Err(too_deep());
    }
    Ok(())
}

// ── Evaluation ────────────────────────────────────────────────────────────

/// Validate and evaluate an expression, rounded to 6 decimal places.
pub fn evaluate(expression: &str) -> Result<f64, MathError> {
    let sanitized = sanitize(expression);
    validate(&sanitized)?;

    let tokens = tokenize(&sanitized)?;
    let mut parser = Parser::new(&tokens);
    let value = parser.parse_expr()?;
    if let Some(tok) = parser.peek() {
        return Err(MathError::Calculation(format!(
            "unexpected token {tok:?} at position {}",
            parser.pos
        )));
    }

    if !value.is_finite() {
        return Err(MathError::Calculation("result is not a finite number".into()));
    }

    let rounded = js_round(value * 1e6) / 1e6;
    if !rounded.is_finite() {
        return Err(MathError::Calculation("result is not a finite number".into()));
    }
    // Normalise -0 to 0.
    Ok(if rounded == 0.0 { 0.0 } else { rounded })
}

/// Half-up rounding to the nearest integer.
pub(crate) fn js_round(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn js_pow(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    /// Binary remainder (a `%` that does not directly follow a number).
    Percent,
    Pow,
    LParen,
    RParen,
}

fn tokenize(input: &str) -> Result<Vec<Token>, MathError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        match chars[i] {
            // `++` and `--` are increment/decrement, never valid on literals.
            '+' | '-' if next == Some(chars[i]) => {
                return Err(MathError::Calculation(format!(
                    "invalid operator '{0}{0}'",
                    chars[i]
                )));
            }
            '+' => { tokens.push(Token::Plus); i += 1; }
            '-' => { tokens.push(Token::Minus); i += 1; }
            '*' if next == Some('*') => { tokens.push(Token::Pow); i += 2; }
            '*' => { tokens.push(Token::Star); i += 1; }
            '^' => { tokens.push(Token::Pow); i += 1; }
            '/' => { tokens.push(Token::Slash); i += 1; }
            '%' => { tokens.push(Token::Percent); i += 1; }
            '(' => { tokens.push(Token::LParen); i += 1; }
            ')' => { tokens.push(Token::RParen); i += 1; }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let mut value: f64 = literal
                    .parse()
                    .map_err(|_| MathError::Calculation(format!("invalid number {literal:?}")))?;

                // `N%` means N/100 when N is a complete decimal literal.
                // A trailing-dot literal ("1.") leaves `%` as remainder.
                if chars.get(i) == Some(&'%') {
                    if literal.starts_with('.') {
                        return Err(MathError::Calculation(format!(
                            "cannot apply percent to {literal:?}"
                        )));
                    }
                    if !literal.ends_with('.') {
                        value /= 100.0;
                        i += 1;
                    }
                }
                tokens.push(Token::Number(value));
            }
            c => return Err(MathError::DisallowedCharacter(c)),
        }
    }

    Ok(tokens)
}

fn too_deep() -> MathError {
    MathError::Calculation(format!("expression nested deeper than {MAX_NESTING} levels"))
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Run one recursive step, refusing to go past `MAX_NESTING`.
    fn nested(
        &mut self,
        step: impl FnOnce(&mut Self) -> Result<f64, MathError>,
    ) -> Result<f64, MathError> {
        if self.depth >= MAX_NESTING {
            return Err(too_deep());
        }
        self.depth += 1;
        let result = step(self);
        self.depth -= 1;
        result
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn consume(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    // expr = term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<f64, MathError> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Plus => {
                    self.consume();
                    left += self.parse_term()?;
                }
                Token::Minus => {
                    self.consume();
                    left -= self.parse_term()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term = power (('*' | '/' | '%') power)*
    fn parse_term(&mut self) -> Result<f64, MathError> {
        let mut left = self.parse_power()?;
        while let Some(op) = self.peek() {
            match op {
                Token::Star => {
                    self.consume();
                    left *= self.parse_power()?;
                }
                Token::Slash => {
                    self.consume();
                    left /= self.parse_power()?;
                }
                Token::Percent => {
                    self.consume();
                    left %= self.parse_power()?;
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // power = unary | primary ('^' power)?
    //
    // Right-associative. A signed operand cannot be the base of `^`
    // without parentheses: `-2^2` is rejected, `(-2)^2` and `2^-2` are not.
    fn parse_power(&mut self) -> Result<f64, MathError> {
        if matches!(self.peek(), Some(Token::Plus | Token::Minus)) {
            let value = self.parse_unary()?;
            if let Some(Token::Pow) = self.peek() {
                return Err(MathError::Calculation(
                    "unary operator before exponent needs parentheses".into(),
                ));
            }
            return Ok(value);
        }

        let base = self.parse_primary()?;
        if let Some(Token::Pow) = self.peek() {
            self.consume();
            let exponent = self.nested(Self::parse_power)?;
            return Ok(js_pow(base, exponent));
        }
        Ok(base)
    }

    // unary = ('-' | '+') (unary | primary)
    fn parse_unary(&mut self) -> Result<f64, MathError> {
        let negate = matches!(self.consume(), Some(Token::Minus));
        let value = if matches!(self.peek(), Some(Token::Plus | Token::Minus)) {
            self.nested(Self::parse_unary)?
        } else {
            self.parse_primary()?
        };
        Ok(if negate { -value } else { value })
    }

    // primary = NUMBER | '(' expr ')'
    fn parse_primary(&mut self) -> Result<f64, MathError> {
        match self.consume() {
            Some(Token::Number(n)) => Ok(*n),
            Some(Token::LParen) => {
                let val = self.nested(Self::parse_expr)?;
                match self.consume() {
                    Some(Token::RParen) => Ok(val),
                    _ => Err(MathError::Calculation("expected closing parenthesis".into())),
                }
            }
            Some(tok) => Err(MathError::Calculation(format!("unexpected token {tok:?}"))),
            None => Err(MathError::Calculation("unexpected end of expression".into())),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────
