//! Calculator tool: evaluates arithmetic expressions.
//!
//! Grammar (usual precedence, `^` binds tightest and is right-associative):
//!
//! ```text
//! sum     = product (('+' | '-') product)*
//! product = power (('*' | '/' | '%') power)*
//! power   = unary ('^' power)?
//! unary   = '-' unary | atom
//! atom    = NUMBER | '(' sum ')'
//! ```

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::iter::Peekable;
use std::str::CharIndices;
use stepwise_core::{Tool, ToolContext, ToolError, parse_arguments};
use tracing::debug;

/// Deepest allowed nesting of parentheses, unary minus and `^` chains.
const MAX_DEPTH: usize = 256;

pub struct CalculatorTool;

#[derive(Deserialize)]
struct CalculatorArgs {
    expression: String,
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Evaluate an arithmetic expression. Supports + - * / % ^, parentheses and decimals."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "description": "The expression to evaluate, e.g. '(2 + 3) * 4'"
                }
            },
            "required": ["expression"]
        })
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _ctx: &ToolContext,
    ) -> Result<Value, ToolError> {
        let args: CalculatorArgs = parse_arguments(self.name(), arguments)?;
        let value = evaluate(&args.expression).map_err(|e| ToolError::failed(self.name(), e))?;
        debug!(expression = %args.expression, value, "Evaluated expression");
        Ok(Value::String(format_number(value)))
    }
}

/// Integers without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let mut eval = Evaluator {
        src: expr,
        chars: expr.char_indices().peekable(),
        depth: 0,
    };
    let value = eval.sum()?;
    eval.skip_ws();
    if let Some(&(pos, c)) = eval.chars.peek() {
        return Err(format!("Unexpected '{c}' at offset {pos}"));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(value)
}

struct Evaluator<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
    depth: usize,
}

impl Evaluator<'_> {
    fn descend(&mut self) -> Result<(), String> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err("Expression nested too deeply".into());
        }
        Ok(())
    }

    fn skip_ws(&mut self) {
        while self.chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
    }

    /// Consume `expected` if it is the next non-space char.
    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        self.chars.next_if(|&(_, c)| c == expected).is_some()
    }

    fn sum(&mut self) -> Result<f64, String> {
        let mut acc = self.product()?;
        loop {
            if self.eat('+') {
                acc += self.product()?;
            } else if self.eat('-') {
                acc -= self.product()?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn product(&mut self) -> Result<f64, String> {
        let mut acc = self.power()?;
        loop {
            if self.eat('*') {
                acc *= self.power()?;
            } else if self.eat('/') {
                let divisor = self.power()?;
                if divisor == 0.0 {
                    return Err("Division by zero".into());
                }
                acc /= divisor;
            } else if self.eat('%') {
                let divisor = self.power()?;
                if divisor == 0.0 {
                    return Err("Modulo by zero".into());
                }
                acc %= divisor;
            } else {
                return Ok(acc);
            }
        }
    }

    fn power(&mut self) -> Result<f64, String> {
        let base = self.unary()?;
        if self.eat('^') {
            self.descend()?;
            let exponent = self.power()?;
            self.depth -= 1;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, String> {
        if self.eat('-') {
            self.descend()?;
            let value = -self.unary()?;
            self.depth -= 1;
            return Ok(value);
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<f64, String> {
        if self.eat('(') {
            self.descend()?;
            let inner = self.sum()?;
            if !self.eat(')') {
                return Err("Expected closing parenthesis".into());
            }
            self.depth -= 1;
            return Ok(inner);
        }

        self.skip_ws();
        let start = match self.chars.peek() {
            Some(&(pos, c)) if c.is_ascii_digit() || c == '.' => pos,
            Some(&(pos, c)) => return Err(format!("Unexpected '{c}' at offset {pos}")),
            None => return Err("Unexpected end of expression".into()),
        };
        let mut end = start;
        while let Some((pos, c)) = self.chars.next_if(|(_, c)| c.is_ascii_digit() || *c == '.') {
            end = pos + c.len_utf8();
        }
        let literal = &self.src[start..end];
        literal
            .parse()
            .map_err(|_| format!("Invalid number: {literal}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(evaluate("2 + 3 * 4").unwrap(), 14.0);
        assert_eq!(evaluate("(2 + 3) * 4").unwrap(), 20.0);
        assert_eq!(evaluate("((1 + 2) * (3 + 4))").unwrap(), 21.0);
        assert_eq!(evaluate("10 - 4 - 3").unwrap(), 3.0);
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(evaluate("2 ^ 3 ^ 2").unwrap(), 512.0);
        assert_eq!(evaluate("-2 ^ 2").unwrap(), 4.0);
    }

    #[test]
    fn modulo_and_decimals() {
        assert_eq!(evaluate("17 % 5").unwrap(), 2.0);
        assert_eq!(evaluate("10 / 4").unwrap(), 2.5);
        assert!((evaluate("3.14 * 2").unwrap() - 6.28).abs() < 1e-12);
    }

    #[test]
    fn errors() {
        assert!(evaluate("1 / 0").unwrap_err().contains("Division by zero"));
        assert!(evaluate("2 +").is_err());
        assert!(evaluate("").is_err());
        assert!(evaluate("(1 + 2").unwrap_err().contains("parenthesis"));
        assert!(evaluate("1.2.3").unwrap_err().contains("Invalid number"));
        assert!(evaluate("2 x 3").unwrap_err().contains("'x'"));
    }

    #[test]
    fn nesting_is_bounded() {
        let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(evaluate(&nested(MAX_DEPTH)).unwrap(), 1.0);
        assert_eq!(evaluate(&nested(MAX_DEPTH + 1)).unwrap_err(), "Expression nested too deeply");
        assert!(evaluate(&format!("{}1", "-".repeat(50_000))).is_err());
        assert!(evaluate(&format!("2{}", "^2".repeat(50_000))).is_err());
        assert_eq!(evaluate(&format!("{}1", "-".repeat(MAX_DEPTH))).unwrap(), 1.0);
    }

    async fn run(arguments: Value) -> Result<Value, ToolError> {
        let Value::Object(map) = arguments else { unreachable!() };
        CalculatorTool.execute(map, &ToolContext::new()).await
    }

    #[tokio::test]
    async fn tool_formats_numbers() {
        assert_eq!(run(json!({"expression": "2 + 3"})).await.unwrap(), json!("5"));
        assert_eq!(run(json!({"expression": "10 / 2"})).await.unwrap(), json!("5"));
        let third = run(json!({"expression": "10 / 3"})).await.unwrap();
        assert!(third.as_str().unwrap().starts_with("3.333"));
    }

    #[tokio::test]
    async fn tool_errors_are_typed() {
        let missing = run(json!({})).await.unwrap_err();
        assert!(matches!(missing, ToolError::InvalidArguments { .. }));

        let zero = run(json!({"expression": "1 / 0"})).await.unwrap_err();
        assert!(matches!(zero, ToolError::ExecutionFailed { .. }));
        assert!(zero.to_string().contains("Division by zero"));

        let deep = "(".repeat(10_000) + "1" + &")".repeat(10_000);
        let err = run(json!({"expression": deep})).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("nested too deeply"));
    }

    #[test]
    fn tool_descriptor() {
        assert_eq!(CalculatorTool.to_descriptor().name, "calculator");
    }
}
