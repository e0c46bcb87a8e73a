//! Calculator tool: evaluates arithmetic expressions.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := ('-' | '+') unary | power
//! power   := atom ('**' unary)?
//! atom    := number | name | name '(' args ')' | '(' expr ')'
//! ```
//!
//! So `-2 ** 2` is `-4` and `2 ** 3 ** 2` is `512`.

use thiserror::Error;
use wayfarer_types::{ArgumentSpec, Tool, ToolArguments, ToolDefinition, ToolError, ToolFuture};

/// Evaluates `+ - * / % **`, parentheses, `pi`, `e`, and common math functions.
pub struct CalculatorTool;

#[derive(Debug, Error, PartialEq)]
enum CalcError {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected '{0}'")]
    UnexpectedToken(String),
    #[error("unknown name '{0}'")]
    UnknownName(String),
    #[error("{name}() takes {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("result is not a finite number")]
    NotFinite,
    #[error("expression nests deeper than 256 levels")]
    TooDeep,
}

/// Nesting limit for parentheses, function calls and unary signs.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>, CalcError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' => {}
            '+' => tokens.push(Token::Plus),
            '-' => tokens.push(Token::Minus),
            '*' if chars.get(i + 1) == Some(&'*') => {
                tokens.push(Token::StarStar);
                i += 1;
            }
            '*' => tokens.push(Token::Star),
            '^' => tokens.push(Token::StarStar),
            '/' => tokens.push(Token::Slash),
            '%' => tokens.push(Token::Percent),
            '(' => tokens.push(Token::LParen),
            ')' => tokens.push(Token::RParen),
            ',' => tokens.push(Token::Comma),
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                // Exponent suffix, e.g. 1.5e-3
                if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                    let mut j = i + 1;
                    if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                        j += 1;
                    }
                    if j < chars.len() && chars[j].is_ascii_digit() {
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                        i = j;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| CalcError::UnexpectedToken(text.clone()))?;
                tokens.push(Token::Num(value));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
                continue;
            }
            other => return Err(CalcError::UnexpectedChar(other)),
        }
        i += 1;
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), CalcError> {
        match self.next() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(CalcError::UnexpectedToken(format!("{t:?}"))),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.pos += 1;
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.pos += 1;
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.pos += 1;
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= rhs;
                }
                Some(Token::Percent) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    // Floored modulo: result takes the sign of the divisor
                    value -= rhs * (value / rhs).floor();
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, CalcError> {
        // Every nesting level passes through here
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(-self.unary()?)
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::StarStar) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, CalcError> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(value)
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    call_function(&name, &args)
                } else {
                    constant(&name)
                }
            }
            Some(t) => Err(CalcError::UnexpectedToken(format!("{t:?}"))),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn arguments(&mut self) -> Result<Vec<f64>, CalcError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(t) => return Err(CalcError::UnexpectedToken(format!("{t:?}"))),
                None => return Err(CalcError::UnexpectedEnd),
            }
        }
    }
}

fn constant(name: &str) -> Result<f64, CalcError> {
    match name {
        "pi" => Ok(std::f64::consts::PI),
        "e" => Ok(std::f64::consts::E),
        "tau" => Ok(std::f64::consts::TAU),
        "inf" => Ok(f64::INFINITY),
        _ => Err(CalcError::UnknownName(name.to_string())),
    }
}

fn call_function(name: &str, args: &[f64]) -> Result<f64, CalcError> {
    let unary: Option<fn(f64) -> f64> = match name {
        "sqrt" => Some(f64::sqrt),
        "abs" | "fabs" => Some(f64::abs),
        "sin" => Some(f64::sin),
        "cos" => Some(f64::cos),
        "tan" => Some(f64::tan),
        "asin" => Some(f64::asin),
        "acos" => Some(f64::acos),
        "atan" => Some(f64::atan),
        "log" | "ln" => Some(f64::ln),
        "log10" => Some(f64::log10),
        "log2" => Some(f64::log2),
        "exp" => Some(f64::exp),
        "floor" => Some(f64::floor),
        "ceil" => Some(f64::ceil),
        "round" => Some(f64::round),
        "radians" => Some(f64::to_radians),
        "degrees" => Some(f64::to_degrees),
        _ => None,
    };
    if let Some(f) = unary {
        return match args {
            [x] => Ok(f(*x)),
            _ => Err(CalcError::Arity {
                name: name.to_string(),
                expected: 1,
                got: args.len(),
            }),
        };
    }

    let binary: Option<fn(f64, f64) -> f64> = match name {
        "pow" => Some(f64::powf),
        "atan2" => Some(f64::atan2),
        "hypot" => Some(f64::hypot),
        _ => None,
    };
    match (binary, args) {
        (Some(f), [a, b]) => Ok(f(*a, *b)),
        (Some(_), _) => Err(CalcError::Arity {
            name: name.to_string(),
            expected: 2,
            got: args.len(),
        }),
        (None, _) => Err(CalcError::UnknownName(name.to_string())),
    }
}

fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let mut parser = Parser {
        tokens: tokenize(expression)?,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if let Some(extra) = parser.next() {
        return Err(CalcError::UnexpectedToken(format!("{extra:?}")));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

/// Integral results print without a fractional part.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculate"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "calculate",
            "A small calculator. Handles + - * / % ** and parentheses, the constants pi and e, \
             and math functions such as sqrt, sin, cos, ln, log10, exp, floor, ceil, round, pow.",
            vec![ArgumentSpec::required(
                "expression",
                "Arithmetic expression to evaluate, e.g. '(2 + 3) * sqrt(16)'",
            )],
        )
    }

    fn execute(&self, arguments: ToolArguments) -> ToolFuture<'_> {
        Box::pin(async move {
            let expression = match arguments.get("expression") {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(serde_json::Value::Number(n)) => n.to_string(),
                Some(other) => {
                    return Err(ToolError::InvalidInput {
                        tool: "calculate".into(),
                        message: format!("expression must be a string, got {other}"),
                    });
                }
                None => {
                    return Err(ToolError::InvalidInput {
                        tool: "calculate".into(),
                        message: "missing 'expression'".into(),
                    });
                }
            };

            evaluate(&expression).map(format_number).map_err(|e| {
                ToolError::ExecutionFailed(format!("could not evaluate '{expression}': {e}"))
            })
        })
    }
}
