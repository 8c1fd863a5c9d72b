//! Threshold expressions applied to a query's numeric result.
//!
//! The grammar is deliberately tiny: `result <op> <number>`, where `op` is
//! one of `>`, `>=`, `<`, `<=`, `==`, `!=`. Expressions are parsed when the
//! configuration is loaded so a bad expression never reaches the poller.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Comparison operator in an [`Expression`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    fn symbol(self) -> &'static str {
        match self {
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }
}

/// A parsed `result <op> <threshold>` expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expression {
    op: Comparison,
    threshold: f64,
}

impl Expression {
    pub fn new(op: Comparison, threshold: f64) -> Self {
        Self { op, threshold }
    }

    /// Evaluate the expression against a query result.
    ///
    /// NaN never satisfies any comparison except `!=`.
    pub fn evaluate(&self, result: f64) -> bool {
        match self.op {
            Comparison::Gt => result > self.threshold,
            Comparison::Ge => result >= self.threshold,
            Comparison::Lt => result < self.threshold,
            Comparison::Le => result <= self.threshold,
            Comparison::Eq => result == self.threshold,
            Comparison::Ne => result != self.threshold,
        }
    }

    pub fn op(&self) -> Comparison {
        self.op
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl FromStr for Expression {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason: &str| ConfigError::Expression {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let rest = s
            .trim()
            .strip_prefix("result")
            .ok_or_else(|| err("must start with `result`"))?
            .trim_start();

        // Two-character operators first so `>=` is not read as `>`.
        let (op, rest) = [
            (">=", Comparison::Ge),
            ("<=", Comparison::Le),
            ("==", Comparison::Eq),
            ("!=", Comparison::Ne),
            (">", Comparison::Gt),
            ("<", Comparison::Lt),
        ]
        .iter()
        .find_map(|(sym, op)| rest.strip_prefix(sym).map(|r| (*op, r)))
        .ok_or_else(|| err("expected one of > >= < <= == !="))?;

        let threshold = rest
            .trim()
            .parse::<f64>()
            .map_err(|_| err("threshold is not a number"))?;

        Ok(Self { op, threshold })
    }
}

impl TryFrom<String> for Expression {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Expression> for String {
    fn from(expr: Expression) -> Self {
        expr.to_string()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "result {} {}", self.op.symbol(), self.threshold)
    }
}
