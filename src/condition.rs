//! Conditions attached to schema fields and validation rules.
//!
//! The grammar is deliberately small: comparisons of a named field against an
//! integer or boolean literal, joined by `&&` and `||` (`&&` binds tighter).
//!
//! ```text
//! expr    := and ( "||" and )*
//! and     := cmp ( "&&" cmp )*
//! cmp     := ident ( "==" | "!=" ) literal
//! literal := integer | "true" | "false"
//! ```
//!
//! The parser is total: anything outside the grammar yields a condition that
//! evaluates to `false` and logs one warning when first evaluated. Unknown
//! field names also evaluate to `false`.

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Cmp { field: String, op: CmpOp, value: i64 },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

/// A parsed condition. Keeps the source text for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    raw: String,
    expr: Option<Expr>,
}

impl Condition {
    /// Parses a condition. Never fails; malformed input produces a condition
    /// that evaluates to `false`.
    pub fn parse(source: &str) -> Self {
        Condition {
            raw: source.to_string(),
            expr: parse_or(source.trim()),
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// True when the source matched the grammar.
    pub fn is_well_formed(&self) -> bool {
        self.expr.is_some()
    }

    /// Every field name the condition references, for schema validation.
    pub fn field_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if let Some(expr) = &self.expr {
            collect_names(expr, &mut names);
        }
        names
    }

    /// Evaluates against a field lookup. Missing fields and malformed
    /// conditions are `false`.
    pub fn evaluate<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<i64>,
    {
        match &self.expr {
            Some(expr) => eval(expr, &lookup),
            None => {
                warn!(condition = %self.raw, "unparseable condition evaluates to false");
                false
            }
        }
    }
}

fn collect_names<'a>(expr: &'a Expr, out: &mut Vec<&'a str>) {
    match expr {
        Expr::Cmp { field, .. } => out.push(field),
        Expr::And(a, b) | Expr::Or(a, b) => {
            collect_names(a, out);
            collect_names(b, out);
        }
    }
}

fn eval<F>(expr: &Expr, lookup: &F) -> bool
where
    F: Fn(&str) -> Option<i64>,
{
    match expr {
        Expr::Cmp { field, op, value } => match lookup(field) {
            Some(actual) => match op {
                CmpOp::Eq => actual == *value,
                CmpOp::Ne => actual != *value,
            },
            None => false,
        },
        Expr::And(a, b) => eval(a, lookup) && eval(b, lookup),
        Expr::Or(a, b) => eval(a, lookup) || eval(b, lookup),
    }
}

fn parse_or(s: &str) -> Option<Expr> {
    let mut terms = s.split("||");
    let mut expr = parse_and(terms.next()?)?;
    for term in terms {
        expr = Expr::Or(Box::new(expr), Box::new(parse_and(term)?));
    }
    Some(expr)
}

fn parse_and(s: &str) -> Option<Expr> {
    let mut terms = s.split("&&");
    let mut expr = parse_cmp(terms.next()?)?;
    for term in terms {
        expr = Expr::And(Box::new(expr), Box::new(parse_cmp(term)?));
    }
    Some(expr)
}

fn parse_cmp(s: &str) -> Option<Expr> {
    let s = s.trim();
    let (field, op, rest) = if let Some((lhs, rhs)) = s.split_once("==") {
        (lhs, CmpOp::Eq, rhs)
    } else if let Some((lhs, rhs)) = s.split_once("!=") {
        (lhs, CmpOp::Ne, rhs)
    } else {
        return None;
    };
    let field = field.trim();
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/') {
        return None;
    }
    let value = parse_literal(rest.trim())?;
    Some(Expr::Cmp {
        field: field.to_string(),
        op,
        value,
    })
}

fn parse_literal(s: &str) -> Option<i64> {
    match s {
        "true" => Some(1),
        "false" => Some(0),
        _ => s.parse::<i64>().ok(),
    }
}
