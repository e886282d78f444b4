//! # **Expression Parser** - *The numeric expression dialect*
//!
//! Hand-rolled lexer and recursive-descent parser for the expression
//! dialect the evaluator accepts: numeric literals, `True`/`False`,
//! identifiers, arithmetic (`+ - * / % **`), comparisons, boolean/bitwise
//! `& | ~`, parentheses, and calls of the built-in function set.
//!
//! Operator precedence follows Python, which is why boolean filters are
//! written `(a > 1) & (b < 2)`: `&` binds tighter than comparisons, and
//! chained comparisons are rejected outright.
//!
//! Reduction functions (`sum`, `mean`, ...) are recognized so they can be
//! refused with a precise error instead of an unknown-name fallback.

use crate::enums::error::ColzipError;

/// Unary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    /// `~`: logical not on booleans, bitwise not on integers.
    Not,
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    /// `&`: logical and on booleans, bitwise and on integers.
    And,
    /// `|`: logical or on booleans, bitwise or on integers.
    Or,
}

/// Built-in functions of the native backend (the host backend evaluates
/// the same set, so expressions stay portable between the two).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Sqrt,
    Abs,
    Exp,
    Log,
    Log10,
    Floor,
    Ceil,
    Where,
}

impl Func {
    fn from_name(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "sqrt" => Func::Sqrt,
            "abs" => Func::Abs,
            "exp" => Func::Exp,
            "log" => Func::Log,
            "log10" => Func::Log10,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "where" => Func::Where,
            _ => return None,
        })
    }

    /// Expected argument count.
    pub fn arity(&self) -> usize {
        match self {
            Func::Where => 3,
            _ => 1,
        }
    }
}

/// Names of the built-in functions, used to prune identifier resolution.
pub const FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "sqrt", "abs", "exp", "log", "log10", "floor", "ceil", "where",
];

/// Reduction names the block evaluator cannot honor.
const REDUCTIONS: &[&str] = &["sum", "mean", "prod", "min", "max"];

/// Parsed expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Var(String),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

/// Free identifiers of `expr` in first-appearance order, deduplicated.
/// Built-in function names never appear: calls carry a resolved [`Func`].
pub fn free_vars(expr: &Expr) -> Vec<String> {
    fn walk(e: &Expr, out: &mut Vec<String>) {
        match e {
            Expr::Var(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Expr::Unary(_, inner) => walk(inner, out),
            Expr::Binary(_, l, r) => {
                walk(l, out);
                walk(r, out);
            }
            Expr::Call(_, args) => {
                for a in args {
                    walk(a, out);
                }
            }
            Expr::Int(_) | Expr::Float(_) | Expr::Bool(_) => {}
        }
    }
    let mut out = Vec::new();
    walk(expr, &mut out);
    out
}

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Num(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

fn lex(src: &str) -> Result<Vec<Tok>, ColzipError> {
    let bytes = src.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            ')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            ',' => {
                toks.push(Tok::Comma);
                i += 1;
            }
            '0'..='9' | '.' => {
                let start = i;
                while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'.' {
                    i += 1;
                    while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                        i += 1;
                    }
                }
                if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
                    let mut j = i + 1;
                    if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                        j += 1;
                    }
                    if j < bytes.len() && (bytes[j] as char).is_ascii_digit() {
                        i = j;
                        while i < bytes.len() && (bytes[i] as char).is_ascii_digit() {
                            i += 1;
                        }
                    }
                }
                let text = &src[start..i];
                if text == "." {
                    return Err(ColzipError::InvalidExpression(
                        "stray '.' in expression".into(),
                    ));
                }
                toks.push(Tok::Num(text.to_string()));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                toks.push(Tok::Ident(src[start..i].to_string()));
            }
            '*' => {
                if bytes.get(i + 1) == Some(&b'*') {
                    toks.push(Tok::Op("**"));
                    i += 2;
                } else {
                    toks.push(Tok::Op("*"));
                    i += 1;
                }
            }
            '<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push(Tok::Op("<="));
                    i += 2;
                } else {
                    toks.push(Tok::Op("<"));
                    i += 1;
                }
            }
            '>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push(Tok::Op(">="));
                    i += 2;
                } else {
                    toks.push(Tok::Op(">"));
                    i += 1;
                }
            }
            '=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push(Tok::Op("=="));
                    i += 2;
                } else {
                    return Err(ColzipError::InvalidExpression(
                        "assignment '=' is not an expression operator".into(),
                    ));
                }
            }
            '!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    toks.push(Tok::Op("!="));
                    i += 2;
                } else {
                    return Err(ColzipError::InvalidExpression(
                        "unexpected '!' (use '~' for not)".into(),
                    ));
                }
            }
            '+' | '-' | '/' | '%' | '&' | '|' | '~' => {
                let op = match c {
                    '+' => "+",
                    '-' => "-",
                    '/' => "/",
                    '%' => "%",
                    '&' => "&",
                    '|' => "|",
                    _ => "~",
                };
                toks.push(Tok::Op(op));
                i += 1;
            }
            other => {
                return Err(ColzipError::InvalidExpression(format!(
                    "unexpected character '{}'",
                    other
                )));
            }
        }
    }
    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn eat_op(&mut self, op: &str) -> bool {
        if matches!(self.peek(), Some(Tok::Op(o)) if *o == op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok, what: &str) -> Result<(), ColzipError> {
        if self.peek() == Some(tok) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ColzipError::InvalidExpression(format!(
                "expected {}, found {:?}",
                what,
                self.peek()
            )))
        }
    }

    // Precedence, low to high: comparisons, |, &, + -, * / %, unary - ~, **.

    fn parse_cmp(&mut self) -> Result<Expr, ColzipError> {
        let lhs = self.parse_or()?;
        let op = match self.peek() {
            Some(Tok::Op("<")) => Some(BinOp::Lt),
            Some(Tok::Op("<=")) => Some(BinOp::Le),
            Some(Tok::Op(">")) => Some(BinOp::Gt),
            Some(Tok::Op(">=")) => Some(BinOp::Ge),
            Some(Tok::Op("==")) => Some(BinOp::Eq),
            Some(Tok::Op("!=")) => Some(BinOp::Ne),
            _ => None,
        };
        let Some(op) = op else { return Ok(lhs) };
        self.pos += 1;
        let rhs = self.parse_or()?;
        if matches!(
            self.peek(),
            Some(Tok::Op("<" | "<=" | ">" | ">=" | "==" | "!="))
        ) {
            return Err(ColzipError::InvalidExpression(
                "chained comparisons are not supported; parenthesize".into(),
            ));
        }
        Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_or(&mut self) -> Result<Expr, ColzipError> {
        let mut lhs = self.parse_and()?;
        while self.eat_op("|") {
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ColzipError> {
        let mut lhs = self.parse_add()?;
        while self.eat_op("&") {
            let rhs = self.parse_add()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_add(&mut self) -> Result<Expr, ColzipError> {
        let mut lhs = self.parse_mul()?;
        loop {
            if self.eat_op("+") {
                let rhs = self.parse_mul()?;
                lhs = Expr::Binary(BinOp::Add, Box::new(lhs), Box::new(rhs));
            } else if self.eat_op("-") {
                let rhs = self.parse_mul()?;
                lhs = Expr::Binary(BinOp::Sub, Box::new(lhs), Box::new(rhs));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_mul(&mut self) -> Result<Expr, ColzipError> {
        let mut lhs = self.parse_unary()?;
        loop {
            if self.eat_op("*") {
                let rhs = self.parse_unary()?;
                lhs = Expr::Binary(BinOp::Mul, Box::new(lhs), Box::new(rhs));
            } else if self.eat_op("/") {
                let rhs = self.parse_unary()?;
                lhs = Expr::Binary(BinOp::Div, Box::new(lhs), Box::new(rhs));
            } else if self.eat_op("%") {
                let rhs = self.parse_unary()?;
                lhs = Expr::Binary(BinOp::Mod, Box::new(lhs), Box::new(rhs));
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ColzipError> {
        if self.eat_op("-") {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnOp::Neg, Box::new(inner)));
        }
        if self.eat_op("~") {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(UnOp::Not, Box::new(inner)));
        }
        self.parse_pow()
    }

    fn parse_pow(&mut self) -> Result<Expr, ColzipError> {
        let base = self.parse_atom()?;
        if self.eat_op("**") {
            // Right associative; the exponent may carry its own unary sign.
            let exp = self.parse_unary()?;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn parse_atom(&mut self) -> Result<Expr, ColzipError> {
        match self.peek().cloned() {
            Some(Tok::Num(text)) => {
                self.pos += 1;
                if !text.contains(['.', 'e', 'E']) {
                    if let Ok(v) = text.parse::<i64>() {
                        return Ok(Expr::Int(v));
                    }
                }
                text.parse::<f64>().map(Expr::Float).map_err(|_| {
                    ColzipError::InvalidExpression(format!("bad numeric literal '{}'", text))
                })
            }
            Some(Tok::Ident(name)) => {
                self.pos += 1;
                match name.as_str() {
                    "True" => return Ok(Expr::Bool(true)),
                    "False" => return Ok(Expr::Bool(false)),
                    "None" => {
                        return Err(ColzipError::InvalidExpression(
                            "None is not supported in expressions".into(),
                        ));
                    }
                    _ => {}
                }
                if self.peek() == Some(&Tok::LParen) {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&Tok::RParen) {
                        loop {
                            args.push(self.parse_cmp()?);
                            if !matches!(self.peek(), Some(Tok::Comma)) {
                                break;
                            }
                            self.pos += 1;
                        }
                    }
                    self.expect(&Tok::RParen, "')'")?;
                    if REDUCTIONS.contains(&name.as_str()) {
                        return Err(ColzipError::ReductionNotSupported(format!(
                            "'{}' collapses its operand rank",
                            name
                        )));
                    }
                    let Some(func) = Func::from_name(&name) else {
                        return Err(ColzipError::InvalidExpression(format!(
                            "unknown function '{}'",
                            name
                        )));
                    };
                    if args.len() != func.arity() {
                        return Err(ColzipError::InvalidExpression(format!(
                            "'{}' takes {} argument(s), got {}",
                            name,
                            func.arity(),
                            args.len()
                        )));
                    }
                    return Ok(Expr::Call(func, args));
                }
                Ok(Expr::Var(name))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.parse_cmp()?;
                self.expect(&Tok::RParen, "')'")?;
                Ok(inner)
            }
            other => Err(ColzipError::InvalidExpression(format!(
                "expected a value, found {:?}",
                other
            ))),
        }
    }
}

/// Parses an expression in the supported dialect.
pub fn parse(src: &str) -> Result<Expr, ColzipError> {
    let toks = lex(src)?;
    let mut parser = Parser { toks, pos: 0 };
    let expr = parser.parse_cmp()?;
    if parser.pos != parser.toks.len() {
        return Err(ColzipError::InvalidExpression(format!(
            "trailing input at token {:?}",
            parser.peek()
        )));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(parse("42").unwrap(), Expr::Int(42));
        assert_eq!(parse(".25").unwrap(), Expr::Float(0.25));
        assert_eq!(parse("1e3").unwrap(), Expr::Float(1000.0));
        assert_eq!(parse("True").unwrap(), Expr::Bool(true));
        assert!(parse("None").is_err());
    }

    #[test]
    fn test_precedence() {
        // * binds tighter than +
        let e = parse("1 + 2 * 3").unwrap();
        assert_eq!(
            e,
            Expr::Binary(
                BinOp::Add,
                Box::new(Expr::Int(1)),
                Box::new(Expr::Binary(
                    BinOp::Mul,
                    Box::new(Expr::Int(2)),
                    Box::new(Expr::Int(3))
                ))
            )
        );
        // & binds tighter than comparison, as in Python
        let e = parse("x > 5 & 3").unwrap();
        assert!(matches!(e, Expr::Binary(BinOp::Gt, _, _)));
        // comparison of parenthesized boolean terms
        assert!(parse("(x > 1) & (y < 2)").is_ok());
    }

    #[test]
    fn test_pow_right_assoc_and_unary() {
        let e = parse("2 ** 3 ** 2").unwrap();
        let Expr::Binary(BinOp::Pow, _, rhs) = e else {
            panic!("expected pow");
        };
        assert!(matches!(*rhs, Expr::Binary(BinOp::Pow, _, _)));

        let e = parse("-x ** 2").unwrap();
        assert!(matches!(e, Expr::Unary(UnOp::Neg, _)));
        assert!(parse("2 ** -3").is_ok());
    }

    #[test]
    fn test_chained_comparison_rejected() {
        assert!(matches!(
            parse("1 < x < 3"),
            Err(ColzipError::InvalidExpression(_))
        ));
    }

    #[test]
    fn test_calls() {
        let e = parse("sqrt(x + 1)").unwrap();
        assert!(matches!(e, Expr::Call(Func::Sqrt, _)));
        let e = parse("where(x > 0, x, -x)").unwrap();
        assert!(matches!(e, Expr::Call(Func::Where, ref args) if args.len() == 3));
        assert!(parse("sqrt(x, y)").is_err());
        assert!(parse("frobnicate(x)").is_err());
    }

    #[test]
    fn test_reductions_rejected() {
        assert!(matches!(
            parse("sum(x)"),
            Err(ColzipError::ReductionNotSupported(_))
        ));
        assert!(matches!(
            parse("mean(x + 1)"),
            Err(ColzipError::ReductionNotSupported(_))
        ));
    }

    #[test]
    fn test_free_vars() {
        let e = parse("(((.25 * x + .75) * x - 1.5) * x - 2) < y").unwrap();
        assert_eq!(free_vars(&e), vec!["x".to_string(), "y".to_string()]);
        let e = parse("sin(theta) + sin(theta)").unwrap();
        assert_eq!(free_vars(&e), vec!["theta".to_string()]);
        // Keywords and function names are not free variables.
        let e = parse("where(flag, 1, 0) * (True & flag)").unwrap();
        assert_eq!(free_vars(&e), vec!["flag".to_string()]);
    }

    #[test]
    fn test_scenario_polynomial_parses() {
        let e = parse("(((.25*x + .75)*x - 1.5)*x - 2) < 0").unwrap();
        assert!(matches!(e, Expr::Binary(BinOp::Lt, _, _)));
    }

    #[test]
    fn test_lex_errors() {
        assert!(parse("a $ b").is_err());
        assert!(parse("a = b").is_err());
        assert!(parse("(a + 1").is_err());
        assert!(parse("a b").is_err());
    }
}
