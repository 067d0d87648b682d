//! Operator and function dialect mapping
//!
//! Turns the generic EQL operator tags and function names into the target
//! SQL engine's spellings.

use super::{or_chain, RewritePass};
use crate::exp::{Const, Exp, Symbol};
use std::fmt;
use tracing::warn;

/// Accepted argument counts for an EQL function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    Exactly(usize),
    Either(usize, usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::Either(a, b) => count == a || count == b,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{}", n),
            Arity::Either(a, b) => write!(f, "{} or {}", a, b),
            Arity::AtLeast(n) => write!(f, "at least {}", n),
        }
    }
}

/// What an EQL function becomes in SQL
#[derive(Debug, Clone, Copy)]
enum Target {
    Infix(&'static str),
    Call(&'static str),
    CidrMatch,
    Unimplemented,
}

struct FunctionMapping {
    arity: Arity,
    target: Target,
    /// Has a `~` variant that lower-cases its first two arguments
    case_insensitive_variant: bool,
}

fn function_mapping(base: &str) -> Option<FunctionMapping> {
    let (arity, target, case_insensitive_variant) = match base {
        "add" => (Arity::Exactly(2), Target::Infix("+"), false),
        "between" => (Arity::Exactly(3), Target::Unimplemented, false),
        "cidrMatch" => (Arity::AtLeast(2), Target::CidrMatch, false),
        "concat" => (Arity::AtLeast(1), Target::Call("concat"), false),
        "divide" => (Arity::Exactly(2), Target::Infix("/"), false),
        "endsWith" => (Arity::Exactly(2), Target::Call("endsWithUTF8"), true),
        "indexOf" => (Arity::Either(2, 3), Target::Call("position"), true),
        "length" => (Arity::Exactly(1), Target::Call("length"), false),
        "modulo" => (Arity::Exactly(2), Target::Infix("%"), false),
        "multiply" => (Arity::Exactly(2), Target::Infix("*"), false),
        "number" => (Arity::Exactly(1), Target::Call("toFloat"), false),
        "startsWith" => (Arity::Exactly(2), Target::Call("startsWithUTF8"), true),
        "string" => (Arity::Exactly(1), Target::Call("toString"), false),
        "stringContains" => (Arity::Exactly(2), Target::Call("hasSubsequence"), true),
        "substring" => (Arity::Either(2, 3), Target::Call("substring"), false),
        "subtract" => (Arity::Exactly(2), Target::Infix("-"), false),
        _ => return None,
    };
    Some(FunctionMapping {
        arity,
        target,
        case_insensitive_variant,
    })
}

/// Escape a glob pattern for `LIKE`/`ILIKE`.
///
/// Literal `%` and `_` are escaped first, then `*` and `?` become the SQL
/// wildcards, so user text never turns into a wildcard by accident.
pub fn like_pattern(pattern: &str) -> String {
    pattern
        .replace('%', "\\%")
        .replace('_', "\\_")
        .replace('*', "%")
        .replace('?', "_")
}

fn escape_like_operand(exp: Exp) -> Exp {
    match exp {
        Exp::Const(Const::String(s)) => Exp::string(like_pattern(&s)),
        other => other,
    }
}

fn lower(exp: Exp) -> Exp {
    Exp::function("lower", vec![exp])
}

fn negate(exp: Exp) -> Exp {
    Exp::prefix("NOT", vec![exp])
}

/// Maps EQL operators and functions onto SQL
#[derive(Debug, Default)]
pub struct DialectMapper {
    errors: Vec<String>,
}

impl DialectMapper {
    pub fn new() -> Self {
        Self::default()
    }

    fn raise(&mut self, message: String) -> Exp {
        warn!(error = %message, "dialect mapping failed");
        self.errors.push(message.clone());
        Exp::ErrorPlaceholder(message)
    }

    fn map_infix(&mut self, op: String, left: Exp, right: Exp) -> Exp {
        let (negated, base) = match op.strip_prefix("not ") {
            Some(base) => (true, base),
            None => (false, op.as_str()),
        };

        match (negated, base) {
            (false, "and") => Exp::infix("AND", left, right),
            (false, "or") => Exp::infix("OR", left, right),
            (false, ">" | "<" | ">=" | "<=" | "+" | "-" | "*" | "/" | "%") => {
                Exp::infix(base, left, right)
            }
            (false, "==") => {
                let sql_op = if right.is_null() { "IS" } else { "=" };
                Exp::infix(sql_op, left, right)
            }
            (false, "!=") => {
                let sql_op = if right.is_null() { "IS NOT" } else { "<>" };
                Exp::infix(sql_op, left, right)
            }
            (_, "in") => {
                let values = match right {
                    Exp::Array(_) => right,
                    single => Exp::Array(vec![single]),
                };
                Exp::infix(if negated { "NOT IN" } else { "IN" }, left, values)
            }
            (_, "in~") => match right {
                Exp::Array(values) => Exp::infix(
                    if negated { "NOT IN" } else { "IN" },
                    lower(left),
                    Exp::Array(values.into_iter().map(lower).collect()),
                ),
                _ => self.raise(format!("{} operator requires a list of values", op)),
            },
            (_, "like") => self.pattern_lookup(negated, left, right, |field, pattern| {
                Exp::infix("LIKE", field, escape_like_operand(pattern))
            }),
            (_, "like~" | ":") => self.pattern_lookup(negated, left, right, |field, pattern| {
                Exp::infix("ILIKE", field, escape_like_operand(pattern))
            }),
            (_, "regex" | "regex~") => {
                self.pattern_lookup(negated, left, right, |field, pattern| {
                    Exp::function("match", vec![field, pattern])
                })
            }
            _ => self.raise(format!("Unknown infix operator: {}", op)),
        }
    }

    /// One match per pattern, ORed together when the right side is a list
    fn pattern_lookup<F>(&mut self, negated: bool, field: Exp, patterns: Exp, build: F) -> Exp
    where
        F: Fn(Exp, Exp) -> Exp,
    {
        let matched = match patterns {
            Exp::Array(values) => {
                let matches = values
                    .into_iter()
                    .map(|pattern| build(field.clone(), pattern))
                    .collect();
                match or_chain(matches) {
                    Some(chain) => chain,
                    None => return self.raise("lookup requires at least one value".to_string()),
                }
            }
            single => build(field, single),
        };

        if negated {
            negate(matched)
        } else {
            matched
        }
    }

    fn map_prefix(&mut self, op: String, args: Vec<Exp>) -> Exp {
        match op.as_str() {
            "not" => Exp::prefix("NOT", args),
            _ => self.raise(format!("Unknown prefix operator: {}", op)),
        }
    }

    fn map_function(&mut self, name: Symbol, mut args: Vec<Exp>) -> Exp {
        let name = name.into_string();
        let (base, case_insensitive) = match name.strip_suffix('~') {
            Some(base) => (base, true),
            None => (name.as_str(), false),
        };

        let mapping = match function_mapping(base) {
            Some(m) if !case_insensitive || m.case_insensitive_variant => m,
            _ => return self.raise(format!("Unknown EQL function '{}'", name)),
        };

        if !mapping.arity.accepts(args.len()) {
            return self.raise(format!(
                "'{}' function requires {} argument(s), but got {}",
                name,
                mapping.arity,
                args.len()
            ));
        }

        if case_insensitive {
            for arg in args.iter_mut().take(2) {
                let original = std::mem::replace(arg, Exp::Null);
                *arg = lower(original);
            }
        }

        match mapping.target {
            Target::Infix(op) => {
                let mut args = args.into_iter();
                match (args.next(), args.next()) {
                    (Some(left), Some(right)) => Exp::infix(op, left, right),
                    _ => self.raise(format!("'{}' function requires 2 argument(s)", name)),
                }
            }
            Target::Call(sql_name) => Exp::function(sql_name, args),
            Target::CidrMatch => {
                let mut args = args.into_iter();
                let address = match args.next() {
                    Some(address) => address,
                    None => return self.raise(format!("'{}' function requires an address", name)),
                };
                let ranges = args
                    .map(|range| Exp::function("isIPAddressInRange", vec![address.clone(), range]))
                    .collect();
                match or_chain(ranges) {
                    Some(chain) => chain,
                    None => self.raise(format!("'{}' function requires at least one range", name)),
                }
            }
            Target::Unimplemented => self.raise(format!("{} function is not implemented", name)),
        }
    }
}

impl RewritePass for DialectMapper {
    fn name(&self) -> &'static str {
        "dialect"
    }

    fn rewrite(&mut self, exp: Exp) -> Exp {
        match exp.map_children(|child| self.rewrite(child)) {
            Exp::InfixOp { op, left, right } => self.map_infix(op, *left, *right),
            Exp::PrefixOp { op, args } => self.map_prefix(op, args),
            Exp::Function { name, args } => self.map_function(name, args),
            other => other,
        }
    }

    fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}
