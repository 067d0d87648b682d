//! Expression IR
//!
//! Generic boolean/arithmetic tree produced by lowering and threaded through
//! the rewrite passes. Operator tags stay uninterpreted strings until the
//! dialect pass replaces them with SQL spellings.

use serde::Serialize;
use std::fmt;

/// Scalar constant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Const {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::String(s) => write!(f, "{}", s),
            Const::Int(i) => write!(f, "{}", i),
            Const::Float(v) => write!(f, "{}", v),
            Const::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Bare identifier: a field reference or a SQL function name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(name: impl Into<String>) -> Self {
        Symbol(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Symbol(name)
    }
}

/// IR node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Exp {
    Const(Const),
    Symbol(Symbol),
    /// SQL `NULL`; never confused with a field that happens to be named `NULL`
    Null,
    /// Explicit parentheses from the source query
    Group(Box<Exp>),
    InfixOp {
        op: String,
        left: Box<Exp>,
        right: Box<Exp>,
    },
    PrefixOp {
        op: String,
        args: Vec<Exp>,
    },
    Function {
        name: Symbol,
        args: Vec<Exp>,
    },
    Array(Vec<Exp>),
    /// A sub-expression that failed to translate; renders as a call that
    /// raises `message` when the database evaluates it
    ErrorPlaceholder(String),
}

impl Exp {
    pub fn string(value: impl Into<String>) -> Self {
        Exp::Const(Const::String(value.into()))
    }

    pub fn int(value: i64) -> Self {
        Exp::Const(Const::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Exp::Const(Const::Float(value))
    }

    pub fn bool(value: bool) -> Self {
        Exp::Const(Const::Bool(value))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Exp::Symbol(Symbol::new(name))
    }

    pub fn group(inner: Exp) -> Self {
        Exp::Group(Box::new(inner))
    }

    pub fn infix(op: impl Into<String>, left: Exp, right: Exp) -> Self {
        Exp::InfixOp {
            op: op.into(),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn prefix(op: impl Into<String>, args: Vec<Exp>) -> Self {
        Exp::PrefixOp {
            op: op.into(),
            args,
        }
    }

    pub fn function(name: impl Into<String>, args: Vec<Exp>) -> Self {
        Exp::Function {
            name: Symbol::new(name),
            args,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Exp::Null)
    }

    /// Rebuild this node with `f` applied to each direct child, left to right.
    /// Passes call this before handling the node itself to get post-order
    /// traversal.
    pub fn map_children<F>(self, mut f: F) -> Exp
    where
        F: FnMut(Exp) -> Exp,
    {
        match self {
            Exp::Const(_) | Exp::Symbol(_) | Exp::Null | Exp::ErrorPlaceholder(_) => self,
            Exp::Group(inner) => Exp::Group(Box::new(f(*inner))),
            Exp::InfixOp { op, left, right } => {
                let left = f(*left);
                let right = f(*right);
                Exp::InfixOp {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                }
            }
            Exp::PrefixOp { op, args } => Exp::PrefixOp {
                op,
                args: args.into_iter().map(&mut f).collect(),
            },
            Exp::Function { name, args } => Exp::Function {
                name,
                args: args.into_iter().map(&mut f).collect(),
            },
            Exp::Array(values) => Exp::Array(values.into_iter().map(&mut f).collect()),
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        1 + match self {
            Exp::Const(_) | Exp::Symbol(_) | Exp::Null | Exp::ErrorPlaceholder(_) => 0,
            Exp::Group(inner) => inner.node_count(),
            Exp::InfixOp { left, right, .. } => left.node_count() + right.node_count(),
            Exp::PrefixOp { args, .. } | Exp::Function { args, .. } | Exp::Array(args) => {
                args.iter().map(Exp::node_count).sum()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_not_a_symbol() {
        assert_ne!(Exp::Null, Exp::symbol("NULL"));
        assert!(Exp::Null.is_null());
        assert!(!Exp::symbol("NULL").is_null());
    }

    #[test]
    fn test_map_children_visits_left_to_right() {
        let exp = Exp::infix("+", Exp::symbol("a"), Exp::function("f", vec![Exp::int(1)]));

        let mut seen = Vec::new();
        let rebuilt = exp.clone().map_children(|child| {
            seen.push(child.node_count());
            child
        });

        assert_eq!(rebuilt, exp);
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn test_map_children_leaves_untouched() {
        let leaf = Exp::string("x");
        let mapped = leaf.clone().map_children(|_| Exp::Null);
        assert_eq!(mapped, leaf);
    }

    #[test]
    fn test_node_count() {
        let exp = Exp::prefix(
            "not",
            vec![Exp::group(Exp::infix("==", Exp::symbol("a"), Exp::Null))],
        );
        assert_eq!(exp.node_count(), 5);
    }
}
