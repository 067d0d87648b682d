//! CST to IR lowering
//!
//! Attaches the implicit category predicate, evaluates literal tokens and
//! rejects constructs the IR cannot express.

use crate::cst::*;
use crate::error::{EqlError, Result};
use crate::exp::Exp;
use tracing::debug;

/// Default name of the column holding the event category
pub const DEFAULT_CATEGORY_FIELD: &str = "event.category";

/// Lowers a simple query into an [`Exp`] tree
pub struct Lowering<'a> {
    category_field: &'a str,
    errors: Vec<String>,
}

impl<'a> Lowering<'a> {
    pub fn new(category_field: &'a str) -> Self {
        Self {
            category_field,
            errors: Vec::new(),
        }
    }

    /// Lower a query. `Ok(None)` means "match everything".
    ///
    /// Every lowering problem in the query is reported, not only the first.
    pub fn lower(mut self, query: &SimpleQuery) -> Result<Option<Exp>> {
        let category = self.lower_category(&query.category);
        let condition = query.condition.as_ref().map(|c| self.lower_condition(c));

        if !self.errors.is_empty() {
            return Err(EqlError::Lowering {
                errors: self.errors,
            });
        }

        let exp = match (condition, category) {
            (Some(condition), Some(category)) => Some(Exp::infix("and", condition, category)),
            (Some(condition), None) => Some(condition),
            (None, category) => category,
        };

        if let Some(exp) = &exp {
            debug!(nodes = exp.node_count(), "lowered query");
        }
        Ok(exp)
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn lower_category(&mut self, category: &Category) -> Option<Exp> {
        let name = match category {
            Category::Any => return None,
            Category::Name(name) => name.clone(),
            Category::Quoted(raw) => eval_string(raw),
        };

        if name.is_empty() {
            return None;
        }

        Some(Exp::infix(
            "==",
            Exp::symbol(self.category_field),
            Exp::string(name),
        ))
    }

    fn lower_condition(&mut self, condition: &Condition) -> Exp {
        match condition {
            Condition::Boolean(text) => eval_boolean(text),
            Condition::Not(inner) => Exp::prefix("not", vec![self.lower_condition(inner)]),
            Condition::Group(inner) => Exp::group(self.lower_condition(inner)),
            Condition::Comparison(c) => {
                let left = self.lower_value(&c.left);
                let right = self.lower_value(&c.right);
                Exp::infix(c.op.as_str(), left, right)
            }
            Condition::Lookup(l) => {
                let field = self.lower_field(&l.field);
                let target = match &l.target {
                    LookupTarget::List(literals) => Exp::Array(
                        literals.iter().map(|lit| self.lower_literal(lit)).collect(),
                    ),
                    LookupTarget::Value(value) => self.lower_value(value),
                };
                let op = if l.negated {
                    format!("not {}", l.op.as_str())
                } else {
                    l.op.as_str().to_string()
                };
                Exp::infix(op, field, target)
            }
            Condition::Funcall(f) => self.lower_funcall(f),
            Condition::NotFuncall(f) => Exp::prefix("not", vec![self.lower_funcall(f)]),
            Condition::Logical(l) => {
                let left = self.lower_condition(&l.left);
                let right = self.lower_condition(&l.right);
                Exp::infix(l.op.as_str(), left, right)
            }
        }
    }

    fn lower_value(&mut self, value: &Value) -> Exp {
        match value {
            Value::Null => Exp::Null,
            Value::Literal(lit) => self.lower_literal(lit),
            Value::Field(field) => self.lower_field(field),
            Value::Funcall(f) => self.lower_funcall(f),
            Value::Group(inner) => Exp::group(self.lower_value(inner)),
            Value::Arithmetic(a) => {
                let left = self.lower_value(&a.left);
                let right = self.lower_value(&a.right);
                Exp::infix(a.op.as_str(), left, right)
            }
        }
    }

    fn lower_funcall(&mut self, funcall: &Funcall) -> Exp {
        let args = funcall
            .args
            .iter()
            .map(|arg| self.lower_value(arg))
            .collect();
        Exp::function(funcall.name.as_str(), args)
    }

    fn lower_field(&mut self, field: &Field) -> Exp {
        if field.optional {
            self.error("optional fields are not supported");
        }
        Exp::symbol(field.name.as_str())
    }

    fn lower_literal(&mut self, literal: &Literal) -> Exp {
        match literal {
            Literal::String(raw) => Exp::string(eval_string(raw)),
            Literal::Number(raw) => self.eval_number(raw),
            Literal::Boolean(raw) => eval_boolean(raw),
        }
    }

    fn eval_number(&mut self, raw: &str) -> Exp {
        if let Ok(i) = raw.parse::<i64>() {
            return Exp::int(i);
        }
        match raw.parse::<f64>() {
            Ok(f) => Exp::float(f),
            Err(e) => {
                self.error(format!("error parsing number '{}': {}", raw, e));
                Exp::int(0)
            }
        }
    }
}

fn eval_boolean(text: &str) -> Exp {
    Exp::bool(text.eq_ignore_ascii_case("true"))
}

/// Strip the quotes from a string token.
///
/// Triple-quoted strings are taken verbatim. In double-quoted strings
/// `\"`, `\\`, `\n`, `\t` and `\r` are unescaped; any other backslash pair is
/// kept as written so regex and LIKE escapes survive.
pub fn eval_string(raw: &str) -> String {
    const TRIPLE: &str = "\"\"\"";

    if raw.len() >= 6 && raw.starts_with(TRIPLE) && raw.ends_with(TRIPLE) {
        return raw[3..raw.len() - 3].to_string();
    }

    let inner = match raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        Some(inner) => inner,
        None => return raw.to_string(),
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
