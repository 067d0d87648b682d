//! SQL rendering
//!
//! Every infix operation is parenthesised, so the output never depends on the
//! target engine's operator precedence.

use crate::exp::{Const, Exp};

/// Renders the final IR as a SQL boolean expression
#[derive(Debug, Default, Clone, Copy)]
pub struct SqlRenderer;

impl SqlRenderer {
    pub fn new() -> Self {
        SqlRenderer
    }

    pub fn render(&self, exp: &Exp) -> String {
        let mut out = String::new();
        self.write_exp(exp, &mut out);
        out
    }

    fn write_exp(&self, exp: &Exp, out: &mut String) {
        match exp {
            Exp::Const(value) => write_const(value, out),
            Exp::Symbol(symbol) => out.push_str(symbol.as_str()),
            Exp::Null => out.push_str("NULL"),
            Exp::Group(inner) => {
                out.push('(');
                self.write_exp(inner, out);
                out.push(')');
            }
            Exp::InfixOp { op, left, right } => {
                out.push('(');
                self.write_exp(left, out);
                out.push(' ');
                out.push_str(op);
                out.push(' ');
                self.write_exp(right, out);
                out.push(')');
            }
            Exp::PrefixOp { op, args } => {
                out.push('(');
                out.push_str(op);
                out.push(' ');
                self.write_list(args, out);
                out.push(')');
            }
            Exp::Function { name, args } => {
                out.push_str(name.as_str());
                out.push('(');
                self.write_list(args, out);
                out.push(')');
            }
            Exp::Array(values) => {
                out.push('(');
                self.write_list(values, out);
                out.push(')');
            }
            Exp::ErrorPlaceholder(message) => {
                out.push_str("throwIf(true, ");
                write_string(message, out);
                out.push(')');
            }
        }
    }

    fn write_list(&self, items: &[Exp], out: &mut String) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_exp(item, out);
        }
    }
}

fn write_const(value: &Const, out: &mut String) {
    match value {
        Const::String(s) => write_string(s, out),
        other => out.push_str(&other.to_string()),
    }
}

/// Single-quoted SQL string literal with backslash escapes
fn write_string(value: &str, out: &mut String) {
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
}
