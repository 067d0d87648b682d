//! Parameter extraction for prepared statements

use super::RewritePass;
use crate::exp::{Const, Exp, Symbol};
use std::collections::BTreeMap;

/// Placeholder name -> extracted value
pub type Parameters = BTreeMap<String, Const>;

fn sql_type(value: &Const) -> &'static str {
    match value {
        Const::Int(_) => "Int64",
        Const::Bool(_) => "Boolean",
        Const::String(_) | Const::Float(_) => "String",
    }
}

/// Replaces constants with `{P_n:Type}` placeholders.
///
/// Boolean constants stay inline. Placeholders are numbered in post-order.
#[derive(Debug, Default)]
pub struct ParameterExtractor {
    parameters: Parameters,
    next_id: usize,
}

impl ParameterExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_parameters(self) -> Parameters {
        self.parameters
    }
}

impl RewritePass for ParameterExtractor {
    fn name(&self) -> &'static str {
        "parameters"
    }

    fn rewrite(&mut self, exp: Exp) -> Exp {
        match exp.map_children(|child| self.rewrite(child)) {
            Exp::Const(Const::Bool(b)) => Exp::bool(b),
            Exp::Const(value) => {
                self.next_id += 1;
                let name = format!("P_{}", self.next_id);
                let placeholder = Symbol::new(format!("{{{}:{}}}", name, sql_type(&value)));
                self.parameters.insert(name, value);
                Exp::Symbol(placeholder)
            }
            other => other,
        }
    }

    fn take_errors(&mut self) -> Vec<String> {
        Vec::new()
    }
}
