//! Field-name translation pass

use super::RewritePass;
use crate::exp::{Exp, Symbol};
use merlin_schema::SchemaRegistry;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

/// Failure to map an EQL field onto a SQL column
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldNameError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("field '{field}' cannot be translated: {reason}")]
    Invalid { field: String, reason: String },
}

/// Maps EQL field symbols to SQL column references.
///
/// Implementations are called once per symbol and may be shared between
/// threads, so they must not depend on call order.
pub trait FieldNameTranslator: Send + Sync {
    fn translate(&self, symbol: &Symbol) -> Result<Symbol, FieldNameError>;
}

impl<F> FieldNameTranslator for F
where
    F: Fn(&Symbol) -> Result<Symbol, FieldNameError> + Send + Sync,
{
    fn translate(&self, symbol: &Symbol) -> Result<Symbol, FieldNameError> {
        self(symbol)
    }
}

/// Leaves field names as written
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTranslator;

impl FieldNameTranslator for IdentityTranslator {
    fn translate(&self, symbol: &Symbol) -> Result<Symbol, FieldNameError> {
        Ok(symbol.clone())
    }
}

/// `process.name` -> `"process::name"`
///
/// Dotted paths become `::`-separated nested column names, quoted as a SQL
/// identifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct ColumnPathTranslator;

impl FieldNameTranslator for ColumnPathTranslator {
    fn translate(&self, symbol: &Symbol) -> Result<Symbol, FieldNameError> {
        Ok(Symbol::new(quote_identifier(&symbol.as_str().replace('.', "::"))))
    }
}

impl FieldNameTranslator for SchemaRegistry {
    fn translate(&self, symbol: &Symbol) -> Result<Symbol, FieldNameError> {
        self.resolve_column(symbol.as_str())
            .map(Symbol::new)
            .map_err(|_| FieldNameError::UnknownField(symbol.as_str().to_string()))
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Applies a [`FieldNameTranslator`] to every field symbol in the tree.
///
/// Function names are left alone. A failed translation turns the symbol into
/// an [`Exp::ErrorPlaceholder`].
pub struct FieldNameRewriter {
    translator: Arc<dyn FieldNameTranslator>,
    errors: Vec<String>,
}

impl FieldNameRewriter {
    pub fn new(translator: Arc<dyn FieldNameTranslator>) -> Self {
        Self {
            translator,
            errors: Vec::new(),
        }
    }
}

impl RewritePass for FieldNameRewriter {
    fn name(&self) -> &'static str {
        "field_names"
    }

    fn rewrite(&mut self, exp: Exp) -> Exp {
        match exp.map_children(|child| self.rewrite(child)) {
            Exp::Symbol(symbol) => match self.translator.translate(&symbol) {
                Ok(translated) => Exp::Symbol(translated),
                Err(e) => {
                    let message = e.to_string();
                    warn!(field = %symbol, error = %message, "field name translation failed");
                    self.errors.push(message.clone());
                    Exp::ErrorPlaceholder(message)
                }
            },
            other => other,
        }
    }

    fn take_errors(&mut self) -> Vec<String> {
        std::mem::take(&mut self.errors)
    }
}
