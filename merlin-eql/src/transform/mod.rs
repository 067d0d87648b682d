//! IR rewrite passes
//!
//! Each pass is total: it always returns a renderable tree and reports
//! problems through [`RewritePass::take_errors`] instead of failing.

mod dialect;
mod field_names;
mod parameters;

pub use dialect::DialectMapper;
pub use field_names::{
    ColumnPathTranslator, FieldNameError, FieldNameRewriter, FieldNameTranslator,
    IdentityTranslator,
};
pub use parameters::{ParameterExtractor, Parameters};

use crate::exp::Exp;

/// A tree-to-tree transform over the IR
pub trait RewritePass {
    /// Short name used in log events
    fn name(&self) -> &'static str;

    /// Rewrite `exp`, children before parents
    fn rewrite(&mut self, exp: Exp) -> Exp;

    /// Drain the soft errors recorded so far
    fn take_errors(&mut self) -> Vec<String>;
}

/// Fold `items` into a right-associated `OR` chain: `(a OR (b OR c))`
pub(crate) fn or_chain(items: Vec<Exp>) -> Option<Exp> {
    items
        .into_iter()
        .rev()
        .reduce(|acc, item| Exp::infix("OR", item, acc))
}
