//! Merlin EQL Transpiler
//!
//! Translates EQL (Event Query Language) queries into SQL `WHERE` clauses.

pub mod cst;
pub mod error;
pub mod exp;
pub mod lower;
pub mod parser;
pub mod render;
pub mod transform;
pub mod transpiler;

// Re-exports
pub use error::{EqlError, Result, Stage, SyntaxError};
pub use exp::{Const, Exp, Symbol};
pub use lower::DEFAULT_CATEGORY_FIELD;
pub use transform::{
    ColumnPathTranslator, FieldNameError, FieldNameTranslator, IdentityTranslator, Parameters,
};
pub use transpiler::{check_supported, EqlTranspiler, TransformOptions, Translation};
