//! EQL Transpiler - Main interface
//!
//! Translates EQL queries into SQL `WHERE` clause fragments.

use crate::cst::{Query, QueryBody, SimpleQuery};
use crate::error::{EqlError, Result};
use crate::exp::Exp;
use crate::lower::{Lowering, DEFAULT_CATEGORY_FIELD};
use crate::parser;
use crate::render::SqlRenderer;
use crate::transform::{
    DialectMapper, FieldNameRewriter, FieldNameTranslator, ParameterExtractor, Parameters,
    RewritePass,
};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Translation settings
#[derive(Clone)]
pub struct TransformOptions {
    /// Column compared against the query's event category
    pub category_field: String,
    /// `None` keeps field names as written
    pub field_name_translator: Option<Arc<dyn FieldNameTranslator>>,
    /// Replace constants with `{P_n:Type}` placeholders
    pub extract_parameters: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            category_field: DEFAULT_CATEGORY_FIELD.to_string(),
            field_name_translator: None,
            extract_parameters: false,
        }
    }
}

impl fmt::Debug for TransformOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformOptions")
            .field("category_field", &self.category_field)
            .field(
                "field_name_translator",
                &self.field_name_translator.as_ref().map(|_| "<translator>"),
            )
            .field("extract_parameters", &self.extract_parameters)
            .finish()
    }
}

impl TransformOptions {
    pub fn with_category_field(mut self, field: impl Into<String>) -> Self {
        self.category_field = field.into();
        self
    }

    pub fn with_field_name_translator<T>(self, translator: T) -> Self
    where
        T: FieldNameTranslator + 'static,
    {
        self.with_shared_translator(Arc::new(translator))
    }

    /// Use a translator that is already shared elsewhere (e.g. a schema registry)
    pub fn with_shared_translator(mut self, translator: Arc<dyn FieldNameTranslator>) -> Self {
        self.field_name_translator = Some(translator);
        self
    }

    pub fn with_extract_parameters(mut self, extract: bool) -> Self {
        self.extract_parameters = extract;
        self
    }
}

/// Result of a successful translation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Translation {
    /// SQL boolean expression; empty when the query matches every event
    pub where_clause: String,
    /// Extracted placeholder values; empty unless extraction is enabled
    pub parameters: Parameters,
    /// Soft errors. Each one is also embedded in `where_clause` as a
    /// statement that fails when executed.
    pub errors: Vec<String>,
}

impl Translation {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Treat soft errors as fatal
    pub fn into_strict(self) -> Result<Self> {
        if self.errors.is_empty() {
            Ok(self)
        } else {
            Err(EqlError::Rewrite {
                errors: self.errors,
            })
        }
    }
}

/// Check that a parsed query has a shape the translator can handle: a single
/// event query without pipes.
pub fn check_supported(query: &Query) -> Result<&SimpleQuery> {
    let simple = match &query.body {
        QueryBody::Simple(simple) => simple,
        QueryBody::Sequence(_) | QueryBody::Sample(_) => {
            return Err(EqlError::unsupported(query.kind()));
        }
    };

    if let Some(pipe) = query.pipes.first() {
        return Err(EqlError::unsupported(format!("pipe {}", pipe.name())));
    }

    Ok(simple)
}

/// EQL to SQL transpiler
///
/// Holds only configuration; every call builds and drops its own trees, so a
/// single instance can serve any number of threads.
#[derive(Debug, Clone, Default)]
pub struct EqlTranspiler {
    options: TransformOptions,
    renderer: SqlRenderer,
}

impl EqlTranspiler {
    /// Create a new transpiler
    pub fn new(options: TransformOptions) -> Self {
        Self {
            options,
            renderer: SqlRenderer::new(),
        }
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Translate an EQL query into a SQL `WHERE` fragment
    pub fn transform(&self, eql: &str) -> Result<Translation> {
        let exp = match self.lower(eql)? {
            Some(exp) => exp,
            None => {
                debug!("query matches all events");
                return Ok(Translation::default());
            }
        };

        let mut errors = Vec::new();

        let exp = match &self.options.field_name_translator {
            Some(translator) => {
                let mut pass = FieldNameRewriter::new(translator.clone());
                run_pass(&mut pass, exp, &mut errors)
            }
            None => exp,
        };

        let mut exp = run_pass(&mut DialectMapper::new(), exp, &mut errors);

        let parameters = if self.options.extract_parameters {
            let mut pass = ParameterExtractor::new();
            exp = run_pass(&mut pass, exp, &mut errors);
            pass.into_parameters()
        } else {
            Parameters::new()
        };

        let where_clause = self.renderer.render(&exp);
        debug!(
            where_clause = %where_clause,
            parameters = parameters.len(),
            soft_errors = errors.len(),
            "rendered query"
        );

        Ok(Translation {
            where_clause,
            parameters,
            errors,
        })
    }

    /// Parse EQL query to CST (for debugging)
    pub fn parse(&self, eql: &str) -> Result<Query> {
        let query = parser::parse(eql)?;
        debug!(kind = query.kind(), pipes = query.pipes.len(), "parsed query");
        Ok(query)
    }

    /// Parse, check and lower a query, returning the IR before any rewrite
    /// pass runs (for debugging)
    pub fn lower(&self, eql: &str) -> Result<Option<Exp>> {
        let query = self.parse(eql)?;
        let simple = check_supported(&query)?;
        let exp = Lowering::new(&self.options.category_field).lower(simple)?;
        trace!(ir = ?exp, "lowered IR");
        Ok(exp)
    }
}

fn run_pass<P: RewritePass>(pass: &mut P, exp: Exp, errors: &mut Vec<String>) -> Exp {
    let exp = pass.rewrite(exp);
    let pass_errors = pass.take_errors();
    debug!(pass = pass.name(), errors = pass_errors.len(), "rewrite pass done");
    trace!(pass = pass.name(), ir = ?exp, "rewritten IR");
    errors.extend(pass_errors);
    exp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::ColumnPathTranslator;

    #[test]
    fn test_transform_simple() {
        let transpiler = EqlTranspiler::default();
        let translation = transpiler
            .transform("process where process.pid == 1000")
            .unwrap();
        assert_eq!(
            translation.where_clause,
            "((process.pid = 1000) AND (event.category = 'process'))"
        );
        assert!(translation.parameters.is_empty());
        assert!(!translation.has_errors());
    }

    #[test]
    fn test_match_all_is_empty() {
        let translation = EqlTranspiler::default().transform("any").unwrap();
        assert_eq!(translation.where_clause, "");
    }

    #[test]
    fn test_gate_rejects_pipes_and_multi_event_queries() {
        let transpiler = EqlTranspiler::default();
        for query in [
            "process where true | head 3",
            "sequence [ a where true ] [ b where true ]",
            "sample by f [ a where true ]",
        ] {
            let err = transpiler.transform(query).unwrap_err();
            assert!(
                matches!(err, EqlError::UnsupportedQuery { .. }),
                "{} should be unsupported, got {:?}",
                query,
                err
            );
        }
    }

    #[test]
    fn test_pipe_kind_in_message() {
        let err = EqlTranspiler::default()
            .transform("any where true | count")
            .unwrap_err();
        assert_eq!(err.to_string(), "unsupported query type: pipe count");
    }

    #[test]
    fn test_into_strict() {
        let transpiler = EqlTranspiler::default();
        let soft = transpiler.transform("any where length(a, b) == 1").unwrap();
        assert!(soft.has_errors());
        let err = soft.into_strict().unwrap_err();
        assert_eq!(err.stage(), crate::error::Stage::Rewrite);

        let clean = transpiler.transform("any where length(a) == 1").unwrap();
        assert!(clean.into_strict().is_ok());
    }

    #[test]
    fn test_parameters_extracted_after_dialect_mapping() {
        let transpiler = EqlTranspiler::new(
            TransformOptions::default()
                .with_field_name_translator(ColumnPathTranslator)
                .with_extract_parameters(true),
        );
        let translation = transpiler
            .transform("process where process.name : \"cmd*\"")
            .unwrap();

        assert_eq!(
            translation.where_clause,
            "((\"process::name\" ILIKE {P_1:String}) AND (\"event::category\" = {P_2:String}))"
        );
        assert_eq!(
            translation.parameters.get("P_1"),
            Some(&crate::exp::Const::String("cmd%".to_string()))
        );
        assert_eq!(
            translation.parameters.get("P_2"),
            Some(&crate::exp::Const::String("process".to_string()))
        );
    }

    #[test]
    fn test_lower_returns_untranslated_ir() {
        let transpiler = EqlTranspiler::new(
            TransformOptions::default().with_field_name_translator(ColumnPathTranslator),
        );
        let exp = transpiler.lower("any where a.b == null").unwrap();
        assert_eq!(exp, Some(Exp::infix("==", Exp::symbol("a.b"), Exp::Null)));
    }

    #[test]
    fn test_transpiler_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<EqlTranspiler>();
    }
}
