//! EQL Parser using Pest
//!
//! The PEG in `eql.pest` recognises the token stream; this module folds the
//! flat operator sequences with a Pratt parser and builds the CST. Problems
//! found while building (bad counts, oversized intervals) are collected and
//! reported together.

use crate::cst::*;
use crate::error::{EqlError, Result, SyntaxError};
use pest::error::LineColLocation;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use std::cell::RefCell;
use std::sync::LazyLock;

#[derive(Parser)]
#[grammar = "eql.pest"]
struct EqlParser;

/// `not` binds tighter than `and`/`or`, which share one level
static CONDITION_PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::logic_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op))
});

static VALUE_PRATT: LazyLock<PrattParser<Rule>> = LazyLock::new(|| {
    PrattParser::new()
        .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::subtract, Assoc::Left))
        .op(Op::infix(Rule::multiply, Assoc::Left)
            | Op::infix(Rule::divide, Assoc::Left)
            | Op::infix(Rule::modulo, Assoc::Left))
});

type BuildResult<T> = std::result::Result<T, SyntaxError>;

/// Parse EQL query string into a CST
pub fn parse(input: &str) -> Result<Query> {
    let mut pairs = EqlParser::parse(Rule::query, input)
        .map_err(|e| EqlError::Syntax(vec![syntax_error_from_pest(e)]))?;

    let pair = pairs
        .next()
        .ok_or_else(|| EqlError::syntax(1, 1, "expected query"))?;

    let builder = CstBuilder::default();
    let result = builder.build_query(pair);
    let mut errors = builder.errors.into_inner();

    match result {
        Ok(query) if errors.is_empty() => Ok(query),
        Ok(_) => Err(EqlError::Syntax(errors)),
        Err(e) => {
            errors.push(e);
            errors.sort_by_key(|e| (e.line, e.column));
            Err(EqlError::Syntax(errors))
        }
    }
}

fn syntax_error_from_pest(err: pest::error::Error<Rule>) -> SyntaxError {
    let (line, column) = match err.line_col {
        LineColLocation::Pos(pos) => pos,
        LineColLocation::Span(start, _) => start,
    };
    let err = err.renamed_rules(describe_rule);
    SyntaxError::new(line, column, err.variant.message())
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::EOI => "end of input",
        Rule::query | Rule::simple_query => "query",
        Rule::category | Rule::any => "category",
        Rule::condition | Rule::comparison | Rule::lookup | Rule::condition_group => "condition",
        Rule::value | Rule::value_group => "value",
        Rule::compare_op => "comparison operator",
        Rule::lookup_op => "lookup operator",
        Rule::logic_op => "'and' or 'or'",
        Rule::not_op => "'not'",
        Rule::add | Rule::subtract | Rule::multiply | Rule::divide | Rule::modulo => {
            "arithmetic operator"
        }
        Rule::funcall | Rule::func_name | Rule::func_base => "function call",
        Rule::field | Rule::ident => "field",
        Rule::field_list => "field list",
        Rule::literal => "literal",
        Rule::literal_list => "literal list",
        Rule::string => "string",
        Rule::number => "number",
        Rule::boolean => "boolean",
        Rule::null => "null",
        Rule::interval => "interval",
        Rule::pipe => "pipe",
        Rule::kw_where => "'where'",
        Rule::kw_by => "'by'",
        Rule::kw_with => "'with'",
        Rule::kw_maxspan => "'maxspan'",
        other => return format!("{:?}", other),
    }
    .to_string()
}

fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::kw_where
            | Rule::kw_sequence
            | Rule::kw_sample
            | Rule::kw_by
            | Rule::kw_with
            | Rule::kw_maxspan
            | Rule::kw_head
            | Rule::kw_tail
            | Rule::kw_count
            | Rule::kw_unique
            | Rule::kw_filter
            | Rule::kw_sort
    )
}

/// Inner pairs without keyword tokens
fn significant(pair: Pair<'_, Rule>) -> impl Iterator<Item = Pair<'_, Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

fn error_at(pair: &Pair<'_, Rule>, message: impl Into<String>) -> SyntaxError {
    let (line, column) = pair.as_span().start_pos().line_col();
    SyntaxError::new(line, column, message)
}

fn unexpected(pair: &Pair<'_, Rule>) -> SyntaxError {
    error_at(
        pair,
        format!("unexpected {} '{}'", describe_rule(&pair.as_rule()), pair.as_str()),
    )
}

fn missing(parent: &Pair<'_, Rule>, what: &str) -> SyntaxError {
    error_at(parent, format!("expected {}", what))
}

/// CST construction state. Recoverable problems go to `errors`; structural
/// mismatches abort through the returned `SyntaxError`.
#[derive(Default)]
struct CstBuilder {
    errors: RefCell<Vec<SyntaxError>>,
}

impl CstBuilder {
    fn report(&self, error: SyntaxError) {
        self.errors.borrow_mut().push(error);
    }

    fn build_query(&self, pair: Pair<'_, Rule>) -> BuildResult<Query> {
        let span_pair = pair.clone();
        let mut body = None;
        let mut pipes = Vec::new();

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::simple_query => {
                    body = Some(QueryBody::Simple(self.build_simple_query(inner)?));
                }
                Rule::sequence_query => {
                    body = Some(QueryBody::Sequence(self.build_sequence_query(inner)?));
                }
                Rule::sample_query => {
                    body = Some(QueryBody::Sample(self.build_sample_query(inner)?));
                }
                Rule::pipe => pipes.push(self.build_pipe(inner)?),
                Rule::EOI => {}
                _ => return Err(unexpected(&inner)),
            }
        }

        let body = body.ok_or_else(|| missing(&span_pair, "query"))?;
        Ok(Query { body, pipes })
    }

    fn build_simple_query(&self, pair: Pair<'_, Rule>) -> BuildResult<SimpleQuery> {
        let span_pair = pair.clone();
        let mut inner = significant(pair);

        let category_pair = inner.next().ok_or_else(|| missing(&span_pair, "category"))?;
        let category = self.build_category(category_pair)?;

        let condition = match inner.next() {
            Some(cond_pair) => Some(self.build_condition(cond_pair)?),
            None => None,
        };

        Ok(SimpleQuery {
            category,
            condition,
        })
    }

    fn build_category(&self, pair: Pair<'_, Rule>) -> BuildResult<Category> {
        let span_pair = pair.clone();
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| missing(&span_pair, "category"))?;

        match inner.as_rule() {
            Rule::any => Ok(Category::Any),
            Rule::ident => Ok(Category::Name(inner.as_str().to_string())),
            Rule::string => Ok(Category::Quoted(inner.as_str().to_string())),
            _ => Err(unexpected(&inner)),
        }
    }

    fn build_sequence_query(&self, pair: Pair<'_, Rule>) -> BuildResult<SequenceQuery> {
        let mut by = Vec::new();
        let mut maxspan = None;
        let mut steps = Vec::new();

        for inner in significant(pair) {
            match inner.as_rule() {
                Rule::sequence_by => by = self.build_by_clause(inner)?,
                Rule::maxspan => maxspan = Some(self.build_maxspan(inner)?),
                Rule::sequence_step => steps.push(self.build_sequence_step(inner)?),
                _ => return Err(unexpected(&inner)),
            }
        }

        Ok(SequenceQuery { by, maxspan, steps })
    }

    fn build_sequence_step(&self, pair: Pair<'_, Rule>) -> BuildResult<SequenceStep> {
        let span_pair = pair.clone();
        let mut inner = pair.into_inner();

        let query_pair = inner.next().ok_or_else(|| missing(&span_pair, "query"))?;
        let query = self.build_simple_query(query_pair)?;

        let by = match inner.next() {
            Some(by_pair) => self.build_by_clause(by_pair)?,
            None => Vec::new(),
        };

        Ok(SequenceStep { query, by })
    }

    fn build_sample_query(&self, pair: Pair<'_, Rule>) -> BuildResult<SampleQuery> {
        let mut by = Vec::new();
        let mut steps = Vec::new();

        for inner in significant(pair) {
            match inner.as_rule() {
                Rule::field_list => by = self.build_field_list(inner)?,
                Rule::sample_step => {
                    let step_pair = inner.clone();
                    let query_pair = inner
                        .into_inner()
                        .next()
                        .ok_or_else(|| missing(&step_pair, "query"))?;
                    steps.push(self.build_simple_query(query_pair)?);
                }
                _ => return Err(unexpected(&inner)),
            }
        }

        Ok(SampleQuery { by, steps })
    }

    fn build_by_clause(&self, pair: Pair<'_, Rule>) -> BuildResult<Vec<Field>> {
        let span_pair = pair.clone();
        let list = significant(pair)
            .next()
            .ok_or_else(|| missing(&span_pair, "field list"))?;
        self.build_field_list(list)
    }

    fn build_maxspan(&self, pair: Pair<'_, Rule>) -> BuildResult<Interval> {
        let span_pair = pair.clone();
        let interval = significant(pair)
            .next()
            .ok_or_else(|| missing(&span_pair, "interval"))?;
        Ok(self.build_interval(interval))
    }

    fn build_interval(&self, pair: Pair<'_, Rule>) -> Interval {
        let text = pair.as_str();
        let digits_end = text
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(text.len());
        let (digits, unit) = text.split_at(digits_end);

        let unit = match unit {
            "ms" => IntervalUnit::Milliseconds,
            "s" => IntervalUnit::Seconds,
            "m" => IntervalUnit::Minutes,
            "h" => IntervalUnit::Hours,
            _ => IntervalUnit::Days,
        };

        let interval = match digits.parse::<u64>() {
            Ok(value) => Interval { value, unit },
            Err(_) => {
                self.report(error_at(&pair, format!("interval '{}' is out of range", text)));
                return Interval { value: 0, unit };
            }
        };

        if interval.as_millis().is_none() {
            self.report(error_at(&pair, format!("interval '{}' is out of range", text)));
        }
        interval
    }

    fn build_pipe(&self, pair: Pair<'_, Rule>) -> BuildResult<Pipe> {
        let span_pair = pair.clone();
        let stage = pair
            .into_inner()
            .next()
            .ok_or_else(|| missing(&span_pair, "pipe"))?;
        let rule = stage.as_rule();
        let stage_pair = stage.clone();
        let mut args = significant(stage);

        match rule {
            Rule::head_pipe | Rule::tail_pipe => {
                let number = args.next().ok_or_else(|| missing(&stage_pair, "number"))?;
                let count = self.build_count(number);
                Ok(if rule == Rule::head_pipe {
                    Pipe::Head(count)
                } else {
                    Pipe::Tail(count)
                })
            }
            Rule::count_pipe => Ok(Pipe::Count),
            Rule::unique_pipe | Rule::sort_pipe => {
                let list = args.next().ok_or_else(|| missing(&stage_pair, "field list"))?;
                let fields = self.build_field_list(list)?;
                Ok(if rule == Rule::unique_pipe {
                    Pipe::Unique(fields)
                } else {
                    Pipe::Sort(fields)
                })
            }
            Rule::filter_pipe => {
                let cond = args.next().ok_or_else(|| missing(&stage_pair, "condition"))?;
                Ok(Pipe::Filter(self.build_condition(cond)?))
            }
            _ => Err(unexpected(&stage_pair)),
        }
    }

    fn build_count(&self, pair: Pair<'_, Rule>) -> u64 {
        match pair.as_str().parse::<u64>() {
            Ok(count) => count,
            Err(_) => {
                self.report(error_at(
                    &pair,
                    format!("expected a non-negative integer count, found '{}'", pair.as_str()),
                ));
                0
            }
        }
    }

    fn build_condition(&self, pair: Pair<'_, Rule>) -> BuildResult<Condition> {
        CONDITION_PRATT
            .map_primary(|primary| self.build_condition_term(primary))
            .map_prefix(|_op, operand| {
                Ok(match operand? {
                    Condition::Funcall(funcall) => Condition::NotFuncall(funcall),
                    other => Condition::Not(Box::new(other)),
                })
            })
            .map_infix(|left, op, right| {
                let logic = LogicOp::from_token(op.as_str()).ok_or_else(|| unexpected(&op))?;
                Ok(Condition::Logical(Box::new(Logical {
                    op: logic,
                    left: left?,
                    right: right?,
                })))
            })
            .parse(pair.into_inner())
    }

    fn build_condition_term(&self, pair: Pair<'_, Rule>) -> BuildResult<Condition> {
        match pair.as_rule() {
            Rule::boolean => Ok(Condition::Boolean(pair.as_str().to_string())),
            Rule::comparison => self.build_comparison(pair),
            Rule::lookup => self.build_lookup(pair),
            Rule::funcall => Ok(Condition::Funcall(self.build_funcall(pair)?)),
            Rule::condition_group => {
                let span_pair = pair.clone();
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| missing(&span_pair, "condition"))?;
                Ok(Condition::Group(Box::new(self.build_condition(inner)?)))
            }
            _ => Err(unexpected(&pair)),
        }
    }

    fn build_comparison(&self, pair: Pair<'_, Rule>) -> BuildResult<Condition> {
        let span_pair = pair.clone();
        let mut inner = pair.into_inner();

        let left = inner.next().ok_or_else(|| missing(&span_pair, "value"))?;
        let op = inner
            .next()
            .ok_or_else(|| missing(&span_pair, "comparison operator"))?;
        let right = inner.next().ok_or_else(|| missing(&span_pair, "value"))?;

        let op_kind = CompareOp::from_token(op.as_str()).ok_or_else(|| unexpected(&op))?;

        Ok(Condition::Comparison(Box::new(Comparison {
            op: op_kind,
            left: self.build_value(left)?,
            right: self.build_value(right)?,
        })))
    }

    fn build_lookup(&self, pair: Pair<'_, Rule>) -> BuildResult<Condition> {
        let span_pair = pair.clone();
        let mut inner = pair.into_inner();

        let field_pair = inner.next().ok_or_else(|| missing(&span_pair, "field"))?;
        let field = self.build_field(field_pair)?;

        let mut next = inner
            .next()
            .ok_or_else(|| missing(&span_pair, "lookup operator"))?;
        let negated = next.as_rule() == Rule::not_op;
        if negated {
            next = inner
                .next()
                .ok_or_else(|| missing(&span_pair, "lookup operator"))?;
        }
        let op = LookupOp::from_token(next.as_str()).ok_or_else(|| unexpected(&next))?;

        let target_pair = inner
            .next()
            .ok_or_else(|| missing(&span_pair, "literal list or value"))?;
        let target = match target_pair.as_rule() {
            Rule::literal_list => LookupTarget::List(self.build_literal_list(target_pair)?),
            Rule::value => LookupTarget::Value(self.build_value(target_pair)?),
            _ => return Err(unexpected(&target_pair)),
        };

        Ok(Condition::Lookup(Box::new(Lookup {
            field,
            negated,
            op,
            target,
        })))
    }

    fn build_value(&self, pair: Pair<'_, Rule>) -> BuildResult<Value> {
        VALUE_PRATT
            .map_primary(|primary| self.build_value_term(primary))
            .map_infix(|left, op, right| {
                let op_kind = match op.as_rule() {
                    Rule::add => ArithmeticOp::Add,
                    Rule::subtract => ArithmeticOp::Subtract,
                    Rule::multiply => ArithmeticOp::Multiply,
                    Rule::divide => ArithmeticOp::Divide,
                    Rule::modulo => ArithmeticOp::Modulo,
                    _ => return Err(unexpected(&op)),
                };
                Ok(Value::Arithmetic(Box::new(Arithmetic {
                    op: op_kind,
                    left: left?,
                    right: right?,
                })))
            })
            .parse(pair.into_inner())
    }

    fn build_value_term(&self, pair: Pair<'_, Rule>) -> BuildResult<Value> {
        match pair.as_rule() {
            Rule::null => Ok(Value::Null),
            Rule::literal => Ok(Value::Literal(self.build_literal(pair)?)),
            Rule::funcall => Ok(Value::Funcall(self.build_funcall(pair)?)),
            Rule::field => Ok(Value::Field(self.build_field(pair)?)),
            Rule::value_group => {
                let span_pair = pair.clone();
                let inner = pair
                    .into_inner()
                    .next()
                    .ok_or_else(|| missing(&span_pair, "value"))?;
                Ok(Value::Group(Box::new(self.build_value(inner)?)))
            }
            _ => Err(unexpected(&pair)),
        }
    }

    fn build_funcall(&self, pair: Pair<'_, Rule>) -> BuildResult<Funcall> {
        let span_pair = pair.clone();
        let mut inner = pair.into_inner();

        let name_pair = inner
            .next()
            .ok_or_else(|| missing(&span_pair, "function name"))?;
        let name = FuncName::from_token(name_pair.as_str()).ok_or_else(|| {
            error_at(&name_pair, format!("unknown function '{}'", name_pair.as_str()))
        })?;

        let args = inner
            .map(|arg| self.build_value(arg))
            .collect::<BuildResult<Vec<_>>>()?;

        Ok(Funcall { name, args })
    }

    fn build_field(&self, pair: Pair<'_, Rule>) -> BuildResult<Field> {
        let span_pair = pair.clone();
        let mut optional = false;
        let mut name = None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::optional_marker => optional = true,
                Rule::ident => name = Some(inner.as_str().to_string()),
                _ => return Err(unexpected(&inner)),
            }
        }

        let name = name.ok_or_else(|| missing(&span_pair, "field name"))?;
        Ok(Field { name, optional })
    }

    fn build_field_list(&self, pair: Pair<'_, Rule>) -> BuildResult<Vec<Field>> {
        pair.into_inner().map(|f| self.build_field(f)).collect()
    }

    fn build_literal(&self, pair: Pair<'_, Rule>) -> BuildResult<Literal> {
        let span_pair = pair.clone();
        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| missing(&span_pair, "literal"))?;
        let text = inner.as_str().to_string();

        match inner.as_rule() {
            Rule::string => Ok(Literal::String(text)),
            Rule::number => Ok(Literal::Number(text)),
            Rule::boolean => Ok(Literal::Boolean(text)),
            _ => Err(unexpected(&inner)),
        }
    }

    fn build_literal_list(&self, pair: Pair<'_, Rule>) -> BuildResult<Vec<Literal>> {
        pair.into_inner().map(|l| self.build_literal(l)).collect()
    }
}
