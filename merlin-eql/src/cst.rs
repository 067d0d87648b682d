//! EQL Concrete Syntax Tree (CST) definitions
//!
//! One type per grammar rule. Literal tokens keep their raw source text;
//! escaping and numeric parsing happen during lowering.

use serde::Serialize;
use std::fmt;

/// A complete EQL query: a body followed by zero or more pipe stages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Query {
    pub body: QueryBody,
    pub pipes: Vec<Pipe>,
}

/// Query body
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum QueryBody {
    /// `category where condition`
    Simple(SimpleQuery),
    /// `sequence [A where ...] [B where ...]`
    Sequence(SequenceQuery),
    /// `sample by f [A where ...]`
    Sample(SampleQuery),
}

/// Single event query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimpleQuery {
    pub category: Category,
    /// Absent when the query has no `where` clause
    pub condition: Option<Condition>,
}

/// Sequence query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceQuery {
    /// Join keys shared by every step
    pub by: Vec<Field>,
    pub maxspan: Option<Interval>,
    pub steps: Vec<SequenceStep>,
}

/// Sequence step with its optional per-step join keys
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceStep {
    pub query: SimpleQuery,
    pub by: Vec<Field>,
}

/// Sample query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleQuery {
    pub by: Vec<Field>,
    pub steps: Vec<SimpleQuery>,
}

/// Event category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Category {
    /// `any`: matches every category
    Any,
    /// Bare identifier, e.g. `process`
    Name(String),
    /// Raw string token including its quotes, e.g. `"process"`
    Quoted(String),
}

/// Field reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: String,
    /// Written as `?name`
    pub optional: bool,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "?{}", self.name)
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// Literal token, raw source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Literal {
    String(String),
    Number(String),
    Boolean(String),
}

/// Condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    /// `true` / `false`
    Boolean(String),
    /// `not <condition>`
    Not(Box<Condition>),
    /// `( <condition> )`
    Group(Box<Condition>),
    /// `<value> <op> <value>`
    Comparison(Box<Comparison>),
    /// `<field> [not] <lookup op> <list or value>`
    Lookup(Box<Lookup>),
    /// `<funcall>`
    Funcall(Funcall),
    /// `not <funcall>`
    NotFuncall(Funcall),
    /// `<condition> and|or <condition>`
    Logical(Box<Logical>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub op: CompareOp,
    pub left: Value,
    pub right: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lookup {
    pub field: Field,
    pub negated: bool,
    pub op: LookupOp,
    pub target: LookupTarget,
}

/// Right-hand side of a lookup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum LookupTarget {
    List(Vec<Literal>),
    Value(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Logical {
    pub op: LogicOp,
    pub left: Condition,
    pub right: Condition,
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Eq,
    NotEq,
    Greater,
    Less,
    GreaterEq,
    LessEq,
}

impl CompareOp {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "==" => Some(CompareOp::Eq),
            "!=" => Some(CompareOp::NotEq),
            ">" => Some(CompareOp::Greater),
            "<" => Some(CompareOp::Less),
            ">=" => Some(CompareOp::GreaterEq),
            "<=" => Some(CompareOp::LessEq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Greater => ">",
            CompareOp::Less => "<",
            CompareOp::GreaterEq => ">=",
            CompareOp::LessEq => "<=",
        }
    }
}

/// Lookup operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LookupOp {
    /// `:`
    Colon,
    Like,
    LikeInsensitive,
    Regex,
    RegexInsensitive,
    In,
    InInsensitive,
}

impl LookupOp {
    /// Parse an operator token, case-insensitively
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            ":" => Some(LookupOp::Colon),
            "like" => Some(LookupOp::Like),
            "like~" => Some(LookupOp::LikeInsensitive),
            "regex" => Some(LookupOp::Regex),
            "regex~" => Some(LookupOp::RegexInsensitive),
            "in" => Some(LookupOp::In),
            "in~" => Some(LookupOp::InInsensitive),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LookupOp::Colon => ":",
            LookupOp::Like => "like",
            LookupOp::LikeInsensitive => "like~",
            LookupOp::Regex => "regex",
            LookupOp::RegexInsensitive => "regex~",
            LookupOp::In => "in",
            LookupOp::InInsensitive => "in~",
        }
    }
}

/// Logical operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LogicOp {
    And,
    Or,
}

impl LogicOp {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "and" => Some(LogicOp::And),
            "or" => Some(LogicOp::Or),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicOp::And => "and",
            LogicOp::Or => "or",
        }
    }
}

/// Value expression
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Literal(Literal),
    Field(Field),
    Funcall(Funcall),
    Group(Box<Value>),
    /// `<value> (+ - * / %) <value>`
    Arithmetic(Box<Arithmetic>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Arithmetic {
    pub op: ArithmeticOp,
    pub left: Value,
    pub right: Value,
}

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArithmeticOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}

impl ArithmeticOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
            ArithmeticOp::Modulo => "%",
        }
    }
}

/// Function call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Funcall {
    pub name: FuncName,
    pub args: Vec<Value>,
}

/// Canonical spelling of one of the supported EQL functions, including a
/// trailing `~` for case-insensitive variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuncName(String);

/// Base names accepted by the grammar, in canonical spelling
pub const FUNCTION_NAMES: &[&str] = &[
    "add",
    "between",
    "cidrMatch",
    "concat",
    "divide",
    "endsWith",
    "indexOf",
    "length",
    "modulo",
    "multiply",
    "number",
    "startsWith",
    "string",
    "stringContains",
    "substring",
    "subtract",
];

impl FuncName {
    /// Canonicalise a function-name token (`STARTSWITH~` -> `startsWith~`)
    pub fn from_token(token: &str) -> Option<Self> {
        let (base, suffix) = match token.strip_suffix('~') {
            Some(base) => (base, "~"),
            None => (token, ""),
        };
        FUNCTION_NAMES
            .iter()
            .find(|name| name.eq_ignore_ascii_case(base))
            .map(|name| FuncName(format!("{}{}", name, suffix)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.0.ends_with('~')
    }
}

impl fmt::Display for FuncName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pipe stage
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Pipe {
    Head(u64),
    Tail(u64),
    Count,
    Unique(Vec<Field>),
    Filter(Condition),
    Sort(Vec<Field>),
}

impl Pipe {
    pub fn name(&self) -> &'static str {
        match self {
            Pipe::Head(_) => "head",
            Pipe::Tail(_) => "tail",
            Pipe::Count => "count",
            Pipe::Unique(_) => "unique",
            Pipe::Filter(_) => "filter",
            Pipe::Sort(_) => "sort",
        }
    }
}

/// Duration (maxspan)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interval {
    pub value: u64,
    pub unit: IntervalUnit,
}

/// Duration unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntervalUnit {
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl Interval {
    /// Total length in milliseconds, `None` on overflow
    pub fn as_millis(&self) -> Option<u64> {
        let factor = match self.unit {
            IntervalUnit::Milliseconds => 1,
            IntervalUnit::Seconds => 1_000,
            IntervalUnit::Minutes => 60_000,
            IntervalUnit::Hours => 3_600_000,
            IntervalUnit::Days => 86_400_000,
        };
        self.value.checked_mul(factor)
    }
}

impl Query {
    /// Short name of the query shape, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match &self.body {
            QueryBody::Simple(_) => "simple",
            QueryBody::Sequence(_) => "sequence",
            QueryBody::Sample(_) => "sample",
        }
    }

    /// Get all field references in the query
    pub fn field_refs(&self) -> Vec<&Field> {
        let mut refs = Vec::new();
        match &self.body {
            QueryBody::Simple(q) => collect_simple(q, &mut refs),
            QueryBody::Sequence(sq) => {
                refs.extend(sq.by.iter());
                for step in &sq.steps {
                    collect_simple(&step.query, &mut refs);
                    refs.extend(step.by.iter());
                }
            }
            QueryBody::Sample(sq) => {
                refs.extend(sq.by.iter());
                for step in &sq.steps {
                    collect_simple(step, &mut refs);
                }
            }
        }
        for pipe in &self.pipes {
            match pipe {
                Pipe::Unique(fields) | Pipe::Sort(fields) => refs.extend(fields.iter()),
                Pipe::Filter(cond) => collect_condition(cond, &mut refs),
                Pipe::Head(_) | Pipe::Tail(_) | Pipe::Count => {}
            }
        }
        refs
    }
}

fn collect_simple<'a>(query: &'a SimpleQuery, refs: &mut Vec<&'a Field>) {
    if let Some(cond) = &query.condition {
        collect_condition(cond, refs);
    }
}

fn collect_condition<'a>(cond: &'a Condition, refs: &mut Vec<&'a Field>) {
    match cond {
        Condition::Boolean(_) => {}
        Condition::Not(inner) | Condition::Group(inner) => collect_condition(inner, refs),
        Condition::Comparison(c) => {
            collect_value(&c.left, refs);
            collect_value(&c.right, refs);
        }
        Condition::Lookup(l) => {
            refs.push(&l.field);
            if let LookupTarget::Value(v) = &l.target {
                collect_value(v, refs);
            }
        }
        Condition::Funcall(f) | Condition::NotFuncall(f) => {
            for arg in &f.args {
                collect_value(arg, refs);
            }
        }
        Condition::Logical(l) => {
            collect_condition(&l.left, refs);
            collect_condition(&l.right, refs);
        }
    }
}

fn collect_value<'a>(value: &'a Value, refs: &mut Vec<&'a Field>) {
    match value {
        Value::Null | Value::Literal(_) => {}
        Value::Field(f) => refs.push(f),
        Value::Funcall(f) => {
            for arg in &f.args {
                collect_value(arg, refs);
            }
        }
        Value::Group(inner) => collect_value(inner, refs),
        Value::Arithmetic(a) => {
            collect_value(&a.left, refs);
            collect_value(&a.right, refs);
        }
    }
}
