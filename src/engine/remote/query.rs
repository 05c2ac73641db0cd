use serde::Deserialize;

use crate::engine::types::TermValue;

/// A field term as sent to the remote engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegroupTerm {
    pub field: String,
    pub value: TermValue,
}

impl RegroupTerm {
    pub fn int(field: impl Into<String>, value: i64) -> Self {
        Self {
            field: field.into(),
            value: TermValue::Int(value),
        }
    }

    pub fn string(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: TermValue::Str(value.into()),
        }
    }

    pub fn is_int_field(&self) -> bool {
        matches!(self.value, TermValue::Int(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BooleanOp {
    And,
    Or,
    Not,
}

/// Document predicate evaluated by the remote engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "QueryJson")]
pub enum Query {
    Term(RegroupTerm),
    Boolean { op: BooleanOp, operands: Vec<Query> },
    Range {
        start: RegroupTerm,
        end: RegroupTerm,
        max_inclusive: bool,
    },
}

/// Term that never occurs in real data; used to build always-true rules.
pub const FAKE_FIELD: &str = "fakeField";

impl Query {
    pub fn term(term: RegroupTerm) -> Self {
        Query::Term(term)
    }

    /// `NOT fakeField:""`, which every document satisfies.
    pub fn match_all() -> Self {
        Query::Boolean {
            op: BooleanOp::Not,
            operands: vec![Query::Term(RegroupTerm::string(FAKE_FIELD, ""))],
        }
    }
}

/// Moves documents of `target` into `positive` when `query` matches and
/// into `negative` otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRemapRule {
    pub target: usize,
    pub query: Query,
    pub negative: usize,
    pub positive: usize,
}

/// Multi-way regroup of one group: documents holding `conditions[i]` move
/// to `positives[i]` (first match wins), `negative` receives the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMultiRemapRule {
    pub target: usize,
    pub negative: usize,
    pub positives: Vec<usize>,
    pub conditions: Vec<RegroupTerm>,
}

impl GroupMultiRemapRule {
    /// Moves every document of `target` to `new_group`.
    pub fn unconditional(target: usize, new_group: usize) -> Self {
        Self {
            target,
            negative: new_group,
            positives: Vec::new(),
            conditions: Vec::new(),
        }
    }
}

/// Target, negative and positive groups of a two-way regroup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupMove {
    pub target: usize,
    pub negative: usize,
    pub positive: usize,
}

impl GroupMove {
    pub fn new(target: usize, negative: usize, positive: usize) -> Self {
        Self {
            target,
            negative,
            positive,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
enum QueryType {
    Term,
    Boolean,
    Range,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TermJson {
    field: String,
    is_int_field: bool,
    int_term: Option<i64>,
    string_term: Option<String>,
}

impl TryFrom<TermJson> for RegroupTerm {
    type Error = String;

    fn try_from(json: TermJson) -> Result<Self, Self::Error> {
        match (json.is_int_field, json.int_term, json.string_term) {
            (true, Some(v), _) => Ok(RegroupTerm::int(json.field, v)),
            (false, _, Some(s)) => Ok(RegroupTerm::string(json.field, s)),
            (true, None, _) => Err(format!("int term on {} has no intTerm", json.field)),
            (false, _, None) => Err(format!("string term on {} has no stringTerm", json.field)),
        }
    }
}

/// Wire shape: `{"type": "TERM" | "BOOLEAN" | "RANGE", ...}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryJson {
    #[serde(rename = "type")]
    query_type: QueryType,
    start_term: Option<TermJson>,
    end_term: Option<TermJson>,
    operator: Option<BooleanOp>,
    #[serde(default)]
    operands: Vec<Query>,
    #[serde(default)]
    is_max_inclusive: bool,
}

impl TryFrom<QueryJson> for Query {
    type Error = String;

    fn try_from(json: QueryJson) -> Result<Self, Self::Error> {
        match json.query_type {
            QueryType::Term => {
                let term = json.start_term.ok_or("TERM query needs startTerm")?;
                Ok(Query::Term(term.try_into()?))
            }
            QueryType::Boolean => Ok(Query::Boolean {
                op: json.operator.ok_or("BOOLEAN query needs operator")?,
                operands: json.operands,
            }),
            QueryType::Range => {
                let start = json.start_term.ok_or("RANGE query needs startTerm")?;
                let end = json.end_term.ok_or("RANGE query needs endTerm")?;
                Ok(Query::Range {
                    start: start.try_into()?,
                    end: end.try_into()?,
                    max_inclusive: json.is_max_inclusive,
                })
            }
        }
    }
}
