use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed statement, one variant per supported form.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateTable(CreateTableStatement),
    Insert(InsertStatement),
    Select(SelectStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableStatement {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

/// A declared column. The type text is advisory only; the store does not
/// enforce it at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub declared_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<BindValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub table: String,
    /// Projection list as written. Full records are always returned; the
    /// list is accepted but not applied (known limitation).
    pub columns: Vec<String>,
    pub conditions: Option<Vec<Condition>>,
    pub order_by: Option<OrderBy>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub assignments: Vec<(String, BindValue)>,
    pub conditions: Vec<Condition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub conditions: Vec<Condition>,
}

/// One `column op rhs` term of a WHERE conjunction.
///
/// Evaluation binds the i-th condition to the i-th caller-supplied
/// parameter; `rhs` records what was written but is not consulted when
/// filtering.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: CompareOp,
    pub rhs: BindValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Like,
    Gt,
    Lt,
}

/// A placeholder (`?` / `:name`) or literal in value position.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Placeholder(String),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}
