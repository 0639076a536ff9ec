pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::{
    BindValue, ColumnDef, CompareOp, Condition, CreateTableStatement, DeleteStatement,
    InsertStatement, OrderBy, SelectStatement, Statement, UpdateStatement,
};
pub use parser::parse;
