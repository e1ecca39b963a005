pub mod ast;
pub mod cli;
pub mod diagnostic;
pub mod interpreter;
pub mod lexer;
pub mod value;

pub use ast::{Expr, ExprKind, Stmt};
pub use lexer::{SpannedToken, Token};
pub use value::Value;
