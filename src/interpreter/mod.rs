pub mod environment;
pub mod error;
pub mod evaluator;
pub mod parser;

pub use environment::Environment;
pub use error::RuntimeError;
pub use evaluator::{parse_and_run, Interpreter, RunOutcome};
pub use parser::{parse_source, ParseError, ParseResult, TokenParser};
