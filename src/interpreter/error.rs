use crate::diagnostic::{Diagnostic, Label, Span};

/// A runtime condition. None of these abort evaluation: the interpreter
/// records the condition and continues with nil as the expression's value.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeError {
    UndefinedVariable { name: String, span: Span },
    UndefinedAttribute { name: String, span: Span },
    IllegalAttribute { type_name: &'static str, span: Span },
    NotCallable { type_name: &'static str, span: Span },
    ArityMismatch { name: String, expected: usize, found: usize, span: Span },
}

impl RuntimeError {
    pub fn span(&self) -> Span {
        match self {
            Self::UndefinedVariable { span, .. } => *span,
            Self::UndefinedAttribute { span, .. } => *span,
            Self::IllegalAttribute { span, .. } => *span,
            Self::NotCallable { span, .. } => *span,
            Self::ArityMismatch { span, .. } => *span,
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            Self::UndefinedVariable { name, span } => {
                Diagnostic::error(format!("undefined variable `{}`", name))
                    .with_code("E0201")
                    .with_label(Label::primary(*span, "not found in any scope"))
            }
            Self::UndefinedAttribute { name, span } => {
                Diagnostic::error(format!("undefined attribute `{}`", name))
                    .with_code("E0202")
                    .with_label(Label::primary(*span, "no such attribute or method"))
            }
            Self::IllegalAttribute { type_name, span } => {
                Diagnostic::error(format!("a {} has no attributes", type_name))
                    .with_code("E0203")
                    .with_label(Label::primary(*span, "attribute access on this value"))
            }
            Self::NotCallable { type_name, span } => {
                Diagnostic::error(format!("a {} is not callable", type_name))
                    .with_code("E0204")
                    .with_label(Label::primary(*span, "call of this value"))
            }
            Self::ArityMismatch {
                name,
                expected,
                found,
                span,
            } => Diagnostic::error(format!(
                "`{}` takes {} argument{} but {} {} supplied",
                name,
                expected,
                if *expected == 1 { "" } else { "s" },
                found,
                if *found == 1 { "was" } else { "were" }
            ))
            .with_code("E0205")
            .with_label(Label::primary(*span, "in this call")),
        }
    }
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UndefinedVariable { name, .. } => {
                write!(f, "undefined variable `{}`", name)
            }
            Self::UndefinedAttribute { name, .. } => {
                write!(f, "undefined attribute `{}`", name)
            }
            Self::IllegalAttribute { type_name, .. } => {
                write!(f, "a {} has no attributes", type_name)
            }
            Self::NotCallable { type_name, .. } => {
                write!(f, "a {} is not callable", type_name)
            }
            Self::ArityMismatch {
                name,
                expected,
                found,
                ..
            } => write!(
                f,
                "`{}` takes {} arguments but {} were supplied",
                name, expected, found
            ),
        }
    }
}

impl std::error::Error for RuntimeError {}
