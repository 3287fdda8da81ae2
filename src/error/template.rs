use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unclosed action starting at offset {offset}")]
    UnclosedAction { offset: usize },
    #[error("empty action at offset {offset}")]
    EmptyAction { offset: usize },
    #[error("unterminated string literal at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("unknown escape '\\{escape}' at offset {offset}")]
    UnknownEscape { escape: char, offset: usize },
    #[error("unexpected '{token}' at offset {offset}")]
    UnexpectedToken { token: String, offset: usize },
    #[error("unbalanced parentheses at offset {offset}")]
    UnbalancedParens { offset: usize },
    #[error("function \"{name}\" not defined")]
    UnknownFunction { name: String },
    #[error("wrong number of args for {name}: want {expected}, got {actual}")]
    WrongArity {
        name: &'static str,
        expected: String,
        actual: usize,
    },
    #[error("{name} expects a string literal pattern")]
    PatternNotLiteral { name: &'static str },
    #[error("invalid regex pattern {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: rand_regex::Error,
    },
    #[error("{function}: argument {value:?} is not an integer")]
    NotAnInteger {
        function: &'static str,
        value: String,
    },
    #[error("{function}: empty range {low}..={high}")]
    EmptyRange {
        function: &'static str,
        low: i64,
        high: i64,
    },
    #[error("{function}: invalid base64 input: {source}")]
    InvalidBase64 {
        function: &'static str,
        #[source]
        source: base64::DecodeError,
    },
}
