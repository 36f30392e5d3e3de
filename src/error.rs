use thiserror::Error;

/// Fatal errors raised while building the registry or generating bindings.
///
/// None of these are transient: each one means a procedure's types were
/// declared in a way that cannot be rendered faithfully.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("unsupported literal type: {0}")]
    UnsupportedLiteral(String),
    #[error("type alias refers to itself without an intervening interface: {}", .cycle.join(" -> "))]
    AliasCycle { cycle: Vec<String> },
    #[error("`{name}` expects {expected} type argument(s), got {found}")]
    GenericArity { name: String, expected: usize, found: usize },
    #[error("type `{0}` is declared more than once")]
    DuplicateDefinition(String),
    #[error("type `{0}` was declared but never defined")]
    UndefinedDefinition(String),
    #[error("definition #{0} does not belong to this table")]
    UnknownDefinition(u32),
    #[error("method `{0}` is registered more than once")]
    DuplicateMethod(String),
    #[error("parameters type `{0}` is not an interface")]
    ParametersNotStruct(String),
    #[error("`{0}` is not a valid identifier")]
    InvalidIdentifier(String),
}

pub type Result<T, E = GenError> = std::result::Result<T, E>;
