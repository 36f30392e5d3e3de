use serde::Deserialize;

/// Settings for the generated artifact.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenOptions {
    /// Written verbatim at the top of the artifact (imports, client bootstrap).
    pub preamble: String,
    /// Expression every wrapper delegates to, called as `dispatch(name, parameters)`.
    pub dispatch: String,
    /// Generic type wrapping every return type.
    pub result_type: String,
    pub indent: usize,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            preamble: String::new(),
            dispatch: "app.method".to_string(),
            result_type: "MethodResult".to_string(),
            indent: 4,
        }
    }
}

impl GenOptions {
    pub fn indent_str(&self) -> String {
        " ".repeat(self.indent)
    }
}
