//! Append-only text sink used by the generator.

use serde_json::Value;

use crate::error::{GenError, Result};

#[derive(Debug, Default, Clone)]
pub struct Emitter {
    buf: String,
}

impl Emitter {
    pub fn new() -> Self { Self::default() }

    pub fn write(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    pub fn writeln(&mut self, text: &str) {
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    /// Render each item with `f`, writing `separator` between consecutive items only.
    pub fn intersperse<I, F, E>(&mut self, separator: &str, items: I, mut f: F) -> Result<(), E>
    where
        I: IntoIterator,
        F: FnMut(&mut Self, I::Item) -> Result<(), E>,
    {
        let mut first = true;
        for item in items {
            if !first {
                self.write(separator);
            }
            first = false;
            f(self, item)?;
        }
        Ok(())
    }

    /// Write a literal value. Strings are quoted; only scalars are representable.
    pub fn literal(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write("null"),
            Value::Bool(true) => self.write("true"),
            Value::Bool(false) => self.write("false"),
            Value::Number(n) => self.write(&n.to_string()),
            Value::String(_) => self.write(&value.to_string()),
            Value::Array(_) | Value::Object(_) => {
                return Err(GenError::UnsupportedLiteral(value.to_string()));
            }
        }
        Ok(())
    }

    /// Write a JSDoc block for `doc`. Nothing is written when the doc is missing or blank.
    pub fn doc(&mut self, doc: Option<&str>, indent: &str) {
        let Some(doc) = doc.map(str::trim).filter(|d| !d.is_empty()) else {
            return;
        };
        // `*/` would close the comment early
        let doc = doc.replace("*/", "*\\/");
        let lines: Vec<&str> = doc.lines().map(str::trim).collect();
        if let [line] = lines.as_slice() {
            self.writeln(&format!("{indent}/** {line} */"));
            return;
        }
        self.writeln(&format!("{indent}/**"));
        for line in lines {
            if line.is_empty() {
                self.writeln(&format!("{indent} *"));
            } else {
                self.writeln(&format!("{indent} * {line}"));
            }
        }
        self.writeln(&format!("{indent} */"));
    }

    pub fn is_empty(&self) -> bool { self.buf.is_empty() }
    pub fn as_str(&self) -> &str { &self.buf }
    pub fn into_string(self) -> String { self.buf }
}
