//! Cookie-backed credentials handed to procedures that ask for them.

use indexmap::IndexMap;

pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    values: IndexMap<String, String>,
    set_cookies: Vec<String>,
}

impl Credentials {
    /// Parse a `Cookie` request header the way browsers send it, not the way RFC 6265 says.
    pub fn from_cookie_header(header: Option<&str>) -> Self {
        let mut values = IndexMap::new();
        for chunk in header.unwrap_or_default().split(';') {
            // a chunk without `=` is a value with an empty name
            let (key, value) = chunk.split_once('=').unwrap_or(("", chunk));
            let (key, value) = (key.trim(), value.trim());
            if !key.is_empty() || !value.is_empty() {
                values.insert(key.to_string(), unquote(value));
            }
        }
        Self { values, set_cookies: Vec::new() }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.get(SESSION_COOKIE)
    }

    pub fn set_session(&mut self, session_id: Option<&str>) {
        self.set(SESSION_COOKIE, session_id);
    }

    /// Set or clear a credential. Every change queues a `Set-Cookie` header.
    pub fn set(&mut self, key: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.values.insert(key.to_string(), value.to_string());
            }
            None => {
                self.values.shift_remove(key);
            }
        }
        self.set_cookies.push(format!(
            "{key}={}; Path=/; HttpOnly; Secure; SameSite=Strict",
            value.unwrap_or_default()
        ));
    }

    pub fn into_set_cookies(self) -> Vec<String> {
        self.set_cookies
    }
}

fn unquote(value: &str) -> String {
    let inner = match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner,
        None => return value.to_string(),
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            c => out.push(c),
        }
    }
    out
}
