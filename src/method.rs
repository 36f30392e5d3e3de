//! Procedure registry.
//!
//! Each registered signature is split into special parameters, injected by the
//! dispatcher, and ordinary ones, which become the fields of a synthesized
//! `<Name>Parameters` struct. The codec and the generated interface are both
//! derived from that one struct.

use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::codec::Codec;
use crate::error::{GenError, Result};
use crate::ir::{is_identifier, Field, StructDef, Ty};
use crate::table::{DefId, TypeTable};

pub const SESSION_PARAMETER: &str = "session";
pub const CREDENTIALS_PARAMETER: &str = "credentials";

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
    pub default: Option<Value>,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self { name: name.into(), ty, default: None }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }
}

/// A procedure as declared by the server, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<Param>,
    pub returns: Ty,
    pub rate_limit: u32,
}

impl Signature {
    pub fn new(name: impl Into<String>, returns: Ty) -> Self {
        Self { name: name.into(), doc: None, params: Vec::new(), returns, rate_limit: 0 }
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn rate_limit(mut self, seconds: u32) -> Self {
        self.rate_limit = seconds;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    pub name: String,              // also the route key
    pub doc: Option<String>,
    pub params: DefId,             // synthesized parameter struct
    pub returns: Ty,
    pub uses_session: bool,
    pub session_optional: bool,
    pub uses_credentials: bool,
    pub rate_limit: u32,           // seconds, 0 disables limiting
    pub codec: Codec,
}

/// Every exposed procedure plus the definitions their types refer to.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    types: TypeTable,
    methods: IndexMap<String, MethodDescriptor>,
}

impl Registry {
    pub fn new(types: TypeTable) -> Self {
        Self { types, methods: IndexMap::new() }
    }

    pub fn types(&self) -> &TypeTable { &self.types }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> + '_ {
        self.methods.values()
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }

    pub fn len(&self) -> usize { self.methods.len() }
    pub fn is_empty(&self) -> bool { self.methods.is_empty() }

    pub fn register(&mut self, signature: Signature) -> Result<&MethodDescriptor> {
        let Signature { name, doc, params, returns, rate_limit } = signature;
        if !is_identifier(&name) {
            return Err(GenError::InvalidIdentifier(name));
        }
        if self.methods.contains_key(&name) {
            return Err(GenError::DuplicateMethod(name));
        }

        let mut uses_session = false;
        let mut session_optional = false;
        let mut uses_credentials = false;
        let mut def = StructDef::new(parameters_type_name(&name));
        for param in params {
            match param.name.as_str() {
                SESSION_PARAMETER => {
                    uses_session = true;
                    session_optional = param.ty.admits_absence();
                }
                CREDENTIALS_PARAMETER => uses_credentials = true,
                _ => {
                    let field = Field::new(param.name, param.ty);
                    def.fields.push(match param.default {
                        Some(default) => field.with_default(default),
                        None => field,
                    });
                }
            }
        }
        let params = self.types.insert(def)?;

        debug!(
            method = %name,
            params = %parameters_type_name(&name),
            uses_session,
            session_optional,
            uses_credentials,
            rate_limit,
            "registered method"
        );
        let descriptor = MethodDescriptor {
            codec: Codec::new(params, returns.clone()),
            name: name.clone(),
            doc,
            params,
            returns,
            uses_session,
            session_optional,
            uses_credentials,
            rate_limit,
        };
        let entry = self.methods.entry(name).or_insert(descriptor);
        Ok(entry)
    }
}

pub fn parameters_type_name(method: &str) -> String {
    format!("{}Parameters", method.to_upper_camel_case())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Definition, Primitive};
    use serde_json::json;

    fn update_todo() -> Signature {
        Signature::new("update_todo", Ty::null())
            .param(Param::new("todo_id", Ty::string()))
            .param(Param::new("title", Ty::Union(vec![Ty::string(), Ty::Absent])))
            .param(Param::new("session", Ty::Union(vec![Ty::string(), Ty::null()])))
            .param(Param::new("limit", Ty::number()).with_default(json!(20)))
            .param(Param::new("credentials", Ty::Any))
    }

    #[test]
    fn special_parameters_are_excluded_from_struct() {
        let mut reg = Registry::default();
        let m = reg.register(update_todo()).unwrap().clone();
        assert!(m.uses_session);
        assert!(m.session_optional);
        assert!(m.uses_credentials);
        assert_eq!(m.rate_limit, 0);

        let Definition::Struct(def) = reg.types().get(m.params).unwrap() else {
            panic!("parameters must be a struct");
        };
        assert_eq!(def.name, "UpdateTodoParameters");
        let names: Vec<&str> = def.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["todo_id", "title", "limit"]);
        assert_eq!(def.fields[2].default, Some(json!(20)));
        assert_eq!(def.required_fields(), 1);
    }

    #[test]
    fn required_session_is_detected() {
        let mut reg = Registry::default();
        let sig = Signature::new("whoami", Ty::string())
            .param(Param::new("session", Ty::Primitive(Primitive::String)))
            .rate_limit(5);
        let m = reg.register(sig).unwrap();
        assert!(m.uses_session);
        assert!(!m.session_optional);
        assert!(!m.uses_credentials);
        assert_eq!(m.rate_limit, 5);
    }

    #[test]
    fn duplicate_and_invalid_names_are_fatal() {
        let mut reg = Registry::default();
        reg.register(Signature::new("ping", Ty::null())).unwrap();
        assert!(matches!(reg.register(Signature::new("ping", Ty::null())), Err(GenError::DuplicateMethod(_))));
        assert!(matches!(reg.register(Signature::new("bad-name", Ty::null())), Err(GenError::InvalidIdentifier(_))));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn parameters_name_collision_is_fatal() {
        let mut types = TypeTable::new();
        types.insert(StructDef::new("PingParameters")).unwrap();
        let mut reg = Registry::new(types);
        let err = reg.register(Signature::new("ping", Ty::null())).unwrap_err();
        assert!(matches!(err, GenError::DuplicateDefinition(name) if name == "PingParameters"));
    }

    #[test]
    fn registration_order_is_kept() {
        let mut reg = Registry::default();
        for name in ["create_todo", "get_todos", "delete_todo"] {
            reg.register(Signature::new(name, Ty::null())).unwrap();
        }
        let names: Vec<&str> = reg.methods().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["create_todo", "get_todos", "delete_todo"]);
        assert_eq!(parameters_type_name("get_todos"), "GetTodosParameters");
    }
}
