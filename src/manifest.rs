//! JSON manifests describing procedures and the types they use.
//!
//! The manifest is the registration front-end: type expressions are
//! classified into [`Ty`] once, here, and nothing downstream looks at the
//! manifest again. Every type name is declared before any body is
//! classified, so forward, self and mutual references all resolve.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;

use crate::config::GenOptions;
use crate::error::GenError;
use crate::ir::{AliasDef, Definition, EnumDef, EnumMember, Field, StructDef, Ty};
use crate::method::{Param, Registry, Signature};
use crate::table::TypeTable;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("at {path}: {message}")]
    Syntax { path: String, message: String },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown type `{name}` in {context}")]
    UnknownType { name: String, context: String },
    #[error("type `{0}` is declared in more than one manifest")]
    DuplicateType(String),
    #[error(transparent)]
    Gen(#[from] GenError),
}

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub options: Option<GenOptions>,
    #[serde(default)]
    pub types: IndexMap<String, TypeDecl>,
    #[serde(default)]
    pub methods: Vec<MethodDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeDecl {
    Struct {
        #[serde(default)]
        doc: Option<String>,
        #[serde(default)]
        generics: Vec<String>,
        #[serde(default)]
        fields: Vec<FieldDecl>,
    },
    Enum {
        #[serde(default)]
        doc: Option<String>,
        members: IndexMap<String, Value>,
    },
    Alias {
        #[serde(default)]
        generics: Vec<String>,
        #[serde(rename = "type")]
        ty: TypeExpr,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(default)]
    pub optional: bool,
    #[serde(default, deserialize_with = "present")]
    pub default: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodDecl {
    pub name: String,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    pub returns: TypeExpr,
    #[serde(default)]
    pub rate_limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeExpr,
    #[serde(default, deserialize_with = "present")]
    pub default: Option<Value>,
}

/// A type expression: a bare name, or one of the compound forms.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TypeExpr {
    Name(String),
    Compound(Box<Compound>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub enum Compound {
    Array(TypeExpr),
    Set(TypeExpr),
    Tuple(Vec<TypeExpr>),
    Variadic(TypeExpr),
    Record(TypeExpr, TypeExpr),
    Union(Vec<TypeExpr>),
    Literal(Vec<Value>),
    Optional(TypeExpr),
    Ref {
        name: String,
        #[serde(default)]
        args: Vec<TypeExpr>,
    },
}

// `"default": null` is a real default, unlike a missing key
fn present<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(de).map(Some)
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Manifest {
    pub fn parse(src: &str) -> Result<Self, ManifestError> {
        crate::path_de::from_str_with_path(src)
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let bytes = std::fs::read(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        crate::path_de::from_slice_with_path(&bytes)
    }

    /// Fold another manifest into this one. The first `options` section wins.
    pub fn merge(&mut self, other: Manifest) -> Result<(), ManifestError> {
        if self.options.is_none() {
            self.options = other.options;
        }
        for (name, decl) in other.types {
            if self.types.contains_key(&name) {
                return Err(ManifestError::DuplicateType(name));
            }
            self.types.insert(name, decl);
        }
        self.methods.extend(other.methods);
        Ok(())
    }

    pub fn into_registry(self) -> Result<(Registry, GenOptions), ManifestError> {
        let mut table = TypeTable::new();
        let ids = self
            .types
            .keys()
            .map(|name| table.declare(name))
            .collect::<Result<Vec<_>, GenError>>()?;

        for ((name, decl), id) in self.types.iter().zip(ids) {
            let def = classify_decl(&table, name, decl)?;
            table.define(id, def)?;
        }

        let mut registry = Registry::new(table);
        for method in &self.methods {
            let signature = classify_method(registry.types(), method)?;
            registry.register(signature)?;
        }
        Ok((registry, self.options.unwrap_or_default()))
    }
}

fn classify_decl(table: &TypeTable, name: &str, decl: &TypeDecl) -> Result<Definition, ManifestError> {
    let def = match decl {
        TypeDecl::Struct { doc, generics, fields } => {
            let mut def = StructDef::new(name).generics(generics.iter().cloned());
            def.doc = doc.clone();
            for field in fields {
                let context = format!("field `{name}.{}`", field.name);
                let ty = classify(table, &field.ty, generics, &context)?;
                let mut out = Field::new(field.name.clone(), ty);
                if field.optional {
                    out = out.optional();
                }
                if let Some(default) = &field.default {
                    out = out.with_default(default.clone());
                }
                def.fields.push(out);
            }
            Definition::Struct(def)
        }
        TypeDecl::Enum { doc, members } => Definition::Enum(EnumDef {
            name: name.to_string(),
            members: members
                .iter()
                .map(|(name, value)| EnumMember { name: name.clone(), value: value.clone() })
                .collect(),
            doc: doc.clone(),
        }),
        TypeDecl::Alias { generics, ty } => {
            let context = format!("alias `{name}`");
            let body = classify(table, ty, generics, &context)?;
            Definition::Alias(AliasDef::new(name, body).generics(generics.iter().cloned()))
        }
    };
    Ok(def)
}

fn classify_method(table: &TypeTable, method: &MethodDecl) -> Result<Signature, ManifestError> {
    let mut params = Vec::with_capacity(method.params.len());
    for param in &method.params {
        let context = format!("parameter `{}` of method `{}`", param.name, method.name);
        let ty = classify(table, &param.ty, &[], &context)?;
        params.push(Param { name: param.name.clone(), ty, default: param.default.clone() });
    }
    let context = format!("return type of method `{}`", method.name);
    Ok(Signature {
        name: method.name.clone(),
        doc: method.doc.clone(),
        params,
        returns: classify(table, &method.returns, &[], &context)?,
        rate_limit: method.rate_limit,
    })
}

/// Classify one type expression. `generics` are the parameters in scope.
pub fn classify(table: &TypeTable, expr: &TypeExpr, generics: &[String], context: &str) -> Result<Ty, ManifestError> {
    let each = |exprs: &[TypeExpr]| {
        exprs
            .iter()
            .map(|e| classify(table, e, generics, context))
            .collect::<Result<Vec<_>, _>>()
    };
    let compound = match expr {
        TypeExpr::Name(name) => return classify_name(table, name, generics, context),
        TypeExpr::Compound(compound) => compound.as_ref(),
    };
    let ty = match compound {
        Compound::Array(elem) | Compound::Set(elem) => Ty::array(classify(table, elem, generics, context)?),
        Compound::Variadic(elem) => Ty::variadic(classify(table, elem, generics, context)?),
        Compound::Tuple(elems) => Ty::tuple(each(elems)?),
        Compound::Record(key, value) => Ty::record(
            classify(table, key, generics, context)?,
            classify(table, value, generics, context)?,
        ),
        Compound::Union(members) => Ty::Union(each(members)?),
        Compound::Literal(values) => Ty::Literals(values.clone()),
        Compound::Optional(inner) => Ty::optional(classify(table, inner, generics, context)?),
        Compound::Ref { name, args } => match classify_name(table, name, generics, context)? {
            Ty::Named { def, .. } => Ty::named_with(def, each(args)?),
            other if args.is_empty() => other,
            _ => {
                return Err(GenError::GenericArity {
                    name: name.clone(),
                    expected: 0,
                    found: args.len(),
                }
                .into());
            }
        },
    };
    Ok(ty)
}

fn classify_name(table: &TypeTable, name: &str, generics: &[String], context: &str) -> Result<Ty, ManifestError> {
    if generics.iter().any(|g| g == name) {
        return Ok(Ty::generic(name));
    }
    if let Some(ty) = builtin(name) {
        return Ok(ty);
    }
    table.lookup(name).map(Ty::named).ok_or_else(|| ManifestError::UnknownType {
        name: name.to_string(),
        context: context.to_string(),
    })
}

fn builtin(name: &str) -> Option<Ty> {
    let ty = match name {
        "null" | "none" => Ty::null(),
        "bool" | "boolean" => Ty::bool(),
        "int" | "float" | "number" => Ty::number(),
        "str" | "string" | "bytes" | "datetime" => Ty::string(),
        "any" => Ty::Any,
        "unset" | "undefined" => Ty::Absent,
        _ => return None,
    };
    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::generate;
    use serde_json::json;

    #[test]
    fn todo_manifest_generates_snapshot() {
        let manifest = Manifest::parse(include_str!("../fixtures/todo.json")).unwrap();
        let (registry, options) = manifest.into_registry().unwrap();
        assert_eq!(registry.len(), 4);
        let out = generate(&registry, &options).unwrap();
        assert_eq!(out, include_str!("../fixtures/todo.ts"));
    }

    #[test]
    fn shapes_manifest_generates_snapshot() {
        let manifest = Manifest::parse(include_str!("../fixtures/shapes.json")).unwrap();
        let (registry, options) = manifest.into_registry().unwrap();
        assert_eq!(options.indent, 2);
        let out = generate(&registry, &options).unwrap();
        assert_eq!(out, include_str!("../fixtures/shapes.ts"));
    }

    #[test]
    fn compound_forms_classify() {
        let src = r#"{
            "types": {
                "Tree": { "kind": "alias", "generics": ["T"], "type": { "union": [
                    "T",
                    { "array": { "ref": { "name": "Tree", "args": ["T"] } } }
                ] } },
                "Mode": { "kind": "enum", "members": { "READ": "r", "WRITE": "w" } }
            },
            "methods": [
                { "name": "probe", "params": [
                    { "name": "pair", "type": { "tuple": ["int", "str"] } },
                    { "name": "many", "type": { "variadic": "bytes" } },
                    { "name": "tags", "type": { "set": "str" } },
                    { "name": "index", "type": { "record": ["str", "Mode"] } },
                    { "name": "level", "type": { "literal": ["low", "high", 3] } },
                    { "name": "tree", "type": { "ref": { "name": "Tree", "args": ["int"] } } }
                ], "returns": { "optional": "datetime" } }
            ]
        }"#;
        let (registry, _) = Manifest::parse(src).unwrap().into_registry().unwrap();
        let types = registry.types();
        let tree = types.lookup("Tree").unwrap();
        let mode = types.lookup("Mode").unwrap();
        let method = registry.method("probe").unwrap();
        assert_eq!(method.returns, Ty::optional(Ty::string()));

        let Definition::Struct(params) = types.get(method.params).unwrap() else { panic!() };
        let tys: Vec<&Ty> = params.fields.iter().map(|f| &f.ty).collect();
        assert_eq!(tys[0], &Ty::tuple(vec![Ty::number(), Ty::string()]));
        assert_eq!(tys[1], &Ty::variadic(Ty::string()));
        assert_eq!(tys[2], &Ty::array(Ty::string()));
        assert_eq!(tys[3], &Ty::record(Ty::string(), Ty::named(mode)));
        assert_eq!(tys[4], &Ty::Literals(vec![json!("low"), json!("high"), json!(3)]));
        assert_eq!(tys[5], &Ty::named_with(tree, vec![Ty::number()]));

        let Definition::Alias(alias) = types.get(tree).unwrap() else { panic!() };
        assert_eq!(
            alias.ty,
            Ty::Union(vec![Ty::generic("T"), Ty::array(Ty::named_with(tree, vec![Ty::generic("T")]))])
        );
    }

    #[test]
    fn null_default_differs_from_no_default() {
        let src = r#"{ "methods": [ { "name": "f", "params": [
            { "name": "a", "type": { "union": ["str", "null"] }, "default": null },
            { "name": "b", "type": { "union": ["str", "null"] } }
        ], "returns": "null" } ] }"#;
        let (registry, _) = Manifest::parse(src).unwrap().into_registry().unwrap();
        let method = registry.method("f").unwrap();
        let Definition::Struct(params) = registry.types().get(method.params).unwrap() else { panic!() };
        assert_eq!(params.fields[0].default, Some(Value::Null));
        assert!(!params.fields[0].is_required());
        assert_eq!(params.fields[1].default, None);
        assert!(params.fields[1].is_required());
    }

    #[test]
    fn bare_names_must_be_identifiers() {
        let src = r#"{ "types": { "Bad Name": { "kind": "struct" } } }"#;
        let err = Manifest::parse(src).unwrap().into_registry().unwrap_err();
        assert!(matches!(err, ManifestError::Gen(GenError::InvalidIdentifier(ref name)) if name == "Bad Name"));

        let src = r#"{ "types": { "E": { "kind": "enum", "members": { "not valid": 1 } } } }"#;
        let err = Manifest::parse(src).unwrap().into_registry().unwrap_err();
        assert!(matches!(err, ManifestError::Gen(GenError::InvalidIdentifier(ref name)) if name == "not valid"));

        let src = r#"{ "types": { "Box": { "kind": "struct", "generics": ["T U"] } } }"#;
        let err = Manifest::parse(src).unwrap().into_registry().unwrap_err();
        assert!(matches!(err, ManifestError::Gen(GenError::InvalidIdentifier(_))));
    }

    #[test]
    fn odd_field_names_and_docs_stay_valid_typescript() {
        let src = r#"{
            "types": { "Headers": { "kind": "struct", "doc": "ends */ early", "fields": [
                { "name": "content-type", "type": "str" }
            ] } },
            "methods": [ { "name": "f", "params": [ { "name": "x-y", "type": "Headers" } ], "returns": "null" } ]
        }"#;
        let (registry, options) = Manifest::parse(src).unwrap().into_registry().unwrap();
        let out = generate(&registry, &options).unwrap();
        assert!(out.contains("export interface FParameters {\n    \"x-y\": Headers;\n}\n"), "{out}");
        assert!(out.contains("/** ends *\\/ early */\nexport interface Headers {\n    \"content-type\": string;\n}\n"), "{out}");

        let method = registry.method("f").unwrap();
        let args = method.codec.decode(registry.types(), br#"{"x-y": {"content-type": "text/plain"}}"#).unwrap();
        assert_eq!(args["x-y"], serde_json::json!({"content-type": "text/plain"}));
    }

    #[test]
    fn unknown_type_names_the_location() {
        let src = r#"{ "methods": [ { "name": "f", "params": [ { "name": "x", "type": "Missing" } ], "returns": "null" } ] }"#;
        let err = Manifest::parse(src).unwrap().into_registry().unwrap_err();
        assert_eq!(err.to_string(), "unknown type `Missing` in parameter `x` of method `f`");
    }

    #[test]
    fn syntax_errors_carry_a_path() {
        let src = r#"{ "methods": [ { "name": "f", "returns": "null", "rate_limit": -1 } ] }"#;
        let err = Manifest::parse(src).unwrap_err();
        let ManifestError::Syntax { path, .. } = err else { panic!("{err}") };
        assert_eq!(path, "methods[0].rate_limit");
    }

    #[test]
    fn merging_rejects_duplicate_types() {
        let mut a = Manifest::parse(r#"{ "types": { "A": { "kind": "struct" } } }"#).unwrap();
        let b = Manifest::parse(r#"{ "types": { "A": { "kind": "struct" } } }"#).unwrap();
        assert!(matches!(a.merge(b), Err(ManifestError::DuplicateType(name)) if name == "A"));

        let c = Manifest::parse(r#"{ "options": { "indent": 2 }, "methods": [ { "name": "g", "returns": "A" } ] }"#).unwrap();
        a.merge(c).unwrap();
        let (registry, options) = a.into_registry().unwrap();
        assert_eq!(options.indent, 2);
        assert!(registry.method("g").is_some());
    }
}
