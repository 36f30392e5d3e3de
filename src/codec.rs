//! Wire codec derived from a method's synthesized parameter struct.
//!
//! Decoding walks the same descriptors the generator renders, so a body the
//! decoder accepts is exactly a value of the emitted TypeScript type.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::error::GenError;
use crate::ir::{bind, ContainerKind, Definition, Primitive, StructDef, Ty};
use crate::table::{DefId, TypeTable};

const MAX_DEPTH: usize = 128;

/// Decoded parameters in declared field order, defaults filled in.
pub type Arguments = IndexMap<String, Value>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("at {path}: expected {expected}")]
    Mismatch { path: String, expected: String },
    #[error("at {path}: missing required field `{field}`")]
    Missing { path: String, field: String },
    #[error("at {path}: nesting is too deep")]
    TooDeep { path: String },
    #[error(transparent)]
    Schema(#[from] GenError),
}

impl DecodeError {
    // only shape mismatches let a union try its next member
    fn is_mismatch(&self) -> bool {
        matches!(self, DecodeError::Mismatch { .. } | DecodeError::Missing { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Codec {
    params: DefId,
    returns: Ty,
}

impl Codec {
    pub fn new(params: DefId, returns: Ty) -> Self {
        Self { params, returns }
    }

    pub fn decode(&self, types: &TypeTable, body: &[u8]) -> Result<Arguments, DecodeError> {
        let value: Value = serde_json::from_slice(body)?;
        let def = match types.get(self.params)? {
            Definition::Struct(def) => def,
            other => return Err(GenError::ParametersNotStruct(other.name().to_string()).into()),
        };
        let mut checker = Checker { types, depth: 0 };
        let fields = checker.fields(def, &[], &value, "$")?;
        Ok(fields.into_iter().collect())
    }

    /// Check `result` against the return type and serialize it.
    pub fn encode(&self, types: &TypeTable, result: &Value) -> Result<Vec<u8>, DecodeError> {
        let mut checker = Checker { types, depth: 0 };
        let value = checker.value(&self.returns, result, "$")?;
        Ok(serde_json::to_vec(&value)?)
    }
}

struct Checker<'t> {
    types: &'t TypeTable,
    depth: usize,
}

impl Checker<'_> {
    fn value(&mut self, ty: &Ty, v: &Value, path: &str) -> Result<Value, DecodeError> {
        if self.depth >= MAX_DEPTH {
            return Err(DecodeError::TooDeep { path: path.to_string() });
        }
        self.depth += 1;
        let out = self.value_inner(ty, v, path);
        self.depth -= 1;
        out
    }

    fn value_inner(&mut self, ty: &Ty, v: &Value, path: &str) -> Result<Value, DecodeError> {
        let mismatch = |expected: &str| DecodeError::Mismatch {
            path: path.to_string(),
            expected: expected.to_string(),
        };
        let accept = |ok: bool, expected: &str| if ok { Ok(v.clone()) } else { Err(mismatch(expected)) };
        match ty {
            Ty::Primitive(Primitive::Null) => accept(v.is_null(), "null"),
            Ty::Primitive(Primitive::Bool) => accept(v.is_boolean(), "a boolean"),
            Ty::Primitive(Primitive::Number) => accept(v.is_number(), "a number"),
            Ty::Primitive(Primitive::String) => accept(v.is_string(), "a string"),
            Ty::Any | Ty::Generic(_) => Ok(v.clone()),
            // JSON carries absence outside an object as null
            Ty::Absent => accept(v.is_null(), "no value (null)"),
            Ty::Optional(_) if v.is_null() => Ok(Value::Null),
            Ty::Optional(inner) => self.value(inner, v, path),
            Ty::Literals(values) => {
                let expected = format!("one of {}", Value::Array(values.clone()));
                accept(values.contains(v), &expected)
            }
            Ty::Union(members) => {
                for member in members {
                    match self.value(member, v, path) {
                        Ok(out) => return Ok(out),
                        Err(err) if err.is_mismatch() => continue,
                        Err(err) => return Err(err),
                    }
                }
                Err(mismatch("a member of the union"))
            }
            Ty::Container { kind, elems, variadic } => match (kind, elems.as_slice(), variadic) {
                (ContainerKind::Array, [elem], _) | (ContainerKind::Tuple, [elem], true) => {
                    let items = v.as_array().ok_or_else(|| mismatch("an array"))?;
                    let out = items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| self.value(elem, item, &format!("{path}[{i}]")))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::Array(out))
                }
                (ContainerKind::Tuple, elems, false) => {
                    let items = v.as_array().ok_or_else(|| mismatch("an array"))?;
                    if items.len() != elems.len() {
                        return Err(mismatch(&format!("an array of length {}", elems.len())));
                    }
                    let out = elems
                        .iter()
                        .zip(items)
                        .enumerate()
                        .map(|(i, (elem, item))| self.value(elem, item, &format!("{path}[{i}]")))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Value::Array(out))
                }
                (ContainerKind::Record, [key_ty, value_ty], false) => {
                    let entries = v.as_object().ok_or_else(|| mismatch("an object"))?;
                    let mut out = Map::new();
                    for (key, item) in entries {
                        let entry_path = format!("{path}.{key}");
                        self.key(key_ty, key, &entry_path)?;
                        out.insert(key.clone(), self.value(value_ty, item, &entry_path)?);
                    }
                    Ok(Value::Object(out))
                }
                _ => Err(GenError::UnsupportedType(format!("{ty:?}")).into()),
            },
            Ty::Named { def, args } => {
                let types = self.types;
                match types.get(*def)? {
                    Definition::Struct(def) => self.fields(def, args, v, path).map(Value::Object),
                    Definition::Enum(def) => {
                        let expected = format!("a member of {}", def.name);
                        accept(def.members.iter().any(|m| &m.value == v), &expected)
                    }
                    Definition::Alias(def) => {
                        check_arity(&def.name, &def.generics, args)?;
                        let body = def.ty.substitute(&bind(&def.generics, args));
                        self.value(&body, v, path)
                    }
                }
            }
        }
    }

    // object keys arrive as strings; numeric keys are parsed first
    fn key(&mut self, ty: &Ty, key: &str, path: &str) -> Result<(), DecodeError> {
        let as_value = match ty {
            Ty::Primitive(Primitive::Number) => key
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| DecodeError::Mismatch {
                    path: path.to_string(),
                    expected: "a numeric key".to_string(),
                })?,
            _ => Value::String(key.to_string()),
        };
        self.value(ty, &as_value, path).map(drop)
    }

    fn fields(
        &mut self,
        def: &StructDef,
        args: &[Ty],
        v: &Value,
        path: &str,
    ) -> Result<Map<String, Value>, DecodeError> {
        check_arity(&def.name, &def.generics, args)?;
        let object = v.as_object().ok_or_else(|| DecodeError::Mismatch {
            path: path.to_string(),
            expected: format!("an object ({})", def.name),
        })?;
        let bindings = bind(&def.generics, args);
        let mut out = Map::new();
        for field in &def.fields {
            match object.get(&field.name) {
                Some(item) => {
                    let (ty, _) = field.shape();
                    let ty = ty.substitute(&bindings);
                    let item = self.value(&ty, item, &format!("{path}.{}", field.name))?;
                    out.insert(field.name.clone(), item);
                }
                None => match &field.default {
                    Some(default) => {
                        out.insert(field.name.clone(), default.clone());
                    }
                    None if !field.is_required() => {}
                    None => {
                        return Err(DecodeError::Missing {
                            path: path.to_string(),
                            field: field.name.clone(),
                        });
                    }
                },
            }
        }
        Ok(out)
    }
}

fn check_arity(name: &str, generics: &[String], args: &[Ty]) -> Result<(), GenError> {
    if generics.len() != args.len() {
        return Err(GenError::GenericArity {
            name: name.to_string(),
            expected: generics.len(),
            found: args.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AliasDef, EnumDef, Field};
    use serde_json::json;

    fn setup() -> (TypeTable, Codec) {
        let mut types = TypeTable::new();
        let color = types.insert(EnumDef::new("Color").member("RED", 1).member("GREEN", 2)).unwrap();
        let page = types.insert(
            StructDef::new("Page")
                .generics(["T"])
                .field(Field::new("items", Ty::array(Ty::generic("T"))))
                .field(Field::new("total", Ty::number())),
        ).unwrap();
        let ids = types.insert(AliasDef::new("Ids", Ty::array(Ty::string()))).unwrap();
        let params = types.insert(
            StructDef::new("SearchParameters")
                .field(Field::new("query", Ty::string()))
                .field(Field::new("color", Ty::optional(Ty::named(color))))
                .field(Field::new("limit", Ty::number()).with_default(json!(20)))
                .field(Field::new("tags", Ty::record(Ty::string(), Ty::named(ids))).optional()),
        ).unwrap();
        let returns = Ty::named_with(page, vec![Ty::string()]);
        (types, Codec::new(params, returns))
    }

    #[test]
    fn defaults_are_filled_and_unknown_fields_dropped() {
        let (types, codec) = setup();
        let args = codec.decode(&types, br#"{"extra": 1, "query": "milk"}"#).unwrap();
        assert_eq!(args.keys().collect::<Vec<_>>(), vec!["query", "limit"]);
        assert_eq!(args["limit"], json!(20));
    }

    #[test]
    fn nested_definitions_are_checked() {
        let (types, codec) = setup();
        let args = codec
            .decode(&types, br#"{"query": "q", "color": 2, "tags": {"a": ["x", "y"]}}"#)
            .unwrap();
        assert_eq!(args["color"], json!(2));
        assert_eq!(args["tags"], json!({"a": ["x", "y"]}));

        let err = codec.decode(&types, br#"{"query": "q", "color": 3}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Mismatch { ref path, .. } if path == "$.color"));

        let err = codec.decode(&types, br#"{"query": "q", "tags": {"a": [1]}}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Mismatch { ref path, .. } if path == "$.tags.a[0]"));
    }

    #[test]
    fn missing_and_malformed_bodies() {
        let (types, codec) = setup();
        assert!(matches!(codec.decode(&types, b"{}"), Err(DecodeError::Missing { .. })));
        assert!(matches!(codec.decode(&types, b"not json"), Err(DecodeError::Json(_))));
        assert!(matches!(codec.decode(&types, b"[]"), Err(DecodeError::Mismatch { .. })));
    }

    #[test]
    fn encode_checks_generic_return_type() {
        let (types, codec) = setup();
        let ok = codec.encode(&types, &json!({"items": ["a"], "total": 1})).unwrap();
        assert_eq!(ok, br#"{"items":["a"],"total":1}"#.to_vec());
        let err = codec.encode(&types, &json!({"items": [1], "total": 1})).unwrap_err();
        assert!(matches!(err, DecodeError::Mismatch { ref path, .. } if path == "$.items[0]"));
    }

    #[test]
    fn parameters_must_be_an_interface() {
        let mut types = TypeTable::new();
        let color = types.insert(EnumDef::new("Color").member("RED", 1)).unwrap();
        let err = Codec::new(color, Ty::null()).decode(&types, b"{}").unwrap_err();
        assert!(matches!(err, DecodeError::Schema(GenError::ParametersNotStruct(ref name)) if name == "Color"));
    }

    #[test]
    fn absence_outside_fields_is_null() {
        let mut types = TypeTable::new();
        let id = types.insert(StructDef::new("P")).unwrap();
        let encode = |returns: Ty, v: Value| Codec::new(id, returns).encode(&types, &v);
        assert_eq!(encode(Ty::Absent, Value::Null).unwrap(), b"null".to_vec());
        assert!(encode(Ty::Absent, json!(0)).is_err());
        assert_eq!(encode(Ty::optional(Ty::number()), Value::Null).unwrap(), b"null".to_vec());
        assert_eq!(encode(Ty::optional(Ty::number()), json!(2)).unwrap(), b"2".to_vec());
        let items = Ty::array(Ty::Union(vec![Ty::string(), Ty::Absent]));
        assert_eq!(encode(items, json!(["a", null])).unwrap(), br#"["a",null]"#.to_vec());
    }

    #[test]
    fn unions_try_each_member() {
        let mut types = TypeTable::new();
        let v = Ty::Union(vec![Ty::number(), Ty::tuple(vec![Ty::string(), Ty::bool()]), Ty::Absent]);
        let id = types.insert(StructDef::new("P").field(Field::new("v", v))).unwrap();
        let codec = Codec::new(id, Ty::null());
        assert!(codec.decode(&types, br#"{"v": 1}"#).is_ok());
        assert!(codec.decode(&types, br#"{"v": ["a", true]}"#).is_ok());
        assert!(codec.decode(&types, br#"{}"#).is_ok());
        assert!(codec.decode(&types, br#"{"v": ["a"]}"#).is_err());
    }
}
