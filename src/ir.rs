// Strongly-typed descriptors for procedure signatures. Pure data, no rendering here.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::table::DefId;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("identifier pattern is valid")
});

/// True when `name` can be written as a bare TypeScript identifier.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Null,
    Bool,
    Number,
    String,                  // also bytes and timestamps
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    Array,
    Record,
    Tuple,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Primitive(Primitive),
    Named {
        def: DefId,          // dedup key, independent of `args`
        args: Vec<Ty>,
    },
    Generic(String),         // enclosing definition's own type parameter
    Container {
        kind: ContainerKind,
        elems: Vec<Ty>,
        variadic: bool,      // last element repeats indefinitely
    },
    Union(Vec<Ty>),
    Literals(Vec<Value>),
    Optional(Box<Ty>),       // T or absent; marks the containing field optional
    Absent,                  // the absence marker itself, e.g. as a union member
    Any,
}

impl Ty {
    pub fn null() -> Self { Ty::Primitive(Primitive::Null) }
    pub fn bool() -> Self { Ty::Primitive(Primitive::Bool) }
    pub fn number() -> Self { Ty::Primitive(Primitive::Number) }
    pub fn string() -> Self { Ty::Primitive(Primitive::String) }

    pub fn named(def: DefId) -> Self {
        Ty::Named { def, args: Vec::new() }
    }
    pub fn named_with(def: DefId, args: Vec<Ty>) -> Self {
        Ty::Named { def, args }
    }
    pub fn generic(name: impl Into<String>) -> Self {
        Ty::Generic(name.into())
    }
    pub fn array(elem: Ty) -> Self {
        Ty::Container { kind: ContainerKind::Array, elems: vec![elem], variadic: false }
    }
    pub fn tuple(elems: Vec<Ty>) -> Self {
        Ty::Container { kind: ContainerKind::Tuple, elems, variadic: false }
    }
    /// Homogeneous tuple of unknown length, `tuple[T, ...]`.
    pub fn variadic(elem: Ty) -> Self {
        Ty::Container { kind: ContainerKind::Tuple, elems: vec![elem], variadic: true }
    }
    pub fn record(key: Ty, value: Ty) -> Self {
        Ty::Container { kind: ContainerKind::Record, elems: vec![key, value], variadic: false }
    }
    pub fn optional(inner: Ty) -> Self {
        Ty::Optional(Box::new(inner))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Ty::Absent)
    }

    /// True when a value of this type may be missing or null.
    pub fn admits_absence(&self) -> bool {
        match self {
            Ty::Absent | Ty::Optional(_) | Ty::Primitive(Primitive::Null) => true,
            Ty::Union(members) => members.iter().any(Ty::admits_absence),
            _ => false,
        }
    }

    /// Replace generic parameters with the bound arguments. Unbound names are kept.
    pub fn substitute(&self, bindings: &HashMap<&str, &Ty>) -> Ty {
        match self {
            Ty::Generic(name) => match bindings.get(name.as_str()) {
                Some(bound) => (*bound).clone(),
                None => self.clone(),
            },
            Ty::Named { def, args } => Ty::Named {
                def: *def,
                args: args.iter().map(|a| a.substitute(bindings)).collect(),
            },
            Ty::Container { kind, elems, variadic } => Ty::Container {
                kind: *kind,
                elems: elems.iter().map(|e| e.substitute(bindings)).collect(),
                variadic: *variadic,
            },
            Ty::Union(members) => Ty::Union(members.iter().map(|m| m.substitute(bindings)).collect()),
            Ty::Optional(inner) => Ty::optional(inner.substitute(bindings)),
            Ty::Primitive(_) | Ty::Literals(_) | Ty::Absent | Ty::Any => self.clone(),
        }
    }
}

/// Pair a definition's generic parameter names with the arguments of one instantiation.
pub fn bind<'a>(generics: &'a [String], args: &'a [Ty]) -> HashMap<&'a str, &'a Ty> {
    generics.iter().map(String::as_str).zip(args.iter()).collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
    pub optional: bool,          // may be omitted on the wire
    pub default: Option<Value>,  // filled in by the decoder when omitted
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self { name: name.into(), ty, optional: false, default: None }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.optional = true;
        self.default = Some(default);
        self
    }

    /// Split the declared type into the type to render and whether the field may be omitted.
    ///
    /// `Optional(T)` and unions with an `Absent` member are the only shapes that
    /// derive optionality; everything else relies on the declared flag.
    pub fn shape(&self) -> (Ty, bool) {
        match &self.ty {
            Ty::Optional(inner) => ((**inner).clone(), true),
            Ty::Union(members) if members.iter().any(Ty::is_absent) => {
                let mut rest: Vec<Ty> = members.iter().filter(|m| !m.is_absent()).cloned().collect();
                let ty = match rest.len() {
                    0 => Ty::Absent,
                    1 => rest.remove(0),
                    _ => Ty::Union(rest),
                };
                (ty, true)
            }
            ty => (ty.clone(), self.optional || self.default.is_some()),
        }
    }

    pub fn is_required(&self) -> bool {
        !self.shape().1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub generics: Vec<String>,
    pub fields: Vec<Field>,      // declared order is emission order
    pub doc: Option<String>,
}

impl StructDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), generics: Vec::new(), fields: Vec::new(), doc: None }
    }

    pub fn generics<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generics = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn required_fields(&self) -> usize {
        self.fields.iter().filter(|f| f.is_required()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub doc: Option<String>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), members: Vec::new(), doc: None }
    }

    pub fn member(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.members.push(EnumMember { name: name.into(), value: value.into() });
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AliasDef {
    pub name: String,
    pub generics: Vec<String>,
    pub ty: Ty,
}

impl AliasDef {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self { name: name.into(), generics: Vec::new(), ty }
    }

    pub fn generics<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generics = names.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Struct(StructDef),
    Enum(EnumDef),
    Alias(AliasDef),
}

impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Definition::Struct(s) => &s.name,
            Definition::Enum(e) => &e.name,
            Definition::Alias(a) => &a.name,
        }
    }

    pub fn generics(&self) -> &[String] {
        match self {
            Definition::Struct(s) => &s.generics,
            Definition::Enum(_) => &[],
            Definition::Alias(a) => &a.generics,
        }
    }
}

impl From<StructDef> for Definition {
    fn from(def: StructDef) -> Self { Definition::Struct(def) }
}
impl From<EnumDef> for Definition {
    fn from(def: EnumDef) -> Self { Definition::Enum(def) }
}
impl From<AliasDef> for Definition {
    fn from(def: AliasDef) -> Self { Definition::Alias(def) }
}
