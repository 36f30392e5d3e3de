//! Descriptor to TypeScript type expression.
//!
//! Rendering a `Named` reference only writes the name and its arguments; the
//! body is emitted separately by the resolver. That keeps self and mutual
//! references between interfaces finite.

use crate::codegen::emit::Emitter;
use crate::codegen::worklist::Worklist;
use crate::error::{GenError, Result};
use serde_json::Value;

use crate::ir::{is_identifier, ContainerKind, Field, Primitive, Ty};
use crate::table::TypeTable;

pub struct TypeMapper<'t> {
    table: &'t TypeTable,
    worklist: Worklist,
}

impl<'t> TypeMapper<'t> {
    pub fn new(table: &'t TypeTable) -> Self {
        Self { table, worklist: Worklist::new() }
    }

    pub fn table(&self) -> &'t TypeTable { self.table }
    pub fn worklist(&self) -> &Worklist { &self.worklist }
    pub fn worklist_mut(&mut self) -> &mut Worklist { &mut self.worklist }

    pub fn render_to_string(&mut self, ty: &Ty) -> Result<String> {
        let mut out = Emitter::new();
        self.render(&mut out, ty)?;
        Ok(out.into_string())
    }

    /// Write `ty` as a type expression, queueing any composite it names.
    pub fn render(&mut self, out: &mut Emitter, ty: &Ty) -> Result<()> {
        match ty {
            Ty::Primitive(Primitive::Null) => out.write("null"),
            Ty::Primitive(Primitive::Bool) => out.write("boolean"),
            Ty::Primitive(Primitive::Number) => out.write("number"),
            Ty::Primitive(Primitive::String) => out.write("string"),
            Ty::Any => out.write("any"),
            Ty::Absent => out.write("undefined"),
            Ty::Generic(name) => out.write(name),
            Ty::Named { def, args } => {
                let table = self.table;
                let def_ref = table.get(*def)?;
                let expected = def_ref.generics().len();
                if expected != args.len() {
                    return Err(GenError::GenericArity {
                        name: def_ref.name().to_string(),
                        expected,
                        found: args.len(),
                    });
                }
                self.worklist.discover(*def);
                out.write(def_ref.name());
                if !args.is_empty() {
                    out.write("<");
                    out.intersperse(", ", args, |out, arg| self.render(out, arg))?;
                    out.write(">");
                }
            }
            Ty::Container { kind, elems, variadic } => match (kind, elems.as_slice(), variadic) {
                (ContainerKind::Array, [elem], _) | (ContainerKind::Tuple, [elem], true) => {
                    out.write("(");
                    self.render(out, elem)?;
                    out.write(")[]");
                }
                (ContainerKind::Tuple, elems, false) => {
                    out.write("[");
                    out.intersperse(", ", elems, |out, elem| self.render(out, elem))?;
                    out.write("]");
                }
                (ContainerKind::Record, [key, value], false) => {
                    out.write("Record<");
                    self.render(out, key)?;
                    out.write(", ");
                    self.render(out, value)?;
                    out.write(">");
                }
                _ => return Err(GenError::UnsupportedType(format!("{ty:?}"))),
            },
            Ty::Union(members) => {
                if members.is_empty() {
                    return Err(GenError::UnsupportedType(format!("{ty:?}")));
                }
                out.write("(");
                out.intersperse("|", members, |out, member| {
                    out.write("(");
                    self.render(out, member)?;
                    out.write(")");
                    Ok(())
                })?;
                out.write(")");
            }
            Ty::Literals(values) => {
                if values.is_empty() {
                    return Err(GenError::UnsupportedType(format!("{ty:?}")));
                }
                out.intersperse("|", values, |out, value| out.literal(value))?;
            }
            // outside a field there is nothing to mark optional
            Ty::Optional(inner) => {
                out.write("((");
                self.render(out, inner)?;
                out.write(")|(undefined))");
            }
        }
        Ok(())
    }

    /// Write one interface member, `name: T;` or `name?: T;`.
    ///
    /// Names that are not identifiers are written as string keys.
    pub fn field(&mut self, out: &mut Emitter, field: &Field) -> Result<()> {
        let (ty, optional) = field.shape();
        if is_identifier(&field.name) {
            out.write(&field.name);
        } else {
            out.literal(&Value::from(field.name.as_str()))?;
        }
        out.write(if optional { "?: " } else { ": " });
        self.render(out, &ty)?;
        out.write(";");
        Ok(())
    }
}
