//! TypeScript client generation.
//!
//! Wrappers are rendered first, in registration order, which seeds the
//! worklist with every parameter struct and return type. The resolver then
//! drains the worklist in batches until a pass discovers nothing new. The
//! artifact is laid out as preamble, declarations, wrappers.

pub mod emit;
pub mod mapper;
pub mod worklist;

use tracing::{debug, info};

use crate::config::GenOptions;
use crate::error::{GenError, Result};
use crate::ir::{AliasDef, Definition, EnumDef, StructDef, Ty};
use crate::method::{MethodDescriptor, Registry};
use crate::table::DefId;

pub use emit::Emitter;
pub use mapper::TypeMapper;
pub use worklist::Worklist;

pub struct Codegen<'r> {
    registry: &'r Registry,
    mapper: TypeMapper<'r>,
    options: &'r GenOptions,
    indent: String,
    decls: Emitter,
    wrappers: Emitter,
}

impl<'r> Codegen<'r> {
    pub fn new(registry: &'r Registry, options: &'r GenOptions) -> Self {
        Self {
            registry,
            mapper: TypeMapper::new(registry.types()),
            options,
            indent: options.indent_str(),
            decls: Emitter::new(),
            wrappers: Emitter::new(),
        }
    }

    /// Emit one wrapper per method, then every composite they reach.
    pub fn emit(&mut self) -> Result<()> {
        let registry = self.registry;
        for method in registry.methods() {
            self.method(method)?;
        }
        self.resolve()?;
        info!(
            methods = registry.len(),
            declarations = self.mapper.worklist().resolved_count(),
            "generated bindings"
        );
        Ok(())
    }

    /// Drain the worklist to a fixpoint.
    pub fn resolve(&mut self) -> Result<()> {
        let mut pass = 0usize;
        loop {
            let batch = self.mapper.worklist_mut().take_batch();
            if batch.is_empty() {
                return Ok(());
            }
            pass += 1;
            debug!(pass, size = batch.len(), "resolving batch");
            for def in batch {
                self.declaration(def)?;
            }
        }
    }

    pub fn into_string(self) -> String {
        let preamble = self.options.preamble.trim_end();
        let parts = [preamble, self.decls.as_str(), self.wrappers.as_str()];
        let mut out = String::new();
        for part in parts.into_iter().filter(|p| !p.is_empty()) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(part);
            if !part.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }

    fn declaration(&mut self, def: DefId) -> Result<()> {
        if !self.decls.is_empty() {
            self.decls.write("\n");
        }
        let table = self.mapper.table();
        match table.get(def)? {
            Definition::Struct(s) => self.interface(s),
            Definition::Enum(e) => self.enumeration(e),
            Definition::Alias(a) => {
                if let Some(cycle) = table.alias_cycle(def)? {
                    return Err(GenError::AliasCycle { cycle });
                }
                self.alias(a)
            }
        }
    }

    fn interface(&mut self, def: &StructDef) -> Result<()> {
        let out = &mut self.decls;
        out.doc(def.doc.as_deref(), "");
        out.write("export interface ");
        out.write(&def.name);
        generic_params(out, &def.generics);
        if def.fields.is_empty() {
            out.writeln(" {}");
            return Ok(());
        }
        out.writeln(" {");
        for field in &def.fields {
            self.decls.write(&self.indent);
            self.mapper.field(&mut self.decls, field)?;
            self.decls.write("\n");
        }
        self.decls.writeln("}");
        Ok(())
    }

    fn enumeration(&mut self, def: &EnumDef) -> Result<()> {
        let out = &mut self.decls;
        out.doc(def.doc.as_deref(), "");
        out.write("export enum ");
        out.write(&def.name);
        out.writeln(" {");
        for member in &def.members {
            out.write(&self.indent);
            out.write(&member.name);
            out.write(" = ");
            out.literal(&member.value)?;
            out.writeln(",");
        }
        out.writeln("}");
        Ok(())
    }

    fn alias(&mut self, def: &AliasDef) -> Result<()> {
        self.decls.write("export type ");
        self.decls.write(&def.name);
        generic_params(&mut self.decls, &def.generics);
        self.decls.write(" = ");
        self.mapper.render(&mut self.decls, &def.ty)?;
        self.decls.writeln(";");
        Ok(())
    }

    fn method(&mut self, method: &MethodDescriptor) -> Result<()> {
        let table = self.mapper.table();
        let omissible = match table.get(method.params)? {
            Definition::Struct(def) => def.required_fields() == 0,
            other => return Err(GenError::ParametersNotStruct(other.name().to_string())),
        };

        if !self.wrappers.is_empty() {
            self.wrappers.write("\n");
        }
        let out = &mut self.wrappers;
        out.doc(method.doc.as_deref(), "");
        out.write("export async function ");
        out.write(&method.name);
        out.write("(parameters: ");
        self.mapper.render(&mut self.wrappers, &Ty::named(method.params))?;
        if omissible {
            self.wrappers.write(" = {}");
        }
        self.wrappers.write("): Promise<");
        self.wrappers.write(&self.options.result_type);
        self.wrappers.write("<");
        self.mapper.render(&mut self.wrappers, &method.returns)?;
        self.wrappers.writeln(">> {");
        self.wrappers.write(&self.indent);
        self.wrappers.write("return await ");
        self.wrappers.write(&self.options.dispatch);
        self.wrappers.write("(");
        self.wrappers.literal(&serde_json::Value::from(method.name.as_str()))?;
        self.wrappers.writeln(", parameters);");
        self.wrappers.writeln("}");
        Ok(())
    }
}

fn generic_params(out: &mut Emitter, generics: &[String]) {
    if generics.is_empty() {
        return;
    }
    out.write("<");
    out.write(&generics.join(", "));
    out.write(">");
}

/// Generate the complete artifact for `registry`.
pub fn generate(registry: &Registry, options: &GenOptions) -> Result<String> {
    let mut cg = Codegen::new(registry, options);
    cg.emit()?;
    Ok(cg.into_string())
}
