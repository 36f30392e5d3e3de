//! Owned storage for composite definitions.
//!
//! A [`DefId`] is the identity of a definition: two references are the same
//! composite exactly when their ids are equal, whatever their type arguments.
//! Names are reserved before bodies are classified, so self and mutual
//! references can be expressed without interior mutability.

use std::collections::HashSet;

use indexmap::IndexMap;

use crate::error::{GenError, Result};
use crate::ir::{is_identifier, Definition, Ty};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefId(u32);

#[derive(Debug, Clone)]
enum Slot {
    Reserved(String),
    Defined(Definition),
}

#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    slots: Vec<Slot>,
    by_name: IndexMap<String, DefId>,
}

impl TypeTable {
    pub fn new() -> Self { Self::default() }

    /// Reserve an id for `name`; the body is supplied later with [`TypeTable::define`].
    pub fn declare(&mut self, name: &str) -> Result<DefId> {
        if !is_identifier(name) {
            return Err(GenError::InvalidIdentifier(name.to_string()));
        }
        if self.by_name.contains_key(name) {
            return Err(GenError::DuplicateDefinition(name.to_string()));
        }
        let id = DefId(self.slots.len() as u32);
        self.slots.push(Slot::Reserved(name.to_string()));
        self.by_name.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn define(&mut self, id: DefId, def: impl Into<Definition>) -> Result<()> {
        let def = def.into();
        check_names(&def)?;
        let slot = self
            .slots
            .get_mut(id.0 as usize)
            .ok_or(GenError::UnknownDefinition(id.0))?;
        let fillable = matches!(&*slot, Slot::Reserved(name) if name.as_str() == def.name());
        if !fillable {
            return Err(GenError::DuplicateDefinition(def.name().to_string()));
        }
        *slot = Slot::Defined(def);
        Ok(())
    }

    pub fn insert(&mut self, def: impl Into<Definition>) -> Result<DefId> {
        let def = def.into();
        check_names(&def)?;
        let id = self.declare(def.name())?;
        self.define(id, def)?;
        Ok(id)
    }

    pub fn get(&self, id: DefId) -> Result<&Definition> {
        match self.slots.get(id.0 as usize) {
            Some(Slot::Defined(def)) => Ok(def),
            Some(Slot::Reserved(name)) => Err(GenError::UndefinedDefinition(name.clone())),
            None => Err(GenError::UnknownDefinition(id.0)),
        }
    }

    pub fn name(&self, id: DefId) -> Result<&str> {
        match self.slots.get(id.0 as usize) {
            Some(Slot::Defined(def)) => Ok(def.name()),
            Some(Slot::Reserved(name)) => Ok(name),
            None => Err(GenError::UnknownDefinition(id.0)),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<DefId> {
        self.by_name.get(name).copied()
    }

    /// Names that were declared but never given a body, in declaration order.
    pub fn undefined(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Reserved(name) => Some(name.as_str()),
            Slot::Defined(_) => None,
        })
    }

    pub fn len(&self) -> usize { self.slots.len() }
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }

    /// Find a chain of aliases leading from `start` back to itself without
    /// crossing an interface, array, tuple or record boundary.
    ///
    /// Returns the names along the chain, starting and ending with `start`.
    pub fn alias_cycle(&self, start: DefId) -> Result<Option<Vec<String>>> {
        let mut path = vec![start];
        let mut visited = HashSet::new();
        if !self.walk_alias(start, start, &mut path, &mut visited)? {
            return Ok(None);
        }
        let names = path
            .into_iter()
            .map(|id| self.name(id).map(str::to_string))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(names))
    }

    fn walk_alias(
        &self,
        start: DefId,
        current: DefId,
        path: &mut Vec<DefId>,
        visited: &mut HashSet<DefId>,
    ) -> Result<bool> {
        let Definition::Alias(alias) = self.get(current)? else {
            return Ok(false);
        };
        let mut heads = Vec::new();
        alias_heads(&alias.ty, &mut heads);
        for next in heads {
            if next == start {
                path.push(next);
                return Ok(true);
            }
            if !visited.insert(next) {
                continue;
            }
            path.push(next);
            if self.walk_alias(start, next, path, visited)? {
                return Ok(true);
            }
            path.pop();
        }
        Ok(false)
    }
}

// generic parameters and enum members are written bare, like the definition name
fn check_names(def: &Definition) -> Result<()> {
    let members: Vec<&str> = match def {
        Definition::Enum(e) => e.members.iter().map(|m| m.name.as_str()).collect(),
        Definition::Struct(_) | Definition::Alias(_) => Vec::new(),
    };
    let bad = def
        .generics()
        .iter()
        .map(String::as_str)
        .chain(members)
        .find(|name| !is_identifier(name));
    match bad {
        Some(name) => Err(GenError::InvalidIdentifier(name.to_string())),
        None => Ok(()),
    }
}

// References that sit at the top of an alias body, seen through unions and optionals.
fn alias_heads(ty: &Ty, out: &mut Vec<DefId>) {
    match ty {
        Ty::Named { def, .. } => out.push(*def),
        Ty::Union(members) => members.iter().for_each(|m| alias_heads(m, out)),
        Ty::Optional(inner) => alias_heads(inner, out),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{AliasDef, EnumDef, Field, StructDef};

    #[test]
    fn declare_then_define_allows_self_reference() {
        let mut table = TypeTable::new();
        let node = table.declare("Node").unwrap();
        let def = StructDef::new("Node").field(Field::new("children", Ty::array(Ty::named(node))));
        table.define(node, def).unwrap();
        assert_eq!(table.name(node).unwrap(), "Node");
        assert!(matches!(table.get(node).unwrap(), Definition::Struct(_)));
        assert_eq!(table.undefined().count(), 0);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut table = TypeTable::new();
        table.insert(EnumDef::new("Color")).unwrap();
        let err = table.insert(StructDef::new("Color")).unwrap_err();
        assert!(matches!(err, GenError::DuplicateDefinition(name) if name == "Color"));
    }

    #[test]
    fn reserved_slot_is_undefined_until_filled() {
        let mut table = TypeTable::new();
        let id = table.declare("Later").unwrap();
        assert!(matches!(table.get(id), Err(GenError::UndefinedDefinition(_))));
        assert_eq!(table.undefined().collect::<Vec<_>>(), vec!["Later"]);
        // a body with a different name cannot fill the slot
        assert!(table.define(id, StructDef::new("Other")).is_err());
    }

    #[test]
    fn names_written_bare_must_be_identifiers() {
        let mut table = TypeTable::new();
        assert!(matches!(table.declare("Bad Name"), Err(GenError::InvalidIdentifier(name)) if name == "Bad Name"));
        assert!(table.lookup("Bad Name").is_none());

        let err = table.insert(EnumDef::new("E").member("OK", 1).member("not valid", 2)).unwrap_err();
        assert!(matches!(err, GenError::InvalidIdentifier(name) if name == "not valid"));
        assert!(table.lookup("E").is_none());

        let err = table.insert(AliasDef::new("Pair", Ty::Any).generics(["A", "B-1"])).unwrap_err();
        assert!(matches!(err, GenError::InvalidIdentifier(name) if name == "B-1"));

        assert!(table.insert(StructDef::new("$Ok_1").generics(["T"])).is_ok());
    }

    #[test]
    fn direct_alias_cycle_is_found() {
        let mut table = TypeTable::new();
        let a = table.declare("A").unwrap();
        let b = table.declare("B").unwrap();
        table.define(a, AliasDef::new("A", Ty::Union(vec![Ty::named(b), Ty::string()]))).unwrap();
        table.define(b, AliasDef::new("B", Ty::optional(Ty::named(a)))).unwrap();
        let cycle = table.alias_cycle(a).unwrap().unwrap();
        assert_eq!(cycle, vec!["A", "B", "A"]);
    }

    #[test]
    fn containers_break_alias_cycles() {
        let mut table = TypeTable::new();
        let json = table.declare("Json").unwrap();
        let body = Ty::Union(vec![
            Ty::null(),
            Ty::number(),
            Ty::array(Ty::named(json)),
            Ty::record(Ty::string(), Ty::named(json)),
        ]);
        table.define(json, AliasDef::new("Json", body)).unwrap();
        assert_eq!(table.alias_cycle(json).unwrap(), None);
    }
}
