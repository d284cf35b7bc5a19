//! Global symbol table the linker builds while merging units. Imports
//! declare unknowns, definitions resolve them, and whatever is still
//! unknown or undefined at the end fails the link.

use std::collections::HashMap;

use crate::mini_front::node::Node;
use crate::mini_ir::error::{DuplicateSymbolError, LinkError, UnexportedOverwriteError};
use crate::mini_ir::TranslationUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// Named by a constant in a data section.
    Data,
    /// Named by a defining label in a text section.
    Function,
    /// Declared by `.import` and not yet satisfied.
    Unknown,
    /// Referenced in text without a definition so far.
    Undefined,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub source: String,
    pub exported: bool,
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: HashMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declaration rules: placeholders (Unknown/Undefined) never replace
    /// an existing entry; a definition replaces Undefined freely but
    /// replaces Unknown only when exported; two definitions collide.
    pub fn declare(
        &mut self,
        kind: SymbolKind,
        name: &str,
        source: &str,
        exported: bool,
    ) -> Result<(), LinkError> {
        if let Some(existing) = self.symbols.get(name) {
            if matches!(kind, SymbolKind::Unknown | SymbolKind::Undefined) {
                return Ok(());
            }
            match existing.kind {
                SymbolKind::Undefined => {}
                SymbolKind::Unknown => {
                    if !exported {
                        return Err(UnexportedOverwriteError {
                            name: name.to_string(),
                        }
                        .into());
                    }
                }
                _ => {
                    return Err(DuplicateSymbolError {
                        name: name.to_string(),
                    }
                    .into())
                }
            }
        }
        self.symbols.insert(
            name.to_string(),
            Symbol {
                kind,
                name: name.to_string(),
                source: source.to_string(),
                exported,
            },
        );
        Ok(())
    }

    pub fn collect(&mut self, unit: &TranslationUnit) -> Result<(), LinkError> {
        for name in &unit.imports {
            self.declare(SymbolKind::Unknown, name, &unit.id, false)?;
        }
        for constant in &unit.constants {
            let exported = unit.exports.contains(&constant.name);
            self.declare(SymbolKind::Data, &constant.name, &unit.id, exported)?;
        }
        for node in &unit.text {
            if let Node::Label { define, name } = node {
                let exported = unit.exports.contains(name);
                let kind = if *define {
                    SymbolKind::Function
                } else {
                    SymbolKind::Undefined
                };
                self.declare(kind, name, &unit.id, exported)?;
            }
        }
        Ok(())
    }

    /// Names still unknown or undefined, sorted for stable reporting.
    pub fn unsolved(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .symbols
            .values()
            .filter(|s| matches!(s.kind, SymbolKind::Unknown | SymbolKind::Undefined))
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mini_front::node::Node;
    use crate::mini_ir::{ConstData, Constant};

    #[test]
    fn definitions_satisfy_imports_when_exported() {
        let mut table = SymbolTable::new();
        table.declare(SymbolKind::Unknown, "_func", "0", false).unwrap();
        table.declare(SymbolKind::Function, "_func", "1", true).unwrap();
        assert_eq!(table.get("_func").unwrap().kind, SymbolKind::Function);
        assert!(table.unsolved().is_empty());
    }

    #[test]
    fn unexported_definition_cannot_satisfy_an_import() {
        let mut table = SymbolTable::new();
        table.declare(SymbolKind::Unknown, "_func", "0", false).unwrap();
        let err = table
            .declare(SymbolKind::Function, "_func", "1", false)
            .unwrap_err();
        assert!(matches!(err, LinkError::UnexportedOverwrite(_)));
    }

    #[test]
    fn placeholders_never_overwrite() {
        let mut table = SymbolTable::new();
        table.declare(SymbolKind::Function, "_start", "0", false).unwrap();
        table.declare(SymbolKind::Undefined, "_start", "1", false).unwrap();
        table.declare(SymbolKind::Unknown, "_start", "1", false).unwrap();
        assert_eq!(table.get("_start").unwrap().kind, SymbolKind::Function);
    }

    #[test]
    fn duplicate_definitions_collide() {
        let mut table = SymbolTable::new();
        table.declare(SymbolKind::Function, "_start", "0", false).unwrap();
        let err = table
            .declare(SymbolKind::Function, "_start", "1", true)
            .unwrap_err();
        assert!(matches!(err, LinkError::DuplicateSymbol(_)));
    }

    #[test]
    fn collect_classifies_a_unit() {
        let unit = TranslationUnit {
            id: "0".to_string(),
            imports: vec!["printf".to_string()],
            exports: vec!["_helper".to_string()],
            constants: vec![Constant::auto("msg", vec![ConstData::Char('x')])],
            entry_point: Some("_start".to_string()),
            text: vec![
                Node::define("_start"),
                Node::define("_helper"),
                Node::reference("_helper"),
                Node::reference("somewhere"),
            ],
        };
        let mut table = SymbolTable::new();
        table.collect(&unit).unwrap();
        assert_eq!(table.get("msg").unwrap().kind, SymbolKind::Data);
        assert_eq!(table.get("_helper").unwrap().kind, SymbolKind::Function);
        assert!(table.get("_helper").unwrap().exported);
        assert_eq!(table.get("printf").unwrap().kind, SymbolKind::Unknown);
        assert_eq!(table.unsolved(), vec!["printf", "somewhere"]);
    }
}
