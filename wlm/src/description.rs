//! Summaries of loaded modules for embedders and tooling.

use core::fmt;

use wlm_decoder::Module;
use wlm_format::{ExternKind, ExternType};

/// How a module's code is represented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// WebAssembly bytecode run by the execution engine
    Bytecode,
}

/// A declared import
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDescription {
    /// Module name
    pub module: String,
    /// Field name
    pub name:   String,
    /// Expected type
    pub ty:     ExternType,
}

/// A declared export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportDescription {
    /// Export name
    pub name: String,
    /// Kind of the exported entity
    pub kind: ExternKind,
    /// Declared type
    pub ty:   ExternType,
}

/// Imports and exports of a loaded module, in declaration order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDescription {
    /// Code representation
    pub kind:    ModuleKind,
    /// Declared imports
    pub imports: Vec<ImportDescription>,
    /// Declared exports
    pub exports: Vec<ExportDescription>,
}

impl ModuleDescription {
    /// Describe `module`.
    pub fn of(module: &Module) -> Self {
        let imports = module
            .imports
            .iter()
            .map(|import| ImportDescription {
                module: import.module.clone(),
                name:   import.name.clone(),
                ty:     import.ty.clone(),
            })
            .collect();
        let exports = module
            .exports
            .iter()
            .filter_map(|export| {
                module.export_type(export).map(|ty| ExportDescription {
                    name: export.name.clone(),
                    kind: export.kind,
                    ty,
                })
            })
            .collect();
        Self {
            kind: ModuleKind::Bytecode,
            imports,
            exports,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Bytecode")
    }
}

impl fmt::Display for ModuleDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type: {}", self.kind)?;
        for import in &self.imports {
            writeln!(f, "import {}.{}: {}", import.module, import.name, import.ty)?;
        }
        for export in &self.exports {
            writeln!(f, "export {} ({}): {}", export.name, export.kind, export.ty)?;
        }
        Ok(())
    }
}
