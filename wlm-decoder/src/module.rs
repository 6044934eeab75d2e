//! The validated, immutable module representation.

use wlm_format::{ExternKind, ExternType, FuncType, GlobalType, MemoryType, RefType, TableType};

use crate::instructions::FunctionBody;

/// A declared import
#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    /// Module name
    pub module: String,
    /// Field name
    pub name:   String,
    /// Expected type of the provided extern
    pub ty:     ExternType,
}

/// A declared export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Export name
    pub name:  String,
    /// Kind of the exported entity
    pub kind:  ExternKind,
    /// Index into the module-local space of `kind`
    pub index: u32,
}

/// A constant initializer expression
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstExpr {
    /// `i32.const`
    I32(i32),
    /// `i64.const`
    I64(i64),
    /// `f32.const`
    F32(f32),
    /// `f64.const`
    F64(f64),
    /// `ref.null`
    RefNull(RefType),
    /// `ref.func`
    RefFunc(u32),
    /// `global.get` of an imported or earlier global
    GlobalGet(u32),
}

/// A global defined by the module
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    /// Global type
    pub ty:   GlobalType,
    /// Initializer
    pub init: ConstExpr,
}

/// Placement of an element segment
#[derive(Debug, Clone, PartialEq)]
pub enum ElementMode {
    /// Copied into `table` at `offset` during instantiation
    Active {
        /// Table index
        table:  u32,
        /// Offset expression
        offset: ConstExpr,
    },
    /// Available to `table.init` only
    Passive,
    /// Declares references for `ref.func` only
    Declarative,
}

/// An element segment
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSegment {
    /// Element type
    pub element_type: RefType,
    /// Placement
    pub mode:         ElementMode,
    /// Items, each `ref.func` or `ref.null`
    pub items:        Vec<ConstExpr>,
}

/// Placement of a data segment
#[derive(Debug, Clone, PartialEq)]
pub enum DataMode {
    /// Copied into `memory` at `offset` during instantiation
    Active {
        /// Memory index
        memory: u32,
        /// Offset expression
        offset: ConstExpr,
    },
    /// Available to `memory.init` only
    Passive,
}

/// A data segment
#[derive(Debug, Clone, PartialEq)]
pub struct DataSegment {
    /// Placement
    pub mode:  DataMode,
    /// Bytes to copy
    pub bytes: Vec<u8>,
}

/// A custom section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomSection {
    /// Section name
    pub name: String,
    /// Raw contents
    pub data: Vec<u8>,
}

/// A validated WebAssembly module
///
/// Index spaces (functions, tables, memories, globals) place imports
/// before definitions, as in the binary format.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Function types
    pub types:           Vec<FuncType>,
    /// Imports in declaration order
    pub imports:         Vec<Import>,
    /// Type index of each defined function
    pub functions:       Vec<u32>,
    /// Defined tables
    pub tables:          Vec<TableType>,
    /// Defined memories
    pub memories:        Vec<MemoryType>,
    /// Defined globals
    pub globals:         Vec<Global>,
    /// Exports in declaration order
    pub exports:         Vec<Export>,
    /// Start function index
    pub start:           Option<u32>,
    /// Element segments
    pub elements:        Vec<ElementSegment>,
    /// Data segments
    pub data:            Vec<DataSegment>,
    /// Bodies of the defined functions
    pub code:            Vec<FunctionBody>,
    /// Custom sections
    pub custom_sections: Vec<CustomSection>,
}

impl Module {
    /// Number of imported functions; defined functions start at this index.
    pub fn imported_function_count(&self) -> u32 {
        self.count_imports(ExternKind::Function)
    }

    /// Number of imported tables.
    pub fn imported_table_count(&self) -> u32 {
        self.count_imports(ExternKind::Table)
    }

    /// Number of imported memories.
    pub fn imported_memory_count(&self) -> u32 {
        self.count_imports(ExternKind::Memory)
    }

    /// Number of imported globals.
    pub fn imported_global_count(&self) -> u32 {
        self.count_imports(ExternKind::Global)
    }

    fn count_imports(&self, kind: ExternKind) -> u32 {
        self.imports.iter().filter(|import| import.ty.kind() == kind).count() as u32
    }

    /// Type index of every function in the function index space.
    pub fn function_type_indices(&self) -> Vec<u32> {
        let mut indices: Vec<u32> = Vec::with_capacity(self.imports.len() + self.functions.len());
        for import in &self.imports {
            if let ExternType::Function(ty) = &import.ty {
                // Imported function types are stored by value; find their index.
                let idx = self.types.iter().position(|t| t == ty).unwrap_or(0);
                indices.push(idx as u32);
            }
        }
        indices.extend_from_slice(&self.functions);
        indices
    }

    /// Signature of function `idx` in the function index space.
    pub fn func_type(&self, idx: u32) -> Option<&FuncType> {
        let imported = self.imported_function_count();
        if idx < imported {
            return self
                .imports
                .iter()
                .filter_map(|import| match &import.ty {
                    ExternType::Function(ty) => Some(ty),
                    _ => None,
                })
                .nth(idx as usize);
        }
        let type_idx = *self.functions.get((idx - imported) as usize)?;
        self.types.get(type_idx as usize)
    }

    /// Type of every table in the table index space.
    pub fn table_types(&self) -> Vec<TableType> {
        self.imports
            .iter()
            .filter_map(|import| match import.ty {
                ExternType::Table(ty) => Some(ty),
                _ => None,
            })
            .chain(self.tables.iter().copied())
            .collect()
    }

    /// Type of every memory in the memory index space.
    pub fn memory_types(&self) -> Vec<MemoryType> {
        self.imports
            .iter()
            .filter_map(|import| match import.ty {
                ExternType::Memory(ty) => Some(ty),
                _ => None,
            })
            .chain(self.memories.iter().copied())
            .collect()
    }

    /// Type of every global in the global index space.
    pub fn global_types(&self) -> Vec<GlobalType> {
        self.imports
            .iter()
            .filter_map(|import| match import.ty {
                ExternType::Global(ty) => Some(ty),
                _ => None,
            })
            .chain(self.globals.iter().map(|g| g.ty))
            .collect()
    }

    /// Look up an export by exact name.
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|export| export.name == name)
    }

    /// Type of an export, resolved through the index spaces.
    pub fn export_type(&self, export: &Export) -> Option<ExternType> {
        let idx = export.index as usize;
        match export.kind {
            ExternKind::Function => self.func_type(export.index).cloned().map(ExternType::Function),
            ExternKind::Table => self.table_types().get(idx).copied().map(ExternType::Table),
            ExternKind::Memory => self.memory_types().get(idx).copied().map(ExternType::Memory),
            ExternKind::Global => self.global_types().get(idx).copied().map(ExternType::Global),
        }
    }

    /// The custom section named `name`, if present.
    pub fn custom_section(&self, name: &str) -> Option<&CustomSection> {
        self.custom_sections.iter().find(|section| section.name == name)
    }
}

#[cfg(test)]
mod tests {
    use wlm_format::{Limits, ValueType};

    use super::*;

    fn sample() -> Module {
        let log_ty = FuncType::new([ValueType::I32], []);
        let add_ty = FuncType::new([ValueType::I32, ValueType::I32], [ValueType::I32]);
        Module {
            types: vec![log_ty.clone(), add_ty],
            imports: vec![
                Import {
                    module: "env".into(),
                    name:   "log".into(),
                    ty:     ExternType::Function(log_ty),
                },
                Import {
                    module: "env".into(),
                    name:   "mem".into(),
                    ty:     ExternType::Memory(MemoryType {
                        limits: Limits::new(1, None),
                    }),
                },
            ],
            functions: vec![1],
            exports: vec![Export {
                name:  "add".into(),
                kind:  ExternKind::Function,
                index: 1,
            }],
            ..Module::default()
        }
    }

    #[test]
    fn index_spaces_put_imports_first() {
        let module = sample();
        assert_eq!(module.imported_function_count(), 1);
        assert_eq!(module.imported_memory_count(), 1);
        assert_eq!(module.function_type_indices(), vec![0, 1]);
        assert_eq!(module.func_type(1).unwrap().params.len(), 2);
        assert!(module.func_type(2).is_none());
        assert_eq!(module.memory_types().len(), 1);
    }

    #[test]
    fn export_type_resolves_signature() {
        let module = sample();
        let export = module.export("add").unwrap();
        assert_eq!(
            module.export_type(export),
            Some(ExternType::Function(FuncType::new(
                [ValueType::I32, ValueType::I32],
                [ValueType::I32]
            )))
        );
        assert!(module.export("Add").is_none());
    }
}
