//! Module-level validation
//!
//! Body-level checks happen while decoding each function; this module covers
//! the rules that span sections: index spaces, export names, limits, the
//! start function and constant initializers.

use serde::Deserialize;
use wlm_error::{Error, ErrorCategory, Result, codes};
use wlm_format::binary::MAX_PAGES;
use wlm_format::{ExternKind, ExternType, GlobalType, RefType, ValueType};

use crate::module::{ConstExpr, DataMode, ElementMode, Module};

/// Upper bounds applied while loading a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Maximum number of functions, imported included
    pub max_function_count: u32,
    /// Maximum number of imports
    pub max_import_count:   u32,
    /// Maximum number of exports
    pub max_export_count:   u32,
    /// Maximum number of declared locals per function
    pub max_locals:         u32,
    /// Maximum number of globals, imported included
    pub max_globals:        u32,
    /// Maximum initial size of a memory, in pages
    pub max_memory_pages:   u32,
    /// Maximum initial size of a table, in elements
    pub max_table_size:     u32,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_function_count: 100_000,
            max_import_count:   10_000,
            max_export_count:   10_000,
            max_locals:         50_000,
            max_globals:        10_000,
            max_memory_pages:   MAX_PAGES,
            max_table_size:     10_000_000,
        }
    }
}

impl ValidationConfig {
    /// Tight limits for untrusted input.
    pub fn strict() -> Self {
        Self {
            max_function_count: 10_000,
            max_import_count:   1_000,
            max_export_count:   1_000,
            max_locals:         1_000,
            max_globals:        1_000,
            max_memory_pages:   256,
            max_table_size:     100_000,
        }
    }

    /// Limits at the ceiling of what the binary format can express.
    pub fn relaxed() -> Self {
        Self {
            max_function_count: u32::MAX,
            max_import_count:   u32::MAX,
            max_export_count:   u32::MAX,
            max_locals:         u32::MAX,
            max_globals:        u32::MAX,
            max_memory_pages:   MAX_PAGES,
            max_table_size:     u32::MAX,
        }
    }

    /// Fail with `VALIDATION_LIMIT_EXCEEDED` when `count` exceeds `limit`.
    pub fn check(count: usize, limit: u32, what: &str) -> Result<()> {
        if count as u64 > u64::from(limit) {
            return Err(limit_exceeded(format!(
                "too many {what}: {count} exceeds the configured limit of {limit}"
            )));
        }
        Ok(())
    }
}

fn limit_exceeded(message: String) -> Error {
    Error::with_message(ErrorCategory::Validation, codes::VALIDATION_LIMIT_EXCEEDED, message)
}

/// Validate cross-section rules of a decoded module.
pub fn validate_module(module: &Module, config: &ValidationConfig) -> Result<()> {
    let function_count = module.imported_function_count() as usize + module.functions.len();
    ValidationConfig::check(function_count, config.max_function_count, "functions")?;
    ValidationConfig::check(module.imports.len(), config.max_import_count, "imports")?;
    ValidationConfig::check(module.exports.len(), config.max_export_count, "exports")?;

    if module.functions.len() != module.code.len() {
        return Err(Error::invalid_module(format!(
            "function and code section disagree: {} declared, {} bodies",
            module.functions.len(),
            module.code.len()
        )));
    }
    for (i, type_idx) in module.functions.iter().enumerate() {
        if *type_idx as usize >= module.types.len() {
            return Err(Error::invalid_module(format!("function {i} has unknown type {type_idx}")));
        }
    }

    validate_imports(module)?;

    let tables = module.table_types();
    let memories = module.memory_types();
    let globals = module.global_types();
    ValidationConfig::check(globals.len(), config.max_globals, "globals")?;

    if memories.len() > 1 {
        return Err(Error::unsupported_feature("multiple memories are not supported"));
    }
    for memory in &memories {
        memory.limits.validate(MAX_PAGES, "memory")?;
        if memory.limits.min > config.max_memory_pages {
            return Err(limit_exceeded(format!(
                "memory of {} pages exceeds the configured limit of {}",
                memory.limits.min, config.max_memory_pages
            )));
        }
    }
    for table in &tables {
        table.limits.validate(u32::MAX, "table")?;
        if table.limits.min > config.max_table_size {
            return Err(limit_exceeded(format!(
                "table of {} elements exceeds the configured limit of {}",
                table.limits.min, config.max_table_size
            )));
        }
    }

    let imported_globals = module.imported_global_count() as usize;
    for (i, global) in module.globals.iter().enumerate() {
        let visible = &globals[..imported_globals];
        let ty = const_expr_type(&global.init, visible, function_count)?;
        if ty != global.ty.value_type {
            return Err(Error::invalid_module(format!(
                "initializer of global {} has type {ty}, expected {}",
                imported_globals + i,
                global.ty.value_type
            )));
        }
    }

    let mut names = std::collections::HashSet::new();
    for export in &module.exports {
        if !names.insert(export.name.as_str()) {
            return Err(Error::invalid_module(format!("duplicate export name \"{}\"", export.name)));
        }
        let count = match export.kind {
            ExternKind::Function => function_count,
            ExternKind::Table => tables.len(),
            ExternKind::Memory => memories.len(),
            ExternKind::Global => globals.len(),
        };
        if export.index as usize >= count {
            return Err(Error::invalid_module(format!(
                "export \"{}\" refers to unknown {} {}",
                export.name, export.kind, export.index
            )));
        }
    }

    if let Some(start) = module.start {
        let ty = module
            .func_type(start)
            .ok_or_else(|| Error::invalid_module(format!("unknown start function {start}")))?;
        if !ty.params.is_empty() || !ty.results.is_empty() {
            return Err(Error::invalid_module(format!("start function must have type [] -> [], found {ty}")));
        }
    }

    let visible_globals = &globals[..imported_globals];
    for (i, segment) in module.elements.iter().enumerate() {
        if let ElementMode::Active { table, offset } = &segment.mode {
            let table_ty = tables
                .get(*table as usize)
                .ok_or_else(|| Error::invalid_module(format!("element segment {i} refers to unknown table {table}")))?;
            if table_ty.element_type != segment.element_type {
                return Err(Error::invalid_module(format!(
                    "element segment {i} of type {} does not fit table of type {}",
                    segment.element_type, table_ty.element_type
                )));
            }
            expect_offset(offset, visible_globals, function_count, "element segment", i)?;
        }
        for item in &segment.items {
            let ty = const_expr_type(item, visible_globals, function_count)?;
            if ty != segment.element_type.value_type() {
                return Err(Error::invalid_module(format!(
                    "element segment {i} item of type {ty} in a {} segment",
                    segment.element_type
                )));
            }
        }
    }

    for (i, segment) in module.data.iter().enumerate() {
        if let DataMode::Active { memory, offset } = &segment.mode {
            if *memory as usize >= memories.len() {
                return Err(Error::invalid_module(format!("data segment {i} refers to unknown memory {memory}")));
            }
            expect_offset(offset, visible_globals, function_count, "data segment", i)?;
        }
    }

    Ok(())
}

fn validate_imports(module: &Module) -> Result<()> {
    for import in &module.imports {
        match &import.ty {
            ExternType::Memory(ty) => ty.limits.validate(MAX_PAGES, "imported memory")?,
            ExternType::Table(ty) => ty.limits.validate(u32::MAX, "imported table")?,
            ExternType::Function(_) | ExternType::Global(_) => {}
        }
    }
    Ok(())
}

fn expect_offset(
    expr: &ConstExpr,
    globals: &[GlobalType],
    function_count: usize,
    what: &str,
    index: usize,
) -> Result<()> {
    let ty = const_expr_type(expr, globals, function_count)?;
    if ty != ValueType::I32 {
        return Err(Error::invalid_module(format!("offset of {what} {index} has type {ty}, expected i32")));
    }
    Ok(())
}

/// Type of a constant expression; `globals` are the globals it may read.
fn const_expr_type(
    expr: &ConstExpr,
    globals: &[GlobalType],
    function_count: usize,
) -> Result<ValueType> {
    Ok(match expr {
        ConstExpr::I32(_) => ValueType::I32,
        ConstExpr::I64(_) => ValueType::I64,
        ConstExpr::F32(_) => ValueType::F32,
        ConstExpr::F64(_) => ValueType::F64,
        ConstExpr::RefNull(RefType::FuncRef) => ValueType::FuncRef,
        ConstExpr::RefNull(RefType::ExternRef) => ValueType::ExternRef,
        ConstExpr::RefFunc(idx) => {
            if *idx as usize >= function_count {
                return Err(Error::invalid_module(format!("ref.func of unknown function {idx}")));
            }
            ValueType::FuncRef
        }
        ConstExpr::GlobalGet(idx) => {
            let global = globals.get(*idx as usize).ok_or_else(|| {
                Error::invalid_module(format!("constant expression reads unknown or later global {idx}"))
            })?;
            if global.mutable {
                return Err(Error::invalid_module(format!(
                    "constant expression reads mutable global {idx}"
                )));
            }
            global.value_type
        }
    })
}

#[cfg(test)]
mod tests {
    use wlm_error::ErrorKind;
    use wlm_format::{FuncType, Limits, MemoryType};

    use super::*;
    use crate::module::{Export, Global};

    #[test]
    fn presets_order_their_limits() {
        let strict = ValidationConfig::strict();
        let default = ValidationConfig::default();
        let relaxed = ValidationConfig::relaxed();
        assert!(strict.max_locals < default.max_locals);
        assert!(default.max_locals < relaxed.max_locals);
        assert!(strict.max_memory_pages <= default.max_memory_pages);
    }

    #[test]
    fn duplicate_exports_are_rejected() {
        let module = Module {
            memories: vec![MemoryType {
                limits: Limits::new(1, None),
            }],
            exports: vec![
                Export {
                    name:  "m".into(),
                    kind:  ExternKind::Memory,
                    index: 0,
                },
                Export {
                    name:  "m".into(),
                    kind:  ExternKind::Memory,
                    index: 0,
                },
            ],
            ..Module::default()
        };
        let err = validate_module(&module, &ValidationConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidModule);
        assert!(err.message.contains("duplicate export"));
    }

    #[test]
    fn start_function_must_take_nothing() {
        let module = Module {
            types: vec![FuncType::new([ValueType::I32], [])],
            functions: vec![0],
            code: vec![crate::instructions::FunctionBody {
                locals: vec![],
                code:   vec![crate::instructions::Instruction::End],
                offset: 0,
            }],
            start: Some(0),
            ..Module::default()
        };
        assert!(validate_module(&module, &ValidationConfig::default()).is_err());
    }

    #[test]
    fn global_initializer_cannot_read_itself_or_mutables() {
        let module = Module {
            globals: vec![Global {
                ty:   GlobalType {
                    value_type: ValueType::I32,
                    mutable:    false,
                },
                init: ConstExpr::GlobalGet(0),
            }],
            ..Module::default()
        };
        assert!(validate_module(&module, &ValidationConfig::default()).is_err());
    }

    #[test]
    fn global_initializer_type_must_match() {
        let module = Module {
            globals: vec![Global {
                ty:   GlobalType {
                    value_type: ValueType::I64,
                    mutable:    true,
                },
                init: ConstExpr::I32(1),
            }],
            ..Module::default()
        };
        let err = validate_module(&module, &ValidationConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidModule);
    }

    #[test]
    fn memory_over_configured_pages_is_rejected() {
        let module = Module {
            memories: vec![MemoryType {
                limits: Limits::new(1024, None),
            }],
            ..Module::default()
        };
        assert!(validate_module(&module, &ValidationConfig::default()).is_ok());
        let err = validate_module(&module, &ValidationConfig::strict()).unwrap_err();
        assert_eq!(err.code, codes::VALIDATION_LIMIT_EXCEEDED);
        assert_eq!(err.kind(), ErrorKind::InvalidModule);
    }
}
