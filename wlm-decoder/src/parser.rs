//! Binary module decoding
//!
//! Walks the sections produced by [`SectionReader`], decodes each into the
//! [`Module`] representation and finishes with [`validate_module`].

use log::{debug, trace};
use wlm_error::{Error, Result};
use wlm_format::binary::{
    self, read_f32, read_f64, read_leb128_i32, read_leb128_i64, read_leb128_u32, read_name, read_u8,
};
use wlm_format::{ExternKind, ExternType, FuncType, GlobalType, Limits, MemoryType, RefType, TableType, ValueType};

use crate::instructions::{BodyContext, decode_function_body};
use crate::module::{
    ConstExpr, CustomSection, DataMode, DataSegment, ElementMode, ElementSegment, Export, Global, Import, Module,
};
use crate::section_error::malformed_content;
use crate::section_reader::{RawSection, SectionReader};
use crate::validation::{ValidationConfig, validate_module};

/// Decode and validate a module with the default limits.
pub fn decode_module(bytes: &[u8]) -> Result<Module> {
    decode_module_with_config(bytes, &ValidationConfig::default())
}

/// Decode and validate a module against `config`.
pub fn decode_module_with_config(bytes: &[u8], config: &ValidationConfig) -> Result<Module> {
    let mut reader = SectionReader::new(bytes)?;
    let mut module = Module::default();
    let mut data_count = None;

    while let Some(section) = reader.next_section()? {
        trace!("section 0x{:02x} at 0x{:x}, {} bytes", section.id, section.offset, section.data.len());
        let mut r = Cursor::new(section);
        match section.id {
            binary::CUSTOM_SECTION_ID => {
                let name = r.name()?;
                let data = section.data[r.pos..].to_vec();
                module.custom_sections.push(CustomSection { name, data });
                r.pos = section.data.len();
            }
            binary::TYPE_SECTION_ID => {
                for _ in 0..r.u32()? {
                    module.types.push(r.func_type()?);
                }
            }
            binary::IMPORT_SECTION_ID => {
                let count = r.u32()?;
                ValidationConfig::check(count as usize, config.max_import_count, "imports")?;
                for _ in 0..count {
                    let import = r.import(&module.types)?;
                    module.imports.push(import);
                }
            }
            binary::FUNCTION_SECTION_ID => {
                let count = r.u32()?;
                ValidationConfig::check(count as usize, config.max_function_count, "functions")?;
                for _ in 0..count {
                    module.functions.push(r.u32()?);
                }
            }
            binary::TABLE_SECTION_ID => {
                for _ in 0..r.u32()? {
                    module.tables.push(r.table_type()?);
                }
            }
            binary::MEMORY_SECTION_ID => {
                for _ in 0..r.u32()? {
                    module.memories.push(r.memory_type()?);
                }
            }
            binary::GLOBAL_SECTION_ID => {
                for _ in 0..r.u32()? {
                    let ty = r.global_type()?;
                    let init = r.const_expr()?;
                    module.globals.push(Global { ty, init });
                }
            }
            binary::EXPORT_SECTION_ID => {
                for _ in 0..r.u32()? {
                    let name = r.name()?;
                    let kind = ExternKind::from_binary(r.u8()?)?;
                    let index = r.u32()?;
                    module.exports.push(Export { name, kind, index });
                }
            }
            binary::START_SECTION_ID => module.start = Some(r.u32()?),
            binary::ELEMENT_SECTION_ID => {
                for _ in 0..r.u32()? {
                    module.elements.push(r.element_segment()?);
                }
            }
            binary::DATA_COUNT_SECTION_ID => data_count = Some(r.u32()?),
            binary::CODE_SECTION_ID => decode_code_section(&mut r, &mut module, config)?,
            binary::DATA_SECTION_ID => {
                let count = r.u32()?;
                if data_count.is_some_and(|expected| expected != count) {
                    return Err(r.err("data count does not match the data section"));
                }
                for _ in 0..count {
                    module.data.push(r.data_segment()?);
                }
            }
            _ => return Err(r.err("unknown section")),
        }
        r.finish()?;
    }

    if data_count.is_some_and(|expected| expected as usize != module.data.len()) {
        return Err(Error::invalid_module("data count section without matching data section"));
    }
    if module.code.len() != module.functions.len() {
        return Err(Error::invalid_module(format!(
            "function and code section disagree: {} declared, {} bodies",
            module.functions.len(),
            module.code.len()
        )));
    }

    validate_module(&module, config)?;
    debug!(
        "decoded module: {} types, {} imports, {} functions, {} exports",
        module.types.len(),
        module.imports.len(),
        module.functions.len(),
        module.exports.len()
    );
    Ok(module)
}

fn decode_code_section(r: &mut Cursor<'_>, module: &mut Module, config: &ValidationConfig) -> Result<()> {
    let count = r.u32()?;
    if count as usize != module.functions.len() {
        return Err(r.err(&format!(
            "code section has {count} bodies for {} declared functions",
            module.functions.len()
        )));
    }
    if module.memory_types().len() > 1 {
        return Err(Error::unsupported_feature("multiple memories are not supported"));
    }

    let functions = module.function_type_indices();
    let globals = module.global_types();
    let tables = module.table_types();
    let ctx = BodyContext {
        types:      &module.types,
        functions:  &functions,
        globals:    &globals,
        tables:     &tables,
        memories:   module.memory_types().len() as u32,
        max_locals: config.max_locals,
    };

    let imported = module.imported_function_count() as usize;
    let mut bodies = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let size = r.u32()? as usize;
        let start = r.pos;
        let body = r.bytes(size)?;
        let type_idx = functions[imported + i];
        let ty = module
            .types
            .get(type_idx as usize)
            .ok_or_else(|| Error::invalid_module(format!("function {} has unknown type {type_idx}", imported + i)))?;
        let decoded = decode_function_body(body, r.section.offset + start, ty, &ctx)
            .map_err(|e| e.context(format_args!("function {}", imported + i)))?;
        bodies.push(decoded);
    }
    module.code = bodies;
    Ok(())
}

/// Position within one section's content
struct Cursor<'a> {
    section: RawSection<'a>,
    pos:     usize,
}

impl<'a> Cursor<'a> {
    fn new(section: RawSection<'a>) -> Self {
        Self { section, pos: 0 }
    }

    fn err(&self, msg: &str) -> Error {
        malformed_content(self.section.offset + self.pos, self.section.id, msg)
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.section.data.len() {
            return Err(self.err("section size mismatch"));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        let (value, len) = read_u8(self.section.data, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    fn u32(&mut self) -> Result<u32> {
        let (value, len) = read_leb128_u32(self.section.data, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    fn name(&mut self) -> Result<String> {
        let (value, len) = read_name(self.section.data, self.pos)?;
        self.pos += len;
        Ok(value)
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let data = self.section.data;
        let end = self.pos.checked_add(len).filter(|end| *end <= data.len());
        let Some(end) = end else {
            return Err(Error::unexpected_end(format!(
                "{len} bytes requested at offset 0x{:x} past the end of section 0x{:02x}",
                self.section.offset + self.pos,
                self.section.id
            )));
        };
        let slice = &data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn value_type(&mut self) -> Result<ValueType> {
        ValueType::from_binary(self.u8()?)
    }

    fn func_type(&mut self) -> Result<FuncType> {
        if self.u8()? != binary::FUNC_TYPE_FORM {
            return Err(self.err("expected function type form 0x60"));
        }
        let mut params = Vec::new();
        for _ in 0..self.u32()? {
            params.push(self.value_type()?);
        }
        let mut results = Vec::new();
        for _ in 0..self.u32()? {
            results.push(self.value_type()?);
        }
        Ok(FuncType { params, results })
    }

    fn limits(&mut self) -> Result<Limits> {
        match self.u8()? {
            0x00 => Ok(Limits::new(self.u32()?, None)),
            0x01 => {
                let min = self.u32()?;
                let max = self.u32()?;
                Ok(Limits::new(min, Some(max)))
            }
            0x02 | 0x03 => Err(Error::unsupported_feature("shared memories are not supported")),
            0x04..=0x07 => Err(Error::unsupported_feature("64-bit memories are not supported")),
            flag => Err(self.err(&format!("invalid limits flag 0x{flag:02x}"))),
        }
    }

    fn table_type(&mut self) -> Result<TableType> {
        let element_type = RefType::from_binary(self.u8()?)?;
        let limits = self.limits()?;
        Ok(TableType { element_type, limits })
    }

    fn memory_type(&mut self) -> Result<MemoryType> {
        Ok(MemoryType { limits: self.limits()? })
    }

    fn global_type(&mut self) -> Result<GlobalType> {
        let value_type = self.value_type()?;
        let mutable = match self.u8()? {
            0x00 => false,
            0x01 => true,
            flag => return Err(self.err(&format!("invalid mutability flag 0x{flag:02x}"))),
        };
        Ok(GlobalType { value_type, mutable })
    }

    fn import(&mut self, types: &[FuncType]) -> Result<Import> {
        let module = self.name()?;
        let name = self.name()?;
        let ty = match ExternKind::from_binary(self.u8()?)? {
            ExternKind::Function => {
                let idx = self.u32()?;
                let ty = types
                    .get(idx as usize)
                    .ok_or_else(|| self.err(&format!("import {module}.{name} has unknown type {idx}")))?;
                ExternType::Function(ty.clone())
            }
            ExternKind::Table => ExternType::Table(self.table_type()?),
            ExternKind::Memory => ExternType::Memory(self.memory_type()?),
            ExternKind::Global => ExternType::Global(self.global_type()?),
        };
        Ok(Import { module, name, ty })
    }

    /// A single constant instruction followed by `end`.
    fn const_expr(&mut self) -> Result<ConstExpr> {
        let data = self.section.data;
        let expr = match self.u8()? {
            0x41 => {
                let (v, len) = read_leb128_i32(data, self.pos)?;
                self.pos += len;
                ConstExpr::I32(v)
            }
            0x42 => {
                let (v, len) = read_leb128_i64(data, self.pos)?;
                self.pos += len;
                ConstExpr::I64(v)
            }
            0x43 => {
                let (v, len) = read_f32(data, self.pos)?;
                self.pos += len;
                ConstExpr::F32(v)
            }
            0x44 => {
                let (v, len) = read_f64(data, self.pos)?;
                self.pos += len;
                ConstExpr::F64(v)
            }
            0x23 => ConstExpr::GlobalGet(self.u32()?),
            0xD0 => ConstExpr::RefNull(RefType::from_binary(self.u8()?)?),
            0xD2 => ConstExpr::RefFunc(self.u32()?),
            op => return Err(self.err(&format!("opcode 0x{op:02x} is not allowed in a constant expression"))),
        };
        if self.u8()? != 0x0B {
            return Err(self.err("constant expression must be a single instruction"));
        }
        Ok(expr)
    }

    fn func_index_items(&mut self) -> Result<Vec<ConstExpr>> {
        let mut items = Vec::new();
        for _ in 0..self.u32()? {
            items.push(ConstExpr::RefFunc(self.u32()?));
        }
        Ok(items)
    }

    fn expr_items(&mut self) -> Result<Vec<ConstExpr>> {
        let mut items = Vec::new();
        for _ in 0..self.u32()? {
            items.push(self.const_expr()?);
        }
        Ok(items)
    }

    fn elem_kind(&mut self) -> Result<()> {
        if self.u8()? != 0x00 {
            return Err(self.err("unknown element kind"));
        }
        Ok(())
    }

    fn element_segment(&mut self) -> Result<ElementSegment> {
        let flags = self.u32()?;
        let (element_type, mode, items) = match flags {
            0 => {
                let offset = self.const_expr()?;
                let items = self.func_index_items()?;
                (RefType::FuncRef, ElementMode::Active { table: 0, offset }, items)
            }
            1 | 3 => {
                self.elem_kind()?;
                let items = self.func_index_items()?;
                let mode = if flags == 1 { ElementMode::Passive } else { ElementMode::Declarative };
                (RefType::FuncRef, mode, items)
            }
            2 => {
                let table = self.u32()?;
                let offset = self.const_expr()?;
                self.elem_kind()?;
                let items = self.func_index_items()?;
                (RefType::FuncRef, ElementMode::Active { table, offset }, items)
            }
            4 => {
                let offset = self.const_expr()?;
                let items = self.expr_items()?;
                (RefType::FuncRef, ElementMode::Active { table: 0, offset }, items)
            }
            5 | 7 => {
                let ty = RefType::from_binary(self.u8()?)?;
                let items = self.expr_items()?;
                let mode = if flags == 5 { ElementMode::Passive } else { ElementMode::Declarative };
                (ty, mode, items)
            }
            6 => {
                let table = self.u32()?;
                let offset = self.const_expr()?;
                let ty = RefType::from_binary(self.u8()?)?;
                let items = self.expr_items()?;
                (ty, ElementMode::Active { table, offset }, items)
            }
            _ => return Err(self.err(&format!("invalid element segment flags {flags}"))),
        };
        Ok(ElementSegment {
            element_type,
            mode,
            items,
        })
    }

    fn data_segment(&mut self) -> Result<DataSegment> {
        let mode = match self.u32()? {
            0 => DataMode::Active {
                memory: 0,
                offset: self.const_expr()?,
            },
            1 => DataMode::Passive,
            2 => {
                let memory = self.u32()?;
                let offset = self.const_expr()?;
                DataMode::Active { memory, offset }
            }
            flags => return Err(self.err(&format!("invalid data segment flags {flags}"))),
        };
        let len = self.u32()? as usize;
        let bytes = self.bytes(len)?.to_vec();
        Ok(DataSegment { mode, bytes })
    }
}
