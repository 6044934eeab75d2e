// WLM - wlm-format
// Module: WebAssembly Types
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Type definitions shared by the decoder, the import resolver and the
//! invocation checks.

use core::fmt;

use wlm_error::{Error, Result};

use crate::binary;

/// WebAssembly value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// Function reference
    FuncRef,
    /// External reference
    ExternRef,
}

impl ValueType {
    /// Decode a value type byte.
    pub fn from_binary(byte: u8) -> Result<Self> {
        match byte {
            binary::I32_TYPE => Ok(Self::I32),
            binary::I64_TYPE => Ok(Self::I64),
            binary::F32_TYPE => Ok(Self::F32),
            binary::F64_TYPE => Ok(Self::F64),
            binary::FUNCREF_TYPE => Ok(Self::FuncRef),
            binary::EXTERNREF_TYPE => Ok(Self::ExternRef),
            binary::V128_TYPE => Err(Error::unsupported_feature("SIMD value type v128 is not supported")),
            other => Err(Error::invalid_module(format!("invalid value type 0x{other:02x}"))),
        }
    }

    /// Whether this is a numeric type
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::I32 | Self::I64 | Self::F32 | Self::F64)
    }

    /// Whether this is a reference type
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::FuncRef | Self::ExternRef)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::FuncRef => "funcref",
            Self::ExternRef => "externref",
        })
    }
}

/// Reference types allowed as table elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefType {
    /// Function reference
    FuncRef,
    /// External reference
    ExternRef,
}

impl RefType {
    /// Decode a reference type byte.
    pub fn from_binary(byte: u8) -> Result<Self> {
        match byte {
            binary::FUNCREF_TYPE => Ok(Self::FuncRef),
            binary::EXTERNREF_TYPE => Ok(Self::ExternRef),
            other => Err(Error::invalid_module(format!("invalid reference type 0x{other:02x}"))),
        }
    }

    /// The value type of elements of this reference type.
    pub const fn value_type(self) -> ValueType {
        match self {
            Self::FuncRef => ValueType::FuncRef,
            Self::ExternRef => ValueType::ExternRef,
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value_type().fmt(f)
    }
}

/// A function signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct FuncType {
    /// Parameter types
    pub params:  Vec<ValueType>,
    /// Result types
    pub results: Vec<ValueType>,
}

impl FuncType {
    /// Create a new function type
    pub fn new(params: impl Into<Vec<ValueType>>, results: impl Into<Vec<ValueType>>) -> Self {
        Self {
            params:  params.into(),
            results: results.into(),
        }
    }
}

impl fmt::Display for FuncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_list(f, &self.params)?;
        f.write_str(" -> ")?;
        write_list(f, &self.results)
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, types: &[ValueType]) -> fmt::Result {
    f.write_str("[")?;
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{ty}")?;
    }
    f.write_str("]")
}

/// Size limits for memories and tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Limits {
    /// Initial size
    pub min: u32,
    /// Optional maximum size
    pub max: Option<u32>,
}

impl Limits {
    /// Create limits
    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Check `min <= max` and that both stay within `bound`.
    pub fn validate(&self, bound: u32, what: &str) -> Result<()> {
        if self.min > bound {
            return Err(Error::invalid_module(format!(
                "{what} minimum {} exceeds the limit of {bound}",
                self.min
            )));
        }
        if let Some(max) = self.max {
            if max > bound {
                return Err(Error::invalid_module(format!(
                    "{what} maximum {max} exceeds the limit of {bound}"
                )));
            }
            if self.min > max {
                return Err(Error::invalid_module(format!(
                    "{what} minimum {} is greater than maximum {max}",
                    self.min
                )));
            }
        }
        Ok(())
    }

    /// Whether limits `self` of a provided extern satisfy the declared
    /// `required` limits.
    pub fn satisfies(&self, required: &Self) -> bool {
        if self.min < required.min {
            return false;
        }
        match (required.max, self.max) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(required_max), Some(max)) => max <= required_max,
        }
    }
}

impl fmt::Display for Limits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{{min {}, max {max}}}", self.min),
            None => write!(f, "{{min {}}}", self.min),
        }
    }
}

/// Linear memory type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MemoryType {
    /// Limits in pages
    pub limits: Limits,
}

impl fmt::Display for MemoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memory {}", self.limits)
    }
}

/// Table type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableType {
    /// Element reference type
    pub element_type: RefType,
    /// Limits in elements
    pub limits:       Limits,
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table {} {}", self.element_type, self.limits)
    }
}

/// Global variable type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalType {
    /// Value type
    pub value_type: ValueType,
    /// Whether the global can be set
    pub mutable:    bool,
}

impl fmt::Display for GlobalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mutable {
            write!(f, "global (mut {})", self.value_type)
        } else {
            write!(f, "global {}", self.value_type)
        }
    }
}

/// Kind of an import or export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternKind {
    /// Function
    Function,
    /// Table
    Table,
    /// Memory
    Memory,
    /// Global
    Global,
}

impl ExternKind {
    /// Decode an external kind byte.
    pub fn from_binary(byte: u8) -> Result<Self> {
        match byte {
            binary::EXTERNAL_KIND_FUNCTION => Ok(Self::Function),
            binary::EXTERNAL_KIND_TABLE => Ok(Self::Table),
            binary::EXTERNAL_KIND_MEMORY => Ok(Self::Memory),
            binary::EXTERNAL_KIND_GLOBAL => Ok(Self::Global),
            other => Err(Error::invalid_module(format!("invalid external kind 0x{other:02x}"))),
        }
    }
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Function => "Function",
            Self::Table => "Table",
            Self::Memory => "Memory",
            Self::Global => "Global",
        })
    }
}

/// Type of an importable or exportable entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExternType {
    /// Function with signature
    Function(FuncType),
    /// Table
    Table(TableType),
    /// Memory
    Memory(MemoryType),
    /// Global
    Global(GlobalType),
}

impl ExternType {
    /// The kind of this extern type.
    pub const fn kind(&self) -> ExternKind {
        match self {
            Self::Function(_) => ExternKind::Function,
            Self::Table(_) => ExternKind::Table,
            Self::Memory(_) => ExternKind::Memory,
            Self::Global(_) => ExternKind::Global,
        }
    }
}

impl fmt::Display for ExternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(ty) => write!(f, "func {ty}"),
            Self::Table(ty) => ty.fmt(f),
            Self::Memory(ty) => ty.fmt(f),
            Self::Global(ty) => ty.fmt(f),
        }
    }
}
