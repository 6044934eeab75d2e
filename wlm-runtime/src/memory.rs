//! WebAssembly linear memory
//!
//! A memory is a byte vector sized in 64 KiB pages. It grows up to the
//! smaller of its declared maximum and the page cap configured for the
//! runtime, and every access is bounds checked.

use log::warn;
use wlm_error::{Error, Result};
use wlm_format::MemoryType;
use wlm_format::binary::{MAX_PAGES, PAGE_SIZE};

use crate::trap::{Trap, TrapKind};

/// Represents a WebAssembly memory instance
#[derive(Debug, Clone)]
pub struct Memory {
    /// The memory type
    ty:       MemoryType,
    /// Memory contents, always a whole number of pages
    data:     Vec<u8>,
    /// Largest size in pages this memory may reach
    page_cap: u32,
}

impl Memory {
    /// Allocate a memory at its declared initial size.
    ///
    /// # Errors
    ///
    /// Returns a resource error if the initial size exceeds `page_cap` or
    /// the host cannot allocate it.
    pub fn new(ty: MemoryType, page_cap: u32) -> Result<Self> {
        let cap = ty.limits.max.unwrap_or(MAX_PAGES).min(page_cap).min(MAX_PAGES);
        if ty.limits.min > cap {
            return Err(Error::resource_limit(format!(
                "memory needs {} pages, at most {cap} allowed",
                ty.limits.min
            )));
        }
        let mut memory = Self {
            ty,
            data: Vec::new(),
            page_cap: cap,
        };
        memory.resize_to(ty.limits.min as usize * PAGE_SIZE).ok_or_else(|| {
            Error::resource_limit(format!("host cannot allocate {} pages of memory", ty.limits.min))
        })?;
        Ok(memory)
    }

    /// The memory type as declared
    pub fn ty(&self) -> MemoryType {
        self.ty
    }

    /// Current type: the declared maximum with the current size as minimum
    pub fn current_type(&self) -> MemoryType {
        let mut ty = self.ty;
        ty.limits.min = self.size();
        ty
    }

    /// Current size in pages
    pub fn size(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    /// Current size in bytes
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
    }

    /// Grow by `pages`, returning the previous size in pages, or `None` if
    /// the memory cannot grow that far or the host is out of memory.
    pub fn grow(&mut self, pages: u32) -> Option<u32> {
        let old = self.size();
        let new = old.checked_add(pages)?;
        if new > self.page_cap {
            return None;
        }
        self.resize_to(new as usize * PAGE_SIZE)?;
        Some(old)
    }

    /// Zero-extend to `len` bytes; leaves the contents untouched when the
    /// allocation fails.
    fn resize_to(&mut self, len: usize) -> Option<()> {
        let additional = len.checked_sub(self.data.len())?;
        if self.data.try_reserve_exact(additional).is_err() {
            warn!("failed to allocate {additional} bytes of linear memory");
            return None;
        }
        self.data.resize(len, 0);
        Some(())
    }

    fn range(&self, addr: u64, len: usize) -> core::result::Result<core::ops::Range<usize>, Trap> {
        let start = usize::try_from(addr).map_err(|_| Trap::new(TrapKind::MemoryOutOfBounds))?;
        match start.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(start..end),
            _ => Err(Trap::with_message(
                TrapKind::MemoryOutOfBounds,
                format!("access of {len} bytes at {addr} in memory of {} bytes", self.data.len()),
            )),
        }
    }

    /// Copy `buffer.len()` bytes starting at `addr` into `buffer`.
    pub fn read(&self, addr: u64, buffer: &mut [u8]) -> core::result::Result<(), Trap> {
        let range = self.range(addr, buffer.len())?;
        buffer.copy_from_slice(&self.data[range]);
        Ok(())
    }

    /// Copy `buffer` into memory at `addr`.
    pub fn write(&mut self, addr: u64, buffer: &[u8]) -> core::result::Result<(), Trap> {
        let range = self.range(addr, buffer.len())?;
        self.data[range].copy_from_slice(buffer);
        Ok(())
    }

    /// Read a fixed-size little-endian chunk
    pub fn load<const N: usize>(&self, addr: u64) -> core::result::Result<[u8; N], Trap> {
        let mut bytes = [0u8; N];
        self.read(addr, &mut bytes)?;
        Ok(bytes)
    }

    /// `memory.copy`: overlapping regions are handled like `memmove`.
    pub fn copy_within(&mut self, dst: u64, src: u64, len: u64) -> core::result::Result<(), Trap> {
        let len = usize::try_from(len).map_err(|_| Trap::new(TrapKind::MemoryOutOfBounds))?;
        let src = self.range(src, len)?;
        let dst = self.range(dst, len)?;
        self.data.copy_within(src, dst.start);
        Ok(())
    }

    /// `memory.fill`
    pub fn fill(&mut self, dst: u64, value: u8, len: u64) -> core::result::Result<(), Trap> {
        let len = usize::try_from(len).map_err(|_| Trap::new(TrapKind::MemoryOutOfBounds))?;
        let range = self.range(dst, len)?;
        self.data[range].fill(value);
        Ok(())
    }

    /// Whole contents, for inspection by embedders and tests
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use wlm_format::Limits;

    use super::*;

    fn memory(min: u32, max: Option<u32>) -> Memory {
        Memory::new(MemoryType { limits: Limits::new(min, max) }, MAX_PAGES).unwrap()
    }

    #[test]
    fn grows_within_declared_maximum() {
        let mut mem = memory(1, Some(2));
        assert_eq!(mem.size_in_bytes(), PAGE_SIZE);
        assert_eq!(mem.grow(1), Some(1));
        assert_eq!(mem.size(), 2);
        assert_eq!(mem.grow(1), None);
        assert_eq!(mem.grow(0), Some(2));
        assert_eq!(mem.current_type().limits, Limits::new(2, Some(2)));
    }

    #[test]
    fn page_cap_bounds_growth_and_allocation() {
        let ty = MemoryType { limits: Limits::new(1, None) };
        let mut mem = Memory::new(ty, 3).unwrap();
        assert_eq!(mem.grow(2), Some(1));
        assert_eq!(mem.grow(1), None);

        let big = MemoryType { limits: Limits::new(4, None) };
        assert!(Memory::new(big, 3).is_err());
    }

    #[test]
    fn failed_allocation_leaves_memory_unchanged() {
        let mut mem = memory(1, None);
        mem.write(0, b"kept").unwrap();
        assert_eq!(mem.resize_to(usize::MAX), None);
        assert_eq!(mem.size(), 1);
        assert_eq!(&mem.data()[..4], b"kept");
        assert_eq!(mem.grow(u32::MAX), None);
        assert_eq!(mem.grow(1), Some(1));
    }

    #[test]
    fn accesses_are_bounds_checked() {
        let mut mem = memory(1, None);
        mem.write(10, &[1, 2, 3, 4]).unwrap();
        assert_eq!(mem.load::<4>(10).unwrap(), [1, 2, 3, 4]);
        let end = PAGE_SIZE as u64;
        assert_eq!(mem.load::<4>(end - 2).unwrap_err().kind, TrapKind::MemoryOutOfBounds);
        assert!(mem.write(end, &[]).is_ok());
        assert!(mem.write(u64::MAX, &[1]).is_err());
    }

    #[test]
    fn copy_and_fill() {
        let mut mem = memory(1, None);
        mem.write(0, b"abcdef").unwrap();
        mem.copy_within(2, 0, 4).unwrap();
        assert_eq!(&mem.data()[..6], b"ababcd");
        mem.fill(0, b'z', 3).unwrap();
        assert_eq!(&mem.data()[..6], b"zzzbcd");
        assert!(mem.fill(PAGE_SIZE as u64 - 1, 0, 2).is_err());
    }
}
