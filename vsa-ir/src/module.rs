//! Modules and sections supplied by the program loader.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use vsa_types::Addr;

bitflags::bitflags! {
    /// Permission/kind flags on a loaded section.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SectionFlags: u8 {
        const READ  = 0b0001;
        const WRITE = 0b0010;
        const EXEC  = 0b0100;
        /// Bytes are present in the file and in `Section::bytes`; absent
        /// (BSS-like) sections are zero-filled on demand by the loader.
        const INITIALIZED = 0b1000;
    }
}

/// A contiguous, flat byte range of process memory, as the loader sees it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub address: Addr,
    pub bytes: Vec<u8>,
    pub flags: SectionFlags,
}

impl Section {
    /// Exclusive end address of the section.
    pub fn end(&self) -> Addr {
        self.address.saturating_add(self.bytes.len() as Addr)
    }

    /// `true` if `[addr, addr + len)` falls entirely within this section.
    pub fn contains_range(&self, addr: Addr, len: u32) -> bool {
        addr >= self.address && addr.saturating_add(len) <= self.end()
    }
}

/// A loaded module (executable or shared library), address, bytes, and name.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    pub name: String,
    pub base: Addr,
    pub sections: Vec<Section>,
    /// `[start, end)` ranges covered by the PLT, if any — used by the
    /// interpreter's library-call blacklist matching.
    pub plt_ranges: Vec<(Addr, Addr)>,
}

impl Module {
    /// Find the section containing `addr`, if any.
    pub fn section_containing(&self, addr: Addr) -> Option<&Section> {
        self.sections
            .iter()
            .find(|s| addr >= s.address && addr < s.end())
    }

    /// `true` if `addr` falls in one of this module's PLT ranges.
    pub fn is_plt_address(&self, addr: Addr) -> bool {
        self.plt_ranges.iter().any(|(lo, hi)| addr >= *lo && addr < *hi)
    }
}
