//! The x86 register file layout.
//!
//! The table below is the exact name/id/byte-range assignment used by the
//! reference register region: a flat 60-byte file in which sub-registers
//! (`AL`, `AH`, `AX`, `EAX`, ...) are overlapping byte ranges of their parent,
//! and the flag bits (`CF`, `ZF`, ...) each occupy one byte. Entries are kept
//! sorted by name to support binary search, matching the invariant the
//! loader's register table itself documents.

/// One named register: its stable numeric id and its `[begin, end)` byte
/// range within the flat register file. Not `serde`-derived: this is
/// compiled-in static data (see [`REGISTERS`]), never read from or written
/// to the persisted envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterEntry {
    pub name: &'static str,
    pub id: u32,
    pub begin: u32,
    pub end: u32,
    pub size: u32,
}

impl RegisterEntry {
    pub const fn width_bytes(&self) -> u32 {
        self.size
    }
}

/// Invariant: sorted by `name` (ASCII byte order), enabling `binary_search_by`
/// in [`RegisterTable::lookup`].
pub const REGISTERS: &[RegisterEntry] = &[
    RegisterEntry { name: "AF", id: 0, begin: 49, end: 50, size: 1 },
    RegisterEntry { name: "AH", id: 1, begin: 2, end: 3, size: 1 },
    RegisterEntry { name: "AL", id: 2, begin: 3, end: 4, size: 1 },
    RegisterEntry { name: "AX", id: 3, begin: 2, end: 4, size: 2 },
    RegisterEntry { name: "BH", id: 4, begin: 6, end: 7, size: 1 },
    RegisterEntry { name: "BL", id: 5, begin: 7, end: 8, size: 1 },
    RegisterEntry { name: "BP", id: 6, begin: 26, end: 28, size: 2 },
    RegisterEntry { name: "BX", id: 7, begin: 6, end: 8, size: 2 },
    RegisterEntry { name: "CF", id: 8, begin: 44, end: 45, size: 1 },
    RegisterEntry { name: "CH", id: 9, begin: 10, end: 11, size: 1 },
    RegisterEntry { name: "CL", id: 10, begin: 11, end: 12, size: 1 },
    RegisterEntry { name: "CS", id: 11, begin: 34, end: 36, size: 2 },
    RegisterEntry { name: "CX", id: 12, begin: 10, end: 12, size: 2 },
    RegisterEntry { name: "DF", id: 13, begin: 50, end: 51, size: 1 },
    RegisterEntry { name: "DH", id: 14, begin: 14, end: 15, size: 1 },
    RegisterEntry { name: "DI", id: 15, begin: 22, end: 24, size: 2 },
    RegisterEntry { name: "DL", id: 16, begin: 15, end: 16, size: 1 },
    RegisterEntry { name: "DS", id: 17, begin: 38, end: 40, size: 2 },
    RegisterEntry { name: "DX", id: 18, begin: 14, end: 16, size: 2 },
    RegisterEntry { name: "EAX", id: 19, begin: 0, end: 4, size: 4 },
    RegisterEntry { name: "EBP", id: 20, begin: 24, end: 28, size: 4 },
    RegisterEntry { name: "EBX", id: 21, begin: 4, end: 8, size: 4 },
    RegisterEntry { name: "ECX", id: 22, begin: 8, end: 12, size: 4 },
    RegisterEntry { name: "EDI", id: 23, begin: 20, end: 24, size: 4 },
    RegisterEntry { name: "EDX", id: 24, begin: 12, end: 16, size: 4 },
    RegisterEntry { name: "ES", id: 25, begin: 32, end: 34, size: 2 },
    RegisterEntry { name: "ESI", id: 26, begin: 16, end: 20, size: 4 },
    RegisterEntry { name: "ESP", id: 27, begin: 28, end: 32, size: 4 },
    RegisterEntry { name: "FS", id: 28, begin: 40, end: 42, size: 2 },
    RegisterEntry { name: "GDT", id: 29, begin: 56, end: 60, size: 4 },
    RegisterEntry { name: "GS", id: 30, begin: 42, end: 44, size: 2 },
    RegisterEntry { name: "LDT", id: 31, begin: 52, end: 56, size: 4 },
    RegisterEntry { name: "OF", id: 32, begin: 48, end: 49, size: 1 },
    RegisterEntry { name: "PF", id: 33, begin: 46, end: 47, size: 1 },
    RegisterEntry { name: "SF", id: 34, begin: 47, end: 48, size: 1 },
    RegisterEntry { name: "SI", id: 35, begin: 18, end: 20, size: 2 },
    RegisterEntry { name: "SP", id: 36, begin: 30, end: 32, size: 2 },
    RegisterEntry { name: "SS", id: 37, begin: 36, end: 38, size: 2 },
    RegisterEntry { name: "ZF", id: 38, begin: 45, end: 46, size: 1 },
    // Terminator: not a real register, only fixes the size of the region.
    RegisterEntry { name: "TERM", id: 39, begin: 0, end: 60, size: 1 },
];

/// Total size in bytes of the flat register file, taken from the `TERM`
/// terminator entry.
pub const REGISTER_FILE_SIZE: u32 = 60;

/// The register table: name/id/byte-range lookups over [`REGISTERS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisterTable;

impl RegisterTable {
    /// Binary search by name.
    pub fn lookup(&self, name: &str) -> Option<&'static RegisterEntry> {
        REGISTERS
            .binary_search_by(|e| e.name.cmp(name))
            .ok()
            .map(|idx| &REGISTERS[idx])
    }

    /// Linear search for the (sub-)register whose byte range covers
    /// `[addr, addr + len)` exactly, preferring the entry named `hint` when
    /// several overlap (debugging / pretty-printing use only; the interpreter
    /// always addresses the register region by byte range, not by name).
    pub fn name_at(&self, addr: u32, len: u32) -> Option<&'static str> {
        REGISTERS
            .iter()
            .find(|e| e.begin == addr && e.end == addr + len)
            .map(|e| e.name)
    }

    /// All entries whose range overlaps `[addr, addr + len)`.
    pub fn overlapping(&self, addr: u32, len: u32) -> impl Iterator<Item = &'static RegisterEntry> {
        REGISTERS
            .iter()
            .filter(move |e| e.begin < addr + len && addr < e.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted_by_name() {
        for w in REGISTERS.windows(2) {
            assert!(w[0].name < w[1].name, "{} >= {}", w[0].name, w[1].name);
        }
    }

    #[test]
    fn lookup_finds_eax() {
        let entry = RegisterTable.lookup("EAX").unwrap();
        assert_eq!(entry.begin, 0);
        assert_eq!(entry.end, 4);
    }

    #[test]
    fn al_ah_overlap_eax() {
        let eax = RegisterTable.lookup("EAX").unwrap();
        let al = RegisterTable.lookup("AL").unwrap();
        let ah = RegisterTable.lookup("AH").unwrap();
        assert!(al.begin >= eax.begin && al.end <= eax.end);
        assert!(ah.begin >= eax.begin && ah.end <= eax.end);
    }

    #[test]
    fn term_fixes_region_size() {
        let term = RegisterTable.lookup("TERM").unwrap();
        assert_eq!(term.end, REGISTER_FILE_SIZE);
    }
}
