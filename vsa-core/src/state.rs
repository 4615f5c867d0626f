//! Abstract state: a persistent map from region id to region, plus the
//! register/stack initialization sequence for a fresh analysis run, region
//! bookkeeping (`find`/new heap region/frame discard), and `read`/`write` at
//! both an `(region, address)` pair and a whole value-set address.

use std::collections::BTreeMap;

use vsa_types::{RegionId, FIRST_HEAP_REGION, GLOBAL_REGION, REGISTER_REGION, STACK_REGION};

use crate::interval::StridedInterval;
use crate::region::{Bounds, Region, RegionKind, Strength, WarningKind};
use crate::valueset::ValueSet;

/// A persistent map region-id → region. Cloning a `State` is cheap:
/// each `Region`'s contents are an `Arc`-backed [`crate::pmap::PMap`], so a
/// clone only bumps a handful of reference counts and copies a small
/// `BTreeMap` of region ids.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    regions: BTreeMap<RegionId, Region>,
    next_heap_id: RegionId,
}

impl State {
    /// A global, strong register, and strong stack
    /// region; ESP/EBP point at stack offset 0; the general-purpose
    /// registers start out zeroed constants; the stack holds a fake return
    /// address and `argc`/`argv` as `TOP` (a driver that knows the real
    /// `argc`/`argv` values can overwrite them afterwards via
    /// [`State::write`]).
    pub fn init_for_main(registers: &vsa_ir::registers::RegisterTable) -> Self {
        let global = Region::fresh(GLOBAL_REGION, RegionKind::Global, Strength::Strong, Bounds::unbounded());
        let reg = Region::fresh(REGISTER_REGION, RegionKind::Register, Strength::Strong, Bounds::unbounded());
        let stack = Region::fresh(STACK_REGION, RegionKind::Stack, Strength::Strong, Bounds::unbounded());

        let mut state = State {
            regions: BTreeMap::from([(GLOBAL_REGION, global), (REGISTER_REGION, reg), (STACK_REGION, stack)]),
            next_heap_id: FIRST_HEAP_REGION,
        };

        let stack_ptr = ValueSet::pointer(STACK_REGION, 0);
        state = state.write_register("ESP", stack_ptr.clone(), registers).0;
        state = state.write_register("EBP", stack_ptr, registers).0;

        for name in ["EAX", "EBX", "ECX", "EDX", "ESI", "EDI"] {
            state = state.write_register(name, ValueSet::constant(0), registers).0;
        }

        // Return address, argc, argv: unknown until the loader tells us,
        // modeled as TOP rather than left uninitialized.
        state = state.write(STACK_REGION, &StridedInterval::new(0, 3, 1), ValueSet::top()).0;
        state = state.write(STACK_REGION, &StridedInterval::new(4, 7, 1), ValueSet::top()).0;
        state = state.write(STACK_REGION, &StridedInterval::new(8, 11, 1), ValueSet::top()).0;

        state
    }

    pub fn find(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(&id)
    }

    pub fn global(&self) -> &Region {
        self.find(GLOBAL_REGION).expect("every state has a global region")
    }

    pub fn register(&self) -> &Region {
        self.find(REGISTER_REGION).expect("every state has a register region")
    }

    pub fn stack(&self) -> &Region {
        self.find(STACK_REGION).expect("every state has a stack region")
    }

    pub fn regions(&self) -> impl Iterator<Item = (&RegionId, &Region)> {
        self.regions.iter()
    }

    /// Register a fresh strong heap region for
    /// an unseen allocation site, sized by the allocation's argument SI, or
    /// — if a region for this site already exists — recreate it as weak
    /// ("allocation inside a loop ⇒ weak"). Returns the new state and the
    /// heap region's id.
    pub fn add_heap_region(&self, existing: Option<RegionId>, size: &StridedInterval) -> (Self, RegionId) {
        let bounds = if size.is_top() || size.is_bot() {
            Bounds::unbounded()
        } else {
            Bounds::new(0, size.hi().max(0))
        };
        match existing {
            Some(id) => {
                let region = self
                    .find(id)
                    .cloned()
                    .unwrap_or_else(|| Region::fresh(id, RegionKind::Heap, Strength::Strong, bounds));
                let weak = region.with_strength(Strength::Weak);
                (self.with_region(id, weak), id)
            }
            None => {
                let id = self.next_heap_id;
                let fresh = Region::fresh(id, RegionKind::Heap, Strength::Strong, bounds);
                let mut next = self.with_region(id, fresh);
                next.next_heap_id = id + 1;
                (next, id)
            }
        }
    }

    /// Shrink the stack region when a frame goes out of scope on return.
    pub fn discard_frame(&self, boundary: i64) -> Self {
        let shrunk = self.stack().discard_frame(boundary);
        self.with_region(STACK_REGION, shrunk)
    }

    fn with_region(&self, id: RegionId, region: Region) -> Self {
        let mut regions = self.regions.clone();
        regions.insert(id, region);
        State { regions, next_heap_id: self.next_heap_id }
    }

    /// Read at an `(region, address)` pair.
    pub fn read(&self, region: RegionId, addr: &StridedInterval) -> (ValueSet, Vec<WarningKind>) {
        match self.find(region) {
            Some(r) => r.read(addr),
            None => (ValueSet::top(), Vec::new()),
        }
    }

    /// Write at an `(region, address)` pair.
    pub fn write(&self, region: RegionId, addr: &StridedInterval, value: ValueSet) -> (Self, Vec<WarningKind>) {
        match self.find(region) {
            Some(r) => {
                let (new_region, warnings) = r.write(addr, value);
                (self.with_region(region, new_region), warnings)
            }
            None => (self.clone(), Vec::new()),
        }
    }

    fn register_range(registers: &vsa_ir::registers::RegisterTable, name: &str) -> StridedInterval {
        let entry = registers.lookup(name).unwrap_or_else(|| panic!("unknown register {name}"));
        StridedInterval::new(entry.begin as i64, entry.begin as i64 + entry.size as i64 - 1, 1)
    }

    pub fn read_register(&self, name: &str, registers: &vsa_ir::registers::RegisterTable) -> (ValueSet, Vec<WarningKind>) {
        self.read(REGISTER_REGION, &Self::register_range(registers, name))
    }

    pub fn write_register(&self, name: &str, value: ValueSet, registers: &vsa_ir::registers::RegisterTable) -> (Self, Vec<WarningKind>) {
        self.write(REGISTER_REGION, &Self::register_range(registers, name), value)
    }

    /// Read at a value-set address: every region the address might point
    /// into is read and the outcomes joined, since the true target is one of
    /// them but which one is statically unknown.
    pub fn read_vs(&self, addr: &ValueSet) -> (ValueSet, Vec<WarningKind>) {
        if addr.is_top() {
            return (ValueSet::top(), vec![WarningKind::OutOfBoundsRead]);
        }
        if addr.is_bot() {
            return (ValueSet::bot(), Vec::new());
        }
        let mut warnings = Vec::new();
        let mut acc = ValueSet::bot();
        for region in addr.regions() {
            let Some(offset) = addr.offset_in(region) else { continue };
            let (v, mut w) = self.read(region, offset);
            warnings.append(&mut w);
            acc = acc.join(&v);
        }
        (acc, warnings)
    }

    /// Write at a value-set address: every candidate region is updated with
    /// the *join* of its existing contents and `value` whenever the address
    /// is ambiguous (more than one candidate region), since a write through
    /// an ambiguous pointer might miss any one of them. A single-region
    /// address keeps that region's own strong/weak write discipline.
    pub fn write_vs(&self, addr: &ValueSet, value: ValueSet) -> (Self, Vec<WarningKind>) {
        if addr.is_top() {
            return (self.clone(), vec![WarningKind::WriteToTopAddress]);
        }
        if addr.is_bot() {
            return (self.clone(), Vec::new());
        }
        let regions: Vec<RegionId> = addr.regions().collect();
        let ambiguous = regions.len() > 1;
        let mut state = self.clone();
        let mut warnings = Vec::new();
        for region in regions {
            let Some(offset) = addr.offset_in(region).copied() else { continue };
            let write_value = if ambiguous {
                let (existing, _) = state.read(region, &offset);
                existing.join(&value)
            } else {
                value.clone()
            };
            let (next, mut w) = state.write(region, &offset, write_value);
            state = next;
            warnings.append(&mut w);
        }
        (state, warnings)
    }

    fn region_wise(&self, other: &Self, combine: impl Fn(&Region, &Region) -> Region, keep_unmatched: bool) -> Self {
        let mut regions = BTreeMap::new();
        let ids: std::collections::BTreeSet<RegionId> = self.regions.keys().chain(other.regions.keys()).copied().collect();
        for id in ids {
            match (self.regions.get(&id), other.regions.get(&id)) {
                (Some(a), Some(b)) => {
                    regions.insert(id, combine(a, b));
                }
                (Some(a), None) | (None, Some(a)) if keep_unmatched => {
                    regions.insert(id, a.clone());
                }
                _ => {}
            }
        }
        State { regions, next_heap_id: self.next_heap_id.max(other.next_heap_id) }
    }

    pub fn join(&self, other: &Self) -> Self {
        self.region_wise(other, Region::join, true)
    }

    pub fn widen(&self, other: &Self) -> Self {
        self.region_wise(other, Region::widen, true)
    }

    pub fn meet(&self, other: &Self) -> Self {
        self.region_wise(other, Region::meet, false)
    }

    /// `x.subsumed_by(y) ⇔ x.join(y) == y`, lifted to whole states: used by
    /// the fixpoint driver to decide whether widening at an SCC header has
    /// converged.
    pub fn subsumed_by(&self, other: &Self) -> bool {
        &self.join(other) == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsa_ir::registers::RegisterTable;

    #[test]
    fn init_for_main_zeroes_general_registers() {
        let state = State::init_for_main(&RegisterTable);
        let (eax, _) = state.read_register("EAX", &RegisterTable);
        assert_eq!(eax, ValueSet::constant(0));
    }

    #[test]
    fn init_for_main_points_esp_and_ebp_at_stack_zero() {
        let state = State::init_for_main(&RegisterTable);
        let (esp, _) = state.read_register("ESP", &RegisterTable);
        assert_eq!(esp.offset_in(STACK_REGION).and_then(StridedInterval::as_constant), Some(0));
    }

    #[test]
    fn write_then_read_register_round_trips() {
        let state = State::init_for_main(&RegisterTable);
        let (state, _) = state.write_register("ECX", ValueSet::constant(42), &RegisterTable);
        let (ecx, _) = state.read_register("ECX", &RegisterTable);
        assert_eq!(ecx, ValueSet::constant(42));
    }

    #[test]
    fn add_heap_region_assigns_monotonic_ids() {
        let state = State::init_for_main(&RegisterTable);
        let size = StridedInterval::constant(16);
        let (state, id1) = state.add_heap_region(None, &size);
        let (_, id2) = state.add_heap_region(None, &size);
        assert_eq!(id1, FIRST_HEAP_REGION);
        assert_eq!(id2, FIRST_HEAP_REGION + 1);
    }

    #[test]
    fn revisiting_a_strong_heap_region_becomes_weak() {
        let state = State::init_for_main(&RegisterTable);
        let size = StridedInterval::constant(16);
        let (state, id) = state.add_heap_region(None, &size);
        assert_eq!(state.find(id).unwrap().strength(), Strength::Strong);
        let (state, _) = state.add_heap_region(Some(id), &size);
        assert_eq!(state.find(id).unwrap().strength(), Strength::Weak);
    }

    #[test]
    fn join_keeps_regions_unique_to_either_side() {
        let base = State::init_for_main(&RegisterTable);
        let size = StridedInterval::constant(16);
        let (a, id_a) = base.add_heap_region(None, &size);
        let (b, id_b) = base.add_heap_region(None, &size);
        assert_eq!(id_a, id_b);
        let joined = a.join(&b);
        assert!(joined.find(id_a).is_some());
    }

    #[test]
    fn subsumed_by_detects_fixpoint() {
        let state = State::init_for_main(&RegisterTable);
        assert!(state.subsumed_by(&state));
    }

    #[test]
    fn write_through_top_address_warns_distinctly_from_out_of_bounds() {
        let state = State::init_for_main(&RegisterTable);
        let (unchanged, warnings) = state.write_vs(&ValueSet::top(), ValueSet::constant(1));
        assert_eq!(warnings, vec![WarningKind::WriteToTopAddress]);
        assert!(unchanged.subsumed_by(&state) && state.subsumed_by(&unchanged));
    }
}
