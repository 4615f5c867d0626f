//! Region memory abstraction: a persistent map from address interval to
//! value-set, parameterized by region kind and update strength.
//!
//! `read`/`write` handle the overlap cases (exact match, stored-subsumes-read,
//! read-subsumes-stored little-endian assembly, partial overlap); `join`/
//! `meet`/`widen` are built on `StridedInterval::split`.

use vsa_types::RegionId;

use crate::interval::{SplitTag, StridedInterval};
use crate::valueset::ValueSet;

/// The four memory areas a region can model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    Global,
    Register,
    Stack,
    Heap,
}

/// Destructive-update (`Strong`) vs must-join (`Weak`) write discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strength {
    Strong,
    Weak,
}

/// A warning an operation on a [`Region`] wants to raise. Regions have no
/// dependency on the storage crate's sink, so they hand these back as plain
/// data; the interpreter attaches a program counter and backward slice and
/// forwards them to whatever sink the driver configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarningKind {
    OutOfBoundsRead,
    OutOfBoundsWrite,
    PossibleNullDeref,
    UninitializedRead,
    MisalignedAccess,
    /// A `malloc`/`calloc`/`realloc` call whose size argument evaluated to
    /// `TOP`.
    UnboundedMallocSize,
    /// An indirect call whose targets the CFG builder could not resolve.
    UnresolvedIndirectCall,
    /// A write through a `TOP` address: every region is a candidate target,
    /// so nothing is soundly updated.
    WriteToTopAddress,
}

/// Bounds of valid addresses in a region: `[lo, hi]` inclusive, matching
/// [`StridedInterval`]'s own bound convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bounds {
    lo: i64,
    hi: i64,
}

impl Bounds {
    pub fn new(lo: i64, hi: i64) -> Self {
        Self { lo, hi }
    }

    /// An unbounded region (every 32-bit address is in range) — the usual
    /// choice for register/heap regions whose addresses are synthetic.
    pub fn unbounded() -> Self {
        Self { lo: i32::MIN as i64, hi: i32::MAX as i64 }
    }

    fn contains_range(&self, lo: i64, hi: i64) -> bool {
        self.lo <= lo && hi <= self.hi
    }
}

/// One memory region: an ordered, pairwise-non-overlapping map from address
/// interval to value-set.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    id: RegionId,
    kind: RegionKind,
    strength: Strength,
    bounds: Bounds,
    contents: crate::pmap::PMap<StridedInterval, ValueSet>,
}

impl Region {
    /// A fresh, empty region of the given id/kind/strength, bounded by
    /// `bounds`.
    pub fn fresh(id: RegionId, kind: RegionKind, strength: Strength, bounds: Bounds) -> Self {
        Self { id, kind, strength, bounds, contents: crate::pmap::PMap::new() }
    }

    pub fn id(&self) -> RegionId {
        self.id
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    pub fn strength(&self) -> Strength {
        self.strength
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StridedInterval, &ValueSet)> {
        self.contents.iter()
    }

    /// Flips update discipline while keeping the same id and contents (used
    /// when a heap allocation site is revisited inside a loop).
    pub fn with_strength(&self, strength: Strength) -> Self {
        Self { strength, ..self.clone() }
    }

    fn excludes_null_check(&self) -> bool {
        matches!(self.kind, RegionKind::Register | RegionKind::Stack)
    }

    /// Bounds/null checks, exact match, then the three overlap cases.
    pub fn read(&self, addr: &StridedInterval) -> (ValueSet, Vec<WarningKind>) {
        let mut warnings = Vec::new();

        if addr.is_bot() {
            return (ValueSet::bot(), warnings);
        }
        if !self.bounds.contains_range(addr.lo(), addr.hi()) {
            warnings.push(WarningKind::OutOfBoundsRead);
            return (ValueSet::bot(), warnings);
        }
        if addr.contains_zero() && !self.excludes_null_check() {
            warnings.push(WarningKind::PossibleNullDeref);
            return (ValueSet::top(), warnings);
        }

        if let Some(v) = self.contents.get(addr) {
            return (v.clone(), warnings);
        }

        let mut overlapping = self.contents.find_all_overlapping(addr);
        if overlapping.is_empty() {
            if !matches!(self.kind, RegionKind::Register) {
                warnings.push(WarningKind::UninitializedRead);
            }
            return (ValueSet::top(), warnings);
        }
        overlapping.sort_by_key(|(i, _)| i.lo());

        // Running little-endian assembly state for the "read subsumes
        // several adjacent stored entries" case.
        let mut acc: Option<(ValueSet, StridedInterval, i64)> = None;

        for (i, v) in overlapping {
            if addr.subsumed_by(i) {
                // Stored entry subsumes the read: either an exact-width
                // array element, or a sub-word extraction.
                if i.stride() == addr.stride() {
                    return (v.clone(), warnings);
                }
                let shift_bits = (i.hi() - addr.hi()) * 8;
                let mask = mask_for_width(addr.stride());
                let shifted = v.rshift(&ValueSet::constant(shift_bits));
                return (shifted.bitand(&ValueSet::constant(mask)), warnings);
            } else if i.subsumed_by(addr) {
                // Read spans (part of) several adjacent stored entries.
                if i.stride() == addr.stride() {
                    warnings.push(WarningKind::MisalignedAccess);
                    return (ValueSet::top(), warnings);
                }
                match acc.take() {
                    None => acc = Some((v.clone(), *i, i.stride() as i64)),
                    Some((acc_v, last, shift_for)) => {
                        if i.lo() != last.hi() + 1 {
                            warnings.push(WarningKind::MisalignedAccess);
                            return (ValueSet::top(), warnings);
                        }
                        let shifted = v.lshift(&ValueSet::constant(shift_for * 8));
                        acc = Some((shifted.bitor(&acc_v), *i, shift_for + i.stride() as i64));
                    }
                }
            } else {
                warnings.push(WarningKind::MisalignedAccess);
                return (ValueSet::top(), warnings);
            }
        }

        match acc {
            Some((v, _, _)) => (v, warnings),
            None => (ValueSet::top(), warnings),
        }
    }

    /// Bounds/null checks plus the strong/weak write cases. Returns the new
    /// region (regions are immutable; a write produces a fresh value sharing
    /// unchanged subtrees) plus any warnings raised.
    pub fn write(&self, addr: &StridedInterval, value: ValueSet) -> (Region, Vec<WarningKind>) {
        let mut warnings = Vec::new();

        if addr.is_bot() {
            return (self.clone(), warnings);
        }
        if !self.bounds.contains_range(addr.lo(), addr.hi()) || addr.is_top() {
            warnings.push(WarningKind::OutOfBoundsWrite);
            return (self.clone(), warnings);
        }
        if addr.contains_zero() && !self.excludes_null_check() {
            warnings.push(WarningKind::PossibleNullDeref);
        }

        let overlapping = self.contents.find_all_overlapping(addr);

        if overlapping.is_empty() {
            let contents = self.contents.insert(*addr, value);
            return (Region { contents, ..self.clone() }, warnings);
        }

        if overlapping.len() == 1 {
            let (i, existing) = (*overlapping[0].0, overlapping[0].1.clone());
            if i == *addr {
                let combined = match self.strength {
                    Strength::Strong => value,
                    Strength::Weak => existing.join(&value),
                };
                let contents = self.contents.remove(&i).insert(*addr, combined);
                return (Region { contents, ..self.clone() }, warnings);
            }
            if i.stride() == addr.stride() {
                // Aligned but a split is needed; fall through to the
                // general rewrite below.
            } else if i.subsumed_by(addr) {
                let contents = self.contents.remove(&i).insert(*addr, value);
                return (Region { contents, ..self.clone() }, warnings);
            } else if addr.subsumed_by(&i) {
                let shift_bits = ((i.hi() - addr.hi()) * 8) as u32;
                let mask = mask_for_width(addr.stride());
                let aligned = value.bitand(&ValueSet::constant(mask)).lshift(&ValueSet::constant(shift_bits as i64));
                let window = !(mask << shift_bits);
                let kept = existing.bitand(&ValueSet::constant(window));
                let combined = match self.strength {
                    Strength::Strong => kept.bitor(&aligned),
                    Strength::Weak => existing.join(&kept.bitor(&aligned)),
                };
                let contents = self.contents.remove(&i).insert(i, combined);
                return (Region { contents, ..self.clone() }, warnings);
            }
        }

        self.write_with_split(addr, value, overlapping, warnings)
    }

    /// Misaligned/multi-entry write: `StridedInterval::split` partitions the
    /// existing overlapping keys and the incoming address into aligned
    /// pieces; each piece keeps the existing value (`First`), takes the new
    /// value (`Second`), or combines them per the region's strength
    /// (`Both`). A documented simplification relative to a byte-precise
    /// shift/mask reconstruction across overlapping entries — see
    /// DESIGN.md.
    fn write_with_split(
        &self,
        addr: &StridedInterval,
        value: ValueSet,
        overlapping: Vec<(&StridedInterval, &ValueSet)>,
        mut warnings: Vec<WarningKind>,
    ) -> (Region, Vec<WarningKind>) {
        let existing_keys: Vec<StridedInterval> = overlapping.iter().map(|(i, _)| **i).collect();
        let pieces = StridedInterval::split(&existing_keys, std::slice::from_ref(addr));

        let mut contents = self.contents.clone();
        for (key, _) in &overlapping {
            contents = contents.remove(key);
        }

        for (piece, tag) in pieces {
            let new_value = match tag {
                SplitTag::First => overlapping
                    .iter()
                    .find(|(i, _)| piece.subsumed_by(i))
                    .map(|(_, v)| (*v).clone())
                    .unwrap_or_else(ValueSet::top),
                SplitTag::Second => value.clone(),
                SplitTag::Both => {
                    let old = overlapping
                        .iter()
                        .find(|(i, _)| piece.subsumed_by(i))
                        .map(|(_, v)| (*v).clone())
                        .unwrap_or_else(ValueSet::top);
                    match self.strength {
                        Strength::Strong => value.clone(),
                        Strength::Weak => old.join(&value),
                    }
                }
            };
            if piece.stride() == 1 && !piece.is_constant() {
                warnings.push(WarningKind::MisalignedAccess);
            }
            contents = contents.insert(piece, new_value);
        }

        (Region { contents, ..self.clone() }, warnings)
    }

    /// Split both regions' contents, then combine each aligned piece with
    /// `combine`. A `Both`-tagged piece whose two sources disagree on stride
    /// can't be combined precisely and becomes
    /// `TOP`; `First`/`Second`-only pieces for `meet` are dropped (meet
    /// narrows to common ground) and kept as-is for `join`/`widen`.
    fn split_combine(&self, other: &Self, combine: impl Fn(&ValueSet, &ValueSet) -> ValueSet, keep_unmatched: bool) -> Self {
        assert_eq!(self.id, other.id, "can't combine regions with different ids");

        let a_keys: Vec<StridedInterval> = self.contents.iter().map(|(k, _)| *k).collect();
        let b_keys: Vec<StridedInterval> = other.contents.iter().map(|(k, _)| *k).collect();
        let pieces = StridedInterval::split(&a_keys, &b_keys);

        let mut contents = crate::pmap::PMap::new();
        for (piece, tag) in pieces {
            let in_self = self.contents.find_all_overlapping(&piece).into_iter().find(|(i, _)| piece.subsumed_by(i));
            let in_other = other.contents.find_all_overlapping(&piece).into_iter().find(|(i, _)| piece.subsumed_by(i));

            let value = match (tag, in_self, in_other) {
                (SplitTag::Both, Some((ia, va)), Some((ib, vb))) => {
                    if ia.stride() == ib.stride() {
                        combine(va, vb)
                    } else {
                        ValueSet::top()
                    }
                }
                (_, Some((_, v)), None) | (_, None, Some((_, v))) if keep_unmatched => v.clone(),
                _ => continue,
            };
            contents = contents.insert(piece, value);
        }

        Region { id: self.id, kind: self.kind, strength: self.strength, bounds: self.bounds, contents }
    }

    pub fn join(&self, other: &Self) -> Self {
        self.split_combine(other, ValueSet::join, true)
    }

    pub fn widen(&self, other: &Self) -> Self {
        self.split_combine(other, ValueSet::widen, true)
    }

    pub fn meet(&self, other: &Self) -> Self {
        self.split_combine(other, ValueSet::meet, false)
    }

    /// `x.subsumed_by(y) ⇔ x.join(y) == y`: used by the fixpoint driver to
    /// decide whether a widened pre-state has stopped growing.
    pub fn subsumed_by(&self, other: &Self) -> bool {
        &self.join(other) == other
    }

    /// Drop every entry whose address lies past `boundary` (a stack frame
    /// going out of scope on return).
    pub fn discard_frame(&self, boundary: i64) -> Self {
        let mut contents = crate::pmap::PMap::new();
        for (k, v) in self.contents.iter() {
            if k.lo() < boundary {
                contents = contents.insert(*k, v.clone());
            }
        }
        Region { contents, ..self.clone() }
    }
}

fn mask_for_width(width: u32) -> i64 {
    if width >= 8 {
        i64::MAX
    } else {
        (1i64 << (width * 8)) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn si(lo: i64, hi: i64, stride: u32) -> StridedInterval {
        StridedInterval::new(lo, hi, stride)
    }

    fn heap_region() -> Region {
        Region::fresh(5, RegionKind::Heap, Strength::Strong, Bounds::unbounded())
    }

    #[test]
    fn fresh_region_read_is_uninitialized() {
        let r = heap_region();
        let (v, warns) = r.read(&si(100, 100, 4));
        assert!(v.is_top());
        assert!(warns.contains(&WarningKind::UninitializedRead));
    }

    #[test]
    fn write_then_read_same_key_round_trips() {
        let r = heap_region();
        let addr = si(4, 20, 4);
        let value = ValueSet::constant(7);
        let (r2, warns) = r.write(&addr, value.clone());
        assert!(warns.is_empty());
        let (read_back, _) = r2.read(&addr);
        pretty_assertions::assert_eq!(read_back, value);
    }

    #[test]
    fn write_then_read_wider_key_round_trips() {
        let r = heap_region();
        let addr = si(24, 30, 2);
        let value = ValueSet::constant(9);
        let (r2, _) = r.write(&addr, value.clone());
        let (read_back, _) = r2.read(&addr);
        pretty_assertions::assert_eq!(read_back, value);
    }

    #[test]
    fn null_read_on_heap_region_warns_and_returns_top() {
        let r = heap_region();
        let (v, warns) = r.read(&si(0, 0, 1));
        assert!(v.is_top());
        assert!(warns.contains(&WarningKind::PossibleNullDeref));
    }

    #[test]
    fn null_read_on_register_region_is_allowed() {
        let r = Region::fresh(1, RegionKind::Register, Strength::Strong, Bounds::unbounded());
        let (_, warns) = r.read(&si(0, 0, 1));
        assert!(!warns.contains(&WarningKind::PossibleNullDeref));
    }

    #[test]
    fn out_of_bounds_read_warns() {
        let r = Region::fresh(2, RegionKind::Stack, Strength::Strong, Bounds::new(-64, 0));
        let (v, warns) = r.read(&si(100, 100, 4));
        assert!(v.is_bot());
        assert!(warns.contains(&WarningKind::OutOfBoundsRead));
    }

    #[test]
    fn weak_region_write_joins_on_exact_overlap() {
        let r = Region::fresh(5, RegionKind::Heap, Strength::Weak, Bounds::unbounded());
        let addr = si(4, 4, 4);
        let (r, _) = r.write(&addr, ValueSet::constant(1));
        let (r, _) = r.write(&addr, ValueSet::constant(2));
        let (v, _) = r.read(&addr);
        assert_eq!(v, ValueSet::constant(1).join(&ValueSet::constant(2)));
    }

    #[test]
    fn strong_region_write_overwrites_on_exact_overlap() {
        let r = heap_region();
        let addr = si(4, 4, 4);
        let (r, _) = r.write(&addr, ValueSet::constant(1));
        let (r, _) = r.write(&addr, ValueSet::constant(2));
        let (v, _) = r.read(&addr);
        assert_eq!(v, ValueSet::constant(2));
    }

    #[test]
    fn join_carries_through_entries_unique_to_one_side() {
        let a = heap_region();
        let (a, _) = a.write(&si(4, 4, 4), ValueSet::constant(1));
        let b = heap_region();
        let (b, _) = b.write(&si(8, 8, 4), ValueSet::constant(2));
        let joined = a.join(&b);
        assert_eq!(joined.read(&si(4, 4, 4)).0, ValueSet::constant(1));
        assert_eq!(joined.read(&si(8, 8, 4)).0, ValueSet::constant(2));
    }

    #[test]
    fn meet_drops_entries_unique_to_one_side() {
        let a = heap_region();
        let (a, _) = a.write(&si(4, 4, 4), ValueSet::constant(1));
        let b = heap_region();
        let (b, _) = b.write(&si(8, 8, 4), ValueSet::constant(2));
        let met = a.meet(&b);
        assert!(met.is_empty());
    }

    #[test]
    fn discard_frame_drops_addresses_past_boundary() {
        let r = Region::fresh(2, RegionKind::Stack, Strength::Strong, Bounds::unbounded());
        let (r, _) = r.write(&si(-8, -8, 4), ValueSet::constant(1));
        let (r, _) = r.write(&si(4, 4, 4), ValueSet::constant(2));
        let shrunk = r.discard_frame(0);
        assert_eq!(shrunk.read(&si(-8, -8, 4)).0, ValueSet::constant(1));
        assert!(shrunk.read(&si(4, 4, 4)).0.is_top());
    }

    /// 100000 random `(addr, value)` writes against a weak region must each
    /// remain readable afterwards as *at least* what was written — a weak
    /// write only ever joins, so `read(addr)` can grow
    /// wider than `value` (another write may have landed on an overlapping
    /// key) but can never lose it. "Subsumes" here is `value.join(&read)
    /// == read`, i.e. the read-back is already a fixpoint of joining in
    /// `value`.
    #[test]
    fn weak_region_stress_write_then_read_always_subsumes_last_value() {
        use crate::test_support::Rng;

        let mut rng = Rng::new(Rng::DEFAULT_SEED);
        let mut region = Region::fresh(9, RegionKind::Heap, Strength::Weak, Bounds::unbounded());

        for i in 0..100_000 {
            let lo = rng.range_i64(0, 4_096);
            let len = rng.range_i64(0, 15);
            let addr = si(lo, lo + len, 1);
            let value = ValueSet::constant(rng.range_i64(-1_000_000, 1_000_000));

            let (next, _warnings) = region.write(&addr, value.clone());
            region = next;

            let (read_back, _) = region.read(&addr);
            let subsumes = value.join(&read_back) == read_back;
            assert!(subsumes, "iteration {i}: {read_back:?} does not subsume {value:?} written at {addr:?}");
        }
    }
}
