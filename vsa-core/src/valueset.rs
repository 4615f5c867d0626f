//! Value sets: `TOP`, `BOT`, or an ordered map region-id → SI,
//! denoting `⋃ᵢ {(rᵢ, v) : v ∈ SIᵢ}`. A constant is a value-set whose only
//! entry is the unique global region's id.

use std::collections::BTreeMap;

use crate::interval::StridedInterval;

/// The reserved id of the unique global region in every [`crate::State`]
/// used to recognize untyped constants.
pub const GLOBAL_REGION: u32 = 0;

/// Either one of the two lattice extremes, or a finite map from region-id
/// to the strided interval of offsets held in that region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueSet {
    Top,
    Bot,
    Entries(BTreeMap<u32, StridedInterval>),
}

impl ValueSet {
    pub fn top() -> Self {
        ValueSet::Top
    }

    pub fn bot() -> Self {
        ValueSet::Bot
    }

    /// A constant: the value-set whose only entry is the global region.
    pub fn constant(n: i64) -> Self {
        let mut m = BTreeMap::new();
        m.insert(GLOBAL_REGION, StridedInterval::constant(n));
        ValueSet::Entries(m)
    }

    /// A pointer into `region` at byte offset `offset` (a constant SI).
    pub fn pointer(region: u32, offset: i64) -> Self {
        let mut m = BTreeMap::new();
        m.insert(region, StridedInterval::constant(offset));
        ValueSet::Entries(m)
    }

    /// A pointer into `region` whose offset ranges over `si`.
    pub fn region_range(region: u32, si: StridedInterval) -> Self {
        let mut m = BTreeMap::new();
        m.insert(region, si);
        ValueSet::Entries(m)
    }

    pub fn is_top(&self) -> bool {
        matches!(self, ValueSet::Top)
    }

    pub fn is_bot(&self) -> bool {
        matches!(self, ValueSet::Bot)
    }

    /// The SI component if this value-set denotes a pure number (its only
    /// entry is the global region), `None` otherwise.
    pub fn as_constant_si(&self) -> Option<&StridedInterval> {
        match self {
            ValueSet::Entries(m) if m.len() == 1 => m.get(&GLOBAL_REGION),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_constant_si().and_then(StridedInterval::as_constant)
    }

    /// The offset SI held in `region`, if any entry exists for it.
    pub fn offset_in(&self, region: u32) -> Option<&StridedInterval> {
        match self {
            ValueSet::Entries(m) => m.get(&region),
            _ => None,
        }
    }

    pub fn regions(&self) -> impl Iterator<Item = u32> + '_ {
        match self {
            ValueSet::Entries(m) => itertools::Either::Left(m.keys().copied()),
            _ => itertools::Either::Right(std::iter::empty()),
        }
    }

    /// Thread a binary operator across matching region entries: entries
    /// with equal region-id combine their SIs; an entry from a
    /// constant (global-region-only) operand pairs against every entry of
    /// the other operand ("semantics of an untyped constant"); otherwise
    /// the whole operation is unsound to represent precisely and returns
    /// `TOP`.
    fn zip_with(&self, other: &Self, f: impl Fn(&StridedInterval, &StridedInterval) -> StridedInterval) -> Self {
        if self.is_bot() || other.is_bot() {
            return ValueSet::Bot;
        }
        let (ValueSet::Entries(a), ValueSet::Entries(b)) = (self, other) else {
            return ValueSet::Top;
        };

        // A pure (global-region-only) constant on one side pairs with every
        // entry of the other side, whatever the other side's region — this
        // is what makes `pointer + constant` keep its region instead of
        // requiring an (impossible) exact region-id match.
        let self_const = self.as_constant_si();
        let other_const = other.as_constant_si();

        if let (None, Some(cb)) = (self_const, other_const) {
            let mut out = BTreeMap::new();
            for (r, si) in a {
                out.insert(*r, f(si, cb));
            }
            return ValueSet::Entries(out);
        }
        if let (Some(ca), None) = (self_const, other_const) {
            let mut out = BTreeMap::new();
            for (r, si) in b {
                out.insert(*r, f(ca, si));
            }
            return ValueSet::Entries(out);
        }

        let mut out = BTreeMap::new();
        for (r, si_a) in a {
            if let Some(si_b) = b.get(r) {
                out.insert(*r, f(si_a, si_b));
            }
        }
        if out.is_empty() {
            ValueSet::Top
        } else {
            ValueSet::Entries(out)
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::add)
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::sub)
    }

    pub fn mul(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::mul)
    }

    pub fn sdivide(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::sdivide)
    }

    pub fn udivide(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::udivide)
    }

    pub fn smod(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::smod)
    }

    pub fn umod(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::umod)
    }

    pub fn bitand(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::and)
    }

    pub fn bitor(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::or)
    }

    pub fn bitxor(&self, other: &Self) -> Self {
        self.zip_with(other, StridedInterval::xor)
    }

    pub fn lshift(&self, amount: &Self) -> Self {
        self.zip_with(amount, StridedInterval::lshift)
    }

    pub fn rshift(&self, amount: &Self) -> Self {
        self.zip_with(amount, StridedInterval::rshift)
    }

    pub fn arshift(&self, amount: &Self) -> Self {
        self.zip_with(amount, StridedInterval::arshift)
    }

    pub fn not(&self) -> Self {
        match self {
            ValueSet::Top => ValueSet::Top,
            ValueSet::Bot => ValueSet::Bot,
            ValueSet::Entries(m) => ValueSet::Entries(m.iter().map(|(r, si)| (*r, si.not())).collect()),
        }
    }

    pub fn neg(&self) -> Self {
        match self {
            ValueSet::Top => ValueSet::Top,
            ValueSet::Bot => ValueSet::Bot,
            ValueSet::Entries(m) => ValueSet::Entries(m.iter().map(|(r, si)| (*r, si.neg())).collect()),
        }
    }

    /// `=`/`≠`/`<`/`<u`: non-total, returning a Boolean value-set (`0`, `1`,
    /// or `TOP` for "maybe").
    pub fn cmp_eq(&self, other: &Self) -> Self {
        self.bool_zip(other, StridedInterval::cmp_eq)
    }

    pub fn cmp_slt(&self, other: &Self) -> Self {
        self.bool_zip(other, StridedInterval::cmp_slt)
    }

    pub fn cmp_ult(&self, other: &Self) -> Self {
        self.bool_zip(other, StridedInterval::cmp_ult)
    }

    pub fn cmp_neq(&self, other: &Self) -> Self {
        self.bool_zip(other, StridedInterval::cmp_neq)
    }

    pub fn cmp_sle(&self, other: &Self) -> Self {
        self.bool_zip(other, StridedInterval::cmp_sle)
    }

    pub fn lrotate(&self, amount: &Self) -> Self {
        self.zip_with(amount, StridedInterval::lrotate)
    }

    pub fn rrotate(&self, amount: &Self) -> Self {
        self.zip_with(amount, StridedInterval::rrotate)
    }

    fn bool_zip(&self, other: &Self, f: impl Fn(&StridedInterval, &StridedInterval) -> StridedInterval) -> Self {
        match self.zip_with(other, f) {
            ValueSet::Entries(m) if m.len() == 1 => {
                let si = m.get(&GLOBAL_REGION).cloned().unwrap_or_else(StridedInterval::top);
                ValueSet::Entries(BTreeMap::from([(GLOBAL_REGION, si)]))
            }
            ValueSet::Top => ValueSet::Entries(BTreeMap::from([(GLOBAL_REGION, StridedInterval::new(0, 1, 1))])),
            other => other,
        }
    }

    /// Point-wise join on matching region keys; a region present in only
    /// one operand is carried through unchanged.
    pub fn join(&self, other: &Self) -> Self {
        self.combine(other, StridedInterval::join, true)
    }

    pub fn widen(&self, other: &Self) -> Self {
        self.combine(other, StridedInterval::widen, true)
    }

    /// Meet: regions present in only one operand are dropped, matching
    /// regions combine.
    pub fn meet(&self, other: &Self) -> Self {
        self.combine(other, StridedInterval::meet, false)
    }

    fn combine(&self, other: &Self, f: impl Fn(&StridedInterval, &StridedInterval) -> StridedInterval, union_keys: bool) -> Self {
        match (self, other) {
            (ValueSet::Top, _) | (_, ValueSet::Top) if union_keys => ValueSet::Top,
            // Meet: TOP is the identity, so the other operand passes through.
            (ValueSet::Top, x) | (x, ValueSet::Top) => x.clone(),
            (ValueSet::Bot, x) | (x, ValueSet::Bot) if union_keys => x.clone(),
            // Meet: BOT is absorbing.
            (ValueSet::Bot, _) | (_, ValueSet::Bot) => ValueSet::Bot,
            (ValueSet::Entries(a), ValueSet::Entries(b)) => {
                let mut out = BTreeMap::new();
                if union_keys {
                    for r in a.keys().chain(b.keys()).collect::<std::collections::BTreeSet<_>>() {
                        let combined = match (a.get(r), b.get(r)) {
                            (Some(x), Some(y)) => f(x, y),
                            (Some(x), None) | (None, Some(x)) => *x,
                            (None, None) => unreachable!(),
                        };
                        out.insert(*r, combined);
                    }
                } else {
                    for (r, x) in a {
                        if let Some(y) = b.get(r) {
                            out.insert(*r, f(x, y));
                        }
                    }
                }
                ValueSet::Entries(out)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_arithmetic_matches_native() {
        let a = ValueSet::constant(4);
        let b = ValueSet::constant(5);
        assert_eq!(a.add(&b).as_i64(), Some(9));
    }

    #[test]
    fn pointer_plus_constant_keeps_region() {
        let ptr = ValueSet::pointer(3, 8);
        let off = ValueSet::constant(4);
        let sum = ptr.add(&off);
        assert_eq!(sum.offset_in(3).and_then(StridedInterval::as_constant), Some(12));
    }

    #[test]
    fn mismatched_regions_yield_top() {
        let a = ValueSet::pointer(3, 8);
        let b = ValueSet::pointer(4, 8);
        assert!(a.add(&b).is_top());
    }

    #[test]
    fn join_carries_through_unmatched_regions() {
        let a = ValueSet::pointer(3, 8);
        let b = ValueSet::pointer(4, 8);
        let joined = a.join(&b);
        assert_eq!(joined.offset_in(3).and_then(StridedInterval::as_constant), Some(8));
        assert_eq!(joined.offset_in(4).and_then(StridedInterval::as_constant), Some(8));
    }

    #[test]
    fn meet_drops_unmatched_regions() {
        let a = ValueSet::pointer(3, 8);
        let b = ValueSet::pointer(4, 8);
        let met = a.meet(&b);
        assert_eq!(met, ValueSet::Entries(BTreeMap::new()));
    }

    #[test]
    fn meet_with_top_is_identity_and_with_bot_is_absorbing() {
        let x = ValueSet::pointer(3, 8);
        assert_eq!(x.meet(&ValueSet::top()), x);
        assert_eq!(ValueSet::top().meet(&x), x);
        assert!(x.meet(&ValueSet::bot()).is_bot());
        assert!(ValueSet::bot().meet(&x).is_bot());
    }

    #[test]
    fn cmp_eq_on_equal_constants_is_true() {
        let a = ValueSet::constant(7);
        let b = ValueSet::constant(7);
        assert_eq!(a.cmp_eq(&b).as_i64(), Some(1));
    }

    #[test]
    fn bot_absorbs_in_arithmetic() {
        let bot = ValueSet::bot();
        let five = ValueSet::constant(5);
        assert!(bot.add(&five).is_bot());
    }
}
