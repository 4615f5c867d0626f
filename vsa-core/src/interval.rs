//! Strided intervals: the numeric abstract domain.
//!
//! A strided interval `[lo, hi]/stride` denotes `{ lo, lo+stride, lo+2*stride,
//! ..., hi }`, with a canonical `TOP = [i32::MIN, i32::MAX]/1` and
//! `BOT = [0, -1]/1` (an inverted, necessarily-empty range used as the
//! canonical bottom element). Every arithmetic and bitwise operator falls
//! back to `TOP` on overflow rather than silently wrapping. Values are
//! modeled as 32-bit (`i64` internally, to give headroom for intermediate
//! arithmetic without overflowing the host type).

use std::fmt;
use std::hash::{Hash, Hasher};

/// Inclusive-bounds, equally-strided integer set, or one of the two lattice
/// extremes (all 32-bit values, or no values).
#[derive(Clone, Copy, Eq)]
pub struct StridedInterval {
    lo: i64,
    hi: i64,
    stride: u32,
}

const I32_MIN: i64 = i32::MIN as i64;
const I32_MAX: i64 = i32::MAX as i64;

impl StridedInterval {
    /// Build `[lo, hi]/stride`, normalizing a single-point range to
    /// `stride = 1` and panicking (via [`crate::Bug`]) if the bounds are
    /// inverted or the stride doesn't divide `hi - lo`, except for the
    /// canonical empty/bottom range.
    pub fn new(lo: i64, hi: i64, stride: u32) -> Self {
        if lo == 0 && hi == -1 {
            return Self::bot();
        }
        if lo > hi {
            panic!("{}", crate::Bug::InvertedInterval { lo, hi });
        }
        if lo == hi {
            return Self { lo, hi, stride: 1 };
        }
        let stride = stride.max(1);
        if (hi - lo) % stride as i64 != 0 {
            panic!(
                "{}",
                crate::Bug::ZeroStrideOnRange { lo, hi }
            );
        }
        Self { lo, hi, stride }
    }

    /// `[n, n]/1`, a single constant value.
    pub fn constant(n: i64) -> Self {
        Self { lo: n, hi: n, stride: 1 }
    }

    /// The top element: every representable 32-bit value.
    pub fn top() -> Self {
        Self { lo: I32_MIN, hi: I32_MAX, stride: 1 }
    }

    /// The bottom element: the empty set, represented as the canonical
    /// inverted range `[0, -1]/1`.
    pub fn bot() -> Self {
        Self { lo: 0, hi: -1, stride: 1 }
    }

    pub fn is_top(&self) -> bool {
        self.lo == I32_MIN && self.hi == I32_MAX && self.stride == 1
    }

    pub fn is_bot(&self) -> bool {
        self.lo > self.hi
    }

    pub fn is_constant(&self) -> bool {
        !self.is_bot() && self.lo == self.hi
    }

    pub fn as_constant(&self) -> Option<i64> {
        self.is_constant().then_some(self.lo)
    }

    pub fn contains_zero(&self) -> bool {
        !self.is_bot() && self.lo <= 0 && 0 <= self.hi && (0 - self.lo) % self.stride as i64 == 0
    }

    pub fn is_zero(&self) -> bool {
        self.as_constant() == Some(0)
    }

    pub fn lo(&self) -> i64 {
        self.lo
    }

    pub fn hi(&self) -> i64 {
        self.hi
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn contains(&self, n: i64) -> bool {
        !self.is_bot() && self.lo <= n && n <= self.hi && (n - self.lo) % self.stride as i64 == 0
    }

    /// True if every value of `self` is also a value of `other`.
    pub fn subsumed_by(&self, other: &Self) -> bool {
        if self.is_bot() {
            return true;
        }
        if other.is_bot() {
            return false;
        }
        other.lo <= self.lo
            && self.hi <= other.hi
            && (self.stride % other.stride == 0 || self.is_constant())
            && (self.lo - other.lo) % other.stride as i64 == 0
    }

    pub fn overlaps(&self, other: &Self) -> bool {
        !self.is_bot() && !other.is_bot() && self.lo <= other.hi && other.lo <= self.hi
    }

    /// Join (least upper bound): envelope of the bounds, `gcd` of the
    /// strides, `BOT` absorbing.
    pub fn join(&self, other: &Self) -> Self {
        if self.is_bot() {
            return *other;
        }
        if other.is_bot() {
            return *self;
        }
        let lo = self.lo.min(other.lo);
        let hi = self.hi.max(other.hi);
        let stride = gcd_u32(gcd_u32(self.stride, other.stride), (self.lo - other.lo).unsigned_abs() as u32);
        Self::new_clamped(lo, hi, stride.max(1))
    }

    /// Meet (greatest lower bound): intersection of bounds, `lcm` of
    /// strides, `BOT` if the ranges are disjoint or no common-stride point
    /// exists.
    pub fn meet(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        let lo = self.lo.max(other.lo);
        let hi = self.hi.min(other.hi);
        if lo > hi {
            return Self::bot();
        }
        let stride = lcm_u32(self.stride, other.stride);
        match first_common_point(self.lo, self.stride, other.lo, other.stride, lo, hi) {
            Some(first) => {
                let last = last_point_at_most(first, stride, hi);
                if last < first {
                    Self::bot()
                } else {
                    Self::new(first, last, stride)
                }
            }
            None => Self::bot(),
        }
    }

    /// Widen: `TOP` if either bound escaped past the other operand's bound
    /// (i.e. iteration hasn't stabilized), otherwise the join with `gcd`
    /// stride. A restricted-widening variant that only widens the escaping
    /// bound is not modeled, see DESIGN.md.
    pub fn widen(&self, other: &Self) -> Self {
        if self.is_bot() {
            return *other;
        }
        if other.is_bot() {
            return *self;
        }
        if other.lo < self.lo || other.hi > self.hi {
            return Self::top();
        }
        self.join(other)
    }

    fn new_clamped(lo: i64, hi: i64, stride: u32) -> Self {
        let lo = lo.clamp(I32_MIN, I32_MAX);
        let hi = hi.clamp(I32_MIN, I32_MAX);
        if lo == hi {
            return Self { lo, hi, stride: 1 };
        }
        let rem = (hi - lo) % stride as i64;
        let hi = hi - rem;
        Self { lo, hi, stride }
    }

    pub fn restrict_upper_bound(&self, bound: i64) -> Self {
        if self.is_bot() || bound < self.lo {
            return Self::bot();
        }
        let hi = self.hi.min(bound);
        let rem = (hi - self.lo) % self.stride as i64;
        Self::new(self.lo, hi - rem, self.stride)
    }

    pub fn restrict_lower_bound(&self, bound: i64) -> Self {
        if self.is_bot() || bound > self.hi {
            return Self::bot();
        }
        let mut lo = self.lo.max(bound);
        let rem = (lo - self.lo) % self.stride as i64;
        if rem != 0 {
            lo += self.stride as i64 - rem;
        }
        if lo > self.hi {
            return Self::bot();
        }
        Self::new(lo, self.hi, self.stride)
    }

    fn checked_binop(&self, other: &Self, f: impl Fn(i64, i64) -> Option<i64>) -> Option<(i64, i64)> {
        let a = f(self.lo, other.lo)?;
        let b = f(self.lo, other.hi)?;
        let c = f(self.hi, other.lo)?;
        let d = f(self.hi, other.hi)?;
        let lo = a.min(b).min(c).min(d);
        let hi = a.max(b).max(c).max(d);
        if lo < I32_MIN || hi > I32_MAX {
            None
        } else {
            Some((lo, hi))
        }
    }

    pub fn add(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        match self.checked_binop(other, |a, b| a.checked_add(b)) {
            Some((lo, hi)) => Self::new(lo, hi, gcd_u32(self.stride, other.stride)),
            None => Self::top(),
        }
    }

    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.neg())
    }

    pub fn neg(&self) -> Self {
        if self.is_bot() {
            return Self::bot();
        }
        if self.lo == I32_MIN {
            // -I32_MIN overflows i32; no sound finite representation.
            return Self::top();
        }
        Self::new(-self.hi, -self.lo, self.stride)
    }

    /// Unsigned multiplication-like combination of strides: the source uses
    /// `gcd` of `(s1*lo2, s2*lo1, s1*s2)`-style terms; this simplifies to
    /// `gcd(s1, s2)` when either operand is a singleton, else falls back to
    /// stride 1 (conservative but sound — every multiple of the true stride
    /// is still representable since 1 divides everything).
    pub fn mul(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        match self.checked_binop(other, |a, b| a.checked_mul(b)) {
            Some((lo, hi)) => {
                let stride = if let Some(c) = other.as_constant() {
                    (self.stride as i64).unsigned_abs().checked_mul(c.unsigned_abs()).map_or(1, |v| v.min(u32::MAX as u64) as u32).max(1)
                } else if let Some(c) = self.as_constant() {
                    (other.stride as i64).unsigned_abs().checked_mul(c.unsigned_abs()).map_or(1, |v| v.min(u32::MAX as u64) as u32).max(1)
                } else {
                    1
                };
                Self::new(lo, hi, stride)
            }
            None => Self::top(),
        }
    }

    /// Signed division. Result stride is conservatively fixed at 1:
    /// propagating a stride through division soundly needs more than a
    /// single gcd/lcm step, recorded as a simplification in DESIGN.md.
    pub fn sdivide(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() || other.is_zero() {
            return Self::bot();
        }
        if other.contains_zero() && !other.is_zero() {
            // Division by an interval straddling zero: conservatively TOP.
            return Self::top();
        }
        match self.checked_binop(other, |a, b| if b == 0 { None } else { a.checked_div(b) }) {
            Some((lo, hi)) => Self::new(lo, hi, 1),
            None => Self::top(),
        }
    }

    pub fn udivide(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        let su = self.to_unsigned_bounds();
        let ou = other.to_unsigned_bounds();
        if ou.1 == 0 {
            return Self::bot();
        }
        if ou.0 == 0 {
            return Self::top();
        }
        let lo = su.0 / ou.1;
        let hi = su.1 / ou.0;
        Self::new(lo as i64, hi as i64, 1)
    }

    pub fn smod(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() || other.is_zero() {
            return Self::bot();
        }
        if let (Some(a), Some(b)) = (self.as_constant(), other.as_constant()) {
            if b != 0 {
                return Self::constant(a % b);
            }
        }
        let bound = other.hi.abs().max(other.lo.abs()).max(1) - 1;
        Self::new(-bound, bound, 1)
    }

    pub fn umod(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        let ou = other.to_unsigned_bounds();
        if ou.1 == 0 {
            return Self::bot();
        }
        Self::new(0, (ou.1.saturating_sub(1)) as i64, 1)
    }

    fn to_unsigned_bounds(&self) -> (u32, u32) {
        (self.lo as i32 as u32, self.hi as i32 as u32)
    }

    /// Bitwise NOT, computed directly (`~[lo, hi] = [~hi, ~lo]`, stride
    /// preserved since `~x = -x - 1`).
    pub fn not(&self) -> Self {
        if self.is_bot() {
            return Self::bot();
        }
        let lo = !self.hi;
        let hi = !self.lo;
        if lo < I32_MIN || hi > I32_MAX {
            return Self::top();
        }
        Self::new(lo, hi, self.stride)
    }

    /// Bitwise OR via Warren's "Hacker's Delight" `minOR`/`maxOR`
    /// bit-scanning, applied per sign-combination quadrant (dispatching on
    /// the four sign cases: both non-negative, both negative, or mixed).
    pub fn or(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        if let (Some(a), Some(b)) = (self.as_constant(), other.as_constant()) {
            return Self::constant(a | b);
        }
        let (a_lo, a_hi) = (self.lo as i32 as u32, self.hi as i32 as u32);
        let (b_lo, b_hi) = (other.lo as i32 as u32, other.hi as i32 as u32);
        let both_nonneg = self.lo >= 0 && other.lo >= 0;
        let both_neg = self.hi < 0 && other.hi < 0;
        let (lo, hi) = if both_nonneg || both_neg {
            (min_or(a_lo, a_hi, b_lo, b_hi), max_or(a_lo, a_hi, b_lo, b_hi))
        } else {
            // Mixed sign: widen to the sound envelope rather than work out
            // the full case split, per the simplification noted in
            // DESIGN.md.
            return Self::top();
        };
        let lo = lo as i32 as i64;
        let hi = hi as i32 as i64;
        if lo > hi {
            return Self::top();
        }
        Self::new(lo, hi, 1)
    }

    /// `a & b = ~(~a | ~b)` (De Morgan).
    pub fn and(&self, other: &Self) -> Self {
        self.not().or(&other.not()).not()
    }

    /// `a ^ b = (a & ~b) | (~a & b)`.
    pub fn xor(&self, other: &Self) -> Self {
        self.and(&other.not()).or(&self.not().and(other))
    }

    /// Logical left shift. Exact for a constant shift amount, `TOP`
    /// otherwise: a sound general formula for a ranging shift amount isn't
    /// worth the complexity given how rarely it occurs in practice.
    pub fn lshift(&self, amount: &Self) -> Self {
        self.shift_by(amount, |v, n| v.checked_shl(n))
    }

    pub fn arshift(&self, amount: &Self) -> Self {
        self.shift_by(amount, |v, n| if n >= 32 { Some(if v < 0 { -1 } else { 0 }) } else { Some(v >> n) })
    }

    pub fn rshift(&self, amount: &Self) -> Self {
        if self.is_bot() || amount.is_bot() {
            return Self::bot();
        }
        let Some(n) = amount.as_constant() else { return Self::top() };
        if !(0..32).contains(&n) {
            return Self::top();
        }
        let (lo, hi) = self.to_unsigned_bounds();
        Self::new((lo >> n) as i64, (hi >> n) as i64, 1)
    }

    fn shift_by(&self, amount: &Self, f: impl Fn(i64, u32) -> Option<i64>) -> Self {
        if self.is_bot() || amount.is_bot() {
            return Self::bot();
        }
        let Some(n) = amount.as_constant() else { return Self::top() };
        if !(0..32).contains(&n) {
            return Self::top();
        }
        match self.checked_binop(&Self::constant(n), |a, _| f(a, n as u32)) {
            Some((lo, hi)) => {
                let stride = self.stride.checked_shl(n as u32).filter(|s| *s != 0).unwrap_or(1);
                Self::new(lo, hi, stride.max(1))
            }
            None => Self::top(),
        }
    }

    /// Boolean comparisons return `true`/`false`/`TOP` (both) as `0`/`1`/
    /// `[0,1]/1`.
    pub fn cmp_eq(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        match (self.as_constant(), other.as_constant()) {
            (Some(a), Some(b)) => Self::constant((a == b) as i64),
            _ if !self.overlaps(other) => Self::constant(0),
            _ => Self::new(0, 1, 1),
        }
    }

    pub fn cmp_slt(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        if self.hi < other.lo {
            Self::constant(1)
        } else if self.lo >= other.hi {
            Self::constant(0)
        } else {
            Self::new(0, 1, 1)
        }
    }

    pub fn cmp_ult(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        let (a_lo, a_hi) = self.to_unsigned_bounds();
        let (b_lo, b_hi) = other.to_unsigned_bounds();
        if a_hi < b_lo {
            Self::constant(1)
        } else if a_lo >= b_hi {
            Self::constant(0)
        } else {
            Self::new(0, 1, 1)
        }
    }

    /// `!=`, the complement of [`Self::cmp_eq`].
    pub fn cmp_neq(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        match (self.as_constant(), other.as_constant()) {
            (Some(a), Some(b)) => Self::constant((a != b) as i64),
            _ if !self.overlaps(other) => Self::constant(1),
            _ => Self::new(0, 1, 1),
        }
    }

    /// Signed `<=`: precise when the ranges are disjoint or touch only at
    /// `self`'s top bound, `TOP`-ish `[0,1]` boolean otherwise.
    pub fn cmp_sle(&self, other: &Self) -> Self {
        if self.is_bot() || other.is_bot() {
            return Self::bot();
        }
        if self.hi <= other.lo {
            Self::constant(1)
        } else if self.lo > other.hi {
            Self::constant(0)
        } else {
            Self::new(0, 1, 1)
        }
    }

    /// Left rotate. Exact (identity) for a zero shift amount, `TOP`
    /// otherwise: precise bound propagation through rotation isn't
    /// attempted.
    pub fn lrotate(&self, amount: &Self) -> Self {
        self.rotate_by(amount)
    }

    pub fn rrotate(&self, amount: &Self) -> Self {
        self.rotate_by(amount)
    }

    fn rotate_by(&self, amount: &Self) -> Self {
        if self.is_bot() || amount.is_bot() {
            return Self::bot();
        }
        match amount.as_constant() {
            Some(0) => *self,
            _ => Self::top(),
        }
    }

    /// Split two ordered, pairwise-non-overlapping interval lists over a
    /// shared address axis into an ordered sequence of sub-intervals each
    /// tagged by which input(s) covered it — the backbone of region
    /// read/write/join/meet/widen.
    ///
    /// Produces an ordered partition of the union with no gap or overlap,
    /// each piece tagged `First`/`Second`/`Both`, via a breakpoint sweep:
    /// every `lo` and `hi + 1` of every input
    /// interval is a candidate cut point, and each resulting slice is
    /// assigned the widest stride under which it stays a subset of the
    /// input interval(s) covering it (falling back to stride 1, "assume
    /// every address individually", when the slice's bounds don't line up
    /// with the covering interval's stride — the signal a caller uses to
    /// detect misalignment). Recorded as a simplification in DESIGN.md.
    pub fn split(a: &[StridedInterval], b: &[StridedInterval]) -> Vec<(StridedInterval, SplitTag)> {
        let mut points: Vec<i64> = Vec::with_capacity(2 * (a.len() + b.len()));
        for iv in a.iter().chain(b.iter()) {
            if iv.is_bot() {
                continue;
            }
            points.push(iv.lo);
            points.push(iv.hi + 1);
        }
        points.sort_unstable();
        points.dedup();

        let mut out = Vec::new();
        for w in points.windows(2) {
            let (x, y_excl) = (w[0], w[1]);
            if x >= y_excl {
                continue;
            }
            let hi = y_excl - 1;
            let ca = a.iter().find(|iv| !iv.is_bot() && iv.lo <= x && hi <= iv.hi);
            let cb = b.iter().find(|iv| !iv.is_bot() && iv.lo <= x && hi <= iv.hi);
            let piece = match (ca, cb) {
                (Some(ca), Some(cb)) => {
                    let sa = Self::chunk_stride(ca, x, hi);
                    let sb = Self::chunk_stride(cb, x, hi);
                    let stride = if sa == ca.stride && sb == cb.stride && ca.stride == cb.stride { ca.stride } else { 1 };
                    Some((Self::new(x, hi, stride), SplitTag::Both))
                }
                (Some(ca), None) => Some((Self::new(x, hi, Self::chunk_stride(ca, x, hi)), SplitTag::First)),
                (None, Some(cb)) => Some((Self::new(x, hi, Self::chunk_stride(cb, x, hi)), SplitTag::Second)),
                (None, None) => None,
            };
            if let Some(piece) = piece {
                out.push(piece);
            }
        }
        out
    }

    /// The widest stride under which `[x, hi]` stays aligned to `orig`'s own
    /// stride, or `1` if `[x, hi]` cuts across `orig` at a misaligned point.
    fn chunk_stride(orig: &StridedInterval, x: i64, hi: i64) -> u32 {
        if orig.is_constant() {
            return 1;
        }
        if (x - orig.lo) % orig.stride as i64 == 0 && (hi - x) % orig.stride as i64 == 0 {
            orig.stride
        } else {
            1
        }
    }
}

/// Which input list(s) a piece produced by [`StridedInterval::split`] came
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SplitTag {
    First,
    Second,
    Both,
}

fn first_common_point(lo1: i64, s1: u32, lo2: i64, s2: u32, range_lo: i64, range_hi: i64) -> Option<i64> {
    let mut p = range_lo;
    while p <= range_hi {
        if (p - lo1) % s1 as i64 == 0 && (p - lo2) % s2 as i64 == 0 {
            return Some(p);
        }
        p += 1;
    }
    None
}

fn last_point_at_most(first: i64, stride: u32, hi: i64) -> i64 {
    let span = hi - first;
    first + (span / stride as i64) * stride as i64
}

fn gcd_u32(a: u32, b: u32) -> u32 {
    if b == 0 {
        a.max(1)
    } else {
        gcd_u32(b, a % b)
    }
}

fn lcm_u32(a: u32, b: u32) -> u32 {
    let g = gcd_u32(a, b);
    ((a as u64 * b as u64) / g as u64).min(u32::MAX as u64) as u32
}

/// Warren's "Hacker's Delight" §4-4 `minOR`: the minimum value of `a | b`
/// over `a in [a_lo, a_hi]`, `b in [b_lo, b_hi]`.
fn min_or(mut a_lo: u32, a_hi: u32, mut b_lo: u32, b_hi: u32) -> u32 {
    let mut m: u32 = 0x8000_0000;
    while m != 0 {
        if !a_lo & !b_lo & m != 0 {
            let temp = (a_lo | m) & m.wrapping_neg();
            if temp <= a_hi {
                a_lo = temp;
                break;
            }
            let temp = (b_lo | m) & m.wrapping_neg();
            if temp <= b_hi {
                b_lo = temp;
                break;
            }
        }
        m >>= 1;
    }
    a_lo | b_lo
}

/// `maxOR`: the maximum value of `a | b` over the same ranges.
fn max_or(a_lo: u32, mut a_hi: u32, b_lo: u32, mut b_hi: u32) -> u32 {
    let mut m: u32 = 0x8000_0000;
    while m != 0 {
        if a_hi & b_hi & m != 0 {
            let temp = (a_hi.wrapping_sub(m)) | (m - 1);
            if temp >= a_lo {
                a_hi = temp;
                break;
            }
            let temp = (b_hi.wrapping_sub(m)) | (m - 1);
            if temp >= b_lo {
                b_hi = temp;
                break;
            }
        }
        m >>= 1;
    }
    a_hi | b_hi
}

impl PartialEq for StridedInterval {
    fn eq(&self, other: &Self) -> bool {
        match (self.is_bot(), other.is_bot()) {
            (true, true) => true,
            (true, false) | (false, true) => false,
            _ => self.lo == other.lo && self.hi == other.hi && self.stride == other.stride,
        }
    }
}

/// Total order by `(lo, hi, stride)`, used only to key a [`crate::pmap::PMap`]
/// by address interval; not a semantic comparison of the sets the intervals
/// denote.
impl PartialOrd for StridedInterval {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StridedInterval {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.lo, self.hi, self.stride).cmp(&(other.lo, other.hi, other.stride))
    }
}

impl crate::pmap::IntervalKey for StridedInterval {
    fn lo(&self) -> i64 {
        self.lo
    }
    fn hi(&self) -> i64 {
        self.hi
    }
}

impl Hash for StridedInterval {
    /// `hash = H(stride) xor (H(hi) - H(lo))`.
    fn hash<H: Hasher>(&self, state: &mut H) {
        use std::collections::hash_map::DefaultHasher;
        let mut hs = DefaultHasher::new();
        self.stride.hash(&mut hs);
        let h_stride = hs.finish();
        let mut hh = DefaultHasher::new();
        self.hi.hash(&mut hh);
        let h_hi = hh.finish();
        let mut hl = DefaultHasher::new();
        self.lo.hash(&mut hl);
        let h_lo = hl.finish();
        (h_stride ^ h_hi.wrapping_sub(h_lo)).hash(state);
    }
}

impl fmt::Debug for StridedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bot() {
            write!(f, "BOT")
        } else if self.is_top() {
            write!(f, "TOP")
        } else {
            write!(f, "[{}, {}]/{}", self.lo, self.hi, self.stride)
        }
    }
}

impl fmt::Display for StridedInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn si(lo: i64, hi: i64, stride: u32) -> StridedInterval {
        StridedInterval::new(lo, hi, stride)
    }

    #[test]
    fn join_widens_envelope_and_gcds_stride() {
        pretty_assertions::assert_eq!(si(4, 8, 4).join(&si(8, 12, 4)), si(4, 12, 4));
    }

    #[test]
    fn meet_narrows_to_common_points() {
        pretty_assertions::assert_eq!(si(0, 12, 4).meet(&si(4, 16, 4)), si(4, 12, 4));
    }

    #[test]
    fn widen_escapes_to_top_when_bound_moves_outward() {
        pretty_assertions::assert_eq!(si(0, 12, 4).widen(&si(0, 16, 4)), StridedInterval::top());
    }

    #[test]
    fn add_shifts_and_gcds() {
        assert_eq!(si(4, 8, 4).add(&si(8, 12, 4)), si(12, 20, 4));
    }

    #[test]
    fn add_overflow_goes_to_top() {
        let near_max = si(I32_MAX - 1, I32_MAX, 1);
        assert!(near_max.add(&StridedInterval::constant(10)).is_top());
    }

    #[test]
    fn restrict_upper_bound_shrinks_to_the_aligned_point_at_or_below() {
        pretty_assertions::assert_eq!(si(0, 16, 4).restrict_upper_bound(12), si(0, 12, 4));
        pretty_assertions::assert_eq!(si(0, 16, 4).restrict_upper_bound(14), si(0, 12, 4));
    }

    #[test]
    fn restrict_upper_bound_below_lo_is_bot() {
        assert!(si(4, 16, 4).restrict_upper_bound(0).is_bot());
    }

    #[test]
    fn restrict_lower_bound_shrinks_to_the_aligned_point_at_or_above() {
        pretty_assertions::assert_eq!(si(0, 16, 4).restrict_lower_bound(4), si(4, 16, 4));
        pretty_assertions::assert_eq!(si(0, 16, 4).restrict_lower_bound(6), si(8, 16, 4));
    }

    #[test]
    fn restrict_lower_bound_above_hi_is_bot() {
        assert!(si(0, 12, 4).restrict_lower_bound(16).is_bot());
    }

    #[test]
    fn top_and_bot_are_absorbing_for_join() {
        let x = si(4, 8, 4);
        assert_eq!(x.join(&StridedInterval::bot()), x);
        assert!(x.join(&StridedInterval::top()).is_top());
    }

    #[test]
    fn meet_disjoint_ranges_is_bot() {
        assert!(si(0, 4, 4).meet(&si(100, 104, 4)).is_bot());
    }

    #[test]
    fn constant_contains_only_itself() {
        let c = StridedInterval::constant(42);
        assert!(c.contains(42));
        assert!(!c.contains(43));
        assert!(c.is_constant());
    }

    #[test]
    fn subsumption_respects_stride_divisibility() {
        let narrow = si(4, 8, 4);
        let wide = si(0, 12, 4);
        assert!(narrow.subsumed_by(&wide));
        assert!(!wide.subsumed_by(&narrow));
    }

    #[test]
    fn not_matches_twos_complement_identity() {
        let x = StridedInterval::constant(5);
        assert_eq!(x.not(), StridedInterval::constant(!5i64));
    }

    #[test]
    fn or_of_constants_matches_native_or() {
        let a = StridedInterval::constant(0b1010);
        let b = StridedInterval::constant(0b0110);
        assert_eq!(a.or(&b), StridedInterval::constant(0b1110));
    }

    #[test]
    fn and_of_constants_matches_native_and() {
        let a = StridedInterval::constant(0b1010);
        let b = StridedInterval::constant(0b0110);
        assert_eq!(a.and(&b), StridedInterval::constant(0b0010));
    }

    #[test]
    fn xor_of_constants_matches_native_xor() {
        let a = StridedInterval::constant(0b1010);
        let b = StridedInterval::constant(0b0110);
        assert_eq!(a.xor(&b), StridedInterval::constant(0b1100));
    }

    #[test]
    fn or_of_ranges_is_sound_envelope() {
        let a = si(0, 3, 1);
        let b = si(4, 7, 1);
        let result = a.or(&b);
        for x in 0..=3 {
            for y in 4..=7 {
                assert!(result.contains(x | y), "{:?} should contain {}", result, x | y);
            }
        }
    }

    #[test]
    fn lshift_by_constant_is_precise() {
        let a = si(1, 3, 1);
        let two = StridedInterval::constant(2);
        assert_eq!(a.lshift(&two), si(4, 12, 4));
    }

    #[test]
    fn lshift_by_range_is_top() {
        let a = si(1, 3, 1);
        let n = si(1, 2, 1);
        assert!(a.lshift(&n).is_top());
    }

    #[test]
    fn sdivide_by_zero_is_bot() {
        let a = si(4, 8, 4);
        assert!(a.sdivide(&StridedInterval::constant(0)).is_bot());
    }

    #[test]
    fn cmp_eq_disjoint_is_false() {
        let a = si(0, 4, 4);
        let b = si(100, 104, 4);
        assert_eq!(a.cmp_eq(&b), StridedInterval::constant(0));
    }

    #[test]
    fn cmp_slt_precise_when_ranges_disjoint() {
        let a = si(0, 4, 4);
        let b = si(100, 104, 4);
        assert_eq!(a.cmp_slt(&b), StridedInterval::constant(1));
    }

    #[test]
    fn hash_matches_spec_formula_shape() {
        // Equal intervals must hash equal; this is the property actually
        // relied on by the hash-consing map, independent of the exact
        // mixing function.
        let a = si(4, 8, 4);
        let b = si(4, 8, 4);
        use std::collections::hash_map::DefaultHasher;
        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn bot_is_canonical_inverted_range() {
        let b = StridedInterval::bot();
        assert_eq!(b.lo(), 0);
        assert_eq!(b.hi(), -1);
        assert!(b.is_bot());
    }

    #[test]
    fn split_of_identical_single_intervals_is_one_both_piece() {
        let a = [si(4, 12, 4)];
        let b = [si(4, 12, 4)];
        let out = StridedInterval::split(&a, &b);
        assert_eq!(out, vec![(si(4, 12, 4), SplitTag::Both)]);
    }

    #[test]
    fn split_of_disjoint_intervals_tags_first_and_second() {
        let a = [si(0, 4, 4)];
        let b = [si(8, 12, 4)];
        let out = StridedInterval::split(&a, &b);
        assert_eq!(out, vec![(si(0, 4, 4), SplitTag::First), (si(8, 12, 4), SplitTag::Second)]);
    }

    #[test]
    fn split_of_overlapping_ranges_covers_the_union_with_no_gap_or_overlap() {
        let a = [si(0, 16, 4)];
        let b = [si(8, 24, 4)];
        let out = StridedInterval::split(&a, &b);
        // No gaps or overlaps: each piece's hi+1 equals the next piece's lo.
        for pair in out.windows(2) {
            assert_eq!(pair[0].0.hi() + 1, pair[1].0.lo());
        }
        assert_eq!(out.first().unwrap().0.lo(), 0);
        assert_eq!(out.last().unwrap().0.hi(), 24);
        // The overlapping middle chunk is tagged Both.
        assert!(out.iter().any(|(iv, tag)| iv.lo() == 8 && iv.hi() == 16 && *tag == SplitTag::Both));
    }

    #[test]
    fn split_misaligned_overlap_falls_back_to_stride_one() {
        let a = [si(0, 8, 4)];
        let b = [si(2, 10, 4)];
        let out = StridedInterval::split(&a, &b);
        let both = out.iter().find(|(_, tag)| *tag == SplitTag::Both).unwrap();
        assert_eq!(both.0.stride(), 1);
    }
}
