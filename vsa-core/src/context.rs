//! Interprocedural calling context: a sequence of call sites used to index
//! per-function pre/post-state tables so that two distinct call chains into
//! the same function don't share a fixpoint.
//!
//! The three retention policies (insensitive, fully sensitive, k-sensitive)
//! only differ in how a new call site is folded into the sequence, so they
//! live as one enum with a derived `Ord` rather than three separate types.

use vsa_types::ProgramCounter;

/// Which calling-context policy governs how [`Context::extend`] folds in a
/// new call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextMode {
    /// Keep only the most recent call site.
    Insensitive,
    /// Keep the entire call chain.
    FullySensitive,
    /// Keep the last `k` call sites.
    KSensitive(usize),
}

/// A context-indexed call-site sequence. Two `Context`s compare equal, and
/// therefore index the same pre/post-state table entry, exactly when their
/// retained call-site sequences match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Context {
    call_sites: Vec<ProgramCounter>,
}

impl Context {
    /// The context at the analysis entry point: no call sites yet.
    pub fn root() -> Self {
        Self { call_sites: Vec::new() }
    }

    /// Build the context for a call made at `call_site` from `self`, applying
    /// `mode`'s retention policy.
    pub fn extend(&self, call_site: ProgramCounter, mode: ContextMode) -> Self {
        match mode {
            ContextMode::Insensitive => Self { call_sites: vec![call_site] },
            ContextMode::FullySensitive => {
                let mut call_sites = self.call_sites.clone();
                call_sites.push(call_site);
                Self { call_sites }
            }
            ContextMode::KSensitive(k) => {
                let mut call_sites = self.call_sites.clone();
                call_sites.push(call_site);
                let drop = call_sites.len().saturating_sub(k);
                call_sites.drain(0..drop);
                Self { call_sites }
            }
        }
    }

    /// `true` if `callee` already appears among this context's call sites,
    /// i.e. a call to it would be recursive.
    pub fn contains_call_site(&self, site: ProgramCounter) -> bool {
        self.call_sites.contains(&site)
    }

    pub fn depth(&self) -> usize {
        self.call_sites.len()
    }

    pub fn call_sites(&self) -> &[ProgramCounter] {
        &self.call_sites
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::root()
    }
}

impl std::fmt::Display for Context {
    /// Space-separated hex call sites, matching `Context.h`'s `tostring`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.call_sites.is_empty() {
            return write!(f, "<root>");
        }
        for (i, site) in self.call_sites.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{site:08x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insensitive_keeps_only_last_call_site() {
        let root = Context::root();
        let a = root.extend(0x1000, ContextMode::Insensitive);
        let b = a.extend(0x2000, ContextMode::Insensitive);
        assert_eq!(b.call_sites(), &[0x2000]);
    }

    #[test]
    fn fully_sensitive_keeps_whole_chain() {
        let root = Context::root();
        let a = root.extend(0x1000, ContextMode::FullySensitive);
        let b = a.extend(0x2000, ContextMode::FullySensitive);
        assert_eq!(b.call_sites(), &[0x1000, 0x2000]);
    }

    #[test]
    fn k_sensitive_keeps_last_k() {
        let mode = ContextMode::KSensitive(2);
        let root = Context::root();
        let a = root.extend(0x1000, mode);
        let b = a.extend(0x2000, mode);
        let c = b.extend(0x3000, mode);
        assert_eq!(c.call_sites(), &[0x2000, 0x3000]);
    }

    #[test]
    fn recursion_detected_by_call_site_membership() {
        let root = Context::root();
        let a = root.extend(0x1000, ContextMode::FullySensitive);
        assert!(a.contains_call_site(0x1000));
        assert!(!a.contains_call_site(0x2000));
    }

    #[test]
    fn distinct_contexts_are_distinct_map_keys() {
        use std::collections::BTreeMap;
        let mut table: BTreeMap<Context, u32> = BTreeMap::new();
        let root = Context::root();
        let a = root.extend(0x1000, ContextMode::FullySensitive);
        let b = root.extend(0x2000, ContextMode::FullySensitive);
        table.insert(a.clone(), 1);
        table.insert(b.clone(), 2);
        assert_eq!(table.get(&a), Some(&1));
        assert_eq!(table.get(&b), Some(&2));
    }
}
