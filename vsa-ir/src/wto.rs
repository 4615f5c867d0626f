//! Weak topological ordering of a CFG, as supplied by the CFG builder,
//! following Bourdoncle's nested-component decomposition.
//!
//! Bourdoncle's own formulation is a flat list of `(vertex, depth)` pairs
//! plus derived component/enclosing maps. The recursive shape below is
//! equivalent but easier to fold over: a `WtoComponent::Vertex` is a plain
//! visit, a `WtoComponent::Component` is a loop whose `head` is the SCC
//! entry (the widening point) and whose `body` is the nested ordering of
//! everything else in the SCC.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use crate::cfg::BasicBlockId;

/// One element of a [`Wto`]'s top-level (or nested) ordering.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WtoComponent {
    /// A single basic block visited once per fixpoint pass at this nesting
    /// level.
    Vertex(BasicBlockId),
    /// A strongly connected component: `head` is where join/widen happens on
    /// re-entry, `body` is its nested ordering.
    Component {
        head: BasicBlockId,
        body: Vec<WtoComponent>,
    },
}

impl WtoComponent {
    /// The representative vertex: the block itself, or a component's head.
    pub fn head(&self) -> BasicBlockId {
        match self {
            WtoComponent::Vertex(v) => *v,
            WtoComponent::Component { head, .. } => *head,
        }
    }
}

/// A weak topological ordering over one function's [`crate::cfg::Cfg`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wto {
    pub components: Vec<WtoComponent>,
}

impl Wto {
    /// Depth-first, pre-order visit of every vertex in the ordering,
    /// including component heads (visited once per occurrence, i.e. a loop
    /// head is yielded both before its nested body and does not repeat after
    /// it — re-entry on widening is a worklist concern, not a property of the
    /// static ordering).
    pub fn iter_vertices(&self) -> impl Iterator<Item = BasicBlockId> + '_ {
        fn walk<'a>(components: &'a [WtoComponent], out: &mut Vec<BasicBlockId>) {
            for c in components {
                match c {
                    WtoComponent::Vertex(v) => out.push(*v),
                    WtoComponent::Component { head, body } => {
                        out.push(*head);
                        walk(body, out);
                    }
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.components, &mut out);
        out.into_iter()
    }

    /// `true` if `v` is the head of some component (i.e. a widening point).
    pub fn is_component_head(&self, v: BasicBlockId) -> bool {
        fn search(components: &[WtoComponent], v: BasicBlockId) -> bool {
            components.iter().any(|c| match c {
                WtoComponent::Vertex(_) => false,
                WtoComponent::Component { head, body } => *head == v || search(body, v),
            })
        }
        search(&self.components, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bb(n: u32) -> BasicBlockId {
        BasicBlockId(n)
    }

    #[test]
    fn flattens_nested_components_in_order() {
        let wto = Wto {
            components: vec![
                WtoComponent::Vertex(bb(0)),
                WtoComponent::Component {
                    head: bb(1),
                    body: vec![WtoComponent::Vertex(bb(2))],
                },
                WtoComponent::Vertex(bb(3)),
            ],
        };
        let order: Vec<_> = wto.iter_vertices().collect();
        assert_eq!(order, vec![bb(0), bb(1), bb(2), bb(3)]);
        assert!(wto.is_component_head(bb(1)));
        assert!(!wto.is_component_head(bb(2)));
    }
}
