//! Closed set of node kinds and their "is-a" relationships.
//!
//! Every kind knows its full ancestor set, so `is_instance_of` is a single
//! set-containment test. The set representation is private to this module;
//! nothing outside depends on how the bits are laid out.
//!
//! ```text
//! Base
//! ├── Display
//! └── Rs
//!     ├── Surface
//!     ├── Proxy
//!     └── Canvas
//!         └── Root
//! ```

use bitflags::bitflags;

bitflags! {
    /// A set of node kinds.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct NodeTypeSet: u16 {
        const BASE = 1 << 0;
        const DISPLAY = 1 << 1;
        const RS = 1 << 2;
        const SURFACE = 1 << 3;
        const PROXY = 1 << 4;
        const CANVAS = 1 << 5;
        const ROOT = 1 << 6;
    }
}

/// Concrete kind of a node, shared by proxy nodes and render nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NodeType {
    Base = 0,
    Display = 1,
    Rs = 2,
    Surface = 3,
    Proxy = 4,
    Canvas = 5,
    Root = 6,
}

impl NodeType {
    pub const ALL: [NodeType; 7] = [
        NodeType::Base,
        NodeType::Display,
        NodeType::Rs,
        NodeType::Surface,
        NodeType::Proxy,
        NodeType::Canvas,
        NodeType::Root,
    ];

    /// The kind itself as a one-element set.
    pub fn as_set(self) -> NodeTypeSet {
        match self {
            NodeType::Base => NodeTypeSet::BASE,
            NodeType::Display => NodeTypeSet::DISPLAY,
            NodeType::Rs => NodeTypeSet::RS,
            NodeType::Surface => NodeTypeSet::SURFACE,
            NodeType::Proxy => NodeTypeSet::PROXY,
            NodeType::Canvas => NodeTypeSet::CANVAS,
            NodeType::Root => NodeTypeSet::ROOT,
        }
    }

    /// The kind plus every ancestor kind.
    pub fn lineage(self) -> NodeTypeSet {
        match self {
            NodeType::Base => NodeTypeSet::BASE,
            NodeType::Display => NodeTypeSet::BASE | NodeTypeSet::DISPLAY,
            NodeType::Rs => NodeTypeSet::BASE | NodeTypeSet::RS,
            NodeType::Surface => NodeTypeSet::BASE | NodeTypeSet::RS | NodeTypeSet::SURFACE,
            NodeType::Proxy => NodeTypeSet::BASE | NodeTypeSet::RS | NodeTypeSet::PROXY,
            NodeType::Canvas => NodeTypeSet::BASE | NodeTypeSet::RS | NodeTypeSet::CANVAS,
            NodeType::Root => {
                NodeTypeSet::BASE | NodeTypeSet::RS | NodeTypeSet::CANVAS | NodeTypeSet::ROOT
            }
        }
    }

    /// `true` when `self` is `ancestor` or derives from it.
    #[inline]
    pub fn is_instance_of(self, ancestor: NodeType) -> bool {
        self.lineage().contains(ancestor.as_set())
    }

    /// Upper-case name used in tree dumps.
    pub fn dump_name(self) -> &'static str {
        match self {
            NodeType::Base => "BASE_NODE",
            NodeType::Display => "DISPLAY_NODE",
            NodeType::Rs => "RS_NODE",
            NodeType::Surface => "SURFACE_NODE",
            NodeType::Proxy => "PROXY_NODE",
            NodeType::Canvas => "CANVAS_NODE",
            NodeType::Root => "ROOT_NODE",
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_kind_is_a_base() {
        for kind in NodeType::ALL {
            assert!(kind.is_instance_of(NodeType::Base), "{kind:?}");
            assert!(kind.is_instance_of(kind));
        }
    }

    #[test]
    fn test_lineage_is_superset_of_ancestors() {
        assert!(NodeType::Root.is_instance_of(NodeType::Canvas));
        assert!(NodeType::Root.is_instance_of(NodeType::Rs));
        assert!(NodeType::Surface.is_instance_of(NodeType::Rs));
        assert!(!NodeType::Display.is_instance_of(NodeType::Rs));
        assert!(!NodeType::Canvas.is_instance_of(NodeType::Root));
        assert!(!NodeType::Surface.is_instance_of(NodeType::Canvas));

        for kind in NodeType::ALL {
            for other in NodeType::ALL {
                if kind.is_instance_of(other) {
                    assert!(kind.lineage().contains(other.lineage()));
                }
            }
        }
    }

    #[test]
    fn test_from_u8_round_trips() {
        for kind in NodeType::ALL {
            assert_eq!(NodeType::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(NodeType::from_u8(200), None);
    }
}
