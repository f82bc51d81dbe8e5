//! Decides which render destinations a node's commands go to.
//!
//! A process can render some nodes on its own render thread and others in
//! the render service. When the uni-render deployment is enabled, the
//! service renders everything and nodes that would normally stay local are
//! mirrored into it, so a single mutation may need to reach both.

use bitflags::bitflags;

use crate::common::NodeType;
use crate::transaction::FollowType;

bitflags! {
    /// Destinations a command is delivered to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct RenderTargets: u8 {
        /// The in-process pipeline.
        const RENDER_THREAD = 1 << 0;
        /// The cross-process render service.
        const RENDER_SERVICE = 1 << 1;
    }
}

/// Render mode as observed at the moment a command is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderMode {
    /// The deployment supports uni-render. Fixed for the process lifetime.
    pub uni_render_enabled: bool,
    /// Uni-render is currently in effect. Can flip at runtime.
    pub uni_render_active: bool,
}

impl RenderMode {
    pub fn classic() -> Self {
        Self::default()
    }

    pub fn uni_render() -> Self {
        Self {
            uni_render_enabled: true,
            uni_render_active: true,
        }
    }
}

/// The node a command is issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteNode {
    pub kind: NodeType,
    /// The node is rendered by the service regardless of mode.
    pub is_render_service_node: bool,
}

/// What kind of command is being routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRoute {
    /// Creation, destruction, properties and animations of the node itself.
    Node,
    /// A topology change involving a child of the given kind.
    Hierarchy { child: NodeType },
}

/// Destinations for a command issued on `node` under `mode`.
pub fn route(node: RouteNode, command: CommandRoute, mode: RenderMode) -> RenderTargets {
    let rendered_by_service = mode.uni_render_enabled || node.is_render_service_node;
    let mirrored = mode.uni_render_enabled && !node.is_render_service_node;

    if let CommandRoute::Hierarchy { child } = command {
        // While uni-render is enabled but not active, a surface attached under
        // a local node stays local; the service keeps the surface where it is.
        let keep_local = mode.uni_render_enabled
            && !mode.uni_render_active
            && !node.is_render_service_node
            && !node.kind.is_instance_of(NodeType::Surface)
            && child.is_instance_of(NodeType::Surface);
        if keep_local {
            return RenderTargets::RENDER_THREAD;
        }
    }

    let primary = if rendered_by_service {
        RenderTargets::RENDER_SERVICE
    } else {
        RenderTargets::RENDER_THREAD
    };
    if mirrored {
        primary | primary.complement()
    } else {
        primary
    }
}

/// How the render service schedules commands issued on `node`.
///
/// A surface that is not a render-service node draws its own content, so
/// its service-side commands wait for the buffers of its parent surface,
/// unless uni-render is in effect and composes everything in one pass.
pub fn follow_type(node: RouteNode, mode: RenderMode) -> FollowType {
    let composed_together = mode.uni_render_enabled && mode.uni_render_active;
    if node.kind.is_instance_of(NodeType::Surface) && !node.is_render_service_node && !composed_together {
        FollowType::FollowToParent
    } else {
        FollowType::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANVAS: RouteNode = RouteNode {
        kind: NodeType::Canvas,
        is_render_service_node: false,
    };
    const SURFACE: RouteNode = RouteNode {
        kind: NodeType::Surface,
        is_render_service_node: true,
    };

    #[test]
    fn test_classic_mode_uses_node_home() {
        let mode = RenderMode::classic();
        assert_eq!(route(CANVAS, CommandRoute::Node, mode), RenderTargets::RENDER_THREAD);
        assert_eq!(route(SURFACE, CommandRoute::Node, mode), RenderTargets::RENDER_SERVICE);
    }

    #[test]
    fn test_uni_render_mirrors_local_nodes() {
        let mode = RenderMode::uni_render();
        assert_eq!(route(CANVAS, CommandRoute::Node, mode), RenderTargets::all());
        assert_eq!(route(SURFACE, CommandRoute::Node, mode), RenderTargets::RENDER_SERVICE);
    }

    #[test]
    fn test_self_drawing_surface_follows_parent_unless_uni_render() {
        let self_drawing = RouteNode {
            kind: NodeType::Surface,
            is_render_service_node: false,
        };
        let inactive = RenderMode {
            uni_render_enabled: true,
            uni_render_active: false,
        };
        assert_eq!(follow_type(self_drawing, RenderMode::classic()), FollowType::FollowToParent);
        assert_eq!(follow_type(self_drawing, inactive), FollowType::FollowToParent);
        assert_eq!(follow_type(self_drawing, RenderMode::uni_render()), FollowType::None);
        assert_eq!(follow_type(SURFACE, RenderMode::classic()), FollowType::None);
        assert_eq!(follow_type(CANVAS, RenderMode::classic()), FollowType::None);
    }

    #[test]
    fn test_surface_child_stays_local_when_uni_render_inactive() {
        let mode = RenderMode {
            uni_render_enabled: true,
            uni_render_active: false,
        };
        let surface_child = CommandRoute::Hierarchy {
            child: NodeType::Surface,
        };
        let canvas_child = CommandRoute::Hierarchy {
            child: NodeType::Canvas,
        };
        assert_eq!(route(CANVAS, surface_child, mode), RenderTargets::RENDER_THREAD);
        assert_eq!(route(CANVAS, canvas_child, mode), RenderTargets::all());
        assert_eq!(route(SURFACE, surface_child, mode), RenderTargets::RENDER_SERVICE);
        assert_eq!(
            route(CANVAS, surface_child, RenderMode::uni_render()),
            RenderTargets::all()
        );
    }
}
