//! The client side: lightweight proxy nodes mirroring the authoritative
//! tree, and the per-process context their commands flow through.

pub mod node;
pub mod node_map;
pub mod routing;
pub mod ui_context;

pub use node::ProxyNode;
pub use node_map::NodeMap;
pub use routing::{follow_type, route, CommandRoute, RenderMode, RenderTargets, RouteNode};
pub use ui_context::{AnimationFinishCallback, BufferAvailableCallback, UiContext, UiDirector};
