//! Identity, type and geometry primitives shared by the client and the pipeline.

pub mod children;
pub mod geometry;
pub mod id;
pub mod matrix;
pub mod node_type;

pub use geometry::{Color, RectI, Vector2f, Vector4f};
pub use id::{extract_pid, make_node_id, AnimationId, IdGenerator, NodeId, INVALID_NODE_ID};
pub use matrix::Matrix;
pub use node_type::{NodeType, NodeTypeSet};
