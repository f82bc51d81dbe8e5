//! The two traversal passes of a rendered frame.
//!
//! The prepare pass walks the on-tree nodes once, resolving absolute
//! geometry, clipping and the region that changed since the previous frame.
//! The process pass replays the prepared nodes into the drawing backend and
//! gathers the surfaces under each display node as composition layers.

use crate::common::{Matrix, NodeId, RectI, Vector2f};

use super::backend::{DrawItem, DrawingBackend};
use super::composer::{CompositionType, LayerInfo, ScreenLayers};
use super::context::RenderContext;
use super::render_node::RenderNodeKind;

/// A node as resolved by the prepare pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedNode {
    pub id: NodeId,
    pub matrix: Matrix,
    pub bounds: RectI,
    pub visible_region: RectI,
    pub alpha: f32,
    /// Index of the enclosing display in the frame's screen list.
    screen: Option<usize>,
}

#[derive(Clone, Copy)]
struct ParentFrame {
    matrix: Matrix,
    clip: Option<RectI>,
    alpha: f32,
    dirty: bool,
    screen: Option<usize>,
}

#[derive(Debug, Default)]
pub struct RenderVisitor {
    prepared: Vec<PreparedNode>,
    screens: Vec<ScreenLayers>,
    dirty_region: RectI,
}

impl RenderVisitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prepared(&self) -> &[PreparedNode] {
        &self.prepared
    }

    /// Union of every area that changed since the previous frame.
    pub fn dirty_region(&self) -> RectI {
        self.dirty_region
    }

    /// Resolve geometry for every visible on-tree node and clear dirty flags.
    pub fn prepare(&mut self, context: &mut RenderContext) {
        self.prepared.clear();
        self.screens.clear();
        self.dirty_region = RectI::default();

        let root = ParentFrame {
            matrix: Matrix::IDENTITY,
            clip: None,
            alpha: 1.0,
            dirty: false,
            screen: None,
        };
        for child in context.sorted_children(context.root_id()) {
            self.prepare_node(context, child, root);
        }
    }

    fn prepare_node(&mut self, context: &mut RenderContext, id: NodeId, parent: ParentFrame) {
        let Some(node) = context.get_mut(id) else {
            return;
        };

        let skip = match node.kind() {
            RenderNodeKind::Root { enable_render, .. } => !enable_render,
            _ => false,
        } || !node.properties().is_drawable();
        if skip {
            if node.is_dirty() || parent.dirty {
                self.dirty_region = self.dirty_region.join(&node.last_frame_rect);
                node.last_frame_rect = RectI::default();
            }
            node.clear_dirty();
            return;
        }

        let mut matrix = parent.matrix;
        let mut screen = parent.screen;
        if let RenderNodeKind::Display {
            screen_id,
            offset_x,
            offset_y,
        } = *node.kind()
        {
            matrix = matrix.then(&Matrix::translate(-offset_x as f32, -offset_y as f32));
            screen = Some(self.screens.len());
            self.screens.push(ScreenLayers {
                screen_id,
                display_node: id,
                layers: Vec::new(),
            });
        }

        let props = node.properties();
        let (width, height) = (props.bounds.width(), props.bounds.height());
        let local = Matrix::node_local(
            Vector2f::new(props.bounds.x + props.translate.x, props.bounds.y + props.translate.y),
            Vector2f::new(props.pivot.x * width, props.pivot.y * height),
            props.rotation,
            props.scale,
        );
        let matrix = matrix.then(&local);
        let bounds = matrix.map_rect(width, height);
        let visible_region = match parent.clip {
            Some(clip) => bounds.intersect(&clip),
            None => bounds,
        };
        let alpha = parent.alpha * props.alpha;
        let clip = if props.clip_to_bounds {
            Some(parent.clip.map_or(bounds, |clip| clip.intersect(&bounds)))
        } else {
            parent.clip
        };

        let dirty = node.is_dirty() || parent.dirty;
        if dirty {
            self.dirty_region = self
                .dirty_region
                .join(&node.last_frame_rect)
                .join(&visible_region);
        }
        node.last_frame_rect = visible_region;
        node.clear_dirty();

        self.prepared.push(PreparedNode {
            id,
            matrix,
            bounds,
            visible_region,
            alpha,
            screen,
        });

        let frame = ParentFrame {
            matrix,
            clip,
            alpha,
            dirty,
            screen,
        };
        for child in context.sorted_children(id) {
            self.prepare_node(context, child, frame);
        }
    }

    /// Draw the prepared nodes that intersect the dirty region and return
    /// the composition layers of each display, in traversal order.
    pub fn process(
        &mut self,
        context: &RenderContext,
        backend: &mut dyn DrawingBackend,
    ) -> Vec<ScreenLayers> {
        backend.begin_frame(self.dirty_region);
        for prepared in &self.prepared {
            let Some(node) = context.get(prepared.id) else {
                continue;
            };

            if let (Some(surface), Some(screen)) = (node.surface(), prepared.screen) {
                // Screens are handed out by the first process after a prepare.
                let Some(screen) = self.screens.get_mut(screen) else {
                    continue;
                };
                if !prepared.visible_region.is_empty() {
                    let layers = &mut screen.layers;
                    layers.push(LayerInfo {
                        node: prepared.id,
                        zorder: layers.len() as u32,
                        crop: prepared.visible_region,
                        buffer: surface.buffer,
                        composition_type: if surface.buffer.is_some() {
                            CompositionType::Device
                        } else {
                            CompositionType::Client
                        },
                    });
                }
                continue;
            }

            let cmd_lists = node.recordings();
            let background = node.properties().background_color;
            if cmd_lists.is_empty() && background.a == 0 {
                continue;
            }
            if prepared.visible_region.intersect(&self.dirty_region).is_empty() {
                continue;
            }
            backend.draw_node(&DrawItem {
                node: prepared.id,
                bounds: prepared.bounds,
                matrix: prepared.matrix,
                visible_region: prepared.visible_region,
                alpha: prepared.alpha,
                background,
                cmd_lists,
            });
        }
        backend.end_frame();
        std::mem::take(&mut self.screens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Color, Vector4f};
    use crate::pipeline::draw_cmd::{DrawCmdList, DrawOp, DrawSlot};
    use crate::pipeline::properties::PropertyUpdate;
    use crate::pipeline::render_node::{RenderNode, SurfaceBuffer};

    #[derive(Default)]
    struct RecordingBackend {
        dirty: Vec<RectI>,
        drawn: Vec<(NodeId, RectI)>,
    }

    impl DrawingBackend for RecordingBackend {
        fn begin_frame(&mut self, dirty_region: RectI) {
            self.dirty.push(dirty_region);
        }

        fn draw_node(&mut self, item: &DrawItem<'_>) {
            self.drawn.push((item.node, item.visible_region));
        }

        fn end_frame(&mut self) {}
    }

    fn set_bounds(context: &mut RenderContext, id: NodeId, x: f32, y: f32, w: f32, h: f32) {
        context
            .get_mut(id)
            .unwrap()
            .properties_mut()
            .apply(&PropertyUpdate::Bounds(Vector4f::new(x, y, w, h)));
    }

    fn record(context: &mut RenderContext, id: NodeId) {
        let mut list = DrawCmdList::new(10, 10);
        list.push(DrawOp::Rect {
            rect: Vector4f::new(0.0, 0.0, 10.0, 10.0),
            color: Color::WHITE,
        });
        if let RenderNodeKind::Canvas { recordings } = context.get_mut(id).unwrap().kind_mut() {
            recordings[DrawSlot::Content.index()] = Some(list);
        }
    }

    fn scene() -> RenderContext {
        let mut context = RenderContext::new();
        context.register_node(RenderNode::new(1, RenderNodeKind::display(7)));
        context.add_child(0, 1, -1);
        context.register_node(RenderNode::new(2, RenderNodeKind::canvas()));
        context.add_child(1, 2, -1);
        set_bounds(&mut context, 2, 10.0, 10.0, 100.0, 100.0);
        context.register_node(RenderNode::new(3, RenderNodeKind::canvas()));
        context.add_child(2, 3, -1);
        set_bounds(&mut context, 3, 5.0, 5.0, 20.0, 20.0);
        record(&mut context, 3);
        context
    }

    #[test]
    fn test_prepare_resolves_absolute_bounds() {
        let mut context = scene();
        let mut visitor = RenderVisitor::new();
        visitor.prepare(&mut context);

        let child = visitor.prepared().iter().find(|p| p.id == 3).unwrap();
        assert_eq!(child.bounds, RectI::new(15, 15, 20, 20));
        assert_eq!(visitor.dirty_region(), RectI::new(10, 10, 100, 100));
        assert!(!context.get(3).unwrap().is_dirty());
    }

    #[test]
    fn test_clip_limits_visible_region() {
        let mut context = scene();
        set_bounds(&mut context, 3, 90.0, 90.0, 20.0, 20.0);
        context
            .get_mut(2)
            .unwrap()
            .properties_mut()
            .apply(&PropertyUpdate::ClipToBounds(true));
        let mut visitor = RenderVisitor::new();
        visitor.prepare(&mut context);
        let child = visitor.prepared().iter().find(|p| p.id == 3).unwrap();
        assert_eq!(child.visible_region, RectI::new(100, 100, 10, 10));
    }

    #[test]
    fn test_unchanged_frame_draws_nothing() {
        let mut context = scene();
        let mut visitor = RenderVisitor::new();
        let mut backend = RecordingBackend::default();
        visitor.prepare(&mut context);
        visitor.process(&context, &mut backend);
        assert_eq!(backend.drawn, vec![(3, RectI::new(15, 15, 20, 20))]);

        visitor.prepare(&mut context);
        visitor.process(&context, &mut backend);
        assert!(backend.dirty[1].is_empty());
        assert_eq!(backend.drawn.len(), 1);
    }

    #[test]
    fn test_hidden_node_dirties_its_last_rect() {
        let mut context = scene();
        let mut visitor = RenderVisitor::new();
        visitor.prepare(&mut context);

        let node = context.get_mut(3).unwrap();
        node.properties_mut().apply(&PropertyUpdate::Visible(false));
        node.mark_dirty(crate::pipeline::DirtyFlags::PROPERTIES);
        visitor.prepare(&mut context);
        assert_eq!(visitor.dirty_region(), RectI::new(15, 15, 20, 20));
        assert!(visitor.prepared().iter().all(|p| p.id != 3));
    }

    #[test]
    fn test_surfaces_become_layers_of_their_display() {
        let mut context = scene();
        context.register_node(RenderNode::new(4, RenderNodeKind::surface("video".into())));
        context.add_child(2, 4, -1);
        set_bounds(&mut context, 4, 0.0, 0.0, 50.0, 40.0);
        context.get_mut(4).unwrap().surface_mut().unwrap().buffer = Some(SurfaceBuffer {
            width: 50,
            height: 40,
            sequence: 1,
            timestamp: 0,
            acquire_fence: -1,
        });

        let mut visitor = RenderVisitor::new();
        visitor.prepare(&mut context);
        let screens = visitor.process(&context, &mut RecordingBackend::default());
        assert_eq!(screens.len(), 1);
        assert_eq!(screens[0].screen_id, 7);
        assert_eq!(screens[0].layers.len(), 1);
        assert_eq!(screens[0].layers[0].node, 4);
        assert_eq!(screens[0].layers[0].crop, RectI::new(10, 10, 50, 40));
        assert_eq!(screens[0].layers[0].composition_type, CompositionType::Device);
    }

    #[test]
    fn test_second_process_without_prepare_yields_no_screens() {
        let mut context = scene();
        context.register_node(RenderNode::new(4, RenderNodeKind::surface("video".into())));
        context.add_child(2, 4, -1);
        set_bounds(&mut context, 4, 0.0, 0.0, 50.0, 40.0);

        let mut visitor = RenderVisitor::new();
        visitor.prepare(&mut context);
        assert_eq!(visitor.process(&context, &mut RecordingBackend::default()).len(), 1);
        assert!(visitor.process(&context, &mut RecordingBackend::default()).is_empty());
    }

    #[test]
    fn test_disabled_root_is_not_drawn() {
        let mut context = RenderContext::new();
        context.register_node(RenderNode::new(1, RenderNodeKind::root()));
        context.add_child(0, 1, -1);
        if let RenderNodeKind::Root { enable_render, .. } = context.get_mut(1).unwrap().kind_mut() {
            *enable_render = false;
        }
        let mut visitor = RenderVisitor::new();
        visitor.prepare(&mut context);
        assert!(visitor.prepared().is_empty());
    }
}
