//! The two-pass traversal protocol.
//!
//! Every frame the camera walks the scene twice:
//!
//! 1. **RenderPrep** ([`SceneNode::render_prep`]): pre-order. Each node evaluates its
//!    visibility, computes its world matrix from the parent's, and records anything the
//!    whole frame needs (light state, the matrix of a followed node) into [`FrameState`].
//! 2. **Render** ([`SceneNode::render`]): document order. Shapes issue draw calls using the
//!    state gathered above.
//!
//! The first pass finishes for the whole tree before the second starts for any node.

use glam::{Mat4, Vec3};

use crate::light::LightState;
use crate::placement::{NodeId, Placement};
use crate::render::RenderContext;

/// Implemented by every node that can live in a scene tree.
///
/// # Implementing Custom Nodes
///
/// ```ignore
/// struct Marker {
///     placement: Placement,
/// }
///
/// impl SceneNode for Marker {
///     fn placement(&self) -> &Placement { &self.placement }
///     fn placement_mut(&mut self) -> &mut Placement { &mut self.placement }
///
///     fn render_prep(&mut self, frame: &mut FrameState, parent: Option<&Mat4>) {
///         if self.placement.begin_prep(frame) {
///             frame.record(&mut self.placement, parent);
///         }
///     }
///
///     fn render(&self, _ctx: &mut RenderContext<'_>) {}
/// }
/// ```
pub trait SceneNode {
    fn placement(&self) -> &Placement;

    fn placement_mut(&mut self) -> &mut Placement;

    /// First pass. `parent` is the parent's world matrix, `None` at the scene root.
    fn render_prep(&mut self, frame: &mut FrameState, parent: Option<&Mat4>);

    /// Second pass. Only called on nodes included by the preceding `render_prep`.
    fn render(&self, ctx: &mut RenderContext<'_>);
}

/// State accumulated during RenderPrep and read during Render.
#[derive(Debug, Default)]
pub struct FrameState {
    follow: Option<NodeId>,
    followed: Option<Mat4>,
    light: Option<LightState>,
    view: Option<Mat4>,
    prepared: usize,
}

impl FrameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A frame that records the world matrix of `target` when the traversal reaches it.
    pub fn following(target: NodeId) -> Self {
        Self {
            follow: Some(target),
            ..Self::default()
        }
    }

    /// Computes `placement`'s world matrix and notes it if this is the followed node.
    pub fn record(&mut self, placement: &mut Placement, parent: Option<&Mat4>) -> Mat4 {
        let world = placement.calc_matrix(parent);
        self.prepared += 1;
        if self.follow == Some(placement.id()) {
            self.followed = Some(world);
        }
        world
    }

    /// World matrix of the followed node, if the traversal met it.
    pub fn followed_matrix(&self) -> Option<Mat4> {
        self.followed
    }

    /// Makes `light` the active light. A later light replaces an earlier one.
    pub fn set_light(&mut self, light: LightState) {
        if self.light.is_some() {
            log::debug!("more than one light in scene; the last one visited is active");
        }
        self.light = Some(light);
    }

    pub fn light(&self) -> Option<&LightState> {
        self.light.as_ref()
    }

    /// View matrix, once the camera has computed it.
    pub fn view(&self) -> Option<Mat4> {
        self.view
    }

    /// Number of nodes whose matrices were computed this frame.
    pub fn prepared(&self) -> usize {
        self.prepared
    }

    /// Fixes the view matrix and derives the camera-space light origin from it.
    pub(crate) fn finish(&mut self, view: Mat4) {
        self.view = Some(view);
        if let Some(light) = &mut self.light {
            light.camera_origin = view.transform_point3(light.world_origin);
        }
    }

    pub(crate) fn take_light(&mut self) -> Option<LightState> {
        self.light.take()
    }
}

/// Position part of a world matrix.
pub(crate) fn translation_of(m: &Mat4) -> Vec3 {
    m.w_axis.truncate()
}
