//! Spatial state shared by every scene node.
//!
//! A [`Placement`] stores a node's local translation, rotation and scale, each optional, and
//! caches the world matrix computed for the current frame. Groups, shapes, lights and cameras
//! all embed one.
//!
//! # Transformation Order
//!
//! The local matrix is built **Scale → Rotate → Translate**, and the world matrix is
//! `parent_world × local`:
//!
//! ```
//! use pegasus3d::{Mat4, Placement, Vec3};
//!
//! let parent = Mat4::from_translation(Vec3::new(0.0, 5.0, 0.0));
//! let mut child = Placement::new().origin(Vec3::new(1.0, 0.0, 0.0));
//! let world = child.calc_matrix(Some(&parent));
//! assert_eq!(world.w_axis.truncate(), Vec3::new(1.0, 5.0, 0.0));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Quat, Vec3};

use crate::math;
use crate::node::FrameState;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a node, used to refer to it without holding a reference (e.g. a camera
/// following a shape somewhere in the scene).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether a node takes part in a frame.
///
/// A hidden node is skipped by both traversal passes, and so is everything below it.
#[derive(Default)]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    /// Decided each frame, before the node's matrix is computed.
    When(Box<dyn Fn(&FrameState) -> bool>),
}

impl Visibility {
    pub fn evaluate(&self, frame: &FrameState) -> bool {
        match self {
            Visibility::Visible => true,
            Visibility::Hidden => false,
            Visibility::When(predicate) => predicate(frame),
        }
    }
}

impl fmt::Debug for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Visible => f.write_str("Visible"),
            Visibility::Hidden => f.write_str("Hidden"),
            Visibility::When(_) => f.write_str("When(..)"),
        }
    }
}

impl From<bool> for Visibility {
    fn from(visible: bool) -> Self {
        if visible {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }
}

/// Local transform plus the per-frame cached world matrix.
#[derive(Debug)]
pub struct Placement {
    id: NodeId,
    /// Local translation; `None` means no translation.
    pub origin: Option<Vec3>,
    /// Local rotation; `None` means no rotation.
    pub orientation: Option<Quat>,
    /// Local scale; `None` means unit scale.
    pub scale: Option<Vec3>,
    /// Checked at the start of each RenderPrep pass.
    pub visible: Visibility,
    world: Mat4,
    included: bool,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            id: NodeId::next(),
            origin: None,
            orientation: None,
            scale: None,
            visible: Visibility::Visible,
            world: Mat4::IDENTITY,
            included: false,
        }
    }
}

impl Placement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(mut self, origin: Vec3) -> Self {
        self.origin = Some(origin);
        self
    }

    pub fn orientation(mut self, orientation: Quat) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Some(Vec3::splat(scale));
        self
    }

    pub fn visible(mut self, visible: impl Into<Visibility>) -> Self {
        self.visible = visible.into();
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The world matrix computed by the most recent [`calc_matrix`](Self::calc_matrix).
    pub fn world_matrix(&self) -> Mat4 {
        self.world
    }

    /// Local matrix built from origin, orientation and scale.
    pub fn local_matrix(&self) -> Mat4 {
        math::compose(self.origin, self.orientation, self.scale)
    }

    /// Computes and caches this node's world matrix.
    ///
    /// Must run once per frame, after the parent's own `calc_matrix`. The parent matrix is
    /// only read.
    pub fn calc_matrix(&mut self, parent: Option<&Mat4>) -> Mat4 {
        let local = self.local_matrix();
        self.world = match parent {
            Some(parent) => math::multiply(*parent, local),
            None => local,
        };
        self.world
    }

    /// Turns the node so that its local -Z axis points at `target`.
    ///
    /// A target straight behind the node (along +Z) gets a half turn about Y.
    pub fn orient_to(&mut self, target: Vec3) {
        let origin = self.origin.unwrap_or(Vec3::ZERO);
        let dir = (target - origin).normalize_or(Vec3::X);
        let w = 1.0 - dir.z;
        let q = if w < 1e-6 {
            Quat::from_xyzw(0.0, 1.0, 0.0, 0.0)
        } else {
            let inv_norm = 1.0 / (w * w + dir.y * dir.y + dir.x * dir.x).sqrt();
            Quat::from_xyzw(dir.y * inv_norm, -dir.x * inv_norm, 0.0, w * inv_norm)
        };
        self.orientation = Some(q);
    }

    /// Runs the visibility check for this frame and records the outcome for the Render pass.
    pub fn begin_prep(&mut self, frame: &FrameState) -> bool {
        self.included = self.visible.evaluate(frame);
        self.included
    }

    /// Whether the last RenderPrep pass included this node.
    pub fn included(&self) -> bool {
        self.included
    }
}
