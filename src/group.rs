//! Composite nodes.
//!
//! A [`Group`] has no geometry of its own. It gives its children a shared frame of reference
//! and fixes their order: RenderPrep visits the group before its children, so each child
//! composes its local matrix onto the group's world matrix, and Render walks the children in
//! list order.
//!
//! ```
//! use pegasus3d::{Group, Placement, Vec3, geometry};
//!
//! let mut arm = Group::with_placement(Placement::new().origin(Vec3::new(0.0, 2.0, 0.0)));
//! let hand = arm.add(geometry::cube(0.5).at(Placement::new().origin(Vec3::X)));
//! assert_eq!(hand, 0);
//! assert_eq!(arm.len(), 1);
//! ```

use glam::Mat4;

use crate::node::{FrameState, SceneNode};
use crate::placement::Placement;
use crate::render::RenderContext;

/// An ordered list of child nodes sharing one frame of reference.
///
/// Children are prepared and rendered strictly in list order. There is no sorting or
/// batching, so later siblings draw over earlier ones where depth allows.
#[derive(Default)]
pub struct Group {
    pub placement: Placement,
    children: Vec<Box<dyn SceneNode>>,
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_placement(placement: Placement) -> Self {
        Self {
            placement,
            children: Vec::new(),
        }
    }

    /// Appends `child`, returning its index in the child list.
    pub fn add(&mut self, child: impl SceneNode + 'static) -> usize {
        self.children.push(Box::new(child));
        self.children.len() - 1
    }

    /// Builder form of [`add`](Self::add).
    pub fn with(mut self, child: impl SceneNode + 'static) -> Self {
        self.add(child);
        self
    }

    pub fn children(&self) -> &[Box<dyn SceneNode>] {
        &self.children
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut (dyn SceneNode + 'static)> {
        self.children.get_mut(index).map(|c| c.as_mut())
    }

    pub fn remove(&mut self, index: usize) -> Option<Box<dyn SceneNode>> {
        (index < self.children.len()).then(|| self.children.remove(index))
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl SceneNode for Group {
    fn placement(&self) -> &Placement {
        &self.placement
    }

    fn placement_mut(&mut self) -> &mut Placement {
        &mut self.placement
    }

    fn render_prep(&mut self, frame: &mut FrameState, parent: Option<&Mat4>) {
        if !self.placement.begin_prep(frame) {
            return;
        }
        let world = frame.record(&mut self.placement, parent);
        for child in &mut self.children {
            child.render_prep(frame, Some(&world));
        }
    }

    fn render(&self, ctx: &mut RenderContext<'_>) {
        for child in &self.children {
            if child.placement().included() {
                child.render(ctx);
            }
        }
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("placement", &self.placement)
            .field("children", &self.children.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::render::RenderResources;
    use glam::Vec3;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::rc::Rc;

    /// Logs both passes into a shared journal.
    struct Probe {
        placement: Placement,
        name: &'static str,
        journal: Rc<RefCell<Vec<String>>>,
    }

    impl Probe {
        fn new(name: &'static str, journal: &Rc<RefCell<Vec<String>>>, origin: Vec3) -> Self {
            Self {
                placement: Placement::new().origin(origin),
                name,
                journal: Rc::clone(journal),
            }
        }
    }

    impl SceneNode for Probe {
        fn placement(&self) -> &Placement {
            &self.placement
        }

        fn placement_mut(&mut self) -> &mut Placement {
            &mut self.placement
        }

        fn render_prep(&mut self, frame: &mut FrameState, parent: Option<&Mat4>) {
            if self.placement.begin_prep(frame) {
                frame.record(&mut self.placement, parent);
                self.journal.borrow_mut().push(format!("prep {}", self.name));
            }
        }

        fn render(&self, _ctx: &mut RenderContext<'_>) {
            self.journal.borrow_mut().push(format!("render {}", self.name));
        }
    }

    fn run_frame(group: &mut Group) {
        let mut frame = FrameState::new();
        group.render_prep(&mut frame, None);
        let mut backend = RecordingBackend::new();
        let mut resources = RenderResources::new();
        let properties = HashMap::new();
        let mut ctx = RenderContext::new(&mut backend, &mut resources, &properties);
        group.render(&mut ctx);
    }

    #[test]
    fn children_render_in_list_order() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut group = Group::new()
            .with(Probe::new("A", &journal, Vec3::new(0.0, 0.0, -50.0)))
            .with(Probe::new("B", &journal, Vec3::new(0.0, 0.0, 10.0)))
            .with(Probe::new("C", &journal, Vec3::new(0.0, 0.0, -1.0)));
        run_frame(&mut group);

        assert_eq!(
            *journal.borrow(),
            vec!["prep A", "prep B", "prep C", "render A", "render B", "render C"]
        );
    }

    #[test]
    fn hidden_group_skips_subtree() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let inner = Group::with_placement(Placement::new().visible(false))
            .with(Probe::new("hidden", &journal, Vec3::ZERO));
        let mut root = Group::new()
            .with(inner)
            .with(Probe::new("shown", &journal, Vec3::ZERO));
        run_frame(&mut root);

        assert_eq!(*journal.borrow(), vec!["prep shown", "render shown"]);
    }

    #[test]
    fn children_inherit_group_matrix() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let mut group = Group::with_placement(Placement::new().origin(Vec3::new(0.0, 4.0, 0.0)))
            .with(Probe::new("A", &journal, Vec3::new(1.0, 0.0, 0.0)));
        let mut frame = FrameState::new();
        group.render_prep(&mut frame, None);

        let child = &group.children()[0];
        assert_eq!(
            child.placement().world_matrix().w_axis.truncate(),
            Vec3::new(1.0, 4.0, 0.0)
        );
        assert_eq!(frame.prepared(), 2);
    }

    #[test]
    fn predicate_visibility_is_evaluated_each_frame() {
        let journal = Rc::new(RefCell::new(Vec::new()));
        let gate = Rc::new(RefCell::new(false));
        let mut probe = Probe::new("gated", &journal, Vec3::ZERO);
        let seen = Rc::clone(&gate);
        probe.placement.visible = crate::Visibility::When(Box::new(move |_| *seen.borrow()));
        let mut group = Group::new().with(probe);

        run_frame(&mut group);
        assert!(journal.borrow().is_empty());

        *gate.borrow_mut() = true;
        run_frame(&mut group);
        assert_eq!(*journal.borrow(), vec!["prep gated", "render gated"]);
    }
}
