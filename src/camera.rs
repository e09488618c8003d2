//! The camera and the per-frame render procedure.
//!
//! [`Camera::render`] is the one call a host loop makes per tick. It walks the scene in two
//! passes (see [`crate::node`]) between a cleared target and a present:
//!
//! ```text
//! Idle -> Prepared -> ProjectionComputed -> ViewComputed -> Rendered -> Idle
//! ```

use std::collections::HashMap;
use std::rc::Rc;

use glam::{Mat4, Vec3};

use crate::backend::{BackendError, FrameSetup, GpuBackend, Viewport};
use crate::config::CameraConfig;
use crate::group::Group;
use crate::math;
use crate::node::{FrameState, SceneNode};
use crate::placement::{NodeId, Placement};
use crate::render::{FrameStats, RenderContext, RenderResources};
use crate::shader::ShaderDef;
use crate::value::{Color, Value};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    #[default]
    Perspective,
    Orthogonal,
}

/// Renders from a moving frame of reference: the camera's placement is read relative to
/// `target`'s world matrix offset by `eye_offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Follow {
    pub target: NodeId,
    pub eye_offset: Vec3,
}

impl Follow {
    pub fn new(target: NodeId) -> Self {
        Self {
            target,
            eye_offset: Vec3::ZERO,
        }
    }

    pub fn with_eye_offset(mut self, offset: Vec3) -> Self {
        self.eye_offset = offset;
        self
    }
}

/// Where the camera is within [`Camera::render`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraState {
    #[default]
    Idle,
    Prepared,
    ProjectionComputed,
    ViewComputed,
    Rendered,
}

/// What a camera renders. An empty world renders nothing.
#[derive(Debug, Default)]
pub struct World {
    pub scene: Option<Group>,
}

impl World {
    pub fn new(scene: Group) -> Self {
        Self { scene: Some(scene) }
    }
}

/// Outcome of one [`Camera::render`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// False when there was no scene and nothing reached the backend.
    pub rendered: bool,
    pub stats: FrameStats,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("clip range must satisfy 0 < near < far, got near {near} far {far}")]
    InvalidClipRange { near: f32, far: f32 },
    #[error("camera world matrix is not invertible")]
    SingularView,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Debug)]
pub struct Camera {
    pub placement: Placement,
    pub projection: Projection,
    /// Vertical field of view in degrees, for [`Projection::Perspective`].
    pub fov: f32,
    /// Height of the view volume, for [`Projection::Orthogonal`].
    pub view_height: f32,
    pub near: f32,
    pub far: f32,
    /// Target rectangle; also the source of the aspect ratio.
    pub viewport: Option<Viewport>,
    pub follow: Option<Follow>,
    pub background: Color,
    /// Used by shapes without a shader of their own.
    pub shader: Option<Rc<ShaderDef>>,
    /// Uniform values shared by every shape this camera draws.
    pub properties: HashMap<String, Value>,
    state: CameraState,
    view_matrix: Mat4,
    projection_matrix: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            placement: Placement::new().origin(Vec3::new(0.0, 0.0, 5.0)),
            projection: Projection::Perspective,
            fov: 50.0,
            view_height: 10.0,
            near: 0.1,
            far: 1000.0,
            viewport: None,
            follow: None,
            background: Color::BLACK,
            shader: None,
            properties: HashMap::new(),
            state: CameraState::Idle,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &CameraConfig) -> Self {
        Self {
            placement: Placement::new().origin(Vec3::from_array(config.origin)),
            projection: config.projection,
            fov: config.fov,
            view_height: config.view_height,
            near: config.near,
            far: config.far,
            viewport: config
                .viewport
                .map(|[x, y, width, height]| Viewport::new(x, y, width, height)),
            ..Self::default()
        }
    }

    pub fn at(mut self, origin: Vec3) -> Self {
        self.placement.origin = Some(origin);
        self
    }

    pub fn perspective(mut self, fov_degrees: f32) -> Self {
        self.projection = Projection::Perspective;
        self.fov = fov_degrees;
        self
    }

    pub fn orthogonal(mut self, view_height: f32) -> Self {
        self.projection = Projection::Orthogonal;
        self.view_height = view_height;
        self
    }

    pub fn clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }

    pub fn following(mut self, follow: Follow) -> Self {
        self.follow = Some(follow);
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background = color;
        self
    }

    pub fn with_shader(mut self, shader: Rc<ShaderDef>) -> Self {
        self.shader = Some(shader);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Turns the camera to face `target`, keeping its origin.
    pub fn look_at(&mut self, target: Vec3) {
        self.placement.orient_to(target);
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    /// View matrix of the last rendered frame.
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    /// Projection matrix of the last rendered frame.
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    /// Viewport aspect ratio, or 1 when there is no usable viewport.
    pub fn aspect(&self) -> f32 {
        self.viewport.and_then(|v| v.aspect()).unwrap_or(1.0)
    }

    /// Projection for the current settings.
    pub fn compute_projection(&self) -> Result<Mat4, RenderError> {
        if !(self.near > 0.0 && self.near < self.far) {
            return Err(RenderError::InvalidClipRange {
                near: self.near,
                far: self.far,
            });
        }
        let aspect = self.aspect();
        Ok(match self.projection {
            Projection::Perspective => math::perspective(self.fov, self.near, self.far, aspect),
            Projection::Orthogonal => {
                math::orthogonal(self.view_height, self.near, self.far, aspect)
            }
        })
    }

    /// View matrix given the followed node's world matrix, if any.
    ///
    /// Without a followed matrix this is the inverse of the camera's own composed placement.
    pub fn compute_view(&mut self, followed: Option<Mat4>) -> Result<Mat4, RenderError> {
        let local = self.placement.calc_matrix(None);
        let camera_world = match (self.follow, followed) {
            (Some(follow), Some(target)) => {
                target * Mat4::from_translation(follow.eye_offset) * local
            }
            _ => local,
        };
        math::try_affine_inverse(&camera_world).ok_or(RenderError::SingularView)
    }

    /// Renders one frame of `world`.
    ///
    /// A world without a scene is a no-op. On error nothing has been drawn.
    pub fn render(
        &mut self,
        world: &mut World,
        backend: &mut dyn GpuBackend,
        resources: &mut RenderResources,
    ) -> Result<FrameReport, RenderError> {
        let Some(scene) = world.scene.as_mut() else {
            return Ok(FrameReport::default());
        };
        let result = self.render_scene(scene, backend, resources);
        self.transition(CameraState::Idle);
        result
    }

    fn render_scene(
        &mut self,
        scene: &mut Group,
        backend: &mut dyn GpuBackend,
        resources: &mut RenderResources,
    ) -> Result<FrameReport, RenderError> {
        resources.collect(backend);

        let mut frame = match self.follow {
            Some(follow) => FrameState::following(follow.target),
            None => FrameState::new(),
        };
        scene.render_prep(&mut frame, None);
        self.transition(CameraState::Prepared);

        let projection = self.compute_projection()?;
        self.transition(CameraState::ProjectionComputed);

        let followed = frame.followed_matrix();
        if let (Some(follow), None) = (self.follow, followed) {
            log::warn!(
                "follow target {:?} not found in scene; using the camera's own placement",
                follow.target
            );
        }
        let view = self.compute_view(followed)?;
        frame.finish(view);
        self.projection_matrix = projection;
        self.view_matrix = view;
        self.transition(CameraState::ViewComputed);

        backend.begin_frame(&FrameSetup {
            viewport: self.viewport,
            clear: self.background,
        })?;
        let mut ctx = RenderContext::new(backend, resources, &self.properties)
            .with_matrices(view, projection)
            .with_default_shader(self.shader.clone())
            .with_light(frame.take_light());
        if scene.placement.included() {
            scene.render(&mut ctx);
        }
        let stats = ctx.stats;
        self.transition(CameraState::Rendered);

        backend.present()?;
        Ok(FrameReport {
            rendered: true,
            stats,
        })
    }

    fn transition(&mut self, next: CameraState) {
        log::trace!("camera {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GpuCommand, RecordingBackend, UniformValue};
    use crate::light::Light;
    use crate::mesh::AttributeBuffer;
    use crate::shape::{POSITIONS, Shape};
    use approx::assert_abs_diff_eq;
    use glam::Quat;

    fn assert_mat_eq(a: Mat4, b: Mat4) {
        for (x, y) in a.to_cols_array().iter().zip(b.to_cols_array().iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-5);
        }
    }

    fn triangle() -> Shape {
        Shape::new().with_attribute(
            POSITIONS,
            AttributeBuffer::f32(3, vec![0.0, 1.0, 0.0, -1.0, -1.0, 0.0, 1.0, -1.0, 0.0]),
        )
    }

    fn flat_shader() -> Rc<ShaderDef> {
        Rc::new(
            ShaderDef::new("v", "f")
                .attributes([POSITIONS])
                .uniforms(["mvpmatrix", "tint"]),
        )
    }

    #[test]
    fn view_inverts_local_placement() {
        let mut camera = Camera::new().at(Vec3::new(1.0, 2.0, 3.0));
        camera.placement.orientation = Some(Quat::from_rotation_y(0.3));
        let view = camera.compute_view(None).unwrap();
        let local = math::compose(
            camera.placement.origin,
            camera.placement.orientation,
            camera.placement.scale,
        );
        assert_mat_eq(view, local.inverse());
    }

    #[test]
    fn look_at_puts_target_on_view_axis() {
        let mut camera = Camera::new().at(Vec3::new(2.0, 1.0, 2.0));
        camera.look_at(Vec3::ZERO);
        let eye = camera.compute_view(None).unwrap().transform_point3(Vec3::ZERO);
        assert_abs_diff_eq!(eye.x, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(eye.y, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(eye.z, -3.0, epsilon = 1e-5);
    }

    #[test]
    fn view_tracks_followed_node() {
        let target = Group::with_placement(Placement::new().origin(Vec3::new(10.0, 0.0, 0.0)));
        let id = target.placement.id();
        let mut world = World::new(Group::new().with(target));
        let mut camera = Camera::new().following(Follow::new(id).with_eye_offset(Vec3::Y));
        let mut backend = RecordingBackend::new();
        let mut resources = RenderResources::new();

        camera.render(&mut world, &mut backend, &mut resources).unwrap();
        let first = camera.view_matrix();
        // Camera sits at target + eye offset + its own origin.
        assert_abs_diff_eq!(
            first.transform_point3(Vec3::new(10.0, 1.0, 5.0)).length(),
            0.0,
            epsilon = 1e-5
        );

        if let Some(scene) = world.scene.as_mut() {
            if let Some(node) = scene.child_mut(0) {
                node.placement_mut().origin = Some(Vec3::new(-4.0, 0.0, 0.0));
            }
        }
        camera.render(&mut world, &mut backend, &mut resources).unwrap();
        assert_ne!(first, camera.view_matrix());
        assert_abs_diff_eq!(
            camera
                .view_matrix()
                .transform_point3(Vec3::new(-4.0, 1.0, 5.0))
                .length(),
            0.0,
            epsilon = 1e-5
        );
    }

    #[test]
    fn missing_follow_target_falls_back() {
        let stray = Group::new();
        let mut world = World::new(Group::new());
        let mut camera = Camera::new().following(Follow::new(stray.placement.id()));
        let mut backend = RecordingBackend::new();
        let mut resources = RenderResources::new();

        camera.render(&mut world, &mut backend, &mut resources).unwrap();
        assert_mat_eq(
            camera.view_matrix(),
            Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0)),
        );
    }

    #[test]
    fn missing_scene_is_a_no_op() {
        let mut camera = Camera::new();
        let mut backend = RecordingBackend::new();
        let mut resources = RenderResources::new();
        let report = camera
            .render(&mut World::default(), &mut backend, &mut resources)
            .unwrap();
        assert!(!report.rendered);
        assert!(backend.commands.is_empty());
        assert_eq!(camera.state(), CameraState::Idle);
    }

    #[test]
    fn missing_or_degenerate_viewport_gives_unit_aspect() {
        let camera = Camera::new();
        assert_eq!(camera.aspect(), 1.0);
        let camera = Camera::new().with_viewport(Viewport::new(0, 0, 640, 0));
        assert_eq!(camera.aspect(), 1.0);
        let camera = Camera::new().with_viewport(Viewport::new(0, 0, 800, 400));
        assert_eq!(camera.aspect(), 2.0);
    }

    #[test]
    fn projection_follows_kind() {
        let camera = Camera::new().with_viewport(Viewport::new(0, 0, 800, 600));
        assert_mat_eq(
            camera.compute_projection().unwrap(),
            math::perspective(50.0, 0.1, 1000.0, 800.0 / 600.0),
        );
        let camera = Camera::new().orthogonal(4.0).clip(1.0, 10.0);
        assert_mat_eq(
            camera.compute_projection().unwrap(),
            math::orthogonal(4.0, 1.0, 10.0, 1.0),
        );
    }

    #[test]
    fn frame_is_cleared_drawn_and_presented_in_order() {
        let scene = Group::new()
            .with(triangle().with_property("tint", Color::gray(0.5)))
            .with(triangle().with_property("tint", Color::WHITE));
        let mut world = World::new(scene);
        let mut camera = Camera::new()
            .with_shader(flat_shader())
            .with_background(Color::rgb(0.1, 0.2, 0.3));
        let mut backend = RecordingBackend::new();
        let mut resources = RenderResources::new();

        let report = camera.render(&mut world, &mut backend, &mut resources).unwrap();
        assert!(report.rendered);
        assert_eq!(report.stats.draws, 2);

        match backend.commands.first() {
            Some(GpuCommand::BeginFrame(setup)) => {
                assert_eq!(setup.clear, Color::rgb(0.1, 0.2, 0.3))
            }
            other => panic!("expected BeginFrame first, got {other:?}"),
        }
        assert!(matches!(backend.commands.last(), Some(GpuCommand::Present)));
        assert_eq!(backend.draws().len(), 2);
        // Shared program compiled once.
        assert_eq!(
            backend.count(|c| matches!(c, GpuCommand::CompileProgram { .. })),
            1
        );
        assert_eq!(
            backend.last_uniform("tint"),
            Some(UniformValue::Vec4(Color::WHITE.to_vec4()))
        );
        assert_eq!(
            backend.last_uniform("mvpmatrix"),
            Some(UniformValue::Mat4(
                camera.projection_matrix() * camera.view_matrix()
            ))
        );
        assert_eq!(camera.state(), CameraState::Idle);
    }

    #[test]
    fn hidden_root_renders_nothing_but_still_clears() {
        let scene = Group::with_placement(Placement::new().visible(false)).with(triangle());
        let mut world = World::new(scene);
        let mut camera = Camera::new().with_shader(flat_shader());
        let mut backend = RecordingBackend::new();
        let mut resources = RenderResources::new();

        let report = camera.render(&mut world, &mut backend, &mut resources).unwrap();
        assert_eq!(report.stats.draws, 0);
        assert!(backend.draws().is_empty());
        assert_eq!(backend.count(|c| matches!(c, GpuCommand::Present)), 1);
    }

    #[test]
    fn light_origin_reaches_shaders_in_camera_space() {
        let shader = Rc::new(
            ShaderDef::new("v", "f")
                .attributes([POSITIONS])
                .uniforms(["lightOrigin"]),
        );
        let scene = Group::new()
            .with(Light::new().at(Vec3::new(0.0, 3.0, 0.0)))
            .with(triangle().with_shader(shader));
        let mut world = World::new(scene);
        let mut camera = Camera::new();
        let mut backend = RecordingBackend::new();
        let mut resources = RenderResources::new();

        camera.render(&mut world, &mut backend, &mut resources).unwrap();
        assert_eq!(
            backend.last_uniform("lightOrigin"),
            Some(UniformValue::Vec3(Vec3::new(0.0, 3.0, -5.0)))
        );
    }

    #[test]
    fn invalid_clip_range_is_rejected_before_drawing() {
        let mut world = World::new(Group::new().with(triangle()));
        let mut camera = Camera::new().with_shader(flat_shader()).clip(5.0, 1.0);
        let mut backend = RecordingBackend::new();
        let mut resources = RenderResources::new();

        let err = camera
            .render(&mut world, &mut backend, &mut resources)
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidClipRange { .. }));
        assert!(backend.commands.is_empty());
        assert_eq!(camera.state(), CameraState::Idle);
    }

    #[test]
    fn zero_scale_camera_is_singular() {
        let mut camera = Camera::new();
        camera.placement.scale = Some(Vec3::ZERO);
        assert!(matches!(
            camera.compute_view(None),
            Err(RenderError::SingularView)
        ));
    }

    #[test]
    fn config_builds_matching_camera() {
        let config = CameraConfig {
            projection: Projection::Orthogonal,
            view_height: 6.0,
            origin: [1.0, 2.0, 3.0],
            viewport: Some([0, 0, 300, 150]),
            ..CameraConfig::default()
        };
        let camera = Camera::from_config(&config);
        assert_eq!(camera.projection, Projection::Orthogonal);
        assert_eq!(camera.view_height, 6.0);
        assert_eq!(camera.placement.origin, Some(Vec3::new(1.0, 2.0, 3.0)));
        assert_eq!(camera.aspect(), 2.0);
    }
}
