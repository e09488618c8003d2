use glam::{Mat4, Vec3};

use crate::node::{FrameState, SceneNode, translation_of};
use crate::placement::Placement;
use crate::render::RenderContext;
use crate::value::Color;

/// Lighting inputs visible to shaders during one frame.
///
/// Resolvable as the uniforms `ambient`, `lightColor` and `lightOrigin`. The origin is in
/// camera (eye) space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightState {
    pub ambient: Option<Color>,
    pub color: Option<Color>,
    pub world_origin: Vec3,
    pub camera_origin: Vec3,
}

/// A light source. Has a position in the scene but no geometry.
#[derive(Debug, Default)]
pub struct Light {
    pub placement: Placement,
    pub ambient: Option<Color>,
    pub color: Option<Color>,
}

impl Light {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, origin: Vec3) -> Self {
        self.placement.origin = Some(origin);
        self
    }

    pub fn with_ambient(mut self, ambient: Color) -> Self {
        self.ambient = Some(ambient);
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }
}

impl SceneNode for Light {
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
        let world_origin = translation_of(&world);
        frame.set_light(LightState {
            ambient: self.ambient,
            color: self.color,
            world_origin,
            // Replaced once the view matrix is known.
            camera_origin: world_origin,
        });
    }

    fn render(&self, _ctx: &mut RenderContext<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_origin_moves_into_camera_space() {
        let mut light = Light::new()
            .at(Vec3::new(1.0, 2.0, 3.0))
            .with_ambient(Color::gray(0.2))
            .with_color(Color::WHITE);
        let parent = Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let mut frame = FrameState::new();
        light.render_prep(&mut frame, Some(&parent));

        let view = Mat4::from_translation(Vec3::new(0.0, 0.0, -5.0));
        frame.finish(view);
        let state = frame.light().copied();
        assert_eq!(
            state.map(|s| s.camera_origin),
            Some(Vec3::new(11.0, 2.0, -2.0))
        );
        assert_eq!(state.and_then(|s| s.ambient), Some(Color::gray(0.2)));
    }

    #[test]
    fn hidden_light_contributes_nothing() {
        let mut light = Light::new().with_color(Color::WHITE);
        light.placement.visible = false.into();
        let mut frame = FrameState::new();
        light.render_prep(&mut frame, None);
        assert!(frame.light().is_none());
    }

    #[test]
    fn last_light_wins() {
        let mut first = Light::new().with_color(Color::rgb(1.0, 0.0, 0.0));
        let mut second = Light::new().with_color(Color::rgb(0.0, 0.0, 1.0));
        let mut frame = FrameState::new();
        first.render_prep(&mut frame, None);
        second.render_prep(&mut frame, None);
        assert_eq!(
            frame.light().and_then(|s| s.color),
            Some(Color::rgb(0.0, 0.0, 1.0))
        );
    }
}
