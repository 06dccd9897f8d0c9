/// Scene lights. Positions and directions are in world space; the
/// pipelines snapshot them into view space once per frame.
use glam::Vec3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum LightKind {
    Ambient,
    /// Direction the light travels *from*, i.e. towards the light source.
    Directional { direction: Vec3 },
    Point {
        position: Vec3,
        radius: f32,
        /// Distance scale of the inverse-square term.
        falloff_scale: f32,
    },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub intensity: Vec3,
    pub active: bool,
}

impl Light {
    pub fn ambient(intensity: Vec3) -> Self {
        Self {
            kind: LightKind::Ambient,
            intensity,
            active: true,
        }
    }

    pub fn directional(intensity: Vec3, direction: Vec3) -> Self {
        Self {
            kind: LightKind::Directional { direction },
            intensity,
            active: true,
        }
    }

    pub fn point(intensity: Vec3, position: Vec3, radius: f32) -> Self {
        Self {
            kind: LightKind::Point {
                position,
                radius,
                falloff_scale: 1.0,
            },
            intensity,
            active: true,
        }
    }

    pub fn with_falloff_scale(mut self, scale: f32) -> Self {
        if let LightKind::Point { falloff_scale, .. } = &mut self.kind {
            *falloff_scale = scale;
        }
        self
    }
}
