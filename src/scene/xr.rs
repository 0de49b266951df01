//! Stereo frame data.
//!
//! An XR platform hands the renderer one [`XrFrame`] per display refresh.
//! Each [`EyeView`] carries the eye's pose, its projection and the part of
//! the output it covers. [`SideBySideSession`] produces the same data for a
//! flat window, split into left and right halves.

use glam::{Mat4, Vec3};

use crate::math::perspective;
use crate::renderer::{FramebufferKey, Viewport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
    Mono,
}

/// One eye's camera for the current frame.
#[derive(Debug, Clone, PartialEq)]
pub struct EyeView {
    pub eye: Eye,
    /// Projection to use verbatim.
    pub projection: Mat4,
    /// Eye pose in the tracking space (eye-to-world).
    pub transform: Mat4,
    /// Sub-rectangle of the output this eye renders into.
    pub viewport: Viewport,
}

impl EyeView {
    /// Eye position in the tracking space.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.transform.w_axis.truncate()
    }
}

/// Viewer pose for one display refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XrFrame {
    pub views: Vec<EyeView>,
}

/// Output surface provided by the XR session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct XrLayer {
    /// `None` renders into the default framebuffer.
    pub framebuffer: Option<FramebufferKey>,
}

/// Source of stereo frames.
pub trait XrSession {
    fn layer(&self) -> XrLayer;

    /// Depth range the platform should build its projections with.
    fn set_depth_range(&mut self, near: f32, far: f32);

    /// Pose for the next frame, `None` once the session has ended.
    fn request_frame(&mut self, elapsed: f32) -> Option<XrFrame>;

    fn end(&mut self);

    fn is_active(&self) -> bool;
}

/// Stereo pair rendered side by side into one window.
#[derive(Debug, Clone)]
pub struct SideBySideSession {
    size: (u32, u32),
    /// Distance between the eyes in tracking units.
    pub eye_separation: f32,
    /// Vertical field of view in degrees.
    pub fov: f32,
    /// Head pose applied to both eyes.
    pub head: Mat4,
    near: f32,
    far: f32,
    active: bool,
}

impl SideBySideSession {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            eye_separation: 0.064,
            fov: 50.0,
            head: Mat4::IDENTITY,
            near: 0.5,
            far: 5000.0,
            active: true,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn eye_view(&self, eye: Eye, offset: f32, viewport: Viewport) -> EyeView {
        EyeView {
            eye,
            projection: perspective(self.fov, viewport.aspect(), self.near, self.far),
            transform: self.head * Mat4::from_translation(Vec3::new(offset, 0.0, 0.0)),
            viewport,
        }
    }
}

impl XrSession for SideBySideSession {
    fn layer(&self) -> XrLayer {
        XrLayer::default()
    }

    fn set_depth_range(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
    }

    fn request_frame(&mut self, _elapsed: f32) -> Option<XrFrame> {
        if !self.active {
            return None;
        }
        let (width, height) = self.size;
        let half = width / 2;
        let offset = self.eye_separation * 0.5;
        Some(XrFrame {
            views: vec![
                self.eye_view(Eye::Left, -offset, Viewport::new(0, 0, half, height)),
                self.eye_view(Eye::Right, offset, Viewport::new(half as i32, 0, half, height)),
            ],
        })
    }

    fn end(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }
}
