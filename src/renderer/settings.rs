//! Renderer Settings
//!
//! Configuration consumed by the wgpu backend when it is created.
//!
//! ```rust,ignore
//! use arbor::renderer::RenderSettings;
//!
//! let settings = RenderSettings {
//!     vsync: false,
//!     ..Default::default()
//! };
//! ```

/// Configuration for the wgpu device and its default framebuffer.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// GPU power preference (high performance vs low power).
    pub power_preference: wgpu::PowerPreference,
    /// Enable vertical sync to cap frame rate to display refresh rate.
    pub vsync: bool,
    /// Colour the default framebuffer is cleared to every frame.
    pub clear_color: glam::Vec4,
    /// Colour format of offscreen framebuffers created without an explicit one.
    pub framebuffer_format: super::ColorFormat,
    /// Depth attachment format shared by the surface and every offscreen target.
    pub depth_format: wgpu::TextureFormat,
    /// Upper bound on simultaneously bound texture units.
    pub max_texture_units: u32,
    /// Required wgpu features.
    pub required_features: wgpu::Features,
    /// Required wgpu limits.
    pub required_limits: wgpu::Limits,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            power_preference: wgpu::PowerPreference::HighPerformance,
            vsync: true,
            clear_color: glam::Vec4::new(0.0, 0.0, 0.0, 1.0),
            framebuffer_format: super::ColorFormat::Rgba8,
            depth_format: wgpu::TextureFormat::Depth24Plus,
            max_texture_units: 16,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        }
    }
}

impl RenderSettings {
    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    #[must_use]
    pub fn with_clear_color(mut self, color: glam::Vec4) -> Self {
        self.clear_color = color;
        self
    }

    #[must_use]
    pub fn with_power_preference(mut self, preference: wgpu::PowerPreference) -> Self {
        self.power_preference = preference;
        self
    }
}
