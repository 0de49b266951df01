#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod app;
pub mod assets;
pub mod errors;
pub mod math;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod utils;

pub use app::{App, AppHandler, Input};
pub use assets::{Loader, Resource, ResourceTable};
pub use errors::{ArborError, Result};
pub use renderer::headless::HeadlessDevice;
pub use renderer::settings::RenderSettings;
pub use renderer::wgpu_backend::WgpuDevice;
pub use renderer::{GpuDevice, Viewport};
pub use resources::primitives::*;
pub use resources::{FrameBuffer, Shader, ShaderLibrary, Texture, UniformSet, UniformValue};
pub use scene::{
    Camera, CameraFixTransform, CameraRig, Graph, Group, Material, Mirror, Node, PostProcess,
    RenderTarget, SimpleMesh, Skybox, StereoTarget, Transform, Uniforms,
};
pub use utils::fly_control::FlyController;
pub use utils::time::Clock;
