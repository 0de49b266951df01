//! Scene graph.
//!
//! A scene is a tree of [`Node`]s. Drawing a frame is one walk over it: each
//! node pushes GPU state on enter, its children draw under that state, and
//! it pops the state on exit. Every effect is built by nesting:
//!
//! - [`Transform`] composes model matrices
//! - [`Camera`] publishes `projection` and `eye`
//! - [`Uniforms`] and [`Material`] scope values, textures and shaders
//! - [`RenderTarget`] redirects a subtree into a [`FrameBuffer`](crate::resources::FrameBuffer)
//! - [`Mirror`] reflects a subtree and flips culling
//! - [`PostProcess`] and [`Skybox`] wrap a fixed mesh in a material
//! - [`StereoTarget`] sends the tree to an XR layer
//!
//! ```rust,ignore
//! let mut graph = Graph::new(Box::new(device));
//! graph.root_mut().append(Camera::new(nodes![
//!     Material::new(shader, UniformSet::new(), nodes![
//!         Transform::new(nodes![SimpleMesh::from_positions(graph.device(), &grid(64))?]),
//!     ]),
//! ]));
//! graph.draw(None)?;
//! ```

pub mod camera;
pub mod effects;
pub mod graph;
pub mod material;
pub mod mesh;
pub mod node;
pub mod render_target;
pub mod scope;
pub mod transform;
pub mod xr;

pub use camera::{Camera, CameraHandle, CameraRig};
pub use effects::{PostProcess, Skybox};
pub use graph::{Graph, OutputTarget, StackState};
pub use material::{Material, UniformHandle, Uniforms};
pub use mesh::SimpleMesh;
pub use node::{Group, Node};
pub use render_target::{RenderTarget, StereoTarget};
pub use scope::UniformScope;
pub use transform::{CameraFixTransform, Mirror, Transform};
pub use xr::{Eye, EyeView, SideBySideSession, XrFrame, XrLayer, XrSession};
