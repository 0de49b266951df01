//! Traversal context.
//!
//! The [`Graph`] owns the device and every piece of state nodes push and pop
//! during a visit: the uniform scope chain, the shader stack, the texture
//! unit counter, the tracked viewport and output framebuffer, and the eye
//! view being rendered when drawing in stereo.

use std::rc::Rc;

use glam::Vec4;
use rustc_hash::FxHashMap;

use super::{EyeView, Group, Node, UniformScope, XrFrame, XrLayer};
use crate::errors::{ArborError, Result};
use crate::renderer::{CullFace, FramebufferKey, GpuDevice, Viewport};
use crate::resources::{FrameBuffer, Shader, UniformValue};

/// Stack depths captured around a root visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackState {
    pub scope_depth: usize,
    pub shader_depth: usize,
    pub texture_units: u32,
}

/// Framebuffer binding and device viewport, saved by a node that
/// redirects output and reapplied when it exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTarget {
    pub framebuffer: Option<FramebufferKey>,
    pub viewport: Viewport,
}

pub struct Graph {
    device: Box<dyn GpuDevice>,
    root: Group,

    scope: Rc<UniformScope>,
    shaders: Vec<Rc<Shader>>,
    texture_unit: u32,

    viewport: Viewport,
    active_viewport: Viewport,
    framebuffer: Option<FramebufferKey>,
    cull_face: CullFace,
    clear_color: Vec4,

    current_view: Option<EyeView>,
    xr_layer: Option<XrLayer>,
}

impl Graph {
    /// Takes ownership of the device; depth testing and back-face culling
    /// are expected to be on from the start.
    #[must_use]
    pub fn new(device: Box<dyn GpuDevice>) -> Self {
        let (width, height) = device.drawable_size();
        let mut graph = Self {
            device,
            root: Group::default(),
            scope: UniformScope::root(),
            shaders: Vec::new(),
            texture_unit: 0,
            viewport: Viewport::full(width, height),
            active_viewport: Viewport::full(width, height),
            framebuffer: None,
            cull_face: CullFace::Back,
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            current_view: None,
            xr_layer: None,
        };
        graph.device.set_cull_face(CullFace::Back);
        graph
    }

    #[must_use]
    pub fn with_clear_color(mut self, color: Vec4) -> Self {
        self.clear_color = color;
        self
    }

    pub fn device(&mut self) -> &mut dyn GpuDevice {
        self.device.as_mut()
    }

    #[must_use]
    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Group {
        &mut self.root
    }

    /// Attaches the layer a [`StereoTarget`](super::StereoTarget) binds.
    pub fn attach_xr_layer(&mut self, layer: XrLayer) {
        self.xr_layer = Some(layer);
    }

    pub fn detach_xr_layer(&mut self) {
        self.xr_layer = None;
    }

    #[must_use]
    pub fn xr_layer(&self) -> Option<XrLayer> {
        self.xr_layer
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Renders one frame.
    ///
    /// Without a stereo frame the root is visited once over the whole
    /// drawable. With one, the root is visited once per eye view with that
    /// eye's viewport and view made current.
    pub fn draw(&mut self, frame: Option<&XrFrame>) -> Result<()> {
        self.device.begin_frame()?;
        self.framebuffer = None;
        self.device.bind_framebuffer(None);
        self.device.clear(self.clear_color, 1.0);

        let root = std::mem::take(&mut self.root);
        let result = self.visit_views(&root, frame);
        self.root = root;
        self.current_view = None;

        let submitted = self.device.end_frame();
        result.and(submitted)
    }

    fn visit_views(&mut self, root: &Group, frame: Option<&XrFrame>) -> Result<()> {
        match frame {
            Some(frame) => {
                for view in &frame.views {
                    self.set_viewport(view.viewport);
                    self.current_view = Some(view.clone());
                    self.visit_checked(root, Some(frame))?;
                }
                Ok(())
            }
            None => {
                let (width, height) = self.device.drawable_size();
                self.set_viewport(Viewport::full(width, height));
                self.visit_checked(root, None)
            }
        }
    }

    /// Visits `node` and, in debug builds, checks that it left every stack
    /// as it found it.
    pub fn visit_checked(&mut self, node: &dyn Node, frame: Option<&XrFrame>) -> Result<()> {
        let before = self.stack_state();
        node.visit(self, frame)?;
        if cfg!(debug_assertions) {
            check_balance(before, self.stack_state())?;
        }
        Ok(())
    }

    #[must_use]
    pub fn stack_state(&self) -> StackState {
        StackState {
            scope_depth: self.scope.depth(),
            shader_depth: self.shaders.len(),
            texture_units: self.texture_unit,
        }
    }

    // ========================================================================
    // Uniform scope
    // ========================================================================

    pub fn push_uniforms(&mut self) {
        self.scope = UniformScope::child(&self.scope);
    }

    pub fn pop_uniforms(&mut self) -> Result<()> {
        let parent = self.scope.parent().cloned().ok_or(ArborError::ScopeUnderflow)?;
        self.scope = parent;
        Ok(())
    }

    #[must_use]
    pub fn scope(&self) -> &Rc<UniformScope> {
        &self.scope
    }

    /// Sets `name` in the innermost scope.
    pub fn set_uniform(&mut self, name: impl Into<String>, value: impl Into<UniformValue>) {
        self.scope.set(name, value.into());
    }

    #[must_use]
    pub fn uniform(&self, name: &str) -> Option<UniformValue> {
        self.scope.get(name)
    }

    #[must_use]
    pub fn flattened_uniforms(&self) -> FxHashMap<String, UniformValue> {
        self.scope.flatten()
    }

    // ========================================================================
    // Shader stack
    // ========================================================================

    pub fn push_shader(&mut self, shader: Rc<Shader>) {
        self.shaders.push(shader);
    }

    pub fn pop_shader(&mut self) -> Option<Rc<Shader>> {
        self.shaders.pop()
    }

    /// Top of the shader stack.
    #[must_use]
    pub fn shader(&self) -> Option<Rc<Shader>> {
        self.shaders.last().cloned()
    }

    // ========================================================================
    // Texture units
    // ========================================================================

    /// Next free unit; the counter moves past it.
    pub fn push_texture_unit(&mut self) -> u32 {
        let unit = self.texture_unit;
        self.texture_unit += 1;
        unit
    }

    pub fn pop_texture_unit(&mut self) {
        debug_assert!(self.texture_unit > 0, "texture unit counter underflow");
        self.texture_unit = self.texture_unit.saturating_sub(1);
    }

    #[must_use]
    pub fn texture_units(&self) -> u32 {
        self.texture_unit
    }

    // ========================================================================
    // Output state
    // ========================================================================

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Tracks `viewport` and applies it to the device.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.active_viewport = viewport;
        self.device.set_viewport(viewport);
    }

    /// Viewport currently applied to the device. Differs from
    /// [`viewport`](Self::viewport) inside a render target.
    #[must_use]
    pub fn active_viewport(&self) -> Viewport {
        self.active_viewport
    }

    #[must_use]
    pub fn framebuffer(&self) -> Option<FramebufferKey> {
        self.framebuffer
    }

    /// Binds `framebuffer` and returns what was bound before.
    pub fn bind_framebuffer(&mut self, framebuffer: Option<FramebufferKey>) -> Option<FramebufferKey> {
        let previous = self.framebuffer;
        self.framebuffer = framebuffer;
        self.device.bind_framebuffer(framebuffer);
        previous
    }

    /// Binds an offscreen target, which also moves the device viewport to
    /// cover it. The tracked viewport is left alone. Returns the output
    /// that was active before.
    pub fn redirect(&mut self, target: &FrameBuffer) -> OutputTarget {
        let previous = self.output_target();
        self.framebuffer = Some(target.key());
        self.active_viewport = target.viewport();
        target.bind(self.device.as_mut());
        previous
    }

    /// Rebinds the framebuffer and device viewport saved by
    /// [`redirect`](Self::redirect).
    pub fn restore_target(&mut self, previous: OutputTarget) {
        self.framebuffer = previous.framebuffer;
        self.active_viewport = previous.viewport;
        self.device.bind_framebuffer(previous.framebuffer);
        self.device.set_viewport(previous.viewport);
    }

    #[must_use]
    pub fn output_target(&self) -> OutputTarget {
        OutputTarget {
            framebuffer: self.framebuffer,
            viewport: self.active_viewport,
        }
    }

    /// Clears the bound framebuffer with the graph clear colour.
    pub fn clear(&mut self) {
        self.device.clear(self.clear_color, 1.0);
    }

    #[must_use]
    pub fn clear_color(&self) -> Vec4 {
        self.clear_color
    }

    #[must_use]
    pub fn cull_face(&self) -> CullFace {
        self.cull_face
    }

    /// Sets the culled face and returns the previous one.
    pub fn set_cull_face(&mut self, face: CullFace) -> CullFace {
        let previous = self.cull_face;
        self.cull_face = face;
        self.device.set_cull_face(face);
        previous
    }

    // ========================================================================
    // Stereo
    // ========================================================================

    /// Eye view being rendered, only during a stereo draw.
    #[must_use]
    pub fn current_view(&self) -> Option<&EyeView> {
        self.current_view.as_ref()
    }

    pub fn set_current_view(&mut self, view: Option<EyeView>) {
        self.current_view = view;
    }
}

fn check_balance(before: StackState, after: StackState) -> Result<()> {
    let unbalanced = |what, before: usize, after: usize| {
        log::error!("Traversal left {what} at {after}, expected {before}");
        Err(ArborError::UnbalancedTraversal { what, before, after })
    };
    if before.scope_depth != after.scope_depth {
        return unbalanced("uniform scope depth", before.scope_depth, after.scope_depth);
    }
    if before.shader_depth != after.shader_depth {
        return unbalanced("shader stack depth", before.shader_depth, after.shader_depth);
    }
    if before.texture_units != after.texture_units {
        return unbalanced(
            "texture unit counter",
            before.texture_units as usize,
            after.texture_units as usize,
        );
    }
    Ok(())
}
