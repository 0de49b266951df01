use std::cell::RefCell;
use std::rc::Rc;

use smallvec::SmallVec;

use super::{Graph, Node, XrFrame};
use crate::errors::Result;
use crate::resources::{Shader, TextureBinding, UniformSet, UniformValue};

/// Shared, mutable uniform values of a [`Uniforms`] or [`Material`] node.
pub type UniformHandle = Rc<RefCell<UniformSet>>;

/// Scope push plus texture-unit bookkeeping shared by [`Uniforms`] and
/// [`Material`].
struct UniformBlock {
    values: UniformHandle,
    bound: RefCell<SmallVec<[(TextureBinding, u32); 4]>>,
}

impl UniformBlock {
    fn new(values: UniformSet) -> Self {
        Self {
            values: Rc::new(RefCell::new(values)),
            bound: RefCell::new(SmallVec::new()),
        }
    }

    /// Pushes a scope and writes every value into it. Textures are bound to
    /// freshly allocated units first and the scope receives the unit.
    fn enter(&self, graph: &mut Graph) {
        graph.push_uniforms();
        let values = self.values.borrow();
        let mut bound = self.bound.borrow_mut();
        bound.clear();
        for (name, value) in values.iter() {
            match value {
                UniformValue::Sampler(binding) => {
                    let unit = graph.push_texture_unit();
                    binding.bind(graph.device(), unit);
                    bound.push((binding.clone(), unit));
                    graph.set_uniform(name, UniformValue::TextureUnit(unit));
                }
                other => graph.set_uniform(name, other.clone()),
            }
        }
    }

    /// Releases units in allocation order, then pops the scope.
    fn exit(&self, graph: &mut Graph) -> Result<()> {
        let mut bound = self.bound.borrow_mut();
        for (binding, unit) in bound.drain(..) {
            binding.release(graph.device(), unit);
            graph.pop_texture_unit();
        }
        graph.pop_uniforms()
    }
}

/// Injects a fixed set of uniforms into its subtree.
pub struct Uniforms {
    block: UniformBlock,
    children: Vec<Box<dyn Node>>,
}

impl Uniforms {
    #[must_use]
    pub fn new(values: UniformSet, children: Vec<Box<dyn Node>>) -> Self {
        Self {
            block: UniformBlock::new(values),
            children,
        }
    }

    /// Handle for changing values between frames, e.g. a clock-driven `time`.
    #[must_use]
    pub fn handle(&self) -> UniformHandle {
        Rc::clone(&self.block.values)
    }

    pub fn append(&mut self, child: impl Node + 'static) {
        self.children.push(Box::new(child));
    }
}

impl Node for Uniforms {
    fn enter(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        self.block.enter(graph);
        Ok(())
    }

    fn exit(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        self.block.exit(graph)
    }

    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}

/// Shader plus the uniforms that belong to one surface.
///
/// On enter the shader goes on the stack and into use, the material's
/// uniforms are scoped like [`Uniforms`], and the whole visible scope is
/// sent to the shader.
pub struct Material {
    shader: Rc<Shader>,
    block: UniformBlock,
    children: Vec<Box<dyn Node>>,
}

impl Material {
    #[must_use]
    pub fn new(shader: Rc<Shader>, values: UniformSet, children: Vec<Box<dyn Node>>) -> Self {
        Self {
            shader,
            block: UniformBlock::new(values),
            children,
        }
    }

    #[must_use]
    pub fn shader(&self) -> &Rc<Shader> {
        &self.shader
    }

    #[must_use]
    pub fn handle(&self) -> UniformHandle {
        Rc::clone(&self.block.values)
    }

    pub fn append(&mut self, child: impl Node + 'static) {
        self.children.push(Box::new(child));
    }
}

impl Node for Material {
    fn enter(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        graph.push_shader(Rc::clone(&self.shader));
        self.shader.use_program(graph.device());
        self.block.enter(graph);

        let flat = graph.flattened_uniforms();
        self.shader
            .set_uniforms(graph.device(), flat.iter().map(|(n, v)| (n.as_str(), v)));
        Ok(())
    }

    fn exit(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        graph.pop_shader();
        // Hand the device back to the enclosing material's program.
        if let Some(parent) = graph.shader() {
            parent.use_program(graph.device());
        }
        self.block.exit(graph)
    }

    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}
