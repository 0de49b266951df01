use std::rc::Rc;

use super::{Graph, XrFrame};
use crate::errors::Result;

/// A scene graph element.
///
/// `visit` runs `enter`, visits every child in order, then runs `exit`.
/// Whatever `enter` pushes onto the graph, `exit` pops. Once `enter` has
/// succeeded, `exit` runs even when a child fails, so an error never leaves
/// a scope, shader or texture unit behind for the siblings that follow.
///
/// `frame` is only read by stereo-aware nodes; every node passes it to its
/// children unchanged.
pub trait Node {
    #[allow(unused_variables)]
    fn enter(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        Ok(())
    }

    #[allow(unused_variables)]
    fn exit(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        Ok(())
    }

    fn children(&self) -> &[Box<dyn Node>] {
        &[]
    }

    fn visit(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        self.enter(graph, frame)?;
        let mut result = Ok(());
        for child in self.children() {
            result = child.visit(graph, frame);
            if result.is_err() {
                break;
            }
        }
        let exited = self.exit(graph, frame);
        result.and(exited)
    }
}

/// A shared subtree, drawn wherever it is attached.
///
/// The same terrain can sit under a refraction target, a mirror and the
/// main pass; each parent visits it in turn.
impl<N: Node + ?Sized> Node for Rc<N> {
    fn enter(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        (**self).enter(graph, frame)
    }

    fn exit(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        (**self).exit(graph, frame)
    }

    fn children(&self) -> &[Box<dyn Node>] {
        (**self).children()
    }

    fn visit(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        (**self).visit(graph, frame)
    }
}

/// Boxes a list of nodes into a children vector.
///
/// ```rust,ignore
/// let camera = Camera::new(nodes![globals, bloom]);
/// ```
#[macro_export]
macro_rules! nodes {
    ($($node:expr),* $(,)?) => {
        vec![$(Box::new($node) as Box<dyn $crate::scene::Node>),*]
    };
}

/// Plain container with no state of its own.
#[derive(Default)]
pub struct Group {
    children: Vec<Box<dyn Node>>,
}

impl Group {
    #[must_use]
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self { children }
    }

    pub fn append(&mut self, child: impl Node + 'static) {
        self.children.push(Box::new(child));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Node for Group {
    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}
