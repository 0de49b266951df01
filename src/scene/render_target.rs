use std::cell::Cell;
use std::rc::Rc;

use super::{Graph, Node, OutputTarget, XrFrame};
use crate::errors::{ArborError, Result};
use crate::renderer::FramebufferKey;
use crate::resources::FrameBuffer;

/// Renders its subtree into an offscreen framebuffer.
///
/// Enter binds and clears the target, which moves the viewport to the
/// target's size. Exit rebinds the framebuffer and viewport that were
/// active before, so targets nest.
pub struct RenderTarget {
    target: Rc<FrameBuffer>,
    previous: Cell<Option<OutputTarget>>,
    children: Vec<Box<dyn Node>>,
}

impl RenderTarget {
    #[must_use]
    pub fn new(target: Rc<FrameBuffer>, children: Vec<Box<dyn Node>>) -> Self {
        Self {
            target,
            previous: Cell::new(None),
            children,
        }
    }

    #[must_use]
    pub fn target(&self) -> &Rc<FrameBuffer> {
        &self.target
    }

    pub fn append(&mut self, child: impl Node + 'static) {
        self.children.push(Box::new(child));
    }
}

impl Node for RenderTarget {
    fn enter(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        self.previous.set(Some(graph.redirect(&self.target)));
        graph.clear();
        Ok(())
    }

    fn exit(&self, graph: &mut Graph, _frame: Option<&XrFrame>) -> Result<()> {
        if let Some(previous) = self.previous.take() {
            graph.restore_target(previous);
        }
        Ok(())
    }

    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}

/// Sends its subtree to the XR layer while a stereo frame is being drawn.
///
/// Without a frame it does nothing, so the same tree renders to the window.
pub struct StereoTarget {
    previous: Cell<Option<FramebufferKey>>,
    children: Vec<Box<dyn Node>>,
}

impl StereoTarget {
    #[must_use]
    pub fn new(children: Vec<Box<dyn Node>>) -> Self {
        Self {
            previous: Cell::new(None),
            children,
        }
    }

    pub fn append(&mut self, child: impl Node + 'static) {
        self.children.push(Box::new(child));
    }
}

impl Node for StereoTarget {
    fn enter(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        if frame.is_some() {
            let layer = graph.xr_layer().ok_or(ArborError::XrUnavailable)?;
            self.previous.set(graph.bind_framebuffer(layer.framebuffer));
        }
        Ok(())
    }

    fn exit(&self, graph: &mut Graph, frame: Option<&XrFrame>) -> Result<()> {
        if frame.is_some() {
            graph.bind_framebuffer(self.previous.get());
        }
        Ok(())
    }

    fn children(&self) -> &[Box<dyn Node>] {
        &self.children
    }
}
