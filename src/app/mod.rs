//! Windowed application framework.
//!
//! - [`App`]: builder for the window and renderer settings
//! - [`AppHandler`]: trait the application implements
//! - [`Input`]: keyboard and mouse state fed to [`AppHandler::update`]
//!
//! ```rust,ignore
//! struct Demo { /* scene handles */ }
//!
//! impl AppHandler for Demo {
//!     fn init(graph: &mut Graph, clock: &mut Clock, window: &Arc<Window>) -> Result<Self> {
//!         graph.root_mut().append(/* ... */);
//!         Ok(Demo {})
//!     }
//! }
//!
//! fn main() -> arbor::Result<()> {
//!     App::new().with_title("Demo").run::<Demo>()
//! }
//! ```

pub mod input;
pub mod runner;

pub use input::Input;
pub use runner::{App, AppHandler};
