//! Named shader lookup over a resource table.
//!
//! Sources live in the table under `<prefix><name>`. A line of the form
//!
//! ```text
//! // import "sun.wgsl"
//! ```
//!
//! is replaced by the text of `<prefix>sun.wgsl`, recursively. Each path is
//! inlined at most once per stage, so shared snippets can import each other
//! freely.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::Shader;
use crate::assets::ResourceTable;
use crate::errors::{ArborError, Result};
use crate::renderer::GpuDevice;

pub const DEFAULT_PREFIX: &str = "shaders/";

/// Resolves, compiles and caches shader programs by name.
pub struct ShaderLibrary<'a> {
    resources: &'a ResourceTable,
    prefix: String,
    programs: FxHashMap<(String, String), Rc<Shader>>,
}

impl<'a> ShaderLibrary<'a> {
    #[must_use]
    pub fn new(resources: &'a ResourceTable) -> Self {
        Self::with_prefix(resources, DEFAULT_PREFIX)
    }

    #[must_use]
    pub fn with_prefix(resources: &'a ResourceTable, prefix: impl Into<String>) -> Self {
        Self {
            resources,
            prefix: prefix.into(),
            programs: FxHashMap::default(),
        }
    }

    /// Program from a vertex and a fragment source name.
    ///
    /// With `fragment = None`, `vertex` is a base name and the sources are
    /// `<name>.vert` and `<name>.frag`.
    pub fn get(
        &mut self,
        device: &mut dyn GpuDevice,
        vertex: &str,
        fragment: Option<&str>,
    ) -> Result<Rc<Shader>> {
        let key = match fragment {
            Some(fragment) => (vertex.to_owned(), fragment.to_owned()),
            None => (format!("{vertex}.vert"), format!("{vertex}.frag")),
        };
        if let Some(shader) = self.programs.get(&key) {
            return Ok(Rc::clone(shader));
        }

        let vertex_source = self.resolve(&key.0)?;
        let fragment_source = self.resolve(&key.1)?;
        let label = format!("{}+{}", key.0, key.1);
        let shader = Rc::new(Shader::new(device, label, &vertex_source, &fragment_source)?);
        self.programs.insert(key, Rc::clone(&shader));
        Ok(shader)
    }

    /// Source text of `name` with every import inlined.
    pub fn resolve(&self, name: &str) -> Result<String> {
        let mut seen = FxHashSet::default();
        self.resolve_inner(name, &mut seen)
    }

    fn resolve_inner(&self, name: &str, seen: &mut FxHashSet<String>) -> Result<String> {
        let path = format!("{}{name}", self.prefix);
        let source = self
            .resources
            .text(&path)
            .map_err(|_| ArborError::ShaderSourceMissing(path.clone()))?;
        seen.insert(name.to_owned());

        let mut out = String::with_capacity(source.len());
        for line in source.lines() {
            match parse_import(line) {
                Some(import) if seen.contains(import) => {}
                Some(import) => {
                    let inlined = self.resolve_inner(import, seen)?;
                    out.push_str(&inlined);
                    if !inlined.ends_with('\n') {
                        out.push('\n');
                    }
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }
}

/// Path of an `// import "<path>"` line.
fn parse_import(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix("//")?;
    let rest = rest.trim_start_matches('/').trim_start();
    let rest = rest.strip_prefix("import")?.trim_start();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(&rest[..end])
}
