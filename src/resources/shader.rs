use std::cell::RefCell;

use rustc_hash::FxHashMap;

use super::UniformValue;
use crate::errors::Result;
use crate::renderer::{GpuDevice, ProgramKey, UniformLocation};

/// Linked shader program with cached location lookups.
///
/// The first lookup of a name asks the device and caches the answer, a miss
/// included, so names the program does not use cost one query per program.
#[derive(Debug)]
pub struct Shader {
    program: ProgramKey,
    label: String,
    uniform_locations: RefCell<FxHashMap<String, Option<UniformLocation>>>,
    attribute_locations: RefCell<FxHashMap<String, Option<u32>>>,
}

impl Shader {
    /// Compiles and links. Errors are fatal to scene assembly.
    pub fn new(
        device: &mut dyn GpuDevice,
        label: impl Into<String>,
        vertex: &str,
        fragment: &str,
    ) -> Result<Self> {
        let label = label.into();
        let program = device.create_program(vertex, fragment).inspect_err(|e| {
            log::error!("Shader '{label}' failed: {e}");
        })?;
        log::debug!("Shader '{label}' linked");
        Ok(Self {
            program,
            label,
            uniform_locations: RefCell::new(FxHashMap::default()),
            attribute_locations: RefCell::new(FxHashMap::default()),
        })
    }

    #[must_use]
    pub fn program(&self) -> ProgramKey {
        self.program
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn use_program(&self, device: &mut dyn GpuDevice) {
        device.use_program(self.program);
    }

    pub fn uniform_location(&self, device: &mut dyn GpuDevice, name: &str) -> Option<UniformLocation> {
        if let Some(cached) = self.uniform_locations.borrow().get(name) {
            return *cached;
        }
        let location = device.uniform_location(self.program, name);
        self.uniform_locations
            .borrow_mut()
            .insert(name.to_owned(), location);
        location
    }

    pub fn attribute_location(&self, device: &mut dyn GpuDevice, name: &str) -> Option<u32> {
        if let Some(cached) = self.attribute_locations.borrow().get(name) {
            return *cached;
        }
        let location = device.attribute_location(self.program, name);
        self.attribute_locations
            .borrow_mut()
            .insert(name.to_owned(), location);
        location
    }

    /// Sends every value whose name the program uses; the rest are skipped.
    pub fn set_uniforms<'a, I>(&self, device: &mut dyn GpuDevice, values: I)
    where
        I: IntoIterator<Item = (&'a str, &'a UniformValue)>,
    {
        for (name, value) in values {
            if let Some(location) = self.uniform_location(device, name) {
                value.push(device, location);
            }
        }
    }
}
