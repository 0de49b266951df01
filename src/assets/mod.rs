//! Asset loading.
//!
//! The [`Loader`] reads files from a root directory on worker threads and
//! decodes them into a [`ResourceTable`], keyed by the path they were
//! requested under. Scene assembly only starts once every queued path has
//! arrived; a single failure aborts it.

pub mod loader;

pub use loader::Loader;

use std::path::Path;

use image::DynamicImage;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;

use crate::errors::{ArborError, Result};

/// Decoded content of one file.
#[derive(Debug, Clone)]
pub enum Resource {
    Image(DynamicImage),
    Json(serde_json::Value),
    Text(String),
}

/// How a path's bytes are decoded, chosen from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Image,
    Json,
    Text,
}

impl ResourceType {
    /// `jpg`, `jpeg`, `gif` and `png` are images, `json` is JSON, anything
    /// else is text. Matching ignores case.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("jpg" | "jpeg" | "gif" | "png") => Self::Image,
            Some("json") => Self::Json,
            _ => Self::Text,
        }
    }

    pub fn decode(self, path: &str, bytes: Vec<u8>) -> Result<Resource> {
        match self {
            Self::Image => Ok(Resource::Image(image::load_from_memory(&bytes)?)),
            Self::Json => Ok(Resource::Json(serde_json::from_slice(&bytes)?)),
            Self::Text => String::from_utf8(bytes)
                .map(Resource::Text)
                .map_err(|_| ArborError::ResourceKind {
                    path: path.to_owned(),
                    expected: "UTF-8 text",
                }),
        }
    }
}

/// Loaded resources by logical path.
#[derive(Debug, Default)]
pub struct ResourceTable {
    entries: FxHashMap<String, Resource>,
}

impl ResourceTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, resource: Resource) {
        self.entries.insert(path.into(), resource);
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&Resource> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn require(&self, path: &str) -> Result<&Resource> {
        self.get(path)
            .ok_or_else(|| ArborError::ResourceNotFound(path.to_owned()))
    }

    pub fn text(&self, path: &str) -> Result<&str> {
        match self.require(path)? {
            Resource::Text(text) => Ok(text),
            _ => Err(kind_error(path, "text")),
        }
    }

    pub fn image(&self, path: &str) -> Result<&DynamicImage> {
        match self.require(path)? {
            Resource::Image(image) => Ok(image),
            _ => Err(kind_error(path, "an image")),
        }
    }

    pub fn json(&self, path: &str) -> Result<&serde_json::Value> {
        match self.require(path)? {
            Resource::Json(value) => Ok(value),
            _ => Err(kind_error(path, "JSON")),
        }
    }

    /// Deserializes a JSON resource into `T`.
    pub fn json_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        Ok(T::deserialize(self.json(path)?)?)
    }
}

fn kind_error(path: &str, expected: &'static str) -> ArborError {
    ArborError::ResourceKind {
        path: path.to_owned(),
        expected,
    }
}
