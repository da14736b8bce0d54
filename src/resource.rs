//! Resource resolution for images referenced by name.

use crate::toolkit::PeerClass;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::{fmt, fs, io};
use tracing::trace;

/// Loads named resources.
pub trait ResourceResolver {
    /// Returns the bytes of the resource at `path`, or `None` if there is no such resource.
    fn resolve(&self, path: &str) -> io::Result<Option<Vec<u8>>>;
}

/// Resources held in memory, keyed by path.
#[derive(Debug, Default, Clone)]
pub struct MemoryResources {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryResources {
    pub fn new() -> MemoryResources {
        MemoryResources::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.entries.insert(path.into(), bytes.into());
    }
}

impl ResourceResolver for MemoryResources {
    fn resolve(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.get(path).cloned())
    }
}

/// Resources read from a directory.
#[derive(Debug, Clone)]
pub struct DirResources {
    root: PathBuf,
}

impl DirResources {
    pub fn new(root: impl Into<PathBuf>) -> DirResources {
        DirResources { root: root.into() }
    }
}

impl ResourceResolver for DirResources {
    fn resolve(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.root.join(path)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// A loaded image. Cheap to clone.
#[derive(Clone, PartialEq)]
pub struct Image {
    pub path: String,
    pub bytes: Arc<Vec<u8>>,
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Image({:?}, {} bytes)", self.path, self.bytes.len())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    #[error("resource {name:?} not found (tried {tried:?})")]
    NotFound { name: String, tried: Vec<String> },
    #[error("failed to read resource {path:?}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// The resolver and image cache owned by a UI context.
pub struct Resources {
    resolver: Box<dyn ResourceResolver>,
    images: HashMap<String, Image>,
}

impl Resources {
    pub fn new(resolver: Box<dyn ResourceResolver>) -> Resources {
        Resources {
            resolver,
            images: HashMap::new(),
        }
    }

    /// Candidate paths for `name` requested on behalf of `class`, in lookup order:
    /// the class's own namespace, the class's resource bundle, the shared resources.
    ///
    /// Names starting with `/` are absolute and have a single candidate.
    pub fn candidates(class: &PeerClass, name: &str) -> Vec<String> {
        if let Some(absolute) = name.strip_prefix('/') {
            return vec![absolute.to_string()];
        }
        let dir = class.namespace().replace("::", "/");
        vec![
            format!("{}/{}", dir, name),
            format!("{}/{}/{}", dir, class.simple_name(), name),
            format!("resources/{}", name),
        ]
    }

    /// Loads an image, using the cache when possible.
    pub fn image(&mut self, class: &PeerClass, name: &str) -> Result<Image, ResourceError> {
        let candidates = Resources::candidates(class, name);
        for path in &candidates {
            if let Some(image) = self.images.get(path) {
                trace!(%path, "image cache hit");
                return Ok(image.clone());
            }
            let bytes = self
                .resolver
                .resolve(path)
                .map_err(|source| ResourceError::Io {
                    path: path.clone(),
                    source,
                })?;
            if let Some(bytes) = bytes {
                let image = Image {
                    path: path.clone(),
                    bytes: Arc::new(bytes),
                };
                self.images.insert(path.clone(), image.clone());
                return Ok(image);
            }
        }
        Err(ResourceError::NotFound {
            name: name.to_string(),
            tried: candidates,
        })
    }

    /// Number of cached images.
    pub fn cached_images(&self) -> usize {
        self.images.len()
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Resources")
            .field("images", &self.images.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolkit::{BUTTON, LABEL};

    #[test]
    fn test_lookup_order() {
        let mut memory = MemoryResources::new();
        memory.insert("resources/ok.png", &b"shared"[..]);
        memory.insert("roost/toolkit/Button/ok.png", &b"bundle"[..]);
        let mut resources = Resources::new(Box::new(memory));

        let image = resources.image(&BUTTON, "ok.png").unwrap();
        assert_eq!(&**image.bytes, b"bundle");
        let image = resources.image(&LABEL, "ok.png").unwrap();
        assert_eq!(&**image.bytes, b"shared");
        assert_eq!(resources.cached_images(), 2);
    }

    #[test]
    fn test_cached_shared_image_doesnt_shadow_bundle() {
        let mut memory = MemoryResources::new();
        memory.insert("resources/ok.png", &b"shared"[..]);
        memory.insert("roost/toolkit/Button/ok.png", &b"bundle"[..]);
        let mut resources = Resources::new(Box::new(memory));

        let image = resources.image(&LABEL, "ok.png").unwrap();
        assert_eq!(&**image.bytes, b"shared");
        let image = resources.image(&BUTTON, "ok.png").unwrap();
        assert_eq!(&**image.bytes, b"bundle");
    }

    #[test]
    fn test_missing_resource_lists_candidates() {
        let mut resources = Resources::new(Box::new(MemoryResources::new()));
        match resources.image(&LABEL, "gone.png") {
            Err(ResourceError::NotFound { tried, .. }) => assert_eq!(
                tried,
                vec![
                    "roost/toolkit/gone.png",
                    "roost/toolkit/Label/gone.png",
                    "resources/gone.png"
                ]
            ),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert_eq!(
            Resources::candidates(&LABEL, "/icons/a.png"),
            vec!["icons/a.png"]
        );
    }
}
