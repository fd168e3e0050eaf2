use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::MatchError;

/// Placeholder for attributes the metadata store does not provide.
pub const NOT_AVAILABLE: &str = "N/A";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Descriptive attributes of an identity.
///
/// Unknown attributes are kept in `extra` and serialized inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performer {
    #[serde(default = "not_available")]
    pub name: String,

    #[serde(default = "not_available")]
    pub image: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Performer {
    fn default() -> Self {
        Self {
            name: not_available(),
            image: not_available(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Read-only lookup of identity attributes.
///
/// Implementations must be safe for concurrent use. A missing identity is
/// not an error; callers substitute [`Performer::default`].
pub trait MetadataStore: Send + Sync {
    fn get(&self, id: &str) -> Option<Performer>;

    /// Number of identities known to the store.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`MetadataStore`] that knows no identities.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMetadata;

impl MetadataStore for NoMetadata {
    fn get(&self, _id: &str) -> Option<Performer> {
        None
    }

    fn len(&self) -> usize {
        0
    }
}

/// HashMap-backed [`MetadataStore`].
#[derive(Debug, Default, Clone)]
pub struct MemoryMetadata {
    performers: HashMap<String, Performer>,
}

impl MemoryMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, performer: Performer) {
        self.performers.insert(id.into(), performer);
    }

    /// Load a `performers.json` document: a JSON object mapping identity
    /// IDs to attribute objects.
    pub fn from_reader(r: impl Read) -> Result<Self, MatchError> {
        let performers: HashMap<String, Performer> =
            serde_json::from_reader(r).map_err(|e| MatchError::Metadata(e.to_string()))?;
        Ok(Self { performers })
    }

    /// Load a `performers.json` file.
    pub fn from_file(path: &Path) -> Result<Self, MatchError> {
        let f = std::fs::File::open(path)
            .map_err(|e| MatchError::Metadata(format!("open {}: {e}", path.display())))?;
        Self::from_reader(std::io::BufReader::new(f))
    }
}

impl MetadataStore for MemoryMetadata {
    fn get(&self, id: &str) -> Option<Performer> {
        self.performers.get(id).cloned()
    }

    fn len(&self) -> usize {
        self.performers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_performers_json() {
        let doc = br#"{
            "p1": {"name": "Alice", "image": "https://img/alice.jpg", "country": "NL"},
            "p2": {"name": "Bob"}
        }"#;
        let store = MemoryMetadata::from_reader(&doc[..]).unwrap();
        assert_eq!(store.len(), 2);

        let alice = store.get("p1").unwrap();
        assert_eq!(alice.name, "Alice");
        assert_eq!(alice.extra["country"], "NL");

        let bob = store.get("p2").unwrap();
        assert_eq!(bob.image, NOT_AVAILABLE);

        assert!(store.get("p3").is_none());
    }

    #[test]
    fn invalid_json_is_metadata_error() {
        assert!(matches!(
            MemoryMetadata::from_reader(&b"[1, 2"[..]),
            Err(MatchError::Metadata(_))
        ));
    }

    #[test]
    fn default_performer_is_placeholder() {
        let p = Performer::default();
        assert_eq!(p.name, "N/A");
        assert_eq!(p.image, "N/A");
        assert!(p.extra.is_empty());
    }

    #[test]
    fn no_metadata_is_empty() {
        assert!(NoMetadata.get("anything").is_none());
        assert!(NoMetadata.is_empty());
    }

    #[test]
    fn from_file_missing() {
        assert!(MemoryMetadata::from_file(Path::new("/nonexistent/performers.json")).is_err());
    }
}
