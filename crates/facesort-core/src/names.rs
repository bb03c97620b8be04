//! Display names for trained person IDs.
//!
//! Training folders are usually named with ASCII IDs (e.g. `Taro_Yamada`);
//! an optional JSON map turns them into the names shown to the user.

use crate::types::Label;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NameMapError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("name map format: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct NameMap {
    names: HashMap<String, String>,
}

impl NameMap {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    /// Load a `{ "id": "display name" }` JSON object.
    pub fn load(path: &Path) -> Result<Self, NameMapError> {
        let raw = std::fs::read_to_string(path)?;
        let names: HashMap<String, String> = serde_json::from_str(&raw)?;
        tracing::debug!(path = %path.display(), entries = names.len(), "loaded name map");
        Ok(Self { names })
    }

    /// Map a person label to its display name. `Unknown` and unmapped IDs
    /// pass through.
    pub fn display(&self, label: Label) -> Label {
        match label {
            Label::Person(id) => match self.names.get(&id) {
                Some(name) => Label::from(name.clone()),
                None => Label::Person(id),
            },
            Label::Unknown => Label::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map() -> NameMap {
        NameMap::new(HashMap::from([("Taro_Yamada".to_string(), "山田太郎".to_string())]))
    }

    #[test]
    fn test_display_maps_known_id() {
        assert_eq!(map().display(Label::from("Taro_Yamada")), Label::from("山田太郎"));
    }

    #[test]
    fn test_display_passes_through() {
        assert_eq!(map().display(Label::from("Hanako")), Label::from("Hanako"));
        assert_eq!(map().display(Label::Unknown), Label::Unknown);
    }

    #[test]
    fn test_load_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.json");
        std::fs::write(&path, r#"{"alice_01": "Alice"}"#).unwrap();
        let names = NameMap::load(&path).unwrap();
        assert_eq!(names.display(Label::from("bob_02")), Label::from("bob_02"));
        assert_eq!(names.display(Label::from("alice_01")), Label::from("Alice"));
    }

    #[test]
    fn test_load_rejects_non_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("names.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(NameMap::load(&path), Err(NameMapError::Format(_))));
    }
}
