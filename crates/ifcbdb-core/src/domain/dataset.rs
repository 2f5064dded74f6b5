//! Dataset domain entity
//!
//! A dataset is a named collection of bins. It owns an ordered list of
//! data directories (see [`super::directory`]); bin membership is
//! many-to-many and lives in the store, not on the entity.

use serde::{Deserialize, Serialize};

use super::{errors::DomainError, newtypes::DatasetId};

/// Maximum length of a dataset name
pub const MAX_NAME_LEN: usize = 64;

/// A named collection of bins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Unique identifier for this dataset
    id: DatasetId,
    /// Short unique name used in URLs and on the command line
    name: String,
    /// Human-readable title
    title: String,
    /// Inactive datasets are kept but hidden from listings
    is_active: bool,
}

impl Dataset {
    /// Creates a new active dataset
    ///
    /// Names must be non-empty, at most [`MAX_NAME_LEN`] characters and
    /// contain no whitespace.
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Result<Self, DomainError> {
        Self::with_id(DatasetId::new(), name, title, true)
    }

    /// Reconstructs a dataset with a known identifier
    pub fn with_id(
        id: DatasetId,
        name: impl Into<String>,
        title: impl Into<String>,
        is_active: bool,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            id,
            name,
            title: title.into(),
            is_active,
        })
    }

    pub fn id(&self) -> &DatasetId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.is_empty() {
        return Err(DomainError::ValidationFailed(
            "dataset name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::ValidationFailed(format!(
            "dataset name longer than {MAX_NAME_LEN} characters"
        )));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(DomainError::ValidationFailed(format!(
            "dataset name '{name}' contains whitespace"
        )));
    }
    Ok(())
}

impl std::fmt::Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_dataset_is_active() {
        let ds = Dataset::new("mvco", "Martha's Vineyard Coastal Observatory").unwrap();
        assert_eq!(ds.name(), "mvco");
        assert!(ds.is_active());
        assert_eq!(ds.to_string(), "mvco");
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(Dataset::new("", "").is_err());
        assert!(Dataset::new("has space", "").is_err());
        assert!(Dataset::new("x".repeat(MAX_NAME_LEN + 1), "").is_err());
        assert!(Dataset::new("x".repeat(MAX_NAME_LEN), "").is_ok());
    }

    #[test]
    fn test_with_id_preserves_fields() {
        let id = DatasetId::new();
        let ds = Dataset::with_id(id, "d1", "Dataset one", false).unwrap();
        assert_eq!(ds.id(), &id);
        assert!(!ds.is_active());
    }
}
