//! Loading and storing [`CodeModel`]s.
//!
//! Reading and writing the real binary container format belongs to an external
//! collaborator. This module persists the model itself as JSON, which is what the
//! command-line tool rewrites and what test fixtures are checked in as.

use std::{fs, path::Path};

use log::debug;

use crate::{model::CodeModel, Result};

impl CodeModel {
    /// Loads a model from a JSON file and validates it.
    ///
    /// # Arguments
    ///
    /// * `path` - The file to read
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be read,
    /// [`crate::Error::Json`] if it is not a serialized model and
    /// [`crate::Error::Malformed`] if the model contains dangling references.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use disposetrack::CodeModel;
    /// use std::path::Path;
    ///
    /// let model = CodeModel::from_path(Path::new("Library.json"))?;
    /// println!("{} types", model.types.len());
    /// # Ok::<(), disposetrack::Error>(())
    /// ```
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let model = Self::from_json(&data)?;
        debug!(
            "Loaded '{}' from {} ({} types, {} member references)",
            model.assembly,
            path.display(),
            model.types.len(),
            model.member_refs.len()
        );
        Ok(model)
    }

    /// Parses a model from its JSON form and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] for invalid input and [`crate::Error::Malformed`]
    /// if the model contains dangling references.
    pub fn from_json(data: &str) -> Result<Self> {
        let model: CodeModel = serde_json::from_str(data)?;
        model.validate()?;
        Ok(model)
    }

    /// Serializes the model to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the model to a JSON file, replacing any existing content.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Json`] if serialization fails and
    /// [`crate::Error::FileError`] if the file cannot be written.
    pub fn write_to_path(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        fs::write(path, data)?;
        debug!("Wrote '{}' to {}", self.assembly, path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use crate::{
        model::{MethodDef, TypeDef},
        Error,
    };

    use super::*;

    fn model() -> CodeModel {
        let mut model = CodeModel::new("Persisted");
        let core = model.add_assembly_ref("mscorlib");
        let object = model.import_type(core, "System", "Object");
        let owner = model.add_type(TypeDef::class("Persisted", "Owner", object));
        model.add_method(owner, MethodDef::constructor()).unwrap();
        model
    }

    #[test]
    fn test_json_roundtrip_preserves_tokens() {
        let original = model();
        let json = original.to_json().unwrap();
        let loaded = CodeModel::from_json(&json).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("persisted.json");

        let original = model();
        original.write_to_path(&path).unwrap();
        assert_eq!(CodeModel::from_path(&path).unwrap(), original);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let result = CodeModel::from_path(&dir.path().join("missing.json"));
        assert!(matches!(result, Err(Error::FileError(_))));
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            CodeModel::from_json("{\"assembly\": 12}"),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_dangling_reference_is_rejected() {
        let json = r#"{
            "assembly": "Broken",
            "type_refs": [{ "scope": 587202561, "namespace": "System", "name": "Object" }]
        }"#;
        assert!(matches!(
            CodeModel::from_json(json),
            Err(Error::Malformed { .. })
        ));
    }
}
