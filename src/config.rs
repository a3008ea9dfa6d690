//! Configuration: serializer output options and the editor state directory.

use crate::Result;
use crate::labels::Label;
use crate::text;
use crate::view::View;

use anyhow::{Context, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_INDENT: usize = 4;
pub const DEFAULT_MODEL_FOLDER: &str = "gsnModel";

/// Directory (next to the model) holding editor state.
pub const STATE_DIRECTORY: &str = ".gsn-editor";
pub const LABELS_FILE: &str = "labels.json";
pub const VIEWS_FILE: &str = "views.json";

/// Where and how `.gsn` output is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    pub indent: usize,
    pub model_folder: String,
    /// Put every namespace into `main.gsn` instead of `<ns>.gsn` files.
    pub single_file: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: DEFAULT_INDENT,
            model_folder: DEFAULT_MODEL_FOLDER.to_string(),
            single_file: false,
        }
    }
}

impl SerializeOptions {
    /// Create `<output_dir>/<model_folder>` and write the namespace texts
    /// into it. The output directory must exist; the model folder must not.
    /// Returns the written files.
    pub fn write_model_folder(
        &self,
        contents: &BTreeMap<String, String>,
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        if !output_dir.is_dir() {
            bail!("The output directory does not exist! {}", output_dir.display());
        }

        let model_dir = output_dir.join(&self.model_folder);
        if model_dir.exists() {
            bail!("The model directory already exists! {}", model_dir.display());
        }
        fs::create_dir(&model_dir)
            .with_context(|| format!("create model directory {}", model_dir.display()))?;

        let mut written = Vec::new();
        if self.single_file {
            let path = model_dir.join(text::SINGLE_FILE_NAME);
            fs::write(&path, text::to_single_file(contents))
                .with_context(|| format!("write {}", path.display()))?;
            written.push(path);
        } else {
            for (ns, content) in contents {
                let path = model_dir.join(format!("{}.{}", ns, text::FILE_EXTENSION));
                fs::write(&path, content).with_context(|| format!("write {}", path.display()))?;
                written.push(path);
            }
        }

        tracing::debug!(dir = %model_dir.display(), files = written.len(), "wrote model folder");
        Ok(written)
    }
}

/// `.gsn-editor/` under a model directory: label and view definitions.
#[derive(Debug, Clone)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    /// State directory of the model stored in `model_dir`.
    pub fn new(model_dir: impl AsRef<Path>) -> Self {
        Self {
            root: model_dir.as_ref().join(STATE_DIRECTORY),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn labels_path(&self) -> PathBuf {
        self.root.join(LABELS_FILE)
    }

    pub fn views_path(&self) -> PathBuf {
        self.root.join(VIEWS_FILE)
    }

    pub fn read_labels(&self) -> Result<Vec<Label>> {
        read_list(&self.labels_path())
    }

    pub fn write_labels(&self, labels: &[Label]) -> Result<()> {
        self.write_list(&self.labels_path(), labels)
    }

    pub fn read_views(&self) -> Result<Vec<View>> {
        read_list(&self.views_path())
    }

    pub fn write_views(&self, views: &[View]) -> Result<()> {
        self.write_list(&self.views_path(), views)
    }

    fn write_list<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("create state directory {}", self.root.display()))?;
        let json = serde_json::to_string_pretty(items)?;
        fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

/// A missing file reads as an empty list.
pub fn read_list<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let items = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array", path.display()))?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn missing_state_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path());
        assert!(state.read_labels().unwrap().is_empty());
        assert!(state.read_views().unwrap().is_empty());
    }

    #[test]
    fn labels_and_views_round_trip_through_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let state = StateDir::new(dir.path());

        let labels = vec![Label::label("a"), Label::group("G", &["a"], None)];
        let mut view = View::new("G && !b");
        view.include_parents = true;

        state.write_labels(&labels).unwrap();
        state.write_views(std::slice::from_ref(&view)).unwrap();

        assert!(dir.path().join(".gsn-editor/labels.json").is_file());
        assert_eq!(state.read_labels().unwrap(), labels);
        assert_eq!(state.read_views().unwrap(), vec![view]);

        let raw = fs::read_to_string(state.views_path()).unwrap();
        assert!(raw.contains("\"includeParents\": true"));
    }

    #[test]
    fn model_folder_must_be_new() {
        let dir = tempfile::tempdir().unwrap();
        let contents = BTreeMap::from([
            ("a".to_string(), "GOALS a\n{\n}\n".to_string()),
            ("b".to_string(), "GOALS b\n{\n}\n".to_string()),
        ]);

        let opts = SerializeOptions::default();
        let written = opts.write_model_folder(&contents, dir.path()).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("gsnModel/a.gsn").is_file());

        assert!(opts.write_model_folder(&contents, dir.path()).is_err());

        let single = SerializeOptions {
            model_folder: "one".to_string(),
            single_file: true,
            ..SerializeOptions::default()
        };
        single.write_model_folder(&contents, dir.path()).unwrap();
        let text = fs::read_to_string(dir.path().join("one/main.gsn")).unwrap();
        assert_eq!(text, "GOALS a\n{\n}\n\nGOALS b\n{\n}\n");
    }

    #[test]
    fn missing_output_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SerializeOptions::default()
            .write_model_folder(&BTreeMap::new(), &dir.path().join("nope"))
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
