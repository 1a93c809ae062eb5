use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::{validate_key, StateStore};

/// Maps store keys to files under a state root: `<root>/<key>.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create state root: {}", self.root.display()))
    }
}

/// One pretty-printed JSON document per key.
#[derive(Debug)]
pub struct JsonFileStore {
    layout: StateLayout,
}

impl JsonFileStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = StateLayout::new(root);
        layout.ensure_root()?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StateLayout {
        &self.layout
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        let path = self.layout.key_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read state file: {}", path.display()));
            }
        };

        let value = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse state file: {}", path.display()))?;
        Ok(Some(value))
    }

    fn set(&mut self, key: &str, value: Value) -> Result<()> {
        validate_key(key)?;
        self.layout.ensure_root()?;
        let path = self.layout.key_path(key);
        let content = serde_json::to_string_pretty(&value)
            .with_context(|| format!("failed to serialize state for '{key}'"))?;
        fs::write(&path, content)
            .with_context(|| format!("failed to write state file: {}", path.display()))
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.layout.key_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => {
                Err(err).with_context(|| format!("failed to remove state file: {}", path.display()))
            }
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        let root = self.layout.root();
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(root)
            .with_context(|| format!("failed to read state root: {}", root.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if validate_key(stem).is_ok() {
                keys.push(stem.to_string());
            }
        }

        keys.sort();
        Ok(keys)
    }
}
