//! App workspace on the local filesystem.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::{MANIFEST_FILE, Manifest};

const CONTAINER_PREFIX: &str = "appdev-";
const RECORD_PREFIX: &str = ".appdev-";

#[derive(Debug, Clone)]
pub struct Workspace {
    path: PathBuf,
    name: String,
    image_name: Option<String>,
    manifest: Option<Manifest>,
}

impl Workspace {
    /// Open a workspace that must exist and contain a readable manifest.
    pub fn open(path: &Path) -> Result<Self> {
        let mut workspace = Self::open_unchecked(path)?;
        if !workspace.path.is_dir() {
            return Err(Error::Workspace(format!(
                "Directory {} does not exist",
                workspace.path.display()
            )));
        }
        let manifest_path = workspace.path.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(Error::Workspace(format!(
                "Workspace {} does not contain a manifest.json file",
                workspace.name
            )));
        }
        workspace.image_name = Some(image_name(&workspace.name)?);
        workspace.manifest = Some(Manifest::load(&manifest_path)?);
        Ok(workspace)
    }

    /// Resolve the workspace path and name without checking content.
    pub fn open_unchecked(path: &Path) -> Result<Self> {
        let path = std::path::absolute(path)
            .map_err(|e| Error::io(format!("Unable to resolve {}", path.display()), e))?;
        let path = path.canonicalize().unwrap_or(path);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let image_name = image_name(&name).ok();
        Ok(Self {
            path,
            name,
            image_name,
            manifest: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn manifest(&self) -> Result<&Manifest> {
        self.manifest.as_ref().ok_or_else(|| {
            Error::Workspace(format!(
                "Workspace {} does not contain a manifest.json file",
                self.name
            ))
        })
    }

    pub fn image_name(&self) -> Result<&str> {
        self.image_name.as_deref().ok_or_else(|| {
            Error::Workspace(format!(
                "Unable to generate a valid image name from workspace {}",
                self.name
            ))
        })
    }

    pub fn container_name(&self) -> Result<String> {
        Ok(format!("{CONTAINER_PREFIX}{}", self.image_name()?))
    }

    /// Where the registration record for `host` is kept.
    pub fn record_path(&self, host: &str) -> PathBuf {
        self.path.join(format!("{RECORD_PREFIX}{host}"))
    }
}

/// Lowercased directory name, stripped to `[a-z0-9]` when not already valid.
pub fn image_name(workspace_name: &str) -> Result<String> {
    let lowercase = workspace_name.to_lowercase();
    if is_valid_image_name(&lowercase) {
        return Ok(lowercase);
    }
    let stripped: String = lowercase
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect();
    if stripped.is_empty() {
        return Err(Error::Workspace(format!(
            "Unable to generate a valid image name from workspace {workspace_name}"
        )));
    }
    Ok(stripped)
}

/// Alphanumeric runs joined by `.`, `_`, `__` or any number of `-`.
pub fn is_valid_image_name(name: &str) -> bool {
    let alnum = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let mut chars = name.chars().peekable();
    let mut seen_component = false;

    while chars.peek().is_some() {
        let mut component = 0;
        while chars.peek().copied().is_some_and(alnum) {
            chars.next();
            component += 1;
        }
        if component == 0 {
            return false;
        }
        seen_component = true;

        let mut separator = String::new();
        while let Some(&c) = chars.peek() {
            if alnum(c) {
                break;
            }
            separator.push(c);
            chars.next();
        }
        if separator.is_empty() {
            continue;
        }
        let valid = separator == "."
            || separator == "_"
            || separator == "__"
            || separator.chars().all(|c| c == '-');
        if !valid || chars.peek().is_none() {
            return false;
        }
    }
    seen_component
}
