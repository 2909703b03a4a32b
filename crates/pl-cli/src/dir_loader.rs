use std::fs;
use std::path::{Path, PathBuf};

use pl_core::RenderError;
use pl_engine::{resolve_reference, TemplateLoader};
use walkdir::WalkDir;

/// Filesystem loader rooted at the templates directory. References are
/// normalized before hitting the filesystem, so `..` tricks are rejected
/// instead of reaching outside the root.
pub(crate) struct DirLoader {
    root: PathBuf,
}

impl DirLoader {
    pub(crate) fn new(templates_dir: &str) -> Result<Self, RenderError> {
        Ok(Self {
            root: resolve_templates_dir(templates_dir)?,
        })
    }

    pub(crate) fn root(&self) -> &Path {
        &self.root
    }
}

impl TemplateLoader for DirLoader {
    fn load(&self, reference: &str) -> Result<String, RenderError> {
        let resolved = resolve_reference("", reference)?;
        let path = self.root.join(&resolved);
        if !path.is_file() {
            return Err(RenderError::new(
                "TEMPLATE_NOT_FOUND",
                format!("Template \"{}\" was not found.", reference),
            ));
        }
        fs::read_to_string(&path).map_err(|error| {
            RenderError::new(
                "CLI_TEMPLATE_READ",
                format!("Failed to read \"{}\": {}", path.display(), error),
            )
        })
    }
}

pub(crate) fn resolve_templates_dir(templates_dir: &str) -> Result<PathBuf, RenderError> {
    let path = PathBuf::from(templates_dir);
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(|error| {
                RenderError::new(
                    "CLI_TEMPLATES_DIR_INVALID",
                    format!("Failed to resolve working directory: {}", error),
                )
            })?
            .join(path)
    };

    if !absolute.exists() {
        return Err(RenderError::new(
            "CLI_TEMPLATES_DIR_NOT_FOUND",
            format!("templates-dir does not exist: {}", absolute.display()),
        ));
    }
    if !absolute.is_dir() {
        return Err(RenderError::new(
            "CLI_TEMPLATES_DIR_NOT_DIR",
            format!("templates-dir is not a directory: {}", absolute.display()),
        ));
    }

    Ok(absolute)
}

/// Root-relative slash paths of every `.prompt` file under the root, in
/// stable sorted order.
pub(crate) fn list_templates(root: &Path) -> Result<Vec<String>, RenderError> {
    let mut references = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !path.to_string_lossy().ends_with(".prompt") {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|error| {
                RenderError::new(
                    "CLI_TEMPLATES_SCAN",
                    format!("Failed to scan templates dir: {}", error),
                )
            })?
            .to_string_lossy()
            .replace('\\', "/");
        references.push(relative);
    }

    references.sort();
    Ok(references)
}
