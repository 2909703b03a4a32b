use std::collections::BTreeMap;

use pl_core::RenderError;

/// Injected file-loading collaborator. `reference` is a normalized,
/// root-relative slash path. Implementations must be re-entrant: one loader
/// may serve many concurrent renders.
pub trait TemplateLoader: Send + Sync {
    fn load(&self, reference: &str) -> Result<String, RenderError>;
}

/// In-memory loader over a fixed map of sources.
#[derive(Debug, Default)]
pub struct MapLoader {
    sources: BTreeMap<String, String>,
}

impl MapLoader {
    pub fn new(sources: BTreeMap<String, String>) -> Self {
        Self { sources }
    }

    pub fn from_entries(entries: &[(&str, &str)]) -> Self {
        Self::new(
            entries
                .iter()
                .map(|(reference, source)| ((*reference).to_string(), (*source).to_string()))
                .collect(),
        )
    }
}

impl TemplateLoader for MapLoader {
    fn load(&self, reference: &str) -> Result<String, RenderError> {
        self.sources.get(reference).cloned().ok_or_else(|| {
            RenderError::new(
                "TEMPLATE_NOT_FOUND",
                format!("Template \"{}\" was not found.", reference),
            )
        })
    }
}

/// Resolves an include reference against the directory of the including
/// document and normalizes it to a root-relative slash path. A reference
/// that walks above the template root is rejected rather than clamped.
pub fn resolve_reference(current_dir: &str, reference: &str) -> Result<String, RenderError> {
    let joined = if let Some(rooted) = reference.strip_prefix('/') {
        rooted.to_string()
    } else if current_dir.is_empty() {
        reference.to_string()
    } else {
        format!("{}/{}", current_dir, reference)
    };

    let normalized_input = joined.replace('\\', "/");
    let mut stack: Vec<&str> = Vec::new();
    for part in normalized_input.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if stack.pop().is_none() {
                    return Err(RenderError::new(
                        "INCLUDE_ESCAPES_ROOT",
                        format!("Reference \"{}\" escapes the template root.", reference),
                    ));
                }
            }
            segment => stack.push(segment),
        }
    }

    Ok(stack.join("/"))
}

pub fn parent_dir(reference: &str) -> String {
    match reference.rsplit_once('/') {
        Some((dir, _)) => dir.to_string(),
        None => String::new(),
    }
}
