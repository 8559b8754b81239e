//! Definition loader and operator reference resolver.
//!
//! Reads operator definitions from the filesystem or the builtin
//! registry, applies instance-site generic bindings, verifies saturation
//! and detects recursive imports along the chain of files being read.
//!
//! Operator names are dotted: names registered as builtins resolve
//! through the registry; names beginning with `.` resolve relative to the
//! importing file; all other names are searched in the configured base
//! directories, `["."]` by default.

use crate::registry::BuiltinRegistry;
use slang_core::{InstanceDef, OperatorDef, PortDef, Result, SlangError};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension search order for definition files.
const FILE_ENDINGS: [&str; 2] = ["yaml", "json"];

/// Loads and resolves operator definitions.
pub struct Resolver {
    registry: Arc<BuiltinRegistry>,
    search_paths: Vec<PathBuf>,
}

impl Resolver {
    /// Create a resolver searching the current working directory.
    pub fn new(registry: Arc<BuiltinRegistry>) -> Self {
        Self {
            registry,
            search_paths: vec![PathBuf::from(".")],
        }
    }

    /// Replace the list of base directories searched for non-relative
    /// operator names.
    pub fn with_search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    /// Load the definition at `path`, trying `.yaml` then `.json` if the
    /// path carries no extension.
    pub fn load(&self, path: &Path) -> Result<OperatorDef> {
        let file = find_definition_file(path)?;
        let mut seen = Vec::new();
        self.read_operator_def(&file, &BTreeMap::new(), &mut seen)
    }

    /// Read one definition file, specialize it with the caller's generics
    /// and resolve all child instances.
    ///
    /// `seen` is the chain of files currently being read; revisiting one
    /// of them is a recursive import.
    pub fn read_operator_def(
        &self,
        path: &Path,
        generics: &BTreeMap<String, PortDef>,
        seen: &mut Vec<PathBuf>,
    ) -> Result<OperatorDef> {
        for bound in generics.values() {
            bound.generics_specified()?;
        }

        let text = fs::read_to_string(path).map_err(|source| SlangError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let absolute = path.canonicalize().map_err(|source| SlangError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if seen.contains(&absolute) {
            return Err(SlangError::Recursion(absolute));
        }

        tracing::debug!(path = %absolute.display(), "reading operator definition");

        // the chain only covers the files currently being read; siblings
        // may import the same definition independently
        seen.push(absolute);
        let result = self.parse_and_resolve(path, &text, generics, seen);
        seen.pop();
        result
    }

    fn parse_and_resolve(
        &self,
        path: &Path,
        text: &str,
        generics: &BTreeMap<String, PortDef>,
        seen: &mut Vec<PathBuf>,
    ) -> Result<OperatorDef> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let def = match extension {
            "yaml" | "yml" => OperatorDef::from_yaml(text)?,
            "json" => OperatorDef::from_json(text)?,
            _ => return Err(SlangError::UnsupportedFormat(path.to_path_buf())),
        };

        def.validate()?;

        let mut def = def.specialize(generics);
        def.generics_specified()?;

        let current_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        for instance in &mut def.operators {
            let child_def = self.resolve_instance(instance, &current_dir, seen)?;
            child_def.generics_specified()?;
            instance.set_operator_def(child_def);
        }

        Ok(def)
    }

    /// Resolve one instance's operator reference to a definition.
    fn resolve_instance(
        &self,
        instance: &InstanceDef,
        current_dir: &Path,
        seen: &mut Vec<PathBuf>,
    ) -> Result<OperatorDef> {
        if self.registry.is_registered(&instance.operator) {
            return self.registry.template_for(instance);
        }

        if let Some(relative) = instance.operator.strip_prefix('.') {
            let base = current_dir.join(relative.replace('.', "/"));
            let file = find_definition_file(&base)
                .map_err(|_| SlangError::NotFound(instance.operator.clone()))?;
            return self.read_operator_def(&file, &instance.generics, seen);
        }

        for search_path in &self.search_paths {
            let base = search_path.join(instance.operator.replace('.', "/"));
            if let Ok(file) = find_definition_file(&base) {
                return self.read_operator_def(&file, &instance.generics, seen);
            }
        }

        Err(SlangError::NotFound(instance.operator.clone()))
    }
}

/// Pick the first existing file, trying the path as given and then each
/// extension in fixed order.
fn find_definition_file(base: &Path) -> Result<PathBuf> {
    if base.is_file() {
        return Ok(base.to_path_buf());
    }
    for ending in FILE_ENDINGS {
        let candidate = base.with_extension(ending);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(SlangError::NotFound(base.display().to_string()))
}
