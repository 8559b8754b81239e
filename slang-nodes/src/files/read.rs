//! File reader (`slang.files.read`).

use slang_core::{OperatorDef, PortDef, SlangError, Value};
use slang_executor::{Builtin, BuiltinFuture, Operator};
use std::path::PathBuf;
use std::sync::Arc;

/// Reads a file per pulled path and emits its content.
///
/// A failed read terminates the worker and unwinds downstream edges.
///
/// # Ports
/// - in: `string` (path)
/// - out: `binary` (content)
pub struct FileReadOp {
    template: OperatorDef,
}

impl FileReadOp {
    /// Create the builtin with its shared template.
    pub fn new() -> Self {
        Self {
            template: OperatorDef::new(PortDef::String, PortDef::Binary),
        }
    }
}

impl Default for FileReadOp {
    fn default() -> Self {
        Self::new()
    }
}

impl Builtin for FileReadOp {
    fn name(&self) -> &str {
        "slang.files.read"
    }

    fn template(&self) -> &OperatorDef {
        &self.template
    }

    fn run(&self, operator: Arc<Operator>) -> BuiltinFuture {
        Box::pin(async move {
            loop {
                let path = operator.main_in().pull().await?;
                let Some(path) = path.as_str() else {
                    return Err(SlangError::Worker {
                        operator: operator.name().to_string(),
                        cause: "path must be a string".to_string(),
                    });
                };
                let content =
                    tokio::fs::read(path)
                        .await
                        .map_err(|source| SlangError::Io {
                            path: PathBuf::from(path),
                            source,
                        })?;
                tracing::debug!(operator = %operator.name(), path, bytes = content.len(), "file read");
                operator.main_out().push(Value::binary(content)).await?;
            }
        })
    }
}
