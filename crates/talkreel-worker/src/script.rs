//! Dialogue script loading.

use std::path::Path;

use tracing::info;

use talkreel_models::DialogueScript;

use crate::error::{PipelineError, PipelineResult};

/// Read and parse a `Speaker: text` script file.
pub async fn load_script(path: impl AsRef<Path>) -> PipelineResult<DialogueScript> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::path_io(path, e))?;
    let script = DialogueScript::parse(&text)?;

    info!(
        path = %path.display(),
        turns = script.len(),
        title = ?script.title,
        atmosphere = ?script.atmosphere,
        "Loaded dialogue script"
    );
    Ok(script)
}
