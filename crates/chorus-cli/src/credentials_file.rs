//! Reading credential lists from a file or stdin.

use std::collections::HashSet;
use std::path::Path;

use chorus_common::ChorusError;
use chorus_gateway::{GatewayError, SessionOrchestrator};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// Counts from loading a credential list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub invalid: usize,
    pub duplicate: usize,
}

/// Whether `path` means stdin.
pub fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read the whole credential source. `-` reads stdin to the end.
pub async fn read_source(path: &Path) -> Result<String, ChorusError> {
    if is_stdin(path) {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        return Ok(text);
    }
    tokio::fs::read_to_string(path).await.map_err(|e| {
        ChorusError::Other(format!("cannot read credentials from {}: {e}", path.display()))
    })
}

/// Non-blank lines that are not `#` comments, trimmed.
pub fn candidate_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Register every candidate line with the orchestrator.
pub async fn import(orchestrator: &SessionOrchestrator, text: &str) -> ImportReport {
    let mut report = ImportReport::default();
    for (index, line) in candidate_lines(text).enumerate() {
        match orchestrator.add_credential(line).await {
            Ok(credential) => {
                debug!(line = index + 1, credential = %credential, "Credential loaded");
                report.added += 1;
            }
            Err(GatewayError::Duplicate) => report.duplicate += 1,
            Err(e) => {
                warn!(line = index + 1, error = %e, "Skipping credential");
                report.invalid += 1;
            }
        }
    }
    report
}

/// Validate a credential list without touching the network.
pub fn check(text: &str) -> ImportReport {
    let mut seen = HashSet::new();
    let mut report = ImportReport::default();
    for line in candidate_lines(text) {
        if !chorus_gateway::validate(line) {
            report.invalid += 1;
        } else if seen.insert(line) {
            report.added += 1;
        } else {
            report.duplicate += 1;
        }
    }
    report
}
