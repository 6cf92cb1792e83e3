//! @acp:module "Constraint Writer"
//! @acp:summary "Rewrite the allow-list in place, leaving everything else untouched"
//! @acp:domain cli
//! @acp:layer service
//!
//! The rewrite is deterministic: the list is rendered in ascending version
//! order, so feeding the output back in with the same set returns the same
//! bytes.

use tracing::{debug, warn};

use crate::config::ModuleConfig;
use crate::error::{GateError, Result};
use crate::registry::{locate_gate, ArtifactSnapshot, ConstraintRecord};
use crate::version::SupportedVersionSet;

/// @acp:summary "How the validation block is rewritten"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterOptions {
    pub variable: String,
    pub rewrite_message: bool,
    /// `{versions}` is replaced by the comma-separated list
    pub message_template: String,
}

impl WriterOptions {
    pub fn from_config(config: &ModuleConfig) -> Self {
        Self {
            variable: config.variable_name.clone(),
            rewrite_message: config.rewrite_error_message,
            message_template: config.error_message_template.clone(),
        }
    }
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self::from_config(&ModuleConfig::default())
    }
}

/// @acp:summary "Produce the patched artifact content"
///
/// Fails with `MalformedTarget` when the validation block cannot be located
/// or when the file does not survive an HCL parse before and after patching.
pub fn write_constraint(
    target: &ArtifactSnapshot,
    latest: &SupportedVersionSet,
    options: &WriterOptions,
) -> Result<String> {
    let before = count_structures(target)?;
    let location = locate_gate(&target.content, &options.variable, &target.path)?;

    let mut edits = vec![(location.list.clone(), render_list(latest))];
    match location.message {
        Some(span) if options.rewrite_message => {
            edits.push((span, quote(&render_message(&options.message_template, latest))));
        }
        None if options.rewrite_message => {
            warn!(
                path = %target.path.display(),
                "No string error_message found in the validation block; leaving it as is"
            );
        }
        _ => {}
    }

    // Apply back to front so earlier offsets stay valid.
    edits.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut content = target.content.clone();
    for (span, replacement) in edits {
        content.replace_range(span, &replacement);
    }

    let patched = ArtifactSnapshot {
        path: target.path.clone(),
        content,
        revision: target.revision.clone(),
    };
    let after = count_structures(&patched)?;
    if before != after {
        return Err(GateError::malformed(
            &target.path,
            format!("rewrite changed the number of top-level blocks ({} -> {})", before, after),
        ));
    }

    let reread = ConstraintRecord::from_snapshot(&patched, &options.variable)?;
    if &reread.versions != latest.as_set() {
        return Err(GateError::malformed(
            &target.path,
            "patched allow-list does not read back as the supported set",
        ));
    }

    debug!(path = %target.path.display(), versions = %latest.joined(), "Rendered constraint");
    Ok(patched.content)
}

/// `"1.32", "1.33", "1.34"`
pub fn render_list(latest: &SupportedVersionSet) -> String {
    latest
        .iter()
        .map(|v| format!("\"{}\"", v))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn render_message(template: &str, latest: &SupportedVersionSet) -> String {
    template.replace("{versions}", &latest.joined())
}

/// Quote as an HCL string literal
fn quote(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

fn count_structures(artifact: &ArtifactSnapshot) -> Result<usize> {
    let body = hcl::parse(&artifact.content)
        .map_err(|e| GateError::malformed(&artifact.path, format!("not valid HCL: {}", e)))?;
    Ok(body.into_inner().len())
}
