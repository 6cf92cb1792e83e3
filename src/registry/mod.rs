//! @acp:module "Version Registry"
//! @acp:summary "Locate and read the committed cluster_version allow-list"
//! @acp:domain cli
//! @acp:layer service
//!
//! The allow-list lives in a Terraform variables file:
//!
//! ```hcl
//! variable "cluster_version" {
//!   type = string
//!
//!   validation {
//!     condition     = contains(["1.32", "1.33"], var.cluster_version)
//!     error_message = "The cluster_version must be one of: 1.32, 1.33."
//!   }
//! }
//! ```
//!
//! [`locate_gate`] finds the byte spans of the list contents and of the
//! error message literal so the writer can splice them without touching
//! anything else in the file.

use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::error::{GateError, Result};
use crate::version::{join_versions, VersionToken};

/// @acp:summary "Artifact content plus the revision it was read at"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSnapshot {
    /// Path as configured (relative to the repository root for git)
    pub path: PathBuf,
    pub content: String,
    /// Commit id, or content digest for working-tree reads
    pub revision: String,
}

impl ArtifactSnapshot {
    /// @acp:summary "Read the artifact straight from disk"
    pub fn read_workdir(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(GateError::WriteTargetMissing {
                path: path.to_path_buf(),
            });
        }
        let bytes = std::fs::read(path)?;
        let revision = content_digest(&bytes);
        let content = String::from_utf8(bytes)
            .map_err(|_| GateError::malformed(path, "file is not valid UTF-8"))?;
        Ok(Self {
            path: path.to_path_buf(),
            content,
            revision,
        })
    }
}

/// @acp:summary "sha256 fingerprint used as a working-tree revision"
pub fn content_digest(bytes: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(bytes))
}

/// @acp:summary "Byte spans of the editable parts of the validation gate"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateLocation {
    /// Everything between `[` and `]` of the `contains([...], ...)` call
    pub list: Range<usize>,
    /// The quoted `error_message` literal, quotes included
    pub message: Option<Range<usize>>,
}

/// @acp:summary "The allow-list currently enforced by the module"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintRecord {
    pub versions: BTreeSet<VersionToken>,
    /// Decoded error message, when it is a plain string literal
    pub error_message: Option<String>,
}

impl ConstraintRecord {
    /// @acp:summary "Parse the record out of a variables file"
    pub fn parse(content: &str, variable: &str, path: &Path) -> Result<Self> {
        let location = locate_gate(content, variable, path)?;
        let versions = parse_list(&content[location.list.clone()], path)?;
        let error_message = location
            .message
            .map(|span| unescape_literal(&content[span.start + 1..span.end - 1]));
        Ok(Self {
            versions,
            error_message,
        })
    }

    pub fn from_snapshot(snapshot: &ArtifactSnapshot, variable: &str) -> Result<Self> {
        Self::parse(&snapshot.content, variable, &snapshot.path)
    }

    pub fn contains(&self, version: &VersionToken) -> bool {
        self.versions.contains(version)
    }

    pub fn joined(&self) -> String {
        join_versions(self.versions.iter())
    }
}

/// @acp:summary "Find the allow-list and error message of a variable's validation"
///
/// Matching runs on [`mask_inert`] output, so text inside comments, heredocs
/// and string literals never counts. The list must be the `contains` call of
/// a `condition` attribute, and there must be exactly one such call.
pub fn locate_gate(content: &str, variable: &str, path: &Path) -> Result<GateLocation> {
    let masked = mask_inert(content);
    let name = regex::escape(variable);

    let variable_re = Regex::new(&format!(r#"(?m)^[ \t]*variable[ \t]+"{}"[ \t]*\{{"#, name))
        .map_err(|e| GateError::malformed(path, e.to_string()))?;

    // The variable name is a string literal, so look for it in the original
    // text but only accept headers whose keyword survives masking.
    let headers: Vec<_> = variable_re
        .find_iter(content)
        .filter(|m| masked[m.range()].trim_start().starts_with("variable"))
        .collect();
    let header = match headers.as_slice() {
        [only] => only,
        [] => {
            return Err(GateError::malformed(
                path,
                format!("variable \"{}\" not found", variable),
            ))
        }
        _ => {
            return Err(GateError::malformed(
                path,
                format!("variable \"{}\" is declared more than once", variable),
            ))
        }
    };

    let open = header.end() - 1;
    let close = find_block_end(content, open).ok_or_else(|| {
        GateError::malformed(path, format!("unbalanced braces in variable \"{}\"", variable))
    })?;

    let validation_re = Regex::new(r"(?m)^[ \t]*validation[ \t]*\{")
        .map_err(|e| GateError::malformed(path, e.to_string()))?;
    let contains_re = Regex::new(&format!(
        r"contains\(\s*\[([^\]]*)\]\s*,\s*var\.{}\s*\)",
        name
    ))
    .map_err(|e| GateError::malformed(path, e.to_string()))?;
    let condition_re = Regex::new(r"(?m)^[ \t]*condition[ \t]*=")
        .map_err(|e| GateError::malformed(path, e.to_string()))?;
    let attribute_re = Regex::new(r"(?m)^[ \t]*[A-Za-z_][A-Za-z0-9_-]*[ \t]*=")
        .map_err(|e| GateError::malformed(path, e.to_string()))?;
    let message_re = Regex::new(r"(?m)^[ \t]*error_message[ \t]*=[ \t]*")
        .map_err(|e| GateError::malformed(path, e.to_string()))?;

    let mut found: Vec<GateLocation> = Vec::new();
    let body = &masked[..close];
    let mut cursor = open + 1;
    while let Some(m) = validation_re.find_at(body, cursor) {
        let v_open = m.end() - 1;
        let v_close = find_block_end(content, v_open)
            .filter(|end| *end < close)
            .ok_or_else(|| GateError::malformed(path, "unbalanced braces in validation block"))?;
        cursor = v_close + 1;

        let block = &masked[..v_close];
        let calls: Vec<_> = contains_re
            .captures_iter(&block[v_open..])
            .filter_map(|c| c.get(1).map(|list| (c.get(0).map_or(0, |all| all.start()), list.range())))
            .map(|(start, list)| (v_open + start, v_open + list.start..v_open + list.end))
            .collect();
        let (call_start, list) = match calls.as_slice() {
            [] => continue,
            [only] => only.clone(),
            _ => {
                return Err(GateError::malformed(
                    path,
                    format!("validation block has more than one contains([...], var.{})", variable),
                ))
            }
        };

        // The call must sit in the `condition` expression: the last attribute
        // started before it has to be `condition`.
        let owner = attribute_re
            .find_iter(&block[v_open..call_start])
            .last()
            .map(|a| v_open + a.start());
        let in_condition = match owner {
            Some(at) => condition_re
                .find_at(block, at)
                .is_some_and(|c| c.start() == at),
            None => false,
        };
        if !in_condition {
            return Err(GateError::malformed(
                path,
                format!("contains([...], var.{}) is not part of the condition", variable),
            ));
        }

        let message = message_re
            .find_at(block, v_open)
            .and_then(|m| string_literal_at(content, m.end()));

        found.push(GateLocation { list, message });
    }

    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(GateError::malformed(
            path,
            format!(
                "no validation block with contains([...], var.{}) found",
                variable
            ),
        )),
        _ => Err(GateError::malformed(
            path,
            format!("more than one contains([...]) validation for var.{}", variable),
        )),
    }
}

/// @acp:summary "Blank out comments, heredocs and string contents"
///
/// The result has the same byte offsets as `content`. Comments and heredocs
/// become spaces, string contents become `x` (quotes kept), newlines are
/// preserved and any remaining non-ASCII byte becomes `_`, so the output is
/// always ASCII.
pub(crate) fn mask_inert(content: &str) -> String {
    let bytes = content.as_bytes();
    let mut out: Vec<u8> = bytes
        .iter()
        .map(|b| if b.is_ascii() { *b } else { b'_' })
        .collect();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let start = i + 1;
                i = start;
                while i < bytes.len() && bytes[i] != b'"' && bytes[i] != b'\n' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                let end = i.min(bytes.len());
                blank(&mut out, start..end, b'x');
                i = end + 1;
            }
            b'#' => {
                let end = skip_line(bytes, i);
                blank(&mut out, i..end, b' ');
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                let end = skip_line(bytes, i);
                blank(&mut out, i..end, b' ');
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let mut end = i + 2;
                while end + 1 < bytes.len() && !(bytes[end] == b'*' && bytes[end + 1] == b'/') {
                    end += 1;
                }
                let end = (end + 2).min(bytes.len());
                blank(&mut out, i..end, b' ');
                i = end;
            }
            b'<' if bytes.get(i + 1) == Some(&b'<') => {
                let end = skip_heredoc(content, i).min(bytes.len());
                if end > i + 2 {
                    blank(&mut out, i..end, b' ');
                }
                i = end.max(i + 2);
            }
            _ => i += 1,
        }
    }

    // Every byte is ASCII at this point.
    out.into_iter().map(char::from).collect()
}

fn blank(out: &mut [u8], range: Range<usize>, fill: u8) {
    for b in &mut out[range] {
        if *b != b'\n' {
            *b = fill;
        }
    }
}

/// Parse `"1.32", "1.33"` into tokens. Every element must be a plain string
/// literal holding a valid version.
fn parse_list(raw: &str, path: &Path) -> Result<BTreeSet<VersionToken>> {
    let mut versions = BTreeSet::new();
    for item in raw.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let inner = item
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .filter(|inner| !inner.contains('"') && !inner.contains('\\'))
            .filter(|inner| inner.trim() == *inner)
            .ok_or_else(|| {
                GateError::malformed(path, format!("list element {} is not a string literal", item))
            })?;
        let token = VersionToken::parse(inner).map_err(|e| GateError::malformed(path, e))?;
        versions.insert(token);
    }
    Ok(versions)
}

/// Span of a one-line `"..."` literal starting at `start`
fn string_literal_at(content: &str, start: usize) -> Option<Range<usize>> {
    let bytes = content.as_bytes();
    if bytes.get(start) != Some(&b'"') {
        return None;
    }
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(start..i + 1),
            b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

fn unescape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out.replace("$${", "${").replace("%%{", "%{")
}

/// @acp:summary "Index of the `}` closing the block opened at `open`"
///
/// Skips braces inside string literals, comments and heredocs.
pub(crate) fn find_block_end(content: &str, open: usize) -> Option<usize> {
    let bytes = content.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
                i += 1;
            }
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i += 1;
            }
            b'#' => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'/') => i = skip_line(bytes, i),
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i + 1 < bytes.len() && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                    i += 1;
                }
                i += 2;
            }
            b'<' if bytes.get(i + 1) == Some(&b'<') => i = skip_heredoc(content, i),
            _ => i += 1,
        }
    }
    None
}

fn skip_line(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

/// `<<EOT` / `<<-EOT` up to the line holding only the marker
fn skip_heredoc(content: &str, start: usize) -> usize {
    let rest = &content[start + 2..];
    let rest = rest.strip_prefix('-').unwrap_or(rest);
    let marker: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if marker.is_empty() {
        return start + 2;
    }

    let Some(first_newline) = content[start..].find('\n') else {
        return content.len();
    };
    let mut offset = start + first_newline + 1;
    for line in content[offset..].split_inclusive('\n') {
        offset += line.len();
        if line.trim() == marker {
            return offset;
        }
    }
    content.len()
}
