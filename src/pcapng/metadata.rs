//! Capture target metadata embedded into the SHB comment.
//!
//! The metadata is a YAML document introduced by [`TARGET_MARKER`]. It runs
//! either until the next YAML document marker line (`---`) or until the end
//! of the comment. Any other comment text is left alone.

use std::sync::OnceLock;

use log::error;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::targets::Target;

/// Start of the capture target YAML document inside a comment.
pub const TARGET_MARKER: &str = "---\n# capture target information\n";

/// Capture target information as written into the SHB comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetInfo {
    #[serde(default)]
    pub container_name: String,
    #[serde(default)]
    pub container_type: String,
    #[serde(default)]
    pub node_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterInfo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub capture_filter: String,
    #[serde(
        rename = "no-promiscuous-mode",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub no_prom: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,
}

impl TargetInfo {
    pub fn new(target: &Target, capture_filter: &str, no_prom: bool) -> Self {
        Self {
            container_name: target.name.clone(),
            container_type: target.target_type.clone(),
            node_name: target.node_name.clone(),
            // cluster members keep their (possibly empty) cluster entry
            cluster: target
                .cluster
                .as_ref()
                .map(|c| ClusterInfo { uid: c.uid.clone() }),
            capture_filter: capture_filter.to_string(),
            no_prom,
        }
    }
}

fn marker_start() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("(^|\n){}", regex::escape(TARGET_MARKER))).ok())
        .as_ref()
}

fn marker_end() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new("\n---($|\n)").ok()).as_ref()
}

/// Removes the first capture target YAML document from a comment.
///
/// Text before the document is kept as is, whatever its encoding; if another
/// YAML document follows, it is kept too, starting with its `---` marker
/// line.
pub fn strip_target_info(comment: &[u8]) -> Vec<u8> {
    let Some(start) = marker_start().and_then(|re| re.find(comment)) else {
        return comment.to_vec();
    };
    let mut cut = start.start();
    if comment[cut] == b'\n' {
        cut += 1;
    }
    let rest = &comment[start.end()..];
    let mut stripped = comment[..cut].to_vec();
    // skip the newline ending the target document, keep the next one
    if let Some(end) = marker_end().and_then(|re| re.find(rest)) {
        stripped.extend_from_slice(&rest[end.start() + 1..]);
    }
    stripped
}

/// Builds the new comment: the existing comment without any previous capture
/// target document, followed by a fresh one for `info`.
pub fn annotate(existing: Option<&[u8]>, info: &TargetInfo) -> Vec<u8> {
    let mut comment = existing.map(strip_target_info).unwrap_or_default();
    if !comment.is_empty() && !comment.ends_with(b"\n") {
        comment.push(b'\n');
    }
    comment.extend_from_slice(TARGET_MARKER.as_bytes());
    match serde_yaml::to_string(info) {
        Ok(yaml) => comment.extend_from_slice(yaml.as_bytes()),
        Err(e) => error!("cannot create capture target YAML meta data: {}", e),
    }
    comment
}

/// Extracts the capture target YAML document from a comment, if any.
pub fn parse_target_info(comment: &[u8]) -> Option<TargetInfo> {
    let start = marker_start()?.find(comment)?;
    let rest = &comment[start.end()..];
    let doc = match marker_end().and_then(|re| re.find(rest)) {
        Some(end) => &rest[..end.start() + 1],
        None => rest,
    };
    serde_yaml::from_slice(doc).ok()
}
