//! Filtering and rendering of capture target lists.

use std::cmp::Ordering;
use std::fmt::Write;

use clap::ValueEnum;

use crate::targets::types::{BINDMOUNT_TYPE, POD_TYPE, PROC_TYPE};
use crate::targets::Target;

/// Space between table columns.
const COLUMN_PADDING: usize = 3;

/// Coarse kinds of capture targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TargetKind {
    #[value(alias = "pods")]
    Pod,
    /// Any container, whatever its engine.
    #[value(alias = "containers")]
    Container,
    /// Process and process-less network stacks.
    #[value(alias = "networks")]
    Network,
}

impl TargetKind {
    pub fn of(target: &Target) -> Self {
        match target.target_type.as_str() {
            POD_TYPE => TargetKind::Pod,
            BINDMOUNT_TYPE | PROC_TYPE => TargetKind::Network,
            _ => TargetKind::Container,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table with additional columns
    Wide,
    Json,
    /// Target names only
    Name,
}

/// Keeps the targets of the requested kinds (all when none are requested),
/// sorted by name and then node.
pub fn filter_targets(targets: Vec<Target>, kinds: &[TargetKind]) -> Vec<Target> {
    let mut shown: Vec<Target> = targets
        .into_iter()
        .filter(|t| kinds.is_empty() || kinds.contains(&TargetKind::of(t)))
        .collect();
    shown.sort_by(|a, b| match a.name.cmp(&b.name) {
        Ordering::Equal => a.node_name.cmp(&b.node_name),
        other => other,
    });
    shown
}

/// Table columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Pod,
    Target,
    Type,
    Node,
    Service,
}

impl Column {
    fn header(self) -> &'static str {
        match self {
            Column::Pod => "POD",
            Column::Target => "TARGET",
            Column::Type => "TYPE",
            Column::Node => "NODE",
            Column::Service => "SERVICE",
        }
    }

    fn value(self, t: &Target) -> &str {
        match self {
            Column::Pod | Column::Target => &t.name,
            Column::Type => &t.target_type,
            Column::Node => &t.node_name,
            Column::Service => &t.capture_service,
        }
    }
}

/// Renders a target list; plain tables for pods alone get pod columns.
pub fn render(
    targets: &[Target],
    kinds: &[TargetKind],
    format: Option<OutputFormat>,
    no_headers: bool,
) -> Result<String, serde_json::Error> {
    let wide = format == Some(OutputFormat::Wide);
    let only_pods = !kinds.is_empty() && kinds.iter().all(|k| *k == TargetKind::Pod);
    let mut columns = match format {
        Some(OutputFormat::Json) => {
            let mut json = serde_json::to_string_pretty(targets)?;
            json.push('\n');
            return Ok(json);
        }
        Some(OutputFormat::Name) => {
            return Ok(targets.iter().map(|t| format!("{}\n", t.name)).collect());
        }
        _ if only_pods => vec![Column::Pod],
        _ => vec![Column::Target, Column::Type, Column::Node],
    };
    if wide {
        columns.push(if only_pods { Column::Node } else { Column::Service });
    }
    Ok(table(targets, &columns, no_headers))
}

fn table(targets: &[Target], columns: &[Column], no_headers: bool) -> String {
    let widths: Vec<usize> = columns
        .iter()
        .map(|c| {
            let header = if no_headers { 0 } else { c.header().len() };
            targets
                .iter()
                .map(|t| c.value(t).chars().count())
                .fold(header, usize::max)
        })
        .collect();

    let mut rows: Vec<Vec<&str>> = Vec::new();
    if !no_headers {
        rows.push(columns.iter().map(|c| c.header()).collect());
    }
    for t in targets {
        rows.push(columns.iter().map(|c| c.value(t)).collect());
    }

    let mut out = String::new();
    for row in rows {
        let mut line = String::new();
        for (i, cell) in row.iter().enumerate() {
            let _ = write!(line, "{:<width$}", cell, width = widths[i] + COLUMN_PADDING);
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(name: &str, target_type: &str, node: &str) -> Target {
        Target {
            name: name.to_string(),
            target_type: target_type.to_string(),
            node_name: node.to_string(),
            capture_service: format!("svc-{}", node),
            ..Default::default()
        }
    }

    fn sample() -> Vec<Target> {
        vec![
            target("zebra", "docker", "b"),
            target("default/nginx", "pod", "a"),
            target("init (1)", "proc", "b"),
            target("zebra", "containerd", "a"),
            target("foonet", "bindmount", "a"),
        ]
    }

    #[test]
    fn test_kind_of() {
        assert_eq!(TargetKind::of(&target("p", "pod", "")), TargetKind::Pod);
        assert_eq!(TargetKind::of(&target("p", "proc", "")), TargetKind::Network);
        assert_eq!(TargetKind::of(&target("p", "bindmount", "")), TargetKind::Network);
        assert_eq!(TargetKind::of(&target("p", "docker", "")), TargetKind::Container);
        assert_eq!(TargetKind::of(&target("p", "", "")), TargetKind::Container);
    }

    #[test]
    fn test_filter_and_sort() {
        let all = filter_targets(sample(), &[]);
        let names: Vec<_> = all.iter().map(|t| (t.name.as_str(), t.node_name.as_str())).collect();
        assert_eq!(
            names,
            vec![
                ("default/nginx", "a"),
                ("foonet", "a"),
                ("init (1)", "b"),
                ("zebra", "a"),
                ("zebra", "b"),
            ]
        );
        let networks = filter_targets(sample(), &[TargetKind::Network]);
        assert_eq!(networks.len(), 2);
        let mixed = filter_targets(sample(), &[TargetKind::Pod, TargetKind::Container]);
        assert_eq!(mixed.len(), 3);
    }

    #[test]
    fn test_render_table() {
        let targets = filter_targets(sample(), &[TargetKind::Pod, TargetKind::Network]);
        let out = render(&targets, &[], None, false).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], format!("{:<16}{:<12}{}", "TARGET", "TYPE", "NODE"));
        assert_eq!(lines[1], format!("{:<16}{:<12}{}", "default/nginx", "pod", "a"));
        assert_eq!(lines[2], format!("{:<16}{:<12}{}", "foonet", "bindmount", "a"));
        assert_eq!(lines.len(), 4);

        let out = render(&targets, &[], None, true).unwrap();
        assert!(out.starts_with("default/nginx   pod"));
    }

    #[test]
    fn test_render_wide_and_pods() {
        let targets = filter_targets(sample(), &[TargetKind::Pod]);
        let out = render(&targets, &[TargetKind::Pod], None, false).unwrap();
        assert_eq!(out, "POD\ndefault/nginx\n");
        let out = render(&targets, &[TargetKind::Pod], Some(OutputFormat::Wide), false).unwrap();
        assert_eq!(
            out,
            format!("{:<16}NODE\n{:<16}a\n", "POD", "default/nginx")
        );

        let out = render(&targets, &[], Some(OutputFormat::Wide), false).unwrap();
        assert!(out.lines().next().unwrap().ends_with("SERVICE"));
        assert!(out.contains("svc-a"));
    }

    #[test]
    fn test_render_name_and_json() {
        let targets = filter_targets(sample(), &[TargetKind::Container]);
        let out = render(&targets, &[], Some(OutputFormat::Name), false).unwrap();
        assert_eq!(out, "zebra\nzebra\n");
        let out = render(&targets, &[], Some(OutputFormat::Json), false).unwrap();
        let decoded: Vec<Target> = serde_json::from_str(&out).unwrap();
        assert_eq!(decoded, targets);
    }
}
