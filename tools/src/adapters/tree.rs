//! `tree -J` (posix tree in JSON mode).

use std::path::Path;

use lookout_types::{EntryKind, FsError};
use serde::Deserialize;

use super::{AdapterOutcome, Invocation, NativeOutput};
use crate::normalize::TreeNode;

#[derive(Debug, Deserialize)]
struct JsonNode {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    contents: Option<Vec<JsonNode>>,
    #[serde(default)]
    error: Option<String>,
}

/// `tree -J -a -l -N -L depth --noreport .` in `root`. Links are followed;
/// tree itself refuses to re-enter an ancestor. `-N` keeps non-ASCII names
/// verbatim instead of octal escapes under the C locale.
pub fn invocation(exe: &Path, root: &Path, depth: usize) -> Invocation {
    Invocation::new(exe)
        .args(["-J", "-a", "-l", "-N", "--noreport", "-L"])
        .arg(depth.to_string())
        .arg(".")
        .current_dir(root)
        .c_locale()
}

/// Parse the JSON document into the children of the root node.
pub fn parse(root: &Path, output: &NativeOutput) -> AdapterOutcome<Vec<TreeNode>> {
    if output.exit_code != Some(0) {
        return AdapterOutcome::recoverable(output.unexpected_exit("tree"));
    }
    let nodes: Vec<JsonNode> = match serde_json::from_slice(&output.stdout) {
        Ok(nodes) => nodes,
        Err(err) => return AdapterOutcome::recoverable(format!("invalid JSON from tree: {err}")),
    };
    let Some(top) = nodes.into_iter().find(|n| n.kind == "directory") else {
        return AdapterOutcome::recoverable("tree output has no root directory");
    };
    if let Some(error) = top.error {
        return AdapterOutcome::recoverable(format!("tree could not open root: {error}"));
    }

    let mut skipped = Vec::new();
    let children = convert_all(root, "", top.contents.unwrap_or_default(), &mut skipped);
    AdapterOutcome::Parsed {
        value: children,
        skipped,
    }
}

fn convert_all(
    root: &Path,
    parent: &str,
    nodes: Vec<JsonNode>,
    skipped: &mut Vec<FsError>,
) -> Vec<TreeNode> {
    nodes
        .into_iter()
        .filter_map(|node| convert(root, parent, node, skipped))
        .collect()
}

fn convert(
    root: &Path,
    parent: &str,
    node: JsonNode,
    skipped: &mut Vec<FsError>,
) -> Option<TreeNode> {
    let rel = if parent.is_empty() {
        node.name.clone()
    } else {
        format!("{parent}/{}", node.name)
    };
    if let Some(error) = &node.error {
        skipped.push(FsError::skipped(&rel, error.clone()));
        if error.contains("recursive") {
            return None;
        }
    }
    let kind = match node.kind.as_str() {
        "directory" => EntryKind::Directory,
        "file" => EntryKind::File,
        "link" if node.contents.is_some() => EntryKind::Directory,
        "link" => match std::fs::metadata(root.join(&rel)) {
            Ok(meta) if meta.is_dir() => EntryKind::Directory,
            Ok(meta) if meta.is_file() => EntryKind::File,
            _ => EntryKind::Other,
        },
        "report" => return None,
        _ => EntryKind::Other,
    };
    let children = convert_all(root, &rel, node.contents.unwrap_or_default(), skipped);
    Some(TreeNode {
        name: node.name,
        kind,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::{invocation, parse};
    use crate::adapters::{AdapterOutcome, NativeOutput};
    use crate::normalize::TreeNode;
    use lookout_types::{EntryKind, ErrorKind};
    use std::path::Path;

    fn ok(stdout: &str) -> NativeOutput {
        NativeOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    #[test]
    fn invocation_limits_depth() {
        let inv = invocation(Path::new("/usr/bin/tree"), Path::new("/r"), 2);
        assert!(inv.has_arg("-J"));
        assert!(inv.has_arg("-N"));
        assert!(inv.has_arg("-L"));
        assert!(inv.has_arg("2"));
    }

    #[test]
    fn parses_nested_json() {
        let json = r#"[
          {"type":"directory","name":".","contents":[
            {"type":"directory","name":"d","contents":[
              {"type":"file","name":"y.txt"}
            ]},
            {"type":"file","name":"x.txt"},
            {"type":"fifo","name":"pipe"}
          ]}
        ]"#;
        let AdapterOutcome::Parsed { value, skipped } = parse(Path::new("/r"), &ok(json)) else {
            panic!("expected parsed");
        };
        assert!(skipped.is_empty());
        assert_eq!(
            value,
            vec![
                TreeNode {
                    name: "d".into(),
                    kind: EntryKind::Directory,
                    children: vec![TreeNode::leaf("y.txt", EntryKind::File)],
                },
                TreeNode::leaf("x.txt", EntryKind::File),
                TreeNode::leaf("pipe", EntryKind::Other),
            ]
        );
    }

    #[test]
    fn report_object_is_ignored() {
        let json = r#"[{"type":"directory","name":".","contents":[]},
                       {"type":"report","directories":0,"files":0}]"#;
        let AdapterOutcome::Parsed { value, .. } = parse(Path::new("/r"), &ok(json)) else {
            panic!("expected parsed");
        };
        assert!(value.is_empty());
    }

    #[test]
    fn recursive_link_is_skipped_and_reported() {
        let json = r#"[{"type":"directory","name":".","contents":[
            {"type":"link","name":"loop","target":".","error":"recursive, not followed"},
            {"type":"directory","name":"locked","error":"error opening dir"}
        ]}]"#;
        let AdapterOutcome::Parsed { value, skipped } = parse(Path::new("/r"), &ok(json)) else {
            panic!("expected parsed");
        };
        assert_eq!(value, vec![TreeNode::leaf("locked", EntryKind::Directory)]);
        assert_eq!(skipped.len(), 2);
        assert!(skipped.iter().all(|e| e.kind == ErrorKind::PartialResult));
        assert_eq!(skipped[0].path.as_deref(), Some("loop"));
    }

    #[test]
    fn tree_without_json_mode_is_recoverable() {
        let out = NativeOutput {
            stdout: Vec::new(),
            stderr: "tree: Invalid argument -`J'.".into(),
            exit_code: Some(1),
        };
        assert!(parse(Path::new("/r"), &out).is_recoverable());
        assert!(parse(Path::new("/r"), &ok(".\n└── x.txt\n")).is_recoverable());
    }
}
