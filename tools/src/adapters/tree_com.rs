//! `tree.com /F /A` (Windows tree).
//!
//! The Windows tree has no depth limit, so the requested depth is applied
//! while parsing. With `/A` every nesting level is a four-column group of
//! `|   ` or spaces; directories start with `+---` or `\---`.

use std::path::Path;

use lookout_types::EntryKind;

use super::{AdapterOutcome, Invocation, NativeOutput};
use crate::normalize::TreeNode;

pub fn invocation(exe: &Path, root: &Path) -> Invocation {
    Invocation::new(exe).arg(root).args(["/F", "/A"])
}

pub fn parse(output: &NativeOutput, max_depth: usize) -> AdapterOutcome<Vec<TreeNode>> {
    if output.exit_code != Some(0) {
        return AdapterOutcome::recoverable(output.unexpected_exit("tree.com"));
    }
    let text = match output.stdout_text("tree.com") {
        Ok(text) => text,
        Err(cause) => return AdapterOutcome::recoverable(cause),
    };

    // The banner is localized; the root line is the first one holding a path.
    let mut lines = text.lines().skip_while(|line| !is_root_line(line));
    if lines.next().is_none() {
        return AdapterOutcome::recoverable("tree.com output has no root line");
    }

    let mut stack = vec![TreeNode::leaf("", EntryKind::Directory)];
    for line in lines {
        let line = line.trim_end();
        if line.trim_start_matches(['|', ' ']).is_empty() || line.starts_with("No subfolders") {
            continue;
        }
        let Some((depth, name, kind)) = parse_line(line) else {
            return AdapterOutcome::recoverable(format!("unrecognized tree.com line: {line}"));
        };
        if depth > max_depth {
            continue;
        }
        if stack.len() < depth {
            return AdapterOutcome::recoverable(format!("tree.com line skips a level: {line}"));
        }
        fold_to(&mut stack, depth);
        let node = TreeNode::leaf(name, kind);
        if kind.is_dir() {
            stack.push(node);
        } else if let Some(parent) = stack.last_mut() {
            parent.children.push(node);
        }
    }
    fold_to(&mut stack, 1);
    let children = stack.pop().map(|root| root.children).unwrap_or_default();
    AdapterOutcome::parsed(children)
}

/// Pop finished directories until the stack holds `len` levels.
fn fold_to(stack: &mut Vec<TreeNode>, len: usize) {
    while stack.len() > len {
        if let Some(done) = stack.pop()
            && let Some(parent) = stack.last_mut()
        {
            parent.children.push(done);
        }
    }
}

fn is_root_line(line: &str) -> bool {
    let bytes = line.as_bytes();
    (bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':')
        || line.starts_with("\\\\")
}

fn parse_line(line: &str) -> Option<(usize, &str, EntryKind)> {
    let mut rest = line;
    let mut groups = 0;
    while let Some(next) = rest
        .strip_prefix("|   ")
        .or_else(|| rest.strip_prefix("    "))
    {
        rest = next;
        groups += 1;
    }
    if let Some(name) = rest
        .strip_prefix("+---")
        .or_else(|| rest.strip_prefix("\\---"))
    {
        return (!name.is_empty()).then_some((groups + 1, name, EntryKind::Directory));
    }
    if groups == 0 || rest.is_empty() {
        return None;
    }
    Some((groups, rest, EntryKind::File))
}
