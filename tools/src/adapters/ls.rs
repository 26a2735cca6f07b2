//! `ls -lA` (posix listing).

use std::path::Path;

use lookout_types::{Entry, EntryKind};

use super::{AdapterOutcome, Invocation, NativeOutput};

pub fn invocation(exe: &Path, root: &Path) -> Invocation {
    Invocation::new(exe)
        .args(["-l", "-A", "."])
        .current_dir(root)
        .c_locale()
}

/// Parse long-format output. `root` resolves symlinked entries.
pub fn parse(root: &Path, output: &NativeOutput) -> AdapterOutcome<Vec<Entry>> {
    if output.exit_code != Some(0) {
        return AdapterOutcome::recoverable(output.unexpected_exit("ls"));
    }
    let text = match output.stdout_text("ls") {
        Ok(text) => text,
        Err(cause) => return AdapterOutcome::recoverable(cause),
    };

    let mut entries = Vec::new();
    for line in text.lines() {
        if line.is_empty() || line.starts_with("total ") {
            continue;
        }
        match parse_line(root, line) {
            Some(entry) => entries.push(entry),
            None => return AdapterOutcome::recoverable(format!("unrecognized ls line: {line}")),
        }
    }
    AdapterOutcome::parsed(entries)
}

fn parse_line(root: &Path, line: &str) -> Option<Entry> {
    let mode = line.chars().next()?;
    // perms links owner group size month day time|year, or major, minor for devices
    let leading = if matches!(mode, 'b' | 'c') { 9 } else { 8 };
    let (fields, name) = split_fields(line, leading)?;

    let (kind, size) = match mode {
        '-' => (EntryKind::File, fields[4].parse().ok()),
        'd' => (EntryKind::Directory, fields[4].parse().ok()),
        'l' => {
            let name = name.split_once(" -> ").map_or(name, |(name, _)| name);
            return Some(resolve_link(root, name));
        }
        _ => (EntryKind::Other, None),
    };
    Some(Entry::new(name, kind).with_size(size))
}

fn resolve_link(root: &Path, name: &str) -> Entry {
    match std::fs::metadata(root.join(name)) {
        Ok(meta) if meta.is_dir() => Entry::new(name, EntryKind::Directory).with_size(Some(meta.len())),
        Ok(meta) if meta.is_file() => Entry::new(name, EntryKind::File).with_size(Some(meta.len())),
        _ => Entry::new(name, EntryKind::Other),
    }
}

/// Take `n` whitespace-separated fields; the untouched remainder is the name.
fn split_fields(line: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut fields = Vec::with_capacity(n);
    let mut rest = line;
    for _ in 0..n {
        rest = rest.trim_start_matches(' ');
        let end = rest.find(' ')?;
        fields.push(&rest[..end]);
        rest = &rest[end..];
    }
    // Exactly one separator space precedes the name; names may start with spaces.
    let name = rest.strip_prefix(' ')?;
    (!name.is_empty()).then_some((fields, name))
}
