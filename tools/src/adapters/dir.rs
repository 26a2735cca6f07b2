//! `cmd /C dir` (Windows listing and recursive filename search).

use std::path::Path;
use std::sync::LazyLock;

use lookout_types::{Entry, EntryKind};
use regex::Regex;

use super::{AdapterOutcome, Invocation, NativeOutput, clean_relative};

// date, time (optionally AM/PM), <DIR>-style tag or size, name
static ENTRY_LINE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(\d\S*)\s+(\d\S*(?:\s*[AaPp]\.?\s?[Mm]\.?)?)\s+(<[A-Z]+>|[\d.,]+)\s+(.+?)\s*$",
    )
    .ok()
});

const NOT_FOUND: &str = "File Not Found";

/// `dir /a /-c` in `root`: every entry including hidden, sizes without separators.
pub fn list_invocation(exe: &Path, root: &Path) -> Invocation {
    Invocation::new(exe)
        .args(["/C", "dir", "/a", "/-c"])
        .current_dir(root)
}

/// `dir [/s] /b /a-d root`: bare file paths, absolute with `/s`, names without.
pub fn search_invocation(exe: &Path, root: &Path, recursive: bool) -> Invocation {
    let inv = Invocation::new(exe).args(["/C", "dir"]);
    let inv = if recursive { inv.arg("/s") } else { inv };
    inv.args(["/b", "/a-d"]).arg(root)
}

pub fn parse_list(output: &NativeOutput) -> AdapterOutcome<Vec<Entry>> {
    let text = match output.stdout_text("dir") {
        Ok(text) => text,
        Err(cause) => return AdapterOutcome::recoverable(cause),
    };
    if is_not_found(output, text) {
        return AdapterOutcome::parsed(Vec::new());
    }
    if output.exit_code != Some(0) {
        return AdapterOutcome::recoverable(output.unexpected_exit("dir"));
    }
    let Some(re) = ENTRY_LINE.as_ref() else {
        return AdapterOutcome::recoverable("dir line pattern failed to compile");
    };

    let mut entries = Vec::new();
    for line in text.lines() {
        // Volume header, "Directory of" and the summary lines are indented or blank.
        if line.trim().is_empty() || line.starts_with(' ') {
            continue;
        }
        let Some(caps) = re.captures(line) else {
            return AdapterOutcome::recoverable(format!("unrecognized dir line: {line}"));
        };
        let tag = &caps[3];
        let name = &caps[4];
        let entry = match tag {
            "<DIR>" if name == "." || name == ".." => continue,
            "<DIR>" => Entry::new(name, EntryKind::Directory),
            "<JUNCTION>" | "<SYMLINKD>" => Entry::new(strip_target(name), EntryKind::Directory),
            "<SYMLINK>" => Entry::new(strip_target(name), EntryKind::File),
            tag if tag.starts_with('<') => Entry::new(strip_target(name), EntryKind::Other),
            size => {
                let size = size.replace([',', '.'], "").parse().ok();
                Entry::new(name, EntryKind::File).with_size(size)
            }
        };
        entries.push(entry);
    }
    AdapterOutcome::parsed(entries)
}

/// Parse bare output of [`search_invocation`] into `root`-relative file paths.
pub fn parse_search(
    root: &Path,
    recursive: bool,
    output: &NativeOutput,
) -> AdapterOutcome<Vec<String>> {
    let text = match output.stdout_text("dir") {
        Ok(text) => text,
        Err(cause) => return AdapterOutcome::recoverable(cause),
    };
    if is_not_found(output, text) {
        return AdapterOutcome::parsed(Vec::new());
    }
    if output.exit_code != Some(0) {
        return AdapterOutcome::recoverable(output.unexpected_exit("dir"));
    }

    let prefix = root.to_string_lossy().replace('/', "\\");
    let prefix = prefix.trim_end_matches('\\');
    let mut paths = Vec::new();
    for line in text.lines().map(str::trim_end).filter(|l| !l.is_empty()) {
        if !recursive {
            paths.push(line.to_string());
            continue;
        }
        let Some(rest) = strip_prefix_ignore_case(line, prefix) else {
            return AdapterOutcome::recoverable(format!("dir path outside root: {line}"));
        };
        let rel = clean_relative(rest);
        if !rel.is_empty() {
            paths.push(rel);
        }
    }
    AdapterOutcome::parsed(paths)
}

fn is_not_found(output: &NativeOutput, stdout: &str) -> bool {
    output.exit_code == Some(1)
        && (output.stderr.contains(NOT_FOUND) || stdout.contains(NOT_FOUND))
}

fn strip_target(name: &str) -> &str {
    match name.rfind(" [") {
        Some(idx) if name.ends_with(']') => &name[..idx],
        _ => name,
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    let rest = &line[prefix.len()..];
    (head.eq_ignore_ascii_case(prefix) && (rest.is_empty() || rest.starts_with('\\')))
        .then_some(rest)
}

#[cfg(test)]
mod tests {
    use super::{list_invocation, parse_list, parse_search, search_invocation};
    use crate::adapters::{AdapterOutcome, NativeOutput};
    use lookout_types::{Entry, EntryKind};
    use std::path::Path;

    fn out(stdout: &str, exit_code: i32) -> NativeOutput {
        NativeOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: String::new(),
            exit_code: Some(exit_code),
        }
    }

    fn value<T: std::fmt::Debug>(outcome: AdapterOutcome<T>) -> T {
        match outcome {
            AdapterOutcome::Parsed { value, .. } => value,
            AdapterOutcome::Recoverable(cause) => panic!("recoverable: {cause}"),
        }
    }

    const LISTING: &str = " Volume in drive C has no label.\r
 Volume Serial Number is 1234-ABCD\r
\r
 Directory of C:\\work\\proj\r
\r
10/19/2026  10:00 AM    <DIR>          .\r
10/19/2026  10:00 AM    <DIR>          ..\r
10/19/2026  09:12 AM               123 a.txt\r
10/18/2026  11:40 PM    <DIR>          sub dir\r
10/18/2026  11:41 PM    <SYMLINKD>     linked [C:\\elsewhere]\r
19.10.2026  14:03                 2048 b.bin\r
               2 File(s)           2171 bytes\r
               4 Dir(s)  100000000 bytes free\r
";

    #[test]
    fn list_invocation_includes_hidden() {
        let inv = list_invocation(Path::new("C:\\Windows\\system32\\cmd.exe"), Path::new("C:\\p"));
        assert!(inv.has_arg("/a"));
        assert!(inv.has_arg("/-c"));
    }

    #[test]
    fn parses_listing_and_skips_decoration() {
        let got = value(parse_list(&out(LISTING, 0)));
        assert_eq!(
            got,
            vec![
                Entry::new("a.txt", EntryKind::File).with_size(Some(123)),
                Entry::new("sub dir", EntryKind::Directory),
                Entry::new("linked", EntryKind::Directory),
                Entry::new("b.bin", EntryKind::File).with_size(Some(2048)),
            ]
        );
    }

    #[test]
    fn file_not_found_is_empty_success() {
        let mut output = out(" Volume in drive C is OS\r\n", 1);
        output.stderr = "File Not Found\r\n".into();
        assert!(value(parse_list(&output)).is_empty());
        assert!(value(parse_search(Path::new("C:\\p"), true, &output)).is_empty());
    }

    #[test]
    fn other_failures_are_recoverable() {
        let mut output = out("", 1);
        output.stderr = "Access is denied.".into();
        assert!(parse_list(&output).is_recoverable());
    }

    #[test]
    fn search_output_is_relativized() {
        let stdout = "C:\\Work\\Proj\\a.txt\r\nc:\\work\\proj\\sub\\b.txt\r\n";
        let got = value(parse_search(Path::new("C:\\work\\proj\\"), true, &out(stdout, 0)));
        assert_eq!(got, vec!["a.txt", "sub/b.txt"]);
    }

    #[test]
    fn search_recursion_is_a_flag() {
        let exe = Path::new("cmd");
        assert!(search_invocation(exe, Path::new("C:\\p"), true).has_arg("/s"));
        assert!(!search_invocation(exe, Path::new("C:\\p"), false).has_arg("/s"));
    }

    #[test]
    fn search_path_outside_root_is_recoverable() {
        let stdout = "D:\\other\\a.txt\r\n";
        assert!(parse_search(Path::new("C:\\p"), true, &out(stdout, 0)).is_recoverable());
    }

    #[test]
    fn non_recursive_search_yields_bare_names() {
        let got = value(parse_search(Path::new("C:\\p"), false, &out("a.txt\r\nb c.md\r\n", 0)));
        assert_eq!(got, vec!["a.txt", "b c.md"]);
    }
}
