//! `findstr /N /L /P` (Windows content search).

use std::collections::HashMap;
use std::path::Path;

use lookout_types::MatchRecord;

use super::grep::{parse_records, split_line_number};
use super::{AdapterOutcome, Invocation, NativeOutput, TextQuery, folds_as_ascii};

/// findstr reads its arguments through the ANSI code page, so only ASCII
/// text is searched reliably, and `/I` folds by that code page.
pub fn unsupported(query: TextQuery<'_>) -> Option<String> {
    if !query.text.is_ascii() {
        return Some("findstr cannot search non-ASCII text".to_string());
    }
    (query.case_insensitive && !folds_as_ascii(query.text))
        .then(|| "findstr /I cannot fold non-ASCII case".to_string())
}

/// Literal search with line numbers; `/P` skips files with non-printable bytes.
pub fn invocation(exe: &Path, root: &Path, query: TextQuery<'_>, batch: &[String]) -> Invocation {
    let inv = Invocation::new(exe)
        .args(["/N", "/L", "/P"])
        .current_dir(root);
    let inv = if query.case_insensitive { inv.arg("/I") } else { inv };
    inv.arg(format!("/C:{}", query.text))
        .args(batch.iter().map(|path| native_path(path)))
}

/// findstr omits the file name when given a single file.
pub fn parse(output: &NativeOutput, batch: &[String]) -> AdapterOutcome<Vec<MatchRecord>> {
    match output.exit_code {
        Some(0) => {}
        Some(1) if output.stderr.trim().is_empty() => return AdapterOutcome::parsed(Vec::new()),
        _ => return AdapterOutcome::recoverable(output.unexpected_exit("findstr")),
    }
    if let [only] = batch {
        return parse_records(&output.stdout, "findstr", |line| {
            let (number, text) = split_line_number(line)?;
            Some((only.clone(), number, text))
        });
    }

    let known: HashMap<String, &String> = batch.iter().map(|p| (native_path(p), p)).collect();
    parse_records(&output.stdout, "findstr", |line| {
        line.iter()
            .enumerate()
            .filter(|&(_, &b)| b == b':')
            .find_map(|(idx, _)| {
                let shown = std::str::from_utf8(&line[..idx]).ok()?;
                let original = known.get(shown)?;
                let (number, text) = split_line_number(&line[idx + 1..])?;
                Some(((*original).clone(), number, text))
            })
    })
}

fn native_path(path: &str) -> String {
    path.replace('/', "\\")
}

#[cfg(test)]
mod tests {
    use super::{invocation, parse, unsupported};
    use crate::adapters::{AdapterOutcome, NativeOutput, TextQuery};
    use std::path::Path;

    #[test]
    fn non_ascii_text_is_refused() {
        let query = |text, case_insensitive| TextQuery {
            text,
            case_insensitive,
        };
        assert!(unsupported(query("café", false)).is_some());
        assert!(unsupported(query("desk", true)).is_some());
        assert!(unsupported(query("desk", false)).is_none());
        assert!(unsupported(query("two words", true)).is_none());
    }

    fn out(stdout: &str, exit_code: i32) -> NativeOutput {
        NativeOutput {
            stdout: stdout.as_bytes().to_vec(),
            stderr: String::new(),
            exit_code: Some(exit_code),
        }
    }

    #[test]
    fn invocation_uses_windows_dialect() {
        let query = TextQuery {
            text: "two words",
            case_insensitive: true,
        };
        let batch = vec!["sub/a.txt".to_string()];
        let inv = invocation(Path::new("findstr.exe"), Path::new("C:\\r"), query, &batch);
        assert!(inv.has_arg("/I"));
        assert!(inv.has_arg("/C:two words"));
        assert!(inv.has_arg("sub\\a.txt"));
    }

    #[test]
    fn multi_file_output_maps_back_to_internal_paths() {
        let batch = vec!["a.txt".to_string(), "sub/b.txt".to_string()];
        let stdout = "a.txt:1:first\r\nsub\\b.txt:7:C:\\path in text\r\n";
        let AdapterOutcome::Parsed { value, .. } = parse(&out(stdout, 0), &batch) else {
            panic!("expected parsed");
        };
        assert_eq!(value.len(), 2);
        assert_eq!(value[1].path, "sub/b.txt");
        assert_eq!(value[1].line_number, 7);
        assert_eq!(value[1].line, "C:\\path in text");
    }

    #[test]
    fn single_file_output_has_no_name() {
        let batch = vec!["only.txt".to_string()];
        let AdapterOutcome::Parsed { value, .. } = parse(&out("4:hit\r\n", 0), &batch) else {
            panic!("expected parsed");
        };
        assert_eq!(value[0].path, "only.txt");
        assert_eq!(value[0].line_number, 4);
        assert_eq!(value[0].line, "hit");
    }

    #[test]
    fn no_match_exit_is_empty_success() {
        let AdapterOutcome::Parsed { value, .. } = parse(&out("", 1), &["a".into()]) else {
            panic!("expected parsed");
        };
        assert!(value.is_empty());

        let mut failed = out("", 1);
        failed.stderr = "FINDSTR: Cannot open a".into();
        assert!(parse(&failed, &["a".into()]).is_recoverable());
    }
}
