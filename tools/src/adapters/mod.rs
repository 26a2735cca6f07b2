//! Command adapters: one module per native tool dialect.
//!
//! Every adapter builds an [`Invocation`] and parses the resulting
//! [`NativeOutput`] into an [`AdapterOutcome`]. Paths inside parsed values are
//! relative to the request root and `/`-separated. Anything an adapter cannot
//! make sense of (unknown exit code, unexpected shape, refused flag) is
//! [`AdapterOutcome::Recoverable`] and the caller retries through the fallback.

pub mod dir;
pub mod find;
pub mod findstr;
pub mod grep;
pub mod ls;
pub mod ripgrep;
pub mod tree;
pub mod tree_com;

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

use lookout_types::FsError;

/// Number of candidate files handed to a content-search tool per process.
pub const BATCH_SIZE: usize = 500;

/// A fully specified native command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub envs: Vec<(OsString, OsString)>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_os_string()));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Pin posix tools to the C locale so dates, sizes and sort order parse.
    #[must_use]
    pub fn c_locale(self) -> Self {
        self.env("LC_ALL", "C")
    }

    /// Whether `arg` appears verbatim among the arguments.
    #[must_use]
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

/// Raw result of one native process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeOutput {
    pub stdout: Vec<u8>,
    pub stderr: String,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl NativeOutput {
    /// Stdout as text. Native tools that emit a legacy code page fail here.
    pub fn stdout_text(&self, tool: &str) -> Result<&str, String> {
        std::str::from_utf8(&self.stdout)
            .map_err(|err| format!("{tool} produced non-UTF-8 output: {err}"))
    }

    /// A one-line description of an exit status the adapter does not accept.
    #[must_use]
    pub fn unexpected_exit(&self, tool: &str) -> String {
        let status = self
            .exit_code
            .map_or_else(|| "signal".to_string(), |code| format!("exit code {code}"));
        match self.stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(first) => format!("{tool} failed with {status}: {first}"),
            None => format!("{tool} failed with {status}"),
        }
    }
}

/// What an adapter made of a native run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterOutcome<T> {
    /// Usable output, plus sub-paths the tool reported as skipped.
    Parsed { value: T, skipped: Vec<FsError> },
    /// The run is unusable; the cause is reported as the fallback cause.
    Recoverable(String),
}

impl<T> AdapterOutcome<T> {
    #[must_use]
    pub const fn parsed(value: T) -> Self {
        Self::Parsed {
            value,
            skipped: Vec::new(),
        }
    }

    pub fn recoverable(cause: impl Into<String>) -> Self {
        Self::Recoverable(cause.into())
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> AdapterOutcome<U> {
        match self {
            Self::Parsed { value, skipped } => AdapterOutcome::Parsed {
                value: f(value),
                skipped,
            },
            Self::Recoverable(cause) => AdapterOutcome::Recoverable(cause),
        }
    }

    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable(_))
    }
}

/// Content-search parameters shared by `rg`, `grep` and `findstr`.
#[derive(Debug, Clone, Copy)]
pub struct TextQuery<'a> {
    pub text: &'a str,
    pub case_insensitive: bool,
}

/// Normalize a tool-reported path to the internal relative `/` form.
pub(crate) fn clean_relative(path: &str) -> String {
    let path = path.replace('\\', "/");
    let mut rest = path.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.trim_start_matches('/').to_string()
}

/// Whether ASCII-only case folding gives the same matches as Unicode
/// folding: the text is ASCII and holds no letter with a non-ASCII case
/// variant (`k` has the Kelvin sign, `s` the long s).
pub(crate) fn folds_as_ascii(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii() && !matches!(c.to_ascii_lowercase(), 'k' | 's'))
}

pub(crate) fn trim_line_ending(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

/// Split NUL-terminated output (`find -print0`, `rg --null`).
pub(crate) fn split_nul(stdout: &[u8]) -> impl Iterator<Item = String> + '_ {
    stdout
        .split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
}

#[cfg(test)]
mod tests {
    use super::{
        AdapterOutcome, Invocation, NativeOutput, clean_relative, folds_as_ascii, split_nul,
    };

    #[test]
    fn ascii_folding_excludes_letters_with_unicode_variants() {
        assert!(folds_as_ascii("needle 42"));
        assert!(!folds_as_ascii("école"));
        assert!(!folds_as_ascii("kelvin"));
        assert!(!folds_as_ascii("Sand"));
    }

    #[test]
    fn clean_relative_strips_dot_prefix_and_backslashes() {
        assert_eq!(clean_relative("./a/b.txt"), "a/b.txt");
        assert_eq!(clean_relative(".\\sub\\c.txt"), "sub/c.txt");
        assert_eq!(clean_relative("plain"), "plain");
    }

    #[test]
    fn split_nul_ignores_trailing_terminator() {
        let got: Vec<String> = split_nul(b"./a\0./b c\0").collect();
        assert_eq!(got, vec!["./a", "./b c"]);
    }

    #[test]
    fn unexpected_exit_mentions_first_stderr_line() {
        let out = NativeOutput {
            stdout: Vec::new(),
            stderr: "\nls: cannot open directory '.': Permission denied\nmore".into(),
            exit_code: Some(2),
        };
        assert_eq!(
            out.unexpected_exit("ls"),
            "ls failed with exit code 2: ls: cannot open directory '.': Permission denied"
        );
    }

    #[test]
    fn invocation_builder_collects_parts() {
        let inv = Invocation::new("ls").args(["-l", "-A"]).c_locale().current_dir("/tmp");
        assert!(inv.has_arg("-A"));
        assert_eq!(inv.envs.len(), 1);
        assert_eq!(inv.current_dir.as_deref(), Some(std::path::Path::new("/tmp")));
    }

    #[test]
    fn map_keeps_skipped() {
        let outcome = AdapterOutcome::Parsed {
            value: 2,
            skipped: vec![lookout_types::FsError::skipped("x", "denied")],
        };
        match outcome.map(|v| v * 2) {
            AdapterOutcome::Parsed { value, skipped } => {
                assert_eq!(value, 4);
                assert_eq!(skipped.len(), 1);
            }
            AdapterOutcome::Recoverable(cause) => panic!("unexpected: {cause}"),
        }
    }
}
