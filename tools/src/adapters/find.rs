//! `find -L` (posix recursive filename search).

use std::path::Path;

use super::{AdapterOutcome, Invocation, NativeOutput, clean_relative, split_nul};

/// Every regular file below `root`, following links, NUL-terminated.
pub fn invocation(exe: &Path, root: &Path, max_depth: Option<usize>) -> Invocation {
    let inv = Invocation::new(exe)
        .args(["-L", ".", "-mindepth", "1"])
        .current_dir(root)
        .c_locale();
    let inv = match max_depth {
        Some(depth) => inv.arg("-maxdepth").arg(depth.to_string()),
        None => inv,
    };
    inv.args(["-type", "f", "-print0"])
}

/// Any nonzero exit means find hit an error (unreadable directory, link loop)
/// somewhere; the fallback reports those per path instead.
pub fn parse(output: &NativeOutput) -> AdapterOutcome<Vec<String>> {
    if output.exit_code != Some(0) {
        return AdapterOutcome::recoverable(output.unexpected_exit("find"));
    }
    let paths = split_nul(&output.stdout)
        .map(|path| clean_relative(&path))
        .filter(|path| !path.is_empty())
        .collect();
    AdapterOutcome::parsed(paths)
}
