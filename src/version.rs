//! Snapshot version labels
//!
//! Versions look like `V1`, `V1.1`, `V1.2`, ... The first snapshot of a
//! target is `V1`; each later run bumps the minor number. The label is read
//! back from the first line of the previous context file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// Version of a target's first snapshot
pub const INITIAL_VERSION: &str = "V1";

/// Prefix of the first line of a context file
pub const SNAPSHOT_MARKER: &str = "[DIRCONTXT_LLM_SNAPSHOT_";

/// Extract the version token from a context file's first line
pub fn parse_version(first_line: &str) -> Option<&str> {
    let token = first_line
        .trim_end()
        .strip_prefix(SNAPSHOT_MARKER)?
        .strip_suffix(']')?;
    (!token.is_empty()).then_some(token)
}

/// Read the version recorded in the context file at `path`.
///
/// Returns `None` if the file cannot be read or has no version line.
pub fn read_version(path: &Path) -> Option<String> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };
    let mut first = String::new();
    if let Err(e) = BufReader::new(file).read_line(&mut first) {
        warn!("Cannot read {}: {}", path.display(), e);
        return None;
    }
    parse_version(&first).map(str::to_string)
}

/// Version that follows `previous`.
///
/// `Vx` becomes `Vx.1` and `Vx.y` becomes `Vx.(y+1)`. Anything else restarts
/// at [`INITIAL_VERSION`].
///
/// ```rust
/// use dircontxt::version::next_version;
///
/// assert_eq!(next_version("V1"), "V1.1");
/// assert_eq!(next_version("V1.9"), "V1.10");
/// assert_eq!(next_version("draft"), "V1");
/// ```
pub fn next_version(previous: &str) -> String {
    let parsed = previous.strip_prefix('V').and_then(|rest| match rest.split_once('.') {
        Some((major, minor)) => Some((major.parse::<u32>().ok()?, minor.parse::<u32>().ok()?)),
        None => Some((rest.parse::<u32>().ok()?, 0)),
    });

    match parsed.and_then(|(major, minor)| Some((major, minor.checked_add(1)?))) {
        Some((major, minor)) => format!("V{}.{}", major, minor),
        None => {
            warn!("Unrecognized version {:?}, restarting at {}", previous, INITIAL_VERSION);
            INITIAL_VERSION.to_string()
        }
    }
}
