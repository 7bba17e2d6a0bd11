//! ANSI escape stripping for worker output lines.

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

fn ansi_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // CSI sequences plus the bare ESC forms the downloader emits for
    // carriage-return progress redraws.
    RE.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("ansi regex"))
}

/// Remove ANSI decorations and stray carriage returns before matching.
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    let stripped = ansi_re().replace_all(line, "");
    if stripped.contains('\r') {
        Cow::Owned(stripped.replace('\r', ""))
    } else {
        stripped
    }
}
