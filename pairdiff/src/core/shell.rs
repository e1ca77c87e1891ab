//! Shell command construction.
//!
//! Strings handed to the shell are passed through verbatim; quoting is the
//! caller's business.

use std::path::Path;

/// Separator used to join argv into a `--label` value.
///
/// Plain spaces would be re-split by the shell.
pub const LABEL_SEPARATOR: &str = "___";

/// `shell -c script`
pub fn shell_argv(shell: &str, script: &str) -> Vec<String> {
    vec![shell.to_string(), "-c".to_string(), script.to_string()]
}

/// Labels passed to the diff command, one per side.
#[derive(Debug, Clone, Copy)]
pub struct DiffLabels<'a> {
    pub left: &'a [String],
    pub right: &'a [String],
}

/// Render `diff LEFT RIGHT [--label L --label R]` as a single shell script.
pub fn diff_script(diff: &str, left: &Path, right: &Path, labels: Option<DiffLabels<'_>>) -> String {
    let mut parts = vec![
        diff.to_string(),
        left.display().to_string(),
        right.display().to_string(),
    ];
    if let Some(labels) = labels {
        parts.push("--label".to_string());
        parts.push(labels.left.join(LABEL_SEPARATOR));
        parts.push("--label".to_string());
        parts.push(labels.right.join(LABEL_SEPARATOR));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_script_without_labels() {
        let script = diff_script("diff -u", Path::new("/t/l/out"), Path::new("/t/r/out"), None);
        assert_eq!(script, "diff -u /t/l/out /t/r/out");
    }

    #[test]
    fn diff_script_with_labels_joins_args() {
        let left = vec!["helm".to_string(), "template".to_string(), "a".to_string()];
        let right = vec!["helm".to_string(), "template".to_string(), "b".to_string()];
        let script = diff_script(
            "diff",
            Path::new("L"),
            Path::new("R"),
            Some(DiffLabels {
                left: &left,
                right: &right,
            }),
        );
        assert_eq!(
            script,
            "diff L R --label helm___template___a --label helm___template___b"
        );
    }

    #[test]
    fn shell_argv_wraps_script() {
        assert_eq!(shell_argv("bash", "sed 's/a/b/'"), ["bash", "-c", "sed 's/a/b/'"]);
    }
}
