use std::fmt;

/// Sentence the agent answers with when the index is empty.
pub const NO_STAGED_FILES_MARKER: &str = "No staged files found";

/// Prefixes treated as markdown noise (headers, bullets) in the first pass.
const COMMENTARY_PREFIXES: [char; 3] = ['#', '*', '-'];

/// Free text returned by the model at the end of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAgentOutput(pub String);

/// The one line printed to stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage(String);

impl CommitMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommitMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Pick the commit message line out of `raw`.
///
/// `None` means nothing to commit: either the agent reported no staged files
/// or it returned only blank lines.
pub fn extract(raw: &RawAgentOutput) -> Option<CommitMessage> {
    let text = raw.0.trim();

    if text.contains(NO_STAGED_FILES_MARKER) {
        log::debug!("Agent reported no staged files");
        return None;
    }

    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    // First pass: first line that does not look like markdown commentary.
    if let Some(line) = lines
        .clone()
        .find(|l| !l.starts_with(COMMENTARY_PREFIXES))
    {
        return Some(CommitMessage(line.to_string()));
    }

    // Second pass: first non-empty line, even if it is a header or bullet.
    let line = lines.next()?;
    log::debug!("Every line looked like commentary; falling back to {line:?}");
    Some(CommitMessage(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(raw: &str) -> Option<String> {
        extract(&RawAgentOutput(raw.to_string())).map(|m| m.to_string())
    }

    #[test]
    fn first_line_of_prose_answer() {
        assert_eq!(
            run("feat: add login flow\n\nThis adds JWT support."),
            Some("feat: add login flow".into())
        );
    }

    #[test]
    fn all_commentary_falls_back_to_first_line() {
        assert_eq!(
            run("# Commit Message\n- fix: correct off-by-one in parser"),
            Some("# Commit Message".into())
        );
    }

    #[test]
    fn no_staged_marker_yields_nothing() {
        assert_eq!(run("No staged files found."), None);
        assert_eq!(run("  \nNo staged files found\n"), None);
    }

    #[test]
    fn blank_output_yields_nothing() {
        assert_eq!(run(""), None);
        assert_eq!(run("   \n\t\n  \r\n"), None);
    }

    #[test]
    fn skips_leading_markdown_and_blank_lines() {
        let raw = "\n## Summary\n* staged: src/parser.rs\n- bullet\n\n  fix(parser): handle empty input  \nrefactor: later line";
        assert_eq!(run(raw), Some("fix(parser): handle empty input".into()));
    }

    #[test]
    fn stops_at_first_match() {
        assert_eq!(
            run("docs: update README\nfeat: something else"),
            Some("docs: update README".into())
        );
    }

    #[test]
    fn handles_crlf_line_endings() {
        assert_eq!(
            run("# Title\r\nchore: bump deps\r\n"),
            Some("chore: bump deps".into())
        );
    }

    #[test]
    fn result_is_single_trimmed_line() {
        let msg = run("\t  style: format with rustfmt   \n").unwrap();
        assert_eq!(msg, "style: format with rustfmt");
        assert!(!msg.contains('\n'));
    }
}
