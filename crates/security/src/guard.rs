//! Shell command screening — a deny-list of patterns the shell tool refuses.
//!
//! This is a tripwire for obviously destructive commands, not a sandbox.
//! The workspace path containment in [`crate::path`] does the real fencing.

use regex::Regex;
use std::sync::LazyLock;

/// Error returned when a command matches a blocked pattern.
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("Command blocked: matches dangerous pattern '{pattern}'")]
    Blocked { pattern: String },
}

static DANGER_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"\brm\s+(-[a-z]*\s+)*-?[rf]+[a-z]*\s+/(\s|$)", "rm -rf /"),
        (r"\bsudo\b", "sudo"),
        (r"\bchmod\s+777\b", "chmod 777"),
        (r">\s*/dev/sd", "write to block device"),
        (r"\bmkfs\b", "mkfs"),
        (r"\bcurl\b[^|]*\|\s*(ba|z|fi)?sh\b", "curl | sh"),
        (r"\bwget\b[^|]*\|\s*(ba|z|fi)?sh\b", "wget | sh"),
        (r"\bgit\s+push\s+[^|]*--force\b", "git push --force"),
        (r"\bkill\s+-9\s+1\b", "kill init"),
        (r":\(\)\s*\{.*\};\s*:", "fork bomb"),
    ]
    .into_iter()
    .map(|(re, label)| {
        // patterns are static and known-good
        (Regex::new(re).unwrap(), label)
    })
    .collect()
});

/// Screen a shell command against the deny-list.
pub fn guard_command(command: &str) -> Result<(), GuardError> {
    for (re, label) in DANGER_PATTERNS.iter() {
        if re.is_match(command) {
            tracing::warn!(pattern = label, "blocked shell command");
            return Err(GuardError::Blocked {
                pattern: (*label).to_string(),
            });
        }
    }
    Ok(())
}
