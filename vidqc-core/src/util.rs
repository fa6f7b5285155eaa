//! Small shared helpers used across the crate.

/// Declares a lazily-compiled, process-wide static [`regex::Regex`].
///
/// ```ignore
/// fn is_digits(s: &str) -> bool {
///     regex!(r"^\d+$").is_match(s)
/// }
/// ```
#[macro_export]
macro_rules! regex {
    ($re:literal $(,)?) => {{
        static RE: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
        RE.get_or_init(|| regex::Regex::new($re).expect("invalid static regex"))
    }};
}

/// Forbidden shell metacharacters (§4.1.1): any input string containing one
/// of these is rejected before a process is ever spawned.
pub const FORBIDDEN_SHELL_METACHARACTERS: &[char] =
    &[';', '&', '|', '`', '$', '(', ')', '<', '>'];

pub fn find_shell_metacharacter(s: &str) -> Option<char> {
    s.chars().find(|c| FORBIDDEN_SHELL_METACHARACTERS.contains(c))
}

pub fn looks_like_url(s: &str) -> bool {
    regex!(r"^[a-zA-Z][a-zA-Z0-9+.-]*://").is_match(s)
}
