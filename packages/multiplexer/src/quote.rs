/// Quote `value` as a single POSIX shell word.
///
/// The result is wrapped in single quotes; embedded single quotes become
/// `'\''`. The quoted word is safe to type into an interactive shell.
pub fn shell_quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('\'');
    for c in value.chars() {
        if c == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('\'');
    quoted
}

/// Escape `value` for a tmux option that is expanded as a format.
///
/// tmux runs `#(...)` in a format through `/bin/sh`, and `-n` / `-c` of
/// `new-window` are formats. Doubling every `#` makes the text literal.
pub fn escape_format(value: &str) -> String {
    value.replace('#', "##")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_escape_doubles_hashes() {
        assert_eq!(escape_format("build"), "build");
        assert_eq!(escape_format("#(id)"), "##(id)");
        assert_eq!(escape_format("a#{pane_id}#"), "a##{pane_id}##");
    }

    #[test]
    fn plain_word() {
        assert_eq!(shell_quote("claude"), "'claude'");
    }

    #[test]
    fn empty_string_is_an_empty_word() {
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn metacharacters_stay_inside_quotes() {
        assert_eq!(
            shell_quote("/tmp/x; rm -rf ~ && $(id)"),
            "'/tmp/x; rm -rf ~ && $(id)'"
        );
    }

    #[test]
    fn embedded_single_quote() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }
}
