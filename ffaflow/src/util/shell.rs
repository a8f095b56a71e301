//! POSIX shell quoting for command lines sent over the remote channel.

/// Quote a single word for `sh`.
///
/// Words made only of safe characters are returned unchanged; everything
/// else is wrapped in single quotes with embedded quotes escaped.
pub fn quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '+' | ',' | '@')
        });
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// Quote and join a program with its arguments.
pub fn join<I, S>(words: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| quote(w.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_words_unchanged() {
        assert_eq!(quote("/data/obs_1/BM0.down.fil"), "/data/obs_1/BM0.down.fil");
        assert_eq!(quote("FFAFLOW_RANK=3"), "FFAFLOW_RANK=3");
    }

    #[test]
    fn test_quotes_spaces_and_quotes() {
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("$HOME"), "'$HOME'");
    }

    #[test]
    fn test_join() {
        assert_eq!(
            join(["python3", "cand_filter.py", "/a dir"]),
            "python3 cand_filter.py '/a dir'"
        );
    }
}
