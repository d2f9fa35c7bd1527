//! Whitespace tokenizer with double-quoted-string support.
//!
//! Grounded in `original_source/lib/strtrim.c`'s `strtrim` (leading/trailing
//! trim, blank and `#`-comment lines ignored) plus `ifscand/cmds.c`'s
//! `strsplitargs` call in `cmd_process`, which this reimplements directly:
//! the max-token and unterminated-quote failure modes are the two the
//! original flags as distinct error codes.

use crate::error::ControlError;

const MAX_TOKENS: usize = 128;

/// Splits one line into tokens. A double-quoted run (`"..."`) is one token
/// with its quotes stripped; an unescaped `"` with no matching close is an
/// error. Blank lines and lines starting with `#` yield zero tokens.
pub fn tokenize(line: &str) -> Result<Vec<String>, ControlError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(Vec::new());
    }

    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        if tokens.len() >= MAX_TOKENS {
            return Err(ControlError::TooManyTokens(MAX_TOKENS));
        }

        if c == '"' {
            chars.next();
            let mut tok = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '"' {
                    closed = true;
                    break;
                }
                tok.push(ch);
            }
            if !closed {
                return Err(ControlError::UnterminatedQuote);
            }
            tokens.push(tok);
        } else {
            let mut tok = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                tok.push(ch);
                chars.next();
            }
            tokens.push(tok);
        }
    }

    Ok(tokens)
}

/// Joins tokens back into one line for the CLI client, quoting any token
/// that itself contains whitespace (`original_source/ifscanctl/ifscanctl.c`'s
/// `arg2str`/`hasws`).
pub fn join_quoted(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| {
            if t.chars().any(char::is_whitespace) {
                format!("\"{t}\"")
            } else {
                t.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(tokenize("add nwid homenet").unwrap(), vec!["add", "nwid", "homenet"]);
    }

    #[test]
    fn quoted_string_is_one_token() {
        assert_eq!(
            tokenize(r#"set ap-order "my home" office"#).unwrap(),
            vec!["set", "ap-order", "my home", "office"]
        );
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(matches!(
            tokenize(r#"add nwid "homenet"#),
            Err(ControlError::UnterminatedQuote)
        ));
    }

    #[test]
    fn blank_and_comment_lines_yield_no_tokens() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(tokenize("   ").unwrap().is_empty());
        assert!(tokenize("# a comment").unwrap().is_empty());
    }

    #[test]
    fn join_quoted_roundtrips_through_tokenize() {
        let tokens = vec!["set".to_string(), "ap-order".to_string(), "my home".to_string()];
        let line = join_quoted(&tokens);
        assert_eq!(tokenize(&line).unwrap(), tokens);
    }
}
