//! Shell-word lexer for the free-text "extra server arguments" preference.
//!
//! The preference string comes straight from user configuration, so parsing
//! is deliberately lenient: malformed input (an unterminated quote) yields
//! zero extra arguments instead of failing session start, and tokens that
//! carry shell metacharacters are dropped with a warning rather than
//! aborting the whole option string.

use tracing::warn;

/// Characters that would only make sense to a shell, never to the spawned
/// server binary. Tokens containing any of these are discarded.
const UNSAFE_CHARS: &[char] = &[';', '|', '&', '<', '>', '$', '`'];

/// Splits a preference string into argv tokens.
///
/// Quoting rules: single quotes are literal, double quotes honor backslash
/// escapes, a backslash outside quotes escapes the next character.
pub fn split_args(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = input.chars();

    #[derive(PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }
    let mut quote = Quote::None;

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    current.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    } else {
                        warn!("dangling backslash in extra arguments, ignoring option string");
                        return Vec::new();
                    }
                }
                _ => current.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    in_token = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_token = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                        in_token = true;
                    } else {
                        warn!("dangling backslash in extra arguments, ignoring option string");
                        return Vec::new();
                    }
                }
                c if c.is_whitespace() => {
                    if in_token {
                        push_token(&mut tokens, std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_token = true;
                }
            },
        }
    }

    if quote != Quote::None {
        warn!("unterminated quote in extra arguments, ignoring option string");
        return Vec::new();
    }
    if in_token {
        push_token(&mut tokens, current);
    }
    tokens
}

fn push_token(tokens: &mut Vec<String>, token: String) {
    if token.contains(UNSAFE_CHARS) {
        warn!(%token, "skipping unsafe extra argument token");
    } else {
        tokens.push(token);
    }
}
