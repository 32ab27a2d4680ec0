//! Per-recipient merge expansion.
//!
//! A template contains `[name]` placeholders that resolve against the
//! recipient's variables, and `[*name]` placeholders for system values:
//!
//! | Token     | Value                                                   |
//! |-----------|---------------------------------------------------------|
//! | `*from`   | the message sender                                      |
//! | `*to`     | the recipient address                                   |
//! | `*parts`  | the recipient's `*parts` variable, else the part count  |
//!
//! Anything that does not resolve is copied through untouched, brackets and
//! all.

use std::borrow::Cow;

use crate::recipient::Recipient;

/// Values visible to one recipient's expansion.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MergeContext<'a> {
    pub sender: &'a str,
    pub recipient: &'a Recipient,
    pub part_count: usize,
}

impl<'a> MergeContext<'a> {
    fn resolve(&self, name: &str) -> Option<Cow<'a, str>> {
        match name {
            "*from" => Some(Cow::Borrowed(self.sender)),
            "*to" => Some(Cow::Borrowed(self.recipient.address().as_str())),
            "*parts" => Some(
                self.recipient
                    .variable("*parts")
                    .map_or_else(|| Cow::Owned(self.part_count.to_string()), Cow::Borrowed),
            ),
            _ => self.recipient.variable(name).map(Cow::Borrowed),
        }
    }
}

/// Expands every placeholder in `template`.
pub(crate) fn expand(template: &str, ctx: &MergeContext<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('[') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let Some(name) = token(after) else {
            out.push('[');
            rest = after;
            continue;
        };

        match ctx.resolve(name) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('[');
                out.push_str(name);
                out.push(']');
            }
        }
        rest = &after[name.len() + 1..];
    }

    out.push_str(rest);
    out
}

/// Returns the token name if `s` (the text after a `[`) starts with one.
fn token(s: &str) -> Option<&str> {
    let close = s.find(']')?;
    let name = &s[..close];
    if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == '[') {
        return None;
    }
    Some(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn jane() -> Recipient {
        let mut rcpt = Recipient::new("jane@domain.tld").unwrap();
        rcpt.define_variable("fname", "jane");
        rcpt
    }

    fn run(template: &str, rcpt: &Recipient) -> String {
        let ctx = MergeContext {
            sender: "noreply@domain.tld",
            recipient: rcpt,
            part_count: 1,
        };
        expand(template, &ctx)
    }

    #[test]
    fn test_variable() {
        assert_eq!(run("Hi [fname]", &jane()), "Hi jane");
    }

    #[test]
    fn test_system_values() {
        assert_eq!(
            run("From: [*from]\nTo: <[*to]>", &jane()),
            "From: noreply@domain.tld\nTo: <jane@domain.tld>"
        );
    }

    #[test]
    fn test_parts_defaults_to_count() {
        assert_eq!(run("[*parts]", &jane()), "1");
    }

    #[test]
    fn test_parts_from_variable() {
        let mut rcpt = jane();
        rcpt.define_variable("*parts", "1,2");
        assert_eq!(run("[*parts]", &rcpt), "1,2");
    }

    #[test]
    fn test_system_value_wins_over_variable() {
        let mut rcpt = jane();
        rcpt.define_variable("*to", "other@domain.tld");
        assert_eq!(run("[*to]", &rcpt), "jane@domain.tld");
    }

    #[test]
    fn test_custom_star_variable() {
        let mut rcpt = jane();
        rcpt.define_variable("*campaign", "spring");
        assert_eq!(run("[*campaign]", &rcpt), "spring");
    }

    #[test]
    fn test_unresolved_left_literal() {
        assert_eq!(run("Hi [lname]!", &jane()), "Hi [lname]!");
        assert_eq!(run("[*unknown]", &jane()), "[*unknown]");
    }

    #[test]
    fn test_case_sensitive() {
        assert_eq!(run("[FNAME]", &jane()), "[FNAME]");
    }

    #[test]
    fn test_not_tokens() {
        assert_eq!(run("a [] b", &jane()), "a [] b");
        assert_eq!(run("[first name]", &jane()), "[first name]");
        assert_eq!(run("open [fname", &jane()), "open [fname");
        assert_eq!(run("[[fname]]", &jane()), "[jane]");
    }

    #[test]
    fn test_adjacent_tokens() {
        assert_eq!(run("[fname][fname]", &jane()), "janejane");
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(run("Grüße, [fname] ✓", &jane()), "Grüße, jane ✓");
    }

    proptest! {
        #[test]
        fn bracket_free_text_is_unchanged(text in "[^\\[]*") {
            prop_assert_eq!(run(&text, &jane()), text);
        }

        #[test]
        fn unknown_tokens_round_trip(name in "[a-z]{1,12}") {
            prop_assume!(name != "fname");
            let template = format!("<[{name}]>");
            prop_assert_eq!(run(&template, &jane()), template);
        }
    }
}
