//! Single-line prompts
//!
//! Cooked-mode line input for the recipient, cc, subject, filename, and
//! yes/no prompts. A backslash escapes the following character so tokens
//! may contain what would otherwise be separators.

use std::io::{self, BufRead, Write};

/// Print `prompt`, read one line, strip the newline, resolve `\` escapes.
pub fn gather(prompt: &str) -> io::Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(unescape(line.trim_end_matches(['\r', '\n'])))
}

/// Drop each backslash and keep the character it escapes.
fn unescape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}
