//! Built-in preprocess filters

use std::path::Path;

use htdeploy_core::ContentFilter;

/// Conservative CSS minifier: strips `/* */` comments and collapses runs of
/// whitespace, keeping quoted strings intact. Registered cached, so
/// unchanged stylesheets never re-minify.
pub struct CssMinify;

impl ContentFilter for CssMinify {
    fn apply(&self, content: &[u8], _path: &Path) -> Vec<u8> {
        minify(&String::from_utf8_lossy(content)).into_bytes()
    }
}

fn minify(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut chars = css.chars().peekable();
    let mut quote: Option<char> = None;
    let mut pending_space = false;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                push_separated(&mut out, c, &mut pending_space);
                quote = Some(c);
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for c in chars.by_ref() {
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
            }
            c if c.is_whitespace() => {
                pending_space = !out.is_empty();
            }
            c => push_separated(&mut out, c, &mut pending_space),
        }
    }
    out
}

/// Whitespace is dropped next to CSS punctuation, kept between tokens.
fn push_separated(out: &mut String, c: char, pending_space: &mut bool) {
    const PUNCT: &[char] = &['{', '}', ';', ':', ',', '>'];
    if *pending_space && !PUNCT.contains(&c) && !out.ends_with(PUNCT) {
        out.push(' ');
    }
    *pending_space = false;
    out.push(c);
}
