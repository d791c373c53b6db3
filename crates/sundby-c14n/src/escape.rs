#![forbid(unsafe_code)]

//! Entity escaping for C14N output.
//!
//! - Text nodes: `&` → `&amp;`, `<` → `&lt;`, `>` → `&gt;`, `\r` → `&#xD;`
//! - Attribute values: additionally `"` → `&quot;`, `\t` → `&#x9;`, `\n` → `&#xA;`
//! - PI data: `\r` → `&#xD;`
//!
//! The text and attribute rules are the ones the raw writer already applies,
//! so they are shared with it.

pub use sundby_xml::writer::{escape_attr, escape_text};

/// Escape processing instruction data.
pub fn escape_pi(s: &str) -> String {
    s.replace('\r', "&#xD;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("hello"), "hello");
        assert_eq!(escape_text("a&b<c>d"), "a&amp;b&lt;c&gt;d");
        assert_eq!(escape_text("line\rend"), "line&#xD;end");
    }

    #[test]
    fn test_escape_attr() {
        assert_eq!(escape_attr("a>b"), "a>b");
        assert_eq!(escape_attr("a&b\"c"), "a&amp;b&quot;c");
        assert_eq!(escape_attr("a\tb\nc\rd"), "a&#x9;b&#xA;c&#xD;d");
    }

    #[test]
    fn test_escape_pi() {
        assert_eq!(escape_pi("a\rb"), "a&#xD;b");
    }
}
