#![forbid(unsafe_code)]

//! XML plumbing for sundby.
//!
//! Provides the [`XmlEmitter`] trait that the signature writer wraps, a
//! quick-xml backed [`XmlWriter`], namespace scoping shared by every emitter,
//! node-stream replay, and a thin document layer over `roxmltree` for the
//! read side (decode and verification).

pub mod document;
pub mod nodeset;
pub mod replay;
pub mod scope;
pub mod writer;
pub mod xpath;

pub use document::XmlDocument;
pub use nodeset::NodeSet;
pub use scope::NamespaceScope;
pub use writer::{XmlEmitter, XmlWriter};

/// Return roxmltree parsing options used for every inbound document.
///
/// DTDs are rejected: envelopes arriving over the binding never need one,
/// and refusing them closes off entity-expansion tricks before any
/// signature processing happens.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: false,
        ..roxmltree::ParsingOptions::default()
    }
}

/// Split a qualified name into `(prefix, local_name)`.
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Join an optional prefix and a local name into a qualified name.
pub fn qualified_name(prefix: Option<&str>, local_name: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}:{local_name}"),
        _ => local_name.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("ds:Signature"), (Some("ds"), "Signature"));
        assert_eq!(split_qname("Signature"), (None, "Signature"));
        assert_eq!(qualified_name(Some("ds"), "X"), "ds:X");
        assert_eq!(qualified_name(Some(""), "X"), "X");
    }
}
