#![forbid(unsafe_code)]

//! Exclusive XML Canonicalization for sundby.
//!
//! Two renditions of Exclusive Canonical XML 1.0 share one renderer:
//! - [`stream::ExcC14nStream`], fed by emitter calls while a document is
//!   being written (used when signing);
//! - [`exclusive`], over a parsed document and an optional node set (used
//!   for SignedInfo and by the verifier).

pub mod escape;
pub mod exclusive;
pub mod render;
pub mod stream;

pub use stream::ExcC14nStream;

use std::collections::BTreeMap;
use sundby_core::{algorithm, Error};
use sundby_xml::NodeSet;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::ExclusiveWithComments)
    }
}

/// Canonicalize an XML document.
///
/// - `xml`: the raw XML text
/// - `node_set`: optional node set (for document-subset canonicalization)
/// - `inclusive_prefixes`: the InclusiveNamespaces PrefixList
pub fn canonicalize(
    xml: &str,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = roxmltree::Document::parse_with_options(xml, sundby_xml::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    canonicalize_doc(&doc, mode, node_set, inclusive_prefixes)
}

/// Convenience: canonicalize with a pre-parsed document.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)
}

/// Canonicalize a standalone fragment as it would canonicalize in place,
/// where `inherited` bindings are in scope.
pub fn canonicalize_fragment(
    xml: &str,
    inclusive_prefixes: &[String],
    inherited: &BTreeMap<String, String>,
) -> Result<Vec<u8>, Error> {
    let doc = roxmltree::Document::parse_with_options(xml, sundby_xml::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    exclusive::canonicalize_in_context(&doc, false, None, inclusive_prefixes, inherited)
}
