#![forbid(unsafe_code)]

//! Reference transforms for sundby.
//!
//! Implements the transform chain model from XML-DSig: each reference
//! contains a sequence of transforms that are applied in order. Only the two
//! transforms enveloped signatures use are provided: enveloped-signature and
//! exclusive canonicalization.

pub mod enveloped;
pub mod pipeline;

pub use enveloped::EnvelopedSignatureTransform;
pub use pipeline::{transform_for_uri, C14nTransform, Transform, TransformData, TransformPipeline};
