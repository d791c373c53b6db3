#![forbid(unsafe_code)]

//! Core types shared by every sundby crate: the error taxonomy, algorithm
//! URIs and XML namespace/element-name constants.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
