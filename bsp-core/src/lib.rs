#![no_std]

//! bsp-core - binsparse format definitions
//!
//! This crate provides the storage-independent half of the binsparse
//! interchange format: element type labels, format tags, canonical matrix
//! views and the JSON metadata codec. It performs no I/O.

extern crate alloc;

pub mod error;
pub mod format;
pub mod metadata;
pub mod traits;
pub mod validation;
pub mod view;

pub use error::*;
pub use format::*;
pub use metadata::{check_version, decode, encode, DecodedHeader, Descriptor, Document};
pub use traits::*;
pub use view::{CooView, CscView, CsrView, DenseVectorView, DenseView};
