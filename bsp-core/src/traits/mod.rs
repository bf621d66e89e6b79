//! Abstract interfaces shared by the codec, containers and storage engines

pub mod backend;
pub mod element;
pub mod matrix;

pub use backend::{MatrixSink, NamedArray, TypedSlice};
pub use element::{label_of, type_of, Element, Index};
pub use matrix::MatrixView;
