#![allow(clippy::excessive_precision)]
#![allow(missing_docs)]

pub mod condition;
pub mod encode;
pub mod error;
pub mod function;
pub mod preset;
pub mod ray;
pub mod render;
pub mod scene;
pub mod warp;
