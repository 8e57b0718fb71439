//! Benchmark support for the Yep object layer.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod utils;
