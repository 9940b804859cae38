//! File-level helpers shared by the codecs.
//!
//! - [`compression`]: transparent stream (de)compression chosen by extension
//!   or magic bytes
//! - [`glob`]: expansion of input paths into file lists

pub mod compression;
pub mod glob;
