//! Metadata module
//!
//! Opaque EXIF/XMP/IPTC blocks, the policy deciding which of them survive a
//! conversion, and the byte-level re-embedding for each container that can
//! carry them.

pub mod exif;
pub mod jpeg;
#[cfg(feature = "png")]
pub mod png;
pub mod types;
pub mod webp;

pub use types::{EmbedReport, MetadataBundle, MetadataKind, MetadataPolicy};
