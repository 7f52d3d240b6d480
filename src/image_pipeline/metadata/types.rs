//! Metadata data model types

use std::collections::BTreeMap;
use std::fmt;

/// Kind of an opaque metadata block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKind {
    Exif,
    Xmp,
    Iptc,
}

impl MetadataKind {
    pub const ALL: [MetadataKind; 3] = [MetadataKind::Exif, MetadataKind::Xmp, MetadataKind::Iptc];

    pub fn name(self) -> &'static str {
        match self {
            MetadataKind::Exif => "EXIF",
            MetadataKind::Xmp => "XMP",
            MetadataKind::Iptc => "IPTC",
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque EXIF/XMP/IPTC byte blocks belonging to one image.
///
/// Blocks are relocated as-is. The bundle never looks inside them, and a
/// block is either kept whole or dropped whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataBundle {
    blocks: BTreeMap<MetadataKind, Vec<u8>>,
}

impl MetadataBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert. Empty blocks are treated as absent.
    pub fn with_block(mut self, kind: MetadataKind, data: Vec<u8>) -> Self {
        if !data.is_empty() {
            self.blocks.insert(kind, data);
        }
        self
    }

    pub fn get(&self, kind: MetadataKind) -> Option<&[u8]> {
        self.blocks.get(&kind).map(Vec::as_slice)
    }

    pub fn exif(&self) -> Option<&[u8]> {
        self.get(MetadataKind::Exif)
    }

    pub fn xmp(&self) -> Option<&[u8]> {
        self.get(MetadataKind::Xmp)
    }

    pub fn iptc(&self) -> Option<&[u8]> {
        self.get(MetadataKind::Iptc)
    }

    pub fn contains(&self, kind: MetadataKind) -> bool {
        self.blocks.contains_key(&kind)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn kinds(&self) -> impl Iterator<Item = MetadataKind> + '_ {
        self.blocks.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetadataKind, &[u8])> + '_ {
        self.blocks.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn total_len(&self) -> usize {
        self.blocks.values().map(Vec::len).sum()
    }

    /// Returns a copy holding only the blocks `policy` allows.
    pub fn filtered(&self, policy: &MetadataPolicy) -> MetadataBundle {
        MetadataBundle {
            blocks: self
                .blocks
                .iter()
                .filter(|(kind, _)| policy.allows(**kind))
                .map(|(kind, data)| (*kind, data.clone()))
                .collect(),
        }
    }
}

/// Which metadata kinds survive into the destination file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataPolicy {
    pub keep_metadata: bool,
    pub preserve_exif: bool,
    pub preserve_xmp: bool,
    pub preserve_iptc: bool,
    /// GPS tags live inside the EXIF block and cannot be stripped on their
    /// own, so turning this off drops the whole EXIF block.
    pub preserve_gps: bool,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            keep_metadata: true,
            preserve_exif: true,
            preserve_xmp: true,
            preserve_iptc: true,
            preserve_gps: true,
        }
    }
}

impl MetadataPolicy {
    pub fn strip_all() -> Self {
        Self {
            keep_metadata: false,
            preserve_exif: false,
            preserve_xmp: false,
            preserve_iptc: false,
            preserve_gps: false,
        }
    }

    pub fn allows(&self, kind: MetadataKind) -> bool {
        if !self.keep_metadata {
            return false;
        }
        match kind {
            MetadataKind::Exif => self.preserve_exif && self.preserve_gps,
            MetadataKind::Xmp => self.preserve_xmp,
            MetadataKind::Iptc => self.preserve_iptc,
        }
    }

    /// True when EXIF is dropped only because GPS preservation is off.
    pub fn exif_dropped_for_gps(&self) -> bool {
        self.keep_metadata && self.preserve_exif && !self.preserve_gps
    }
}

/// What happened to each metadata block while writing a destination file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedReport {
    pub embedded: Vec<MetadataKind>,
    pub skipped: Vec<(MetadataKind, String)>,
}

impl EmbedReport {
    pub fn embed(&mut self, kind: MetadataKind) {
        self.embedded.push(kind);
    }

    pub fn skip(&mut self, kind: MetadataKind, reason: impl Into<String>) {
        self.skipped.push((kind, reason.into()));
    }

    pub fn skip_all(&mut self, bundle: &MetadataBundle, reason: &str) {
        for kind in bundle.kinds() {
            self.skip(kind, reason);
        }
    }

    pub fn is_embedded(&self, kind: MetadataKind) -> bool {
        self.embedded.contains(&kind)
    }

    pub fn has_warnings(&self) -> bool {
        !self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_bundle() -> MetadataBundle {
        MetadataBundle::new()
            .with_block(MetadataKind::Exif, vec![1, 2, 3])
            .with_block(MetadataKind::Xmp, b"<x:xmpmeta/>".to_vec())
            .with_block(MetadataKind::Iptc, vec![0x1c, 0x02])
    }

    #[test]
    fn test_empty_blocks_are_absent() {
        let bundle = MetadataBundle::new().with_block(MetadataKind::Exif, Vec::new());
        assert!(bundle.is_empty());
        assert_eq!(bundle.exif(), None);
    }

    #[test]
    fn test_default_policy_keeps_everything() {
        let bundle = full_bundle();
        assert_eq!(bundle.filtered(&MetadataPolicy::default()), bundle);
        assert_eq!(bundle.total_len(), 3 + 12 + 2);
    }

    #[test]
    fn test_master_switch_strips_all() {
        assert!(full_bundle().filtered(&MetadataPolicy::strip_all()).is_empty());
    }

    #[test]
    fn test_gps_off_drops_whole_exif_block() {
        let policy = MetadataPolicy {
            preserve_gps: false,
            ..MetadataPolicy::default()
        };
        let filtered = full_bundle().filtered(&policy);

        assert!(!filtered.contains(MetadataKind::Exif));
        assert!(filtered.contains(MetadataKind::Xmp));
        assert!(filtered.contains(MetadataKind::Iptc));
        assert!(policy.exif_dropped_for_gps());
    }

    #[test]
    fn test_blocks_are_never_edited() {
        let policy = MetadataPolicy {
            preserve_xmp: false,
            ..MetadataPolicy::default()
        };
        let filtered = full_bundle().filtered(&policy);
        assert_eq!(filtered.exif(), Some(&[1u8, 2, 3][..]));
        assert_eq!(filtered.xmp(), None);
    }
}
