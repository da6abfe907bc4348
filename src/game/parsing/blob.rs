use crate::core::fixed::Fixed;
use crate::game::chart::{Chart, Note, NoteFlags, Section, SectionFlags};
use bincode::{Decode, Encode};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// Bumped whenever the record layout changes; older blobs are rejected.
pub const BLOB_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
struct SectionRecord {
    time: i32,
    length: i32,
    flags: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
struct NoteRecord {
    time: i32,
    length: i32,
    kind: u8,
}

/// Packed chart as stored in a package. Times are raw 16.16 bits so a blob
/// decodes to the exact values it was built from.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode)]
pub struct ChartBlob {
    pub version: u32,
    /// Hash of the source the blob was compiled from.
    pub source_hash: u64,
    scroll: i32,
    sections: Vec<SectionRecord>,
    notes: Vec<NoteRecord>,
}

pub fn source_hash(bytes: &[u8]) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(bytes);
    hasher.finish()
}

impl ChartBlob {
    pub fn from_chart(chart: &Chart, source_hash: u64) -> Self {
        Self {
            version: BLOB_VERSION,
            source_hash,
            scroll: chart.scroll.raw(),
            sections: chart
                .sections
                .iter()
                .map(|s| SectionRecord {
                    time: s.time.raw(),
                    length: s.length.raw(),
                    flags: s.flags.bits(),
                })
                .collect(),
            notes: chart
                .notes
                .iter()
                .map(|n| NoteRecord {
                    time: n.time.raw(),
                    length: n.length.raw(),
                    kind: n.flags().bits(),
                })
                .collect(),
        }
    }

    pub fn into_chart(self) -> Result<Chart, String> {
        if self.version != BLOB_VERSION {
            return Err(format!(
                "Chart blob version {} (expected {BLOB_VERSION})",
                self.version
            ));
        }
        let chart = Chart {
            scroll: Fixed::from_raw(self.scroll),
            sections: self
                .sections
                .into_iter()
                .map(|s| Section {
                    time: Fixed::from_raw(s.time),
                    length: Fixed::from_raw(s.length),
                    flags: SectionFlags::from_bits_truncate(s.flags),
                })
                .collect(),
            notes: self
                .notes
                .into_iter()
                .map(|n| {
                    Note::from_flags(
                        Fixed::from_raw(n.time),
                        Fixed::from_raw(n.length),
                        NoteFlags::from_bits_truncate(n.kind),
                    )
                })
                .collect(),
        };
        chart.validate()?;
        Ok(chart)
    }

    pub fn encode(&self) -> Result<Vec<u8>, String> {
        bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| format!("Failed to encode chart blob: {e}"))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, String> {
        bincode::decode_from_slice::<Self, _>(bytes, bincode::config::standard())
            .map(|(blob, _)| blob)
            .map_err(|e| format!("Failed to decode chart blob: {e}"))
    }
}

pub fn decode_chart(bytes: &[u8]) -> Result<Chart, String> {
    ChartBlob::decode(bytes)?.into_chart()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::chart::{Direction, NoteKey};

    fn chart() -> Chart {
        Chart {
            scroll: Fixed::from_f64(250.0),
            sections: vec![
                Section {
                    time: Fixed::ZERO,
                    length: Fixed::from_f64(1.6),
                    flags: SectionFlags::MUST_HIT,
                },
                Section {
                    time: Fixed::from_f64(1.6),
                    length: Fixed::from_f64(1.6),
                    flags: SectionFlags::empty(),
                },
            ],
            notes: vec![
                Note::new(Fixed::from_f64(0.4), Fixed::ZERO, NoteKey::player(Direction::Down), false),
                Note::new(Fixed::from_f64(1.7), Fixed::from_f64(0.2), NoteKey::opponent(Direction::Right), true),
            ],
        }
    }

    #[test]
    fn blob_preserves_raw_values_and_flags() {
        let c = chart();
        let bytes = ChartBlob::from_chart(&c, 42).encode().expect("encode");
        let blob = ChartBlob::decode(&bytes).expect("decode");
        assert_eq!(blob.source_hash, 42);
        assert_eq!(blob.into_chart().expect("valid"), c);
    }

    #[test]
    fn stale_version_is_rejected() {
        let mut blob = ChartBlob::from_chart(&chart(), 0);
        blob.version = BLOB_VERSION + 1;
        let err = blob.into_chart().unwrap_err();
        assert!(err.contains("version"), "unexpected error: {err}");
    }

    #[test]
    fn source_hash_tracks_content() {
        assert_eq!(source_hash(b"abc"), source_hash(b"abc"));
        assert_ne!(source_hash(b"abc"), source_hash(b"abd"));
    }
}
