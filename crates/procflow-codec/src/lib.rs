//! # Procflow Codec
//!
//! Byte-level representations used by the Procflow engine: the artifact
//! recorded for one activity of one process instance, the tagged snapshot
//! holding an instance's full artifact history, and the `<value>` document
//! recorded by conditional activities.
//!
//! ## Example
//!
//! ```
//! use procflow_codec::{
//!     decode_snapshot, encode_snapshot, Artifact, ArtifactEntry, InstanceSnapshot,
//!     SnapshotHeader,
//! };
//!
//! let snapshot = InstanceSnapshot {
//!     header: SnapshotHeader {
//!         instance_id: "inst-1".to_string(),
//!         process_definition_id: "provisioning".to_string(),
//!         current_activity_id: "survey".to_string(),
//!     },
//!     entries: vec![ArtifactEntry {
//!         artifact_definition_id: "survey-form".to_string(),
//!         artifact: Artifact::new("a-1", b"<form/>".to_vec()).with_share("site", "north-01"),
//!         interrupted: false,
//!     }],
//! };
//!
//! let bytes = encode_snapshot(&snapshot).unwrap();
//! let decoded = decode_snapshot(&bytes);
//! assert_eq!(decoded.entries, snapshot.entries);
//! assert!(decoded.skipped.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod artifact;
mod conditional;
mod error;
mod snapshot;

pub use artifact::{Artifact, SharedPair};
pub use conditional::{decode_boolean_value, encode_boolean_value, try_decode_boolean_value};
pub use error::CodecError;
pub use snapshot::{
    decode_snapshot, encode_snapshot, ArtifactEntry, DecodedSnapshot, InstanceSnapshot,
    SkippedEntry, SnapshotHeader, INTERRUPTED_SHARE_KEY,
};

/// Returns the version of the codec crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
