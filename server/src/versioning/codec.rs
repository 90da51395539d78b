//! Minting and parsing of version identifiers.
//!
//! Internally a version id is a fixed-width decimal string built from an
//! inverted millisecond timestamp, an inverted per-millisecond sequence and
//! an instance number, so that lexicographically smaller ids are newer.
//! Clients see the hex encoding of that string, which keeps the ordering
//! and is safe in URLs and headers.

use chrono::Utc;
use shared_types::{ObjectMetadataRecord, VersioningStatus};
use std::fmt::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{EngineError, Result};

/// Client-facing id of whichever record holds the null-version role.
pub const NULL_VERSION_ID: &str = "null";

pub const MAX_TIMESTAMP_MS: u64 = 999_999_999_999_999;
pub const MAX_SEQUENCE: u32 = 999_999;

const TIMESTAMP_WIDTH: usize = 15;
const SEQUENCE_WIDTH: usize = 6;
const INSTANCE_WIDTH: usize = 5;
const INTERNAL_LEN: usize = TIMESTAMP_WIDTH + SEQUENCE_WIDTH + INSTANCE_WIDTH;
const ENCODED_LEN: usize = INTERNAL_LEN * 2;

const SEQUENCE_BITS: u32 = 20;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Internal ordering of a version: when it was minted and by whom.
///
/// Derived ordering is chronological (oldest first), the reverse of the
/// string ordering of [`VersionStamp::internal_id`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionStamp {
    timestamp_ms: u64,
    sequence: u32,
    instance: u16,
}

impl VersionStamp {
    pub fn new(timestamp_ms: u64, sequence: u32, instance: u16) -> Option<Self> {
        if timestamp_ms > MAX_TIMESTAMP_MS || sequence > MAX_SEQUENCE {
            return None;
        }
        Some(Self {
            timestamp_ms,
            sequence,
            instance,
        })
    }

    /// The id under which the record is stored.
    pub fn internal_id(&self) -> String {
        format!(
            "{:0tw$}{:0sw$}{:0iw$}",
            MAX_TIMESTAMP_MS - self.timestamp_ms,
            MAX_SEQUENCE - self.sequence,
            self.instance,
            tw = TIMESTAMP_WIDTH,
            sw = SEQUENCE_WIDTH,
            iw = INSTANCE_WIDTH,
        )
    }

    pub fn from_internal(id: &str) -> Option<Self> {
        if id.len() != INTERNAL_LEN || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let (timestamp, rest) = id.split_at(TIMESTAMP_WIDTH);
        let (sequence, instance) = rest.split_at(SEQUENCE_WIDTH);

        let inverted_timestamp: u64 = timestamp.parse().ok()?;
        let inverted_sequence: u32 = sequence.parse().ok()?;
        let instance: u16 = instance.parse().ok()?;

        Self::new(
            MAX_TIMESTAMP_MS - inverted_timestamp,
            MAX_SEQUENCE - inverted_sequence,
            instance,
        )
    }
}

/// What a request's `versionId` parameter asks to operate on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionQualifier {
    /// No version given: the current version of the key.
    Current,
    /// The literal `"null"`: the record holding the null-version role.
    Null,
    Specific(VersionStamp),
}

impl fmt::Display for VersionQualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current"),
            Self::Null => f.write_str(NULL_VERSION_ID),
            Self::Specific(stamp) => f.write_str(&encode(stamp)),
        }
    }
}

/// Client-facing form of a minted stamp.
pub fn encode(stamp: &VersionStamp) -> String {
    encode_internal(&stamp.internal_id())
}

/// Client-facing form of a stored internal id.
pub fn encode_internal(internal_id: &str) -> String {
    let mut encoded = String::with_capacity(internal_id.len() * 2);
    for byte in internal_id.bytes() {
        // Writing to a String cannot fail.
        let _ = write!(encoded, "{byte:02x}");
    }
    encoded
}

/// Interpret a client-supplied `versionId` parameter.
///
/// Absent and empty values mean "current"; `"null"` addresses the null
/// version; anything else must be an id previously handed out by [`encode`].
pub fn decode(raw: Option<&str>) -> Result<VersionQualifier> {
    match raw {
        None | Some("") => Ok(VersionQualifier::Current),
        Some(NULL_VERSION_ID) => Ok(VersionQualifier::Null),
        Some(value) => decode_stamp(value)
            .map(VersionQualifier::Specific)
            .ok_or_else(|| {
                EngineError::InvalidArgument("Invalid version id specified".to_string())
            }),
    }
}

fn decode_stamp(value: &str) -> Option<VersionStamp> {
    if value.len() != ENCODED_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let bytes = value
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(pair, 16).ok()
        })
        .collect::<Option<Vec<u8>>>()?;
    let internal = String::from_utf8(bytes).ok()?;
    VersionStamp::from_internal(&internal)
}

/// Client-facing id of a stored record, regardless of bucket configuration.
pub fn client_version_id(record: &ObjectMetadataRecord) -> String {
    if record.is_null() {
        NULL_VERSION_ID.to_string()
    } else {
        encode_internal(&record.version_id)
    }
}

/// Value of the `x-amz-version-id` response header for `record`.
///
/// Buckets that never had versioning configured get no header at all, which
/// tells "never versioned" apart from "explicitly the null version".
pub fn response_header_value(
    status: VersioningStatus,
    record: &ObjectMetadataRecord,
) -> Option<String> {
    if !status.is_configured() {
        return None;
    }
    Some(client_version_id(record))
}

/// Mints strictly increasing version stamps.
///
/// The last issued `(millisecond, sequence)` pair lives in one atomic word;
/// a second mint within the same millisecond bumps the sequence.
#[derive(Debug)]
pub struct VersionIdGenerator {
    instance: u16,
    last: AtomicU64,
}

impl VersionIdGenerator {
    pub fn new(instance: u16) -> Self {
        Self {
            instance,
            last: AtomicU64::new(0),
        }
    }

    /// Ensure later mints sort newer than `stamp`, which may come from
    /// another instance or from before a restart with a lagging clock.
    pub fn advance_past(&self, stamp: &VersionStamp) {
        let floor = (stamp.timestamp_ms << SEQUENCE_BITS) | u64::from(stamp.sequence);
        self.last.fetch_max(floor, Ordering::AcqRel);
    }

    pub fn mint(&self) -> VersionStamp {
        let now = current_millis();
        let mut previous = self.last.load(Ordering::Acquire);
        loop {
            let previous_ms = previous >> SEQUENCE_BITS;
            let previous_sequence = previous & SEQUENCE_MASK;

            let (ms, sequence) = if now > previous_ms {
                (now, 0)
            } else if previous_sequence < u64::from(MAX_SEQUENCE) {
                (previous_ms, previous_sequence + 1)
            } else {
                (previous_ms + 1, 0)
            };

            let next = (ms << SEQUENCE_BITS) | sequence;
            match self
                .last
                .compare_exchange_weak(previous, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => {
                    return VersionStamp {
                        timestamp_ms: ms.min(MAX_TIMESTAMP_MS),
                        sequence: u32::try_from(sequence).unwrap_or(MAX_SEQUENCE),
                        instance: self.instance,
                    };
                }
                Err(actual) => previous = actual,
            }
        }
    }
}

fn current_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis())
        .unwrap_or(0)
        .min(MAX_TIMESTAMP_MS)
}
