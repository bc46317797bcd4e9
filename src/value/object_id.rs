use std::{
    fmt,
    str::FromStr,
    sync::{
        OnceLock,
        atomic::{AtomicU32, Ordering},
    },
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::ValueError;

static COUNTER: AtomicU32 = AtomicU32::new(0);

/// Twelve byte object identifier: 4 bytes of big-endian seconds, 5 bytes unique to the
/// generating process and a 3 byte big-endian counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub const LEN: usize = 12;

    /// Generates a fresh id stamped with the current time.
    pub fn new() -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or_default();
        Self::with_timestamp(secs)
    }

    pub fn with_timestamp(secs: u32) -> Self {
        let mut bytes = [0; Self::LEN];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(process_unique());
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Parses the 24 character hex form.
    pub fn parse_str(s: &str) -> Result<Self, ValueError> {
        let invalid = || ValueError::InvalidObjectId(s.to_owned());
        let bytes = hex::decode(s).map_err(|_| invalid())?;
        let bytes: [u8; 12] = bytes.try_into().map_err(|_| invalid())?;
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Generation time, second precision.
    pub fn timestamp(&self) -> DateTime<Utc> {
        let secs = u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]]);
        DateTime::from_timestamp(secs.into(), 0).unwrap_or(DateTime::UNIX_EPOCH)
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ObjectId {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_str(s)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn process_unique() -> &'static [u8; 5] {
    static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
    PROCESS_UNIQUE.get_or_init(|| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let digest = Sha256::new()
            .chain_update(std::process::id().to_le_bytes())
            .chain_update(nanos.to_le_bytes())
            .finalize();
        let mut unique = [0; 5];
        unique.copy_from_slice(&digest[..5]);
        unique
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let id: ObjectId = "507f1f77bcf86cd799439011".parse().unwrap();
        assert_eq!(id.to_hex(), "507f1f77bcf86cd799439011");
        assert_eq!(id.to_string(), "507f1f77bcf86cd799439011");
    }

    #[test]
    #[should_panic(expected = "InvalidObjectId")]
    fn rejects_short_hex() {
        ObjectId::parse_str("507f1f77").unwrap();
    }

    #[test]
    fn generated_ids_are_distinct_and_stamped() {
        let a = ObjectId::with_timestamp(1_700_000_000);
        let b = ObjectId::with_timestamp(1_700_000_000);
        assert_ne!(a, b);
        assert_eq!(a.timestamp().timestamp(), 1_700_000_000);
        assert_eq!(a.bytes()[4..9], b.bytes()[4..9]);
    }
}
