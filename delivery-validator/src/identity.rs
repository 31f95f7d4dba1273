//! Record identities.
//!
//! The load producer writes every log line as
//! `<8-digit zero padded id>_<13-digit epoch millis>_<random trailer>`, e.g.
//! `10029999_1639151827578_RandomString`. Only the id prefix matters here, the
//! timestamp is consumed by the delay tooling, not by this crate.

use crate::error::MalformedRecord;

pub type RecordIdentity = u32;

pub const IDENTITY_PREFIX_LEN: usize = 8;

pub fn extract_identity(log: &str) -> Result<RecordIdentity, MalformedRecord> {
    if log.len() < IDENTITY_PREFIX_LEN {
        return Err(MalformedRecord::TooShort {
            expected: IDENTITY_PREFIX_LEN,
            actual: log.len(),
        });
    }

    // `get` fails when byte 8 is inside a multi-byte char, which can't be all digits anyway
    let Some(prefix) = log.get(..IDENTITY_PREFIX_LEN) else {
        return Err(MalformedRecord::InvalidPrefix(
            log.chars().take(IDENTITY_PREFIX_LEN).collect(),
        ));
    };

    // u32::from_str would accept a leading '+'
    if !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return Err(MalformedRecord::InvalidPrefix(prefix.to_string()));
    }

    prefix
        .parse::<RecordIdentity>()
        .map_err(|_| MalformedRecord::InvalidPrefix(prefix.to_string()))
}
