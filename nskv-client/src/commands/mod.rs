//! # Typed Commands
//!
//! Per-command helpers on [`Manager`](crate::Manager), grouped by data type.
//! Every helper prefixes its key(s), runs one command on a leased connection
//! and decodes the reply explicitly.

mod hash;
mod json;
mod keys;
mod list;
mod set;
mod strings;
mod zset;

use std::time::Duration;

use redis::Cmd;

pub use keys::Ttl;
pub use zset::ZSetMember;

/// Number of keys requested per `SCAN` page in batch deletes.
pub const SCAN_BATCH: usize = 100;

/// Appends `EX secs` or `PX millis` to a `SET`. Zero means no expiry.
pub(crate) fn push_expiry(cmd: &mut Cmd, ttl: Option<Duration>) {
    match ttl {
        Some(ttl) if ttl.is_zero() => {}
        Some(ttl) if whole_seconds(ttl) => {
            cmd.arg("EX").arg(ttl.as_secs());
        }
        Some(ttl) => {
            cmd.arg("PX").arg(millis(ttl));
        }
        None => {}
    }
}

/// `EXPIRE key secs`, or `PEXPIRE key millis` when sub-second precision is
/// needed.
pub(crate) fn expire_command(key: &str, ttl: Duration) -> Cmd {
    if whole_seconds(ttl) {
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(key).arg(ttl.as_secs());
        cmd
    } else {
        let mut cmd = redis::cmd("PEXPIRE");
        cmd.arg(key).arg(millis(ttl));
        cmd
    }
}

fn whole_seconds(ttl: Duration) -> bool {
    ttl.as_secs() > 0 && ttl.subsec_millis() == 0
}

// Rounds sub-millisecond remainders away; never below one.
fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
