//! Batch-level duplicate detection for subscription-id lists.
//!
//! A `bill` batch naming the same subscription twice would let it be billed
//! twice in one call, so batches are screened with a single-pass
//! open-addressing probe table before any item is processed. The table is
//! constant extra state sized by tier, and the caller's input is never
//! mutated or reordered (sorting would do both).

use rand::Rng;

use crate::error::CoreError;
use crate::types::SubscriptionId;

/// Probe-table size for batches of up to `SMALL_BATCH_MAX` items.
const SMALL_TABLE_SLOTS: usize = 421;

/// Probe-table size for batches above `SMALL_BATCH_MAX` items.
const LARGE_TABLE_SLOTS: usize = 1021;

/// Largest batch the small table accepts.
const SMALL_BATCH_MAX: usize = 200;

/// Largest batch accepted at all.
pub const MAX_BATCH: usize = 500;

/// Fold a 32-byte id into a u64 probe key.
fn fold(id: &SubscriptionId) -> u64 {
    let bytes = id.as_bytes();
    let mut key = 0u64;
    for chunk in bytes.chunks_exact(8) {
        let mut word = [0u8; 8];
        word.copy_from_slice(chunk);
        key ^= u64::from_le_bytes(word);
    }
    key
}

/// Report whether `ids` contains the same subscription id twice.
///
/// Batches longer than [`MAX_BATCH`] are rejected as a call-level error.
/// Each stored slot holds the folded id plus a random per-call offset, so a
/// slot value of zero always means "empty" even when a legitimately
/// all-zero id is present.
pub fn has_duplicates(ids: &[SubscriptionId]) -> Result<bool, CoreError> {
    if ids.len() > MAX_BATCH {
        return Err(CoreError::BatchTooLarge {
            len: ids.len(),
            max: MAX_BATCH,
        });
    }
    if ids.len() < 2 {
        return Ok(false);
    }

    let slots = if ids.len() <= SMALL_BATCH_MAX {
        SMALL_TABLE_SLOTS
    } else {
        LARGE_TABLE_SLOTS
    };

    let offset: u64 = rand::thread_rng().gen_range(1..u64::MAX);
    let mut table = vec![0u64; slots];

    for id in ids {
        let key = fold(id);
        let sentinel = key.wrapping_add(offset).max(1);
        let mut index = (key as usize) % slots;

        loop {
            let slot = table[index];
            if slot == 0 {
                table[index] = sentinel;
                break;
            }
            if slot == sentinel {
                return Ok(true);
            }
            // Linear probe; table is strictly larger than any accepted
            // batch, so an empty slot always exists.
            index = (index + 1) % slots;
        }
    }

    Ok(false)
}
