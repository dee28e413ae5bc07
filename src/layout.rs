/*
 * Copyright © 2023 Archer <archer@nefarious.dev>
 * Licensed under the Apache License, Version 2.0 (the "Licence");
 * you may not use this file except in compliance with the Licence.
 * You may obtain a copy of the Licence at
 *     https://www.apache.org/licenses/LICENSE-2.0
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the Licence is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the Licence for the specific language governing permissions and
 * limitations under the Licence.
 */

//! The bit layout of an [`Identifier`](crate::Identifier).
//!
//! Identifiers consist of a leading `0` bit, 41 bits for the number of milliseconds since [`EPOCH_MILLIS`], 5 bits for
//! the datacenter ID, 5 bits for the worker ID, and 12 bits for the sequence number:
//!
//! ```text
//! | 0 | timestamp (41) | datacenter (5) | worker (5) | sequence (12) |
//! 63  62               21               16           11              0
//! ```
//!
//! The leading `0` bit guarantees that identifiers keep their ordering when stored in signed 64-bit columns.
//!
//! [`EPOCH_MILLIS`]: crate::EPOCH_MILLIS

/// Number of bits dedicated to the timestamp.
pub const TIMESTAMP_BITS: u32 = 41;
/// Number of bits dedicated to the datacenter ID.
pub const DATACENTER_ID_BITS: u32 = 5;
/// Number of bits dedicated to the worker ID.
pub const WORKER_ID_BITS: u32 = 5;
/// Number of bits dedicated to the sequence number.
pub const SEQUENCE_BITS: u32 = 12;

/// Offset of the worker ID.
pub const WORKER_ID_SHIFT: u32 = SEQUENCE_BITS;
/// Offset of the datacenter ID.
pub const DATACENTER_ID_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS;
/// Offset of the timestamp.
pub const TIMESTAMP_SHIFT: u32 = SEQUENCE_BITS + WORKER_ID_BITS + DATACENTER_ID_BITS;

/// The largest timestamp (in milliseconds since the epoch) an identifier can hold.
pub const MAX_TIMESTAMP: u64 = (1 << TIMESTAMP_BITS) - 1;
/// The largest supported datacenter ID.
pub const MAX_DATACENTER_ID: u64 = (1 << DATACENTER_ID_BITS) - 1;
/// The largest supported worker ID.
pub const MAX_WORKER_ID: u64 = (1 << WORKER_ID_BITS) - 1;
/// The largest sequence number. One millisecond holds `MAX_SEQUENCE + 1` identifiers per worker.
pub const MAX_SEQUENCE: u64 = (1 << SEQUENCE_BITS) - 1;

const TIMESTAMP_MASK: u64 = MAX_TIMESTAMP << TIMESTAMP_SHIFT;
const DATACENTER_ID_MASK: u64 = MAX_DATACENTER_ID << DATACENTER_ID_SHIFT;
const WORKER_ID_MASK: u64 = MAX_WORKER_ID << WORKER_ID_SHIFT;

/// Packs the given fields into the integer representation of an identifier.
///
/// # Panics
///
/// Panics if any field exceeds the number of bits dedicated to it. [`Generator`](crate::Generator) validates every
/// field before calling this, so this only fires on misuse.
///
/// # Example
///
/// ```
/// use snowkey::layout;
///
/// assert_eq!(0x400000, layout::construct(1, 0, 0, 0));
/// assert_eq!(4_194_439_168, layout::construct(1000, 1, 1, 0));
/// ```
#[inline]
pub fn construct(timestamp: u64, datacenter_id: u64, worker_id: u64, sequence_number: u64) -> u64 {
    assert!(
        timestamp <= MAX_TIMESTAMP
            && datacenter_id <= MAX_DATACENTER_ID
            && worker_id <= MAX_WORKER_ID
            && sequence_number <= MAX_SEQUENCE
    );
    (timestamp << TIMESTAMP_SHIFT)
        | (datacenter_id << DATACENTER_ID_SHIFT)
        | (worker_id << WORKER_ID_SHIFT)
        | sequence_number
}

/// Returns the timestamp (milliseconds since the epoch) stored in the given identifier.
#[inline]
pub fn timestamp(input: u64) -> u64 {
    (input & TIMESTAMP_MASK) >> TIMESTAMP_SHIFT
}

/// Returns the datacenter ID stored in the given identifier.
#[inline]
pub fn datacenter_id(input: u64) -> u64 {
    (input & DATACENTER_ID_MASK) >> DATACENTER_ID_SHIFT
}

/// Returns the worker ID stored in the given identifier.
#[inline]
pub fn worker_id(input: u64) -> u64 {
    (input & WORKER_ID_MASK) >> WORKER_ID_SHIFT
}

/// Returns the sequence number stored in the given identifier.
#[inline]
pub fn sequence_number(input: u64) -> u64 {
    input & MAX_SEQUENCE
}

/// Returns whether the given integer could have been produced by this layout.
///
/// Every combination of fields is valid, so this only checks the leading `0` bit.
#[inline]
pub fn is_valid(input: u64) -> bool {
    input < 1 << 63
}

// End skip coverage
