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

//! This crate mints snowflake-style primary keys for every persisted entity of an application (users, prompts, tags,
//! prompt versions, ...).
//!
//! An [`Identifier`] is a 64-bit integer made of the milliseconds elapsed since [`EPOCH_MILLIS`], a datacenter ID, a
//! worker ID, and a sequence number that disambiguates identifiers minted in the same millisecond. The datacenter and
//! worker IDs partition the identifier space, so any number of processes can mint identifiers concurrently without
//! coordinating, as long as each live process was assigned a distinct `(datacenter, worker)` pair. Refer to the
//! [`layout`] module for the exact bit layout.
//!
//! A [`Generator`] owns the mutable state of one such process. It's meant to be constructed once at startup and
//! handed to every code path that inserts rows. There is no global instance. Tests construct their own generators and
//! drive them with a [`ManualClock`] or any other [`Clock`] implementation.
//!
//! # Example
//!
//! ```
//! use snowkey::{Generator, ManualClock, EPOCH_MILLIS};
//!
//! // One second after the epoch, in datacenter 1, worker 1
//! let clock = ManualClock::new(EPOCH_MILLIS + 1000);
//! let generator = Generator::with_clock(1, 1, clock.clone()).unwrap();
//!
//! let id = generator.next_id().unwrap();
//! assert_eq!(4_194_439_168, id.get());
//! assert_eq!((1000, 1, 1, 0), (
//!     id.get_timestamp_raw(),
//!     id.get_datacenter_id(),
//!     id.get_worker_id(),
//!     id.get_sequence_number(),
//! ));
//!
//! // Identifiers minted in the same millisecond only differ in their sequence number
//! assert_eq!("4194439169", generator.next_id_string().unwrap());
//! ```
//!
//! # Validity horizon
//!
//! The timestamp field holds 41 bits, so identifiers can be minted until [`EXPIRY_MILLIS`]
//! (2093-09-06T15:47:35.551Z). Past that point, generators return [`Error::TimestampExhausted`].

#![warn(missing_docs, missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod clock;
mod config;
mod identifier;
pub mod layout;
mod sync;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::GeneratorConfig;
pub use identifier::Identifier;

use crate::sync::{hint, Arc, Mutex};
use tracing::{debug, error, trace, warn};

/// The epoch of every identifier: 2024-01-01T00:00:00Z, in milliseconds since the Unix epoch.
pub const EPOCH_MILLIS: u64 = 1_704_067_200_000;

/// The last millisecond (since the Unix epoch) that fits into an identifier: 2093-09-06T15:47:35.551Z.
pub const EXPIRY_MILLIS: u64 = EPOCH_MILLIS + layout::MAX_TIMESTAMP;

/// The default number of clock readings a generator makes while waiting for the next millisecond.
///
/// Reading the system clock takes a few dozen nanoseconds, so this covers several hundred milliseconds. A clock that
/// doesn't advance within this budget is considered stalled.
pub const DEFAULT_MAX_SPINS: u64 = 1 << 24;

/// A thread-safe identifier generator for one `(datacenter, worker)` pair.
///
/// Cloning a generator returns another handle to the *same* generator. I.e., clones share their sequence state and
/// never mint the same identifier twice. Creating a second generator for the same pair with
/// [`new`](Self::new) doesn't share any state and breaks uniqueness.
///
/// # Example
///
/// ```
/// use snowkey::Generator;
/// use std::thread;
///
/// let generator = Generator::new(1, 1).unwrap();
/// let res1 = {
///     let generator = generator.clone();
///     thread::spawn(move || generator.next_id().unwrap())
/// };
/// let res2 = {
///     let generator = generator.clone();
///     thread::spawn(move || generator.next_id().unwrap())
/// };
/// assert_ne!(res1.join().unwrap(), res2.join().unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Generator<C = SystemClock>
where
    C: Clock,
{
    worker_id: u64,
    datacenter_id: u64,
    max_spins: u64,
    clock: C,
    // Held across the clock reading and the state update of every `next_id` call
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    // `None` until the first identifier is minted
    last_timestamp: Option<u64>,
    sequence: u64,
}

impl Generator<SystemClock> {
    /// Creates a generator that reads the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if `worker_id` or `datacenter_id` exceeds
    /// [`MAX_WORKER_ID`](layout::MAX_WORKER_ID) or [`MAX_DATACENTER_ID`](layout::MAX_DATACENTER_ID) respectively.
    /// This indicates a deployment mistake, so callers should abort startup rather than retry.
    pub fn new(worker_id: u64, datacenter_id: u64) -> Result<Self> {
        Self::with_clock(worker_id, datacenter_id, SystemClock)
    }
}

impl<C> Generator<C>
where
    C: Clock,
{
    /// Creates a generator that reads the given clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] under the same conditions as [`Generator::new`].
    pub fn with_clock(worker_id: u64, datacenter_id: u64, clock: C) -> Result<Self> {
        if worker_id > layout::MAX_WORKER_ID {
            return Err(Error::Configuration {
                parameter: "worker ID",
                value: worker_id,
                max: layout::MAX_WORKER_ID,
            });
        }
        if datacenter_id > layout::MAX_DATACENTER_ID {
            return Err(Error::Configuration {
                parameter: "datacenter ID",
                value: datacenter_id,
                max: layout::MAX_DATACENTER_ID,
            });
        }
        debug!(worker_id, datacenter_id, "created identifier generator");
        Ok(Self {
            worker_id,
            datacenter_id,
            max_spins: DEFAULT_MAX_SPINS,
            clock,
            state: Arc::new(Mutex::new(State::default())),
        })
    }

    /// Sets how many clock readings [`next_id`](Self::next_id) makes while waiting for the next millisecond before
    /// giving up with [`Error::StalledClock`].
    pub fn with_max_spins(mut self, max_spins: u64) -> Self {
        self.max_spins = max_spins;
        self
    }

    /// Returns this generator's worker ID.
    #[inline]
    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    /// Returns this generator's datacenter ID.
    #[inline]
    pub fn datacenter_id(&self) -> u64 {
        self.datacenter_id
    }

    /// Mints a new identifier.
    ///
    /// The returned identifier is greater than every identifier previously minted by this generator (or its clones).
    /// If all 4096 sequence numbers of the current millisecond are taken, this spins until the clock reaches the next
    /// millisecond.
    ///
    /// # Errors
    ///
    /// * [`Error::ClockRegression`] if the clock reads earlier than the last minted identifier. No state is changed,
    ///   so the generator recovers once the clock catches up.
    /// * [`Error::StalledClock`] if the clock didn't reach the next millisecond within the spin budget.
    /// * [`Error::InvalidEpoch`] if the clock reads earlier than [`EPOCH_MILLIS`].
    /// * [`Error::TimestampExhausted`] if the clock reads later than [`EXPIRY_MILLIS`].
    ///
    /// None of these are caused by the caller's input. Request handlers should fail the whole operation with an
    /// internal error.
    pub fn next_id(&self) -> Result<Identifier> {
        // Every branch below leaves the state consistent, so a panic elsewhere can't corrupt it
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        // Read the clock *after* acquiring the lock, so that our reading can't be older than the committed timestamp
        // of another thread
        let mut now = self.clock.now_millis();
        let sequence = match state.last_timestamp {
            Some(last) if now < last => {
                let millis = last - now;
                error!(millis, last_timestamp = last, "clock moved backwards, refusing to mint an identifier");
                return Err(Error::ClockRegression { millis });
            }
            Some(last) if now == last => {
                let sequence = (state.sequence + 1) & layout::MAX_SEQUENCE;
                if sequence == 0 {
                    trace!(timestamp = last, "sequence exhausted, waiting for the next millisecond");
                    now = self.wait_next_millis(last)?;
                }
                sequence
            }
            _ => 0,
        };
        let timestamp = Self::elapsed_since_epoch(now)?;
        state.last_timestamp = Some(now);
        state.sequence = sequence;
        Ok(Identifier::from_parts(timestamp, self.datacenter_id, self.worker_id, sequence))
    }

    /// Mints a new identifier and returns its decimal representation.
    ///
    /// This is the form handed to external consumers. Refer to [`next_id`](Self::next_id) for errors.
    pub fn next_id_string(&self) -> Result<String> {
        self.next_id().map(|id| id.to_string())
    }

    /// Spins until the clock reads later than `last` and returns that reading.
    fn wait_next_millis(&self, last: u64) -> Result<u64> {
        for _ in 0..self.max_spins {
            let now = self.clock.now_millis();
            if now > last {
                return Ok(now);
            }
            hint::spin_loop();
        }
        warn!(
            spins = self.max_spins,
            last_timestamp = last,
            "clock did not advance while waiting for the next millisecond"
        );
        Err(Error::StalledClock { spins: self.max_spins })
    }

    /// Converts a Unix timestamp in milliseconds into the identifier's timestamp field.
    fn elapsed_since_epoch(now: u64) -> Result<u64> {
        let elapsed = now.checked_sub(EPOCH_MILLIS).ok_or(Error::InvalidEpoch)?;
        if elapsed > layout::MAX_TIMESTAMP {
            return Err(Error::TimestampExhausted);
        }
        Ok(elapsed)
    }
}

/// Errors that can occur when creating a [`Generator`] or minting and parsing [`Identifier`]s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A worker or datacenter ID is out of range.
    ///
    /// This is a deployment misconfiguration. The process shouldn't serve requests that need identifiers.
    #[error("{parameter} must be between 0 and {max}, got {value}")]
    Configuration {
        /// The offending parameter.
        parameter: &'static str,
        /// The rejected value.
        value: u64,
        /// The largest accepted value.
        max: u64,
    },
    /// The clock went backwards by the given number of milliseconds since the last identifier was minted.
    ///
    /// Retrying immediately will most likely fail again. The generator recovers once the clock catches up.
    #[error("clock moved backwards, refusing to mint an identifier for {millis} milliseconds")]
    ClockRegression {
        /// How far the clock went backwards.
        millis: u64,
    },
    /// The clock didn't advance to the next millisecond after the sequence space of the current one was exhausted.
    #[error("clock did not advance after {spins} readings")]
    StalledClock {
        /// The number of clock readings made.
        spins: u64,
    },
    /// The clock reads earlier than [`EPOCH_MILLIS`].
    #[error("clock reads earlier than the identifier epoch")]
    InvalidEpoch,
    /// The clock reads later than [`EXPIRY_MILLIS`], so the timestamp doesn't fit into an identifier anymore.
    ///
    /// Unlike the other errors, this one is permanent.
    #[error("timestamp exceeds the identifier layout")]
    TimestampExhausted,
    /// A value isn't the representation of an identifier.
    #[error("`{0}` is not a valid identifier")]
    InvalidIdentifier(String),
}

impl Error {
    /// Returns whether this error stems from an invalid generator configuration rather than from minting.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

/// The primary result type of this crate.
pub type Result<T> = std::result::Result<T, Error>;

// Skip coverage: We don't test the coverage of our unit tests
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex as StdMutex;

    /// A clock that replays scripted readings and repeats the last one afterwards.
    #[derive(Debug)]
    struct ScriptedClock {
        readings: StdMutex<VecDeque<u64>>,
        last: StdMutex<u64>,
    }

    impl ScriptedClock {
        fn new(readings: impl IntoIterator<Item = u64>) -> Self {
            let readings: VecDeque<u64> = readings.into_iter().collect();
            let last = readings.front().copied().unwrap_or(EPOCH_MILLIS);
            Self {
                readings: StdMutex::new(readings),
                last: StdMutex::new(last),
            }
        }
    }

    impl Clock for ScriptedClock {
        fn now_millis(&self) -> u64 {
            let mut last = self.last.lock().unwrap();
            if let Some(next) = self.readings.lock().unwrap().pop_front() {
                *last = next;
            }
            *last
        }
    }

    const T: u64 = EPOCH_MILLIS + 1000;

    #[test]
    fn construction_bounds() {
        assert!(matches!(
            Generator::new(32, 0),
            Err(Error::Configuration { parameter: "worker ID", value: 32, max: 31 })
        ));
        assert!(matches!(
            Generator::new(0, 32),
            Err(Error::Configuration { parameter: "datacenter ID", value: 32, max: 31 })
        ));
        assert!(Generator::new(u64::MAX, u64::MAX).unwrap_err().is_configuration());

        let generator = Generator::new(31, 31).unwrap();
        assert_eq!(31, generator.worker_id());
        assert_eq!(31, generator.datacenter_id());
        assert!(Generator::new(0, 0).is_ok());
    }

    #[test]
    fn worked_example() {
        let generator = Generator::with_clock(1, 1, ManualClock::new(T)).unwrap();
        let id = generator.next_id().unwrap();
        assert_eq!((1000 << 22) | (1 << 17) | (1 << 12), id.get());
        assert_eq!(4_194_439_168, id.get());
    }

    #[test]
    fn sequence_resets_every_millisecond() {
        let clock = ManualClock::new(T);
        let generator = Generator::with_clock(2, 3, clock.clone()).unwrap();
        assert_eq!(0, generator.next_id().unwrap().get_sequence_number());
        assert_eq!(1, generator.next_id().unwrap().get_sequence_number());
        assert_eq!(2, generator.next_id().unwrap().get_sequence_number());

        clock.advance(1);
        let id = generator.next_id().unwrap();
        assert_eq!(0, id.get_sequence_number());
        assert_eq!(1001, id.get_timestamp_raw());

        // Skipping milliseconds also resets the sequence
        clock.advance(50);
        let id = generator.next_id().unwrap();
        assert_eq!(0, id.get_sequence_number());
        assert_eq!(1051, id.get_timestamp_raw());
    }

    #[test]
    fn sequence_wraparound() {
        // 4097 readings for 4097 calls in the same millisecond, then the wait loop sees the same millisecond twice more
        // before the clock advances
        let readings = std::iter::repeat(T).take(4097 + 2).chain([T + 1]);
        let generator = Generator::with_clock(1, 1, ScriptedClock::new(readings)).unwrap();

        let ids: Vec<_> = (0..4097).map(|_| generator.next_id().unwrap()).collect();
        let (same_millis, next_millis) = ids.split_at(4096);

        let sequences: HashSet<_> = same_millis
            .iter()
            .inspect(|id| assert_eq!(1000, id.get_timestamp_raw()))
            .map(Identifier::get_sequence_number)
            .collect();
        assert_eq!(4096, sequences.len());
        assert_eq!(Some(&4095), sequences.iter().max());

        let wrapped = next_millis[0];
        assert_eq!(1001, wrapped.get_timestamp_raw());
        assert_eq!(0, wrapped.get_sequence_number());
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn stalled_clock_is_bounded() {
        let clock = ManualClock::new(T);
        let generator = Generator::with_clock(1, 1, clock.clone()).unwrap().with_max_spins(100);
        for _ in 0..4096 {
            generator.next_id().unwrap();
        }
        assert_eq!(Err(Error::StalledClock { spins: 100 }), generator.next_id());

        // The failed call didn't commit anything, so the generator continues once the clock moves
        clock.advance(1);
        let id = generator.next_id().unwrap();
        assert_eq!(1001, id.get_timestamp_raw());
        assert_eq!(0, id.get_sequence_number());
    }

    #[test]
    fn clock_regression() {
        let clock = ManualClock::new(T);
        let generator = Generator::with_clock(1, 1, clock.clone()).unwrap();
        let before = generator.next_id().unwrap();

        clock.set(T - 5);
        assert_eq!(Err(Error::ClockRegression { millis: 5 }), generator.next_id());
        assert_eq!(Err(Error::ClockRegression { millis: 5 }), generator.next_id());

        // Once the clock catches up, the generator continues where it left off
        clock.set(T);
        let after = generator.next_id().unwrap();
        assert!(after > before);
        assert_eq!(1, after.get_sequence_number());
    }

    #[test]
    fn clock_before_epoch() {
        let generator = Generator::with_clock(0, 0, ManualClock::new(EPOCH_MILLIS - 1)).unwrap();
        assert_eq!(Err(Error::InvalidEpoch), generator.next_id());

        let generator = Generator::with_clock(0, 0, ManualClock::new(EPOCH_MILLIS)).unwrap();
        assert_eq!(0, generator.next_id().unwrap().get());
    }

    #[test]
    fn timestamp_exhaustion() {
        let clock = ManualClock::new(EXPIRY_MILLIS);
        let generator = Generator::with_clock(31, 31, clock.clone()).unwrap();
        let last = generator.next_id().unwrap();
        assert_eq!(layout::MAX_TIMESTAMP, last.get_timestamp_raw());
        assert!(last.get_i64() > 0);

        clock.advance(1);
        assert_eq!(Err(Error::TimestampExhausted), generator.next_id());
    }

    #[test]
    fn clones_share_state() {
        let generator = Generator::with_clock(4, 5, ManualClock::new(T)).unwrap();
        let clone = generator.clone();
        let first = generator.next_id().unwrap();
        let second = clone.next_id().unwrap();
        assert_eq!(0, first.get_sequence_number());
        assert_eq!(1, second.get_sequence_number());
    }

    #[test]
    fn decimal_string() {
        let generator = Generator::with_clock(1, 1, ManualClock::new(T)).unwrap();
        assert_eq!("4194439168", generator.next_id_string().unwrap());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            "worker ID must be between 0 and 31, got 32",
            Generator::new(32, 0).unwrap_err().to_string()
        );
        assert_eq!(
            "clock moved backwards, refusing to mint an identifier for 5 milliseconds",
            Error::ClockRegression { millis: 5 }.to_string()
        );
    }

    #[test]
    fn expiry() {
        // 2093-09-06T15:47:35.551Z
        assert_eq!(3_903_090_455_551, EXPIRY_MILLIS);
    }
}
// End skip coverage
