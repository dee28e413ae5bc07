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

//! Millisecond clocks that drive a [`Generator`](crate::Generator).

use crate::sync::atomic::{AtomicU64, Ordering};
use crate::sync::Arc;
use std::time::SystemTime;

/// A source of wall-clock time with millisecond resolution.
///
/// The generator reads its clock while holding its lock, so implementations should be cheap and must not block.
/// Implementations don't have to be monotonic. A reading that precedes an earlier reading is reported to the caller as
/// [`Error::ClockRegression`](crate::Error::ClockRegression).
///
/// # Example
///
/// ```
/// use snowkey::{Clock, Generator, EPOCH_MILLIS};
///
/// #[derive(Debug)]
/// struct FixedClock(u64);
///
/// impl Clock for FixedClock {
///     fn now_millis(&self) -> u64 {
///         self.0
///     }
/// }
///
/// let generator = Generator::with_clock(0, 0, FixedClock(EPOCH_MILLIS + 5)).unwrap();
/// assert_eq!(5, generator.next_id().unwrap().get_timestamp_raw());
/// ```
pub trait Clock {
    /// Returns the number of milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

impl<C> Clock for std::sync::Arc<C>
where
    C: Clock + ?Sized,
{
    #[inline]
    fn now_millis(&self) -> u64 {
        (**self).now_millis()
    }
}

/// The operating system's wall clock.
///
/// Readings before the Unix epoch are reported as `0`, which the generator rejects as
/// [`Error::InvalidEpoch`](crate::Error::InvalidEpoch).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can keep one handle while the generator owns another.
///
/// # Example
///
/// ```
/// use snowkey::{Error, Generator, ManualClock, EPOCH_MILLIS};
///
/// let clock = ManualClock::new(EPOCH_MILLIS + 10);
/// let generator = Generator::with_clock(3, 4, clock.clone()).unwrap();
/// let first = generator.next_id().unwrap();
///
/// clock.advance(1);
/// let second = generator.next_id().unwrap();
/// assert!(first < second);
///
/// clock.set(EPOCH_MILLIS);
/// assert!(matches!(generator.next_id(), Err(Error::ClockRegression { millis: 11 })));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock frozen at the given number of milliseconds since the Unix epoch.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(millis)),
        }
    }

    /// Moves the clock to the given time. Moving it backwards is allowed.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::Release);
    }

    /// Moves the clock forward by the given number of milliseconds.
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::AcqRel);
    }

    /// Returns the clock's current reading.
    pub fn get(&self) -> u64 {
        self.millis.load(Ordering::Acquire)
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now_millis(&self) -> u64 {
        self.get()
    }
}
