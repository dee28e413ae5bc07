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

use crate::{Clock, Generator, Result, SystemClock};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The startup configuration of a [`Generator`].
///
/// Both IDs are assigned out of band (e.g. by the orchestrator through environment variables or a static
/// configuration file) and must be unique among all processes that are running at the same time. With the `serde`
/// feature, this type can be embedded into an application's configuration file. Missing fields fall back to their
/// defaults.
///
/// # Example
///
/// ```
/// use snowkey::GeneratorConfig;
///
/// let config = GeneratorConfig {
///     worker_id: 7,
///     ..GeneratorConfig::default()
/// };
/// let generator = config.build().unwrap();
/// assert_eq!(7, generator.worker_id());
/// assert_eq!(1, generator.datacenter_id());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct GeneratorConfig {
    /// The worker ID, `0..=31`.
    pub worker_id: u64,
    /// The datacenter ID, `0..=31`.
    pub datacenter_id: u64,
}

impl Default for GeneratorConfig {
    /// Worker 1 in datacenter 1, which is what single-instance deployments have always used.
    fn default() -> Self {
        Self {
            worker_id: 1,
            datacenter_id: 1,
        }
    }
}

impl GeneratorConfig {
    /// Creates a generator reading the system clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if either ID is out of range.
    pub fn build(&self) -> Result<Generator<SystemClock>> {
        Generator::new(self.worker_id, self.datacenter_id)
    }

    /// Creates a generator reading the given clock.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`](crate::Error::Configuration) if either ID is out of range.
    pub fn build_with_clock<C>(&self, clock: C) -> Result<Generator<C>>
    where
        C: Clock,
    {
        Generator::with_clock(self.worker_id, self.datacenter_id, clock)
    }
}
