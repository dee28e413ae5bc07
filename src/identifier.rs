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

//! The [`Identifier`] type minted by a [`Generator`](crate::Generator).

use crate::{layout, Error, Result, EPOCH_MILLIS};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

/// A 64-bit, time-sortable primary key.
///
/// Identifiers are unique as long as every live generator uses a distinct datacenter and worker ID pair. Identifiers
/// minted by the same generator are strictly increasing. Identifiers from different generators are ordered by their
/// millisecond only.
///
/// The canonical external form is the decimal string returned by [`Display`]. Consumers that store numbers as IEEE
/// doubles (e.g. JavaScript) can't represent every identifier exactly, so APIs should hand out the string and parse it
/// back with [`FromStr`].
///
/// # Example
///
/// ```
/// use snowkey::Identifier;
///
/// let id: Identifier = "4194439168".parse().unwrap();
/// assert_eq!(1000, id.get_timestamp_raw());
/// assert_eq!(1, id.get_datacenter_id());
/// assert_eq!(1, id.get_worker_id());
/// assert_eq!(0, id.get_sequence_number());
/// assert_eq!("4194439168", id.to_string());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Identifier {
    inner: u64,
}

impl Identifier {
    /// Returns the identifier for the given integer representation.
    ///
    /// If the leading bit is set, this returns [`Error::InvalidIdentifier`] instead, as no generator can produce such
    /// a value.
    pub fn from_raw(input: u64) -> Result<Self> {
        if !layout::is_valid(input) {
            return Err(Error::InvalidIdentifier(input.to_string()));
        }
        Ok(Self { inner: input })
    }

    /// Packs already-validated fields. Used by the generator only.
    #[inline]
    pub(crate) fn from_parts(timestamp: u64, datacenter_id: u64, worker_id: u64, sequence_number: u64) -> Self {
        Self {
            inner: layout::construct(timestamp, datacenter_id, worker_id, sequence_number),
        }
    }

    /// Returns the integer representation of this identifier.
    #[inline]
    pub fn get(&self) -> u64 {
        self.inner
    }

    /// Returns this identifier as a positive signed integer, for storage in signed 64-bit columns.
    #[inline]
    pub fn get_i64(&self) -> i64 {
        // The layout guarantees a leading 0, so this never turns negative
        self.inner as i64
    }

    /// Returns the number of milliseconds between [`EPOCH_MILLIS`] and this identifier's birth.
    #[inline]
    pub fn get_timestamp_raw(&self) -> u64 {
        layout::timestamp(self.inner)
    }

    /// Returns the number of milliseconds between the Unix epoch and this identifier's birth.
    #[inline]
    pub fn get_unix_millis(&self) -> u64 {
        EPOCH_MILLIS + self.get_timestamp_raw()
    }

    /// Returns the time of this identifier's birth.
    ///
    /// The largest timestamp an identifier can hold lies in 2093, so this is always representable.
    pub fn get_timestamp(&self) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_millis(self.get_unix_millis())
    }

    /// Returns the ID of the datacenter this identifier was minted in.
    #[inline]
    pub fn get_datacenter_id(&self) -> u64 {
        layout::datacenter_id(self.inner)
    }

    /// Returns the ID of the worker that minted this identifier.
    #[inline]
    pub fn get_worker_id(&self) -> u64 {
        layout::worker_id(self.inner)
    }

    /// Returns this identifier's sequence number.
    ///
    /// A sequence number of `n` means that this is the `n + 1`th identifier its worker minted in that millisecond.
    #[inline]
    pub fn get_sequence_number(&self) -> u64 {
        layout::sequence_number(self.inner)
    }
}

impl Display for Identifier {
    /// Displays the identifier as a decimal-encoded integer.
    ///
    /// You can losslessly convert this method's output back into the same identifier.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        // Only plain decimal digits, `u64::from_str` would also take a leading `+`
        if !s.bytes().next().is_some_and(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidIdentifier(s.to_owned()));
        }
        let raw = s.parse::<u64>().map_err(|_| Error::InvalidIdentifier(s.to_owned()))?;
        Self::from_raw(raw)
    }
}

impl TryFrom<u64> for Identifier {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self> {
        Self::from_raw(value)
    }
}

impl TryFrom<i64> for Identifier {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        let raw = u64::try_from(value).map_err(|_| Error::InvalidIdentifier(value.to_string()))?;
        Self::from_raw(raw)
    }
}

impl From<Identifier> for u64 {
    fn from(value: Identifier) -> Self {
        value.get()
    }
}

impl From<Identifier> for i64 {
    fn from(value: Identifier) -> Self {
        value.get_i64()
    }
}

#[cfg(feature = "serde")]
mod serde_impl {
    use super::Identifier;
    use serde::de::{self, Unexpected, Visitor};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::fmt::Formatter;

    /// Identifiers serialize as decimal strings so that consumers limited to 53-bit integers don't lose precision.
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    impl Serialize for Identifier {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            serializer.collect_str(self)
        }
    }

    /// Identifiers deserialize from decimal strings as well as from non-negative integers.
    #[cfg_attr(docsrs, doc(cfg(feature = "serde")))]
    impl<'de> Deserialize<'de> for Identifier {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            deserializer.deserialize_any(IdentifierVisitor)
        }
    }

    struct IdentifierVisitor;

    impl<'de> Visitor<'de> for IdentifierVisitor {
        type Value = Identifier;

        fn expecting(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str("a decimal identifier string or a non-negative integer below 2^63")
        }

        fn visit_str<E>(self, v: &str) -> Result<Identifier, E>
        where
            E: de::Error,
        {
            v.parse().map_err(|_| E::invalid_value(Unexpected::Str(v), &self))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Identifier, E>
        where
            E: de::Error,
        {
            Identifier::from_raw(v).map_err(|_| E::invalid_value(Unexpected::Unsigned(v), &self))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Identifier, E>
        where
            E: de::Error,
        {
            Identifier::try_from(v).map_err(|_| E::invalid_value(Unexpected::Signed(v), &self))
        }
    }
}
