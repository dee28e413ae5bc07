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

use snowkey::{Error, Generator, Identifier, ManualClock, EPOCH_MILLIS};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

const THREADS: usize = 8;
const IDS_PER_THREAD: usize = 5_000;

#[test]
fn unique_and_increasing_on_one_thread() {
    let generator = Generator::new(5, 6).unwrap();
    let ids: Vec<_> = (0..20_000).map(|_| generator.next_id().unwrap()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(ids.len(), ids.iter().collect::<HashSet<_>>().len());
}

#[test]
fn unique_across_threads() {
    let generator = Arc::new(Generator::new(1, 1).unwrap());
    let threads: Vec<_> = (0..THREADS)
        .map(|_| {
            let generator = generator.clone();
            thread::spawn(move || {
                let ids: Vec<_> = (0..IDS_PER_THREAD).map(|_| generator.next_id().unwrap()).collect();
                // Every thread observes its own identifiers in increasing order
                assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
                ids
            })
        })
        .collect();

    let mut set = HashSet::with_capacity(THREADS * IDS_PER_THREAD);
    for id in threads.into_iter().flat_map(|thread| thread.join().unwrap()) {
        assert!(set.insert(id), "{id} was minted twice");
    }
    assert_eq!(THREADS * IDS_PER_THREAD, set.len());
}

#[test]
fn fields_round_trip() {
    for (worker_id, datacenter_id) in [(0, 0), (1, 1), (31, 0), (0, 31), (31, 31), (17, 4)] {
        let generator = Generator::new(worker_id, datacenter_id).unwrap();
        for _ in 0..100 {
            let id = generator.next_id().unwrap();
            assert_eq!(worker_id, id.get_worker_id());
            assert_eq!(datacenter_id, id.get_datacenter_id());

            // The decimal form survives a round trip as well
            let parsed: Identifier = id.to_string().parse().unwrap();
            assert_eq!(id, parsed);
        }
    }
}

#[test]
fn distinct_instances_never_collide() {
    // Both generators read the same frozen clock, so they mint in the same millisecond all the time
    let clock = ManualClock::new(EPOCH_MILLIS + 1_000);
    let pairs = [(1, 1), (2, 1), (1, 2)];
    let threads: Vec<_> = pairs
        .iter()
        .map(|&(worker_id, datacenter_id)| {
            let generator = Generator::with_clock(worker_id, datacenter_id, clock.clone()).unwrap();
            thread::spawn(move || (0..4_096).map(|_| generator.next_id().unwrap()).collect::<Vec<_>>())
        })
        .collect();

    let mut set = HashSet::new();
    for id in threads.into_iter().flat_map(|thread| thread.join().unwrap()) {
        assert!(set.insert(id), "{id} was minted by two generators");
    }
    assert_eq!(pairs.len() * 4_096, set.len());
}

#[test]
fn distinct_instances_on_the_system_clock() {
    let threads: Vec<_> = [(0, 0), (31, 31)]
        .into_iter()
        .map(|(worker_id, datacenter_id)| {
            let generator = Generator::new(worker_id, datacenter_id).unwrap();
            thread::spawn(move || (0..10_000).map(|_| generator.next_id().unwrap()).collect::<Vec<_>>())
        })
        .collect();
    let set: HashSet<_> = threads.into_iter().flat_map(|thread| thread.join().unwrap()).collect();
    assert_eq!(20_000, set.len());
}

#[test]
fn worked_example() {
    let generator = Generator::with_clock(1, 1, ManualClock::new(EPOCH_MILLIS + 1000)).unwrap();
    let id = generator.next_id().unwrap();
    assert_eq!(4_194_439_168, id.get());
    assert_eq!(1000, id.get_timestamp_raw());
    assert_eq!(1, id.get_datacenter_id());
    assert_eq!(1, id.get_worker_id());
    assert_eq!(0, id.get_sequence_number());
}

#[test]
fn rejects_regressing_clock() {
    let clock = ManualClock::new(EPOCH_MILLIS + 500);
    let generator = Generator::with_clock(1, 1, clock.clone()).unwrap();
    generator.next_id().unwrap();

    clock.set(EPOCH_MILLIS + 499);
    let err = generator.next_id().unwrap_err();
    assert_eq!(Error::ClockRegression { millis: 1 }, err);
    assert!(!err.is_configuration());
}

#[test]
fn construction_bounds() {
    assert!(Generator::new(32, 0).unwrap_err().is_configuration());
    assert!(Generator::new(0, 32).unwrap_err().is_configuration());
    assert!(Generator::new(31, 31).is_ok());
}

#[test]
fn signed_storage() {
    let generator = Generator::new(31, 31).unwrap();
    let id = generator.next_id().unwrap();
    assert!(id.get_i64() > 0);
    assert_eq!(id, Identifier::try_from(id.get_i64()).unwrap());
}
