#![cfg(not(any(loom, shuttle)))]

use std::collections::HashSet;
use std::sync::Barrier;
use std::thread;

use crh::Config;
use crh::RobinMap;
use crh::hash::MapToBucket;

#[cfg(not(feature = "slow"))]
const SCALE: u64 = 1;

#[cfg(feature = "slow")]
const SCALE: u64 = 10;

const THREADS: u64 = 8;

#[test]
fn test_concurrent_emplace_grow() {
  const KEYS: u64 = 5_000 * SCALE;

  let map: RobinMap<u64, u64> = RobinMap::with_capacity(8);
  let barrier: Barrier = Barrier::new(THREADS as usize);

  thread::scope(|scope| {
    for thread in 0..THREADS {
      let map: &RobinMap<u64, u64> = &map;
      let barrier: &Barrier = &barrier;

      scope.spawn(move || {
        barrier.wait();

        for index in 0..KEYS {
          let key: u64 = index * THREADS + thread;
          assert!(map.emplace(key, !key), "key {key} inserted twice");
        }
      });
    }
  });

  assert_eq!(map.len() as u64, KEYS * THREADS);
  assert!(map.version() > 0);

  for key in 0..KEYS * THREADS {
    assert_eq!(map.read(&key), Some(!key), "key {key} lost");
  }
}

#[test]
fn test_shared_keys_alternate() {
  const ROUNDS: usize = 20_000 * SCALE as usize;
  const KEYS: u64 = 16;

  let map: RobinMap<u64, u64> =
    RobinMap::with_config(Config::new().with_capacity(32).with_stamp_shift(2));

  let counts: Vec<(Vec<usize>, Vec<usize>)> = thread::scope(|scope| {
    let threads: Vec<_> = (0..THREADS)
      .map(|thread| {
        let map: &RobinMap<u64, u64> = &map;

        scope.spawn(move || {
          let mut rng: fastrand::Rng = fastrand::Rng::with_seed(thread);
          let mut inserted: Vec<usize> = vec![0; KEYS as usize];
          let mut erased: Vec<usize> = vec![0; KEYS as usize];

          for _ in 0..ROUNDS {
            let key: u64 = rng.u64(0..KEYS);

            if rng.bool() {
              inserted[key as usize] += usize::from(map.emplace(key, thread));
            } else {
              erased[key as usize] += usize::from(map.erase(&key));
            }
          }

          (inserted, erased)
        })
      })
      .collect();

    threads.into_iter().map(|thread| thread.join().unwrap()).collect()
  });

  let mut present: usize = 0;

  for key in 0..KEYS {
    let inserted: usize = counts.iter().map(|(inserted, _)| inserted[key as usize]).sum();
    let erased: usize = counts.iter().map(|(_, erased)| erased[key as usize]).sum();
    let contains: bool = map.contains(&key);

    // Successes on one key alternate, starting with an emplace.
    assert_eq!(inserted - erased, usize::from(contains), "key {key}");

    present += usize::from(contains);
  }

  assert_eq!(map.len(), present);
}

#[test]
fn test_stable_keys_survive_churn() {
  const ROUNDS: u64 = 10_000 * SCALE;
  const STABLE: u64 = 64;

  let config: Config = Config::new()
    .with_capacity(64)
    .with_map_to_bucket(MapToBucket::Fibonacci);

  let map: RobinMap<u64, u64> = RobinMap::with_config(config);

  for key in 0..STABLE {
    assert!(map.emplace(key, key));
  }

  thread::scope(|scope| {
    for thread in 0..THREADS / 2 {
      let map: &RobinMap<u64, u64> = &map;

      scope.spawn(move || {
        for round in 0..ROUNDS {
          let key: u64 = STABLE + thread * ROUNDS + round;

          assert!(map.emplace(key, key));

          if round % 4 != 0 {
            assert!(map.erase(&key));
          }
        }
      });
    }

    for _ in 0..THREADS / 2 {
      let map: &RobinMap<u64, u64> = &map;

      scope.spawn(move || {
        for round in 0..ROUNDS {
          let key: u64 = round % STABLE;
          assert_eq!(map.read(&key), Some(key), "stable key {key} missed");
        }
      });
    }
  });

  assert_eq!(map.len() as u64, STABLE + (THREADS / 2) * ROUNDS.div_ceil(4));
}

#[test]
fn test_iter_during_churn() {
  const ROUNDS: u64 = 2_000 * SCALE;
  const STABLE: u64 = 256;

  let map: RobinMap<u64, u64> =
    RobinMap::with_config(Config::new().with_capacity(512).with_stamp_shift(3));

  for key in 0..STABLE {
    assert!(map.emplace(key, key));
  }

  thread::scope(|scope| {
    for thread in 0..THREADS / 2 {
      let map: &RobinMap<u64, u64> = &map;

      scope.spawn(move || {
        for round in 0..ROUNDS {
          let key: u64 = STABLE + thread * ROUNDS + round;

          assert!(map.emplace(key, key));
          assert!(map.erase(&key));
        }
      });
    }

    for _ in 0..THREADS / 2 {
      let map: &RobinMap<u64, u64> = &map;

      scope.spawn(move || {
        for _ in 0..ROUNDS / 100 {
          let guard = map.guard();
          let mut seen: HashSet<u64> = HashSet::new();

          for (key, value) in map.iter(&guard) {
            assert_eq!(key, value);
            assert!(seen.insert(*key), "key {key} yielded twice");
          }

          for key in 0..STABLE {
            assert!(seen.contains(&key), "stable key {key} missed");
          }
        }
      });
    }
  });

  assert_eq!(map.len() as u64, STABLE);
}
