#![cfg(shuttle)]

use shuttle::sync::Arc;
use shuttle::thread;
use shuttle::thread::JoinHandle;
use std::hash::BuildHasherDefault;
use std::hash::Hasher;

use crh::Config;
use crh::RobinMap;
use crh::garbage::collector::Leak;

const ITERATIONS: usize = 1000;

#[derive(Default)]
struct IdentityHasher(u64);

impl Hasher for IdentityHasher {
  fn finish(&self) -> u64 {
    self.0
  }

  fn write(&mut self, _bytes: &[u8]) {
    unreachable!("only u64 keys are hashed");
  }

  fn write_u64(&mut self, value: u64) {
    self.0 = value;
  }
}

type ArcMap = Arc<RobinMap<u64, u64, BuildHasherDefault<IdentityHasher>, Leak>>;

fn new_map(capacity: usize) -> ArcMap {
  let config: Config = Config::new().with_capacity(capacity).with_stamp_shift(2);
  let hasher: BuildHasherDefault<IdentityHasher> = BuildHasherDefault::default();

  Arc::new(RobinMap::with_config_and_hasher(config, hasher))
}

#[test]
fn test_emplace_grow() {
  shuttle::check_random(
    || {
      let map: ArcMap = new_map(8);

      let threads: Vec<JoinHandle<()>> = (0..3)
        .map(|thread| {
          let map: ArcMap = ArcMap::clone(&map);

          thread::spawn(move || {
            // Keys of all threads collide on home buckets 1 and 2.
            for index in 0..6 {
              let key: u64 = (index << 3) | 1 | (thread << 8);
              assert!(map.emplace(key, key));
            }
          })
        })
        .collect();

      for thread in threads {
        thread.join().unwrap();
      }

      assert_eq!(map.len(), 18);
      assert!(map.version() > 0);

      for thread in 0..3 {
        for index in 0..6 {
          let key: u64 = (index << 3) | 1 | (thread << 8);
          assert_eq!(map.read(&key), Some(key));
        }
      }
    },
    ITERATIONS,
  );
}

#[test]
fn test_toggle_alternates() {
  shuttle::check_random(
    || {
      let map: ArcMap = new_map(8);

      let threads: Vec<JoinHandle<(usize, usize)>> = (0..3)
        .map(|_| {
          let map: ArcMap = ArcMap::clone(&map);

          thread::spawn(move || {
            let mut inserted: usize = 0;
            let mut erased: usize = 0;

            for round in 0..4 {
              if round % 2 == 0 {
                inserted += usize::from(map.emplace(1, round));
              } else {
                erased += usize::from(map.erase(&1));
              }
            }

            (inserted, erased)
          })
        })
        .collect();

      let (inserted, erased): (usize, usize) = threads
        .into_iter()
        .map(|thread| thread.join().unwrap())
        .fold((0, 0), |(a, b), (c, d)| (a + c, b + d));

      // Successful emplaces and erases of one key alternate, starting with an
      // emplace.
      let present: bool = map.contains(&1);

      assert_eq!(inserted - erased, usize::from(present));
      assert_eq!(map.len(), usize::from(present));
    },
    ITERATIONS,
  );
}

#[test]
fn test_displaced_key_visible() {
  shuttle::check_random(
    || {
      let map: ArcMap = new_map(8);

      // 9 stays in the map for the whole run while its neighbours churn and
      // shift it back and forth.
      assert!(map.emplace(1, 1));
      assert!(map.emplace(9, 9));

      let churn: JoinHandle<()> = thread::spawn({
        let map: ArcMap = ArcMap::clone(&map);

        move || {
          for _ in 0..2 {
            assert!(map.erase(&1));
            assert!(map.emplace(17, 17));
            assert!(map.emplace(1, 1));
            assert!(map.erase(&17));
          }
        }
      });

      let reader: JoinHandle<()> = thread::spawn({
        let map: ArcMap = ArcMap::clone(&map);

        move || {
          for _ in 0..4 {
            assert_eq!(map.read(&9), Some(9));
          }
        }
      });

      churn.join().unwrap();
      reader.join().unwrap();

      assert_eq!(map.len(), 2);
    },
    ITERATIONS,
  );
}

#[test]
fn test_iter_during_grow() {
  shuttle::check_random(
    || {
      let map: ArcMap = new_map(8);

      for key in 0..4 {
        assert!(map.emplace(key, key));
      }

      let writer: JoinHandle<()> = thread::spawn({
        let map: ArcMap = ArcMap::clone(&map);

        move || {
          for key in 100..110 {
            assert!(map.emplace(key, key));
          }
        }
      });

      let guard = map.guard();
      let mut stable: Vec<u64> = map
        .iter(&guard)
        .map(|(key, _)| *key)
        .filter(|key| *key < 4)
        .collect();

      stable.sort_unstable();

      // Keys present throughout are seen exactly once.
      assert_eq!(stable, [0, 1, 2, 3]);

      writer.join().unwrap();
    },
    ITERATIONS,
  );
}
