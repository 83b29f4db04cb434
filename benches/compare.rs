use crh::RobinMap;
use divan::Bencher;
use divan::bench;
use divan::bench_group;
use divan::black_box;
use divan::black_box_drop;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::RwLock;

const OPS: &[usize] = &[
  1 << 4,
  1 << 6,
  1 << 8,
  1 << 10,
  1 << 12,
  1 << 14,
  1 << 16,
];

const THREADS: &[usize] = &[0, 1, 4, 8, 16];

// -----------------------------------------------------------------------------
// Unify APIs for Simplicity
// -----------------------------------------------------------------------------

trait Map<T>: Sized + Send + Sync + 'static
where
  T: Send + Sync + 'static,
{
  fn new() -> Self;

  fn set(&self, key: usize, value: T) -> bool;

  fn del(&self, key: usize) -> bool;

  fn get(&self, key: usize) -> Option<T>
  where
    T: Copy;
}

impl<T> Map<T> for RobinMap<usize, T>
where
  T: Send + Sync + 'static,
{
  fn new() -> Self {
    RobinMap::new()
  }

  fn set(&self, key: usize, value: T) -> bool {
    self.emplace(key, value)
  }

  fn del(&self, key: usize) -> bool {
    self.erase(&key)
  }

  fn get(&self, key: usize) -> Option<T>
  where
    T: Copy,
  {
    self.with(&key, |value| *value)
  }
}

impl<T> Map<T> for RwLock<HashMap<usize, T>>
where
  T: Send + Sync + 'static,
{
  fn new() -> Self {
    RwLock::new(HashMap::new())
  }

  fn set(&self, key: usize, value: T) -> bool {
    let mut guard = self.write().unwrap();

    if guard.contains_key(&key) {
      return false;
    }

    guard.insert(key, value);
    true
  }

  fn del(&self, key: usize) -> bool {
    self.write().unwrap().remove(&key).is_some()
  }

  fn get(&self, key: usize) -> Option<T>
  where
    T: Copy,
  {
    self.read().unwrap().get(&key).copied()
  }
}

impl<T> Map<T> for Mutex<HashMap<usize, T>>
where
  T: Send + Sync + 'static,
{
  fn new() -> Self {
    Mutex::new(HashMap::new())
  }

  fn set(&self, key: usize, value: T) -> bool {
    let mut guard = self.lock().unwrap();

    if guard.contains_key(&key) {
      return false;
    }

    guard.insert(key, value);
    true
  }

  fn del(&self, key: usize) -> bool {
    self.lock().unwrap().remove(&key).is_some()
  }

  fn get(&self, key: usize) -> Option<T>
  where
    T: Copy,
  {
    self.lock().unwrap().get(&key).copied()
  }
}

// -----------------------------------------------------------------------------
// Actual Benchmarks
// -----------------------------------------------------------------------------

#[bench_group(name = "ReadSeq", skip_ext_time, threads = THREADS)]
mod read_seq {
  use super::bench;
  use super::*;

  fn bench<M>(bencher: Bencher<'_, '_>, ops: usize)
  where
    M: Map<usize>,
  {
    let this: M = <M as Map<usize>>::new();

    for key in 0..ops {
      assert!(this.set(key, key));
    }

    bencher.counter(ops).bench(move || {
      for key in 0..ops {
        let item: Option<usize> = black_box(this.get(black_box(key)));
        _ = black_box(item.unwrap());
      }
    });
  }

  #[bench(args = OPS)]
  fn bench_robin(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RobinMap<usize, usize>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_rwlock(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RwLock<HashMap<usize, usize>>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_mutex(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<Mutex<HashMap<usize, usize>>>(bencher, ops);
  }
}

#[bench_group(name = "ReadMiss", skip_ext_time, threads = THREADS)]
mod read_miss {
  use super::bench;
  use super::*;

  fn bench<M>(bencher: Bencher<'_, '_>, ops: usize)
  where
    M: Map<usize>,
  {
    let this: M = <M as Map<usize>>::new();

    for key in 0..ops {
      assert!(this.set(key, key));
    }

    bencher.counter(ops).bench(move || {
      for key in ops..ops * 2 {
        let item: Option<usize> = black_box(this.get(black_box(key)));
        assert!(item.is_none());
      }
    });
  }

  #[bench(args = OPS)]
  fn bench_robin(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RobinMap<usize, usize>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_rwlock(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RwLock<HashMap<usize, usize>>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_mutex(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<Mutex<HashMap<usize, usize>>>(bencher, ops);
  }
}

#[bench_group(name = "InsertSeq", skip_ext_time)]
mod insert_seq {
  use super::bench;
  use super::*;

  fn bench<M>(bencher: Bencher<'_, '_>, ops: usize)
  where
    M: Map<usize>,
  {
    bencher
      .counter(ops)
      .with_inputs(<M as Map<usize>>::new)
      .bench_local_refs(move |this: &mut M| {
        for key in 0..ops {
          let inserted: bool = black_box(this.set(black_box(key), key));
          assert!(inserted);
        }
      });
  }

  #[bench(args = OPS)]
  fn bench_robin(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RobinMap<usize, usize>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_rwlock(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RwLock<HashMap<usize, usize>>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_mutex(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<Mutex<HashMap<usize, usize>>>(bencher, ops);
  }
}

#[bench_group(name = "Churn", skip_ext_time)]
mod churn {
  use super::bench;
  use super::*;

  fn bench<M>(bencher: Bencher<'_, '_>, ops: usize)
  where
    M: Map<usize>,
  {
    bencher
      .counter(ops)
      .with_inputs(<M as Map<usize>>::new)
      .bench_local_refs(move |this: &mut M| {
        for key in 0..ops {
          let inserted: bool = black_box(this.set(black_box(key), key));
          let gone: bool = black_box(this.del(black_box(key)));
          _ = black_box(inserted && gone);
        }
      });
  }

  #[bench(args = OPS)]
  fn bench_robin(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RobinMap<usize, usize>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_rwlock(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RwLock<HashMap<usize, usize>>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_mutex(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<Mutex<HashMap<usize, usize>>>(bencher, ops);
  }
}

#[bench_group(name = "Drop", skip_ext_time)]
mod drop {
  use super::bench;
  use super::*;

  struct DropMe(usize);

  impl Drop for DropMe {
    fn drop(&mut self) {
      let _ignore: usize = self.0;
    }
  }

  fn bench<M>(bencher: Bencher<'_, '_>, ops: usize)
  where
    M: Map<DropMe>,
  {
    bencher
      .counter(ops)
      .with_inputs(move || {
        let this: M = <M as Map<DropMe>>::new();

        for key in 0..ops {
          let _ignore: bool = this.set(key, DropMe(key));
        }

        this
      })
      .bench_local_values(black_box_drop);
  }

  #[bench(args = OPS)]
  fn bench_robin(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RobinMap<usize, DropMe>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_rwlock(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<RwLock<HashMap<usize, DropMe>>>(bencher, ops);
  }

  #[bench(args = OPS)]
  fn bench_mutex(bencher: Bencher<'_, '_>, ops: usize) {
    bench::<Mutex<HashMap<usize, DropMe>>>(bencher, ops);
  }
}

// -----------------------------------------------------------------------------
// Main
// -----------------------------------------------------------------------------

fn main() {
  divan::main();
}
