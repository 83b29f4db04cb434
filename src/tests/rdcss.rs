use crate::backoff::BackoffPolicy;
use crate::kcas::Context;
use crate::kcas::Engine;
use crate::kcas::RawWord;
use crate::rdcss;
use crate::rdcss::Rdcss;
use crate::record::Claim;
use crate::record::Records;
use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::Relaxed;
use crate::word::Handle;
use crate::word::is_plain;

const POLICY: BackoffPolicy = BackoffPolicy::None;

fn op<'a>(control: &'a AtomicUsize, data: &'a AtomicUsize) -> Rdcss<'a> {
  Rdcss {
    control,
    expected_control: 8,
    data,
    expected_data: 4,
    new_data: 12,
  }
}

#[test]
fn installs_when_both_match() {
  let records: Records = Records::new();
  let claim: Claim<'_> = records.claim(POLICY);
  let control: AtomicUsize = AtomicUsize::new(8);
  let data: AtomicUsize = AtomicUsize::new(4);

  let seen: usize = rdcss::rdcss(&records, claim.index(), &claim.record().rdcss, op(&control, &data), POLICY);

  assert_eq!(seen, 4);
  assert_eq!(data.load(Relaxed), 12);
  assert_eq!(control.load(Relaxed), 8);
}

#[test]
fn control_mismatch_rolls_back() {
  let records: Records = Records::new();
  let claim: Claim<'_> = records.claim(POLICY);
  let control: AtomicUsize = AtomicUsize::new(16);
  let data: AtomicUsize = AtomicUsize::new(4);

  let seen: usize = rdcss::rdcss(&records, claim.index(), &claim.record().rdcss, op(&control, &data), POLICY);

  // The handle went in, then the control word sent the data word back.
  assert_eq!(seen, 4);
  assert_eq!(data.load(Relaxed), 4);
  assert_eq!(control.load(Relaxed), 16);
}

#[test]
fn data_mismatch_returns_observed() {
  let records: Records = Records::new();
  let claim: Claim<'_> = records.claim(POLICY);
  let control: AtomicUsize = AtomicUsize::new(8);
  let data: AtomicUsize = AtomicUsize::new(20);

  let seen: usize = rdcss::rdcss(&records, claim.index(), &claim.record().rdcss, op(&control, &data), POLICY);

  assert_eq!(seen, 20);
  assert_eq!(data.load(Relaxed), 20);
}

#[test]
fn data_mismatch_on_kcas_handle() {
  let records: Records = Records::new();
  let claim: Claim<'_> = records.claim(POLICY);
  let control: AtomicUsize = AtomicUsize::new(8);
  let foreign: usize = Handle::kcas(3, 1).into_bits();
  let data: AtomicUsize = AtomicUsize::new(foreign);

  // k-CAS handles are returned as they are, for the caller to help.
  let seen: usize = rdcss::rdcss(&records, claim.index(), &claim.record().rdcss, op(&control, &data), POLICY);

  assert_eq!(seen, foreign);
  assert_eq!(data.load(Relaxed), foreign);
  assert_eq!(rdcss::read(&records, &data, POLICY), foreign);
}

#[test]
fn read_completes_stranded_rdcss() {
  let records: Records = Records::new();
  let claim: Claim<'_> = records.claim(POLICY);
  let control: AtomicUsize = AtomicUsize::new(8);
  let data: AtomicUsize = AtomicUsize::new(4);

  // The owner installed its handle and stalled before finishing.
  let handle: Handle = claim.record().rdcss.prepare(claim.index(), &op(&control, &data));

  data.store(handle.into_bits(), Relaxed);

  assert_eq!(rdcss::read(&records, &data, POLICY), 12);
  assert_eq!(data.load(Relaxed), 12);
}

#[test]
fn read_rolls_back_stranded_rdcss() {
  let records: Records = Records::new();
  let claim: Claim<'_> = records.claim(POLICY);
  let control: AtomicUsize = AtomicUsize::new(8);
  let data: AtomicUsize = AtomicUsize::new(4);

  let handle: Handle = claim.record().rdcss.prepare(claim.index(), &op(&control, &data));

  data.store(handle.into_bits(), Relaxed);
  control.store(9, Relaxed);

  assert_eq!(rdcss::read(&records, &data, POLICY), 4);
  assert_eq!(data.load(Relaxed), 4);
}

#[test]
fn rdcss_completes_stranded_rdcss() {
  let records: Records = Records::new();
  let stalled: Claim<'_> = records.claim(POLICY);
  let claim: Claim<'_> = records.claim(POLICY);
  let control: AtomicUsize = AtomicUsize::new(8);
  let data: AtomicUsize = AtomicUsize::new(4);

  let handle: Handle = stalled.record().rdcss.prepare(stalled.index(), &op(&control, &data));

  data.store(handle.into_bits(), Relaxed);

  // The second operation expects the value the stalled one writes.
  let next: Rdcss<'_> = Rdcss {
    expected_data: 12,
    new_data: 16,
    ..op(&control, &data)
  };

  let seen: usize = rdcss::rdcss(&records, claim.index(), &claim.record().rdcss, next, POLICY);

  assert_eq!(seen, 12);
  assert_eq!(data.load(Relaxed), 16);
}

#[test]
fn stale_handle_is_ignored() {
  let records: Records = Records::new();
  let claim: Claim<'_> = records.claim(POLICY);
  let control: AtomicUsize = AtomicUsize::new(8);
  let data: AtomicUsize = AtomicUsize::new(4);
  let other: AtomicUsize = AtomicUsize::new(4);

  let stale: Handle = claim.record().rdcss.prepare(claim.index(), &op(&control, &data));

  // Reusing the descriptor retires the first handle.
  claim.record().rdcss.prepare(claim.index(), &op(&control, &other));

  data.store(stale.into_bits(), Relaxed);
  rdcss::complete(&records, stale);

  assert_eq!(data.load(Relaxed), stale.into_bits());
  assert_eq!(other.load(Relaxed), 4);
}

#[test]
fn reader_helps_stalled_kcas() {
  let engine: Engine = Engine::new(POLICY);
  let a: AtomicUsize = AtomicUsize::new(4);
  let b: AtomicUsize = AtomicUsize::new(8);

  let stalled: Claim<'_> = engine.records().claim(POLICY);
  let words: [RawWord; 2] = [RawWord::new(&a, 4, 40), RawWord::new(&b, 8, 80)];
  let handle: Handle = stalled.record().kcas.prepare(stalled.index(), &words);

  // The owner claimed its first word and stalled.
  a.store(handle.into_bits(), Relaxed);

  let mut ctx: Context<'_> = engine.context();

  assert_eq!(ctx.read(&a), 40);
  assert_eq!(a.load(Relaxed), 40);
  assert_eq!(b.load(Relaxed), 80);
}

#[test]
fn reader_rolls_back_stalled_kcas() {
  let engine: Engine = Engine::new(POLICY);
  let a: AtomicUsize = AtomicUsize::new(4);
  let b: AtomicUsize = AtomicUsize::new(9);

  let stalled: Claim<'_> = engine.records().claim(POLICY);
  let words: [RawWord; 2] = [RawWord::new(&a, 4, 40), RawWord::new(&b, 8, 80)];
  let handle: Handle = stalled.record().kcas.prepare(stalled.index(), &words);

  a.store(handle.into_bits(), Relaxed);

  // `b` no longer holds its expected value, so the helper fails the
  // operation and restores `a`.
  let mut ctx: Context<'_> = engine.context();

  assert_eq!(ctx.read(&a), 4);
  assert_eq!(a.load(Relaxed), 4);
  assert_eq!(b.load(Relaxed), 9);
  assert!(is_plain(a.load(Relaxed)));
}
