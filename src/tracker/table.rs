use tracing::debug;

use super::config::TableConfig;
use crate::error::Result;

/// 2^64 divided by the golden ratio, rounded to an odd number.
const FIB_MULTIPLIER: u64 = 11400714819323198485;

#[inline]
fn fib_hash(
  addr: usize,
  cap: usize,
) -> usize {
  ((addr as u64).wrapping_mul(FIB_MULTIPLIER) % cap as u64) as usize
}

/// State of a table slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotState {
  /// Never used since the last rehash. Ends a probe sequence.
  #[default]
  Free,
  /// Holds a live allocation.
  Active,
  /// Tombstone of a released allocation. Probes continue past it.
  Deleted,
}

/// One allocation as seen by the tracker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocRecord {
  /// Sequence number assigned when the address was first registered.
  pub alloc_no: u64,
  /// Current size in bytes.
  pub size: usize,
  pub state: SlotState,
  pub addr: usize,
}

/// Result of [`AllocTable::get`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Query {
  pub active: bool,
  pub size: usize,
}

/// Open-addressed hash table from addresses to allocation records.
///
/// Addresses are hashed with a Fibonacci (multiplicative) hash and
/// collisions are resolved by linear probing. Released entries become
/// tombstones so that probes for other addresses keep working; tombstones
/// are dropped whenever the table is rehashed.
///
/// The table allocates nothing until the first [`AllocTable::set`].
#[derive(Debug, Default)]
pub struct AllocTable {
  config: TableConfig,
  slots: Vec<AllocRecord>,
  num_total: u64,
  num_act: usize,
  num_del: usize,
  size: usize,
}

impl AllocTable {
  /// Creates an empty table with the default [`TableConfig`].
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_config(config: TableConfig) -> Result<Self> {
    config.validate()?;

    Ok(Self {
      config,
      ..Self::default()
    })
  }

  /// Records `size` bytes at `addr` and returns the allocation number.
  ///
  /// If `addr` is already active only its size changes (a `realloc` that
  /// kept its address) and the original allocation number is returned.
  /// Otherwise the address gets the next allocation number; a tombstone on
  /// its probe path is reused for it.
  pub fn set(
    &mut self,
    addr: usize,
    size: usize,
  ) -> u64 {
    if self.slots.is_empty() {
      self.slots = vec![AllocRecord::default(); self.config.min_capacity];
    }

    let cap = self.slots.len();
    let mut idx = fib_hash(addr, cap);
    let mut tombstone = None;
    let mut free = None;

    for _ in 0..cap {
      let slot = &mut self.slots[idx];
      match slot.state {
        SlotState::Free => {
          free = Some(idx);
          break;
        }
        SlotState::Active if slot.addr == addr => {
          self.size = self.size.wrapping_sub(slot.size).wrapping_add(size);
          slot.size = size;
          return slot.alloc_no;
        }
        SlotState::Deleted if tombstone.is_none() => tombstone = Some(idx),
        _ => {}
      }
      idx = (idx + 1) % cap;
    }

    let idx = match (tombstone, free) {
      (Some(idx), _) => {
        self.num_del -= 1;
        idx
      }
      (None, Some(idx)) => idx,
      (None, None) => {
        // Only reachable with every slot active, which the load bound rules out.
        self.rehash(self.grown_capacity(cap));
        return self.set(addr, size);
      }
    };

    let alloc_no = self.num_total;
    self.num_total += 1;
    self.slots[idx] = AllocRecord {
      alloc_no,
      size,
      state: SlotState::Active,
      addr,
    };
    self.size = self.size.wrapping_add(size);
    self.num_act += 1;

    self.resize_to_load();

    alloc_no
  }

  /// Marks the allocation at `addr` as released. Unknown addresses are
  /// ignored.
  pub fn unset(
    &mut self,
    addr: usize,
  ) {
    let Some(idx) = self.find(addr) else {
      return;
    };

    let slot = &mut self.slots[idx];
    slot.state = SlotState::Deleted;
    self.size = self.size.wrapping_sub(slot.size);
    self.num_act -= 1;
    self.num_del += 1;

    self.resize_to_load();
  }

  /// Looks up the live allocation at `addr`.
  pub fn get(
    &self,
    addr: usize,
  ) -> Query {
    match self.find(addr) {
      Some(idx) => Query {
        active: true,
        size: self.slots[idx].size,
      },
      None => Query::default(),
    }
  }

  /// Active records sorted by allocation number.
  pub fn chronological(&self) -> Vec<AllocRecord> {
    let mut records: Vec<AllocRecord> = self
      .slots
      .iter()
      .filter(|slot| slot.state == SlotState::Active)
      .copied()
      .collect();

    debug_assert_eq!(records.len(), self.num_act);
    records.sort_unstable_by_key(|record| record.alloc_no);
    records
  }

  /// Drops every record and releases the slots.
  pub fn reset(&mut self) {
    self.slots = Vec::new();
    self.num_total = 0;
    self.num_act = 0;
    self.num_del = 0;
    self.size = 0;
  }

  /// `true` when no bytes and no allocations are live.
  pub fn is_empty(&self) -> bool {
    self.size == 0 && self.num_act == 0
  }

  /// Slot count, zero before first use.
  pub fn capacity(&self) -> usize {
    self.slots.len()
  }

  /// Sum of the sizes of all active allocations, wrapping on overflow.
  pub fn total_bytes(&self) -> usize {
    self.size
  }

  pub fn active_count(&self) -> usize {
    self.num_act
  }

  pub fn deleted_count(&self) -> usize {
    self.num_del
  }

  /// Number of allocation numbers handed out so far.
  pub fn total_count(&self) -> u64 {
    self.num_total
  }

  /// `(active + deleted) / capacity`, zero before first use.
  pub fn load(&self) -> f64 {
    if self.slots.is_empty() {
      return 0.0;
    }
    (self.num_act + self.num_del) as f64 / self.slots.len() as f64
  }

  pub fn config(&self) -> &TableConfig {
    &self.config
  }

  fn find(
    &self,
    addr: usize,
  ) -> Option<usize> {
    let cap = self.slots.len();
    if cap == 0 {
      return None;
    }

    let mut idx = fib_hash(addr, cap);
    for _ in 0..cap {
      let slot = &self.slots[idx];
      match slot.state {
        SlotState::Free => return None,
        SlotState::Active if slot.addr == addr => return Some(idx),
        _ => {}
      }
      idx = (idx + 1) % cap;
    }

    None
  }

  fn grown_capacity(
    &self,
    cap: usize,
  ) -> usize {
    ((cap as f64 * self.config.growth_factor) as usize).max(cap + 1)
  }

  fn shrunk_capacity(
    &self,
    cap: usize,
  ) -> usize {
    ((cap as f64 / self.config.growth_factor) as usize).max(self.config.min_capacity)
  }

  /// Rehashes until the load is inside the configured bounds or the
  /// capacity sits at the floor.
  fn resize_to_load(&mut self) {
    loop {
      let cap = self.slots.len();
      let load = self.load();

      let new_cap = if load < self.config.min_load {
        self.shrunk_capacity(cap)
      } else if load > self.config.max_load {
        self.grown_capacity(cap)
      } else {
        cap
      };

      if new_cap == cap {
        return;
      }
      self.rehash(new_cap);
    }
  }

  fn rehash(
    &mut self,
    new_cap: usize,
  ) {
    debug_assert!(new_cap > self.num_act);

    let mut slots = vec![AllocRecord::default(); new_cap];
    for record in self.slots.iter().filter(|slot| slot.state == SlotState::Active) {
      let mut idx = fib_hash(record.addr, new_cap);
      while slots[idx].state != SlotState::Free {
        idx = (idx + 1) % new_cap;
      }
      slots[idx] = *record;
    }

    debug!(
      from = self.slots.len(),
      to = new_cap,
      active = self.num_act,
      dropped_tombstones = self.num_del,
      "allocation table resized"
    );

    self.slots = slots;
    self.num_del = 0;
  }
}
