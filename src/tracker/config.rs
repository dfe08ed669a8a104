use crate::error::{AllocError, Result};

/// Sizing policy of an [`AllocTable`](super::AllocTable).
///
/// After every insert or delete the table compares its load
/// `(active + deleted) / capacity` to the two bounds and resizes by
/// `growth_factor` when it falls outside them.
#[derive(Clone, Debug, PartialEq)]
pub struct TableConfig {
  /// Capacity on first use and floor for shrinking.
  ///
  /// Default: 128.
  pub min_capacity: usize,

  /// Factor applied to the capacity when growing, and divided out when
  /// shrinking. Must be greater than 1.
  ///
  /// Default: 1.62.
  pub growth_factor: f64,

  /// Load below which the table shrinks.
  ///
  /// Default: 0.25.
  pub min_load: f64,

  /// Load above which the table grows. Must be below 1 so that probes
  /// always reach a free slot.
  ///
  /// Default: 0.66.
  pub max_load: f64,
}

impl TableConfig {
  pub const DEFAULT_MIN_CAPACITY: usize = 128;

  pub const DEFAULT_GROWTH_FACTOR: f64 = 1.62;

  pub const DEFAULT_MIN_LOAD: f64 = 0.25;

  pub const DEFAULT_MAX_LOAD: f64 = 0.66;

  pub fn validate(&self) -> Result<()> {
    if self.min_capacity == 0 {
      return Err(invalid("min_capacity must be greater than zero"));
    }
    if !(self.growth_factor > 1.0) {
      return Err(invalid(format!(
        "growth_factor must be greater than 1, got {}",
        self.growth_factor
      )));
    }
    if !(0.0 <= self.min_load && self.min_load < self.max_load && self.max_load < 1.0) {
      return Err(invalid(format!(
        "load bounds must satisfy 0 <= min_load < max_load < 1, got [{}, {}]",
        self.min_load, self.max_load
      )));
    }
    // A shrink must not land above the upper bound, or resizing would
    // bounce between the two.
    if self.min_load * self.growth_factor >= self.max_load {
      return Err(invalid(format!(
        "min_load * growth_factor must stay below max_load, got {} * {} >= {}",
        self.min_load, self.growth_factor, self.max_load
      )));
    }

    Ok(())
  }
}

impl Default for TableConfig {
  fn default() -> Self {
    Self {
      min_capacity: Self::DEFAULT_MIN_CAPACITY,
      growth_factor: Self::DEFAULT_GROWTH_FACTOR,
      min_load: Self::DEFAULT_MIN_LOAD,
      max_load: Self::DEFAULT_MAX_LOAD,
    }
  }
}

fn invalid(reason: impl Into<String>) -> AllocError {
  AllocError::InvalidConfig {
    reason: reason.into(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_is_valid() {
    let config = TableConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.min_capacity, 128);
    assert_eq!(config.growth_factor, 1.62);
  }

  #[test]
  fn rejects_zero_capacity() {
    let config = TableConfig {
      min_capacity: 0,
      ..TableConfig::default()
    };
    assert!(matches!(
      config.validate(),
      Err(AllocError::InvalidConfig { .. })
    ));
  }

  #[test]
  fn rejects_non_growing_factor() {
    for growth_factor in [1.0, 0.5, f64::NAN] {
      let config = TableConfig {
        growth_factor,
        ..TableConfig::default()
      };
      assert!(config.validate().is_err());
    }
  }

  #[test]
  fn rejects_overlapping_resize_bands() {
    let config = TableConfig {
      min_load: 0.4,
      max_load: 0.6,
      growth_factor: 2.0,
      ..TableConfig::default()
    };
    assert!(config.validate().is_err());
  }

  #[test]
  fn rejects_bad_load_bounds() {
    for (min_load, max_load) in [(0.5, 0.5), (0.7, 0.6), (0.25, 1.0), (-0.1, 0.5)] {
      let config = TableConfig {
        min_load,
        max_load,
        ..TableConfig::default()
      };
      assert!(config.validate().is_err(), "[{min_load}, {max_load}] accepted");
    }
  }
}
