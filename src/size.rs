use std::fmt;

/// `x` kibibytes in bytes.
pub const fn kib(x: usize) -> usize {
  1024 * x
}

/// `x` mebibytes in bytes.
pub const fn mib(x: usize) -> usize {
  1024 * kib(x)
}

/// `x` gibibytes in bytes.
pub const fn gib(x: usize) -> usize {
  1024 * mib(x)
}

const PREFIXES: [&str; 7] = ["", "kilo", "mega", "giga", "tera", "peta", "exa"];

/// A byte count scaled down by powers of 1024 for display.
///
/// ```rust
/// use memkit::size::PrettySize;
///
/// assert_eq!(PrettySize::new(1536).to_string(), "1.500 kilobytes");
/// assert_eq!(PrettySize::new(12).to_string(), "12.000 bytes");
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrettySize {
  pub value: f64,
  pub prefix: &'static str,
}

impl PrettySize {
  pub fn new(bytes: usize) -> Self {
    let mut scaled = bytes as u64;
    let mut i = 0;
    while i < PREFIXES.len() - 1 && scaled >> 10 != 0 {
      scaled >>= 10;
      i += 1;
    }

    Self {
      value: bytes as f64 / (1u64 << (i * 10)) as f64,
      prefix: PREFIXES[i],
    }
  }
}

impl fmt::Display for PrettySize {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(f, "{:.3} {}bytes", self.value, self.prefix)
  }
}
