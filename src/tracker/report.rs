//! Human-readable dump of an [`AllocTable`].
//!
//! ```text
//! ================================================================================
//!                                 heap memory info
//! --------------------------------------------------------------------------------
//! * chunks in chronological order of allocation
//!
//! #0: 100 bytes at 0x55d0c1a2b2a0
//! #2: 4096 bytes at 0x55d0c1a2c000
//! --------------------------------------------------------------------------------
//! * heap memory usage summary
//!
//! total memory:     4196 bytes (4.098 kilobytes)
//! number of chunks: 2
//! ================================================================================
//! ```
//!
//! The chunk section is only written when asked for.

use std::io::{self, Write};

use super::table::AllocTable;
use crate::size::PrettySize;

const WIDTH: usize = 80;

pub fn write_report<W: Write>(
  table: &AllocTable,
  out: &mut W,
  print_chunks: bool,
) -> io::Result<()> {
  let banner = "=".repeat(WIDTH);
  let separator = "-".repeat(WIDTH);

  writeln!(out, "{banner}")?;
  let title = "heap memory info";
  let pad = (WIDTH - title.len()) / 2;
  writeln!(out, "{:pad$}{title}", "")?;

  if print_chunks {
    writeln!(out, "{separator}")?;
    writeln!(out, "* chunks in chronological order of allocation")?;
    writeln!(out)?;

    for record in table.chronological() {
      writeln!(
        out,
        "#{}: {} bytes at {:#x}",
        record.alloc_no, record.size, record.addr
      )?;
    }
  }

  writeln!(out, "{separator}")?;
  writeln!(out, "* heap memory usage summary")?;
  writeln!(out)?;
  writeln!(
    out,
    "total memory:     {} bytes ({})",
    table.total_bytes(),
    PrettySize::new(table.total_bytes())
  )?;
  writeln!(out, "number of chunks: {}", table.active_count())?;
  writeln!(out, "{banner}")?;

  Ok(())
}

impl AllocTable {
  /// Writes the usage report to `out`, listing every live allocation in
  /// allocation order when `print_chunks` is set.
  pub fn print_stats<W: Write>(
    &self,
    out: &mut W,
    print_chunks: bool,
  ) -> io::Result<()> {
    write_report(self, out, print_chunks)
  }
}
