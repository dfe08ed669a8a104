//! Debug allocation tracker.
//!
//! Shadows heap allocations in an address-keyed table so that leaks and
//! usage can be reported at any point.
//!
//! - `config`: table sizing policy
//! - `table`: open-addressed table of allocation records
//! - `report`: text report in allocation order
//! - `heap`: libc `malloc` family wrapper that feeds a table

pub mod config;
pub mod heap;
pub mod report;
pub mod table;

pub use config::TableConfig;
pub use heap::TrackedHeap;
pub use report::write_report;
pub use table::{AllocRecord, AllocTable, Query, SlotState};
