//! Windowed pagination pipeline
//!
//! - [`date_windows`]: splitting a date range into calendar-aligned windows
//! - [`windowed`]: running a query once per window, optionally paginated
//! - [`cutoff`]: backward cursor pagination that stops once past the range
//! - [`nodes`]: locating the `nodes` collection in any response shape
//! - [`dedup`]: suppressing entities already seen in the same operation

pub mod cutoff;
pub mod date_windows;
pub mod dedup;
pub mod nodes;
pub mod windowed;

pub use cutoff::backward_pages_in_window;
pub use date_windows::{DateWindow, DateWindows, Granularity, Offset, Span};
pub use dedup::EntityDeduplicator;
pub use nodes::{find_path_to_property, query_nodes};
pub use windowed::{WindowMode, WindowedQuery};
