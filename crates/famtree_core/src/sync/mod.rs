//! Write coalescing and change notification.

pub mod change_feed;
pub mod debounce;
