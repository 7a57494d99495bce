//! Pane-view rendering pipeline.
//!
//! A connection hands `pane_view` requests to its [`PaneViewScheduler`],
//! which keeps at most one pending and one in-flight job per pane. A fixed
//! pool of workers pulls jobs by priority, renders them through
//! [`render_pane_view`] and consults the connection's [`PaneViewCache`] to
//! skip redundant work or to degrade to a stale frame when a deadline is
//! about to pass.

use std::time::Duration;

mod cache;
mod render;
mod scheduler;

pub use cache::{CacheEntry, CacheKey, PaneViewCache};
pub use render::{PaneViewError, render_context, render_pane_view};
pub use scheduler::{PaneViewJob, PaneViewScheduler};

/// Render workers per connection.
pub const WORKERS: usize = 4;
/// Remaining budget below which a render is skipped in favour of the cache.
pub const DEADLINE_SLACK: Duration = Duration::from_millis(50);
/// Wait after which a pending job outranks jobs that have not waited as
/// long.
pub const STARVATION_WINDOW: Duration = Duration::from_millis(750);
/// Renders slower than this are logged at debug level.
pub const SLOW_RENDER: Duration = Duration::from_millis(50);
/// Age after which a cache entry is treated as absent.
pub const CACHE_TTL: Duration = Duration::from_secs(30);
/// Entries retained per connection cache.
pub const CACHE_CAPACITY: usize = 100;

const PANE_VIEW_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::pane_view");
