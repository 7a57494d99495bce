//! Render policy for a single pane-view request.
//!
//! Order of checks: pane lookup, size normalisation, context, resize, the
//! not-modified short-circuit, a same-sequence cache hit, the deadline
//! fallback and finally the render itself. Cancelled or late renders fall
//! back to the cache when it has an entry for the key.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use peaky_protocol::payloads::{Frame, PaneViewRequest, PaneViewResponse};
use peaky_protocol::{Context, ContextError};
use thiserror::Error;
use tracing::debug;

use super::{CacheKey, DEADLINE_SLACK, PANE_VIEW_TARGET, PaneViewCache, SLOW_RENDER};
use crate::manager::{ManagerError, PaneWindow, RenderError, RenderOptions, SessionManager};

/// Reasons a pane view could not be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaneViewError {
    /// The request named no pane.
    #[error("pane id is required")]
    MissingPane,
    /// The pane does not exist.
    #[error("pane \"{pane_id}\" not found")]
    PaneNotFound {
        /// Requested pane.
        pane_id: String,
    },
    /// Resizing the window failed.
    #[error("resize failed: {0}")]
    Resize(#[source] ManagerError),
    /// The render failed and no cached frame could stand in.
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl From<ContextError> for PaneViewError {
    fn from(error: ContextError) -> Self {
        Self::Render(RenderError::Context(error))
    }
}

/// Derives the render context for `request` from `base`, bounded by the
/// request's wall-clock deadline when it carries one.
#[must_use]
pub fn render_context(base: &Context, request: &PaneViewRequest) -> Context {
    match deadline_instant(request.deadline_unix_nano) {
        Some(deadline) => base.with_deadline(deadline),
        None => base.child(),
    }
}

fn deadline_instant(deadline_unix_nano: i64) -> Option<Instant> {
    let nanos = u64::try_from(deadline_unix_nano).ok().filter(|n| *n > 0)?;
    let target = UNIX_EPOCH.checked_add(Duration::from_nanos(nanos))?;
    let now = Instant::now();
    match target.duration_since(SystemTime::now()) {
        Ok(remaining) => now.checked_add(remaining),
        Err(_) => Some(now),
    }
}

/// Renders `request` against the manager's window for the pane.
///
/// # Errors
///
/// Returns [`PaneViewError`] when the pane is missing, the context is
/// finished, or the render fails without a cached frame to fall back on.
pub fn render_pane_view(
    manager: &dyn SessionManager,
    context: &Context,
    request: &PaneViewRequest,
    cache: Option<&PaneViewCache>,
) -> Result<PaneViewResponse, PaneViewError> {
    let pane_id = request.pane_id.trim();
    if pane_id.is_empty() {
        return Err(PaneViewError::MissingPane);
    }
    let window = manager
        .window(pane_id)
        .ok_or_else(|| PaneViewError::PaneNotFound {
            pane_id: pane_id.to_owned(),
        })?;
    render_window(window.as_ref(), pane_id, context, request, cache)
}

pub(crate) fn render_window(
    window: &dyn PaneWindow,
    pane_id: &str,
    context: &Context,
    request: &PaneViewRequest,
    cache: Option<&PaneViewCache>,
) -> Result<PaneViewResponse, PaneViewError> {
    let options = RenderOptions {
        cols: request.cols.max(1),
        rows: request.rows.max(1),
        mode: request.mode,
        show_cursor: request.show_cursor,
        color_profile: request.color_profile,
    };
    let key = CacheKey::new(pane_id, &options);

    context.check()?;
    window
        .resize(options.cols, options.rows)
        .map_err(PaneViewError::Resize)?;

    let current = window.update_seq();
    if request.known_seq != 0 && request.known_seq == current {
        return Ok(response(window, pane_id, &options, current, Frame::default(), true));
    }
    if let Some(entry) = cache.and_then(|cache| cache.get(&key))
        && entry.update_seq == current
    {
        return Ok(response(
            window,
            pane_id,
            &options,
            current,
            entry.response.frame,
            false,
        ));
    }
    if deadline_soon(context) {
        return cached_or(cache, &key, RenderError::Context(ContextError::DeadlineExceeded));
    }

    let started = Instant::now();
    let rendered = if request.direct_render {
        window.render_direct(context, &options)
    } else {
        window.render_cached(context, &options)
    };
    let elapsed = started.elapsed();
    if elapsed > SLOW_RENDER {
        debug!(
            target: PANE_VIEW_TARGET,
            pane_id,
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            cols = options.cols,
            rows = options.rows,
            "pane view render slow"
        );
    }
    let frame = match rendered {
        Ok(frame) => frame,
        Err(error) if error.is_context() => return cached_or(cache, &key, error),
        Err(error) => return Err(error.into()),
    };

    let rendered_seq = window.update_seq();
    let fresh = response(window, pane_id, &options, rendered_seq, frame, false);
    if let Some(cache) = cache {
        cache.put(key, fresh.clone());
    }
    Ok(fresh)
}

fn deadline_soon(context: &Context) -> bool {
    context
        .remaining()
        .is_some_and(|remaining| remaining <= DEADLINE_SLACK)
}

fn cached_or(
    cache: Option<&PaneViewCache>,
    key: &CacheKey,
    error: RenderError,
) -> Result<PaneViewResponse, PaneViewError> {
    match cache.and_then(|cache| cache.get(key)) {
        Some(entry) => Ok(entry.response),
        None => Err(error.into()),
    }
}

fn response(
    window: &dyn PaneWindow,
    pane_id: &str,
    options: &RenderOptions,
    update_seq: u64,
    frame: Frame,
    not_modified: bool,
) -> PaneViewResponse {
    PaneViewResponse {
        pane_id: pane_id.to_owned(),
        cols: options.cols,
        rows: options.rows,
        mode: options.mode,
        show_cursor: options.show_cursor,
        color_profile: options.color_profile,
        update_seq,
        not_modified,
        frame,
        has_pointer_mode: window.has_pointer_mode(),
        allows_pointer_motion: window.allows_pointer_motion(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use peaky_protocol::payloads::{Cursor, PaneViewMode};
    use rstest::rstest;

    use super::*;
    use crate::manager::MockPaneWindow;

    fn request(known_seq: u64) -> PaneViewRequest {
        PaneViewRequest {
            pane_id: "p-1".to_owned(),
            cols: 0,
            rows: 0,
            known_seq,
            ..PaneViewRequest::default()
        }
    }

    fn frame(text: &str) -> Frame {
        Frame {
            lines: vec![text.to_owned()],
            cursor: Cursor::default(),
        }
    }

    fn window_at(seq: u64) -> MockPaneWindow {
        let mut window = MockPaneWindow::new();
        window.expect_resize().returning(|_, _| Ok(()));
        window.expect_update_seq().return_const(seq);
        window.expect_has_pointer_mode().return_const(true);
        window.expect_allows_pointer_motion().return_const(false);
        window
    }

    #[rstest]
    fn known_sequence_short_circuits_without_rendering() {
        let mut window = window_at(9);
        window.expect_render_cached().never();
        window.expect_render_direct().never();
        let response = render_window(&window, "p-1", &Context::background(), &request(9), None)
            .expect("not modified");
        assert!(response.not_modified);
        assert_eq!(response.update_seq, 9);
        assert!(response.frame.lines.is_empty());
        assert!(response.has_pointer_mode);
        assert_eq!((response.cols, response.rows), (1, 1));
    }

    #[rstest]
    fn renders_and_caches_on_a_stale_sequence() {
        let mut window = window_at(4);
        window
            .expect_render_cached()
            .times(1)
            .returning(|_, _| Ok(frame("hello")));
        let cache = PaneViewCache::default();
        let context = Context::background();
        let first = render_window(&window, "p-1", &context, &request(3), Some(&cache))
            .expect("render");
        assert_eq!(first.frame, frame("hello"));
        let second = render_window(&window, "p-1", &context, &request(3), Some(&cache))
            .expect("cache hit");
        assert_eq!(second.frame, frame("hello"));
        assert!(!second.not_modified);
    }

    #[rstest]
    fn direct_render_bypasses_the_window_cache() {
        let mut window = window_at(1);
        window.expect_render_cached().never();
        window
            .expect_render_direct()
            .times(1)
            .returning(|_, _| Ok(frame("direct")));
        let mut direct = request(0);
        direct.direct_render = true;
        direct.mode = PaneViewMode::Styled;
        let response = render_window(&window, "p-1", &Context::background(), &direct, None)
            .expect("render");
        assert_eq!(response.mode, PaneViewMode::Styled);
        assert_eq!(response.frame, frame("direct"));
    }

    #[rstest]
    fn imminent_deadline_serves_a_stale_cache_entry() {
        let mut window = window_at(8);
        window.expect_render_cached().never();
        let cache = PaneViewCache::default();
        let options = RenderOptions {
            cols: 1,
            rows: 1,
            mode: PaneViewMode::Ansi,
            show_cursor: false,
            color_profile: request(0).color_profile,
        };
        cache.put(
            CacheKey::new("p-1", &options),
            PaneViewResponse {
                update_seq: 5,
                frame: frame("stale"),
                ..PaneViewResponse::default()
            },
        );
        let context = Context::background().with_timeout(Duration::from_millis(10));
        let response = render_window(&window, "p-1", &context, &request(0), Some(&cache))
            .expect("stale frame");
        assert_eq!(response.update_seq, 5);
        assert_eq!(response.frame, frame("stale"));
    }

    #[rstest]
    fn imminent_deadline_without_cache_fails() {
        let mut window = window_at(8);
        window.expect_render_cached().never();
        let context = Context::background().with_timeout(Duration::from_millis(10));
        let error = render_window(&window, "p-1", &context, &request(0), None)
            .expect_err("deadline");
        assert_eq!(error, ContextError::DeadlineExceeded.into());
    }

    #[rstest]
    fn cancelled_render_falls_back_to_the_cache() {
        let mut window = MockPaneWindow::new();
        window.expect_resize().returning(|_, _| Ok(()));
        window.expect_has_pointer_mode().return_const(false);
        window.expect_allows_pointer_motion().return_const(false);
        let mut reads = vec![3_u64, 2, 2];
        window
            .expect_update_seq()
            .returning(move || reads.pop().unwrap_or(3));
        let mut renders = 0;
        window.expect_render_cached().times(2).returning(move |_, _| {
            renders += 1;
            if renders == 1 {
                Ok(frame("first"))
            } else {
                Err(RenderError::Context(ContextError::Cancelled))
            }
        });
        let cache = PaneViewCache::default();
        let context = Context::background();
        render_window(&window, "p-1", &context, &request(0), Some(&cache)).expect("first");
        let fallback = render_window(&window, "p-1", &context, &request(0), Some(&cache))
            .expect("cached frame stands in");
        assert_eq!(fallback.frame, frame("first"));
        assert_eq!(fallback.update_seq, 2);
    }

    #[rstest]
    fn cancelled_render_without_cache_surfaces_the_error() {
        let mut window = window_at(2);
        window
            .expect_render_cached()
            .returning(|_, _| Err(RenderError::Context(ContextError::Cancelled)));
        let outcome = render_window(&window, "p-1", &Context::background(), &request(0), None);
        assert_eq!(outcome, Err(ContextError::Cancelled.into()));
    }

    #[rstest]
    fn finished_context_fails_before_resizing() {
        let mut window = MockPaneWindow::new();
        window.expect_resize().never();
        let context = Context::background().child();
        context.cancel();
        let error = render_window(&window, "p-1", &context, &request(0), None)
            .expect_err("cancelled");
        assert_eq!(error, ContextError::Cancelled.into());
    }

    #[rstest]
    fn past_wall_clock_deadlines_expire_immediately() {
        let past = PaneViewRequest {
            deadline_unix_nano: 1,
            ..request(0)
        };
        assert!(render_context(&Context::background(), &past).is_done());
        assert!(!render_context(&Context::background(), &request(0)).is_done());
    }
}
