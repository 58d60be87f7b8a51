use std::{collections::VecDeque, time::Duration};
use tracing::{debug, warn};

use crate::provider::{CoreError, LogRequest, LogTarget};

pub const LOG_RETENTION_LINES: usize = 10_000;
pub const LOG_REFRESH_PERIOD: Duration = Duration::from_secs(2);
/// Distance from the bottom, in lines, that still counts as following.
pub const AUTO_SCROLL_SLACK: usize = 5;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogState {
    Idle,
    Loading,
    Streaming,
    SearchActive,
    Error,
}

#[derive(Debug, Clone)]
struct LogSession {
    target: LogTarget,
    state: LogState,
    raw: String,
    lines: VecDeque<String>,
    /// Lines dropped from the head of `raw` by the retention bound.
    evicted: usize,
    revision: u64,
    search: String,
    scroll_offset: usize,
    auto_scroll: bool,
    auto_refresh: bool,
    last_error: Option<String>,
}

impl LogSession {
    fn new(target: LogTarget, auto_refresh: bool) -> Self {
        Self {
            target,
            state: LogState::Loading,
            raw: String::new(),
            lines: VecDeque::new(),
            evicted: 0,
            revision: 0,
            search: String::new(),
            scroll_offset: 0,
            auto_scroll: true,
            auto_refresh,
            last_error: None,
        }
    }

    fn replace_content(&mut self, text: String) {
        let mut lines = text.lines().map(str::to_string).collect::<VecDeque<_>>();
        let overflow = lines.len().saturating_sub(LOG_RETENTION_LINES);
        lines.drain(..overflow);
        self.lines = lines;
        self.evicted = overflow;
        self.raw = text;
        self.revision += 1;
    }

    fn visible_count(&self) -> usize {
        if self.search.is_empty() {
            return self.lines.len();
        }
        let needle = self.search.to_lowercase();
        self.lines
            .iter()
            .filter(|line| line.to_lowercase().contains(&needle))
            .count()
    }
}

/// One live log-tailing session at a time, plus the generation counter that
/// keeps superseded refresh chains from fetching.
#[derive(Debug, Clone)]
pub struct LogStream {
    session: Option<LogSession>,
    generation: u64,
    page_size: usize,
}

impl Default for LogStream {
    fn default() -> Self {
        Self {
            session: None,
            generation: 0,
            page_size: 1,
        }
    }
}

impl LogStream {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn state(&self) -> LogState {
        self.session
            .as_ref()
            .map(|session| session.state)
            .unwrap_or(LogState::Idle)
    }

    pub fn target(&self) -> Option<&LogTarget> {
        self.session.as_ref().map(|session| &session.target)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn last_error(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|session| session.last_error.as_deref())
    }

    pub fn search(&self) -> &str {
        self.session
            .as_ref()
            .map(|session| session.search.as_str())
            .unwrap_or("")
    }

    pub fn scroll_offset(&self) -> usize {
        self.session
            .as_ref()
            .map(|session| session.scroll_offset)
            .unwrap_or(0)
    }

    pub fn auto_scroll(&self) -> bool {
        self.session.as_ref().is_some_and(|session| session.auto_scroll)
    }

    pub fn auto_refresh(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.auto_refresh)
    }

    pub fn line_count(&self) -> usize {
        self.session
            .as_ref()
            .map(|session| session.lines.len())
            .unwrap_or(0)
    }

    pub fn content_revision(&self) -> u64 {
        self.session
            .as_ref()
            .map(|session| session.revision)
            .unwrap_or(0)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.clamp_scroll();
    }

    fn request(&self, target: LogTarget) -> LogRequest {
        LogRequest {
            target,
            generation: self.generation,
        }
    }

    pub fn start(&mut self, target: LogTarget) -> LogRequest {
        let auto_refresh = self
            .session
            .as_ref()
            .map(|session| session.auto_refresh)
            .unwrap_or(true);
        self.generation += 1;
        self.session = Some(LogSession::new(target.clone(), auto_refresh));
        self.request(target)
    }

    pub fn current_request(&self) -> Option<LogRequest> {
        let session = self.session.as_ref()?;
        Some(self.request(session.target.clone()))
    }

    pub fn stop(&mut self) {
        if self.session.take().is_some() {
            self.generation += 1;
        }
    }

    /// Applies a fetch result. Returns whether the refresh chain should
    /// schedule its next tick.
    pub fn apply_fetch(&mut self, target: &LogTarget, result: Result<String, CoreError>) -> bool {
        let Some(session) = self.session.as_mut() else {
            debug!(log_target = %target.label(), "dropping log result for closed session");
            return false;
        };
        if &session.target != target {
            debug!(
                log_target = %target.label(),
                current = %session.target.label(),
                "dropping log result for previous target"
            );
            return false;
        }

        match result {
            Ok(text) => {
                if text != session.raw {
                    session.replace_content(text);
                }
                session.last_error = None;
                if session.state != LogState::SearchActive {
                    session.state = LogState::Streaming;
                }
            }
            Err(err) => {
                warn!(log_target = %target.label(), error = %err, "log fetch failed");
                session.last_error = Some(err.to_string());
                if session.state != LogState::SearchActive {
                    session.state = LogState::Error;
                }
            }
        }

        if session.auto_scroll && session.state != LogState::SearchActive {
            session.scroll_offset = session.visible_count().saturating_sub(self.page_size);
        }
        self.clamp_scroll();

        self.session
            .as_ref()
            .is_some_and(|session| session.auto_refresh && session.state != LogState::SearchActive)
    }

    /// Handles a refresh timer firing; returns the fetch to issue, if the
    /// chain is still current.
    pub fn on_tick(&self, target: &LogTarget, generation: u64) -> Option<LogRequest> {
        let session = self.session.as_ref()?;
        if generation != self.generation || &session.target != target {
            return None;
        }
        if !session.auto_refresh {
            return None;
        }
        match session.state {
            LogState::Streaming | LogState::Error => Some(self.request(target.clone())),
            _ => None,
        }
    }

    pub fn toggle_auto_refresh(&mut self) -> Option<LogRequest> {
        let session = self.session.as_mut()?;
        session.auto_refresh = !session.auto_refresh;
        let resume = session.auto_refresh
            && matches!(session.state, LogState::Streaming | LogState::Error);
        let target = session.target.clone();
        self.generation += 1;
        resume.then(|| self.request(target))
    }

    pub fn begin_search(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.state = LogState::SearchActive;
        session.search.clear();
        session.scroll_offset = 0;
        self.generation += 1;
    }

    pub fn push_search_char(&mut self, c: char) {
        if let Some(session) = self.session.as_mut()
            && session.state == LogState::SearchActive
        {
            session.search.push(c);
            session.scroll_offset = 0;
        }
    }

    pub fn pop_search_char(&mut self) {
        if let Some(session) = self.session.as_mut()
            && session.state == LogState::SearchActive
        {
            session.search.pop();
            session.scroll_offset = 0;
        }
    }

    /// Leaves search, clearing the term, and returns the immediate re-fetch.
    pub fn end_search(&mut self) -> Option<LogRequest> {
        let session = self.session.as_mut()?;
        if session.state != LogState::SearchActive {
            return None;
        }
        session.search.clear();
        session.scroll_offset = 0;
        session.state = if session.last_error.is_some() {
            LogState::Error
        } else {
            LogState::Streaming
        };
        let target = session.target.clone();
        self.generation += 1;
        Some(self.request(target))
    }

    pub fn max_scroll(&self) -> usize {
        self.session
            .as_ref()
            .map(|session| session.visible_count().saturating_sub(self.page_size))
            .unwrap_or(0)
    }

    pub fn scroll_to(&mut self, offset: usize) {
        let max_scroll = self.max_scroll();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.scroll_offset = offset.min(max_scroll);
        session.auto_scroll = session.scroll_offset >= max_scroll.saturating_sub(AUTO_SCROLL_SLACK);
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let current = self.scroll_offset();
        self.scroll_to(current.saturating_add_signed(delta));
    }

    pub fn page_down(&mut self) {
        self.scroll_by(self.page_size as isize);
    }

    pub fn page_up(&mut self) {
        self.scroll_by(-(self.page_size as isize));
    }

    fn clamp_scroll(&mut self) {
        let max_scroll = self.max_scroll();
        if let Some(session) = self.session.as_mut() {
            session.scroll_offset = session.scroll_offset.min(max_scroll);
        }
    }

    /// Lines matching the current search with their original 1-based numbers.
    pub fn visible_lines(&self) -> Vec<(usize, &str)> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let needle = session.search.to_lowercase();
        session
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| needle.is_empty() || line.to_lowercase().contains(&needle))
            .map(|(index, line)| (session.evicted + index + 1, line.as_str()))
            .collect()
    }

    pub fn page(&self) -> Vec<(usize, &str)> {
        self.visible_lines()
            .into_iter()
            .skip(self.scroll_offset())
            .take(self.page_size)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{LOG_RETENTION_LINES, LogState, LogStream};
    use crate::model::EntityKey;
    use crate::provider::{CoreError, LogTarget};

    fn target(container: &str) -> LogTarget {
        LogTarget {
            entity: EntityKey::pod("ml", "trainer-0"),
            container: Some(container.to_string()),
        }
    }

    fn numbered(count: usize) -> String {
        (1..=count)
            .map(|index| format!("line {index}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn streaming(count: usize) -> LogStream {
        let mut stream = LogStream::default();
        stream.set_page_size(10);
        let request = stream.start(target("main"));
        assert!(stream.apply_fetch(&request.target, Ok(numbered(count))));
        stream
    }

    #[test]
    fn first_fetch_streams_and_follows_bottom() {
        let stream = streaming(50);
        assert_eq!(stream.state(), LogState::Streaming);
        assert_eq!(stream.line_count(), 50);
        assert_eq!(stream.scroll_offset(), 40);
        assert!(stream.auto_scroll());
    }

    #[test]
    fn result_after_exit_is_discarded() {
        let mut stream = LogStream::default();
        let request = stream.start(target("main"));
        stream.stop();

        assert!(!stream.apply_fetch(&request.target, Ok(numbered(3))));
        assert!(!stream.apply_fetch(&request.target, Err(CoreError::LogFetch("gone".into()))));
        assert_eq!(stream.line_count(), 0);
        assert_eq!(stream.last_error(), None);
        assert_eq!(stream.state(), LogState::Idle);
    }

    #[test]
    fn result_for_previous_container_is_discarded() {
        let mut stream = LogStream::default();
        let first = stream.start(target("main"));
        let second = stream.start(target("sidecar"));

        assert!(!stream.apply_fetch(&first.target, Ok(numbered(3))));
        assert_eq!(stream.line_count(), 0);
        assert_eq!(stream.state(), LogState::Loading);
        assert!(stream.apply_fetch(&second.target, Ok(numbered(2))));
        assert_eq!(stream.line_count(), 2);
    }

    #[test]
    fn unchanged_content_is_not_split_again() {
        let mut stream = streaming(5);
        let revision = stream.content_revision();
        let current = target("main");
        stream.apply_fetch(&current, Ok(numbered(5)));
        assert_eq!(stream.content_revision(), revision);
        stream.apply_fetch(&current, Ok(numbered(6)));
        assert_eq!(stream.content_revision(), revision + 1);
    }

    #[test]
    fn retention_keeps_newest_lines_with_original_numbers() {
        let stream = streaming(LOG_RETENTION_LINES + 25);
        assert_eq!(stream.line_count(), LOG_RETENTION_LINES);
        let lines = stream.visible_lines();
        assert_eq!(lines[0], (26, "line 26"));
        assert_eq!(
            lines.last().copied(),
            Some((LOG_RETENTION_LINES + 25, "line 10025"))
        );
    }

    #[test]
    fn fetch_error_is_recorded_and_cleared_by_next_success() {
        let mut stream = streaming(5);
        let current = target("main");
        assert!(stream.apply_fetch(&current, Err(CoreError::LogFetch("timeout".into()))));
        assert_eq!(stream.state(), LogState::Error);
        assert_eq!(stream.last_error(), Some("log fetch failed: timeout"));
        assert_eq!(stream.line_count(), 5);

        assert!(stream.on_tick(&current, stream.generation()).is_some());
        stream.apply_fetch(&current, Ok(numbered(5)));
        assert_eq!(stream.state(), LogState::Streaming);
        assert_eq!(stream.last_error(), None);
    }

    #[test]
    fn auto_scroll_hysteresis_near_bottom() {
        let mut stream = streaming(50);
        let max_scroll = stream.max_scroll();
        assert_eq!(max_scroll, 40);

        stream.scroll_to(max_scroll - 6);
        assert!(!stream.auto_scroll());
        stream.scroll_to(max_scroll - 5);
        assert!(stream.auto_scroll());
        stream.page_up();
        assert!(!stream.auto_scroll());
        stream.page_down();
        assert!(stream.auto_scroll());
    }

    #[test]
    fn manual_scroll_position_survives_refresh() {
        let mut stream = streaming(50);
        stream.scroll_to(3);
        stream.apply_fetch(&target("main"), Ok(numbered(60)));
        assert_eq!(stream.scroll_offset(), 3);
    }

    #[test]
    fn search_filters_case_insensitively_and_pauses_refresh() {
        let mut stream = LogStream::default();
        stream.set_page_size(10);
        let current = target("main");
        let request = stream.start(current.clone());
        stream.apply_fetch(
            &request.target,
            Ok("INFO ready\nwarn: disk\nInfo done".to_string()),
        );
        stream.scroll_to(1);

        stream.begin_search();
        let paused = stream.generation();
        for c in "info".chars() {
            stream.push_search_char(c);
        }
        assert_eq!(stream.state(), LogState::SearchActive);
        assert_eq!(stream.scroll_offset(), 0);
        assert_eq!(
            stream.visible_lines(),
            vec![(1, "INFO ready"), (3, "Info done")]
        );
        assert!(stream.on_tick(&current, paused).is_none());
        assert!(!stream.apply_fetch(&current, Ok("INFO ready".to_string())));

        let resumed = stream.end_search().unwrap();
        assert_eq!(resumed.target, current);
        assert_eq!(resumed.generation, stream.generation());
        assert_eq!(stream.search(), "");
        assert_eq!(stream.state(), LogState::Streaming);
    }

    #[test]
    fn late_fetch_during_search_keeps_search_scroll() {
        let mut stream = streaming(40);
        assert!(stream.auto_scroll());
        stream.begin_search();
        stream.push_search_char('1');
        assert_eq!(stream.scroll_offset(), 0);

        let more = format!("{}\nline 41", numbered(40));
        assert!(!stream.apply_fetch(&target("main"), Ok(more)));
        assert_eq!(stream.state(), LogState::SearchActive);
        assert_eq!(stream.scroll_offset(), 0);
    }

    #[test]
    fn stale_tick_generation_does_not_fetch() {
        let mut stream = streaming(5);
        let current = target("main");
        let old = stream.generation();
        assert!(stream.on_tick(&current, old).is_some());

        assert!(stream.toggle_auto_refresh().is_none());
        assert!(!stream.auto_refresh());
        assert!(stream.on_tick(&current, stream.generation()).is_none());

        let resumed = stream.toggle_auto_refresh().unwrap();
        assert!(stream.on_tick(&current, old).is_none());
        assert!(stream.on_tick(&current, resumed.generation).is_some());
    }

    #[test]
    fn loading_session_waits_for_inflight_fetch() {
        let mut stream = LogStream::default();
        let request = stream.start(target("main"));
        assert!(stream.on_tick(&request.target, request.generation).is_none());
    }
}
