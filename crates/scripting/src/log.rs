//! Parse log handler stack
//!
//! Parsing tries many candidates, and most attempts fail. Each attempt runs
//! in its own frame; when all attempts fail, the frame is closed keeping the
//! single most specific error instead of every message. Entries that reach
//! the root are emitted through `tracing` and counted.

use std::fmt;
use trellis_core::SourceLocation;

/// How specific an error message is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorQuality {
    /// Generic fallback message
    None,
    /// The text is not the kind of thing that was expected
    NotAnExpression,
    /// The text was understood but is invalid in this place
    SemanticError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
    pub quality: ErrorQuality,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} ({})", self.message, location),
            None => f.write_str(&self.message),
        }
    }
}

/// Handle of an open frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "frames must be closed"]
pub struct Frame(usize);

#[derive(Debug, Default)]
struct Buffer {
    errors: Vec<LogEntry>,
    warnings: Vec<LogEntry>,
}

impl Buffer {
    /// Strictly better quality replaces, so the earliest wins ties
    fn best_error(&self) -> Option<&LogEntry> {
        self.errors.iter().fold(None, |best: Option<&LogEntry>, entry| match best {
            Some(best) if best.quality >= entry.quality => Some(best),
            _ => Some(entry),
        })
    }
}

/// Stack of nested log frames
#[derive(Debug, Default)]
pub struct LogStack {
    frames: Vec<Buffer>,
    location: Option<SourceLocation>,
    errors: usize,
    warnings: usize,
    emitted: Vec<LogEntry>,
}

impl LogStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Location attached to subsequent entries
    pub fn set_location(&mut self, location: Option<SourceLocation>) {
        self.location = location;
    }

    pub fn location(&self) -> Option<&SourceLocation> {
        self.location.as_ref()
    }

    /// Open a nested frame
    pub fn open(&mut self) -> Frame {
        self.frames.push(Buffer::default());
        Frame(self.frames.len())
    }

    pub fn error(&mut self, message: impl Into<String>, quality: ErrorQuality) {
        let entry = self.entry(Severity::Error, message.into(), quality);
        match self.frames.last_mut() {
            Some(buffer) => buffer.errors.push(entry),
            None => self.emit(entry),
        }
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let entry = self.entry(Severity::Warning, message.into(), ErrorQuality::None);
        match self.frames.last_mut() {
            Some(buffer) => buffer.warnings.push(entry),
            None => self.emit(entry),
        }
    }

    /// Whether the innermost frame holds an error
    pub fn has_error(&self) -> bool {
        self.frames.last().is_some_and(|b| !b.errors.is_empty())
    }

    /// Quality of the best error in the innermost frame
    pub fn best_quality(&self) -> Option<ErrorQuality> {
        self.frames.last().and_then(Buffer::best_error).map(|e| e.quality)
    }

    /// Close a frame after success: errors are dropped, warnings forwarded
    pub fn close_success(&mut self, frame: Frame) {
        if let Some(buffer) = self.pop(frame) {
            self.forward_warnings(buffer.warnings);
        }
    }

    /// Close a frame after failure: forward only the best error, or the
    /// given default if the frame holds none. Warnings of the failed
    /// attempt are dropped.
    pub fn close_with_best_error(&mut self, frame: Frame, default: Option<(&str, ErrorQuality)>) {
        let Some(buffer) = self.pop(frame) else {
            return;
        };
        let best = buffer.best_error().cloned().or_else(|| {
            default.map(|(message, quality)| self.entry(Severity::Error, message.to_string(), quality))
        });
        if let Some(entry) = best {
            match self.frames.last_mut() {
                Some(parent) => parent.errors.push(entry),
                None => self.emit(entry),
            }
        }
    }

    /// Close a frame, discarding everything it holds
    pub fn close_discard(&mut self, frame: Frame) {
        self.pop(frame);
    }

    /// Root-level counts (errors, warnings)
    pub fn counts(&self) -> (usize, usize) {
        (self.errors, self.warnings)
    }

    /// Entries emitted at the root so far
    pub fn emitted(&self) -> &[LogEntry] {
        &self.emitted
    }

    /// Reset root-level counts and emitted entries
    pub fn take_emitted(&mut self) -> Vec<LogEntry> {
        self.errors = 0;
        self.warnings = 0;
        std::mem::take(&mut self.emitted)
    }

    fn entry(&self, severity: Severity, message: String, quality: ErrorQuality) -> LogEntry {
        LogEntry {
            severity,
            message,
            quality,
            location: self.location.clone(),
        }
    }

    /// Pop down to and including `frame`; frames opened inside it but not
    /// closed are discarded with it
    fn pop(&mut self, frame: Frame) -> Option<Buffer> {
        if frame.0 == 0 || frame.0 > self.frames.len() {
            tracing::debug!("Closing log frame {} that is not open", frame.0);
            return None;
        }
        if frame.0 < self.frames.len() {
            tracing::debug!("Discarding {} unclosed log frames", self.frames.len() - frame.0);
            self.frames.truncate(frame.0);
        }
        self.frames.pop()
    }

    fn forward_warnings(&mut self, warnings: Vec<LogEntry>) {
        match self.frames.last_mut() {
            Some(parent) => parent.warnings.extend(warnings),
            None => warnings.into_iter().for_each(|w| self.emit(w)),
        }
    }

    fn emit(&mut self, entry: LogEntry) {
        match entry.severity {
            Severity::Error => {
                self.errors += 1;
                tracing::error!(target: "script", "{}", entry);
            }
            Severity::Warning => {
                self.warnings += 1;
                tracing::warn!(target: "script", "{}", entry);
            }
        }
        self.emitted.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_error_wins() {
        let mut log = LogStack::new();
        let frame = log.open();
        log.error("first generic", ErrorQuality::NotAnExpression);
        log.error("specific", ErrorQuality::SemanticError);
        log.error("later specific", ErrorQuality::SemanticError);
        log.close_with_best_error(frame, None);

        assert_eq!(log.counts(), (1, 0));
        assert_eq!(log.emitted()[0].message, "specific");
    }

    #[test]
    fn test_default_error() {
        let mut log = LogStack::new();
        let frame = log.open();
        log.close_with_best_error(frame, Some(("can't understand this", ErrorQuality::None)));
        assert_eq!(log.emitted()[0].message, "can't understand this");
    }

    #[test]
    fn test_success_keeps_warnings_only() {
        let mut log = LogStack::new();
        let outer = log.open();
        let inner = log.open();
        log.error("attempt failed", ErrorQuality::SemanticError);
        log.warning("list is missing 'and'");
        log.close_success(inner);
        assert!(!log.has_error());
        log.close_success(outer);
        assert_eq!(log.counts(), (0, 1));
    }

    #[test]
    fn test_nested_best_error_propagates() {
        let mut log = LogStack::new();
        log.set_location(Some(SourceLocation::new("test.sk", 3)));
        let outer = log.open();
        let inner = log.open();
        log.error("inner", ErrorQuality::SemanticError);
        log.close_with_best_error(inner, None);
        log.error("outer", ErrorQuality::NotAnExpression);
        assert_eq!(log.best_quality(), Some(ErrorQuality::SemanticError));
        log.close_with_best_error(outer, None);

        let entry = &log.emitted()[0];
        assert_eq!(entry.message, "inner");
        assert_eq!(entry.to_string(), "inner (test.sk, line 3)");
    }

    #[test]
    fn test_unclosed_inner_frames_are_discarded() {
        let mut log = LogStack::new();
        let outer = log.open();
        let _inner = log.open();
        log.error("lost", ErrorQuality::SemanticError);
        log.close_discard(outer);
        log.error("root", ErrorQuality::None);
        assert_eq!(log.counts(), (1, 0));
    }
}
