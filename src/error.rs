//! Errors that carry their stack across suspension boundaries.
//!
//! A context's call stack is discarded when it suspends, so an error that
//! surfaces after a resumption has lost the chain that led to it. The types
//! here keep the stack as a structured frame list captured independently at
//! each boundary (the original call site, the asynchronous completion site)
//! and spliced together at construction time.

use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

static DEBUG_OVERRIDE: AtomicBool = AtomicBool::new(false);
static DEBUG_ENV: OnceLock<bool> = OnceLock::new();

/// Include this library's own frames in error stacks.
///
/// Off by default; internal frames are noise for anyone who is not debugging
/// the library itself. Also enabled by setting the `TOMORROW_DEBUG`
/// environment variable.
pub fn set_debug(enabled: bool) {
    DEBUG_OVERRIDE.store(enabled, Ordering::SeqCst);
}

pub(crate) fn debug_enabled() -> bool {
    DEBUG_OVERRIDE.load(Ordering::SeqCst)
        || *DEBUG_ENV.get_or_init(|| std::env::var_os("TOMORROW_DEBUG").is_some())
}

/// Faults raised by the engine itself, as opposed to failures reported by a
/// wrapped operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AccessError {
    /// A property or index operation was applied to a bare primitive.
    #[error("a {0} value has no properties")]
    NotAnObject(&'static str),
    /// A call operation was applied to a value with no call behavior.
    #[error("value is not callable")]
    NotCallable,
    /// An unresolved future was forced outside any execution context, so
    /// there is nothing to suspend.
    #[error("cannot force an unresolved future outside an execution context")]
    OutsideContext,
    /// Every reference to the future's engine was dropped before it was
    /// resolved.
    #[error("future was dropped before resolution")]
    Dropped,
}

impl From<AccessError> for TomorrowError {
    fn from(fault: AccessError) -> TomorrowError {
        TomorrowError::new(fault.to_string(), Some(Arc::new(fault)), None)
    }
}

/// An error whose displayed stack is reconstructed from fragments captured at
/// multiple points across one or more suspension boundaries.
///
/// Immutable once constructed. Display is `name: message` followed by the
/// joined frame list, one frame per line.
#[derive(Debug, Clone)]
pub struct TomorrowError {
    message: String,
    name: String,
    frames: Vec<String>,
    origin: Option<Arc<dyn StdError + Send + Sync>>,
}

impl TomorrowError {
    /// Builds an error, splicing stack fragments.
    ///
    /// Structured frames from a `TomorrowError` origin come first since they
    /// are closer to the true origin; a foreign origin instead contributes a
    /// single provenance line. The supplied `stack` (or a capture taken
    /// here, when `None`) is appended, with library-internal frames filtered
    /// out unless debug mode is on.
    pub fn new(
        message: impl Into<String>,
        origin: Option<Arc<dyn StdError + Send + Sync>>,
        stack: Option<Vec<String>>,
    ) -> TomorrowError {
        let message = message.into();
        let mut name = String::from("Error");
        let mut frames = Vec::new();
        let mut prefix = Vec::new();

        if let Some(origin) = &origin {
            match origin.downcast_ref::<TomorrowError>() {
                Some(prior) => {
                    name = prior.name.clone();
                    frames = prior.frames.clone();
                }
                None => prefix.push(format!("caused by: {origin}")),
            }
        }

        let captured = stack.unwrap_or_else(capture_stack);
        let debug = debug_enabled();
        frames.extend(
            prefix
                .into_iter()
                .chain(captured)
                .filter(|frame| debug || !is_internal(frame)),
        );

        TomorrowError {
            message,
            name,
            frames,
            origin,
        }
    }

    /// Replaces the error name leading the display text.
    pub fn with_name(mut self, name: impl Into<String>) -> TomorrowError {
        self.name = name.into();
        self
    }

    /// The failure message, without the name or frames.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The error name leading the display text. `"Error"` unless overridden
    /// or inherited from an origin.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stitched frame list, in origin-first order.
    pub fn frames(&self) -> &[String] {
        &self.frames
    }
}

impl fmt::Display for TomorrowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)?;
        for frame in &self.frames {
            write!(f, "\n{frame}")?;
        }
        Ok(())
    }
}

impl StdError for TomorrowError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match &self.origin {
            Some(origin) => Some(&**origin),
            None => None,
        }
    }
}

fn is_internal(frame: &str) -> bool {
    frame.contains("tomorrow::")
        || frame.contains("tomorrow/src/")
        || frame.contains("tomorrow\\src\\")
}

/// Captures the current stack as trimmed frame lines, dropping everything up
/// to and including this function's own frame.
pub(crate) fn capture_stack() -> Vec<String> {
    let rendered = Backtrace::force_capture().to_string();
    let mut frames: Vec<String> = Vec::new();
    let mut past_self = false;

    for raw in rendered.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let frame_head = line.as_bytes().first().is_some_and(u8::is_ascii_digit);
        if !past_self {
            if frame_head && line.contains("capture_stack") {
                past_self = true;
            }
            continue;
        }
        if frame_head {
            frames.push(line.to_string());
        } else if let Some(last) = frames.last_mut() {
            // Location lines belong to the frame above them.
            last.push(' ');
            last.push_str(line);
        }
    }

    if frames.is_empty() {
        // Symbols unavailable (stripped build); keep the raw rendering.
        frames = rendered
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
    }
    frames
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_errors_carry_their_source() {
        let err = TomorrowError::from(AccessError::NotCallable);
        assert_eq!(err.message(), "value is not callable");
        assert!(err.source().is_some());
    }

    #[test]
    fn display_is_name_message_then_frames() {
        let err = TomorrowError::new("gone", None, Some(vec!["at a".into(), "at b".into()]));
        assert_eq!(err.to_string(), "Error: gone\nat a\nat b");
    }
}
