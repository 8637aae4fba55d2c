//! # Job data model and agent capability.
//!
//! - [`JobRequest`] / [`Action`] - validated inbound start request
//! - [`JobHandle`] - runtime record of one accepted job
//! - [`Outcome`] / [`Status`] - immutable terminal result
//! - [`Agent`] / [`AgentFn`] / [`AgentRef`] - the opaque long-running computation

mod agent;
mod handle;
mod outcome;
mod request;

pub use agent::{Agent, AgentFn, AgentRef};
pub use handle::JobHandle;
pub use outcome::{Outcome, Status};
pub use request::{Action, JobRequest};

/// Shortens `text` to at most `max` characters for log lines and envelopes.
///
/// Returns the text unchanged when it fits; otherwise the first `max`
/// characters followed by `suffix`. Cuts on character boundaries.
pub(crate) fn truncate_chars(text: &str, max: usize, suffix: &str) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}{}", &text[..cut], suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::truncate_chars;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate_chars("abc", 3, "..."), "abc");
    }

    #[test]
    fn long_text_is_cut_on_char_boundary() {
        assert_eq!(truncate_chars("ééééé", 2, "…"), "éé…");
    }
}
