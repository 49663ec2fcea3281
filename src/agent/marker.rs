//! Marker strings agents emit on stdout to signal phase transitions, and
//! the stream-json line shape used by the implementation agent.

/// A recognized marker line from an agent's stdout. Parsing is localized
/// here rather than scattered through the worker pool's phase machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Marker {
    ReadyForReview,
    Approved,
    ChangesRequested(String),
    MergeComplete,
    IssueComplete,
    Blocked(String),
    PlanningComplete,
    QualityReviewComplete,
    BreakdownComplete,
}

impl Marker {
    /// Scan `line` for the first recognized marker. `CHANGES_REQUESTED:` and
    /// `BLOCKED:` carry the remainder of the line as payload text.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("CHANGES_REQUESTED:") {
            return Some(Self::ChangesRequested(rest.trim().to_owned()));
        }
        if let Some(rest) = trimmed.strip_prefix("BLOCKED:") {
            return Some(Self::Blocked(rest.trim().to_owned()));
        }
        if trimmed.contains("READY_FOR_REVIEW") {
            return Some(Self::ReadyForReview);
        }
        if trimmed.contains("APPROVED") {
            return Some(Self::Approved);
        }
        if trimmed.contains("MERGE_COMPLETE") {
            return Some(Self::MergeComplete);
        }
        if trimmed.contains("ISSUE_COMPLETE") {
            return Some(Self::IssueComplete);
        }
        if trimmed.contains("PLANNING_COMPLETE") {
            return Some(Self::PlanningComplete);
        }
        if trimmed.contains("QUALITY_REVIEW_COMPLETE") {
            return Some(Self::QualityReviewComplete);
        }
        if trimmed.contains("BREAKDOWN_COMPLETE") {
            return Some(Self::BreakdownComplete);
        }
        None
    }

    /// Scan every line of `output`, returning the first recognized marker.
    #[must_use]
    pub fn find_in(output: &str) -> Option<Self> {
        output.lines().find_map(Self::parse)
    }
}

/// One line of an implementation agent's `stream-json` output: a JSON
/// object per line, `type`-tagged, with assistant text nested under
/// `message.content[].text` or `event.delta.text` depending on emitter.
#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct StreamJsonLine {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub message: Option<StreamJsonMessage>,
    #[serde(default)]
    pub event: Option<StreamJsonEvent>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct StreamJsonMessage {
    #[serde(default)]
    pub content: Vec<StreamJsonContentBlock>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct StreamJsonContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct StreamJsonEvent {
    #[serde(default)]
    pub delta: Option<StreamJsonDelta>,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize)]
pub struct StreamJsonDelta {
    #[serde(default)]
    pub text: Option<String>,
}

impl StreamJsonLine {
    /// Extract the concatenated assistant-visible text from whichever
    /// shape this line uses, or `None` for lines carrying no text (tool
    /// calls, lifecycle events).
    #[must_use]
    pub fn text(&self) -> Option<String> {
        if let Some(message) = &self.message {
            let joined: String = message
                .content
                .iter()
                .filter_map(|b| b.text.as_deref())
                .collect::<Vec<_>>()
                .join("");
            if !joined.is_empty() {
                return Some(joined);
            }
        }
        self.event.as_ref()?.delta.as_ref()?.text.clone()
    }

    /// Parse one `stream-json` line, ignoring ones that don't parse as the
    /// expected shape (tool-call-only lines, unrecognized event types).
    #[must_use]
    pub fn parse_line(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }
}

/// Decode one line of the implementer's `stream-json` stdout for marker
/// scanning: unwrap assistant text if the line parses as an envelope,
/// otherwise pass it through unchanged. A line that parses but carries no
/// text (a tool call, a lifecycle event) yields an empty string rather than
/// `None`, so it still contributes a blank line to the scanned buffer
/// instead of silently disappearing.
#[must_use]
pub fn implementer_output_text(line: &str) -> String {
    match StreamJsonLine::parse_line(line) {
        Some(parsed) => parsed.text().unwrap_or_default(),
        None => line.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_requested_carries_feedback_text() {
        let marker = Marker::parse("CHANGES_REQUESTED: add a null check").unwrap();
        assert_eq!(marker, Marker::ChangesRequested("add a null check".to_owned()));
    }

    #[test]
    fn blocked_carries_reason() {
        let marker = Marker::parse("BLOCKED: missing API credentials").unwrap();
        assert_eq!(marker, Marker::Blocked("missing API credentials".to_owned()));
    }

    #[test]
    fn bare_markers_recognized_anywhere_in_line() {
        assert_eq!(Marker::parse("worker> READY_FOR_REVIEW"), Some(Marker::ReadyForReview));
        assert_eq!(Marker::parse("APPROVED"), Some(Marker::Approved));
        assert_eq!(Marker::parse("MERGE_COMPLETE"), Some(Marker::MergeComplete));
    }

    #[test]
    fn unrecognized_line_is_none() {
        assert!(Marker::parse("just some chatter").is_none());
    }

    #[test]
    fn find_in_scans_multiline_output() {
        let output = "thinking...\nstill working\nREADY_FOR_REVIEW\n";
        assert_eq!(Marker::find_in(output), Some(Marker::ReadyForReview));
    }

    #[test]
    fn stream_json_text_from_message_content() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hello"}]}}"#;
        let parsed = StreamJsonLine::parse_line(line).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("hello"));
    }

    #[test]
    fn stream_json_text_from_event_delta() {
        let line = r#"{"type":"content_block_delta","event":{"delta":{"text":"partial"}}}"#;
        let parsed = StreamJsonLine::parse_line(line).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("partial"));
    }

    #[test]
    fn stream_json_tool_use_line_has_no_text() {
        let line = r#"{"type":"tool_use"}"#;
        let parsed = StreamJsonLine::parse_line(line).unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn implementer_output_text_unwraps_stream_json() {
        let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"READY_FOR_REVIEW"}]}}"#;
        assert_eq!(implementer_output_text(line), "READY_FOR_REVIEW");
    }

    #[test]
    fn implementer_output_text_passes_through_non_json() {
        assert_eq!(implementer_output_text("READY_FOR_REVIEW"), "READY_FOR_REVIEW");
    }

    #[test]
    fn implementer_output_text_blanks_textless_envelope_lines() {
        assert_eq!(implementer_output_text(r#"{"type":"tool_use"}"#), "");
    }
}
