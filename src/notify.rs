use crate::context::BlockId;
use crate::error::{AssetWarning, BlockError};
use std::time::Duration;

/// Host capability for transient, auto-dismissing user notifications.
pub trait Notifier {
    fn notify(&mut self, message: &str, duration: Duration);
}

const BASE_SECONDS: u64 = 4;
const PER_LINE_SECONDS: u64 = 2;
const MAX_SECONDS: u64 = 20;

/// Duration proportional to message complexity: short for one-line
/// warnings, long for multi-line diagnostics.
pub fn duration_for(message: &str) -> Duration {
    let extra_lines = message.lines().count().saturating_sub(1) as u64;
    Duration::from_secs((BASE_SECONDS + extra_lines * PER_LINE_SECONDS).min(MAX_SECONDS))
}

/// Inline diagnostic attached to a failed block's rendered element for
/// on-demand inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockMarker {
    pub block: BlockId,
    pub text: String,
}

/// Converts a fatal block failure into a notification plus an inline
/// marker. Nothing propagates past this boundary.
pub fn report_block_error(
    notifier: &mut dyn Notifier,
    block: &BlockId,
    error: &BlockError,
) -> BlockMarker {
    let text = error.to_string();
    log::warn!("block '{}' failed: {text}", block.0);
    notifier.notify(&text, duration_for(&text));
    BlockMarker { block: block.clone(), text }
}

/// Per-asset warnings are reported individually; rendering continues.
pub fn report_asset_warnings(notifier: &mut dyn Notifier, warnings: &[AssetWarning]) {
    for warning in warnings {
        let text = warning.to_string();
        log::warn!("{text}");
        notifier.notify(&text, duration_for(&text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FieldIssue, ParseCause, ParseDiagnostic};

    #[derive(Default)]
    struct FakeNotifier {
        messages: Vec<(String, Duration)>,
    }

    impl Notifier for FakeNotifier {
        fn notify(&mut self, message: &str, duration: Duration) {
            self.messages.push((message.to_string(), duration));
        }
    }

    #[test]
    fn duration_scales_with_line_count() {
        let short = duration_for("one line");
        let long = duration_for("a\nb\nc\nd");
        assert_eq!(short, Duration::from_secs(4));
        assert_eq!(long, Duration::from_secs(10));
        let capped = duration_for(&"line\n".repeat(50));
        assert_eq!(capped, Duration::from_secs(20));
    }

    #[test]
    fn parse_failures_produce_marker_and_notification() {
        let mut notifier = FakeNotifier::default();
        let block = BlockId("block-1".to_string());
        let error = BlockError::Parse(ParseDiagnostic {
            line: 3,
            line_text: "\"scale\": 1,".to_string(),
            causes: vec![ParseCause::TrailingComma, ParseCause::MissingComma],
            detail: "expected value".to_string(),
        });
        let marker = report_block_error(&mut notifier, &block, &error);
        assert_eq!(marker.block, block);
        assert!(marker.text.contains("line 3"));
        assert_eq!(notifier.messages.len(), 1);
        // Multi-line diagnostic earns a longer display.
        assert!(notifier.messages[0].1 > Duration::from_secs(4));
    }

    #[test]
    fn validation_reports_every_field_in_one_notification() {
        let mut notifier = FakeNotifier::default();
        let block = BlockId("block-2".to_string());
        let error = BlockError::Validation(vec![
            FieldIssue {
                parent: "models".to_string(),
                field: "scale".to_string(),
                index: Some(0),
                example: "scale: 1",
            },
            FieldIssue {
                parent: "camera".to_string(),
                field: "LookatXYZ".to_string(),
                index: None,
                example: "LookatXYZ: [0, 0, 0]",
            },
        ]);
        let marker = report_block_error(&mut notifier, &block, &error);
        assert!(marker.text.contains("models[0]"));
        assert!(marker.text.contains("LookatXYZ"));
    }
}
