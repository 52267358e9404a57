use std::fmt;
use thiserror::Error;

/// One missing or malformed required field, addressed precisely enough for
/// remediation text: parent key, sub-field, and (for array entries) the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub parent: String,
    pub field: String,
    pub index: Option<usize>,
    pub example: &'static str,
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(
                f,
                "{}[{}] is missing \"{}\" — example: {}",
                self.parent, index, self.field, self.example
            ),
            None => {
                write!(f, "{} is missing \"{}\" — example: {}", self.parent, self.field, self.example)
            }
        }
    }
}

/// Candidate causes for a structural parse failure, reported ranked rather
/// than guessed. The parser never claims to know which one is correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseCause {
    TrailingComma,
    MissingComma,
    UnbalancedDelimiter,
    UnmatchedQuote,
}

impl ParseCause {
    pub fn label(self) -> &'static str {
        match self {
            ParseCause::TrailingComma => "a trailing comma before a closing brace or bracket",
            ParseCause::MissingComma => "a missing comma between two entries",
            ParseCause::UnbalancedDelimiter => "an unbalanced brace or bracket",
            ParseCause::UnmatchedQuote => "an unmatched quote",
        }
    }
}

/// Structural parse failure with the recovered 1-based source line.
#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    pub line: usize,
    pub line_text: String,
    pub causes: Vec<ParseCause>,
    pub detail: String,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "could not parse the scene block near line {}:", self.line)?;
        writeln!(f, "   {}", self.line_text)?;
        writeln!(f, "likely causes, most probable first:")?;
        for cause in &self.causes {
            writeln!(f, " - {}", cause.label())?;
        }
        write!(f, "({})", self.detail)
    }
}

impl std::error::Error for ParseDiagnostic {}

fn render_issues(issues: &[FieldIssue]) -> String {
    let mut out = String::from("the scene block is missing required fields:");
    for issue in issues {
        out.push_str("\n - ");
        out.push_str(&issue.to_string());
    }
    out
}

/// Fatal failures of one rendered block. Everything here is caught at the
/// block boundary and surfaced as a notification, never propagated to the
/// host.
#[derive(Debug, Error)]
pub enum BlockError {
    #[error(transparent)]
    Parse(ParseDiagnostic),
    #[error("{}", render_issues(.0))]
    Validation(Vec<FieldIssue>),
    #[error("primary model '{0}' could not be resolved; the block cannot render")]
    PrimaryModelUnresolved(String),
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// A resolved asset whose bytes could not be decoded. Recoverable: the one
/// model (or its companion material) is skipped.
#[derive(Debug, Clone, Error)]
#[error("could not decode '{asset}': {reason}")]
pub struct DecodeError {
    pub asset: String,
    pub reason: String,
}

impl DecodeError {
    pub fn new(asset: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { asset: asset.into(), reason: reason.into() }
    }
}

/// Non-fatal, per-asset warning. The scene still renders with whatever
/// models did resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetWarning {
    pub model: String,
    pub detail: String,
}

impl AssetWarning {
    pub fn new(model: impl Into<String>, detail: impl Into<String>) -> Self {
        Self { model: model.into(), detail: detail.into() }
    }
}

impl fmt::Display for AssetWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model '{}' skipped: {}", self.model, self.detail)
    }
}

/// GPU context failures. `Exhausted` is fatal for the whole document view:
/// it is reported once and never auto-retried, because recovering individual
/// contexts after a shared-resource exhaustion event is unreliable.
#[derive(Debug, Clone, Error)]
pub enum ContextError {
    #[error("the GPU could not provide another rendering context ({0}); close some viewports and reload the document view")]
    Exhausted(String),
    #[error("the rendering context for this viewport was lost")]
    Lost,
}
