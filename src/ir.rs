use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    TopDown,
    TopBottom,
    BottomTop,
    LeftRight,
    RightLeft,
}

impl Direction {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "TD" => Some(Self::TopDown),
            "TB" => Some(Self::TopBottom),
            "BT" => Some(Self::BottomTop),
            "LR" => Some(Self::LeftRight),
            "RL" => Some(Self::RightLeft),
            _ => None,
        }
    }
}

/// Diagram family reported to callers once a source has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagramKind {
    Flowchart,
    Sequence,
    Class,
    State,
    Er,
}

impl DiagramKind {
    /// Classifies a source by its leading declaration. Anything that is not one
    /// of the other known families is labelled a flowchart.
    pub fn detect(source: &str) -> Self {
        let trimmed = source.trim_start();
        if trimmed.starts_with("sequenceDiagram") {
            Self::Sequence
        } else if trimmed.starts_with("classDiagram") {
            Self::Class
        } else if trimmed.starts_with("stateDiagram") {
            Self::State
        } else if trimmed.starts_with("erDiagram") {
            Self::Er
        } else {
            Self::Flowchart
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flowchart => "flowchart",
            Self::Sequence => "sequence",
            Self::Class => "class",
            Self::State => "state",
            Self::Er => "er",
        }
    }
}

impl fmt::Display for DiagramKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleaned diagram text produced by the extractor.
///
/// There is no way to mutate a source in place: repairs and retries always
/// build a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DiagramSource(String);

impl DiagramSource {
    pub(crate) fn new(source: String) -> Self {
        Self(source)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Layout direction of a `flowchart <DIR>` declaration, if the first line has one.
    pub fn direction(&self) -> Option<Direction> {
        let first = self.0.lines().next()?.trim();
        let mut tokens = first.split_whitespace();
        let keyword = tokens.next()?;
        if !keyword.eq_ignore_ascii_case("flowchart") && !keyword.eq_ignore_ascii_case("graph") {
            return None;
        }
        tokens
            .next()
            .and_then(|token| Direction::from_token(token.trim_end_matches(';')))
    }
}

impl AsRef<str> for DiagramSource {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagramSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
