//! Classification of normalized transport status lines.
//!
//! Works on whatever text representation the transport adapter provides,
//! so the vocabulary is independent of the concrete transport.

/// Category of one status line. Markers are checked in declaration order;
/// the first match wins, and unmatched lines are inert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum StatusClass {
    /// The remote forward is established.
    Success,
    /// The remote end refused or could not bind the forward.
    Failure,
    /// The transport reports it was killed; carries the message tail.
    Terminated(String),
    /// Anything else: feeds activity tracking only.
    Inert,
}

pub(crate) fn classify(line: &str) -> StatusClass {
    if line.contains("success") {
        return StatusClass::Success;
    }
    if line.contains("failed") {
        return StatusClass::Failure;
    }
    let lowered = line.to_lowercase();
    if let Some(index) = lowered.find("killed") {
        return StatusClass::Terminated(lowered[index..].trim().to_string());
    }
    StatusClass::Inert
}
