use thiserror::Error;

use crate::{Anchors, Collected, Message, RangeEnd, Snowflake};

/// The harvested data does not contain the requested boundary messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssembleError {
    #[error("{end} anchor message {id} was not found in the harvested messages")]
    AnchorNotFound { end: RangeEnd, id: Snowflake },
    #[error("neither anchor message was found in the harvested messages (older {older}, newer {newer})")]
    AnchorsNotFound { older: Snowflake, newer: Snowflake },
}

impl AssembleError {
    /// The range ends whose anchors are missing.
    pub fn missing_ends(&self) -> Vec<RangeEnd> {
        match self {
            AssembleError::AnchorNotFound { end, .. } => vec![*end],
            AssembleError::AnchorsNotFound { .. } => vec![RangeEnd::Older, RangeEnd::Newer],
        }
    }
}

/// Cuts the inclusive slice between the two anchors out of `collected`.
///
/// The result is ascending by id and starts and ends with the anchors.
pub fn assemble(collected: &Collected, anchors: &Anchors) -> Result<Vec<Message>, AssembleError> {
    // The map is keyed by id, so its values are already unique and sorted.
    let ordered: Vec<&Message> = collected.values().collect();

    let start = ordered.iter().position(|m| m.id == anchors.start);
    let end = ordered.iter().position(|m| m.id == anchors.end);

    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        (None, None) => {
            let range = anchors.range();
            return Err(AssembleError::AnchorsNotFound {
                older: range.older().clone(),
                newer: range.newer().clone(),
            });
        }
        (None, Some(_)) => return Err(missing(anchors, &anchors.start)),
        (Some(_), None) => return Err(missing(anchors, &anchors.end)),
    };

    let (low, high) = (start.min(end), start.max(end));
    Ok(ordered[low..=high].iter().map(|m| (*m).clone()).collect())
}

fn missing(anchors: &Anchors, id: &Snowflake) -> AssembleError {
    AssembleError::AnchorNotFound {
        end: anchors.range().end_of(id),
        id: id.clone(),
    }
}
