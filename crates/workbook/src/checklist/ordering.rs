//! Position bookkeeping shared by section and item sibling scopes.
//!
//! Positions in a scope must always read 0..N-1 with no gaps or duplicates.
//! Appends hand out max+1, a move swaps two adjacent rows, and renumbering
//! restores contiguity after a removal. The functions here only plan; the
//! caller applies each plan through a single atomic repository call.

use serde::{Deserialize, Serialize};

/// One-step reordering direction requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveDirection {
    Up,
    Down,
}

/// The contiguity invariant was found violated mid-operation. This signals a
/// defect upstream, not a bad request, and must propagate rather than be
/// swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OrderingError {
    #[error("no sibling occupies position {missing} adjacent to position {from}")]
    MissingNeighbour { from: u32, missing: u32 },
}

/// Next free position in a sibling scope: max existing + 1, or 0 when empty.
pub fn append_position<I>(existing: I) -> u32
where
    I: IntoIterator<Item = u32>,
{
    existing.into_iter().max().map_or(0, |max| max + 1)
}

/// Plan a one-step move within a sibling scope.
///
/// Returns `Ok(None)` when the row already sits at the boundary, which the
/// caller treats as a silent no-op. Anywhere else the exact adjacent sibling
/// must exist; its absence means positions stopped being contiguous and the
/// move fails with [`OrderingError::MissingNeighbour`].
pub fn plan_swap<I>(
    current: u32,
    direction: MoveDirection,
    siblings: &[(I, u32)],
) -> Result<Option<I>, OrderingError>
where
    I: Copy,
{
    let max = siblings.iter().map(|(_, position)| *position).max().unwrap_or(0);
    let target = match direction {
        MoveDirection::Up => {
            if current == 0 {
                return Ok(None);
            }
            current - 1
        }
        MoveDirection::Down => {
            if current >= max {
                return Ok(None);
            }
            current + 1
        }
    };

    match siblings.iter().find(|(_, position)| *position == target) {
        Some((id, _)) => Ok(Some(*id)),
        None => Err(OrderingError::MissingNeighbour {
            from: current,
            missing: target,
        }),
    }
}

/// Reassign positions 0..N-1 over siblings in the given order. Idempotent:
/// renumbering an already-contiguous scope reproduces the same assignments.
pub fn renumber<I>(ordered: impl IntoIterator<Item = I>) -> Vec<(I, u32)> {
    ordered
        .into_iter()
        .enumerate()
        .map(|(index, id)| (id, index as u32))
        .collect()
}
