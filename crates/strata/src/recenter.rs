//! Moves a selection so that a chosen origin lands at `(0, 0)`.

use crate::config::Origin;
use crate::error::{Error, Result};
use crate::geom::{Vec2, fmean};
use crate::snapshot::{Arrangement, Element, GraphSnapshot};

fn mean_location<'a>(elements: impl Iterator<Item = &'a Element> + Clone) -> Vec2 {
    Vec2::new(
        fmean(elements.clone().map(|e| e.location.x)),
        fmean(elements.map(|e| e.location.y)),
    )
}

/// Translates every selected element so that `origin` moves to `(0, 0)`.
///
/// * [`Origin::Center`]: the mean location of the selected non-frame elements.
/// * [`Origin::ActiveOutput`]: the mean location of every element flagged as active output,
///   selected or not.
/// * [`Origin::ActiveNode`]: the location of the active element, which must be selected.
pub fn recenter(snapshot: &GraphSnapshot, origin: Origin) -> Result<Arrangement> {
    let selected = snapshot
        .elements
        .iter()
        .filter(|e| e.selected && !e.is_frame());
    if selected.clone().next().is_none() {
        return Err(Error::EmptySelection);
    }

    let at = match origin {
        Origin::Center => mean_location(selected),
        Origin::ActiveOutput => {
            let outputs = snapshot.elements.iter().filter(|e| e.active_output);
            if outputs.clone().next().is_none() {
                return Err(Error::NoActiveOutput);
            }
            mean_location(outputs)
        }
        Origin::ActiveNode => {
            let active = snapshot
                .active
                .as_deref()
                .and_then(|id| snapshot.element(id))
                .filter(|e| e.selected && !e.is_frame())
                .ok_or(Error::NoActiveNode)?;
            active.location
        }
    };

    let mut out = Arrangement::default();
    for e in snapshot.elements.iter().filter(|e| e.selected) {
        out.positions.insert(e.id.clone(), e.location - at);
    }
    tracing::debug!(?origin, x = at.x, y = at.y, moved = out.positions.len(), "recentered");
    Ok(out)
}
