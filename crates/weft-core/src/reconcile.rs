//! Child diffing: walks a fiber's declared children and its alternate's
//! child chain in lock-step by position, producing the new linked sibling
//! chain tagged with effects.

use crate::element::Element;
use crate::fiber::{EffectTag, Fiber, FiberArena, FiberId};

fn kind_matches(arena: &FiberArena, old: FiberId, element: &Element) -> bool {
    arena
        .get(old)
        .kind
        .as_ref()
        .map_or(false, |kind| kind.same_kind(&element.kind))
}

/// Diffs `declared` against the previous children of `wip` (reached via
/// its alternate). Matching is positional, not keyed: a reorder reads as
/// a replace. Tolerant of any length mismatch — absent declared children
/// diff as an empty sequence, absent old fibers as nothing to diff
/// against.
///
/// Old fibers that lose their position are tagged `Deletion` and pushed
/// onto `deletions`; they are never linked into the new chain.
pub(crate) fn reconcile_children(
    arena: &mut FiberArena,
    roster: &mut Vec<FiberId>,
    deletions: &mut Vec<FiberId>,
    wip: FiberId,
    declared: &[Element],
) {
    let mut index = 0usize;
    let mut old_fiber = arena
        .get(wip)
        .alternate
        .and_then(|alt| arena.get(alt).child);
    let mut prev_sibling: Option<FiberId> = None;

    while index < declared.len() || old_fiber.is_some() {
        let element = declared.get(index);
        let old_sibling = old_fiber.and_then(|old| arena.get(old).sibling);

        let mut new_fiber: Option<FiberId> = None;
        match (element, old_fiber) {
            (Some(element), Some(old)) if kind_matches(arena, old, element) => {
                // same kind at the same position: reuse the host node
                let mut fiber = Fiber::new(Some(element.kind.clone()), element.props.clone());
                fiber.host = arena.get(old).host;
                fiber.parent = Some(wip);
                fiber.alternate = Some(old);
                fiber.effect = EffectTag::Update;
                let id = arena.alloc(fiber);
                roster.push(id);
                new_fiber = Some(id);
            }
            (Some(element), old) => {
                let mut fiber = Fiber::new(Some(element.kind.clone()), element.props.clone());
                fiber.parent = Some(wip);
                fiber.effect = EffectTag::Placement;
                let id = arena.alloc(fiber);
                roster.push(id);
                new_fiber = Some(id);
                if let Some(old) = old {
                    arena.get_mut(old).effect = EffectTag::Deletion;
                    deletions.push(old);
                }
            }
            (None, Some(old)) => {
                arena.get_mut(old).effect = EffectTag::Deletion;
                deletions.push(old);
            }
            (None, None) => {}
        }

        if let Some(id) = new_fiber {
            if index == 0 {
                arena.get_mut(wip).child = Some(id);
            } else if let Some(prev) = prev_sibling {
                arena.get_mut(prev).sibling = Some(id);
            }
            prev_sibling = Some(id);
        }

        old_fiber = old_sibling;
        index += 1;
    }
}
