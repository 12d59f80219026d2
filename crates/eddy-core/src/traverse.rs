//! Composite traversal engine.
//!
//! Depth-first walk over a [`DataObject`] tree. Composite nodes recurse
//! into their slots in order, leaves are handed to a visitor, and the
//! visitor's [`Visit`] verdict decides whether the walk continues.
//! Every analysis builds on these functions rather than matching on
//! the tree itself.
//!
//! # Flat indices
//!
//! Nodes are numbered in pre-order: the root is 0, and every interior
//! node, leaf, and empty slot consumes one index. For a single
//! container with `n` slots, slot `i` has flat index `i + 1`.

use crate::dataset::Dataset;
use crate::error::TraversalError;
use crate::object::DataObject;

/// Visitor verdict for one leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Visit {
    /// Keep walking.
    Continue,
    /// Stop the walk without error.
    Stop,
    /// Stop the walk and report a failure.
    Fail(String),
}

/// How a successful walk ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Every leaf was visited.
    Completed,
    /// A visitor returned [`Visit::Stop`].
    Stopped,
}

#[inline]
fn verdict(flat_index: usize, v: Visit) -> Result<Flow, TraversalError> {
    match v {
        Visit::Continue => Ok(Flow::Completed),
        Visit::Stop => Ok(Flow::Stopped),
        Visit::Fail(reason) => Err(TraversalError::VisitorFailed { flat_index, reason }),
    }
}

/// Visit every leaf of `root` with `visit(flat_index, leaf)`.
///
/// Empty slots are skipped. Returns [`Flow::Stopped`] if the visitor
/// stopped early, and an error if the visitor failed or a node is
/// neither a leaf nor a composite.
pub fn apply<'a, F>(root: &'a DataObject, mut visit: F) -> Result<Flow, TraversalError>
where
    F: FnMut(usize, &'a Dataset) -> Visit,
{
    let mut next = 0;
    walk(root, &mut next, &mut visit)
}

fn walk<'a, F>(
    node: &'a DataObject,
    next: &mut usize,
    visit: &mut F,
) -> Result<Flow, TraversalError>
where
    F: FnMut(usize, &'a Dataset) -> Visit,
{
    let flat_index = *next;
    *next += 1;
    match node {
        DataObject::Leaf(ds) => verdict(flat_index, visit(flat_index, ds)),
        DataObject::Composite(mb) => {
            for slot in mb.slots() {
                match slot {
                    Some(child) => {
                        if walk(child, next, visit)? == Flow::Stopped {
                            return Ok(Flow::Stopped);
                        }
                    }
                    None => *next += 1,
                }
            }
            Ok(Flow::Completed)
        }
        DataObject::Other { class_name } => Err(TraversalError::Unsupported {
            flat_index,
            class_name: class_name.clone(),
        }),
    }
}

/// Mutable variant of [`apply`].
pub fn apply_mut<F>(root: &mut DataObject, mut visit: F) -> Result<Flow, TraversalError>
where
    F: FnMut(usize, &mut Dataset) -> Visit,
{
    let mut next = 0;
    walk_mut(root, &mut next, &mut visit)
}

fn walk_mut<F>(
    node: &mut DataObject,
    next: &mut usize,
    visit: &mut F,
) -> Result<Flow, TraversalError>
where
    F: FnMut(usize, &mut Dataset) -> Visit,
{
    let flat_index = *next;
    *next += 1;
    match node {
        DataObject::Leaf(ds) => verdict(flat_index, visit(flat_index, ds)),
        DataObject::Composite(mb) => {
            for slot in mb.slots_mut() {
                match slot {
                    Some(child) => {
                        if walk_mut(child, next, visit)? == Flow::Stopped {
                            return Ok(Flow::Stopped);
                        }
                    }
                    None => *next += 1,
                }
            }
            Ok(Flow::Completed)
        }
        DataObject::Other { class_name } => Err(TraversalError::Unsupported {
            flat_index,
            class_name: class_name.clone(),
        }),
    }
}

/// Walk two structurally identical trees in lock-step, calling
/// `visit(flat_index, input_leaf, output_leaf)` for each leaf pair.
///
/// Fails with [`TraversalError::StructureMismatch`] where the trees
/// diverge: a leaf paired with a composite, containers of different
/// length, or a slot empty on one side only.
pub fn apply_pair<F>(
    input: &DataObject,
    output: &mut DataObject,
    mut visit: F,
) -> Result<Flow, TraversalError>
where
    F: FnMut(usize, &Dataset, &mut Dataset) -> Visit,
{
    let mut next = 0;
    walk_pair(input, output, &mut next, &mut visit)
}

fn walk_pair<F>(
    input: &DataObject,
    output: &mut DataObject,
    next: &mut usize,
    visit: &mut F,
) -> Result<Flow, TraversalError>
where
    F: FnMut(usize, &Dataset, &mut Dataset) -> Visit,
{
    let flat_index = *next;
    *next += 1;
    match (input, output) {
        (DataObject::Leaf(a), DataObject::Leaf(b)) => verdict(flat_index, visit(flat_index, a, b)),
        (DataObject::Composite(a), DataObject::Composite(b)) => {
            if a.len() != b.len() {
                return Err(TraversalError::StructureMismatch { flat_index });
            }
            for (sa, sb) in a.slots().iter().zip(b.slots_mut().iter_mut()) {
                match (sa, sb) {
                    (Some(ca), Some(cb)) => {
                        if walk_pair(ca, cb, next, visit)? == Flow::Stopped {
                            return Ok(Flow::Stopped);
                        }
                    }
                    (None, None) => *next += 1,
                    _ => return Err(TraversalError::StructureMismatch { flat_index: *next }),
                }
            }
            Ok(Flow::Completed)
        }
        (DataObject::Other { class_name }, _) => Err(TraversalError::Unsupported {
            flat_index,
            class_name: class_name.clone(),
        }),
        _ => Err(TraversalError::StructureMismatch { flat_index }),
    }
}

/// Count leaf slots, including empty ones.
///
/// A leaf root counts as one slot; nested composites contribute their
/// own slots rather than counting as one.
pub fn count_leaf_slots(root: &DataObject) -> usize {
    match root {
        DataObject::Composite(mb) => mb
            .slots()
            .iter()
            .map(|slot| slot.as_ref().map_or(1, count_leaf_slots))
            .sum(),
        DataObject::Leaf(_) | DataObject::Other { .. } => 1,
    }
}

/// Visit every leaf of `root` with `visit(slot, leaf)`, where `slot` is
/// the leaf's position among the slots counted by [`count_leaf_slots`].
///
/// Empty slots consume a position without being visited, so every
/// position handed to the visitor lies in `0..count_leaf_slots(root)`
/// regardless of nesting. Errors carry flat indices, as in [`apply`].
pub fn apply_slots<'a, F>(root: &'a DataObject, mut visit: F) -> Result<Flow, TraversalError>
where
    F: FnMut(usize, &'a Dataset) -> Visit,
{
    let mut flat = 0;
    let mut slot = 0;
    walk_slots(root, &mut flat, &mut slot, &mut visit)
}

fn walk_slots<'a, F>(
    node: &'a DataObject,
    flat: &mut usize,
    slot: &mut usize,
    visit: &mut F,
) -> Result<Flow, TraversalError>
where
    F: FnMut(usize, &'a Dataset) -> Visit,
{
    let flat_index = *flat;
    *flat += 1;
    match node {
        DataObject::Leaf(ds) => {
            let position = *slot;
            *slot += 1;
            verdict(flat_index, visit(position, ds))
        }
        DataObject::Composite(mb) => {
            for child in mb.slots() {
                match child {
                    Some(child) => {
                        if walk_slots(child, flat, slot, visit)? == Flow::Stopped {
                            return Ok(Flow::Stopped);
                        }
                    }
                    None => {
                        *flat += 1;
                        *slot += 1;
                    }
                }
            }
            Ok(Flow::Completed)
        }
        DataObject::Other { class_name } => Err(TraversalError::Unsupported {
            flat_index,
            class_name: class_name.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{Association, DataArray};
    use crate::object::MultiBlock;
    use proptest::prelude::*;

    fn leaf(tag: f64) -> DataObject {
        DataObject::Leaf(
            Dataset::image([0, 0, 0, 0, 0, 0], [0.0; 3], [1.0; 3])
                .with_array(Association::Field, DataArray::from_f64("tag", vec![tag])),
        )
    }

    fn tag(ds: &Dataset) -> f64 {
        ds.attributes(Association::Field)
            .get("tag")
            .and_then(|a| a.values().get_f64(0))
            .unwrap()
    }

    /// root(0) -> [leaf(1), empty(2), mb(3) -> [leaf(4), leaf(5)], leaf(6)]
    fn nested() -> DataObject {
        let inner = MultiBlock::from_blocks(vec![Some(leaf(1.0)), Some(leaf(2.0))]);
        MultiBlock::from_blocks(vec![
            Some(leaf(0.0)),
            None,
            Some(inner.into()),
            Some(leaf(3.0)),
        ])
        .into()
    }

    #[test]
    fn visits_every_leaf_in_order_with_flat_indices() {
        let tree = nested();
        let mut seen = Vec::new();
        let flow = apply(&tree, |idx, ds| {
            seen.push((idx, tag(ds)));
            Visit::Continue
        })
        .unwrap();
        assert_eq!(flow, Flow::Completed);
        assert_eq!(seen, vec![(1, 0.0), (4, 1.0), (5, 2.0), (6, 3.0)]);
    }

    #[test]
    fn stop_on_first_leaf_visits_exactly_once() {
        let tree = nested();
        let mut visits = 0;
        let flow = apply(&tree, |_, _| {
            visits += 1;
            Visit::Stop
        })
        .unwrap();
        assert_eq!(flow, Flow::Stopped);
        assert_eq!(visits, 1);
    }

    #[test]
    fn stop_inside_nested_composite_stops_outer_walk() {
        let tree = nested();
        let mut visits = 0;
        let flow = apply(&tree, |_, ds| {
            visits += 1;
            if tag(ds) == 1.0 {
                Visit::Stop
            } else {
                Visit::Continue
            }
        })
        .unwrap();
        assert_eq!(flow, Flow::Stopped);
        assert_eq!(visits, 2);
    }

    #[test]
    fn failure_aborts_and_reports_flat_index() {
        let tree = nested();
        let mut visits = 0;
        let err = apply(&tree, |_, ds| {
            visits += 1;
            if tag(ds) == 2.0 {
                Visit::Fail("bad block".into())
            } else {
                Visit::Continue
            }
        })
        .unwrap_err();
        assert_eq!(visits, 3);
        assert_eq!(
            err,
            TraversalError::VisitorFailed {
                flat_index: 5,
                reason: "bad block".into()
            }
        );
    }

    #[test]
    fn unsupported_node_names_its_type() {
        let tree: DataObject = MultiBlock::from_blocks(vec![
            Some(leaf(0.0)),
            Some(DataObject::Other {
                class_name: "Table".into(),
            }),
        ])
        .into();
        let err = apply(&tree, |_, _| Visit::Continue).unwrap_err();
        assert_eq!(
            err,
            TraversalError::Unsupported {
                flat_index: 2,
                class_name: "Table".into()
            }
        );
    }

    #[test]
    fn leaf_root_is_visited() {
        let tree = leaf(9.0);
        let mut seen = Vec::new();
        apply(&tree, |idx, ds| {
            seen.push((idx, tag(ds)));
            Visit::Continue
        })
        .unwrap();
        assert_eq!(seen, vec![(0, 9.0)]);
        assert_eq!(count_leaf_slots(&tree), 1);
    }

    #[test]
    fn apply_mut_modifies_leaves() {
        let mut tree = nested();
        apply_mut(&mut tree, |idx, ds| {
            ds.attributes_mut(Association::Field)
                .insert(DataArray::from_f64("idx", vec![idx as f64]));
            Visit::Continue
        })
        .unwrap();
        let mut idxs = Vec::new();
        apply(&tree, |_, ds| {
            let idx = ds.attributes(Association::Field).get("idx").unwrap();
            idxs.push(idx.values().get_f64(0).unwrap());
            Visit::Continue
        })
        .unwrap();
        assert_eq!(idxs, vec![1.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn pair_walk_visits_matching_leaves() {
        let input = nested();
        let mut output = input.structure();
        apply_pair(&input, &mut output, |_, a, b| {
            b.attributes_mut(Association::Field)
                .insert(a.attributes(Association::Field).get("tag").unwrap().clone());
            Visit::Continue
        })
        .unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn pair_walk_detects_structure_mismatch() {
        let input = nested();
        let mut output: DataObject = MultiBlock::with_slots(4).into();
        let err = apply_pair(&input, &mut output, |_, _, _| Visit::Continue).unwrap_err();
        assert_eq!(err, TraversalError::StructureMismatch { flat_index: 1 });

        let mut short: DataObject = MultiBlock::with_slots(2).into();
        let err = apply_pair(&input, &mut short, |_, _, _| Visit::Continue).unwrap_err();
        assert_eq!(err, TraversalError::StructureMismatch { flat_index: 0 });
    }

    #[test]
    fn slot_count_includes_empty_slots() {
        assert_eq!(count_leaf_slots(&nested()), 5);
        assert_eq!(count_leaf_slots(&MultiBlock::with_slots(7).into()), 7);
    }

    #[test]
    fn slot_positions_follow_leaf_slot_order() {
        let tree = nested();
        let mut seen = Vec::new();
        apply_slots(&tree, |slot, ds| {
            seen.push((slot, tag(ds)));
            Visit::Continue
        })
        .unwrap();
        assert_eq!(seen, vec![(0, 0.0), (2, 1.0), (3, 2.0), (4, 3.0)]);
    }

    #[test]
    fn slot_positions_of_two_nested_containers_are_contiguous() {
        let half = |a: f64, b: f64| {
            Some(DataObject::from(MultiBlock::from_blocks(vec![Some(leaf(a)), Some(leaf(b))])))
        };
        let tree: DataObject = MultiBlock::from_blocks(vec![half(0.0, 1.0), half(2.0, 3.0)]).into();
        let mut slots = Vec::new();
        apply_slots(&tree, |slot, _| {
            slots.push(slot);
            Visit::Continue
        })
        .unwrap();
        assert_eq!(slots, vec![0, 1, 2, 3]);
        assert_eq!(count_leaf_slots(&tree), 4);
    }

    fn arb_tree() -> impl Strategy<Value = DataObject> {
        let leaf_strategy = prop_oneof![
            3 => Just(Some(leaf(0.0))),
            1 => Just(None),
        ];
        let slot = leaf_strategy.prop_recursive(3, 24, 4, |inner| {
            prop::collection::vec(inner, 0..4)
                .prop_map(|slots| Some(DataObject::from(MultiBlock::from_blocks(slots))))
        });
        prop::collection::vec(slot, 0..5).prop_map(|slots| MultiBlock::from_blocks(slots).into())
    }

    fn count_leaves(obj: &DataObject) -> usize {
        match obj {
            DataObject::Leaf(_) => 1,
            DataObject::Composite(mb) => mb.slots().iter().flatten().map(count_leaves).sum(),
            DataObject::Other { .. } => 0,
        }
    }

    proptest! {
        #[test]
        fn every_leaf_visited_exactly_once(tree in arb_tree()) {
            let mut idxs = Vec::new();
            let flow = apply(&tree, |idx, _| { idxs.push(idx); Visit::Continue }).unwrap();
            prop_assert_eq!(flow, Flow::Completed);
            prop_assert_eq!(idxs.len(), count_leaves(&tree));
            let mut dedup = idxs.clone();
            dedup.sort_unstable();
            dedup.dedup();
            prop_assert_eq!(dedup.len(), idxs.len());
            prop_assert!(idxs.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn slot_positions_stay_below_slot_count(tree in arb_tree()) {
            let total = count_leaf_slots(&tree);
            let mut slots = Vec::new();
            apply_slots(&tree, |slot, _| { slots.push(slot); Visit::Continue }).unwrap();
            prop_assert_eq!(slots.len(), count_leaves(&tree));
            prop_assert!(slots.iter().all(|&s| s < total));
            prop_assert!(slots.windows(2).all(|w| w[0] < w[1]));
        }

        #[test]
        fn pair_walk_of_structure_copy_always_matches(tree in arb_tree()) {
            let mut copy = tree.structure();
            let mut pairs = 0usize;
            apply_pair(&tree, &mut copy, |_, _, _| { pairs += 1; Visit::Continue }).unwrap();
            prop_assert_eq!(pairs, count_leaves(&tree));
        }
    }
}
