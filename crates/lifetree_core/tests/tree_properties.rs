use lifetree_core::{Category, CategoryTree, ParentRef, TreeError, MAX_LEVEL};
use proptest::prelude::*;

/// One structural edit; indices pick among the categories present when the
/// edit runs, `None` picks the root.
#[derive(Debug, Clone)]
enum Edit {
    Add { parent: Option<usize> },
    AddUnderDeepest,
    Move { node: usize, parent: Option<usize> },
    Outdent { node: usize },
    Indent { node: usize, parent: usize },
    Remove { node: usize },
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        4 => proptest::option::of(any::<usize>()).prop_map(|parent| Edit::Add { parent }),
        3 => Just(Edit::AddUnderDeepest),
        2 => (any::<usize>(), proptest::option::of(any::<usize>()))
            .prop_map(|(node, parent)| Edit::Move { node, parent }),
        1 => any::<usize>().prop_map(|node| Edit::Outdent { node }),
        2 => (any::<usize>(), any::<usize>())
            .prop_map(|(node, parent)| Edit::Indent { node, parent }),
        1 => any::<usize>().prop_map(|node| Edit::Remove { node }),
    ]
}

fn pick(tree: &CategoryTree, index: usize) -> Option<String> {
    let all = tree.all_children();
    if all.is_empty() {
        return None;
    }
    Some(all[index % all.len()].id().to_string())
}

fn parent_at(tree: &CategoryTree, index: Option<usize>) -> ParentRef {
    index
        .and_then(|index| pick(tree, index))
        .map(ParentRef::Category)
        .unwrap_or(ParentRef::Root)
}

fn deepest(tree: &CategoryTree) -> ParentRef {
    tree.all_children()
        .iter()
        .max_by_key(|view| view.level())
        .map(|view| ParentRef::Category(view.id().to_string()))
        .unwrap_or(ParentRef::Root)
}

fn apply(tree: &mut CategoryTree, step: usize, edit: &Edit) -> Result<(), TreeError> {
    let fresh = || Category::with_id(format!("n{step}"), format!("Node {step}"));
    match edit {
        Edit::Add { parent } => {
            let parent = parent_at(tree, *parent);
            tree.add_child(&parent, fresh()).map(|_| ())
        }
        Edit::AddUnderDeepest => {
            let parent = deepest(tree);
            tree.add_child(&parent, fresh()).map(|_| ())
        }
        Edit::Move { node, parent } => match pick(tree, *node) {
            Some(id) => {
                let parent = parent_at(tree, *parent);
                tree.move_to(&id, &parent)
            }
            None => Ok(()),
        },
        Edit::Outdent { node } => match pick(tree, *node) {
            Some(id) => tree.outdent(&id),
            None => Ok(()),
        },
        Edit::Indent { node, parent } => match (pick(tree, *node), pick(tree, *parent)) {
            (Some(id), Some(parent_id)) => tree.indent(&id, &parent_id),
            _ => Ok(()),
        },
        Edit::Remove { node } => {
            if let Some(id) = pick(tree, *node) {
                tree.remove_by_id(&id);
                assert_second_remove_is_noop(tree, &id);
            }
            Ok(())
        }
    }
}

fn assert_second_remove_is_noop(tree: &mut CategoryTree, id: &str) {
    let after_first = tree.clone();
    assert!(tree.remove_by_id(id).is_none(), "{id} removed twice");
    assert_eq!(*tree, after_first);
}

fn run_edits(tree: &mut CategoryTree, edits: &[Edit], first_step: usize) -> Result<(), TestCaseError> {
    for (offset, edit) in edits.iter().enumerate() {
        let before = tree.clone();
        if let Err(err) = apply(tree, first_step + offset, edit) {
            prop_assert!(
                matches!(err, TreeError::CycleDetected { .. } | TreeError::TooDeep { .. }),
                "unexpected {:?} for {:?}",
                err,
                edit
            );
            prop_assert_eq!(&*tree, &before);
        }
        prop_assert_eq!(tree.validate(), Ok(()));
    }
    Ok(())
}

fn assert_round_trips(tree: &CategoryTree) -> Result<(), TestCaseError> {
    prop_assert!(tree.all_children().iter().all(|view| view.level() <= MAX_LEVEL));
    let bytes = tree.to_bytes().expect("encode");
    let decoded = CategoryTree::from_bytes(&bytes).expect("decode");
    prop_assert_eq!(&decoded, tree);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Any mix of edits keeps links and levels consistent, and failed edits
    /// leave the tree untouched.
    #[test]
    fn random_edits_keep_tree_valid_and_encodable(edits in prop::collection::vec(arb_edit(), 1..160)) {
        let mut tree = CategoryTree::with_id("tree-1", "Generated");
        run_edits(&mut tree, &edits, 0)?;
        assert_round_trips(&tree)?;
    }

    /// Pushing well past 64 levels stops at `MAX_LEVEL`; the capped tree
    /// still survives further edits and a storage round trip.
    #[test]
    fn deep_runs_stop_at_max_level(
        extra in 15u32..40,
        edits in prop::collection::vec(arb_edit(), 0..40),
    ) {
        let mut tree = CategoryTree::with_id("tree-1", "Deep");
        let attempts = MAX_LEVEL + extra;
        let mut added = 0u32;
        for step in 0..attempts as usize {
            match apply(&mut tree, step, &Edit::AddUnderDeepest) {
                Ok(()) => added += 1,
                Err(TreeError::TooDeep { level, max, .. }) => {
                    prop_assert_eq!(level, MAX_LEVEL + 1);
                    prop_assert_eq!(max, MAX_LEVEL);
                }
                Err(other) => prop_assert!(false, "unexpected {:?}", other),
            }
        }
        prop_assert!(attempts > 64);
        prop_assert_eq!(added, MAX_LEVEL);
        prop_assert_eq!(tree.validate(), Ok(()));
        assert_round_trips(&tree)?;

        run_edits(&mut tree, &edits, attempts as usize)?;
        assert_round_trips(&tree)?;
    }
}
