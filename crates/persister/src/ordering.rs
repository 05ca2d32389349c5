//! Total orders over buffered operations
//!
//! Two custom orders drive the commit pipeline:
//!
//! - [`cmp_creations`] sorts buffered creations so a parent is always
//!   committed before its children and same-parent, same-kind siblings come
//!   out in ascending declared index. Ancestry is resolved against the
//!   partially-built forest: buffered parent links are walked first, then
//!   spliced onto the live tree's ancestors.
//! - [`cmp_removals`] sorts removal targets against the live tree so
//!   children detach before parents and later siblings detach before
//!   earlier ones, keeping recorded indices valid as the pass proceeds.
//!
//! Both orders are total over arbitrary input; unresolvable UUIDs sort as
//! extremal cases rather than panicking.

use crate::buffer::PersistedObject;
use canopy_core::{NodeKind, ObjectId, ObjectTree};
use std::cmp::Ordering;
use std::collections::HashSet;

/// One step of an ancestor chain, root first
struct ChainLink {
    uuid: ObjectId,
    kind: NodeKind,
    index: usize,
}

/// Ancestor chain for a buffered creation, ending at the object itself
///
/// Walks buffered parent links until a UUID that is not buffered, then
/// splices on the live tree's ancestors of that UUID. A parent that
/// resolves nowhere ends the chain; a cycle among buffered links is cut at
/// the first repeat.
fn creation_chain<T: ObjectTree>(
    obj: &PersistedObject,
    buffered: &[PersistedObject],
    tree: &T,
) -> Vec<ChainLink> {
    let mut chain = vec![ChainLink {
        uuid: obj.uuid,
        kind: obj.kind,
        index: obj.index,
    }];
    let mut seen: HashSet<ObjectId> = HashSet::new();
    seen.insert(obj.uuid);
    let mut cursor = obj.parent;
    while let Some(uuid) = cursor {
        if !seen.insert(uuid) {
            break;
        }
        if let Some(parent) = buffered.iter().find(|p| p.uuid == uuid) {
            chain.push(ChainLink {
                uuid: parent.uuid,
                kind: parent.kind,
                index: parent.index,
            });
            cursor = parent.parent;
        } else if let Some(placement) = tree.placement(uuid) {
            chain.push(ChainLink {
                uuid,
                kind: placement.kind,
                index: placement.partition_index,
            });
            cursor = placement.parent;
        } else {
            break;
        }
    }
    chain.reverse();
    chain
}

/// Creation commit order
///
/// Roots sort before everything else; same-parent, same-kind siblings by
/// declared index; otherwise the ancestor chains are compared at their
/// first divergence. At a divergence of equal kinds the partition index
/// decides; across kinds the parent's partition layout decides, with UUID
/// order as the final tie-break so the order stays total.
pub fn cmp_creations<T: ObjectTree>(
    a: &PersistedObject,
    b: &PersistedObject,
    buffered: &[PersistedObject],
    tree: &T,
) -> Ordering {
    if a.uuid == b.uuid {
        return Ordering::Equal;
    }
    match (a.parent, b.parent) {
        (None, None) => return Ordering::Equal,
        (None, Some(_)) => return Ordering::Less,
        (Some(_), None) => return Ordering::Greater,
        (Some(pa), Some(pb)) => {
            if pa == pb && a.kind == b.kind {
                return a.index.cmp(&b.index).then_with(|| a.uuid.cmp(&b.uuid));
            }
        }
    }

    let chain_a = creation_chain(a, buffered, tree);
    let chain_b = creation_chain(b, buffered, tree);

    let mut shared_parent: Option<NodeKind> = None;
    for (la, lb) in chain_a.iter().zip(chain_b.iter()) {
        if la.uuid == lb.uuid {
            shared_parent = Some(la.kind);
            continue;
        }
        if la.kind == lb.kind {
            return la.index.cmp(&lb.index).then_with(|| la.uuid.cmp(&lb.uuid));
        }
        let rank = |kind: NodeKind| {
            shared_parent
                .and_then(|p| p.partition_rank(kind))
                .unwrap_or(usize::MAX)
        };
        return rank(la.kind)
            .cmp(&rank(lb.kind))
            .then_with(|| la.uuid.cmp(&lb.uuid));
    }
    // One chain is a prefix of the other: the ancestor goes first.
    chain_a.len().cmp(&chain_b.len())
}

/// One step of a live ancestor chain
struct LiveLink {
    uuid: ObjectId,
    position: usize,
}

/// Live ancestor chain, root first, ending at `uuid`
fn live_chain<T: ObjectTree>(uuid: ObjectId, tree: &T) -> Vec<LiveLink> {
    let mut chain = Vec::new();
    let mut cursor = Some(uuid);
    while let Some(current) = cursor {
        match tree.placement(current) {
            Some(placement) => {
                chain.push(LiveLink {
                    uuid: current,
                    position: placement.position,
                });
                cursor = placement.parent;
            }
            None => break,
        }
    }
    chain.reverse();
    chain
}

/// Removal commit order
///
/// UUIDs that no longer resolve sort first (they were detached earlier in
/// the same pass and nothing depends on them); among live nodes, the
/// branches are compared at the first divergence of their ancestor chains
/// by reverse sibling position, and a node on the same line as its partner
/// sorts after its own descendants.
pub fn cmp_removals<T: ObjectTree>(a: ObjectId, b: ObjectId, tree: &T) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    match (tree.contains(a), tree.contains(b)) {
        (false, false) => return b.cmp(&a),
        (false, true) => return Ordering::Less,
        (true, false) => return Ordering::Greater,
        (true, true) => {}
    }

    let chain_a = live_chain(a, tree);
    let chain_b = live_chain(b, tree);

    for (la, lb) in chain_a.iter().zip(chain_b.iter()) {
        if la.uuid == lb.uuid {
            continue;
        }
        // Later sibling branch first.
        return lb
            .position
            .cmp(&la.position)
            .then_with(|| lb.uuid.cmp(&la.uuid));
    }
    // Same line: the deeper node first.
    chain_b.len().cmp(&chain_a.len())
}
