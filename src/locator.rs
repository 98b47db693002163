//! Node Locator: maps a cursor position or selection to syntax nodes.

use std::ops::Range;
use tree_sitter::Node;

use crate::syntax::{self, SyntaxKind};

fn contains_half_open(node: Node, offset: usize) -> bool {
    node.start_byte() <= offset && offset < node.end_byte()
}

fn contains_range(node: Node, range: &Range<usize>) -> bool {
    node.start_byte() <= range.start && range.end <= node.end_byte()
}

/// Deepest node whose span fully contains `range`.
///
/// A zero-length range prefers the node that starts at or spans the offset;
/// when none does, the node ending exactly at the offset is taken, so a
/// cursor placed right after an identifier still resolves to it.
pub fn find_containing<'tree>(root: Node<'tree>, range: Range<usize>) -> Option<Node<'tree>> {
    if !contains_range(root, &range) {
        return None;
    }
    let mut current = root;
    loop {
        let children = syntax::children(current);
        let next = if range.is_empty() {
            children
                .iter()
                .copied()
                .find(|child| contains_half_open(*child, range.start))
                .or_else(|| {
                    children
                        .iter()
                        .copied()
                        .find(|child| child.end_byte() == range.start && child.start_byte() < child.end_byte())
                })
        } else {
            children
                .iter()
                .copied()
                .find(|child| contains_range(*child, &range))
        };
        match next {
            Some(child) => current = child,
            None => return Some(current),
        }
    }
}

/// Outermost node (in document order) lying entirely inside `range`; the root when none does.
pub fn find_contained<'tree>(root: Node<'tree>, range: Range<usize>) -> Node<'tree> {
    fn visit<'tree>(node: Node<'tree>, range: &Range<usize>) -> Option<Node<'tree>> {
        for child in syntax::children(node) {
            if child.end_byte() <= range.start || child.start_byte() >= range.end {
                continue;
            }
            if range.start <= child.start_byte()
                && child.end_byte() <= range.end
                && child.start_byte() < child.end_byte()
            {
                return Some(child);
            }
            if let Some(found) = visit(child, range) {
                return Some(found);
            }
        }
        None
    }
    visit(root, &range).unwrap_or(root)
}

/// Walks parent links until `predicate` holds; `None` once the root is passed.
pub fn find_ascendant<'tree>(
    node: Node<'tree>,
    predicate: impl Fn(Node<'tree>) -> bool,
    inclusive: bool,
) -> Option<Node<'tree>> {
    let mut current = if inclusive { Some(node) } else { node.parent() };
    while let Some(n) = current {
        if predicate(n) {
            return Some(n);
        }
        current = n.parent();
    }
    None
}

pub fn find_ascendant_of_kind<'tree>(
    node: Node<'tree>,
    kind: SyntaxKind,
    inclusive: bool,
) -> Option<Node<'tree>> {
    find_ascendant(node, |n| SyntaxKind::of(n) == kind, inclusive)
}

/// Finds the node with exactly this span (and, when given, this kind).
pub fn find_exact<'tree>(
    root: Node<'tree>,
    range: Range<usize>,
    kind: Option<SyntaxKind>,
) -> Option<Node<'tree>> {
    let mut current = find_containing(root, range.clone())?;
    loop {
        if current.byte_range() != range {
            return None;
        }
        if kind.map_or(true, |k| SyntaxKind::of(current) == k) {
            return Some(current);
        }
        current = current.parent()?;
    }
}
