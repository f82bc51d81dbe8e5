//! Child list edits shared by the proxy tree and the render tree, so both
//! sides resolve the same index to the same position.

use super::id::NodeId;

/// Insert `child` at `index`; a negative or out-of-range index appends.
pub fn insert_at(children: &mut Vec<NodeId>, child: NodeId, index: i32) {
    let at = match usize::try_from(index) {
        Ok(i) if i < children.len() => i,
        _ => children.len(),
    };
    children.insert(at, child);
}

/// Move an existing `child` to `index`, counted before the child is taken
/// out. Returns `false` when `child` is not in the list.
pub fn move_to(children: &mut Vec<NodeId>, child: NodeId, index: i32) -> bool {
    let Some(old) = children.iter().position(|&c| c == child) else {
        return false;
    };
    let len = children.len();
    insert_at(children, child, index);
    let inserted_at = match usize::try_from(index) {
        Ok(i) if i < len => i,
        _ => len,
    };
    let remove_at = if old < inserted_at { old } else { old + 1 };
    children.remove(remove_at);
    true
}
