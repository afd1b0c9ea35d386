//! Order-statistics red-black tree of pieces.
//!
//! Pieces are ordered by buffer position, which is never stored
//! directly: every node carries the total size of its subtree, and a
//! position is located by descending the tree. Splicing a piece in or
//! out therefore shifts every later position in O(log n).
//!
//! ## Learning: Arena Allocation
//!
//! Nodes live in a slot arena indexed by `u32` instead of being boxed
//! and linked with references. A [`PieceIter`] is a slot index plus the
//! slot's generation counter; freeing a slot bumps the generation, so
//! a held iterator for a deleted piece is detected as stale rather
//! than silently reading reused memory. This sidesteps the classic
//! linked-tree ownership fight with the borrow checker.

use crate::piece::Piece;
use crate::{BufferError, BufferResult};

/// Which side of an existing piece a new piece lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

/// Stable handle to a piece in the table.
///
/// Cheap to copy and safe to hold across mutations: using it after its
/// piece was deleted yields [`BufferError::StaleIterator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceIter {
    index: u32,
    generation: u32,
}

type NodeIdx = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug, Clone)]
struct Node {
    piece: Piece,
    /// piece.size plus the subtree sizes of both children
    subtree: usize,
    color: Color,
    parent: Option<NodeIdx>,
    left: Option<NodeIdx>,
    right: Option<NodeIdx>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// The piece table itself.
#[derive(Debug, Default)]
pub struct PieceTable {
    slots: Vec<Slot>,
    free: Vec<NodeIdx>,
    root: Option<NodeIdx>,
    size: usize,
    pieces: usize,
}

// ==================== Basic Accessors ====================

impl PieceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total buffer size: the sum of all piece sizes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of pieces in the table.
    pub fn piece_count(&self) -> usize {
        self.pieces
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    fn node(&self, i: NodeIdx) -> &Node {
        self.slots[i as usize].node.as_ref().expect("occupied arena slot")
    }

    fn node_mut(&mut self, i: NodeIdx) -> &mut Node {
        self.slots[i as usize].node.as_mut().expect("occupied arena slot")
    }

    fn iter_for(&self, i: NodeIdx) -> PieceIter {
        PieceIter { index: i, generation: self.slots[i as usize].generation }
    }

    fn check_iter(&self, it: PieceIter) -> BufferResult<NodeIdx> {
        match self.slots.get(it.index as usize) {
            Some(slot) if slot.generation == it.generation && slot.node.is_some() => Ok(it.index),
            _ => Err(BufferError::StaleIterator),
        }
    }

    fn sub(&self, i: Option<NodeIdx>) -> usize {
        i.map_or(0, |i| self.node(i).subtree)
    }

    fn color(&self, i: Option<NodeIdx>) -> Color {
        i.map_or(Color::Black, |i| self.node(i).color)
    }

    fn set_color(&mut self, i: Option<NodeIdx>, color: Color) {
        if let Some(i) = i {
            self.node_mut(i).color = color;
        }
    }

    fn alloc(&mut self, node: Node) -> NodeIdx {
        match self.free.pop() {
            Some(i) => {
                self.slots[i as usize].node = Some(node);
                i
            }
            None => {
                let i = self.slots.len() as NodeIdx;
                self.slots.push(Slot { generation: 0, node: Some(node) });
                i
            }
        }
    }

    /// Frees a slot and bumps its generation so held iterators for the
    /// old occupant are recognized as stale.
    fn release(&mut self, i: NodeIdx) {
        let slot = &mut self.slots[i as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(i);
    }
}

// ==================== Subtree Sizes ====================

impl PieceTable {
    fn recompute(&mut self, i: NodeIdx) {
        let left = self.sub(self.node(i).left);
        let right = self.sub(self.node(i).right);
        let own = self.node(i).piece.size;
        self.node_mut(i).subtree = own + left + right;
    }

    fn refresh_up(&mut self, mut i: Option<NodeIdx>) {
        while let Some(n) = i {
            self.recompute(n);
            i = self.node(n).parent;
        }
    }

    /// Applies a signed size delta to a node and all its ancestors.
    fn adjust_up(&mut self, from: NodeIdx, delta: isize) {
        let mut i = Some(from);
        while let Some(n) = i {
            let node = self.node_mut(n);
            node.subtree = (node.subtree as isize + delta) as usize;
            i = self.node(n).parent;
        }
    }
}

// ==================== Navigation ====================

impl PieceTable {
    fn min_node(&self, mut i: NodeIdx) -> NodeIdx {
        while let Some(l) = self.node(i).left {
            i = l;
        }
        i
    }

    fn max_node(&self, mut i: NodeIdx) -> NodeIdx {
        while let Some(r) = self.node(i).right {
            i = r;
        }
        i
    }

    fn successor(&self, i: NodeIdx) -> Option<NodeIdx> {
        if let Some(r) = self.node(i).right {
            return Some(self.min_node(r));
        }
        let mut cur = i;
        let mut parent = self.node(cur).parent;
        while let Some(p) = parent {
            if self.node(p).left == Some(cur) {
                return Some(p);
            }
            cur = p;
            parent = self.node(p).parent;
        }
        None
    }

    fn predecessor(&self, i: NodeIdx) -> Option<NodeIdx> {
        if let Some(l) = self.node(i).left {
            return Some(self.max_node(l));
        }
        let mut cur = i;
        let mut parent = self.node(cur).parent;
        while let Some(p) = parent {
            if self.node(p).right == Some(cur) {
                return Some(p);
            }
            cur = p;
            parent = self.node(p).parent;
        }
        None
    }

    /// First piece in buffer order.
    pub fn first(&self) -> Option<PieceIter> {
        self.root.map(|r| self.iter_for(self.min_node(r)))
    }

    /// Last piece in buffer order.
    pub fn last(&self) -> Option<PieceIter> {
        self.root.map(|r| self.iter_for(self.max_node(r)))
    }

    /// Piece following `it`, or `None` at the end.
    pub fn next(&self, it: PieceIter) -> BufferResult<Option<PieceIter>> {
        let n = self.check_iter(it)?;
        Ok(self.successor(n).map(|i| self.iter_for(i)))
    }

    /// Piece preceding `it`, or `None` at the start.
    pub fn prev(&self, it: PieceIter) -> BufferResult<Option<PieceIter>> {
        let n = self.check_iter(it)?;
        Ok(self.predecessor(n).map(|i| self.iter_for(i)))
    }

    /// Copy of the piece `it` refers to.
    pub fn piece(&self, it: PieceIter) -> BufferResult<Piece> {
        let n = self.check_iter(it)?;
        Ok(self.node(n).piece)
    }

    /// Buffer position of the first byte of `it`'s piece, computed by
    /// walking toward the root and summing the sizes to the left.
    pub fn pos(&self, it: PieceIter) -> BufferResult<usize> {
        let n = self.check_iter(it)?;
        let mut pos = self.sub(self.node(n).left);
        let mut cur = n;
        let mut parent = self.node(cur).parent;
        while let Some(p) = parent {
            if self.node(p).right == Some(cur) {
                pos += self.sub(self.node(p).left) + self.node(p).piece.size;
            }
            cur = p;
            parent = self.node(p).parent;
        }
        Ok(pos)
    }

    /// Finds the piece containing buffer position `pos`. Zero-size
    /// pieces contain no positions and are skipped over. Returns
    /// `None` when `pos` is at or past the end of the buffer.
    pub fn lookup(&self, mut pos: usize) -> Option<PieceIter> {
        if pos >= self.size {
            return None;
        }
        let mut x = self.root?;
        loop {
            let left_size = self.sub(self.node(x).left);
            let own = self.node(x).piece.size;
            if pos < left_size {
                x = self.node(x).left?;
            } else if pos < left_size + own {
                return Some(self.iter_for(x));
            } else {
                pos -= left_size + own;
                x = self.node(x).right?;
            }
        }
    }
}

// ==================== Rotations ====================

impl PieceTable {
    fn replace_child(&mut self, parent: Option<NodeIdx>, old: NodeIdx, new: Option<NodeIdx>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                if self.node(p).left == Some(old) {
                    self.node_mut(p).left = new;
                } else {
                    self.node_mut(p).right = new;
                }
            }
        }
    }

    fn rotate_left(&mut self, x: NodeIdx) {
        let y = self.node(x).right.expect("rotate_left needs a right child");
        let y_left = self.node(y).left;
        self.node_mut(x).right = y_left;
        if let Some(yl) = y_left {
            self.node_mut(yl).parent = Some(x);
        }
        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        self.replace_child(x_parent, x, Some(y));
        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);
        self.recompute(x);
        self.recompute(y);
    }

    fn rotate_right(&mut self, x: NodeIdx) {
        let y = self.node(x).left.expect("rotate_right needs a left child");
        let y_right = self.node(y).right;
        self.node_mut(x).left = y_right;
        if let Some(yr) = y_right {
            self.node_mut(yr).parent = Some(x);
        }
        let x_parent = self.node(x).parent;
        self.node_mut(y).parent = x_parent;
        self.replace_child(x_parent, x, Some(y));
        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);
        self.recompute(x);
        self.recompute(y);
    }
}

// ==================== Insertion ====================

impl PieceTable {
    /// Splices `piece` into the sequence next to `at`.
    ///
    /// `at` may only be `None` when the table is empty, in which case
    /// the piece becomes the sole entry. Returns an iterator for the
    /// new piece.
    pub fn insert(&mut self, at: Option<PieceIter>, piece: Piece, side: Side) -> BufferResult<PieceIter> {
        let anchor = match at {
            Some(it) => Some(self.check_iter(it)?),
            None => {
                if self.root.is_some() {
                    return Err(BufferError::StaleIterator);
                }
                None
            }
        };

        let idx = self.alloc(Node {
            piece,
            subtree: piece.size,
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
        });
        self.size += piece.size;
        self.pieces += 1;

        match anchor {
            None => self.root = Some(idx),
            Some(n) => match side {
                Side::Before => {
                    if self.node(n).left.is_none() {
                        self.node_mut(n).left = Some(idx);
                        self.node_mut(idx).parent = Some(n);
                    } else {
                        let p = self.max_node(self.node(n).left.expect("checked above"));
                        self.node_mut(p).right = Some(idx);
                        self.node_mut(idx).parent = Some(p);
                    }
                }
                Side::After => {
                    if self.node(n).right.is_none() {
                        self.node_mut(n).right = Some(idx);
                        self.node_mut(idx).parent = Some(n);
                    } else {
                        let p = self.min_node(self.node(n).right.expect("checked above"));
                        self.node_mut(p).left = Some(idx);
                        self.node_mut(idx).parent = Some(p);
                    }
                }
            },
        }

        if let Some(parent) = self.node(idx).parent {
            self.adjust_up(parent, piece.size as isize);
        }
        self.insert_fixup(idx);
        Ok(self.iter_for(idx))
    }

    fn insert_fixup(&mut self, mut z: NodeIdx) {
        while let Some(p) = self.node(z).parent {
            if self.node(p).color != Color::Red {
                break;
            }
            // a red node always has a parent
            let Some(g) = self.node(p).parent else { break };
            if self.node(g).left == Some(p) {
                let uncle = self.node(g).right;
                if self.color(uncle) == Color::Red {
                    self.set_color(Some(p), Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(Some(g), Color::Red);
                    z = g;
                } else {
                    if self.node(p).right == Some(z) {
                        z = p;
                        self.rotate_left(z);
                    }
                    let p = self.node(z).parent.expect("rotated under parent");
                    let g = self.node(p).parent.expect("red parent has parent");
                    self.set_color(Some(p), Color::Black);
                    self.set_color(Some(g), Color::Red);
                    self.rotate_right(g);
                }
            } else {
                let uncle = self.node(g).left;
                if self.color(uncle) == Color::Red {
                    self.set_color(Some(p), Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(Some(g), Color::Red);
                    z = g;
                } else {
                    if self.node(p).left == Some(z) {
                        z = p;
                        self.rotate_right(z);
                    }
                    let p = self.node(z).parent.expect("rotated under parent");
                    let g = self.node(p).parent.expect("red parent has parent");
                    self.set_color(Some(p), Color::Black);
                    self.set_color(Some(g), Color::Red);
                    self.rotate_left(g);
                }
            }
        }
        if let Some(r) = self.root {
            self.node_mut(r).color = Color::Black;
        }
    }
}

// ==================== Deletion ====================

impl PieceTable {
    fn transplant(&mut self, u: NodeIdx, v: Option<NodeIdx>) {
        let u_parent = self.node(u).parent;
        self.replace_child(u_parent, u, v);
        if let Some(v) = v {
            self.node_mut(v).parent = u_parent;
        }
    }

    /// Removes `it`'s piece from the sequence. Only iterators to the
    /// removed piece go stale; all others remain valid.
    pub fn delete(&mut self, it: PieceIter) -> BufferResult<()> {
        let z = self.check_iter(it)?;
        let z_size = self.node(z).piece.size;

        let mut removed_color = self.node(z).color;
        let x: Option<NodeIdx>;
        let x_parent: Option<NodeIdx>;

        let z_left = self.node(z).left;
        let z_right = self.node(z).right;
        if z_left.is_none() {
            x = z_right;
            x_parent = self.node(z).parent;
            self.transplant(z, z_right);
        } else if z_right.is_none() {
            x = z_left;
            x_parent = self.node(z).parent;
            self.transplant(z, z_left);
        } else {
            // two children: relocate the in-order successor node into
            // z's place, preserving its iterator identity
            let y = self.min_node(z_right.expect("checked above"));
            removed_color = self.node(y).color;
            x = self.node(y).right;
            if self.node(y).parent == Some(z) {
                x_parent = Some(y);
            } else {
                x_parent = self.node(y).parent;
                self.transplant(y, x);
                let zr = self.node(z).right;
                self.node_mut(y).right = zr;
                if let Some(r) = zr {
                    self.node_mut(r).parent = Some(y);
                }
            }
            self.transplant(z, Some(y));
            let zl = self.node(z).left;
            self.node_mut(y).left = zl;
            if let Some(l) = zl {
                self.node_mut(l).parent = Some(y);
            }
            let z_color = self.node(z).color;
            self.node_mut(y).color = z_color;
        }

        self.size -= z_size;
        self.pieces -= 1;
        self.refresh_up(x_parent);
        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }
        self.release(z);
        Ok(())
    }

    fn delete_fixup(&mut self, mut x: Option<NodeIdx>, mut x_parent: Option<NodeIdx>) {
        while x != self.root && self.color(x) == Color::Black {
            let Some(p) = x_parent else { break };
            if self.node(p).left == x {
                let Some(mut w) = self.node(p).right else {
                    debug_assert!(false, "doubly-black node without sibling");
                    break;
                };
                if self.node(w).color == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(p).color = Color::Red;
                    self.rotate_left(p);
                    let Some(nw) = self.node(p).right else { break };
                    w = nw;
                }
                let w_left = self.node(w).left;
                let w_right = self.node(w).right;
                if self.color(w_left) == Color::Black && self.color(w_right) == Color::Black {
                    self.node_mut(w).color = Color::Red;
                    x = Some(p);
                    x_parent = self.node(p).parent;
                } else {
                    if self.color(w_right) == Color::Black {
                        self.set_color(w_left, Color::Black);
                        self.node_mut(w).color = Color::Red;
                        self.rotate_right(w);
                        let Some(nw) = self.node(p).right else { break };
                        w = nw;
                    }
                    let p_color = self.node(p).color;
                    self.node_mut(w).color = p_color;
                    self.node_mut(p).color = Color::Black;
                    let w_right = self.node(w).right;
                    self.set_color(w_right, Color::Black);
                    self.rotate_left(p);
                    x = self.root;
                    x_parent = None;
                }
            } else {
                let Some(mut w) = self.node(p).left else {
                    debug_assert!(false, "doubly-black node without sibling");
                    break;
                };
                if self.node(w).color == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(p).color = Color::Red;
                    self.rotate_right(p);
                    let Some(nw) = self.node(p).left else { break };
                    w = nw;
                }
                let w_left = self.node(w).left;
                let w_right = self.node(w).right;
                if self.color(w_left) == Color::Black && self.color(w_right) == Color::Black {
                    self.node_mut(w).color = Color::Red;
                    x = Some(p);
                    x_parent = self.node(p).parent;
                } else {
                    if self.color(w_left) == Color::Black {
                        self.set_color(w_right, Color::Black);
                        self.node_mut(w).color = Color::Red;
                        self.rotate_left(w);
                        let Some(nw) = self.node(p).left else { break };
                        w = nw;
                    }
                    let p_color = self.node(p).color;
                    self.node_mut(w).color = p_color;
                    self.node_mut(p).color = Color::Black;
                    let w_left = self.node(w).left;
                    self.set_color(w_left, Color::Black);
                    self.rotate_right(p);
                    x = self.root;
                    x_parent = None;
                }
            }
        }
        self.set_color(x, Color::Black);
    }
}

// ==================== Piece Resizing ====================

impl PieceTable {
    /// Grows `it`'s piece by `delta` bytes at its end.
    pub fn extend(&mut self, it: PieceIter, delta: usize) -> BufferResult<()> {
        let n = self.check_iter(it)?;
        self.node_mut(n).piece.size += delta;
        self.size += delta;
        self.adjust_up(n, delta as isize);
        Ok(())
    }

    /// Shaves `count` bytes off the front of `it`'s piece.
    pub fn trim_front(&mut self, it: PieceIter, count: usize) -> BufferResult<()> {
        let n = self.check_iter(it)?;
        debug_assert!(count <= self.node(n).piece.size);
        let node = self.node_mut(n);
        node.piece.offset += count;
        node.piece.size -= count;
        self.size -= count;
        self.adjust_up(n, -(count as isize));
        Ok(())
    }

    /// Shrinks `it`'s piece to `new_size` bytes, dropping the tail.
    pub fn truncate(&mut self, it: PieceIter, new_size: usize) -> BufferResult<()> {
        let n = self.check_iter(it)?;
        debug_assert!(new_size <= self.node(n).piece.size);
        let delta = self.node(n).piece.size - new_size;
        self.node_mut(n).piece.size = new_size;
        self.size -= delta;
        self.adjust_up(n, -(delta as isize));
        Ok(())
    }

    /// Replaces `it`'s piece wholesale, keeping the tree sizes honest.
    pub fn set_piece(&mut self, it: PieceIter, piece: Piece) -> BufferResult<()> {
        let n = self.check_iter(it)?;
        let delta = piece.size as isize - self.node(n).piece.size as isize;
        self.node_mut(n).piece = piece;
        self.size = (self.size as isize + delta) as usize;
        self.adjust_up(n, delta);
        Ok(())
    }

    /// All pieces in buffer order.
    pub fn pieces_in_order(&self) -> Vec<Piece> {
        let mut out = Vec::with_capacity(self.pieces);
        let mut cur = self.root.map(|r| self.min_node(r));
        while let Some(i) = cur {
            out.push(self.node(i).piece);
            cur = self.successor(i);
        }
        out
    }
}
