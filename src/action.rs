//! A bounded stack of reversible operations.
//!
//! Each action is a pair of closures over one shared parameter value:
//! one applies the mutation, the other reverses it. The stack is
//! heterogeneous; parameter types are erased behind a common
//! apply/revert interface, so call sites declare their parameters
//! freshly without any per-operation trait plumbing.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

trait ReversibleAction {
    fn apply(&self);
    fn revert(&self);
}

struct ClosureAction<P> {
    params: P,
    apply: RefCell<Box<dyn FnMut(&P)>>,
    revert: RefCell<Box<dyn FnMut(&P)>>,
}

impl<P> ReversibleAction for ClosureAction<P> {
    fn apply(&self) {
        (self.apply.borrow_mut())(&self.params)
    }

    fn revert(&self) {
        (self.revert.borrow_mut())(&self.params)
    }
}

struct Inner {
    actions: VecDeque<Rc<dyn ReversibleAction>>,
    /// One past the last applied, not-undone action. Everything at and
    /// beyond the cursor is redoable.
    cursor: usize,
}

/// A LIFO of undoable actions holding at most `capacity` entries.
///
/// Methods take `&self`: the stack bookkeeping completes before any
/// closure runs, so an action may re-enter the stack (for example to
/// push a follow-up action from inside `apply`).
pub struct ActionStack {
    inner: RefCell<Inner>,
    capacity: usize,
}

impl ActionStack {
    /// Creates a stack remembering the last 100 actions
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a stack remembering the last `capacity` actions
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RefCell::new(Inner {
                actions: VecDeque::new(),
                cursor: 0,
            }),
            capacity,
        }
    }

    /// Applies a new action and pushes it onto the stack.
    ///
    /// Any previously undone actions are discarded first; `apply` runs
    /// once the stack has been rewritten. When the stack exceeds its
    /// capacity the oldest action is forgotten.
    pub fn execute<P, D, U>(&self, apply: D, revert: U, params: P)
    where
        P: 'static,
        D: FnMut(&P) + 'static,
        U: FnMut(&P) + 'static,
    {
        let action: Rc<dyn ReversibleAction> = Rc::new(ClosureAction {
            params,
            apply: RefCell::new(Box::new(apply)),
            revert: RefCell::new(Box::new(revert)),
        });

        {
            let mut inner = self.inner.borrow_mut();
            let cursor = inner.cursor;
            inner.actions.truncate(cursor);
            inner.actions.push_back(action.clone());
            inner.cursor = inner.actions.len();
            tracing::trace!(depth = inner.cursor, "execute");
        }

        action.apply();

        let mut inner = self.inner.borrow_mut();
        if inner.actions.len() > self.capacity {
            inner.actions.pop_front();
            inner.cursor = inner.cursor.saturating_sub(1);
        }
    }

    /// Reverses the most recent applied action. No-op when there is
    /// nothing to undo.
    pub fn undo(&self) {
        let action = {
            let mut inner = self.inner.borrow_mut();
            if inner.cursor == 0 {
                return;
            }

            inner.cursor -= 1;
            tracing::trace!(depth = inner.cursor, "undo");
            inner.actions[inner.cursor].clone()
        };

        action.revert();
    }

    /// Re-applies the most recently undone action. No-op when there is
    /// nothing to redo.
    pub fn redo(&self) {
        let action = {
            let mut inner = self.inner.borrow_mut();
            if inner.cursor == inner.actions.len() {
                return;
            }

            let action = inner.actions[inner.cursor].clone();
            inner.cursor += 1;
            tracing::trace!(depth = inner.cursor, "redo");
            action
        };

        action.apply();
    }

    /// The number of actions currently held, undone ones included
    pub fn len(&self) -> usize {
        self.inner.borrow().actions.len()
    }

    /// Returns true if the stack holds no actions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The maximum number of actions remembered
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ActionStack {
    fn default() -> Self {
        Self::new()
    }
}
