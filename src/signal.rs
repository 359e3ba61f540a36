//! Typed callback dispatch with re-entrancy safe emission.
//!
//! A [`Signal`] delivers its argument to every connected callback; a
//! [`Request`] additionally threads each callback's return value
//! through an evaluator supplied at emit time. Both tolerate callbacks
//! which connect, disconnect or emit again from inside an emission:
//! every emission delivers to the slots that were connected when it
//! started, and disconnected slots are only compacted away once the
//! outermost emission has completed.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

struct SlotState {
    disconnected: Cell<bool>,
}

struct Slot<C> {
    callback: C,
    state: Rc<SlotState>,
}

/// Slot list shared by [`Signal`] and [`Request`]
struct Slots<C> {
    slots: RefCell<Vec<Rc<Slot<C>>>>,
    /// Number of emissions currently running on this signal
    depth: Cell<u32>,
}

impl<C> Slots<C> {
    fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        }
    }

    fn connect_raw(&self, make: impl FnOnce(Weak<SlotState>) -> C) -> Link {
        if self.depth.get() == 0 {
            self.compact();
        }

        let state = Rc::new(SlotState {
            disconnected: Cell::new(false),
        });
        let callback = make(Rc::downgrade(&state));

        self.slots.borrow_mut().push(Rc::new(Slot {
            callback,
            state: state.clone(),
        }));

        Link {
            state: Rc::downgrade(&state),
        }
    }

    /// Invokes `invoke` once per slot connected at the time of the call.
    ///
    /// Disconnections made by a callback do not affect the running
    /// emission; they are observed by nested and subsequent emissions.
    fn emit_each(&self, mut invoke: impl FnMut(&C)) {
        let snapshot: Vec<_> = self
            .slots
            .borrow()
            .iter()
            .filter(|v| !v.state.disconnected.get())
            .cloned()
            .collect();

        self.depth.set(self.depth.get() + 1);
        for slot in &snapshot {
            invoke(&slot.callback);
        }
        self.depth.set(self.depth.get() - 1);

        if self.depth.get() == 0 {
            self.compact();
        }
    }

    fn compact(&self) {
        self.slots
            .borrow_mut()
            .retain(|v| !v.state.disconnected.get());
    }

    fn count(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|v| !v.state.disconnected.get())
            .count()
    }

    fn disconnect_all(&self) {
        for slot in self.slots.borrow().iter() {
            slot.state.disconnected.set(true);
        }

        if self.depth.get() == 0 {
            self.slots.borrow_mut().clear();
        }
    }
}

/// Non-owning handle to a connected callback.
///
/// Dropping the link does not disconnect the callback; the slot lives
/// until [`Link::disconnect`] is called or the signal is dropped.
#[derive(Clone)]
pub struct Link {
    state: Weak<SlotState>,
}

impl Link {
    /// Disconnects the callback. Idempotent.
    pub fn disconnect(&self) {
        if let Some(state) = self.state.upgrade() {
            state.disconnected.set(true);
        }
    }

    /// Returns true while the callback is still connected
    pub fn is_connected(&self) -> bool {
        self.state
            .upgrade()
            .map(|v| !v.disconnected.get())
            .unwrap_or(false)
    }
}

/// A many-to-many dispatcher delivering `&T` to every connected callback
pub struct Signal<T> {
    slots: Slots<Box<dyn Fn(&T)>>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self { slots: Slots::new() }
    }

    /// Connects a callback and returns a [`Link`] for disconnecting it
    pub fn connect(&self, callback: impl Fn(&T) + 'static) -> Link {
        self.slots.connect_raw(|_| Box::new(callback))
    }

    /// Connects a sender; each emission sends a clone of the argument.
    ///
    /// The slot disconnects itself once the receiving side is gone.
    #[cfg(feature = "flume")]
    pub fn connect_channel(&self, tx: flume::Sender<T>) -> Link
    where
        T: Clone + 'static,
    {
        self.slots.connect_raw(|state| {
            Box::new(move |arg: &T| {
                if tx.send(arg.clone()).is_err() {
                    if let Some(state) = state.upgrade() {
                        state.disconnected.set(true);
                    }
                }
            })
        })
    }

    /// Delivers `arg` to every connected callback in connect order
    pub fn emit(&self, arg: &T) {
        self.slots.emit_each(|callback| callback(arg));
    }

    /// The number of connected callbacks
    pub fn callback_count(&self) -> usize {
        self.slots.count()
    }

    /// Disconnects every callback
    pub fn disconnect_all(&self) {
        self.slots.disconnect_all();
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Like [`Signal`], but callbacks return a value which is folded
/// through an evaluator supplied at emit time.
///
/// The evaluator sees every result in connect order, which supports
/// both select-best and fold-all patterns.
pub struct Request<T, R> {
    slots: Slots<Box<dyn Fn(&T) -> R>>,
}

impl<T, R> Request<T, R> {
    pub fn new() -> Self {
        Self { slots: Slots::new() }
    }

    /// Connects a callback and returns a [`Link`] for disconnecting it
    pub fn connect(&self, callback: impl Fn(&T) -> R + 'static) -> Link {
        self.slots.connect_raw(|_| Box::new(callback))
    }

    /// Delivers `arg` to every connected callback, passing each result
    /// to `evaluator`
    pub fn emit(&self, arg: &T, mut evaluator: impl FnMut(R)) {
        self.slots.emit_each(|callback| evaluator(callback(arg)));
    }

    /// The number of connected callbacks
    pub fn callback_count(&self) -> usize {
        self.slots.count()
    }

    /// Disconnects every callback
    pub fn disconnect_all(&self) {
        self.slots.disconnect_all();
    }
}

impl<T, R> Default for Request<T, R> {
    fn default() -> Self {
        Self::new()
    }
}
