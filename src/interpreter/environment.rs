use crate::value::{Slot, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// One frame in the scope chain: a name-to-slot mapping plus a parent link.
///
/// A frame is created for the program root and for each function invocation;
/// blocks, `if`, and `while` never open one, so every statement in a function
/// body shares that call's frame. Variables live in slots
/// (`Rc<RefCell<Value>>`) rather than directly in the map, so a handle
/// obtained from [`Environment::slot`] stays valid however the map grows
/// afterwards.
#[derive(Debug, Default)]
pub struct Environment {
    slots: RefCell<HashMap<String, Slot>>,
    parent: Option<Rc<Environment>>,
    /// Set once `return` has fired in this call frame; statement sequences
    /// governed by this frame stop executing when it is set.
    terminated: Cell<bool>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Rc<Environment>) -> Self {
        Self {
            slots: RefCell::new(HashMap::new()),
            parent: Some(parent),
            terminated: Cell::new(false),
        }
    }

    pub fn is_bound_local(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        if self.is_bound_local(name) {
            return true;
        }
        match &self.parent {
            Some(parent) => parent.is_bound(name),
            None => false,
        }
    }

    /// Reads a variable, searching from this frame outwards. The caller
    /// decides what an unbound name means; the evaluator reports it and
    /// substitutes nil.
    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(slot) = self.slots.borrow().get(name) {
            return Some(slot.borrow().clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get(name))
    }

    fn find_slot(&self, name: &str) -> Option<Slot> {
        if let Some(slot) = self.slots.borrow().get(name) {
            return Some(Rc::clone(slot));
        }
        self.parent
            .as_ref()
            .and_then(|parent| parent.find_slot(name))
    }

    fn root(self: &Rc<Self>) -> Rc<Environment> {
        let mut env = Rc::clone(self);
        while let Some(parent) = env.parent.clone() {
            env = parent;
        }
        env
    }

    /// Returns a stable handle to the variable's storage, auto-declaring a
    /// nil slot in the root scope when the name is unbound everywhere. Used
    /// by identifier reference resolution; plain `set` follows the
    /// nearest-scope rule instead.
    pub fn slot(self: &Rc<Self>, name: &str) -> Slot {
        if let Some(slot) = self.find_slot(name) {
            return slot;
        }
        let slot: Slot = Rc::new(RefCell::new(Value::Nil));
        self.root()
            .slots
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&slot));
        slot
    }

    /// Assigns under the nearest-scope rule: overwrite the innermost
    /// existing binding, or create the name in this frame if no scope
    /// binds it.
    pub fn set(&self, name: &str, value: Value) {
        if self.is_bound_local(name) || !self.is_bound(name) {
            self.declare(name, value);
        } else if let Some(parent) = &self.parent {
            parent.set(name, value);
        }
    }

    /// Binds in this frame unconditionally, bypassing lookup. Used for
    /// parameters, the receiver, and the reserved return slot.
    pub fn declare(&self, name: &str, value: Value) {
        let existing = self.slots.borrow().get(name).cloned();
        match existing {
            Some(slot) => *slot.borrow_mut() = value,
            None => {
                self.slots
                    .borrow_mut()
                    .insert(name.to_string(), Rc::new(RefCell::new(value)));
            }
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.get()
    }

    pub fn terminate(&self) {
        self.terminated.set(true);
    }
}
