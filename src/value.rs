use indexmap::IndexMap;
use std::cell::RefCell;
use std::rc::Rc;

use crate::ast::Stmt;

/// A mutable storage location for one variable or attribute. Handles stay
/// valid across later insertions into the map that owns them.
pub type Slot = Rc<RefCell<Value>>;

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Number(f64),
    Function(Rc<Function>),
    Class(Rc<Class>),
    Instance(Rc<Instance>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Number(left_num), Value::Number(right_num)) => left_num == right_num,
            (Value::Function(left_fn), Value::Function(right_fn)) => Rc::ptr_eq(left_fn, right_fn),
            (Value::Class(left_cls), Value::Class(right_cls)) => Rc::ptr_eq(left_cls, right_cls),
            (Value::Instance(left_obj), Value::Instance(right_obj)) => {
                Rc::ptr_eq(left_obj, right_obj)
            }
            _ => false,
        }
    }
}

impl Value {
    /// Truthiness for control flow: nil is false, a number is false only at
    /// exactly zero, everything else is true.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Number(n) => *n != 0.0,
            _ => true,
        }
    }

    /// Numeric coercion used by arithmetic, comparison, and `print`. Nil
    /// coerces to 0; callables and instances have no numeric reading and
    /// coerce to 0 as well.
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            _ => 0.0,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Number(_) => "number",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
            Value::Instance(_) => "instance",
        }
    }
}

/// Formats a number the way `print` emits it: integral values without a
/// fractional part, everything else (including inf and NaN) as f64 displays.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

#[derive(Debug)]
pub struct Function {
    pub name: Rc<str>,
    pub params: Vec<Rc<str>>,
    pub body: Rc<[Stmt]>,
    /// The instance a method was looked up on, absent for free functions.
    pub receiver: Option<Value>,
}

impl Function {
    pub fn new(name: Rc<str>, params: Vec<Rc<str>>, body: Rc<[Stmt]>) -> Self {
        Self {
            name,
            params,
            body,
            receiver: None,
        }
    }

    /// Returns a fresh function value carrying `receiver`, sharing the
    /// parameter list and body with `self`. The stored template is never
    /// mutated, so the same method can be looked up on two instances without
    /// one binding clobbering the other.
    pub fn bind(&self, receiver: Value) -> Rc<Function> {
        Rc::new(Function {
            name: Rc::clone(&self.name),
            params: self.params.clone(),
            body: Rc::clone(&self.body),
            receiver: Some(receiver),
        })
    }
}

/// A class is its method table. Immutable once declared.
#[derive(Debug)]
pub struct Class {
    pub name: Rc<str>,
    pub methods: IndexMap<String, Rc<Function>>,
}

impl Class {
    pub fn method(&self, name: &str) -> Option<&Rc<Function>> {
        self.methods.get(name)
    }
}

#[derive(Debug)]
pub struct Instance {
    pub class: Rc<Class>,
    fields: RefCell<IndexMap<String, Slot>>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: RefCell::new(IndexMap::new()),
        }
    }

    /// Looks up an attribute stored on this instance. Class methods are not
    /// consulted here; attribute shadowing is the caller's concern.
    pub fn field(&self, name: &str) -> Option<Slot> {
        self.fields.borrow().get(name).cloned()
    }

    /// Returns the slot for `name`, creating it as nil if the instance does
    /// not have the attribute yet.
    pub fn field_slot(&self, name: &str) -> Slot {
        if let Some(slot) = self.fields.borrow().get(name) {
            return Rc::clone(slot);
        }
        let slot: Slot = Rc::new(RefCell::new(Value::Nil));
        self.fields
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&slot));
        slot
    }
}
