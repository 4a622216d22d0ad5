//! Runtime values for the Snakescript VM.
//!
//! Strings are not a distinct type: they are lists whose element type is
//! [`Type::Character`]. Variables are shared, lazily-bound cells whose type is
//! fixed by their first assignment.

use crate::types::{Type, TypeMismatch, TypeTag};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Text rendered for an unbound variable or the undefined placeholder.
pub const UNDEFINED_TEXT: &str = "undefined";

/// A runtime datum.
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Character(char),
    Boolean(bool),
    List(ListValue),
    Tuple(Box<Value>, Box<Value>),
    /// Zero-value placeholder.
    Undefined,
    Var(VarRef),
}

/// A homogeneous list. The element type is kept so empty lists stay typed.
#[derive(Debug, Clone)]
pub struct ListValue {
    pub elem: Type,
    pub items: Vec<Value>,
}

#[derive(Debug)]
struct VarCell {
    name: String,
    declared: Option<Type>,
    value: Option<Value>,
}

/// A named mutable binder shared by every push of the same name within a frame.
#[derive(Debug, Clone)]
pub struct VarRef(Rc<RefCell<VarCell>>);

impl VarRef {
    pub fn new(name: impl Into<String>) -> Self {
        VarRef(Rc::new(RefCell::new(VarCell {
            name: name.into(),
            declared: None,
            value: None,
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.0.borrow().value.is_some()
    }

    /// The bound value, if any.
    pub fn value(&self) -> Option<Value> {
        self.0.borrow().value.clone()
    }

    /// The type fixed by the first assignment.
    pub fn declared_type(&self) -> Option<Type> {
        self.0.borrow().declared.clone()
    }

    /// Bind `value` in place. The first binding fixes the variable's type;
    /// every later binding must match it exactly.
    pub fn bind(&self, value: Value) -> Result<(), TypeMismatch> {
        let ty = value.ty();
        let mut cell = self.0.borrow_mut();
        match &cell.declared {
            Some(declared) if !declared.matches(&ty) => {
                return Err(TypeMismatch::new(declared, &ty));
            }
            Some(_) => {}
            None => cell.declared = Some(ty),
        }
        cell.value = Some(value);
        Ok(())
    }

    pub fn ptr_eq(&self, other: &VarRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Value {
    pub fn list(elem: Type, items: Vec<Value>) -> Self {
        Value::List(ListValue { elem, items })
    }

    pub fn tuple(first: Value, second: Value) -> Self {
        Value::Tuple(Box::new(first), Box::new(second))
    }

    /// Build a character list from text.
    pub fn string(text: &str) -> Self {
        Value::list(
            Type::Character,
            text.chars().map(Value::Character).collect(),
        )
    }

    /// The structural type of this value. A bound variable reports the type
    /// fixed at its first assignment; an unbound one reports [`Type::Var`].
    pub fn ty(&self) -> Type {
        match self {
            Value::Number(_) => Type::Number,
            Value::Character(_) => Type::Character,
            Value::Boolean(_) => Type::Boolean,
            Value::Undefined => Type::Undefined,
            Value::List(list) => Type::list(list.elem.clone()),
            Value::Tuple(first, second) => Type::tuple(first.ty(), second.ty()),
            Value::Var(var) => var.declared_type().unwrap_or(Type::Var),
        }
    }

    pub fn flatten(&self) -> Vec<TypeTag> {
        self.ty().flatten()
    }

    /// Dereference a bound variable to its value. Other values, and unbound
    /// variables, are returned unchanged.
    pub fn resolved(&self) -> Value {
        match self {
            Value::Var(var) => var.value().unwrap_or_else(|| self.clone()),
            other => other.clone(),
        }
    }

    pub fn into_resolved(self) -> Value {
        if let Value::Var(var) = &self {
            if let Some(value) = var.value() {
                return value;
            }
        }
        self
    }

    pub fn as_number(&self) -> Option<f64> {
        match self.resolved() {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.resolved() {
            Value::Boolean(b) => Some(b),
            _ => None,
        }
    }

    /// The text of a character list.
    pub fn as_string(&self) -> Option<String> {
        match self.resolved() {
            Value::List(list) if list.elem == Type::Character => Some(
                list.items
                    .iter()
                    .filter_map(|item| match item {
                        Value::Character(c) => Some(*c),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self.resolved() {
            Value::Number(n) => n != 0.0,
            Value::Character(c) => c != '\0',
            Value::Boolean(b) => b,
            Value::List(list) => !list.items.is_empty(),
            Value::Tuple(..) => true,
            Value::Undefined | Value::Var(_) => false,
        }
    }
}

/// Whether two values have equal flattened types. Variables unwrap to their
/// bound value's type before comparing.
pub fn share_type(a: &Value, b: &Value) -> bool {
    a.flatten() == b.flatten()
}

/// Recursive structural equality.
pub fn structural_equal(a: &Value, b: &Value) -> bool {
    match (a.resolved(), b.resolved()) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Character(x), Value::Character(y)) => x == y,
        (Value::Boolean(x), Value::Boolean(y)) => x == y,
        (Value::Undefined, Value::Undefined) => true,
        (Value::List(x), Value::List(y)) => {
            x.items.len() == y.items.len()
                && x
                    .items
                    .iter()
                    .zip(y.items.iter())
                    .all(|(l, r)| structural_equal(l, r))
        }
        (Value::Tuple(x1, x2), Value::Tuple(y1, y2)) => {
            structural_equal(&x1, &y1) && structural_equal(&x2, &y2)
        }
        (Value::Var(x), Value::Var(y)) => x.ptr_eq(&y),
        _ => false,
    }
}

/// Ordering used by `?>` and `?<`: positive means `a` is greater.
///
/// Scalars compare by value (characters by code point, `false < true`).
/// Tuples sum the orderings of their components, and equal-length lists sum
/// the element-wise orderings. Lists of different lengths are unordered (0).
/// The sums make this a weak, non-antisymmetric ordering for composites.
pub fn order(a: &Value, b: &Value) -> i64 {
    match (a.resolved(), b.resolved()) {
        (Value::Number(x), Value::Number(y)) => sign(x.partial_cmp(&y)),
        (Value::Character(x), Value::Character(y)) => sign(x.partial_cmp(&y)),
        (Value::Boolean(x), Value::Boolean(y)) => sign(x.partial_cmp(&y)),
        (Value::List(x), Value::List(y)) => {
            if x.items.len() != y.items.len() {
                return 0;
            }
            x.items
                .iter()
                .zip(y.items.iter())
                .map(|(l, r)| order(l, r))
                .sum()
        }
        (Value::Tuple(x1, x2), Value::Tuple(y1, y2)) => order(&x1, &y1) + order(&x2, &y2),
        _ => 0,
    }
}

fn sign(ordering: Option<std::cmp::Ordering>) -> i64 {
    match ordering {
        Some(std::cmp::Ordering::Less) => -1,
        Some(std::cmp::Ordering::Greater) => 1,
        _ => 0,
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Character(c) => write!(f, "{}", c),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Undefined => write!(f, "{}", UNDEFINED_TEXT),
            Value::List(list) if list.elem == Type::Character => {
                for item in &list.items {
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::List(list) => {
                if list.items.is_empty() {
                    return write!(f, "{{ }}");
                }
                let items: Vec<String> = list.items.iter().map(|v| v.to_string()).collect();
                write!(f, "{{ {} }}", items.join(", "))
            }
            Value::Tuple(first, second) => write!(f, "( {}, {} )", first, second),
            Value::Var(var) => match var.value() {
                Some(value) => write!(f, "{}", value),
                None => write!(f, "{}", UNDEFINED_TEXT),
            },
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        structural_equal(self, other)
    }
}
