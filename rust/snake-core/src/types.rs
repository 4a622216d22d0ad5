//! Structural runtime types and their flattened tag encoding.
//!
//! Types are held as a recursive [`Type`] tree, but every type check in the
//! language compares the *flattened* pre-order tag sequence produced by
//! [`Type::flatten`]. A tuple writes an [`TypeTag::Undefined`] separator
//! between its two halves, so the sequence for `(# [@])` is
//! `[Tuple, Number, Undefined, List, Character]`.

use std::fmt;
use strum::Display;
use thiserror::Error;

/// One tag of a flattened type sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TypeTag {
    Number,
    Character,
    Boolean,
    Undefined,
    List,
    Tuple,
    Var,
}

/// A structural runtime type.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Number,
    Character,
    Boolean,
    Undefined,
    /// An unbound variable binder.
    Var,
    List(Box<Type>),
    Tuple(Box<Type>, Box<Type>),
}

impl Type {
    pub fn list(elem: Type) -> Self {
        Type::List(Box::new(elem))
    }

    pub fn tuple(first: Type, second: Type) -> Self {
        Type::Tuple(Box::new(first), Box::new(second))
    }

    /// The character-list type used for strings.
    pub fn string() -> Self {
        Type::list(Type::Character)
    }

    /// Pre-order tag sequence describing this type.
    pub fn flatten(&self) -> Vec<TypeTag> {
        let mut tags = Vec::new();
        self.flatten_into(&mut tags);
        tags
    }

    fn flatten_into(&self, out: &mut Vec<TypeTag>) {
        match self {
            Type::Number => out.push(TypeTag::Number),
            Type::Character => out.push(TypeTag::Character),
            Type::Boolean => out.push(TypeTag::Boolean),
            Type::Undefined => out.push(TypeTag::Undefined),
            Type::Var => out.push(TypeTag::Var),
            Type::List(elem) => {
                out.push(TypeTag::List);
                elem.flatten_into(out);
            }
            Type::Tuple(first, second) => {
                out.push(TypeTag::Tuple);
                first.flatten_into(out);
                out.push(TypeTag::Undefined);
                second.flatten_into(out);
            }
        }
    }

    /// Two types match when their flattened sequences are equal element-wise.
    pub fn matches(&self, other: &Type) -> bool {
        self.flatten() == other.flatten()
    }
}

/// Renders a type in source syntax: `#`, `@`, `??`, `[T]`, `(A B)`.
impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Number => write!(f, "#"),
            Type::Character => write!(f, "@"),
            Type::Boolean => write!(f, "??"),
            Type::Undefined => write!(f, "undefined"),
            Type::Var => write!(f, "var"),
            Type::List(elem) => write!(f, "[{}]", elem),
            Type::Tuple(first, second) => write!(f, "({} {})", first, second),
        }
    }
}

/// A value's flattened type differed from the one an operation required.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "expected types {}, but received types {}",
    format_tags(.expected),
    format_tags(.actual)
)]
pub struct TypeMismatch {
    pub expected: Vec<TypeTag>,
    pub actual: Vec<TypeTag>,
}

impl TypeMismatch {
    pub fn new(expected: &Type, actual: &Type) -> Self {
        Self {
            expected: expected.flatten(),
            actual: actual.flatten(),
        }
    }

    /// Mismatch against a bare tag, for operations that accept any list or any variable.
    pub fn tag(expected: TypeTag, actual: &Type) -> Self {
        Self {
            expected: vec![expected],
            actual: actual.flatten(),
        }
    }
}

/// Formats a tag sequence as `{ Number, Character }`.
pub fn format_tags(tags: &[TypeTag]) -> String {
    if tags.is_empty() {
        return "{ }".to_string();
    }
    let names: Vec<String> = tags.iter().map(|t| t.to_string()).collect();
    format!("{{ {} }}", names.join(", "))
}
