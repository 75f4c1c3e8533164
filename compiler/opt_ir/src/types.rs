//! Value types.
//!
//! The type system proper lives upstream; by the time IR reaches the
//! optimizer every value carries a fully resolved [`Type`]. This module only
//! answers the two questions passes ask: "what is it" and "may a value of
//! this type stand in for that one".

use std::fmt;

/// Signature of a callable value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub result: Type,
}

/// A resolved IR type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    /// Fixed-width integer. `Int(1)` is the Boolean type.
    Int(u16),
    /// Reference-counted heap object.
    Object,
    /// Address of a memory location holding the inner type.
    Address(Box<Type>),
    /// Tuple of element types. The empty tuple is the unit type.
    Tuple(Vec<Type>),
    /// Callable value with the given signature.
    Function(Box<FunctionType>),
}

impl Type {
    /// The Boolean type (`Int1`).
    pub const BOOL: Type = Type::Int(1);

    /// The empty tuple.
    pub fn unit() -> Self {
        Type::Tuple(Vec::new())
    }

    pub fn address_of(pointee: Type) -> Self {
        Type::Address(Box::new(pointee))
    }

    pub fn function(params: Vec<Type>, result: Type) -> Self {
        Type::Function(Box::new(FunctionType { params, result }))
    }

    /// Returns `true` for `Int1`.
    #[inline]
    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Int(1))
    }

    /// Integer bit width, if this is an integer type.
    #[inline]
    pub fn int_width(&self) -> Option<u16> {
        match self {
            Type::Int(bits) => Some(*bits),
            _ => None,
        }
    }

    /// Whether a value of type `self` may replace a value of type `target`.
    ///
    /// Types are fully resolved and there is no subtyping at this level,
    /// so compatibility is structural equality.
    #[inline]
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        self == target
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(bits) => write!(f, "Int{bits}"),
            Type::Object => write!(f, "Object"),
            Type::Address(inner) => write!(f, "*{inner}"),
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Type::Function(sig) => {
                write!(f, "@(")?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {}", sig.result)
            }
        }
    }
}
