//! The language's type system and the implicit-coercion rules of `spec.md` §7.
//!
//! Grounded on `examples/navicore-cem3/crates/compiler/src/types.rs`
//! (closed `Type` enum, used both by the parser-adjacent declarations and
//! by lowering) but reshaped for a nominally-typed imperative language
//! instead of Seq's row-polymorphic stack effects.

use std::fmt;

/// A source-level type. Array/list element types and fixed-string capacity
/// are carried inline since the language has no generics (`spec.md` §1
/// Non-goals).
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// `intN`: N is the width in bytes, 1..=8.
    Int(u8),
    /// `floatN`: N is the width in bytes, 4..=8.
    Float(u8),
    Bool,
    Char,
    /// A heap/stack string value (pointer to bytes).
    Str,
    /// `string[N]`: fixed-capacity byte buffer.
    FixedString(u32),
    /// `T[N]`.
    FixedArray(Box<Type>, u32),
    /// `T[]`.
    DynamicList(Box<Type>),
    Void,
}

impl Type {
    pub const DEFAULT_INT: Type = Type::Int(4);
    pub const DEFAULT_FLOAT: Type = Type::Float(8);

    /// Bit width used for the IR representation of scalar types. Bool is
    /// stored widened to 32 bits per `spec.md` §4.4; it is computed as i1
    /// at comparison sites and zext'd immediately.
    pub fn storage_bits(&self) -> u32 {
        match self {
            Type::Int(n) => u32::from(*n) * 8,
            Type::Float(n) if *n <= 4 => 32,
            Type::Float(_) => 64,
            Type::Bool => 32,
            Type::Char => 8,
            Type::Str | Type::FixedString(_) => 64, // pointer-width, modeled as i64 handle in text IR
            Type::FixedArray(_, _) | Type::DynamicList(_) => 64,
            Type::Void => 0,
        }
    }

    pub fn is_pointer_like(&self) -> bool {
        matches!(
            self,
            Type::Str | Type::FixedString(_) | Type::FixedArray(_, _) | Type::DynamicList(_)
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float(_))
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_int() || self.is_float()
    }

    /// Parse a declared type name token lexeme (`int`, `int8`, `float`,
    /// `float32`, `bool`, `char`, `string`, `void`) into a `Type`.
    /// Returns `Err` with a diagnostic message for malformed widths.
    pub fn from_type_name(name: &str) -> Result<Type, String> {
        match name {
            "int" => Ok(Type::Int(4)),
            "float" => Ok(Type::Float(8)),
            "bool" => Ok(Type::Bool),
            "char" => Ok(Type::Char),
            "string" => Ok(Type::Str),
            "void" => Ok(Type::Void),
            _ => {
                if let Some(rest) = name.strip_prefix("int") {
                    let n: u32 = rest
                        .parse()
                        .map_err(|_| format!("malformed integer type '{name}'"))?;
                    if n == 0 || n > 8 {
                        return Err(format!("int width must be 1-8 bytes, got '{name}'"));
                    }
                    Ok(Type::Int(n as u8))
                } else if let Some(rest) = name.strip_prefix("float") {
                    let n: u32 = rest
                        .parse()
                        .map_err(|_| format!("malformed float type '{name}'"))?;
                    if n < 4 || n > 8 {
                        return Err(format!("float width must be 4-8 bytes, got '{name}'"));
                    }
                    Ok(Type::Float(n as u8))
                } else {
                    Err(format!("unknown type name '{name}'"))
                }
            }
        }
    }

    /// Promote two numeric operand types to the common type arithmetic
    /// should be performed at, per `spec.md` §4.4: wider int wins; mixed
    /// int/float promotes the int to the float's width.
    pub fn promote(lhs: &Type, rhs: &Type) -> Option<Type> {
        match (lhs, rhs) {
            (Type::Int(a), Type::Int(b)) => Some(Type::Int(*a.max(b))),
            (Type::Float(a), Type::Float(b)) => Some(Type::Float(*a.max(b))),
            (Type::Int(_), Type::Float(b)) => Some(Type::Float(*b)),
            (Type::Float(a), Type::Int(_)) => Some(Type::Float(*a)),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(n) => write!(f, "int{n}"),
            Type::Float(n) => write!(f, "float{n}"),
            Type::Bool => write!(f, "bool"),
            Type::Char => write!(f, "char"),
            Type::Str => write!(f, "string"),
            Type::FixedString(cap) => write!(f, "string[{cap}]"),
            Type::FixedArray(elem, n) => write!(f, "{elem}[{n}]"),
            Type::DynamicList(elem) => write!(f, "{elem}[]"),
            Type::Void => write!(f, "void"),
        }
    }
}

/// A coercion instruction the IR emitter must apply, per `spec.md` §7's
/// implicit-coercion table. Returned by `coerce` so lowering can emit the
/// right cast instruction without re-deriving the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    None,
    SignExtend,
    Truncate,
    IntToFloat,
    FloatToInt,
    FloatWiden,
    FloatNarrow,
    /// `any -> void`: discard (only legal on a void return path).
    Discard,
}

/// Determine the coercion needed to convert a value of type `from` to a
/// value of type `to`. Returns `Err` for the one rejected case (pointer
/// <-> int).
pub fn coerce(from: &Type, to: &Type) -> Result<Coercion, String> {
    use Type::*;
    if from == to {
        return Ok(Coercion::None);
    }
    match (from, to) {
        (_, Void) => Ok(Coercion::Discard),
        (Int(a), Int(b)) => Ok(if b > a {
            Coercion::SignExtend
        } else {
            Coercion::Truncate
        }),
        (Int(_), Float(_)) => Ok(Coercion::IntToFloat),
        (Float(_), Int(_)) => Ok(Coercion::FloatToInt),
        (Float(a), Float(b)) => Ok(if b > a {
            Coercion::FloatWiden
        } else {
            Coercion::FloatNarrow
        }),
        (Char, Int(_)) => Ok(Coercion::SignExtend),
        (Bool, Int(_)) => Ok(Coercion::SignExtend),
        (a, b) if a.is_pointer_like() != b.is_pointer_like() && (a.is_int() || b.is_int()) => {
            Err(format!("cannot coerce pointer-like type {a} to/from {b}"))
        }
        _ => Err(format!("no implicit coercion from {from} to {to}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scalar_and_width_suffixed_names() {
        assert_eq!(Type::from_type_name("int").unwrap(), Type::Int(4));
        assert_eq!(Type::from_type_name("int8").unwrap(), Type::Int(8));
        assert_eq!(Type::from_type_name("float4").unwrap(), Type::Float(4));
        assert_eq!(Type::from_type_name("float8").unwrap(), Type::Float(8));
        assert!(Type::from_type_name("float2").is_err());
        assert!(Type::from_type_name("int9999").is_err());
    }

    #[test]
    fn promote_widens_int_to_wider_int() {
        assert_eq!(Type::promote(&Type::Int(2), &Type::Int(4)), Some(Type::Int(4)));
    }

    #[test]
    fn promote_mixed_int_float_uses_float_width() {
        assert_eq!(
            Type::promote(&Type::Int(8), &Type::Float(4)),
            Some(Type::Float(4))
        );
    }

    #[test]
    fn coerce_pointer_to_int_is_rejected() {
        assert!(coerce(&Type::Str, &Type::Int(4)).is_err());
    }

    #[test]
    fn coerce_int_narrow_truncates() {
        assert_eq!(coerce(&Type::Int(8), &Type::Int(1)).unwrap(), Coercion::Truncate);
    }

    #[test]
    fn coerce_any_to_void_discards() {
        assert_eq!(coerce(&Type::Int(4), &Type::Void).unwrap(), Coercion::Discard);
    }
}
