//! Type definitions for the Zenith type system

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pointers and function pointers are two bytes on every supported target.
pub const POINTER_SIZE: u16 = 2;

/// Primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    U8,
    U16,
    I8,
    I16,
    Bool,
    /// Packed BCD, one byte (two decimal digits).
    D8,
    /// Packed BCD, two bytes (four decimal digits).
    D16,
}

impl PrimitiveType {
    pub fn byte_size(&self) -> u16 {
        match self {
            PrimitiveType::U8 | PrimitiveType::I8 | PrimitiveType::Bool | PrimitiveType::D8 => 1,
            PrimitiveType::U16 | PrimitiveType::I16 | PrimitiveType::D16 => 2,
        }
    }

    /// Parse a primitive type name as written in source.
    pub fn from_name(name: &str) -> Option<PrimitiveType> {
        let ty = match name {
            "u8" => PrimitiveType::U8,
            "u16" => PrimitiveType::U16,
            "i8" => PrimitiveType::I8,
            "i16" => PrimitiveType::I16,
            "bool" => PrimitiveType::Bool,
            "d8" => PrimitiveType::D8,
            "d16" => PrimitiveType::D16,
            _ => return None,
        };
        Some(ty)
    }
}

/// A struct field with its packed byte offset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub ty: Type,
    pub offset: u16,
}

/// A fully resolved type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Type {
    Primitive(PrimitiveType),
    /// `len: None` is the unsized form, which behaves as a pointer at ABI
    /// boundaries; `len: Some(0)` is a genuinely empty array.
    Array {
        element: Box<Type>,
        len: Option<u16>,
    },
    Pointer(Box<Type>),
    Struct {
        name: String,
        fields: Vec<StructField>,
    },
    Function {
        params: Vec<Type>,
        return_type: Option<Box<Type>>,
    },
    /// The type of a call to a function with no return value.
    Void,
    /// Recovery type; only produced alongside an error diagnostic.
    Error,
}

impl Type {
    /// Build a struct type, packing field offsets in declaration order
    /// without padding.
    pub fn new_struct(name: impl Into<String>, fields: Vec<(String, Type)>) -> Type {
        let mut packed = Vec::with_capacity(fields.len());
        let mut offset = 0u16;
        for (field_name, ty) in fields {
            let size = ty.byte_size();
            packed.push(StructField { name: field_name, ty, offset });
            offset += size;
        }
        Type::Struct { name: name.into(), fields: packed }
    }

    pub fn byte_size(&self) -> u16 {
        match self {
            Type::Primitive(p) => p.byte_size(),
            Type::Array { element, len } => match len {
                Some(n) => element.byte_size() * n,
                None => POINTER_SIZE,
            },
            Type::Pointer(_) => POINTER_SIZE,
            Type::Struct { fields, .. } => fields
                .last()
                .map(|f| f.offset + f.ty.byte_size())
                .unwrap_or(0),
            Type::Function { .. } => POINTER_SIZE,
            Type::Void | Type::Error => 0,
        }
    }

    pub fn is_struct(&self) -> bool {
        matches!(self, Type::Struct { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, Type::Function { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    pub fn field(&self, name: &str) -> Option<&StructField> {
        match self {
            Type::Struct { fields, .. } => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }
}

/// Hook for a future conversion pass: the result type of a binary operation.
/// Current policy is that every operator, comparisons included, propagates
/// the left operand's type.
pub fn promote_binary(left: &Type, _right: &Type) -> Type {
    left.clone()
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::I8 => "i8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::Bool => "bool",
            PrimitiveType::D8 => "d8",
            PrimitiveType::D16 => "d16",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p),
            Type::Array { element, len } => match len {
                Some(n) => write!(f, "{}[{}]", element, n),
                None => write!(f, "{}[]", element),
            },
            Type::Pointer(inner) => write!(f, "{}*", inner),
            Type::Struct { name, .. } => write!(f, "{}", name),
            Type::Function { params, return_type } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param)?;
                }
                write!(f, ")")?;
                if let Some(ret) = return_type {
                    write!(f, " {}", ret)?;
                }
                Ok(())
            }
            Type::Void => write!(f, "void"),
            Type::Error => write!(f, "<error>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_sizes() {
        assert_eq!(Type::Primitive(PrimitiveType::U8).byte_size(), 1);
        assert_eq!(Type::Primitive(PrimitiveType::Bool).byte_size(), 1);
        assert_eq!(Type::Primitive(PrimitiveType::D8).byte_size(), 1);
        assert_eq!(Type::Primitive(PrimitiveType::U16).byte_size(), 2);
        assert_eq!(Type::Primitive(PrimitiveType::I16).byte_size(), 2);
        assert_eq!(Type::Primitive(PrimitiveType::D16).byte_size(), 2);
    }

    #[test]
    fn array_and_pointer_sizes() {
        let u8_ty = Type::Primitive(PrimitiveType::U8);
        let sized = Type::Array { element: Box::new(u8_ty.clone()), len: Some(10) };
        assert_eq!(sized.byte_size(), 10);

        let unsized_arr = Type::Array { element: Box::new(u8_ty.clone()), len: None };
        assert_eq!(unsized_arr.byte_size(), POINTER_SIZE);

        assert_eq!(Type::Pointer(Box::new(u8_ty)).byte_size(), POINTER_SIZE);
    }

    #[test]
    fn struct_offsets_are_packed_in_declaration_order() {
        let ty = Type::new_struct(
            "Mixed",
            vec![
                ("a".to_string(), Type::Primitive(PrimitiveType::U8)),
                ("b".to_string(), Type::Primitive(PrimitiveType::U16)),
                ("c".to_string(), Type::Primitive(PrimitiveType::U8)),
            ],
        );

        assert_eq!(ty.field("a").unwrap().offset, 0);
        assert_eq!(ty.field("b").unwrap().offset, 1);
        assert_eq!(ty.field("c").unwrap().offset, 3);
        assert_eq!(ty.byte_size(), 4);
    }

    #[test]
    fn function_type_displays_signature() {
        let ty = Type::Function {
            params: vec![
                Type::Primitive(PrimitiveType::U16),
                Type::Primitive(PrimitiveType::U16),
            ],
            return_type: Some(Box::new(Type::Primitive(PrimitiveType::U16))),
        };
        assert_eq!(ty.to_string(), "(u16, u16) u16");
    }
}
