// src/sema/types.rs
//
// The canonical type representation for Tarn's semantic analysis.
//
// Types are finite trees. `Bool` and `Int` are not separate variants: they
// are well-known field-less structs registered by the registry, so struct
// identity comparison covers primitives uniformly.

use std::fmt;

use crate::sema::registry::{Registry, StructId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// Produced by earlier failures; compatible with anything for recovery.
    Error,
    /// Not yet resolved. The only variant substitutable during inference;
    /// substitution is monotonic and never reverts.
    Placeholder,
    Struct(StructId),
    Pointer {
        mutable: bool,
        pointee: Box<Type>,
    },
    Tuple(Vec<Type>),
    Funct {
        params: Vec<Type>,
        ret: Box<Type>,
    },
}

impl Type {
    /// The empty tuple, the language's unit type.
    pub fn unit() -> Type {
        Type::Tuple(Vec::new())
    }

    pub fn pointer(mutable: bool, pointee: Type) -> Type {
        Type::Pointer {
            mutable,
            pointee: Box::new(pointee),
        }
    }

    pub fn funct(params: Vec<Type>, ret: Type) -> Type {
        Type::Funct {
            params,
            ret: Box::new(ret),
        }
    }

    #[inline]
    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Tuple(elems) if elems.is_empty())
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// True if no placeholder remains anywhere in the tree.
    pub fn is_resolved(&self) -> bool {
        match self {
            Type::Placeholder => false,
            Type::Error | Type::Struct(_) => true,
            Type::Pointer { pointee, .. } => pointee.is_resolved(),
            Type::Tuple(elems) => elems.iter().all(Type::is_resolved),
            Type::Funct { params, ret } => {
                params.iter().all(Type::is_resolved) && ret.is_resolved()
            }
        }
    }

    /// Render with struct names taken from the registry.
    pub fn display<'a>(&'a self, registry: &'a Registry) -> TypeDisplay<'a> {
        TypeDisplay { ty: self, registry }
    }
}

pub struct TypeDisplay<'a> {
    ty: &'a Type,
    registry: &'a Registry,
}

impl fmt::Display for TypeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            Type::Error => write!(f, "<error>"),
            Type::Placeholder => write!(f, "_"),
            Type::Struct(id) => write!(f, "{}", self.registry.struct_def(*id).name),
            Type::Pointer { mutable, pointee } => {
                if *mutable {
                    write!(f, "*mut {}", pointee.display(self.registry))
                } else {
                    write!(f, "*{}", pointee.display(self.registry))
                }
            }
            Type::Tuple(elems) => {
                write!(f, "(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", elem.display(self.registry))?;
                }
                write!(f, ")")
            }
            Type::Funct { params, ret } => {
                write!(f, "fn(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", param.display(self.registry))?;
                }
                write!(f, ") -> {}", ret.display(self.registry))
            }
        }
    }
}
