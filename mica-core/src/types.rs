//! Semantic type system.
//!
//! A parallel family to the syntactic types: what the analyzer infers
//! and checks against. Cloning is deep; the analyzer and code
//! generator hold independently owned values. The `Error` kind is
//! absorbing for compatibility so one bad subexpression produces one
//! diagnostic, not a cascade.

use core::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SemType {
    Int,
    Char,
    Void,
    Error,
    Pointer(Box<SemType>),
    Array {
        elem: Box<SemType>,
        /// -1 for unknown/dynamic size.
        size: i64,
    },
    Function {
        ret: Box<SemType>,
        params: Vec<SemType>,
    },
    /// Nominal record type; identity is the fully qualified name. A
    /// member list may be empty while the layout is only forward
    /// declared; consumers re-resolve by name in that case.
    Layout {
        fqdn: String,
        members: Vec<LayoutField>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutField {
    pub name: String,
    pub ty: SemType,
}

impl SemType {
    pub fn pointer(points_to: SemType) -> SemType {
        SemType::Pointer(Box::new(points_to))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, SemType::Int | SemType::Char)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, SemType::Pointer(_))
    }

    pub fn is_layout(&self) -> bool {
        matches!(self, SemType::Layout { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self, SemType::Function { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SemType::Error)
    }

    pub fn find_field(&self, name: &str) -> Option<&LayoutField> {
        match self {
            SemType::Layout { members, .. } => members.iter().find(|m| m.name == name),
            _ => None,
        }
    }

    /// Can a value of `other` be used where `self` is expected?
    ///
    /// Nominal rules: exact kind match; `int` accepts `char`
    /// (widening); pointers are congruent on pointee types; layouts
    /// compare by fully qualified name; `error` accepts and is
    /// accepted by anything.
    pub fn is_compatible_with(&self, other: &SemType) -> bool {
        if self.is_error() || other.is_error() {
            return true;
        }

        match (self, other) {
            (SemType::Int, SemType::Int)
            | (SemType::Char, SemType::Char)
            | (SemType::Void, SemType::Void) => true,
            (SemType::Int, SemType::Char) => true,
            (SemType::Pointer(a), SemType::Pointer(b)) => a.is_compatible_with(b),
            (SemType::Array { elem: a, .. }, SemType::Array { elem: b, .. }) => {
                a.is_compatible_with(b)
            }
            (
                SemType::Function {
                    ret: ra,
                    params: pa,
                },
                SemType::Function {
                    ret: rb,
                    params: pb,
                },
            ) => {
                ra.is_compatible_with(rb)
                    && pa.len() == pb.len()
                    && pa.iter().zip(pb).all(|(a, b)| a.is_compatible_with(b))
            }
            (SemType::Layout { fqdn: a, .. }, SemType::Layout { fqdn: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for SemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemType::Int => write!(f, "int"),
            SemType::Char => write!(f, "char"),
            SemType::Void => write!(f, "void"),
            SemType::Error => write!(f, "error"),
            SemType::Pointer(points_to) => write!(f, "->{points_to}"),
            SemType::Array { elem, size } => {
                if *size >= 0 {
                    write!(f, "{elem}[{size}]")
                } else {
                    write!(f, "{elem}[?]")
                }
            }
            SemType::Function { ret, params } => {
                write!(f, "fn {ret}(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ")")
            }
            SemType::Layout { fqdn, .. } => write!(f, "layout {fqdn}"),
        }
    }
}
