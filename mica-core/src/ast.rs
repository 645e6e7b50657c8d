//! Abstract syntax tree for Mica.
//!
//! The tree is a closed family of tagged variants; every node carries
//! the source position of its first token. Ownership is strictly
//! tree-shaped and the tree lives from the end of parsing until code
//! generation has finished with it.

use crate::span::Pos;

/// Scalar base types of the language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    Int,
    Char,
}

/// A type as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Basic { kind: BasicKind, pos: Pos },
    /// `->T`
    Pointer { points_to: Box<Type>, pos: Pos },
    /// A layout reference, optionally namespace-qualified (`ns.Name`).
    Named { name: String, pos: Pos },
}

impl Type {
    pub fn pos(&self) -> Pos {
        match self {
            Type::Basic { pos, .. } | Type::Pointer { pos, .. } | Type::Named { pos, .. } => *pos,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    BitNot,
    /// `->x`: address of the operand.
    Ref,
    /// `<-p`: load through a pointer.
    Deref,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLiteral {
        text: String,
        pos: Pos,
    },
    CharLiteral {
        value: String,
        pos: Pos,
    },
    StringLiteral {
        value: String,
        pos: Pos,
    },
    Identifier {
        name: String,
        pos: Pos,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Pos,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
        pos: Pos,
    },
    /// Call of a plain or namespace-qualified name (`f`, `ns.f`).
    Call {
        callee: String,
        args: Vec<Expr>,
        pos: Pos,
    },
    /// `~T[size]` reserves `size` cells of `T` and yields a pointer.
    ArrayAlloc {
        elem: Type,
        size: Box<Expr>,
        pos: Pos,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
        pos: Pos,
    },
    Member {
        object: Box<Expr>,
        member: String,
        pos: Pos,
    },
    /// Explicit namespace member access. The grammar cannot tell
    /// `ns.x` from layout member access, so the parser emits `Member`
    /// and the analyzer reinterprets; this variant exists for callers
    /// that build trees directly.
    NamespaceAccess {
        namespace: String,
        member: Box<Expr>,
        pos: Pos,
    },
    Syscall {
        args: Vec<Expr>,
        pos: Pos,
    },
    /// `<T>(e)`
    Cast {
        target: Type,
        expr: Box<Expr>,
        pos: Pos,
    },
    /// `{ v1, v2, ... }`: positional layout member initializer.
    LayoutInit {
        values: Vec<Expr>,
        pos: Pos,
    },
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::IntLiteral { pos, .. }
            | Expr::CharLiteral { pos, .. }
            | Expr::StringLiteral { pos, .. }
            | Expr::Identifier { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::ArrayAlloc { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Member { pos, .. }
            | Expr::NamespaceAccess { pos, .. }
            | Expr::Syscall { pos, .. }
            | Expr::Cast { pos, .. }
            | Expr::LayoutInit { pos, .. } => *pos,
        }
    }

    /// The dotted name a call target would use, if this expression
    /// can serve as one (`f` or `ns.f`).
    pub fn callee_name(&self) -> Option<String> {
        match self {
            Expr::Identifier { name, .. } => Some(name.clone()),
            Expr::Member { object, member, .. } => match object.as_ref() {
                Expr::Identifier { name, .. } => Some(format!("{name}.{member}")),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: Type,
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutMember {
    pub ty: Type,
    pub name: String,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    VarDecl {
        ty: Type,
        name: String,
        init: Option<Expr>,
        pos: Pos,
    },
    Assign {
        target: Expr,
        value: Expr,
        pos: Pos,
    },
    Block(Block),
    Expr {
        expr: Expr,
        pos: Pos,
    },
    If {
        cond: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
        pos: Pos,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
        pos: Pos,
    },
    Return {
        value: Option<Expr>,
        pos: Pos,
    },
    FnDecl {
        return_type: Type,
        name: String,
        params: Vec<Param>,
        body: Block,
        pos: Pos,
    },
    LayoutDecl {
        name: String,
        members: Vec<LayoutMember>,
        pos: Pos,
    },
    NamespaceDecl {
        name: String,
        statements: Vec<Stmt>,
        pos: Pos,
    },
    Import {
        path: String,
        pos: Pos,
    },
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::VarDecl { pos, .. }
            | Stmt::Assign { pos, .. }
            | Stmt::Expr { pos, .. }
            | Stmt::If { pos, .. }
            | Stmt::While { pos, .. }
            | Stmt::Return { pos, .. }
            | Stmt::FnDecl { pos, .. }
            | Stmt::LayoutDecl { pos, .. }
            | Stmt::NamespaceDecl { pos, .. }
            | Stmt::Import { pos, .. } => *pos,
            Stmt::Block(block) => block.pos,
        }
    }
}

/// An ordered sequence of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
}
