//! Semantic analysis.
//!
//! A single walk over the AST that plays two roles at once: it builds
//! the scoped symbol table (declarations, scope pushes and pops,
//! initialization flags) and infers/checks types on every expression,
//! accumulating diagnostics rather than stopping at the first
//! problem. The table, including every archived scope, survives the
//! walk so the code generator and the editor queries can resolve
//! names afterwards.
//!
//! Error typing is absorbing: an operand that already failed types as
//! `error` and every later check accepts it silently, so one root
//! cause produces one diagnostic.

use crate::ast::*;
use crate::diagnostic::{has_errors, Diagnostic};
use crate::span::Pos;
use crate::symbols::{Symbol, SymbolKind, SymbolTable};
use crate::types::{LayoutField, SemType};

/// Result of analyzing a program: the finished symbol table plus all
/// accumulated diagnostics. The table must outlive code generation.
#[derive(Debug)]
pub struct Analysis {
    pub table: SymbolTable,
    pub diagnostics: Vec<Diagnostic>,
}

impl Analysis {
    /// True when no error-severity diagnostics were produced
    /// (warnings are allowed).
    pub fn succeeded(&self) -> bool {
        !has_errors(&self.diagnostics)
    }
}

pub fn analyze(program: &Program) -> Analysis {
    let mut analyzer = SemanticAnalyzer {
        table: SymbolTable::new(),
        diagnostics: Vec::new(),
        return_types: Vec::new(),
    };
    analyzer.visit_program(program);
    Analysis {
        table: analyzer.table,
        diagnostics: analyzer.diagnostics,
    }
}

struct SemanticAnalyzer {
    table: SymbolTable,
    diagnostics: Vec<Diagnostic>,
    /// Return types of enclosing function declarations, innermost
    /// last. Empty outside any function.
    return_types: Vec<SemType>,
}

impl SemanticAnalyzer {
    fn error(&mut self, message: impl Into<String>, pos: Pos) {
        self.diagnostics.push(Diagnostic::error(message, pos));
    }

    fn warning(&mut self, message: impl Into<String>, pos: Pos) {
        self.diagnostics.push(Diagnostic::warning(message, pos));
    }

    // ----- type conversion ---------------------------------------------

    /// Convert a syntactic type to its semantic counterpart,
    /// resolving layout names through the symbol table.
    fn convert_type(&mut self, ty: &Type) -> SemType {
        match ty {
            Type::Basic { kind, .. } => match kind {
                BasicKind::Int => SemType::Int,
                BasicKind::Char => SemType::Char,
            },
            Type::Pointer { points_to, .. } => SemType::pointer(self.convert_type(points_to)),
            Type::Named { name, pos } => self.resolve_layout_name(name, *pos),
        }
    }

    fn resolve_layout_name(&mut self, name: &str, pos: Pos) -> SemType {
        let symbol = if let Some((ns, type_name)) = name.split_once('.') {
            let found = self.find_in_namespace(ns, type_name).cloned();
            match found {
                Some(s) if s.kind == SymbolKind::Layout => Some(s),
                _ => {
                    self.error(
                        format!("Undefined layout type '{type_name}' in namespace '{ns}'"),
                        pos,
                    );
                    return SemType::Error;
                }
            }
        } else {
            match self.table.find(name).cloned() {
                Some(s) if s.kind == SymbolKind::Layout => Some(s),
                _ => {
                    self.error(format!("Undefined layout type '{name}'"), pos);
                    return SemType::Error;
                }
            }
        };

        let symbol = symbol.expect("layout symbol resolved above");
        // A layout mid-declaration still has an empty member list;
        // hand out a name-based reference instead of the incomplete
        // clone so member lookups re-resolve once it is finished.
        if let SemType::Layout { members, .. } = &symbol.ty {
            if members.is_empty() {
                return SemType::Layout {
                    fqdn: symbol.fqdn.clone(),
                    members: Vec::new(),
                };
            }
        }
        symbol.ty.clone()
    }

    /// Qualified lookup: the symbol named `name` declared directly in
    /// scope `namespace_<ns>`, active or archived.
    fn find_in_namespace(&self, ns: &str, name: &str) -> Option<&Symbol> {
        let scope_name = format!("namespace_{ns}");
        self.table
            .all_scopes()
            .filter(|s| s.name == scope_name)
            .find_map(|s| s.symbols.get(name))
    }

    fn is_namespace(&self, name: &str) -> bool {
        self.table.has_scope_named(&format!("namespace_{name}"))
    }

    /// If a layout type's member list is empty it is a forward
    /// reference by name; fetch the completed layout from the table.
    fn complete_layout(&self, ty: SemType) -> SemType {
        if let SemType::Layout { fqdn, members } = &ty {
            if members.is_empty() {
                if let Some(symbol) = self.table.find(fqdn) {
                    if symbol.kind == SymbolKind::Layout {
                        return symbol.ty.clone();
                    }
                }
            }
        }
        ty
    }

    fn mark_initialized(&mut self, name: &str) {
        if let Some(symbol) = self.table.find_mut(name) {
            symbol.initialized = true;
        }
    }

    // ----- statements --------------------------------------------------

    fn visit_program(&mut self, program: &Program) {
        for stmt in &program.statements {
            self.visit_statement(stmt);
        }
    }

    fn visit_statement(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::VarDecl {
                ty,
                name,
                init,
                pos,
            } => self.visit_var_decl(ty, name, init.as_ref(), *pos),
            Stmt::Assign { target, value, pos } => self.visit_assignment(target, value, *pos),
            Stmt::Block(block) => self.visit_block(block),
            Stmt::Expr { expr, .. } => {
                self.visit_expression(expr);
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                pos,
            } => {
                let cond_type = self.visit_expression(cond);
                if !cond_type.is_error() && !cond_type.is_numeric() {
                    self.error("If condition must be a numeric type", *pos);
                }
                self.visit_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_statement(else_branch);
                }
            }
            Stmt::While { cond, body, pos } => {
                let cond_type = self.visit_expression(cond);
                if !cond_type.is_error() && !cond_type.is_numeric() {
                    self.error("While condition must be a numeric type", *pos);
                }
                self.visit_statement(body);
            }
            Stmt::Return { value, pos } => self.visit_return(value.as_ref(), *pos),
            Stmt::FnDecl {
                return_type,
                name,
                params,
                body,
                pos,
            } => self.visit_fn_decl(return_type, name, params, body, *pos),
            Stmt::LayoutDecl { name, members, pos } => {
                self.visit_layout_decl(name, members, *pos)
            }
            Stmt::NamespaceDecl {
                name, statements, ..
            } => {
                self.table.push_scope(format!("namespace_{name}"));
                for stmt in statements {
                    self.visit_statement(stmt);
                }
                self.table.pop_scope();
            }
            // Imports were inlined by the preprocessor; one surviving
            // here (e.g. analysis of unpreprocessed text) is inert.
            Stmt::Import { .. } => {}
        }
    }

    fn visit_var_decl(&mut self, ty: &Type, name: &str, init: Option<&Expr>, pos: Pos) {
        if self.table.has_in_current_scope(name) {
            self.error(
                format!("Variable '{name}' already declared in current scope"),
                pos,
            );
            return;
        }

        let declared = self.convert_type(ty);
        let mut initialized = false;

        match init {
            Some(Expr::LayoutInit { values, .. }) if declared.is_layout() => {
                if self.check_layout_init(&declared, values, pos) {
                    initialized = true;
                }
            }
            Some(Expr::StringLiteral { .. }) if declared.is_pointer() => {
                if let SemType::Pointer(points_to) = &declared {
                    if **points_to == SemType::Char {
                        initialized = true;
                    } else {
                        self.error("String literal can only be assigned to char pointer", pos);
                    }
                }
            }
            Some(Expr::StringLiteral { .. }) if declared == SemType::Char => {
                self.error(
                    "Cannot assign string literal to single char variable. Use single \
                     quotes for character literals (e.g., '\\n') or declare as char \
                     pointer (e.g., ->char)",
                    pos,
                );
            }
            Some(expr) => {
                let init_type = self.visit_expression(expr);
                if !declared.is_compatible_with(&init_type) {
                    self.error(
                        format!(
                            "Type mismatch in variable initialization for '{name}'. \
                             Expected {declared}, got {init_type}"
                        ),
                        pos,
                    );
                } else {
                    initialized = true;
                }
            }
            None => {
                // Layout variables are addressable storage from the
                // moment of declaration; their members may be written
                // one by one.
                if declared.is_layout() {
                    initialized = true;
                }
            }
        }

        self.table.insert(Symbol::new(
            name,
            SymbolKind::Variable,
            declared,
            pos,
            initialized,
        ));
    }

    /// Check `{ v1, v2, ... }` against a layout's member list.
    /// Returns true when the initializer is fully compatible.
    fn check_layout_init(&mut self, layout: &SemType, values: &[Expr], pos: Pos) -> bool {
        let SemType::Layout { fqdn, members } = self.complete_layout(layout.clone()) else {
            return false;
        };

        if values.len() != members.len() {
            self.error(
                format!(
                    "Layout initialization has {} values but layout '{}' has {} members",
                    values.len(),
                    fqdn,
                    members.len()
                ),
                pos,
            );
            return false;
        }

        let mut all_compatible = true;
        for (value, member) in values.iter().zip(&members) {
            let value_type = self.visit_expression(value);
            if !member.ty.is_compatible_with(&value_type) {
                self.error(
                    format!(
                        "Type mismatch in layout initialization for member '{}'. \
                         Expected {}, got {}",
                        member.name, member.ty, value_type
                    ),
                    value.pos(),
                );
                all_compatible = false;
            }
        }
        all_compatible
    }

    fn visit_fn_decl(
        &mut self,
        return_type: &Type,
        name: &str,
        params: &[Param],
        body: &Block,
        pos: Pos,
    ) {
        if self.table.has_in_current_scope(name) {
            self.error(
                format!("Function '{name}' already declared in current scope"),
                pos,
            );
            return;
        }

        let ret = self.convert_type(return_type);
        let param_types: Vec<SemType> = params.iter().map(|p| self.convert_type(&p.ty)).collect();

        // Insert the complete signature before visiting the body so
        // recursive calls resolve.
        let fn_type = SemType::Function {
            ret: Box::new(ret.clone()),
            params: param_types.clone(),
        };
        self.table
            .insert(Symbol::new(name, SymbolKind::Function, fn_type, pos, true));

        self.table.push_scope(format!("function_{name}"));
        self.return_types.push(ret);

        for (param, param_type) in params.iter().zip(param_types) {
            self.table.insert(Symbol::new(
                &param.name,
                SymbolKind::Parameter,
                param_type,
                param.pos,
                true,
            ));
        }

        self.visit_block(body);

        self.return_types.pop();
        self.table.pop_scope();
    }

    fn visit_layout_decl(&mut self, name: &str, members: &[LayoutMember], pos: Pos) {
        if self.table.has_in_current_scope(name) {
            self.error(
                format!("Layout '{name}' already declared in current scope"),
                pos,
            );
            return;
        }

        // Placeholder first, complete afterwards: a member of type
        // `->Node` inside `layout Node` must already resolve.
        let fqdn = self.table.build_fqdn(name);
        let placeholder = SemType::Layout {
            fqdn: fqdn.clone(),
            members: Vec::new(),
        };
        self.table
            .insert(Symbol::new(name, SymbolKind::Layout, placeholder, pos, true));

        let mut fields = Vec::new();
        for member in members {
            let member_type = self.convert_type(&member.ty);
            fields.push(LayoutField {
                name: member.name.clone(),
                ty: member_type,
            });
        }

        let complete = SemType::Layout {
            fqdn,
            members: fields,
        };
        self.table
            .replace(name, Symbol::new(name, SymbolKind::Layout, complete, pos, true));
    }

    fn visit_assignment(&mut self, target: &Expr, value: &Expr, pos: Pos) {
        // A bare identifier target is being written, not read: resolve
        // its type without the initialization check.
        let target_type = match target {
            Expr::Identifier { name, pos } => match self.table.find(name) {
                Some(symbol) => symbol.ty.clone(),
                None => {
                    self.error(format!("Undefined identifier '{name}'"), *pos);
                    SemType::Error
                }
            },
            _ => self.visit_expression(target),
        };

        match value {
            Expr::LayoutInit { values, .. } if target_type.is_layout() => {
                self.check_layout_init(&target_type, values, pos);
            }
            Expr::StringLiteral { .. }
                if matches!(&target_type, SemType::Pointer(p) if **p == SemType::Char) => {}
            _ => {
                let value_type = self.visit_expression(value);
                if !target_type.is_compatible_with(&value_type) {
                    self.error(
                        format!(
                            "Type mismatch in assignment. Expected {target_type}, \
                             got {value_type}"
                        ),
                        pos,
                    );
                }
            }
        }

        if let Expr::Identifier { name, .. } = target {
            self.mark_initialized(name);
        }
    }

    fn visit_return(&mut self, value: Option<&Expr>, pos: Pos) {
        let Some(expected) = self.return_types.last().cloned() else {
            self.error("Return statement outside of function", pos);
            return;
        };

        match value {
            Some(expr) => {
                let value_type = self.visit_expression(expr);
                if !expected.is_compatible_with(&value_type) {
                    self.error(
                        format!("Return type mismatch. Expected {expected}, got {value_type}"),
                        pos,
                    );
                }
            }
            None => {
                if expected != SemType::Void {
                    self.error(format!("Missing return value. Expected {expected}"), pos);
                }
            }
        }
    }

    fn visit_block(&mut self, block: &Block) {
        self.table.push_scope("block");
        for stmt in &block.statements {
            self.visit_statement(stmt);
        }
        self.table.pop_scope();
    }

    // ----- expressions -------------------------------------------------

    fn visit_expression(&mut self, expr: &Expr) -> SemType {
        match expr {
            Expr::IntLiteral { .. } => SemType::Int,
            Expr::CharLiteral { .. } => SemType::Char,
            Expr::StringLiteral { .. } => SemType::pointer(SemType::Char),
            Expr::Identifier { name, pos } => self.visit_identifier(name, *pos),
            Expr::Binary { op, lhs, rhs, pos } => self.visit_binary(*op, lhs, rhs, *pos),
            Expr::Unary { op, operand, pos } => self.visit_unary(*op, operand, *pos),
            Expr::Call { callee, args, pos } => self.visit_call(callee, args, *pos),
            Expr::ArrayAlloc { elem, size, pos } => {
                let size_type = self.visit_expression(size);
                if !size_type.is_error() && !size_type.is_numeric() {
                    self.error("Array size must be numeric", *pos);
                }
                let elem_type = self.convert_type(elem);
                SemType::pointer(elem_type)
            }
            Expr::Index { base, index, pos } => self.visit_index(base, index, *pos),
            Expr::Member {
                object,
                member,
                pos,
            } => self.visit_member(object, member, *pos),
            Expr::NamespaceAccess {
                namespace,
                member,
                pos,
            } => self.visit_namespace_member(namespace, member, *pos),
            Expr::Syscall { args, pos } => self.visit_syscall(args, *pos),
            Expr::Cast { target, expr, pos } => self.visit_cast(target, expr, *pos),
            Expr::LayoutInit { values, .. } => {
                // Only meaningful against a layout-typed target, which
                // the declaration and assignment paths intercept; in
                // any other position the surrounding check fails.
                for value in values {
                    self.visit_expression(value);
                }
                SemType::Error
            }
        }
    }

    fn visit_identifier(&mut self, name: &str, pos: Pos) -> SemType {
        let Some(symbol) = self.table.find(name) else {
            self.error(format!("Undefined identifier '{name}'"), pos);
            return SemType::Error;
        };
        let (kind, initialized, ty) = (symbol.kind, symbol.initialized, symbol.ty.clone());
        if kind == SymbolKind::Variable && !initialized {
            self.error(format!("Use of uninitialized variable '{name}'"), pos);
        }
        ty
    }

    fn visit_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, pos: Pos) -> SemType {
        let left = self.visit_expression(lhs);
        let right = self.visit_expression(rhs);
        if left.is_error() || right.is_error() {
            return SemType::Error;
        }

        // A char compared to a string literal is always a mistake;
        // point at the literal form rather than reporting a generic
        // incompatibility.
        let string_vs_char = (left == SemType::Char
            && matches!(rhs, Expr::StringLiteral { .. }))
            || (right == SemType::Char && matches!(lhs, Expr::StringLiteral { .. }));
        if string_vs_char && matches!(op, BinOp::Eq | BinOp::Ne) {
            self.error(
                "Cannot compare char with string literal. Use single quotes for \
                 character comparison (e.g., '\\0' instead of \"\\0\")",
                pos,
            );
        }

        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                if !left.is_numeric() || !right.is_numeric() {
                    self.error("Arithmetic operators require numeric types", pos);
                    return SemType::Error;
                }
                // Result widens to int when either side is int.
                if left == SemType::Int || right == SemType::Int {
                    SemType::Int
                } else {
                    SemType::Char
                }
            }
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => {
                if !left.is_numeric() || !right.is_numeric() {
                    self.error("Bitwise operators require numeric types", pos);
                    return SemType::Error;
                }
                left
            }
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                if !left.is_compatible_with(&right) && !right.is_compatible_with(&left) {
                    self.error(
                        format!("Cannot compare incompatible types: {left} and {right}"),
                        pos,
                    );
                    return SemType::Error;
                }
                SemType::Int
            }
        }
    }

    fn visit_unary(&mut self, op: UnOp, operand: &Expr, pos: Pos) -> SemType {
        let operand_type = self.visit_expression(operand);
        if operand_type.is_error() {
            return SemType::Error;
        }

        match op {
            UnOp::Neg | UnOp::BitNot => {
                if !operand_type.is_numeric() {
                    self.error("Unary arithmetic operators require numeric types", pos);
                    return SemType::Error;
                }
                operand_type
            }
            UnOp::Ref => SemType::pointer(operand_type),
            UnOp::Deref => {
                let SemType::Pointer(points_to) = operand_type else {
                    self.error("Dereference operator requires pointer type", pos);
                    return SemType::Error;
                };
                self.complete_layout(*points_to)
            }
        }
    }

    fn visit_call(&mut self, callee: &str, args: &[Expr], pos: Pos) -> SemType {
        let (display_name, symbol) = if let Some((ns, fn_name)) = callee.split_once('.') {
            match self.find_in_namespace(ns, fn_name).cloned() {
                Some(s) => (callee.to_string(), s),
                None => {
                    self.error(
                        format!("Undefined function '{fn_name}' in namespace '{ns}'"),
                        pos,
                    );
                    return SemType::Error;
                }
            }
        } else {
            match self.table.find(callee).cloned() {
                Some(s) => (callee.to_string(), s),
                None => {
                    self.error(format!("Undefined function '{callee}'"), pos);
                    return SemType::Error;
                }
            }
        };

        let SemType::Function { ret, params } = &symbol.ty else {
            self.error(format!("'{display_name}' is not a function"), pos);
            return SemType::Error;
        };

        if args.len() != params.len() {
            self.error(
                format!(
                    "Function '{display_name}' expects {} arguments, got {}",
                    params.len(),
                    args.len()
                ),
                pos,
            );
            return (**ret).clone();
        }

        for (i, (arg, param)) in args.iter().zip(params).enumerate() {
            let arg_type = self.visit_expression(arg);
            if !param.is_compatible_with(&arg_type) {
                self.error(
                    format!(
                        "Argument {} type mismatch in function '{display_name}'. \
                         Expected {param}, got {arg_type}",
                        i + 1
                    ),
                    pos,
                );
            }
        }

        (**ret).clone()
    }

    fn visit_index(&mut self, base: &Expr, index: &Expr, pos: Pos) -> SemType {
        let base_type = self.visit_expression(base);
        let index_type = self.visit_expression(index);

        if !index_type.is_error() && !index_type.is_numeric() {
            self.error("Array index must be numeric", pos);
        }
        if base_type.is_error() {
            return SemType::Error;
        }

        match base_type {
            SemType::Pointer(points_to) => self.complete_layout(*points_to),
            SemType::Array { elem, .. } => *elem,
            _ => {
                self.error("Array access requires pointer/array type", pos);
                SemType::Error
            }
        }
    }

    fn visit_member(&mut self, object: &Expr, member: &str, pos: Pos) -> SemType {
        // `ns.x` parses as member access; when the object names a
        // namespace rather than a value, resolve within that
        // namespace's scope instead.
        if let Expr::Identifier { name, .. } = object {
            if self.table.find(name).is_none() && self.is_namespace(name) {
                let member_expr = Expr::Identifier {
                    name: member.to_string(),
                    pos,
                };
                return self.visit_namespace_member(name, &member_expr, pos);
            }
        }

        let object_type = self.visit_expression(object);
        if object_type.is_error() {
            return SemType::Error;
        }

        // Pointer-to-layout auto-dereferences.
        let object_type = match object_type {
            SemType::Pointer(points_to) => *points_to,
            other => other,
        };
        let object_type = self.complete_layout(object_type);

        let SemType::Layout { fqdn, .. } = &object_type else {
            self.error("Member access requires layout type", pos);
            return SemType::Error;
        };

        match object_type.find_field(member) {
            Some(field) => field.ty.clone(),
            None => {
                self.error(
                    format!("Layout '{fqdn}' has no member '{member}'"),
                    pos,
                );
                SemType::Error
            }
        }
    }

    fn visit_namespace_member(&mut self, namespace: &str, member: &Expr, pos: Pos) -> SemType {
        if !self.is_namespace(namespace) {
            self.error(format!("Undefined namespace '{namespace}'"), pos);
            return SemType::Error;
        }

        match member {
            Expr::Identifier { name, pos } => {
                let Some(symbol) = self.find_in_namespace(namespace, name) else {
                    self.error(
                        format!("Undefined identifier '{name}' in namespace '{namespace}'"),
                        *pos,
                    );
                    return SemType::Error;
                };
                let (kind, initialized, ty) =
                    (symbol.kind, symbol.initialized, symbol.ty.clone());
                if kind == SymbolKind::Variable && !initialized {
                    self.error(format!("Use of uninitialized variable '{name}'"), *pos);
                }
                ty
            }
            Expr::Call { callee, args, pos } => {
                let qualified = format!("{namespace}.{callee}");
                self.visit_call(&qualified, args, *pos)
            }
            other => self.visit_expression(other),
        }
    }

    fn visit_syscall(&mut self, args: &[Expr], pos: Pos) -> SemType {
        if args.len() != 7 {
            self.error(
                format!("syscall expects exactly 7 arguments, got {}", args.len()),
                pos,
            );
            return SemType::Error;
        }
        for arg in args {
            self.visit_expression(arg);
        }
        SemType::Int
    }

    fn visit_cast(&mut self, target: &Type, expr: &Expr, pos: Pos) -> SemType {
        let target_type = self.convert_type(target);
        let expr_type = self.visit_expression(expr);
        if target_type.is_error() || expr_type.is_error() {
            return SemType::Error;
        }

        let legal = (target_type.is_numeric() && expr_type.is_numeric())
            || (target_type.is_numeric() && expr_type.is_pointer())
            || (target_type.is_pointer() && expr_type.is_numeric())
            || (target_type.is_pointer() && expr_type.is_pointer());
        if !legal {
            self.error(
                "Type cast only supported between numeric types (int and char) or \
                 pointer types",
                pos,
            );
            return SemType::Error;
        }

        if target_type == SemType::Char && expr_type == SemType::Int {
            self.warning("Possible data loss when casting from int to char", pos);
        }

        target_type
    }
}
