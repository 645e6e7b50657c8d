//! Code generation: analyzed AST to target assembly text.
//!
//! The target is a register/stack machine: a value stack, a linearly
//! addressed memory, a small bank of named registers and a call
//! instruction. Expressions evaluate onto the stack; statements
//! consume what they need. The generator owns three resource
//! managers (a first-free register pool, a scope-reclaiming memory
//! allocator and a label counter) and mirrors the analyzer's scope
//! walk so every identifier resolves to the same FQDN the analyzer
//! gave it.
//!
//! Instruction set (one per line, labels flush left):
//!   push n / pop            literal push, discard top
//!   load a / store a        memory cell ↔ stack
//!   ldind / stind           load/store through an address on the stack
//!   rpush rK / rpop rK      register ↔ stack
//!   rload rK a / rstore rK a  register ↔ memory cell
//!   add sub mul div mod and or xor neg not
//!   eq ne lt gt le ge       pop two, push 0/1
//!   jmp L / jz L            unconditional, pop-and-branch-on-zero
//!   call L / ret            call stack
//!   sys                     pop seven arguments, push the result
//!   halt                    end of the top-level program

use std::collections::BTreeMap;

use crate::ast::*;
use crate::error::CoreError;
use crate::symbols::{Symbol, SymbolKind, SymbolTable};
use crate::types::SemType;

/// Size of the register bank.
const REGISTER_COUNT: usize = 6;

// ----- register pool ---------------------------------------------------

/// First-free pool over the fixed register bank. An allocation may be
/// associated with a variable FQDN so later visits can find the
/// cached register again; when the pool is exhausted callers fall
/// back to plain stack/memory moves.
#[derive(Debug)]
pub struct RegisterPool {
    in_use: [bool; REGISTER_COUNT],
    by_var: BTreeMap<String, usize>,
}

impl Default for RegisterPool {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterPool {
    pub fn new() -> RegisterPool {
        RegisterPool {
            in_use: [false; REGISTER_COUNT],
            by_var: BTreeMap::new(),
        }
    }

    pub fn allocate(&mut self, var: Option<&str>) -> Option<usize> {
        let index = self.in_use.iter().position(|used| !used)?;
        self.in_use[index] = true;
        if let Some(var) = var {
            self.by_var.insert(var.to_string(), index);
        }
        Some(index)
    }

    pub fn release(&mut self, index: usize) {
        if index < REGISTER_COUNT {
            self.in_use[index] = false;
        }
        self.by_var.retain(|_, &mut reg| reg != index);
    }

    pub fn lookup(&self, var: &str) -> Option<usize> {
        self.by_var.get(var).copied()
    }

    pub fn has_available(&self) -> bool {
        self.in_use.iter().any(|used| !used)
    }

    pub fn name(index: usize) -> String {
        format!("r{index}")
    }

    pub fn reset(&mut self) {
        self.in_use = [false; REGISTER_COUNT];
        self.by_var.clear();
    }
}

// ----- memory map ------------------------------------------------------

#[derive(Debug)]
struct MemoryFrame {
    start: i64,
    slots: BTreeMap<String, i64>,
}

/// Static memory layout with scope-reclaim semantics. Address 0 is
/// reserved; allocation starts at 1. Popping a scope restores the
/// next-address counter to its value at the push, reclaiming every
/// cell allocated inside. Namespace scopes are popped with `keep`:
/// their variables are globals and stay addressable.
#[derive(Debug)]
pub struct MemoryMap {
    next: i64,
    frames: Vec<MemoryFrame>,
    layout_offsets: BTreeMap<String, BTreeMap<String, i64>>,
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMap {
    pub fn new() -> MemoryMap {
        MemoryMap {
            next: 1,
            frames: vec![MemoryFrame {
                start: 1,
                slots: BTreeMap::new(),
            }],
            layout_offsets: BTreeMap::new(),
        }
    }

    pub fn next_address(&self) -> i64 {
        self.next
    }

    pub fn push_scope(&mut self) {
        self.frames.push(MemoryFrame {
            start: self.next,
            slots: BTreeMap::new(),
        });
    }

    /// Leave a scope and reclaim everything allocated inside it.
    pub fn pop_scope(&mut self) {
        if self.frames.len() > 1 {
            let frame = self.frames.pop().unwrap();
            self.next = frame.start;
        }
    }

    /// Leave a scope but keep its allocations live, folding the
    /// address bindings into the enclosing frame.
    pub fn pop_scope_keep(&mut self) {
        if self.frames.len() > 1 {
            let frame = self.frames.pop().unwrap();
            let parent = self.frames.last_mut().unwrap();
            for (name, addr) in frame.slots {
                parent.slots.insert(name, addr);
            }
        }
    }

    /// Reserve `size` cells for a named variable in the current scope.
    pub fn alloc(&mut self, fqdn: &str, size: i64) -> i64 {
        let address = self.next;
        self.frames
            .last_mut()
            .unwrap()
            .slots
            .insert(fqdn.to_string(), address);
        self.next += size;
        address
    }

    /// Reserve `size` anonymous cells (array backing store).
    pub fn alloc_array(&mut self, size: i64) -> i64 {
        let address = self.next;
        self.next += size;
        address
    }

    pub fn address(&self, fqdn: &str) -> Option<i64> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.slots.get(fqdn).copied())
    }

    pub fn set_layout_offset(&mut self, layout: &str, member: &str, offset: i64) {
        self.layout_offsets
            .entry(layout.to_string())
            .or_default()
            .insert(member.to_string(), offset);
    }

    pub fn layout_offset(&self, layout: &str, member: &str) -> Option<i64> {
        self.layout_offsets.get(layout)?.get(member).copied()
    }

    pub fn reset(&mut self) {
        self.next = 1;
        self.frames = vec![MemoryFrame {
            start: 1,
            slots: BTreeMap::new(),
        }];
        self.layout_offsets.clear();
    }
}

// ----- label generator -------------------------------------------------

/// Monotonic label counter; labels are opaque to semantics.
#[derive(Debug)]
pub struct LabelGen {
    next: u64,
}

impl Default for LabelGen {
    fn default() -> Self {
        Self::new()
    }
}

impl LabelGen {
    pub fn new() -> LabelGen {
        LabelGen { next: 1 }
    }

    pub fn fresh(&mut self, prefix: &str) -> String {
        let label = format!("{prefix}{}", self.next);
        self.next += 1;
        label
    }

    pub fn reset(&mut self) {
        self.next = 1;
    }
}

// ----- code generator --------------------------------------------------

type CResult<T> = Result<T, CoreError>;

fn err(message: impl Into<String>) -> CoreError {
    CoreError::Codegen(message.into())
}

/// Generate assembly for an analyzed program. The symbol table must
/// be the one the analyzer produced for this program: name
/// resolution replays the analyzer's scope walk against it.
pub fn generate(program: &Program, table: &SymbolTable) -> CResult<String> {
    let mut generator = CodeGenerator::new(table);
    generator.generate_program(program)?;
    Ok(generator.out)
}

/// A register caching a parameter value, with the backing cell.
#[derive(Debug, Clone)]
struct RegSlot {
    reg: usize,
    addr: i64,
}

pub struct CodeGenerator<'a> {
    out: String,
    regs: RegisterPool,
    mem: MemoryMap,
    labels: LabelGen,
    table: &'a SymbolTable,
    /// Mirror of the analyzer's active scope stack; identifier FQDNs
    /// are composed from this path.
    scope_path: Vec<String>,
    /// Per-function cached parameter registers, innermost last.
    reg_frames: Vec<Vec<RegSlot>>,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(table: &'a SymbolTable) -> CodeGenerator<'a> {
        CodeGenerator {
            out: String::new(),
            regs: RegisterPool::new(),
            mem: MemoryMap::new(),
            labels: LabelGen::new(),
            table,
            scope_path: vec!["global".to_string()],
            reg_frames: Vec::new(),
        }
    }

    /// Drop all generated state so the generator can be reused.
    pub fn reset(&mut self) {
        self.out.clear();
        self.regs.reset();
        self.mem.reset();
        self.labels.reset();
        self.scope_path = vec!["global".to_string()];
        self.reg_frames.clear();
    }

    fn emit(&mut self, instruction: &str) {
        self.out.push_str("  ");
        self.out.push_str(instruction);
        self.out.push('\n');
    }

    fn emit_label(&mut self, label: &str) {
        self.out.push_str(label);
        self.out.push_str(":\n");
    }

    // ----- name resolution ---------------------------------------------

    fn current_fqdn(&self, name: &str) -> String {
        format!("{}::{}", self.scope_path.join("::"), name)
    }

    /// Resolve a short or `ns.`-qualified name to the symbol the
    /// analyzer bound it to, by trying the scope path prefixes
    /// innermost-first.
    fn resolve(&self, name: &str) -> CResult<&'a Symbol> {
        if let Some((ns, member)) = name.split_once('.') {
            return self
                .find_in_namespace(ns, member)
                .ok_or_else(|| err(format!("unresolved name '{name}'")));
        }

        for depth in (1..=self.scope_path.len()).rev() {
            let candidate = format!("{}::{}", self.scope_path[..depth].join("::"), name);
            if let Some(symbol) = self.table.find_by_fqdn(&candidate) {
                return Ok(symbol);
            }
        }
        Err(err(format!("unresolved name '{name}'")))
    }

    fn find_in_namespace(&self, ns: &str, name: &str) -> Option<&'a Symbol> {
        let scope_name = format!("namespace_{ns}");
        self.table
            .all_scopes()
            .filter(|s| s.name == scope_name)
            .find_map(|s| s.symbols.get(name))
    }

    fn is_namespace(&self, name: &str) -> bool {
        self.table.has_scope_named(&format!("namespace_{name}"))
    }

    fn var_address(&self, fqdn: &str) -> CResult<i64> {
        self.mem
            .address(fqdn)
            .ok_or_else(|| err(format!("no memory cell for '{fqdn}'")))
    }

    fn fn_entry_label(fqdn: &str) -> String {
        format!("fn_{}", fqdn.replace("::", "_"))
    }

    // ----- types and sizes ---------------------------------------------

    fn convert_type(&self, ty: &Type) -> CResult<SemType> {
        match ty {
            Type::Basic { kind, .. } => Ok(match kind {
                BasicKind::Int => SemType::Int,
                BasicKind::Char => SemType::Char,
            }),
            Type::Pointer { points_to, .. } => {
                Ok(SemType::pointer(self.convert_type(points_to)?))
            }
            Type::Named { name, .. } => {
                let symbol = self.resolve(name)?;
                if symbol.kind != SymbolKind::Layout {
                    return Err(err(format!("'{name}' is not a layout")));
                }
                Ok(symbol.ty.clone())
            }
        }
    }

    /// Forward layout references carry an empty member list; fetch
    /// the completed layout from the table by FQDN.
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

    /// Cell count of a value of this type. Scalars and pointers are
    /// one cell; layouts are the sum of their members, recursively.
    fn type_size(&self, ty: &SemType) -> i64 {
        match ty {
            SemType::Layout { .. } => {
                let complete = self.complete_layout(ty.clone());
                match complete {
                    SemType::Layout { members, .. } => {
                        members.iter().map(|m| self.type_size(&m.ty)).sum()
                    }
                    _ => 1,
                }
            }
            SemType::Array { elem, size } => self.type_size(elem) * size.max(&0),
            _ => 1,
        }
    }

    /// Static type of an expression, for address arithmetic. Mirrors
    /// the analyzer's inference for the cases codegen needs.
    fn type_of(&self, expr: &Expr) -> CResult<SemType> {
        match expr {
            Expr::IntLiteral { .. } => Ok(SemType::Int),
            Expr::CharLiteral { .. } => Ok(SemType::Char),
            Expr::StringLiteral { .. } => Ok(SemType::pointer(SemType::Char)),
            Expr::Identifier { name, .. } => {
                Ok(self.complete_layout(self.resolve(name)?.ty.clone()))
            }
            Expr::Binary { op, lhs, rhs, .. } => match op {
                BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                    let l = self.type_of(lhs)?;
                    let r = self.type_of(rhs)?;
                    if l == SemType::Int || r == SemType::Int {
                        Ok(SemType::Int)
                    } else {
                        Ok(SemType::Char)
                    }
                }
                BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => self.type_of(lhs),
                _ => Ok(SemType::Int),
            },
            Expr::Unary { op, operand, .. } => match op {
                UnOp::Neg | UnOp::BitNot => self.type_of(operand),
                UnOp::Ref => Ok(SemType::pointer(self.type_of(operand)?)),
                UnOp::Deref => match self.type_of(operand)? {
                    SemType::Pointer(points_to) => Ok(self.complete_layout(*points_to)),
                    _ => Err(err("dereference of non-pointer")),
                },
            },
            Expr::Call { callee, .. } => match &self.resolve(callee)?.ty {
                SemType::Function { ret, .. } => Ok((**ret).clone()),
                _ => Err(err(format!("'{callee}' is not a function"))),
            },
            Expr::ArrayAlloc { elem, .. } => Ok(SemType::pointer(self.convert_type(elem)?)),
            Expr::Index { base, .. } => match self.type_of(base)? {
                SemType::Pointer(points_to) => Ok(self.complete_layout(*points_to)),
                SemType::Array { elem, .. } => Ok(self.complete_layout(*elem)),
                _ => Err(err("array access on non-pointer")),
            },
            Expr::Member {
                object, member, ..
            } => {
                if let Expr::Identifier { name, .. } = object.as_ref() {
                    if self.is_namespace(name) && self.resolve(name).is_err() {
                        let symbol = self
                            .find_in_namespace(name, member)
                            .ok_or_else(|| err(format!("unresolved name '{name}.{member}'")))?;
                        return Ok(self.complete_layout(symbol.ty.clone()));
                    }
                }
                let object_type = match self.type_of(object)? {
                    SemType::Pointer(points_to) => *points_to,
                    other => other,
                };
                let object_type = self.complete_layout(object_type);
                object_type
                    .find_field(member)
                    .map(|f| f.ty.clone())
                    .ok_or_else(|| err(format!("no member '{member}'")))
            }
            Expr::NamespaceAccess {
                namespace, member, ..
            } => match member.as_ref() {
                Expr::Identifier { name, .. } => {
                    let symbol = self
                        .find_in_namespace(namespace, name)
                        .ok_or_else(|| err(format!("unresolved name '{namespace}.{name}'")))?;
                    Ok(self.complete_layout(symbol.ty.clone()))
                }
                other => self.type_of(other),
            },
            Expr::Syscall { .. } => Ok(SemType::Int),
            Expr::Cast { target, .. } => self.convert_type(target),
            Expr::LayoutInit { .. } => Ok(SemType::Error),
        }
    }

    /// Fold a compile-time constant expression. Array reservation is
    /// static, so allocation sizes must fold.
    fn const_eval(expr: &Expr) -> Option<i64> {
        match expr {
            Expr::IntLiteral { text, .. } => text.parse().ok(),
            Expr::CharLiteral { value, .. } => Some(value.bytes().next().unwrap_or(0) as i64),
            Expr::Unary {
                op: UnOp::Neg,
                operand,
                ..
            } => Some(-Self::const_eval(operand)?),
            Expr::Binary { op, lhs, rhs, .. } => {
                let l = Self::const_eval(lhs)?;
                let r = Self::const_eval(rhs)?;
                match op {
                    BinOp::Add => Some(l + r),
                    BinOp::Sub => Some(l - r),
                    BinOp::Mul => Some(l * r),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    // ----- program and statements --------------------------------------

    fn generate_program(&mut self, program: &Program) -> CResult<()> {
        for stmt in &program.statements {
            self.generate_statement(stmt)?;
        }
        self.emit("halt");
        Ok(())
    }

    fn generate_statement(&mut self, stmt: &Stmt) -> CResult<()> {
        match stmt {
            Stmt::VarDecl { ty, name, init, .. } => self.generate_var_decl(ty, name, init),
            Stmt::Assign { target, value, .. } => self.generate_assignment(target, value),
            Stmt::Block(block) => self.generate_block(block),
            Stmt::Expr { expr, .. } => {
                self.generate_expression(expr)?;
                self.emit("pop");
                Ok(())
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => self.generate_if(cond, then_branch, else_branch.as_deref()),
            Stmt::While { cond, body, .. } => self.generate_while(cond, body),
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.generate_expression(value)?;
                }
                self.emit("ret");
                Ok(())
            }
            Stmt::FnDecl {
                name, params, body, ..
            } => self.generate_fn_decl(name, params, body),
            Stmt::LayoutDecl { name, .. } => self.generate_layout_decl(name),
            Stmt::NamespaceDecl {
                name, statements, ..
            } => {
                self.scope_path.push(format!("namespace_{name}"));
                self.mem.push_scope();
                for stmt in statements {
                    self.generate_statement(stmt)?;
                }
                // Namespace variables are globals: keep their cells.
                self.mem.pop_scope_keep();
                self.scope_path.pop();
                Ok(())
            }
            Stmt::Import { .. } => Ok(()),
        }
    }

    fn generate_var_decl(&mut self, ty: &Type, name: &str, init: &Option<Expr>) -> CResult<()> {
        let declared = self.convert_type(ty)?;
        let size = self.type_size(&declared);
        let fqdn = self.current_fqdn(name);
        let address = self.mem.alloc(&fqdn, size);

        match init {
            Some(Expr::LayoutInit { values, .. }) if declared.is_layout() => {
                self.generate_layout_init_into(&declared, values, address)
            }
            Some(expr) => {
                self.generate_expression(expr)?;
                self.store_var(&fqdn, address);
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Store `{ v1, v2, ... }` member by member at a statically known
    /// base address.
    fn generate_layout_init_into(
        &mut self,
        layout: &SemType,
        values: &[Expr],
        base: i64,
    ) -> CResult<()> {
        let complete = self.complete_layout(layout.clone());
        let SemType::Layout { members, .. } = &complete else {
            return Err(err("layout initializer for non-layout"));
        };
        let mut offset = 0;
        for (value, member) in values.iter().zip(members) {
            self.generate_expression(value)?;
            self.emit(&format!("store {}", base + offset));
            offset += self.type_size(&member.ty);
        }
        Ok(())
    }

    fn generate_assignment(&mut self, target: &Expr, value: &Expr) -> CResult<()> {
        if let Expr::Identifier { name, .. } = target {
            let symbol = self.resolve(name)?;
            let fqdn = symbol.fqdn.clone();
            let target_type = self.complete_layout(symbol.ty.clone());
            let address = self.var_address(&fqdn)?;

            if let Expr::LayoutInit { values, .. } = value {
                if target_type.is_layout() {
                    return self.generate_layout_init_into(&target_type, values, address);
                }
            }

            self.generate_expression(value)?;
            self.store_var(&fqdn, address);
            return Ok(());
        }

        // Compound target: value first, then the address, then an
        // indirect store.
        self.generate_expression(value)?;
        self.generate_address(target)?;
        self.emit("stind");
        Ok(())
    }

    fn generate_block(&mut self, block: &Block) -> CResult<()> {
        self.scope_path.push("block".to_string());
        self.mem.push_scope();
        let entry_address = self.mem.next_address();

        for stmt in &block.statements {
            self.generate_statement(stmt)?;
        }

        self.mem.pop_scope();
        debug_assert_eq!(self.mem.next_address(), entry_address);
        self.scope_path.pop();
        Ok(())
    }

    fn generate_if(
        &mut self,
        cond: &Expr,
        then_branch: &Stmt,
        else_branch: Option<&Stmt>,
    ) -> CResult<()> {
        self.generate_expression(cond)?;
        match else_branch {
            Some(else_branch) => {
                let else_label = self.labels.fresh("L");
                let end_label = self.labels.fresh("L");
                self.emit(&format!("jz {else_label}"));
                self.generate_statement(then_branch)?;
                self.emit(&format!("jmp {end_label}"));
                self.emit_label(&else_label);
                self.generate_statement(else_branch)?;
                self.emit_label(&end_label);
            }
            None => {
                let end_label = self.labels.fresh("L");
                self.emit(&format!("jz {end_label}"));
                self.generate_statement(then_branch)?;
                self.emit_label(&end_label);
            }
        }
        Ok(())
    }

    fn generate_while(&mut self, cond: &Expr, body: &Stmt) -> CResult<()> {
        let head_label = self.labels.fresh("L");
        let end_label = self.labels.fresh("L");
        self.emit_label(&head_label);
        self.generate_expression(cond)?;
        self.emit(&format!("jz {end_label}"));
        self.generate_statement(body)?;
        self.emit(&format!("jmp {head_label}"));
        self.emit_label(&end_label);
        Ok(())
    }

    fn generate_fn_decl(&mut self, name: &str, params: &[Param], body: &Block) -> CResult<()> {
        let fqdn = self.current_fqdn(name);
        let entry = Self::fn_entry_label(&fqdn);
        let skip = self.labels.fresh("L");

        // Definitions are emitted inline; control jumps over them.
        self.emit(&format!("jmp {skip}"));
        self.emit_label(&entry);

        self.scope_path.push(format!("function_{name}"));
        self.mem.push_scope();
        self.reg_frames.push(Vec::new());

        // One cell per parameter in declared order.
        let mut cells = Vec::new();
        for param in params {
            let param_type = self.convert_type(&param.ty)?;
            let param_fqdn = self.current_fqdn(&param.name);
            let size = self.type_size(&param_type);
            let address = self.mem.alloc(&param_fqdn, size);
            cells.push((param_fqdn, address));
        }

        // Arguments were pushed left to right, so the last parameter
        // is on top; pop in reverse. A pool register caches the value
        // when one is free, otherwise the move spills through memory.
        for (param_fqdn, address) in cells.iter().rev() {
            match self.regs.allocate(Some(param_fqdn.as_str())) {
                Some(reg) => {
                    self.emit(&format!("rpop {}", RegisterPool::name(reg)));
                    self.emit(&format!("rstore {} {address}", RegisterPool::name(reg)));
                    self.reg_frames
                        .last_mut()
                        .unwrap()
                        .push(RegSlot { reg, addr: *address });
                }
                None => {
                    self.emit(&format!("store {address}"));
                }
            }
        }

        self.generate_block(body)?;

        // Falling off the end still returns a value.
        self.emit("push 0");
        self.emit("ret");

        let frame = self.reg_frames.pop().unwrap();
        for slot in frame {
            self.regs.release(slot.reg);
        }
        self.mem.pop_scope();
        self.scope_path.pop();

        self.emit_label(&skip);
        Ok(())
    }

    fn generate_layout_decl(&mut self, name: &str) -> CResult<()> {
        let symbol = self.resolve(name)?;
        let fqdn = symbol.fqdn.clone();
        let SemType::Layout { members, .. } = symbol.ty.clone() else {
            return Err(err(format!("'{name}' is not a layout")));
        };

        let mut offset = 0;
        for member in &members {
            self.mem.set_layout_offset(&fqdn, &member.name, offset);
            offset += self.type_size(&member.ty);
        }
        Ok(())
    }

    // ----- expressions -------------------------------------------------

    /// Evaluate an expression; its result ends up on top of the
    /// value stack.
    fn generate_expression(&mut self, expr: &Expr) -> CResult<()> {
        match expr {
            Expr::IntLiteral { text, pos } => {
                let value: i64 = text
                    .parse()
                    .map_err(|_| err(format!("integer literal out of range at {pos}")))?;
                self.emit(&format!("push {value}"));
                Ok(())
            }
            Expr::CharLiteral { value, .. } => {
                let code = value.bytes().next().unwrap_or(0);
                self.emit(&format!("push {code}"));
                Ok(())
            }
            Expr::StringLiteral { value, .. } => self.generate_string_literal(value),
            Expr::Identifier { name, .. } => self.generate_identifier_load(name),
            Expr::Binary { op, lhs, rhs, .. } => {
                self.generate_expression(lhs)?;
                self.generate_expression(rhs)?;
                self.emit(binop_instruction(*op));
                Ok(())
            }
            Expr::Unary { op, operand, .. } => match op {
                UnOp::Neg => {
                    self.generate_expression(operand)?;
                    self.emit("neg");
                    Ok(())
                }
                UnOp::BitNot => {
                    self.generate_expression(operand)?;
                    self.emit("not");
                    Ok(())
                }
                UnOp::Deref => {
                    self.generate_expression(operand)?;
                    self.emit("ldind");
                    Ok(())
                }
                UnOp::Ref => self.generate_address(operand),
            },
            Expr::Call { callee, args, .. } => self.generate_call(callee, args),
            Expr::ArrayAlloc {
                elem, size, pos, ..
            } => {
                let elem_type = self.convert_type(elem)?;
                let count = Self::const_eval(size).ok_or_else(|| {
                    err(format!("array allocation size must be constant at {pos}"))
                })?;
                let total = count.max(0) * self.type_size(&elem_type);
                let base = self.mem.alloc_array(total);
                self.emit(&format!("push {base}"));
                Ok(())
            }
            Expr::Index { .. } | Expr::Member { .. } => {
                // Namespace reads resolve to a direct cell; anything
                // else is an address computation plus indirect load.
                if let Expr::Member { object, member, .. } = expr {
                    if let Expr::Identifier { name, .. } = object.as_ref() {
                        if self.is_namespace(name) && self.resolve(name).is_err() {
                            let symbol = self
                                .find_in_namespace(name, member)
                                .ok_or_else(|| err(format!("unresolved name '{name}.{member}'")))?;
                            let fqdn = symbol.fqdn.clone();
                            let address = self.var_address(&fqdn)?;
                            self.emit(&format!("load {address}"));
                            return Ok(());
                        }
                    }
                }
                self.generate_address(expr)?;
                self.emit("ldind");
                Ok(())
            }
            Expr::NamespaceAccess {
                namespace, member, ..
            } => match member.as_ref() {
                Expr::Identifier { name, .. } => {
                    let symbol = self
                        .find_in_namespace(namespace, name)
                        .ok_or_else(|| err(format!("unresolved name '{namespace}.{name}'")))?;
                    let fqdn = symbol.fqdn.clone();
                    let address = self.var_address(&fqdn)?;
                    self.emit(&format!("load {address}"));
                    Ok(())
                }
                Expr::Call { callee, args, .. } => {
                    let qualified = format!("{namespace}.{callee}");
                    self.generate_call(&qualified, args)
                }
                other => self.generate_expression(other),
            },
            Expr::Syscall { args, .. } => {
                for arg in args {
                    self.generate_expression(arg)?;
                }
                self.emit("sys");
                Ok(())
            }
            Expr::Cast { expr, .. } => {
                // Cells are word-sized; narrowing is a compile-time
                // warning, the value itself passes through.
                self.generate_expression(expr)
            }
            Expr::LayoutInit { pos, .. } => Err(err(format!(
                "layout initializer outside declaration or assignment at {pos}"
            ))),
        }
    }

    fn generate_identifier_load(&mut self, name: &str) -> CResult<()> {
        let symbol = self.resolve(name)?;
        let fqdn = symbol.fqdn.clone();
        let address = self.var_address(&fqdn)?;
        // Prefer the cached register when this variable has one.
        match self.regs.lookup(&fqdn) {
            Some(reg) => self.emit(&format!("rpush {}", RegisterPool::name(reg))),
            None => self.emit(&format!("load {address}")),
        }
        Ok(())
    }

    /// Pop the stack top into a variable's cell, refreshing its
    /// cached register if it has one.
    fn store_var(&mut self, fqdn: &str, address: i64) {
        self.emit(&format!("store {address}"));
        if let Some(reg) = self.regs.lookup(fqdn) {
            self.emit(&format!("rload {} {address}", RegisterPool::name(reg)));
        }
    }

    fn generate_call(&mut self, callee: &str, args: &[Expr]) -> CResult<()> {
        let symbol = self.resolve(callee)?;
        if symbol.kind != SymbolKind::Function {
            return Err(err(format!("'{callee}' is not a function")));
        }
        let entry = Self::fn_entry_label(&symbol.fqdn);

        for arg in args {
            self.generate_expression(arg)?;
        }
        self.emit(&format!("call {entry}"));

        // The callee reuses the register bank; restore this
        // function's cached parameters from their cells.
        if let Some(frame) = self.reg_frames.last() {
            for slot in frame.clone() {
                self.emit(&format!(
                    "rload {} {}",
                    RegisterPool::name(slot.reg),
                    slot.addr
                ));
            }
        }
        Ok(())
    }

    /// Lay a string down in reserved cells, one character per cell,
    /// NUL terminated; leave the start address on the stack.
    fn generate_string_literal(&mut self, value: &str) -> CResult<()> {
        let bytes = value.as_bytes();
        let base = self.mem.alloc_array(bytes.len() as i64 + 1);
        for (i, byte) in bytes.iter().enumerate() {
            self.emit(&format!("push {byte}"));
            self.emit(&format!("store {}", base + i as i64));
        }
        self.emit("push 0");
        self.emit(&format!("store {}", base + bytes.len() as i64));
        self.emit(&format!("push {base}"));
        Ok(())
    }

    /// Evaluate an lvalue expression to the *address* it denotes,
    /// left on top of the stack.
    fn generate_address(&mut self, expr: &Expr) -> CResult<()> {
        match expr {
            Expr::Identifier { name, .. } => {
                let symbol = self.resolve(name)?;
                let fqdn = symbol.fqdn.clone();
                let address = self.var_address(&fqdn)?;
                self.emit(&format!("push {address}"));
                Ok(())
            }
            Expr::Member {
                object, member, ..
            } => {
                if let Expr::Identifier { name, .. } = object.as_ref() {
                    if self.is_namespace(name) && self.resolve(name).is_err() {
                        let symbol = self
                            .find_in_namespace(name, member)
                            .ok_or_else(|| err(format!("unresolved name '{name}.{member}'")))?;
                        let fqdn = symbol.fqdn.clone();
                        let address = self.var_address(&fqdn)?;
                        self.emit(&format!("push {address}"));
                        return Ok(());
                    }
                }

                let object_type = self.type_of(object)?;
                match object_type {
                    // Pointer to layout: the pointer's value is the
                    // base address (auto-dereference).
                    SemType::Pointer(points_to) => {
                        let layout = self.complete_layout(*points_to);
                        let SemType::Layout { fqdn, .. } = &layout else {
                            return Err(err("member access on non-layout"));
                        };
                        let offset = self
                            .mem
                            .layout_offset(fqdn, member)
                            .ok_or_else(|| err(format!("no member '{member}' in '{fqdn}'")))?;
                        self.generate_expression(object)?;
                        self.emit(&format!("push {offset}"));
                        self.emit("add");
                        Ok(())
                    }
                    SemType::Layout { .. } => {
                        let layout = self.complete_layout(object_type);
                        let SemType::Layout { fqdn, .. } = &layout else {
                            return Err(err("member access on non-layout"));
                        };
                        let offset = self
                            .mem
                            .layout_offset(fqdn, member)
                            .ok_or_else(|| err(format!("no member '{member}' in '{fqdn}'")))?;
                        self.generate_address(object)?;
                        self.emit(&format!("push {offset}"));
                        self.emit("add");
                        Ok(())
                    }
                    _ => Err(err("member access on non-layout")),
                }
            }
            Expr::Index { base, index, .. } => {
                let elem_type = match self.type_of(base)? {
                    SemType::Pointer(points_to) => self.complete_layout(*points_to),
                    SemType::Array { elem, .. } => self.complete_layout(*elem),
                    _ => return Err(err("array access on non-pointer")),
                };
                let elem_size = self.type_size(&elem_type);

                // base + index * sizeof(elem)
                self.generate_expression(base)?;
                self.generate_expression(index)?;
                if elem_size != 1 {
                    self.emit(&format!("push {elem_size}"));
                    self.emit("mul");
                }
                self.emit("add");
                Ok(())
            }
            Expr::Unary {
                op: UnOp::Deref,
                operand,
                ..
            } => {
                // The pointer's value is the address.
                self.generate_expression(operand)
            }
            other => Err(err(format!(
                "expression at {} is not addressable",
                other.pos()
            ))),
        }
    }
}

fn binop_instruction(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Mod => "mod",
        // Logical and bitwise positions both lower to the bitwise
        // instructions; there is no short-circuit.
        BinOp::BitAnd => "and",
        BinOp::BitOr => "or",
        BinOp::BitXor => "xor",
        BinOp::Eq => "eq",
        BinOp::Ne => "ne",
        BinOp::Lt => "lt",
        BinOp::Gt => "gt",
        BinOp::Le => "le",
        BinOp::Ge => "ge",
    }
}
