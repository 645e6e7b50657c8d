//! Recursive-descent parser for Mica.
//!
//! Expressions use precedence climbing; statement dispatch follows
//! the token lookahead rules of the language (`~` and `->` double as
//! type and expression operators and are disambiguated here, not in
//! the lexer). Parse failures inside a statement become diagnostics
//! and the parser resynchronizes at semicolon/brace boundaries, so a
//! broken input still yields a partial AST for analysis.

use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexer::{Token, TokenKind};
use crate::span::Pos;

/// Recovery stops producing diagnostics past this many; pathological
/// inputs otherwise drown the real ones.
const MAX_DIAGNOSTICS: usize = 100;

#[derive(Debug)]
pub struct ParseResult {
    /// The program built from everything that parsed. Statements that
    /// failed are skipped, not represented.
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
struct ParseError {
    message: String,
    pos: Pos,
    file: String,
}

type PResult<T> = Result<T, ParseError>;

pub fn parse(tokens: Vec<Token>) -> ParseResult {
    let mut parser = Parser {
        tokens,
        pos: 0,
        diagnostics: Vec::new(),
    };
    let program = parser.parse_program();
    ParseResult {
        program,
        diagnostics: parser.diagnostics,
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

impl Parser {
    fn current(&self) -> &Token {
        // The lexer always terminates the stream with Eof.
        let last = self.tokens.len().saturating_sub(1);
        &self.tokens[self.pos.min(last)]
    }

    fn kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        !self.is_at_end() && self.current().kind == kind
    }

    fn match_kind(&mut self, kind: TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn prev(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> PResult<()> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(message))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        let tok = self.current();
        ParseError {
            message: message.into(),
            pos: tok.pos(),
            file: tok.file.clone(),
        }
    }

    fn report(&mut self, error: ParseError) {
        if self.diagnostics.len() < MAX_DIAGNOSTICS {
            self.diagnostics
                .push(Diagnostic::error(error.message, error.pos).with_file(error.file));
        }
    }

    // ----- types -------------------------------------------------------

    fn parse_type(&mut self) -> PResult<Type> {
        let start = self.current().pos();

        if self.match_kind(TokenKind::Arrow) {
            let points_to = self.parse_type().map_err(|e| ParseError {
                message: format!("Invalid pointer type: {}", e.message),
                ..e
            })?;
            return Ok(Type::Pointer {
                points_to: Box::new(points_to),
                pos: start,
            });
        }

        if self.match_kind(TokenKind::Int) {
            return Ok(Type::Basic {
                kind: BasicKind::Int,
                pos: start,
            });
        }
        if self.match_kind(TokenKind::Char) {
            return Ok(Type::Basic {
                kind: BasicKind::Char,
                pos: start,
            });
        }

        if self.check(TokenKind::Ident) {
            let mut name = self.current().text.clone();
            self.advance();

            // Namespace qualification: ns.Name
            if self.check(TokenKind::Dot) {
                self.advance();
                if !self.check(TokenKind::Ident) {
                    return Err(self.error_here(format!(
                        "Expected type name after namespace in '{name}.'"
                    )));
                }
                name = format!("{name}.{}", self.current().text);
                self.advance();
            }

            return Ok(Type::Named { name, pos: start });
        }

        if self.check(TokenKind::Str) {
            return Err(self.error_here(
                "String literals cannot be used as types. Use 'char' for character \
                 type or '->char' for string pointer",
            ));
        }
        if self.check(TokenKind::Integer) {
            return Err(self.error_here(
                "Integer literals cannot be used as types. Use 'int' for integer type",
            ));
        }

        if self.pos >= 1 && self.prev().kind == TokenKind::Lt {
            Err(self.error_here(
                "Expected type after '<' in type cast. Valid types are: int, char, \
                 layout name, or pointer type (->)",
            ))
        } else {
            Err(self.error_here(
                "Expected type (int, char, layout name, or pointer type starting with '->')",
            ))
        }
    }

    // ----- expressions -------------------------------------------------
    //
    // One function per precedence level, low to high, all
    // left-associative. `|` and `&` appear twice on purpose: the
    // grammar reuses the tokens for logical and bitwise positions.

    fn parse_expression(&mut self) -> PResult<Expr> {
        self.parse_logical_or()
    }

    fn binary_level(
        &mut self,
        ops: &[(TokenKind, BinOp)],
        next: fn(&mut Parser) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let mut expr = next(self)?;
        'outer: loop {
            for (kind, op) in ops {
                if self.check(*kind) {
                    let pos = self.current().pos();
                    self.advance();
                    let rhs = next(self)?;
                    expr = Expr::Binary {
                        op: *op,
                        lhs: Box::new(expr),
                        rhs: Box::new(rhs),
                        pos,
                    };
                    continue 'outer;
                }
            }
            break;
        }
        Ok(expr)
    }

    fn parse_logical_or(&mut self) -> PResult<Expr> {
        self.binary_level(&[(TokenKind::Pipe, BinOp::BitOr)], Parser::parse_logical_and)
    }

    fn parse_logical_and(&mut self) -> PResult<Expr> {
        self.binary_level(&[(TokenKind::Amp, BinOp::BitAnd)], Parser::parse_equality)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[(TokenKind::Eq, BinOp::Eq), (TokenKind::Ne, BinOp::Ne)],
            Parser::parse_comparison,
        )
    }

    fn parse_comparison(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::Gt, BinOp::Gt),
                (TokenKind::Ge, BinOp::Ge),
                (TokenKind::Lt, BinOp::Lt),
                (TokenKind::Le, BinOp::Le),
            ],
            Parser::parse_bitwise_or,
        )
    }

    fn parse_bitwise_or(&mut self) -> PResult<Expr> {
        self.binary_level(&[(TokenKind::Pipe, BinOp::BitOr)], Parser::parse_bitwise_xor)
    }

    fn parse_bitwise_xor(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[(TokenKind::Caret, BinOp::BitXor)],
            Parser::parse_bitwise_and,
        )
    }

    fn parse_bitwise_and(&mut self) -> PResult<Expr> {
        self.binary_level(&[(TokenKind::Amp, BinOp::BitAnd)], Parser::parse_term)
    }

    fn parse_term(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
            Parser::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::Percent, BinOp::Mod),
            ],
            Parser::parse_unary,
        )
    }

    /// Is this token kind one that can begin a type?
    fn is_type_token(kind: TokenKind) -> bool {
        matches!(
            kind,
            TokenKind::Int | TokenKind::Char | TokenKind::Ident | TokenKind::Arrow
        )
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        // `~` is bitwise NOT unless a type token follows, in which
        // case it begins `~Type[size]` array allocation.
        if self.check(TokenKind::Tilde) {
            if let Some(next) = self.kind_at(1) {
                if Self::is_type_token(next) {
                    return self.parse_primary();
                }
            }
            let pos = self.current().pos();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::BitNot,
                operand: Box::new(operand),
                pos,
            });
        }

        // `->` is the reference operator unless a type follows; a
        // pointer type is only legal in type context (declarations and
        // casts), so seeing one mid-expression is either a cast body
        // or a mistake worth a pointed message.
        if self.check(TokenKind::Arrow) {
            if let Some(next) = self.kind_at(1) {
                let looks_like_type = match next {
                    TokenKind::Int | TokenKind::Char => true,
                    TokenKind::Ident => self.kind_at(2) != Some(TokenKind::LParen),
                    _ => false,
                };
                if looks_like_type {
                    let in_cast = self.pos >= 1 && self.prev().kind == TokenKind::Lt;
                    if in_cast {
                        return self.parse_primary();
                    }
                    return Err(self.error_here(
                        "Unexpected pointer type in expression context. Did you mean \
                         to use this in a variable declaration?",
                    ));
                }
            }
            let pos = self.current().pos();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op: UnOp::Ref,
                operand: Box::new(operand),
                pos,
            });
        }

        if self.check(TokenKind::Minus) || self.check(TokenKind::BackArrow) {
            let op = if self.current().kind == TokenKind::Minus {
                UnOp::Neg
            } else {
                UnOp::Deref
            };
            let pos = self.current().pos();
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                pos,
            });
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let tok = self.current().clone();
        let tok_pos = tok.pos();
        let mut expr = match tok.kind {
            TokenKind::Integer => {
                self.advance();
                Expr::IntLiteral {
                    text: tok.text,
                    pos: tok_pos,
                }
            }
            TokenKind::Character => {
                self.advance();
                Expr::CharLiteral {
                    value: tok.text,
                    pos: tok_pos,
                }
            }
            TokenKind::Str => {
                self.advance();
                Expr::StringLiteral {
                    value: tok.text,
                    pos: tok_pos,
                }
            }
            TokenKind::Lt => {
                self.advance();
                self.parse_type_cast(tok_pos)?
            }
            TokenKind::Tilde => {
                self.advance();
                self.parse_array_allocation(tok_pos)?
            }
            TokenKind::Syscall => {
                self.advance();
                self.parse_syscall(tok_pos)?
            }
            TokenKind::LBrace => self.parse_layout_initialization()?,
            TokenKind::Ident => {
                self.advance();
                Expr::Identifier {
                    name: tok.text,
                    pos: tok_pos,
                }
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(TokenKind::RParen, "Expected ')' after expression")?;
                inner
            }
            _ => return Err(self.error_here("Expected expression")),
        };

        // Postfix operations: calls, indexing, member access.
        loop {
            if self.check(TokenKind::LParen) {
                let pos = self.current().pos();
                let callee = expr.callee_name().ok_or_else(|| ParseError {
                    message: "Expected function name before '('".to_string(),
                    pos,
                    file: self.current().file.clone(),
                })?;
                self.advance();
                let args = self.parse_argument_list()?;
                self.consume(TokenKind::RParen, "Expected ')' after function arguments")?;
                expr = Expr::Call { callee, args, pos };
            } else if self.check(TokenKind::LBracket) {
                let pos = self.current().pos();
                self.advance();
                let index = self.parse_expression()?;
                self.consume(TokenKind::RBracket, "Expected ']' after array index")?;
                expr = Expr::Index {
                    base: Box::new(expr),
                    index: Box::new(index),
                    pos,
                };
            } else if self.check(TokenKind::Dot) {
                self.advance();
                if !self.check(TokenKind::Ident) {
                    return Err(self.error_here("Expected member name after '.'"));
                }
                let member_tok = self.current().clone();
                let member_pos = member_tok.pos();
                self.advance();
                expr = Expr::Member {
                    object: Box::new(expr),
                    member: member_tok.text,
                    pos: member_pos,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_type_cast(&mut self, start: Pos) -> PResult<Expr> {
        let result: PResult<Expr> = (|| {
            let target = self.parse_type()?;
            self.consume(TokenKind::Gt, "Expected '>' after type in type cast")?;
            self.consume(TokenKind::LParen, "Expected '(' after type cast")?;
            let inner = self.parse_expression()?;
            self.consume(TokenKind::RParen, "Expected ')' after cast expression")?;
            Ok(Expr::Cast {
                target,
                expr: Box::new(inner),
                pos: start,
            })
        })();
        result.map_err(|e| ParseError {
            message: format!("Type cast error: {}", e.message),
            pos: start,
            file: e.file,
        })
    }

    /// The `~` has already been consumed.
    fn parse_array_allocation(&mut self, start: Pos) -> PResult<Expr> {
        let elem = self.parse_type()?;
        self.consume(
            TokenKind::LBracket,
            "Expected '[' after array type in ~Type[size] allocation",
        )?;
        let size = self.parse_expression()?;
        self.consume(
            TokenKind::RBracket,
            "Expected ']' after array size in ~Type[size] allocation",
        )?;
        Ok(Expr::ArrayAlloc {
            elem,
            size: Box::new(size),
            pos: start,
        })
    }

    fn parse_syscall(&mut self, start: Pos) -> PResult<Expr> {
        self.consume(TokenKind::LParen, "Expected '(' after 'syscall'")?;
        let args = self.parse_argument_list()?;
        self.consume(TokenKind::RParen, "Expected ')' after syscall arguments")?;
        Ok(Expr::Syscall { args, pos: start })
    }

    fn parse_layout_initialization(&mut self) -> PResult<Expr> {
        let start = self.current().pos();
        self.consume(TokenKind::LBrace, "Expected '{' for layout initialization")?;

        let mut values = Vec::new();
        if !self.check(TokenKind::RBrace) {
            values.push(self.parse_expression()?);
            while self.match_kind(TokenKind::Comma) {
                values.push(self.parse_expression()?);
            }
        }
        self.consume(TokenKind::RBrace, "Expected '}' after layout initialization")?;
        Ok(Expr::LayoutInit { values, pos: start })
    }

    fn parse_argument_list(&mut self) -> PResult<Vec<Expr>> {
        let mut args = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(args);
        }
        args.push(self.parse_expression()?);
        while self.match_kind(TokenKind::Comma) {
            args.push(self.parse_expression()?);
        }
        Ok(args)
    }

    // ----- statements --------------------------------------------------

    fn parse_statement(&mut self) -> PResult<Stmt> {
        let tok = self.current();
        match tok.kind {
            TokenKind::Import => {
                let pos = tok.pos();
                self.advance();
                self.parse_import(pos)
            }
            TokenKind::Namespace => self.parse_namespace_declaration(),
            TokenKind::Fn => self.parse_function_declaration(),
            TokenKind::Layout => self.parse_layout_declaration(),
            TokenKind::Int | TokenKind::Char | TokenKind::Arrow => {
                self.parse_variable_declaration()
            }
            // `Name x ...` is a layout-typed variable declaration.
            TokenKind::Ident if self.kind_at(1) == Some(TokenKind::Ident) => {
                self.parse_variable_declaration()
            }
            TokenKind::If => self.parse_if_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Ret => self.parse_return_statement(),
            TokenKind::LBrace => Ok(Stmt::Block(self.parse_block()?)),
            _ => self.parse_assignment_or_expression(),
        }
    }

    /// Speculate an expression; `=` afterwards makes it an assignment.
    fn parse_assignment_or_expression(&mut self) -> PResult<Stmt> {
        let saved = self.pos;
        match self.parse_expression() {
            Ok(expr) => {
                if self.match_kind(TokenKind::Assign) {
                    let value = self.parse_expression()?;
                    self.consume(TokenKind::Semicolon, "Expected ';' after assignment")?;
                    let pos = expr.pos();
                    Ok(Stmt::Assign {
                        target: expr,
                        value,
                        pos,
                    })
                } else {
                    self.consume(TokenKind::Semicolon, "Expected ';' after expression")?;
                    let pos = expr.pos();
                    Ok(Stmt::Expr { expr, pos })
                }
            }
            Err(_) => {
                self.pos = saved;
                if self.check(TokenKind::Arrow) {
                    if let Some(next) = self.kind_at(1) {
                        if Self::is_type_token(next) {
                            return Err(self.error_here(
                                "Unexpected pointer type. Did you forget to declare this \
                                 as a variable? (e.g., missing type before identifier)",
                            ));
                        }
                    }
                }
                Err(self.error_here("Expected statement"))
            }
        }
    }

    fn parse_variable_declaration(&mut self) -> PResult<Stmt> {
        let start = self.current().pos();
        let ty = self.parse_type()?;

        if !self.check(TokenKind::Ident) {
            return Err(self.error_here("Expected identifier in variable declaration"));
        }
        let name = self.current().text.clone();
        self.advance();

        let init = if self.match_kind(TokenKind::Assign) {
            Some(self.parse_expression().map_err(|e| ParseError {
                message: format!("Error in variable initialization: {}", e.message),
                ..e
            })?)
        } else {
            None
        };

        self.consume(
            TokenKind::Semicolon,
            "Expected ';' after variable declaration",
        )?;
        Ok(Stmt::VarDecl {
            ty,
            name,
            init,
            pos: start,
        })
    }

    fn parse_if_statement(&mut self) -> PResult<Stmt> {
        let start = self.current().pos();
        self.consume(TokenKind::If, "Expected 'if'")?;
        self.consume(TokenKind::LParen, "Expected '(' after 'if'")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after if condition")?;

        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.match_kind(TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
            pos: start,
        })
    }

    fn parse_while_statement(&mut self) -> PResult<Stmt> {
        let start = self.current().pos();
        self.consume(TokenKind::While, "Expected 'while'")?;
        self.consume(TokenKind::LParen, "Expected '(' after 'while'")?;
        let cond = self.parse_expression()?;
        self.consume(TokenKind::RParen, "Expected ')' after while condition")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::While {
            cond,
            body,
            pos: start,
        })
    }

    fn parse_return_statement(&mut self) -> PResult<Stmt> {
        let start = self.current().pos();
        self.consume(TokenKind::Ret, "Expected 'ret'")?;
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expected ';' after return statement")?;
        Ok(Stmt::Return { value, pos: start })
    }

    fn parse_block(&mut self) -> PResult<Block> {
        let start = self.current().pos();
        self.consume(TokenKind::LBrace, "Expected '{'")?;

        let mut statements = Vec::new();
        let mut brace_level = 1i32;

        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(error) => {
                    self.report(error);
                    self.synchronize(&mut brace_level, 1);
                    if brace_level == 0 {
                        break;
                    }
                }
            }
        }

        self.consume(TokenKind::RBrace, "Expected '}' after block")?;
        Ok(Block {
            statements,
            pos: start,
        })
    }

    fn parse_function_declaration(&mut self) -> PResult<Stmt> {
        let start = self.current().pos();
        self.consume(TokenKind::Fn, "Expected 'fn'")?;
        let return_type = self.parse_type()?;

        if !self.check(TokenKind::Ident) {
            return Err(self.error_here("Expected function name"));
        }
        let name = self.current().text.clone();
        self.advance();

        self.consume(TokenKind::LParen, "Expected '(' after function name")?;
        let params = self.parse_parameter_list()?;
        self.consume(TokenKind::RParen, "Expected ')' after parameters")?;

        let body = self.parse_block()?;
        self.consume(TokenKind::Semicolon, "Expected ';' after function definition")?;

        Ok(Stmt::FnDecl {
            return_type,
            name,
            params,
            body,
            pos: start,
        })
    }

    fn parse_parameter_list(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        if self.check(TokenKind::RParen) {
            return Ok(params);
        }
        params.push(self.parse_parameter()?);
        while self.match_kind(TokenKind::Comma) {
            params.push(self.parse_parameter()?);
        }
        Ok(params)
    }

    fn parse_parameter(&mut self) -> PResult<Param> {
        let start = self.current().pos();
        let ty = self.parse_type()?;
        if !self.check(TokenKind::Ident) {
            return Err(self.error_here("Expected parameter name"));
        }
        let name = self.current().text.clone();
        self.advance();
        Ok(Param {
            ty,
            name,
            pos: start,
        })
    }

    fn parse_layout_declaration(&mut self) -> PResult<Stmt> {
        let start = self.current().pos();
        self.consume(TokenKind::Layout, "Expected 'layout'")?;

        if !self.check(TokenKind::Ident) {
            return Err(self.error_here("Expected layout name"));
        }
        let name = self.current().text.clone();
        self.advance();

        self.consume(TokenKind::LBrace, "Expected '{' after layout name")?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            members.push(self.parse_layout_member()?);
        }
        self.consume(TokenKind::RBrace, "Expected '}' after layout members")?;
        self.consume(TokenKind::Semicolon, "Expected ';' after layout declaration")?;

        Ok(Stmt::LayoutDecl {
            name,
            members,
            pos: start,
        })
    }

    fn parse_layout_member(&mut self) -> PResult<LayoutMember> {
        let start = self.current().pos();
        let ty = self.parse_type()?;
        if !self.check(TokenKind::Ident) {
            return Err(self.error_here("Expected member name"));
        }
        let name = self.current().text.clone();
        self.advance();
        self.consume(TokenKind::Semicolon, "Expected ';' after layout member")?;
        Ok(LayoutMember {
            ty,
            name,
            pos: start,
        })
    }

    fn parse_namespace_declaration(&mut self) -> PResult<Stmt> {
        let start = self.current().pos();
        self.consume(TokenKind::Namespace, "Expected 'namespace' keyword")?;

        if !self.check(TokenKind::Ident) {
            return Err(self.error_here("Expected namespace name"));
        }
        let name = self.current().text.clone();
        self.advance();

        self.consume(TokenKind::LBrace, "Expected '{' after namespace name")?;
        let mut statements = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        self.consume(TokenKind::RBrace, "Expected '}' after namespace body")?;
        self.consume(
            TokenKind::Semicolon,
            "Expected ';' after namespace declaration",
        )?;

        Ok(Stmt::NamespaceDecl {
            name,
            statements,
            pos: start,
        })
    }

    /// The `import` keyword has already been consumed.
    fn parse_import(&mut self, start: Pos) -> PResult<Stmt> {
        if !self.check(TokenKind::Str) {
            return Err(self.error_here("Expected string literal for import path"));
        }
        let path = self.current().text.clone();
        self.advance();
        self.consume(TokenKind::Semicolon, "Expected ';' after import statement")?;
        Ok(Stmt::Import { path, pos: start })
    }

    // ----- top level and recovery --------------------------------------

    fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        let mut brace_level = 0i32;

        while !self.is_at_end() {
            match self.parse_statement() {
                Ok(stmt) => statements.push(stmt),
                Err(error) => {
                    self.report(error);
                    if self.diagnostics.len() >= MAX_DIAGNOSTICS {
                        break;
                    }
                    self.synchronize(&mut brace_level, 0);
                    if brace_level < 0 {
                        brace_level = 0;
                    }
                }
            }
        }

        Program { statements }
    }

    /// Skip tokens until a statement boundary at `base_level` brace
    /// depth or the matching closing brace. Always makes progress:
    /// getting stuck here would loop forever on pathological input.
    fn synchronize(&mut self, brace_level: &mut i32, base_level: i32) {
        let error_position = self.pos;

        while !self.is_at_end() {
            match self.current().kind {
                TokenKind::LBrace => {
                    *brace_level += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    *brace_level -= 1;
                    if base_level > 0 && *brace_level == 0 {
                        break;
                    }
                    self.advance();
                    if base_level == 0 && *brace_level <= 0 {
                        *brace_level = 0;
                        break;
                    }
                }
                TokenKind::Semicolon
                | TokenKind::Fn
                | TokenKind::Int
                | TokenKind::Char
                | TokenKind::Arrow
                | TokenKind::Layout
                    if *brace_level == base_level =>
                {
                    break;
                }
                _ => self.advance(),
            }
        }

        if *brace_level == base_level && self.check(TokenKind::Semicolon) {
            self.advance();
        }

        if self.pos == error_position && !self.is_at_end() {
            self.advance();
        }
    }
}
