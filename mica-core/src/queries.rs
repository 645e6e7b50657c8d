//! Editor query surface.
//!
//! Pure functions over a fresh compilation: where is this symbol
//! declared, where does this identifier appear, what is it. Transport
//! (JSON-RPC framing, document stores) is an external collaborator's
//! concern; these take source text and positions and return plain
//! values.

use crate::compiler::{check_source, CheckedSource};
use crate::diagnostic::Diagnostic;
use crate::lexer::{Token, TokenKind};
use crate::symbols::SymbolKind;

/// A resolved source location; `length` is the identifier's width in
/// characters for range highlighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub length: u32,
}

fn token_at(tokens: &[Token], line: u32, column: u32) -> Option<&Token> {
    tokens.iter().find(|t| {
        t.line == line && t.column <= column && column < t.column + t.text.len() as u32
    })
}

fn location_of(token: &Token) -> Location {
    Location {
        file: token.file.clone(),
        line: token.line,
        column: token.column,
        length: token.text.len() as u32,
    }
}

/// The declaration site of the symbol whose token spans the position.
pub fn definition_of(source: &str, entry_file: &str, line: u32, column: u32) -> Vec<Location> {
    let checked = check_source(source, entry_file);
    let Some(target) = token_at(&checked.tokens, line, column) else {
        return Vec::new();
    };
    if target.kind != TokenKind::Ident {
        return Vec::new();
    }

    for scope in checked.table.all_scopes() {
        if let Some(symbol) = scope.symbols.get(&target.text) {
            // The declaring token carries the origin file.
            let file = checked
                .tokens
                .iter()
                .find(|t| t.line == symbol.pos.line && t.column == symbol.pos.column)
                .map(|t| t.file.clone())
                .unwrap_or_else(|| entry_file.to_string());
            return vec![Location {
                file,
                line: symbol.pos.line,
                column: symbol.pos.column,
                length: symbol.name.len() as u32,
            }];
        }
    }
    Vec::new()
}

/// Every token span whose identifier text matches the one at the
/// position.
pub fn references_to(source: &str, entry_file: &str, line: u32, column: u32) -> Vec<Location> {
    let checked = check_source(source, entry_file);
    let Some(target) = token_at(&checked.tokens, line, column) else {
        return Vec::new();
    };
    if target.kind != TokenKind::Ident {
        return Vec::new();
    }
    let name = target.text.clone();

    checked
        .tokens
        .iter()
        .filter(|t| t.kind == TokenKind::Ident && t.text == name)
        .map(location_of)
        .collect()
}

/// Kind, type and declaring scope of the symbol at the position.
pub fn hover(source: &str, entry_file: &str, line: u32, column: u32) -> Option<String> {
    let checked = check_source(source, entry_file);
    let target = token_at(&checked.tokens, line, column)?;
    if target.kind != TokenKind::Ident {
        return None;
    }

    let (scope_name, symbol) = checked
        .table
        .all_scopes()
        .find_map(|s| s.symbols.get(&target.text).map(|sym| (s.name.clone(), sym)))?;

    let mut text = format!("**{}**\n\n", symbol.name);
    text.push_str(match symbol.kind {
        SymbolKind::Variable => "Variable",
        SymbolKind::Function => "Function",
        SymbolKind::Parameter => "Parameter",
        SymbolKind::Layout => "Layout",
    });
    text.push_str(&format!("\n\nType: `{}`", symbol.ty));
    text.push_str(&format!("\n\nDefined in scope: `{scope_name}`"));
    Some(text)
}

/// All diagnostics for a buffer, parse and semantic combined.
pub fn diagnostics(source: &str, entry_file: &str) -> Vec<Diagnostic> {
    let CheckedSource { diagnostics, .. } = check_source(source, entry_file);
    diagnostics
}
