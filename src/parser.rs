//! Recursive-descent parser with precedence-climbing expressions
//! (`spec.md` §4.2), plus the `import` sub-parser that pushes/pops lexer
//! state.
//!
//! Grounded on the teacher's `Parser` shape
//! (`examples/navicore-cem3/crates/compiler/src/parser.rs`: a flat token
//! vector plus cursor, `check`/`consume`/`advance` helpers) and its
//! `Resolver` for include handling
//! (`examples/navicore-cem3/crates/compiler/src/resolver.rs`: a
//! loaded-module set that makes re-parsing a no-op and defuses cycles by
//! marking a module loaded before parsing it).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::ast::{BinOp, CallArg, Expr, Func, FuncArg, Program, Stmt};
use crate::diagnostics::{Diagnostics, Stage};
use crate::token::{Keyword, Token, TokenKind};

/// Resolves `import mod` to source text. Reading files from disk is an
/// external collaborator per `spec.md` §1, so this is injectable — tests
/// use an in-memory loader, `FsModuleLoader` is the real one used by the
/// CLI.
pub trait ModuleLoader {
    fn load(&self, module: &str) -> Result<String, String>;
}

/// Resolves `m.qnt` first in the source file's directory, then in the
/// current working directory, then in any extra configured search
/// directories (`spec.md` §6; `extra` supplements with
/// `CompilerConfig::import_search_path`).
pub struct FsModuleLoader {
    pub root: PathBuf,
    pub cwd: PathBuf,
    pub extra: Vec<PathBuf>,
}

impl ModuleLoader for FsModuleLoader {
    fn load(&self, module: &str) -> Result<String, String> {
        let filename = format!("{module}.qnt");
        for dir in std::iter::once(&self.root).chain(std::iter::once(&self.cwd)).chain(self.extra.iter()) {
            let candidate = dir.join(&filename);
            if candidate.is_file() {
                return std::fs::read_to_string(&candidate)
                    .map_err(|e| format!("cannot open import module '{filename}': {e}"));
            }
        }
        Err(format!(
            "cannot open import module '{filename}' in {} or {}",
            self.root.display(),
            self.cwd.display()
        ))
    }
}

/// A loader that never resolves anything; used when a compile has no
/// imports and no `ModuleLoader` was supplied.
pub struct NoImports;
impl ModuleLoader for NoImports {
    fn load(&self, module: &str) -> Result<String, String> {
        Err(format!("imports are not supported in this context: '{module}'"))
    }
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    diags: &'a mut Diagnostics,
    loader: &'a dyn ModuleLoader,
    loaded_modules: HashSet<String>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, diags: &'a mut Diagnostics, loader: &'a dyn ModuleLoader) -> Self {
        Parser {
            tokens,
            pos: 0,
            diags,
            loader,
            loaded_modules: HashSet::new(),
        }
    }

    // --- token cursor helpers ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[idx]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if !self.is_at_end() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn check_kw(&self, kw: Keyword) -> bool {
        self.peek().kind == TokenKind::Keyword(kw)
    }

    fn is_type_keyword(&self, tok: &Token) -> bool {
        matches!(
            tok.kind,
            TokenKind::TypeName(_)
                | TokenKind::Keyword(Keyword::Bool)
                | TokenKind::Keyword(Keyword::Char)
                | TokenKind::Keyword(Keyword::StringType)
                | TokenKind::Keyword(Keyword::Void)
        )
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Option<()> {
        if self.consume(kind) {
            Some(())
        } else {
            let line = self.peek().line;
            self.error(line, format!("expected {what}, found '{}'", self.peek().lexeme));
            None
        }
    }

    fn expect_ident(&mut self, what: &str) -> Option<String> {
        if let TokenKind::Ident(name) = self.peek().kind.clone() {
            self.advance();
            Some(name)
        } else {
            let line = self.peek().line;
            self.error(line, format!("expected {what}, found '{}'", self.peek().lexeme));
            None
        }
    }

    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.diags.error(Stage::Parser, Some(line), message);
    }

    /// Advance tokens until a `;` (consumed), a newline boundary past the
    /// error line, or a token that begins a new statement (`spec.md`
    /// §4.2).
    fn synchronize(&mut self) {
        let error_line = self.tokens[self.pos.saturating_sub(1).min(self.tokens.len() - 1)].line;
        while !self.is_at_end() {
            if self.check(&TokenKind::Semicolon) {
                self.advance();
                return;
            }
            if self.peek().line > error_line {
                return;
            }
            if self.starts_statement() {
                return;
            }
            self.advance();
        }
    }

    fn starts_statement(&self) -> bool {
        let tok = self.peek();
        self.is_type_keyword(tok)
            || tok.kind == TokenKind::Keyword(Keyword::Var)
            || tok.kind == TokenKind::Keyword(Keyword::Print)
            || tok.kind == TokenKind::Keyword(Keyword::If)
            || tok.kind == TokenKind::Keyword(Keyword::Return)
            || tok.kind == TokenKind::Keyword(Keyword::Loop)
    }

    // --- top level ---

    pub fn parse_program(&mut self) -> Program {
        let mut funcs = Vec::new();
        let mut top_level: Vec<Stmt> = Vec::new();
        let mut saw_explicit_main = false;

        while !self.is_at_end() {
            if self.check_kw(Keyword::Import) {
                let imported = self.parse_import();
                for f in imported {
                    if f.name == "main" {
                        saw_explicit_main = true;
                    }
                    funcs.push(f);
                }
                continue;
            }

            if self.looks_like_func_def() {
                if let Some(f) = self.parse_func_def() {
                    if f.name == "main" {
                        saw_explicit_main = true;
                    }
                    funcs.push(f);
                }
                continue;
            }

            match self.parse_statement() {
                Some(stmt) => top_level.push(stmt),
                None => self.synchronize(),
            }
        }

        if !top_level.is_empty() {
            if saw_explicit_main {
                self.error(
                    0,
                    "mixing an explicit 'main' function with top-level statements is a compile error",
                );
            } else {
                funcs.push(Func {
                    return_type_name: "void".to_string(),
                    name: "main".to_string(),
                    params: Vec::new(),
                    body: top_level,
                    line: 1,
                });
            }
        }

        Program { funcs }
    }

    /// Lookahead for "type-keyword identifier (" without consuming.
    fn looks_like_func_def(&self) -> bool {
        self.is_type_keyword(self.peek())
            && matches!(self.peek_at(1).kind, TokenKind::Ident(_))
            && self.peek_at(2).kind == TokenKind::LParen
    }

    fn parse_func_def(&mut self) -> Option<Func> {
        let line = self.peek().line;
        let return_type_name = self.advance().lexeme;
        let name = self.expect_ident("function name")?;
        self.expect(&TokenKind::LParen, "'('")?;

        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                if !self.is_type_keyword(self.peek()) {
                    let l = self.peek().line;
                    self.error(l, "expected parameter type");
                    break;
                }
                let type_name = self.advance().lexeme;
                let pname = self.expect_ident("parameter name")?;
                let default = if self.consume(&TokenKind::Assign) {
                    Some(self.parse_expression()?)
                } else {
                    None
                };
                params.push(FuncArg {
                    type_name,
                    name: pname,
                    default,
                });
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        let body = self.parse_block()?;
        Some(Func {
            return_type_name,
            name,
            params,
            body,
            line,
        })
    }

    /// `import mod`, `import mod.name`, `import mod.all`.
    fn parse_import(&mut self) -> Vec<Func> {
        self.advance(); // 'import'
        let Some(module) = self.expect_ident("module name") else {
            return Vec::new();
        };
        let selector = if self.consume(&TokenKind::Dot) {
            if self.check_kw(Keyword::All) {
                self.advance();
                None
            } else if let Some(name) = self.expect_ident("imported function name or 'all'") {
                Some(name)
            } else {
                None
            }
        } else {
            None
        };

        if self.loaded_modules.contains(&module) {
            return Vec::new();
        }
        // Mark loaded before parsing to defuse circular imports.
        self.loaded_modules.insert(module.clone());

        let source = match self.loader.load(&module) {
            Ok(src) => src,
            Err(e) => {
                self.diags.error(Stage::Io, None, e);
                return Vec::new();
            }
        };

        // Scoped acquisition: save this parser's stream/cursor, restore on
        // every exit path including diagnostics (spec.md §5).
        let saved_tokens = std::mem::take(&mut self.tokens);
        let saved_pos = self.pos;

        self.tokens = crate::token::tokenize(&source, self.diags);
        self.pos = 0;

        let sub_program = self.parse_program();

        self.tokens = saved_tokens;
        self.pos = saved_pos;

        match selector {
            None => sub_program.funcs,
            Some(name) => sub_program
                .funcs
                .into_iter()
                .filter(|f| f.name == name)
                .collect(),
        }
    }

    // --- statements ---

    fn parse_statement(&mut self) -> Option<Stmt> {
        let tok = self.peek();
        if self.is_type_keyword(tok) || tok.kind == TokenKind::Keyword(Keyword::Var) {
            return self.parse_declaration();
        }
        match &tok.kind {
            TokenKind::Keyword(Keyword::Print) => self.parse_print(),
            TokenKind::Keyword(Keyword::If) => self.parse_if(),
            TokenKind::Keyword(Keyword::Return) => self.parse_return(),
            TokenKind::Keyword(Keyword::Loop) => self.parse_loop(),
            _ => self.parse_expr_or_assign_statement(),
        }
    }

    fn parse_block(&mut self) -> Option<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            match self.parse_statement() {
                Some(s) => stmts.push(s),
                None => self.synchronize(),
            }
        }
        self.expect(&TokenKind::RBrace, "'}'");
        Some(stmts)
    }

    fn parse_print(&mut self) -> Option<Stmt> {
        let line = self.advance().line; // 'print'
        self.expect(&TokenKind::LParen, "'('")?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expression()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen, "')'")?;
        self.consume(&TokenKind::Semicolon);
        Some(Stmt::Print { args, line })
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let line = self.advance().line; // 'if'
        let cond = self.parse_expression()?;
        let then_block = self.parse_block()?;
        let else_block = if self.check_kw(Keyword::Elif) {
            // desugar elif into a nested if inside the else arm
            Some(vec![self.parse_elif()?])
        } else if self.consume(&TokenKind::Keyword(Keyword::Else)) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Some(Stmt::If {
            cond,
            then_block,
            else_block,
            line,
        })
    }

    fn parse_elif(&mut self) -> Option<Stmt> {
        let line = self.advance().line; // 'elif'
        let cond = self.parse_expression()?;
        let then_block = self.parse_block()?;
        let else_block = if self.check_kw(Keyword::Elif) {
            Some(vec![self.parse_elif()?])
        } else if self.consume(&TokenKind::Keyword(Keyword::Else)) {
            Some(self.parse_block()?)
        } else {
            None
        };
        Some(Stmt::If {
            cond,
            then_block,
            else_block,
            line,
        })
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        let line = self.advance().line; // 'return'
        let value = if self.check(&TokenKind::Semicolon) || self.check(&TokenKind::RBrace) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume(&TokenKind::Semicolon);
        Some(Stmt::Return { value, line })
    }

    fn parse_loop(&mut self) -> Option<Stmt> {
        let line = self.advance().line; // 'loop'
        if let TokenKind::Ident(name) = self.peek().kind.clone() {
            if self.peek_at(1).kind == TokenKind::Keyword(Keyword::In) {
                self.advance(); // ident
                self.advance(); // 'in'
                let expr = self.parse_expression()?;
                let body = self.parse_block()?;
                return Some(Stmt::LoopIndexOverString {
                    var: name,
                    expr,
                    body,
                    line,
                });
            }
        }
        let cond = self.parse_expression()?;
        let body = self.parse_block()?;
        Some(Stmt::Loop { cond, body, line })
    }

    fn parse_declaration(&mut self) -> Option<Stmt> {
        let line = self.peek().line;
        let type_name = self.advance().lexeme;

        if self.consume(&TokenKind::LBracket) {
            if self.consume(&TokenKind::RBracket) {
                // dynamic list: T[] name = [ ... ];
                let name = self.expect_ident("variable name")?;
                let init = if self.consume(&TokenKind::Assign) {
                    Some(self.parse_array_lit_items()?)
                } else {
                    None
                };
                self.consume(&TokenKind::Semicolon);
                return Some(Stmt::DynamicListDecl {
                    name,
                    elem_type_name: type_name,
                    init,
                    line,
                });
            }
            // fixed size: T[N] name = init;
            let size_tok = self.advance();
            let size = match size_tok.kind {
                TokenKind::IntLit(n) => n as u32,
                _ => {
                    self.error(line, "expected array size");
                    0
                }
            };
            self.expect(&TokenKind::RBracket, "']'")?;
            let name = self.expect_ident("variable name")?;
            if type_name == "string" {
                self.expect(&TokenKind::Assign, "'='")?;
                let init = self.parse_expression()?;
                self.consume(&TokenKind::Semicolon);
                return Some(Stmt::FixedStringDecl {
                    name,
                    capacity: size,
                    init,
                    line,
                });
            }
            let init = if self.consume(&TokenKind::Assign) {
                Some(self.parse_array_lit_items()?)
            } else {
                None
            };
            self.consume(&TokenKind::Semicolon);
            return Some(Stmt::FixedArrayDecl {
                name,
                elem_type_name: type_name,
                size,
                init,
                line,
            });
        }

        // scalar: T name = init;  (T may be 'var')
        let name = self.expect_ident("variable name")?;
        let init = if self.consume(&TokenKind::Assign) {
            Some(self.parse_expression()?)
        } else {
            None
        };
        self.consume(&TokenKind::Semicolon);

        let byte_width = width_suffix(&type_name);
        Some(Stmt::VarDecl {
            name,
            type_name,
            byte_width,
            init,
            line,
        })
    }

    fn parse_array_lit_items(&mut self) -> Option<Vec<Expr>> {
        self.expect(&TokenKind::LBracket, "'['")?;
        let mut items = Vec::new();
        if !self.check(&TokenKind::RBracket) {
            loop {
                items.push(self.parse_expression()?);
                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RBracket, "']'")?;
        Some(items)
    }

    /// Expression statement, a plain assignment (`name = expr;`), or an
    /// index-write (`name[idx] = expr;`).
    fn parse_expr_or_assign_statement(&mut self) -> Option<Stmt> {
        let line = self.peek().line;
        let expr = self.parse_expression()?;
        if self.consume(&TokenKind::Assign) {
            let rhs = self.parse_expression()?;
            self.consume(&TokenKind::Semicolon);
            return Some(match expr {
                Expr::Ident(name) => Stmt::Assign { name, rhs, line },
                Expr::IndexRead { base, index } => Stmt::IndexWrite {
                    base: *base,
                    index: *index,
                    rhs,
                    line,
                },
                other => {
                    self.error(line, "invalid assignment target");
                    Stmt::Expr(other)
                }
            });
        }
        self.consume(&TokenKind::Semicolon);
        Some(Stmt::Expr(expr))
    }

    // --- expressions ---

    fn parse_expression(&mut self) -> Option<Expr> {
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some(op) = peek_binop(&self.peek().kind) else {
                break;
            };
            if op.precedence() < min_prec {
                break;
            }
            let line = self.advance().line;
            let rhs = self.parse_binary(op.precedence() + 1)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        let line = self.peek().line;
        if self.consume(&TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Some(Expr::Binary {
                op: BinOp::Sub,
                lhs: Box::new(Expr::IntLit(0)),
                rhs: Box::new(operand),
                line,
            });
        }
        if self.check(&TokenKind::PlusPlus) || self.check(&TokenKind::MinusMinus) {
            let increment = self.check(&TokenKind::PlusPlus);
            self.advance();
            let name = self.expect_ident("variable name after prefix ++/--")?;
            return Some(Expr::UpdateInPlace {
                name,
                increment,
                prefix: true,
                line,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let line = self.peek().line;
            if self.consume(&TokenKind::LBracket) {
                expr = self.parse_index_or_slice(expr, line)?;
            } else if self.consume(&TokenKind::Dot) {
                let method = self.expect_ident("method name after '.'")?;
                self.expect(&TokenKind::LParen, "'('")?;
                let mut args = Vec::new();
                if !self.check(&TokenKind::RParen) {
                    loop {
                        args.push(self.parse_expression()?);
                        if !self.consume(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&TokenKind::RParen, "')'")?;
                expr = Expr::MethodCall {
                    receiver: Box::new(expr),
                    method,
                    args,
                    line,
                };
            } else if self.check(&TokenKind::PlusPlus) || self.check(&TokenKind::MinusMinus) {
                let increment = self.check(&TokenKind::PlusPlus);
                self.advance();
                if let Expr::Ident(name) = expr {
                    expr = Expr::UpdateInPlace {
                        name,
                        increment,
                        prefix: false,
                        line,
                    };
                } else {
                    self.error(line, "postfix ++/-- requires a variable");
                    break;
                }
            } else {
                break;
            }
        }
        Some(expr)
    }

    fn parse_index_or_slice(&mut self, base: Expr, line: usize) -> Option<Expr> {
        if self.check(&TokenKind::Colon) {
            self.advance();
            return self.parse_slice_rest(base, None, line);
        }
        let first = self.parse_expression()?;
        if self.consume(&TokenKind::Colon) {
            return self.parse_slice_rest(base, Some(first), line);
        }
        self.expect(&TokenKind::RBracket, "']'")?;
        Some(Expr::IndexRead {
            base: Box::new(base),
            index: Box::new(first),
        })
    }

    fn parse_slice_rest(&mut self, base: Expr, start: Option<Expr>, _line: usize) -> Option<Expr> {
        let end = if self.check(&TokenKind::Colon) || self.check(&TokenKind::RBracket) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        let step = if self.consume(&TokenKind::Colon) {
            if self.check(&TokenKind::RBracket) {
                None
            } else {
                Some(self.parse_expression()?)
            }
        } else {
            None
        };
        self.expect(&TokenKind::RBracket, "']'")?;
        Some(Expr::Slice {
            base: Box::new(base),
            start: start.map(Box::new),
            end: end.map(Box::new),
            step: step.map(Box::new),
        })
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::IntLit(n) => {
                self.advance();
                Some(Expr::IntLit(n))
            }
            TokenKind::FloatLit(f) => {
                self.advance();
                Some(Expr::FloatLit(f))
            }
            TokenKind::CharLit(c) => {
                self.advance();
                Some(Expr::CharLit(c))
            }
            TokenKind::StringLit(s) => {
                self.advance();
                Some(Expr::StrLit(s))
            }
            TokenKind::Keyword(Keyword::True) => {
                self.advance();
                Some(Expr::BoolLit(true))
            }
            TokenKind::Keyword(Keyword::False) => {
                self.advance();
                Some(Expr::BoolLit(false))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Some(inner)
            }
            TokenKind::LBracket => {
                let items = self.parse_array_lit_items()?;
                Some(Expr::ArrayLit(items))
            }
            TokenKind::Ident(name) => {
                self.advance();
                if name == "typeof" || name == "bytesize" {
                    if self.consume(&TokenKind::LParen) {
                        let var = self.expect_ident("variable name")?;
                        self.expect(&TokenKind::RParen, "')'")?;
                        return Some(if name == "typeof" {
                            Expr::TypeOf { name: var, line: tok.line }
                        } else {
                            Expr::ByteSize { name: var, line: tok.line }
                        });
                    }
                }
                if self.check(&TokenKind::LParen) {
                    self.advance();
                    let args = self.parse_call_args()?;
                    self.expect(&TokenKind::RParen, "')'")?;
                    return Some(Expr::Call {
                        callee: name,
                        args,
                        line: tok.line,
                    });
                }
                Some(Expr::Ident(name))
            }
            _ => {
                self.error(tok.line, format!("unexpected token '{}'", tok.lexeme));
                None
            }
        }
    }

    fn parse_call_args(&mut self) -> Option<Vec<CallArg>> {
        let mut args = Vec::new();
        if self.check(&TokenKind::RParen) {
            return Some(args);
        }
        loop {
            // `name = value` keyword arg vs positional: lookahead ident '='.
            if let TokenKind::Ident(name) = self.peek().kind.clone() {
                if self.peek_at(1).kind == TokenKind::Assign {
                    self.advance();
                    self.advance();
                    let value = self.parse_expression()?;
                    args.push(CallArg {
                        name: Some(name),
                        value,
                    });
                    if !self.consume(&TokenKind::Comma) {
                        break;
                    }
                    continue;
                }
            }
            let value = self.parse_expression()?;
            args.push(CallArg { name: None, value });
            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }
        Some(args)
    }
}

fn peek_binop(kind: &TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::Plus => BinOp::Add,
        TokenKind::Minus => BinOp::Sub,
        TokenKind::Star => BinOp::Mul,
        TokenKind::Slash => BinOp::Div,
        TokenKind::Percent => BinOp::Mod,
        TokenKind::EqEq => BinOp::Eq,
        TokenKind::NotEq => BinOp::Ne,
        TokenKind::Lt => BinOp::Lt,
        TokenKind::Gt => BinOp::Gt,
        TokenKind::Leq => BinOp::Le,
        TokenKind::Geq => BinOp::Ge,
        _ => return None,
    })
}

fn width_suffix(type_name: &str) -> u8 {
    if type_name == "var" || type_name == "bool" || type_name == "char" {
        0
    } else if let Some(rest) = type_name.strip_prefix("int").or_else(|| type_name.strip_prefix("float")) {
        rest.parse().unwrap_or(0)
    } else {
        0
    }
}

/// Parse a single compilation unit (used by both the root file and the
/// import sub-parser).
pub fn parse_source(
    source: &str,
    diags: &mut Diagnostics,
    loader: &dyn ModuleLoader,
) -> Program {
    let tokens = crate::token::tokenize(source, diags);
    let mut parser = Parser::new(tokens, diags, loader);
    parser.parse_program()
}

pub fn root_and_cwd_loader(source_path: &Path) -> FsModuleLoader {
    root_and_cwd_loader_with_extra(source_path, Vec::new())
}

pub fn root_and_cwd_loader_with_extra(source_path: &Path, extra: Vec<PathBuf>) -> FsModuleLoader {
    let root = source_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    FsModuleLoader { root, cwd, extra }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (Program, Diagnostics) {
        let mut diags = Diagnostics::new();
        let program = parse_source(src, &mut diags, &NoImports);
        (program, diags)
    }

    #[test]
    fn top_level_statements_synthesize_main() {
        let (program, diags) = parse("print(1+2*3);");
        assert!(!diags.had_error());
        assert_eq!(program.funcs.len(), 1);
        assert_eq!(program.funcs[0].name, "main");
    }

    #[test]
    fn precedence_climbing_binds_multiply_tighter_than_add() {
        let (program, _) = parse("print(1+2*3);");
        let Stmt::Print { args, .. } = &program.funcs[0].body[0] else {
            panic!("expected print")
        };
        match &args[0] {
            Expr::Binary { op: BinOp::Add, rhs, .. } => {
                assert!(matches!(**rhs, Expr::Binary { op: BinOp::Mul, .. }));
            }
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn explicit_main_and_top_level_statements_is_an_error() {
        let (_, diags) = parse("void main() { return; } print(1);");
        assert!(diags.had_error());
    }

    #[test]
    fn function_def_lookahead_does_not_consume_on_failure() {
        let (program, diags) = parse("int add(int a, int b) { return a + b; }");
        assert!(!diags.had_error());
        assert_eq!(program.funcs[0].params.len(), 2);
    }

    #[test]
    fn call_args_support_keyword_and_positional_mixed() {
        let (program, diags) = parse("void main() { add(b=1, a=2); }");
        assert!(!diags.had_error());
        let Stmt::Expr(Expr::Call { args, .. }) = &program.funcs[0].body[0] else {
            panic!("expected call expr stmt")
        };
        assert_eq!(args[0].name.as_deref(), Some("b"));
        assert_eq!(args[1].name.as_deref(), Some("a"));
    }

    #[test]
    fn fixed_array_decl_and_index_read() {
        let (program, diags) = parse("void main() { int[3] a = [10,20,30]; print(a[1]); }");
        assert!(!diags.had_error());
        assert!(matches!(program.funcs[0].body[0], Stmt::FixedArrayDecl { .. }));
    }

    #[test]
    fn dynamic_list_decl_and_method_chain() {
        let (program, diags) = parse("void main() { int[] xs = [1,2]; xs.push(3); }");
        assert!(!diags.had_error());
        assert!(matches!(program.funcs[0].body[0], Stmt::DynamicListDecl { .. }));
        assert!(matches!(program.funcs[0].body[1], Stmt::Expr(Expr::MethodCall { .. })));
    }

    #[test]
    fn slice_with_step_parses() {
        let (program, diags) = parse("void main() { print(s[1:5:2]); }");
        assert!(!diags.had_error());
        let Stmt::Print { args, .. } = &program.funcs[0].body[0] else {
            panic!()
        };
        assert!(matches!(args[0], Expr::Slice { .. }));
    }

    #[test]
    fn loop_in_range_form_parses() {
        let (program, diags) = parse("void main() { loop id in xs { print(id); } }");
        assert!(!diags.had_error());
        assert!(matches!(
            program.funcs[0].body[0],
            Stmt::LoopIndexOverString { .. }
        ));
    }

    #[test]
    fn synchronize_recovers_after_bad_statement() {
        let (program, diags) = parse("void main() { @ 1 + ; int x = 1; }");
        assert!(diags.had_error());
        // Recovery should still find the second, valid declaration.
        assert!(program.funcs[0]
            .body
            .iter()
            .any(|s| matches!(s, Stmt::VarDecl { name, .. } if name == "x")));
    }

    struct MapLoader(std::collections::HashMap<&'static str, &'static str>);
    impl ModuleLoader for MapLoader {
        fn load(&self, module: &str) -> Result<String, String> {
            self.0
                .get(module)
                .map(|s| s.to_string())
                .ok_or_else(|| format!("no such module {module}"))
        }
    }

    #[test]
    fn import_merges_functions_from_another_module() {
        let mut map = std::collections::HashMap::new();
        map.insert("math", "int square(int n) { return n * n; }");
        let loader = MapLoader(map);
        let mut diags = Diagnostics::new();
        let program = parse_source("import math\nvoid main() { print(square(4)); }", &mut diags, &loader);
        assert!(!diags.had_error());
        assert!(program.find_func("square").is_some());
    }

    #[test]
    fn import_selector_filters_to_one_function() {
        let mut map = std::collections::HashMap::new();
        map.insert("math", "int square(int n) { return n * n; } int cube(int n) { return n * n * n; }");
        let loader = MapLoader(map);
        let mut diags = Diagnostics::new();
        let program = parse_source("import math.square\nvoid main() { print(square(4)); }", &mut diags, &loader);
        assert!(!diags.had_error());
        assert!(program.find_func("square").is_some());
        assert!(program.find_func("cube").is_none());
    }

    #[test]
    fn repeated_import_of_same_module_is_a_no_op() {
        let mut map = std::collections::HashMap::new();
        map.insert("math", "int square(int n) { return n * n; }");
        let loader = MapLoader(map);
        let mut diags = Diagnostics::new();
        let program = parse_source(
            "import math\nimport math\nvoid main() { print(square(4)); }",
            &mut diags,
            &loader,
        );
        assert!(!diags.had_error());
        assert_eq!(program.funcs.iter().filter(|f| f.name == "square").count(), 1);
    }
}
