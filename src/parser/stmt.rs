//! Statements and blocks.

use smallvec::SmallVec;

use super::expr::assign_op;
use super::{req, PResult, Parser};
use crate::cst::*;
use crate::error::DiagKind;
use crate::scope::{DeclRef, ScopeId, ScopeKind};
use crate::token::{Tok, TokKind};

enum SwitchHead {
    Expr {
        init: Option<SimpleStmtId>,
        tag: Option<ExprId>,
    },
    Type {
        init: Option<SimpleStmtId>,
        guard: TypeSwitchGuard,
    },
}

impl Parser<'_, '_> {
    /// `{ ... }` in a fresh block scope.
    pub(super) fn block(&mut self) -> PResult<Block> {
        self.with_scope(ScopeKind::Block, |p, scope| p.block_in(scope))
    }

    /// `{ ... }` whose statements belong to `scope`, which must be current.
    pub(super) fn block_in(&mut self, scope: ScopeId) -> PResult<Block> {
        self.descend(|p| {
            let l_brace = req!(p.expect(TokKind::LBrace));
            let stmts = req!(p.nested(|p| p.stmt_list()));
            let r_brace = req!(p.expect(TokKind::RBrace));
            Ok(Some(Block {
                l_brace,
                scope,
                stmts,
                r_brace,
            }))
        })
    }

    fn stmt_list(&mut self) -> PResult<ListRef<StmtId>> {
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                TokKind::Semi => {
                    self.bump()?;
                }
                TokKind::RBrace | TokKind::Eof | TokKind::KwCase | TokKind::KwDefault => break,
                _ => {
                    stmts.push(req!(self.stmt()));
                    req!(self.semi());
                }
            }
        }
        Ok(Some(self.arena.list_stmts(stmts)))
    }

    fn stmt(&mut self) -> PResult<StmtId> {
        self.descend(|p| {
            let start = p.pos;
            let node = match p.peek() {
                TokKind::KwConst => Stmt::Decl(req!(p.gen_decl(GenDeclKind::Const))),
                TokKind::KwVar => Stmt::Decl(req!(p.gen_decl(GenDeclKind::Var))),
                TokKind::KwType => Stmt::Decl(req!(p.gen_decl(GenDeclKind::Type))),
                TokKind::Ident if p.peek_at(1) == TokKind::Colon => {
                    let label = req!(p.ident());
                    let colon = p.bump()?;
                    let body = if matches!(p.peek(), TokKind::RBrace | TokKind::Semi | TokKind::Eof) {
                        // `L: }` labels an empty statement.
                        let empty = p.pos;
                        let span = p.span_from(empty);
                        let s = p.arena.simple_stmts.alloc(SimpleStmt::Empty(empty), span);
                        p.arena.stmts.alloc(Stmt::Simple(s), span)
                    } else {
                        req!(p.stmt())
                    };
                    Stmt::Labeled { label, colon, body }
                }
                TokKind::KwGo => {
                    let go_tok = p.bump()?;
                    let call = req!(p.expr());
                    Stmt::Go { go_tok, call }
                }
                TokKind::KwDefer => {
                    let defer_tok = p.bump()?;
                    let call = req!(p.expr());
                    Stmt::Defer { defer_tok, call }
                }
                TokKind::KwReturn => {
                    let return_tok = p.bump()?;
                    let results = if matches!(p.peek(), TokKind::Semi | TokKind::RBrace) {
                        ListRef::EMPTY
                    } else {
                        req!(p.expr_list())
                    };
                    Stmt::Return {
                        return_tok,
                        results,
                    }
                }
                TokKind::KwBreak | TokKind::KwContinue => {
                    let is_break = p.at(TokKind::KwBreak);
                    let tok = p.bump()?;
                    let label = if p.at(TokKind::Ident) {
                        Some(req!(p.ident()))
                    } else {
                        None
                    };
                    Stmt::Branch(if is_break {
                        BranchStmt::Break { tok, label }
                    } else {
                        BranchStmt::Continue { tok, label }
                    })
                }
                TokKind::KwGoto => {
                    let tok = p.bump()?;
                    let label = req!(p.ident());
                    Stmt::Branch(BranchStmt::Goto { tok, label })
                }
                TokKind::KwFallthrough => Stmt::Branch(BranchStmt::Fallthrough { tok: p.bump()? }),
                TokKind::LBrace => Stmt::Block(req!(p.block())),
                TokKind::KwIf => return p.if_stmt(),
                TokKind::KwFor => return p.for_stmt(),
                TokKind::KwSwitch => return p.switch_stmt(),
                TokKind::KwSelect => return p.select_stmt(),
                _ => Stmt::Simple(req!(p.simple_stmt())),
            };
            let span = p.span_from(start);
            Ok(Some(p.arena.stmts.alloc(node, span)))
        })
    }

    pub(super) fn simple_stmt(&mut self) -> PResult<SimpleStmtId> {
        let start = self.pos;
        if self.at(TokKind::Ident) {
            if let Some(id) = self.attempt("short var decl", |p| p.short_var_decl())? {
                return Ok(Some(id));
            }
        }
        let lhs = req!(self.expr_vec());
        let single = lhs.len() == 1;
        let node = match self.peek() {
            TokKind::Inc | TokKind::Dec if single => {
                let op = if self.at(TokKind::Inc) {
                    IncDecOp::Inc
                } else {
                    IncDecOp::Dec
                };
                let op_tok = self.bump()?;
                SimpleStmt::IncDec {
                    target: lhs[0],
                    op,
                    op_tok,
                }
            }
            TokKind::Arrow if single => {
                let arrow = self.bump()?;
                let value = req!(self.expr());
                SimpleStmt::Send {
                    chan: lhs[0],
                    arrow,
                    value,
                }
            }
            TokKind::Assign => {
                let op_tok = self.bump()?;
                let rhs = req!(self.expr_list());
                let lhs = self.arena.list_exprs(lhs);
                SimpleStmt::Assign {
                    lhs,
                    op: AssignOp::Assign,
                    op_tok,
                    rhs,
                }
            }
            k if single && k.is_op_assign() => {
                let Some(op) = assign_op(k) else {
                    return self.fail("assignment operator");
                };
                let op_tok = self.bump()?;
                let rhs = req!(self.expr_list());
                let lhs = self.arena.list_exprs(lhs);
                SimpleStmt::Assign {
                    lhs,
                    op: AssignOp::Op(op),
                    op_tok,
                    rhs,
                }
            }
            _ if single => SimpleStmt::Expr(lhs[0]),
            _ => return self.fail(":= or = or comma"),
        };
        let span = self.span_from(start);
        Ok(Some(self.arena.simple_stmts.alloc(node, span)))
    }

    fn short_var_decl(&mut self) -> PResult<SimpleStmtId> {
        let start = self.pos;
        let names = req!(self.ident_list());
        let op_tok = req!(self.expect(TokKind::Define));
        let values = req!(self.expr_list());
        let span = self.span_from(start);
        let list = self.arena.list_ident_names(names.iter().copied());
        let id = self.arena.simple_stmts.alloc(
            SimpleStmt::ShortVarDecl {
                names: list,
                op_tok,
                values,
            },
            span,
        );
        self.declare_short_vars(&names, op_tok, |i| DeclRef::ShortVar(id, i));
        Ok(Some(id))
    }

    /// Declares the new names of a `:=`; names already in the current block
    /// are assigned to instead.
    fn declare_short_vars(
        &mut self,
        names: &[IdentName],
        op_tok: Tok,
        decl: impl Fn(u32) -> DeclRef,
    ) {
        let scope = self.cur_scope;
        let visible = self.pos;
        let mut seen: SmallVec<[Symbol; 4]> = SmallVec::new();
        let mut any_new = false;
        for (i, &n) in names.iter().enumerate() {
            if self.is_blank(n) {
                continue;
            }
            if seen.contains(&n.sym) {
                let msg = format!("{} repeated on left side of :=", self.interner.resolve(n.sym));
                let span = self.tok_span(n.tok);
                self.report(DiagKind::Declaration, span, msg);
                continue;
            }
            seen.push(n.sym);
            if self.scopes.get(scope).get(n.sym).is_some() {
                continue;
            }
            any_new = true;
            self.declare(scope, n, decl(i as u32), visible);
        }
        if !any_new {
            let span = self.tok_span(op_tok);
            self.report(DiagKind::Declaration, span, "no new variables on left side of :=");
        }
    }

    fn if_stmt(&mut self) -> PResult<StmtId> {
        self.descend(|p| {
            let if_tok = p.bump()?;
            let node = req!(p.with_scope(ScopeKind::Block, |p, scope| {
                let (init, cond) = req!(p.header(|p| {
                    let first = if p.at(TokKind::Semi) {
                        None
                    } else {
                        Some(req!(p.simple_stmt()))
                    };
                    if p.eat(TokKind::Semi)?.is_some() {
                        let cond = req!(p.expr());
                        return Ok(Some((first, cond)));
                    }
                    match first.map(|s| p.arena.simple_stmts[s]) {
                        Some(SimpleStmt::Expr(e)) => Ok(Some((None, e))),
                        _ => p.fail("condition"),
                    }
                }));
                let then_block = req!(p.block());
                let else_stmt = if p.eat(TokKind::KwElse)?.is_some() {
                    match p.peek() {
                        TokKind::KwIf => Some(req!(p.if_stmt())),
                        TokKind::LBrace => {
                            let start = p.pos;
                            let b = req!(p.block());
                            let span = p.span_from(start);
                            Some(p.arena.stmts.alloc(Stmt::Block(b), span))
                        }
                        _ => return p.fail("if or {"),
                    }
                } else {
                    None
                };
                Ok(Some(Stmt::If {
                    if_tok,
                    scope,
                    init,
                    cond,
                    then_block,
                    else_stmt,
                }))
            }));
            let span = p.span_from(if_tok);
            Ok(Some(p.arena.stmts.alloc(node, span)))
        })
    }

    fn for_stmt(&mut self) -> PResult<StmtId> {
        let for_tok = self.bump()?;
        let node = req!(self.with_scope(ScopeKind::Block, |p, scope| {
            let kind = req!(p.header(|p| p.for_header()));
            let body = req!(p.block());
            Ok(Some(Stmt::For {
                for_tok,
                scope,
                kind,
                body,
            }))
        }));
        let span = self.span_from(for_tok);
        Ok(Some(self.arena.stmts.alloc(node, span)))
    }

    fn for_header(&mut self) -> PResult<ForKind> {
        match self.peek() {
            TokKind::LBrace => return Ok(Some(ForKind::Infinite)),
            TokKind::KwRange => {
                let range_tok = self.bump()?;
                let range_expr = req!(self.expr());
                return Ok(Some(ForKind::Range {
                    lhs: None,
                    range_tok,
                    range_expr,
                }));
            }
            _ => {}
        }
        if let Some(k) = self.attempt("range clause", |p| p.range_clause())? {
            return Ok(Some(k));
        }

        let init = if self.at(TokKind::Semi) {
            None
        } else {
            Some(req!(self.simple_stmt()))
        };
        if self.at(TokKind::LBrace) {
            return match init.map(|s| self.arena.simple_stmts[s]) {
                Some(SimpleStmt::Expr(e)) => Ok(Some(ForKind::Cond(e))),
                _ => self.fail("for loop condition"),
            };
        }
        req!(self.expect(TokKind::Semi));
        let cond = if self.at(TokKind::Semi) {
            None
        } else {
            Some(req!(self.expr()))
        };
        req!(self.expect(TokKind::Semi));
        let post = if self.at(TokKind::LBrace) {
            None
        } else {
            Some(req!(self.simple_stmt()))
        };
        if let Some(post) = post {
            if matches!(self.arena.simple_stmts[post], SimpleStmt::ShortVarDecl { .. }) {
                let span = self.arena.simple_stmts.span(post);
                self.report(DiagKind::Syntax, span, "cannot declare in post statement of for loop");
            }
        }
        Ok(Some(ForKind::Clause { init, cond, post }))
    }

    /// `k, v := range x` or `k, v = range x`.
    fn range_clause(&mut self) -> PResult<ForKind> {
        let define = self.attempt("range define", |p| {
            let names = req!(p.ident_list());
            let op_tok = req!(p.expect(TokKind::Define));
            Ok(Some((names, op_tok)))
        })?;
        if let Some((names, op_tok)) = define {
            let range_tok = req!(self.expect(TokKind::KwRange));
            let range_expr = req!(self.expr());
            self.check_range_vars(names.len(), op_tok);
            let scope = self.cur_scope;
            let visible = self.pos;
            for (i, &n) in names.iter().enumerate() {
                self.declare(scope, n, DeclRef::Range(range_expr, i as u32), visible);
            }
            let names = self.arena.list_ident_names(names);
            return Ok(Some(ForKind::Range {
                lhs: Some(RangeLhs::Define { names, op_tok }),
                range_tok,
                range_expr,
            }));
        }
        let exprs = req!(self.expr_vec());
        let op_tok = req!(self.expect(TokKind::Assign));
        let range_tok = req!(self.expect(TokKind::KwRange));
        let range_expr = req!(self.expr());
        self.check_range_vars(exprs.len(), op_tok);
        let exprs = self.arena.list_exprs(exprs);
        Ok(Some(ForKind::Range {
            lhs: Some(RangeLhs::Assign { exprs, op_tok }),
            range_tok,
            range_expr,
        }))
    }

    fn check_range_vars(&mut self, n: usize, op_tok: Tok) {
        if n > 2 {
            let span = self.tok_span(op_tok);
            self.report(
                DiagKind::Syntax,
                span,
                "range clause permits at most two iteration variables",
            );
        }
    }

    fn switch_stmt(&mut self) -> PResult<StmtId> {
        let switch_tok = self.bump()?;
        let node = req!(self.with_scope(ScopeKind::Block, |p, scope| {
            let head = req!(p.header(|p| p.switch_header()));
            let l_brace = req!(p.expect(TokKind::LBrace));
            let node = match head {
                SwitchHead::Expr { init, tag } => {
                    let clauses = req!(p.nested(|p| p.expr_clauses()));
                    let r_brace = req!(p.expect(TokKind::RBrace));
                    Stmt::Switch {
                        switch_tok,
                        scope,
                        init,
                        tag,
                        l_brace,
                        clauses,
                        r_brace,
                    }
                }
                SwitchHead::Type { init, guard } => {
                    let clauses = req!(p.nested(|p| p.type_clauses(guard)));
                    let r_brace = req!(p.expect(TokKind::RBrace));
                    Stmt::TypeSwitch {
                        switch_tok,
                        scope,
                        init,
                        guard,
                        l_brace,
                        clauses,
                        r_brace,
                    }
                }
            };
            Ok(Some(node))
        }));
        let span = self.span_from(switch_tok);
        Ok(Some(self.arena.stmts.alloc(node, span)))
    }

    fn switch_header(&mut self) -> PResult<SwitchHead> {
        if self.at(TokKind::LBrace) {
            return Ok(Some(SwitchHead::Expr {
                init: None,
                tag: None,
            }));
        }
        if let Some(guard) = self.attempt("type switch guard", |p| p.type_switch_guard())? {
            return Ok(Some(SwitchHead::Type { init: None, guard }));
        }
        let first = if self.at(TokKind::Semi) {
            None
        } else {
            Some(req!(self.simple_stmt()))
        };
        if self.eat(TokKind::Semi)?.is_some() {
            let init = first;
            if self.at(TokKind::LBrace) {
                return Ok(Some(SwitchHead::Expr { init, tag: None }));
            }
            if let Some(guard) = self.attempt("type switch guard", |p| p.type_switch_guard())? {
                return Ok(Some(SwitchHead::Type { init, guard }));
            }
            let tag = req!(self.expr());
            return Ok(Some(SwitchHead::Expr {
                init,
                tag: Some(tag),
            }));
        }
        match first.map(|s| self.arena.simple_stmts[s]) {
            Some(SimpleStmt::Expr(e)) => Ok(Some(SwitchHead::Expr {
                init: None,
                tag: Some(e),
            })),
            _ => self.fail("switch expression"),
        }
    }

    /// `[x :=] y.(type)` followed by the switch body.
    fn type_switch_guard(&mut self) -> PResult<TypeSwitchGuard> {
        let bind = if self.at(TokKind::Ident) && self.peek_at(1) == TokKind::Define {
            let n = req!(self.ident());
            self.bump()?;
            Some(n)
        } else {
            None
        };
        let saved = self.type_guard;
        self.type_guard = true;
        let x = self.primary_expr();
        self.type_guard = saved;
        let x = req!(x);
        let Expr::TypeAssert {
            base,
            l_paren,
            typ: None,
            ..
        } = self.arena.exprs[x]
        else {
            return self.fail(".(type)");
        };
        if !self.at(TokKind::LBrace) {
            return self.fail("{");
        }
        Ok(Some(TypeSwitchGuard {
            bind,
            subject: base,
            type_tok: l_paren.next(),
        }))
    }

    fn clause_head(&mut self) -> PResult<(Tok, bool)> {
        match self.peek() {
            TokKind::KwCase => Ok(Some((self.bump()?, false))),
            TokKind::KwDefault => Ok(Some((self.bump()?, true))),
            _ => self.fail("case or default"),
        }
    }

    fn check_single_default(&mut self, seen: &mut bool, is_default: bool, tok: Tok, what: &str) {
        if !is_default {
            return;
        }
        if *seen {
            let span = self.tok_span(tok);
            self.report(DiagKind::Syntax, span, format!("multiple defaults in {what}"));
        }
        *seen = true;
    }

    fn expr_clauses(&mut self) -> PResult<ListRef<SwitchClauseId>> {
        let mut ids = Vec::new();
        let mut seen_default = false;
        while !self.at(TokKind::RBrace) {
            let id = req!(self.with_scope(ScopeKind::Block, |p, scope| {
                let (case_tok, is_default) = req!(p.clause_head());
                p.check_single_default(&mut seen_default, is_default, case_tok, "switch");
                let items = if is_default {
                    ListRef::EMPTY
                } else {
                    req!(p.expr_list())
                };
                let colon = req!(p.expect(TokKind::Colon));
                let stmts = req!(p.stmt_list());
                let span = p.span_from(case_tok);
                Ok(Some(p.arena.switch_clauses.alloc(
                    SwitchClause::ExprCase {
                        case_tok,
                        scope,
                        is_default,
                        items,
                        colon,
                        stmts,
                    },
                    span,
                )))
            }));
            ids.push(id);
        }
        Ok(Some(self.arena.list_switch_clause_ids(ids)))
    }

    fn type_clauses(&mut self, guard: TypeSwitchGuard) -> PResult<ListRef<SwitchClauseId>> {
        let mut ids = Vec::new();
        let mut seen_default = false;
        while !self.at(TokKind::RBrace) {
            let id = req!(self.with_scope(ScopeKind::Block, |p, scope| {
                let (case_tok, is_default) = req!(p.clause_head());
                p.check_single_default(&mut seen_default, is_default, case_tok, "type switch");
                let items = if is_default {
                    ListRef::EMPTY
                } else {
                    req!(p.type_case_list())
                };
                let colon = req!(p.expect(TokKind::Colon));
                // Allocated before the body so the bound name can refer to it.
                let head_span = p.span_from(case_tok);
                let id = p.arena.switch_clauses.alloc(
                    SwitchClause::TypeCase {
                        case_tok,
                        scope,
                        is_default,
                        items,
                        colon,
                        stmts: ListRef::EMPTY,
                    },
                    head_span,
                );
                if let Some(bind) = guard.bind {
                    p.declare(scope, bind, DeclRef::TypeSwitch(guard.subject, id), colon.next());
                }
                let body = req!(p.stmt_list());
                if let SwitchClause::TypeCase { stmts, .. } = &mut p.arena.switch_clauses[id] {
                    *stmts = body;
                }
                let span = p.span_from(case_tok);
                p.arena.switch_clauses.set_span(id, span);
                Ok(Some(id))
            }));
            ids.push(id);
        }
        Ok(Some(self.arena.list_switch_clause_ids(ids)))
    }

    fn type_case_list(&mut self) -> PResult<ListRef<TypeCaseElem>> {
        let mut items = Vec::new();
        loop {
            let is_nil = self.at(TokKind::Ident)
                && matches!(self.peek_at(1), TokKind::Comma | TokKind::Colon)
                && self.toks.table().text(self.source, self.pos) == "nil";
            items.push(if is_nil {
                TypeCaseElem::Nil(self.bump()?)
            } else {
                TypeCaseElem::Type(req!(self.parse_type()))
            });
            if self.eat(TokKind::Comma)?.is_none() {
                break;
            }
        }
        Ok(Some(self.arena.list_type_cases(items)))
    }

    fn select_stmt(&mut self) -> PResult<StmtId> {
        let select_tok = self.bump()?;
        let l_brace = req!(self.expect(TokKind::LBrace));
        let clauses = req!(self.nested(|p| {
            let mut ids = Vec::new();
            let mut seen_default = false;
            while !p.at(TokKind::RBrace) {
                ids.push(req!(p.comm_clause(&mut seen_default)));
            }
            Ok(Some(ids))
        }));
        let r_brace = req!(self.expect(TokKind::RBrace));
        let clauses = self.arena.list_comm_clause_ids(clauses);
        let span = self.span_from(select_tok);
        Ok(Some(self.arena.stmts.alloc(
            Stmt::Select {
                select_tok,
                l_brace,
                clauses,
                r_brace,
            },
            span,
        )))
    }

    fn comm_clause(&mut self, seen_default: &mut bool) -> PResult<CommClauseId> {
        self.with_scope(ScopeKind::Block, |p, scope| {
            let (tok, is_default) = req!(p.clause_head());
            p.check_single_default(seen_default, is_default, tok, "select");
            let comm = if is_default {
                None
            } else {
                Some(req!(p.comm_stmt()))
            };
            let colon = req!(p.expect(TokKind::Colon));
            let stmts = req!(p.stmt_list());
            let node = match comm {
                Some(comm) => CommClause::Case {
                    case_tok: tok,
                    scope,
                    comm,
                    colon,
                    stmts,
                },
                None => CommClause::Default {
                    default_tok: tok,
                    scope,
                    colon,
                    stmts,
                },
            };
            let span = p.span_from(tok);
            Ok(Some(p.arena.comm_clauses.alloc(node, span)))
        })
    }

    fn comm_stmt(&mut self) -> PResult<CommStmt> {
        let define = self.attempt("comm define", |p| {
            let names = req!(p.ident_list());
            let op_tok = req!(p.expect(TokKind::Define));
            Ok(Some((names, op_tok)))
        })?;
        if let Some((names, op_tok)) = define {
            let recv = req!(self.expr());
            self.check_receive(recv);
            let scope = self.cur_scope;
            let visible = self.pos;
            for (i, &n) in names.iter().enumerate() {
                self.declare(scope, n, DeclRef::CommRecv(recv, i as u32), visible);
            }
            let names = self.arena.list_ident_names(names);
            return Ok(Some(CommStmt::Recv {
                lhs: Some(RangeLhs::Define { names, op_tok }),
                recv,
            }));
        }
        let lhs = req!(self.expr_vec());
        match self.peek() {
            TokKind::Arrow if lhs.len() == 1 => {
                let arrow = self.bump()?;
                let value = req!(self.expr());
                Ok(Some(CommStmt::Send {
                    chan: lhs[0],
                    arrow,
                    value,
                }))
            }
            TokKind::Assign => {
                let op_tok = self.bump()?;
                let recv = req!(self.expr());
                self.check_receive(recv);
                let exprs = self.arena.list_exprs(lhs);
                Ok(Some(CommStmt::Recv {
                    lhs: Some(RangeLhs::Assign { exprs, op_tok }),
                    recv,
                }))
            }
            _ if lhs.len() == 1 => {
                self.check_receive(lhs[0]);
                Ok(Some(CommStmt::Recv {
                    lhs: None,
                    recv: lhs[0],
                }))
            }
            _ => self.fail("<- or = or :="),
        }
    }

    fn check_receive(&mut self, e: ExprId) {
        let mut cur = e;
        while let Expr::Paren { inner, .. } = self.arena.exprs[cur] {
            cur = inner;
        }
        if !matches!(self.arena.exprs[cur], Expr::Unary { op: UnaryOp::Recv, .. }) {
            let span = self.arena.exprs.span(e);
            self.report(DiagKind::Syntax, span, "select case must be receive, send or assign recv");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::cst::*;
    use crate::error::DiagKind;
    use crate::parser::tests::parse;
    use crate::parser::ParsedFile;
    use crate::scope::{DeclRef, Lookup};

    fn body(src: &str) -> ParsedFile {
        parse(&format!("package p\nfunc f() {{\n{src}\n}}\n"))
    }

    fn ok(src: &str) -> ParsedFile {
        let f = body(src);
        assert!(f.cst.is_some(), "{src}: {:?}", f.diags);
        assert!(f.diags.is_empty(), "{src}: {:?}", f.diags);
        f
    }

    /// Every identifier operand spelled `name`, in source order.
    fn uses(f: &ParsedFile, name: &str) -> Vec<(ExprId, IdentName, crate::scope::ScopeId)> {
        let cst = f.cst.as_ref().unwrap();
        let mut v: Vec<_> = cst
            .arena
            .exprs
            .ids()
            .filter_map(|id| match cst.arena.exprs[id] {
                Expr::Ident { name: n, scope } if f.ident(n.sym) == name => Some((id, n, scope)),
                _ => None,
            })
            .collect();
        v.sort_by_key(|(_, n, _)| n.tok);
        v
    }

    #[test]
    fn statements_of_every_kind() {
        ok(r#"
	var a, b int
	const c = 1
	type t struct{}
	a, b = b, a
	a += c
	a++
	ch := make(chan int)
	ch <- a
	go g()
	defer g()
	if a > 0 { return } else if b > 0 { a-- } else {}
	for {}
	for a < 10 { a++ }
	for i := 0; i < 10; i++ {}
	for range ch {}
	for k, v := range m {}
	switch { case a > 0: fallthrough; default: }
	select { case v := <-ch: _ = v; case ch <- 1: default: }
L:
	for { break L }
	goto L
	{ }
"#);
    }

    #[test]
    fn short_var_needs_a_new_name() {
        let f = body("a := 1\na := 2\n_ = a");
        let d: Vec<_> = f.diags.iter().filter(|d| d.kind == DiagKind::Declaration).collect();
        assert_eq!(d.len(), 1);
        assert!(d[0].message.contains("no new variables"));

        let f = body("a, a := 1, 2");
        assert!(f.diags.iter().any(|d| d.message.contains("a repeated on left side of :=")));
    }

    #[test]
    fn short_var_may_redeclare_alongside_new() {
        ok("a, err := 1, 2\nb, err := 3, 4\n_, _, _ = a, b, err");
    }

    #[test]
    fn inner_declaration_sees_outer_name_in_its_initializer() {
        let f = ok("x := 1\n{\n\tx := x + 1\n\t_ = x\n}");
        let xs = uses(&f, "x");
        // `x + 1` and `_ = x` inside the block.
        assert_eq!(xs.len(), 2);
        let (_, init_use, init_scope) = xs[0];
        let (_, later_use, later_scope) = xs[1];
        let outer = f.scopes.lookup(init_scope, init_use.sym, init_use.tok);
        let inner = f.scopes.lookup(later_scope, later_use.sym, later_use.tok);
        let (Lookup::Local(s1, _), Lookup::Local(s2, _)) = (outer, inner) else {
            panic!("both resolve locally");
        };
        assert_ne!(s1, s2);
    }

    #[test]
    fn if_header_names_are_scoped_to_the_statement() {
        let f = ok("if v := 1; v > 0 { _ = v } else { _ = v }");
        for (_, n, scope) in uses(&f, "v") {
            assert!(matches!(f.scopes.lookup(scope, n.sym, n.tok), Lookup::Local(..)));
        }
    }

    #[test]
    fn range_variables_bind_to_the_range_expression() {
        let f = ok("for i, s := range xs { _, _ = i, s }");
        let (_, n, scope) = uses(&f, "i")[0];
        let Lookup::Local(_, b) = f.scopes.lookup(scope, n.sym, n.tok) else {
            panic!("i resolves");
        };
        assert!(matches!(b.decl, DeclRef::Range(_, 0)));

        let f = body("for a, b, c := range xs {}");
        assert!(f.diags.iter().any(|d| d.message.contains("at most two")));
    }

    #[test]
    fn type_switch_binds_per_clause() {
        let f = ok("switch v := x.(type) {\ncase int, string:\n\t_ = v\ncase nil:\n\t_ = v\ndefault:\n}");
        let cst = f.cst.as_ref().unwrap();
        let clauses: Vec<_> = cst.arena.switch_clauses.ids().collect();
        assert_eq!(clauses.len(), 3);
        let SwitchClause::TypeCase { items, .. } = cst.arena.switch_clauses[clauses[1]] else {
            panic!("type clause");
        };
        assert!(matches!(cst.arena.type_case_elems(items)[0], TypeCaseElem::Nil(_)));
        let decls: Vec<_> = uses(&f, "v")
            .into_iter()
            .map(|(_, n, scope)| match f.scopes.lookup(scope, n.sym, n.tok) {
                Lookup::Local(_, b) => b.decl,
                Lookup::Outer => panic!("v resolves"),
            })
            .collect();
        assert!(matches!(decls[0], DeclRef::TypeSwitch(_, c) if c == clauses[0]));
        assert!(matches!(decls[1], DeclRef::TypeSwitch(_, c) if c == clauses[1]));
    }

    #[test]
    fn composite_literal_in_header_needs_parens() {
        ok("if x == (T{}) {}");
        ok("for _, v := range []int{1, 2} { _ = v }");
        // `T {` ends the header: the composite is parsed as the block.
        let f = body("if x == T{} {}");
        assert!(f.cst.is_none());
    }

    #[test]
    fn post_statement_cannot_declare() {
        let f = body("for i := 0; i < 3; j := 1 {}");
        assert!(f.diags.iter().any(|d| d.message.contains("post statement")));
    }

    #[test]
    fn multiple_defaults() {
        let f = body("switch { default:\ndefault: }");
        assert!(f.diags.iter().any(|d| d.message.contains("multiple defaults")));
    }

    #[test]
    fn select_cases_must_communicate() {
        let f = body("select { case f(): }");
        assert!(f.diags.iter().any(|d| d.message.contains("select case")));
    }

    #[test]
    fn labeled_empty_statement() {
        ok("goto End\nEnd:");
    }
}
