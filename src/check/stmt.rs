//! Function bodies and statements.

use std::collections::HashMap;
use std::sync::Arc;

use super::decl::default_type;
use super::expr::{op_allowed, unparen, Mode, Operand, Site};
use super::{CResult, Checker, Entity, FuncCtx, Group};
use crate::constant::Value;
use crate::cst::{
    AssignOp, Block, ChanDir, CommClause, CommStmt, DeclId, Expr, ExprId, ForKind, IncDecOp, RangeLhs,
    SimpleStmt, SimpleStmtId, Spec, Stmt, StmtId, SwitchClause, SwitchClauseId, TypeCaseElem,
    TypeSwitchGuard, UnaryOp,
};
use crate::error::{FileId, Span};
use crate::scope::{DeclRef, ScopeId};
use crate::types::{self, BasicKind, Signature, Type};

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

impl<'a> Checker<'a> {
    pub(super) fn func_body(&mut self, f: FileId, sig: Arc<Signature>, body: &Block) -> CResult<()> {
        self.funcs.push(FuncCtx { sig });
        let iota = self.iota.take();
        let r = self.block(f, body);
        self.iota = iota;
        self.funcs.pop();
        r
    }

    fn block(&mut self, f: FileId, b: &Block) -> CResult<()> {
        self.stmt_list(f, b.scope, b.stmts)
    }

    fn stmt_list(&mut self, f: FileId, scope: ScopeId, stmts: crate::cst::ListRef<StmtId>) -> CResult<()> {
        let a = self.unit(f)?.arena();
        for &s in a.stmts_list(stmts) {
            self.stmt(f, scope, s)?;
        }
        Ok(())
    }

    fn span_text(&self, f: FileId, span: Span) -> CResult<String> {
        Ok(self.unit(f)?.file.source.slice(span.start, span.end).into_owned())
    }

    fn stmt(&mut self, f: FileId, scope: ScopeId, s: StmtId) -> CResult<()> {
        let a = self.unit(f)?.arena();
        match a.stmts[s] {
            Stmt::Simple(ss) => self.simple_stmt(f, scope, ss),
            Stmt::Decl(d) => self.local_decl(f, d),
            Stmt::Labeled { body, .. } => self.stmt(f, scope, body),
            Stmt::Go { call, .. } => self.go_defer(f, "go", call),
            Stmt::Defer { call, .. } => self.go_defer(f, "defer", call),
            Stmt::Return { results, .. } => {
                let span = a.stmts.span(s);
                self.return_stmt(f, span, a.exprs_list(results))
            }
            Stmt::Branch(_) => Ok(()),
            Stmt::Block(b) => self.block(f, &b),
            Stmt::If {
                scope: is,
                init,
                cond,
                then_block,
                else_stmt,
                ..
            } => {
                if let Some(init) = init {
                    self.simple_stmt(f, is, init)?;
                }
                self.condition(f, cond, "if")?;
                self.block(f, &then_block)?;
                if let Some(e) = else_stmt {
                    self.stmt(f, is, e)?;
                }
                Ok(())
            }
            Stmt::For {
                scope: fs,
                kind,
                body,
                ..
            } => {
                match kind {
                    ForKind::Infinite => {}
                    ForKind::Cond(c) => self.condition(f, c, "for")?,
                    ForKind::Clause { init, cond, post } => {
                        if let Some(init) = init {
                            self.simple_stmt(f, fs, init)?;
                        }
                        if let Some(c) = cond {
                            self.condition(f, c, "for")?;
                        }
                        if let Some(post) = post {
                            self.simple_stmt(f, fs, post)?;
                        }
                    }
                    ForKind::Range { lhs, range_expr, .. } => self.range_clause(f, lhs, range_expr)?,
                }
                self.block(f, &body)
            }
            Stmt::Switch {
                scope: ss,
                init,
                tag,
                clauses,
                ..
            } => {
                if let Some(init) = init {
                    self.simple_stmt(f, ss, init)?;
                }
                self.expr_switch(f, tag, a.switch_clause_ids(clauses))
            }
            Stmt::TypeSwitch {
                scope: ss,
                init,
                guard,
                clauses,
                ..
            } => {
                if let Some(init) = init {
                    self.simple_stmt(f, ss, init)?;
                }
                self.type_switch(f, guard, a.switch_clause_ids(clauses))
            }
            Stmt::Select { clauses, .. } => {
                for &c in a.comm_clause_ids(clauses) {
                    match a.comm_clauses[c] {
                        CommClause::Case {
                            scope: cs,
                            comm,
                            stmts,
                            ..
                        } => {
                            let span = a.comm_clauses.span(c);
                            self.comm(f, span, comm)?;
                            self.stmt_list(f, cs, stmts)?;
                        }
                        CommClause::Default { scope: cs, stmts, .. } => self.stmt_list(f, cs, stmts)?,
                    }
                }
                Ok(())
            }
        }
    }

    fn local_decl(&mut self, f: FileId, d: DeclId) -> CResult<()> {
        let a = self.unit(f)?.arena();
        for spec in a.specs_list(a.decls[d].specs) {
            match *spec {
                Spec::Value(v) => {
                    let vs = a.value_specs[v];
                    for i in 0..vs.names.len() as u32 {
                        let decl = if vs.is_const {
                            DeclRef::Const(v, i)
                        } else {
                            DeclRef::Var(v, i)
                        };
                        self.object_of(f, decl)?;
                    }
                }
                Spec::Type(t) => {
                    self.object_of(f, DeclRef::Type(t))?;
                }
                Spec::Import(_) => {}
            }
        }
        Ok(())
    }

    fn condition(&mut self, f: FileId, e: ExprId, kw: &str) -> CResult<()> {
        let x = self.value_operand(f, e)?;
        if !x.is_invalid() && !op_allowed(&x.typ, BasicKind::is_boolean) {
            let span = self.expr_span(f, e)?;
            self.error(f, span, format!("non-boolean condition in {kw} statement"));
        }
        Ok(())
    }

    fn go_defer(&mut self, f: FileId, kw: &str, call: ExprId) -> CResult<()> {
        let a = self.unit(f)?.arena();
        let span = self.expr_span(f, call)?;
        let inner = unparen(a, call);
        let x = self.expr(f, call)?;
        let Expr::Call { callee, .. } = a.exprs[inner] else {
            self.error(f, span, format!("expression in {kw} must be function call"));
            return Ok(());
        };
        if x.is_invalid() {
            return Ok(());
        }
        let discards = match self.expr(f, callee)?.mode {
            Mode::TypeExpr => true,
            Mode::Builtin(b) => !b.is_statement(),
            _ => false,
        };
        if discards {
            let text = self.expr_text(f, call)?;
            self.error(f, span, format!("{kw} discards result of {text}"));
        }
        Ok(())
    }

    fn return_stmt(&mut self, f: FileId, span: Span, results: &[ExprId]) -> CResult<()> {
        let Some(sig) = self.funcs.last().map(|c| c.sig.clone()) else {
            return Ok(());
        };
        if results.is_empty() {
            let named = sig.results.iter().all(|r| r.name.is_some());
            if !sig.results.is_empty() && !named {
                let want = Type::tuple(sig.results.iter().map(|r| r.typ.clone()).collect());
                self.error(f, span, format!("not enough return values\n\thave ()\n\twant {want}"));
            }
            return Ok(());
        }
        let targets: Vec<Option<Type>> = sig.results.iter().map(|r| Some(r.typ.clone())).collect();
        self.assign_list(f, &targets, results, span, "return statement", true)?;
        Ok(())
    }

    fn simple_stmt(&mut self, f: FileId, scope: ScopeId, ss: SimpleStmtId) -> CResult<()> {
        let a = self.unit(f)?.arena();
        let span = a.simple_stmts.span(ss);
        match a.simple_stmts[ss] {
            SimpleStmt::Empty(_) => Ok(()),
            SimpleStmt::Expr(e) => self.expr_stmt(f, e),
            SimpleStmt::Send { chan, value, .. } => self.send(f, span, chan, value),
            SimpleStmt::IncDec { target, op, .. } => {
                let x = self.value_operand(f, target)?;
                if x.is_invalid() {
                    return Ok(());
                }
                if !op_allowed(&x.typ, BasicKind::is_numeric) {
                    let text = self.expr_text(f, target)?;
                    let sym = if op == IncDecOp::Inc { "++" } else { "--" };
                    self.error(
                        f,
                        span,
                        format!("invalid operation: {text}{sym} (non-numeric type {})", x.typ),
                    );
                    return Ok(());
                }
                self.assign_target(f, target, x)?;
                Ok(())
            }
            SimpleStmt::Assign { lhs, op, rhs, .. } => {
                let (lhs, rhs) = (a.exprs_list(lhs), a.exprs_list(rhs));
                match op {
                    AssignOp::Assign => {
                        let mut targets = Vec::with_capacity(lhs.len());
                        for &l in lhs {
                            if self.is_blank(f, l)? {
                                targets.push(None);
                                continue;
                            }
                            let x = self.value_operand(f, l)?;
                            targets.push(Some(self.assign_target(f, l, x)?));
                        }
                        self.assign_values(f, &targets, rhs, span, "assignment")?;
                    }
                    AssignOp::Op(bop) => {
                        let (&[l], &[r]) = (lhs, rhs) else {
                            self.error(
                                f,
                                span,
                                format!("assignment operation {}= requires single-valued expressions", bop.as_str()),
                            );
                            return Ok(());
                        };
                        let x = self.value_operand(f, l)?;
                        let y = self.value_operand(f, r)?;
                        let site = Site {
                            span,
                            text: self.span_text(f, span)?,
                        };
                        let res = self.binary_op(f, &site, bop, (x.clone(), l), (y, r))?;
                        if !res.is_invalid() {
                            self.assign_target(f, l, x)?;
                        }
                    }
                }
                Ok(())
            }
            SimpleStmt::ShortVarDecl { names, .. } => {
                let sc = self.unit(f)?.file.scopes.get(scope);
                let mut existing = Vec::with_capacity(names.len());
                for (i, n) in a.ident_names(names).iter().enumerate() {
                    let t = match sc.get(n.sym) {
                        Some(b) if b.decl != DeclRef::ShortVar(ss, i as u32) => {
                            match self.object_of(f, b.decl)? {
                                Entity::Var(t) => Some(t),
                                _ => {
                                    let nspan = self.tok_span(f, n.tok)?;
                                    let name = self.ident_text(f, *n)?;
                                    self.error(f, nspan, format!("cannot assign to {name}"));
                                    Some(Type::Invalid)
                                }
                            }
                        }
                        _ => None,
                    };
                    existing.push(t);
                }
                self.short_var_types(f, ss, Some(existing))?;
                Ok(())
            }
        }
    }

    fn is_blank(&self, f: FileId, e: ExprId) -> CResult<bool> {
        let a = self.unit(f)?.arena();
        Ok(match a.exprs[unparen(a, e)] {
            Expr::Ident { name, .. } => self.ident_text(f, name)? == "_",
            _ => false,
        })
    }

    /// Type of an assignment destination; reports operands that cannot be
    /// assigned to.
    fn assign_target(&mut self, f: FileId, e: ExprId, x: Operand) -> CResult<Type> {
        if x.is_invalid() {
            return Ok(Type::Invalid);
        }
        match x.mode {
            Mode::Var | Mode::MapIndex => Ok(x.typ),
            _ => {
                let span = self.expr_span(f, e)?;
                let d = self.describe(f, e, &x)?;
                self.error(
                    f,
                    span,
                    format!("cannot assign to {d} (neither addressable nor a map index expression)"),
                );
                Ok(Type::Invalid)
            }
        }
    }

    fn expr_stmt(&mut self, f: FileId, e: ExprId) -> CResult<()> {
        let a = self.unit(f)?.arena();
        let x = self.expr(f, e)?;
        if x.is_invalid() {
            return Ok(());
        }
        let used = match a.exprs[unparen(a, e)] {
            Expr::Call { callee, .. } => match self.expr(f, callee)?.mode {
                Mode::TypeExpr => false,
                Mode::Builtin(b) => b.is_statement(),
                _ => true,
            },
            Expr::Unary {
                op: UnaryOp::Recv, ..
            } => true,
            _ => false,
        };
        if !used {
            let span = self.expr_span(f, e)?;
            let d = self.describe(f, e, &x)?;
            self.error(f, span, format!("{d} is not used"));
        }
        Ok(())
    }

    fn send(&mut self, f: FileId, span: Span, chan: ExprId, value: ExprId) -> CResult<()> {
        let c = self.value_operand(f, chan)?;
        let v = self.value_operand(f, value)?;
        if c.is_invalid() {
            return Ok(());
        }
        let msg = match c.typ.resolve() {
            Type::Chan(ChanDir::Recv, _) => "cannot send to receive-only channel",
            Type::Chan(_, el) => {
                self.assignment(f, v, &el, value, "send")?;
                return Ok(());
            }
            _ => "cannot send to non-channel",
        };
        let d = self.describe(f, chan, &c)?;
        self.error(f, span, format!("invalid operation: {msg} {d}"));
        Ok(())
    }

    fn comm(&mut self, f: FileId, span: Span, comm: CommStmt) -> CResult<()> {
        let a = self.unit(f)?.arena();
        match comm {
            CommStmt::Send { chan, value, .. } => self.send(f, span, chan, value),
            CommStmt::Recv { lhs, recv } => {
                if !matches!(
                    a.exprs[unparen(a, recv)],
                    Expr::Unary {
                        op: UnaryOp::Recv,
                        ..
                    }
                ) {
                    let rspan = self.expr_span(f, recv)?;
                    self.error(f, rspan, "select case must be receive, send or assign recv");
                    return Ok(());
                }
                match lhs {
                    Some(RangeLhs::Assign { exprs, .. }) => {
                        let mut targets = Vec::new();
                        for &l in a.exprs_list(exprs) {
                            if self.is_blank(f, l)? {
                                targets.push(None);
                                continue;
                            }
                            let x = self.value_operand(f, l)?;
                            targets.push(Some(self.assign_target(f, l, x)?));
                        }
                        self.assign_values(f, &targets, &[recv], span, "assignment")?;
                    }
                    // Defined names are typed when referenced.
                    Some(RangeLhs::Define { .. }) | None => {
                        self.expr(f, recv)?;
                    }
                }
                Ok(())
            }
        }
    }

    fn expr_switch(&mut self, f: FileId, tag: Option<ExprId>, clauses: &[SwitchClauseId]) -> CResult<()> {
        let a = self.unit(f)?.arena();
        let tag = match tag {
            Some(t) => {
                let x = self.value_operand(f, t)?;
                let x = if x.typ.is_untyped() && !x.is_invalid() {
                    let ty = self.var_type(f, x.clone(), t, "switch expression")?;
                    self.implicit(&x, &ty).unwrap_or_else(|_| Operand::invalid())
                } else {
                    x
                };
                Some((x, t))
            }
            None => None,
        };
        let mut seen: HashMap<Value, ExprId> = HashMap::new();
        for &c in clauses {
            let SwitchClause::ExprCase {
                scope: cs,
                items,
                stmts,
                ..
            } = a.switch_clauses[c]
            else {
                continue;
            };
            for &item in a.exprs_list(items) {
                let y = self.value_operand(f, item)?;
                if y.is_invalid() {
                    continue;
                }
                let span = self.expr_span(f, item)?;
                let text = self.expr_text(f, item)?;
                let y = match &tag {
                    Some((x, _)) if x.is_invalid() => continue,
                    Some((x, xe)) => {
                        let conv = self.implicit(&y, &x.typ).ok();
                        let ok = match &conv {
                            Some(y2) => {
                                types::identical(&y2.typ, &x.typ)
                                    || self.assignable(&y2.typ, &x.typ)?.is_ok()
                                    || self.assignable(&x.typ, &y2.typ)?.is_ok()
                            }
                            None => false,
                        };
                        if !ok {
                            let xt = self.expr_text(f, *xe)?;
                            self.error(
                                f,
                                span,
                                format!(
                                    "invalid case {text} in switch on {xt} (mismatched types {} and {})",
                                    y.typ, x.typ
                                ),
                            );
                            continue;
                        }
                        conv.unwrap_or(y)
                    }
                    None => {
                        if !op_allowed(&y.typ, BasicKind::is_boolean) {
                            self.error(
                                f,
                                span,
                                format!("invalid case {text} in switch (mismatched types {} and bool)", y.typ),
                            );
                            continue;
                        }
                        y
                    }
                };
                if let Mode::Const(v) = y.mode {
                    if seen.insert(v, item).is_some() {
                        self.error(f, span, format!("duplicate case {text} in expression switch"));
                    }
                }
            }
            self.stmt_list(f, cs, stmts)?;
        }
        Ok(())
    }

    fn type_switch(&mut self, f: FileId, guard: TypeSwitchGuard, clauses: &[SwitchClauseId]) -> CResult<()> {
        let a = self.unit(f)?.arena();
        let subject = guard.subject;
        let x = self.value_operand(f, subject)?;
        let iface = if x.is_invalid() {
            None
        } else {
            match x.typ.underlying() {
                Type::Interface(i) => Some(i),
                _ => {
                    let span = self.expr_span(f, subject)?;
                    let d = self.describe(f, subject, &x)?;
                    self.error(f, span, format!("{d} is not an interface"));
                    None
                }
            }
        };
        let mut seen: Vec<Type> = Vec::new();
        let mut seen_nil = false;
        for &c in clauses {
            let SwitchClause::TypeCase {
                scope: cs,
                items,
                stmts,
                ..
            } = a.switch_clauses[c]
            else {
                continue;
            };
            for item in a.type_case_elems(items) {
                match *item {
                    TypeCaseElem::Nil(tok) => {
                        if std::mem::replace(&mut seen_nil, true) {
                            let span = self.tok_span(f, tok)?;
                            self.error(f, span, "multiple nil cases in type switch");
                        }
                    }
                    TypeCaseElem::Type(t) => {
                        let ty = self.type_expr(f, t)?;
                        if ty.is_invalid() {
                            continue;
                        }
                        let span = a.types.span(t);
                        if let Some(i) = &iface {
                            if !ty.is_interface() {
                                if let Some(why) = self.missing_method(&ty, i)? {
                                    let d = self.describe(f, subject, &x)?;
                                    self.error(
                                        f,
                                        span,
                                        format!("impossible type switch case: {d} cannot have dynamic type {ty} ({why})"),
                                    );
                                }
                            }
                        }
                        if seen.iter().any(|s| types::identical(s, &ty)) {
                            self.error(f, span, format!("duplicate case {ty} in type switch"));
                        } else {
                            seen.push(ty);
                        }
                    }
                }
            }
            self.stmt_list(f, cs, stmts)?;
        }
        Ok(())
    }

    fn range_clause(&mut self, f: FileId, lhs: Option<RangeLhs>, e: ExprId) -> CResult<()> {
        let a = self.unit(f)?.arena();
        let ts = self.range_types(f, e)?;
        let Some(lhs) = lhs else {
            return Ok(());
        };
        let x = self.expr(f, e)?;
        if x.is_invalid() {
            return Ok(());
        }
        let n = match lhs {
            RangeLhs::Define { names, .. } => names.len(),
            RangeLhs::Assign { exprs, .. } => exprs.len(),
        };
        if n > ts.len() {
            let span = self.expr_span(f, e)?;
            let d = self.describe(f, e, &x)?;
            let msg = match ts.len() {
                0 => format!("range over {d} permits no iteration variables"),
                1 => format!("range over {d} permits only one iteration variable"),
                _ => "range clause permits at most two iteration variables".to_string(),
            };
            self.error(f, span, msg);
            return Ok(());
        }
        if let RangeLhs::Assign { exprs, .. } = lhs {
            for (i, &l) in a.exprs_list(exprs).iter().enumerate() {
                if self.is_blank(f, l)? {
                    continue;
                }
                let y = self.value_operand(f, l)?;
                let t = self.assign_target(f, l, y.clone())?;
                if t.is_invalid() {
                    continue;
                }
                if let Err(why) = self.assignable(&ts[i], &t)? {
                    let span = self.expr_span(f, l)?;
                    let d = self.describe(f, l, &y)?;
                    let why = if why.is_empty() { why } else { format!(": {why}") };
                    self.error(f, span, format!("cannot assign {} to {d} in range{why}", ts[i]));
                }
            }
        }
        Ok(())
    }

    /// Types of the iteration values of `range e`.
    pub(super) fn range_types(&mut self, f: FileId, e: ExprId) -> CResult<Arc<[Type]>> {
        self.group_types(f, Group::Range(e), |ck| ck.range_of(f, e))
    }

    fn range_of(&mut self, f: FileId, e: ExprId) -> CResult<Vec<Type>> {
        let x = self.value_operand(f, e)?;
        if x.is_invalid() {
            return Ok(vec![Type::Invalid, Type::Invalid]);
        }
        let int = Type::Basic(BasicKind::Int);
        let bad = match x.typ.resolve() {
            Type::Basic(k) if k.is_string() => return Ok(vec![int, Type::Basic(BasicKind::Int32)]),
            Type::Basic(k) if k.is_integer() => return Ok(vec![default_type(&x.typ)]),
            Type::Array(el, _) | Type::Slice(el) => return Ok(vec![int, (*el).clone()]),
            Type::Pointer(p) => match p.underlying() {
                Type::Array(el, _) => return Ok(vec![int, (*el).clone()]),
                _ => None,
            },
            Type::Map(k, v) => return Ok(vec![(*k).clone(), (*v).clone()]),
            Type::Chan(ChanDir::Send, _) => Some("receive from send-only channel"),
            Type::Chan(_, el) => return Ok(vec![(*el).clone()]),
            Type::Signature(sig) => match yield_params(&sig) {
                Some(ts) => return Ok(ts),
                None => None,
            },
            _ => None,
        };
        let span = self.expr_span(f, e)?;
        let d = self.describe(f, e, &x)?;
        let msg = match bad {
            Some(why) => format!("invalid operation: range {d} {why}"),
            None => format!("cannot range over {d}"),
        };
        self.error(f, span, msg);
        Ok(vec![Type::Invalid, Type::Invalid])
    }

    /// Typed assignment of `rhs` to `targets`; `None` targets take the
    /// default type of their value.
    pub(super) fn assign_values(
        &mut self,
        f: FileId,
        targets: &[Option<Type>],
        rhs: &[ExprId],
        span: Span,
        ctx: &str,
    ) -> CResult<Vec<Type>> {
        self.assign_list(f, targets, rhs, span, ctx, false)
    }

    fn assign_one(&mut self, f: FileId, x: Operand, target: &Option<Type>, e: ExprId, ctx: &str) -> CResult<Type> {
        match target {
            Some(t) => {
                self.assignment(f, x, t, e, ctx)?;
                Ok(t.clone())
            }
            None => self.var_type(f, x, e, ctx),
        }
    }

    fn assign_list(
        &mut self,
        f: FileId,
        targets: &[Option<Type>],
        rhs: &[ExprId],
        span: Span,
        ctx: &str,
        returns: bool,
    ) -> CResult<Vec<Type>> {
        let (n, m) = (targets.len(), rhs.len());
        if n == m {
            let mut out = Vec::with_capacity(n);
            for (t, &e) in targets.iter().zip(rhs) {
                let x = self.expr(f, e)?;
                out.push(self.assign_one(f, x, t, e, ctx)?);
            }
            return Ok(out);
        }
        let mut have = Vec::with_capacity(m);
        for &e in rhs {
            have.push(self.expr(f, e)?);
        }
        if let [x] = have.as_slice() {
            if x.is_invalid() {
                return Ok(vec![Type::Invalid; n]);
            }
            let e = rhs[0];
            let parts: Option<Vec<Operand>> = match (&x.typ, &x.mode) {
                (Type::Tuple(ts), Mode::Value) if ts.len() == n => {
                    Some(ts.iter().map(|t| Operand::value(t.clone())).collect())
                }
                (_, Mode::MapIndex | Mode::CommaOk) if n == 2 => Some(vec![
                    Operand::value(x.typ.clone()),
                    Operand::value(Type::Basic(BasicKind::UntypedBool)),
                ]),
                _ => None,
            };
            if let Some(parts) = parts {
                let mut out = Vec::with_capacity(n);
                for (t, p) in targets.iter().zip(parts) {
                    out.push(self.assign_one(f, p, t, e, ctx)?);
                }
                return Ok(out);
            }
        }
        let msg = if returns {
            let which = if m < n { "not enough" } else { "too many" };
            let have = have.iter().map(|x| x.typ.to_string()).collect::<Vec<_>>().join(", ");
            let want = targets
                .iter()
                .map(|t| t.as_ref().map_or_else(String::new, Type::to_string))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{which} return values\n\thave ({have})\n\twant ({want})")
        } else {
            let a = self.unit(f)?.arena();
            match (have.as_slice(), rhs) {
                ([x], &[e]) if matches!(a.exprs[unparen(a, e)], Expr::Call { .. }) => {
                    let k = match (&x.typ, &x.mode) {
                        (_, Mode::NoValue) => 0,
                        (Type::Tuple(ts), _) => ts.len(),
                        _ => 1,
                    };
                    let text = self.expr_text(f, e)?;
                    format!(
                        "assignment mismatch: {} but {text} returns {}",
                        plural(n, "variable"),
                        plural(k, "value")
                    )
                }
                _ => format!(
                    "assignment mismatch: {} but {}",
                    plural(n, "variable"),
                    plural(m, "value")
                ),
            }
        };
        self.error(f, span, msg);
        Ok(vec![Type::Invalid; n])
    }
}

/// Iteration values of a range-over-func iterator
/// `func(yield func(K, V) bool)`.
fn yield_params(sig: &Signature) -> Option<Vec<Type>> {
    let [p] = sig.params.as_slice() else {
        return None;
    };
    if !sig.results.is_empty() {
        return None;
    }
    let Type::Signature(y) = p.typ.underlying() else {
        return None;
    };
    let [r] = y.results.as_slice() else {
        return None;
    };
    if !r.typ.basic_kind().is_some_and(|k| k == BasicKind::Bool) || y.params.len() > 2 {
        return None;
    }
    Some(y.params.iter().map(|p| p.typ.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assert_clean, assert_error};

    #[test]
    fn unused_expressions() {
        assert_error("package p\nfunc f(x int) { x }\n", "x (variable of type int) is not used");
        assert_error("package p\nfunc f(x int) { int(x) }\n", "int(x) (value of type int) is not used");
        assert_error("package p\nfunc f(s []int) { len(s) }\n", "len(s) (value of type int) is not used");
        assert_clean("package p\nfunc g() int { return 1 }\nfunc f(c chan int) { g(); <-c; panic(1) }\n");
    }

    #[test]
    fn return_counts() {
        assert_error("package p\nfunc f() (int, error) { return 1 }\n", "not enough return values");
        assert_error("package p\nfunc f() { return 1 }\n", "too many return values");
        assert_error("package p\nfunc f() int { return }\n", "not enough return values");
        assert_clean(
            "package p\nfunc g() (int, error) { return 0, nil }\nfunc f() (n int, err error) { if n > 0 { return } ; return g() }\n",
        );
    }

    #[test]
    fn conditions_must_be_boolean() {
        assert_error("package p\nfunc f(n int) { if n {} }\n", "non-boolean condition in if statement");
        assert_error("package p\nfunc f(n int) { for n {} }\n", "non-boolean condition in for statement");
    }

    #[test]
    fn assignment_counts() {
        assert_error("package p\nfunc f() { a, b := 1 }\n", "assignment mismatch: 2 variables but 1 value");
        assert_error(
            "package p\nfunc g() int { return 0 }\nfunc f() { a, b := g() }\n",
            "assignment mismatch: 2 variables but g() returns 1 value",
        );
        assert_clean("package p\nfunc f(m map[string]int, x any) { v, ok := m[\"k\"]; s, ok2 := x.(string); _, _, _, _ = v, ok, s, ok2 }\n");
    }

    #[test]
    fn short_declarations_reuse_existing_names() {
        assert_error(
            "package p\nfunc f() { a, b := 1, 2; a, c := \"x\", 3; _, _, _ = a, b, c }\n",
            "cannot use \"x\" (untyped string constant) as int value in assignment",
        );
    }

    #[test]
    fn assignments_need_addressable_targets() {
        assert_error(
            "package p\nfunc g() int { return 0 }\nfunc f() { g() = 1 }\n",
            "cannot assign to g() (value of type int) (neither addressable nor a map index expression)",
        );
        assert_clean("package p\nfunc f(m map[string]int, s []int, p *struct{ x int }) { m[\"a\"] = 1; s[0]++; p.x += 2 }\n");
    }

    #[test]
    fn range_clauses() {
        assert_error(
            "package p\nfunc f() { for i, v := range \"abc\" { var s string = v; _, _ = i, s } }\n",
            "cannot use v (variable of type int32) as string value in variable declaration",
        );
        assert_error(
            "package p\nfunc f() { for i, j := range 10 { _, _ = i, j } }\n",
            "range over 10 (untyped int constant) permits only one iteration variable",
        );
        assert_clean(
            "package p\nfunc f(m map[string][]int, c <-chan bool, seq func(func(int, string) bool)) {\n\tfor k, v := range m { _, _ = k, v }\n\tfor b := range c { _ = b }\n\tfor i, s := range seq { _, _ = i, s }\n}\n",
        );
        assert_error("package p\nfunc f(x struct{}) { for range x {} }\n", "cannot range over x");
    }

    #[test]
    fn switch_statements() {
        assert_error(
            "package p\nfunc f(x int) { switch x { case 1, 2, 1: } }\n",
            "duplicate case 1 in expression switch",
        );
        assert_error(
            "package p\nfunc f(x int) { switch x { case \"a\": } }\n",
            "invalid case \"a\" in switch on x (mismatched types untyped string and int)",
        );
        assert_error(
            "package p\nfunc f(x int) { switch { case x: } }\n",
            "invalid case x in switch (mismatched types int and bool)",
        );
        assert_clean("package p\nfunc f(x int) { switch { case x > 1, x < 0: default: } }\n");
    }

    #[test]
    fn type_switches() {
        assert_error(
            "package p\ntype I interface{ M() }\nfunc f(x I) { switch x.(type) { case int: } }\n",
            "impossible type switch case: x (variable of type p.I) cannot have dynamic type int (missing method M)",
        );
        assert_error(
            "package p\nfunc f(x any) { switch x.(type) { case int, string, int: } }\n",
            "duplicate case int in type switch",
        );
        assert_error(
            "package p\nfunc f(x any) { switch v := x.(type) { case int: var s string = v; _ = s } }\n",
            "cannot use v (variable of type int) as string value in variable declaration",
        );
    }

    #[test]
    fn go_and_defer_need_calls() {
        assert_error("package p\nfunc f(x int) { defer x }\n", "expression in defer must be function call");
        assert_error("package p\nfunc f(s []int) { go len(s) }\n", "go discards result of len(s)");
        assert_clean("package p\nfunc f(c chan int) { defer close(c); go func() {}() }\n");
    }

    #[test]
    fn channel_operations() {
        assert_error(
            "package p\nfunc f(c <-chan int) { c <- 1 }\n",
            "invalid operation: cannot send to receive-only channel c (variable of type <-chan int)",
        );
        assert_clean(
            "package p\nfunc f(in <-chan int, out chan<- int) {\n\tselect {\n\tcase v, ok := <-in:\n\t\t_, _ = v, ok\n\tcase out <- 1:\n\tdefault:\n\t}\n}\n",
        );
    }
}
