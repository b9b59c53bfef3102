//! Declarations: the per-declaration memo, constants with `iota`, variables,
//! defined types and aliases, functions, methods and type parameters.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::expr::Mode;
use super::{CResult, CheckAbort, CheckState, Checker, Entity, Group, Memo};
use crate::constant::Value;
use crate::cst::{
    ExprId, FuncDeclId, IdentName, SimpleStmt, SwitchClause, TypeCaseElem,
    TypeParamDeclId, TypeParamsId, TypeSpecId, ValueSpecId,
};
use crate::error::{DiagKind, FileId, Span};
use crate::scope::DeclRef;
use crate::types::{
    self, fresh_type_id, BasicKind, Interface, Method, Named, NamedState, Signature, Type,
    TypeParam,
};

impl<'a> Checker<'a> {
    pub(super) fn state_of(&self, f: FileId, decl: DeclRef) -> CheckState {
        self.memo
            .get(&(f, decl))
            .map_or(CheckState::Unchecked, |m| m.state)
    }

    /// The entity a declaration denotes, computed at most once.
    pub(super) fn object_of(&mut self, f: FileId, decl: DeclRef) -> CResult<Entity> {
        let key = (f, decl);
        if let Some(m) = self.memo.get(&key) {
            match m.state {
                CheckState::Done => return Ok(m.entity.clone()),
                CheckState::InProgress => {
                    let handle = m.entity.clone();
                    return self.reentered(f, decl, handle);
                }
                CheckState::Unchecked => {}
            }
        }
        self.memo.insert(
            key,
            Memo {
                state: CheckState::InProgress,
                entity: Entity::Invalid,
            },
        );
        let saved_iota = self.iota.take();
        let result = self.compute(f, decl);
        self.iota = saved_iota;
        let entity = result?;
        self.memo.insert(
            key,
            Memo {
                state: CheckState::Done,
                entity: entity.clone(),
            },
        );
        Ok(entity)
    }

    fn reentered(&mut self, f: FileId, decl: DeclRef, handle: Entity) -> CResult<Entity> {
        if matches!(handle, Entity::TypeName(_)) {
            // A defined type being resolved: its handle is usable already.
            return Ok(handle);
        }
        let name = self.decl_name(f, decl)?;
        let text = self.ident_text(f, name)?;
        let span = self.tok_span(f, name.tok)?;
        let msg = match decl {
            DeclRef::Type(_) => format!("invalid recursive type alias {text}"),
            DeclRef::Const(..) => format!("invalid recursive constant {text}"),
            DeclRef::Var(..) => format!("initialization cycle: {text} refers to itself"),
            _ => format!("invalid recursive reference to {text}"),
        };
        self.report(DiagKind::Type, f, span, msg);
        Ok(Entity::Invalid)
    }

    /// The identifier that declares `decl`.
    pub(super) fn decl_name(&self, f: FileId, decl: DeclRef) -> CResult<IdentName> {
        let u = self.unit(f)?;
        let a = u.arena();
        let pick = |names: &[IdentName], i: u32| {
            names
                .get(i as usize)
                .copied()
                .ok_or_else(|| CheckAbort::Internal(format!("declaration index {i} out of range")))
        };
        match decl {
            DeclRef::Import(_) => Err(CheckAbort::Internal("imports have no declaring name".into())),
            DeclRef::Const(s, i) | DeclRef::Var(s, i) => pick(a.ident_names(a.value_specs[s].names), i),
            DeclRef::Type(s) => Ok(a.type_specs[s].name),
            DeclRef::TypeParam(d, i) => pick(a.ident_names(a.type_param_decls[d].names), i),
            DeclRef::Func(id) => Ok(a.funcs[id].name),
            DeclRef::Param(fl, i) => pick(a.ident_names(a.fields[fl].names), i),
            DeclRef::Recv(id) => a.funcs[id]
                .recv
                .and_then(|r| r.name)
                .ok_or_else(|| CheckAbort::Internal("receiver without a name".into())),
            DeclRef::RecvTypeParam(id, i) => match a.funcs[id].recv {
                Some(r) => pick(a.ident_names(r.type_params), i),
                None => Err(CheckAbort::Internal("receiver type parameter without receiver".into())),
            },
            DeclRef::ShortVar(s, i) => match a.simple_stmts[s] {
                SimpleStmt::ShortVarDecl { names, .. } => pick(a.ident_names(names), i),
                _ => Err(CheckAbort::Internal("short variable outside := statement".into())),
            },
            DeclRef::Range(_, _) | DeclRef::TypeSwitch(..) | DeclRef::CommRecv(..) => {
                Err(CheckAbort::Internal("implicit variable has no declaring name".into()))
            }
        }
    }

    fn compute(&mut self, f: FileId, decl: DeclRef) -> CResult<Entity> {
        trace!(file = f.0, ?decl, "computing declaration");
        match decl {
            DeclRef::Import(spec) => Ok(self
                .imports
                .get(&f)
                .and_then(|es| es.iter().find(|e| e.spec == spec))
                .and_then(|e| e.pkg.clone())
                .map_or(Entity::Invalid, Entity::Package)),
            DeclRef::Const(spec, i) => self.const_decl(f, spec, i),
            DeclRef::Var(spec, i) => self.var_decl(f, spec, i),
            DeclRef::Type(spec) => self.type_decl(f, spec),
            DeclRef::TypeParam(d, i) => self.type_param(f, d, i),
            DeclRef::Func(id) => Ok(Entity::Func(Type::Signature(self.func_sig(f, id)?))),
            DeclRef::Param(field, _) => {
                let fl = self.unit(f)?.arena().fields[field];
                let t = self.type_expr(f, fl.typ)?;
                Ok(Entity::Var(if fl.ellipsis.is_some() {
                    Type::slice(t)
                } else {
                    t
                }))
            }
            DeclRef::Recv(id) => Ok(Entity::Var(self.receiver_type(f, id)?)),
            DeclRef::RecvTypeParam(id, i) => {
                let Some(base) = self.receiver_base(f, id)? else {
                    return Ok(Entity::TypeName(Type::Invalid));
                };
                Ok(Entity::TypeName(
                    base.type_params()
                        .get(i as usize)
                        .cloned()
                        .map_or(Type::Invalid, Type::TypeParam),
                ))
            }
            DeclRef::ShortVar(stmt, i) => {
                let ts = match self.groups.get(&(f, Group::Short(stmt))) {
                    Some(Some(ts)) => ts.clone(),
                    _ => self.short_var_types(f, stmt, None)?,
                };
                Ok(Entity::Var(ts.get(i as usize).cloned().unwrap_or(Type::Invalid)))
            }
            DeclRef::Range(expr, i) => {
                let ts = self.range_types(f, expr)?;
                Ok(Entity::Var(ts.get(i as usize).cloned().unwrap_or(Type::Invalid)))
            }
            DeclRef::TypeSwitch(subject, clause) => self.type_switch_var(f, subject, clause),
            DeclRef::CommRecv(recv, i) => {
                let x = self.expr(f, recv)?;
                Ok(Entity::Var(match i {
                    0 => default_type(&x.typ),
                    _ => Type::Basic(BasicKind::Bool),
                }))
            }
        }
    }

    fn const_decl(&mut self, f: FileId, spec: ValueSpecId, i: u32) -> CResult<Entity> {
        let a = self.unit(f)?.arena();
        let vs = a.value_specs[spec];
        // `const ( A T = iota; B )` repeats the previous spec's type and values.
        let src = vs.inherit.map_or(vs, |s| a.value_specs[s]);
        let values = a.exprs_list(src.values);
        let names = a.ident_names(vs.names);
        let name = names[i as usize];
        let invalid = Entity::Const {
            typ: Type::Invalid,
            val: Value::Unknown,
        };
        if vs.inherit.is_none() && i == 0 && values.len() > names.len() {
            let span = self.expr_span(f, values[names.len()])?;
            self.error(f, span, "extra init expr");
        }
        let Some(&value) = values.get(i as usize) else {
            let span = self.tok_span(f, name.tok)?;
            let msg = if values.is_empty() {
                "missing init expr for const declaration"
            } else {
                "missing init expr for const declaration (more names than values)"
            };
            self.error(f, span, msg);
            return Ok(invalid);
        };
        self.iota = Some(vs.iota);
        let declared = match src.typ {
            Some(t) => Some(self.type_expr(f, t)?),
            None => None,
        };
        if let Some(t) = &declared {
            if !t.is_invalid() && !t.basic_kind().is_some_and(BasicKind::is_const_type) {
                let span = self.tok_span(f, name.tok)?;
                self.error(f, span, format!("invalid constant type {t}"));
                return Ok(invalid);
            }
        }
        let x = self.expr(f, value)?;
        if x.is_invalid() {
            return Ok(invalid);
        }
        if !matches!(x.mode, Mode::Const(_)) {
            let span = self.expr_span(f, value)?;
            let d = self.describe(f, value, &x)?;
            self.error(f, span, format!("{d} is not constant"));
            return Ok(invalid);
        }
        let x = match declared {
            Some(t) => self.assignment(f, x, &t, value, "constant declaration")?,
            None => x,
        };
        Ok(match x.mode {
            Mode::Const(val) => Entity::Const { typ: x.typ, val },
            _ => invalid,
        })
    }

    fn var_decl(&mut self, f: FileId, spec: ValueSpecId, i: u32) -> CResult<Entity> {
        let a = self.unit(f)?.arena();
        let vs = a.value_specs[spec];
        let values = a.exprs_list(vs.values);
        let n = vs.names.len();
        let declared = match vs.typ {
            Some(t) => Some(self.type_expr(f, t)?),
            None => None,
        };
        if values.is_empty() {
            return Ok(Entity::Var(declared.unwrap_or(Type::Invalid)));
        }
        if values.len() == n {
            // Typed one by one so that `var a, b = b, 1` is not a cycle.
            let x = self.expr(f, values[i as usize])?;
            let t = match &declared {
                Some(t) => {
                    self.assignment(f, x, t, values[i as usize], "variable declaration")?;
                    t.clone()
                }
                None => self.var_type(f, x, values[i as usize], "variable declaration")?,
            };
            return Ok(Entity::Var(t));
        }
        let ts = self.group_types(f, Group::Spec(spec), |ck| {
            let targets = vec![declared.clone(); n];
            let span = ck.unit(f)?.arena().value_specs.span(spec);
            ck.assign_values(f, &targets, values, span, "variable declaration")
        })?;
        Ok(Entity::Var(ts.get(i as usize).cloned().unwrap_or(Type::Invalid)))
    }

    /// Memoized types of names declared together by one multi-value form.
    pub(super) fn group_types(
        &mut self,
        f: FileId,
        g: Group,
        compute: impl FnOnce(&mut Self) -> CResult<Vec<Type>>,
    ) -> CResult<Arc<[Type]>> {
        match self.groups.get(&(f, g)) {
            Some(Some(ts)) => return Ok(ts.clone()),
            Some(None) => return Ok(Arc::from(Vec::new())),
            None => {}
        }
        self.groups.insert((f, g), None);
        let ts: Arc<[Type]> = compute(self)?.into();
        self.groups.insert((f, g), Some(ts.clone()));
        Ok(ts)
    }

    /// Types of the names of a short variable declaration. `existing[i]` is
    /// the type of a name that was already declared in the same scope and
    /// is only assigned; without it every name is treated as new.
    pub(super) fn short_var_types(
        &mut self,
        f: FileId,
        stmt: crate::cst::SimpleStmtId,
        existing: Option<Vec<Option<Type>>>,
    ) -> CResult<Arc<[Type]>> {
        let a = self.unit(f)?.arena();
        let SimpleStmt::ShortVarDecl { names, values, .. } = a.simple_stmts[stmt] else {
            return Err(CheckAbort::Internal("short variable outside := statement".into()));
        };
        let span = a.simple_stmts.span(stmt);
        let values = a.exprs_list(values);
        let targets = existing.unwrap_or_else(|| vec![None; names.len()]);
        self.group_types(f, Group::Short(stmt), |ck| {
            ck.assign_values(f, &targets, values, span, "assignment")
        })
    }

    fn type_switch_var(
        &mut self,
        f: FileId,
        subject: ExprId,
        clause: crate::cst::SwitchClauseId,
    ) -> CResult<Entity> {
        let a = self.unit(f)?.arena();
        if let SwitchClause::TypeCase { items, .. } = a.switch_clauses[clause] {
            if let [TypeCaseElem::Type(t)] = a.type_case_elems(items) {
                return Ok(Entity::Var(self.type_expr(f, *t)?));
            }
        }
        Ok(Entity::Var(self.expr(f, subject)?.typ))
    }

    fn type_decl(&mut self, f: FileId, spec: TypeSpecId) -> CResult<Entity> {
        let ts = self.unit(f)?.arena().type_specs[spec];
        let name = self.ident_text(f, ts.name)?;
        if ts.is_alias() {
            if ts.type_params.is_some() {
                let span = self.tok_span(f, ts.name.tok)?;
                self.report(
                    DiagKind::Unsupported,
                    f,
                    span,
                    "generic type aliases are not supported",
                );
            }
            return Ok(Entity::TypeName(self.type_expr(f, ts.typ)?));
        }
        let n = Named::new(name, self.name.clone());
        n.begin_resolve();
        self.named.push(n.clone());
        if self
            .pkg
            .get(name)
            .is_some_and(|pb| pb.file == f && pb.binding.decl == DeclRef::Type(spec))
        {
            self.own_types.insert(n.id);
        }
        let handle = Type::Named(n.clone());
        self.memo.insert(
            (f, DeclRef::Type(spec)),
            Memo {
                state: CheckState::InProgress,
                entity: Entity::TypeName(handle.clone()),
            },
        );
        if let Some(tps) = ts.type_params {
            let list = self.type_param_list(f, tps)?;
            n.set_type_params(list);
        }
        let rhs = self.type_expr(f, ts.typ)?;
        let span = self.tok_span(f, ts.name.tok)?;
        let underlying = match &rhs {
            Type::Named(m) if m.origin().is_none() && m.state() != NamedState::Resolved => {
                self.error(f, span, format!("invalid recursive type {name}"));
                Type::Invalid
            }
            t => t.underlying(),
        };
        n.set_underlying(underlying);
        if embeds_by_value(&n.underlying(), n.id, &mut HashSet::new()) {
            self.error(f, span, format!("invalid recursive type {name}"));
            n.set_underlying(Type::Invalid);
        }
        Ok(Entity::TypeName(handle))
    }

    fn type_param(&mut self, f: FileId, d: TypeParamDeclId, i: u32) -> CResult<Entity> {
        let a = self.unit(f)?.arena();
        let decl = a.type_param_decls[d];
        let name = a.ident_names(decl.names)[i as usize];
        let tp = Arc::new(TypeParam {
            id: fresh_type_id(),
            name: self.ident_text(f, name)?.into(),
            index: i,
            constraint: RwLock::new(Type::Invalid),
        });
        let entity = Entity::TypeName(Type::TypeParam(tp.clone()));
        // Constraints may mention the parameter itself.
        self.memo.insert(
            (f, DeclRef::TypeParam(d, i)),
            Memo {
                state: CheckState::Done,
                entity: entity.clone(),
            },
        );
        let c = self.constraint(f, decl.constraint)?;
        *tp.constraint.write() = c;
        Ok(entity)
    }

    pub(super) fn type_param_list(&mut self, f: FileId, tps: TypeParamsId) -> CResult<Vec<Arc<TypeParam>>> {
        let a = self.unit(f)?.arena();
        let mut out = Vec::new();
        for &d in a.type_param_decl_ids(a.type_params[tps].params) {
            for i in 0..a.type_param_decls[d].names.len() as u32 {
                if let Entity::TypeName(Type::TypeParam(tp)) = self.object_of(f, DeclRef::TypeParam(d, i))? {
                    out.push(tp);
                }
            }
        }
        Ok(out)
    }

    pub(super) fn func_sig(&mut self, f: FileId, id: FuncDeclId) -> CResult<Arc<Signature>> {
        let fd = self.unit(f)?.arena().funcs[id];
        let tparams = match fd.type_params {
            Some(tps) => self.type_param_list(f, tps)?,
            None => Vec::new(),
        };
        let sig = self.signature(f, fd.sig, tparams)?;
        if fd.recv.is_some() {
            // Nothing may refer to the receiver, so its base is checked here.
            self.receiver_base(f, id)?;
        }
        let name = self.ident_text(f, fd.name)?;
        if fd.recv.is_none() && (name == "init" || (name == "main" && &*self.name == "main")) {
            let span = self.tok_span(f, fd.name.tok)?;
            if !sig.params.is_empty() || !sig.results.is_empty() {
                self.error(
                    f,
                    span,
                    format!("func {name} must have no arguments and no return values"),
                );
            }
            if !sig.type_params.is_empty() {
                self.error(f, span, format!("func {name} must have no type parameters"));
            }
        }
        if fd.body.is_none() && fd.recv.is_none() && name == "init" {
            let span = self.tok_span(f, fd.name.tok)?;
            self.error(f, span, "missing function body");
        }
        Ok(sig)
    }

    /// The package-level defined type a method is declared on.
    fn receiver_base(&mut self, f: FileId, id: FuncDeclId) -> CResult<Option<Arc<Named>>> {
        let Some(r) = self.unit(f)?.arena().funcs[id].recv else {
            return Ok(None);
        };
        let base = self.ident_text(f, r.base)?;
        let span = self.tok_span(f, r.base.tok)?;
        let Some(pb) = self.pkg.get(base).copied() else {
            let msg = if crate::universe::lookup(base).is_some() {
                format!("cannot define new methods on non-local type {base}")
            } else {
                format!("undefined: {base}")
            };
            self.report(DiagKind::Declaration, f, span, msg);
            return Ok(None);
        };
        match self.object_of(pb.file, pb.binding.decl)? {
            Entity::TypeName(Type::Named(n)) if self.own_types.contains(&n.id) => {
                if n.underlying().is_interface() || matches!(n.underlying(), Type::Pointer(_)) {
                    self.error(f, span, format!("invalid receiver type {base}"));
                    return Ok(None);
                }
                Ok(Some(n))
            }
            Entity::Invalid => Ok(None),
            Entity::TypeName(t) if t.is_invalid() => Ok(None),
            _ => {
                self.error(f, span, format!("invalid receiver type {base}"));
                Ok(None)
            }
        }
    }

    fn receiver_type(&mut self, f: FileId, id: FuncDeclId) -> CResult<Type> {
        let Some(r) = self.unit(f)?.arena().funcs[id].recv else {
            return Ok(Type::Invalid);
        };
        let Some(base) = self.receiver_base(f, id)? else {
            return Ok(Type::Invalid);
        };
        let declared = base.type_params().len();
        if r.type_params.len() != declared {
            let span = self.tok_span(f, r.base.tok)?;
            self.error(
                f,
                span,
                format!(
                    "receiver declares {} type parameters, but receiver base type declares {declared}",
                    r.type_params.len()
                ),
            );
        }
        // Receiver type parameters are the base type's own parameters under
        // new names, so `List[T]` here is the generic type itself.
        let t = Type::Named(base);
        Ok(if r.star.is_some() { Type::pointer(t) } else { t })
    }

    /// Attaches the methods declared for a package-level type, once.
    pub(super) fn ensure_methods(&mut self, n: &Arc<Named>) -> CResult<()> {
        let origin = n.origin().cloned().unwrap_or_else(|| n.clone());
        if !self.own_types.contains(&origin.id) || !self.methods_done.insert(origin.id) {
            return Ok(());
        }
        let decls = self.methods.get(&origin.name).cloned().unwrap_or_default();
        for (f, id) in decls {
            match self.receiver_base(f, id)? {
                Some(b) if b.id == origin.id => {}
                _ => continue,
            }
            let fd = self.unit(f)?.arena().funcs[id];
            let Some(r) = fd.recv else {
                continue;
            };
            let Entity::Func(Type::Signature(sig)) = self.object_of(f, DeclRef::Func(id))? else {
                continue;
            };
            let name: Arc<str> = self.ident_text(f, fd.name)?.into();
            if &*name == "_" {
                continue;
            }
            let span = self.tok_span(f, fd.name.tok)?;
            if origin.method(&name).is_some() {
                self.report(
                    DiagKind::Declaration,
                    f,
                    span,
                    format!("method {}.{name} already declared", origin.name),
                );
                continue;
            }
            if let Type::Struct(s) = origin.underlying() {
                if s.fields.iter().any(|fl| fl.name == name) {
                    self.report(
                        DiagKind::Declaration,
                        f,
                        span,
                        format!("field and method with the same name {name}"),
                    );
                    continue;
                }
            }
            origin.add_method(Method {
                name,
                sig,
                pointer_recv: r.star.is_some(),
            });
        }
        Ok(())
    }

    /// `G[A, B]` for a generic defined type.
    pub(super) fn instantiate(&mut self, f: FileId, span: Span, generic: &Type, targs: Vec<Type>) -> CResult<Type> {
        if generic.is_invalid() || targs.iter().any(Type::is_invalid) {
            return Ok(Type::Invalid);
        }
        let Type::Named(origin) = generic else {
            self.error(f, span, format!("{generic} is not a generic type"));
            return Ok(Type::Invalid);
        };
        let tps = origin.type_params();
        if tps.is_empty() || origin.origin().is_some() {
            self.error(f, span, format!("{generic} is not a generic type"));
            return Ok(Type::Invalid);
        }
        if tps.len() != targs.len() {
            let which = if targs.len() < tps.len() { "not enough" } else { "too many" };
            self.error(
                f,
                span,
                format!(
                    "{which} type arguments for type {}: have {}, want {}",
                    origin.name,
                    targs.len(),
                    tps.len()
                ),
            );
            return Ok(Type::Invalid);
        }
        if tps
            .iter()
            .zip(&targs)
            .all(|(tp, t)| matches!(t, Type::TypeParam(p) if p.id == tp.id))
        {
            return Ok(generic.clone());
        }
        if !self.verify_targs(f, span, &tps, &targs)? {
            return Ok(Type::Invalid);
        }
        self.ensure_methods(origin)?;
        Ok(Type::Named(Named::instantiate(origin, targs)))
    }

    pub(super) fn verify_targs(
        &mut self,
        f: FileId,
        span: Span,
        tps: &[Arc<TypeParam>],
        targs: &[Type],
    ) -> CResult<bool> {
        let map: Vec<(u64, Type)> = tps.iter().map(|tp| tp.id).zip(targs.iter().cloned()).collect();
        let mut ok = true;
        for (tp, t) in tps.iter().zip(targs) {
            let c = types::subst(&tp.constraint.read().clone(), &map);
            if let Some(why) = self.unsatisfied(t, &c)? {
                self.error(f, span, format!("{t} does not satisfy {c}{why}"));
                ok = false;
            }
        }
        Ok(ok)
    }

    /// Why `t` is not in the type set of constraint `c`, if it is not.
    fn unsatisfied(&mut self, t: &Type, c: &Type) -> CResult<Option<String>> {
        if t.is_invalid() || matches!(t, Type::TypeParam(_)) {
            return Ok(None);
        }
        let Type::Interface(i) = c.underlying() else {
            return Ok(None);
        };
        if constraint_comparable(&i) && !t.is_comparable() {
            return Ok(Some(String::new()));
        }
        for terms in term_sets(&i) {
            let hit = terms.iter().any(|term| {
                if term.tilde {
                    types::identical(&t.underlying(), &term.typ.underlying())
                } else {
                    types::identical(t, &term.typ)
                }
            });
            if !hit {
                return Ok(Some(format!(" ({t} missing in {})", terms_text(&terms))));
            }
        }
        let plain = Interface {
            methods: i.all_methods(),
            ..Interface::default()
        };
        Ok(self.missing_method(t, &plain)?.map(|m| format!(" ({m})")))
    }
}

/// Whether `t` contains the defined type `target` without indirection.
fn embeds_by_value(t: &Type, target: u64, seen: &mut HashSet<u64>) -> bool {
    match t {
        Type::Named(m) => m.id == target || (seen.insert(m.id) && embeds_by_value(&m.underlying(), target, seen)),
        Type::Array(e, _) => embeds_by_value(e, target, seen),
        Type::Struct(s) => s.fields.iter().any(|fl| embeds_by_value(&fl.typ, target, seen)),
        _ => false,
    }
}

fn constraint_comparable(i: &Interface) -> bool {
    i.comparable
        || i.embeds
            .iter()
            .any(|e| matches!(e.underlying(), Type::Interface(j) if constraint_comparable(&j)))
}

/// Type-set restrictions of an interface: its own union and those of its
/// embedded interfaces, each of which must be satisfied.
pub(super) fn term_sets(i: &Interface) -> Vec<Vec<types::Term>> {
    let mut out = Vec::new();
    if !i.terms.is_empty() {
        out.push(i.terms.clone());
    }
    for e in &i.embeds {
        if let Type::Interface(j) = e.underlying() {
            out.extend(term_sets(&j));
        }
    }
    out
}

fn terms_text(terms: &[types::Term]) -> String {
    terms
        .iter()
        .map(|t| format!("{}{}", if t.tilde { "~" } else { "" }, t.typ))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Type a value of type `t` gets when nothing else decides it.
pub(super) fn default_type(t: &Type) -> Type {
    match t {
        Type::Basic(k) if k.is_untyped() && *k != BasicKind::UntypedNil => Type::Basic(k.default_kind()),
        t => t.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assert_clean, assert_error, check, const_of, messages, type_of};
    use crate::constant::Value;

    #[test]
    fn iota_counts_specs_in_a_group() {
        let out = check(
            "package p\ntype Weekday int\nconst (\n\tSunday Weekday = iota\n\tMonday\n\tTuesday\n)\nconst (\n\tKB = 1 << (10 * (iota + 1))\n\tMB\n\t_\n\tTB\n)\n",
        );
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(const_of(&out, "Tuesday"), Value::int(2));
        assert_eq!(type_of(&out, "Monday"), "p.Weekday");
        assert_eq!(const_of(&out, "MB"), Value::int(1u64 << 20));
        assert_eq!(const_of(&out, "TB"), Value::int(1u64 << 40));
    }

    #[test]
    fn constant_declarations() {
        assert_error("package p\nconst a, b = 1\n", "missing init expr for const declaration");
        assert_error("package p\nconst a = 1, 2\n", "extra init expr");
        assert_error("package p\nfunc f() int { return 0 }\nconst c = f()\n", "f() (value of type int) is not constant");
        assert_error("package p\nconst c []int = nil\n", "invalid constant type []int");
        assert_error("package p\nvar v = 1\nconst c map[string]int = v\n", "invalid constant type map[string]int");
    }

    #[test]
    fn recursive_types() {
        assert_clean("package p\ntype List struct{ next *List; v int }\ntype Tree struct{ kids []Tree }\n");
        assert_error("package p\ntype T struct{ t T }\n", "invalid recursive type T");
        assert_error("package p\ntype A struct{ b B }\ntype B struct{ a A }\n", "invalid recursive type");
    }

    #[test]
    fn cycles_in_initializers() {
        assert_error("package p\nvar a = b\nvar b = a\n", "initialization cycle");
        assert_error("package p\nconst c = d\nconst d = c\n", "invalid recursive constant");
    }

    #[test]
    fn method_declarations() {
        assert_error(
            "package p\ntype T struct{}\nfunc (T) M() {}\nfunc (*T) M() {}\n",
            "method T.M already declared",
        );
        assert_error(
            "package p\ntype T struct{ M int }\nfunc (T) M() {}\n",
            "field and method with the same name M",
        );
        assert_error("package p\nfunc (int) M() {}\n", "cannot define new methods on non-local type int");
        assert_error("package p\nfunc (s *string) M() {}\n", "cannot define new methods on non-local type string");
        assert_error("package p\nfunc (Missing) M() {}\n", "undefined: Missing");
        assert_error("package p\ntype I interface{}\nfunc (I) M() {}\n", "invalid receiver type I");
    }

    #[test]
    fn special_functions() {
        assert_error("package p\nfunc init() int { return 0 }\n", "func init must have no arguments and no return values");
        assert_error("package main\nfunc main(x int) {}\n", "func main must have no arguments and no return values");
    }

    #[test]
    fn generic_types_and_functions() {
        let out = check(
            "package p\ntype Pair[K comparable, V any] struct{ k K; v V }\nfunc (p Pair[K, V]) Key() K { return p.k }\nvar x Pair[string, int]\nvar k = x.Key()\n",
        );
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(type_of(&out, "k"), "string");
        assert_error(
            "package p\ntype Set[T comparable] map[T]bool\nvar s Set[[]int]\n",
            "[]int does not satisfy comparable",
        );
    }
}
