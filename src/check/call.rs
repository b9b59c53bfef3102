//! Calls, conversions and type argument inference.

use std::sync::Arc;

use super::expr::{Mode, Operand};
use super::{CResult, Checker};
use crate::constant::{self, ReprError, Value};
use crate::cst::{ChanDir, ExprId, ExprOrType};
use crate::error::FileId;
use crate::token::Tok;
use crate::types::{self, BasicKind, Signature, Type, TypeParam};

/// Type parameter bindings collected while unifying.
struct Bindings<'t> {
    params: &'t [Arc<TypeParam>],
    found: Vec<Option<Type>>,
}

impl<'t> Bindings<'t> {
    fn new(params: &'t [Arc<TypeParam>]) -> Self {
        Self {
            params,
            found: vec![None; params.len()],
        }
    }

    fn index(&self, t: &Type) -> Option<usize> {
        match t {
            Type::TypeParam(p) => self.params.iter().position(|q| q.id == p.id),
            _ => None,
        }
    }

    /// Matches `param` against `arg`, binding unbound type parameters.
    /// Returns false on a structural mismatch.
    fn unify(&mut self, param: &Type, arg: &Type) -> bool {
        if let Some(i) = self.index(param) {
            return match &self.found[i] {
                Some(t) => types::identical(t, arg),
                None => {
                    self.found[i] = Some(arg.clone());
                    true
                }
            };
        }
        match (param, arg) {
            (Type::Pointer(a), Type::Pointer(b)) | (Type::Slice(a), Type::Slice(b)) => self.unify(a, b),
            (Type::Array(a, n), Type::Array(b, m)) => n == m && self.unify(a, b),
            (Type::Map(k1, v1), Type::Map(k2, v2)) => self.unify(k1, k2) && self.unify(v1, v2),
            (Type::Chan(_, a), Type::Chan(_, b)) => self.unify(a, b),
            (Type::Signature(a), Type::Signature(b)) => {
                a.params.len() == b.params.len()
                    && a.results.len() == b.results.len()
                    && a.params
                        .iter()
                        .zip(&b.params)
                        .chain(a.results.iter().zip(&b.results))
                        .all(|(p, q)| self.unify(&p.typ, &q.typ))
            }
            (Type::Named(a), Type::Named(b)) => match (a.origin(), b.origin()) {
                (Some(oa), Some(ob)) if oa.id == ob.id => a
                    .targs
                    .iter()
                    .zip(&b.targs)
                    .all(|(x, y)| self.unify(x, y)),
                _ => types::identical(param, arg),
            },
            // Arguments of a named type may still match an unnamed
            // parameter structure.
            (_, Type::Named(n)) if !matches!(param, Type::Named(_)) => {
                let u = n.underlying();
                !u.is_invalid() && self.unify(param, &u)
            }
            _ => true,
        }
    }
}

impl<'a> Checker<'a> {
    pub(super) fn call(
        &mut self,
        f: FileId,
        e: ExprId,
        callee: ExprId,
        args: &[ExprOrType],
        ellipsis: Option<Tok>,
    ) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let cx = self.expr(f, callee)?;
        match cx.mode {
            Mode::Invalid => {
                self.arg_operands(f, args)?;
                return Ok(Operand::invalid());
            }
            Mode::TypeExpr => return self.conversion_call(f, e, &cx.typ, args, ellipsis),
            Mode::Builtin(b) => return self.builtin_call(f, e, b, args, ellipsis),
            _ => {}
        }
        if cx.is_invalid() {
            self.arg_operands(f, args)?;
            return Ok(Operand::invalid());
        }
        let Type::Signature(sig) = cx.typ.resolve() else {
            let d = self.describe(f, callee, &cx)?;
            self.error(f, span, format!("invalid operation: cannot call non-function {d}"));
            self.arg_operands(f, args)?;
            return Ok(Operand::invalid());
        };
        let Some(ops) = self.arg_operands(f, args)? else {
            return Ok(Operand::invalid());
        };
        let callee_text = self.expr_text(f, callee)?;
        if ellipsis.is_some() && !sig.variadic {
            self.error(f, span, format!("cannot use ... in call to non-variadic {callee_text}"));
            return Ok(Operand::invalid());
        }
        let sig = if sig.type_params.is_empty() {
            sig
        } else {
            match self.infer(f, e, &sig, &ops, &callee_text)? {
                Some(s) => s,
                None => return Ok(Operand::invalid()),
            }
        };
        self.call_args(f, e, &sig, ops, ellipsis.is_some(), &callee_text)?;
        Ok(Operand::from_results(&sig))
    }

    /// Evaluates call arguments, spreading a single multi-value call.
    /// `None` when an argument is a type.
    fn arg_operands(&mut self, f: FileId, args: &[ExprOrType]) -> CResult<Option<Vec<(Operand, ExprId)>>> {
        let mut out = Vec::with_capacity(args.len());
        let mut ok = true;
        for arg in args {
            match *arg {
                ExprOrType::Expr(x) => {
                    let op = self.expr(f, x)?;
                    out.push((op, x));
                }
                ExprOrType::Type(t) => {
                    self.type_expr(f, t)?;
                    let span = self.unit(f)?.arena().types.span(t);
                    self.error(f, span, "type is not an expression");
                    ok = false;
                }
            }
        }
        if !ok {
            return Ok(None);
        }
        if let [(op, x)] = out.as_slice() {
            if let Type::Tuple(ts) = &op.typ {
                if op.mode == Mode::Value {
                    let x = *x;
                    return Ok(Some(ts.iter().map(|t| (Operand::value(t.clone()), x)).collect()));
                }
            }
        }
        let mut single = Vec::with_capacity(out.len());
        for (op, x) in out {
            single.push((self.single(f, x, op)?, x));
        }
        Ok(Some(single))
    }

    fn call_args(
        &mut self,
        f: FileId,
        e: ExprId,
        sig: &Signature,
        ops: Vec<(Operand, ExprId)>,
        spread: bool,
        callee_text: &str,
    ) -> CResult<()> {
        let span = self.expr_span(f, e)?;
        let n = sig.params.len();
        let fixed = if sig.variadic && !spread { n - 1 } else { n };
        let enough = if sig.variadic && !spread {
            ops.len() >= fixed
        } else {
            ops.len() >= n
        };
        let too_many = (!sig.variadic || spread) && ops.len() > n;
        if !enough || too_many {
            let which = if too_many { "too many" } else { "not enough" };
            let have: Vec<String> = ops.iter().map(|(o, _)| o.typ.to_string()).collect();
            let want: Vec<String> = sig.params.iter().map(|p| p.typ.to_string()).collect();
            self.error(
                f,
                span,
                format!(
                    "{which} arguments in call to {callee_text}\n\thave ({})\n\twant ({})",
                    have.join(", "),
                    want.join(", ")
                ),
            );
            return Ok(());
        }
        let ctx = format!("argument to {callee_text}");
        for (i, (op, x)) in ops.into_iter().enumerate() {
            let target = if i < fixed {
                sig.params[i].typ.clone()
            } else {
                match sig.params.last().map(|p| &p.typ) {
                    Some(Type::Slice(el)) => (**el).clone(),
                    _ => Type::Invalid,
                }
            };
            self.assignment(f, op, &target, x, &ctx)?;
        }
        Ok(())
    }

    /// Infers the type arguments of a generic call from its arguments.
    fn infer(
        &mut self,
        f: FileId,
        e: ExprId,
        sig: &Arc<Signature>,
        ops: &[(Operand, ExprId)],
        callee_text: &str,
    ) -> CResult<Option<Arc<Signature>>> {
        let span = self.expr_span(f, e)?;
        let mut b = Bindings::new(&sig.type_params);
        let param_at = |i: usize| -> Option<Type> {
            let n = sig.params.len();
            if sig.variadic && i + 1 >= n {
                match &sig.params.last()?.typ {
                    Type::Slice(el) => Some((**el).clone()),
                    t => Some(t.clone()),
                }
            } else {
                sig.params.get(i).map(|p| p.typ.clone())
            }
        };
        // Typed arguments first; untyped constants only fill what is left.
        for (i, (op, x)) in ops.iter().enumerate() {
            if op.is_invalid() || op.typ.is_untyped() {
                continue;
            }
            let Some(p) = param_at(i) else { continue };
            if !b.unify(&p, &op.typ) {
                let d = self.describe(f, *x, op)?;
                self.error(
                    f,
                    span,
                    format!("in call to {callee_text}, type {} of {d} does not match {p}", op.typ),
                );
                return Ok(None);
            }
        }
        for (i, (op, _)) in ops.iter().enumerate() {
            if op.is_invalid() || !op.typ.is_untyped() || op.typ.is_nil() {
                continue;
            }
            let Some(p) = param_at(i) else { continue };
            if let Some(k) = b.index(&p) {
                if b.found[k].is_none() {
                    b.found[k] = Some(super::decl::default_type(&op.typ));
                }
            }
        }
        let mut targs = Vec::with_capacity(b.found.len());
        for (tp, t) in sig.type_params.iter().zip(&b.found) {
            match t {
                Some(t) => targs.push(t.clone()),
                None => {
                    self.error(f, span, format!("in call to {callee_text}, cannot infer {}", tp.name));
                    return Ok(None);
                }
            }
        }
        if !self.verify_targs(f, span, &sig.type_params, &targs)? {
            return Ok(None);
        }
        let map: Vec<(u64, Type)> = sig.type_params.iter().map(|tp| tp.id).zip(targs).collect();
        let mut out = types::subst_sig(sig, &map);
        out.type_params.clear();
        Ok(Some(Arc::new(out)))
    }

    /// `F[A]`: explicit, possibly partial, instantiation of a generic
    /// function.
    pub(super) fn instantiate_func(
        &mut self,
        f: FileId,
        e: ExprId,
        sig: &Arc<Signature>,
        targs: Vec<Type>,
    ) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        if targs.iter().any(Type::is_invalid) {
            return Ok(Operand::invalid());
        }
        let tps = &sig.type_params;
        if targs.len() > tps.len() {
            let text = self.expr_text(f, e)?;
            self.error(
                f,
                span,
                format!(
                    "got {} type arguments but {text} has {} type parameters",
                    targs.len(),
                    tps.len()
                ),
            );
            return Ok(Operand::invalid());
        }
        let given = &tps[..targs.len()];
        if !self.verify_targs(f, span, given, &targs)? {
            return Ok(Operand::invalid());
        }
        let map: Vec<(u64, Type)> = given.iter().map(|tp| tp.id).zip(targs).collect();
        let mut out = types::subst_sig(sig, &map);
        out.type_params = tps[map.len()..].to_vec();
        Ok(Operand::value(Type::Signature(Arc::new(out))))
    }

    fn conversion_call(
        &mut self,
        f: FileId,
        e: ExprId,
        t: &Type,
        args: &[ExprOrType],
        ellipsis: Option<Tok>,
    ) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let x = match args {
            [ExprOrType::Expr(x)] if ellipsis.is_none() => *x,
            [] => {
                self.error(f, span, format!("missing argument in conversion to {t}"));
                return Ok(Operand::invalid());
            }
            [_] => {
                self.error(f, span, format!("invalid use of ... in conversion to {t}"));
                return Ok(Operand::invalid());
            }
            _ => {
                self.arg_operands(f, args)?;
                self.error(f, span, format!("too many arguments in conversion to {t}"));
                return Ok(Operand::invalid());
            }
        };
        let op = self.value_operand(f, x)?;
        self.conversion(f, e, op, x, t)
    }

    /// `T(x)`.
    pub(super) fn conversion(&mut self, f: FileId, e: ExprId, x: Operand, xe: ExprId, t: &Type) -> CResult<Operand> {
        if x.is_invalid() || t.is_invalid() {
            return Ok(Operand::invalid());
        }
        let span = self.expr_span(f, e)?;
        let target_kind = match t.underlying() {
            Type::Basic(k) if k.is_const_type() => Some(k),
            _ => None,
        };
        if let (Mode::Const(v), Some(k)) = (&x.mode, target_kind) {
            let from_int_to_string = k.is_string() && op_is_integer(&x);
            let result = if from_int_to_string {
                let r = v
                    .to_u64()
                    .and_then(|c| u32::try_from(c).ok())
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                Ok(Value::string(r.to_string().as_bytes()))
            } else if compatible_const(&x.typ, k) {
                constant::representable(v, k, self.word())
            } else {
                Err(ReprError::Kind)
            };
            return match result {
                Ok(v) => Ok(Operand::constant(t.clone(), v)),
                Err(ReprError::Overflow) if x.typ.basic_kind().is_some_and(BasicKind::is_numeric) => {
                    let d = self.describe(f, xe, &x)?;
                    self.error(f, span, format!("cannot convert {d} to type {t} (overflows)"));
                    Ok(Operand::invalid())
                }
                Err(ReprError::Truncated) => {
                    let d = self.describe(f, xe, &x)?;
                    self.error(f, span, format!("cannot convert {d} to type {t} (truncated)"));
                    Ok(Operand::invalid())
                }
                Err(_) => {
                    let d = self.describe(f, xe, &x)?;
                    self.error(f, span, format!("cannot convert {d} to type {t}"));
                    Ok(Operand::invalid())
                }
            };
        }
        let x = if x.typ.is_untyped() && !x.typ.is_nil() {
            match self.implicit(&x, &super::decl::default_type(&x.typ)) {
                Ok(y) => y,
                Err(_) => {
                    let d = self.describe(f, xe, &x)?;
                    self.error(f, span, format!("cannot convert {d} to type {t}"));
                    return Ok(Operand::invalid());
                }
            }
        } else {
            x
        };
        if !self.convertible(&x.typ, t)? {
            let d = self.describe(f, xe, &x)?;
            self.error(f, span, format!("cannot convert {d} to type {t}"));
            return Ok(Operand::invalid());
        }
        Ok(Operand::value(t.clone()))
    }

    fn convertible(&mut self, v: &Type, t: &Type) -> CResult<bool> {
        if self.assignable(v, t)?.is_ok() {
            return Ok(true);
        }
        let (vu, tu) = (v.resolve(), t.resolve());
        if types::identical(&vu, &tu) {
            return Ok(true);
        }
        let ok = match (&vu, &tu) {
            (Type::Pointer(a), Type::Pointer(b)) => types::identical(&a.underlying(), &b.underlying()),
            (Type::Basic(a), Type::Basic(b)) => {
                (a.is_numeric() && b.is_numeric() && (a.is_complex() == b.is_complex()))
                    || (a.is_integer() && b.is_string())
                    || (a.is_string() && b.is_string())
                    || (*a == BasicKind::UnsafePointer && *b == BasicKind::Uintptr)
                    || (*a == BasicKind::Uintptr && *b == BasicKind::UnsafePointer)
            }
            (Type::Slice(el), Type::Basic(b)) | (Type::Basic(b), Type::Slice(el)) => {
                b.is_string()
                    && matches!(el.resolve(), Type::Basic(BasicKind::Uint8 | BasicKind::Int32))
            }
            (Type::Pointer(_), Type::Basic(BasicKind::UnsafePointer))
            | (Type::Basic(BasicKind::UnsafePointer), Type::Pointer(_)) => true,
            (Type::Slice(a), Type::Array(b, _)) => types::identical(a, b),
            (Type::Slice(a), Type::Pointer(p)) => match p.underlying() {
                Type::Array(b, _) => types::identical(a, &b),
                _ => false,
            },
            (Type::Chan(ChanDir::Both, a), Type::Chan(_, b)) => types::identical(a, b),
            _ => false,
        };
        Ok(ok)
    }
}

fn op_is_integer(x: &Operand) -> bool {
    match x.typ.basic_kind() {
        Some(BasicKind::UntypedInt | BasicKind::UntypedRune) => true,
        Some(k) => k.is_integer(),
        None => false,
    }
}

/// Whether a constant of type `from` may be converted to kind `to`.
fn compatible_const(from: &Type, to: BasicKind) -> bool {
    let Some(k) = from.underlying().basic_kind() else {
        return false;
    };
    (k.is_numeric() && to.is_numeric()) || (k.is_boolean() && to.is_boolean()) || (k.is_string() && to.is_string())
}
