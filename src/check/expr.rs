//! Operands and expressions: literals, operators, indexing, assertions and
//! the implicit conversions behind assignability.

use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};

use super::decl::{default_type, term_sets};
use super::{CResult, Checker, Entity};
use crate::constant::{self, ConstError, ReprError, Value};
use crate::cst::{BasicLitKind, BinaryOp, ChanDir, CstArena, Expr, ExprId, ExprOrType, UnaryOp};
use crate::error::{DiagKind, FileId, Span};
use crate::literal;
use crate::token::Tok;
use crate::types::{self, BasicKind, Type};
use crate::universe::Builtin;

/// How an operand can be used.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Invalid,
    /// Call of a function without results.
    NoValue,
    Builtin(Builtin),
    TypeExpr,
    Const(Value),
    /// Addressable.
    Var,
    /// `m[k]`: assignable, not addressable, may yield `v, ok`.
    MapIndex,
    Value,
    /// Receive or type assertion, which may yield `v, ok`.
    CommaOk,
}

/// Result of checking an expression.
#[derive(Debug, Clone)]
pub struct Operand {
    pub mode: Mode,
    pub typ: Type,
}

impl Operand {
    pub fn invalid() -> Operand {
        Operand {
            mode: Mode::Invalid,
            typ: Type::Invalid,
        }
    }

    pub fn value(typ: Type) -> Operand {
        Operand {
            mode: Mode::Value,
            typ,
        }
    }

    pub fn var(typ: Type) -> Operand {
        Operand { mode: Mode::Var, typ }
    }

    pub fn constant(typ: Type, v: Value) -> Operand {
        Operand {
            mode: Mode::Const(v),
            typ,
        }
    }

    pub fn type_expr(typ: Type) -> Operand {
        if typ.is_invalid() {
            return Operand::invalid();
        }
        Operand {
            mode: Mode::TypeExpr,
            typ,
        }
    }

    pub fn is_invalid(&self) -> bool {
        match self.mode {
            Mode::Invalid => true,
            Mode::NoValue | Mode::Builtin(_) => false,
            _ => self.typ.is_invalid(),
        }
    }

    pub fn const_value(&self) -> Option<&Value> {
        match &self.mode {
            Mode::Const(v) => Some(v),
            _ => None,
        }
    }

    pub(super) fn of_entity(e: Entity) -> Operand {
        match e {
            Entity::Const { typ, val } => Operand::constant(typ, val),
            Entity::Var(t) => Operand::var(t),
            Entity::TypeName(t) => Operand::type_expr(t),
            Entity::Func(t) => Operand::value(t),
            Entity::Builtin(b) => Operand {
                mode: Mode::Builtin(b),
                typ: Type::Invalid,
            },
            Entity::Nil => Operand::value(Type::Basic(BasicKind::UntypedNil)),
            Entity::Package(_) | Entity::Invalid => Operand::invalid(),
        }
    }

    pub(super) fn from_results(sig: &types::Signature) -> Operand {
        match sig.results.as_slice() {
            [] => Operand {
                mode: Mode::NoValue,
                typ: Type::Invalid,
            },
            [r] => Operand::value(r.typ.clone()),
            rs => Operand::value(Type::tuple(rs.iter().map(|p| p.typ.clone()).collect())),
        }
    }
}

/// Where an error about a composite operation is reported, and how the
/// operation reads in source.
#[derive(Debug, Clone)]
pub(super) struct Site {
    pub span: Span,
    pub text: String,
}

pub(super) fn describe_text(text: &str, x: &Operand) -> String {
    if x.typ.is_nil() {
        return "nil".into();
    }
    match &x.mode {
        Mode::Invalid => text.to_string(),
        Mode::NoValue => format!("{text} (no value)"),
        Mode::Builtin(_) => format!("{text} (built-in)"),
        Mode::TypeExpr => format!("{text} (type)"),
        Mode::Const(v) => {
            let vs = v.to_string();
            match (x.typ.is_untyped(), vs == text) {
                (true, true) => format!("{text} ({} constant)", x.typ),
                (true, false) => format!("{text} ({} constant {vs})", x.typ),
                (false, _) => format!("{text} (constant {vs} of type {})", x.typ),
            }
        }
        Mode::Var => format!("{text} (variable of type {})", x.typ),
        Mode::MapIndex => format!("{text} (map index expression of type {})", x.typ),
        Mode::CommaOk => format!("{text} (comma, ok expression of type {})", x.typ),
        Mode::Value => format!("{text} (value of type {})", x.typ),
    }
}

pub(super) fn unparen(a: &CstArena, mut e: ExprId) -> ExprId {
    while let Expr::Paren { inner, .. } = a.exprs[e] {
        e = inner;
    }
    e
}

/// Whether every type an operand of type `t` can have satisfies `pred`.
pub(super) fn op_allowed(t: &Type, pred: fn(BasicKind) -> bool) -> bool {
    match t.resolve() {
        Type::Basic(k) => pred(k),
        Type::TypeParam(tp) => match tp.constraint.read().underlying() {
            Type::Interface(i) => {
                let sets = term_sets(&i);
                !sets.is_empty()
                    && sets
                        .iter()
                        .all(|terms| terms.iter().all(|t| op_allowed(&t.typ, pred)))
            }
            _ => false,
        },
        _ => false,
    }
}

fn untyped_compatible(x: BasicKind, t: BasicKind) -> bool {
    match x {
        BasicKind::UntypedBool => t.is_boolean(),
        BasicKind::UntypedString => t.is_string(),
        BasicKind::UntypedInt
        | BasicKind::UntypedRune
        | BasicKind::UntypedFloat
        | BasicKind::UntypedComplex => t.is_numeric(),
        _ => false,
    }
}

fn unsigned_bits(k: BasicKind, word: u64) -> Option<u32> {
    use BasicKind::*;
    Some(match k {
        Uint8 => 8,
        Uint16 => 16,
        Uint32 => 32,
        Uint64 => 64,
        Uint | Uintptr => (word * 8) as u32,
        _ => return None,
    })
}

fn is_zero(v: &Value) -> bool {
    match v {
        Value::Int(i) => i.is_zero(),
        Value::Float(r) => r.is_zero(),
        Value::Complex(re, im) => re.is_zero() && im.is_zero(),
        _ => false,
    }
}

fn binary_pred(op: BinaryOp) -> fn(BasicKind) -> bool {
    use BinaryOp::*;
    match op {
        Add => |k| k.is_numeric() || k.is_string(),
        Sub | Mul | Div => BasicKind::is_numeric,
        LAnd | LOr => BasicKind::is_boolean,
        _ => BasicKind::is_integer,
    }
}

const fn unary_str(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Add => "+",
        UnaryOp::Sub => "-",
        UnaryOp::Not => "!",
        UnaryOp::Xor => "^",
        UnaryOp::Deref => "*",
        UnaryOp::Addr => "&",
        UnaryOp::Recv => "<-",
    }
}

impl<'a> Checker<'a> {
    /// Checks an expression; results are memoized per `iota` value.
    pub(super) fn expr(&mut self, f: FileId, e: ExprId) -> CResult<Operand> {
        let key = (f, e, self.iota);
        if let Some(x) = self.exprs.get(&key) {
            return Ok(x.clone());
        }
        let x = self.eval(f, e)?;
        self.exprs.insert(key, x.clone());
        Ok(x)
    }

    /// An expression that must produce exactly one value.
    pub(super) fn value_operand(&mut self, f: FileId, e: ExprId) -> CResult<Operand> {
        let x = self.expr(f, e)?;
        self.single(f, e, x)
    }

    pub(super) fn single(&mut self, f: FileId, e: ExprId, x: Operand) -> CResult<Operand> {
        if x.is_invalid() {
            return Ok(Operand::invalid());
        }
        let msg = match (&x.mode, &x.typ) {
            (Mode::NoValue, _) => format!("{} (no value) used as value", self.expr_text(f, e)?),
            (Mode::TypeExpr, _) => format!("{} (type) is not an expression", self.expr_text(f, e)?),
            (Mode::Builtin(_), _) => format!("{} (built-in) must be called", self.expr_text(f, e)?),
            (_, Type::Tuple(_)) => format!(
                "multiple-value {} in single-value context",
                self.describe(f, e, &x)?
            ),
            (_, Type::Signature(s)) if !s.type_params.is_empty() => format!(
                "cannot use generic function {} without instantiation",
                self.expr_text(f, e)?
            ),
            _ => return Ok(x),
        };
        let span = self.expr_span(f, e)?;
        self.error(f, span, msg);
        Ok(Operand::invalid())
    }

    pub(super) fn describe(&self, f: FileId, e: ExprId, x: &Operand) -> CResult<String> {
        Ok(describe_text(&self.expr_text(f, e)?, x))
    }

    pub(super) fn site(&self, f: FileId, e: ExprId) -> CResult<Site> {
        Ok(Site {
            span: self.expr_span(f, e)?,
            text: self.expr_text(f, e)?,
        })
    }

    fn eval(&mut self, f: FileId, e: ExprId) -> CResult<Operand> {
        let a = self.unit(f)?.arena();
        match a.exprs[e] {
            Expr::Ident { name, scope } => {
                let span = self.expr_span(f, e)?;
                let text = self.ident_text(f, name)?;
                if text == "_" {
                    self.error(f, span, "cannot use _ as value");
                    return Ok(Operand::invalid());
                }
                let ent = self.lookup(f, scope, name)?;
                if let Entity::Package(p) = &ent {
                    let msg = format!("use of package {} without selector", p.name);
                    self.error(f, span, msg);
                    return Ok(Operand::invalid());
                }
                Ok(Operand::of_entity(ent))
            }
            Expr::BasicLit { kind, tok } => self.basic_lit(f, kind, tok),
            Expr::FuncLit { sig, body, .. } => {
                let sig = self.signature(f, sig, Vec::new())?;
                self.func_body(f, sig.clone(), &body)?;
                Ok(Operand::value(Type::Signature(sig)))
            }
            Expr::CompositeLit { typ, lit } => self.composite_lit(f, typ, &lit),
            Expr::Type(t) => Ok(Operand::type_expr(self.type_expr(f, t)?)),
            Expr::IndexOrInstantiate { base, args, .. } => {
                self.index_expr(f, e, base, a.expr_or_types(args))
            }
            Expr::Paren { inner, .. } => self.expr(f, inner),
            Expr::Selector { base, sel, .. } => self.selector(f, e, base, sel),
            Expr::Slice {
                base, lo, hi, max, ..
            } => self.slice_expr(f, e, base, [lo, hi, max]),
            Expr::TypeAssert { base, typ, .. } => {
                let span = self.expr_span(f, e)?;
                let Some(typ) = typ else {
                    self.error(f, span, "use of .(type) outside type switch");
                    return Ok(Operand::invalid());
                };
                let x = self.value_operand(f, base)?;
                let t = self.type_expr(f, typ)?;
                self.assert_type(f, span, base, &x, &t)?;
                Ok(Operand {
                    mode: Mode::CommaOk,
                    typ: t,
                })
            }
            Expr::Call {
                callee,
                args,
                ellipsis,
                ..
            } => self.call(f, e, callee, a.expr_or_types(args), ellipsis),
            Expr::Unary { op, operand, .. } => self.unary(f, e, op, operand),
            Expr::Binary {
                left, op, right, ..
            } => {
                let x = self.value_operand(f, left)?;
                let y = self.value_operand(f, right)?;
                let site = self.site(f, e)?;
                self.binary_op(f, &site, op, (x, left), (y, right))
            }
        }
    }

    fn basic_lit(&mut self, f: FileId, kind: BasicLitKind, tok: Tok) -> CResult<Operand> {
        let raw = self.unit(f)?.file.tok_text(tok);
        // Malformed literals were reported by the lexer.
        let (k, v) = match kind {
            BasicLitKind::Int => (BasicKind::UntypedInt, literal::parse_int(&raw).map(Value::Int)),
            BasicLitKind::Float => (
                BasicKind::UntypedFloat,
                literal::parse_float(&raw).map(Value::Float),
            ),
            BasicLitKind::Imag => (
                BasicKind::UntypedComplex,
                literal::parse_imag(&raw).map(|im| Value::Complex(BigRational::zero(), im)),
            ),
            BasicLitKind::Rune => (
                BasicKind::UntypedRune,
                literal::unquote_rune(&raw).ok().map(Value::int),
            ),
            BasicLitKind::String => (
                BasicKind::UntypedString,
                literal::unquote_string(&raw).ok().map(|b| Value::string(&b)),
            ),
        };
        Ok(v.map_or_else(Operand::invalid, |v| Operand::constant(Type::Basic(k), v)))
    }

    /// A constant result of type `typ`: untyped results are bounded in
    /// size, typed ones must fit their type.
    pub(super) fn typed_const(&mut self, f: FileId, span: Span, typ: Type, v: Value) -> CResult<Operand> {
        if typ.is_untyped() {
            if v.is_oversized() {
                self.error(f, span, "constant overflow");
                return Ok(Operand::invalid());
            }
            return Ok(Operand::constant(typ, v));
        }
        let Some(k) = typ.basic_kind() else {
            return Ok(Operand::value(typ));
        };
        match constant::representable(&v, k, self.word()) {
            Ok(v) => Ok(Operand::constant(typ, v)),
            Err(ReprError::Truncated) => {
                self.error(f, span, format!("constant {v} truncated to {typ}"));
                Ok(Operand::invalid())
            }
            Err(_) => {
                self.error(f, span, format!("constant {v} overflows {typ}"));
                Ok(Operand::invalid())
            }
        }
    }

    fn unary(&mut self, f: FileId, e: ExprId, op: UnaryOp, operand: ExprId) -> CResult<Operand> {
        let a = self.unit(f)?.arena();
        let span = self.expr_span(f, e)?;
        match op {
            UnaryOp::Addr => {
                if let Expr::CompositeLit { .. } = a.exprs[unparen(a, operand)] {
                    let x = self.expr(f, operand)?;
                    return Ok(if x.is_invalid() {
                        x
                    } else {
                        Operand::value(Type::pointer(x.typ))
                    });
                }
                let x = self.value_operand(f, operand)?;
                if x.is_invalid() {
                    return Ok(x);
                }
                if x.mode != Mode::Var {
                    let d = self.describe(f, operand, &x)?;
                    self.error(f, span, format!("invalid operation: cannot take address of {d}"));
                    return Ok(Operand::invalid());
                }
                Ok(Operand::value(Type::pointer(x.typ)))
            }
            UnaryOp::Deref => {
                let x = self.expr(f, operand)?;
                if x.mode == Mode::TypeExpr {
                    return Ok(Operand::type_expr(Type::pointer(x.typ)));
                }
                let x = self.single(f, operand, x)?;
                if x.is_invalid() {
                    return Ok(x);
                }
                if x.typ.is_nil() {
                    self.error(f, span, "invalid operation: cannot indirect nil");
                    return Ok(Operand::invalid());
                }
                match x.typ.resolve() {
                    Type::Pointer(b) => Ok(Operand::var((*b).clone())),
                    _ => {
                        let d = self.describe(f, operand, &x)?;
                        self.error(f, span, format!("invalid operation: cannot indirect {d}"));
                        Ok(Operand::invalid())
                    }
                }
            }
            UnaryOp::Recv => {
                let x = self.value_operand(f, operand)?;
                if x.is_invalid() {
                    return Ok(x);
                }
                let msg = match x.typ.resolve() {
                    Type::Chan(ChanDir::Send, _) => "cannot receive from send-only channel",
                    Type::Chan(_, el) => {
                        return Ok(Operand {
                            mode: Mode::CommaOk,
                            typ: (*el).clone(),
                        })
                    }
                    _ => "cannot receive from non-channel",
                };
                let d = self.describe(f, operand, &x)?;
                self.error(f, span, format!("invalid operation: {msg} {d}"));
                Ok(Operand::invalid())
            }
            UnaryOp::Add | UnaryOp::Sub | UnaryOp::Not | UnaryOp::Xor => {
                let x = self.value_operand(f, operand)?;
                if x.is_invalid() {
                    return Ok(x);
                }
                let pred: fn(BasicKind) -> bool = match op {
                    UnaryOp::Not => BasicKind::is_boolean,
                    UnaryOp::Xor => BasicKind::is_integer,
                    _ => BasicKind::is_numeric,
                };
                if !op_allowed(&x.typ, pred) {
                    let d = self.describe(f, operand, &x)?;
                    self.error(
                        f,
                        span,
                        format!("invalid operation: operator {} not defined on {d}", unary_str(op)),
                    );
                    return Ok(Operand::invalid());
                }
                if let Mode::Const(v) = &x.mode {
                    let bits = match x.typ.basic_kind() {
                        Some(k) if !k.is_untyped() => unsigned_bits(k, self.word()),
                        _ => None,
                    };
                    return match constant::unary(op, v, bits) {
                        Ok(r) => self.typed_const(f, span, x.typ.clone(), r),
                        Err(err) => {
                            self.error(f, span, format!("invalid operation: {err}"));
                            Ok(Operand::invalid())
                        }
                    };
                }
                Ok(Operand::value(x.typ))
            }
        }
    }

    /// Converts the untyped operand of a binary operation to the other
    /// operand's type.
    fn match_types(
        &mut self,
        f: FileId,
        site: &Site,
        x: (Operand, ExprId),
        y: (Operand, ExprId),
    ) -> CResult<Option<(Operand, Operand)>> {
        let (xu, yu) = (x.0.typ.is_untyped(), y.0.typ.is_untyped());
        let (u, target) = match (xu, yu) {
            (true, false) => (&x, &y.0.typ),
            (false, true) => (&y, &x.0.typ),
            _ => return Ok(Some((x.0, y.0))),
        };
        match self.implicit(&u.0, target) {
            Ok(conv) => Ok(Some(if xu { (conv, y.0) } else { (x.0, conv) })),
            Err(ReprError::Overflow) => {
                let d = self.describe(f, u.1, &u.0)?;
                self.error(f, site.span, format!("{d} overflows {target}"));
                Ok(None)
            }
            Err(ReprError::Truncated) => {
                let d = self.describe(f, u.1, &u.0)?;
                self.error(f, site.span, format!("{d} truncated to {target}"));
                Ok(None)
            }
            Err(ReprError::Kind) => {
                let msg = format!(
                    "invalid operation: {} (mismatched types {} and {})",
                    site.text, x.0.typ, y.0.typ
                );
                self.error(f, site.span, msg);
                Ok(None)
            }
        }
    }

    pub(super) fn binary_op(
        &mut self,
        f: FileId,
        site: &Site,
        op: BinaryOp,
        x: (Operand, ExprId),
        y: (Operand, ExprId),
    ) -> CResult<Operand> {
        if x.0.is_invalid() || y.0.is_invalid() {
            return Ok(Operand::invalid());
        }
        if op.is_shift() {
            return self.shift(f, site, op, x, y);
        }
        if op.is_comparison() {
            return self.comparison(f, site, op, x, y);
        }
        let (xe, ye) = (x.1, y.1);
        let Some((xo, yo)) = self.match_types(f, site, x, y)? else {
            return Ok(Operand::invalid());
        };
        let mismatch = |ck: &mut Self| {
            let msg = format!(
                "invalid operation: {} (mismatched types {} and {})",
                site.text, xo.typ, yo.typ
            );
            ck.error(f, site.span, msg);
            Ok(Operand::invalid())
        };
        let typ = if xo.typ.is_untyped() && yo.typ.is_untyped() {
            let (Some(xk), Some(yk)) = (xo.typ.basic_kind(), yo.typ.basic_kind()) else {
                return mismatch(self);
            };
            match (xk.untyped_rank(), yk.untyped_rank()) {
                (Some(r), Some(s)) => {
                    if r >= s {
                        xo.typ.clone()
                    } else {
                        yo.typ.clone()
                    }
                }
                _ if xk == yk => xo.typ.clone(),
                _ => return mismatch(self),
            }
        } else if types::identical(&xo.typ, &yo.typ) {
            xo.typ.clone()
        } else {
            return mismatch(self);
        };
        if xo.typ.is_nil() || !op_allowed(&typ, binary_pred(op)) {
            let d = self.describe(f, xe, &xo)?;
            self.error(
                f,
                site.span,
                format!("invalid operation: operator {} not defined on {d}", op.as_str()),
            );
            return Ok(Operand::invalid());
        }
        let integer = op_allowed(&typ, BasicKind::is_integer);
        if matches!(op, BinaryOp::Div | BinaryOp::Mod) {
            if let Mode::Const(v) = &yo.mode {
                if is_zero(v) && (integer || matches!(xo.mode, Mode::Const(_))) {
                    let span = self.expr_span(f, ye)?;
                    self.error(f, span, "invalid operation: division by zero");
                    return Ok(Operand::invalid());
                }
            }
        }
        if let (Mode::Const(a), Mode::Const(b)) = (&xo.mode, &yo.mode) {
            return match constant::binary(op, a, b, integer) {
                Ok(v) => self.typed_const(f, site.span, typ, v),
                Err(ConstError::DivByZero) => {
                    self.error(f, site.span, "invalid operation: division by zero");
                    Ok(Operand::invalid())
                }
                Err(ConstError::Overflow) => {
                    self.error(f, site.span, "constant overflow");
                    Ok(Operand::invalid())
                }
                Err(err) => {
                    self.error(f, site.span, format!("invalid operation: {} ({err})", site.text));
                    Ok(Operand::invalid())
                }
            };
        }
        Ok(Operand::value(typ))
    }

    fn comparison(
        &mut self,
        f: FileId,
        site: &Site,
        op: BinaryOp,
        x: (Operand, ExprId),
        y: (Operand, ExprId),
    ) -> CResult<Operand> {
        let xe = x.1;
        let nil_side = x.0.typ.is_nil() || y.0.typ.is_nil();
        let Some((xo, yo)) = self.match_types(f, site, x, y)? else {
            return Ok(Operand::invalid());
        };
        let compatible = if xo.typ.is_untyped() && yo.typ.is_untyped() {
            match (xo.typ.basic_kind(), yo.typ.basic_kind()) {
                (Some(a), Some(b)) => {
                    a == b || (a.untyped_rank().is_some() && b.untyped_rank().is_some())
                }
                _ => false,
            }
        } else {
            types::identical(&xo.typ, &yo.typ)
                || self.assignable(&xo.typ, &yo.typ)?.is_ok()
                || self.assignable(&yo.typ, &xo.typ)?.is_ok()
        };
        if !compatible {
            let msg = format!(
                "invalid operation: {} (mismatched types {} and {})",
                site.text, xo.typ, yo.typ
            );
            self.error(f, site.span, msg);
            return Ok(Operand::invalid());
        }
        let why = if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
            if xo.typ.is_nil() && yo.typ.is_nil() {
                Some(format!("operator {} not defined on nil", op.as_str()))
            } else if nil_side {
                None
            } else {
                let bad = [&xo.typ, &yo.typ]
                    .into_iter()
                    .find(|t| !t.is_comparable())
                    .cloned();
                bad.map(|t| match t.underlying() {
                    Type::Slice(_) => "slice can only be compared to nil".to_string(),
                    Type::Map(..) => "map can only be compared to nil".to_string(),
                    Type::Signature(_) => "func can only be compared to nil".to_string(),
                    _ => format!("{t} cannot be compared"),
                })
            }
        } else if !op_allowed(&xo.typ, BasicKind::is_ordered) {
            let d = self.describe(f, xe, &xo)?;
            Some(format!("operator {} not defined on {d}", op.as_str()))
        } else {
            None
        };
        if let Some(why) = why {
            self.error(f, site.span, format!("invalid operation: {} ({why})", site.text));
            return Ok(Operand::invalid());
        }
        let result = Type::Basic(BasicKind::UntypedBool);
        if let (Mode::Const(a), Mode::Const(b)) = (&xo.mode, &yo.mode) {
            return match constant::compare(op, a, b) {
                Ok(v) => Ok(Operand::constant(result, Value::Bool(v))),
                Err(err) => {
                    self.error(f, site.span, format!("invalid operation: {} ({err})", site.text));
                    Ok(Operand::invalid())
                }
            };
        }
        Ok(Operand::value(result))
    }

    fn shift(
        &mut self,
        f: FileId,
        site: &Site,
        op: BinaryOp,
        (x, xe): (Operand, ExprId),
        (y, ye): (Operand, ExprId),
    ) -> CResult<Operand> {
        let count_span = self.expr_span(f, ye)?;
        // The count becomes an unsigned integer.
        let y = if y.typ.is_untyped() {
            let ok = match &y.mode {
                Mode::Const(v) => v.to_int().is_some_and(|i| !i.is_negative()),
                _ => y.typ.basic_kind().is_some_and(BasicKind::is_numeric),
            };
            if !ok {
                let d = self.describe(f, ye, &y)?;
                self.error(f, count_span, format!("invalid shift count {d}"));
                return Ok(Operand::invalid());
            }
            match &y.mode {
                Mode::Const(v) => Operand::constant(
                    Type::Basic(BasicKind::Uint),
                    v.to_int().map_or(Value::Unknown, Value::Int),
                ),
                _ => Operand::value(Type::Basic(BasicKind::Uint)),
            }
        } else {
            if !op_allowed(&y.typ, BasicKind::is_integer) {
                let d = self.describe(f, ye, &y)?;
                self.error(f, count_span, format!("invalid operation: shift count {d} must be integer"));
                return Ok(Operand::invalid());
            }
            if y.const_value().and_then(Value::to_int).is_some_and(|i| i.is_negative()) {
                let d = self.describe(f, ye, &y)?;
                self.error(f, count_span, format!("invalid shift count {d}"));
                return Ok(Operand::invalid());
            }
            y
        };
        let not_integer = |ck: &mut Self, x: &Operand| -> CResult<Operand> {
            let d = ck.describe(f, xe, x)?;
            ck.error(f, site.span, format!("invalid operation: shifted operand {d} must be integer"));
            Ok(Operand::invalid())
        };
        if let Mode::Const(xv) = &x.mode {
            let integral = if x.typ.is_untyped() {
                xv.to_int().is_some()
            } else {
                op_allowed(&x.typ, BasicKind::is_integer)
            };
            if !integral {
                return not_integer(self, &x);
            }
            if let Mode::Const(yv) = &y.mode {
                let typ = match x.typ.basic_kind() {
                    Some(BasicKind::UntypedRune) => x.typ.clone(),
                    Some(k) if k.is_untyped() => Type::Basic(BasicKind::UntypedInt),
                    _ => x.typ.clone(),
                };
                return match constant::shift(op, xv, yv) {
                    Ok(v) => self.typed_const(f, site.span, typ, v),
                    Err(_) => {
                        let d = self.describe(f, ye, &y)?;
                        self.error(f, count_span, format!("invalid shift count {d}"));
                        Ok(Operand::invalid())
                    }
                };
            }
            if x.typ.is_untyped() {
                // The operand's type would come from the context of the
                // whole expression.
                self.report(
                    DiagKind::Unsupported,
                    f,
                    site.span,
                    "shift of untyped constant by non-constant count is not supported",
                );
                return Ok(Operand::invalid());
            }
            return Ok(Operand::value(x.typ));
        }
        if !op_allowed(&x.typ, BasicKind::is_integer) {
            return not_integer(self, &x);
        }
        Ok(Operand::value(x.typ))
    }

    /// Index checks shared by index, slice and `make` arguments. Returns the
    /// index when it is constant and valid.
    pub(super) fn index_value(&mut self, f: FileId, e: ExprId, bound: Option<u64>) -> CResult<Option<u64>> {
        let x = self.value_operand(f, e)?;
        if x.is_invalid() {
            return Ok(None);
        }
        let span = self.expr_span(f, e)?;
        let x = if x.typ.is_untyped() {
            match self.implicit(&x, &Type::Basic(BasicKind::Int)) {
                Ok(y) => y,
                Err(ReprError::Truncated) => {
                    let d = self.describe(f, e, &x)?;
                    self.error(f, span, format!("{d} truncated to int"));
                    return Ok(None);
                }
                Err(ReprError::Overflow) => {
                    let d = self.describe(f, e, &x)?;
                    self.error(f, span, format!("{d} overflows int"));
                    return Ok(None);
                }
                Err(ReprError::Kind) => {
                    let d = self.describe(f, e, &x)?;
                    self.error(f, span, format!("invalid argument: index {d} must be integer"));
                    return Ok(None);
                }
            }
        } else {
            x
        };
        if !op_allowed(&x.typ, BasicKind::is_integer) {
            let d = self.describe(f, e, &x)?;
            self.error(f, span, format!("invalid argument: index {d} must be integer"));
            return Ok(None);
        }
        let Some(i) = x.const_value().and_then(Value::to_int) else {
            return Ok(None);
        };
        if i.is_negative() {
            let d = self.describe(f, e, &x)?;
            self.error(f, span, format!("invalid argument: index {d} must not be negative"));
            return Ok(None);
        }
        let n = i.to_string();
        match (i.to_u64(), bound) {
            (Some(v), Some(b)) if v < b => Ok(Some(v)),
            (Some(v), None) => Ok(Some(v)),
            (_, b) => {
                let text = self.expr_text(f, e)?;
                let b = b.map_or(n, |b| b.to_string());
                self.error(
                    f,
                    span,
                    format!("invalid argument: index {text} out of bounds [0:{b}]"),
                );
                Ok(None)
            }
        }
    }

    /// Type arguments written in brackets.
    pub(super) fn type_args(&mut self, f: FileId, args: &[ExprOrType]) -> CResult<Vec<Type>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            out.push(match *arg {
                ExprOrType::Type(t) => self.type_expr(f, t)?,
                ExprOrType::Expr(x) => {
                    let op = self.expr(f, x)?;
                    match op.mode {
                        Mode::TypeExpr => op.typ,
                        Mode::Invalid => Type::Invalid,
                        _ => {
                            let span = self.expr_span(f, x)?;
                            let text = self.expr_text(f, x)?;
                            self.error(f, span, format!("{text} is not a type"));
                            Type::Invalid
                        }
                    }
                }
            });
        }
        Ok(out)
    }

    fn index_expr(&mut self, f: FileId, e: ExprId, base: ExprId, args: &[ExprOrType]) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let bx = self.expr(f, base)?;
        if bx.is_invalid() {
            return Ok(Operand::invalid());
        }
        if bx.mode == Mode::TypeExpr {
            let targs = self.type_args(f, args)?;
            return Ok(Operand::type_expr(self.instantiate(f, span, &bx.typ, targs)?));
        }
        if let Type::Signature(sig) = &bx.typ {
            if !sig.type_params.is_empty() {
                let targs = self.type_args(f, args)?;
                return self.instantiate_func(f, e, sig, targs);
            }
        }
        let bx = self.single(f, base, bx)?;
        if bx.is_invalid() {
            return Ok(bx);
        }
        let ie = match args {
            [ExprOrType::Expr(ie)] => *ie,
            [ExprOrType::Type(_)] => {
                let text = self.expr_text(f, base)?;
                self.error(f, span, format!("{text} is not a generic type or function"));
                return Ok(Operand::invalid());
            }
            _ => {
                self.error(f, span, "invalid operation: more than one index");
                return Ok(Operand::invalid());
            }
        };
        let elem_mode = if bx.mode == Mode::Var { Mode::Var } else { Mode::Value };
        match bx.typ.resolve() {
            Type::Basic(k) if k.is_string() => {
                let n = match &bx.mode {
                    Mode::Const(Value::Str(s)) => Some(s.len() as u64),
                    _ => None,
                };
                self.index_value(f, ie, n)?;
                Ok(Operand::value(Type::Basic(BasicKind::Uint8)))
            }
            Type::Array(el, n) => {
                self.index_value(f, ie, Some(n))?;
                Ok(Operand {
                    mode: elem_mode,
                    typ: (*el).clone(),
                })
            }
            Type::Pointer(p) => match p.underlying() {
                Type::Array(el, n) => {
                    self.index_value(f, ie, Some(n))?;
                    Ok(Operand::var((*el).clone()))
                }
                _ => self.cannot(f, span, base, &bx, "index"),
            },
            Type::Slice(el) => {
                self.index_value(f, ie, None)?;
                Ok(Operand::var((*el).clone()))
            }
            Type::Map(k, v) => {
                let ix = self.value_operand(f, ie)?;
                self.assignment(f, ix, &k, ie, "map index")?;
                Ok(Operand {
                    mode: Mode::MapIndex,
                    typ: (*v).clone(),
                })
            }
            _ => self.cannot(f, span, base, &bx, "index"),
        }
    }

    fn cannot(&mut self, f: FileId, span: Span, e: ExprId, x: &Operand, what: &str) -> CResult<Operand> {
        let d = self.describe(f, e, x)?;
        self.error(f, span, format!("invalid operation: cannot {what} {d}"));
        Ok(Operand::invalid())
    }

    fn slice_expr(&mut self, f: FileId, e: ExprId, base: ExprId, idx: [Option<ExprId>; 3]) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let x = self.value_operand(f, base)?;
        if x.is_invalid() {
            return Ok(x);
        }
        let (result, len) = match x.typ.resolve() {
            Type::Basic(k) if k.is_string() => {
                if idx[2].is_some() {
                    self.error(f, span, "invalid operation: 3-index slice of string");
                    return Ok(Operand::invalid());
                }
                let len = match &x.mode {
                    Mode::Const(Value::Str(s)) => Some(s.len() as u64),
                    _ => None,
                };
                let t = if x.typ.is_untyped() {
                    Type::Basic(BasicKind::String)
                } else {
                    x.typ.clone()
                };
                (t, len)
            }
            Type::Array(el, n) => {
                if x.mode != Mode::Var {
                    let d = self.describe(f, base, &x)?;
                    self.error(f, span, format!("invalid operation: {d} (slice of unaddressable value)"));
                    return Ok(Operand::invalid());
                }
                (Type::slice((*el).clone()), Some(n))
            }
            Type::Pointer(p) => match p.underlying() {
                Type::Array(el, n) => (Type::slice((*el).clone()), Some(n)),
                _ => return self.cannot(f, span, base, &x, "slice"),
            },
            Type::Slice(_) => (x.typ.clone(), None),
            _ => return self.cannot(f, span, base, &x, "slice"),
        };
        let mut prev: Option<u64> = None;
        for ie in idx.into_iter().flatten() {
            let v = self.index_value(f, ie, len.map(|n| n + 1))?;
            if let (Some(p), Some(v)) = (prev, v) {
                if v < p {
                    self.error(f, span, format!("invalid slice indices: {v} < {p}"));
                }
            }
            prev = v.or(prev);
        }
        Ok(Operand::value(result))
    }

    /// `x.(T)` and type switch cases.
    pub(super) fn assert_type(&mut self, f: FileId, span: Span, xe: ExprId, x: &Operand, t: &Type) -> CResult<bool> {
        if x.is_invalid() || t.is_invalid() {
            return Ok(false);
        }
        let Type::Interface(i) = x.typ.underlying() else {
            let d = self.describe(f, xe, x)?;
            self.error(f, span, format!("invalid operation: {d} is not an interface"));
            return Ok(false);
        };
        if t.is_interface() {
            return Ok(true);
        }
        if let Some(why) = self.missing_method(t, &i)? {
            self.error(
                f,
                span,
                format!("impossible type assertion: {t} does not implement {} ({why})", x.typ),
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Implicit conversion of an untyped operand to `target`.
    pub(super) fn implicit(&self, x: &Operand, target: &Type) -> Result<Operand, ReprError> {
        let Type::Basic(xk) = x.typ else {
            return Ok(x.clone());
        };
        if !xk.is_untyped() || target.is_invalid() {
            return Ok(x.clone());
        }
        let retyped = |mode: Mode| Operand {
            mode,
            typ: target.clone(),
        };
        match target.underlying() {
            Type::Basic(tk) if tk.is_untyped() => Ok(x.clone()),
            Type::Basic(tk) => {
                if xk == BasicKind::UntypedNil {
                    return if tk == BasicKind::UnsafePointer {
                        Ok(retyped(Mode::Value))
                    } else {
                        Err(ReprError::Kind)
                    };
                }
                if !untyped_compatible(xk, tk) {
                    return Err(ReprError::Kind);
                }
                let mode = match &x.mode {
                    Mode::Const(v) => Mode::Const(constant::representable(v, tk, self.word())?),
                    m => m.clone(),
                };
                Ok(retyped(mode))
            }
            Type::Interface(_) => {
                if xk == BasicKind::UntypedNil {
                    return Ok(retyped(Mode::Value));
                }
                self.implicit(x, &default_type(&x.typ))
            }
            Type::TypeParam(_) => {
                if xk == BasicKind::UntypedNil {
                    return Err(ReprError::Kind);
                }
                match target.resolve() {
                    Type::Basic(tk) => {
                        if !untyped_compatible(xk, tk) {
                            return Err(ReprError::Kind);
                        }
                        if let Mode::Const(v) = &x.mode {
                            constant::representable(v, tk, self.word())?;
                        }
                        Ok(retyped(Mode::Value))
                    }
                    _ => Ok(retyped(Mode::Value)),
                }
            }
            Type::Pointer(_) | Type::Slice(_) | Type::Map(..) | Type::Chan(..) | Type::Signature(_)
                if xk == BasicKind::UntypedNil =>
            {
                Ok(retyped(Mode::Value))
            }
            _ => Err(ReprError::Kind),
        }
    }

    /// Whether a value of type `v` may be assigned to `t`; the error carries
    /// an explanation when there is one.
    pub(super) fn assignable(&mut self, v: &Type, t: &Type) -> CResult<Result<(), String>> {
        if v.is_invalid() || t.is_invalid() || types::identical(v, t) {
            return Ok(Ok(()));
        }
        if v.is_nil() {
            return Ok(if t.is_nillable() && !matches!(t, Type::TypeParam(_)) {
                Ok(())
            } else {
                Err(String::new())
            });
        }
        let named = |t: &Type| matches!(t, Type::Named(_) | Type::TypeParam(_) | Type::Basic(_));
        let params = matches!(v, Type::TypeParam(_)) || matches!(t, Type::TypeParam(_));
        let (vu, tu) = (v.underlying(), t.underlying());
        if !params && (!named(v) || !named(t)) && types::identical(&vu, &tu) {
            return Ok(Ok(()));
        }
        if let Type::Interface(i) = &tu {
            if !matches!(t, Type::TypeParam(_)) {
                return Ok(match self.missing_method(v, i)? {
                    None => Ok(()),
                    Some(why) => Err(format!("{v} does not implement {t} ({why})")),
                });
            }
        }
        if let (Type::Chan(ChanDir::Both, e1), Type::Chan(_, e2)) = (&vu, &tu) {
            if (!named(v) || !named(t)) && types::identical(e1, e2) {
                return Ok(Ok(()));
            }
        }
        if vu.is_interface() && !tu.is_interface() {
            return Ok(Err("need type assertion".into()));
        }
        Ok(Err(String::new()))
    }

    /// Checks that `x` (from expression `e`) can be assigned to `target`
    /// and returns it converted.
    pub(super) fn assignment(
        &mut self,
        f: FileId,
        x: Operand,
        target: &Type,
        e: ExprId,
        ctx: &str,
    ) -> CResult<Operand> {
        let x = self.single(f, e, x)?;
        if x.is_invalid() || target.is_invalid() {
            return Ok(Operand::invalid());
        }
        let span = self.expr_span(f, e)?;
        let suffix = match self.implicit(&x, target) {
            Ok(y) => match self.assignable(&y.typ, target)? {
                Ok(()) => return Ok(y),
                Err(why) if why.is_empty() => String::new(),
                Err(why) => format!(":\n\t{why}"),
            },
            Err(ReprError::Overflow) => " (overflows)".into(),
            Err(ReprError::Truncated) => " (truncated)".into(),
            Err(ReprError::Kind) => String::new(),
        };
        let d = self.describe(f, e, &x)?;
        self.error(f, span, format!("cannot use {d} as {target} value in {ctx}{suffix}"));
        Ok(Operand::invalid())
    }

    /// Type of a variable initialized from `x` without a declared type.
    pub(super) fn var_type(&mut self, f: FileId, x: Operand, e: ExprId, ctx: &str) -> CResult<Type> {
        let x = self.single(f, e, x)?;
        if x.is_invalid() {
            return Ok(Type::Invalid);
        }
        if x.typ.is_nil() {
            let span = self.expr_span(f, e)?;
            self.error(f, span, format!("use of untyped nil in {ctx}"));
            return Ok(Type::Invalid);
        }
        if x.typ.is_untyped() {
            let t = default_type(&x.typ);
            let y = self.assignment(f, x, &t, e, ctx)?;
            return Ok(if y.is_invalid() { Type::Invalid } else { t });
        }
        Ok(x.typ)
    }
}
