//! Calls of predeclared functions and of the `unsafe` functions.

use super::decl::default_type;
use super::expr::{op_allowed, unparen, Mode, Operand};
use super::select::Selection;
use super::{CResult, Checker};
use crate::constant::{self, Value};
use crate::cst::{BinaryOp, ChanDir, CstArena, Expr, ExprId, ExprOrType, UnaryOp};
use crate::error::FileId;
use crate::token::Tok;
use crate::types::{self, BasicKind, Type};
use crate::universe::{self, Builtin};
use crate::walk::{Visitor, Walk};

/// Finds function calls and receives, which make `len` and `cap` of an
/// array non-constant.
struct CallOrRecv(bool);

impl<'cst> Visitor<'cst> for CallOrRecv {
    fn visit_expr(&mut self, a: &'cst CstArena, id: ExprId) {
        match &a.exprs[id] {
            Expr::Call { .. } | Expr::Unary { op: UnaryOp::Recv, .. } => self.0 = true,
            Expr::FuncLit { .. } => {}
            e => e.walk(a, self),
        }
    }
}

fn has_call_or_recv(a: &CstArena, e: ExprId) -> bool {
    let mut v = CallOrRecv(false);
    v.visit_expr(a, e);
    v.0
}

fn int_const(n: u64) -> Operand {
    Operand::constant(Type::Basic(BasicKind::Int), Value::int(n))
}

fn uintptr_const(n: u64) -> Operand {
    Operand::constant(Type::Basic(BasicKind::Uintptr), Value::int(n))
}

fn no_value() -> Operand {
    Operand {
        mode: Mode::NoValue,
        typ: Type::Invalid,
    }
}

impl<'a> Checker<'a> {
    pub(super) fn builtin_call(
        &mut self,
        f: FileId,
        e: ExprId,
        b: Builtin,
        args: &[ExprOrType],
        ellipsis: Option<Tok>,
    ) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let name = b.name();
        let (min, more) = b.arity();
        let n = args.len();
        if n < min || (!more && n > min) {
            let which = if n < min { "not enough" } else { "too many" };
            self.error(
                f,
                span,
                format!("{which} arguments for {name}() (expected {min}, found {n})"),
            );
            return Ok(Operand::invalid());
        }
        if ellipsis.is_some() && b != Builtin::Append {
            self.error(f, span, format!("invalid operation: invalid use of ... with built-in {name}"));
            return Ok(Operand::invalid());
        }
        match b {
            Builtin::New => {
                let t = self.type_arg(f, &args[0])?;
                return Ok(if t.is_invalid() {
                    Operand::invalid()
                } else {
                    Operand::value(Type::pointer(t))
                });
            }
            Builtin::Make => return self.make(f, e, args),
            Builtin::Offsetof => return self.offsetof(f, e, &args[0]),
            _ => {}
        }
        let mut ops = Vec::with_capacity(n);
        for arg in args {
            match *arg {
                ExprOrType::Expr(x) => ops.push((self.value_operand(f, x)?, x)),
                ExprOrType::Type(t) => {
                    let ty = self.type_expr(f, t)?;
                    let tspan = self.unit(f)?.arena().types.span(t);
                    self.error(f, tspan, format!("{ty} (type) is not an expression"));
                    return Ok(Operand::invalid());
                }
            }
        }
        if ops.iter().any(|(x, _)| x.is_invalid()) {
            return Ok(Operand::invalid());
        }
        let a = self.unit(f)?.arena();
        let (x, xe) = ops.first().cloned().unwrap_or((Operand::invalid(), e));
        match b {
            Builtin::Len | Builtin::Cap => {
                let result = match x.typ.resolve() {
                    Type::Basic(k) if k.is_string() && b == Builtin::Len => match &x.mode {
                        Mode::Const(Value::Str(s)) => Some(int_const(s.len() as u64)),
                        _ => Some(Operand::value(Type::Basic(BasicKind::Int))),
                    },
                    Type::Array(_, len) => Some(if has_call_or_recv(a, xe) {
                        Operand::value(Type::Basic(BasicKind::Int))
                    } else {
                        int_const(len)
                    }),
                    Type::Pointer(p) => match p.underlying() {
                        Type::Array(_, len) if !has_call_or_recv(a, xe) => Some(int_const(len)),
                        Type::Array(..) => Some(Operand::value(Type::Basic(BasicKind::Int))),
                        _ => None,
                    },
                    Type::Slice(_) | Type::Chan(..) | Type::TypeParam(_) => {
                        Some(Operand::value(Type::Basic(BasicKind::Int)))
                    }
                    Type::Map(..) if b == Builtin::Len => Some(Operand::value(Type::Basic(BasicKind::Int))),
                    _ => None,
                };
                match result {
                    Some(r) => Ok(r),
                    None => self.bad_argument(f, xe, &x, &format!("for built-in {name}")),
                }
            }
            Builtin::Append => {
                if x.typ.is_nil() {
                    self.error(f, span, "first argument to append must be a typed slice; found untyped nil");
                    return Ok(Operand::invalid());
                }
                let Type::Slice(el) = x.typ.resolve() else {
                    return self.bad_argument(f, xe, &x, "is not a slice");
                };
                if ellipsis.is_some() {
                    let [_, (y, ye)] = ops.as_slice() else {
                        self.error(f, span, "can only use ... with final argument in list");
                        return Ok(Operand::invalid());
                    };
                    let bytes = matches!(el.resolve(), Type::Basic(BasicKind::Uint8))
                        && y.typ.basic_kind().is_some_and(BasicKind::is_string);
                    if !bytes {
                        self.assignment(f, y.clone(), &x.typ, *ye, "argument to append")?;
                    }
                } else {
                    for (y, ye) in ops.iter().skip(1) {
                        self.assignment(f, y.clone(), &el, *ye, "argument to append")?;
                    }
                }
                Ok(Operand::value(x.typ))
            }
            Builtin::Copy => {
                let (y, ye) = ops[1].clone();
                let dst = match x.typ.resolve() {
                    Type::Slice(el) => (*el).clone(),
                    _ => return self.bad_argument(f, xe, &x, "is not a slice"),
                };
                let src = match y.typ.resolve() {
                    Type::Slice(el) => (*el).clone(),
                    Type::Basic(k) if k.is_string() => Type::Basic(BasicKind::Uint8),
                    _ => return self.bad_argument(f, ye, &y, "is not a slice or string"),
                };
                if !types::identical(&dst, &src) {
                    let (dx, dy) = (self.describe(f, xe, &x)?, self.describe(f, ye, &y)?);
                    self.error(
                        f,
                        span,
                        format!("arguments to copy {dx} and {dy} have different element types {dst} and {src}"),
                    );
                    return Ok(Operand::invalid());
                }
                Ok(Operand::value(Type::Basic(BasicKind::Int)))
            }
            Builtin::Delete => {
                let Type::Map(k, _) = x.typ.resolve() else {
                    return self.bad_argument(f, xe, &x, "is not a map");
                };
                let (y, ye) = ops[1].clone();
                self.assignment(f, y, &k, ye, "argument to delete")?;
                Ok(no_value())
            }
            Builtin::Clear => match x.typ.resolve() {
                Type::Map(..) | Type::Slice(_) => Ok(no_value()),
                _ => self.bad_argument(f, xe, &x, "is not a map or slice"),
            },
            Builtin::Close => match x.typ.resolve() {
                Type::Chan(ChanDir::Recv, _) => {
                    let d = self.describe(f, xe, &x)?;
                    self.error(f, span, format!("invalid operation: cannot close receive-only channel {d}"));
                    Ok(Operand::invalid())
                }
                Type::Chan(..) => Ok(no_value()),
                _ => self.bad_argument(f, xe, &x, "is not a channel"),
            },
            Builtin::Panic => {
                self.assignment(f, x, &universe::any_type(), xe, "argument to panic")?;
                Ok(no_value())
            }
            Builtin::Print | Builtin::Println => {
                let ctx = format!("argument to built-in {name}");
                for (y, ye) in ops {
                    self.var_type(f, y, ye, &ctx)?;
                }
                Ok(no_value())
            }
            Builtin::Recover => Ok(Operand::value(universe::any_type())),
            Builtin::Complex => self.complex(f, e, ops[0].clone(), ops[1].clone()),
            Builtin::Real | Builtin::Imag => {
                let part = |v: &Value| {
                    v.to_complex()
                        .map(|(re, im)| Value::Float(if b == Builtin::Real { re } else { im }))
                };
                let typ = match x.typ.basic_kind() {
                    Some(BasicKind::UntypedComplex | BasicKind::UntypedFloat | BasicKind::UntypedInt | BasicKind::UntypedRune) => {
                        Type::Basic(BasicKind::UntypedFloat)
                    }
                    Some(BasicKind::Complex64) => Type::Basic(BasicKind::Float32),
                    Some(BasicKind::Complex128) => Type::Basic(BasicKind::Float64),
                    _ => {
                        let msg = format!("arguments have type {}, expected complex", x.typ);
                        return self.bad_argument(f, xe, &x, &msg);
                    }
                };
                Ok(match x.const_value().and_then(part) {
                    Some(v) => Operand::constant(typ, v),
                    None => Operand::value(typ),
                })
            }
            Builtin::Min | Builtin::Max => self.min_max(f, e, b, ops),
            Builtin::Sizeof | Builtin::Alignof => {
                let t = default_type(&x.typ);
                let n = if b == Builtin::Sizeof {
                    t.size(self.word())
                } else {
                    t.align(self.word())
                };
                Ok(match n {
                    Some(n) => uintptr_const(n),
                    None => Operand::value(Type::Basic(BasicKind::Uintptr)),
                })
            }
            Builtin::Add => {
                let unsafe_ptr = Type::Basic(BasicKind::UnsafePointer);
                self.assignment(f, x, &unsafe_ptr, xe, "argument to unsafe.Add")?;
                self.index_value(f, ops[1].1, None)?;
                Ok(Operand::value(unsafe_ptr))
            }
            Builtin::Slice | Builtin::String => {
                let Type::Pointer(el) = x.typ.resolve() else {
                    return self.bad_argument(f, xe, &x, "is not a pointer");
                };
                self.index_value(f, ops[1].1, None)?;
                if b == Builtin::Slice {
                    return Ok(Operand::value(Type::slice((*el).clone())));
                }
                if !matches!(el.resolve(), Type::Basic(BasicKind::Uint8)) {
                    return self.bad_argument(f, xe, &x, "is not a *byte");
                }
                Ok(Operand::value(Type::Basic(BasicKind::String)))
            }
            Builtin::StringData => {
                self.assignment(f, x, &Type::Basic(BasicKind::String), xe, "argument to unsafe.StringData")?;
                Ok(Operand::value(Type::pointer(Type::Basic(BasicKind::Uint8))))
            }
            Builtin::SliceData => match x.typ.resolve() {
                Type::Slice(el) => Ok(Operand::value(Type::pointer((*el).clone()))),
                _ => self.bad_argument(f, xe, &x, "is not a slice"),
            },
            Builtin::New | Builtin::Make | Builtin::Offsetof => Ok(Operand::invalid()),
        }
    }

    fn bad_argument(&mut self, f: FileId, e: ExprId, x: &Operand, what: &str) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let d = self.describe(f, e, x)?;
        self.error(f, span, format!("invalid argument: {d} {what}"));
        Ok(Operand::invalid())
    }

    fn type_arg(&mut self, f: FileId, arg: &ExprOrType) -> CResult<Type> {
        match *arg {
            ExprOrType::Type(t) => self.type_expr(f, t),
            ExprOrType::Expr(x) => {
                let op = self.expr(f, x)?;
                match op.mode {
                    Mode::TypeExpr => Ok(op.typ),
                    Mode::Invalid => Ok(Type::Invalid),
                    _ => {
                        let span = self.expr_span(f, x)?;
                        let text = self.expr_text(f, x)?;
                        self.error(f, span, format!("{text} is not a type"));
                        Ok(Type::Invalid)
                    }
                }
            }
        }
    }

    fn make(&mut self, f: FileId, e: ExprId, args: &[ExprOrType]) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let t = self.type_arg(f, &args[0])?;
        if t.is_invalid() {
            return Ok(Operand::invalid());
        }
        let min = match t.resolve() {
            Type::Slice(_) => 2,
            Type::Map(..) | Type::Chan(..) => 1,
            _ => {
                self.error(
                    f,
                    span,
                    format!("invalid argument: cannot make {t}; type must be slice, map, or channel"),
                );
                return Ok(Operand::invalid());
            }
        };
        if args.len() < min || args.len() > min + 1 {
            let text = self.expr_text(f, e)?;
            self.error(
                f,
                span,
                format!(
                    "invalid operation: {text} expects {min} or {} arguments; found {}",
                    min + 1,
                    args.len()
                ),
            );
            return Ok(Operand::invalid());
        }
        let mut sizes = Vec::new();
        for arg in &args[1..] {
            match *arg {
                ExprOrType::Expr(x) => sizes.push(self.index_value(f, x, None)?),
                ExprOrType::Type(_) => {
                    self.error(f, span, "type is not an expression");
                    return Ok(Operand::invalid());
                }
            }
        }
        if let [Some(len), Some(cap)] = sizes.as_slice() {
            if len > cap {
                self.error(f, span, "invalid argument: length and capacity swapped");
                return Ok(Operand::invalid());
            }
        }
        Ok(Operand::value(t))
    }

    /// `unsafe.Offsetof(x.f)`: offset of `f` within `x`, following
    /// embedded fields held by value.
    fn offsetof(&mut self, f: FileId, e: ExprId, arg: &ExprOrType) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let a = self.unit(f)?.arena();
        let sel_expr = match *arg {
            ExprOrType::Expr(x) => unparen(a, x),
            ExprOrType::Type(t) => {
                let tspan = a.types.span(t);
                self.error(f, tspan, "invalid argument: type is not a selector expression");
                return Ok(Operand::invalid());
            }
        };
        let Expr::Selector { base, sel, .. } = a.exprs[sel_expr] else {
            let text = self.expr_text(f, sel_expr)?;
            self.error(f, span, format!("invalid argument: {text} is not a selector expression"));
            return Ok(Operand::invalid());
        };
        let x = self.value_operand(f, sel_expr)?;
        if x.is_invalid() {
            return Ok(Operand::invalid());
        }
        let bx = self.value_operand(f, base)?;
        let name = self.ident_text(f, sel)?;
        let Selection::Field { path, .. } = self.lookup_field_or_method(&bx.typ, name)? else {
            let text = self.expr_text(f, sel_expr)?;
            self.error(f, span, format!("invalid argument: {text} is a method value"));
            return Ok(Operand::invalid());
        };
        let mut cur = match bx.typ.resolve() {
            Type::Pointer(p) => (*p).clone(),
            t => t,
        };
        let mut off = 0u64;
        for (depth, &i) in path.iter().enumerate() {
            let Type::Struct(s) = cur.underlying() else {
                return Ok(Operand::value(Type::Basic(BasicKind::Uintptr)));
            };
            let Some(offs) = cur.field_offsets(self.word()) else {
                return Ok(Operand::value(Type::Basic(BasicKind::Uintptr)));
            };
            off += offs[i];
            cur = s.fields[i].typ.clone();
            if depth + 1 < path.len() && matches!(cur, Type::Pointer(_)) {
                let text = self.expr_text(f, sel_expr)?;
                let base_text = self.expr_text(f, base)?;
                self.error(
                    f,
                    span,
                    format!("invalid argument: field {name} is embedded via a pointer in {base_text} ({text})"),
                );
                return Ok(Operand::invalid());
            }
        }
        Ok(uintptr_const(off))
    }

    fn complex(
        &mut self,
        f: FileId,
        e: ExprId,
        (x, xe): (Operand, ExprId),
        (y, ye): (Operand, ExprId),
    ) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        if let (Mode::Const(a), Mode::Const(b)) = (&x.mode, &y.mode) {
            if x.typ.is_untyped() && y.typ.is_untyped() {
                return match (a.to_float(), b.to_float()) {
                    (Some(re), Some(im)) => Ok(Operand::constant(
                        Type::Basic(BasicKind::UntypedComplex),
                        Value::Complex(re, im),
                    )),
                    _ => self.bad_argument(f, xe, &x, "must be a floating-point constant"),
                };
            }
        }
        let (x, y) = match (x.typ.is_untyped(), y.typ.is_untyped()) {
            (true, false) => (self.implicit(&x, &y.typ).unwrap_or_else(|_| x.clone()), y),
            (false, true) => {
                let y2 = self.implicit(&y, &x.typ).unwrap_or_else(|_| y.clone());
                (x, y2)
            }
            (true, true) => {
                let t = Type::Basic(BasicKind::Float64);
                (
                    self.implicit(&x, &t).unwrap_or_else(|_| x.clone()),
                    self.implicit(&y, &t).unwrap_or_else(|_| y.clone()),
                )
            }
            (false, false) => (x, y),
        };
        if !types::identical(&x.typ, &y.typ) {
            let text = self.expr_text(f, e)?;
            self.error(
                f,
                span,
                format!("invalid operation: {text} (mismatched types {} and {})", x.typ, y.typ),
            );
            return Ok(Operand::invalid());
        }
        let typ = match x.typ.basic_kind() {
            Some(BasicKind::Float32) => Type::Basic(BasicKind::Complex64),
            Some(BasicKind::Float64) => Type::Basic(BasicKind::Complex128),
            _ => {
                let msg = format!("arguments have type {}, expected floating-point", x.typ);
                return self.bad_argument(f, ye, &y, &msg);
            }
        };
        if let (Some(a), Some(b)) = (x.const_value(), y.const_value()) {
            if let (Some(re), Some(im)) = (a.to_float(), b.to_float()) {
                return self.typed_const(f, span, typ, Value::Complex(re, im));
            }
        }
        Ok(Operand::value(typ))
    }

    fn min_max(&mut self, f: FileId, e: ExprId, b: Builtin, ops: Vec<(Operand, ExprId)>) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let typed = ops.iter().find(|(x, _)| !x.typ.is_untyped()).map(|(x, _)| x.typ.clone());
        let mut conv = Vec::with_capacity(ops.len());
        for (x, xe) in ops {
            let y = match &typed {
                Some(t) => match self.implicit(&x, t) {
                    Ok(y) => y,
                    Err(_) => {
                        let d = self.describe(f, xe, &x)?;
                        self.error(f, span, format!("invalid argument: mismatched types {t} (previous argument) and {} (type of {d})", x.typ));
                        return Ok(Operand::invalid());
                    }
                },
                None => x,
            };
            if !op_allowed(&y.typ, BasicKind::is_ordered) {
                return self.bad_argument(f, xe, &y, "cannot be ordered");
            }
            if let Some(t) = &typed {
                if !types::identical(&y.typ, t) {
                    let d = self.describe(f, xe, &y)?;
                    self.error(
                        f,
                        span,
                        format!("invalid argument: mismatched types {t} (previous argument) and {} (type of {d})", y.typ),
                    );
                    return Ok(Operand::invalid());
                }
            }
            conv.push(y);
        }
        let typ = match &typed {
            Some(t) => t.clone(),
            None => conv
                .iter()
                .map(|x| x.typ.clone())
                .max_by_key(|t| t.basic_kind().and_then(BasicKind::untyped_rank))
                .unwrap_or(Type::Invalid),
        };
        let mut best: Option<Value> = None;
        for x in &conv {
            let Some(v) = x.const_value() else {
                return Ok(Operand::value(typ));
            };
            best = Some(match best {
                None => v.clone(),
                Some(cur) => {
                    let less = constant::compare(BinaryOp::Lt, v, &cur).unwrap_or(false);
                    let pick = match b {
                        Builtin::Min => less,
                        _ => !less && constant::compare(BinaryOp::Ne, v, &cur).unwrap_or(false),
                    };
                    if pick {
                        v.clone()
                    } else {
                        cur
                    }
                }
            });
        }
        Ok(match best {
            Some(v) => Operand::constant(typ, v),
            None => Operand::invalid(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assert_clean, assert_error, check, const_of, messages, type_of};
    use crate::constant::Value;

    #[test]
    fn len_of_arrays_is_constant() {
        let out = check(
            "package p\nvar a [4]int\nconst n = len(a)\nconst s = len(\"héllo\")\nvar p *[3]int\nconst m = cap(p)\n",
        );
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(const_of(&out, "n"), Value::int(4));
        assert_eq!(const_of(&out, "s"), Value::int(6));
        assert_eq!(const_of(&out, "m"), Value::int(3));
        assert_error(
            "package p\nfunc g() [2]int { return [2]int{} }\nconst n = len(g())\n",
            "len(g()) (value of type int) is not constant",
        );
    }

    #[test]
    fn argument_counts() {
        assert_error(
            "package p\nvar x = len()\n",
            "not enough arguments for len() (expected 1, found 0)",
        );
        assert_error(
            "package p\nvar s []int\nvar x = len(s, s)\n",
            "too many arguments for len() (expected 1, found 2)",
        );
    }

    #[test]
    fn make_and_new() {
        let out = check("package p\nvar s = make([]int, 2, 4)\nvar m = make(map[string]int)\nvar p = new(int)\n");
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(type_of(&out, "s"), "[]int");
        assert_eq!(type_of(&out, "m"), "map[string]int");
        assert_eq!(type_of(&out, "p"), "*int");
        assert_error("package p\nvar s = make([]int)\n", "expects 2 or 3 arguments; found 1");
        assert_error("package p\nvar s = make([]int, 4, 2)\n", "length and capacity swapped");
        assert_error("package p\nvar s = make(int)\n", "cannot make int");
    }

    #[test]
    fn append_and_copy() {
        assert_clean(
            "package p\nfunc f(b []byte, s string, xs []int) {\n\tb = append(b, s...)\n\txs = append(xs, 1, 2)\n\txs = append(xs, xs...)\n\t_ = copy(b, s)\n}\n",
        );
        assert_error(
            "package p\nvar x = append(nil, 1)\n",
            "first argument to append must be a typed slice; found untyped nil",
        );
        assert_error("package p\nfunc f(xs []int) { xs = append(xs, \"a\") }\n", "as int value in argument to append");
    }

    #[test]
    fn constant_min_max_and_complex() {
        let out = check("package p\nconst a = min(3, 1, 2)\nconst b = max(1, 2.5)\nconst c = complex(1, 2)\nconst r = real(c)\n");
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(const_of(&out, "a"), Value::int(1));
        assert_eq!(const_of(&out, "b").to_string(), "2.5");
        assert_eq!(type_of(&out, "c"), "untyped complex");
        assert_eq!(const_of(&out, "r").to_string(), "1");
    }

    #[test]
    fn sizes_follow_the_word() {
        let out = check(
            "package p\nimport \"unsafe\"\ntype T struct{ a byte; b string; c int32 }\nconst s = unsafe.Sizeof(T{})\nconst al = unsafe.Alignof(T{})\nconst o = unsafe.Offsetof(T{}.c)\n",
        );
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(const_of(&out, "s"), Value::int(32));
        assert_eq!(const_of(&out, "al"), Value::int(8));
        assert_eq!(const_of(&out, "o"), Value::int(24));
        assert_eq!(type_of(&out, "s"), "uintptr");
    }
}
