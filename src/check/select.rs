//! Field and method lookup, selectors and method sets.

use std::collections::HashSet;
use std::sync::Arc;

use smallvec::{smallvec, SmallVec};

use super::expr::{Mode, Operand};
use super::{CResult, Checker};
use crate::cst::{Expr, ExprId, IdentName};
use crate::error::FileId;
use crate::types::{self, Interface, Method, Param, Signature, Type};

/// Embedding depth after which lookup gives up.
const MAX_EMBED_DEPTH: usize = 16;

/// Field indices from the outer struct down to the selected field.
pub(super) type FieldPath = SmallVec<[usize; 4]>;

#[derive(Debug, Clone)]
pub(super) enum Selection {
    Field {
        typ: Type,
        path: FieldPath,
        /// A pointer was followed on the way.
        indirect: bool,
    },
    Method {
        method: Method,
        indirect: bool,
    },
    Ambiguous,
    NotFound,
}

struct Candidate {
    typ: Type,
    path: FieldPath,
    indirect: bool,
}

impl<'a> Checker<'a> {
    /// Finds `name` in `t`, breadth first through embedded fields: the
    /// shallowest match wins and two matches at one depth are ambiguous.
    pub(super) fn lookup_field_or_method(&mut self, t: &Type, name: &str) -> CResult<Selection> {
        if let Type::TypeParam(tp) = t {
            let c = tp.constraint.read().clone();
            if let Type::Interface(i) = c.underlying() {
                if let Some(m) = i.all_methods().into_iter().find(|m| &*m.name == name) {
                    return Ok(Selection::Method {
                        method: m,
                        indirect: false,
                    });
                }
            }
        }
        let (start, indirect) = match t {
            Type::Pointer(b) => ((**b).clone(), true),
            Type::Named(_) => (t.clone(), false),
            _ => match t.underlying() {
                Type::Pointer(b) => ((*b).clone(), true),
                _ => (t.clone(), false),
            },
        };
        let mut level = vec![Candidate {
            typ: start,
            path: smallvec![],
            indirect,
        }];
        let mut seen = HashSet::new();
        for _ in 0..MAX_EMBED_DEPTH {
            if level.is_empty() {
                break;
            }
            let mut found = None;
            let mut hits = 0usize;
            let mut next = Vec::new();
            for cand in &level {
                if let Type::Named(n) = &cand.typ {
                    if !seen.insert(n.id) {
                        continue;
                    }
                    self.ensure_methods(n)?;
                    if let Some(m) = n.method(name) {
                        hits += 1;
                        found = Some(Selection::Method {
                            method: m,
                            indirect: cand.indirect,
                        });
                        continue;
                    }
                }
                match cand.typ.underlying() {
                    Type::Struct(s) => {
                        for (i, fl) in s.fields.iter().enumerate() {
                            let mut path = cand.path.clone();
                            path.push(i);
                            if &*fl.name == name {
                                hits += 1;
                                found = Some(Selection::Field {
                                    typ: fl.typ.clone(),
                                    path: path.clone(),
                                    indirect: cand.indirect,
                                });
                            }
                            if fl.embedded {
                                let (typ, ptr) = match &fl.typ {
                                    Type::Pointer(b) => ((**b).clone(), true),
                                    t => (t.clone(), false),
                                };
                                next.push(Candidate {
                                    typ,
                                    path,
                                    indirect: cand.indirect || ptr,
                                });
                            }
                        }
                    }
                    Type::Interface(i) => {
                        if let Some(m) = i.all_methods().into_iter().find(|m| &*m.name == name) {
                            hits += 1;
                            found = Some(Selection::Method {
                                method: m,
                                indirect: cand.indirect,
                            });
                        }
                    }
                    _ => {}
                }
            }
            match (hits, found) {
                (1, Some(sel)) => return Ok(sel),
                (0, _) => level = next,
                _ => return Ok(Selection::Ambiguous),
            }
        }
        Ok(Selection::NotFound)
    }

    /// Why `t` does not implement `iface`, if it does not.
    pub(super) fn missing_method(&mut self, t: &Type, iface: &Interface) -> CResult<Option<String>> {
        if t.is_invalid() {
            return Ok(None);
        }
        for m in iface.all_methods() {
            let (found, ptr_ok) = match self.lookup_field_or_method(t, &m.name)? {
                Selection::Method { method, indirect } => {
                    let ptr_ok = !method.pointer_recv || indirect;
                    (method, ptr_ok)
                }
                _ => return Ok(Some(format!("missing method {}", m.name))),
            };
            if !types::identical_sig(&found.sig, &m.sig) {
                return Ok(Some(format!("wrong type for method {}", m.name)));
            }
            if !ptr_ok {
                return Ok(Some(format!("method {} has pointer receiver", m.name)));
            }
        }
        Ok(None)
    }

    pub(super) fn selector(&mut self, f: FileId, e: ExprId, base: ExprId, sel: IdentName) -> CResult<Operand> {
        let a = self.unit(f)?.arena();
        if let Expr::Ident { name, scope } = a.exprs[base] {
            if let Some(pkg) = self.package_ref(f, scope, name)? {
                let Some(pkg) = pkg else {
                    return Ok(Operand::invalid());
                };
                let ent = self.package_member(f, &pkg, sel)?;
                return Ok(Operand::of_entity(ent));
            }
        }
        let name = self.ident_text(f, sel)?;
        let span = self.expr_span(f, e)?;
        let x = self.expr(f, base)?;
        if x.is_invalid() {
            return Ok(Operand::invalid());
        }
        if x.mode == Mode::TypeExpr {
            return self.method_expr(f, e, &x.typ, name);
        }
        let x = self.single(f, base, x)?;
        if x.is_invalid() {
            return Ok(x);
        }
        let text = self.expr_text(f, e)?;
        match self.lookup_field_or_method(&x.typ, name)? {
            Selection::Field { typ, indirect, .. } => {
                let mode = if indirect || x.mode == Mode::Var {
                    Mode::Var
                } else {
                    Mode::Value
                };
                Ok(Operand { mode, typ })
            }
            Selection::Method { method, indirect } => {
                if method.pointer_recv && !indirect && x.mode != Mode::Var {
                    self.error(
                        f,
                        span,
                        format!("cannot call pointer method {name} on {}", x.typ),
                    );
                    return Ok(Operand::invalid());
                }
                Ok(Operand::value(Type::Signature(method.sig)))
            }
            Selection::Ambiguous => {
                self.error(f, span, format!("ambiguous selector {text}"));
                Ok(Operand::invalid())
            }
            Selection::NotFound => {
                let why = match x.typ.underlying() {
                    Type::Pointer(b) if b.is_interface() => {
                        format!("type {} is pointer to interface, not interface", x.typ)
                    }
                    _ => format!("type {} has no field or method {name}", x.typ),
                };
                self.error(f, span, format!("{text} undefined ({why})"));
                Ok(Operand::invalid())
            }
        }
    }

    /// `T.M`: the method as a function taking the receiver first.
    fn method_expr(&mut self, f: FileId, e: ExprId, t: &Type, name: &str) -> CResult<Operand> {
        let span = self.expr_span(f, e)?;
        let text = self.expr_text(f, e)?;
        let method = match self.lookup_field_or_method(t, name)? {
            Selection::Method { method, indirect } => {
                if method.pointer_recv && !indirect {
                    self.error(
                        f,
                        span,
                        format!("invalid method expression {text} (needs pointer receiver (*{t}).{name})"),
                    );
                    return Ok(Operand::invalid());
                }
                method
            }
            _ => {
                self.error(f, span, format!("{text} undefined (type {t} has no method {name})"));
                return Ok(Operand::invalid());
            }
        };
        let mut params = Vec::with_capacity(method.sig.params.len() + 1);
        params.push(Param {
            name: None,
            typ: t.clone(),
        });
        params.extend(method.sig.params.iter().cloned());
        let sig = Signature {
            type_params: Vec::new(),
            params,
            results: method.sig.results.clone(),
            variadic: method.sig.variadic,
        };
        Ok(Operand::value(Type::Signature(Arc::new(sig))))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assert_clean, assert_error, check, messages, type_of};

    #[test]
    fn promoted_fields_and_methods() {
        let out = check(
            "package p\ntype Inner struct{ X int }\nfunc (Inner) M() string { return \"\" }\ntype Outer struct{ *Inner; Y int }\nvar o Outer\nvar x = o.X\nvar m = o.M()\n",
        );
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(type_of(&out, "x"), "int");
        assert_eq!(type_of(&out, "m"), "string");
    }

    #[test]
    fn ambiguous_selector() {
        assert_error(
            "package p\ntype A struct{ X int }\ntype B struct{ X int }\ntype C struct{ A; B }\nvar c C\nvar x = c.X\n",
            "ambiguous selector c.X",
        );
        assert_clean(
            "package p\ntype A struct{ X int }\ntype B struct{ X int }\ntype C struct{ A; B; X string }\nvar c C\nvar x = c.X\n",
        );
    }

    #[test]
    fn missing_field_or_method() {
        assert_error(
            "package p\ntype T struct{}\nvar t T\nvar x = t.Nope\n",
            "t.Nope undefined (type p.T has no field or method Nope)",
        );
    }

    #[test]
    fn method_expressions() {
        let out = check(
            "package p\ntype T struct{}\nfunc (T) Get(n int) int { return n }\nfunc (*T) Set(n int) {}\nvar g = T.Get\nvar s = (*T).Set\n",
        );
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(type_of(&out, "g"), "func(p.T, int) int");
        assert_eq!(type_of(&out, "s"), "func(*p.T, int)");
        assert_error(
            "package p\ntype T struct{}\nfunc (*T) Set(n int) {}\nvar s = T.Set\n",
            "needs pointer receiver",
        );
    }

    #[test]
    fn pointer_methods_need_addressable_operands() {
        assert_error(
            "package p\ntype T struct{}\nfunc (*T) M() {}\nfunc mk() T { return T{} }\nfunc f() { mk().M() }\n",
            "cannot call pointer method M on p.T",
        );
        assert_clean("package p\ntype T struct{}\nfunc (*T) M() {}\nfunc f() { var t T; t.M() }\n");
    }

    #[test]
    fn interface_satisfaction() {
        assert_clean(
            "package p\ntype Stringer interface{ String() string }\ntype T int\nfunc (T) String() string { return \"\" }\nvar s Stringer = T(1)\n",
        );
        assert_error(
            "package p\ntype Stringer interface{ String() string }\ntype T int\nfunc (T) String() int { return 0 }\nvar s Stringer = T(1)\n",
            "wrong type for method String",
        );
    }
}
