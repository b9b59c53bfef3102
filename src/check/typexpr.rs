//! Type expressions, constraints and function signatures.

use std::collections::HashSet;
use std::sync::Arc;

use super::expr::Mode;
use super::{CResult, Checker, Entity};
use crate::cst::{ArrayLen, CstArena, FieldList, IdentName, InterfaceElem, Results, SignatureId, TypeExpr, TypeExprId};
use crate::error::{DiagKind, FileId};
use crate::literal;
use crate::types::{Field, Interface, Method, Param, Signature, Struct, Term, Type, TypeParam};

impl<'a> Checker<'a> {
    /// The type a type expression denotes.
    pub(super) fn type_expr(&mut self, f: FileId, id: TypeExprId) -> CResult<Type> {
        let a = self.unit(f)?.arena();
        let span = a.types.span(id);
        match a.types[id] {
            TypeExpr::Named {
                pkg,
                name,
                args,
                scope,
            } => {
                let ent = match pkg {
                    Some(p) => match self.package_ref(f, scope, p)? {
                        Some(Some(info)) => self.package_member(f, &info, name)?,
                        Some(None) => Entity::Invalid,
                        None => {
                            let ptext = self.ident_text(f, p)?;
                            if let Entity::Invalid = self.lookup(f, scope, p)? {
                                return Ok(Type::Invalid);
                            }
                            self.error(f, span, format!("{ptext} is not a package"));
                            Entity::Invalid
                        }
                    },
                    None => self.lookup(f, scope, name)?,
                };
                let text = self.ident_text(f, name)?;
                let t = match ent {
                    Entity::TypeName(t) => t,
                    Entity::Invalid => return Ok(Type::Invalid),
                    _ => {
                        self.error(f, span, format!("{text} is not a type"));
                        return Ok(Type::Invalid);
                    }
                };
                let args = a.types_list(args);
                if !args.is_empty() {
                    let mut targs = Vec::with_capacity(args.len());
                    for &t in args {
                        targs.push(self.type_expr(f, t)?);
                    }
                    return self.instantiate(f, span, &t, targs);
                }
                if let Type::Named(n) = &t {
                    if n.origin().is_none() && !n.type_params().is_empty() {
                        self.error(
                            f,
                            span,
                            format!("cannot use generic type {text} without instantiation"),
                        );
                        return Ok(Type::Invalid);
                    }
                }
                Ok(t)
            }
            TypeExpr::Pointer { elem, .. } => Ok(Type::pointer(self.type_expr(f, elem)?)),
            TypeExpr::Array { len, elem, .. } => {
                let n = match len {
                    ArrayLen::Expr(e) => self.array_len(f, e)?,
                    ArrayLen::Ellipsis(_) => {
                        self.error(
                            f,
                            span,
                            "invalid use of [...] array (outside a composite literal)",
                        );
                        self.type_expr(f, elem)?;
                        return Ok(Type::Invalid);
                    }
                };
                let elem = self.type_expr(f, elem)?;
                Ok(match n {
                    Some(n) if !elem.is_invalid() => Type::Array(Arc::new(elem), n),
                    _ => Type::Invalid,
                })
            }
            TypeExpr::Slice { elem, .. } => Ok(Type::slice(self.type_expr(f, elem)?)),
            TypeExpr::Map { key, value, .. } => {
                let k = self.type_expr(f, key)?;
                let v = self.type_expr(f, value)?;
                // Keys whose type is still being defined are checked when used.
                if !k.underlying().is_invalid() && !k.is_comparable() {
                    let kspan = a.types.span(key);
                    self.error(f, kspan, format!("invalid map key type {k}"));
                    return Ok(Type::Invalid);
                }
                Ok(Type::Map(Arc::new(k), Arc::new(v)))
            }
            TypeExpr::Chan { dir, elem, .. } => Ok(Type::Chan(dir, Arc::new(self.type_expr(f, elem)?))),
            TypeExpr::Struct { fields, .. } => self.struct_type(f, a.fields_list(fields)),
            TypeExpr::Interface { elems, .. } => self.interface_type(f, a.interface_elems(elems)),
            TypeExpr::Func { sig, .. } => Ok(Type::Signature(self.signature(f, sig, Vec::new())?)),
            TypeExpr::Paren { inner, .. } => self.type_expr(f, inner),
            TypeExpr::Union { terms } => {
                if let [term] = a.type_terms(terms) {
                    if term.tilde.is_none() {
                        return self.type_expr(f, term.typ);
                    }
                }
                self.error(f, span, "cannot use a type union outside a type constraint");
                Ok(Type::Invalid)
            }
        }
    }

    fn array_len(&mut self, f: FileId, e: crate::cst::ExprId) -> CResult<Option<u64>> {
        let x = self.expr(f, e)?;
        if x.is_invalid() {
            return Ok(None);
        }
        let span = self.expr_span(f, e)?;
        let Mode::Const(v) = &x.mode else {
            let d = self.describe(f, e, &x)?;
            self.error(f, span, format!("array length {d} must be constant"));
            return Ok(None);
        };
        let integral = x.typ.basic_kind().is_some_and(|k| {
            k.is_integer() || (k.is_untyped() && v.to_int().is_some())
        });
        match v.to_u64() {
            Some(n) if integral && n <= i64::MAX as u64 => Ok(Some(n)),
            _ => {
                let d = self.describe(f, e, &x)?;
                self.error(f, span, format!("invalid array length {d}"));
                Ok(None)
            }
        }
    }

    fn struct_type(&mut self, f: FileId, fields: &[crate::cst::FieldId]) -> CResult<Type> {
        let a = self.unit(f)?.arena();
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for &fid in fields {
            let fl = a.fields[fid];
            let typ = self.type_expr(f, fl.typ)?;
            let tag = match fl.tag {
                Some(t) => {
                    let raw = self.unit(f)?.file.tok_text(t);
                    literal::unquote_string(&raw)
                        .ok()
                        .map(|b| Arc::from(String::from_utf8_lossy(&b).as_ref()))
                }
                None => None,
            };
            let names: Vec<IdentName> = if fl.embedded {
                embedded_name(a, fl.typ).into_iter().collect()
            } else {
                a.ident_names(fl.names).to_vec()
            };
            for n in names {
                let name: Arc<str> = self.ident_text(f, n)?.into();
                if &*name != "_" && !seen.insert(name.clone()) {
                    let span = self.tok_span(f, n.tok)?;
                    self.report(DiagKind::Declaration, f, span, format!("{name} redeclared"));
                    continue;
                }
                out.push(Field {
                    name,
                    typ: typ.clone(),
                    embedded: fl.embedded,
                    tag: tag.clone(),
                });
            }
        }
        Ok(Type::Struct(Arc::new(Struct { fields: out })))
    }

    fn interface_type(&mut self, f: FileId, elems: &[InterfaceElem]) -> CResult<Type> {
        let a = self.unit(f)?.arena();
        let mut iface = Interface::default();
        for el in elems {
            match *el {
                InterfaceElem::Method { name, sig } => {
                    let text: Arc<str> = self.ident_text(f, name)?.into();
                    let sig = self.signature(f, sig, Vec::new())?;
                    if iface.methods.iter().any(|m| m.name == text) {
                        let span = self.tok_span(f, name.tok)?;
                        self.report(DiagKind::Declaration, f, span, format!("duplicate method {text}"));
                        continue;
                    }
                    iface.methods.push(Method {
                        name: text,
                        sig,
                        pointer_recv: false,
                    });
                }
                InterfaceElem::Embed(t) => {
                    let terms = match a.types[t] {
                        TypeExpr::Union { terms } => self.union_terms(f, a.type_terms(terms))?,
                        _ => {
                            let typ = self.type_expr(f, t)?;
                            if typ.is_interface() || typ.underlying().is_invalid() {
                                iface.embeds.push(typ);
                                continue;
                            }
                            vec![Term { tilde: false, typ }]
                        }
                    };
                    if iface.terms.is_empty() {
                        iface.terms = terms;
                    } else {
                        // A second union intersects with the first.
                        iface.embeds.push(Type::Interface(Arc::new(Interface {
                            terms,
                            ..Interface::default()
                        })));
                    }
                }
            }
        }
        Ok(Type::Interface(Arc::new(iface)))
    }

    fn union_terms(&mut self, f: FileId, terms: &[crate::cst::TypeTerm]) -> CResult<Vec<Term>> {
        let mut out = Vec::with_capacity(terms.len());
        for term in terms {
            let typ = self.type_expr(f, term.typ)?;
            if term.tilde.is_some() && !typ.is_invalid() && !typ_is_underlying(&typ) {
                let span = self.unit(f)?.arena().types.span(term.typ);
                self.error(
                    f,
                    span,
                    format!("invalid use of ~ ({typ} is not its own underlying type)"),
                );
                continue;
            }
            out.push(Term {
                tilde: term.tilde.is_some(),
                typ,
            });
        }
        Ok(out)
    }

    /// Type parameter constraint: an interface, or a type set written inline.
    pub(super) fn constraint(&mut self, f: FileId, id: TypeExprId) -> CResult<Type> {
        let a = self.unit(f)?.arena();
        let terms = match a.types[id] {
            TypeExpr::Union { terms } => self.union_terms(f, a.type_terms(terms))?,
            _ => {
                let t = self.type_expr(f, id)?;
                if t.is_interface() || t.is_invalid() {
                    return Ok(t);
                }
                vec![Term { tilde: false, typ: t }]
            }
        };
        Ok(Type::Interface(Arc::new(Interface {
            terms,
            ..Interface::default()
        })))
    }

    pub(super) fn signature(
        &mut self,
        f: FileId,
        id: SignatureId,
        type_params: Vec<Arc<TypeParam>>,
    ) -> CResult<Arc<Signature>> {
        let sig = self.unit(f)?.arena().signatures[id];
        let (params, variadic) = self.params(f, &sig.params, true)?;
        let results = match sig.results {
            None => Vec::new(),
            Some(Results::Params(fl)) => self.params(f, &fl, false)?.0,
            Some(Results::Type(t)) => vec![Param {
                name: None,
                typ: self.type_expr(f, t)?,
            }],
        };
        Ok(Arc::new(Signature {
            type_params,
            params,
            results,
            variadic,
        }))
    }

    fn params(&mut self, f: FileId, fl: &FieldList, allow_variadic: bool) -> CResult<(Vec<Param>, bool)> {
        let a = self.unit(f)?.arena();
        let fields = a.fields_list(fl.fields);
        let mut out = Vec::new();
        let mut variadic = false;
        for (i, &fid) in fields.iter().enumerate() {
            let field = a.fields[fid];
            let mut typ = self.type_expr(f, field.typ)?;
            if let Some(dots) = field.ellipsis {
                if allow_variadic && i + 1 == fields.len() && field.names.len() <= 1 {
                    variadic = true;
                } else {
                    let span = self.tok_span(f, dots)?;
                    self.error(f, span, "can only use ... with final parameter in list");
                }
                typ = Type::slice(typ);
            }
            let names = a.ident_names(field.names);
            if names.is_empty() {
                out.push(Param { name: None, typ });
                continue;
            }
            for &n in names {
                out.push(Param {
                    name: Some(self.ident_text(f, n)?.into()),
                    typ: typ.clone(),
                });
            }
        }
        Ok((out, variadic))
    }
}

/// Field name of an embedded field: the type name without pointer,
/// package qualifier or type arguments.
pub(super) fn embedded_name(a: &CstArena, t: TypeExprId) -> Option<IdentName> {
    match a.types[t] {
        TypeExpr::Named { name, .. } => Some(name),
        TypeExpr::Pointer { elem, .. } | TypeExpr::Paren { inner: elem, .. } => embedded_name(a, elem),
        _ => None,
    }
}

fn typ_is_underlying(t: &Type) -> bool {
    !matches!(t, Type::Named(_) | Type::TypeParam(_))
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assert_clean, assert_error, check, messages, type_of};

    #[test]
    fn composite_types_display() {
        let out = check(
            "package p\nvar m map[string][]*int\nvar c <-chan [4]byte\nvar f func(int, ...string) (bool, error)\n",
        );
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(type_of(&out, "m"), "map[string][]*int");
        assert_eq!(type_of(&out, "c"), "<-chan [4]uint8");
        assert_eq!(type_of(&out, "f"), "func(int, ...string) (bool, error)");
    }

    #[test]
    fn array_length_must_be_constant() {
        assert_error("package p\nvar n = 3\nvar a [n]int\n", "array length n (variable of type int) must be constant");
        assert_error("package p\nvar a [-1]int\n", "invalid array length -1");
        assert_clean("package p\nconst n = 2 * 2\nvar a [n + 1]int\nvar b [len(a)]bool\n");
    }

    #[test]
    fn map_keys_must_be_comparable() {
        assert_error("package p\nvar m map[[]int]bool\n", "invalid map key type []int");
        assert_clean("package p\ntype K struct{ a, b int }\nvar m map[K]string\n");
    }

    #[test]
    fn struct_fields() {
        assert_error("package p\ntype S struct{ a int; a string }\n", "a redeclared");
        assert_clean("package p\ntype E struct{}\ntype S struct{ E; *sync; x int `json:\"x\"` }\ntype sync struct{}\n");
    }

    #[test]
    fn variadic_only_last() {
        assert_error("package p\nfunc f(a ...int, b int) {}\n", "can only use ... with final parameter in list");
        assert_clean("package p\nfunc f(a int, b ...int) {}\n");
    }

    #[test]
    fn open_array_outside_literal() {
        assert_error("package p\nvar a [...]int\n", "invalid use of [...] array (outside a composite literal)");
    }

    #[test]
    fn generic_type_needs_arguments() {
        assert_error("package p\ntype L[T any] []T\nvar x L\n", "cannot use generic type L without instantiation");
        assert_error("package p\ntype L[T any] []T\nvar x L[int, string]\n", "too many type arguments for type L: have 2, want 1");
        assert_clean("package p\ntype L[T any] []T\nvar x L[int]\n");
    }

    #[test]
    fn not_a_type() {
        assert_error("package p\nvar v int\nvar x v\n", "v is not a type");
    }
}
