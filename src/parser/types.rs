//! Type expressions, signatures and parameter lists.

use super::{req, PResult, Parser};
use crate::cst::*;
use crate::scope::{DeclRef, ScopeId};
use crate::token::{Tok, TokKind};

/// Tokens that can begin a type.
pub(super) fn starts_type(k: TokKind) -> bool {
    matches!(
        k,
        TokKind::Ident
            | TokKind::LBrack
            | TokKind::Star
            | TokKind::Arrow
            | TokKind::LParen
            | TokKind::KwFunc
            | TokKind::KwMap
            | TokKind::KwChan
            | TokKind::KwStruct
            | TokKind::KwInterface
    )
}

impl Parser<'_, '_> {
    pub(super) fn parse_type(&mut self) -> PResult<TypeExprId> {
        self.descend(|p| p.type_inner())
    }

    fn type_inner(&mut self) -> PResult<TypeExprId> {
        let start = self.pos;
        let node = match self.peek() {
            TokKind::Ident => return self.type_name(),
            TokKind::Star => {
                let star = self.bump()?;
                let elem = req!(self.parse_type());
                TypeExpr::Pointer { star, elem }
            }
            TokKind::LBrack => {
                let l_brack = self.bump()?;
                if self.eat(TokKind::RBrack)?.is_some() {
                    let elem = req!(self.parse_type());
                    TypeExpr::Slice { l_brack, elem }
                } else {
                    let len = if self.at(TokKind::Ellipsis) && self.peek_at(1) == TokKind::RBrack {
                        ArrayLen::Ellipsis(self.bump()?)
                    } else {
                        ArrayLen::Expr(req!(self.nested(|p| p.expr())))
                    };
                    req!(self.expect(TokKind::RBrack));
                    let elem = req!(self.parse_type());
                    TypeExpr::Array { l_brack, len, elem }
                }
            }
            TokKind::KwMap => {
                let map_tok = self.bump()?;
                req!(self.expect(TokKind::LBrack));
                let key = req!(self.nested(|p| p.parse_type()));
                req!(self.expect(TokKind::RBrack));
                let value = req!(self.parse_type());
                TypeExpr::Map {
                    map_tok,
                    key,
                    value,
                }
            }
            TokKind::KwChan => {
                let chan_tok = self.bump()?;
                let dir = if self.eat(TokKind::Arrow)?.is_some() {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = req!(self.parse_type());
                TypeExpr::Chan {
                    dir,
                    chan_tok,
                    elem,
                }
            }
            TokKind::Arrow => {
                self.bump()?;
                let chan_tok = req!(self.expect(TokKind::KwChan));
                let elem = req!(self.parse_type());
                TypeExpr::Chan {
                    dir: ChanDir::Recv,
                    chan_tok,
                    elem,
                }
            }
            TokKind::KwFunc => {
                let func_tok = self.bump()?;
                let sig = req!(self.signature());
                TypeExpr::Func { func_tok, sig }
            }
            TokKind::KwStruct => return self.struct_type(),
            TokKind::KwInterface => return self.interface_type(),
            TokKind::LParen => {
                let l_paren = self.bump()?;
                let inner = req!(self.nested(|p| p.parse_type()));
                req!(self.expect(TokKind::RParen));
                TypeExpr::Paren { l_paren, inner }
            }
            _ => return self.fail("type"),
        };
        let span = self.span_from(start);
        Ok(Some(self.arena.types.alloc(node, span)))
    }

    /// `T`, `pkg.T`, `T[A, B]`
    pub(super) fn type_name(&mut self) -> PResult<TypeExprId> {
        let start = self.pos;
        let scope = self.cur_scope;
        let first = req!(self.ident());
        let (pkg, name) = if self.at(TokKind::Dot) && self.peek_at(1) == TokKind::Ident {
            self.bump()?;
            (Some(first), req!(self.ident()))
        } else {
            (None, first)
        };
        let args = if self.at(TokKind::LBrack) {
            self.attempt("type arguments", |p| p.type_args())?
                .unwrap_or(ListRef::EMPTY)
        } else {
            ListRef::EMPTY
        };
        let span = self.span_from(start);
        Ok(Some(self.arena.types.alloc(
            TypeExpr::Named {
                pkg,
                name,
                args,
                scope,
            },
            span,
        )))
    }

    fn type_args(&mut self) -> PResult<ListRef<TypeExprId>> {
        self.bump()?;
        let args = req!(self.nested(|p| {
            let mut args = Vec::new();
            loop {
                args.push(req!(p.parse_type()));
                if p.eat(TokKind::Comma)?.is_none() || p.at(TokKind::RBrack) {
                    break;
                }
            }
            Ok(Some(args))
        }));
        req!(self.expect(TokKind::RBrack));
        Ok(Some(self.arena.list_types(args)))
    }

    pub(super) fn signature(&mut self) -> PResult<SignatureId> {
        let start = self.pos;
        let params = req!(self.parameters());
        let results = match self.peek() {
            TokKind::LParen => {
                // `func() (int)` or `func() (a, b int)`.
                Some(Results::Params(req!(self.parameters())))
            }
            k if starts_type(k) => Some(Results::Type(req!(self.parse_type()))),
            _ => None,
        };
        let span = self.span_from(start);
        Ok(Some(
            self.arena
                .signatures
                .alloc(Signature { params, results }, span),
        ))
    }

    fn parameters(&mut self) -> PResult<FieldList> {
        let open = req!(self.expect(TokKind::LParen));
        let fields = if self.at(TokKind::RParen) {
            ListRef::EMPTY
        } else {
            req!(self.nested(|p| {
                if let Some(named) = p.attempt("parameters", |p| p.named_params())? {
                    return Ok(Some(named));
                }
                p.unnamed_params()
            }))
        };
        let close = req!(self.expect(TokKind::RParen));
        Ok(Some(FieldList {
            open,
            fields,
            close,
        }))
    }

    /// `a, b int, c ...string`. A list of bare names is a list of types.
    fn named_params(&mut self) -> PResult<ListRef<FieldId>> {
        let mut fields = Vec::new();
        let mut pending: Vec<IdentName> = Vec::new();
        let mut pending_start: Option<Tok> = None;
        let mut typed = false;
        loop {
            let start = self.pos;
            let name = req!(self.ident());
            if matches!(self.peek(), TokKind::Comma | TokKind::RParen) {
                pending_start.get_or_insert(start);
                pending.push(name);
            } else {
                let ellipsis = self.eat(TokKind::Ellipsis)?;
                let typ = req!(self.parse_type());
                let group_start = pending_start.take().unwrap_or(start);
                pending.push(name);
                let names = self.arena.list_ident_names(pending.drain(..));
                let span = self.span_from(group_start);
                fields.push(self.arena.fields.alloc(
                    Field {
                        names,
                        ellipsis,
                        typ,
                        tag: None,
                        embedded: false,
                    },
                    span,
                ));
                typed = true;
            }
            if self.eat(TokKind::Comma)?.is_none() || self.at(TokKind::RParen) {
                break;
            }
        }

        if !pending.is_empty() {
            if typed {
                // `(a int, b)`: mixed named and unnamed parameters.
                return self.fail("parameter type");
            }
            for name in pending {
                let span = self.tok_span(name.tok);
                let typ = self.arena.types.alloc(
                    TypeExpr::Named {
                        pkg: None,
                        name,
                        args: ListRef::EMPTY,
                        scope: self.cur_scope,
                    },
                    span,
                );
                fields.push(self.arena.fields.alloc(
                    Field {
                        names: ListRef::EMPTY,
                        ellipsis: None,
                        typ,
                        tag: None,
                        embedded: false,
                    },
                    span,
                ));
            }
        }
        Ok(Some(self.arena.list_fields(fields)))
    }

    /// `int, []string, ...any`
    fn unnamed_params(&mut self) -> PResult<ListRef<FieldId>> {
        let mut fields = Vec::new();
        loop {
            let start = self.pos;
            let ellipsis = self.eat(TokKind::Ellipsis)?;
            let typ = req!(self.parse_type());
            let span = self.span_from(start);
            fields.push(self.arena.fields.alloc(
                Field {
                    names: ListRef::EMPTY,
                    ellipsis,
                    typ,
                    tag: None,
                    embedded: false,
                },
                span,
            ));
            if self.eat(TokKind::Comma)?.is_none() || self.at(TokKind::RParen) {
                break;
            }
        }
        Ok(Some(self.arena.list_fields(fields)))
    }

    /// Declares named parameters and results into the function scope.
    pub(super) fn declare_params(&mut self, scope: ScopeId, sig: SignatureId, visible: Tok) {
        let s = self.arena.signatures[sig];
        let mut lists = vec![s.params.fields];
        if let Some(Results::Params(r)) = s.results {
            lists.push(r.fields);
        }
        for list in lists {
            for &field in self.arena.fields_list(list).to_vec().iter() {
                let names = self.arena.fields[field].names;
                for (i, n) in self.arena.ident_names(names).to_vec().into_iter().enumerate() {
                    self.declare(scope, n, DeclRef::Param(field, i as u32), visible);
                }
            }
        }
    }

    fn struct_type(&mut self) -> PResult<TypeExprId> {
        let struct_tok = self.bump()?;
        req!(self.expect(TokKind::LBrace));
        let fields = req!(self.nested(|p| {
            let mut fields = Vec::new();
            while !p.at(TokKind::RBrace) {
                fields.push(req!(p.field_decl()));
                req!(p.semi());
            }
            Ok(Some(fields))
        }));
        req!(self.expect(TokKind::RBrace));
        let fields = self.arena.list_fields(fields);
        let span = self.span_from(struct_tok);
        Ok(Some(self.arena.types.alloc(
            TypeExpr::Struct { struct_tok, fields },
            span,
        )))
    }

    fn field_decl(&mut self) -> PResult<FieldId> {
        let start = self.pos;
        let named = if self.at(TokKind::Ident)
            && !matches!(
                self.peek_at(1),
                TokKind::Semi
                    | TokKind::RBrace
                    | TokKind::Dot
                    | TokKind::StringLit
                    | TokKind::RawStringLit
            ) {
            // `a, b T` or embedded `G[int]`.
            self.attempt("struct field", |p| {
                let mut names = vec![req!(p.ident())];
                while p.eat(TokKind::Comma)?.is_some() {
                    names.push(req!(p.ident()));
                }
                let typ = req!(p.parse_type());
                Ok(Some((names, typ)))
            })?
        } else {
            None
        };
        let (names, typ, embedded) = match named {
            Some((names, typ)) => (self.arena.list_ident_names(names), typ, false),
            None => {
                let star = self.eat(TokKind::Star)?;
                let name = req!(self.type_name());
                let typ = match star {
                    Some(star) => {
                        let span = self.span_from(star);
                        self.arena
                            .types
                            .alloc(TypeExpr::Pointer { star, elem: name }, span)
                    }
                    None => name,
                };
                (ListRef::EMPTY, typ, true)
            }
        };
        let tag = if matches!(self.peek(), TokKind::StringLit | TokKind::RawStringLit) {
            Some(self.bump()?)
        } else {
            None
        };
        let span = self.span_from(start);
        Ok(Some(self.arena.fields.alloc(
            Field {
                names,
                ellipsis: None,
                typ,
                tag,
                embedded,
            },
            span,
        )))
    }

    fn interface_type(&mut self) -> PResult<TypeExprId> {
        let interface_tok = self.bump()?;
        req!(self.expect(TokKind::LBrace));
        let elems = req!(self.nested(|p| {
            let mut elems = Vec::new();
            while !p.at(TokKind::RBrace) {
                let elem = if p.at(TokKind::Ident) && p.peek_at(1) == TokKind::LParen {
                    let name = req!(p.ident());
                    let sig = req!(p.signature());
                    InterfaceElem::Method { name, sig }
                } else {
                    InterfaceElem::Embed(req!(p.constraint()))
                };
                elems.push(elem);
                req!(p.semi());
            }
            Ok(Some(elems))
        }));
        req!(self.expect(TokKind::RBrace));
        let elems = self.arena.list_interface_elems(elems);
        let span = self.span_from(interface_tok);
        Ok(Some(self.arena.types.alloc(
            TypeExpr::Interface {
                interface_tok,
                elems,
            },
            span,
        )))
    }

    /// Type constraint: a type, or a union of `~T` / `T` terms.
    pub(super) fn constraint(&mut self) -> PResult<TypeExprId> {
        let start = self.pos;
        let first = req!(self.type_term());
        if first.tilde.is_none() && !self.at(TokKind::Pipe) {
            return Ok(Some(first.typ));
        }
        let mut terms = vec![first];
        while self.eat(TokKind::Pipe)?.is_some() {
            terms.push(req!(self.type_term()));
        }
        let terms = self.arena.list_type_terms(terms);
        let span = self.span_from(start);
        Ok(Some(self.arena.types.alloc(TypeExpr::Union { terms }, span)))
    }

    fn type_term(&mut self) -> PResult<TypeTerm> {
        let tilde = self.eat(TokKind::Tilde)?;
        let typ = req!(self.parse_type());
        Ok(Some(TypeTerm { tilde, typ }))
    }
}

#[cfg(test)]
mod tests {
    use crate::cst::*;
    use crate::parser::tests::parse;

    fn only_func_sig(src: &str) -> (Cst, Signature) {
        let f = parse(src);
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        let cst = f.cst.unwrap();
        let func = cst.arena.funcs.ids().next().unwrap();
        let sig = cst.arena.signatures[cst.arena.funcs[func].sig];
        (cst, sig)
    }

    #[test]
    fn grouped_parameter_names() {
        let (cst, sig) = only_func_sig("package p\nfunc f(a, b int, c ...string) {}\n");
        let fields = cst.arena.fields_list(sig.params.fields);
        assert_eq!(fields.len(), 2);
        assert_eq!(cst.arena.ident_names(cst.arena.fields[fields[0]].names).len(), 2);
        assert!(cst.arena.fields[fields[1]].ellipsis.is_some());
    }

    #[test]
    fn bare_names_are_types() {
        let (cst, sig) = only_func_sig("package p\nfunc f(int, string) (bool, error) {}\n");
        let fields = cst.arena.fields_list(sig.params.fields);
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().all(|&f| cst.arena.fields[f].names.is_empty()));
        assert!(matches!(sig.results, Some(Results::Params(_))));
    }

    #[test]
    fn unnamed_composite_parameter_types() {
        let (cst, sig) = only_func_sig("package p\nfunc f([]int, map[string]bool, p.T) {}\n");
        assert_eq!(cst.arena.fields_list(sig.params.fields).len(), 3);
    }

    #[test]
    fn mixed_parameters_are_rejected() {
        let f = parse("package p\nfunc f(a int, b) {}\n");
        assert!(f.cst.is_none());
    }

    #[test]
    fn struct_fields_embedded_and_tagged() {
        let f = parse("package p\ntype S struct {\n\ta, b int `json:\"a\"`\n\t*Base\n\tio.Reader\n\tG[int]\n}\n");
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        let cst = f.cst.unwrap();
        let spec = cst.arena.type_specs.ids().next().unwrap();
        let TypeExpr::Struct { fields, .. } = cst.arena.types[cst.arena.type_specs[spec].typ] else {
            panic!("struct");
        };
        let fields = cst.arena.fields_list(fields);
        assert_eq!(fields.len(), 4);
        assert!(cst.arena.fields[fields[0]].tag.is_some());
        assert!(fields[1..].iter().all(|&f| cst.arena.fields[f].embedded));
    }

    #[test]
    fn interface_with_methods_and_unions() {
        let f = parse("package p\ntype I interface {\n\tM(int) string\n\t~int | ~string\n\tfmt.Stringer\n}\n");
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        let cst = f.cst.unwrap();
        let spec = cst.arena.type_specs.ids().next().unwrap();
        let TypeExpr::Interface { elems, .. } = cst.arena.types[cst.arena.type_specs[spec].typ] else {
            panic!("interface");
        };
        let elems = cst.arena.interface_elems(elems);
        assert!(matches!(elems[0], InterfaceElem::Method { .. }));
        let InterfaceElem::Embed(u) = elems[1] else { panic!() };
        assert!(matches!(cst.arena.types[u], TypeExpr::Union { .. }));
    }

    #[test]
    fn channel_directions() {
        let f = parse("package p\nvar a chan<- int\nvar b <-chan int\nvar c chan (<-chan int)\n");
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        let cst = f.cst.unwrap();
        let dirs: Vec<_> = cst
            .arena
            .value_specs
            .ids()
            .filter_map(|id| cst.arena.value_specs[id].typ)
            .map(|t| match cst.arena.types[t] {
                TypeExpr::Chan { dir, .. } => dir,
                _ => panic!("chan"),
            })
            .collect();
        assert_eq!(dirs, vec![ChanDir::Send, ChanDir::Recv, ChanDir::Both]);
    }
}
