//! Source file, declarations and specs.

use smallvec::SmallVec;

use super::{req, PResult, Parser};
use crate::cst::*;
use crate::error::DiagKind;
use crate::literal;
use crate::scope::{DeclRef, ScopeId, ScopeKind};
use crate::token::{Tok, TokKind};

impl Parser<'_, '_> {
    pub(super) fn source_file(&mut self) -> PResult<SourceFile> {
        let package_tok = req!(self.expect(TokKind::KwPackage));
        let name = req!(self.ident());
        req!(self.semi());

        let mut decls = Vec::new();
        while self.at(TokKind::KwImport) {
            let d = req!(self.gen_decl(GenDeclKind::Import));
            decls.push(TopLevelDecl::Decl(d));
            req!(self.semi());
        }
        loop {
            let decl = match self.peek() {
                TokKind::Eof => break,
                TokKind::KwFunc => TopLevelDecl::Func(req!(self.func_decl())),
                TokKind::KwConst => TopLevelDecl::Decl(req!(self.gen_decl(GenDeclKind::Const))),
                TokKind::KwVar => TopLevelDecl::Decl(req!(self.gen_decl(GenDeclKind::Var))),
                TokKind::KwType => TopLevelDecl::Decl(req!(self.gen_decl(GenDeclKind::Type))),
                _ => return self.fail("declaration"),
            };
            decls.push(decl);
            req!(self.semi());
        }
        let eof = self.pos;
        let decls = self.arena.list_top_decls(decls);
        Ok(Some(SourceFile {
            package_tok,
            name,
            decls,
            eof,
        }))
    }

    /// `import`/`const`/`type`/`var`, single or grouped.
    pub(super) fn gen_decl(&mut self, kind: GenDeclKind) -> PResult<DeclId> {
        let kw = self.bump()?;
        let mut specs = Vec::new();
        let mut last_values = None;
        let (l_paren, r_paren) = if let Some(l) = self.eat(TokKind::LParen)? {
            let mut iota = 0;
            while !self.at(TokKind::RParen) {
                specs.push(req!(self.spec(kind, iota, &mut last_values)));
                iota += 1;
                req!(self.semi());
            }
            (Some(l), Some(req!(self.expect(TokKind::RParen))))
        } else {
            specs.push(req!(self.spec(kind, 0, &mut last_values)));
            (None, None)
        };
        let specs = self.arena.list_specs(specs);
        let span = self.span_from(kw);
        Ok(Some(self.arena.decls.alloc(
            GenDecl {
                kw,
                kind,
                l_paren,
                specs,
                r_paren,
            },
            span,
        )))
    }

    fn spec(
        &mut self,
        kind: GenDeclKind,
        iota: u32,
        last_values: &mut Option<ValueSpecId>,
    ) -> PResult<Spec> {
        Ok(Some(match kind {
            GenDeclKind::Import => Spec::Import(req!(self.import_spec())),
            GenDeclKind::Const => Spec::Value(req!(self.value_spec(true, iota, last_values))),
            GenDeclKind::Var => Spec::Value(req!(self.value_spec(false, iota, last_values))),
            GenDeclKind::Type => Spec::Type(req!(self.type_spec())),
        }))
    }

    fn import_spec(&mut self) -> PResult<ImportSpecId> {
        let start = self.pos;
        let name = match self.peek() {
            TokKind::Dot => Some(ImportName::Dot(self.bump()?)),
            TokKind::Ident => {
                let id = req!(self.ident());
                Some(if self.is_blank(id) {
                    ImportName::Blank(id.tok)
                } else {
                    ImportName::Name(id)
                })
            }
            _ => None,
        };
        if !matches!(self.peek(), TokKind::StringLit | TokKind::RawStringLit) {
            return self.fail("import path");
        }
        let path = self.bump()?;
        let span = self.span_from(start);
        let id = self
            .arena
            .import_specs
            .alloc(ImportSpec { name, path }, span);

        let local = match name {
            Some(ImportName::Name(n)) => Some(n),
            Some(_) => None,
            None => {
                let raw = self.toks.table().text(self.source, path);
                let guess = literal::unquote_string(&raw)
                    .ok()
                    .and_then(|p| String::from_utf8(p).ok())
                    .and_then(|p| implied_import_name(&p).map(str::to_owned));
                guess.map(|g| IdentName {
                    sym: self.interner.intern(&g),
                    tok: path,
                })
            }
        };
        if let Some(n) = local {
            self.declare(ScopeId::FILE, n, DeclRef::Import(id), Tok(0));
        }
        Ok(Some(id))
    }

    fn value_spec(
        &mut self,
        is_const: bool,
        iota: u32,
        last_values: &mut Option<ValueSpecId>,
    ) -> PResult<ValueSpecId> {
        let start = self.pos;
        let mut names: SmallVec<[IdentName; 4]> = SmallVec::new();
        names.push(req!(self.ident()));
        while self.eat(TokKind::Comma)?.is_some() {
            names.push(req!(self.ident()));
        }
        let typ = match self.peek() {
            TokKind::Assign | TokKind::Semi | TokKind::RParen | TokKind::Eof => None,
            _ => Some(req!(self.parse_type())),
        };
        let values = if self.eat(TokKind::Assign)?.is_some() {
            req!(self.expr_list())
        } else {
            ListRef::EMPTY
        };
        if !is_const && typ.is_none() && values.is_empty() {
            return self.fail("type or =");
        }

        let inherit = if is_const && values.is_empty() {
            if typ.is_some() || last_values.is_none() {
                let span = self.span_from(start);
                self.report(DiagKind::Declaration, span, "missing init expr for const declaration");
            }
            typ.is_none().then_some(*last_values).flatten()
        } else {
            None
        };

        let span = self.span_from(start);
        let name_list = self.arena.list_ident_names(names.iter().copied());
        let id = self.arena.value_specs.alloc(
            ValueSpec {
                is_const,
                names: name_list,
                typ,
                values,
                iota,
                inherit,
            },
            span,
        );
        if is_const && !values.is_empty() {
            *last_values = Some(id);
        }

        let scope = self.decl_scope();
        let visible = self.visible_after();
        for (i, n) in names.into_iter().enumerate() {
            let decl = if is_const {
                DeclRef::Const(id, i as u32)
            } else {
                DeclRef::Var(id, i as u32)
            };
            self.declare(scope, n, decl, visible);
        }
        Ok(Some(id))
    }

    fn type_spec(&mut self) -> PResult<TypeSpecId> {
        let name = req!(self.ident());
        let generic = if self.at(TokKind::LBrack) {
            self.attempt("type parameters or array", |p| {
                p.with_scope(ScopeKind::Block, |p, scope| {
                    let tps = req!(p.type_params());
                    let assign = p.eat(TokKind::Assign)?;
                    let typ = req!(p.parse_type());
                    Ok(Some((tps, assign, typ, scope)))
                })
            })?
        } else {
            None
        };
        let (type_params, assign, typ, scope) = match generic {
            Some((tps, assign, typ, scope)) => (Some(tps), assign, typ, scope),
            None => {
                let assign = self.eat(TokKind::Assign)?;
                let typ = req!(self.parse_type());
                (None, assign, typ, self.cur_scope)
            }
        };
        let span = self.span_from(name.tok);
        let id = self.arena.type_specs.alloc(
            TypeSpec {
                name,
                type_params,
                assign,
                typ,
                scope,
            },
            span,
        );
        let visible = if self.cur_scope == ScopeId::FILE {
            Tok(0)
        } else {
            name.tok
        };
        let decl_scope = self.decl_scope();
        self.declare(decl_scope, name, DeclRef::Type(id), visible);
        Ok(Some(id))
    }

    /// `[P any, Q ~int | ~string]`, declared into the current scope.
    pub(super) fn type_params(&mut self) -> PResult<TypeParamsId> {
        let l_brack = req!(self.expect(TokKind::LBrack));
        let mut decls = Vec::new();
        loop {
            let start = self.pos;
            let mut names: SmallVec<[IdentName; 2]> = SmallVec::new();
            names.push(req!(self.ident()));
            while self.at(TokKind::Comma) && self.peek_at(1) == TokKind::Ident {
                self.bump()?;
                names.push(req!(self.ident()));
            }
            let constraint = req!(self.nested(|p| p.constraint()));
            let span = self.span_from(start);
            let list = self.arena.list_ident_names(names.iter().copied());
            let id = self.arena.type_param_decls.alloc(
                TypeParamDecl {
                    names: list,
                    constraint,
                },
                span,
            );
            for (i, n) in names.into_iter().enumerate() {
                self.declare(self.cur_scope, n, DeclRef::TypeParam(id, i as u32), n.tok);
            }
            decls.push(id);
            if self.eat(TokKind::Comma)?.is_none() || self.at(TokKind::RBrack) {
                break;
            }
        }
        let r_brack = req!(self.expect(TokKind::RBrack));
        let params = self.arena.list_type_param_decl_ids(decls);
        let span = self.span_from(l_brack);
        Ok(Some(self.arena.type_params.alloc(
            TypeParams {
                l_brack,
                params,
                r_brack,
            },
            span,
        )))
    }

    pub(super) fn func_decl(&mut self) -> PResult<FuncDeclId> {
        let func_tok = self.bump()?;
        // Functions do not nest, so the id is known before the body is parsed.
        let id = self.arena.funcs.next_id();
        let (name, is_method) = req!(self.with_scope(ScopeKind::Func, |p, scope| {
            let recv = if p.at(TokKind::LParen) {
                Some(req!(p.receiver()))
            } else {
                None
            };
            let name = req!(p.ident());
            let type_params = if p.at(TokKind::LBrack) {
                let tps = req!(p.type_params());
                if recv.is_some() {
                    let span = p.span_from(name.tok);
                    p.report(DiagKind::Syntax, span, "method must have no type parameters");
                }
                Some(tps)
            } else {
                None
            };
            let sig = req!(p.signature());

            let visible = p.pos;
            if let Some(r) = recv {
                for (i, tp) in p.arena.ident_names(r.type_params).to_vec().into_iter().enumerate() {
                    p.declare(scope, tp, DeclRef::RecvTypeParam(id, i as u32), tp.tok);
                }
                if let Some(n) = r.name {
                    p.declare(scope, n, DeclRef::Recv(id), visible);
                }
            }
            p.declare_params(scope, sig, visible);

            let body = if p.at(TokKind::LBrace) {
                Some(req!(p.block_in(scope)))
            } else {
                None
            };
            let span = p.span_from(func_tok);
            let allocated = p.arena.funcs.alloc(
                FuncDecl {
                    func_tok,
                    recv,
                    name,
                    type_params,
                    sig,
                    body,
                    scope,
                },
                span,
            );
            debug_assert_eq!(allocated, id);
            Ok(Some((name, recv.is_some())))
        }));
        let init = self.interner.get("init") == Some(name.sym);
        if !is_method && !init {
            self.declare(ScopeId::PACKAGE, name, DeclRef::Func(id), Tok(0));
        }
        Ok(Some(id))
    }

    /// `(r *T[P])`
    fn receiver(&mut self) -> PResult<Receiver> {
        let l_paren = self.bump()?;
        let name = if self.at(TokKind::Ident)
            && matches!(self.peek_at(1), TokKind::Ident | TokKind::Star)
        {
            Some(req!(self.ident()))
        } else {
            None
        };
        let star = self.eat(TokKind::Star)?;
        let base = req!(self.ident());
        let mut tps = Vec::new();
        if self.eat(TokKind::LBrack)?.is_some() {
            loop {
                tps.push(req!(self.ident()));
                if self.eat(TokKind::Comma)?.is_none() || self.at(TokKind::RBrack) {
                    break;
                }
            }
            req!(self.expect(TokKind::RBrack));
        }
        self.eat(TokKind::Comma)?;
        let r_paren = req!(self.expect(TokKind::RParen));
        let type_params = self.arena.list_ident_names(tps);
        Ok(Some(Receiver {
            l_paren,
            name,
            star,
            base,
            type_params,
            r_paren,
        }))
    }
}

/// Local name of an import without an explicit one: the last path element,
/// skipping a major-version suffix and a `go-` prefix, cut to an identifier.
pub(crate) fn implied_import_name(path: &str) -> Option<&str> {
    let mut elems = path.rsplit('/');
    let mut last = elems.next()?;
    let is_version =
        |s: &str| s.len() > 1 && s.starts_with('v') && s[1..].bytes().all(|b| b.is_ascii_digit());
    if is_version(last) {
        last = elems.next().unwrap_or(last);
    }
    let last = last.strip_prefix("go-").unwrap_or(last);
    let mut end = 0;
    for (i, c) in last.char_indices() {
        let ok = if i == 0 {
            unicode_ident::is_xid_start(c) || c == '_'
        } else {
            unicode_ident::is_xid_continue(c)
        };
        if !ok {
            break;
        }
        end = i + c.len_utf8();
    }
    (end > 0).then(|| &last[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tests::parse;

    #[test]
    fn implied_names() {
        assert_eq!(implied_import_name("fmt"), Some("fmt"));
        assert_eq!(implied_import_name("net/http"), Some("http"));
        assert_eq!(implied_import_name("gopkg.in/yaml.v3"), Some("yaml"));
        assert_eq!(implied_import_name("example.com/mod/v2"), Some("mod"));
        assert_eq!(implied_import_name("github.com/x/go-isatty"), Some("isatty"));
        assert_eq!(implied_import_name("9lives"), None);
    }

    #[test]
    fn const_groups_inherit_and_count_iota() {
        let f = parse("package p\nconst (\n\tA = iota\n\tB\n\tC\n)\n");
        let cst = f.cst.as_ref().unwrap();
        let specs: Vec<_> = cst.arena.value_specs.ids().collect();
        assert_eq!(specs.len(), 3);
        let b = &cst.arena.value_specs[specs[1]];
        assert_eq!(b.iota, 1);
        assert_eq!(b.inherit, Some(specs[0]));
        assert!(f.diags.is_empty(), "{:?}", f.diags);
    }

    #[test]
    fn first_const_needs_value() {
        let f = parse("package p\nconst (\n\tA\n)\n");
        assert!(f.cst.is_some());
        assert!(f.diags.iter().any(|d| d.message.contains("missing init expr")));
    }

    #[test]
    fn package_names_are_declared_in_scope_zero() {
        let f = parse("package p\nimport \"fmt\"\nvar x = 1\nfunc F() {}\ntype T int\nfunc init() {}\nfunc init() {}\n");
        let pkg = f.scopes.get(ScopeId::PACKAGE);
        for name in ["x", "F", "T"] {
            let sym = f.interner.get(name).unwrap();
            assert_eq!(pkg.get(sym).unwrap().visible_from, Tok(0), "{name}");
        }
        let fmt = f.interner.get("fmt").unwrap();
        assert!(f.scopes.get(ScopeId::FILE).get(fmt).is_some());
        assert!(pkg.get(f.interner.get("init").unwrap()).is_none());
        assert!(f.diags.is_empty(), "{:?}", f.diags);
    }

    #[test]
    fn duplicate_package_names_are_reported_with_both_positions() {
        let f = parse("package p\nvar x int\nfunc x() {}\n");
        let d = f
            .diags
            .iter()
            .find(|d| d.kind == DiagKind::Declaration)
            .expect("redeclaration");
        assert!(d.message.contains("x redeclared"));
        assert!(d.related.is_some());
    }

    #[test]
    fn generic_type_vs_array_type() {
        let f = parse("package p\nconst N = 4\ntype A [N]int\ntype G[T any] struct{ v T }\n");
        let cst = f.cst.as_ref().unwrap();
        let specs: Vec<_> = cst.arena.type_specs.ids().collect();
        let a = &cst.arena.type_specs[specs[0]];
        let g = &cst.arena.type_specs[specs[1]];
        assert!(a.type_params.is_none());
        assert!(matches!(cst.arena.types[a.typ], TypeExpr::Array { .. }));
        assert!(g.type_params.is_some());
    }

    #[test]
    fn methods_and_receivers() {
        let f = parse("package p\ntype L[T any] struct{}\nfunc (l *L[T]) Push(v T) {}\nfunc (L[T]) Len() int { return 0 }\n");
        let cst = f.cst.as_ref().unwrap();
        let funcs: Vec<_> = cst.arena.funcs.ids().collect();
        let push = &cst.arena.funcs[funcs[0]];
        let recv = push.recv.unwrap();
        assert!(recv.star.is_some());
        assert_eq!(cst.arena.ident_names(recv.type_params).len(), 1);
        // Methods are not package-level names.
        let pkg = f.scopes.get(ScopeId::PACKAGE);
        assert!(pkg.get(f.interner.get("Push").unwrap()).is_none());
    }
}
