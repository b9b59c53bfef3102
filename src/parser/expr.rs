//! Expressions.
//!
//! Binary operators are parsed by precedence climbing; unary operators,
//! operands and their suffixes by plain recursive descent. Types that appear
//! in operand position (conversions, composite literal types, builtin type
//! arguments) become [`Expr::Type`].

use super::{req, PResult, Parser};
use crate::cst::*;
use crate::error::DiagKind;
use crate::scope::ScopeKind;
use crate::token::TokKind;

pub(super) fn binary_op(k: TokKind) -> Option<BinaryOp> {
    use BinaryOp::*;
    Some(match k {
        TokKind::Plus => Add,
        TokKind::Minus => Sub,
        TokKind::Star => Mul,
        TokKind::Slash => Div,
        TokKind::Percent => Mod,
        TokKind::Amp => And,
        TokKind::Pipe => Or,
        TokKind::Caret => Xor,
        TokKind::Shl => Shl,
        TokKind::Shr => Shr,
        TokKind::AndNot => AndNot,
        TokKind::LAnd => LAnd,
        TokKind::LOr => LOr,
        TokKind::EqEq => Eq,
        TokKind::NotEq => Ne,
        TokKind::Lt => Lt,
        TokKind::Le => Le,
        TokKind::Gt => Gt,
        TokKind::Ge => Ge,
        _ => return None,
    })
}

/// Operator of a compound assignment token.
pub(super) fn assign_op(k: TokKind) -> Option<BinaryOp> {
    use BinaryOp::*;
    Some(match k {
        TokKind::AddAssign => Add,
        TokKind::SubAssign => Sub,
        TokKind::MulAssign => Mul,
        TokKind::DivAssign => Div,
        TokKind::ModAssign => Mod,
        TokKind::AndAssign => And,
        TokKind::OrAssign => Or,
        TokKind::XorAssign => Xor,
        TokKind::ShlAssign => Shl,
        TokKind::ShrAssign => Shr,
        TokKind::AndNotAssign => AndNot,
        _ => return None,
    })
}

impl Parser<'_, '_> {
    pub(super) fn expr(&mut self) -> PResult<ExprId> {
        self.binary_expr(1)
    }

    fn binary_expr(&mut self, min_prec: u8) -> PResult<ExprId> {
        let start = self.pos;
        let mut left = req!(self.unary_expr());
        while let Some(op) = binary_op(self.peek()) {
            let prec = op.precedence();
            if prec < min_prec {
                break;
            }
            let op_tok = self.bump()?;
            let right = req!(self.descend(|p| p.binary_expr(prec + 1)));
            let span = self.span_from(start);
            left = self.arena.exprs.alloc(
                Expr::Binary {
                    left,
                    op,
                    op_tok,
                    right,
                },
                span,
            );
        }
        Ok(Some(left))
    }

    fn unary_expr(&mut self) -> PResult<ExprId> {
        self.descend(|p| {
            let start = p.pos;
            let op = match p.peek() {
                TokKind::Plus => UnaryOp::Add,
                TokKind::Minus => UnaryOp::Sub,
                TokKind::Bang => UnaryOp::Not,
                TokKind::Caret => UnaryOp::Xor,
                TokKind::Star => UnaryOp::Deref,
                TokKind::Amp => UnaryOp::Addr,
                TokKind::Arrow => UnaryOp::Recv,
                _ => return p.primary_expr(),
            };
            if op == UnaryOp::Recv && p.peek_at(1) == TokKind::KwChan {
                // `<-chan T` is a type unless it is converting something:
                // `<-chan int(c)` receives from `chan int(c)`.
                let typ = p.attempt("receive or channel type", |p| {
                    let t = req!(p.parse_type());
                    if p.at(TokKind::LParen) {
                        return Ok(None);
                    }
                    Ok(Some(t))
                })?;
                if let Some(t) = typ {
                    let span = p.span_from(start);
                    return Ok(Some(p.arena.exprs.alloc(Expr::Type(t), span)));
                }
            }
            let op_tok = p.bump()?;
            let operand = req!(p.unary_expr());
            let span = p.span_from(start);
            Ok(Some(p.arena.exprs.alloc(
                Expr::Unary {
                    op,
                    op_tok,
                    operand,
                },
                span,
            )))
        })
    }

    pub(super) fn primary_expr(&mut self) -> PResult<ExprId> {
        let start = self.pos;
        let mut x = req!(self.operand());
        loop {
            let node = match self.peek() {
                TokKind::Dot => {
                    let dot = self.bump()?;
                    match self.peek() {
                        TokKind::Ident => {
                            let sel = req!(self.ident());
                            Expr::Selector { base: x, dot, sel }
                        }
                        TokKind::LParen => req!(self.type_assert(x)),
                        _ => return self.fail("name or ("),
                    }
                }
                TokKind::LBrack => req!(self.index_or_slice(x)),
                TokKind::LParen => req!(self.call(x)),
                TokKind::LBrace => {
                    let bare_name = !matches!(self.arena.exprs[x], Expr::Type(_));
                    if self.no_composite && bare_name {
                        break;
                    }
                    let Some(typ) = self.expr_to_type(x) else {
                        break;
                    };
                    let lit = req!(self.literal_value());
                    Expr::CompositeLit { typ, lit }
                }
                _ => break,
            };
            let span = self.span_from(start);
            x = self.arena.exprs.alloc(node, span);
        }
        Ok(Some(x))
    }

    fn operand(&mut self) -> PResult<ExprId> {
        let start = self.pos;
        let kind = match self.peek() {
            TokKind::IntLit => Some(BasicLitKind::Int),
            TokKind::FloatLit => Some(BasicLitKind::Float),
            TokKind::ImagLit => Some(BasicLitKind::Imag),
            TokKind::RuneLit => Some(BasicLitKind::Rune),
            TokKind::StringLit | TokKind::RawStringLit => Some(BasicLitKind::String),
            _ => None,
        };
        let node = if let Some(kind) = kind {
            let tok = self.bump()?;
            Expr::BasicLit { kind, tok }
        } else {
            match self.peek() {
                TokKind::Ident => {
                    let name = req!(self.ident());
                    Expr::Ident {
                        name,
                        scope: self.cur_scope,
                    }
                }
                TokKind::LParen => {
                    let l_paren = self.bump()?;
                    let inner = req!(self.nested(|p| p.expr()));
                    let r_paren = req!(self.expect(TokKind::RParen));
                    Expr::Paren {
                        l_paren,
                        inner,
                        r_paren,
                    }
                }
                TokKind::KwFunc => return self.func_lit(),
                TokKind::LBrack
                | TokKind::KwMap
                | TokKind::KwChan
                | TokKind::KwStruct
                | TokKind::KwInterface => Expr::Type(req!(self.parse_type())),
                _ => return self.fail("expression"),
            }
        };
        let span = self.span_from(start);
        Ok(Some(self.arena.exprs.alloc(node, span)))
    }

    /// Function literal, or a function type when no body follows.
    fn func_lit(&mut self) -> PResult<ExprId> {
        let func_tok = self.bump()?;
        let node = req!(self.with_scope(ScopeKind::Func, |p, scope| {
            let sig = req!(p.signature());
            if !p.at(TokKind::LBrace) {
                let span = p.span_from(func_tok);
                let t = p.arena.types.alloc(TypeExpr::Func { func_tok, sig }, span);
                return Ok(Some(Expr::Type(t)));
            }
            let visible = p.pos;
            p.declare_params(scope, sig, visible);
            let body = req!(p.nested(|p| p.block_in(scope)));
            Ok(Some(Expr::FuncLit {
                func_tok,
                sig,
                body,
            }))
        }));
        let span = self.span_from(func_tok);
        Ok(Some(self.arena.exprs.alloc(node, span)))
    }

    /// `.(T)` or a type switch's `.(type)`; the dot is already consumed.
    fn type_assert(&mut self, base: ExprId) -> PResult<Expr> {
        let l_paren = self.bump()?;
        let typ = if self.at(TokKind::KwType) {
            let type_tok = self.bump()?;
            if !self.type_guard {
                let span = self.tok_span(type_tok);
                self.report(DiagKind::Syntax, span, "use of .(type) outside type switch");
            }
            None
        } else {
            Some(req!(self.nested(|p| p.parse_type())))
        };
        let r_paren = req!(self.expect(TokKind::RParen));
        Ok(Some(Expr::TypeAssert {
            base,
            l_paren,
            typ,
            r_paren,
        }))
    }

    fn index_or_slice(&mut self, base: ExprId) -> PResult<Expr> {
        let l_brack = self.bump()?;
        let first = if self.at(TokKind::Colon) {
            None
        } else {
            Some(req!(self.nested(|p| p.expr_or_type())))
        };
        if self.at(TokKind::Colon) {
            let lo = match first {
                None => None,
                Some(ExprOrType::Expr(e)) => Some(e),
                Some(ExprOrType::Type(_)) => return self.fail("expression"),
            };
            self.bump()?;
            let (hi, max) = req!(self.nested(|p| {
                let hi = if matches!(p.peek(), TokKind::Colon | TokKind::RBrack) {
                    None
                } else {
                    Some(req!(p.expr()))
                };
                let max = if let Some(colon) = p.eat(TokKind::Colon)? {
                    if hi.is_none() {
                        let span = p.tok_span(colon);
                        p.report(DiagKind::Syntax, span, "middle index required in 3-index slice");
                    }
                    if p.at(TokKind::RBrack) {
                        let span = p.tok_span(p.pos);
                        p.report(DiagKind::Syntax, span, "final index required in 3-index slice");
                        None
                    } else {
                        Some(req!(p.expr()))
                    }
                } else {
                    None
                };
                Ok(Some((hi, max)))
            }));
            let r_brack = req!(self.expect(TokKind::RBrack));
            return Ok(Some(Expr::Slice {
                base,
                l_brack,
                lo,
                hi,
                max,
                r_brack,
            }));
        }
        let Some(first) = first else {
            return self.fail("index");
        };
        let mut args = vec![first];
        while self.eat(TokKind::Comma)?.is_some() {
            if self.at(TokKind::RBrack) {
                break;
            }
            args.push(req!(self.nested(|p| p.expr_or_type())));
        }
        let r_brack = req!(self.expect(TokKind::RBrack));
        let args = self.arena.list_expr_or_types(args);
        Ok(Some(Expr::IndexOrInstantiate {
            base,
            l_brack,
            args,
            r_brack,
        }))
    }

    fn call(&mut self, callee: ExprId) -> PResult<Expr> {
        let l_paren = self.bump()?;
        let (args, ellipsis) = req!(self.nested(|p| {
            let mut args = Vec::new();
            let mut ellipsis = None;
            while !p.at(TokKind::RParen) {
                args.push(req!(p.expr_or_type()));
                if let Some(e) = p.eat(TokKind::Ellipsis)? {
                    ellipsis = Some(e);
                    p.eat(TokKind::Comma)?;
                    break;
                }
                if p.eat(TokKind::Comma)?.is_none() {
                    break;
                }
            }
            Ok(Some((args, ellipsis)))
        }));
        let r_paren = req!(self.expect(TokKind::RParen));
        let args = self.arena.list_expr_or_types(args);
        Ok(Some(Expr::Call {
            callee,
            l_paren,
            args,
            ellipsis,
            r_paren,
        }))
    }

    /// An argument that may be a type: `make([]int, n)`, `F[int]`.
    fn expr_or_type(&mut self) -> PResult<ExprOrType> {
        let e = req!(self.expr());
        Ok(Some(match self.arena.exprs[e] {
            Expr::Type(t) => ExprOrType::Type(t),
            _ => ExprOrType::Expr(e),
        }))
    }

    /// Reinterprets an operand as a composite literal type, if it can be one.
    fn expr_to_type(&mut self, e: ExprId) -> Option<TypeExprId> {
        let span = self.arena.exprs.span(e);
        let node = match self.arena.exprs[e] {
            Expr::Type(t) => return Some(t),
            Expr::Ident { name, scope } => TypeExpr::Named {
                pkg: None,
                name,
                args: ListRef::EMPTY,
                scope,
            },
            Expr::Selector { base, sel, .. } => match self.arena.exprs[base] {
                Expr::Ident { name, scope } => TypeExpr::Named {
                    pkg: Some(name),
                    name: sel,
                    args: ListRef::EMPTY,
                    scope,
                },
                _ => return None,
            },
            Expr::IndexOrInstantiate { base, args, .. } => {
                let named = self.expr_to_type(base)?;
                let TypeExpr::Named {
                    pkg, name, scope, ..
                } = self.arena.types[named]
                else {
                    return None;
                };
                let mut targs = Vec::with_capacity(args.len());
                for a in self.arena.expr_or_types(args).to_vec() {
                    targs.push(match a {
                        ExprOrType::Type(t) => t,
                        ExprOrType::Expr(x) => self.expr_to_type(x)?,
                    });
                }
                let args = self.arena.list_types(targs);
                TypeExpr::Named {
                    pkg,
                    name,
                    args,
                    scope,
                }
            }
            Expr::Unary {
                op: UnaryOp::Deref,
                op_tok,
                operand,
            } => TypeExpr::Pointer {
                star: op_tok,
                elem: self.expr_to_type(operand)?,
            },
            Expr::Paren { l_paren, inner, .. } => TypeExpr::Paren {
                l_paren,
                inner: self.expr_to_type(inner)?,
            },
            _ => return None,
        };
        Some(self.arena.types.alloc(node, span))
    }

    fn literal_value(&mut self) -> PResult<LiteralValue> {
        let l_brace = req!(self.expect(TokKind::LBrace));
        let elems = req!(self.nested(|p| {
            let mut elems = Vec::new();
            while !p.at(TokKind::RBrace) {
                let first = req!(p.element());
                let elem = if p.eat(TokKind::Colon)?.is_some() {
                    KeyedElement {
                        key: Some(first),
                        value: req!(p.element()),
                    }
                } else {
                    KeyedElement {
                        key: None,
                        value: first,
                    }
                };
                elems.push(elem);
                if p.eat(TokKind::Comma)?.is_none() {
                    break;
                }
            }
            Ok(Some(elems))
        }));
        let r_brace = req!(self.expect(TokKind::RBrace));
        let elements = self.arena.list_keyed_elems(elems);
        Ok(Some(LiteralValue {
            l_brace,
            elements,
            r_brace,
        }))
    }

    fn element(&mut self) -> PResult<Element> {
        if self.at(TokKind::LBrace) {
            Ok(Some(Element::Literal(req!(self.literal_value()))))
        } else {
            Ok(Some(Element::Expr(req!(self.expr()))))
        }
    }

    pub(super) fn expr_vec(&mut self) -> PResult<Vec<ExprId>> {
        let mut v = vec![req!(self.expr())];
        while self.eat(TokKind::Comma)?.is_some() {
            v.push(req!(self.expr()));
        }
        Ok(Some(v))
    }

    pub(super) fn expr_list(&mut self) -> PResult<ListRef<ExprId>> {
        let v = req!(self.expr_vec());
        Ok(Some(self.arena.list_exprs(v)))
    }

    pub(super) fn ident_list(&mut self) -> PResult<Vec<IdentName>> {
        let mut v = vec![req!(self.ident())];
        while self.eat(TokKind::Comma)?.is_some() {
            v.push(req!(self.ident()));
        }
        Ok(Some(v))
    }
}

#[cfg(test)]
mod tests {
    use crate::cst::*;
    use crate::error::DiagKind;
    use crate::parser::tests::parse;

    /// Parses `var x = <src>` and returns the initializer.
    fn init_expr(src: &str) -> (Cst, ExprId) {
        let f = parse(&format!("package p\nvar x = {src}\n"));
        assert!(f.diags.is_empty(), "{src}: {:?}", f.diags);
        let cst = f.cst.unwrap();
        let spec = cst.arena.value_specs.ids().next().unwrap();
        let e = cst.arena.exprs_list(cst.arena.value_specs[spec].values)[0];
        (cst, e)
    }

    #[test]
    fn precedence_and_associativity() {
        let (cst, e) = init_expr("a + b*c - d");
        let Expr::Binary { left, op, .. } = cst.arena.exprs[e] else {
            panic!("binary");
        };
        assert_eq!(op, BinaryOp::Sub);
        let Expr::Binary { op, right, .. } = cst.arena.exprs[left] else {
            panic!("binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(cst.arena.exprs[right], Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        let (cst, e) = init_expr("-a * <-ch");
        let Expr::Binary { left, right, .. } = cst.arena.exprs[e] else {
            panic!("binary");
        };
        assert!(matches!(cst.arena.exprs[left], Expr::Unary { op: UnaryOp::Sub, .. }));
        assert!(matches!(cst.arena.exprs[right], Expr::Unary { op: UnaryOp::Recv, .. }));
    }

    #[test]
    fn composite_literals() {
        let (cst, e) = init_expr("[]T{{1, 2}, {k: 3}}");
        let Expr::CompositeLit { typ, lit } = cst.arena.exprs[e] else {
            panic!("composite");
        };
        assert!(matches!(cst.arena.types[typ], TypeExpr::Slice { .. }));
        let elems = cst.arena.keyed_elems_list(lit.elements);
        assert_eq!(elems.len(), 2);
        assert!(matches!(elems[1].value, Element::Literal(_)));

        let (cst, e) = init_expr("pkg.Pair[int, string]{A: 1}");
        let Expr::CompositeLit { typ, .. } = cst.arena.exprs[e] else {
            panic!("composite");
        };
        let TypeExpr::Named { pkg, args, .. } = cst.arena.types[typ] else {
            panic!("named");
        };
        assert!(pkg.is_some());
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn conversions_and_type_arguments() {
        let (cst, e) = init_expr("make(map[string][]int, 4)");
        let Expr::Call { args, .. } = cst.arena.exprs[e] else {
            panic!("call");
        };
        let args = cst.arena.expr_or_types(args);
        assert!(matches!(args[0], ExprOrType::Type(_)));
        assert!(matches!(args[1], ExprOrType::Expr(_)));

        let (cst, e) = init_expr("[]byte(s)");
        let Expr::Call { callee, .. } = cst.arena.exprs[e] else {
            panic!("call");
        };
        assert!(matches!(cst.arena.exprs[callee], Expr::Type(_)));

        let (cst, e) = init_expr("Map[int, string](xs, f)");
        let Expr::Call { callee, .. } = cst.arena.exprs[e] else {
            panic!("call");
        };
        assert!(matches!(cst.arena.exprs[callee], Expr::IndexOrInstantiate { .. }));
    }

    #[test]
    fn slices_and_assertions() {
        let (cst, e) = init_expr("s[1:len(s):cap(s)]");
        assert!(matches!(
            cst.arena.exprs[e],
            Expr::Slice {
                lo: Some(_),
                hi: Some(_),
                max: Some(_),
                ..
            }
        ));
        let (cst, e) = init_expr("v.(fmt.Stringer).String()");
        assert!(matches!(cst.arena.exprs[e], Expr::Call { .. }));
    }

    #[test]
    fn receive_only_channel_type_operand() {
        let (cst, e) = init_expr("make(<-chan int)");
        let Expr::Call { args, .. } = cst.arena.exprs[e] else {
            panic!("call");
        };
        let ExprOrType::Type(t) = cst.arena.expr_or_types(args)[0] else {
            panic!("type arg");
        };
        assert!(matches!(cst.arena.types[t], TypeExpr::Chan { dir: ChanDir::Recv, .. }));
    }

    #[test]
    fn func_literal_params_are_scoped() {
        let f = parse("package p\nvar f = func(a int) int { return a }\n");
        assert!(f.diags.is_empty(), "{:?}", f.diags);
        let a = f.interner.get("a").unwrap();
        assert!(f.scopes.get(crate::scope::ScopeId::PACKAGE).get(a).is_none());
    }

    #[test]
    fn type_switch_syntax_outside_switch() {
        let f = parse("package p\nvar y = x.(type)\n");
        assert!(f
            .diags
            .iter()
            .any(|d| d.kind == DiagKind::Syntax && d.message.contains(".(type)")));
    }

    #[test]
    fn missing_slice_index() {
        let f = parse("package p\nvar y = s[1::3]\n");
        assert!(f.diags.iter().any(|d| d.message.contains("middle index")));
    }
}
