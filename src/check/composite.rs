//! Composite literals.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::expr::{Mode, Operand};
use super::{CResult, Checker};
use crate::constant::Value;
use crate::cst::{ArrayLen, Element, Expr, LiteralValue, TypeExpr, TypeExprId};
use crate::error::{FileId, Span};
use crate::types::{Struct, Type};

impl<'a> Checker<'a> {
    pub(super) fn composite_lit(&mut self, f: FileId, typ: TypeExprId, lit: &LiteralValue) -> CResult<Operand> {
        let a = self.unit(f)?.arena();
        // `[...]T{...}` takes its length from the elements.
        if let TypeExpr::Array {
            len: ArrayLen::Ellipsis(_),
            elem,
            ..
        } = a.types[typ]
        {
            let elem = self.type_expr(f, elem)?;
            if elem.is_invalid() {
                return Ok(Operand::invalid());
            }
            let n = self.indexed_elements(f, &elem, lit, None)?;
            return Ok(Operand::value(Type::Array(Arc::new(elem), n)));
        }
        let t = self.type_expr(f, typ)?;
        if t.is_invalid() {
            return Ok(Operand::invalid());
        }
        let span = a.types.span(typ);
        self.literal_value(f, &t, lit, span)?;
        Ok(Operand::value(t))
    }

    fn lit_span(&self, f: FileId, lit: &LiteralValue) -> CResult<Span> {
        let l = self.tok_span(f, lit.l_brace)?;
        let r = self.tok_span(f, lit.r_brace)?;
        Ok(Span {
            start: l.start,
            end: r.end,
        })
    }

    fn element_span(&self, f: FileId, el: Element) -> CResult<Span> {
        match el {
            Element::Expr(e) => self.expr_span(f, e),
            Element::Literal(lv) => self.lit_span(f, &lv),
        }
    }

    fn literal_value(&mut self, f: FileId, t: &Type, lit: &LiteralValue, span: Span) -> CResult<()> {
        match t.resolve() {
            Type::Struct(s) => self.struct_elements(f, t, &s, lit),
            Type::Array(el, n) => self.indexed_elements(f, &el, lit, Some(n)).map(drop),
            Type::Slice(el) => self.indexed_elements(f, &el, lit, None).map(drop),
            Type::Map(k, v) => self.map_elements(f, &k, &v, lit),
            Type::Invalid => Ok(()),
            _ => {
                self.error(f, span, format!("invalid composite literal type {t}"));
                Ok(())
            }
        }
    }

    /// Checks one element against the type it initializes. Elided literal
    /// types (`{1, 2}` inside `[]T{...}`, or `&T` for `*T` elements) take
    /// the element type.
    fn element(&mut self, f: FileId, el: Element, t: &Type, ctx: &str) -> CResult<Operand> {
        match el {
            Element::Expr(e) => {
                let x = self.expr(f, e)?;
                self.assignment(f, x, t, e, ctx)
            }
            Element::Literal(lv) => {
                let target = match t.resolve() {
                    Type::Pointer(b) => (*b).clone(),
                    _ => t.clone(),
                };
                let span = self.lit_span(f, &lv)?;
                self.literal_value(f, &target, &lv, span)?;
                Ok(Operand::value(t.clone()))
            }
        }
    }

    fn struct_elements(&mut self, f: FileId, t: &Type, s: &Struct, lit: &LiteralValue) -> CResult<()> {
        let a = self.unit(f)?.arena();
        let elems = a.keyed_elems_list(lit.elements);
        let Some(first) = elems.first() else {
            return Ok(());
        };
        let keyed = first.key.is_some();
        if elems.iter().any(|el| el.key.is_some() != keyed) {
            let span = self.lit_span(f, lit)?;
            self.error(f, span, "mixture of field:value and value elements in struct literal");
            return Ok(());
        }
        if keyed {
            let mut seen = HashSet::new();
            for el in elems {
                let Some(key) = el.key else {
                    continue;
                };
                let kspan = self.element_span(f, key)?;
                let name = match key {
                    Element::Expr(k) => match a.exprs[k] {
                        Expr::Ident { name, .. } => Some(self.ident_text(f, name)?),
                        _ => None,
                    },
                    Element::Literal(_) => None,
                };
                let Some(name) = name else {
                    let text = self.unit(f)?.file.source.slice(kspan.start, kspan.end).into_owned();
                    self.error(f, kspan, format!("invalid field name {text} in struct literal"));
                    continue;
                };
                let Some(field) = s.fields.iter().find(|fl| &*fl.name == name) else {
                    self.error(
                        f,
                        kspan,
                        format!("unknown field {name} in struct literal of type {t}"),
                    );
                    continue;
                };
                if !seen.insert(name) {
                    self.error(f, kspan, format!("duplicate field name {name} in struct literal"));
                    continue;
                }
                self.element(f, el.value, &field.typ, "struct literal")?;
            }
            return Ok(());
        }
        for (i, el) in elems.iter().enumerate() {
            let Some(field) = s.fields.get(i) else {
                let span = self.element_span(f, el.value)?;
                self.error(f, span, format!("too many values in struct literal of type {t}"));
                return Ok(());
            };
            self.element(f, el.value, &field.typ, "struct literal")?;
        }
        if elems.len() < s.fields.len() {
            let span = self.tok_span(f, lit.r_brace)?;
            self.error(f, span, format!("too few values in struct literal of type {t}"));
        }
        Ok(())
    }

    /// Elements of an array or slice literal; returns the length they
    /// imply.
    fn indexed_elements(&mut self, f: FileId, elem: &Type, lit: &LiteralValue, bound: Option<u64>) -> CResult<u64> {
        let a = self.unit(f)?.arena();
        let mut seen = HashSet::new();
        let mut index = 0u64;
        let mut len = 0u64;
        for el in a.keyed_elems_list(lit.elements) {
            let mut valid = true;
            match el.key {
                Some(Element::Expr(k)) => match self.index_value(f, k, bound)? {
                    Some(i) => index = i,
                    None => {
                        valid = false;
                        let x = self.expr(f, k)?;
                        if !x.is_invalid() && !matches!(x.mode, Mode::Const(_)) {
                            let span = self.expr_span(f, k)?;
                            let text = self.expr_text(f, k)?;
                            self.error(f, span, format!("index {text} must be integer constant"));
                        }
                    }
                },
                Some(Element::Literal(lv)) => {
                    valid = false;
                    let span = self.lit_span(f, &lv)?;
                    self.error(f, span, "invalid index in array or slice literal");
                }
                None => {
                    if let Some(b) = bound {
                        if index >= b {
                            let span = self.element_span(f, el.value)?;
                            self.error(f, span, format!("index {index} out of bounds [0:{b}]"));
                            valid = false;
                        }
                    }
                }
            }
            if valid && !seen.insert(index) {
                let span = self.element_span(f, el.key.unwrap_or(el.value))?;
                self.error(f, span, format!("duplicate index {index} in array or slice literal"));
            }
            self.element(f, el.value, elem, "array or slice literal")?;
            if valid {
                index += 1;
                len = len.max(index);
            }
        }
        Ok(len)
    }

    fn map_elements(&mut self, f: FileId, k: &Type, v: &Type, lit: &LiteralValue) -> CResult<()> {
        let a = self.unit(f)?.arena();
        let mut seen: HashMap<Value, ()> = HashMap::new();
        for el in a.keyed_elems_list(lit.elements) {
            match el.key {
                None => {
                    let span = self.element_span(f, el.value)?;
                    self.error(f, span, "missing key in map literal");
                }
                Some(key) => {
                    let x = self.element(f, key, k, "map literal")?;
                    if let (Mode::Const(val), Element::Expr(ke)) = (x.mode, key) {
                        if seen.insert(val, ()).is_some() {
                            let span = self.expr_span(f, ke)?;
                            let text = self.expr_text(f, ke)?;
                            self.error(f, span, format!("duplicate key {text} in map literal"));
                        }
                    }
                }
            }
            self.element(f, el.value, v, "map literal")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{assert_clean, assert_error, check, messages, type_of};

    #[test]
    fn struct_literals() {
        assert_clean(
            "package p\ntype P struct{ X, Y int; Name string }\nvar a = P{1, 2, \"a\"}\nvar b = P{Y: 2, Name: \"b\"}\nvar c = &P{}\n",
        );
        assert_error(
            "package p\ntype P struct{ X, Y int }\nvar a = P{X: 1, 2}\n",
            "mixture of field:value and value elements in struct literal",
        );
        assert_error(
            "package p\ntype P struct{ X, Y int }\nvar a = P{Z: 1}\n",
            "unknown field Z in struct literal of type p.P",
        );
        assert_error(
            "package p\ntype P struct{ X, Y int }\nvar a = P{X: 1, X: 2}\n",
            "duplicate field name X in struct literal",
        );
        assert_error("package p\ntype P struct{ X, Y int }\nvar a = P{1}\n", "too few values in struct literal of type p.P");
        assert_error(
            "package p\ntype P struct{ X, Y int }\nvar a = P{1, 2, 3}\n",
            "too many values in struct literal of type p.P",
        );
        assert_error(
            "package p\ntype P struct{ X int }\nvar a = P{X: \"s\"}\n",
            "cannot use \"s\" (untyped string constant) as int value in struct literal",
        );
    }

    #[test]
    fn array_and_slice_literals() {
        let out = check("package p\nvar a = [...]int{1, 2, 3}\nvar b = [...]string{5: \"x\", \"y\"}\nvar s = []int{2: 1, 0: 3}\n");
        assert!(out.diags.is_empty(), "{:?}", messages(&out));
        assert_eq!(type_of(&out, "a"), "[3]int");
        assert_eq!(type_of(&out, "b"), "[7]string");
        assert_eq!(type_of(&out, "s"), "[]int");
        assert_error(
            "package p\nvar s = []int{0: 1, 0: 2}\n",
            "duplicate index 0 in array or slice literal",
        );
        assert_error("package p\nvar a = [2]int{1, 2, 3}\n", "index 2 out of bounds [0:2]");
        assert_error(
            "package p\nfunc f(i int) { _ = []int{i: 1} }\n",
            "index i must be integer constant",
        );
    }

    #[test]
    fn map_literals() {
        assert_clean("package p\nvar m = map[string][]int{\"a\": {1}, \"b\": nil}\n");
        assert_error("package p\nvar m = map[string]int{\"a\": 1, \"a\": 2}\n", "duplicate key \"a\" in map literal");
        assert_error("package p\nvar m = map[string]int{1}\n", "missing key in map literal");
    }

    #[test]
    fn elided_element_types() {
        assert_clean(
            "package p\ntype P struct{ X int }\nvar a = []P{{1}, {X: 2}}\nvar b = []*P{{1}, {X: 2}}\nvar c = map[P]bool{{1}: true}\nvar d = [][]int{{1, 2}, {}}\n",
        );
        assert_error(
            "package p\ntype P struct{ X int }\nvar a = []P{{\"no\"}}\n",
            "cannot use \"no\" (untyped string constant) as int value in struct literal",
        );
    }

    #[test]
    fn invalid_literal_type() {
        assert_error("package p\nvar x = int{1}\n", "invalid composite literal type int");
    }
}
