//! CST traversal.
//!
//! [`Walk`] is implemented for every node type (mostly by
//! `#[derive(WalkCst)]`); it forwards arena ids to the matching
//! [`Visitor`] hook. Visitors override the hooks they care about and call
//! `walk` on the node to keep descending.

use crate::cst::*;
use crate::scope::ScopeId;
use crate::token::Tok;

pub trait Walk<'cst> {
    fn walk<V: Visitor<'cst> + ?Sized>(&self, a: &'cst CstArena, v: &mut V);
}

pub trait Visitor<'cst> {
    #[inline(always)]
    fn visit_source_file(&mut self, a: &'cst CstArena, f: &'cst SourceFile) {
        f.walk(a, self);
    }

    #[inline(always)]
    fn visit_decl(&mut self, a: &'cst CstArena, id: DeclId) {
        a.decls[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_func_decl(&mut self, a: &'cst CstArena, id: FuncDeclId) {
        a.funcs[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_import_spec(&mut self, a: &'cst CstArena, id: ImportSpecId) {
        a.import_specs[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_value_spec(&mut self, a: &'cst CstArena, id: ValueSpecId) {
        a.value_specs[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_type_spec(&mut self, a: &'cst CstArena, id: TypeSpecId) {
        a.type_specs[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_stmt(&mut self, a: &'cst CstArena, id: StmtId) {
        a.stmts[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_simple_stmt(&mut self, a: &'cst CstArena, id: SimpleStmtId) {
        a.simple_stmts[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_block(&mut self, a: &'cst CstArena, b: &Block) {
        b.stmts.walk(a, self);
    }

    #[inline(always)]
    fn visit_expr(&mut self, a: &'cst CstArena, id: ExprId) {
        a.exprs[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_type(&mut self, a: &'cst CstArena, id: TypeExprId) {
        a.types[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_field(&mut self, a: &'cst CstArena, id: FieldId) {
        a.fields[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_signature(&mut self, a: &'cst CstArena, id: SignatureId) {
        a.signatures[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_switch_clause(&mut self, a: &'cst CstArena, id: SwitchClauseId) {
        a.switch_clauses[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_comm_clause(&mut self, a: &'cst CstArena, id: CommClauseId) {
        a.comm_clauses[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_type_params(&mut self, a: &'cst CstArena, id: TypeParamsId) {
        a.type_params[id].walk(a, self);
    }

    #[inline(always)]
    fn visit_type_param_decl(&mut self, a: &'cst CstArena, id: TypeParamDeclId) {
        a.type_param_decls[id].walk(a, self);
    }
}

macro_rules! impl_walk_for_ids {
    ($($id:ty => $visit:ident),* $(,)?) => {
        $(
            impl<'cst> Walk<'cst> for $id {
                #[inline(always)]
                fn walk<V: Visitor<'cst> + ?Sized>(&self, a: &'cst CstArena, v: &mut V) {
                    v.$visit(a, *self);
                }
            }
        )*
    };
}

impl_walk_for_ids! {
    DeclId => visit_decl,
    FuncDeclId => visit_func_decl,
    ImportSpecId => visit_import_spec,
    ValueSpecId => visit_value_spec,
    TypeSpecId => visit_type_spec,
    StmtId => visit_stmt,
    SimpleStmtId => visit_simple_stmt,
    ExprId => visit_expr,
    TypeExprId => visit_type,
    FieldId => visit_field,
    SignatureId => visit_signature,
    SwitchClauseId => visit_switch_clause,
    CommClauseId => visit_comm_clause,
    TypeParamsId => visit_type_params,
    TypeParamDeclId => visit_type_param_decl,
}

pub trait ListSlice<T> {
    fn slice(&self, r: ListRef<T>) -> &[T];
}

impl<'cst, T> Walk<'cst> for ListRef<T>
where
    CstArena: ListSlice<T>,
    T: Walk<'cst> + 'cst,
{
    #[inline(always)]
    fn walk<V: Visitor<'cst> + ?Sized>(&self, a: &'cst CstArena, v: &mut V) {
        for item in a.slice(*self) {
            item.walk(a, v);
        }
    }
}

macro_rules! impl_list_slice {
    ($($t:ty => $getter:ident),* $(,)?) => {
        $(
            impl ListSlice<$t> for CstArena {
                #[inline(always)]
                fn slice(&self, r: ListRef<$t>) -> &[$t] {
                    self.$getter(r)
                }
            }
        )*
    };
}

impl_list_slice! {
    IdentName => ident_names,
    ExprId => exprs_list,
    StmtId => stmts_list,
    TypeExprId => types_list,
    FieldId => fields_list,
    KeyedElement => keyed_elems_list,
    Spec => specs_list,
    TopLevelDecl => top_decls,
    SwitchClauseId => switch_clause_ids,
    CommClauseId => comm_clause_ids,
    TypeCaseElem => type_case_elems,
    TypeTerm => type_terms,
    InterfaceElem => interface_elems,
    TypeParamDeclId => type_param_decl_ids,
    ExprOrType => expr_or_types,
}

impl<'cst, T: Walk<'cst>> Walk<'cst> for Option<T> {
    #[inline(always)]
    fn walk<V: Visitor<'cst> + ?Sized>(&self, a: &'cst CstArena, v: &mut V) {
        if let Some(x) = self {
            x.walk(a, v);
        }
    }
}

impl<'cst> Walk<'cst> for Block {
    #[inline(always)]
    fn walk<V: Visitor<'cst> + ?Sized>(&self, a: &'cst CstArena, v: &mut V) {
        v.visit_block(a, self);
    }
}

macro_rules! impl_walk_noop {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<'cst> Walk<'cst> for $ty {
                #[inline(always)]
                fn walk<V: Visitor<'cst> + ?Sized>(&self, _: &'cst CstArena, _: &mut V) {}
            }
        )*
    };
}

impl_walk_noop! {
    Tok,
    ScopeId,
    IdentName,
    Symbol,
    bool,
    u32,
    GenDeclKind,
    BasicLitKind,
    ChanDir,
    UnaryOp,
    BinaryOp,
    AssignOp,
    IncDecOp,
}
