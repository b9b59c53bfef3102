//! `#[derive(WalkCst)]` for the syntax tree node types.
//!
//! The generated `Walk` impl visits fields in declaration order, which is
//! source order for every node. A field marked `#[walk(skip)]` is not
//! visited; use it for back-references to nodes owned elsewhere in the
//! tree.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as Tokens;
use quote::{format_ident, quote, quote_spanned};
use syn::{parse_macro_input, spanned::Spanned, Data, DeriveInput, Field, Fields, Index};

#[proc_macro_derive(WalkCst, attributes(walk))]
pub fn derive_walk_cst(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.into_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<Tokens> {
    if let Some(param) = input.generics.params.first() {
        return Err(syn::Error::new_spanned(param, "WalkCst nodes cannot be generic"));
    }
    let name = &input.ident;
    let body = match &input.data {
        Data::Struct(s) => struct_body(&s.fields)?,
        Data::Enum(e) => {
            let arms = e
                .variants
                .iter()
                .map(|variant| variant_arm(&variant.ident, &variant.fields))
                .collect::<syn::Result<Vec<_>>>()?;
            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Union(u) => {
            return Err(syn::Error::new_spanned(
                u.union_token,
                "WalkCst cannot be derived for unions",
            ))
        }
    };
    Ok(quote_spanned! {input.span() =>
        impl<'cst> crate::walk::Walk<'cst> for #name {
            #[inline(always)]
            fn walk<V: crate::walk::Visitor<'cst> + ?Sized>(
                &self,
                a: &'cst crate::cst::CstArena,
                v: &mut V,
            ) {
                #body
            }
        }
    })
}

/// Whether the field carries `#[walk(skip)]`.
fn skipped(field: &Field) -> syn::Result<bool> {
    let mut skip = false;
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("walk")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else {
                Err(meta.error("expected `skip`"))
            }
        })?;
    }
    Ok(skip)
}

fn walk_call(place: Tokens) -> Tokens {
    quote! { crate::walk::Walk::walk(#place, a, v); }
}

fn struct_body(fields: &Fields) -> syn::Result<Tokens> {
    let mut calls = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        if skipped(field)? {
            continue;
        }
        calls.push(match &field.ident {
            Some(ident) => walk_call(quote! { &self.#ident }),
            None => {
                let index = Index::from(i);
                walk_call(quote! { &self.#index })
            }
        });
    }
    Ok(quote! { #(#calls)* })
}

// Pattern bindings get a prefix: a field named `a` or `v` would otherwise
// shadow the arena or the visitor.
fn variant_arm(variant: &syn::Ident, fields: &Fields) -> syn::Result<Tokens> {
    match fields {
        Fields::Unit => Ok(quote! { Self::#variant => {} }),
        Fields::Named(named) => {
            let mut pats = Vec::new();
            let mut calls = Vec::new();
            for field in &named.named {
                let Some(ident) = &field.ident else {
                    continue;
                };
                if skipped(field)? {
                    pats.push(quote! { #ident: _ });
                    continue;
                }
                let var = format_ident!("__field_{}", ident);
                pats.push(quote! { #ident: #var });
                calls.push(walk_call(quote! { #var }));
            }
            Ok(quote! {
                Self::#variant { #(#pats),* } => {
                    #(#calls)*
                }
            })
        }
        Fields::Unnamed(unnamed) => {
            let mut pats = Vec::new();
            let mut calls = Vec::new();
            for (i, field) in unnamed.unnamed.iter().enumerate() {
                if skipped(field)? {
                    pats.push(quote! { _ });
                    continue;
                }
                let var = format_ident!("__field_{}", i);
                pats.push(quote! { #var });
                calls.push(walk_call(quote! { #var }));
            }
            Ok(quote! {
                Self::#variant(#(#pats),*) => {
                    #(#calls)*
                }
            })
        }
    }
}
