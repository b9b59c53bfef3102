use go125_frontend::check::{check_package, CheckConfig, Entity, NoImports};
use go125_frontend::scope::{DeclRef, Lookup, ScopeId, ScopeKind};
use go125_frontend::token::Tok;
use go125_frontend::{parse_file, FileId, ParseOptions, ParsedFile, Source};

fn parse(i: u32, src: &str) -> ParsedFile {
    let f = parse_file(FileId(i), Source::from_text(format!("f{i}.go"), src), &ParseOptions::default());
    assert!(!f.has_errors(), "{:?}", f.diags);
    f
}

/// Tokens whose text is `name`, in source order.
fn occurrences(f: &ParsedFile, name: &str) -> Vec<Tok> {
    f.tokens.iter().filter(|&t| f.tok_text(t) == name).collect()
}

#[test]
fn names_become_visible_after_their_declaration() {
    let f = parse(
        0,
        "package p\nfunc f() {\n\tx := 1\n\t{\n\t\tx := x + 1\n\t\t_ = x\n\t}\n\t_ = x\n}\n",
    );
    let sym = f.interner.get("x").expect("interned");
    let [outer_decl, inner_decl, rhs, inner_use, outer_use] = occurrences(&f, "x")[..] else {
        panic!("expected five x tokens");
    };

    let mut bindings = Vec::new();
    for id in f.scopes.ids() {
        let local = matches!(f.scopes.get(id).kind, ScopeKind::Func | ScopeKind::Block);
        for (s, b) in f.scopes.get(id).iter() {
            if local {
                assert!(b.visible_from > b.name, "binding visible before its name");
            }
            if s == sym {
                bindings.push((id, *b));
            }
        }
    }
    bindings.sort_by_key(|(_, b)| b.name);
    let [(outer, ob), (inner, ib)] = bindings[..] else {
        panic!("expected two bindings of x, got {bindings:?}");
    };
    assert_eq!((ob.name, ib.name), (outer_decl, inner_decl));
    assert!(matches!(ib.decl, DeclRef::ShortVar(..)));
    assert_eq!(f.scopes.get(inner).kind, ScopeKind::Block);
    assert_eq!(f.scopes.get(inner).parent, Some(outer));

    // `x := x + 1` reads the outer x.
    assert_eq!(f.scopes.lookup(inner, sym, rhs), Lookup::Local(outer, ob));
    assert_eq!(f.scopes.lookup(inner, sym, inner_use), Lookup::Local(inner, ib));
    assert_eq!(f.scopes.lookup(outer, sym, outer_use), Lookup::Local(outer, ob));
    // Nothing local is visible before the declaration.
    assert_eq!(f.scopes.lookup(outer, sym, Tok(0)), Lookup::Outer);
}

#[test]
fn package_level_names_are_visible_everywhere() {
    let f = parse(0, "package p\nfunc f() int { return later }\nvar later = 1\n");
    let sym = f.interner.get("later").expect("interned");
    let b = f.scopes.get(ScopeId::PACKAGE).get(sym).expect("declared");
    assert_eq!(b.visible_from, Tok(0));
}

#[test]
fn package_block_spans_files() {
    let a = parse(0, "package p\n\nfunc Use() T { return T{N: limit} }\n");
    let b = parse(1, "package p\n\ntype T struct{ N int }\n\nconst limit = 3\n");
    let out = check_package(&[a, b], &NoImports, &CheckConfig::new("p", 8)).expect("checked");
    let msgs: Vec<_> = out.diags.iter().map(|d| d.message.clone()).collect();
    assert!(msgs.is_empty(), "{msgs:?}");
    assert!(matches!(out.info.lookup("limit"), Some(Entity::Const { .. })));
    assert!(matches!(out.info.lookup("Use"), Some(Entity::Func(_))));
}

#[test]
fn imports_are_file_scoped() {
    let a = parse(0, "package p\n\nimport \"unsafe\"\n\nvar A = unsafe.Sizeof(0)\n");
    let b = parse(1, "package p\n\nvar B = unsafe.Sizeof(0)\n");
    let out = check_package(&[a, b], &NoImports, &CheckConfig::new("p", 8)).expect("checked");
    let undefined: Vec<_> = out
        .diags
        .iter()
        .filter(|d| d.message == "undefined: unsafe")
        .collect();
    assert_eq!(undefined.len(), 1);
    assert_eq!(undefined[0].file, FileId(1));
}

#[test]
fn redeclaration_across_files() {
    let a = parse(0, "package p\n\nvar x int\n");
    let b = parse(1, "package p\n\nfunc x() {}\n");
    let out = check_package(&[a, b], &NoImports, &CheckConfig::new("p", 8)).expect("checked");
    let d = out
        .diags
        .iter()
        .find(|d| d.message.contains("x redeclared in this block"))
        .expect("redeclaration reported");
    assert_eq!(d.file, FileId(1));
    assert_eq!(d.related.map(|(f, _)| f), Some(FileId(0)));
}
