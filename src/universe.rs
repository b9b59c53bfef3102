//! Predeclared identifiers and the `unsafe` package.

use std::sync::{Arc, OnceLock};

use crate::constant::Value;
use crate::types::{BasicKind, Interface, Method, Named, Param, Signature, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Append,
    Cap,
    Clear,
    Close,
    Complex,
    Copy,
    Delete,
    Imag,
    Len,
    Make,
    Max,
    Min,
    New,
    Panic,
    Print,
    Println,
    Real,
    Recover,
    // unsafe
    Alignof,
    Offsetof,
    Sizeof,
    Add,
    Slice,
    String,
    StringData,
    SliceData,
}

impl Builtin {
    pub const fn name(self) -> &'static str {
        use Builtin::*;
        match self {
            Append => "append",
            Cap => "cap",
            Clear => "clear",
            Close => "close",
            Complex => "complex",
            Copy => "copy",
            Delete => "delete",
            Imag => "imag",
            Len => "len",
            Make => "make",
            Max => "max",
            Min => "min",
            New => "new",
            Panic => "panic",
            Print => "print",
            Println => "println",
            Real => "real",
            Recover => "recover",
            Alignof => "unsafe.Alignof",
            Offsetof => "unsafe.Offsetof",
            Sizeof => "unsafe.Sizeof",
            Add => "unsafe.Add",
            Slice => "unsafe.Slice",
            String => "unsafe.String",
            StringData => "unsafe.StringData",
            SliceData => "unsafe.SliceData",
        }
    }

    /// Minimum argument count and whether more are accepted.
    pub const fn arity(self) -> (usize, bool) {
        use Builtin::*;
        match self {
            Append => (1, true),
            Make => (1, true),
            Max | Min => (1, true),
            Print | Println => (0, true),
            Recover => (0, false),
            Complex | Copy | Delete | Add | Slice | String => (2, false),
            _ => (1, false),
        }
    }

    /// Builtins whose call may stand alone as a statement.
    pub const fn is_statement(self) -> bool {
        use Builtin::*;
        matches!(
            self,
            Clear | Close | Copy | Delete | Panic | Print | Println | Recover
        )
    }
}

#[derive(Debug, Clone)]
pub enum Object {
    Type(Type),
    Const(Type, Value),
    /// `iota`; its value depends on the enclosing constant spec.
    Iota,
    Nil,
    Builtin(Builtin),
}

fn basic(k: BasicKind) -> Object {
    Object::Type(Type::Basic(k))
}

/// Named `error` interface.
pub fn error_type() -> Type {
    static ERROR: OnceLock<Arc<Named>> = OnceLock::new();
    let n = ERROR.get_or_init(|| {
        let sig = Arc::new(Signature {
            results: vec![Param {
                name: None,
                typ: Type::Basic(BasicKind::String),
            }],
            ..Signature::default()
        });
        Named::resolved(
            "error",
            "",
            Type::Interface(Arc::new(Interface {
                methods: vec![Method {
                    name: "Error".into(),
                    sig,
                    pointer_recv: false,
                }],
                ..Interface::default()
            })),
        )
    });
    Type::Named(n.clone())
}

pub fn any_type() -> Type {
    static ANY: OnceLock<Arc<Interface>> = OnceLock::new();
    Type::Interface(ANY.get_or_init(|| Arc::new(Interface::default())).clone())
}

fn comparable_type() -> Type {
    static COMPARABLE: OnceLock<Arc<Named>> = OnceLock::new();
    let n = COMPARABLE.get_or_init(|| {
        Named::resolved(
            "comparable",
            "",
            Type::Interface(Arc::new(Interface {
                comparable: true,
                ..Interface::default()
            })),
        )
    });
    Type::Named(n.clone())
}

/// Looks up a predeclared identifier.
pub fn lookup(name: &str) -> Option<Object> {
    use BasicKind::*;
    Some(match name {
        "bool" => basic(Bool),
        "int" => basic(Int),
        "int8" => basic(Int8),
        "int16" => basic(Int16),
        "int32" | "rune" => basic(Int32),
        "int64" => basic(Int64),
        "uint" => basic(Uint),
        "uint8" | "byte" => basic(Uint8),
        "uint16" => basic(Uint16),
        "uint32" => basic(Uint32),
        "uint64" => basic(Uint64),
        "uintptr" => basic(Uintptr),
        "float32" => basic(Float32),
        "float64" => basic(Float64),
        "complex64" => basic(Complex64),
        "complex128" => basic(Complex128),
        "string" => basic(String),
        "error" => Object::Type(error_type()),
        "any" => Object::Type(any_type()),
        "comparable" => Object::Type(comparable_type()),
        "true" => Object::Const(Type::Basic(UntypedBool), Value::Bool(true)),
        "false" => Object::Const(Type::Basic(UntypedBool), Value::Bool(false)),
        "iota" => Object::Iota,
        "nil" => Object::Nil,
        "append" => Object::Builtin(Builtin::Append),
        "cap" => Object::Builtin(Builtin::Cap),
        "clear" => Object::Builtin(Builtin::Clear),
        "close" => Object::Builtin(Builtin::Close),
        "complex" => Object::Builtin(Builtin::Complex),
        "copy" => Object::Builtin(Builtin::Copy),
        "delete" => Object::Builtin(Builtin::Delete),
        "imag" => Object::Builtin(Builtin::Imag),
        "len" => Object::Builtin(Builtin::Len),
        "make" => Object::Builtin(Builtin::Make),
        "max" => Object::Builtin(Builtin::Max),
        "min" => Object::Builtin(Builtin::Min),
        "new" => Object::Builtin(Builtin::New),
        "panic" => Object::Builtin(Builtin::Panic),
        "print" => Object::Builtin(Builtin::Print),
        "println" => Object::Builtin(Builtin::Println),
        "real" => Object::Builtin(Builtin::Real),
        "recover" => Object::Builtin(Builtin::Recover),
        _ => return None,
    })
}

/// Members of package `unsafe`.
pub fn lookup_unsafe(name: &str) -> Option<Object> {
    Some(match name {
        "Pointer" => basic(BasicKind::UnsafePointer),
        "Sizeof" => Object::Builtin(Builtin::Sizeof),
        "Alignof" => Object::Builtin(Builtin::Alignof),
        "Offsetof" => Object::Builtin(Builtin::Offsetof),
        "Add" => Object::Builtin(Builtin::Add),
        "Slice" => Object::Builtin(Builtin::Slice),
        "String" => Object::Builtin(Builtin::String),
        "StringData" => Object::Builtin(Builtin::StringData),
        "SliceData" => Object::Builtin(Builtin::SliceData),
        _ => return None,
    })
}
