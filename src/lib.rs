//! Go 1.25 front end.
//!
//! - [`lexer`] turns source bytes into a lossless token table (Logos plus
//!   semicolon insertion); every byte of the input belongs to a token or to
//!   the separator run before one.
//! - [`parser`] builds a concrete syntax tree by recursive descent with
//!   checkpoints and bounded backtracking, and opens scopes as it goes.
//! - [`check`] resolves package-level declarations, evaluates constants
//!   exactly and type-checks expressions and statements.
//! - [`build`] loads package directories through a shared, deduplicating
//!   cache with build constraints and import resolution.

pub mod build;
pub mod check;
pub mod constant;
pub mod cst;
pub mod error;
pub mod lexer;
pub mod literal;
pub mod parser;
pub mod scope;
pub mod source;
pub mod token;
pub mod types;
pub mod universe;
pub mod walk;

pub use build::{BuildConfig, BuildError, Package, PackageCache, Report};
pub use check::{check_package, CheckConfig, CheckOutput, Importer, PackageInfo};
pub use error::{Diag, DiagKind, DiagList, FileId, Span};
pub use lexer::{tokenize, LexOptions, Lexer};
pub use parser::{parse_file, ParseOptions, ParsedFile};
pub use source::{Position, Source};
