//! pdbprof PDB 解析
//!
//! このクレートは、Microsoft PDBファイルとPEイメージの解析機能を提供します。
//! 型レコードのデコードと構造体レイアウトの展開、グローバルシンボルのアドレス解決、
//! CodeViewレコードからの識別ハッシュ計算などを行います。

pub mod codeview;
pub mod demangle;
pub mod error;
pub mod identity;
pub mod loader;
pub mod model;
pub mod primitive;
pub mod remap;
pub mod symbols;
pub mod type_info;

pub use codeview::{CodeViewData, CodeViewInfo, PeImage};
pub use demangle::Demangler;
pub use error::PdbError;
pub use identity::{make_symstore_hash, Guid, PdbHeader};
pub use loader::PdbLoader;
pub use model::{
    Aggregate, AggregateKind, DebugInfo, GlobalSymbol, Member, TypeIndex, TypeLeaf, TypeStream,
};
pub use primitive::{lookup_primitive, Primitive};
pub use remap::AddressRemap;
pub use symbols::{MappedSymbols, SymbolMapper};
pub use type_info::{DecodedType, MemberLayout, StructLayout, TypeArgs, TypeInfoExtractor};

/// PDB解析の結果型
pub type Result<T> = anyhow::Result<T>;
