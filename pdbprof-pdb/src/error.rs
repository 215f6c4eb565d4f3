//! PDB解析のエラー型

/// 呼び出し元で判別が必要なエラー
///
/// スキップ可能な条件（セクション外のシンボルや未対応のリーフ）はここには含めず、
/// 各ループ内で `Option` として処理します。
#[derive(thiserror::Error, Debug)]
pub enum PdbError {
    #[error("Unsupported primitive type tag 0x{tag:04x}")]
    UnsupportedTypeTag { tag: u32 },
    #[error("No CodeView debug directory entry found")]
    NoDebugInfo,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDB parsing error: {0}")]
    Pdb(#[from] pdb::Error),
    #[error("Object file error: {0}")]
    Object(#[from] object::Error),
}
