//! エラーメッセージ定数

/// PDBファイルの読み込みに失敗した場合のエラーメッセージ
pub const ERR_LOAD_PDB: &str = "Failed to load PDB";

/// バイナリの読み込みに失敗した場合のエラーメッセージ
pub const ERR_READ_BINARY: &str = "Failed to read binary";
