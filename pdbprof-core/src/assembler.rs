//! プロファイルの組み立て
//!
//! 型テーブルとシンボルマッピングの結果を1つのドキュメントにまとめ、
//! PDBヘッダから `$METADATA` を作成します。

use crate::profile::{Profile, ProfileExtras, ProfileMetadata};
use crate::Result;
use chrono::DateTime;
use pdbprof_pdb::{
    DebugInfo, MappedSymbols, PdbHeader, StructLayout, SymbolMapper, TypeInfoExtractor,
};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// `$METADATA.Type` の固定値
pub const PROFILE_TYPE: &str = "Profile";

/// `$METADATA.Timestamp` の書式
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%SZ";

/// デバッグ情報からプロファイルを作る
pub struct ProfileAssembler<'a> {
    info: &'a DebugInfo,
}

impl<'a> ProfileAssembler<'a> {
    pub fn new(info: &'a DebugInfo) -> Self {
        Self { info }
    }

    /// 型テーブルとシンボルを処理してプロファイルを組み立てる
    pub fn assemble(&self, source_filename: &str, extras: ProfileExtras) -> Result<Profile> {
        let structs = TypeInfoExtractor::new(&self.info.types).extract_structs()?;

        let mapper = SymbolMapper::new(self.info.address_map.as_ref())?;
        let symbols = mapper.map_symbols(&self.info.globals);

        assemble(structs, symbols, &self.info.header, source_filename, extras)
    }
}

/// 処理済みの型テーブルとシンボルからプロファイルを組み立てる
pub fn assemble(
    structs: BTreeMap<String, StructLayout>,
    symbols: MappedSymbols,
    header: &PdbHeader,
    source_filename: &str,
    extras: ProfileExtras,
) -> Result<Profile> {
    let metadata = ProfileMetadata {
        guid_age: header.symstore_hash(),
        pdb_file: source_filename.to_string(),
        profile_class: profile_class(source_filename),
        timestamp: format_timestamp(header.signature),
        kind: PROFILE_TYPE.to_string(),
        version: header.version,
    };

    debug!(
        "Assembled profile {} ({} structs, {} functions, {} constants)",
        metadata.guid_age,
        structs.len(),
        symbols.functions.len(),
        symbols.constants.len()
    );

    Ok(Profile {
        constants: symbols.constants,
        extras,
        functions: symbols.functions,
        metadata,
        structs,
    })
}

/// ファイル名の拡張子を除いた部分から表示用のクラス名を作る
///
/// 先頭1文字を大文字、残りを小文字にします（例: `ntkrnlmp.pdb` -> `Ntkrnlmp`）。
pub fn profile_class(source_filename: &str) -> String {
    let stem = Path::new(source_filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();

    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// ビルド時刻（UNIX時刻）をUTCの文字列にする
fn format_timestamp(seconds: u32) -> String {
    // u32の秒数は常に表現可能な範囲に収まる
    let time = DateTime::from_timestamp(i64::from(seconds), 0).unwrap_or_default();
    time.format(TIMESTAMP_FORMAT).to_string()
}
