//! プロファイルドキュメント
//!
//! キー名は下流ツールが読む固定の契約です。
//! すべてのマップは `BTreeMap`、構造体のフィールドはキー順に宣言しているため、
//! シリアライズ結果のキーは常にソート済みになります。

use crate::Result;
use pdbprof_pdb::StructLayout;
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON出力のインデント
const JSON_INDENT: &[u8] = b"    ";

/// プロファイル
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Profile {
    /// 定数・データ名 -> アドレス
    #[serde(rename = "$CONSTANTS")]
    pub constants: BTreeMap<String, u64>,
    #[serde(rename = "$EXTRAS", skip_serializing_if = "ProfileExtras::is_empty")]
    pub extras: ProfileExtras,
    /// 関数名 -> アドレス
    #[serde(rename = "$FUNCTIONS")]
    pub functions: BTreeMap<String, u64>,
    #[serde(rename = "$METADATA")]
    pub metadata: ProfileMetadata,
    /// 構造体名 -> `[サイズ, {メンバ名: [オフセット, 型]}]`
    #[serde(rename = "$STRUCTS")]
    pub structs: BTreeMap<String, StructLayout>,
}

impl Profile {
    /// 4スペースインデントのJSONに変換する
    pub fn to_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(JSON_INDENT);
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut serializer)?;
        Ok(String::from_utf8(buf)?)
    }
}

/// `$METADATA` セクション
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileMetadata {
    /// PDBの識別ハッシュ
    #[serde(rename = "GUID_AGE")]
    pub guid_age: String,
    /// 元のPDBファイル名
    #[serde(rename = "PDBFile")]
    pub pdb_file: String,
    /// 表示用のクラス名
    #[serde(rename = "ProfileClass")]
    pub profile_class: String,
    /// ビルド時刻（UTC）
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Type")]
    pub kind: String,
    /// PDB情報ストリームのバージョン
    #[serde(rename = "Version")]
    pub version: u32,
}

/// `$EXTRAS` セクション
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileExtras {
    /// 対応するバイナリの元のパス
    #[serde(rename = "DLLPath", skip_serializing_if = "Option::is_none")]
    pub dll_path: Option<String>,
    /// 対応するバイナリの識別ハッシュ
    #[serde(rename = "DLL_GUID_AGE", skip_serializing_if = "Option::is_none")]
    pub dll_guid_age: Option<String>,
    /// 対応するバイナリのImageBase（`0x` 付き16進）
    #[serde(rename = "ImageBase", skip_serializing_if = "Option::is_none")]
    pub image_base: Option<String>,
}

impl ProfileExtras {
    pub fn is_empty(&self) -> bool {
        self.dll_path.is_none() && self.dll_guid_age.is_none() && self.image_base.is_none()
    }
}
