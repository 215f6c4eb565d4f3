//! PDBの識別情報（GUID + Age）
//!
//! シンボルストアでPDBを一意に特定するハッシュ文字列を作成します。
//! PE側のCodeViewレコードとPDB側の情報ストリームで同じエンコーディングを使うため、
//! 両者をそのまま比較できます。

use pdb::{HeaderVersion, PDBInformation};

/// 128ビットGUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    /// CodeViewレコードに格納されたリトルエンディアンの16バイトから作成する
    pub fn from_le_bytes(bytes: [u8; 16]) -> Self {
        let [a0, a1, a2, a3, b0, b1, c0, c1, d0, d1, d2, d3, d4, d5, d6, d7] = bytes;
        Self {
            data1: u32::from_le_bytes([a0, a1, a2, a3]),
            data2: u16::from_le_bytes([b0, b1]),
            data3: u16::from_le_bytes([c0, c1]),
            data4: [d0, d1, d2, d3, d4, d5, d6, d7],
        }
    }
}

/// シンボルストア用の識別ハッシュを作成する
///
/// GUIDの各フィールドを大文字16進で連結し、Ageを小文字16進（ゼロ埋めなし）で付加します。
///
/// # Examples
/// ```
/// use pdbprof_pdb::identity::{make_symstore_hash, Guid};
///
/// let guid = Guid { data1: 0x3844dbb9, data2: 0x2017, data3: 0x4967, data4: [0xbe, 0x7a, 0xa4, 0xa2, 0xc2, 0x0a, 0x0e, 0x8b] };
/// assert_eq!(make_symstore_hash(&guid, 0x1a), "3844DBB920174967BE7AA4A2C20A0E8B1a");
/// ```
pub fn make_symstore_hash(guid: &Guid, age: u32) -> String {
    let data4: String = guid.data4.iter().map(|b| format!("{:02X}", b)).collect();
    format!(
        "{:08X}{:04X}{:04X}{}{:x}",
        guid.data1, guid.data2, guid.data3, data4, age
    )
}

/// PDB情報ストリームのヘッダ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PdbHeader {
    /// フォーマットバージョン（例: 20000404）
    pub version: u32,
    /// ビルド時刻（Unixエポック秒）
    pub signature: u32,
    /// Age
    pub age: u32,
    pub guid: Guid,
}

impl PdbHeader {
    /// このPDBの識別ハッシュ
    pub fn symstore_hash(&self) -> String {
        make_symstore_hash(&self.guid, self.age)
    }
}

impl From<&PDBInformation<'_>> for PdbHeader {
    fn from(info: &PDBInformation<'_>) -> Self {
        let (data1, data2, data3, data4) = info.guid.as_fields();
        Self {
            version: version_number(info.version),
            signature: info.signature,
            age: info.age,
            guid: Guid {
                data1,
                data2,
                data3,
                data4: *data4,
            },
        }
    }
}

/// ヘッダバージョンをストリームに書かれていた数値に戻す
fn version_number(version: HeaderVersion) -> u32 {
    match version {
        HeaderVersion::V41 => 930_803,
        HeaderVersion::V50 => 19_960_307,
        HeaderVersion::V60 => 19_970_606,
        HeaderVersion::V70 => 19_990_903,
        HeaderVersion::V110 => 20_091_201,
        HeaderVersion::OtherValue(value) => value,
        // 数値を持たない未知のバリアント
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_from_le_bytes() {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&0x3844dbb9u32.to_le_bytes());
        bytes[4..6].copy_from_slice(&0x2017u16.to_le_bytes());
        bytes[6..8].copy_from_slice(&0x4967u16.to_le_bytes());
        bytes[8..].copy_from_slice(&[0xbe, 0x7a, 0xa4, 0xa2, 0xc2, 0x0a, 0x0e, 0x8b]);

        let guid = Guid::from_le_bytes(bytes);
        assert_eq!(guid.data1, 0x3844dbb9);
        assert_eq!(guid.data2, 0x2017);
        assert_eq!(guid.data3, 0x4967);
        assert_eq!(guid.data4[7], 0x8b);
        assert_eq!(make_symstore_hash(&guid, 1), "3844DBB920174967BE7AA4A2C20A0E8B1");
    }

    #[test]
    fn test_symstore_hash_pads_fields() {
        let guid = Guid {
            data1: 0x1,
            data2: 0x2,
            data3: 0x3,
            data4: [0, 1, 2, 3, 4, 5, 6, 0xff],
        };
        assert_eq!(make_symstore_hash(&guid, 1), "000000010002000300010203040506FF1");
        // Ageは小文字16進
        assert!(make_symstore_hash(&guid, 0xab).ends_with("FFab"));
    }

    #[test]
    fn test_version_number_round_trips() {
        for raw in [930_803, 19_960_307, 19_970_606, 19_990_903, 20_000_404, 20_091_201] {
            assert_eq!(version_number(HeaderVersion::from(raw)), raw);
        }
    }
}
