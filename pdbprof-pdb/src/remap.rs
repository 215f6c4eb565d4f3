//! シンボルアドレスの解決（セクションテーブル + OMAP）
//!
//! リンク後にバイナリを書き換えるビルドでは、シンボルテーブルのアドレスと
//! 出荷されたイメージのアドレスが一致しません。OMAPはその対応表で、
//! `pdb` クレートの [`AddressMap`] がセクションテーブルと合わせて保持しています。

use pdb::{AddressMap, PdbInternalSectionOffset};

/// シンボルのセクションオフセットを出荷イメージ上のアドレスに変換する
pub trait AddressRemap {
    /// セグメント番号（1始まり）とセグメント内オフセットからアドレスを求める
    ///
    /// セグメントがセクションテーブルにない場合はNone。
    /// OMAPで削除された範囲のアドレスは0になります。
    fn resolve(&self, segment: u16, offset: u32) -> Option<u64>;
}

impl AddressRemap for AddressMap<'_> {
    fn resolve(&self, segment: u16, offset: u32) -> Option<u64> {
        let internal = PdbInternalSectionOffset::new(segment, offset).to_internal_rva(self)?;
        Some(internal.to_rva(self).map_or(0, |rva| u64::from(rva.0)))
    }
}
