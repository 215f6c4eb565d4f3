//! グローバルシンボルのアドレス解決

use crate::demangle::Demangler;
use crate::model::GlobalSymbol;
use crate::remap::AddressRemap;
use crate::Result;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// 関数・定数に振り分けられたシンボル
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedSymbols {
    /// 関数名 -> アドレス
    pub functions: BTreeMap<String, u64>,
    /// 定数・データ名 -> アドレス
    pub constants: BTreeMap<String, u64>,
}

/// シンボルマッパー
pub struct SymbolMapper<'a> {
    /// セクションテーブルとOMAP
    address_map: &'a dyn AddressRemap,
    demangler: Demangler,
}

impl<'a> SymbolMapper<'a> {
    /// アドレス解決関数からマッパーを作成する
    pub fn new(address_map: &'a dyn AddressRemap) -> Result<Self> {
        Ok(Self {
            address_map,
            demangler: Demangler::new()?,
        })
    }

    /// シンボルのアドレスを解決する
    ///
    /// セグメント番号がセクションテーブルの範囲外、またはオフセットがない場合はNone
    pub fn resolve_address(&self, symbol: &GlobalSymbol) -> Option<u64> {
        self.address_map.resolve(symbol.segment, symbol.offset?)
    }

    /// すべてのグローバルシンボルを解決し、関数と定数に振り分ける
    pub fn map_symbols(&self, globals: &[GlobalSymbol]) -> MappedSymbols {
        let mut functions: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        let mut constants: BTreeMap<String, Vec<u64>> = BTreeMap::new();
        let mut skipped = 0usize;

        for symbol in globals {
            let Some(address) = self.resolve_address(symbol) else {
                trace!(
                    "skipping {} (segment {}, offset {:?})",
                    symbol.name,
                    symbol.segment,
                    symbol.offset
                );
                skipped += 1;
                continue;
            };

            let bucket = if symbol.is_function() {
                &mut functions
            } else {
                &mut constants
            };
            bucket
                .entry(self.demangler.demangle(&symbol.name))
                .or_default()
                .push(address);
        }

        let mapped = MappedSymbols {
            functions: disambiguate(functions),
            constants: disambiguate(constants),
        };
        debug!(
            "Mapped {} functions and {} constants ({} symbols skipped)",
            mapped.functions.len(),
            mapped.constants.len(),
            skipped
        );
        mapped
    }
}

/// 同名シンボルに連番を付ける
///
/// アドレスを昇順に並べ、最小のものに元の名前、以降に `_1`, `_2`, ... を付けます。
/// 連番の名前が別のシンボル名と重なる場合は、空いている次の番号を使います。
fn disambiguate(groups: BTreeMap<String, Vec<u64>>) -> BTreeMap<String, u64> {
    let mut result = BTreeMap::new();
    let mut rest = Vec::new();

    // 元の名前をすべて先に確保する
    for (name, mut addresses) in groups {
        addresses.sort_unstable();
        addresses.dedup();

        let mut addresses = addresses.into_iter();
        if let Some(first) = addresses.next() {
            result.insert(name.clone(), first);
        }
        rest.push((name, addresses));
    }

    for (name, addresses) in rest {
        let mut suffix = 0;
        for address in addresses {
            let key = loop {
                suffix += 1;
                let key = format!("{}_{}", name, suffix);
                if !result.contains_key(&key) {
                    break key;
                }
                trace!("{} is taken, trying the next suffix", key);
            };
            result.insert(key, address);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::symbol_flags;

    /// OMAPを持たないセクションテーブル
    struct Sections(Vec<u32>);

    impl AddressRemap for Sections {
        fn resolve(&self, segment: u16, offset: u32) -> Option<u64> {
            let index = usize::from(segment).checked_sub(1)?;
            let base = self.0.get(index)?;
            Some(u64::from(*base) + u64::from(offset))
        }
    }

    fn symbol(name: &str, segment: u16, offset: Option<u32>, flags: u32) -> GlobalSymbol {
        GlobalSymbol {
            name: name.to_string(),
            segment,
            offset,
            flags,
        }
    }

    fn sections() -> Sections {
        Sections(vec![0x1000, 0x8000])
    }

    #[test]
    fn test_resolve_address() {
        let sections = sections();
        let mapper = SymbolMapper::new(&sections).unwrap();

        assert_eq!(mapper.resolve_address(&symbol("a", 1, Some(0x10), 0)), Some(0x1010));
        assert_eq!(mapper.resolve_address(&symbol("b", 2, Some(0x20), 0)), Some(0x8020));
        // 範囲外のセグメント、セグメント0、オフセットなし
        assert_eq!(mapper.resolve_address(&symbol("c", 3, Some(0), 0)), None);
        assert_eq!(mapper.resolve_address(&symbol("d", 0, Some(0), 0)), None);
        assert_eq!(mapper.resolve_address(&symbol("e", 1, None, 0)), None);
    }

    #[test]
    fn test_empty_address_map_skips_everything() {
        let map = pdb::AddressMap::default();
        let mapper = SymbolMapper::new(&map).unwrap();

        let mapped = mapper.map_symbols(&[symbol("_KiServiceTable", 1, Some(0x40), 0)]);
        assert_eq!(mapped, MappedSymbols::default());
    }

    #[test]
    fn test_map_symbols_buckets() {
        let sections = sections();
        let mapper = SymbolMapper::new(&sections).unwrap();
        let globals = vec![
            symbol("_KeBugCheckEx@20", 1, Some(0x100), symbol_flags::FUNCTION),
            symbol("_KiServiceTable", 2, Some(0x40), 0),
            symbol("?Bar@@YAHXZ", 1, Some(0x200), symbol_flags::CODE | symbol_flags::FUNCTION),
            // CODEのみでは関数に分類しない
            symbol("_KiSystemStartup", 1, Some(0x300), symbol_flags::CODE),
            symbol("Missing", 9, Some(0), symbol_flags::FUNCTION),
        ];

        let mapped = mapper.map_symbols(&globals);
        assert_eq!(mapped.functions.len(), 2);
        assert_eq!(mapped.functions["KeBugCheckEx"], 0x1100);
        assert_eq!(mapped.functions["Bar"], 0x1200);
        assert_eq!(mapped.constants["KiServiceTable"], 0x8040);
        assert_eq!(mapped.constants["KiSystemStartup"], 0x1300);
        assert!(!mapped.functions.contains_key("Missing"));
        assert!(!mapped.constants.contains_key("Missing"));
    }

    #[test]
    fn test_map_symbols_duplicate_names() {
        let sections = Sections(vec![0]);
        let mapper = SymbolMapper::new(&sections).unwrap();
        let globals = vec![
            symbol("Foo", 1, Some(0x2000), symbol_flags::FUNCTION),
            symbol("Foo", 1, Some(0x1000), symbol_flags::FUNCTION),
            symbol("_Foo", 1, Some(0x3000), symbol_flags::FUNCTION),
            // 同じアドレスは1つにまとめる
            symbol("Foo", 1, Some(0x1000), symbol_flags::FUNCTION),
        ];

        let mapped = mapper.map_symbols(&globals);
        assert_eq!(mapped.functions.len(), 3);
        assert_eq!(mapped.functions["Foo"], 0x1000);
        assert_eq!(mapped.functions["Foo_1"], 0x2000);
        assert_eq!(mapped.functions["Foo_2"], 0x3000);
    }

    #[test]
    fn test_suffix_skips_existing_symbol_name() {
        let sections = Sections(vec![0]);
        let mapper = SymbolMapper::new(&sections).unwrap();
        let globals = vec![
            symbol("Foo", 1, Some(0x1000), 0),
            symbol("Foo", 1, Some(0x2000), 0),
            symbol("Foo_1", 1, Some(0x5000), 0),
        ];

        let mapped = mapper.map_symbols(&globals);
        assert_eq!(mapped.constants.len(), 3);
        assert_eq!(mapped.constants["Foo"], 0x1000);
        assert_eq!(mapped.constants["Foo_1"], 0x5000);
        assert_eq!(mapped.constants["Foo_2"], 0x2000);
    }

    #[test]
    fn test_map_symbols_is_deterministic() {
        let sections = sections();
        let mapper = SymbolMapper::new(&sections).unwrap();
        let globals = vec![
            symbol("B", 1, Some(2), 0),
            symbol("A", 1, Some(1), 0),
            symbol("B", 2, Some(0), 0),
        ];

        assert_eq!(mapper.map_symbols(&globals), mapper.map_symbols(&globals));
    }
}
