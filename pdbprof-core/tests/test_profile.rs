//! プロファイル組み立てのテスト
//!
//! PDBファイルの代わりにメモリ上で組み立てたデバッグ情報を使います。

use pdbprof_core::{PdbError, ProfileAssembler, ProfileExtras};
use pdbprof_pdb::model::symbol_flags;
use pdbprof_pdb::{
    AddressRemap, Aggregate, AggregateKind, DebugInfo, GlobalSymbol, Guid, Member, PdbHeader,
    TypeIndex, TypeLeaf, TypeStream,
};
use serde_json::json;

/// セクションの仮想アドレスとOMAP（ソース順の `(source, target)`）
struct ImageLayout {
    sections: Vec<u32>,
    omap: Option<Vec<(u32, u32)>>,
}

impl AddressRemap for ImageLayout {
    fn resolve(&self, segment: u16, offset: u32) -> Option<u64> {
        let index = usize::from(segment).checked_sub(1)?;
        let address = self.sections.get(index)? + offset;

        let Some(omap) = &self.omap else {
            return Some(u64::from(address));
        };
        // ターゲット0と最初のエントリより前は0
        let remapped = omap
            .iter()
            .rev()
            .find(|(source, _)| *source <= address)
            .filter(|(_, target)| *target != 0)
            .map_or(0, |(source, target)| target + (address - source));
        Some(u64::from(remapped))
    }
}

fn layout(omap: Option<Vec<(u32, u32)>>) -> Box<ImageLayout> {
    Box::new(ImageLayout {
        sections: vec![0x1000, 0x5000],
        omap,
    })
}

fn aggregate(kind: AggregateKind, name: &str, size: u64, members: Vec<Member>) -> TypeLeaf {
    TypeLeaf::Aggregate(Aggregate {
        kind,
        name: name.to_string(),
        size,
        members: Some(members),
        forward_reference: false,
    })
}

fn member(name: &str, offset: u64, field_type: u32) -> Member {
    Member {
        name: name.to_string(),
        offset,
        field_type: TypeIndex(field_type),
    }
}

fn symbol(name: &str, segment: u16, offset: u32, flags: u32) -> GlobalSymbol {
    GlobalSymbol {
        name: name.to_string(),
        segment,
        offset: Some(offset),
        flags,
    }
}

fn header() -> PdbHeader {
    PdbHeader {
        version: 20000404,
        signature: 1_552_969_776,
        age: 0x1a,
        guid: Guid {
            data1: 0x3844dbb9,
            data2: 0x2017,
            data3: 0x4967,
            data4: [0xbe, 0x7a, 0xa4, 0xa2, 0xc2, 0x0a, 0x0e, 0x8b],
        },
    }
}

fn types() -> TypeStream {
    let mut types = TypeStream::new();
    types.insert(TypeIndex(0x1000), TypeLeaf::Unsupported { kind: "LF_ARRAY" });
    types.insert(
        TypeIndex(0x1001),
        aggregate(
            AggregateKind::Structure,
            "_FOO",
            8,
            vec![member("x", 0, 0x1000), member("Overlay", 4, 0x1006)],
        ),
    );
    types.insert(TypeIndex(0x1002), TypeLeaf::Pointer { underlying: TypeIndex(0x1001) });
    types.insert(
        TypeIndex(0x1003),
        TypeLeaf::Bitfield {
            underlying: TypeIndex(0x0022),
            position: 3,
            length: 2,
        },
    );
    types.insert(
        TypeIndex(0x1004),
        aggregate(
            AggregateKind::Structure,
            "_BAR",
            24,
            vec![
                member("Foo", 0, 0x1002),
                member("Flags", 8, 0x1003),
                member("Name", 16, 0x0671),
            ],
        ),
    );
    types.insert(
        TypeIndex(0x1005),
        aggregate(AggregateKind::Class, "CThing", 4, vec![member("a", 0, 0x0074)]),
    );
    types.insert(
        TypeIndex(0x1006),
        aggregate(
            AggregateKind::Union,
            "_OVERLAY",
            4,
            vec![member("AsLong", 0, 0x0012), member("AsShort", 0, 0x0011)],
        ),
    );
    types
}

fn debug_info() -> DebugInfo {
    DebugInfo {
        header: header(),
        types: types(),
        globals: vec![
            symbol("_KeBugCheckEx@20", 1, 0x100, symbol_flags::FUNCTION),
            symbol("?Bar@@YAHXZ", 1, 0x200, symbol_flags::CODE | symbol_flags::FUNCTION),
            symbol("_KiServiceTable", 2, 0x40, 0),
            symbol("Foo", 1, 0x1000, 0),
            symbol("Foo", 1, 0x0, 0),
            // セクションテーブルの範囲外
            symbol("Orphan", 7, 0x10, symbol_flags::FUNCTION),
        ],
        address_map: layout(None),
    }
}

#[test]
fn test_assemble_full_document() {
    let info = debug_info();
    let profile = ProfileAssembler::new(&info)
        .assemble("ntkrnlmp.pdb", ProfileExtras::default())
        .expect("Failed to assemble profile");

    let actual = serde_json::to_value(&profile).unwrap();
    let expected = json!({
        "$CONSTANTS": {
            "Foo": 0x1000,
            "Foo_1": 0x2000,
            "KiServiceTable": 0x5040
        },
        "$FUNCTIONS": {
            "Bar": 0x1200,
            "KeBugCheckEx": 0x1100
        },
        "$METADATA": {
            "GUID_AGE": "3844DBB920174967BE7AA4A2C20A0E8B1a",
            "PDBFile": "ntkrnlmp.pdb",
            "ProfileClass": "Ntkrnlmp",
            "Timestamp": "2019-03-19 04:29:36Z",
            "Type": "Profile",
            "Version": 20000404
        },
        "$STRUCTS": {
            "CThing": [0, {}],
            "_OVERLAY": [0, {}],
            "_BAR": [24, {
                "Flags": [8, ["BitField", {"end_bit": 5, "start_bit": 3, "target": "unsigned long"}]],
                "Foo": [0, ["Pointer", {"target": "_FOO"}]],
                "Name": [16, ["Pointer", {"target": "String"}]]
            }],
            "_FOO": [8, {
                "Overlay": [4, ["_OVERLAY", {}]],
                "x": [0, ["<unknown>", {}]]
            }]
        }
    });

    assert_eq!(actual, expected);
}

#[test]
fn test_out_of_range_segment_is_dropped() {
    let info = debug_info();
    let profile = ProfileAssembler::new(&info)
        .assemble("ntkrnlmp.pdb", ProfileExtras::default())
        .unwrap();

    assert!(!profile.functions.contains_key("Orphan"));
    assert!(!profile.constants.contains_key("Orphan"));
}

#[test]
fn test_assemble_is_idempotent() {
    let info = debug_info();
    let assembler = ProfileAssembler::new(&info);

    let first = assembler.assemble("ntkrnlmp.pdb", ProfileExtras::default()).unwrap();
    let second = assembler.assemble("ntkrnlmp.pdb", ProfileExtras::default()).unwrap();
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
}

#[test]
fn test_assemble_with_omap() {
    let mut info = debug_info();
    info.address_map = layout(Some(vec![(0x1000, 0x3000), (0x5000, 0)]));

    let profile = ProfileAssembler::new(&info)
        .assemble("ntkrnlmp.pdb", ProfileExtras::default())
        .unwrap();

    assert_eq!(profile.functions["KeBugCheckEx"], 0x3100);
    assert_eq!(profile.constants["Foo"], 0x3000);
    assert_eq!(profile.constants["Foo_1"], 0x4000);
    // ターゲット0の範囲は0になる
    assert_eq!(profile.constants["KiServiceTable"], 0);
}

#[test]
fn test_generated_suffix_skips_real_symbol_name() {
    let mut info = debug_info();
    info.globals.push(symbol("Foo_1", 2, 0x0, 0));

    let profile = ProfileAssembler::new(&info)
        .assemble("ntkrnlmp.pdb", ProfileExtras::default())
        .unwrap();

    assert_eq!(profile.constants["Foo"], 0x1000);
    assert_eq!(profile.constants["Foo_1"], 0x5000);
    assert_eq!(profile.constants["Foo_2"], 0x2000);
}

#[test]
fn test_unsupported_primitive_aborts() {
    let mut info = debug_info();
    info.types.insert(
        TypeIndex(0x1006),
        aggregate(AggregateKind::Structure, "_BAD", 4, vec![member("v", 0, 0x0005)]),
    );

    let err = ProfileAssembler::new(&info)
        .assemble("ntkrnlmp.pdb", ProfileExtras::default())
        .unwrap_err();
    match err.downcast_ref::<PdbError>() {
        Some(PdbError::UnsupportedTypeTag { tag }) => assert_eq!(*tag, 0x0005),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_extras_are_emitted() {
    let info = debug_info();
    let extras = ProfileExtras {
        dll_path: Some(r"\SystemRoot\system32\ntoskrnl.exe".to_string()),
        dll_guid_age: Some("3844DBB920174967BE7AA4A2C20A0E8B1".to_string()),
        image_base: Some("0x140000000".to_string()),
    };

    let profile = ProfileAssembler::new(&info)
        .assemble("ntkrnlmp.pdb", extras)
        .unwrap();
    let json = profile.to_json().unwrap();

    assert!(json.starts_with("{\n    \"$CONSTANTS\""));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(
        value["$EXTRAS"],
        json!({
            "DLLPath": r"\SystemRoot\system32\ntoskrnl.exe",
            "DLL_GUID_AGE": "3844DBB920174967BE7AA4A2C20A0E8B1",
            "ImageBase": "0x140000000"
        })
    );
}
