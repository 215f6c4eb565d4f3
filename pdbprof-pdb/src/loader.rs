//! PDBファイルの読み込み機能
//!
//! `pdb` クレートでMSFコンテナを開き、変換に必要なレコードだけを
//! [`DebugInfo`] に写し取ります。

use crate::error::PdbError;
use crate::identity::PdbHeader;
use crate::model::{
    symbol_flags, Aggregate, AggregateKind, DebugInfo, GlobalSymbol, Member, TypeIndex, TypeLeaf,
    TypeStream,
};
use crate::Result;
use pdb::{
    AddressMap, ClassKind, FallibleIterator, FieldList, PublicSymbol, Source, SymbolData,
    TypeData, TypeFinder, PDB,
};
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::{debug, trace};

/// PDBローダー
pub struct PdbLoader;

impl PdbLoader {
    /// PDBファイルからデバッグ情報を読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<DebugInfo> {
        let path = path.as_ref();

        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("Failed to open PDB file {:?}: {}", path, e))?;
        let mut pdb = PDB::open(file)
            .map_err(|e| anyhow::anyhow!("Failed to parse PDB file {:?}: {}", path, e))?;

        let header = read_header(&mut pdb)?;
        debug!("PDB {:?}: {}", path, header.symstore_hash());

        let types = read_types(&mut pdb)?;
        let globals = read_globals(&mut pdb)?;
        let address_map = read_address_map(&mut pdb)?;

        debug!(
            "Loaded {} type records and {} public symbols",
            types.len(),
            globals.len()
        );

        Ok(DebugInfo {
            header,
            types,
            globals,
            address_map: Box::new(address_map),
        })
    }
}

fn read_header<'s, S: Source<'s> + 's>(pdb: &mut PDB<'s, S>) -> Result<PdbHeader> {
    let info = pdb.pdb_information().map_err(PdbError::from)?;
    Ok(PdbHeader::from(&info))
}

/// 型ストリームを変換する
fn read_types<'s, S: Source<'s> + 's>(pdb: &mut PDB<'s, S>) -> Result<TypeStream> {
    let type_info = pdb.type_information().map_err(PdbError::from)?;

    // フィールドリストを引けるように先に索引を作る
    let mut finder = type_info.finder();
    let mut iter = type_info.iter();
    while iter.next().map_err(PdbError::from)?.is_some() {
        finder.update(&iter);
    }

    let mut types = TypeStream::new();
    let mut iter = type_info.iter();
    while let Some(item) = iter.next().map_err(PdbError::from)? {
        let index = TypeIndex(item.index().0);
        let leaf = match item.parse() {
            Ok(data) => convert_leaf(&data, &finder),
            Err(e) => {
                trace!("type 0x{:x} not parsed: {}", index.0, e);
                TypeLeaf::Unsupported { kind: "LF_UNKNOWN" }
            }
        };
        types.insert(index, leaf);
    }

    Ok(types)
}

/// フィールドリストの取得元
trait FieldLists {
    /// インデックスが指すフィールドリストを返す（フィールドリスト以外ならNone）
    fn field_list(&self, index: pdb::TypeIndex) -> Option<FieldRecord>;
}

impl FieldLists for TypeFinder<'_> {
    fn field_list(&self, index: pdb::TypeIndex) -> Option<FieldRecord> {
        match self.find(index).and_then(|item| item.parse()) {
            Ok(TypeData::FieldList(list)) => Some(FieldRecord::from(&list)),
            Ok(_) => None,
            Err(e) => {
                trace!("field list 0x{:x} not parsed: {}", index.0, e);
                None
            }
        }
    }
}

/// 1つのフィールドリストレコードから取り出したデータメンバと継続先
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct FieldRecord {
    members: Vec<Member>,
    continuation: Option<pdb::TypeIndex>,
}

impl From<&FieldList<'_>> for FieldRecord {
    fn from(list: &FieldList<'_>) -> Self {
        // 静的メンバ・基底クラス・メソッドはレイアウトに含めない
        let members = list
            .fields
            .iter()
            .filter_map(|field| match field {
                TypeData::Member(member) => Some(Member {
                    name: member.name.to_string().into_owned(),
                    offset: member.offset,
                    field_type: TypeIndex(member.field_type.0),
                }),
                _ => None,
            })
            .collect();

        Self {
            members,
            continuation: list.continuation,
        }
    }
}

fn convert_leaf(data: &TypeData<'_>, lists: &dyn FieldLists) -> TypeLeaf {
    match data {
        TypeData::Class(class) => {
            let forward_reference = class.properties.forward_reference();
            TypeLeaf::Aggregate(Aggregate {
                kind: aggregate_kind(class.kind),
                name: class.name.to_string().into_owned(),
                size: class.size,
                members: member_list(forward_reference, class.fields, lists),
                forward_reference,
            })
        }
        TypeData::Union(union) => {
            let forward_reference = union.properties.forward_reference();
            TypeLeaf::Aggregate(Aggregate {
                kind: AggregateKind::Union,
                name: union.name.to_string().into_owned(),
                size: union.size,
                members: member_list(forward_reference, Some(union.fields), lists),
                forward_reference,
            })
        }
        TypeData::Pointer(pointer) => TypeLeaf::Pointer {
            underlying: TypeIndex(pointer.underlying_type.0),
        },
        TypeData::Bitfield(bitfield) => TypeLeaf::Bitfield {
            underlying: TypeIndex(bitfield.underlying_type.0),
            position: bitfield.position,
            length: bitfield.length,
        },
        other => TypeLeaf::Unsupported {
            kind: leaf_kind(other),
        },
    }
}

fn aggregate_kind(kind: ClassKind) -> AggregateKind {
    match kind {
        ClassKind::Struct => AggregateKind::Structure,
        ClassKind::Class => AggregateKind::Class,
        ClassKind::Interface => AggregateKind::Interface,
    }
}

/// 集約型のメンバリストを解決する
///
/// 前方参照とフィールドリストを持たないレコード（T_NOTYPE）はNone
fn member_list(
    forward_reference: bool,
    fields: Option<pdb::TypeIndex>,
    lists: &dyn FieldLists,
) -> Option<Vec<Member>> {
    if forward_reference {
        return None;
    }
    collect_members(fields?, lists)
}

/// フィールドリスト（継続レコードを含む）からデータメンバを集める
///
/// リストが解決できない場合はNone
fn collect_members(first: pdb::TypeIndex, lists: &dyn FieldLists) -> Option<Vec<Member>> {
    let mut members = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(first);

    while let Some(index) = next {
        if !visited.insert(index.0) {
            debug!("field list 0x{:x} continues into itself", index.0);
            break;
        }

        let record = lists.field_list(index)?;
        members.extend(record.members);
        next = record.continuation;
    }

    Some(members)
}

fn leaf_kind(data: &TypeData<'_>) -> &'static str {
    match data {
        TypeData::Primitive(_) => "LF_PRIMITIVE",
        TypeData::Member(_) => "LF_MEMBER",
        TypeData::MemberFunction(_) => "LF_MFUNCTION",
        TypeData::OverloadedMethod(_) => "LF_METHOD",
        TypeData::Method(_) => "LF_ONEMETHOD",
        TypeData::StaticMember(_) => "LF_STMEMBER",
        TypeData::Nested(_) => "LF_NESTTYPE",
        TypeData::BaseClass(_) => "LF_BCLASS",
        TypeData::VirtualBaseClass(_) => "LF_VBCLASS",
        TypeData::VirtualFunctionTablePointer(_) => "LF_VFUNCTAB",
        TypeData::Procedure(_) => "LF_PROCEDURE",
        TypeData::Modifier(_) => "LF_MODIFIER",
        TypeData::Enumeration(_) => "LF_ENUM",
        TypeData::Enumerate(_) => "LF_ENUMERATE",
        TypeData::Array(_) => "LF_ARRAY",
        TypeData::FieldList(_) => "LF_FIELDLIST",
        TypeData::ArgumentList(_) => "LF_ARGLIST",
        TypeData::MethodList(_) => "LF_METHODLIST",
        _ => "LF_OTHER",
    }
}

/// グローバルシンボルストリームからパブリックシンボルを取り出す
fn read_globals<'s, S: Source<'s> + 's>(pdb: &mut PDB<'s, S>) -> Result<Vec<GlobalSymbol>> {
    let symbol_table = pdb.global_symbols().map_err(PdbError::from)?;
    let mut globals = Vec::new();

    let mut iter = symbol_table.iter();
    while let Some(symbol) = iter.next().map_err(PdbError::from)? {
        match symbol.parse() {
            Ok(SymbolData::Public(public)) => globals.push(convert_public(&public)),
            Ok(_) => {}
            Err(e) => trace!("global symbol 0x{:04x} not parsed: {}", symbol.raw_kind(), e),
        }
    }

    Ok(globals)
}

/// パブリックシンボルを変換し、CV_PUBSYMFLAGS を組み立て直す
fn convert_public(public: &PublicSymbol<'_>) -> GlobalSymbol {
    let mut flags = 0;
    if public.code {
        flags |= symbol_flags::CODE;
    }
    if public.function {
        flags |= symbol_flags::FUNCTION;
    }
    if public.managed {
        flags |= symbol_flags::MANAGED;
    }
    if public.msil {
        flags |= symbol_flags::MSIL;
    }

    GlobalSymbol {
        name: public.name.to_string().into_owned(),
        segment: public.offset.section,
        offset: Some(public.offset.offset),
        flags,
    }
}

/// セクションテーブルとOMAPを読み込む
///
/// 再配置前のセクションヘッダがあればOMAPと組み合わせ、
/// なければ出荷イメージのセクションヘッダをそのまま使います。
fn read_address_map<'s, S: Source<'s> + 's>(pdb: &mut PDB<'s, S>) -> Result<AddressMap<'s>> {
    let sections = pdb.sections().map_err(PdbError::from)?;
    debug!(
        "{} section headers in the shipped image",
        sections.map_or(0, |sections| sections.len())
    );
    Ok(pdb.address_map().map_err(PdbError::from)?)
}
