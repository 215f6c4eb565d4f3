//! PDB型情報の抽出
//!
//! 型リーフレコードを `(型名, パラメータ)` の組にデコードし、
//! 名前付き集約型をフラットなレイアウトに展開します。

use crate::model::{Aggregate, TypeIndex, TypeLeaf, TypeStream};
use crate::primitive::{lookup_primitive, Primitive};
use crate::Result;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace, warn};

/// デコードされた型のパラメータ
///
/// フィールドはシリアライズ時のキー順（アルファベット順）に並べています。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypeArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_bit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_bit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_args: Option<Box<TypeArgs>>,
}

impl TypeArgs {
    /// パラメータが空かどうか
    pub fn is_empty(&self) -> bool {
        self.end_bit.is_none()
            && self.start_bit.is_none()
            && self.target.is_none()
            && self.target_args.is_none()
    }

    /// 参照先の型を `target` / `target_args` に格納する
    pub fn targeting(target: DecodedType) -> Self {
        let DecodedType { name, args } = target;
        Self {
            target: Some(name),
            target_args: (!args.is_empty()).then(|| Box::new(args)),
            ..Self::default()
        }
    }
}

/// デコードされた型 `(型名, パラメータ)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedType {
    pub name: String,
    pub args: TypeArgs,
}

impl DecodedType {
    /// 未対応の型を表す型名
    pub const UNKNOWN: &'static str = "<unknown>";

    pub fn new(name: impl Into<String>, args: TypeArgs) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// パラメータなしの型
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(name, TypeArgs::default())
    }

    pub fn unknown() -> Self {
        Self::named(Self::UNKNOWN)
    }

    pub fn is_unknown(&self) -> bool {
        self.name == Self::UNKNOWN
    }
}

impl Serialize for DecodedType {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (&self.name, &self.args).serialize(serializer)
    }
}

/// メンバのレイアウト `[オフセット, 型]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberLayout {
    pub offset: u64,
    pub type_info: DecodedType,
}

impl Serialize for MemberLayout {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (self.offset, &self.type_info).serialize(serializer)
    }
}

/// 集約型のレイアウト `[サイズ, {メンバ名: メンバ}]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructLayout {
    pub size: u64,
    pub members: BTreeMap<String, MemberLayout>,
}

impl StructLayout {
    /// 展開できない集約型のプレースホルダ `(0, {})`
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Serialize for StructLayout {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        (self.size, &self.members).serialize(serializer)
    }
}

/// 型情報抽出器
pub struct TypeInfoExtractor<'a> {
    types: &'a TypeStream,
}

impl<'a> TypeInfoExtractor<'a> {
    /// 新しい型情報抽出器を作成する
    pub fn new(types: &'a TypeStream) -> Self {
        Self { types }
    }

    /// 型インデックスから型情報を抽出する
    ///
    /// 未対応のリーフは `<unknown>` になります。
    /// テーブルにないプリミティブ型タグのみエラーを返します。
    pub fn extract_type_info(&self, index: TypeIndex) -> Result<DecodedType> {
        let mut visiting = HashSet::new();
        self.extract_from_index(index, &mut visiting)
    }

    fn extract_from_index(
        &self,
        index: TypeIndex,
        visiting: &mut HashSet<TypeIndex>,
    ) -> Result<DecodedType> {
        if index.is_primitive() {
            return extract_primitive(index.0);
        }

        let Some(leaf) = self.types.get(index) else {
            trace!("type index {:#x} not present in type stream", index.0);
            return Ok(DecodedType::unknown());
        };

        match leaf {
            TypeLeaf::Pointer { underlying } => {
                match self.extract_nested(index, *underlying, visiting)? {
                    Some(target) => Ok(DecodedType::new("Pointer", TypeArgs::targeting(target))),
                    None => Ok(DecodedType::unknown()),
                }
            }
            TypeLeaf::Bitfield {
                underlying,
                position,
                length,
            } => match self.extract_nested(index, *underlying, visiting)? {
                Some(target) => {
                    let start_bit = u32::from(*position);
                    let args = TypeArgs {
                        start_bit: Some(start_bit),
                        end_bit: Some(start_bit + u32::from(*length)),
                        ..TypeArgs::targeting(target)
                    };
                    Ok(DecodedType::new("BitField", args))
                }
                None => Ok(DecodedType::unknown()),
            },
            // 参照先のメンバは展開しない（集約型は型テーブル側で個別に展開される）
            TypeLeaf::Aggregate(aggregate) if aggregate.kind.is_named_reference() => {
                Ok(DecodedType::named(aggregate.name.as_str()))
            }
            TypeLeaf::Aggregate(_) | TypeLeaf::Unsupported { .. } => Ok(DecodedType::unknown()),
        }
    }

    /// ポインタ・ビットフィールドの参照先を抽出する
    ///
    /// 解決中のノードに再突入した場合はNoneを返します。
    fn extract_nested(
        &self,
        index: TypeIndex,
        underlying: TypeIndex,
        visiting: &mut HashSet<TypeIndex>,
    ) -> Result<Option<DecodedType>> {
        if !visiting.insert(index) {
            warn!("cyclic type reference at {:#x}", index.0);
            return Ok(None);
        }

        let result = self.extract_from_index(underlying, visiting);
        visiting.remove(&index);
        result.map(Some)
    }

    /// 集約型のレイアウトを抽出する
    ///
    /// 展開するのは構造体のみで、共用体・クラスなどは `(0, {})` になります。
    pub fn extract_struct_layout(&self, aggregate: &Aggregate) -> Result<StructLayout> {
        if !aggregate.kind.is_flattened() {
            return Ok(StructLayout::empty());
        }

        // 前方宣言など
        let Some(members) = &aggregate.members else {
            return Ok(StructLayout::empty());
        };

        let mut layout = BTreeMap::new();
        for member in members {
            let type_info = self.extract_type_info(member.field_type)?;
            layout.insert(
                member.name.clone(),
                MemberLayout {
                    offset: member.offset,
                    type_info,
                },
            );
        }

        Ok(StructLayout {
            size: aggregate.size,
            members: layout,
        })
    }

    /// 型ストリーム内のすべての集約型を展開する
    ///
    /// 同名の集約型は後に現れたものが優先されますが、
    /// 前方参照が既存のエントリを上書きすることはありません。
    pub fn extract_structs(&self) -> Result<BTreeMap<String, StructLayout>> {
        let mut structs = BTreeMap::new();

        for aggregate in self.types.aggregates() {
            if aggregate.forward_reference && structs.contains_key(&aggregate.name) {
                continue;
            }
            let layout = self.extract_struct_layout(aggregate)?;
            structs.insert(aggregate.name.clone(), layout);
        }

        debug!(
            "Extracted {} structures from {} type records",
            structs.len(),
            self.types.len()
        );
        Ok(structs)
    }
}

/// プリミティブ型タグを抽出する
fn extract_primitive(tag: u32) -> Result<DecodedType> {
    Ok(match lookup_primitive(tag)? {
        Primitive::Base(name) => DecodedType::named(name),
        Primitive::Pointer(target) => {
            DecodedType::new("Pointer", TypeArgs::targeting(DecodedType::named(target)))
        }
    })
}
