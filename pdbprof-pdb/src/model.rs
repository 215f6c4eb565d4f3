//! デバッグ情報のインメモリモデル
//!
//! PDBコンテナのパーサ（[`crate::PdbLoader`]）が生成し、
//! 型テーブル処理とシンボルマッピングが読み取るレコード群です。

use crate::identity::PdbHeader;
use crate::remap::AddressRemap;
use std::collections::BTreeMap;

/// 型ストリーム内のインデックス
///
/// `0x1000` 未満はCodeViewのプリミティブ型タグそのものを表します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeIndex(pub u32);

impl TypeIndex {
    /// 最初の非プリミティブ型インデックス
    pub const FIRST_NON_PRIMITIVE: u32 = 0x1000;

    /// プリミティブ型タグかどうか
    pub fn is_primitive(self) -> bool {
        self.0 < Self::FIRST_NON_PRIMITIVE
    }
}

/// 集約型の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateKind {
    /// LF_STRUCTURE
    Structure,
    /// LF_UNION
    Union,
    /// LF_CLASS
    Class,
    /// LF_INTERFACE
    Interface,
}

impl AggregateKind {
    /// 型テーブルでメンバを展開する種別か（構造体のみ）
    pub fn is_flattened(self) -> bool {
        self == AggregateKind::Structure
    }

    /// 参照箇所で名前としてデコードする種別か
    pub fn is_named_reference(self) -> bool {
        matches!(self, AggregateKind::Structure | AggregateKind::Union)
    }
}

/// 集約型のデータメンバ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// メンバ名
    pub name: String,
    /// 先頭からのオフセット（バイト）
    pub offset: u64,
    /// メンバの型
    pub field_type: TypeIndex,
}

/// 名前付き集約型（構造体・共用体など）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub name: String,
    /// サイズ（バイト）
    pub size: u64,
    /// メンバリスト（前方宣言など、解決できない場合はNone）
    pub members: Option<Vec<Member>>,
    /// 前方参照レコードかどうか
    pub forward_reference: bool,
}

/// 型リーフレコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeLeaf {
    /// LF_POINTER
    Pointer { underlying: TypeIndex },
    /// LF_BITFIELD
    Bitfield {
        underlying: TypeIndex,
        position: u8,
        length: u8,
    },
    /// LF_STRUCTURE / LF_UNION / LF_CLASS / LF_INTERFACE
    Aggregate(Aggregate),
    /// 対応していないリーフ（種別名のみ保持）
    Unsupported { kind: &'static str },
}

/// 型ストリーム
#[derive(Debug, Clone, Default)]
pub struct TypeStream {
    leaves: BTreeMap<TypeIndex, TypeLeaf>,
}

impl TypeStream {
    /// 空の型ストリームを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// リーフを登録する
    pub fn insert(&mut self, index: TypeIndex, leaf: TypeLeaf) {
        self.leaves.insert(index, leaf);
    }

    /// インデックスからリーフを取得する
    pub fn get(&self, index: TypeIndex) -> Option<&TypeLeaf> {
        self.leaves.get(&index)
    }

    /// 登録されているリーフ数
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// すべての集約型をインデックス順に列挙する
    pub fn aggregates(&self) -> impl Iterator<Item = &Aggregate> {
        self.leaves.values().filter_map(|leaf| match leaf {
            TypeLeaf::Aggregate(aggregate) => Some(aggregate),
            _ => None,
        })
    }
}

/// グローバルシンボルのフラグ（CV_PUBSYMFLAGS）
pub mod symbol_flags {
    pub const CODE: u32 = 1;
    pub const FUNCTION: u32 = 2;
    pub const MANAGED: u32 = 4;
    pub const MSIL: u32 = 8;
}

/// グローバルシンボルレコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSymbol {
    /// シンボル名（装飾されている場合がある）
    pub name: String,
    /// セグメント番号（1始まり）
    pub segment: u16,
    /// セグメント内オフセット
    pub offset: Option<u32>,
    /// シンボル種別フラグ
    pub flags: u32,
}

impl GlobalSymbol {
    /// 関数シンボルかどうか
    pub fn is_function(&self) -> bool {
        self.flags & symbol_flags::FUNCTION != 0
    }
}

/// 変換1回分のデバッグ情報
pub struct DebugInfo {
    /// PDB情報ストリームのヘッダ
    pub header: PdbHeader,
    /// 型ストリーム
    pub types: TypeStream,
    /// グローバルシンボル
    pub globals: Vec<GlobalSymbol>,
    /// セクションテーブルとOMAPによるアドレス解決
    pub address_map: Box<dyn AddressRemap>,
}
