//! CodeViewプリミティブ型タグの固定テーブル
//!
//! タグ値の下位バイトが基本型、ビット8..11がポインタモード
//! （`0x4` = 32ビットnear、`0x6` = 64ビットnear）を表します。

use crate::error::PdbError;
use crate::Result;

/// プリミティブ型のデコード結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    /// 基本型（型名）
    Base(&'static str),
    /// 基本型へのポインタ（参照先の型名）
    Pointer(&'static str),
}

/// プリミティブ型テーブルのエントリ
#[derive(Debug, Clone, Copy)]
pub struct PrimitiveEntry {
    pub tag: u32,
    /// CodeViewでの名前（例: `T_64PVOID`）
    pub name: &'static str,
    pub primitive: Primitive,
}

const fn base(tag: u32, name: &'static str, ty: &'static str) -> PrimitiveEntry {
    PrimitiveEntry {
        tag,
        name,
        primitive: Primitive::Base(ty),
    }
}

const fn ptr(tag: u32, name: &'static str, target: &'static str) -> PrimitiveEntry {
    PrimitiveEntry {
        tag,
        name,
        primitive: Primitive::Pointer(target),
    }
}

/// プリミティブ型テーブル
pub static PRIMITIVE_TYPES: &[PrimitiveEntry] = &[
    // 32ビットポインタ
    ptr(0x0474, "T_32PINT4", "long"),
    ptr(0x0412, "T_32PLONG", "long"),
    ptr(0x0413, "T_32PQUAD", "long long"),
    ptr(0x0470, "T_32PRCHAR", "unsigned char"),
    ptr(0x0440, "T_32PREAL32", "Void"),
    ptr(0x0441, "T_32PREAL64", "Void"),
    ptr(0x0411, "T_32PSHORT", "short"),
    ptr(0x0420, "T_32PUCHAR", "unsigned char"),
    ptr(0x0475, "T_32PUINT4", "unsigned int"),
    ptr(0x0422, "T_32PULONG", "unsigned long"),
    ptr(0x0423, "T_32PUQUAD", "unsigned long long"),
    ptr(0x0421, "T_32PUSHORT", "unsigned short"),
    ptr(0x0403, "T_32PVOID", "Void"),
    ptr(0x0471, "T_32PWCHAR", "UnicodeString"),
    ptr(0x0408, "T_32PHRESULT", "long"),
    ptr(0x0410, "T_32PCHAR", "char"),
    ptr(0x0476, "T_32PINT8", "long long"),
    ptr(0x0477, "T_32PUINT8", "unsigned long long"),
    // 64ビットポインタ
    ptr(0x0674, "T_64PINT4", "long"),
    ptr(0x0612, "T_64PLONG", "long"),
    ptr(0x0613, "T_64PQUAD", "long long"),
    ptr(0x0611, "T_64PSHORT", "short"),
    ptr(0x0670, "T_64PRCHAR", "unsigned char"),
    ptr(0x0620, "T_64PUCHAR", "unsigned char"),
    ptr(0x0610, "T_64PCHAR", "char"),
    ptr(0x0671, "T_64PWCHAR", "String"),
    ptr(0x0622, "T_64PULONG", "unsigned long"),
    ptr(0x0623, "T_64PUQUAD", "unsigned long long"),
    ptr(0x0621, "T_64PUSHORT", "unsigned short"),
    ptr(0x0603, "T_64PVOID", "Void"),
    ptr(0x0640, "T_64PREAL32", "float"),
    ptr(0x0641, "T_64PREAL64", "double"),
    ptr(0x0675, "T_64PUINT4", "unsigned int"),
    ptr(0x0608, "T_64PHRESULT", "long"),
    ptr(0x0676, "T_64PINT8", "long long"),
    ptr(0x0677, "T_64PUINT8", "unsigned long long"),
    // 基本型
    base(0x0030, "T_BOOL08", "unsigned char"),
    base(0x0010, "T_CHAR", "char"),
    base(0x0068, "T_INT1", "char"),
    base(0x0069, "T_UINT1", "unsigned char"),
    base(0x0072, "T_INT2", "short"),
    base(0x0073, "T_UINT2", "unsigned short"),
    base(0x0074, "T_INT4", "long"),
    base(0x0076, "T_INT8", "long long"),
    base(0x0012, "T_LONG", "long"),
    base(0x0013, "T_QUAD", "long long"),
    base(0x0070, "T_RCHAR", "unsigned char"),
    base(0x0040, "T_REAL32", "float"),
    base(0x0041, "T_REAL64", "double"),
    base(0x0042, "T_REAL80", "long double"),
    base(0x0011, "T_SHORT", "short"),
    base(0x0020, "T_UCHAR", "unsigned char"),
    base(0x0075, "T_UINT4", "unsigned long"),
    base(0x0077, "T_UINT8", "unsigned long long"),
    base(0x0022, "T_ULONG", "unsigned long"),
    base(0x0023, "T_UQUAD", "unsigned long long"),
    base(0x0021, "T_USHORT", "unsigned short"),
    base(0x0003, "T_VOID", "Void"),
    base(0x0071, "T_WCHAR", "UnicodeString"),
    base(0x0008, "T_HRESULT", "long"),
];

/// タグからテーブルのエントリを検索する
pub fn find_primitive(tag: u32) -> Option<&'static PrimitiveEntry> {
    PRIMITIVE_TYPES.iter().find(|entry| entry.tag == tag)
}

/// タグをデコードする
///
/// テーブルにないタグは語彙の不足を意味するため、エラーとして変換全体を中断させます。
pub fn lookup_primitive(tag: u32) -> Result<Primitive> {
    find_primitive(tag)
        .map(|entry| entry.primitive)
        .ok_or_else(|| PdbError::UnsupportedTypeTag { tag }.into())
}
