//! MSVC装飾名の簡易デマングル
//!
//! 完全なデマングラではなく、プロトタイプや引数を捨てて識別子だけを取り出します。
//! ルールは順に試され、最初にマッチしたものが使われます。
//!
//! 参考: <http://www.kegel.com/mangle.html>

use crate::Result;
use regex::{Captures, Regex};

/// 文字列リテラル（`??_C@`）のエスケープトークン
const STRING_ESCAPES: &[(&str, &str)] = &[
    ("?0", ","),
    ("?1", "/"),
    ("?2", r"\\"),
    ("?4", "."),
    ("?3", ":"),
    // 実際は空白
    ("?5", "_"),
    // 実際は改行
    ("?6", "."),
    ("?7", "\""),
    ("?8", "'"),
    ("?9", "-"),
    ("?$AA", ""),
    // 実際はCR
    ("?$AN", ""),
    ("?$CF", "%"),
    ("?$EA", "@"),
    ("?$CD", "#"),
    ("?$CG", "&"),
    ("?$HO", "~"),
    ("?$CI", "("),
    ("?$CJ", ")"),
    ("?$DM1", "</"),
    ("?$DMO", ">"),
    ("?$DN", "="),
    ("?$CK", "*"),
    ("?$CB", "!"),
];

/// 文字列リテラルの装飾プレフィックス
const STRING_LITERAL_PREFIX: &str = "??_C@";

/// VC++装飾名のデマングラ
pub struct Demangler {
    /// `_name@N` / `@name@N`（__cdecl / __stdcall / __fastcall、スタックサイズ付き）
    x86_call_pattern: Regex,
    /// `?name@...`（C++関数）
    cpp_function_pattern: Regex,
    /// 文字列リテラル内のエスケープトークン
    string_escape_pattern: Regex,
}

impl Demangler {
    /// デマングラを作成する
    pub fn new() -> Result<Self> {
        // 例: _KeBugCheckEx@20, @ExfInterlockedPopEntryList@8
        let x86_call_pattern = Regex::new(r"^[_@]([A-Za-z0-9_]+)@(\d{1,3})$")?;

        // 例: ?KeBugCheck@@YAXK@Z
        let cpp_function_pattern = Regex::new(r"^\?([A-Za-z0-9_]+)@")?;

        let alternatives: Vec<String> = STRING_ESCAPES
            .iter()
            .map(|(token, _)| regex::escape(token))
            .collect();
        let string_escape_pattern = Regex::new(&alternatives.join("|"))?;

        Ok(Self {
            x86_call_pattern,
            cpp_function_pattern,
            string_escape_pattern,
        })
    }

    /// 装飾名を簡易デマングルする
    ///
    /// # Examples
    /// ```
    /// use pdbprof_pdb::Demangler;
    ///
    /// let demangler = Demangler::new().unwrap();
    /// assert_eq!(demangler.demangle("?Bar@@YAHXZ"), "Bar");
    /// assert_eq!(demangler.demangle("_Baz@4"), "Baz");
    /// ```
    pub fn demangle(&self, name: &str) -> String {
        self.strip_x86_call(name)
            .or_else(|| self.strip_cpp_function(name))
            .or_else(|| strip_leading_marker(name))
            .or_else(|| self.unpack_string_literal(name))
            .unwrap_or_else(|| name.to_string())
    }

    /// スタックサイズ付きのx86呼び出し規約
    ///
    /// この形式が現れるPDBは32ビットと判断できますが、ここでは名前だけを返します。
    fn strip_x86_call(&self, name: &str) -> Option<String> {
        self.x86_call_pattern
            .captures(name)
            .map(|caps| caps[1].to_string())
    }

    /// C++の装飾関数名
    fn strip_cpp_function(&self, name: &str) -> Option<String> {
        self.cpp_function_pattern
            .captures(name)
            .map(|caps| caps[1].to_string())
    }

    /// 文字列リテラルを `str:<内容>` に展開する
    fn unpack_string_literal(&self, name: &str) -> Option<String> {
        if !name.starts_with(STRING_LITERAL_PREFIX) {
            return None;
        }

        let encoded = name.split('@').nth(3)?;
        let decoded = self
            .string_escape_pattern
            .replace_all(encoded, |caps: &Captures| {
                STRING_ESCAPES
                    .iter()
                    .find(|(token, _)| *token == &caps[0])
                    .map(|(_, literal)| *literal)
                    .unwrap_or_default()
            });
        Some(format!("str:{}", decoded))
    }
}

impl Default for Demangler {
    fn default() -> Self {
        Self::new().expect("Failed to create Demangler")
    }
}

/// 先頭の `_` または `.` を1文字だけ取り除く
///
/// i386の定数には先頭に `_` が付きますが、AMD64では付きません。
fn strip_leading_marker(name: &str) -> Option<String> {
    name.strip_prefix(&['_', '.'][..]).map(str::to_string)
}
