//! PEイメージからCodeViewデバッグ情報を取り出す
//!
//! デバッグディレクトリのCodeViewエントリ（RSDS形式）から、
//! 元のPDBファイル名と識別ハッシュを取得します。

use crate::error::PdbError;
use crate::identity::{make_symstore_hash, Guid};
use crate::Result;
use object::pe;
use object::read::pe::{ImageNtHeaders, ImageOptionalHeader, PeFile};
use object::read::CodeView;
use object::{FileKind, Object};
use serde::Serialize;
use tracing::debug;

/// CodeView RSDSレコード
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeViewInfo {
    /// リンク時のPDBパス
    pub filename: String,
    pub guid: Guid,
    pub age: u32,
}

impl CodeViewInfo {
    /// 識別ハッシュ
    pub fn symstore_hash(&self) -> String {
        make_symstore_hash(&self.guid, self.age)
    }

    /// 外部に渡す形式に変換する
    pub fn to_data(&self) -> CodeViewData {
        CodeViewData {
            filename: self.filename.clone(),
            symstore_hash: self.symstore_hash(),
        }
    }
}

impl From<&CodeView<'_>> for CodeViewInfo {
    fn from(codeview: &CodeView<'_>) -> Self {
        Self {
            filename: String::from_utf8_lossy(codeview.path()).into_owned(),
            guid: Guid::from_le_bytes(codeview.guid()),
            age: codeview.age(),
        }
    }
}

/// PDBを探すための情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeViewData {
    pub filename: String,
    pub symstore_hash: String,
}

/// PE32 / PE32+ イメージ
pub struct PeImage<'data> {
    data: &'data [u8],
    kind: FileKind,
}

impl<'data> PeImage<'data> {
    /// PEイメージとして解釈できるか確認する
    pub fn parse(data: &'data [u8]) -> Result<Self> {
        let kind = FileKind::parse(data).map_err(PdbError::from)?;
        match kind {
            FileKind::Pe32 | FileKind::Pe64 => Ok(Self { data, kind }),
            other => Err(anyhow::anyhow!("Not a PE image: {:?}", other)),
        }
    }

    /// 64ビットイメージかどうか
    pub fn is_64(&self) -> bool {
        self.kind == FileKind::Pe64
    }

    /// オプショナルヘッダのImageBase
    pub fn image_base(&self) -> Result<u64> {
        if self.is_64() {
            image_base_of::<pe::ImageNtHeaders64>(self.data)
        } else {
            image_base_of::<pe::ImageNtHeaders32>(self.data)
        }
    }

    /// CodeViewデバッグディレクトリエントリを探してデコードする
    ///
    /// RSDSエントリがなければ [`PdbError::NoDebugInfo`] を返します。
    pub fn codeview(&self) -> Result<CodeViewInfo> {
        if self.is_64() {
            codeview_of::<pe::ImageNtHeaders64>(self.data)
        } else {
            codeview_of::<pe::ImageNtHeaders32>(self.data)
        }
    }
}

fn image_base_of<Pe: ImageNtHeaders>(data: &[u8]) -> Result<u64> {
    let file = PeFile::<Pe>::parse(data).map_err(PdbError::from)?;
    Ok(file.nt_headers().optional_header().image_base())
}

fn codeview_of<Pe: ImageNtHeaders>(data: &[u8]) -> Result<CodeViewInfo> {
    let file = PeFile::<Pe>::parse(data).map_err(PdbError::from)?;
    let codeview = file
        .pdb_info()
        .map_err(PdbError::from)?
        .ok_or(PdbError::NoDebugInfo)?;

    let info = CodeViewInfo::from(&codeview);
    debug!("CodeView record {} (age {})", info.filename, info.age);
    Ok(info)
}
