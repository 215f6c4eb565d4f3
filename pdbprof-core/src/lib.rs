//! pdbprof のコア機能
//!
//! このクレートは、PDBファイルからプロファイルを作成する処理を提供します。
//! PDBの読み込み、型テーブルとシンボルの処理、プロファイルの組み立てを統合します。

pub mod assembler;
pub mod errors;
pub mod options;
pub mod profile;

pub use assembler::{assemble, profile_class, ProfileAssembler};
pub use options::ProfileOptions;
pub use profile::{Profile, ProfileExtras, ProfileMetadata};

// 他のクレートから使用するために再エクスポート
pub use pdbprof_pdb::{CodeViewData, PdbError};

use anyhow::Context;
use pdbprof_pdb::{PdbLoader, PeImage};
use std::fs;
use std::path::Path;

/// コア機能の結果型
pub type Result<T> = anyhow::Result<T>;

/// PDBファイルからプロファイルを作成する
pub fn make_pdb_profile<P: AsRef<Path>>(path: P, options: &ProfileOptions) -> Result<Profile> {
    let path = path.as_ref();
    let info = PdbLoader::load(path)
        .with_context(|| format!("{} {:?}", errors::ERR_LOAD_PDB, path))?;

    let source_filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extras = options.extras()?;

    ProfileAssembler::new(&info).assemble(&source_filename, extras)
}

/// PEイメージのCodeViewレコードから元のPDBファイル名と識別ハッシュを取得する
///
/// CodeViewエントリがなければ [`PdbError::NoDebugInfo`] を返します。
pub fn pe_codeview_data<P: AsRef<Path>>(path: P) -> Result<CodeViewData> {
    let path = path.as_ref();
    let data =
        fs::read(path).with_context(|| format!("{} {:?}", errors::ERR_READ_BINARY, path))?;
    let image = PeImage::parse(&data)?;
    Ok(image.codeview()?.to_data())
}
