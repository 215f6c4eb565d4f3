//! 変換オプション

use crate::errors::ERR_READ_BINARY;
use crate::profile::ProfileExtras;
use crate::Result;
use anyhow::Context;
use pdbprof_pdb::PeImage;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// プロファイル変換のオプション
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileOptions {
    /// 対応するバイナリの元のパス（そのまま `$EXTRAS.DLLPath` に出力）
    pub dll_origin_path: Option<String>,
    /// 対応するバイナリのローカルコピー
    pub dll_path: Option<PathBuf>,
    /// 対応するバイナリの識別ハッシュ
    pub dll_symstore_hash: Option<String>,
}

impl ProfileOptions {
    /// `$EXTRAS` セクションを組み立てる
    ///
    /// `dll_path` があればImageBaseを読み取り、識別ハッシュが指定されていなければ
    /// CodeViewレコードから計算します。
    pub fn extras(&self) -> Result<ProfileExtras> {
        let mut extras = ProfileExtras {
            dll_path: self.dll_origin_path.clone(),
            dll_guid_age: self.dll_symstore_hash.clone(),
            image_base: None,
        };

        let Some(path) = &self.dll_path else {
            return Ok(extras);
        };

        let data = fs::read(path).with_context(|| format!("{} {:?}", ERR_READ_BINARY, path))?;
        let image = PeImage::parse(&data)?;
        let image_base = image.image_base()?;
        debug!("{:?}: ImageBase 0x{:x}", path, image_base);
        extras.image_base = Some(format!("{:#x}", image_base));

        if extras.dll_guid_age.is_none() {
            match image.codeview() {
                Ok(codeview) => extras.dll_guid_age = Some(codeview.symstore_hash()),
                Err(e) => warn!("{:?}: {}", path, e),
            }
        }

        Ok(extras)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extras_without_binary() {
        let options = ProfileOptions {
            dll_origin_path: Some(r"\SystemRoot\system32\ntoskrnl.exe".to_string()),
            dll_symstore_hash: Some("ABCDEF1".to_string()),
            ..ProfileOptions::default()
        };

        let extras = options.extras().unwrap();
        assert_eq!(extras.dll_path.as_deref(), Some(r"\SystemRoot\system32\ntoskrnl.exe"));
        assert_eq!(extras.dll_guid_age.as_deref(), Some("ABCDEF1"));
        assert_eq!(extras.image_base, None);
    }

    #[test]
    fn test_default_options_have_no_extras() {
        assert!(ProfileOptions::default().extras().unwrap().is_empty());
    }

    #[test]
    fn test_missing_binary_is_an_error() {
        let options = ProfileOptions {
            dll_path: Some(PathBuf::from("/nonexistent/pdbprof/ntoskrnl.exe")),
            ..ProfileOptions::default()
        };
        let err = options.extras().unwrap_err();
        assert!(err.to_string().starts_with(ERR_READ_BINARY));
    }
}
