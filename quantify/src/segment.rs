//! 外部肺分割服务.

use ct_lung::{CtScan, LungMask};
use std::env;
use std::path::PathBuf;
use std::process::Command;

/// 肺分割服务: 接受扫描 (含空间元信息), 产出同形状的肺部标注.
///
/// 标注语义为 0 = 背景, 1 = 右肺, 2 = 左肺. 服务以 trait 对象注入管线,
/// 便于在测试中使用替身实现; 句柄是长生命周期的, 管线全程只创建一次.
pub trait LungSegmenter {
    /// 对 `scan` 做肺分割. 阻塞直至完成.
    fn segment(&self, scan: &CtScan) -> Result<LungMask, SegmentError>;
}

/// 分割服务错误.
#[derive(Debug)]
pub enum SegmentError {
    /// 底层 I/O 错误.
    Io(std::io::Error),

    /// 临时 nii 文件读写错误.
    Nifti(nifti::NiftiError),

    /// 分割引擎退出状态非零. `(引擎程序, 退出码)`.
    Engine(PathBuf, Option<i32>),
}

/// 通过外部 `lungmask` 命令行工具实现的分割服务.
///
/// 输入扫描被写入临时 nii 文件, 引擎写出的标注文件被读回内存.
pub struct LungmaskCli {
    program: PathBuf,
}

impl LungmaskCli {
    /// 从 `$LUNGMASK_BIN` 构建, 未设置时使用 `PATH` 中的 `lungmask`.
    pub fn from_env() -> Self {
        let program = env::var_os("LUNGMASK_BIN")
            .map_or_else(|| PathBuf::from("lungmask"), PathBuf::from);
        Self { program }
    }
}

impl LungSegmenter for LungmaskCli {
    fn segment(&self, scan: &CtScan) -> Result<LungMask, SegmentError> {
        let mut dir = env::temp_dir();
        dir.push(format!("ct-lung-seg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).map_err(SegmentError::Io)?;
        let scan_path = dir.join("scan.nii");
        let mask_path = dir.join("mask.nii");

        scan.save(&scan_path).map_err(SegmentError::Nifti)?;

        let status = Command::new(&self.program)
            .arg(&scan_path)
            .arg(&mask_path)
            .status()
            .map_err(SegmentError::Io)?;
        if !status.success() {
            return Err(SegmentError::Engine(self.program.clone(), status.code()));
        }

        let mask = LungMask::open(&mask_path).map_err(SegmentError::Nifti)?;

        // 清理临时文件. 失败不影响结果.
        let _ = std::fs::remove_dir_all(&dir);

        Ok(mask)
    }
}
