//! 运行配置.

use ct_lung::density::{DensityBand, InvalidBand};
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// 配置错误.
#[derive(Debug)]
pub enum ConfigError {
    /// 缺少扫描文件路径参数.
    MissingScanPath,

    /// 环境变量中的密度带无法解析. `(变量名, 原始值)`.
    BadBandSyntax(&'static str, String),

    /// 环境变量中的密度带数值非法.
    BadBand(&'static str, InvalidBand),
}

/// 一次管线运行的完整配置.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// 输入扫描文件路径.
    pub scan_path: PathBuf,

    /// 标注输出文件路径.
    pub mask_path: PathBuf,

    /// LAA 密度带.
    pub laa: DensityBand,

    /// HAA 密度带.
    pub haa: DensityBand,
}

impl RunConfig {
    /// 从命令行参数与环境变量构建运行配置.
    ///
    /// 1. 第一个位置参数为扫描文件路径 (必需);
    /// 2. 第二个位置参数为标注输出路径, 缺省为扫描文件同级
    ///   `mask` 目录下的同名文件;
    /// 3. `$LUNG_LAA_BOUND` / `$LUNG_HAA_BOUND` 形如 `low,high`,
    ///   可覆盖默认密度带.
    pub fn from_env_args<I: Iterator<Item = String>>(mut args: I) -> Result<Self, ConfigError> {
        let _program = args.next();
        let scan_path = PathBuf::from(args.next().ok_or(ConfigError::MissingScanPath)?);
        let mask_path = match args.next() {
            Some(p) => PathBuf::from(p),
            None => default_mask_path(&scan_path),
        };

        let laa = band_from_env("LUNG_LAA_BOUND", DensityBand::laa_default())?;
        let haa = band_from_env("LUNG_HAA_BOUND", DensityBand::haa_default())?;

        Ok(Self {
            scan_path,
            mask_path,
            laa,
            haa,
        })
    }
}

/// 缺省的标注输出路径: 扫描文件同级的 `mask` 目录下的同名文件.
fn default_mask_path(scan: &Path) -> PathBuf {
    let mut ans = scan.parent().map(Path::to_owned).unwrap_or_default();
    ans.push("mask");
    ans.push(scan.file_name().unwrap_or(OsStr::new("mask.nii")));
    ans
}

/// 解析 `low,high` 形式的密度带文本.
fn parse_band(raw: &str) -> Option<(f32, f32)> {
    let (lo, hi) = raw.split_once(',')?;
    Some((lo.trim().parse().ok()?, hi.trim().parse().ok()?))
}

/// 从环境变量 `var` 读取密度带, 未设置时返回 `default`.
fn band_from_env(var: &'static str, default: DensityBand) -> Result<DensityBand, ConfigError> {
    let Ok(raw) = env::var(var) else {
        return Ok(default);
    };
    let Some((low, high)) = parse_band(&raw) else {
        return Err(ConfigError::BadBandSyntax(var, raw));
    };
    DensityBand::new(low, high).map_err(|e| ConfigError::BadBand(var, e))
}

#[cfg(test)]
mod tests {
    use super::{default_mask_path, parse_band};
    use std::path::{Path, PathBuf};

    #[test]
    fn test_default_mask_path() {
        assert_eq!(
            default_mask_path(Path::new("./data/patient1_1.nii.gz")),
            PathBuf::from("./data/mask/patient1_1.nii.gz")
        );
        assert_eq!(
            default_mask_path(Path::new("scan.nii")),
            PathBuf::from("mask/scan.nii")
        );
    }

    #[test]
    fn test_parse_band() {
        assert_eq!(parse_band("-1024,-950"), Some((-1024.0, -950.0)));
        assert_eq!(parse_band(" -700 , -200 "), Some((-700.0, -200.0)));
        assert_eq!(parse_band("-700"), None);
        assert_eq!(parse_band("a,b"), None);
    }
}
