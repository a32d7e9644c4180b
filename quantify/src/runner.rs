//! 管线执行.
//!
//! 顺序: 读取扫描 -> 分割 -> 持久化标注 -> 从硬盘重新读取成对数据 ->
//! 整体统计报告 -> 交互式切片查看器. 任一阶段失败即中止,
//! 不做重试或部分恢复 (单次批处理语义).

use crate::config::RunConfig;
use crate::segment::{LungSegmenter, SegmentError};
use ct_lung::density::DensityError;
use ct_lung::report::DensityReport;
use ct_lung::{CtScan, LungData3d, OpenDataError};
use std::path::PathBuf;

/// 管线运行时错误. 每个阶段一个变体, 携带出错的文件路径.
#[derive(Debug)]
pub enum PipelineError {
    /// 打开扫描文件失败.
    LoadScan(PathBuf, nifti::NiftiError),

    /// 分割服务失败. 路径为输入扫描.
    Segment(PathBuf, SegmentError),

    /// 创建标注输出目录失败.
    CreateMaskDir(PathBuf, std::io::Error),

    /// 持久化标注失败.
    SaveMask(PathBuf, nifti::NiftiError),

    /// 重新读取持久化数据失败. `(扫描路径, 标注路径, 原因)`.
    Reload(PathBuf, PathBuf, OpenDataError),

    /// 整体统计失败.
    Report(DensityError),

    /// 交互查看器失败.
    #[cfg(feature = "plot")]
    Viewer(String),
}

/// 读取、分割、持久化并重新读取数据. 这是管线中可无头运行的部分.
///
/// 标注先写入硬盘、再与扫描一起重新读取:
/// 下游统计必须基于持久化产物, 而不是内存中的分割结果.
pub(crate) fn prepare(
    cfg: &RunConfig,
    segmenter: &dyn LungSegmenter,
) -> Result<LungData3d, PipelineError> {
    log::info!("读取扫描: {}", cfg.scan_path.display());
    let scan = CtScan::open(&cfg.scan_path)
        .map_err(|e| PipelineError::LoadScan(cfg.scan_path.clone(), e))?;

    log::info!("运行肺分割...");
    let mask = segmenter
        .segment(&scan)
        .map_err(|e| PipelineError::Segment(cfg.scan_path.clone(), e))?;

    if let Some(parent) = cfg.mask_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PipelineError::CreateMaskDir(parent.to_owned(), e))?;
        }
    }
    mask.save(&cfg.mask_path)
        .map_err(|e| PipelineError::SaveMask(cfg.mask_path.clone(), e))?;
    log::info!("标注已写入: {}", cfg.mask_path.display());

    drop(mask);
    drop(scan);
    LungData3d::open(&cfg.scan_path, &cfg.mask_path)
        .map_err(|e| PipelineError::Reload(cfg.scan_path.clone(), cfg.mask_path.clone(), e))
}

/// 实际运行整条管线.
pub fn run(cfg: &RunConfig, segmenter: &dyn LungSegmenter) -> Result<(), PipelineError> {
    let data = prepare(cfg, segmenter)?;

    let [bg, right, left] = data.mask.numeric_statistics();
    log::info!("标注统计: 背景 {bg}, 右肺 {right}, 左肺 {left}");

    let report = DensityReport::build(&data.scan, &data.mask, cfg.laa, cfg.haa)
        .map_err(PipelineError::Report)?;
    log::info!("肺体积: {:.1} mL", report.lung_volume_ml());
    log::info!("平均肺密度: {:.1} HU", data.scan.mean_hu(data.mask.lung_pos()));
    for line in report.note().lines() {
        log::info!("{line}");
    }

    #[cfg(feature = "plot")]
    {
        use ct_lung::ImgDisplay;

        report.show();
        ct_lung::viewer::run_viewer(&data, cfg.laa, cfg.haa)
            .map_err(|e| PipelineError::Viewer(e.to_string()))?;
    }

    #[cfg(not(feature = "plot"))]
    log::info!("未启用 `plot` feature, 跳过图表与交互式查看器.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{prepare, PipelineError};
    use crate::config::RunConfig;
    use crate::segment::{LungSegmenter, SegmentError};
    use ct_lung::density::DensityBand;
    use ct_lung::report::DensityReport;
    use ct_lung::{CtScan, LungMask, NiftiHeaderAttr};
    use ndarray::Array3;
    use std::path::PathBuf;

    /// 恒定输出整幅右肺标注的分割替身.
    struct FullLungSegmenter;

    impl LungSegmenter for FullLungSegmenter {
        fn segment(&self, scan: &CtScan) -> Result<LungMask, SegmentError> {
            let (z, h, w) = scan.shape();
            Ok(LungMask::from_reference(
                scan.header(),
                Array3::from_elem((z, h, w), 1),
            ))
        }
    }

    /// 恒定失败的分割替身.
    struct BrokenSegmenter;

    impl LungSegmenter for BrokenSegmenter {
        fn segment(&self, _scan: &CtScan) -> Result<LungMask, SegmentError> {
            Err(SegmentError::Engine(PathBuf::from("lungmask"), Some(1)))
        }
    }

    fn temp_config(tag: &str) -> RunConfig {
        let mut dir = std::env::temp_dir();
        dir.push(format!("ct-lung-runner-{}-{tag}", std::process::id()));
        RunConfig {
            scan_path: dir.join("scan.nii"),
            mask_path: dir.join("mask").join("scan.nii"),
            laa: DensityBand::laa_default(),
            haa: DensityBand::haa_default(),
        }
    }

    fn write_uniform_scan(cfg: &RunConfig) {
        std::fs::create_dir_all(cfg.scan_path.parent().unwrap()).unwrap();
        CtScan::fake(Array3::from_elem((4, 4, 3), -975.0), [1.0, 1.0, 1.0])
            .save(&cfg.scan_path)
            .unwrap();
    }

    fn cleanup(cfg: &RunConfig) {
        let _ = std::fs::remove_dir_all(cfg.scan_path.parent().unwrap());
    }

    #[test]
    fn test_prepare_persists_and_reloads() {
        let cfg = temp_config("ok");
        write_uniform_scan(&cfg);

        let data = prepare(&cfg, &FullLungSegmenter).unwrap();

        // 标注产物确实落盘, 重新读取后形状与统计正确.
        assert!(cfg.mask_path.is_file());
        assert_eq!(data.len_z(), 3);
        assert_eq!(data.mask.numeric_statistics(), [0, 48, 0]);

        let report =
            DensityReport::build(&data.scan, &data.mask, cfg.laa, cfg.haa).unwrap();
        assert!((report.laa_ratio() - 1.0).abs() < 1e-12);
        assert!(report.haa_ratio().abs() < 1e-12);

        cleanup(&cfg);
    }

    #[test]
    fn test_prepare_aborts_on_segment_failure() {
        let cfg = temp_config("broken");
        write_uniform_scan(&cfg);

        let err = prepare(&cfg, &BrokenSegmenter).unwrap_err();
        assert!(matches!(err, PipelineError::Segment(..)));
        // 失败即中止, 不产生部分结果.
        assert!(!cfg.mask_path.exists());

        cleanup(&cfg);
    }
}
