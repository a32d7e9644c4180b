//! 整体肺密度统计报告.
//!
//! 报告覆盖整个 3D 数据: 全肺 HU 直方图、LAA/HAA 比值与肺体积.
//! 整个标注中不存在肺体素时无法给出有意义的整体统计, 构建直接失败.

use crate::consts::{HU_DISPLAY_RANGE, REPORT_BIN_COUNT};
use crate::data::{CtScan, LungMask, NiftiHeaderAttr};
use crate::density::{self, DensityBand, DensityError};
use crate::histogram::HuHistogram;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        pub(crate) mod plot;
    }
}

/// 整体肺密度统计报告.
///
/// 该对象是只读的统计结果, 与展示后端无关;
/// 在 `plot` feature 下可通过 [`crate::ImgDisplay`] 渲染为柱状图.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct DensityReport {
    histogram: HuHistogram,
    laa: DensityBand,
    haa: DensityBand,
    laa_ratio: f64,
    haa_ratio: f64,
    lung_ml: f64,
}

impl DensityReport {
    /// 在整个 3D 数据上构建统计报告.
    ///
    /// 直方图覆盖 \[-1024, 0\] HU, 150 个 bin; 两个比值分别对应
    /// `laa` 和 `haa` 密度带.
    pub fn build(
        scan: &CtScan,
        mask: &LungMask,
        laa: DensityBand,
        haa: DensityBand,
    ) -> Result<Self, DensityError> {
        let laa_ratio = density::band_ratio(scan, mask, laa)?;
        let haa_ratio = density::band_ratio(scan, mask, haa)?;

        let voxels = density::lung_voxels(scan, mask)?;
        // band_ratio 已保证存在肺体素.
        debug_assert!(!voxels.is_empty());

        // 常量参数合法, 该操作不会生成 `Err`, 可直接 unwrap.
        let histogram =
            HuHistogram::new(voxels.iter().copied(), REPORT_BIN_COUNT, HU_DISPLAY_RANGE).unwrap();

        let lung_ml = voxels.len() as f64 * scan.voxel() / 1000.0;

        Ok(Self {
            histogram,
            laa,
            haa,
            laa_ratio,
            haa_ratio,
            lung_ml,
        })
    }

    /// 全肺 HU 直方图.
    #[inline]
    pub fn histogram(&self) -> &HuHistogram {
        &self.histogram
    }

    /// LAA 密度带.
    #[inline]
    pub fn laa_band(&self) -> DensityBand {
        self.laa
    }

    /// HAA 密度带.
    #[inline]
    pub fn haa_band(&self) -> DensityBand {
        self.haa
    }

    /// LAA 比值.
    #[inline]
    pub fn laa_ratio(&self) -> f64 {
        self.laa_ratio
    }

    /// HAA 比值.
    #[inline]
    pub fn haa_ratio(&self) -> f64 {
        self.haa_ratio
    }

    /// 肺体积, 以毫升为单位. 由肺体素个数与 header 体素分辨率算得.
    #[inline]
    pub fn lung_volume_ml(&self) -> f64 {
        self.lung_ml
    }

    /// 图表注释文本: 两个比值保留 4 位小数.
    pub fn note(&self) -> String {
        format!(
            "LAA ratio: {:.4}\nHAA ratio: {:.4}",
            self.laa_ratio, self.haa_ratio
        )
    }
}

#[cfg(test)]
mod tests {
    use super::DensityReport;
    use crate::consts::REPORT_BIN_COUNT;
    use crate::density::{DensityBand, DensityError};
    use crate::{CtScan, LungMask};
    use ndarray::Array3;

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_report_uniform_volume() {
        // (z, h, w) = (3, 4, 4), 全 -975 HU, 全肺.
        let scan = CtScan::fake(Array3::from_elem((4, 4, 3), -975.0), [1.0, 1.0, 1.0]);
        let mask = LungMask::fake(Array3::from_elem((4, 4, 3), 1), [1.0, 1.0, 1.0]);

        let report = DensityReport::build(
            &scan,
            &mask,
            DensityBand::laa_default(),
            DensityBand::haa_default(),
        )
        .unwrap();

        assert!(float_eq(report.laa_ratio(), 1.0));
        assert!(float_eq(report.haa_ratio(), 0.0));
        assert_eq!(report.histogram().bin_count(), REPORT_BIN_COUNT);
        assert_eq!(report.histogram().total(), 48);
        // 48 个 1 立方毫米体素.
        assert!(float_eq(report.lung_volume_ml(), 0.048));

        let note = report.note();
        assert!(note.contains("LAA ratio: 1.0000"));
        assert!(note.contains("HAA ratio: 0.0000"));
    }

    #[test]
    fn test_report_empty_lung_is_fatal() {
        let scan = CtScan::fake(Array3::from_elem((4, 4, 3), -975.0), [1.0, 1.0, 1.0]);
        let mask = LungMask::fake(Array3::zeros((4, 4, 3)), [1.0, 1.0, 1.0]);

        let err = DensityReport::build(
            &scan,
            &mask,
            DensityBand::laa_default(),
            DensityBand::haa_default(),
        )
        .unwrap_err();
        assert_eq!(err, DensityError::EmptyLungRegion);
    }
}
