//! 肺密度带分类与比值统计.
//!
//! LAA (low-attenuation area, 低衰减区) 与肺气肿相关;
//! HAA (high-attenuation area, 高衰减区) 与纤维化/炎症相关.
//! 两个密度带相互独立, 允许重叠; 重叠语义由调用方负责.

use crate::consts::label::is_lung;
use crate::data::{CtScan, LungMask, MaskSlice, NiftiHeaderAttr, ScanSlice};
use crate::Idx3d;
use ndarray::{Array3, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 密度带: HU 阈值闭区间 \[low, high\].
///
/// 该对象是只读的, 并且构造时即保证 `low <= high` 且两端有限.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DensityBand {
    low: f32,
    high: f32,
}

/// 非法密度带: `low > high` 或存在非有限端点.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InvalidBand {
    /// 尝试构造时的下界.
    pub low: f32,

    /// 尝试构造时的上界.
    pub high: f32,
}

impl DensityBand {
    /// 构建密度带.
    ///
    /// `low` 和 `high` 必须都是有限值且 `low <= high`, 否则返回 `Err`.
    /// 在配置阶段完成该检查, 下游的分类与重绘路径不再需要校验.
    pub fn new(low: f32, high: f32) -> Result<Self, InvalidBand> {
        if low.is_finite() && high.is_finite() && low <= high {
            Ok(Self { low, high })
        } else {
            Err(InvalidBand { low, high })
        }
    }

    /// LAA 密度带默认值: \[-1024, -950\] HU.
    #[inline]
    pub const fn laa_default() -> Self {
        Self {
            low: -1024.0,
            high: -950.0,
        }
    }

    /// HAA 密度带默认值: \[-700, -200\] HU.
    #[inline]
    pub const fn haa_default() -> Self {
        Self {
            low: -700.0,
            high: -200.0,
        }
    }

    /// 密度带下界.
    #[inline]
    pub fn low(&self) -> f32 {
        self.low
    }

    /// 密度带上界.
    #[inline]
    pub fn high(&self) -> f32 {
        self.high
    }

    /// 判断 `hu` 是否落在密度带内. 区间两端均为闭.
    #[inline]
    pub fn contains(&self, hu: f32) -> bool {
        self.low <= hu && hu <= self.high
    }
}

/// 密度统计的运行时错误.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DensityError {
    /// 扫描与标注的数据形状不一致. 两个字段分别为扫描和标注的形状.
    ShapeMismatch(Idx3d, Idx3d),

    /// 整个 3D 标注中不存在肺体素, 比值无定义.
    EmptyLungRegion,
}

/// 单个密度带在 3D 数据上的分类结果.
#[derive(Debug, Clone)]
pub struct BandClassification {
    /// 体素级布尔隶属关系: 该体素属于肺 **且** HU 值落在密度带内.
    pub membership: Array3<bool>,

    /// 密度带覆盖的肺体素占全部肺体素的比例, 取值于 \[0, 1\].
    pub ratio: f64,
}

/// 校验扫描与标注形状一致. 任何统计操作开始前都必须通过该检查.
#[inline]
fn check_shape(scan: &CtScan, mask: &LungMask) -> Result<(), DensityError> {
    if scan.shape() != mask.shape() {
        return Err(DensityError::ShapeMismatch(scan.shape(), mask.shape()));
    }
    Ok(())
}

/// 对整个 3D 数据做密度带分类.
///
/// 返回体素级布尔隶属关系与密度带比值. 该操作无副作用、确定,
/// 且可以用不同的密度带在同一对数据上反复调用.
pub fn classify(
    scan: &CtScan,
    mask: &LungMask,
    band: DensityBand,
) -> Result<BandClassification, DensityError> {
    check_shape(scan, mask)?;

    let membership = Zip::from(scan.data())
        .and(mask.data())
        .map_collect(|&hu, &label| is_lung(label) && band.contains(hu));

    let lung = mask.data().iter().filter(|&&l| is_lung(l)).count();
    if lung == 0 {
        return Err(DensityError::EmptyLungRegion);
    }
    let hits = membership.iter().filter(|&&m| m).count();

    Ok(BandClassification {
        membership,
        ratio: hits as f64 / lung as f64,
    })
}

/// 计算密度带比值, 不物化体素级隶属关系.
///
/// 与 [`classify`] 得到的比值一致, 但只做一次计数遍历.
pub fn band_ratio(scan: &CtScan, mask: &LungMask, band: DensityBand) -> Result<f64, DensityError> {
    check_shape(scan, mask)?;

    let mut lung = 0u64;
    let mut hits = 0u64;
    Zip::from(scan.data()).and(mask.data()).for_each(|&hu, &label| {
        if is_lung(label) {
            lung += 1;
            if band.contains(hu) {
                hits += 1;
            }
        }
    });

    if lung == 0 {
        return Err(DensityError::EmptyLungRegion);
    }
    Ok(hits as f64 / lung as f64)
}

/// 提取整个 3D 数据的所有肺体素 HU 值, 按行优先序存储.
///
/// 不存在肺体素时返回空 `Vec` (整体统计是否视其为致命错误由调用方决定).
pub fn lung_voxels(scan: &CtScan, mask: &LungMask) -> Result<Vec<f32>, DensityError> {
    check_shape(scan, mask)?;

    let mut ans = Vec::new();
    Zip::from(scan.data()).and(mask.data()).for_each(|&hu, &label| {
        if is_lung(label) {
            ans.push(hu);
        }
    });
    Ok(ans)
}

/// 提取单个水平切片的所有肺像素 HU 值, 按行优先序存储.
///
/// 两个切片必须来自同一对 (扫描, 标注) 数据, 否则程序 panic.
pub fn lung_voxels_2d(scan: &ScanSlice, mask: &MaskSlice) -> Vec<f32> {
    assert_eq!(scan.shape(), mask.shape(), "扫描与标注切片形状不一致");

    scan.iter()
        .zip(mask.iter())
        .filter_map(|(&hu, &label)| is_lung(label).then_some(hu))
        .collect()
}

/// 在给定的肺体素集合上计算密度带比值.
///
/// 集合为空时返回 `None`: 单切片上没有肺组织是预期中可恢复的状态,
/// 与整体统计的 [`DensityError::EmptyLungRegion`] 不同.
pub fn voxels_band_ratio(voxels: &[f32], band: DensityBand) -> Option<f64> {
    if voxels.is_empty() {
        return None;
    }
    let hits = voxels.iter().filter(|&&hu| band.contains(hu)).count();
    Some(hits as f64 / voxels.len() as f64)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use ndarray::Axis;
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
        use std::sync::atomic::{AtomicU64, Ordering};
    }
}

/// 借助 `rayon`, 按水平切片并行地计算密度带比值.
/// 结果与 [`band_ratio`] 一致.
#[cfg(feature = "rayon")]
pub fn par_band_ratio(
    scan: &CtScan,
    mask: &LungMask,
    band: DensityBand,
) -> Result<f64, DensityError> {
    check_shape(scan, mask)?;

    let lung = AtomicU64::new(0);
    let hits = AtomicU64::new(0);
    scan.data()
        .axis_iter(Axis(0))
        .into_par_iter()
        .zip(mask.data().axis_iter(Axis(0)))
        .for_each(|(s, m)| {
            let mut local_lung = 0u64;
            let mut local_hits = 0u64;
            for (&hu, &label) in s.iter().zip(m.iter()) {
                if is_lung(label) {
                    local_lung += 1;
                    if band.contains(hu) {
                        local_hits += 1;
                    }
                }
            }
            lung.fetch_add(local_lung, Ordering::Release);
            hits.fetch_add(local_hits, Ordering::Release);
        });

    let lung = lung.load(Ordering::Acquire);
    if lung == 0 {
        return Err(DensityError::EmptyLungRegion);
    }
    Ok(hits.load(Ordering::Acquire) as f64 / lung as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn float_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    /// (z, h, w) = (3, 4, 4), 全 -975 HU, 标注全为右肺.
    fn uniform_pair() -> (CtScan, LungMask) {
        let scan = CtScan::fake(Array3::from_elem((4, 4, 3), -975.0), [1.0, 1.0, 1.0]);
        let mask = LungMask::fake(Array3::from_elem((4, 4, 3), 1), [1.0, 1.0, 1.0]);
        (scan, mask)
    }

    #[test]
    fn test_band_init() {
        assert!(DensityBand::new(-1024.0, -950.0).is_ok());
        // 单点区间合法.
        assert!(DensityBand::new(-950.0, -950.0).is_ok());

        let err = DensityBand::new(-200.0, -700.0).unwrap_err();
        assert_eq!(
            err,
            InvalidBand {
                low: -200.0,
                high: -700.0
            }
        );
        assert!(DensityBand::new(f32::NAN, 0.0).is_err());
        assert!(DensityBand::new(f32::NEG_INFINITY, 0.0).is_err());
    }

    #[test]
    fn test_band_contains_closed() {
        let band = DensityBand::new(-700.0, -200.0).unwrap();
        assert!(band.contains(-700.0));
        assert!(band.contains(-200.0));
        assert!(band.contains(-350.0));
        assert!(!band.contains(-700.1));
        assert!(!band.contains(-199.9));
    }

    #[test]
    fn test_lung_membership() {
        // 体素属于肺当且仅当标注值为 1 或 2.
        let scan = CtScan::fake(Array3::from_elem((2, 2, 1), -975.0), [1.0, 1.0, 1.0]);
        let mut raw = Array3::<u8>::zeros((2, 2, 1));
        raw[(0, 0, 0)] = 1;
        raw[(1, 0, 0)] = 2;
        raw[(0, 1, 0)] = 3; // 语义之外的标注值, 不属于肺.
        let mask = LungMask::fake(raw, [1.0, 1.0, 1.0]);

        let full = classify(&scan, &mask, DensityBand::new(-1024.0, 0.0).unwrap()).unwrap();
        assert_eq!(full.membership.iter().filter(|&&m| m).count(), 2);
        assert!(float_eq(full.ratio, 1.0));

        let voxels = lung_voxels(&scan, &mask).unwrap();
        assert_eq!(voxels.len(), 2);
    }

    #[test]
    fn test_uniform_ratios() {
        let (scan, mask) = uniform_pair();

        let laa = band_ratio(&scan, &mask, DensityBand::laa_default()).unwrap();
        let haa = band_ratio(&scan, &mask, DensityBand::haa_default()).unwrap();
        assert!(float_eq(laa, 1.0));
        assert!(float_eq(haa, 0.0));

        // classify 与 band_ratio 的比值一致.
        let cls = classify(&scan, &mask, DensityBand::laa_default()).unwrap();
        assert!(float_eq(cls.ratio, laa));
        assert!(cls.membership.iter().all(|&m| m));
    }

    #[test]
    fn test_ratio_bounds_and_monotonicity() {
        // 混合密度数据: -1000, -900, ..., -100.
        let mut raw = Array3::<f32>::zeros((2, 5, 1));
        for (i, v) in raw.iter_mut().enumerate() {
            *v = -1000.0 + (i as f32) * 100.0;
        }
        let scan = CtScan::fake(raw, [1.0, 1.0, 1.0]);
        let mask = LungMask::fake(Array3::from_elem((2, 5, 1), 2), [1.0, 1.0, 1.0]);

        // 密度带逐步加宽, 比值单调不减且始终落在 [0, 1].
        let mut prev = 0.0;
        for high in [-1000.0f32, -800.0, -600.0, -400.0, -200.0, 0.0] {
            let band = DensityBand::new(-1024.0, high).unwrap();
            let r = band_ratio(&scan, &mask, band).unwrap();
            assert!((0.0..=1.0).contains(&r));
            assert!(r >= prev);
            prev = r;
        }
        assert!(float_eq(prev, 1.0));
    }

    #[test]
    fn test_empty_lung_region() {
        let scan = CtScan::fake(Array3::from_elem((2, 2, 2), -500.0), [1.0, 1.0, 1.0]);
        let mask = LungMask::fake(Array3::zeros((2, 2, 2)), [1.0, 1.0, 1.0]);

        let band = DensityBand::laa_default();
        assert_eq!(
            band_ratio(&scan, &mask, band).unwrap_err(),
            DensityError::EmptyLungRegion
        );
        assert_eq!(
            classify(&scan, &mask, band).unwrap_err(),
            DensityError::EmptyLungRegion
        );
        // 体素提取本身不报错, 交由调用方裁决.
        assert!(lung_voxels(&scan, &mask).unwrap().is_empty());
    }

    #[test]
    fn test_shape_mismatch() {
        let scan = CtScan::fake(Array3::from_elem((2, 2, 2), -500.0), [1.0, 1.0, 1.0]);
        let mask = LungMask::fake(Array3::from_elem((2, 2, 3), 1), [1.0, 1.0, 1.0]);

        let err = band_ratio(&scan, &mask, DensityBand::laa_default()).unwrap_err();
        assert_eq!(err, DensityError::ShapeMismatch((2, 2, 2), (3, 2, 2)));
    }

    #[test]
    fn test_slice_level_statistics() {
        let (scan, mask) = uniform_pair();
        let voxels = lung_voxels_2d(&scan.slice_at(0), &mask.slice_at(0));
        assert_eq!(voxels.len(), 16);

        assert_eq!(
            voxels_band_ratio(&voxels, DensityBand::laa_default()),
            Some(1.0)
        );
        assert_eq!(
            voxels_band_ratio(&voxels, DensityBand::haa_default()),
            Some(0.0)
        );
        assert_eq!(voxels_band_ratio(&[], DensityBand::laa_default()), None);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn test_par_band_ratio_matches_serial() {
        let (scan, mask) = uniform_pair();
        for band in [DensityBand::laa_default(), DensityBand::haa_default()] {
            let serial = band_ratio(&scan, &mask, band).unwrap();
            let parallel = par_band_ratio(&scan, &mask, band).unwrap();
            assert!(float_eq(serial, parallel));
        }
    }
}
