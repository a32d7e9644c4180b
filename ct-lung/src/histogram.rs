//! 固定范围等宽直方图.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 初始化 [`HuHistogram`] 错误.
#[derive(Clone, Debug, PartialEq)]
pub enum InitHistogramError {
    /// bin 个数为 0.
    ZeroBins,

    /// 统计范围为空或非法. `(min, max)`.
    EmptyRange(f32, f32),
}

/// CT HU 值的固定范围等宽直方图.
///
/// 统计规则:
///
/// 1. bin 宽度为 `(max - min) / bin_count`, 第 `i` 个 bin 覆盖
///   `[edge_i, edge_{i+1})`, 最后一个 bin 两端均闭;
/// 2. 范围外的值不参与统计 (不会折入边缘 bin).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug)]
pub struct HuHistogram {
    counts: Vec<u64>,
    min: f32,
    max: f32,
}

impl HuHistogram {
    /// 对 `values` 做直方图统计.
    ///
    /// `bin_count` 必须为正, `range = (min, max)` 必须满足 `min < max`
    /// 且两端有限, 否则返回 `Err`.
    pub fn new<I: IntoIterator<Item = f32>>(
        values: I,
        bin_count: usize,
        range: (f32, f32),
    ) -> Result<Self, InitHistogramError> {
        if bin_count == 0 {
            return Err(InitHistogramError::ZeroBins);
        }
        let (min, max) = range;
        if !(min.is_finite() && max.is_finite() && min < max) {
            return Err(InitHistogramError::EmptyRange(min, max));
        }

        let width = (max - min) / bin_count as f32;
        let mut counts = vec![0u64; bin_count];
        for v in values {
            if !(min..=max).contains(&v) {
                continue;
            }
            // v == max 时索引恰为 bin_count, 并入最后一个 bin (闭端).
            // 浮点截断偶尔也会把临近 max 的值推到 bin_count, 同样并入.
            let idx = (((v - min) / width) as usize).min(bin_count - 1);
            counts[idx] += 1;
        }

        Ok(Self { counts, min, max })
    }

    /// bin 个数.
    #[inline]
    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    /// 单个 bin 的宽度.
    #[inline]
    pub fn bin_width(&self) -> f32 {
        (self.max - self.min) / self.bin_count() as f32
    }

    /// 统计范围 `(min, max)`.
    #[inline]
    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }

    /// 各 bin 的计数, 按 HU 值升序排列.
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// 第 `i` 个 bin 的中心 HU 值.
    ///
    /// 当 `i` 越界时 panic.
    #[inline]
    pub fn center(&self, i: usize) -> f32 {
        assert!(i < self.bin_count());
        self.min + self.bin_width() * (i as f32 + 0.5)
    }

    /// 按 HU 值升序迭代所有 `(bin 中心, 计数)` 对.
    pub fn iter(&self) -> impl Iterator<Item = (f32, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| (self.center(i), c))
    }

    /// 参与统计的值总数 (即落在范围内的值个数).
    #[inline]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// 所有 bin 中的最大计数. 无任何计数时为 0.
    #[inline]
    pub fn max_count(&self) -> u64 {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}
