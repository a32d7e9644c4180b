use crate::consts::label::*;
use crate::Idx2d;
use ndarray::iter::Iter;
use ndarray::{ArrayView2, Ix2};
use std::ops::Index;

/// 不可变、借用的二维水平 CT 扫描切片.
pub struct ScanSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::CtScan`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, f32>,
}

/// 不可变、借用的二维水平肺部标注切片.
pub struct MaskSlice<'a> {
    /// 底层数据的轻量级视图, 借用于 [`crate::LungMask`].
    ///
    /// 这里有意把代码写死为 `ArrayView` 降低灵活性, 但使结构的意图更加明确.
    data: ArrayView2<'a, u8>,
}

/// 两类切片共用的不可变方法集合.
macro_rules! impl_slice_view {
    ($life: lifetime, $slice: ty, $elem: ty) => {
        /// 不可变方法集合.
        impl<$life> $slice {
            /// 直接初始化.
            #[inline]
            pub(crate) fn new(data: ArrayView2<$life, $elem>) -> Self {
                Self { data }
            }

            /// 获得 **底层** 数据的一份不可变 shallow copy.
            #[inline]
            pub fn data(&self) -> ArrayView2<$elem> {
                self.data.view()
            }

            /// 获取可以迭代图像像素的迭代器.
            #[inline]
            pub fn iter(&self) -> Iter<'_, $elem, Ix2> {
                self.data.iter()
            }

            /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
            #[inline]
            pub fn get(&self, pos: Idx2d) -> Option<&$elem> {
                self.data.get(pos)
            }

            /// 图像的分辨率 (高, 宽).
            #[inline]
            pub fn shape(&self) -> Idx2d {
                let &[h, w] = self.data.shape() else {
                    unreachable!()
                };
                (h, w)
            }

            /// 图像的像素个数.
            #[inline]
            pub fn size(&self) -> usize {
                let (h, w) = self.shape();
                h * w
            }

            /// 获得图像的高.
            #[inline]
            pub fn height(&self) -> usize {
                self.shape().0
            }

            /// 获得图像的宽.
            #[inline]
            pub fn width(&self) -> usize {
                self.shape().1
            }

            /// 以行优先规则, 获取能迭代图像所有 `(索引, 像素值)` 的迭代器.
            #[inline]
            pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, &$elem)> {
                self.data.indexed_iter()
            }
        }

        impl<$life> Index<Idx2d> for $slice {
            type Output = $elem;

            #[inline]
            fn index(&self, index: Idx2d) -> &Self::Output {
                &self.data[index]
            }
        }
    };
}

impl_slice_view!('a, ScanSlice<'a>, f32);
impl_slice_view!('a, MaskSlice<'a>, u8);

/// 标注切片特有的统计方法.
impl MaskSlice<'_> {
    /// 统计图像中值为 `label` 的像素总个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|&p| *p == label).count()
    }

    /// 获取肺部标注切片的基本统计信息.
    ///
    /// 统计信息格式为: \[背景像素数, 右肺像素数, 左肺像素数\].
    /// 该操作不会统计任何其他像素信息.
    pub fn numeric_statistics(&self) -> [usize; 3] {
        let mut ans = [0; 3];
        for pixel in self.data.iter().filter(|p| **p <= 2) {
            ans[*pixel as usize] += 1;
        }
        ans
    }

    /// 判断图像上是否有肺 (左肺或右肺) 像素.
    #[inline]
    pub fn has_lung(&self) -> bool {
        self.iter().any(|c| is_lung(*c))
    }
}

#[cfg(test)]
mod tests {
    use crate::{CtScan, LungMask};
    use ndarray::Array3;

    #[test]
    fn test_slice_views() {
        // [w, h, z] = (3, 2, 2).
        let mut raw = Array3::<f32>::from_elem((3, 2, 2), -500.0);
        raw[(2, 1, 1)] = -75.0;
        let scan = CtScan::fake(raw, [1.0, 1.0, 1.0]);

        let sli = scan.slice_at(1);
        assert_eq!(sli.shape(), (2, 3));
        assert_eq!(sli.size(), 6);
        // 内存序为 [z, h, w].
        assert_eq!(sli[(1, 2)], -75.0);
        assert_eq!(sli.get((2, 0)), None);
    }

    #[test]
    fn test_mask_slice_statistics() {
        let mut raw = Array3::<u8>::zeros((3, 3, 1));
        raw[(0, 0, 0)] = 1;
        raw[(1, 1, 0)] = 2;
        let mask = LungMask::fake(raw, [1.0, 1.0, 1.0]);

        let sli = mask.slice_at(0);
        assert!(sli.has_lung());
        assert_eq!(sli.count(0), 7);
        assert_eq!(sli.numeric_statistics(), [7, 1, 1]);

        let empty = LungMask::fake(Array3::zeros((3, 3, 1)), [1.0, 1.0, 1.0]);
        assert!(!empty.slice_at(0).has_lung());
    }
}
