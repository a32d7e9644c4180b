//! 图片展示模块, 主要用于调试和交互查看.
//!
//! # 注意
//!
//! 需要 `plot` feature.

use crate::{Idx2d, MaskSlice, ScanSlice};
use ndarray::ArrayView2;
use opencv::highgui::{imshow, wait_key};
use opencv::prelude::{Mat, MatTrait, MatTraitConst};
use std::time::Duration;

/// 表明一个可以在窗口中可视化的对象.
pub trait ImgDisplay {
    /// 展示对象.
    fn show(&self);

    /// 同 `show()`, 但在之后自动等待一次用户按键输入.
    fn show_and_wait(&self) {
        self.show();
        wait_key(0).unwrap(); // never fails
    }

    /// 同 `show()`, 但在之后自动等待给定时间.
    fn show_and_wait_for(&self, d: Duration) -> opencv::Result<i32> {
        self.show();
        let ms = d.as_millis();
        assert!(ms <= i32::MAX as u128);
        wait_key(ms as i32)
    }
}

/// 将标注切片按可视化友好的像素转换存储为单通道矩阵.
pub(crate) fn mask_slice_to_opencv_mat(data: &[u8], (h, w): Idx2d) -> Mat {
    assert_eq!(data.len(), h * w);
    let mut mat = Mat::from_slice_rows_cols(data, h, w).unwrap();

    let size = mat.size().unwrap();
    debug_assert_eq!(size.height as usize, h);
    debug_assert_eq!(size.width as usize, w);

    for i in 0..size.height {
        for j in 0..size.width {
            let slot = mat.at_2d_mut::<u8>(i, j).unwrap();
            *slot = super::save::pretty(*slot);
        }
    }
    mat
}

/// 将扫描切片按肺窗 (窗位 -512, 窗宽 1024) 转换存储为单通道矩阵.
pub(crate) fn scan_slice_to_opencv_mat(data: ArrayView2<f32>, (h, w): Idx2d) -> Mat {
    use opencv::core::{Scalar, Size, CV_8UC1};

    assert_eq!(data.len(), h * w);
    let mut mat =
        Mat::new_size_with_default(Size::new(w as i32, h as i32), CV_8UC1, Scalar::from(0))
            .unwrap();

    let size = mat.size().unwrap();
    debug_assert_eq!(size.height as usize, h);
    debug_assert_eq!(size.width as usize, w);

    const WINDOW: crate::CtWindow = crate::CtWindow::from_lung_visual();
    for i in 0..size.height {
        for j in 0..size.width {
            let slot = mat.at_2d_mut::<u8>(i, j).unwrap();
            *slot = WINDOW.eval(data[(i as usize, j as usize)]).unwrap();
        }
    }
    mat
}

/// 该对象最多只允许 `0`, `1`, `2` 值, 分别代表背景、右肺、左肺.
impl ImgDisplay for MaskSlice<'_> {
    /// 为了获得更清晰的可视化对象, 该功能在展示前将背景/右肺/左肺
    /// 分别映射为黑色/白色/亮灰色.
    fn show(&self) {
        let binding = self.data();
        let mat = if let Some(sli) = binding.as_slice() {
            mask_slice_to_opencv_mat(sli, self.shape())
        } else {
            let owned: Vec<u8> = self.iter().copied().collect();
            mask_slice_to_opencv_mat(&owned, self.shape())
        };
        imshow("Image", &mat).unwrap();
    }
}

/// 可视化扫描.
impl ImgDisplay for ScanSlice<'_> {
    fn show(&self) {
        let mat = scan_slice_to_opencv_mat(self.data(), self.shape());
        imshow("Image", &mat).unwrap();
    }
}
