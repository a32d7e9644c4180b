//! 交互式切片查看器的状态机.
//!
//! 查看器唯一的可变状态是当前切片索引; 叠加图、单切片直方图与标题
//! 均为该索引的纯函数, 每次状态转移后重新推导, 从而保证图像面板与
//! 直方图面板不会出现漂移.
//!
//! 状态机本身与展示后端无关: 重绘结果以 [`SliceFrame`] 的形式推送给
//! [`FrameSink`], 因此核心逻辑可以在无渲染后端的环境下完整测试.
//! `plot` feature 提供基于 OpenCV 的交互前端.

use crate::consts::label::is_lung;
use crate::consts::rgb::{HAA_HIGHLIGHT, LAA_HIGHLIGHT};
use crate::consts::{HU_DISPLAY_RANGE, SLICE_BIN_COUNT};
use crate::data::{CtScan, CtWindow, LungData3d, LungMask, MaskSlice, NiftiHeaderAttr, ScanSlice};
use crate::density::{self, DensityBand};
use crate::histogram::HuHistogram;
use image::{Rgb, RgbImage};

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        mod plot;

        pub use plot::run_viewer;
    }
}

/// 滚动方向.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScrollDirection {
    /// 向更大的切片索引移动.
    Forward,

    /// 向更小的切片索引移动.
    Backward,
}

/// 表明一个可以接收重绘结果的展示汇.
///
/// 查看器的每次状态转移恰好产生一次 `present` 调用.
pub trait FrameSink {
    /// 接收并展示一帧重绘结果.
    fn present(&mut self, frame: &SliceFrame);
}

/// 单切片统计: 直方图与两个密度带比值.
#[derive(Clone, Debug)]
pub struct SliceStats {
    /// 该切片肺像素的 HU 直方图.
    pub histogram: HuHistogram,

    /// 该切片的 LAA 比值.
    pub laa_ratio: f64,

    /// 该切片的 HAA 比值.
    pub haa_ratio: f64,
}

/// 一次重绘的完整产物.
#[derive(Clone, Debug)]
pub struct SliceFrame {
    /// 当前切片索引, 从 0 开始.
    pub index: usize,

    /// 切片总数.
    pub len_z: usize,

    /// 带 LAA/HAA 高亮的 RGB 叠加图.
    pub overlay: RgbImage,

    /// 单切片统计. 该切片没有肺像素时为 `None`,
    /// 表示可恢复的 "无肺组织" 状态.
    pub stats: Option<SliceStats>,
}

impl SliceFrame {
    /// 图像面板标题. 切片序号按 1 起始展示.
    pub fn image_title(&self) -> String {
        format!(
            "Slice {}/{} (LAA: yellow | HAA: red)",
            self.index + 1,
            self.len_z
        )
    }

    /// 直方图面板标题. 切片序号按 1 起始展示.
    pub fn histogram_title(&self) -> String {
        format!("Lung intensity histogram - slice {}", self.index + 1)
    }

    /// 注释文本: 两个比值保留 4 位小数, 或 "无肺组织" 状态提示.
    pub fn note(&self) -> String {
        match &self.stats {
            Some(s) => format!(
                "LAA ratio: {:.4}\nHAA ratio: {:.4}",
                s.laa_ratio, s.haa_ratio
            ),
            None => String::from("no lung tissue in this slice"),
        }
    }
}

/// 为单个水平切片构建 RGB 叠加图.
///
/// 底图为肺窗 (\[-1024, 0\] HU) 灰度; 在肺像素范围内, LAA 密度带内的
/// 像素涂为黄色, HAA 密度带内的像素涂为红色. HAA 永远在 LAA 之后上色,
/// 两带重叠时红色覆盖黄色. 这是有意的确定性优先级, 不是实现巧合.
pub fn slice_overlay(
    scan: &ScanSlice,
    mask: &MaskSlice,
    laa: DensityBand,
    haa: DensityBand,
) -> RgbImage {
    assert_eq!(scan.shape(), mask.shape(), "扫描与标注切片形状不一致");

    const WINDOW: CtWindow = CtWindow::from_lung_visual();
    let (h, w) = scan.shape();
    let mut img = RgbImage::new(w as u32, h as u32);
    for ((hh, ww), &hu) in scan.indexed_iter() {
        let gray = WINDOW.eval(hu).unwrap();
        let mut pix = [gray, gray, gray];
        if is_lung(mask[(hh, ww)]) {
            if laa.contains(hu) {
                pix = LAA_HIGHLIGHT;
            }
            if haa.contains(hu) {
                pix = HAA_HIGHLIGHT;
            }
        }
        img.put_pixel(ww as u32, hh as u32, Rgb(pix));
    }
    img
}

/// 交互式切片查看器状态机.
///
/// 两个输入通道 (位置控件与滚动手势) 都收敛到 [`SliceViewer::set_slice`]
/// 这唯一一条重绘路径上, 保证它们展示的状态不会分叉.
pub struct SliceViewer<'a> {
    scan: &'a CtScan,
    mask: &'a LungMask,
    laa: DensityBand,
    haa: DensityBand,
    current: usize,
}

impl<'a> SliceViewer<'a> {
    /// 初始化查看器. 初始切片为中间切片 (`len_z / 2`).
    ///
    /// 两个密度带在 [`DensityBand::new`] 处已完成校验, 查看器不再检查.
    /// 当 `data` 不含任何切片时程序 panic.
    pub fn new(data: &'a LungData3d, laa: DensityBand, haa: DensityBand) -> Self {
        let len_z = data.len_z();
        assert!(len_z > 0, "数据不含任何水平切片");
        Self {
            scan: &data.scan,
            mask: &data.mask,
            laa,
            haa,
            current: len_z / 2,
        }
    }

    /// 当前切片索引, 从 0 开始.
    #[inline]
    pub fn current_slice(&self) -> usize {
        self.current
    }

    /// 切片总数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.scan.len_z()
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

    /// 从当前切片索引推导一帧完整的重绘产物.
    ///
    /// 该操作是纯函数, 不修改任何状态.
    pub fn frame(&self) -> SliceFrame {
        let scan_sli = self.scan.slice_at(self.current);
        let mask_sli = self.mask.slice_at(self.current);

        let overlay = slice_overlay(&scan_sli, &mask_sli, self.laa, self.haa);

        let voxels = density::lung_voxels_2d(&scan_sli, &mask_sli);
        let stats = if voxels.is_empty() {
            None
        } else {
            // 常量参数合法, 该操作不会生成 `Err`, 可直接 unwrap.
            let histogram =
                HuHistogram::new(voxels.iter().copied(), SLICE_BIN_COUNT, HU_DISPLAY_RANGE)
                    .unwrap();
            // 非空集合上两个比值一定有定义.
            let laa_ratio = density::voxels_band_ratio(&voxels, self.laa).unwrap();
            let haa_ratio = density::voxels_band_ratio(&voxels, self.haa).unwrap();
            Some(SliceStats {
                histogram,
                laa_ratio,
                haa_ratio,
            })
        };

        SliceFrame {
            index: self.current,
            len_z: self.len_z(),
            overlay,
            stats,
        }
    }

    /// 无条件重绘当前切片. 用于初始化后的首次展示.
    #[inline]
    pub fn redraw<S: FrameSink>(&self, sink: &mut S) {
        sink.present(&self.frame());
    }

    /// 切换到第 `index` 个切片. 索引先被钳制到合法范围
    /// `[0, len_z - 1]`; 钳制后与当前索引相同时不做任何事.
    ///
    /// 返回值指示是否发生了实际切换 (即是否触发了一次重绘).
    pub fn set_slice<S: FrameSink>(&mut self, index: usize, sink: &mut S) -> bool {
        let clamped = index.min(self.len_z() - 1);
        if clamped == self.current {
            return false;
        }
        self.current = clamped;
        self.redraw(sink);
        true
    }

    /// 向 `direction` 方向滚动一个切片. 委托给 [`SliceViewer::set_slice`],
    /// 在边界处钳制 (不回绕).
    ///
    /// 返回值指示是否发生了实际切换.
    pub fn scroll<S: FrameSink>(&mut self, direction: ScrollDirection, sink: &mut S) -> bool {
        let target = match direction {
            ScrollDirection::Forward => self.current.saturating_add(1),
            ScrollDirection::Backward => self.current.saturating_sub(1),
        };
        self.set_slice(target, sink)
    }
}
