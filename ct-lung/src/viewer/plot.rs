//! 交互式切片查看器的 OpenCV 前端.
//!
//! 两个窗口分别承载叠加图与单切片直方图; 一个滑动条作为位置控件.
//! 滚轮与键盘滚动 **只负责移动滑动条**, 轮询路径把滑动条位置喂给
//! [`SliceViewer::set_slice`]. 所有输入通道共用这唯一一条重绘路径,
//! 滑动条显示值与滚动状态因此天然同步.
//!
//! # 注意
//!
//! 需要 `plot` feature.

use super::{FrameSink, SliceFrame, SliceViewer};
use crate::data::LungData3d;
use crate::density::DensityBand;
use crate::report::plot::{blue, histogram_chart, red};
use image::RgbImage;
use opencv::core::{Scalar, Size, Vec3b, CV_8UC3};
use opencv::highgui;
use opencv::prelude::{Mat, MatTrait};

/// 叠加图窗口名.
const WIN_SLICE: &str = "Slice";

/// 直方图窗口名.
const WIN_HIST: &str = "Lung histogram";

/// 位置控件 (滑动条) 名.
const TRACKBAR: &str = "slice";

/// 将 RGB 叠加图转换为 OpenCV 矩阵 (BGR 存储).
fn rgb_image_to_mat(img: &RgbImage) -> Mat {
    let (w, h) = (img.width() as i32, img.height() as i32);
    let mut mat = Mat::new_size_with_default(Size::new(w, h), CV_8UC3, Scalar::all(0.0)).unwrap();
    for (x, y, pixel) in img.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        *mat.at_2d_mut::<Vec3b>(y as i32, x as i32).unwrap() = Vec3b::from([b, g, r]);
    }
    mat
}

/// 把重绘产物送进两个 highgui 窗口的展示汇.
struct HighguiSink {
    laa: DensityBand,
    haa: DensityBand,
}

impl FrameSink for HighguiSink {
    fn present(&mut self, frame: &SliceFrame) {
        let overlay = rgb_image_to_mat(&frame.overlay);
        highgui::imshow(WIN_SLICE, &overlay).unwrap();
        highgui::set_window_title(WIN_SLICE, &frame.image_title()).unwrap();

        let chart = histogram_chart(
            frame.stats.as_ref().map(|s| &s.histogram),
            self.laa,
            self.haa,
            blue(),
            red(),
            &frame.note(),
        );
        highgui::imshow(WIN_HIST, &chart).unwrap();
        highgui::set_window_title(WIN_HIST, &frame.histogram_title()).unwrap();
    }
}

/// 运行交互式切片查看器, 直到用户按下 `q` 或 `Esc`.
///
/// 切换切片的方式: 拖动滑动条、在叠加图窗口上滚动鼠标滚轮,
/// 或按 `.`/`k` (前滚) 与 `,`/`j` (回滚).
pub fn run_viewer(
    data: &LungData3d,
    laa: DensityBand,
    haa: DensityBand,
) -> opencv::Result<()> {
    let mut viewer = SliceViewer::new(data, laa, haa);
    let mut sink = HighguiSink { laa, haa };

    highgui::named_window(WIN_SLICE, highgui::WINDOW_AUTOSIZE)?;
    highgui::named_window(WIN_HIST, highgui::WINDOW_AUTOSIZE)?;

    let max_idx = (viewer.len_z() - 1) as i32;
    highgui::create_trackbar(TRACKBAR, WIN_SLICE, None, max_idx, None)?;
    highgui::set_trackbar_pos(TRACKBAR, WIN_SLICE, viewer.current_slice() as i32)?;

    // 滚轮回调只移动滑动条, 不直接触碰查看器状态.
    highgui::set_mouse_callback(
        WIN_SLICE,
        Some(Box::new(move |event, _x, _y, flags| {
            if event == highgui::EVENT_MOUSEWHEEL {
                let delta = highgui::get_mouse_wheel_delta(flags).unwrap_or(0);
                let cur = highgui::get_trackbar_pos(TRACKBAR, WIN_SLICE).unwrap_or(0);
                let next = if delta > 0 {
                    (cur + 1).min(max_idx)
                } else {
                    (cur - 1).max(0)
                };
                let _ = highgui::set_trackbar_pos(TRACKBAR, WIN_SLICE, next);
            }
        })),
    )?;

    // 初始化重绘.
    viewer.redraw(&mut sink);

    loop {
        let key = highgui::wait_key(30)?;
        match key {
            // Esc / 'q': 退出.
            27 | 113 => break,

            // '.' / 'k': 前滚一个切片.
            46 | 107 => {
                let cur = highgui::get_trackbar_pos(TRACKBAR, WIN_SLICE)?;
                highgui::set_trackbar_pos(TRACKBAR, WIN_SLICE, (cur + 1).min(max_idx))?;
            }

            // ',' / 'j': 回滚一个切片.
            44 | 106 => {
                let cur = highgui::get_trackbar_pos(TRACKBAR, WIN_SLICE)?;
                highgui::set_trackbar_pos(TRACKBAR, WIN_SLICE, (cur - 1).max(0))?;
            }

            _ => {}
        }

        // 事件在此被串行消费, 一次重绘完成前不会处理下一个事件.
        let pos = highgui::get_trackbar_pos(TRACKBAR, WIN_SLICE)?;
        viewer.set_slice(pos.max(0) as usize, &mut sink);
    }

    highgui::destroy_all_windows()
}
