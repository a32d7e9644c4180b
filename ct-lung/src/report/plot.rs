//! 统计报告的图表渲染.
//!
//! # 注意
//!
//! 需要 `plot` feature.

use super::DensityReport;
use crate::data::slice::ImgDisplay;
use crate::density::DensityBand;
use crate::histogram::HuHistogram;
use opencv::core::{Mat, Point, Rect, Scalar, CV_8UC3};
use opencv::highgui::imshow;
use opencv::imgproc;

/// 画布宽度, 像素.
const CANVAS_W: i32 = 960;

/// 画布高度, 像素.
const CANVAS_H: i32 = 540;

/// 绘图区边距: 左, 右, 上, 下.
const MARGIN: (i32, i32, i32, i32) = (70, 30, 40, 50);

/// steelblue, BGR.
fn bar_color() -> Scalar {
    Scalar::new(180.0, 130.0, 70.0, 0.0)
}

/// 橙色, BGR. 整体报告中的 LAA 密度带标记线颜色.
pub(crate) fn orange() -> Scalar {
    Scalar::new(0.0, 165.0, 255.0, 0.0)
}

/// 蓝色, BGR. 切片查看器中的 LAA 密度带标记线颜色.
pub(crate) fn blue() -> Scalar {
    Scalar::new(255.0, 0.0, 0.0, 0.0)
}

/// 红色, BGR. HAA 密度带标记线颜色.
pub(crate) fn red() -> Scalar {
    Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn black() -> Scalar {
    Scalar::new(0.0, 0.0, 0.0, 0.0)
}

/// 在 `canvas` 的绘图区内画一条竖直虚线.
fn dashed_vline(canvas: &mut Mat, x: i32, color: Scalar) {
    let (_, _, top, bottom) = MARGIN;
    let y_end = CANVAS_H - bottom;
    let mut y = top;
    while y < y_end {
        let seg_end = (y + 6).min(y_end);
        imgproc::line(
            canvas,
            Point::new(x, y),
            Point::new(x, seg_end),
            color,
            2,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
        y += 12;
    }
}

/// 在 `canvas` 上写一行文本.
fn put_line(canvas: &mut Mat, text: &str, org: Point, color: Scalar) {
    imgproc::put_text(
        canvas,
        text,
        org,
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.45,
        color,
        1,
        imgproc::LINE_AA,
        false,
    )
    .unwrap();
}

/// 将直方图渲染为柱状图画布.
///
/// `hist` 为 `None` 时渲染 "无肺组织" 的空状态提示;
/// 否则画出所有 bin 的柱体、四条密度带边界虚线与注释文本.
/// LAA/HAA 标记线颜色由调用方指定 (整体报告与切片查看器的配色不同).
pub(crate) fn histogram_chart(
    hist: Option<&HuHistogram>,
    laa: DensityBand,
    haa: DensityBand,
    laa_color: Scalar,
    haa_color: Scalar,
    note: &str,
) -> Mat {
    let (left, right, top, bottom) = MARGIN;
    let plot_w = CANVAS_W - left - right;
    let plot_h = CANVAS_H - top - bottom;

    let mut canvas =
        Mat::new_rows_cols_with_default(CANVAS_H, CANVAS_W, CV_8UC3, Scalar::all(255.0)).unwrap();

    let Some(hist) = hist else {
        put_line(
            &mut canvas,
            note,
            Point::new(CANVAS_W / 2 - 140, CANVAS_H / 2),
            black(),
        );
        return canvas;
    };

    let (min, max) = hist.range();
    let to_x = |hu: f32| -> i32 { left + ((hu - min) / (max - min) * plot_w as f32) as i32 };

    // 柱体.
    let max_count = hist.max_count().max(1);
    let bar_w = (plot_w as f32 / hist.bin_count() as f32).max(1.0);
    for (i, &count) in hist.counts().iter().enumerate() {
        if count == 0 {
            continue;
        }
        let x0 = left + (i as f32 * bar_w) as i32;
        let h = ((count as f64 / max_count as f64) * plot_h as f64) as i32;
        let rect = Rect::new(x0, top + plot_h - h, bar_w.ceil() as i32, h);
        imgproc::rectangle(&mut canvas, rect, bar_color(), imgproc::FILLED, imgproc::LINE_8, 0)
            .unwrap();
    }

    // 密度带边界标记线. HAA 标记后画, 重叠时覆盖 LAA 标记.
    for bound in [laa.low(), laa.high()] {
        dashed_vline(&mut canvas, to_x(bound), laa_color);
    }
    for bound in [haa.low(), haa.high()] {
        dashed_vline(&mut canvas, to_x(bound), haa_color);
    }

    // 坐标轴.
    let origin = Point::new(left, top + plot_h);
    imgproc::line(
        &mut canvas,
        origin,
        Point::new(left + plot_w, top + plot_h),
        black(),
        1,
        imgproc::LINE_8,
        0,
    )
    .unwrap();
    imgproc::line(
        &mut canvas,
        origin,
        Point::new(left, top),
        black(),
        1,
        imgproc::LINE_8,
        0,
    )
    .unwrap();

    // 刻度与轴标签.
    put_line(
        &mut canvas,
        &format!("{min:.0}"),
        Point::new(left - 20, top + plot_h + 20),
        black(),
    );
    put_line(
        &mut canvas,
        &format!("{max:.0}"),
        Point::new(left + plot_w - 20, top + plot_h + 20),
        black(),
    );
    put_line(
        &mut canvas,
        "HU",
        Point::new(left + plot_w / 2, top + plot_h + 35),
        black(),
    );
    put_line(
        &mut canvas,
        &format!("{max_count}"),
        Point::new(8, top + 10),
        black(),
    );
    put_line(&mut canvas, "Voxel count", Point::new(8, top - 10), black());

    // 注释文本, 置于绘图区右上角.
    for (i, line) in note.lines().enumerate() {
        put_line(
            &mut canvas,
            line,
            Point::new(left + (plot_w as f32 * 0.62) as i32, top + 20 + 22 * i as i32),
            black(),
        );
    }

    canvas
}

/// 渲染整体统计报告: steelblue 柱状图 + 橙色 LAA / 红色 HAA
/// 边界虚线 + 比值注释.
impl ImgDisplay for DensityReport {
    fn show(&self) {
        let chart = histogram_chart(
            Some(self.histogram()),
            self.laa_band(),
            self.haa_band(),
            orange(),
            red(),
            &self.note(),
        );
        imshow("Lung intensity histogram", &chart).unwrap();
    }
}
