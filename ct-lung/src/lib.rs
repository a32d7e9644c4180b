#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供胸部 CT 扫描与肺部分割标注 (nii 格式) 的结构化信息,
//! 以及肺密度定量统计与可视化功能.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 分割标注的语义固定为 0 = 背景, 1 = 右肺, 2 = 左肺
//!   (与 lungmask R231 模型的输出约定一致). 其它来源的标注如果遵循
//!   同样的组织方式, 也可以工作.
//! 2. 在非期望情况下, 程序会直接 panic, 而不会导致内存错误. As what Rust promises.
//!
//! # 开发计划
//!
//! ### 密度带分类与 LAA/HAA 比值 ✅
//!
//! 给定任意闭区间 HU 密度带, 对肺内体素做布尔分类并计算体积占比.
//! LAA (低衰减区) 对应肺气肿, HAA (高衰减区) 对应纤维化/炎症.
//!
//! 实现位于 `ct-lung/src/density.rs`.
//!
//! ### 固定范围直方图 ✅
//!
//! 对肺内体素 HU 值做等宽分 bin 统计, 范围外的值不参与统计.
//!
//! 实现位于 `ct-lung/src/histogram.rs`.
//!
//! ### 整体统计报告 ✅
//!
//! 全肺直方图 + 两个密度带比值 + 肺体积, 可在 `plot` feature
//! 下渲染为带密度带标记线的柱状图.
//!
//! 实现位于 `ct-lung/src/report`.
//!
//! ### 交互式切片查看器 ✅
//!
//! 显式状态机: 唯一可变状态为当前切片索引, 叠加图与单切片直方图
//! 均为该索引的纯函数. 滚轮与滑动条共用同一条 `set_slice` 路径.
//!
//! 实现位于 `ct-lung/src/viewer`.
//!
//! ### CT window 视图 ✅
//!
//! 提供一个独立的 CT 窗口对象, 以便将 CT HU 值转换为 8-bit 灰度值.
//! 肺窗预设覆盖 \[-1024, 0\] HU.
//!
//! 实现位于 `ct-lung/src/data/window.rs`.
//!
//! ### 标注持久化 ✅
//!
//! 以扫描 header 为参照将分割标注写回 nii 文件, 保证空间元信息
//! 精确往返.
//!
//! ### 完善代码文档 ✅
//!
//! 给每个 public API 提供文档, 并视情况给 private
//! API 提供文档.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 3D CT nii 文件基础数据结构.
mod data;

pub use data::{
    CtScan, CtWindow, ImgWriteRaw, ImgWriteVis, LungData3d, LungMask, MaskSlice, NiftiHeaderAttr,
    OpenDataError, ScanSlice,
};

pub mod consts;

#[cfg(feature = "plot")]
pub use data::ImgDisplay;

pub mod density;

pub mod histogram;

pub mod report;

pub mod viewer;

pub mod prelude;
