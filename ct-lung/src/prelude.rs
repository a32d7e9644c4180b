//! 🫁欢迎光临🫁
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::data::slice::{ImgWriteRaw, ImgWriteVis, MaskSlice, ScanSlice};
pub use crate::data::window::CtWindow;
pub use crate::data::{CtScan, LungData3d, LungMask, NiftiHeaderAttr, OpenDataError};

#[cfg(feature = "plot")]
pub use crate::data::slice::ImgDisplay;

pub use crate::consts::label::{LUNG_BACKGROUND, LUNG_LEFT, LUNG_RIGHT};
pub use crate::consts::{HU_DISPLAY_RANGE, REPORT_BIN_COUNT, SLICE_BIN_COUNT};

pub use crate::density::{BandClassification, DensityBand, DensityError, InvalidBand};
pub use crate::histogram::{HuHistogram, InitHistogramError};
pub use crate::report::DensityReport;
pub use crate::viewer::{FrameSink, ScrollDirection, SliceFrame, SliceStats, SliceViewer};

#[cfg(feature = "plot")]
pub use crate::viewer::run_viewer;
