//! CT scan/mask 水平切片视图的操作.
//!
//! 扫描与标注在载入后均不再被修改, 因此切片只提供只读视图.

mod core;
mod save;

pub use core::{MaskSlice, ScanSlice};

pub use save::{ImgWriteRaw, ImgWriteVis};

cfg_if::cfg_if! {
    if #[cfg(feature = "plot")] {
        mod plot;

        pub use plot::ImgDisplay;
    }
}
