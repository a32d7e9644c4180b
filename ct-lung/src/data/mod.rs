use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::label::*;
use crate::{Idx2d, Idx3d};

pub mod slice;
pub mod window;

pub use slice::{ImgWriteRaw, ImgWriteVis, MaskSlice, ScanSlice};

#[cfg(feature = "plot")]
pub use slice::ImgDisplay;

pub use window::CtWindow;

/// `NiftiHeader` 是栈上大对象, 移动该对象的开销很可观.
/// 因此我们将其分配到堆上.
type BoxedHeader = Box<NiftiHeader>;

/// nii 格式 3D CT 扫描, 包括 header 和 CT 扫描 (HU). HU 值以 `f32` 保存.
#[derive(Debug, Clone)]
pub struct CtScan {
    header: BoxedHeader,
    data: Array3<f32>,
}

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

/// 向 `header` 回填数据形状与体素分辨率. 仅供 `fake_*` 方法使用.
fn set_fake_header_geometry(header: &mut NiftiHeader, (z, h, w): Idx3d, pix_dim: [f32; 3]) {
    header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];
    let [_, pw, ph, pz, ..] = &mut header.pixdim;
    let [w_mm, h_mm, z_mm] = &pix_dim;
    (*pw, *ph, *pz) = (*w_mm, *h_mm, *z_mm);
    header.intent_name[..4].copy_from_slice(b"fake");
}

/// 3D CT nii 文件 header 的共用属性和部分通用操作.
pub trait NiftiHeaderAttr {
    /// 获取 header 部分.
    fn header(&self) -> &NiftiHeader;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        get_shape_from_header(self.header())
    }

    /// 获取数据水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (自然图像的垂直方向), 宽 (自然图像的水平方向).
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        let [_, w, h, z, ..] = self.header().pixdim;
        [z as f64, h as f64, w as f64]
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }
}

impl NiftiHeaderAttr for CtScan {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for CtScan {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl CtScan {
    /// 打开 nii 文件格式的 3D CT 扫描. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj
            .into_volume()
            .into_ndarray()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<f32>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .unwrap();

        Ok(Self { header, data })
    }

    /// 将扫描写回 `path` 路径的 nii 文件, header 原样保留.
    /// 写出的文件被重新读取后, 形状、HU 值与空间元信息均与本体一致.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> nifti::Result<()> {
        // [z, H, W] -> [W, H, z], 与读取时的轴变换互逆.
        let data = self.data.view().permuted_axes([2, 1, 0]);
        WriterOptions::new(path.as_ref())
            .reference_header(&self.header)
            .write_nifti(&data)
    }

    /// 根据裸 HU 数据和体素分辨率直接创建 `CtScan` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 nifti 惯用标准以 \[w, h, z\] 格式存储.
    /// 2. `pix_dim` 按照 \[w, h, z\] 格式存储, 单位毫米.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<f32>, pix_dim: [f32; 3]) -> Self {
        let data = data.permuted_axes([2, 1, 0]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        debug_assert!(data.is_standard_layout());

        let mut header = Box::<NiftiHeader>::default();
        let &[z, h, w] = data.shape() else {
            unreachable!()
        };
        set_fake_header_geometry(&mut header, (z, h, w), pix_dim);

        Self { header, data }
    }

    /// 判断该结构是否是由 `fake` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 计算由 `it` 给出的所有索引对应的 CT HU 值的平均值.
    ///
    /// 如果存在越界索引, 则程序 panic.
    pub fn mean_hu<I: IntoIterator<Item = Idx3d>>(&self, it: I) -> f64 {
        let mut count = 0u64;
        let mut hu = 0.0;
        for pos in it.into_iter() {
            count += 1;
            hu += self[pos] as f64;
        }
        hu / (count as f64)
    }

    /// 获取 3D 扫描 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ScanSlice<'_> {
        ScanSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代 3D 扫描水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ScanSlice> {
        self.data.axis_iter(Axis(0)).map(ScanSlice::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, f32, Ix3> {
        self.data.view()
    }
}

/// nii 格式 3D 肺部分割标注, 包括 header 和标注数据. 标注值以 `u8` 保存,
/// 语义为 0 = 背景, 1 = 右肺, 2 = 左肺.
#[derive(Debug, Clone)]
pub struct LungMask {
    header: BoxedHeader,
    data: Array3<u8>,
}

impl NiftiHeaderAttr for LungMask {
    #[inline]
    fn header(&self) -> &NiftiHeader {
        &self.header
    }
}

impl Index<Idx3d> for LungMask {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl LungMask {
    /// 打开 nii 文件格式的 3D 肺部分割标注. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    pub fn open<P: AsRef<Path>>(path: P) -> nifti::Result<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = Box::new(obj.header().clone());

        // [W, H, z] -> [z, H, W]
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj
            .into_volume()
            .into_ndarray::<u8>()?
            .permuted_axes([2, 1, 0].as_slice());

        // The nature of nifti data field layout.
        debug_assert!(data.is_standard_layout());

        // 该操作不会生成 `Err`, 可直接 unwrap.
        let data =
            Array3::<u8>::from_shape_vec(get_shape_from_header(&header), data.into_raw_vec())
                .unwrap();

        Ok(Self { header, data })
    }

    /// 将标注写回 `path` 路径的 nii 文件, header 原样保留.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> nifti::Result<()> {
        // [z, H, W] -> [W, H, z], 与读取时的轴变换互逆.
        let data = self.data.view().permuted_axes([2, 1, 0]);
        WriterOptions::new(path.as_ref())
            .reference_header(&self.header)
            .write_nifti(&data)
    }

    /// 以 `reference` 的 header 为参照, 从裸标注数据创建 `LungMask` 实体.
    /// 分割服务的输出与输入扫描共享空间元信息, 正对应此构造方式.
    ///
    /// # 参数
    ///
    /// `data` 按照内存访问标准以 \[z, h, w\] 格式存储, 体素值必须为 0, 1 或 2,
    /// 形状必须与 `reference` 一致, 否则程序行为未定义.
    pub fn from_reference(reference: &NiftiHeader, data: Array3<u8>) -> Self {
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        debug_assert!(data.is_standard_layout());

        Self {
            header: Box::new(reference.clone()),
            data,
        }
    }

    /// 根据裸标注数据和体素分辨率直接创建 `LungMask` 实体.
    ///
    /// # 参数
    ///
    /// 1. `data` 按照 nifti 惯用标准以 \[w, h, z\] 格式存储, 体素值必须为
    ///   0, 1 或 2, 否则程序行为未定义.
    /// 2. `pix_dim` 按照 \[w, h, z\] 格式存储, 单位毫米.
    ///
    /// # 注意
    ///
    /// 该方法可能会创建不一致的实体, 因此你应仅将其用于实验目的.
    pub fn fake(data: Array3<u8>, pix_dim: [f32; 3]) -> Self {
        let data = data.permuted_axes([2, 1, 0]);
        let data = if data.is_standard_layout() {
            data
        } else {
            data.as_standard_layout().to_owned()
        };
        debug_assert!(data.is_standard_layout());

        let mut header = Box::<NiftiHeader>::default();
        let &[z, h, w] = data.shape() else {
            unreachable!()
        };
        set_fake_header_geometry(&mut header, (z, h, w), pix_dim);

        Self { header, data }
    }

    /// 判断该结构是否是由 `fake` 方法手动拼接的.
    pub fn is_faked(&self) -> bool {
        self.header.intent_name.starts_with(b"fake")
    }

    /// 获取 3D 标注 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> MaskSlice {
        MaskSlice::new(self.data.index_axis(Axis(0), z_index))
    }

    /// 获取能按升序迭代 3D 标注水平切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = MaskSlice> {
        self.data.axis_iter(Axis(0)).map(MaskSlice::new)
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, u8, Ix3> {
        self.data.view()
    }

    /// 获取 3D 标注中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 获取肺部标注的基本统计信息.
    ///
    /// 统计信息格式为: \[背景体素数, 右肺体素数, 左肺体素数\].
    /// 该操作不会统计任何其他体素信息.
    pub fn numeric_statistics(&self) -> [usize; 3] {
        let mut ans = [0; 3];
        for pixel in self.data.iter().filter(|p| **p <= 2) {
            ans[*pixel as usize] += 1;
        }
        ans
    }

    /// 收集满足谓词 `pred` 的所有体素对应的下标, 结果按行优先存储.
    pub fn filter_pos(&self, pred: fn(u8) -> bool) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(ref pos, pixel)| pred(*pixel).then_some(*pos))
            .collect()
    }

    /// 收集所有肺 (左肺 + 右肺) 体素对应的下标. 结果按行优先存储.
    #[inline]
    pub fn lung_pos(&self) -> Vec<Idx3d> {
        self.filter_pos(is_lung)
    }
}

/// 打开成对的 3D CT 扫描与肺部分割标注时的错误.
#[derive(Debug)]
pub enum OpenDataError {
    /// 底层 nii 文件读取错误.
    Nifti(nifti::NiftiError),

    /// 扫描与标注的数据形状不一致. 两个字段分别为扫描和标注的形状.
    ShapeMismatch(Idx3d, Idx3d),
}

/// nii 格式的 3D CT 扫描与对应的肺部分割标注.
///
/// 该结构完全透明, 仅包含两个公开的 `scan` 和 `mask` 子结构,
/// 用户可以直接使用它们来实现相关上层功能.
///
/// # 注意
///
/// 通过字段直接拼装时, 两个子结构的数据一致性由用户保证,
/// 否则程序行为未定义.
#[derive(Debug, Clone)]
pub struct LungData3d {
    /// 3D CT 扫描.
    pub scan: CtScan,

    /// 3D 肺部分割标注.
    pub mask: LungMask,
}

impl LungData3d {
    /// 分别打开 nii 文件格式的 3D CT 扫描和对应肺部标注.
    /// 如果任一文件打开失败, 或两个文件的数据形状不一致, 则返回 `Err`.
    pub fn open(
        scan_path: impl AsRef<Path>,
        mask_path: impl AsRef<Path>,
    ) -> Result<Self, OpenDataError> {
        let scan = CtScan::open(scan_path.as_ref()).map_err(OpenDataError::Nifti)?;
        let mask = LungMask::open(mask_path.as_ref()).map_err(OpenDataError::Nifti)?;
        if scan.shape() != mask.shape() {
            return Err(OpenDataError::ShapeMismatch(scan.shape(), mask.shape()));
        }
        Ok(Self { scan, mask })
    }

    /// 获取水平切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.mask.len_z()
    }

    /// 依次获取 3D 扫描和 3D 标注 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> (ScanSlice<'_>, MaskSlice<'_>) {
        (self.scan.slice_at(z_index), self.mask.slice_at(z_index))
    }

    /// 获取能按升序迭代 3D 水平 (扫描, 标注) 切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = (ScanSlice, MaskSlice)> {
        self.scan.slice_iter().zip(self.mask.slice_iter())
    }

    /// 获取能按行优先序迭代 3D (扫描, 标注) 体素的迭代器.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (&f32, &u8)> {
        self.scan.data.iter().zip(self.mask.data.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::{CtScan, LungData3d, LungMask, NiftiHeaderAttr, OpenDataError};
    use ndarray::Array3;

    fn temp_nii(name: &str) -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("ct-lung-test-{}-{name}", std::process::id()));
        p
    }

    #[test]
    fn test_fake_geometry() {
        // [w, h, z] = (4, 5, 3).
        let scan = CtScan::fake(Array3::from_elem((4, 5, 3), -600.0), [0.8, 0.8, 1.5]);
        assert!(scan.is_faked());
        assert_eq!(scan.shape(), (3, 5, 4));
        assert_eq!(scan.len_z(), 3);
        assert_eq!(scan.slice_shape(), (5, 4));
        assert_eq!(scan.size(), 60);
        assert_eq!(scan.pix_dim(), [1.5, 0.8f32 as f64, 0.8f32 as f64]);
    }

    #[test]
    fn test_mask_statistics() {
        let mut raw = Array3::<u8>::zeros((4, 4, 2));
        raw[(0, 0, 0)] = 1;
        raw[(1, 0, 0)] = 1;
        raw[(2, 3, 1)] = 2;
        let mask = LungMask::fake(raw, [1.0, 1.0, 1.0]);

        assert_eq!(mask.count(1), 2);
        assert_eq!(mask.count(2), 1);
        assert_eq!(mask.numeric_statistics(), [29, 2, 1]);
        assert_eq!(mask.lung_pos().len(), 3);
    }

    #[test]
    fn test_mean_hu_over_lung() {
        let scan = CtScan::fake(Array3::from_elem((2, 2, 2), -975.0), [1.0, 1.0, 1.0]);
        let mask = LungMask::fake(Array3::from_elem((2, 2, 2), 1), [1.0, 1.0, 1.0]);
        let mean = scan.mean_hu(mask.lung_pos());
        assert!((mean + 975.0).abs() < 1e-9);
    }

    #[test]
    fn test_scan_save_open_round_trip() {
        let mut raw = Array3::<f32>::zeros((3, 4, 2));
        for (i, v) in raw.iter_mut().enumerate() {
            *v = -1000.0 + i as f32;
        }
        let scan = CtScan::fake(raw, [0.7, 0.7, 1.2]);

        let path = temp_nii("scan.nii");
        scan.save(&path).unwrap();
        let reread = CtScan::open(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(reread.shape(), scan.shape());
        assert_eq!(reread.pix_dim(), scan.pix_dim());
        assert_eq!(reread.data(), scan.data());
    }

    #[test]
    fn test_paired_open_shape_mismatch() {
        let scan = CtScan::fake(Array3::from_elem((4, 4, 3), -975.0), [1.0, 1.0, 1.0]);
        let mask = LungMask::fake(Array3::from_elem((4, 4, 2), 1), [1.0, 1.0, 1.0]);

        let scan_path = temp_nii("mismatch-scan.nii");
        let mask_path = temp_nii("mismatch-mask.nii");
        scan.save(&scan_path).unwrap();
        mask.save(&mask_path).unwrap();

        let err = LungData3d::open(&scan_path, &mask_path).unwrap_err();
        std::fs::remove_file(&scan_path).unwrap();
        std::fs::remove_file(&mask_path).unwrap();

        match err {
            OpenDataError::ShapeMismatch(s, m) => {
                assert_eq!(s, (3, 4, 4));
                assert_eq!(m, (2, 4, 4));
            }
            other => panic!("期望 ShapeMismatch, 实际为 {other:?}"),
        }
    }
}
