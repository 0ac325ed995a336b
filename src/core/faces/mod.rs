//! 人脸区域裁剪
//!
//! 检测器给出的原始框先对称外扩到目标尺寸，再整体平移回画面内，
//! 最后裁剪。检测本身交给外部协作方，这里只负责框到裁剪的换算。

use image::{imageops, RgbImage};

use crate::core::error::PrepError;

/// 下游分类模型的输入尺寸
pub const MODEL_INPUT_SIZE: (u32, u32) = (256, 256);

/// 检测模型变体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceDetectionModel {
    Hog,
    Cnn,
}

/// 检测器返回的原始人脸框，像素坐标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
    pub left: i64,
}

impl FaceBox {
    /// 按 top, right, bottom, left 顺序从元组构造
    pub fn from_tuple(bounds: (i64, i64, i64, i64)) -> Self {
        Self {
            top: bounds.0,
            right: bounds.1,
            bottom: bounds.2,
            left: bounds.3,
        }
    }
}

/// 人脸检测协作方
pub trait FaceDetector: Send + Sync {
    fn locate(
        &self,
        frame: &RgbImage,
        model: FaceDetectionModel,
        number_of_times_to_upsample: u32,
    ) -> Vec<FaceBox>;

    /// 批量检测合并多帧为一次推理调用，降低固定开销；默认逐帧退化
    fn locate_batch(
        &self,
        frames: &[RgbImage],
        _batch_size: usize,
        number_of_times_to_upsample: u32,
    ) -> Vec<Vec<FaceBox>> {
        frames
            .iter()
            .map(|frame| self.locate(frame, FaceDetectionModel::Cnn, number_of_times_to_upsample))
            .collect()
    }
}

/// 单轴外扩：框短于目标长度时两侧对称补边，向上取整；不缩小已够大的框
fn expand_range(
    lower_bound: i64,
    upper_bound: i64,
    desired_length: i64,
) -> Result<(i64, i64), PrepError> {
    if lower_bound > upper_bound {
        return Err(PrepError::MalformedBounds {
            lower: lower_bound,
            upper: upper_bound,
        });
    }
    let current_length = upper_bound - lower_bound;
    if current_length >= desired_length {
        return Ok((lower_bound, upper_bound));
    }
    let margin = (desired_length - current_length + 1) / 2;
    Ok((lower_bound - margin, upper_bound + margin))
}

/// 单轴平移：一个带符号位移把框滑回 [0, max]，长度不变。
/// 目标长度超出画面时两端都回不来，留给裁剪截断。
fn adjust_range(lower_bound: i64, upper_bound: i64, max_upper_bound: i64) -> (i64, i64) {
    let mut shift = 0;
    if upper_bound > max_upper_bound {
        shift -= upper_bound - max_upper_bound;
    }
    if lower_bound < 0 {
        shift -= lower_bound;
    }
    (lower_bound + shift, upper_bound + shift)
}

/// 越界残余截断到画面内
fn clamped_crop(frame: &RgbImage, top: i64, bottom: i64, left: i64, right: i64) -> RgbImage {
    let (frame_width, frame_height) = frame.dimensions();
    let top = top.clamp(0, frame_height as i64) as u32;
    let bottom = bottom.clamp(0, frame_height as i64) as u32;
    let left = left.clamp(0, frame_width as i64) as u32;
    let right = right.clamp(0, frame_width as i64) as u32;
    imageops::crop_imm(
        frame,
        left,
        top,
        right.saturating_sub(left),
        bottom.saturating_sub(top),
    )
    .to_image()
}

/// 原始框换算成贴合目标尺寸的画面内裁剪
pub fn select_face(
    frame: &RgbImage,
    location: &FaceBox,
    preferred_size: (u32, u32),
) -> Result<RgbImage, PrepError> {
    let (pref_width, pref_height) = preferred_size;
    let (frame_width, frame_height) = frame.dimensions();

    let (top, bottom) = expand_range(location.top, location.bottom, pref_height as i64)?;
    let (top, bottom) = adjust_range(top, bottom, frame_height as i64);
    let (left, right) = expand_range(location.left, location.right, pref_width as i64)?;
    let (left, right) = adjust_range(left, right, frame_width as i64);

    Ok(clamped_crop(frame, top, bottom, left, right))
}

pub struct FaceExtractor {
    detector: Box<dyn FaceDetector>,
    model: FaceDetectionModel,
    number_of_times_to_upsample: u32,
    preferred_size: (u32, u32),
}

impl FaceExtractor {
    pub fn new(detector: Box<dyn FaceDetector>, model: FaceDetectionModel) -> Self {
        Self::with_preferred_size(detector, model, MODEL_INPUT_SIZE)
    }

    pub fn with_preferred_size(
        detector: Box<dyn FaceDetector>,
        model: FaceDetectionModel,
        preferred_size: (u32, u32),
    ) -> Self {
        Self {
            detector,
            model,
            number_of_times_to_upsample: 2,
            preferred_size,
        }
    }

    /// 取首个检测框裁剪；没检出人脸时原帧原样返回，每帧必有一帧输出
    pub fn extract(&self, frame: &RgbImage) -> Result<RgbImage, PrepError> {
        let locations = self
            .detector
            .locate(frame, self.model, self.number_of_times_to_upsample);
        match locations.first() {
            None => Ok(frame.clone()),
            Some(location) => select_face(frame, location, self.preferred_size),
        }
    }

    /// 整批一次检测调用，逐帧沿用 extract 的取框与放行策略
    pub fn extract_batch(&self, frames: &[RgbImage]) -> Result<Vec<RgbImage>, PrepError> {
        let locations_batch =
            self.detector
                .locate_batch(frames, frames.len(), self.number_of_times_to_upsample);
        frames
            .iter()
            .zip(&locations_batch)
            .map(|(frame, locations)| match locations.first() {
                None => Ok(frame.clone()),
                Some(location) => select_face(frame, location, self.preferred_size),
            })
            .collect()
    }
}

/// 测试用检测器，返回预设框或按帧内容生成
pub struct MockFaceDetector {
    pattern: Option<Box<dyn Fn(&RgbImage) -> Vec<FaceBox> + Send + Sync>>,
}

impl MockFaceDetector {
    /// 永远检不出人脸
    pub fn new() -> Self {
        Self { pattern: None }
    }

    pub fn with_boxes(boxes: Vec<FaceBox>) -> Self {
        Self {
            pattern: Some(Box::new(move |_| boxes.clone())),
        }
    }

    pub fn with_pattern<F>(pattern: F) -> Self
    where
        F: Fn(&RgbImage) -> Vec<FaceBox> + Send + Sync + 'static,
    {
        Self {
            pattern: Some(Box::new(pattern)),
        }
    }
}

impl Default for MockFaceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceDetector for MockFaceDetector {
    fn locate(
        &self,
        frame: &RgbImage,
        _model: FaceDetectionModel,
        _number_of_times_to_upsample: u32,
    ) -> Vec<FaceBox> {
        self.pattern
            .as_ref()
            .map(|pattern| pattern(frame))
            .unwrap_or_default()
    }
}
