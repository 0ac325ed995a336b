//! 数据集预处理门面
//!
//! 把帧分配引擎和人脸裁剪串成落盘流程：真帧经过修改链后裁脸，
//! 假帧只裁脸，可单帧可批量。输出布局供下游分类器的数据装载使用。

use std::ffi::OsString;
use std::fs;
use std::path::Path;

use image::RgbImage;
use log::info;

use crate::core::error::PrepError;
use crate::core::faces::FaceExtractor;
use crate::core::generator::ModificationGenerator;

pub mod split;

pub use split::{split_dataset, split_dataset_with_seed, SplitRatios};

/// 真脸帧类目录名
pub const REALS_DIR: &str = "reals";
/// 假脸帧类目录名
pub const FAKES_DIR: &str = "fakes";

/// 真帧通道：逐帧套用被指派的修改链，裁脸后写入
/// `output/<修改名>/<原文件名>`
pub fn modify_frames(
    generator: &mut ModificationGenerator,
    face_extractor: &FaceExtractor,
    input_path: &Path,
    output_path: &Path,
) -> Result<(), PrepError> {
    info!("modifying frames from {}", input_path.display());
    let mut written = 0usize;
    for modified in generator.from_directory(input_path)? {
        let modified = modified?;
        let file_name = modified
            .original_path
            .file_name()
            .expect("directory entries have file names");
        let target_dir = output_path.join(&modified.modification_used);
        fs::create_dir_all(&target_dir)?;
        let face = face_extractor.extract(&modified.frame)?;
        face.save(target_dir.join(file_name))?;
        written += 1;
    }
    info!("wrote {} modified frames to {}", written, output_path.display());
    Ok(())
}

/// 假帧通道，逐帧检测
pub fn extract_faces_one_by_one(
    face_extractor: &FaceExtractor,
    input_path: &Path,
    output_path: &Path,
) -> Result<(), PrepError> {
    if !input_path.is_dir() {
        return Err(PrepError::NotADirectory(input_path.to_path_buf()));
    }
    fs::create_dir_all(output_path)?;
    for entry in fs::read_dir(input_path)? {
        let path = entry?.path();
        let frame = image::open(&path)?.to_rgb8();
        let face = face_extractor.extract(&frame)?;
        let file_name = path.file_name().expect("directory entries have file names");
        face.save(output_path.join(file_name))?;
    }
    Ok(())
}

/// 假帧通道，整批送一次检测调用
pub fn extract_faces_in_batches(
    face_extractor: &FaceExtractor,
    input_path: &Path,
    output_path: &Path,
    batch_size: usize,
) -> Result<(), PrepError> {
    if !input_path.is_dir() {
        return Err(PrepError::NotADirectory(input_path.to_path_buf()));
    }
    fs::create_dir_all(output_path)?;

    let pairs = fs::read_dir(input_path)?.map(|entry| -> Result<(RgbImage, OsString), PrepError> {
        let path = entry?.path();
        let frame = image::open(&path)?.to_rgb8();
        let file_name = path
            .file_name()
            .expect("directory entries have file names")
            .to_os_string();
        Ok((frame, file_name))
    });

    for batch in FrameBatches::new(pairs, batch_size) {
        let batch = batch?;
        let frames: Vec<RgbImage> = batch.iter().map(|(frame, _)| frame.clone()).collect();
        let faces = face_extractor.extract_batch(&frames)?;
        for ((_, file_name), face) in batch.iter().zip(faces) {
            face.save(output_path.join(file_name))?;
        }
    }
    Ok(())
}

/// 按尺寸与批量上限成批聚帧。尺寸变化说明换了视频，立即断批，
/// 异源帧不会混进同一次推理。
struct FrameBatches<I> {
    inner: I,
    batch_size: usize,
    pending: Option<(RgbImage, OsString)>,
    done: bool,
}

impl<I> FrameBatches<I>
where
    I: Iterator<Item = Result<(RgbImage, OsString), PrepError>>,
{
    fn new(inner: I, batch_size: usize) -> Self {
        Self {
            inner,
            batch_size: batch_size.max(1),
            pending: None,
            done: false,
        }
    }
}

impl<I> Iterator for FrameBatches<I>
where
    I: Iterator<Item = Result<(RgbImage, OsString), PrepError>>,
{
    type Item = Result<Vec<(RgbImage, OsString)>, PrepError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut batch = Vec::new();
        if let Some(pending) = self.pending.take() {
            batch.push(pending);
        }
        while batch.len() < self.batch_size {
            match self.inner.next() {
                None => {
                    self.done = true;
                    break;
                }
                Some(Err(error)) => return Some(Err(error)),
                Some(Ok(pair)) => {
                    if !batch.is_empty() && batch[0].0.dimensions() != pair.0.dimensions() {
                        self.pending = Some(pair);
                        break;
                    }
                    batch.push(pair);
                }
            }
        }
        if batch.is_empty() {
            None
        } else {
            Some(Ok(batch))
        }
    }
}
