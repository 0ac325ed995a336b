//! 数据集划分
//!
//! 输入目录按类分子目录，每类独立洗牌后按比例切成训练、验证、测试三份。

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::core::error::PrepError;

pub const TRAIN_DIR: &str = "train";
pub const VALIDATION_DIR: &str = "validation";
pub const TEST_DIR: &str = "test";

/// 三份比例，必须加和为一
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatios {
    pub train: f64,
    pub validation: f64,
    pub test: f64,
}

impl SplitRatios {
    pub fn new(train: f64, validation: f64, test: f64) -> Result<Self, PrepError> {
        let total = train + validation + test;
        if (total - 1.0).abs() > 1e-9 {
            return Err(PrepError::InvalidSplitRatios(total));
        }
        Ok(Self {
            train,
            validation,
            test,
        })
    }
}

impl Default for SplitRatios {
    fn default() -> Self {
        Self {
            train: 0.6,
            validation: 0.2,
            test: 0.2,
        }
    }
}

pub fn split_dataset(
    input_path: &Path,
    output_path: &Path,
    ratios: &SplitRatios,
) -> Result<(), PrepError> {
    split_dataset_with_rng(input_path, output_path, ratios, &mut StdRng::from_entropy())
}

/// 固定种子，同一种子下划分结果可复现
pub fn split_dataset_with_seed(
    input_path: &Path,
    output_path: &Path,
    ratios: &SplitRatios,
    seed: u64,
) -> Result<(), PrepError> {
    split_dataset_with_rng(input_path, output_path, ratios, &mut StdRng::seed_from_u64(seed))
}

fn split_dataset_with_rng(
    input_path: &Path,
    output_path: &Path,
    ratios: &SplitRatios,
    rng: &mut StdRng,
) -> Result<(), PrepError> {
    if !input_path.is_dir() {
        return Err(PrepError::NotADirectory(input_path.to_path_buf()));
    }
    for class_entry in fs::read_dir(input_path)? {
        let class_path = class_entry?.path();
        if !class_path.is_dir() {
            continue;
        }
        let class_name = class_path
            .file_name()
            .expect("directory entries have file names")
            .to_os_string();

        let mut files: Vec<PathBuf> = fs::read_dir(&class_path)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<_, _>>()?;
        // 洗牌前排序，种子相同时结果与枚举顺序无关
        files.sort();
        files.shuffle(rng);

        let no_files = files.len();
        let train_count = (ratios.train * no_files as f64) as usize;
        let validation_count = (ratios.validation * no_files as f64) as usize;

        let subsets = [
            (TRAIN_DIR, &files[..train_count]),
            (VALIDATION_DIR, &files[train_count..train_count + validation_count]),
            (TEST_DIR, &files[train_count + validation_count..]),
        ];
        for (subset, subset_files) in subsets {
            let target_dir = output_path.join(subset).join(&class_name);
            fs::create_dir_all(&target_dir)?;
            subset_files.par_iter().try_for_each(|file| {
                let file_name = file.file_name().expect("files have names");
                fs::copy(file, target_dir.join(file_name)).map(|_| ())
            })?;
        }
        info!(
            "class {}: {} train / {} validation / {} test",
            class_name.to_string_lossy(),
            train_count,
            validation_count,
            no_files - train_count - validation_count,
        );
    }
    Ok(())
}
