//! 帧分配引擎
//!
//! 按权重份额把目录内的帧指派给各修改链：抽一次随机置换，
//! 用累计份额换算的整数区间查表。份额换算按帧数取整，数量精确。

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::core::error::PrepError;
use crate::core::modifications::register::{default_register, ModificationRegister};
use crate::core::modifications::specification::Modification;
use crate::core::settings::GeneratorSettings;

/// 一条修改链及其应占的帧份额
#[derive(Debug, Clone)]
pub struct ModificationShare {
    pub modification: Modification,
    pub share: f64,
}

/// 置换索引区间，双端含界
#[derive(Debug, Clone)]
pub struct ModificationRange {
    pub modification: Modification,
    pub lower_bound: i64,
    pub upper_bound: i64,
}

/// 引擎产出的单帧记录
#[derive(Debug, Clone)]
pub struct ModifiedFrame {
    pub modification_used: String,
    pub frame: RgbImage,
    pub original_path: PathBuf,
}

/// 同一帧数复用的区间表与置换
#[derive(Debug, Clone)]
struct Assignment {
    ranges: Vec<ModificationRange>,
    permutation: Vec<usize>,
}

pub struct ModificationGenerator {
    shares: Vec<ModificationShare>,
    cache: HashMap<usize, Assignment>,
    rng: StdRng,
}

impl ModificationGenerator {
    pub fn new(settings: &GeneratorSettings) -> Result<Self, PrepError> {
        Self::build(settings, default_register(), StdRng::from_entropy())
    }

    pub fn with_register(
        settings: &GeneratorSettings,
        register: &ModificationRegister,
    ) -> Result<Self, PrepError> {
        Self::build(settings, register, StdRng::from_entropy())
    }

    /// 固定种子，同一种子下两次构造指派结果一致
    pub fn with_seed(settings: &GeneratorSettings, seed: u64) -> Result<Self, PrepError> {
        Self::build(settings, default_register(), StdRng::seed_from_u64(seed))
    }

    fn build(
        settings: &GeneratorSettings,
        register: &ModificationRegister,
        rng: StdRng,
    ) -> Result<Self, PrepError> {
        let shares = Self::build_shares(settings, register)?;
        Ok(Self {
            shares,
            cache: HashMap::new(),
            rng,
        })
    }

    /// 链在构造期组装完毕，名字冲突在碰任何帧之前就失败
    fn build_shares(
        settings: &GeneratorSettings,
        register: &ModificationRegister,
    ) -> Result<Vec<ModificationShare>, PrepError> {
        let mut shares = Vec::with_capacity(settings.chains.len());
        for chain in &settings.chains {
            let modifications = chain
                .modifications
                .iter()
                .map(|modification| register.build(modification))
                .collect::<Result<Vec<_>, _>>()?;
            shares.push(ModificationShare {
                modification: Modification::compose(modifications),
                share: chain.share,
            });
        }

        let mut seen = HashSet::new();
        for share in &shares {
            let name = share.modification.name();
            if !seen.insert(name.clone()) {
                return Err(PrepError::DuplicateModification(name));
            }
        }
        Ok(shares)
    }

    /// 清空按帧数缓存的区间表与置换
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    /// 惰性产出目录下每帧的修改结果，枚举顺序沿用文件系统自然顺序
    pub fn from_directory(&mut self, input_path: &Path) -> Result<ModifiedFrames, PrepError> {
        if !input_path.is_dir() {
            return Err(PrepError::NotADirectory(input_path.to_path_buf()));
        }
        let no_frames = fs::read_dir(input_path)?.count();
        let assignment = self.assignment_for(no_frames).clone();
        Ok(ModifiedFrames {
            entries: fs::read_dir(input_path)?,
            index: 0,
            assignment,
        })
    }

    fn assignment_for(&mut self, no_frames: usize) -> &Assignment {
        if !self.cache.contains_key(&no_frames) {
            let ranges = self.build_ranges(no_frames);
            let mut permutation: Vec<usize> = (0..no_frames).collect();
            permutation.shuffle(&mut self.rng);
            self.cache.insert(
                no_frames,
                Assignment {
                    ranges,
                    permutation,
                },
            );
        }
        &self.cache[&no_frames]
    }

    /// 按配置顺序累计份额换算区间；末尾恒等区间上界为 no_frames，不减一
    fn build_ranges(&self, no_frames: usize) -> Vec<ModificationRange> {
        let mut ranges = Vec::with_capacity(self.shares.len() + 1);
        let mut current_summed_share = 0.0;
        for share in &self.shares {
            let new_summed_share = current_summed_share + share.share;
            ranges.push(ModificationRange {
                modification: share.modification.clone(),
                lower_bound: (current_summed_share * no_frames as f64) as i64,
                upper_bound: (new_summed_share * no_frames as f64) as i64 - 1,
            });
            current_summed_share = new_summed_share;
        }
        ranges.push(ModificationRange {
            modification: Modification::Identity,
            lower_bound: (current_summed_share * no_frames as f64) as i64,
            upper_bound: no_frames as i64,
        });
        ranges
    }
}

pub struct ModifiedFrames {
    entries: fs::ReadDir,
    index: usize,
    assignment: Assignment,
}

impl ModifiedFrames {
    fn modify(&self, index: usize, path: PathBuf) -> Result<ModifiedFrame, PrepError> {
        let permuted_index = *self
            .assignment
            .permutation
            .get(index)
            .ok_or(PrepError::UnassignedFrame(index))?;
        // 区间连续不相交，顺序扫描取首个命中
        let range = self
            .assignment
            .ranges
            .iter()
            .find(|range| {
                range.lower_bound <= permuted_index as i64
                    && permuted_index as i64 <= range.upper_bound
            })
            .ok_or(PrepError::UnassignedFrame(permuted_index))?;

        let frame = image::open(&path)?.to_rgb8();
        Ok(ModifiedFrame {
            modification_used: range.modification.name(),
            frame: range.modification.apply(&frame),
            original_path: path,
        })
    }
}

impl Iterator for ModifiedFrames {
    type Item = Result<ModifiedFrame, PrepError>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = match self.entries.next()? {
            Ok(entry) => entry,
            Err(error) => return Some(Err(error.into())),
        };
        let index = self.index;
        self.index += 1;
        Some(self.modify(index, entry.path()))
    }
}
