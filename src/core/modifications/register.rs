//! 修改注册表
//!
//! 配置里的名字在这里换成构造函数，未注册的名字在加载阶段直接失败。

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::core::error::PrepError;
use crate::core::modifications::primitives::Primitive;
use crate::core::modifications::specification::Modification;
use crate::core::settings::{ModificationSettings, OptionMap};

pub type BuildFn = fn(&OptionMap) -> Result<Primitive, PrepError>;

static DEFAULT_REGISTER: Lazy<ModificationRegister> = Lazy::new(ModificationRegister::default);

/// 未显式传注册表时共用的默认表
pub fn default_register() -> &'static ModificationRegister {
    &DEFAULT_REGISTER
}

pub struct ModificationRegister {
    builders: HashMap<&'static str, BuildFn>,
}

impl ModificationRegister {
    pub fn empty() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &'static str, builder: BuildFn) {
        self.builders.insert(name, builder);
    }

    pub fn resolve(&self, name: &str) -> Result<BuildFn, PrepError> {
        self.builders
            .get(name)
            .copied()
            .ok_or_else(|| PrepError::UnregisteredModification(name.to_string()))
    }

    /// 按配置构造单个修改
    pub fn build(&self, settings: &ModificationSettings) -> Result<Modification, PrepError> {
        let builder = self.resolve(&settings.name)?;
        Ok(Modification::Primitive(builder(&settings.options)?))
    }
}

impl Default for ModificationRegister {
    fn default() -> Self {
        let mut register = Self::empty();
        register.register("histogram_equalization", build_histogram_equalization);
        register.register("clahe", build_clahe);
        register.register("gamma_correction", build_gamma_correction);
        register.register("gaussian_blur", build_gaussian_blur);
        register.register("median_filter", build_median_filter);
        register.register("gaussian_noise", build_gaussian_noise);
        register
    }
}

// ---------------------------------------------------------------
// 构造函数与选项校验
// ---------------------------------------------------------------

fn invalid(modification: &'static str, option: &str, reason: &str) -> PrepError {
    PrepError::InvalidOption {
        modification,
        option: option.to_string(),
        reason: reason.to_string(),
    }
}

fn ensure_known(
    modification: &'static str,
    options: &OptionMap,
    allowed: &[&str],
) -> Result<(), PrepError> {
    for key in options.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(invalid(modification, key, "is not recognized"));
        }
    }
    Ok(())
}

fn require_f32(
    modification: &'static str,
    options: &OptionMap,
    key: &str,
) -> Result<f32, PrepError> {
    let value = options
        .get(key)
        .ok_or_else(|| invalid(modification, key, "is required"))?;
    value
        .as_f64()
        .map(|v| v as f32)
        .ok_or_else(|| invalid(modification, key, "must be a number"))
}

fn optional_f32(
    modification: &'static str,
    options: &OptionMap,
    key: &str,
    default: f32,
) -> Result<f32, PrepError> {
    match options.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_f64()
            .map(|v| v as f32)
            .ok_or_else(|| invalid(modification, key, "must be a number")),
    }
}

fn require_u32(
    modification: &'static str,
    options: &OptionMap,
    key: &str,
) -> Result<u32, PrepError> {
    let value = options
        .get(key)
        .ok_or_else(|| invalid(modification, key, "is required"))?;
    value
        .as_i64()
        .filter(|v| *v >= 0)
        .map(|v| v as u32)
        .ok_or_else(|| invalid(modification, key, "must be a non-negative integer"))
}

fn optional_u32(
    modification: &'static str,
    options: &OptionMap,
    key: &str,
    default: u32,
) -> Result<u32, PrepError> {
    match options.get(key) {
        None => Ok(default),
        Some(value) => value
            .as_i64()
            .filter(|v| *v >= 0)
            .map(|v| v as u32)
            .ok_or_else(|| invalid(modification, key, "must be a non-negative integer")),
    }
}

fn build_histogram_equalization(options: &OptionMap) -> Result<Primitive, PrepError> {
    ensure_known("histogram_equalization", options, &[])?;
    Ok(Primitive::HistogramEqualization)
}

fn build_clahe(options: &OptionMap) -> Result<Primitive, PrepError> {
    ensure_known("clahe", options, &["clip_limit", "grid_width", "grid_height"])?;
    let clip_limit = require_f32("clahe", options, "clip_limit")?;
    if clip_limit <= 0.0 {
        return Err(invalid("clahe", "clip_limit", "must be positive"));
    }
    let grid_width = require_u32("clahe", options, "grid_width")?;
    let grid_height = require_u32("clahe", options, "grid_height")?;
    if grid_width == 0 || grid_height == 0 {
        return Err(invalid("clahe", "grid_width", "grid must be at least 1x1"));
    }
    Ok(Primitive::Clahe {
        clip_limit,
        grid_width,
        grid_height,
    })
}

fn build_gamma_correction(options: &OptionMap) -> Result<Primitive, PrepError> {
    ensure_known("gamma_correction", options, &["gamma_value"])?;
    let gamma_value = require_f32("gamma_correction", options, "gamma_value")?;
    if gamma_value <= 0.0 {
        return Err(invalid("gamma_correction", "gamma_value", "must be positive"));
    }
    Ok(Primitive::GammaCorrection { gamma_value })
}

fn build_gaussian_blur(options: &OptionMap) -> Result<Primitive, PrepError> {
    ensure_known(
        "gaussian_blur",
        options,
        &["kernel_width", "kernel_height", "sigma_x", "sigma_y"],
    )?;
    let kernel_width = optional_u32("gaussian_blur", options, "kernel_width", 0)?;
    let kernel_height = optional_u32("gaussian_blur", options, "kernel_height", 0)?;
    // 核边长要么缺省要么为奇数
    for (key, value) in [("kernel_width", kernel_width), ("kernel_height", kernel_height)] {
        if value != 0 && value % 2 == 0 {
            return Err(invalid("gaussian_blur", key, "must be zero or odd"));
        }
    }
    let sigma_x = optional_f32("gaussian_blur", options, "sigma_x", 0.0)?;
    let sigma_y = optional_f32("gaussian_blur", options, "sigma_y", 0.0)?;
    if sigma_x < 0.0 || sigma_y < 0.0 {
        return Err(invalid("gaussian_blur", "sigma_x", "must not be negative"));
    }
    Ok(Primitive::GaussianBlur {
        kernel_width,
        kernel_height,
        sigma_x,
        sigma_y,
    })
}

fn build_median_filter(options: &OptionMap) -> Result<Primitive, PrepError> {
    ensure_known("median_filter", options, &["aperture_size"])?;
    let aperture_size = require_u32("median_filter", options, "aperture_size")?;
    if aperture_size % 2 == 0 {
        return Err(invalid("median_filter", "aperture_size", "must be odd"));
    }
    Ok(Primitive::MedianFilter { aperture_size })
}

fn build_gaussian_noise(options: &OptionMap) -> Result<Primitive, PrepError> {
    ensure_known("gaussian_noise", options, &["mean", "standard_deviation"])?;
    let mean = optional_f32("gaussian_noise", options, "mean", 0.0)?;
    let standard_deviation = optional_f32("gaussian_noise", options, "standard_deviation", 1.0)?;
    if standard_deviation < 0.0 {
        return Err(invalid(
            "gaussian_noise",
            "standard_deviation",
            "must not be negative",
        ));
    }
    Ok(Primitive::GaussianNoise {
        mean,
        standard_deviation,
    })
}
