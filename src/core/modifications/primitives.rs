//! 基础修改集
//!
//! 每种修改都是确定性的像素变换，name 编码全部影响输出的参数。

use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::core::modifications::colorspace::{merge_ycbcr, split_ycbcr};

/// 单个基础修改
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// 亮度通道全局直方图均衡
    HistogramEqualization,
    /// 限对比度自适应直方图均衡，grid 为瓦片数量
    Clahe {
        clip_limit: f32,
        grid_width: u32,
        grid_height: u32,
    },
    GammaCorrection {
        gamma_value: f32,
    },
    /// 可分离高斯模糊，核尺寸为 0 时按 sigma 推导
    GaussianBlur {
        kernel_width: u32,
        kernel_height: u32,
        sigma_x: f32,
        sigma_y: f32,
    },
    MedianFilter {
        aperture_size: u32,
    },
    /// 加性高斯噪声，采样种子由参数决定，同参数输出恒定
    GaussianNoise {
        mean: f32,
        standard_deviation: f32,
    },
}

impl Primitive {
    pub fn name(&self) -> String {
        match self {
            Primitive::HistogramEqualization => "histogram_equalization".to_string(),
            Primitive::Clahe {
                clip_limit,
                grid_width,
                grid_height,
            } => format!("clahe_{}_{}_{}", clip_limit, grid_width, grid_height),
            Primitive::GammaCorrection { gamma_value } => {
                format!("gamma_correction_{}", gamma_value)
            }
            Primitive::GaussianBlur {
                kernel_width,
                kernel_height,
                sigma_x,
                sigma_y,
            } => format!(
                "gaussian_blur{}_{}_{}_{}",
                kernel_width, kernel_height, sigma_x, sigma_y
            ),
            Primitive::MedianFilter { aperture_size } => {
                format!("median_filter_{}", aperture_size)
            }
            Primitive::GaussianNoise {
                mean,
                standard_deviation,
            } => format!("gaussian_noise{}_{}", mean, standard_deviation),
        }
    }

    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        match self {
            Primitive::HistogramEqualization => equalize_histogram(image),
            Primitive::Clahe {
                clip_limit,
                grid_width,
                grid_height,
            } => equalize_clahe(image, *clip_limit, *grid_width, *grid_height),
            Primitive::GammaCorrection { gamma_value } => correct_gamma(image, *gamma_value),
            Primitive::GaussianBlur {
                kernel_width,
                kernel_height,
                sigma_x,
                sigma_y,
            } => gaussian_blur(image, *kernel_width, *kernel_height, *sigma_x, *sigma_y),
            Primitive::MedianFilter { aperture_size } => median_filter(image, *aperture_size),
            Primitive::GaussianNoise {
                mean,
                standard_deviation,
            } => gaussian_noise(image, *mean, *standard_deviation),
        }
    }
}

// ---------------------------------------------------------------
// 直方图均衡
// ---------------------------------------------------------------

/// 256 桶直方图 -> CDF -> 查找表
fn build_lut(hist: &[u32; 256], total: usize) -> [u8; 256] {
    let mut cdf = [0u32; 256];
    cdf[0] = hist[0];
    for i in 1..256 {
        cdf[i] = cdf[i - 1] + hist[i];
    }

    let cdf_min = cdf.iter().copied().find(|&c| c > 0).unwrap_or(0);

    let mut lut = [0u8; 256];
    let denom = total as f32 - cdf_min as f32;
    if denom <= 0.0 {
        // 全图同值
        return lut;
    }

    for i in 0..256 {
        let value = (cdf[i] as f32 - cdf_min as f32) / denom * 255.0;
        lut[i] = value.round().clamp(0.0, 255.0) as u8;
    }
    lut
}

fn equalize_histogram(image: &RgbImage) -> RgbImage {
    if image.width() == 0 || image.height() == 0 {
        return image.clone();
    }

    let mut planes = split_ycbcr(image);

    let mut hist = [0u32; 256];
    for &value in &planes.luma {
        hist[value as usize] += 1;
    }
    let lut = build_lut(&hist, planes.luma.len());

    for value in planes.luma.iter_mut() {
        *value = lut[*value as usize];
    }
    merge_ycbcr(&planes)
}

fn equalize_clahe(image: &RgbImage, clip_limit: f32, grid_width: u32, grid_height: u32) -> RgbImage {
    let width = image.width() as usize;
    let height = image.height() as usize;
    if width == 0 || height == 0 {
        return image.clone();
    }

    let tile_width = (width + grid_width.max(1) as usize - 1) / grid_width.max(1) as usize;
    let tile_height = (height + grid_height.max(1) as usize - 1) / grid_height.max(1) as usize;
    // 小图可能铺不满整个网格，只保留落在图内的瓦片
    let cols = (width + tile_width - 1) / tile_width;
    let rows = (height + tile_height - 1) / tile_height;

    let mut planes = split_ycbcr(image);

    // 每个瓦片一张查找表
    let mut tile_luts = vec![[0u8; 256]; cols * rows];
    for ty in 0..rows {
        for tx in 0..cols {
            let x0 = tx * tile_width;
            let y0 = ty * tile_height;
            let x1 = (x0 + tile_width).min(width);
            let y1 = (y0 + tile_height).min(height);
            let tile_pixels = (x1 - x0) * (y1 - y0);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[planes.luma[y * width + x] as usize] += 1;
                }
            }

            if clip_limit > 0.0 {
                clip_histogram(&mut hist, tile_pixels, clip_limit);
            }
            tile_luts[ty * cols + tx] = build_lut(&hist, tile_pixels);
        }
    }

    // 像素在四张最近瓦片查找表之间双线性插值
    let tile_cx = |tx: usize| (tx as f32 + 0.5) * tile_width as f32;
    let tile_cy = |ty: usize| (ty as f32 + 0.5) * tile_height as f32;

    let mut equalized = vec![0u8; planes.luma.len()];
    for y in 0..height {
        for x in 0..width {
            let fx = (x as f32 / tile_width as f32) - 0.5;
            let fy = (y as f32 / tile_height as f32) - 0.5;

            let tx0 = (fx.floor() as isize).max(0) as usize;
            let ty0 = (fy.floor() as isize).max(0) as usize;
            let tx1 = (tx0 + 1).min(cols - 1);
            let ty1 = (ty0 + 1).min(rows - 1);

            let ax = if tx0 == tx1 {
                0.0
            } else {
                ((x as f32 - tile_cx(tx0)) / (tile_cx(tx1) - tile_cx(tx0))).clamp(0.0, 1.0)
            };
            let ay = if ty0 == ty1 {
                0.0
            } else {
                ((y as f32 - tile_cy(ty0)) / (tile_cy(ty1) - tile_cy(ty0))).clamp(0.0, 1.0)
            };

            let value = planes.luma[y * width + x] as usize;
            let v00 = tile_luts[ty0 * cols + tx0][value] as f32;
            let v10 = tile_luts[ty0 * cols + tx1][value] as f32;
            let v01 = tile_luts[ty1 * cols + tx0][value] as f32;
            let v11 = tile_luts[ty1 * cols + tx1][value] as f32;

            let mixed = v00 * (1.0 - ax) * (1.0 - ay)
                + v10 * ax * (1.0 - ay)
                + v01 * (1.0 - ax) * ay
                + v11 * ax * ay;
            equalized[y * width + x] = mixed.round().clamp(0.0, 255.0) as u8;
        }
    }

    planes.luma = equalized;
    merge_ycbcr(&planes)
}

/// 截断直方图并平摊溢出计数
fn clip_histogram(hist: &mut [u32; 256], tile_pixels: usize, clip_limit: f32) {
    let clip_value = ((tile_pixels as f32 / 256.0) * clip_limit).ceil().max(1.0) as u32;

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip_value {
            excess += *bin - clip_value;
            *bin = clip_value;
        }
    }

    let per_bin = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += per_bin;
        if i < remainder {
            *bin += 1;
        }
    }
}

// ---------------------------------------------------------------
// 伽马校正
// ---------------------------------------------------------------

fn correct_gamma(image: &RgbImage, gamma_value: f32) -> RgbImage {
    let exponent = 1.0 / gamma_value;
    let mut lut = [0u8; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = ((i as f32 / 255.0).powf(exponent) * 255.0) as u8;
    }

    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        pixel[0] = lut[pixel[0] as usize];
        pixel[1] = lut[pixel[1] as usize];
        pixel[2] = lut[pixel[2] as usize];
    }
    output
}

// ---------------------------------------------------------------
// 高斯模糊
// ---------------------------------------------------------------

/// 单轴高斯核，核长与 sigma 互相推导
fn gaussian_kernel(kernel_size: u32, sigma: f32) -> Vec<f32> {
    let length = if kernel_size == 0 {
        if sigma <= 0.0 {
            return vec![1.0];
        }
        2 * (3.0 * sigma).ceil() as usize + 1
    } else {
        kernel_size as usize
    };
    let sigma = if sigma > 0.0 {
        sigma
    } else {
        0.3 * ((length as f32 - 1.0) * 0.5 - 1.0) + 0.8
    };

    let half = length / 2;
    let two_sigma_sq = 2.0 * sigma * sigma;
    let mut kernel = Vec::with_capacity(length);
    for i in 0..length {
        let x = i as f32 - half as f32;
        kernel.push((-x * x / two_sigma_sq).exp());
    }
    let sum: f32 = kernel.iter().sum();
    for value in &mut kernel {
        *value /= sum;
    }
    kernel
}

fn convolve_rows(src: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
    let half = kernel.len() / 2;
    let mut dst = vec![0.0f32; src.len()];
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                // 边界取最近像素
                let sx = (x as isize + k as isize - half as isize)
                    .clamp(0, width as isize - 1) as usize;
                acc += src[row + sx] * weight;
            }
            dst[row + x] = acc;
        }
    }
    dst
}

fn convolve_cols(src: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
    let half = kernel.len() / 2;
    let mut dst = vec![0.0f32; src.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0f32;
            for (k, &weight) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - half as isize)
                    .clamp(0, height as isize - 1) as usize;
                acc += src[sy * width + x] * weight;
            }
            dst[y * width + x] = acc;
        }
    }
    dst
}

fn gaussian_blur(
    image: &RgbImage,
    kernel_width: u32,
    kernel_height: u32,
    sigma_x: f32,
    sigma_y: f32,
) -> RgbImage {
    let width = image.width() as usize;
    let height = image.height() as usize;
    if width == 0 || height == 0 {
        return image.clone();
    }

    let sigma_y = if sigma_y > 0.0 { sigma_y } else { sigma_x };
    let kernel_x = gaussian_kernel(kernel_width, sigma_x);
    let kernel_y = gaussian_kernel(kernel_height, sigma_y);

    let mut output = image.clone();
    for channel in 0..3 {
        let plane: Vec<f32> = image.pixels().map(|p| p[channel] as f32).collect();
        let blurred = convolve_rows(&plane, width, height, &kernel_x);
        let blurred = convolve_cols(&blurred, width, height, &kernel_y);
        for (pixel, value) in output.pixels_mut().zip(blurred) {
            pixel[channel] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    output
}

// ---------------------------------------------------------------
// 中值滤波
// ---------------------------------------------------------------

fn median_filter(image: &RgbImage, aperture_size: u32) -> RgbImage {
    let width = image.width() as i64;
    let height = image.height() as i64;
    if width == 0 || height == 0 || aperture_size <= 1 {
        return image.clone();
    }

    let half = (aperture_size / 2) as i64;
    let mut output = image.clone();
    let mut window = Vec::with_capacity((aperture_size * aperture_size) as usize);

    for y in 0..height {
        for x in 0..width {
            for channel in 0..3 {
                window.clear();
                for dy in -half..=half {
                    for dx in -half..=half {
                        let sy = (y + dy).clamp(0, height - 1) as u32;
                        let sx = (x + dx).clamp(0, width - 1) as u32;
                        window.push(image.get_pixel(sx, sy)[channel]);
                    }
                }
                window.sort_unstable();
                output.get_pixel_mut(x as u32, y as u32)[channel] = window[window.len() / 2];
            }
        }
    }
    output
}

// ---------------------------------------------------------------
// 高斯噪声
// ---------------------------------------------------------------

/// Box-Muller 正态采样器
struct GaussianSampler {
    rng: StdRng,
    spare: Option<f32>,
}

impl GaussianSampler {
    fn from_params(mean: f32, standard_deviation: f32) -> Self {
        let seed = ((mean.to_bits() as u64) << 32) | standard_deviation.to_bits() as u64;
        Self {
            rng: StdRng::seed_from_u64(seed),
            spare: None,
        }
    }

    fn next(&mut self) -> f32 {
        if let Some(value) = self.spare.take() {
            return value;
        }
        loop {
            let u1: f32 = self.rng.gen();
            if u1 <= f32::EPSILON {
                continue;
            }
            let u2: f32 = self.rng.gen();
            let radius = (-2.0 * u1.ln()).sqrt();
            let theta = 2.0 * std::f32::consts::PI * u2;
            self.spare = Some(radius * theta.sin());
            return radius * theta.cos();
        }
    }
}

fn gaussian_noise(image: &RgbImage, mean: f32, standard_deviation: f32) -> RgbImage {
    let mut sampler = GaussianSampler::from_params(mean, standard_deviation);
    let mut output = image.clone();
    for pixel in output.pixels_mut() {
        for channel in 0..3 {
            let noise = mean + sampler.next() * standard_deviation;
            let value = pixel[channel] as f32 + noise;
            pixel[channel] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn create_gradient_image(width: u32, height: u32) -> RgbImage {
        let mut image = RgbImage::new(width, height);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let value = ((x + y * width) * 7 % 256) as u8;
            *pixel = Rgb([value, value, value]);
        }
        image
    }

    #[test]
    fn test_names_encode_parameters() {
        assert_eq!(
            Primitive::HistogramEqualization.name(),
            "histogram_equalization"
        );
        assert_eq!(
            Primitive::Clahe {
                clip_limit: 2.0,
                grid_width: 8,
                grid_height: 8
            }
            .name(),
            "clahe_2_8_8"
        );
        assert_eq!(
            Primitive::GammaCorrection { gamma_value: 1.5 }.name(),
            "gamma_correction_1.5"
        );
        assert_eq!(
            Primitive::GaussianBlur {
                kernel_width: 5,
                kernel_height: 5,
                sigma_x: 0.0,
                sigma_y: 0.0
            }
            .name(),
            "gaussian_blur5_5_0_0"
        );
        assert_eq!(
            Primitive::MedianFilter { aperture_size: 5 }.name(),
            "median_filter_5"
        );
        assert_eq!(
            Primitive::GaussianNoise {
                mean: 0.0,
                standard_deviation: 1.0
            }
            .name(),
            "gaussian_noise0_1"
        );
    }

    #[test]
    fn test_gamma_lut_is_monotonic() {
        let mut image = RgbImage::new(4, 1);
        for (x, value) in [10u8, 50, 100, 200].into_iter().enumerate() {
            image.put_pixel(x as u32, 0, Rgb([value, value, value]));
        }
        let output = Primitive::GammaCorrection { gamma_value: 1.8 }.apply(&image);
        for x in 1..4 {
            assert!(output.get_pixel(x, 0)[0] >= output.get_pixel(x - 1, 0)[0]);
        }
    }

    #[test]
    fn test_gamma_keeps_endpoints() {
        let mut image = RgbImage::new(2, 1);
        image.put_pixel(0, 0, Rgb([0, 0, 0]));
        image.put_pixel(1, 0, Rgb([255, 255, 255]));
        let output = Primitive::GammaCorrection { gamma_value: 2.2 }.apply(&image);
        assert_eq!(output.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(output.get_pixel(1, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_gamma_brightens_midtones() {
        let image = RgbImage::from_pixel(4, 4, Rgb([64, 64, 64]));
        let output = Primitive::GammaCorrection { gamma_value: 2.0 }.apply(&image);
        assert!(output.get_pixel(0, 0)[0] > 64);
    }

    #[test]
    fn test_histogram_equalization_spreads_range() {
        // 低对比度图像，均衡后范围应拉开
        let mut image = RgbImage::new(16, 16);
        for (x, _, pixel) in image.enumerate_pixels_mut() {
            let value = 100 + (x % 11) as u8;
            *pixel = Rgb([value, value, value]);
        }
        let output = Primitive::HistogramEqualization.apply(&image);
        let min = output.pixels().map(|p| p[0]).min().unwrap();
        let max = output.pixels().map(|p| p[0]).max().unwrap();
        assert!(max - min > 100, "range {}..{} not expanded", min, max);
    }

    #[test]
    fn test_histogram_equalization_constant_stays_constant() {
        let image = RgbImage::from_pixel(8, 8, Rgb([77, 77, 77]));
        let output = Primitive::HistogramEqualization.apply(&image);
        let first = *output.get_pixel(0, 0);
        assert!(output.pixels().all(|p| *p == first));
    }

    #[test]
    fn test_clahe_preserves_dimensions_and_uniformity() {
        let image = RgbImage::from_pixel(33, 17, Rgb([128, 128, 128]));
        let output = Primitive::Clahe {
            clip_limit: 2.0,
            grid_width: 8,
            grid_height: 8,
        }
        .apply(&image);
        assert_eq!(output.dimensions(), (33, 17));
        // 所有瓦片内容相同，插值后仍应均匀
        let first = *output.get_pixel(0, 0);
        assert!(output.pixels().all(|p| *p == first));
    }

    #[test]
    fn test_clahe_changes_bimodal_image() {
        let mut image = RgbImage::new(64, 32);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let base = if x < 32 { 30 } else { 200 };
            let value = base + ((x + y) % 20) as u8;
            *pixel = Rgb([value, value, value]);
        }
        let output = Primitive::Clahe {
            clip_limit: 2.0,
            grid_width: 4,
            grid_height: 4,
        }
        .apply(&image);
        assert_ne!(output, image);
    }

    #[test]
    fn test_gaussian_blur_keeps_constant_image() {
        let image = RgbImage::from_pixel(12, 12, Rgb([90, 120, 150]));
        let output = Primitive::GaussianBlur {
            kernel_width: 5,
            kernel_height: 5,
            sigma_x: 1.2,
            sigma_y: 0.0,
        }
        .apply(&image);
        for pixel in output.pixels() {
            assert_eq!(*pixel, Rgb([90, 120, 150]));
        }
    }

    #[test]
    fn test_gaussian_blur_smooths_checkerboard() {
        let mut image = RgbImage::new(16, 16);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let value = if (x + y) % 2 == 0 { 255 } else { 0 };
            *pixel = Rgb([value, value, value]);
        }
        let output = Primitive::GaussianBlur {
            kernel_width: 3,
            kernel_height: 3,
            sigma_x: 0.0,
            sigma_y: 0.0,
        }
        .apply(&image);
        // 棋盘格被抹平，中心像素远离两个极值
        let center = output.get_pixel(8, 8)[0];
        assert!(center > 60 && center < 200, "center {}", center);
    }

    #[test]
    fn test_median_filter_removes_impulse() {
        let mut image = RgbImage::from_pixel(5, 5, Rgb([0, 0, 0]));
        image.put_pixel(2, 2, Rgb([255, 255, 255]));
        let output = Primitive::MedianFilter { aperture_size: 3 }.apply(&image);
        assert_eq!(output.get_pixel(2, 2), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_gaussian_noise_is_deterministic() {
        let image = create_gradient_image(8, 8);
        let modification = Primitive::GaussianNoise {
            mean: 0.0,
            standard_deviation: 8.0,
        };
        let first = modification.apply(&image);
        let second = modification.apply(&image);
        assert_eq!(first, second);
        assert_ne!(first, image);
    }

    #[test]
    fn test_gaussian_noise_zero_deviation_only_shifts() {
        let image = RgbImage::from_pixel(4, 4, Rgb([100, 100, 100]));
        let output = Primitive::GaussianNoise {
            mean: 10.0,
            standard_deviation: 0.0,
        }
        .apply(&image);
        for pixel in output.pixels() {
            assert_eq!(*pixel, Rgb([110, 110, 110]));
        }
    }
}
