//! RGB 与 YCbCr 平面互转
//!
//! 直方图类修改只动亮度通道，色度原样保留。

use image::RgbImage;

/// 拆分后的 YCbCr 平面
pub struct YcbcrPlanes {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
    pub cb: Vec<u8>,
    pub cr: Vec<u8>,
}

/// BT.601 全幅度正变换
pub fn split_ycbcr(image: &RgbImage) -> YcbcrPlanes {
    let (width, height) = image.dimensions();
    let pixel_count = (width * height) as usize;
    let mut luma = Vec::with_capacity(pixel_count);
    let mut cb = Vec::with_capacity(pixel_count);
    let mut cr = Vec::with_capacity(pixel_count);

    for pixel in image.pixels() {
        let r = pixel[0] as f32;
        let g = pixel[1] as f32;
        let b = pixel[2] as f32;

        let y = 0.299 * r + 0.587 * g + 0.114 * b;
        let cb_val = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
        let cr_val = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;

        luma.push(y.round().clamp(0.0, 255.0) as u8);
        cb.push(cb_val.round().clamp(0.0, 255.0) as u8);
        cr.push(cr_val.round().clamp(0.0, 255.0) as u8);
    }

    YcbcrPlanes {
        width,
        height,
        luma,
        cb,
        cr,
    }
}

pub fn merge_ycbcr(planes: &YcbcrPlanes) -> RgbImage {
    let mut data = Vec::with_capacity(planes.luma.len() * 3);

    for idx in 0..planes.luma.len() {
        let y = planes.luma[idx] as f32;
        let cb = planes.cb[idx] as f32 - 128.0;
        let cr = planes.cr[idx] as f32 - 128.0;

        let r = (y + 1.402 * cr).round().clamp(0.0, 255.0) as u8;
        let g = (y - 0.344136 * cb - 0.714136 * cr)
            .round()
            .clamp(0.0, 255.0) as u8;
        let b = (y + 1.772 * cb).round().clamp(0.0, 255.0) as u8;

        data.push(r);
        data.push(g);
        data.push(b);
    }

    RgbImage::from_raw(planes.width, planes.height, data)
        .expect("plane length matches dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_gray_pixel_round_trip() {
        let image = RgbImage::from_pixel(4, 4, Rgb([128, 128, 128]));
        let planes = split_ycbcr(&image);
        assert!(planes.luma.iter().all(|&y| y == 128));
        assert!(planes.cb.iter().all(|&c| c == 128));
        assert!(planes.cr.iter().all(|&c| c == 128));

        let restored = merge_ycbcr(&planes);
        assert_eq!(restored, image);
    }

    #[test]
    fn test_round_trip_close_to_original() {
        let mut image = RgbImage::new(8, 8);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 31) as u8, (y * 29) as u8, ((x + y) * 17) as u8]);
        }

        let restored = merge_ycbcr(&split_ycbcr(&image));
        for (original, restored) in image.pixels().zip(restored.pixels()) {
            for channel in 0..3 {
                let diff = (original[channel] as i16 - restored[channel] as i16).abs();
                assert!(diff <= 2, "channel drifted by {}", diff);
            }
        }
    }

    #[test]
    fn test_dimensions_preserved() {
        let image = RgbImage::new(5, 3);
        let planes = split_ycbcr(&image);
        assert_eq!(planes.width, 5);
        assert_eq!(planes.height, 3);
        assert_eq!(planes.luma.len(), 15);
        let restored = merge_ycbcr(&planes);
        assert_eq!(restored.dimensions(), (5, 3));
    }
}
