use image::DynamicImage;
use std::io::Cursor;

/// EXIFの Orientation タグ (1-8) を取得
pub fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let mut cursor = Cursor::new(bytes);
    let exif = exif::Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    field.value.get_uint(0)
}

/// Orientation に従って画像を正立させる
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn marked() -> DynamicImage {
        // 3x2、左上だけ赤
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    fn red_at(img: &DynamicImage) -> (u32, u32) {
        let rgb = img.to_rgb8();
        for (x, y, p) in rgb.enumerate_pixels() {
            if p[0] == 255 {
                return (x, y);
            }
        }
        panic!("marker not found");
    }

    #[test]
    fn test_orientation_normal_is_identity() {
        let out = apply_orientation(marked(), 1);
        assert_eq!((out.width(), out.height()), (3, 2));
        assert_eq!(red_at(&out), (0, 0));
    }

    #[test]
    fn test_orientation_rotate_90() {
        let out = apply_orientation(marked(), 6);
        assert_eq!((out.width(), out.height()), (2, 3));
        assert_eq!(red_at(&out), (1, 0));
    }

    #[test]
    fn test_orientation_transpose() {
        let out = apply_orientation(marked(), 5);
        assert_eq!((out.width(), out.height()), (2, 3));
        assert_eq!(red_at(&out), (0, 0));
    }

    #[test]
    fn test_read_orientation_without_exif() {
        assert_eq!(read_orientation(b"not an image"), None);
    }
}
