use image::{DynamicImage, GrayImage};
use kornia::{
    image::{Image, ImageError, ImageSize, allocator::CpuAllocator},
    imgproc,
};
use tracing::warn;

type CpuImage<T, const C: usize> = Image<T, C, CpuAllocator>;

/// Converts any page raster into a single-channel 8-bit intensity image.
pub fn greyscale(source: &DynamicImage) -> GrayImage {
    if let DynamicImage::ImageLuma8(gray) = source {
        return gray.clone();
    }
    match greyscale_kornia(source) {
        Ok(gray) => gray,
        Err(e) => {
            warn!(error = %e, "kornia greyscale conversion failed, using luma fallback");
            source.to_luma8()
        }
    }
}

fn greyscale_kornia(source: &DynamicImage) -> Result<GrayImage, ImageError> {
    let rgb = source.to_rgb8();
    let (width, height) = rgb.dimensions();
    if width == 0 || height == 0 {
        return Ok(GrayImage::new(width, height));
    }

    let image = CpuImage::<u8, 3>::new(
        ImageSize {
            width: width as usize,
            height: height as usize,
        },
        rgb.into_raw(),
        CpuAllocator,
    )?;
    let mut gray = CpuImage::<u8, 1>::from_size_val(image.size(), 0u8, CpuAllocator)?;
    imgproc::color::gray_from_rgb_u8(&image, &mut gray)?;

    Ok(gray_buffer(width, height, gray.as_slice().to_vec(), source))
}

/// Wraps a converted buffer; a length mismatch falls back to the `image`
/// crate's own luma conversion of `source`.
fn gray_buffer(width: u32, height: u32, data: Vec<u8>, source: &DynamicImage) -> GrayImage {
    GrayImage::from_raw(width, height, data).unwrap_or_else(|| {
        warn!(width, height, "greyscale buffer size mismatch, using luma fallback");
        source.to_luma8()
    })
}
