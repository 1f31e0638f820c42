//! Geometric editing of 4:2:0 and monochrome images.
//!
//! Every operation produces a dimensionally consistent copy with tight
//! strides; no color conversion and no gamut change. Applied with the same
//! effect list (scaled to the map resolution), a base image and its gain
//! map stay divisible by a common ratio on both axes.

use crate::types::{Effect, Error, MirrorAxis, PixelBuffer, PixelFormat, Result};
use crate::MAX_BUFFER_SIZE;

fn check_editable(img: &PixelBuffer) -> Result<()> {
    if img.data.is_empty() {
        return Err(Error::BadPointer("image"));
    }
    if img.format != PixelFormat::Yuv420 && img.format != PixelFormat::Monochrome {
        return Err(Error::UnsupportedFeature(
            "editing supports YUV420 and monochrome images only",
        ));
    }
    Ok(())
}

fn new_like(img: &PixelBuffer, width: usize, height: usize) -> Result<PixelBuffer> {
    let out = PixelBuffer::new(width, height, img.format, img.gamut)?;
    if out.total_bytes() > MAX_BUFFER_SIZE {
        return Err(Error::BufferTooSmall {
            needed: out.total_bytes(),
            available: MAX_BUFFER_SIZE,
        });
    }
    Ok(out)
}

/// Keep the inclusive rectangle `[left, right] x [top, bottom]`.
///
/// For 4:2:0 the chroma planes are cropped at `left/2, top/2`.
pub fn crop(
    img: &PixelBuffer,
    left: usize,
    right: usize,
    top: usize,
    bottom: usize,
) -> Result<PixelBuffer> {
    check_editable(img)?;
    if left > right || right >= img.width || top > bottom || bottom >= img.height {
        return Err(Error::InvalidCropping);
    }

    let out_width = right - left + 1;
    let out_height = bottom - top + 1;
    let mut out = new_like(img, out_width, out_height)?;

    let in_luma = img.luma();
    let in_stride = img.luma_stride;
    {
        let (out_luma, _) = out.split_planes_mut();
        for i in 0..out_height {
            let src = (top + i) * in_stride + left;
            out_luma[i * out_width..i * out_width + out_width]
                .copy_from_slice(&in_luma[src..src + out_width]);
        }
    }

    if img.format == PixelFormat::Yuv420 {
        let (in_u, in_v) = img.chroma_planes();
        let in_cs = img.chroma_stride;
        let out_cs = out.chroma_stride;
        let (_, out_chroma) = out.split_planes_mut();
        let (out_u, out_v) = out_chroma.split_at_mut(out_cs * (out_height / 2));
        for i in 0..out_height / 2 {
            let src = (top / 2 + i) * in_cs + left / 2;
            let dst = i * out_cs;
            out_u[dst..dst + out_width / 2].copy_from_slice(&in_u[src..src + out_width / 2]);
            out_v[dst..dst + out_width / 2].copy_from_slice(&in_v[src..src + out_width / 2]);
        }
    }

    Ok(out)
}

fn mirror_plane(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    width: usize,
    height: usize,
    axis: MirrorAxis,
) {
    match axis {
        MirrorAxis::Vertical => {
            for i in 0..height {
                let s = i * src_stride;
                let d = (height - 1 - i) * dst_stride;
                dst[d..d + width].copy_from_slice(&src[s..s + width]);
            }
        }
        MirrorAxis::Horizontal => {
            for i in 0..height {
                for j in 0..width {
                    dst[i * dst_stride + j] = src[i * src_stride + (width - 1 - j)];
                }
            }
        }
    }
}

/// Mirror along the given axis, preserving dimensions.
pub fn mirror(img: &PixelBuffer, axis: MirrorAxis) -> Result<PixelBuffer> {
    check_editable(img)?;
    let mut out = new_like(img, img.width, img.height)?;

    {
        let (out_luma, _) = out.split_planes_mut();
        mirror_plane(
            img.luma(),
            img.luma_stride,
            out_luma,
            img.width,
            img.width,
            img.height,
            axis,
        );
    }

    if img.format == PixelFormat::Yuv420 {
        let (in_u, in_v) = img.chroma_planes();
        let in_cs = img.chroma_stride;
        let (cw, ch) = (img.width / 2, img.height / 2);
        let out_cs = out.chroma_stride;
        let (_, out_chroma) = out.split_planes_mut();
        let (out_u, out_v) = out_chroma.split_at_mut(out_cs * ch);
        mirror_plane(in_u, in_cs, out_u, out_cs, cw, ch, axis);
        mirror_plane(in_v, in_cs, out_v, out_cs, cw, ch, axis);
    }

    Ok(out)
}

fn rotate_plane(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    in_width: usize,
    in_height: usize,
    degrees: u32,
) {
    match degrees {
        90 => {
            // Output is in_height x in_width.
            for i in 0..in_width {
                for j in 0..in_height {
                    dst[i * dst_stride + j] = src[(in_height - 1 - j) * src_stride + i];
                }
            }
        }
        180 => {
            for i in 0..in_height {
                for j in 0..in_width {
                    dst[i * dst_stride + j] =
                        src[(in_height - 1 - i) * src_stride + (in_width - 1 - j)];
                }
            }
        }
        270 => {
            for i in 0..in_width {
                for j in 0..in_height {
                    dst[i * dst_stride + j] = src[j * src_stride + (in_width - 1 - i)];
                }
            }
        }
        _ => unreachable!("validated by rotate()"),
    }
}

/// Rotate clockwise by 90, 180 or 270 degrees.
///
/// Any other angle is rejected with [`Error::InvalidCropping`].
pub fn rotate(img: &PixelBuffer, degrees: u32) -> Result<PixelBuffer> {
    check_editable(img)?;
    if degrees != 90 && degrees != 180 && degrees != 270 {
        return Err(Error::InvalidCropping);
    }

    let (out_width, out_height) = if degrees == 180 {
        (img.width, img.height)
    } else {
        (img.height, img.width)
    };
    let mut out = new_like(img, out_width, out_height)?;

    {
        let (out_luma, _) = out.split_planes_mut();
        rotate_plane(
            img.luma(),
            img.luma_stride,
            out_luma,
            out_width,
            img.width,
            img.height,
            degrees,
        );
    }

    if img.format == PixelFormat::Yuv420 {
        let (in_u, in_v) = img.chroma_planes();
        let in_cs = img.chroma_stride;
        let (cw, ch) = (img.width / 2, img.height / 2);
        let out_cs = out.chroma_stride;
        let (_, out_chroma) = out.split_planes_mut();
        let (out_u, out_v) = out_chroma.split_at_mut(out_cs * (out_height / 2));
        rotate_plane(in_u, in_cs, out_u, out_cs, cw, ch, degrees);
        rotate_plane(in_v, in_cs, out_v, out_cs, cw, ch, degrees);
    }

    Ok(out)
}

fn resize_plane(
    src: &[u8],
    src_stride: usize,
    dst: &mut [u8],
    dst_stride: usize,
    in_width: usize,
    in_height: usize,
    out_width: usize,
    out_height: usize,
) {
    for i in 0..out_height {
        let src_row = (i * in_height / out_height) * src_stride;
        for j in 0..out_width {
            dst[i * dst_stride + j] = src[src_row + j * in_width / out_width];
        }
    }
}

/// Nearest-neighbor resize to the given dimensions.
pub fn resize(img: &PixelBuffer, new_width: usize, new_height: usize) -> Result<PixelBuffer> {
    check_editable(img)?;
    if new_width == 0 || new_height == 0 {
        return Err(Error::InvalidCropping);
    }
    let mut out = new_like(img, new_width, new_height)?;

    {
        let (out_luma, _) = out.split_planes_mut();
        resize_plane(
            img.luma(),
            img.luma_stride,
            out_luma,
            new_width,
            img.width,
            img.height,
            new_width,
            new_height,
        );
    }

    if img.format == PixelFormat::Yuv420 {
        let (in_u, in_v) = img.chroma_planes();
        let in_cs = img.chroma_stride;
        let out_cs = out.chroma_stride;
        let (_, out_chroma) = out.split_planes_mut();
        let (out_u, out_v) = out_chroma.split_at_mut(out_cs * (new_height / 2));
        resize_plane(in_u, in_cs, out_u, out_cs, img.width / 2, img.height / 2, new_width / 2, new_height / 2);
        resize_plane(in_v, in_cs, out_v, out_cs, img.width / 2, img.height / 2, new_width / 2, new_height / 2);
    }

    Ok(out)
}

/// Apply an ordered effect list, threading each result into the next step.
pub fn add_effects(img: &PixelBuffer, effects: &[Effect]) -> Result<PixelBuffer> {
    check_editable(img)?;
    let mut current = img.clone();
    for effect in effects {
        current = match *effect {
            Effect::Crop {
                left,
                right,
                top,
                bottom,
            } => crop(&current, left, right, top, bottom)?,
            Effect::Mirror(axis) => mirror(&current, axis)?,
            Effect::Rotate(degrees) => rotate(&current, degrees)?,
            Effect::Resize { width, height } => resize(&current, width, height)?,
        };
    }
    Ok(current)
}

/// Rescale an effect list from base-image coordinates to gain map
/// coordinates.
///
/// Crop rectangles and resize targets shrink by the observed map ratio so
/// that applying the list to both halves of a base/map pair keeps them
/// dimensionally consistent. Mirror and rotate are resolution independent.
pub fn scale_effects_for_map(effects: &[Effect], ratio: usize) -> Vec<Effect> {
    debug_assert!(ratio > 0);
    effects
        .iter()
        .map(|effect| match *effect {
            Effect::Crop {
                left,
                right,
                top,
                bottom,
            } => Effect::Crop {
                left: left / ratio,
                right: right / ratio,
                top: top / ratio,
                bottom: bottom / ratio,
            },
            Effect::Resize { width, height } => Effect::Resize {
                width: (width / ratio).max(1),
                height: (height / ratio).max(1),
            },
            other => other,
        })
        .collect()
}
