// THEORY:
// The `blob_detector` is the reference segmentation step. On the real module the
// camera firmware's blob finder fills this role; on a host, in tests and in the
// bench runner, this implementation does.
//
// Algorithm:
// 1.  **Binarization**: a pixel is an obstacle pixel when its luminance falls
//     inside the frame's `Threshold`.
// 2.  **Seeding in raster order**: the frame is scanned row by row. Every
//     obstacle pixel not yet claimed by a region becomes the seed of a new one,
//     which fixes the output order: regions appear in the order of their first
//     (top-most, then left-most) pixel.
// 3.  **Region growing**: from each seed a stack-based flood fill claims all
//     4-connected obstacle pixels.
// 4.  **Data aggregation**: the bounding box, pixel count and pixel-mean
//     centroid are folded up while growing. Regions smaller than `min_pixels`
//     pixels or with a box smaller than `min_area` are discarded.
// 5.  **Stateless utility**: like everything before the smoothing buffer it has
//     no memory of previous frames.

use crate::core_modules::candidate::{BlobCandidate, Point};
use crate::core_modules::threshold::Threshold;

/// Minimum region size handed down to segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentationLimits {
    /// Regions with fewer pixels are ignored.
    pub min_pixels: u32,
    /// Regions whose bounding box covers fewer pixels are ignored.
    pub min_area: u32,
}

impl Default for SegmentationLimits {
    fn default() -> Self {
        Self {
            min_pixels: 300,
            min_area: 300,
        }
    }
}

pub mod blob_detector {
    use super::*;

    /// Finds every connected region of pixels inside `threshold`.
    ///
    /// `luma` is a row-major single-channel buffer of `width * height` bytes.
    pub fn find_blobs(
        luma: &[u8],
        width: u32,
        height: u32,
        threshold: Threshold,
        limits: SegmentationLimits,
    ) -> Vec<BlobCandidate> {
        let w = width as usize;
        let h = height as usize;
        let len = (w * h).min(luma.len());
        let mut visited = vec![false; len];
        let mut blobs = Vec::new();

        for seed in 0..len {
            if visited[seed] || !threshold.contains(luma[seed]) {
                continue;
            }
            let region = grow_region(seed, luma, w, h, threshold, &mut visited);
            if region.pixels >= limits.min_pixels && region.box_area() >= limits.min_area as u64 {
                blobs.push(region.into_candidate());
            }
        }

        blobs
    }

    /// Running bounds and sums for one region.
    struct Region {
        min_x: u32,
        min_y: u32,
        max_x: u32,
        max_y: u32,
        pixels: u32,
        sum_x: u64,
        sum_y: u64,
    }

    impl Region {
        fn box_area(&self) -> u64 {
            (self.max_x - self.min_x + 1) as u64 * (self.max_y - self.min_y + 1) as u64
        }

        fn into_candidate(self) -> BlobCandidate {
            let centroid = Point::new(
                (self.sum_x / self.pixels as u64) as u32,
                (self.sum_y / self.pixels as u64) as u32,
            );
            BlobCandidate::with_centroid(
                self.min_x,
                self.min_y,
                self.max_x - self.min_x + 1,
                self.max_y - self.min_y + 1,
                self.pixels,
                centroid,
            )
        }
    }

    fn grow_region(
        seed: usize,
        luma: &[u8],
        w: usize,
        h: usize,
        threshold: Threshold,
        visited: &mut [bool],
    ) -> Region {
        let mut region = Region {
            min_x: u32::MAX,
            min_y: u32::MAX,
            max_x: 0,
            max_y: 0,
            pixels: 0,
            sum_x: 0,
            sum_y: 0,
        };
        let mut stack = vec![seed];
        visited[seed] = true;

        while let Some(index) = stack.pop() {
            let x = index % w;
            let y = index / w;

            region.min_x = region.min_x.min(x as u32);
            region.min_y = region.min_y.min(y as u32);
            region.max_x = region.max_x.max(x as u32);
            region.max_y = region.max_y.max(y as u32);
            region.pixels += 1;
            region.sum_x += x as u64;
            region.sum_y += y as u64;

            // 4-connectivity, no diagonals.
            let mut visit = |nx: usize, ny: usize| {
                let n = ny * w + nx;
                if n < visited.len() && !visited[n] && threshold.contains(luma[n]) {
                    visited[n] = true;
                    stack.push(n);
                }
            };
            if x > 0 {
                visit(x - 1, y);
            }
            if x + 1 < w {
                visit(x + 1, y);
            }
            if y > 0 {
                visit(x, y - 1);
            }
            if y + 1 < h {
                visit(x, y + 1);
            }
        }

        region
    }
}

#[cfg(test)]
mod tests {
    use super::blob_detector::find_blobs;
    use super::*;

    const W: u32 = 32;
    const H: u32 = 24;

    /// A bright frame with dark rectangles painted in.
    fn frame_with(rects: &[(u32, u32, u32, u32)]) -> Vec<u8> {
        let mut luma = vec![200u8; (W * H) as usize];
        for &(x, y, w, h) in rects {
            for yy in y..y + h {
                for xx in x..x + w {
                    luma[(yy * W + xx) as usize] = 10;
                }
            }
        }
        luma
    }

    fn dark() -> Threshold {
        Threshold { low: 0, high: 170 }
    }

    fn no_limits() -> SegmentationLimits {
        SegmentationLimits {
            min_pixels: 1,
            min_area: 1,
        }
    }

    #[test]
    fn finds_rectangles_in_raster_order() {
        let luma = frame_with(&[(20, 2, 4, 3), (2, 10, 6, 5)]);
        let blobs = find_blobs(&luma, W, H, dark(), no_limits());

        assert_eq!(blobs.len(), 2);
        assert_eq!((blobs[0].x, blobs[0].y, blobs[0].width, blobs[0].height), (20, 2, 4, 3));
        assert_eq!(blobs[0].pixels, 12);
        assert_eq!((blobs[1].x, blobs[1].y, blobs[1].width, blobs[1].height), (2, 10, 6, 5));
        assert_eq!(blobs[1].pixels, 30);
    }

    #[test]
    fn centroid_is_the_pixel_mean() {
        let luma = frame_with(&[(4, 4, 5, 3)]);
        let blobs = find_blobs(&luma, W, H, dark(), no_limits());
        assert_eq!(blobs[0].centroid, Point::new(6, 5));
    }

    #[test]
    fn diagonal_neighbours_are_separate_regions() {
        let luma = frame_with(&[(0, 0, 1, 1), (1, 1, 1, 1)]);
        let blobs = find_blobs(&luma, W, H, dark(), no_limits());
        assert_eq!(blobs.len(), 2);
    }

    #[test]
    fn l_shape_is_one_region_with_a_sparse_box() {
        let luma = frame_with(&[(0, 0, 10, 1), (0, 0, 1, 10)]);
        let blobs = find_blobs(&luma, W, H, dark(), no_limits());
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].box_area(), 100);
        assert_eq!(blobs[0].pixels, 19);
    }

    #[test]
    fn small_regions_are_dropped() {
        let luma = frame_with(&[(0, 0, 2, 2), (10, 10, 5, 5)]);
        let limits = SegmentationLimits {
            min_pixels: 10,
            min_area: 10,
        };
        let blobs = find_blobs(&luma, W, H, dark(), limits);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].x, 10);
    }

    #[test]
    fn nothing_inside_the_threshold_means_no_blobs() {
        let luma = vec![200u8; (W * H) as usize];
        assert!(find_blobs(&luma, W, H, dark(), no_limits()).is_empty());
    }
}
