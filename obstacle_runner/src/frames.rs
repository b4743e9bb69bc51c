//! Replays image files from a directory as the camera.

use anyhow::{bail, Context};
use obstacle_vision::core_modules::frame::GrayFrame;
use obstacle_vision::error::{Result, VisionError};
use obstacle_vision::sources::FrameSource;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "pgm", "tif", "tiff"];

/// Frames are taken in file-name order and the sequence repeats forever.
pub struct DirectoryFrameSource {
    paths: Vec<PathBuf>,
    next: usize,
}

impl DirectoryFrameSource {
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_image {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            bail!("no image files in {}", dir.display());
        }
        paths.sort();
        info!(dir = %dir.display(), frames = paths.len(), "frame directory loaded");
        Ok(Self { paths, next: 0 })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for DirectoryFrameSource {
    type Frame = GrayFrame;

    fn next_frame(&mut self) -> Result<GrayFrame> {
        let path = &self.paths[self.next];
        self.next = (self.next + 1) % self.paths.len();
        debug!(path = %path.display(), "loading frame");
        let image = image::open(path)
            .map_err(|e| VisionError::FrameSource(format!("{}: {e}", path.display())))?;
        Ok(GrayFrame::from_dynamic(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use obstacle_vision::core_modules::frame::Frame;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("obstacle_runner_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn replays_images_in_name_order() {
        let dir = scratch_dir("replay");
        GrayImage::from_pixel(8, 6, Luma([200])).save(dir.join("b.png")).unwrap();
        GrayImage::from_pixel(8, 6, Luma([10])).save(dir.join("a.png")).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = DirectoryFrameSource::open(&dir).unwrap();
        assert_eq!(source.len(), 2);
        let first = source.next_frame().unwrap();
        let second = source.next_frame().unwrap();
        let third = source.next_frame().unwrap();
        assert_eq!(first.mean_luminance(), 10.0);
        assert_eq!(second.mean_luminance(), 200.0);
        assert_eq!(third.mean_luminance(), 10.0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn empty_directory_is_rejected() {
        let dir = scratch_dir("empty");
        assert!(DirectoryFrameSource::open(&dir).is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unreadable_frame_is_a_cycle_fault() {
        let dir = scratch_dir("corrupt");
        std::fs::write(dir.join("broken.png"), b"not a png").unwrap();
        let mut source = DirectoryFrameSource::open(&dir).unwrap();
        assert!(source.next_frame().unwrap_err().is_cycle_fault());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
