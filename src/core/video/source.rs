//! Frame decode contract and the built-in frame sources.

use super::frame::Frame;
use crate::core::error::AnalysisError;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// 视频基本信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub frame_count: usize,
    pub fps: f64,
    pub width: u32,
    pub height: u32,
}

/// A decoded video that can be positioned and read frame by frame.
///
/// `read` returns the frame at the current position and advances by one;
/// `None` means the frame could not be decoded (or the end was reached).
pub trait FrameSource: Send {
    fn frame_count(&self) -> usize;
    fn fps(&self) -> f64;
    fn seek(&mut self, index: usize);
    fn read(&mut self) -> Option<Frame>;

    fn read_at(&mut self, index: usize) -> Option<Frame> {
        self.seek(index);
        self.read()
    }
}

/// Opens paths into [`FrameSource`]s.
pub trait VideoDecoder: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, AnalysisError>;

    /// Frame count, fps and size without keeping the source open.
    fn probe(&self, path: &Path) -> Result<VideoInfo, AnalysisError> {
        let mut source = self.open(path)?;
        let (width, height) = source
            .read_at(0)
            .map(|f| (f.width, f.height))
            .unwrap_or((0, 0));
        Ok(VideoInfo {
            frame_count: source.frame_count(),
            fps: source.fps(),
            width,
            height,
        })
    }
}

/// 内存帧源，主要用于测试和已解码数据
#[derive(Debug, Clone)]
pub struct MemoryFrameSource {
    frames: Vec<Frame>,
    fps: f64,
    position: usize,
    unreadable: Vec<usize>,
}

impl MemoryFrameSource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        Self {
            frames,
            fps,
            position: 0,
            unreadable: Vec::new(),
        }
    }

    /// Make `read` fail at `index` to simulate a decode outage.
    pub fn with_unreadable(mut self, index: usize) -> Self {
        self.unreadable.push(index);
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl FrameSource for MemoryFrameSource {
    fn frame_count(&self) -> usize {
        self.frames.len()
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek(&mut self, index: usize) {
        self.position = index;
    }

    fn read(&mut self) -> Option<Frame> {
        let index = self.position;
        self.position += 1;
        if self.unreadable.contains(&index) {
            return None;
        }
        self.frames.get(index).cloned()
    }
}

const SEQUENCE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// 图像序列帧源：目录中的图片按文件名排序作为帧
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    fps: f64,
    position: usize,
}

impl ImageSequenceSource {
    pub fn open(dir: &Path, fps: f64) -> Result<Self, AnalysisError> {
        if !dir.is_dir() {
            return Err(AnalysisError::OpenFailed(dir.to_path_buf()));
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| SEQUENCE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(AnalysisError::OpenFailed(dir.to_path_buf()));
        }

        info!("🎬 Opened image sequence {:?}: {} frames @ {:.2} fps", dir, paths.len(), fps);
        Ok(Self {
            paths,
            fps,
            position: 0,
        })
    }

    fn decode(&self, index: usize) -> Result<Frame, AnalysisError> {
        let path = self
            .paths
            .get(index)
            .ok_or_else(|| AnalysisError::Decode(format!("frame {} out of range", index)))?;
        let img = image::open(path)?.to_rgb8();
        let timestamp_ms = if self.fps > 0.0 {
            (index as f64 * 1000.0 / self.fps) as u64
        } else {
            0
        };
        Ok(Frame::from_rgb_image(&img, timestamp_ms, index as u64))
    }
}

impl FrameSource for ImageSequenceSource {
    fn frame_count(&self) -> usize {
        self.paths.len()
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn seek(&mut self, index: usize) {
        self.position = index;
    }

    fn read(&mut self) -> Option<Frame> {
        let index = self.position;
        self.position += 1;
        match self.decode(index) {
            Ok(frame) => Some(frame),
            Err(e) => {
                if index < self.paths.len() {
                    warn!("⚠️ Failed to decode frame {}: {}", index, e);
                } else {
                    debug!("Read past end of sequence at {}", index);
                }
                None
            }
        }
    }
}

/// Decoder for directories of numbered still images.
#[derive(Debug, Clone)]
pub struct ImageSequenceDecoder {
    pub fps: f64,
}

impl ImageSequenceDecoder {
    pub fn new(fps: f64) -> Self {
        Self { fps }
    }
}

impl VideoDecoder for ImageSequenceDecoder {
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, AnalysisError> {
        Ok(Box::new(ImageSequenceSource::open(path, self.fps)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn create_test_frame(value: u8, index: u64) -> Frame {
        let mut frame = Frame::filled(4, 4, [value, value, value]);
        frame.frame_number = index;
        frame
    }

    #[test]
    fn test_memory_source_seek_and_read() {
        let frames = (0..5).map(|i| create_test_frame(i as u8 * 10, i)).collect();
        let mut source = MemoryFrameSource::new(frames, 30.0);

        assert_eq!(source.frame_count(), 5);
        source.seek(3);
        assert_eq!(source.read().unwrap().frame_number, 3);
        assert_eq!(source.read().unwrap().frame_number, 4);
        assert!(source.read().is_none());
        assert_eq!(source.read_at(1).unwrap().frame_number, 1);
    }

    #[test]
    fn test_memory_source_unreadable() {
        let frames = (0..3).map(|i| create_test_frame(0, i)).collect();
        let mut source = MemoryFrameSource::new(frames, 30.0).with_unreadable(1);
        assert!(source.read_at(1).is_none());
        assert_eq!(source.position(), 2);
        assert!(source.read().is_some());
    }

    #[test]
    fn test_image_sequence_sorted_and_bgr() {
        let dir = tempdir().unwrap();
        // 写入顺序与文件名顺序相反
        RgbImage::from_pixel(3, 2, Rgb([0, 0, 200]))
            .save(dir.path().join("frame_002.png"))
            .unwrap();
        RgbImage::from_pixel(3, 2, Rgb([100, 0, 0]))
            .save(dir.path().join("frame_001.png"))
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let decoder = ImageSequenceDecoder::new(25.0);
        let info = decoder.probe(dir.path()).unwrap();
        assert_eq!(info.frame_count, 2);
        assert_eq!((info.width, info.height), (3, 2));

        let mut source = decoder.open(dir.path()).unwrap();
        let first = source.read().unwrap();
        assert_eq!(first.pixel(0, 0), Some([0, 0, 100]));
        let second = source.read().unwrap();
        assert_eq!(second.pixel(2, 1), Some([200, 0, 0]));
        assert_eq!(second.timestamp.as_millis(), 40);
        assert!(source.read().is_none());
    }

    #[test]
    fn test_image_sequence_open_failures() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            ImageSequenceSource::open(dir.path(), 30.0),
            Err(AnalysisError::OpenFailed(_))
        ));
        assert!(ImageSequenceSource::open(&dir.path().join("missing"), 30.0).is_err());
    }
}
