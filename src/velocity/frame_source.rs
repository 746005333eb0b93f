use std::path::{Path, PathBuf};

use crate::image::Image;
use crate::io::{Band, load_image};
use crate::{PipelineError, Result};

/// Lazy, ordered access to the frames of a time series.
pub trait FrameSource: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn name(&self, index: usize) -> String;

    fn load(&self, index: usize) -> Result<Image>;
}

/// Frames read from disk on demand.
#[derive(Debug,Clone)]
pub struct ImageFiles {
    pub paths: Vec<PathBuf>,
    pub band: Band,
    pub equalise: bool
}

impl ImageFiles {
    pub fn new(paths: Vec<PathBuf>, band: Band, equalise: bool) -> ImageFiles {
        ImageFiles { paths, band, equalise }
    }

    /// Every file in `directory` with the given extension (case insensitive), sorted by name.
    pub fn from_directory(directory: &Path, extension: &str, band: Band, equalise: bool) -> Result<ImageFiles> {
        let mut paths = std::fs::read_dir(directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().map_or(false, |e| e.to_string_lossy().eq_ignore_ascii_case(extension)))
            .collect::<Vec<PathBuf>>();
        paths.sort();
        Ok(ImageFiles::new(paths, band, equalise))
    }
}

impl FrameSource for ImageFiles {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn name(&self, index: usize) -> String {
        match self.paths.get(index) {
            Some(path) => path.file_name().map_or_else(|| path.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string()),
            None => String::new()
        }
    }

    fn load(&self, index: usize) -> Result<Image> {
        match self.paths.get(index) {
            Some(path) => load_image(path, self.band, self.equalise),
            None => Err(PipelineError::InvalidArgument(format!("frame index {} out of range for {} frames", index, self.paths.len())))
        }
    }
}

/// Frames already decoded, e.g. synthetic sequences.
#[derive(Debug,Clone,Default)]
pub struct InMemoryFrames {
    pub frames: Vec<(String, Image)>
}

impl InMemoryFrames {
    pub fn new(frames: Vec<(String, Image)>) -> InMemoryFrames {
        InMemoryFrames { frames }
    }
}

impl FrameSource for InMemoryFrames {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn name(&self, index: usize) -> String {
        self.frames.get(index).map_or_else(String::new, |(name, _)| name.clone())
    }

    fn load(&self, index: usize) -> Result<Image> {
        match self.frames.get(index) {
            Some((_, image)) => Ok(image.clone()),
            None => Err(PipelineError::InvalidArgument(format!("frame index {} out of range for {} frames", index, self.frames.len())))
        }
    }
}
