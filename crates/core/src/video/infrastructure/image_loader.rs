use std::fs;
use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;

/// Decodes an enrollment photo into an RGB [`Frame`] with index 0.
pub fn load_image(path: &Path) -> Result<Frame, Box<dyn std::error::Error>> {
    let image = image::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    Ok(Frame::from_rgb_image(image.to_rgb8(), 0))
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Expands directories to the image files directly inside them, sorted by
/// name. Plain file arguments are kept as given.
pub fn collect_image_paths(inputs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_file(p))
                .collect();
            found.sort();
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_png(path: &Path, width: u32, height: u32) {
        let image = image::RgbImage::from_pixel(width, height, image::Rgb([10, 20, 30]));
        image.save(path).unwrap();
    }

    #[test]
    fn test_load_image_as_rgb_frame() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("face.png");
        write_png(&path, 4, 3);

        let frame = load_image(&path).unwrap();

        assert_eq!((frame.width(), frame.height(), frame.channels()), (4, 3, 3));
        assert_eq!(&frame.data()[..3], &[10, 20, 30]);
        assert_eq!(frame.index(), 0);
    }

    #[test]
    fn test_load_missing_image_fails() {
        assert!(load_image(Path::new("/nonexistent/face.jpg")).is_err());
    }

    #[test]
    fn test_collect_expands_directories() {
        let tmp = TempDir::new().unwrap();
        write_png(&tmp.path().join("b.png"), 1, 1);
        write_png(&tmp.path().join("a.PNG"), 1, 1);
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();
        let extra = PathBuf::from("/elsewhere/c.jpg");

        let paths = collect_image_paths(&[tmp.path().to_path_buf(), extra.clone()]).unwrap();

        assert_eq!(
            paths,
            vec![tmp.path().join("a.PNG"), tmp.path().join("b.png"), extra]
        );
    }
}
