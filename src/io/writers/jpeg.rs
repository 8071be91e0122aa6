use jpeg_encoder::{ColorType, Encoder};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::error::{Error, Result};

/// Largest side the baseline JPEG encoder accepts
const MAX_JPEG_SIDE: usize = u16::MAX as usize;

pub fn write_rgb_jpeg(output: &Path, cols: usize, rows: usize, rgb_data: &[u8]) -> Result<()> {
    if cols > MAX_JPEG_SIDE || rows > MAX_JPEG_SIDE {
        return Err(Error::config(format!(
            "preview of {}x{} pixels is too large for JPEG",
            cols, rows
        )));
    }
    if rgb_data.len() != cols * rows * 3 {
        return Err(Error::config(format!(
            "RGB buffer holds {} bytes, expected {}",
            rgb_data.len(),
            cols * rows * 3
        )));
    }
    let file = File::create(output)?;
    let mut writer = BufWriter::new(file);
    let encoder = Encoder::new(&mut writer, 90);
    encoder.encode(rgb_data, cols as u16, rows as u16, ColorType::Rgb)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_jfif_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.jpg");
        write_rgb_jpeg(&path, 4, 2, &[128u8; 24]).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn rejects_short_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let err = write_rgb_jpeg(&dir.path().join("p.jpg"), 4, 2, &[0u8; 10]).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
