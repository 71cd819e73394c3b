use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use crossbeam_channel::Sender;
use image::ImageFormat;
use sha1::{Digest, Sha1};

use crate::model::{MediaKind, MediaRef};

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{path} is {size} bytes, over the {limit} byte upload limit")]
    TooLarge { path: PathBuf, size: u64, limit: u64 },
    #[error("{path} looks like {mime}, not {expected}")]
    WrongKind {
        path: PathBuf,
        mime: String,
        expected: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct Reader {
    max_bytes: u64,
}

impl Default for Reader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl Reader {
    pub fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    /// Turns a local file into an embeddable data reference. A missing or
    /// blank path yields `None`.
    pub fn read(&self, path: Option<&Path>, kind: MediaKind) -> Result<Option<MediaRef>> {
        let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(None);
        };
        if !path.is_file() {
            tracing::debug!(path = %path.display(), "no file selected for upload");
            return Ok(None);
        }

        let size = fs::metadata(path)
            .with_context(|| format!("upload: stat {}", path.display()))?
            .len();
        if size > self.max_bytes {
            return Err(UploadError::TooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.max_bytes,
            }
            .into());
        }

        let bytes = fs::read(path).with_context(|| format!("upload: read {}", path.display()))?;
        let mut mime = detect_mime(&bytes);
        if !mime.starts_with(kind.mime_prefix()) {
            let by_name = mime_from_extension(path).filter(|m| m.starts_with(kind.mime_prefix()));
            if let Some(by_name) = by_name {
                tracing::debug!(path = %path.display(), sniffed = %mime, "using extension mime");
                mime = by_name.to_string();
            }
        }
        if !mime.starts_with(kind.mime_prefix()) {
            return Err(UploadError::WrongKind {
                path: path.to_path_buf(),
                mime,
                expected: kind.mime_prefix(),
            }
            .into());
        }

        let encoded = general_purpose::STANDARD.encode(&bytes);
        Ok(Some(MediaRef {
            url: format!("data:{mime};base64,{encoded}"),
            mime: Some(mime),
            size_bytes: bytes.len() as u64,
            checksum: sha1_hex(&bytes),
        }))
    }

    /// Reads on a background thread and sends the result through `tx`,
    /// wrapped by `wrap`.
    pub fn spawn<T, F>(&self, path: PathBuf, kind: MediaKind, tx: Sender<T>, wrap: F)
    where
        T: Send + 'static,
        F: FnOnce(MediaKind, Result<Option<MediaRef>>) -> T + Send + 'static,
    {
        let reader = self.clone();
        thread::spawn(move || {
            let result = reader.read(Some(&path), kind);
            let _ = tx.send(wrap(kind, result));
        });
    }
}

fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn detect_mime(bytes: &[u8]) -> String {
    if let Some(audio) = sniff_audio(bytes) {
        return audio.into();
    }
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => "image/jpeg".into(),
        Ok(ImageFormat::Png) => "image/png".into(),
        Ok(ImageFormat::Gif) => "image/gif".into(),
        Ok(ImageFormat::WebP) => "image/webp".into(),
        _ => {
            let mut buffer = [0u8; 512];
            let mut cursor = std::io::Cursor::new(bytes);
            let read = cursor.read(&mut buffer).unwrap_or(0);
            tree_magic_mini::from_u8(&buffer[..read]).to_string()
        }
    }
}

/// Audio containers that generic sniffing reports as `application/x-riff`
/// or `video/ogg`.
fn sniff_audio(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some("audio/wav");
    }
    if bytes.starts_with(b"OggS") {
        return Some("audio/ogg");
    }
    if bytes.starts_with(b"fLaC") {
        return Some("audio/flac");
    }
    let frame_sync = bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0;
    if bytes.starts_with(b"ID3") || frame_sync {
        return Some("audio/mpeg");
    }
    None
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" | "oga" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "m4a" | "aac" => "audio/mp4",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime)
}
