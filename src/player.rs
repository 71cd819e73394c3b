use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};

use crate::config::PlayerConfig;
use crate::model::{MediaKind, MediaRef};

const URL_PLACEHOLDER: &str = "%URL%";
const TITLE_PLACEHOLDER: &str = "%TITLE%";

/// Hands post media to external programs: music to an audio player,
/// images to a viewer.
#[derive(Debug, Clone)]
pub struct Player {
    audio_command: Vec<String>,
    image_command: Vec<String>,
    spool_dir: Option<PathBuf>,
}

impl Player {
    pub fn new(cfg: &PlayerConfig) -> Self {
        Self {
            audio_command: cfg.audio_command.clone(),
            image_command: cfg.image_command.clone(),
            spool_dir: cfg.spool_dir.clone(),
        }
    }

    fn template(&self, kind: MediaKind) -> &[String] {
        match kind {
            MediaKind::Audio => &self.audio_command,
            MediaKind::Image => &self.image_command,
        }
    }

    /// Starts the configured program for `media` and returns without
    /// waiting for it.
    pub fn launch(&self, media: &MediaRef, kind: MediaKind, title: &str) -> Result<()> {
        let target = self.playback_target(media)?;
        let args = command_args(self.template(kind), &target, title)?;
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| anyhow!("{} command is empty", kind.label()))?;

        let mut command = Command::new(program);
        command.args(rest);
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
        command.stderr(Stdio::null());
        command
            .spawn()
            .with_context(|| format!("launch {program} for {}", kind.label()))?;
        tracing::info!(program = %program, kind = kind.label(), "started external player");
        Ok(())
    }

    /// Remote references play from their URL; uploaded data is written to
    /// the spool directory first, named by checksum.
    fn playback_target(&self, media: &MediaRef) -> Result<String> {
        if !media.is_inline() {
            let url = media.url.trim();
            if url.is_empty() {
                return Err(anyhow!("media url missing"));
            }
            return Ok(url.to_string());
        }
        let dir = self
            .spool_dir
            .as_ref()
            .ok_or_else(|| anyhow!("no spool directory for uploaded media"))?;
        spool_inline(dir, media).map(|path| path.display().to_string())
    }
}

/// Fills `%URL%` and `%TITLE%` in `template`. Without a `%URL%` slot the
/// target is appended.
pub fn command_args(template: &[String], target: &str, title: &str) -> Result<Vec<String>> {
    if template.is_empty() {
        return Err(anyhow!("player command is empty"));
    }
    let mut saw_url = false;
    let mut args: Vec<String> = template
        .iter()
        .map(|part| {
            if part.contains(URL_PLACEHOLDER) {
                saw_url = true;
            }
            part.replace(URL_PLACEHOLDER, target)
                .replace(TITLE_PLACEHOLDER, title)
        })
        .collect();
    if !saw_url {
        args.push(target.to_string());
    }
    Ok(args)
}

fn spool_inline(dir: &Path, media: &MediaRef) -> Result<PathBuf> {
    let encoded = media
        .url
        .split_once(";base64,")
        .map(|(_, data)| data)
        .ok_or_else(|| anyhow!("uploaded media is not base64 encoded"))?;
    let name = format!(
        "{}.{}",
        media.checksum,
        extension_for(media.mime.as_deref().unwrap_or_default())
    );
    let path = dir.join(name);
    if path.is_file() {
        return Ok(path);
    }
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .context("decode uploaded media")?;
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}

fn extension_for(mime: &str) -> &str {
    match mime {
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "image/jpeg" => "jpg",
        other => other
            .split_once('/')
            .map(|(_, sub)| sub)
            .filter(|sub| !sub.is_empty() && sub.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn strings(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    fn inline(bytes: &[u8], mime: &str) -> MediaRef {
        MediaRef {
            url: format!(
                "data:{mime};base64,{}",
                general_purpose::STANDARD.encode(bytes)
            ),
            mime: Some(mime.to_string()),
            size_bytes: bytes.len() as u64,
            checksum: "abc123".into(),
        }
    }

    #[test]
    fn placeholders_are_filled() {
        let args = command_args(
            &strings(&["mpv", "--title=%TITLE%", "%URL%"]),
            "https://example.com/a.mp3",
            "DJ Harmony",
        )
        .unwrap();
        assert_eq!(
            args,
            strings(&["mpv", "--title=DJ Harmony", "https://example.com/a.mp3"])
        );
    }

    #[test]
    fn target_appended_without_slot() {
        let args = command_args(&strings(&["afplay"]), "/tmp/x.wav", "t").unwrap();
        assert_eq!(args, strings(&["afplay", "/tmp/x.wav"]));
        assert!(command_args(&[], "/tmp/x.wav", "t").is_err());
    }

    #[test]
    fn uploaded_media_is_spooled_by_checksum() {
        let dir = tempdir().unwrap();
        let media = inline(b"ID3 fake", "audio/mpeg");
        let path = spool_inline(dir.path(), &media).unwrap();
        assert_eq!(path, dir.path().join("abc123.mp3"));
        assert_eq!(fs::read(&path).unwrap(), b"ID3 fake");
    }

    #[test]
    fn remote_media_plays_from_url() {
        let player = Player::new(&PlayerConfig {
            spool_dir: None,
            ..PlayerConfig::default()
        });
        let media = MediaRef::remote("https://example.com/sample-music.mp3");
        assert_eq!(
            player.playback_target(&media).unwrap(),
            "https://example.com/sample-music.mp3"
        );
        assert!(player.playback_target(&inline(b"x", "audio/wav")).is_err());
    }

    #[test]
    fn missing_program_is_an_error() {
        let player = Player::new(&PlayerConfig {
            audio_command: strings(&["flamefeed-no-such-player", "%URL%"]),
            ..PlayerConfig::default()
        });
        let media = MediaRef::remote("https://example.com/a.mp3");
        assert!(player.launch(&media, MediaKind::Audio, "a").is_err());
    }

    #[test]
    fn extensions_follow_mime() {
        assert_eq!(extension_for("audio/wav"), "wav");
        assert_eq!(extension_for("image/jpeg"), "jpg");
        assert_eq!(extension_for("application/x-what+ever"), "bin");
        assert_eq!(extension_for(""), "bin");
    }
}
