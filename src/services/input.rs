use crate::core::error::InputError;
use crate::core::io::Storage;
use crate::services::transcriber::{is_audio_extension, AUDIO_EXTENSIONS};
use std::path::Path;

pub const TEXT_EXTENSIONS: [&str; 3] = ["txt", "md", "text"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Audio,
}

pub fn detect_input_type(path: &Path) -> Result<InputKind, InputError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Ok(InputKind::Text)
    } else if is_audio_extension(path) {
        Ok(InputKind::Audio)
    } else {
        Err(InputError::Validation(format!(
            "unsupported file type {:?}; text: {}; audio: {}",
            path.display().to_string(),
            TEXT_EXTENSIONS.join(", "),
            AUDIO_EXTENSIONS.join(", ")
        )))
    }
}

pub async fn read_text_file(storage: &dyn Storage, path: &Path) -> Result<String, InputError> {
    let path_str = path.to_string_lossy().to_string();
    let bytes = storage.read(&path_str).await.map_err(|e| InputError::Io {
        path: path_str.clone(),
        source: std::io::Error::other(format!("{:#}", e)),
    })?;
    String::from_utf8(bytes).map_err(|e| {
        InputError::Validation(format!(
            "{} is not valid UTF-8 (invalid byte at offset {}); re-save it as UTF-8",
            path_str,
            e.utf8_error().valid_up_to()
        ))
    })
}

/// Trims the transcript and enforces the minimum length, counted in characters.
pub fn validate_transcript(text: &str, min_chars: usize) -> Result<String, InputError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InputError::Validation("transcript is empty".to_string()));
    }
    let chars = trimmed.chars().count();
    if chars < min_chars {
        return Err(InputError::Validation(format!(
            "transcript is too short ({} characters, at least {} required)",
            chars, min_chars
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;

    #[test]
    fn test_detects_text_and_audio() {
        assert_eq!(detect_input_type(Path::new("story.TXT")).unwrap(), InputKind::Text);
        assert_eq!(detect_input_type(Path::new("notes.md")).unwrap(), InputKind::Text);
        assert_eq!(detect_input_type(Path::new("talk.webm")).unwrap(), InputKind::Audio);
        assert!(matches!(
            detect_input_type(Path::new("scan.pdf")),
            Err(InputError::Validation(_))
        ));
        assert!(detect_input_type(Path::new("README")).is_err());
    }

    #[test]
    fn test_transcript_length_counts_characters() {
        // Ten Hangul syllables are thirty bytes but ten characters.
        let korean = "가나다라마바사아자차";
        assert!(validate_transcript(korean, 10).is_ok());
        assert!(validate_transcript(korean, 11).is_err());
        assert_eq!(validate_transcript("  hi there \n", 3).unwrap(), "hi there");
        assert!(matches!(
            validate_transcript("   ", 0),
            Err(InputError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_read_text_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("story.txt");
        std::fs::write(&path, "I was born in Andong.")?;
        let storage = NativeStorage::new();

        assert_eq!(read_text_file(&storage, &path).await?, "I was born in Andong.");

        // "한국" in CP949, as saved by older Korean Windows editors.
        let legacy = dir.path().join("legacy.txt");
        std::fs::write(&legacy, [0xC7, 0xD1, 0xB1, 0xB9])?;
        let err = read_text_file(&storage, &legacy).await.unwrap_err();
        assert!(matches!(err, InputError::Validation(ref m) if m.contains("not valid UTF-8")));

        let missing = dir.path().join("missing.txt");
        let err = read_text_file(&storage, &missing).await.unwrap_err();
        assert!(matches!(err, InputError::Io { .. }));
        Ok(())
    }
}
