use crate::core::io::Storage;
use crate::core::model::AutobiographyResult;
use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Paths written by one `OutputWriter::save` call.
#[derive(Debug, Clone)]
pub struct SavedFiles {
    pub markdown: PathBuf,
    pub text: PathBuf,
    pub json: PathBuf,
}

pub struct OutputWriter {
    storage: Arc<dyn Storage>,
    output_folder: PathBuf,
}

impl OutputWriter {
    pub fn new(storage: Arc<dyn Storage>, output_folder: impl AsRef<Path>) -> Self {
        Self {
            storage,
            output_folder: output_folder.as_ref().to_path_buf(),
        }
    }

    pub async fn save(&self, result: &AutobiographyResult) -> Result<SavedFiles> {
        let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let base = format!(
            "{}_autobiography_{}",
            sanitize_file_name(&result.author_name),
            timestamp
        );

        let saved = SavedFiles {
            markdown: self.output_folder.join(format!("{}.md", base)),
            text: self.output_folder.join(format!("{}.txt", base)),
            json: self.output_folder.join(format!("{}.json", base)),
        };

        self.write(&saved.markdown, to_markdown(result).as_bytes()).await?;
        self.write(&saved.text, to_plain_text(result).as_bytes()).await?;
        let json = serde_json::to_string_pretty(result)?;
        self.write(&saved.json, json.as_bytes()).await?;

        info!("Autobiography saved to {}", self.output_folder.display());
        Ok(saved)
    }

    async fn write(&self, path: &Path, content: &[u8]) -> Result<()> {
        let path_str = path.to_string_lossy();
        self.storage
            .write(&path_str, content)
            .await
            .with_context(|| format!("Failed to write {}", path_str))
    }
}

/// Replaces characters that are not allowed in file names.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

pub fn to_markdown(result: &AutobiographyResult) -> String {
    let mut lines = vec![
        format!("# {}", result.title),
        format!("\n**Author: {}**\n", result.author_name),
        "---\n".to_string(),
    ];

    if !result.prologue.is_empty() {
        lines.push("## Prologue\n".to_string());
        lines.push(result.prologue.clone());
        lines.push("\n---\n".to_string());
    }

    for (i, chapter) in result.chapters.iter().enumerate() {
        lines.push(format!("## Chapter {}: {}", i + 1, chapter.title));
        if !chapter.period.is_empty() {
            lines.push(format!("*{}*\n", chapter.period));
        }
        lines.push(chapter.content.clone());
        lines.push("\n".to_string());
    }

    if !result.epilogue.is_empty() {
        lines.push("---\n".to_string());
        lines.push("## Epilogue\n".to_string());
        lines.push(result.epilogue.clone());
        lines.push("\n".to_string());
    }

    if !result.key_themes.is_empty() {
        lines.push("---\n".to_string());
        lines.push("### Key themes\n".to_string());
        lines.extend(result.key_themes.iter().map(|t| format!("- {}", t)));
        lines.push("\n".to_string());
    }

    if !result.life_lessons.is_empty() {
        lines.push("### Life lessons\n".to_string());
        lines.extend(result.life_lessons.iter().map(|l| format!("- {}", l)));
        lines.push("\n".to_string());
    }

    lines.join("\n")
}

pub fn to_plain_text(result: &AutobiographyResult) -> String {
    let heavy = "=".repeat(50);
    let light = "-".repeat(40);
    let mut lines = vec![
        heavy.clone(),
        result.title.clone(),
        format!("Author: {}", result.author_name),
        format!("{}\n", heavy),
    ];

    if !result.prologue.is_empty() {
        lines.push("[Prologue]\n".to_string());
        lines.push(result.prologue.clone());
        lines.push(format!("\n{}\n", light));
    }

    for (i, chapter) in result.chapters.iter().enumerate() {
        lines.push(format!("[Chapter {}: {}]", i + 1, chapter.title));
        if !chapter.period.is_empty() {
            lines.push(format!("({})\n", chapter.period));
        }
        lines.push(chapter.content.clone());
        lines.push(format!("\n{}\n", light));
    }

    if !result.epilogue.is_empty() {
        lines.push("[Epilogue]\n".to_string());
        lines.push(result.epilogue.clone());
        lines.push("\n".to_string());
    }

    if !result.key_themes.is_empty() {
        lines.push(heavy.clone());
        lines.push("[Key themes]".to_string());
        lines.extend(result.key_themes.iter().map(|t| format!("  * {}", t)));
        lines.push(String::new());
    }

    if !result.life_lessons.is_empty() {
        lines.push("[Life lessons]".to_string());
        lines.extend(result.life_lessons.iter().map(|l| format!("  * {}", l)));
        lines.push(String::new());
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::NativeStorage;
    use crate::core::model::Chapter;

    fn sample() -> AutobiographyResult {
        AutobiographyResult {
            title: "A Life in Andong".to_string(),
            author_name: "Kim/Younghee?".to_string(),
            prologue: "It began in a small village.".to_string(),
            chapters: vec![
                Chapter {
                    period: "Childhood".to_string(),
                    title: "The Persimmon Tree".to_string(),
                    content: "Every autumn...".to_string(),
                },
                Chapter {
                    period: "Youth".to_string(),
                    title: "Seoul".to_string(),
                    content: "The train left at dawn.".to_string(),
                },
            ],
            epilogue: String::new(),
            key_themes: vec!["family".to_string()],
            life_lessons: vec![],
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name(" Kim/Younghee? "), "Kim_Younghee_");
        assert_eq!(sanitize_file_name("김영희"), "김영희");
        assert_eq!(sanitize_file_name("   "), "anonymous");
    }

    #[test]
    fn test_markdown_numbers_chapters_and_skips_empty_sections() {
        let md = to_markdown(&sample());
        assert!(md.starts_with("# A Life in Andong"));
        assert!(md.contains("## Chapter 1: The Persimmon Tree\n*Childhood*"));
        assert!(md.contains("## Chapter 2: Seoul"));
        assert!(md.contains("- family"));
        assert!(!md.contains("## Epilogue"));
        assert!(!md.contains("### Life lessons"));
        assert!(md.find("Chapter 1").unwrap() < md.find("Chapter 2").unwrap());
    }

    #[test]
    fn test_plain_text_layout() {
        let text = to_plain_text(&sample());
        assert!(text.contains("[Chapter 2: Seoul]\n(Youth)"));
        assert!(text.contains("[Prologue]"));
        assert!(!text.contains("[Epilogue]"));
    }

    #[tokio::test]
    async fn test_save_writes_three_formats() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let out = dir.path().join("output");
        let writer = OutputWriter::new(Arc::new(NativeStorage::new()), &out);

        let saved = writer.save(&sample()).await?;

        for path in [&saved.markdown, &saved.text, &saved.json] {
            assert!(path.exists());
            let name = path.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("Kim_Younghee__autobiography_"));
        }
        let json: AutobiographyResult =
            serde_json::from_str(&std::fs::read_to_string(&saved.json)?)?;
        assert_eq!(json, sample());
        Ok(())
    }
}
