use anyhow::{bail, Result};
use clap::Parser;
use inquire::Text;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use story2autobiography::core::config::{Config, DEFAULT_CONFIG_PATH};
use story2autobiography::core::io::{NativeStorage, Storage};
use story2autobiography::services::input::{
    detect_input_type, read_text_file, validate_transcript, InputKind,
};
use story2autobiography::services::llm::create_llm;
use story2autobiography::services::output::OutputWriter;
use story2autobiography::services::retry::RetryPolicy;
use story2autobiography::services::stages::GenerationSettings;
use story2autobiography::services::transcriber::{AudioTranscriber, WhisperClient};
use story2autobiography::services::workflow::WorkflowManager;

#[derive(Parser, Debug)]
#[command(
    name = "story2autobiography",
    version,
    about = "Turn a spoken or written life story into an autobiography"
)]
struct Cli {
    /// Text (.txt, .md) or audio (.mp3, .wav, ...) file with the life story
    #[arg(short, long, value_name = "PATH", conflicts_with = "text")]
    input: Option<PathBuf>,

    /// Life story given directly on the command line
    #[arg(short, long)]
    text: Option<String>,

    /// Output folder, overriding `output_folder` from the config
    #[arg(short, long, value_name = "DIR")]
    output: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Spoken language of audio input, e.g. `ko` or `en`
    #[arg(short, long)]
    language: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            eprintln!(
                "Please ensure '{}' exists with valid LLM settings.",
                cli.config.display()
            );
            return Err(e);
        }
    };
    if let Some(output) = &cli.output {
        config.output_folder = output.clone();
    }
    config.ensure_directories()?;

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
    let llm = create_llm(&config)?;

    let transcript = load_transcript(&cli, &config, storage.as_ref()).await?;
    let transcript = validate_transcript(&transcript, config.min_transcript_chars)?;
    println!("Transcript length: {} characters", transcript.chars().count());

    println!("Generating autobiography: analysis -> five life periods -> integration");
    let manager = WorkflowManager::new(llm, GenerationSettings::from_config(&config));
    let result = manager.run(&transcript).await?;
    println!(
        "Generated \"{}\" with {} chapters",
        result.title,
        result.chapters.len()
    );

    let writer = OutputWriter::new(storage, &config.output_folder);
    let saved = writer.save(&result).await?;
    println!("Saved:");
    println!("  markdown: {}", saved.markdown.display());
    println!("  text:     {}", saved.text.display());
    println!("  json:     {}", saved.json.display());

    Ok(())
}

async fn load_transcript(cli: &Cli, config: &Config, storage: &dyn Storage) -> Result<String> {
    if let Some(text) = &cli.text {
        return Ok(text.clone());
    }

    let path = match &cli.input {
        Some(path) => path.clone(),
        None if !config.unattended => {
            let answer = Text::new("Path to the life story (text or audio file):").prompt()?;
            PathBuf::from(answer.trim().trim_matches('"'))
        }
        None => bail!("No input given: pass --input <PATH> or --text <TEXT>"),
    };

    match detect_input_type(&path)? {
        InputKind::Text => {
            println!("Reading text file {}", path.display());
            Ok(read_text_file(storage, &path).await?)
        }
        InputKind::Audio => transcribe(cli, config, &path).await,
    }
}

async fn transcribe(cli: &Cli, config: &Config, path: &Path) -> Result<String> {
    let language = cli
        .language
        .clone()
        .unwrap_or_else(|| config.transcription.language.clone());
    let retry = RetryPolicy::new(config.llm.retry_count, config.llm.retry_delay_seconds);
    let stt = Arc::new(WhisperClient::from_config(&config.transcription, retry)?);
    let transcriber = AudioTranscriber::new(stt, config.transcription.clone()).await;

    println!("Transcribing audio file {} ({})", path.display(), language);
    let text = transcriber.split_and_transcribe_audio(path, &language).await?;
    println!("Transcription complete");
    Ok(text)
}
