use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use xfspeech_core::{pcm, AppConfig, Completion};
use xfspeech_session::{CancellationToken, DictationOptions, IatClient, TtsClient};

#[derive(Parser)]
#[command(name = "xfspeech", about = "Streaming dictation and speech synthesis over WebSocket")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Transcribe a .pcm or .wav file, printing text as it is recognized
    Dictate {
        input: PathBuf,
        /// Sample rate of raw .pcm input (WAV files carry their own)
        #[arg(long, default_value_t = 16000)]
        sample_rate: u32,
        /// Pause between audio frames, overriding the config
        #[arg(long)]
        interval_ms: Option<u64>,
    },
    /// Synthesize text into a .pcm or .wav file
    Synthesize {
        text: String,
        #[arg(short, long)]
        output: PathBuf,
        /// Output sample rate, overriding the config
        #[arg(long)]
        sample_rate: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::from_env_or_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;
    config.validate().context("invalid config")?;

    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false),
    );

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupted, cancelling session");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Dictate {
            input,
            sample_rate,
            interval_ms,
        } => dictate(&config, &input, sample_rate, interval_ms, cancel).await,
        Command::Synthesize {
            text,
            output,
            sample_rate,
        } => synthesize(&config, &text, &output, sample_rate, cancel).await,
    }
}

async fn dictate(
    config: &AppConfig,
    input: &Path,
    sample_rate: u32,
    interval_ms: Option<u64>,
    cancel: CancellationToken,
) -> Result<()> {
    let iat = config.iat.as_ref().context("config has no [iat] section")?;
    let mut options = DictationOptions::from(iat);
    if let Some(ms) = interval_ms {
        options.frame_interval = Duration::from_millis(ms);
    }

    let (audio, sample_rate) = read_audio(input, sample_rate)?;
    tracing::info!(path = %input.display(), bytes = audio.len(), sample_rate, "loaded audio");

    let client = IatClient::from_config(iat).with_options(options);
    let mut dictation = client
        .dictate(audio, sample_rate, cancel)
        .await
        .context("failed to start dictation")?;

    let mut stdout = std::io::stdout();
    while let Some(partial) = dictation.next_partial().await {
        print!("{partial}");
        stdout.flush().context("failed to write to stdout")?;
    }
    println!();

    let transcript = dictation.finish().await;
    if let Completion::Partial(reason) = &transcript.completion {
        bail!("dictation ended early: {reason}");
    }
    Ok(())
}

async fn synthesize(
    config: &AppConfig,
    text: &str,
    output: &Path,
    sample_rate: Option<u32>,
    cancel: CancellationToken,
) -> Result<()> {
    let tts = config.tts.as_ref().context("config has no [tts] section")?;
    let sample_rate = sample_rate.unwrap_or(tts.sample_rate);

    let synthesis = TtsClient::from_config(tts)
        .synthesize(text, sample_rate, cancel)
        .await
        .context("synthesis failed")?;

    write_audio(output, &synthesis.audio, sample_rate)?;
    tracing::info!(
        path = %output.display(),
        seconds = synthesis.duration_secs(),
        "wrote synthesized audio"
    );

    if let Completion::Partial(reason) = &synthesis.completion {
        bail!("synthesis ended early, output is truncated: {reason}");
    }
    Ok(())
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

/// Reads 16-bit mono PCM. WAV files supply their own sample rate.
fn read_audio(path: &Path, sample_rate: u32) -> Result<(Vec<u8>, u32)> {
    if !is_wav(path) {
        let bytes =
            std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        return Ok((bytes, sample_rate));
    }

    let reader = hound::WavReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let spec = reader.spec();
    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        bail!(
            "{} must be 16-bit mono PCM (got {} channel(s), {} bits)",
            path.display(),
            spec.channels,
            spec.bits_per_sample
        );
    }
    let samples = reader
        .into_samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to decode {}", path.display()))?;
    Ok((pcm::samples_to_bytes(&samples), spec.sample_rate))
}

fn write_audio(path: &Path, audio: &[u8], sample_rate: u32) -> Result<()> {
    if !is_wav(path) {
        return std::fs::write(path, audio)
            .with_context(|| format!("failed to write {}", path.display()));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for sample in pcm::bytes_to_samples(audio) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
