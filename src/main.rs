// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};
use tracing::info;

use sampledeck::audio;
use sampledeck::config::{EffectSettings, SequencerPattern, Subdivision};
use sampledeck::deck::Deck;
use sampledeck::effects;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A pad sampler and step sequencer engine."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints information about a WAV file.
    Info {
        /// The WAV file to inspect.
        file: PathBuf,
    },
    /// Renders a WAV file through an effects chain and writes the result.
    Export {
        /// The WAV file to process.
        file: PathBuf,
        /// Effect settings as a JSON file. Defaults to pass-through.
        #[arg(short, long)]
        settings: Option<PathBuf>,
        /// The output WAV path.
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Renders a step pattern offline into a stereo master WAV.
    Render {
        /// Sample WAV files, one per pattern row.
        #[arg(long = "sample", required = true)]
        samples: Vec<PathBuf>,
        /// Step rows as 1/0 strings (e.g. 1000100010001000), one per sample.
        #[arg(long = "steps", required = true)]
        steps: Vec<String>,
        /// Tempo in beats per minute.
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
        /// Step subdivision: quarter, eighth, sixteenth, or thirty-second.
        #[arg(long, default_value = "sixteenth")]
        subdivision: String,
        /// How many times to loop the pattern.
        #[arg(long, default_value_t = 4)]
        loops: usize,
        /// The output WAV path.
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Info { file } => info_command(&file),
        Commands::Export {
            file,
            settings,
            out,
        } => export_command(&file, settings.as_deref(), &out),
        Commands::Render {
            samples,
            steps,
            bpm,
            subdivision,
            loops,
            out,
        } => render_command(&samples, &steps, bpm, &subdivision, loops, &out),
    }
}

fn info_command(file: &std::path::Path) -> Result<(), Box<dyn Error>> {
    let buffer = audio::decode_wav(&fs::read(file)?)?;
    println!("file: {}", file.display());
    println!("channels: {}", buffer.channel_count());
    println!("sample rate: {} Hz", buffer.sample_rate());
    println!("frames: {}", buffer.frames());
    println!("duration: {:.3} s", buffer.duration().as_secs_f64());
    println!("peak: {:.4}", buffer.peak(0));
    Ok(())
}

fn export_command(
    file: &std::path::Path,
    settings: Option<&std::path::Path>,
    out: &std::path::Path,
) -> Result<(), Box<dyn Error>> {
    let buffer = audio::decode_wav(&fs::read(file)?)?;
    let settings: EffectSettings = match settings {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => EffectSettings::default(),
    };

    let voice = effects::build_voice(&buffer, &settings);
    fs::write(out, audio::encode_wav(&voice)?)?;
    info!(out = %out.display(), frames = voice.frames(), "Export written");
    Ok(())
}

fn render_command(
    samples: &[PathBuf],
    steps: &[String],
    bpm: f64,
    subdivision: &str,
    loops: usize,
    out: &std::path::Path,
) -> Result<(), Box<dyn Error>> {
    if samples.len() != steps.len() {
        return Err("each --sample needs a matching --steps row".into());
    }
    let subdivision = match subdivision {
        "quarter" => Subdivision::Quarter,
        "eighth" => Subdivision::Eighth,
        "sixteenth" => Subdivision::Sixteenth,
        "thirty-second" => Subdivision::ThirtySecond,
        other => return Err(format!("unknown subdivision: {other}").into()),
    };
    let step_count = steps.iter().map(String::len).max().unwrap_or(16);

    let deck = Deck::new(44100);
    deck.load_pattern(SequencerPattern::new(step_count, subdivision, bpm));

    for (path, row) in samples.iter().zip(steps) {
        let buffer = audio::decode_wav(&fs::read(path)?)?;
        let id = deck.capture(buffer);
        for (step, flag) in row.chars().enumerate() {
            deck.set_step(id, step, flag == '1');
        }
    }

    let master = deck.render_pattern(loops);
    fs::write(out, audio::encode_wav(&master)?)?;
    info!(
        out = %out.display(),
        secs = master.duration().as_secs_f64(),
        "Master render written"
    );
    Ok(())
}
