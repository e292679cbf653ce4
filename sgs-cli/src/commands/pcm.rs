use anyhow::Context;
use clap::Subcommand;
use sgs_core::pcm::{PcmSound, VersionGate};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum PcmAction {
    /// Print detected container, format fields, and derived byte rate/duration.
    Info {
        input: PathBuf,

        #[clap(default_value = "unrestricted")]
        version: String,
    },
    /// Convert to a canonical WAV file, preserving channels/rate/bit depth.
    Towav {
        input: PathBuf,
        output: PathBuf,

        #[clap(default_value = "unrestricted")]
        version: String,
    },
    /// Convert to raw PCM, forced to mono 22050 Hz (bit depth from `version`).
    Topcm {
        input: PathBuf,
        output: PathBuf,

        #[clap(default_value = "unrestricted")]
        version: String,
    },
}

impl PcmAction {
    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            PcmAction::Info { input, version } => info(input, version),
            PcmAction::Towav { input, output, version } => towav(input, output, version),
            PcmAction::Topcm { input, output, version } => topcm(input, output, version),
        }
    }
}

fn load(input: &std::path::Path, version: &str) -> anyhow::Result<PcmSound> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let gate = VersionGate::parse(version)?;
    PcmSound::parse(&bytes, gate).with_context(|| format!("parsing {}", input.display()))
}

fn info(input: &std::path::Path, version: &str) -> anyhow::Result<()> {
    let sound = load(input, version)?;
    println!("{}", sound.info());
    Ok(())
}

fn towav(input: &std::path::Path, output: &std::path::Path, version: &str) -> anyhow::Result<()> {
    let sound = load(input, version)?;
    let bytes = sound.to_wav().with_context(|| "converting to WAV")?;
    std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    log::info!("wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}

fn topcm(input: &std::path::Path, output: &std::path::Path, version: &str) -> anyhow::Result<()> {
    let sound = load(input, version)?;
    let gate = VersionGate::parse(version)?;
    let bytes = sound.to_raw(gate).with_context(|| "converting to raw PCM")?;
    std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    log::info!("wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}
