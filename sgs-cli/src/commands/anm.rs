use anyhow::Context;
use clap::Subcommand;
use sgs_core::anm::{self, Animation, AnimationFrame};
use sgs_core::bmp;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Subcommand, Debug)]
pub enum AnmAction {
    /// Decode an .anm file into palette.txt, metadata.txt, and frame bitmaps.
    Decode { input: PathBuf, out_dir: PathBuf },
    /// Encode a directory of sidecars and bitmaps back into an .anm file.
    Encode {
        in_dir: PathBuf,
        output: PathBuf,

        /// Whether to column-RLE compress the frames.
        #[clap(default_value = "true")]
        rle: bool,
    },
}

impl AnmAction {
    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            AnmAction::Decode { input, out_dir } => decode(input, out_dir),
            AnmAction::Encode { in_dir, output, rle } => encode(in_dir, output, *rle),
        }
    }
}

fn decode(input: &Path, out_dir: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let animation = Animation::decode(&bytes).with_context(|| format!("decoding {}", input.display()))?;
    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;

    std::fs::write(out_dir.join("palette.txt"), anm::format_palette_txt(&animation.palette))?;
    std::fs::write(out_dir.join("metadata.txt"), anm::format_metadata_txt(&animation.frames))?;

    for (i, frame) in animation.frames.iter().enumerate() {
        let bmp_bytes = bmp::encode_indexed_bmp(frame.width, frame.height, &frame.data, &animation.palette.0)
            .with_context(|| format!("encoding frame {i} as bitmap"))?;
        std::fs::write(out_dir.join(format!("frame_{i:04}.bmp")), bmp_bytes)?;
    }

    log::info!("decoded {} frames to {}", animation.frames.len(), out_dir.display());
    Ok(())
}

fn encode(in_dir: &Path, output: &Path, rle: bool) -> anyhow::Result<()> {
    let palette_text = std::fs::read_to_string(in_dir.join("palette.txt"))
        .with_context(|| format!("reading palette.txt in {}", in_dir.display()))?;
    let palette = anm::parse_palette_txt(&palette_text)?;

    let metadata: HashMap<usize, anm::FrameMetadata> = match std::fs::read_to_string(in_dir.join("metadata.txt")) {
        Ok(text) => anm::parse_metadata_txt(&text)?
            .into_iter()
            .map(|m| (m.index, m))
            .collect(),
        Err(_) => HashMap::new(),
    };

    let mut frames = Vec::new();
    let mut i = 0usize;
    loop {
        let path = in_dir.join(format!("frame_{i:04}.bmp"));
        if !path.exists() {
            break;
        }
        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        let (width, height, data, _frame_palette) =
            bmp::decode_indexed_bmp(&bytes).with_context(|| format!("decoding {}", path.display()))?;
        let (left, top) = metadata.get(&i).map(|m| (m.left, m.top)).unwrap_or((0, 0));
        frames.push(AnimationFrame { left, top, width, height, data });
        i += 1;
    }
    log::info!("assembled {} frames from {}", frames.len(), in_dir.display());

    let animation = Animation { palette, frames, compressed: rle };
    let bytes = animation.encode().with_context(|| "encoding animation")?;
    std::fs::write(output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}
