use anyhow::Context;
use clap::Subcommand;
use sgs_core::encoding::TextCodec;
use sgs_core::fsutil::{relative_slash_path, PathWalker};
use sgs_core::script;
use std::path::{Path, PathBuf};

const DEFAULT_MAX_LINE_LENGTH: usize = 50;

#[derive(Subcommand, Debug)]
pub enum ScriptAction {
    /// Disassemble a script to a line-oriented listing.
    #[clap(visible_alias = "d")]
    Disasm {
        input: PathBuf,
        output: Option<PathBuf>,

        #[clap(long, default_value = "shift-jis")]
        encoding: String,
    },
    /// Export every display/token/choice string as a translation file.
    #[clap(visible_alias = "e")]
    Export {
        input: PathBuf,
        output: Option<PathBuf>,

        #[clap(long, default_value = "shift-jis")]
        encoding: String,
    },
    /// Apply a translation file to a script, rewriting jump targets.
    #[clap(visible_alias = "i")]
    Import {
        script: PathBuf,
        text: PathBuf,
        output: Option<PathBuf>,
        max_line_length: Option<usize>,

        #[clap(long, default_value = "shift-jis")]
        encoding: String,
    },
    /// Export every script in a directory tree.
    BatchExport {
        dir: PathBuf,
        out_dir: Option<PathBuf>,

        #[clap(long, default_value = "shift-jis")]
        encoding: String,
    },
    /// Import matching translation files across a directory tree.
    BatchImport {
        script_dir: PathBuf,
        text_dir: PathBuf,
        out_dir: Option<PathBuf>,
        max_line_length: Option<usize>,

        #[clap(long, default_value = "shift-jis")]
        encoding: String,
    },
}

impl ScriptAction {
    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            ScriptAction::Disasm { input, output, encoding } => disasm(input, output.as_deref(), encoding),
            ScriptAction::Export { input, output, encoding } => export(input, output.as_deref(), encoding),
            ScriptAction::Import {
                script,
                text,
                output,
                max_line_length,
                encoding,
            } => import(
                script,
                text,
                output.as_deref(),
                max_line_length.unwrap_or(DEFAULT_MAX_LINE_LENGTH),
                encoding,
            ),
            ScriptAction::BatchExport { dir, out_dir, encoding } => batch_export(dir, out_dir.as_deref(), encoding),
            ScriptAction::BatchImport {
                script_dir,
                text_dir,
                out_dir,
                max_line_length,
                encoding,
            } => batch_import(
                script_dir,
                text_dir,
                out_dir.as_deref(),
                max_line_length.unwrap_or(DEFAULT_MAX_LINE_LENGTH),
                encoding,
            ),
        }
    }
}

fn write_or_print(output: Option<&Path>, text: &str) -> anyhow::Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn disasm(input: &Path, output: Option<&Path>, encoding: &str) -> anyhow::Result<()> {
    let codec = TextCodec::by_name(encoding)?;
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let disasm = script::disassemble(&bytes, codec).with_context(|| format!("disassembling {}", input.display()))?;
    write_or_print(output, &(disasm.lines.join("\n") + "\n"))
}

fn export(input: &Path, output: Option<&Path>, encoding: &str) -> anyhow::Result<()> {
    let codec = TextCodec::by_name(encoding)?;
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let text = script::export(&bytes, codec).with_context(|| format!("exporting {}", input.display()))?;
    write_or_print(output, &text)
}

fn import(
    script_path: &Path,
    text_path: &Path,
    output: Option<&Path>,
    max_line_length: usize,
    encoding: &str,
) -> anyhow::Result<()> {
    let codec = TextCodec::by_name(encoding)?;
    let source = std::fs::read(script_path).with_context(|| format!("reading {}", script_path.display()))?;
    let text = std::fs::read_to_string(text_path).with_context(|| format!("reading {}", text_path.display()))?;
    let translations = script::parse_translations(&text);
    let patched = script::import(&source, &translations, codec, max_line_length)
        .with_context(|| format!("patching {}", script_path.display()))?;

    let dest = output.unwrap_or(script_path);
    let tmp_path = dest.with_extension("sgspatch.tmp");
    std::fs::write(&tmp_path, &patched).with_context(|| format!("writing {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, dest).with_context(|| format!("replacing {}", dest.display()))?;
    log::info!("patched {} ({} translations)", dest.display(), translations.len());
    Ok(())
}

fn batch_export(dir: &Path, out_dir: Option<&Path>, encoding: &str) -> anyhow::Result<()> {
    let codec = TextCodec::by_name(encoding)?;
    let out_dir = out_dir.unwrap_or(dir);
    let mut failed = 0usize;
    for entry in PathWalker::new(dir)? {
        let path = entry?;
        let rel = relative_slash_path(dir, &path);
        match export_one(&path, &codec) {
            Ok(text) => {
                let dest = out_dir.join(format!("{rel}.txt"));
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&dest, text).with_context(|| format!("writing {}", dest.display()))?;
            }
            Err(e) => {
                log::warn!("skipping {rel}: {e:#}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} file(s) failed to export");
    }
    Ok(())
}

fn export_one(path: &Path, codec: &TextCodec) -> anyhow::Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    script::export(&bytes, *codec).with_context(|| format!("exporting {}", path.display()))
}

fn batch_import(
    script_dir: &Path,
    text_dir: &Path,
    out_dir: Option<&Path>,
    max_line_length: usize,
    encoding: &str,
) -> anyhow::Result<()> {
    let codec = TextCodec::by_name(encoding)?;
    let out_dir = out_dir.unwrap_or(script_dir);
    let mut failed = 0usize;
    for entry in PathWalker::new(script_dir)? {
        let path = entry?;
        let rel = relative_slash_path(script_dir, &path);
        let text_path = text_dir.join(format!("{rel}.txt"));
        if !text_path.exists() {
            log::debug!("no translation file for {rel}, skipping");
            continue;
        }
        match import_one(&path, &text_path, codec, max_line_length) {
            Ok(patched) => {
                let dest = out_dir.join(&rel);
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let tmp = dest.with_extension("sgspatch.tmp");
                std::fs::write(&tmp, &patched)?;
                std::fs::rename(&tmp, &dest)?;
            }
            Err(e) => {
                log::warn!("skipping {rel}: {e:#}");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} file(s) failed to import");
    }
    Ok(())
}

fn import_one(
    script_path: &Path,
    text_path: &Path,
    codec: TextCodec,
    max_line_length: usize,
) -> anyhow::Result<Vec<u8>> {
    let source = std::fs::read(script_path).with_context(|| format!("reading {}", script_path.display()))?;
    let text = std::fs::read_to_string(text_path).with_context(|| format!("reading {}", text_path.display()))?;
    let translations = script::parse_translations(&text);
    script::import(&source, &translations, codec, max_line_length)
        .with_context(|| format!("patching {}", script_path.display()))
}
