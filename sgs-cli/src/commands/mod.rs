pub mod anm;
pub mod arc;
pub mod pcm;
pub mod script;

use clap::Subcommand as ClapSubcommand;

#[derive(ClapSubcommand, Debug)]
pub enum Subcommand {
    /// Archive (.arc) container: extract and pack.
    #[clap(subcommand)]
    Arc(arc::ArcAction),
    /// Animation (.anm) codec: decode to bitmaps, encode back.
    #[clap(subcommand)]
    Anm(anm::AnmAction),
    /// PCM/WAV sound codec: inspect and convert.
    #[clap(subcommand)]
    Pcm(pcm::PcmAction),
    /// Script bytecode: disassemble, export/import translations.
    #[clap(subcommand)]
    Script(script::ScriptAction),
}

impl Subcommand {
    pub fn run(&self) -> anyhow::Result<()> {
        match self {
            Subcommand::Arc(action) => action.run(),
            Subcommand::Anm(action) => action.run(),
            Subcommand::Pcm(action) => action.run(),
            Subcommand::Script(action) => action.run(),
        }
    }
}
