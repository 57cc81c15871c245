use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use patreg::lens::export::{ExportArgs, ExportLens};
use patreg::PatregConfig;

use super::{fail, Registry};

/// Arguments for the Export command
#[derive(Args)]
pub struct ExportCommandArgs {
    #[clap(flatten)]
    pub export: ExportArgs,

    /// File to write; `-` prints to stdout (defaults to patients_export.<format>)
    #[clap(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn run(config: &PatregConfig, args: ExportCommandArgs) {
    let ExportCommandArgs { export, output } = args;

    let registry = Registry::open(config);
    let rendered = match ExportLens::new(&registry.sessions).export(&export).await {
        Ok(rendered) => rendered,
        Err(e) => fail(e),
    };

    let path = output.unwrap_or_else(|| PathBuf::from(&rendered.filename));
    if path.as_os_str() == "-" {
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.write_all(rendered.content.as_bytes()) {
            fail(e);
        }
        return;
    }

    if let Err(e) = std::fs::write(&path, &rendered.content) {
        fail(format!("failed to write {}: {}", path.display(), e));
    }
    eprintln!(
        "Exported {} row(s) as {} to {}",
        rendered.row_count,
        rendered.format,
        path.display()
    );
}
