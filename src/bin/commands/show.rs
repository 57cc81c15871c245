use clap::Args;
use patreg::lens::patient::PatientLens;
use patreg::lens::utils::OutputFormat;
use patreg::PatregConfig;

use super::{fail, print_value, Registry};

/// Arguments for the Show command
#[derive(Args)]
pub struct ShowArgs {
    /// Patient id
    pub id: i64,
}

pub async fn run(config: &PatregConfig, args: ShowArgs, output_format: OutputFormat) {
    let registry = Registry::open(config);
    match PatientLens::new(&registry.sessions).get(args.id).await {
        Ok(Some(record)) => print_value(&record, output_format),
        Ok(None) => fail(format!("no patient with id {}", args.id)),
        Err(e) => fail(e),
    }
}
