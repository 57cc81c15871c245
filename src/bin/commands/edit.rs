use clap::Args;
use patreg::lens::registration::{PatientEditArgs, RegistrationLens};
use patreg::lens::utils::OutputFormat;
use patreg::PatregConfig;

use super::{fail, print_value, Registry};

/// Arguments for the Edit command
#[derive(Args)]
pub struct EditArgs {
    /// Patient id
    pub id: i64,

    #[clap(flatten)]
    pub changes: PatientEditArgs,
}

pub async fn run(config: &PatregConfig, args: EditArgs, output_format: OutputFormat) {
    let EditArgs { id, changes } = args;
    if changes.is_empty() {
        fail("nothing to change; pass at least one field, e.g. --phone 2025550143");
    }

    let registry = Registry::open(config);
    let lens = RegistrationLens::new(&registry.sessions, &registry.notifier);

    let form = match lens.load_form(id).await {
        Ok(Some(form)) => changes.apply_to(form),
        Ok(None) => fail(format!("no patient with id {}", id)),
        Err(e) => fail(e),
    };

    match lens.edit(id, &form).await {
        Ok(Some(record)) => {
            if !output_format.is_json() {
                println!("Updated patient #{}", record.id);
            }
            print_value(&record, output_format);
        }
        Ok(None) => fail(format!("no patient with id {}", id)),
        Err(e) => fail(e),
    }
}
