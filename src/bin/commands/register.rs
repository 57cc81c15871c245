use patreg::lens::registration::{PatientForm, RegistrationLens};
use patreg::lens::utils::OutputFormat;
use patreg::PatregConfig;

use super::{fail, print_value, Registry};

pub async fn run(config: &PatregConfig, form: PatientForm, output_format: OutputFormat) {
    let registry = Registry::open(config);
    let lens = RegistrationLens::new(&registry.sessions, &registry.notifier);

    match lens.register(&form).await {
        Ok(record) => {
            if !output_format.is_json() {
                println!("Registered patient #{} ({})", record.id, record.full_name());
            }
            print_value(&record, output_format);
        }
        Err(e) => fail(e),
    }
}
