use patreg::lens::dashboard::{DashboardLens, PatientSearchArgs};
use patreg::lens::utils::OutputFormat;
use patreg::PatregConfig;

use super::{fail, print_records, Registry};

pub async fn run(config: &PatregConfig, args: PatientSearchArgs, output_format: OutputFormat) {
    let registry = Registry::open(config);
    match DashboardLens::new(&registry.sessions).search(&args).await {
        Ok(results) => print_records(&results, output_format),
        Err(e) => fail(e),
    }
}
