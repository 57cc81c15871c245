use patreg::lens::patient::{PatientListArgs, PatientLens};
use patreg::lens::utils::OutputFormat;
use patreg::PatregConfig;

use super::{fail, print_records, print_value, Registry};

pub async fn run(config: &PatregConfig, args: PatientListArgs, output_format: OutputFormat) {
    let registry = Registry::open(config);
    let page = match PatientLens::new(&registry.sessions)
        .list(&args, registry.page_size)
        .await
    {
        Ok(page) => page,
        Err(e) => fail(e),
    };

    if output_format.is_json() {
        print_value(&page, output_format);
        return;
    }

    print_records(&page.patients, output_format);
    let p = &page.pagination;
    println!(
        "Page {} of {} ({} patients)",
        p.page,
        p.total_pages.max(1),
        p.total_records
    );
}
