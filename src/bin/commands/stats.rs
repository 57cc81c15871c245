use patreg::lens::dashboard::DashboardLens;
use patreg::lens::utils::OutputFormat;
use patreg::PatregConfig;

use super::{fail, print_records, print_value, Registry};

pub async fn run(config: &PatregConfig, output_format: OutputFormat) {
    let registry = Registry::open(config);
    let stats = match DashboardLens::new(&registry.sessions).stats().await {
        Ok(stats) => stats,
        Err(e) => fail(e),
    };

    if output_format.is_json() {
        print_value(&stats, output_format);
        return;
    }

    println!("Total patients: {}", stats.total_patients);
    println!();
    println!("Recent registrations:");
    print_records(&stats.recent_patients, output_format);
    println!();
    println!("Gender distribution:");
    print_records(&stats.gender_distribution, output_format);
    println!();
    println!("Registrations by month:");
    print_records(&stats.monthly_registrations, output_format);
}
