use patreg::lens::query::{QueryArgs, QueryLens};
use patreg::lens::utils::OutputFormat;
use patreg::PatregConfig;

use super::{fail, print_rows, print_value, Registry};

pub async fn run(config: &PatregConfig, args: QueryArgs, output_format: OutputFormat) {
    let registry = Registry::open(config);
    let page = match QueryLens::new(&registry.sessions, &registry.notifier)
        .execute(&args, registry.page_size)
        .await
    {
        Ok(page) => page,
        Err(e) => fail(e),
    };

    if output_format.is_json() {
        print_value(&page, output_format);
        return;
    }

    match &page.pagination {
        Some(p) => {
            print_rows(&page.columns, &page.rows, output_format);
            println!(
                "Page {} of {} ({} rows)",
                p.page,
                p.total_pages.max(1),
                p.total_records
            );
        }
        None if !page.columns.is_empty() => print_rows(&page.columns, &page.rows, output_format),
        None => println!("{} row(s) affected", page.rows_affected),
    }
}
