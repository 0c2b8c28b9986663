use comfy_table::{presets::NOTHING, *};
use popgrid::RunSummary;

fn summary_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table
        .load_preset(NOTHING)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Outcome").add_attribute(Attribute::Bold),
            Cell::new("Countries").add_attribute(Attribute::Bold),
        ])
        .set_style(comfy_table::TableComponent::BottomBorder, '─')
        .set_style(comfy_table::TableComponent::MiddleHeaderIntersections, '─')
        .set_style(comfy_table::TableComponent::HeaderLines, '─')
        .set_style(comfy_table::TableComponent::BottomBorderIntersections, '─')
        .set_style(comfy_table::TableComponent::TopBorder, '─')
        .set_style(comfy_table::TableComponent::TopBorderIntersections, '─');
    for (outcome, count) in [
        ("Indexed", summary.indexed),
        ("Generated", summary.generated),
        ("Skipped (exists)", summary.skipped),
        ("No population", summary.empty),
        ("Failed", summary.failed),
    ] {
        table.add_row(vec![outcome.to_string(), count.to_string()]);
    }
    table
}

pub fn display_summary(summary: &RunSummary) {
    println!("\n{}", summary_table(summary));
}
