use chrono::NaiveDate;
use timesheet_reconciler::{
    format_hours, format_signed_hours, PlanAdjustment, PlanAdjustments, PlannedAllocations,
    TimesheetAnalyzer, ViewMode,
};

const SAMPLE_EXPORT: &str = "\
Timesheet Export,,,,,,,,
Staff Name: Demo User,,,,,,,,
Report Date From: 01/08/2024 to 31/08/2024,,,,,,,,
Project Name,Work Code,29/07/2024,30/07/2024,31/07/2024,01/08/2024,02/08/2024,03/08/2024,04/08/2024
000001-BD- Project Atlas,DEV,8,8,8,6,6,,
Glencore Mobile Tracking Phase 2,DEV,,,,2,2,,
Total Hours,,8,8,8,8,8,,
Project Name,Work Code,05/08/2024,06/08/2024,07/08/2024,08/08/2024,09/08/2024,10/08/2024,11/08/2024
000001-BD- Project Atlas,DEV,5,5,5,5,5,,
Glencore Mobile Tracking Phase 2,DEV,3,3,3,3,3,,
000099-Internal Tooling,ADM,,,,,,4,
Total Hours,,8,8,8,8,8,4,
";

fn main() {
    let bytes = match std::env::args().nth(1) {
        Some(path) => std::fs::read(&path).expect("export file should be readable"),
        None => SAMPLE_EXPORT.as_bytes().to_vec(),
    };

    let planned = PlanAdjustments::new(vec![
        PlanAdjustment::AddMonthlyProject {
            name: "BD- Project Atlas".to_string(),
            hours: 80.0,
        },
        PlanAdjustment::AddMonthlyProject {
            name: "Mobile Warehouse Operations".to_string(),
            hours: 20.0,
        },
    ])
    .apply(&PlannedAllocations::new());

    let today = NaiveDate::from_ymd_opt(2024, 8, 9).unwrap();
    let report = TimesheetAnalyzer::default()
        .analyze_csv(&bytes, &planned, ViewMode::Monthly, today)
        .expect("export should contain a report date range");

    if let Some(range) = report.report_range {
        println!("Report {} to {}, as of {}", range.start, range.end, today);
    }
    println!(
        "{:<32} {:>8} {:>8} {:>8}  Forecast",
        "Project", "Actual", "Planned", "Diff"
    );
    for row in &report.rows {
        println!(
            "{:<32} {:>8} {:>8} {:>8}  {}",
            row.project,
            format_hours(row.actual),
            format_hours(row.planned),
            format_signed_hours(row.diff),
            row.forecast.describe()
        );
    }

    println!();
    println!("Total actual:     {}", format_hours(report.totals.total_actual));
    println!("Total planned:    {}", format_hours(report.totals.total_planned));
    println!("Unplanned work:   {}", format_hours(report.totals.unplanned_work));
    println!("Planned health:   {:?}", report.health);
}
