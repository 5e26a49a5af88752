mod scenario_table;

use query_harness_summary_model::MeasurementTarget;
use tabled::settings::Style;
use tabled::Table;

use crate::report::scenario_table::ScenarioRow;
use crate::MeasurementSums;

/// Collects one row of averages per executed scenario for the end of run summary.
///
/// A single report lives for one harness invocation and is handed to the driver's reporting
/// step once all scenarios have run.
#[derive(Default)]
pub struct SummaryReport {
    rows: Vec<ScenarioRow>,
}

impl SummaryReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold the sums of a finished scenario into the report.
    pub fn add_scenario(&mut self, scenario_name: &str, sums: &MeasurementSums, iterations: usize) {
        let [parsing, planning, plan_execution, wall] =
            MeasurementTarget::SUMMARY_ORDER.map(|target| sums.average(target, iterations));

        self.rows.push(ScenarioRow {
            scenario_name: scenario_name.to_string(),
            query_parsing_time: parsing,
            query_planning_time: planning,
            query_plan_execution_time: plan_execution,
            wall_time: wall,
        });
    }

    pub fn scenario_count(&self) -> usize {
        self.rows.len()
    }

    pub fn render(&self) -> String {
        let mut table = Table::new(&self.rows);
        table.with(Style::modern());

        format!("Summary:\n{table}")
    }

    pub fn print(&self) {
        println!("\n\n{}\n", self.render());
    }
}
