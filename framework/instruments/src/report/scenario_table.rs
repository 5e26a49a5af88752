use tabled::Tabled;

#[derive(Tabled)]
pub struct ScenarioRow {
    pub scenario_name: String,
    #[tabled(display = "time_or_placeholder")]
    pub query_parsing_time: Option<f64>,
    #[tabled(display = "time_or_placeholder")]
    pub query_planning_time: Option<f64>,
    #[tabled(display = "time_or_placeholder")]
    pub query_plan_execution_time: Option<f64>,
    #[tabled(display = "time_or_placeholder")]
    pub wall_time: Option<f64>,
}

fn time_or_placeholder(time: &Option<f64>) -> String {
    match time {
        Some(time) => format!("{:.10}", time),
        None => "-".to_string(),
    }
}
