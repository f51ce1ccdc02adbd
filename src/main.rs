use anyhow::Result;
use ev_fleet_scheduler::{
    base_prices, extract, telemetry, Multistart, ProjectedGradientSolver, ScheduleModel,
    StudyConfig,
};
use tracing::info;

fn main() -> Result<()> {
    telemetry::init_tracing();

    let cfg = StudyConfig::load()?;
    info!(
        horizon = cfg.horizon,
        cohorts = cfg.cohorts.len(),
        restarts = cfg.solve.restarts,
        "starting EV fleet scheduling study"
    );

    let base = base_prices(cfg.horizon, &cfg.price);
    let model = ScheduleModel::new(cfg.horizon, &cfg.cohorts, base)?;

    let orchestrator = Multistart::new(Box::new(ProjectedGradientSolver::default()), &cfg.solve);
    let solved = orchestrator.run(&model)?;

    let report = extract(&model, &solved.state);
    info!(
        total_cost = report.total_cost,
        best_restart = solved.best_restart,
        converged = solved.restarts_converged,
        "schedule solved"
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
