use sensol::*;

fn main() -> anyhow::Result<()> {
    let model = RocketCar::default();
    let scenario = Scenario::new(dvector![0.0, 0.0, 1.0], dvector![0.4], 0.5, 1e-3)?;

    for backend in Backend::ALL {
        let settings = SolverSettings::for_backend(backend);
        let report = run_battery(&model, &scenario, &settings)?;
        println!("{report}");
    }

    Ok(())
}
