use trend_surface::{
    config::{CrossValidationParams, IntervalKind, TrendSettings},
    progress::{closure_sink, ProgressMsg},
    SampleSet, TrendSurface, TrendTestFunctions,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Scatter some samples over [0, 1]^2
    let points = TrendTestFunctions::random_points(500, [0.0, 0.0, 1.0, 1.0], Some(42));

    // A regional cubic trend with short wavelength local variation, a little
    // noise and a handful of gross outliers
    let mut values = TrendTestFunctions::regional_with_local(&points);
    TrendTestFunctions::add_noise(&mut values, 0.02, Some(43));
    let outliers = TrendTestFunctions::inject_outliers(&mut values, 10, 3.0, Some(44));

    let samples = SampleSet::from_points(&points, &values, None)?;

    // Print progress messages from a listener thread
    let (sink, _cancel, handle) = closure_sink(64, |msg| match msg {
        ProgressMsg::RobustIteration {
            iter,
            scale,
            relative_change,
        } => println!("IRLS {iter}: scale {scale:.4}, change {relative_change:.2e}"),
        ProgressMsg::CrossValidationFold { fold, rmse, progress } => {
            println!("fold {fold}: RMSE {rmse:.4} ({:.0}%)", progress * 100.0)
        }
        ProgressMsg::GridRow { .. } => {}
        ProgressMsg::Message { message } => println!("{message}"),
    });

    // Robust cubic trend with cross-validation and 95% prediction intervals
    let settings = TrendSettings::builder(3)
        .robust()
        .cross_validation(CrossValidationParams::default())
        .confidence_level(0.95)
        .interval_kind(IntervalKind::Prediction)
        .build();

    let trend = TrendSurface::builder(samples, settings)
        .progress_callback(sink)
        .build()?;

    // Evaluate over the sample extent plus a 10% buffer
    let grid = trend.default_grid(0.02)?;
    let outputs = trend.evaluate(&grid)?;

    println!();
    println!("{trend}");
    println!(
        "Evaluated {} x {} grid, surface at centre cell: {:.4}",
        grid.n_rows,
        grid.n_cols,
        outputs.surface[(grid.n_rows / 2, grid.n_cols / 2)]
    );

    let diagnostics = trend.sample_diagnostics();
    for i in outliers {
        let d = &diagnostics[i];
        println!(
            "outlier at ({:.3}, {:.3}): residual {:.3}, robust weight {:.3}",
            d.x, d.y, d.residual, d.robust_weight
        );
    }

    // Dropping the trend drops the last sender, which ends the listener thread
    drop(trend);
    let _ = handle.join();

    Ok(())
}
