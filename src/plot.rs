use std::path::Path;

use plotters::prelude::*;

use crate::error::Error;

/// Draws one line per named curve (loss or risk against iteration) to a PNG.
pub fn draw_curves(path: &Path, title: &str, curves: &[(String, Vec<f64>)]) -> Result<(), Error> {
    let plot_error = |error: &dyn std::fmt::Display| Error::Plot(error.to_string());

    let longest = curves.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
    let finite = curves
        .iter()
        .flat_map(|(_, values)| values.iter().copied())
        .filter(|value| value.is_finite());
    let (low, high) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), v| {
        (low.min(v), high.max(v))
    });
    if longest == 0 || low > high {
        return Err(Error::Plot(format!("nothing to draw for {title}")));
    }
    let padding = ((high - low) * 0.05).max(1e-6);

    let root = BitMapBackend::new(path, (900, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(|e| plot_error(&e))?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(0..longest, (low - padding)..(high + padding))
        .map_err(|e| plot_error(&e))?;

    chart
        .configure_mesh()
        .x_desc("iteration")
        .y_desc("loss")
        .draw()
        .map_err(|e| plot_error(&e))?;

    for (index, (name, values)) in curves.iter().enumerate() {
        let style = Palette99::pick(index).stroke_width(2);
        chart
            .draw_series(LineSeries::new(
                values.iter().copied().enumerate().filter(|(_, v)| v.is_finite()),
                style,
            ))
            .map_err(|e| plot_error(&e))?
            .label(name.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(|e| plot_error(&e))?;
    root.present().map_err(|e| plot_error(&e))?;

    log::info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_curves_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let error = draw_curves(&dir.path().join("loss.png"), "loss", &[]).unwrap_err();

        assert!(matches!(error, Error::Plot(_)));
    }

    #[test]
    fn all_nan_curve_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let curves = vec![("class 0".to_owned(), vec![f64::NAN, f64::NAN])];

        assert!(draw_curves(&dir.path().join("loss.png"), "loss", &curves).is_err());
    }
}
