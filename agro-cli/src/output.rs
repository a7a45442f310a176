//! Human-readable rendering of forecasts and advice.

use agro_core::{
    Advice, AdvisoryKind, ForecastSeries, GeocodedPlace, LocatedForecast, forecast_table,
};

fn location_line(place: Option<&GeocodedPlace>, series: &ForecastSeries) -> String {
    let mut line = match place {
        Some(place) => format!("{} ({})", place.label(), series.coordinates),
        None => series.coordinates.to_string(),
    };
    if let Some(tz) = &series.timezone {
        line.push_str(&format!(" [{tz}]"));
    }
    line
}

/// Storm days as "Tue 04 Jun", comma separated.
pub fn storm_summary(series: &ForecastSeries) -> Option<String> {
    let days: Vec<String> = series
        .storm_days()
        .map(|day| day.date.format("%a %d %b").to_string())
        .collect();
    (!days.is_empty()).then(|| days.join(", "))
}

fn print_series(place: Option<&GeocodedPlace>, series: &ForecastSeries) {
    println!("Forecast for {}", location_line(place, series));
    if let Some(current) = &series.current {
        println!("Now: {}", current.summary());
    }
    println!();
    print!("{}", forecast_table(series));
    println!(
        "\nTotal rainfall over {} days: {:.1} mm",
        series.len(),
        series.total_precipitation_mm()
    );
    match storm_summary(series) {
        Some(days) => println!("Storm warning: heavy rain expected on {days}"),
        None => println!("No storm days expected."),
    }
}

pub fn print_forecast(located: &LocatedForecast) {
    print_series(located.place.as_ref(), &located.series);
}

pub fn print_advice(advice: &Advice) {
    print_series(advice.place.as_ref(), &advice.forecast);

    let heading = match advice.kind {
        AdvisoryKind::IrrigationAdvice => "Irrigation recommendation",
        AdvisoryKind::CropRecommendation => "Crop recommendation",
    };
    println!("\n{heading}");
    println!("{}", "-".repeat(heading.len()));
    println!("{}", advice.text.trim_end());
}
