// Text rendering of recommendations and dataset insights
use crate::analyzer::DatasetInsights;
use crate::model::{CompletionError, Record, RecommendationSet};

/// `make model`, whichever of the two exist, or `Car #n`.
pub fn headline(record: &Record<'_>, position: usize) -> String {
    match (record.make_display(), record.model_display()) {
        (Some(make), Some(model)) => format!("{} {}", make, model),
        (Some(make), None) => make,
        (None, Some(model)) => model,
        (None, None) => format!("Car #{}", position + 1),
    }
}

/// Key specifications joined by " | ", limited to the columns present.
pub fn specs_line(record: &Record<'_>) -> String {
    let mut specs = Vec::new();
    if let Some(year) = record.year() {
        specs.push(format!("Year: {}", year));
    }
    if let Some(mpg) = record.combined_mpg() {
        specs.push(format!("MPG: {}", mpg));
    }
    if let Some(fuel) = record.fuel_type() {
        specs.push(format!("Fuel: {}", fuel));
    }
    if let Some(transmission) = record.transmission() {
        specs.push(format!("Transmission: {}", transmission));
    }
    specs.join(" | ")
}

pub fn format_recommendations(set: &RecommendationSet) -> String {
    if set.is_empty() {
        return "No cars matching your criteria were found. Try adjusting your requirements or filters."
            .to_string();
    }
    let mut out = String::from("🚗 Recommended Cars\n");
    if set.is_fallback() {
        out.push_str("(no direct matches, showing the most affordable cars instead)\n");
    }
    for (i, (record, _)) in set.records().enumerate() {
        out.push_str(&format!("\n{}. {}\n", i + 1, headline(&record, i)));
        let specs = specs_line(&record);
        if !specs.is_empty() {
            out.push_str(&format!("   {}\n", specs));
        }
    }
    out
}

pub fn format_insights(insights: &DatasetInsights) -> String {
    let mut out = format!("📊 Total cars in database: {}\n", insights.total_cars);
    if let Some(makes) = insights.manufacturers {
        out.push_str(&format!("Number of manufacturers: {}\n", makes));
    }
    if !insights.top_body_types.is_empty() {
        out.push_str("Top 5 body types:\n");
        for (class, count) in &insights.top_body_types {
            out.push_str(&format!("  {}: {}\n", class, count));
        }
    }
    if !insights.cars_by_year.is_empty() {
        out.push_str("Cars by year:\n");
        for (year, count) in &insights.cars_by_year {
            out.push_str(&format!("  {}: {}\n", year, count));
        }
    }
    out
}

pub fn format_error(err: &CompletionError) -> String {
    if err.is_rate_limited() {
        "Rate limit exceeded. Please try again in a few moments.".to_string()
    } else {
        format!("There was a problem getting recommendations: {}", err)
    }
}
