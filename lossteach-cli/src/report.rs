// Text rendering of prediction results

use lossteach_core::stats::{cdf_summary, percentile_table};
use lossteach_core::PredictionResponse;
use std::fmt::Write;

/// Summary, percentile table and CDF block for one prediction.
pub fn render(prediction: &PredictionResponse, elapsed_secs: f64) -> String {
    let mut out = String::new();
    let sizes = prediction.sizes();
    let metrics = &prediction.size_metrics;

    let _ = writeln!(out, "⏱️  Processing time: {:.2} sec", elapsed_secs);
    let _ = writeln!(out, "🔢 Total fragments: {}", prediction.fragment_count());
    if sizes.is_empty() {
        let _ = writeln!(out, "No fragments detected");
        return out;
    }
    let _ = writeln!(out, "📏 Average size:    {:.2} cm", metrics.mean_size);
    let _ = writeln!(
        out,
        "📊 Size range:      {:.2} - {:.2} cm",
        metrics.min_size, metrics.max_size
    );
    let _ = writeln!(
        out,
        "   Median {:.2} cm, std {:.2} cm",
        metrics.median_size, metrics.std_size
    );

    let _ = writeln!(out, "\nPercentile  Size (cm)");
    for row in percentile_table(&sizes) {
        let _ = writeln!(out, "{:>9}%  {:>9.2}", row.percentile, row.size_cm);
    }

    if let Some(cdf) = cdf_summary(&sizes) {
        let _ = writeln!(out, "\nCumulative distribution ({} fragments)", cdf.count);
        let _ = writeln!(
            out,
            "  min {:.2}  avg {:.2}  max {:.2}",
            cdf.min, cdf.mean, cdf.max
        );
        let _ = writeln!(
            out,
            "  D10 {:.2}  D50 {:.2}  D90 {:.2}",
            cdf.d10, cdf.d50, cdf.d90
        );
    }

    // shape columns only when the server measured them
    let with_metrics = prediction.fragments.iter().any(|f| f.metrics.is_some());
    let mut header = format!(
        "{:>4}  {:>5}  {:>9}  {:<22}",
        "id", "score", "size (cm)", "bbox"
    );
    if with_metrics {
        header += &format!(
            "{:>8}  {:>9}  {:>5}  {:>8}",
            "area", "perimeter", "circ.", "contours"
        );
    }
    let _ = writeln!(out, "\n{}", header.trim_end());

    for fragment in &prediction.fragments {
        let b = fragment.bbox;
        let mut line = format!(
            "{:>4}  {:>5.2}  {:>9.2}  {:<22}",
            fragment.id,
            fragment.score,
            fragment.size_cm,
            format!("[{}, {}, {}, {}]", b.x1, b.y1, b.x2, b.y2)
        );
        if with_metrics {
            line += &match fragment.metrics {
                Some(m) => format!(
                    "{:>8.1}  {:>9.1}  {:>5.3}  {:>8}",
                    m.area, m.perimeter, m.circularity, m.contour_count
                ),
                None => format!("{:>8}  {:>9}  {:>5}  {:>8}", "-", "-", "-", "-"),
            };
        }
        let _ = writeln!(out, "{}", line.trim_end());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use lossteach_core::{assemble, BoundingBox, Fragment, FragmentMetrics};

    fn fragment(id: usize, size_cm: f64) -> Fragment {
        Fragment {
            id,
            bbox: BoundingBox::new(1, 2, 3, 4),
            score: 0.75,
            size_cm,
            mask_data: None,
            metrics: None,
        }
    }

    #[test]
    fn test_render_empty() {
        let text = render(&PredictionResponse::empty(), 0.5);
        assert!(text.contains("Total fragments: 0"));
        assert!(text.contains("No fragments detected"));
        assert!(!text.contains("Percentile"));
    }

    #[test]
    fn test_render_table_and_cdf() {
        let prediction = assemble(vec![fragment(0, 10.0), fragment(1, 20.0)]);
        let text = render(&prediction, 1.25);
        assert!(text.contains("Processing time: 1.25 sec"));
        assert!(text.contains("Average size:    15.00 cm"));
        assert!(text.contains("      100%      20.00"));
        assert!(text.contains("D50 15.00"));
        assert!(text.contains("[1, 2, 3, 4]"));
        assert!(!text.contains("perimeter"));
    }

    #[test]
    fn test_render_shape_metrics() {
        let mut measured = fragment(0, 10.0);
        measured.metrics = Some(FragmentMetrics {
            area: 81.0,
            perimeter: 36.0,
            circularity: 0.785,
            contour_count: 1,
        });
        let prediction = assemble(vec![measured, fragment(1, 20.0)]);
        let text = render(&prediction, 0.1);

        assert!(text.contains("perimeter"));
        let rows: Vec<&str> = text.lines().filter(|l| l.contains("[1, 2, 3, 4]")).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].ends_with("81.0       36.0  0.785         1"));
        assert!(rows[1].ends_with("-          -      -         -"));
    }
}
