use std::fmt::Write as _;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::comparison::Comparison;
use crate::scoring::Bucket;

pub const Y_AXIS_TITLE: &str = "EPA/total # plays";
pub const MIME_TYPE: &str = "image/svg+xml";

const WIDTH: f64 = 760.0;
const HEIGHT: f64 = 460.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 20.0;
const MARGIN_BOTTOM: f64 = 130.0;
const GROUP_FILL: f64 = 0.8;
const PALETTE: [&str; 4] = ["#1f77b4", "#ff7f0e", "#2ca02c", "#d62728"];

/// Chart payload plus the labels shown next to it on the page.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedChart {
    pub image_base64: String,
    pub label_a: String,
    pub label_b: String,
}

impl RenderedChart {
    pub fn data_uri(&self) -> String {
        format!("data:{MIME_TYPE};base64,{}", self.image_base64)
    }
}

/// Renders one bar group per bucket and one bar per entry, base64 encoded.
/// A single-entry comparison reports its label on both sides.
pub fn render(comparison: &Comparison) -> RenderedChart {
    let svg = render_svg(comparison);
    let label_a = comparison.first_label().unwrap_or_default().to_string();
    let label_b = comparison
        .second_label()
        .map(str::to_string)
        .unwrap_or_else(|| label_a.clone());
    RenderedChart {
        image_base64: STANDARD.encode(svg.as_bytes()),
        label_a,
        label_b,
    }
}

pub fn render_svg(comparison: &Comparison) -> String {
    let values: Vec<f64> = comparison
        .entries
        .iter()
        .flat_map(|e| e.profile.iter().map(|(_, v)| v))
        .collect();
    let axis = YAxis::fit(&values);

    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let y_of = |v: f64| MARGIN_TOP + (axis.max - v) / (axis.max - axis.min) * plot_h;

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}" font-family="sans-serif" font-size="12">"#
    );
    svg.push_str(r#"<rect width="100%" height="100%" fill="white"/>"#);

    for tick in axis.ticks() {
        let y = y_of(tick);
        let _ = write!(
            svg,
            r##"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{:.1}" y2="{y:.1}" stroke="#e0e0e0"/><text x="{:.1}" y="{:.1}" text-anchor="end">{}</text>"##,
            MARGIN_LEFT + plot_w,
            MARGIN_LEFT - 6.0,
            y + 4.0,
            format_tick(tick, axis.step),
        );
    }

    let groups = Bucket::ALL.len() as f64;
    let group_w = plot_w / groups;
    let series = comparison.entries.len().max(1) as f64;
    let bar_w = group_w * GROUP_FILL / series;
    let zero_y = y_of(0.0);

    for (g, bucket) in Bucket::ALL.iter().enumerate() {
        let group_x = MARGIN_LEFT + g as f64 * group_w + group_w * (1.0 - GROUP_FILL) / 2.0;
        for (s, entry) in comparison.entries.iter().enumerate() {
            let v = entry.profile.get(*bucket);
            let x = group_x + s as f64 * bar_w;
            let top = y_of(v).min(zero_y);
            let h = (y_of(v) - zero_y).abs();
            let _ = write!(
                svg,
                r#"<rect x="{x:.1}" y="{top:.1}" width="{bar_w:.1}" height="{h:.1}" fill="{}"><title>{}: {v:.4}</title></rect>"#,
                PALETTE[s % PALETTE.len()],
                xml_escape(&entry.label),
            );
        }
        let cx = MARGIN_LEFT + (g as f64 + 0.5) * group_w;
        let ly = MARGIN_TOP + plot_h + 10.0;
        let _ = write!(
            svg,
            r#"<text x="{cx:.1}" y="{ly:.1}" text-anchor="end" transform="rotate(-90 {cx:.1} {ly:.1})" dominant-baseline="middle">{}</text>"#,
            bucket.label(),
        );
    }

    let _ = write!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{zero_y:.1}" x2="{:.1}" y2="{zero_y:.1}" stroke="black"/>"#,
        MARGIN_LEFT + plot_w,
    );
    let _ = write!(
        svg,
        r#"<rect x="{MARGIN_LEFT}" y="{MARGIN_TOP}" width="{plot_w:.1}" height="{plot_h:.1}" fill="none" stroke="black"/>"#,
    );
    let ty = MARGIN_TOP + plot_h / 2.0;
    let _ = write!(
        svg,
        r#"<text x="18" y="{ty:.1}" text-anchor="middle" transform="rotate(-90 18 {ty:.1})">{Y_AXIS_TITLE}</text>"#,
    );

    for (s, entry) in comparison.entries.iter().enumerate() {
        let ly = MARGIN_TOP + 12.0 + s as f64 * 18.0;
        let lx = MARGIN_LEFT + plot_w - 150.0;
        let _ = write!(
            svg,
            r#"<rect x="{lx:.1}" y="{:.1}" width="12" height="12" fill="{}"/><text x="{:.1}" y="{:.1}">{}</text>"#,
            ly - 10.0,
            PALETTE[s % PALETTE.len()],
            lx + 18.0,
            ly,
            xml_escape(&entry.label),
        );
    }

    svg.push_str("</svg>");
    svg
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct YAxis {
    min: f64,
    max: f64,
    step: f64,
}

impl YAxis {
    /// Always spans zero so every bar has a baseline.
    fn fit(values: &[f64]) -> Self {
        let lo = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::min);
        let hi = values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::max);
        let span = if hi - lo > 0.0 { hi - lo } else { 0.1 };
        let step = nice_step(span / 5.0);
        let min = (lo / step).floor() * step;
        let mut max = (hi / step).ceil() * step;
        if max <= min {
            max = min + step;
        }
        Self { min, max, step }
    }

    fn ticks(&self) -> Vec<f64> {
        let count = ((self.max - self.min) / self.step).round() as i64;
        (0..=count)
            .map(|i| self.min + i as f64 * self.step)
            .collect()
    }
}

fn nice_step(raw: f64) -> f64 {
    let mag = 10_f64.powf(raw.log10().floor());
    let norm = raw / mag;
    let nice = if norm <= 1.0 {
        1.0
    } else if norm <= 2.0 {
        2.0
    } else if norm <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * mag
}

fn format_tick(v: f64, step: f64) -> String {
    let decimals = (-step.log10().floor()).max(0.0) as usize;
    let v = if v.abs() < step * 1e-6 { 0.0 } else { v };
    format!("{v:.decimals$}")
}

pub(crate) fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::LabeledProfile;
    use crate::play_store::Play;
    use crate::scoring::score_profile;

    fn entry(label: &str, plays: &[Play]) -> LabeledProfile {
        LabeledProfile {
            label: label.to_string(),
            profile: score_profile(plays).unwrap(),
        }
    }

    fn attr(tag: &str, name: &str) -> f64 {
        let tag = format!(" {tag}");
        let key = format!(r#" {name}=""#);
        let start = tag.find(&key).expect("attribute present") + key.len();
        let end = start + tag[start..].find('"').expect("attribute closed");
        tag[start..end].parse().expect("numeric attribute")
    }

    /// `(tag attributes, title)` of every bar rect, in document order.
    fn bars(svg: &str) -> Vec<(String, String)> {
        svg.split("<rect ")
            .skip(1)
            .filter_map(|chunk| {
                let (tag, rest) = chunk.split_once('>')?;
                let (title, _) = rest.strip_prefix("<title>")?.split_once("</title>")?;
                Some((tag.to_string(), title.to_string()))
            })
            .collect()
    }

    fn two_entry_comparison() -> Comparison {
        let alpha = [
            Play {
                season: 2021,
                passer: Some("Alpha".to_string()),
                epa: Some(-1.0),
                interception: true,
                air_yards: Some(5.0),
                ..Play::default()
            },
            Play {
                season: 2021,
                rusher: Some("Alpha".to_string()),
                epa: Some(0.5),
                rush: true,
                ..Play::default()
            },
        ];
        let beta = [Play {
            season: 2021,
            passer: Some("Beta".to_string()),
            epa: Some(1.0),
            air_yards: Some(25.0),
            ..Play::default()
        }];
        Comparison {
            entries: vec![entry("Alpha", &alpha), entry("Beta", &beta)],
        }
    }

    #[test]
    fn one_group_per_bucket_in_order() {
        let svg = render_svg(&two_entry_comparison());
        let positions: Vec<usize> = Bucket::ALL
            .iter()
            .map(|b| {
                svg.find(&format!(">{}</text>", b.label()))
                    .unwrap_or_else(|| panic!("missing group label {}", b.label()))
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn one_bar_per_entry_in_each_group() {
        let svg = render_svg(&two_entry_comparison());
        let bars = bars(&svg);
        assert_eq!(bars.len(), Bucket::ALL.len() * 2);
        for pair in bars.chunks(2) {
            assert!(pair[0].1.starts_with("Alpha: "));
            assert!(pair[1].1.starts_with("Beta: "));
            assert!(attr(&pair[0].0, "x") < attr(&pair[1].0, "x"));
        }
        assert_eq!(bars[0].1, "Alpha: -0.5000");
        assert_eq!(bars[11].1, "Beta: 1.0000");
        assert_eq!(bars[12].1, "Alpha: 0.2500");
    }

    #[test]
    fn negative_scores_hang_below_zero_line() {
        let svg = render_svg(&two_entry_comparison());
        let zero_line = svg
            .split("<line ")
            .find(|tag| tag.contains(r#"stroke="black""#))
            .expect("zero line drawn");
        let zero_y = attr(zero_line, "y1");

        let bars = bars(&svg);
        let (negative, _) = &bars[0];
        assert_eq!(attr(negative, "y"), zero_y);
        assert!(attr(negative, "height") > 0.0);

        let (positive, _) = &bars[11];
        assert!(attr(positive, "y") < zero_y);
        let bottom = attr(positive, "y") + attr(positive, "height");
        assert!((bottom - zero_y).abs() < 0.15);
    }

    #[test]
    fn axis_spans_zero_and_values() {
        let axis = YAxis::fit(&[-0.5, 0.25, 0.75]);
        assert!(axis.min <= -0.5);
        assert!(axis.max >= 0.75);
        let ticks = axis.ticks();
        assert!(ticks.iter().any(|t| t.abs() < 1e-9));
    }

    #[test]
    fn all_zero_values_still_have_height() {
        let axis = YAxis::fit(&[0.0, 0.0]);
        assert!(axis.max > axis.min);
    }

    #[test]
    fn nice_steps() {
        assert!((nice_step(0.03) - 0.05).abs() < 1e-12);
        assert!((nice_step(0.15) - 0.2).abs() < 1e-12);
        assert!((nice_step(7.0) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn escapes_markup_in_labels() {
        assert_eq!(xml_escape("'21 <A&B>"), "&#39;21 &lt;A&amp;B&gt;");
    }
}
