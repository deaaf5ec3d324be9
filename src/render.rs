use crate::config::RenderConfig;
use crate::layout::{Layout, LinkKind, NodeLayout};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

pub fn render_svg(layout: &Layout, theme: &Theme) -> String {
    let mut svg = String::new();
    let width = layout.width;
    let height = layout.height;

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    if let Some(message) = layout.message.as_deref() {
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">{}</text>",
            width / 2.0,
            height / 2.0,
            theme.font_family,
            theme.font_size,
            theme.text_color,
            escape_xml(message)
        ));
    }

    for link in &layout.links {
        let dash = if link.dashed {
            format!(" stroke-dasharray=\"{}\"", theme.deceased_dasharray)
        } else {
            String::new()
        };
        let class = match link.kind {
            LinkKind::Couple => "couple",
            LinkKind::ParentChild => "parent-child",
            LinkKind::Convergence => "convergence",
            LinkKind::FanOut => "fan-out",
        };
        svg.push_str(&format!(
            "<path class=\"link {class}\" d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{}\"{dash}/>",
            link.path, theme.line_color, theme.line_width
        ));
    }

    for node in layout.nodes.values() {
        svg.push_str(&node_svg(node, theme));
    }

    svg.push_str("</svg>");
    svg
}

fn node_svg(node: &NodeLayout, theme: &Theme) -> String {
    let mut out = String::new();
    let dash = if node.is_deceased() {
        format!(" stroke-dasharray=\"{}\"", theme.deceased_dasharray)
    } else {
        String::new()
    };
    let class = if node.pinned { "person pinned" } else { "person" };
    out.push_str(&format!(
        "<g class=\"{class}\" data-id=\"{}\">",
        escape_xml(node.id.as_str())
    ));
    out.push_str(&format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-width=\"1.2\"{dash}/>",
        node.left(),
        node.top(),
        node.width,
        node.height,
        theme.fill_for(node.genre),
        theme.border_color
    ));

    let lines: Vec<String> = std::iter::once(node.name.clone())
        .chain(life_span(node))
        .collect();
    let line_height = theme.font_size * 1.3;
    let start_y = node.y - (lines.len() as f32 - 1.0) * line_height / 2.0 + theme.font_size * 0.35;
    out.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{start_y:.2}\" text-anchor=\"middle\" font-family=\"{}\" font-size=\"{}\" fill=\"{}\">",
        node.x, theme.font_family, theme.font_size, theme.text_color
    ));
    for (idx, line) in lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { line_height };
        out.push_str(&format!(
            "<tspan x=\"{:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            node.x,
            escape_xml(line)
        ));
    }
    out.push_str("</text></g>");
    out
}

/// `"1950 - 2001"`, `"1950"` or `"† 2001"` from the first four characters
/// of each date.
fn life_span(node: &NodeLayout) -> Option<String> {
    let year = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| v.chars().take(4).collect::<String>())
    };
    match (year(&node.date_naissance), year(&node.date_deces)) {
        (Some(born), Some(died)) => Some(format!("{born} - {died}")),
        (Some(born), None) => Some(born),
        (None, Some(died)) => Some(format!("† {died}")),
        (None, None) => None,
    }
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(svg: &str, output: &Path, render_cfg: &RenderConfig) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.default_size = usvg::Size::from_wh(render_cfg.width, render_cfg.height)
        .or_else(|| usvg::Size::from_wh(800.0, 600.0))
        .ok_or_else(|| anyhow::anyhow!("invalid default canvas size"))?;

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(_svg: &str, _output: &Path, _render_cfg: &RenderConfig) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
