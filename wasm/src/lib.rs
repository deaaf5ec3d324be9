use family_tree_renderer::config::Config;
use family_tree_renderer::ir::parse_persons;
use family_tree_renderer::layout_dump::LayoutDump;
use family_tree_renderer::store::OverrideMap;
use family_tree_renderer::theme::Theme;
use family_tree_renderer::{layout_family_tree, render_family_tree};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TreeRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    width: Option<f32>,
    height: Option<f32>,
}

fn build_config(options: TreeRenderOptions) -> Config {
    let mut config = Config::default();
    if options.theme.as_deref() == Some("modern") {
        config.theme = Theme::modern();
        config.render.background = config.theme.background.clone();
    }
    if let Some(font_family) = options.font_family {
        config.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        config.theme.font_size = font_size;
    }
    if let Some(width) = options.width {
        config.render.width = width;
    }
    if let Some(height) = options.height {
        config.render.height = height;
    }
    config
}

fn parse_inputs(
    options_json: Option<String>,
    positions_json: Option<String>,
) -> Result<(Config, OverrideMap), JsValue> {
    let options = match options_json {
        Some(raw) => serde_json::from_str::<TreeRenderOptions>(&raw)
            .map_err(|error| JsValue::from_str(&error.to_string()))?,
        None => TreeRenderOptions::default(),
    };
    let overrides = match positions_json {
        Some(raw) => serde_json::from_str::<OverrideMap>(&raw)
            .map_err(|error| JsValue::from_str(&error.to_string()))?,
        None => OverrideMap::new(),
    };
    Ok((build_config(options), overrides))
}

/// Paints the family tree. `positions_json` is the override map as returned
/// by the positions endpoint.
#[wasm_bindgen]
pub fn render_family_tree_svg(
    persons_json: &str,
    positions_json: Option<String>,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let persons = parse_persons(persons_json).map_err(|error| JsValue::from_str(&error.to_string()))?;
    let (config, overrides) = parse_inputs(options_json, positions_json)?;
    Ok(render_family_tree(&persons, &overrides, &config))
}

/// Node positions and link geometry as JSON, for hosts that draw themselves.
#[wasm_bindgen]
pub fn layout_family_tree_json(
    persons_json: &str,
    positions_json: Option<String>,
    options_json: Option<String>,
) -> Result<String, JsValue> {
    let persons = parse_persons(persons_json).map_err(|error| JsValue::from_str(&error.to_string()))?;
    let (config, overrides) = parse_inputs(options_json, positions_json)?;
    let layout = layout_family_tree(&persons, &overrides, &config);
    serde_json::to_string(&LayoutDump::from_layout(&layout))
        .map_err(|error| JsValue::from_str(&error.to_string()))
}
