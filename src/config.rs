use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub node_width: f32,
    pub node_height: f32,
    /// Minimum horizontal gap between two boxes of the same generation.
    pub minimum_spacing: f32,
    /// Gap between the two boxes of a couple. Never smaller than `minimum_spacing`.
    pub couple_spacing: f32,
    /// Minimum vertical gap between two generation rows.
    pub level_gap: f32,
    /// Distance from the lower partner's bottom edge to the convergence point.
    pub junction_drop: f32,
    pub padding: f32,
    pub min_canvas_width: f32,
    pub min_canvas_height: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 160.0,
            node_height: 64.0,
            minimum_spacing: 24.0,
            couple_spacing: 40.0,
            level_gap: 60.0,
            junction_drop: 20.0,
            padding: 40.0,
            min_canvas_width: 800.0,
            min_canvas_height: 600.0,
        }
    }
}

impl LayoutConfig {
    /// Centre-to-centre distance required between neighbours of one generation.
    pub fn min_center_distance(&self) -> f32 {
        self.node_width + self.minimum_spacing
    }

    /// Centre-to-centre distance between the two partners of a couple.
    pub fn couple_center_distance(&self) -> f32 {
        self.node_width + self.effective_couple_spacing()
    }

    pub fn effective_couple_spacing(&self) -> f32 {
        self.couple_spacing.max(self.minimum_spacing)
    }

    /// Canvas extents with the floors applied; `(width, height)` of the
    /// container may be arbitrarily small.
    pub fn canvas_extent(&self, width: f32, height: f32) -> (f32, f32) {
        let width = if width.is_finite() { width } else { 0.0 };
        let height = if height.is_finite() { height } else { 0.0 };
        let min_width = self.min_canvas_width.max(self.node_width + self.padding * 2.0);
        let min_height = self.min_canvas_height.max(self.node_height + self.padding * 2.0);
        (width.max(min_width), height.max(min_height))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub width: f32,
    pub height: f32,
    pub background: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            background: "#FFFFFF".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the authoritative shared copy and its history.
    pub shared_dir: PathBuf,
    /// Directory of the per-variant local cache files.
    pub cache_dir: PathBuf,
    /// Diagram variant; each variant keeps its own local cache key.
    pub variant: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            shared_dir: PathBuf::from("positions"),
            cache_dir: PathBuf::from("positions").join(".cache"),
            variant: "tree".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<f32>,
    male_color: Option<String>,
    female_color: Option<String>,
    neutral_color: Option<String>,
    text_color: Option<String>,
    border_color: Option<String>,
    line_color: Option<String>,
    deceased_dasharray: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    node_width: Option<f32>,
    node_height: Option<f32>,
    minimum_spacing: Option<f32>,
    couple_spacing: Option<f32>,
    level_gap: Option<f32>,
    junction_drop: Option<f32>,
    padding: Option<f32>,
    min_canvas_width: Option<f32>,
    min_canvas_height: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreConfigFile {
    shared_dir: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    variant: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    width: Option<f32>,
    height: Option<f32>,
    store: Option<StoreConfigFile>,
}

/// Loads the optional config file (JSON5, so comments and trailing commas are
/// fine) and merges it over the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let mut config = Config::default();
    let parsed: ConfigFile = json5::from_str(contents)?;

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "classic" | "default" => config.theme = Theme::classic(),
            "modern" => config.theme = Theme::modern(),
            other => tracing::warn!(theme = other, "unknown theme name, keeping default"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        if let Some(v) = vars.font_family {
            config.theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            config.theme.font_size = v;
        }
        if let Some(v) = vars.male_color {
            config.theme.male_color = v;
        }
        if let Some(v) = vars.female_color {
            config.theme.female_color = v;
        }
        if let Some(v) = vars.neutral_color {
            config.theme.neutral_color = v;
        }
        if let Some(v) = vars.text_color {
            config.theme.text_color = v;
        }
        if let Some(v) = vars.border_color {
            config.theme.border_color = v;
        }
        if let Some(v) = vars.line_color {
            config.theme.line_color = v;
        }
        if let Some(v) = vars.deceased_dasharray {
            config.theme.deceased_dasharray = v;
        }
        if let Some(v) = vars.background {
            config.theme.background = v;
        }
    }
    config.render.background = config.theme.background.clone();

    if let Some(layout) = parsed.layout {
        let target = &mut config.layout;
        let fields = [
            (layout.node_width, &mut target.node_width),
            (layout.node_height, &mut target.node_height),
            (layout.minimum_spacing, &mut target.minimum_spacing),
            (layout.couple_spacing, &mut target.couple_spacing),
            (layout.level_gap, &mut target.level_gap),
            (layout.junction_drop, &mut target.junction_drop),
            (layout.padding, &mut target.padding),
            (layout.min_canvas_width, &mut target.min_canvas_width),
            (layout.min_canvas_height, &mut target.min_canvas_height),
        ];
        for (value, slot) in fields {
            if let Some(value) = value.filter(|v| v.is_finite() && *v >= 0.0) {
                *slot = value;
            }
        }
    }

    if let Some(width) = parsed.width {
        config.render.width = width;
    }
    if let Some(height) = parsed.height {
        config.render.height = height;
    }

    if let Some(store) = parsed.store {
        if let Some(dir) = store.shared_dir {
            config.store.cache_dir = dir.join(".cache");
            config.store.shared_dir = dir;
        }
        if let Some(dir) = store.cache_dir {
            config.store.cache_dir = dir;
        }
        if let Some(variant) = store.variant {
            config.store.variant = variant;
        }
    }

    Ok(config)
}
