#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod render;
pub mod store;
pub mod theme;
pub mod tree;

#[cfg(feature = "cli")]
pub use cli::run;

use config::Config;
use ir::Person;
use layout::{Layout, compute_diagram};
use store::OverrideMap;

/// Lays out `persons` on the configured canvas with `overrides` applied.
pub fn layout_family_tree(persons: &[Person], overrides: &OverrideMap, config: &Config) -> Layout {
    compute_diagram(
        persons,
        overrides,
        &config.layout,
        (config.render.width, config.render.height),
    )
}

/// Same as [`layout_family_tree`], painted as SVG with the configured theme.
pub fn render_family_tree(persons: &[Person], overrides: &OverrideMap, config: &Config) -> String {
    render::render_svg(&layout_family_tree(persons, overrides, config), &config.theme)
}
