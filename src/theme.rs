use crate::ir::Genre;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub font_family: String,
    pub font_size: f32,
    pub male_color: String,
    pub female_color: String,
    pub neutral_color: String,
    pub text_color: String,
    pub border_color: String,
    pub line_color: String,
    pub line_width: f32,
    pub deceased_dasharray: String,
    pub background: String,
}

impl Theme {
    pub fn classic() -> Self {
        Self {
            font_family: "\"trebuchet ms\", verdana, arial, sans-serif".to_string(),
            font_size: 14.0,
            male_color: "#DCEBFF".to_string(),
            female_color: "#FFE1EC".to_string(),
            neutral_color: "#F1F1F1".to_string(),
            text_color: "#333333".to_string(),
            border_color: "#8A8A9E".to_string(),
            line_color: "#555555".to_string(),
            line_width: 1.5,
            deceased_dasharray: "6 4".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn modern() -> Self {
        Self {
            font_family: "Inter, Segoe UI, system-ui, -apple-system, sans-serif".to_string(),
            font_size: 13.0,
            male_color: "#EEF4FF".to_string(),
            female_color: "#FFF0F5".to_string(),
            neutral_color: "#F8FAFF".to_string(),
            text_color: "#1C2430".to_string(),
            border_color: "#C7D2E5".to_string(),
            line_color: "#7A8AA6".to_string(),
            line_width: 1.4,
            deceased_dasharray: "5 4".to_string(),
            background: "#FFFFFF".to_string(),
        }
    }

    pub fn fill_for(&self, genre: Option<Genre>) -> &str {
        match genre {
            Some(Genre::Homme) => &self.male_color,
            Some(Genre::Femme) => &self.female_color,
            None => &self.neutral_color,
        }
    }
}
