//! Configuration catalog: size presets, option attributes and core geometry
//!
//! The catalog is plain data. It is loaded from the `[catalog]` section of the
//! configuration file and falls back to the built-in mattress line-up.

use serde::{Deserialize, Serialize};

/// A named overall mattress size in millimetres
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SizePreset {
    pub label: String,
    pub width: f64,
    pub depth: f64,
}

impl SizePreset {
    pub fn new(label: &str, width: f64, depth: f64) -> Self {
        Self {
            label: label.to_string(),
            width,
            depth,
        }
    }
}

/// Display and geometry attributes of one selectable option
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductOption {
    pub category_id: String,
    pub option_id: String,
    pub label: String,
    /// Fixed height in mm, required by volume-priced options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<String>,
}

impl ProductOption {
    fn new(category_id: &str, option_id: &str, label: &str) -> Self {
        Self {
            category_id: category_id.to_string(),
            option_id: option_id.to_string(),
            label: label.to_string(),
            height: None,
            spec: None,
        }
    }

    fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    fn with_spec(mut self, spec: &str) -> Self {
        self.spec = Some(spec.to_string());
        self
    }
}

/// Width and depth of the priced core, in mm
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreDimensions {
    pub core_w: f64,
    pub core_d: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationCatalog {
    /// Guard foam thickness in mm, removed from each covered edge
    #[serde(default = "default_guard_foam_thickness")]
    pub guard_foam_thickness: f64,

    #[serde(default)]
    pub sizes: Vec<SizePreset>,

    #[serde(default)]
    pub options: Vec<ProductOption>,
}

fn default_guard_foam_thickness() -> f64 {
    50.0
}

impl Default for ConfigurationCatalog {
    fn default() -> Self {
        Self {
            guard_foam_thickness: default_guard_foam_thickness(),
            sizes: vec![
                SizePreset::new("Super Single", 1100.0, 2000.0),
                SizePreset::new("Queen", 1500.0, 2000.0),
                SizePreset::new("King", 1600.0, 2000.0),
                SizePreset::new("Large King", 1800.0, 2000.0),
                SizePreset::new("Family", 2200.0, 2000.0),
            ],
            options: vec![
                ProductOption::new("core", "core_soft_200", "Soft core 200")
                    .with_height(200.0),
                ProductOption::new("core", "core_firm_250", "Firm core 250")
                    .with_height(250.0),
                ProductOption::new("core", "core_hybrid_300", "Hybrid core 300")
                    .with_height(300.0),
                ProductOption::new("guard_foam", "guard_standard", "Standard guard foam")
                    .with_spec("50mm perimeter"),
                ProductOption::new("cover", "cover_knit", "Knit cover")
                    .with_spec("3D knit, zip-off"),
                ProductOption::new("cover", "cover_tencel", "Tencel cover")
                    .with_spec("Tencel jacquard, zip-off"),
                ProductOption::new("controller", "controller_basic", "Basic controller")
                    .with_spec("Wired, 3 presets"),
                ProductOption::new("controller", "controller_wireless", "Wireless controller")
                    .with_spec("Bluetooth, app control"),
                ProductOption::new("packaging", "pack_roll", "Roll pack")
                    .with_spec("Vacuum rolled"),
                ProductOption::new("packaging", "pack_box", "Flat box")
                    .with_spec("Corrugated carton"),
            ],
        }
    }
}

impl ConfigurationCatalog {
    /// Look up an option's attributes
    pub fn option(&self, category_id: &str, option_id: &str) -> Option<&ProductOption> {
        self.options
            .iter()
            .find(|o| o.category_id == category_id && o.option_id == option_id)
    }
}

/// Derive the priced core footprint from the overall mattress size.
///
/// With guard foam enabled the thickness is removed from all four edges. In a
/// dual layout the remaining width is split into two independent halves and
/// the returned width is that of one half. Negative results clamp to zero.
pub fn calc_core_dimensions(
    width: f64,
    depth: f64,
    guard_foam_thickness: f64,
    is_dual: bool,
    guard_foam_enabled: bool,
) -> CoreDimensions {
    let margin = if guard_foam_enabled {
        guard_foam_thickness.max(0.0) * 2.0
    } else {
        0.0
    };

    let mut core_w = (width - margin).max(0.0);
    let core_d = (depth - margin).max(0.0);

    if is_dual {
        core_w /= 2.0;
    }

    CoreDimensions { core_w, core_d }
}
