//! Price evaluation for mattress configurations
//!
//! A price book is an ordered list of categories, each holding the priced
//! variants of one configuration step. Formulas are data: a closed
//! [`FormulaType`] plus a constant and a base price. The `formula_string`
//! is only shown to users and is never evaluated.
//!
//! Evaluation is a pure function of `(price book, catalog, design)`; callers
//! hold the price book as an immutable snapshot and edits produce a new value.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::catalog::{calc_core_dimensions, ConfigurationCatalog, CoreDimensions};
use crate::error::{Error, Result};

/// How a price item turns a design into a unit price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FormulaType {
    /// `round(w * d * h * constant) + base_price`
    Volume,
    /// `base_price`
    Fixed,
    /// Price of the first width step covering the overall width, plus `base_price`
    WidthStep,
}

impl FormulaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormulaType::Volume => "VOLUME",
            FormulaType::Fixed => "FIXED",
            FormulaType::WidthStep => "WIDTH_STEP",
        }
    }

    pub fn all() -> &'static [FormulaType] {
        &[FormulaType::Volume, FormulaType::Fixed, FormulaType::WidthStep]
    }
}

impl fmt::Display for FormulaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormulaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        FormulaType::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::validation(format!("unknown formula type `{}`", wanted)))
    }
}

/// Largest base price a price book may hold; unit prices are signed
pub const MAX_BASE_PRICE: u64 = i64::MAX as u64;

/// One bucket of a width-stepped price table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidthStep {
    /// Inclusive upper bound of the overall width, in mm
    pub max_width: f64,
    pub price: i64,
}

/// One priced component variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceItem {
    pub id: String,
    pub category_id: String,
    pub option_id: String,
    pub name: String,
    pub formula_type: FormulaType,
    pub constant: f64,
    pub base_price: u64,
    #[serde(default)]
    pub formula_string: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub width_steps: Vec<WidthStep>,
}

/// Design toggle that a category can depend on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Toggle {
    GuardFoam,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceCategory {
    pub id: String,
    pub name: String,
    /// Workflow step the category is configured in
    pub step: u32,
    /// Priced once per core half in a dual layout
    #[serde(default)]
    pub per_core: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gated_by: Option<Toggle>,
    pub items: Vec<PriceItem>,
}

impl PriceCategory {
    pub fn find_option(&self, option_id: &str) -> Option<&PriceItem> {
        self.items.iter().find(|i| i.option_id == option_id)
    }
}

/// Snapshot of the user's configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignState {
    /// Overall width in mm
    pub width: f64,
    /// Overall depth in mm
    pub depth: f64,
    /// Selected option id per category id
    #[serde(default)]
    pub selections: BTreeMap<String, String>,
    #[serde(default)]
    pub guard_foam: bool,
    #[serde(default)]
    pub dual: bool,
    /// Explicit multipliers per category id, overriding the dual rule
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub quantities: BTreeMap<String, u32>,
}

impl DesignState {
    pub fn selection(&self, category_id: &str) -> Option<&str> {
        self.selections
            .get(category_id)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Whether a category takes part in pricing for this design
    pub fn is_active(&self, category: &PriceCategory) -> bool {
        let gate_open = match category.gated_by {
            None => true,
            Some(Toggle::GuardFoam) => self.guard_foam,
        };
        gate_open && self.selection(&category.id).is_some()
    }

    pub fn quantity_for(&self, category: &PriceCategory) -> u32 {
        if let Some(&q) = self.quantities.get(&category.id) {
            return q;
        }
        if self.dual && category.per_core {
            2
        } else {
            1
        }
    }

    pub fn core_dimensions(&self, catalog: &ConfigurationCatalog) -> CoreDimensions {
        calc_core_dimensions(
            self.width,
            self.depth,
            catalog.guard_foam_thickness,
            self.dual,
            self.guard_foam,
        )
    }

    /// Same design at a different overall size
    pub fn with_size(&self, width: f64, depth: f64) -> Self {
        Self {
            width,
            depth,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub category_id: String,
    pub category_name: String,
    pub option_name: String,
    /// Price of a single unit
    pub unit_price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
}

impl LineItem {
    /// `None` when the product overflows
    pub fn line_total(&self) -> Option<i64> {
        self.unit_price
            .checked_mul(i64::from(self.quantity.unwrap_or(1).max(1)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceSummary {
    pub items: Vec<LineItem>,
    pub total_unit_price: i64,
}

fn price_overflow(what: &str) -> Error {
    Error::validation(format!("{} exceeds the representable price range", what))
}

fn base_amount(base_price: u64) -> Result<i64> {
    i64::try_from(base_price).map_err(|_| price_overflow("base price"))
}

/// Volume price, rounded half away from zero
pub fn volume_price(
    width: f64,
    depth: f64,
    height: f64,
    constant: f64,
    base_price: u64,
) -> Result<i64> {
    let raw = (width * depth * height * constant).round();
    // f64 -> i64 casts saturate, so range-check first
    if !raw.is_finite() || raw.abs() >= i64::MAX as f64 {
        return Err(price_overflow("volume price"));
    }
    (raw as i64)
        .checked_add(base_amount(base_price)?)
        .ok_or_else(|| price_overflow("volume price"))
}

/// First step whose bound covers `width`
pub fn width_step_price(steps: &[WidthStep], width: f64) -> Option<i64> {
    steps.iter().find(|s| s.max_width >= width).map(|s| s.price)
}

/// Evaluate a design against a price book.
///
/// Categories without an active selection are left out. A selection with no
/// matching price item is an error, never a zero-priced line.
pub fn evaluate(
    price_book: &[PriceCategory],
    catalog: &ConfigurationCatalog,
    design: &DesignState,
) -> Result<PriceSummary> {
    let core = design.core_dimensions(catalog);
    let mut items = Vec::new();

    for category in price_book {
        if !design.is_active(category) {
            continue;
        }
        let Some(option_id) = design.selection(&category.id) else {
            continue;
        };

        let item = category
            .find_option(option_id)
            .ok_or_else(|| Error::MissingPriceItem {
                category_id: category.id.clone(),
                option_id: option_id.to_string(),
            })?;
        let option = catalog.option(&category.id, option_id);
        let quantity = design.quantity_for(category);

        let (unit_price, specs) = match item.formula_type {
            FormulaType::Fixed => (
                base_amount(item.base_price)?,
                option.and_then(|o| o.spec.clone()),
            ),
            FormulaType::Volume => {
                let height = option.and_then(|o| o.height).ok_or_else(|| {
                    Error::validation(format!(
                        "option `{}` in category `{}` has no height for a volume formula",
                        option_id, category.id
                    ))
                })?;
                let price = volume_price(
                    core.core_w,
                    core.core_d,
                    height,
                    item.constant,
                    item.base_price,
                )?;
                let mut specs = format!("{}×{}×{}", core.core_w, core.core_d, height);
                if quantity > 1 {
                    specs.push_str(&format!(" ×{}", quantity));
                }
                (price, Some(specs))
            }
            FormulaType::WidthStep => {
                let step = width_step_price(&item.width_steps, design.width).ok_or_else(|| {
                    Error::WidthOutOfRange {
                        category_id: category.id.clone(),
                        option_id: option_id.to_string(),
                        width: design.width,
                    }
                })?;
                let price = step
                    .checked_add(base_amount(item.base_price)?)
                    .ok_or_else(|| price_overflow("width step price"))?;
                (price, option.and_then(|o| o.spec.clone()))
            }
        };

        items.push(LineItem {
            category_id: category.id.clone(),
            category_name: category.name.clone(),
            option_name: option
                .map(|o| o.label.clone())
                .unwrap_or_else(|| item.name.clone()),
            unit_price,
            formula: Some(item.formula_string.clone()).filter(|f| !f.is_empty()),
            specs,
            quantity: (quantity > 1).then_some(quantity),
        });
    }

    let total_unit_price = items
        .iter()
        .try_fold(0i64, |total, line| total.checked_add(line.line_total()?))
        .ok_or_else(|| price_overflow("quote total"))?;
    debug!(
        "Evaluated {} line items for {}x{}: {}",
        items.len(),
        design.width,
        design.depth,
        total_unit_price
    );

    Ok(PriceSummary {
        items,
        total_unit_price,
    })
}

/// Return a copy of the price book with one item's formula replaced.
///
/// Items are scanned in category order and the first id match is edited.
pub fn update_item(
    price_book: &[PriceCategory],
    item_id: &str,
    constant: f64,
    base_price: u64,
    formula_string: &str,
) -> Result<Vec<PriceCategory>> {
    if base_price > MAX_BASE_PRICE {
        return Err(price_overflow("base price"));
    }
    let mut updated = price_book.to_vec();

    let item = updated
        .iter_mut()
        .flat_map(|c| c.items.iter_mut())
        .find(|i| i.id == item_id)
        .ok_or_else(|| Error::UnknownItem(item_id.to_string()))?;

    item.constant = constant;
    item.base_price = base_price;
    item.formula_string = formula_string.to_string();

    Ok(updated)
}

/// Check the structural rules of a price book
pub fn validate_price_book(price_book: &[PriceCategory]) -> Result<()> {
    let mut category_ids = HashSet::new();
    let mut item_ids = HashSet::new();

    for category in price_book {
        if !category_ids.insert(category.id.as_str()) {
            return Err(Error::validation(format!(
                "duplicate category id `{}`",
                category.id
            )));
        }

        for item in &category.items {
            if !item_ids.insert(item.id.as_str()) {
                return Err(Error::validation(format!("duplicate item id `{}`", item.id)));
            }
            if item.category_id != category.id {
                return Err(Error::validation(format!(
                    "item `{}` is filed under `{}` but names category `{}`",
                    item.id, category.id, item.category_id
                )));
            }
            validate_item(item)?;
        }
    }

    Ok(())
}

/// Check the rules that apply to a single item on its own
pub fn validate_item(item: &PriceItem) -> Result<()> {
    if !item.constant.is_finite() {
        return Err(Error::validation(format!(
            "item `{}` has a non-finite constant",
            item.id
        )));
    }
    if item.base_price > MAX_BASE_PRICE {
        return Err(Error::validation(format!(
            "item `{}` base price {} is too large",
            item.id, item.base_price
        )));
    }
    if item.formula_type == FormulaType::WidthStep {
        validate_width_steps(&item.id, &item.width_steps)?;
    }
    Ok(())
}

fn validate_width_steps(item_id: &str, steps: &[WidthStep]) -> Result<()> {
    if steps.is_empty() {
        return Err(Error::validation(format!(
            "item `{}` uses WIDTH_STEP without a step table",
            item_id
        )));
    }
    for pair in steps.windows(2) {
        if pair[1].max_width <= pair[0].max_width {
            return Err(Error::validation(format!(
                "item `{}` width steps must be strictly ascending",
                item_id
            )));
        }
        if pair[1].price < pair[0].price {
            return Err(Error::validation(format!(
                "item `{}` width step prices must not decrease",
                item_id
            )));
        }
    }
    Ok(())
}

/// Validate and hand back a replacement price book
pub fn replace_price_book(new_book: Vec<PriceCategory>) -> Result<Vec<PriceCategory>> {
    validate_price_book(&new_book)?;
    Ok(new_book)
}

/// One row of the size comparison table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeRow {
    pub label: String,
    pub width: f64,
    pub depth: f64,
    pub height: f64,
    pub price: i64,
}

/// Price the design at every size preset of the catalog
pub fn size_table(
    price_book: &[PriceCategory],
    catalog: &ConfigurationCatalog,
    design: &DesignState,
) -> Result<Vec<SizeRow>> {
    let height = total_height(price_book, catalog, design);

    catalog
        .sizes
        .par_iter()
        .map(|size| -> Result<SizeRow> {
            let sized = design.with_size(size.width, size.depth);
            let summary = evaluate(price_book, catalog, &sized)?;
            Ok(SizeRow {
                label: size.label.clone(),
                width: size.width,
                depth: size.depth,
                height,
                price: summary.total_unit_price,
            })
        })
        .collect()
}

/// Sum of the heights of all active selections
fn total_height(
    price_book: &[PriceCategory],
    catalog: &ConfigurationCatalog,
    design: &DesignState,
) -> f64 {
    price_book
        .iter()
        .filter(|c| design.is_active(c))
        .filter_map(|c| {
            let option_id = design.selection(&c.id)?;
            catalog.option(&c.id, option_id)?.height
        })
        .sum()
}
