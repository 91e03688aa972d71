//! Built-in price book and its JSON file persistence

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::write_file;
use crate::pricing::{validate_price_book, FormulaType, PriceCategory, PriceItem, Toggle, WidthStep};

fn price_item(option_id: &str, name: &str, formula_type: FormulaType) -> PriceItem {
    PriceItem {
        id: option_id.replace('_', "-"),
        category_id: String::new(),
        option_id: option_id.to_string(),
        name: name.to_string(),
        formula_type,
        constant: 0.0,
        base_price: 0,
        formula_string: String::new(),
        width_steps: Vec::new(),
    }
}

fn volume(option_id: &str, name: &str, constant: f64, base_price: u64) -> PriceItem {
    PriceItem {
        constant,
        base_price,
        formula_string: format!("W×D×H×{} + {}", constant, base_price),
        ..price_item(option_id, name, FormulaType::Volume)
    }
}

fn fixed(option_id: &str, name: &str, base_price: u64) -> PriceItem {
    PriceItem {
        base_price,
        formula_string: format!("{} flat", base_price),
        ..price_item(option_id, name, FormulaType::Fixed)
    }
}

fn by_width(option_id: &str, name: &str, prices: [i64; 4]) -> PriceItem {
    let bounds = [1100.0, 1500.0, 1800.0, 2200.0];
    PriceItem {
        formula_string: "by width: ≤1100 / ≤1500 / ≤1800 / ≤2200".to_string(),
        width_steps: bounds
            .into_iter()
            .zip(prices)
            .map(|(max_width, price)| WidthStep { max_width, price })
            .collect(),
        ..price_item(option_id, name, FormulaType::WidthStep)
    }
}

fn category(id: &str, name: &str, step: u32, items: Vec<PriceItem>) -> PriceCategory {
    PriceCategory {
        id: id.to_string(),
        name: name.to_string(),
        step,
        per_core: false,
        gated_by: None,
        items: items
            .into_iter()
            .map(|item| PriceItem {
                category_id: id.to_string(),
                ..item
            })
            .collect(),
    }
}

/// The factory price book used on first start and by "reset to default"
pub fn default_price_book() -> Vec<PriceCategory> {
    let mut core = category(
        "core",
        "Core",
        2,
        vec![
            volume("core_soft_200", "Soft core 200", 0.0003266, 9700),
            volume("core_firm_250", "Firm core 250", 0.000298, 12000),
            volume("core_hybrid_300", "Hybrid core 300", 0.000351, 18500),
        ],
    );
    core.per_core = true;

    let mut guard = category(
        "guard_foam",
        "Guard foam",
        2,
        vec![fixed("guard_standard", "Standard guard foam", 28000)],
    );
    guard.gated_by = Some(Toggle::GuardFoam);

    let cover = category(
        "cover",
        "Cover",
        3,
        vec![
            by_width("cover_knit", "Knit cover", [62000, 74000, 86000, 104000]),
            by_width("cover_tencel", "Tencel cover", [88000, 102000, 118000, 139000]),
        ],
    );

    let mut controller = category(
        "controller",
        "Controller",
        4,
        vec![
            fixed("controller_basic", "Basic controller", 35000),
            fixed("controller_wireless", "Wireless controller", 52000),
        ],
    );
    controller.per_core = true;

    let packaging = category(
        "packaging",
        "Packaging",
        5,
        vec![
            fixed("pack_roll", "Roll pack", 8000),
            fixed("pack_box", "Flat box", 15000),
        ],
    );

    vec![core, guard, cover, controller, packaging]
}

/// Load the price book from a JSON file, or write the defaults if it doesn't exist
pub fn load_or_create(path: &Path) -> Result<Vec<PriceCategory>> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read price book from {:?}", path))?;
        let book: Vec<PriceCategory> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse price book from {:?}", path))?;
        validate_price_book(&book)
            .with_context(|| format!("Invalid price book in {:?}", path))?;
        tracing::info!("Loaded price book from {:?} ({} categories)", path, book.len());
        Ok(book)
    } else {
        let book = default_price_book();
        save(&book, path)?;
        tracing::info!("Created default price book at {:?}", path);
        Ok(book)
    }
}

/// Save the price book to a JSON file
pub fn save(book: &[PriceCategory], path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(book).context("Failed to serialize price book")?;
    write_file(path, &content).context("Failed to save price book")?;

    tracing::info!("Saved price book to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ConfigurationCatalog;
    use crate::pricing::{evaluate, DesignState};

    #[test]
    fn test_default_book_is_valid() {
        let book = default_price_book();
        validate_price_book(&book).unwrap();
        assert_eq!(book.len(), 5);
    }

    #[test]
    fn test_default_book_matches_catalog_options() {
        let book = default_price_book();
        let catalog = ConfigurationCatalog::default();
        for item in book.iter().flat_map(|c| c.items.iter()) {
            assert!(
                catalog.option(&item.category_id, &item.option_id).is_some(),
                "no catalog option for {}",
                item.id
            );
        }
    }

    #[test]
    fn test_default_book_prices_a_full_design() {
        let design = DesignState {
            width: 1500.0,
            depth: 2000.0,
            selections: [
                ("core", "core_soft_200"),
                ("guard_foam", "guard_standard"),
                ("cover", "cover_knit"),
                ("controller", "controller_basic"),
                ("packaging", "pack_roll"),
            ]
            .iter()
            .map(|(c, o)| (c.to_string(), o.to_string()))
            .collect(),
            guard_foam: true,
            ..Default::default()
        };

        let summary =
            evaluate(&default_price_book(), &ConfigurationCatalog::default(), &design).unwrap();
        assert_eq!(summary.items.len(), 5);
        // core is 1400×1900 after guard foam: round(1400*1900*200*0.0003266) + 9700
        assert_eq!(summary.items[0].unit_price, 173751 + 9700);
        assert_eq!(summary.items[2].unit_price, 74000);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join(format!("bedquote-book-{}", std::process::id()));
        let path = dir.join("price_book.json");
        let _ = std::fs::remove_file(&path);

        let created = load_or_create(&path).unwrap();
        assert!(path.exists());
        let loaded = load_or_create(&path).unwrap();
        assert_eq!(created, loaded);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
