//! Interactive fallbacks for parameters not given on the command line.
//!
//! Values passed as flags are range-checked the same way the prompts are.

use agro_core::{Coordinates, Location};
use anyhow::{Context, Result, anyhow};
use inquire::{CustomType, Select, Text, validator::Validation};

use crate::cli::LocationArgs;

pub const SOIL_TYPES: &[&str] = &[
    "Alluvial",
    "Black",
    "Clay",
    "Sandy",
    "Sandy Loam",
    "Loamy",
    "Laterite",
];

pub const GROWTH_STAGES: &[&str] = &[
    "Germination",
    "Vegetative",
    "Flowering",
    "Fruiting",
    "Maturity",
];

const DEFAULT_LATITUDE: f64 = 28.6139;
const DEFAULT_LONGITUDE: f64 = 77.2090;
const MAX_FARM_SIZE_HA: f64 = 100_000.0;

/// Check `value` against an inclusive range, naming the field on failure.
pub fn check_range(name: &str, value: f64, min: f64, max: f64) -> Result<f64> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(anyhow!("{name} must be between {min} and {max}, got {value}"))
    }
}

fn ranged(
    label: &str,
    flag: Option<f64>,
    min: f64,
    max: f64,
    default: f64,
    help: &str,
) -> Result<f64> {
    if let Some(value) = flag {
        return check_range(label, value, min, max);
    }

    CustomType::<f64>::new(&format!("{label}:"))
        .with_default(default)
        .with_help_message(help)
        .with_error_message("Please type a number")
        .with_validator(move |v: &f64| {
            if (min..=max).contains(v) {
                Ok(Validation::Valid)
            } else {
                Ok(Validation::Invalid(format!("Must be between {min} and {max}").into()))
            }
        })
        .prompt()
        .with_context(|| format!("Failed to read {label}"))
}

fn choose(label: &str, flag: Option<String>, options: &[&str]) -> Result<String> {
    if let Some(value) = flag {
        let value = value.trim();
        if value.is_empty() {
            return Err(anyhow!("{label} must not be empty"));
        }
        return Ok(value.to_string());
    }

    Select::new(&format!("{label}:"), options.to_vec())
        .prompt()
        .map(str::to_string)
        .with_context(|| format!("Failed to read {label}"))
}

pub fn location(args: &LocationArgs) -> Result<Location> {
    if let Some(place) = &args.place {
        return Ok(Location::Place(place.clone()));
    }
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        return Ok(Location::Coordinates(Coordinates::new(lat, lon)?));
    }

    let by_name = "Place name";
    let mode = Select::new("Farm location:", vec![by_name, "Coordinates"])
        .prompt()
        .context("Failed to read location mode")?;

    if mode == by_name {
        let place = Text::new("Place name:")
            .with_help_message("Town or district, e.g. Ludhiana")
            .with_validator(|v: &str| {
                if v.trim().is_empty() {
                    Ok(Validation::Invalid("Place name must not be empty".into()))
                } else {
                    Ok(Validation::Valid)
                }
            })
            .prompt()
            .context("Failed to read place name")?;
        Ok(Location::Place(place.trim().to_string()))
    } else {
        let lat = ranged("Latitude", None, -90.0, 90.0, DEFAULT_LATITUDE, "Decimal degrees")?;
        let lon = ranged("Longitude", None, -180.0, 180.0, DEFAULT_LONGITUDE, "Decimal degrees")?;
        Ok(Location::Coordinates(Coordinates::new(lat, lon)?))
    }
}

pub fn crop(flag: Option<String>) -> Result<String> {
    if let Some(crop) = flag {
        return non_empty_crop(&crop);
    }

    let crop = Text::new("Crop name:")
        .with_help_message("e.g. Rice, Maize")
        .with_validator(|v: &str| {
            if v.trim().is_empty() {
                Ok(Validation::Invalid("Crop name must not be empty".into()))
            } else {
                Ok(Validation::Valid)
            }
        })
        .prompt()
        .context("Failed to read crop name")?;
    non_empty_crop(&crop)
}

fn non_empty_crop(crop: &str) -> Result<String> {
    let crop = crop.trim();
    if crop.is_empty() {
        return Err(anyhow!("Crop name must not be empty"));
    }
    Ok(crop.to_string())
}

pub fn farm_size(flag: Option<f64>) -> Result<f64> {
    ranged(
        "Farm size (hectares)",
        flag,
        0.1,
        MAX_FARM_SIZE_HA,
        1.0,
        "At least 0.1 ha",
    )
}

pub fn soil_type(flag: Option<String>) -> Result<String> {
    choose("Soil type", flag, SOIL_TYPES)
}

pub fn growth_stage(flag: Option<String>) -> Result<String> {
    choose("Crop growth stage", flag, GROWTH_STAGES)
}

pub fn soil_moisture(flag: Option<u8>) -> Result<u8> {
    let value = ranged(
        "Current soil moisture (% of field capacity)",
        flag.map(f64::from),
        0.0,
        100.0,
        50.0,
        "0-100",
    )?;
    Ok(value.round() as u8)
}

pub fn nutrient(label: &str, flag: Option<f64>) -> Result<f64> {
    ranged(&format!("{label} kg/ha"), flag, 0.0, 1000.0, 50.0, "Soil test value")
}

pub fn ph(flag: Option<f64>) -> Result<f64> {
    ranged("Soil pH", flag, 0.0, 14.0, 6.5, "0-14")
}

pub fn rainfall(flag: Option<f64>) -> Result<f64> {
    ranged("Rainfall (mm)", flag, 0.0, 10_000.0, 100.0, "Recent or seasonal rainfall")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> LocationArgs {
        LocationArgs { place: None, lat: None, lon: None, days: None }
    }

    #[test]
    fn check_range_is_inclusive() {
        assert_eq!(check_range("pH", 14.0, 0.0, 14.0).unwrap(), 14.0);
        assert_eq!(check_range("pH", 0.0, 0.0, 14.0).unwrap(), 0.0);
        let err = check_range("pH", 14.5, 0.0, 14.0).unwrap_err();
        assert!(err.to_string().contains("pH must be between"));
    }

    #[test]
    fn flags_skip_prompts() {
        assert_eq!(ph(Some(7.2)).unwrap(), 7.2);
        assert_eq!(soil_moisture(Some(35)).unwrap(), 35);
        assert_eq!(farm_size(Some(2.5)).unwrap(), 2.5);
        assert_eq!(soil_type(Some(" Black ".into())).unwrap(), "Black");
        assert_eq!(crop(Some(" Maize ".into())).unwrap(), "Maize");
    }

    #[test]
    fn out_of_range_flags_are_rejected() {
        assert!(soil_moisture(Some(101)).is_err());
        assert!(farm_size(Some(0.05)).is_err());
        assert!(ph(Some(-1.0)).is_err());
    }

    #[test]
    fn farm_size_error_names_a_readable_bound() {
        let err = farm_size(Some(1e9)).unwrap_err().to_string();
        assert!(err.contains("between 0.1 and 100000"), "{err}");
        assert!(!err.contains("e308"));
    }

    #[test]
    fn blank_crop_flag_is_rejected() {
        assert!(crop(Some("   ".into())).is_err());
    }

    #[test]
    fn place_flag_becomes_place_location() {
        let loc = location(&LocationArgs { place: Some("Nashik".into()), ..args() }).unwrap();
        assert_eq!(loc, Location::Place("Nashik".into()));
    }

    #[test]
    fn coordinate_flags_are_validated() {
        let loc = location(&LocationArgs { lat: Some(19.99), lon: Some(73.79), ..args() }).unwrap();
        assert!(matches!(loc, Location::Coordinates(_)));

        assert!(location(&LocationArgs { lat: Some(95.0), lon: Some(0.0), ..args() }).is_err());
    }
}
