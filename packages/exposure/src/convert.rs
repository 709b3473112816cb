//! Unit conversion of crop production exposures.
//!
//! Both conversions expect values in tonnes per year and keep the tonnage
//! in [`ExposureRecord::tonnes_per_year`] so it can be recovered later.

use std::collections::BTreeMap;

use crop_risk_exposure_models::{ExposureRecord, Exposures, ValueUnit};
use crop_risk_hazard_models::YearRange;

use crate::ExposureError;
use crate::fao::PriceTable;

/// Converts production to caloric content.
///
/// `biomass` selects the as-purchased factor, which suits FAO-normalized
/// production; otherwise the dry-matter factor for raw crop model output
/// is used.
///
/// # Errors
///
/// Returns [`ExposureError::MissingCrop`] if the exposures have no crop.
pub fn value_to_kcal(exposures: &Exposures, biomass: bool) -> Result<Exposures, ExposureError> {
    let crop = exposures.crop.ok_or(ExposureError::MissingCrop)?;
    if exposures.value_unit != ValueUnit::TonnesPerYear {
        log::warn!(
            "Converting exposures in {} to kcal/y; expected t/y",
            exposures.value_unit
        );
    }

    let factor = crop.kcal_per_ton(biomass);
    let records = exposures
        .records
        .iter()
        .map(|r| ExposureRecord {
            value: r.value * factor,
            tonnes_per_year: Some(r.value),
            ..*r
        })
        .collect();

    Ok(exposures
        .with_records(records)
        .with_unit(ValueUnit::KcalPerYear))
}

/// Converts production to market value using FAOSTAT producer prices.
///
/// Each country's price is its mean producer price for the exposure crop
/// over `years`. Countries without a price in that range use the world mean
/// for the crop. Records outside any country (region `0` or untagged) get
/// a value of `0`.
///
/// # Errors
///
/// Returns [`ExposureError::MissingCrop`] if the exposures have no crop.
pub fn value_to_usd(
    exposures: &Exposures,
    prices: &PriceTable,
    years: YearRange,
) -> Result<Exposures, ExposureError> {
    let crop = exposures.crop.ok_or(ExposureError::MissingCrop)?;
    if exposures.value_unit != ValueUnit::TonnesPerYear {
        log::warn!(
            "Converting exposures in {} to USD/y; expected t/y",
            exposures.value_unit
        );
    }

    let mut country_prices: BTreeMap<u32, f64> = BTreeMap::new();
    let mut world_price: Option<f64> = None;
    let mut price_of = |region: u32| -> f64 {
        if region == 0 {
            return 0.0;
        }
        *country_prices.entry(region).or_insert_with(|| {
            prices.country_mean(region, crop, years).unwrap_or_else(|| {
                let world = *world_price.get_or_insert_with(|| {
                    prices.world_mean(crop, years).unwrap_or_else(|| {
                        log::warn!("No {} producer price in {years}", crop.fao_name());
                        0.0
                    })
                });
                log::debug!("Region {region}: no {crop} price in {years}, using world mean {world:.2}");
                world
            })
        })
    };

    let records = exposures
        .records
        .iter()
        .map(|r| ExposureRecord {
            value: r.value * price_of(r.region_id.unwrap_or(0)),
            tonnes_per_year: Some(r.value),
            ..*r
        })
        .collect();

    let mut converted = exposures
        .with_records(records)
        .with_unit(ValueUnit::UsdPerYear);
    converted.ref_year = Some(years);
    log::info!("Total value: {:.3} USD/y", converted.total_value());
    Ok(converted)
}

/// Point-wise mean of several exposure sets on the same grid, e.g. runs of
/// different crop models. Metadata is taken from the first set.
///
/// # Errors
///
/// Returns [`ExposureError::GridMismatch`] if `exposures` is empty or the
/// sets differ in length, coordinates, or unit.
#[allow(clippy::cast_precision_loss, clippy::float_cmp)]
pub fn mean_of_exposures(exposures: &[Exposures]) -> Result<Exposures, ExposureError> {
    let Some((first, rest)) = exposures.split_first() else {
        return Err(ExposureError::GridMismatch {
            message: "no exposures to average".to_string(),
        });
    };

    for (i, other) in rest.iter().enumerate() {
        if other.value_unit != first.value_unit {
            return Err(ExposureError::GridMismatch {
                message: format!(
                    "set {} is in {}, set 0 in {}",
                    i + 1,
                    other.value_unit,
                    first.value_unit
                ),
            });
        }
        if other.len() != first.len()
            || other
                .records
                .iter()
                .zip(&first.records)
                .any(|(a, b)| a.lat != b.lat || a.lon != b.lon)
        {
            return Err(ExposureError::GridMismatch {
                message: format!("set {} has different coordinates than set 0", i + 1),
            });
        }
    }

    let n = exposures.len() as f64;
    let records = first
        .records
        .iter()
        .enumerate()
        .map(|(p, record)| {
            let sum: f64 = exposures.iter().map(|e| e.records[p].value).sum();
            let tonnes = exposures
                .iter()
                .map(|e| e.records[p].tonnes_per_year)
                .sum::<Option<f64>>();
            ExposureRecord {
                value: sum / n,
                tonnes_per_year: tonnes.map(|t| t / n),
                ..*record
            }
        })
        .collect();

    let mut mean = first.with_records(records);
    mean.description = format!("Mean of {} exposure sets", exposures.len());
    Ok(mean)
}
