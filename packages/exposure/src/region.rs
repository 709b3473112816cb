//! Region scoping and country totals.

use std::collections::BTreeMap;

use crop_risk_exposure_models::Exposures;

/// Records tagged with `region_id`, with their centroid assignments and
/// metadata intact.
#[must_use]
pub fn select_by_region(exposures: &Exposures, region_id: u32) -> Exposures {
    let records = exposures
        .records
        .iter()
        .filter(|r| r.region_id == Some(region_id))
        .copied()
        .collect::<Vec<_>>();
    log::debug!(
        "Region {region_id}: {} of {} exposure points",
        records.len(),
        exposures.len()
    );
    exposures.with_records(records)
}

/// Total value per region id, sorted by id. Untagged records count towards
/// region `0`. `NaN` values are skipped.
#[must_use]
pub fn aggregate_countries(exposures: &Exposures) -> Vec<(u32, f64)> {
    let mut totals: BTreeMap<u32, f64> = BTreeMap::new();
    for record in &exposures.records {
        let total = totals.entry(record.region_id.unwrap_or(0)).or_insert(0.0);
        if !record.value.is_nan() {
            *total += record.value;
        }
    }
    totals.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use crop_risk_exposure_models::ExposureRecord;

    use super::*;

    fn exposures() -> Exposures {
        Exposures::new(vec![
            ExposureRecord::new(50.0, 8.0, 10.0)
                .with_region(276)
                .with_centroid(4),
            ExposureRecord::new(47.0, 2.0, 5.0).with_region(250),
            ExposureRecord::new(52.0, 10.0, f64::NAN).with_region(276),
            ExposureRecord::new(51.0, 9.0, 2.5).with_region(276),
            ExposureRecord::new(0.0, -30.0, 1.0),
        ])
    }

    #[test]
    fn selects_records_of_one_region() {
        let selected = select_by_region(&exposures(), 276);
        assert_eq!(selected.len(), 3);
        assert_eq!(selected.records[0].centroid, Some(4));
        assert!(selected.records.iter().all(|r| r.region_id == Some(276)));
    }

    #[test]
    fn unknown_region_selects_nothing() {
        assert!(select_by_region(&exposures(), 4).is_empty());
    }

    #[test]
    fn aggregates_by_country() {
        let totals = aggregate_countries(&exposures());
        assert_eq!(totals, vec![(0, 1.0), (250, 5.0), (276, 12.5)]);
    }
}
