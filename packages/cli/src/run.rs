//! The jobs the CLI runs.

use std::path::Path;
use std::str::FromStr;

use crop_risk_cli_utils::{IndicatifProgress, MultiProgress};
use crop_risk_crop_models::CropIrr;
use crop_risk_engine::{ImpactResult, ImpactSummary, compute_impact};
use crop_risk_exposure::{
    CsvExposureSource, ExposureSource, FaoTable, LandUseTable, SpamSource, aggregate_countries,
    crop_production_exposure, select_by_region, value_to_kcal, value_to_usd,
};
use crop_risk_exposure_models::{Exposures, ValueUnit};
use crop_risk_hazard::{
    CsvHazardSource, HazardFileInfo, HazardSource, aggregate_historical_means,
    relative_yield_from_baseline,
};
use crop_risk_hazard_models::{Hazard, YieldBaseline};
use crop_risk_impact_funcs::ImpactFuncSet;
use crop_risk_spatial::{CentroidIndex, RegionIndex, assign_centroids};

use crate::config::{HistMeanConfig, ImpactConfig, SpamConfig};

/// Builds historical-mean baselines and writes them as JSON.
///
/// # Errors
///
/// Returns an error if the input directory cannot be listed, aggregation
/// fails, or the output cannot be written.
pub fn hist_mean(
    config: &HistMeanConfig,
    multi: &MultiProgress,
) -> Result<YieldBaseline, Box<dyn std::error::Error>> {
    let source = CsvHazardSource;
    let files = if config.files.is_empty() {
        historical_files(&config.input_dir, source.extension())?
    } else {
        config.files.clone()
    };
    if files.is_empty() {
        return Err(format!(
            "No historical yield files found in {}",
            config.input_dir.display()
        )
        .into());
    }
    log::info!("Aggregating {} historical files", files.len());

    let progress = IndicatifProgress::files_bar(multi, "Historical means");
    let baseline = aggregate_historical_means(
        &files,
        &config.input_dir,
        &source,
        config.bbox.as_ref(),
        config.yearrange,
        progress.as_ref(),
    )?;

    let file = YieldBaseline {
        yearrange: config.yearrange,
        categories: baseline.categories,
        centroids: baseline.centroids,
        means: baseline.means,
    };
    write_json(&config.output, &file)?;
    Ok(file)
}

/// Historical yield files in `dir` with the given extension, sorted by name.
fn historical_files(dir: &Path, extension: &str) -> Result<Vec<String>, std::io::Error> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        match HazardFileInfo::from_str(name) {
            Ok(info) if info.is_historical() => files.push(name.to_string()),
            Ok(_) => {}
            Err(e) => log::debug!("Skipping {name}: {e}"),
        }
    }
    files.sort();
    Ok(files)
}

/// Inputs and outcome of one impact run, after every selection.
pub struct ImpactRun {
    /// Relative yield hazard the impacts were computed from.
    pub hazard: Hazard,
    /// Exposures with their centroid assignments.
    pub exposures: Exposures,
    /// Impact per event and exposure point.
    pub result: ImpactResult,
}

/// Computes the impact of a relative yield hazard on an exposure and writes
/// the summary as JSON.
///
/// # Errors
///
/// See [`run_impact`]; also fails if the output cannot be written.
pub fn impact(config: &ImpactConfig) -> Result<ImpactSummary, Box<dyn std::error::Error>> {
    let run = run_impact(config)?;
    let summary = run.result.summary();
    log::info!(
        "Average annual impact: {} {} over {} events",
        summary.aai_agg,
        summary.unit,
        summary.event_names.len()
    );

    write_json(&config.output, &summary)?;
    Ok(summary)
}

/// Loads, converts, and selects the inputs of an impact job and computes
/// the impact matrix.
///
/// # Errors
///
/// Returns an error if an input cannot be loaded, the baseline does not
/// cover the hazard's category or cells, or the computation fails.
pub fn run_impact(config: &ImpactConfig) -> Result<ImpactRun, Box<dyn std::error::Error>> {
    let source = CsvHazardSource;
    let yields = source.load(&config.hazard)?;

    let baseline: YieldBaseline =
        serde_json::from_str(&std::fs::read_to_string(&config.hist_mean)?)?;
    let key = CropIrr::new(config.hazard.crop, config.hazard.irr);
    let mut hazard = relative_yield_from_baseline(&yields, &baseline, key)?;

    let mut exposures = load_exposures(config, &baseline)?;
    if !exposures.value_unit.is_annual() {
        return Err(format!(
            "exposure values in {} are not annual production",
            exposures.value_unit
        )
        .into());
    }

    if let Some(path) = &config.regions_geojson {
        let regions =
            RegionIndex::from_geojson(&std::fs::read_to_string(path)?, &config.region_property)?;
        let outside = regions.set_region_ids(hazard.centroids_mut(), config.overwrite_regions);
        if outside > 0 {
            log::info!("{outside} centroids lie outside every region");
        }
        tag_exposures(&mut exposures, &regions);
    }

    let exposures = convert_units(exposures, config)?;

    let events: Option<Vec<&str>> = config
        .events
        .as_ref()
        .map(|names| names.iter().map(String::as_str).collect());
    let hazard = hazard.select(events.as_deref(), config.region)?;
    let mut exposures = match config.region {
        Some(region) => select_by_region(&exposures, region),
        None => exposures,
    };
    if hazard.centroids().is_empty() {
        log::warn!("No hazard centroids left after selection");
    }

    let index = CentroidIndex::new(hazard.centroids());
    assign_centroids(&mut exposures, &index, config.threshold_km);

    for (region, total) in aggregate_countries(&exposures) {
        log::debug!("Region {region}: exposed value {total} {}", exposures.value_unit);
    }

    let result = compute_impact(&hazard, &exposures, &ImpactFuncSet::relative_yield())?;
    Ok(ImpactRun {
        hazard,
        exposures,
        result,
    })
}

/// The configured exposure file, or crop production derived from land use
/// and the baseline.
fn load_exposures(
    config: &ImpactConfig,
    baseline: &YieldBaseline,
) -> Result<Exposures, Box<dyn std::error::Error>> {
    if let Some(exposure) = &config.exposure {
        return Ok(CsvExposureSource.load(exposure)?);
    }
    let land_use = config
        .land_use
        .as_ref()
        .ok_or("[impact] needs either an exposure file or a land_use table")?;
    let table = LandUseTable::from_path(&land_use.path, land_use.bbox.as_ref())?
        .with_resolution(land_use.resolution_deg);
    Ok(crop_production_exposure(
        &table,
        baseline,
        config.hazard.crop,
        config.hazard.irr,
        land_use.yearrange.unwrap_or(baseline.yearrange),
    )?)
}

/// Extracts a SPAM table and writes it as exposure JSON.
///
/// # Errors
///
/// Returns an error if the parameters are invalid, the table cannot be
/// read, or the output cannot be written.
pub fn spam(config: &SpamConfig) -> Result<Exposures, Box<dyn std::error::Error>> {
    let exposures = SpamSource::load(&config.load)?;
    write_json(&config.output, &exposures)?;
    Ok(exposures)
}

/// Fills in missing exposure region ids from the polygons.
fn tag_exposures(exposures: &mut Exposures, regions: &RegionIndex) {
    let mut tagged = 0_usize;
    for record in exposures.records.iter_mut().filter(|r| r.region_id.is_none()) {
        record.region_id = regions.lookup(record.lon, record.lat);
        if record.region_id.is_some() {
            tagged += 1;
        }
    }
    log::debug!("Tagged {tagged} exposure points with a region");
}

fn convert_units(
    exposures: Exposures,
    config: &ImpactConfig,
) -> Result<Exposures, Box<dyn std::error::Error>> {
    Ok(match config.unit {
        ValueUnit::TonnesPerYear => exposures,
        ValueUnit::KcalPerYear => value_to_kcal(&exposures, config.biomass)?,
        ValueUnit::UsdPerYear => {
            let path = config
                .price_file
                .as_ref()
                .ok_or("price_file is required for USD/y impacts")?;
            let prices = FaoTable::from_path(path)?;
            value_to_usd(&exposures, &prices, config.price_years)?
        }
        unit @ (ValueUnit::Usd
        | ValueUnit::Hectares
        | ValueUnit::MetricTonnes
        | ValueUnit::KgPerHectare) => {
            return Err(format!("{unit} is not an impact unit; use t/y, kcal/y, or USD/y").into());
        }
    })
}

fn write_json<T: serde::Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(value)?)?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::config::RunConfig;

    use super::*;

    const YIELD_FILE: &str =
        "gepic_gfdl-esm2m_ewembi_historical_2005soc_co2_yield-whe-noirr_global_annual_1861_2005.csv";

    const YIELDS: &str = "\
lat,lon,region_id,2001,2002,2003,2004,2005
50.25,8.25,276,4.0,2.0,4.0,6.0,4.0
50.25,8.75,276,2.0,3.0,2.0,1.0,2.0
47.25,2.25,250,5.0,5.0,5.0,5.0,5.0
47.25,2.75,250,1.0,,1.0,1.0,1.0
";

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("crop_risk_run_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(YIELD_FILE), YIELDS).unwrap();
        std::fs::write(
            dir.join("exposure.csv"),
            "lat,lon,region_id,value\n50.25,8.25,276,100.0\n50.25,8.75,276,50.0\n47.25,2.25,250,80.0\n",
        )
        .unwrap();
        dir
    }

    fn config(dir: &Path, extra: &str, exposure: &str, bbox: &str) -> RunConfig {
        let d = dir.display();
        RunConfig::parse(&format!(
            r#"
[hist_mean]
input_dir = "{d}"
yearrange = [2001, 2005]
output = "{d}/hist_mean.json"

[impact]
hist_mean = "{d}/hist_mean.json"
output = "{d}/impact.json"
{extra}

[impact.hazard]
input_dir = "{d}"
yearrange = [2001, 2005]
bbox = {bbox}
ag_model = "gepic"
cl_model = "gfdl-esm2m"
scenario = "historical"
soc = "2005soc"
co2 = "co2"
crop = "whe"
irr = "noirr"

[impact.exposure]
path = "{d}/{exposure}"
crop = "whe"
irr = "noirr"
"#
        ))
        .unwrap()
    }

    fn run(dir: &Path, extra: &str, exposure: &str, bbox: &str) -> ImpactRun {
        let config = config(dir, extra, exposure, bbox);
        hist_mean(&config.hist_mean.unwrap(), &MultiProgress::new()).unwrap();
        run_impact(&config.impact.unwrap()).unwrap()
    }

    #[test]
    fn loads_every_year_and_cell_of_the_window() {
        let dir = fixture_dir("window");
        let run = run(&dir, "", "exposure.csv", "[-5.0, 42.0, 16.0, 55.0]");

        assert_eq!(run.hazard.size(), 5);
        assert_eq!(run.hazard.centroids().len(), 4);
        assert_eq!(run.result.at_event().len(), 5);
        assert_eq!(run.exposures.unassigned_count(), 0);
        assert!(dir.join("hist_mean.json").exists());
    }

    #[test]
    fn selected_event_and_region_match_hand_computation() {
        let dir = fixture_dir("select");
        let run = run(
            &dir,
            "events = [\"2002\"]\nregion = 276",
            "exposure.csv",
            "[5.0, 48.0, 16.0, 55.0]",
        );

        assert_eq!(run.hazard.event_names(), vec!["2002"]);
        assert_eq!(run.exposures.len(), 2);
        for (p, record) in run.exposures.records.iter().enumerate() {
            let centroid = record.centroid.unwrap();
            let expected = run.hazard.intensity().get(0, centroid) * record.value;
            assert_eq!((run.result.matrix.get(0, p) - expected).abs().to_bits(), 0);
        }
        // 2002 against the 2001-2005 means: (2 - 4) / 4 and (3 - 2) / 2.
        assert!((run.result.at_event()[0] - (-0.5 * 100.0 + 0.5 * 50.0)).abs() < 1e-9);
    }

    #[test]
    fn missing_exposure_value_counts_as_zero() {
        let dir = fixture_dir("nan");
        std::fs::write(
            dir.join("exposure_nan.csv"),
            "lat,lon,region_id,value\n50.25,8.25,276,100.0\n50.25,8.75,276,\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("exposure_zero.csv"),
            "lat,lon,region_id,value\n50.25,8.25,276,100.0\n50.25,8.75,276,0.0\n",
        )
        .unwrap();
        let bbox = "[5.0, 48.0, 16.0, 55.0]";

        let with_nan = run(&dir, "", "exposure_nan.csv", bbox);
        let with_zero = run(&dir, "", "exposure_zero.csv", bbox);

        assert_eq!(with_nan.exposures.unassigned_count(), 0);
        assert_eq!(with_nan.result.summary(), with_zero.result.summary());
    }

    #[test]
    fn polygon_ids_replace_ids_from_the_hazard_file() {
        let dir = fixture_dir("regions");
        std::fs::write(
            dir.join("regions.geojson"),
            r#"{"type":"FeatureCollection","features":[{"type":"Feature",
"properties":{"ISO_N3":"040"},"geometry":{"type":"Polygon",
"coordinates":[[[8.0,50.0],[9.0,50.0],[9.0,51.0],[8.0,51.0],[8.0,50.0]]]}}]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("exposure_untagged.csv"),
            "lat,lon,value\n50.25,8.25,100.0\n50.25,8.75,50.0\n",
        )
        .unwrap();
        let extra = format!(
            "region = 40\nregions_geojson = \"{}\"",
            dir.join("regions.geojson").display()
        );

        let run = run(&dir, &extra, "exposure_untagged.csv", "[5.0, 48.0, 16.0, 55.0]");

        assert_eq!(run.hazard.centroids().len(), 2);
        assert!(run.hazard.centroids().iter().all(|c| c.region_id == Some(40)));
        assert_eq!(run.exposures.len(), 2);
        assert_eq!(run.exposures.unassigned_count(), 0);
    }

    #[test]
    fn baseline_from_another_window_is_rejected() {
        let dir = fixture_dir("misaligned");
        let config = config(&dir, "", "exposure.csv", "[5.0, 48.0, 16.0, 55.0]");
        let mut hist = config.hist_mean.unwrap();
        hist.bbox = Some(crop_risk_hazard_models::BoundingBox::new(0.0, 46.0, 4.0, 48.0));
        hist_mean(&hist, &MultiProgress::new()).unwrap();

        assert!(run_impact(&config.impact.unwrap()).is_err());
    }

    #[test]
    fn spam_job_writes_exposures() {
        let dir = std::env::temp_dir().join("crop_risk_run_spam");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("spam2005V3r2_global_V_agg_TA.csv"),
            "iso3,name_cntr,x,y,whea_a,rice_a\nCHE,Switzerland,8.375,47.458,10.0,5.0\nSUR,Suriname,-55.208,5.875,1.0,1.0\n",
        )
        .unwrap();
        let d = dir.display();
        let config = RunConfig::parse(&format!(
            "[spam]\ninput_dir = \"{d}\"\ncountry = \"CHE\"\noutput = \"{d}/spam.json\"\n"
        ))
        .unwrap();

        let exposures = spam(&config.spam.unwrap()).unwrap();
        assert_eq!(exposures.len(), 1);
        assert_eq!(exposures.value_unit, ValueUnit::Usd);
        assert!(dir.join("spam.json").exists());
    }
}
