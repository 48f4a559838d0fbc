mod args;

use args::{Actions, CliArgs, MethodArg};
use clap::Parser;
use log::error;
use std::process::ExitCode;
use tabled::{Style, Table, Tabled};
use traj_core::api;
use traj_core::batch::{BatchJob, BatchRequest, TrajectoryCache};
use traj_core::catalog::StaticCatalog;
use traj_core::config::Config;
use traj_core::ephemeris::select_ephemeris;
use traj_core::trajectory::{Method, TrajectoryResult};
use traj_core::TrajectoryError;

impl From<MethodArg> for Method {
    fn from(m: MethodArg) -> Self {
        match m {
            MethodArg::TwoBody => Method::TwoBody,
            MethodArg::NBody => Method::NBody,
        }
    }
}

#[derive(Tabled)]
struct SampleRow {
    #[tabled(rename = "JD (TDB)")]
    time: f64,
    #[tabled(rename = "days from epoch")]
    days_from_epoch: f64,
    x_au: f64,
    y_au: f64,
    z_au: f64,
    #[tabled(rename = "r (AU)")]
    distance_from_sun: f64,
}

fn print_result(result: &TrajectoryResult) {
    println!(
        "{} ({}): {} samples, {:.3}ms",
        result.designation,
        result.method.as_str(),
        result.samples.len(),
        result.calculation_time_seconds * 1000.0
    );
    let rows: Vec<SampleRow> = result
        .samples
        .iter()
        .map(|s| SampleRow {
            time: s.time,
            days_from_epoch: s.days_from_epoch,
            x_au: s.position.x,
            y_au: s.position.y,
            z_au: s.position.z,
            distance_from_sun: s.distance_from_sun,
        })
        .collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{table}");
}

fn run() -> Result<(), TrajectoryError> {
    let args = CliArgs::parse();
    let config = Config::from_env();
    let catalog = StaticCatalog::new();
    let ephemeris = select_ephemeris(&config);

    match args.action {
        Actions::Propagate { designation, start, end, points, method } => {
            let result = api::propagate_elements(
                &catalog,
                ephemeris.as_ref(),
                &designation,
                start,
                end,
                points,
                method.into(),
                &[],
                &config.default_planets,
                config.nbody_tolerances,
            )?;
            print_result(&result);
        }
        Actions::Batch { designations, start, end, points, method } => {
            let cache = TrajectoryCache::new(config.cache_capacity);
            let jobs: Vec<BatchJob> = designations
                .into_iter()
                .map(|designation| BatchJob {
                    designation,
                    start_time: start,
                    end_time: end,
                    num_points: points,
                    method: method.into(),
                    planets: Vec::new(),
                })
                .collect();
            let outcome = api::batch(
                &catalog,
                &cache,
                ephemeris.as_ref(),
                BatchRequest(jobs),
                config.max_batch_size,
                &config.default_planets,
                config.nbody_tolerances,
            )?;
            for result in outcome.results.values() {
                print_result(result);
            }
            for designation in &outcome.not_found {
                error!("{designation}: not found in catalog");
            }
            for (designation, err) in &outcome.errors {
                error!("{designation}: {err}");
            }
        }
        Actions::CatalogStats => {
            let stats = api::catalog_stats(&catalog);
            println!(
                "total: {}  periodic: {}  hyperbolic: {}  parabolic: {}",
                stats.total, stats.periodic, stats.hyperbolic, stats.parabolic
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
