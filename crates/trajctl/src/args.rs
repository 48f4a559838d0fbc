use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "trajctl", author, version, about = "Heliocentric trajectory engine CLI", long_about = None)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub action: Actions,
}

#[derive(Debug, Subcommand)]
pub enum Actions {
    /// Propagate a single catalog body and print the sampled trajectory
    Propagate {
        /// Catalog designation, e.g. "1P/Halley" or "Earth-analog"
        designation: String,
        /// Start time, Julian date (TDB)
        #[clap(long, default_value_t = 2451545.0)]
        start: f64,
        /// End time, Julian date (TDB)
        #[clap(long)]
        end: f64,
        /// Number of sample points along the trajectory
        #[clap(long, default_value_t = 10)]
        points: usize,
        /// Propagation method
        #[clap(long, value_enum, default_value = "two-body")]
        method: MethodArg,
    },
    /// Propagate many catalog bodies over the same window in one batch
    Batch {
        /// Catalog designations to propagate
        designations: Vec<String>,
        #[clap(long, default_value_t = 2451545.0)]
        start: f64,
        #[clap(long)]
        end: f64,
        #[clap(long, default_value_t = 10)]
        points: usize,
        #[clap(long, value_enum, default_value = "two-body")]
        method: MethodArg,
    },
    /// Print the number of bodies in the built-in catalog, by orbit family
    CatalogStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MethodArg {
    TwoBody,
    NBody,
}
