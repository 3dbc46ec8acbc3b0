//! Command line options that are used across applications.

use std::path::{Path, PathBuf};

use clap::{crate_version, App, Arg, ArgMatches};

use crate::{config::Config, errors::WaveformErr};

/// Struct to package up command line arguments.
#[derive(Clone, Debug)]
pub struct CommonCmdLineArgs {
    // Settings from the environment with the command line overrides applied.
    config: Config,
}

impl<'a, 'b> CommonCmdLineArgs {
    /// Create a new set of args.
    pub fn new_app(app_name: &'static str, about: &'static str) -> App<'a, 'b> {
        App::new(app_name)
            .about(about)
            .version(crate_version!())
            .arg(
                Arg::with_name("root")
                    .short("r")
                    .long("root")
                    .takes_value(true)
                    .help("Path to the local object store.")
                    .long_help(concat!(
                        "Path to the local object store, each bucket is a directory in it. ",
                        "Defaults to $PDS_STORE_ROOT or '${HOME}/pds/'"
                    )),
            )
            .arg(
                Arg::with_name("input-bucket")
                    .short("i")
                    .long("input-bucket")
                    .takes_value(true)
                    .help("Bucket holding the waveform archive.")
                    .long_help(concat!(
                        "Bucket holding the waveform archive. ",
                        "Defaults to $PDS_INPUT_BUCKET or 'scedc-pds'"
                    )),
            )
            .after_help(concat!(
                "Response removal is configured through the environment: S3_OUTPUT_BUCKET, ",
                "PDS_WATER_LEVEL, PDS_PRE_FILTER, PDS_OUTPUT_UNITS, and PDS_TAPER_FRACTION."
            ))
    }

    /// Process an `App` to get the parsed values out of it and the matches object so an
    /// application can continue with further argument parsing.
    pub fn matches(app: App<'a, 'b>) -> Result<(Self, ArgMatches<'a>), WaveformErr> {
        let matches = app.get_matches();

        let mut config = Config::from_env()?;
        if let Some(root) = matches.value_of("root") {
            config.store_root = PathBuf::from(root);
        }
        if let Some(bucket) = matches.value_of("input-bucket") {
            config.input_bucket = bucket.to_owned();
        }

        Ok((CommonCmdLineArgs { config }, matches))
    }

    /// Get the root of the local object store.
    pub fn root(&self) -> &Path {
        &self.config.store_root
    }

    /// Get the bucket holding the waveform archive.
    pub fn input_bucket(&self) -> &str {
        &self.config.input_bucket
    }

    /// Get the full configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Give up the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }
}
