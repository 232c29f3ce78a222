use clap::Parser;
use stagepipe_config::shared::RunnerConfig;
use stagepipe_config::{LoadConfigError, load_config};
use tracing::info;

/// Squares numbers through a staged pipeline and sums them.
#[derive(Debug, Default, Parser)]
#[command(name = "stagepipe-runner", version)]
pub struct Args {
    /// Number of transform workers squaring values.
    #[arg(long)]
    pub fan_out: Option<usize>,

    /// Read only the first N squares, then shut the pipeline down.
    #[arg(long)]
    pub take: Option<usize>,

    /// Comma separated values to square, replacing the configured input.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub input: Option<Vec<i64>>,
}

impl Args {
    fn apply(self, config: &mut RunnerConfig) {
        if let Some(fan_out) = self.fan_out {
            config.pipeline.fan_out = fan_out;
        }

        if let Some(take) = self.take {
            config.take = Some(take);
        }

        if let Some(input) = self.input {
            config.input = input;
        }
    }
}

/// Loads the runner configuration, applies `args` on top and validates the result.
///
/// Without a `configuration` directory the defaults are used, so the binary also runs from
/// anywhere with command line arguments only.
pub fn load_runner_config(args: Args) -> anyhow::Result<RunnerConfig> {
    let mut config = match load_config::<RunnerConfig>() {
        Ok(config) => config,
        Err(LoadConfigError::MissingConfigurationDirectory(directory)) => {
            info!(
                directory = %directory.display(),
                "no configuration directory found, using the default configuration"
            );

            RunnerConfig::default()
        }
        Err(err) => return Err(err.into()),
    };

    args.apply(&mut config);
    config.validate()?;

    Ok(config)
}
