use crate::output::print_json;
use clap::Subcommand;
use whattime_core::Config;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration (secrets omitted)
    Show,
}

pub fn run(config: &Config, subcommand: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            if json {
                print_json(config)
            } else {
                print!("{}", serde_yaml::to_string(config)?);
                Ok(())
            }
        }
    }
}
