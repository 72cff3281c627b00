use std::env;

use color_eyre::eyre::{OptionExt, Result, eyre};
use deposit_confirmation::config::Surface;

pub struct CliArgs {
    pub input_file_path: String,
    pub surface: Surface,
}

impl CliArgs {
    pub fn load() -> Result<Self> {
        let args: Vec<String> = env::args().collect();

        let input_file_path = args.get(1).ok_or_eyre("Input file not passed")?.to_owned();
        let surface = match args.get(2) {
            Some(s) => s.parse::<Surface>().map_err(|e| eyre!(e))?,
            None => Surface::FullPage,
        };

        Ok(CliArgs {
            input_file_path,
            surface,
        })
    }
}
