use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    pub device:  PathBuf,
    pub on_key:  Option<String>,
    pub verbose: bool,
}

impl From<&crate::cli::Args> for Config {
    fn from(a: &crate::cli::Args) -> Self {
        Self {
            device:  a.device.clone(),
            on_key:  a.on_key.clone(),
            verbose: a.verbose,
        }
    }
}
