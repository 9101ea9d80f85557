use serde::{Deserialize, Serialize};
use serde_json;
use std::fs;
use std::fs::File;
use std::io::prelude::*;
use std::io::Error;

/// Runtime environment settings, backed by a settings.json file located
/// beside the executable. Missing or unreadable files fall back to defaults.
#[derive(Serialize, Deserialize, Debug)]
pub struct Configs {
    pub verbose_mode: bool,
    pub working_directory: String,
    pub max_procs: isize,
}

impl Configs {
    pub fn new() -> Configs {
        Configs {
            verbose_mode: true,
            working_directory: String::new(),
            max_procs: -1,
        }
    }
}

fn settings_path() -> String {
    let mut exe_path = std::env::current_exe().unwrap_or_default();
    exe_path.pop();
    let config_file = exe_path.join("settings.json");
    config_file
        .to_str()
        .unwrap_or("settings.json")
        .to_string()
}

pub fn get_configs() -> Result<Configs, Error> {
    let configs: Configs = match fs::read_to_string(settings_path()) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or(Configs::new()),
        Err(_) => Configs::new(),
    };
    Ok(configs)
}

pub fn save_configs(configs: &Configs) -> Result<(), Error> {
    let configs_json =
        serde_json::to_string_pretty(&configs).expect("Error converting Configs object to JSON.");
    match File::create(settings_path()) {
        Ok(mut file) => {
            if let Err(_) = file.write_all(configs_json.as_bytes()) {
                eprintln!("Error writing to settings.json; settings will not be updated.");
            }
        }
        Err(_) => {
            eprintln!("Could not create settings.json file; settings will not be updated.")
        }
    };

    Ok(())
}
