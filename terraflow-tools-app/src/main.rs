/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

/*!
Terraflow is a command-line geospatial analysis engine providing
hydrological flow modelling, geomorphometric terrain classification and
raster-to-vector conversion. Tools are run by calling the executable with
the appropriate commands and arguments:

| Command           | Description                                                             |
| ----------------- | ----------------------------------------------------------------------- |
| --cd, --wd        | Changes the working directory; used in conjunction with --run flag.     |
| -h, --help        | Prints help information.                                                |
| --listtools       | Lists all available tools, with tool descriptions.                      |
| -r, --run         | Runs a tool; used in conjunction with --cd flag; -r="FlowAccumulation". |
| --toolhelp        | Prints the help associated with a tool; --toolhelp="Geomorphons".       |
| --toolparameters  | Prints the parameters (in json form) for a specific tool.               |
| -v                | Verbose mode. Without this flag, tool outputs will not be printed.      |
| --version         | Prints the version information.                                         |
*/

pub mod tools;

use crate::tools::ToolManager;
use std::env;
use std::io::Error;
use std::path;
use std::process;

#[macro_use]
extern crate serde_derive;

fn main() {
    match run() {
        Ok(()) => {}
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    }
}

fn run() -> Result<(), Error> {
    let sep: &str = &path::MAIN_SEPARATOR.to_string();
    let mut working_dir = String::new();
    let mut tool_name = String::new();
    let mut run_tool = false;
    let mut tool_help = false;
    let mut tool_parameters = false;
    let mut list_tools = false;
    let mut tool_args_vec: Vec<String> = vec![];
    let mut finding_working_dir = false;
    let args: Vec<String> = env::args().collect();

    let mut configs = terraflow_common::configs::get_configs()?;
    let mut verbose = configs.verbose_mode;

    if args.len() <= 1 {
        version();
        help();
        let tm = ToolManager::new(&working_dir, &false)?;
        tm.list_tools();
        return Ok(());
    }

    for arg in &args[1..] {
        let flag_val = arg.to_lowercase().replace("--", "-");
        if flag_val == "-h" || flag_val == "-help" {
            help();
            return Ok(());
        } else if flag_val.starts_with("-cd") || flag_val.starts_with("-wd") {
            let mut v = arg
                .replace("--cd", "")
                .replace("--wd", "")
                .replace("-cd", "")
                .replace("-wd", "")
                .replace("\"", "")
                .replace("\'", "");
            if v.starts_with("=") {
                v = v[1..v.len()].to_string();
            }
            if v.trim().is_empty() {
                finding_working_dir = true;
            }
            if !v.ends_with(sep) && !v.is_empty() {
                v.push_str(sep);
            }
            working_dir = v.to_string();
        } else if flag_val.starts_with("-run") || flag_val.starts_with("-r=") || flag_val == "-r" {
            let mut v = arg
                .replace("--run", "")
                .replace("-run", "")
                .replace("-r", "")
                .replace("\"", "")
                .replace("\'", "");
            if v.starts_with("=") {
                v = v[1..v.len()].to_string();
            }
            tool_name = v;
            run_tool = true;
        } else if flag_val.starts_with("-toolhelp") {
            let mut v = arg.replace("--toolhelp", "").replace("-toolhelp", "");
            if v.starts_with("=") {
                v = v[1..v.len()].to_string();
            }
            tool_name = v;
            tool_help = true;
        } else if flag_val.starts_with("-toolparameters") {
            let mut v = arg
                .replace("--toolparameters", "")
                .replace("-toolparameters", "");
            if v.starts_with("=") {
                v = v[1..v.len()].to_string();
            }
            tool_name = v;
            tool_parameters = true;
        } else if flag_val == "-listtools" {
            list_tools = true;
        } else if flag_val == "-v" {
            verbose = true;
            if !configs.verbose_mode {
                configs.verbose_mode = true;
                let _ = terraflow_common::configs::save_configs(&configs);
            }
        } else if flag_val == "-version" {
            version();
            return Ok(());
        } else if finding_working_dir {
            let mut v = arg.replace("\"", "").replace("\'", "");
            if !v.ends_with(sep) {
                v.push_str(sep);
            }
            working_dir = v;
            finding_working_dir = false;
        } else {
            tool_args_vec.push(arg.trim().to_string());
        }
    }

    if working_dir.is_empty() {
        working_dir = configs.working_directory.clone();
    }

    let tm = ToolManager::new(&working_dir, &verbose)?;
    if run_tool {
        return tm.run_tool(tool_name, tool_args_vec);
    } else if tool_help {
        return tm.tool_help(tool_name);
    } else if tool_parameters {
        return tm.tool_parameters(tool_name);
    } else if list_tools {
        tm.list_tools();
    }

    Ok(())
}

fn help() {
    let mut ext = "";
    if cfg!(target_os = "windows") {
        ext = ".exe";
    }
    let exe_name = &format!("terraflow_tools{}", ext);
    let sep: String = path::MAIN_SEPARATOR.to_string();
    let s = &format!(
        "terraflow_tools Help

The following commands are recognized:
--cd, --wd        Changes the working directory; used in conjunction with --run flag.
-h, --help        Prints help information.
--listtools       Lists all available tools.
-r, --run         Runs a tool; used in conjunction with --wd flag; -r=\"FlowAccumulation\".
--toolhelp        Prints the help associated with a tool; --toolhelp=\"Geomorphons\".
--toolparameters  Prints the parameters (in json form) for a specific tool.
-v                Verbose mode. Without this flag, tool outputs will not be printed.
--version         Prints the version information.

Example Usage:
>> .{}{} -r=FlowAccumulation --wd=\"{}path{}to{}data{}\" --dem=DEM.asc --accum=accum.asc -v
",
        sep, exe_name, sep, sep, sep, sep
    );
    println!("{}", s);
}

fn version() {
    const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");
    println!(
        "terraflow_tools v{}",
        VERSION.unwrap_or("Unknown version")
    );
}
