/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

pub mod data_tools;
pub mod hydro_analysis;
pub mod terrain_analysis;

use serde_json;
use std::io::{Error, ErrorKind};

use self::data_tools::*;
use self::hydro_analysis::*;
use self::terrain_analysis::*;

#[derive(Default)]
pub struct ToolManager {
    pub working_dir: String,
    pub verbose: bool,
    tool_names: Vec<String>,
}

impl ToolManager {
    pub fn new<'a>(working_directory: &'a str, verbose_mode: &'a bool) -> Result<ToolManager, Error> {
        let mut tool_names = vec![];
        // data_tools
        tool_names.push("RasterToVectorLines".to_string());
        tool_names.push("RasterToVectorPoints".to_string());
        tool_names.push("RasterToVectorPolygons".to_string());

        // hydro_analysis
        tool_names.push("FillDepressions".to_string());
        tool_names.push("FlowAccumulation".to_string());
        tool_names.push("Flowlines".to_string());
        tool_names.push("TraceDownslopeFlowpaths".to_string());

        // terrain_analysis
        tool_names.push("Geomorphons".to_string());

        Ok(ToolManager {
            working_dir: working_directory.to_string(),
            verbose: *verbose_mode,
            tool_names,
        })
    }

    fn get_tool(&self, tool_name: &str) -> Option<Box<dyn TerraflowTool>> {
        match tool_name.to_lowercase().replace("_", "").as_ref() {
            "rastertovectorlines" => Some(Box::new(RasterToVectorLines::new())),
            "rastertovectorpoints" => Some(Box::new(RasterToVectorPoints::new())),
            "rastertovectorpolygons" => Some(Box::new(RasterToVectorPolygons::new())),
            "filldepressions" => Some(Box::new(FillDepressions::new())),
            "flowaccumulation" => Some(Box::new(FlowAccumulation::new())),
            "flowlines" => Some(Box::new(Flowlines::new())),
            "tracedownslopeflowpaths" => Some(Box::new(TraceDownslopeFlowpaths::new())),
            "geomorphons" => Some(Box::new(Geomorphons::new())),
            _ => None,
        }
    }

    pub fn run_tool(&self, tool_name: String, args: Vec<String>) -> Result<(), Error> {
        match self.get_tool(tool_name.as_ref()) {
            Some(tool) => tool.run(args, &self.working_dir, self.verbose),
            None => Err(Error::new(
                ErrorKind::NotFound,
                format!("Unrecognized tool name {}.", tool_name),
            )),
        }
    }

    pub fn tool_help(&self, tool_name: String) -> Result<(), Error> {
        if !tool_name.is_empty() {
            match self.get_tool(tool_name.as_ref()) {
                Some(tool) => println!("{}", get_help(tool)),
                None => {
                    return Err(Error::new(
                        ErrorKind::NotFound,
                        format!("Unrecognized tool name {}.", tool_name),
                    ));
                }
            }
        } else {
            let mut i = 1;
            for val in &self.tool_names {
                let tool = self.get_tool(&val).unwrap();
                println!("{}. {}\n", i, get_help(tool));
                i += 1;
            }
        }
        Ok(())
    }

    pub fn tool_parameters(&self, tool_name: String) -> Result<(), Error> {
        match self.get_tool(tool_name.as_ref()) {
            Some(tool) => {
                println!("{}", tool.get_tool_parameters());
                Ok(())
            }
            None => Err(Error::new(
                ErrorKind::NotFound,
                format!("Unrecognized tool name {}.", tool_name),
            )),
        }
    }

    pub fn list_tools(&self) {
        let mut tool_details: Vec<(String, String)> = Vec::new();

        for val in &self.tool_names {
            let tool = self
                .get_tool(&val)
                .expect(&format!("Unrecognized tool name {}.", val));
            tool_details.push((tool.get_tool_name(), tool.get_tool_description()));
        }
        tool_details.sort();

        let mut ret = format!("All {} Available Tools:\n", tool_details.len());
        for i in 0..tool_details.len() {
            ret.push_str(&format!("{}: {}\n\n", tool_details[i].0, tool_details[i].1));
        }
        println!("{}", ret);
    }
}

pub trait TerraflowTool {
    fn get_tool_name(&self) -> String;
    fn get_tool_description(&self) -> String;
    fn get_tool_parameters(&self) -> String;
    fn get_example_usage(&self) -> String;
    fn get_toolbox(&self) -> String;
    fn run<'a>(
        &self,
        args: Vec<String>,
        working_directory: &'a str,
        verbose: bool,
    ) -> Result<(), Error>;
}

fn get_help<'a>(wt: Box<dyn TerraflowTool + 'a>) -> String {
    let tool_name = wt.get_tool_name();
    let description = wt.get_tool_description();
    let parameters = wt.get_tool_parameters();
    let toolbox = wt.get_toolbox();
    let o: serde_json::Value = serde_json::from_str(&parameters).unwrap();
    let a = o["parameters"].as_array().unwrap();
    let mut p = String::new();
    p.push_str("Flag               Description\n");
    p.push_str("-----------------  -----------\n");
    for d in a {
        let mut s = String::new();
        for f in d["flags"].as_array().unwrap() {
            s.push_str(&format!("{}, ", f.as_str().unwrap()));
        }
        p.push_str(&format!(
            "{:width$} {}\n",
            s.trim().trim_matches(','),
            d["description"].as_str().unwrap(),
            width = 18
        ));
    }
    let example = wt.get_example_usage();
    if example.len() <= 1 {
        format!(
            "{}\n\nDescription:\n{}\nToolbox: {}\nParameters:\n\n{}\n",
            tool_name, description, toolbox, p
        )
    } else {
        format!(
            "{}\nDescription:\n{}\nToolbox: {}\nParameters:\n\n{}\n\nExample usage:\n{}\n",
            tool_name, description, toolbox, p, example
        )
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ToolParameter {
    pub name: String,
    pub flags: Vec<String>,
    pub description: String,
    pub parameter_type: ParameterType,
    pub default_value: Option<String>,
    pub optional: bool,
}

#[derive(Serialize, Deserialize, Debug)]
pub enum ParameterType {
    Boolean,
    String,
    StringList,
    Integer,
    Float,
    StringOrNumber,
    ExistingFile(ParameterFileType),
    NewFile(ParameterFileType),
    FileList(ParameterFileType),
    Directory,
    OptionList(Vec<String>),
}

#[derive(Serialize, Deserialize, Debug)]
pub enum ParameterFileType {
    Any,
    Raster,
    Vector(VectorGeometryType),
    Text,
    Csv,
}

#[derive(Serialize, Deserialize, Debug)]
pub enum VectorGeometryType {
    Any,
    Point,
    Line,
    Polygon,
    LineOrPolygon,
}
