/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

use crate::tools::*;
use std::env;
use std::f64;
use std::io::{Error, ErrorKind};
use std::path;
use std::time::Instant;
use terraflow_common::structures::Point2D;
use terraflow_common::utils::get_formatted_elapsed_time;
use terraflow_raster::*;
use terraflow_vector::{AttributeField, FieldData, FieldDataType, ShapeType, Shapefile, ShapefileGeometry};

/// This tool converts every non-null cell of a raster into a vector
/// point at the cell center. Categories are sequential or, with
/// `--value`, the raster cell values; with `-z` the cell value is also
/// written as the point elevation.
pub struct RasterToVectorPoints {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl RasterToVectorPoints {
    pub fn new() -> RasterToVectorPoints {
        // public constructor
        let name = "RasterToVectorPoints".to_string();
        let toolbox = "Data Tools".to_string();
        let description = "Converts non-null raster cells to vector points.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Input Raster File".to_owned(),
            flags: vec!["-i".to_owned(), "--input".to_owned()],
            description: "Input raster file.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Output Vector File".to_owned(),
            flags: vec!["-o".to_owned(), "--output".to_owned()],
            description: "Output vector points file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Vector(
                VectorGeometryType::Point,
            )),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Use raster values as categories?".to_owned(),
            flags: vec!["-v".to_owned(), "--value".to_owned()],
            description: "Use raster values as categories instead of a sequence.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Write z coordinates?".to_owned(),
            flags: vec!["-z".to_owned()],
            description: "Write the cell value as the point elevation.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        let sep: String = path::MAIN_SEPARATOR.to_string();
        let e = format!("{}", env::current_exe().unwrap().display());
        let mut parent = env::current_exe().unwrap();
        parent.pop();
        let p = format!("{}", parent.display());
        let mut short_exe = e
            .replace(&p, "")
            .replace(".exe", "")
            .replace(".", "")
            .replace(&sep, "");
        if e.contains(".exe") {
            short_exe += ".exe";
        }
        let usage = format!(
            ">>.*{0} -r={1} -v --wd=\"*path*to*data*\" -i=sites.asc -o=sites.shp -z",
            short_exe, name
        )
        .replace("*", &sep);

        RasterToVectorPoints {
            name: name,
            description: description,
            toolbox: toolbox,
            parameters: parameters,
            example_usage: usage,
        }
    }
}

impl TerraflowTool for RasterToVectorPoints {
    fn get_tool_name(&self) -> String {
        self.name.clone()
    }

    fn get_tool_description(&self) -> String {
        self.description.clone()
    }

    fn get_tool_parameters(&self) -> String {
        match serde_json::to_string(&self.parameters) {
            Ok(json_str) => return format!("{{\"parameters\":{}}}", json_str),
            Err(err) => return format!("{:?}", err),
        }
    }

    fn get_example_usage(&self) -> String {
        self.example_usage.clone()
    }

    fn get_toolbox(&self) -> String {
        self.toolbox.clone()
    }

    fn run<'a>(
        &self,
        args: Vec<String>,
        working_directory: &'a str,
        verbose: bool,
    ) -> Result<(), Error> {
        let mut input_file = String::new();
        let mut output_file = String::new();
        let mut value_flag = false;
        let mut z_flag = false;

        if args.len() == 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Tool run with no parameters.",
            ));
        }
        for i in 0..args.len() {
            let mut arg = args[i].replace("\"", "");
            arg = arg.replace("\'", "");
            let cmd = arg.split("="); // in case an equals sign was used
            let vec = cmd.collect::<Vec<&str>>();
            let mut keyval = false;
            if vec.len() > 1 {
                keyval = true;
            }
            let flag_val = vec[0].to_lowercase().replace("--", "-");
            if flag_val == "-i" || flag_val == "-input" {
                input_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-o" || flag_val == "-output" {
                output_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-v" || flag_val == "-value" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    value_flag = true;
                }
            } else if flag_val == "-z" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    z_flag = true;
                }
            }
        }

        let sep: String = path::MAIN_SEPARATOR.to_string();
        if !input_file.contains(&sep) && !input_file.contains("/") {
            input_file = format!("{}{}", working_directory, input_file);
        }
        if !output_file.contains(&sep) && !output_file.contains("/") {
            output_file = format!("{}{}", working_directory, output_file);
        }

        if verbose {
            println!("Reading data...")
        };
        let input = Raster::new(&input_file, "r")?;
        let rows = input.configs.rows as isize;
        let columns = input.configs.columns as isize;
        let nodata = input.configs.nodata;

        let start = Instant::now();
        if verbose {
            println!("Extracting points...");
        }

        let shape_type = if z_flag {
            ShapeType::PointZ
        } else {
            ShapeType::Point
        };
        let mut vout = Shapefile::new(&output_file, shape_type)?;
        vout.attributes
            .add_field(&AttributeField::new("FID", FieldDataType::Int, 10u8, 0u8));
        vout.attributes
            .add_field(&AttributeField::new("CAT", FieldDataType::Int, 10u8, 0u8));
        vout.attributes.add_field(&AttributeField::new(
            "VALUE",
            FieldDataType::Real,
            12u8,
            4u8,
        ));

        let mut count = 1i32;
        let mut progress: usize;
        let mut old_progress: usize = 1;
        for row in 0..rows {
            let y = input.get_y_from_row(row);
            for col in 0..columns {
                let dval = input.get_value(row, col);
                if dval == nodata {
                    continue;
                }
                let x = input.get_x_from_column(col);
                let cat = if value_flag { dval as i32 } else { count };

                let mut sfg = ShapefileGeometry::new(shape_type);
                if z_flag {
                    sfg.add_part_with_z(&[Point2D::new(x, y)], &[dval]);
                } else {
                    sfg.add_part(&[Point2D::new(x, y)]);
                }
                vout.add_record(sfg);
                vout.attributes.add_record(
                    vec![
                        FieldData::Int(count),
                        FieldData::Int(cat),
                        FieldData::Real(dval),
                    ],
                    false,
                );
                count += 1;
            }
            if verbose {
                progress = (100.0_f64 * row as f64 / (rows - 1) as f64) as usize;
                if progress != old_progress {
                    println!("Progress: {}%", progress);
                    old_progress = progress;
                }
            }
        }

        let elapsed_time = get_formatted_elapsed_time(start);
        if verbose {
            println!("Saving data...")
        };
        if vout.num_records > 0 {
            vout.write()?;
        } else {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "The input raster contains no non-null cells.",
            ));
        }

        if verbose {
            println!(
                "{}",
                &format!("Elapsed Time (excluding I/O): {}", elapsed_time)
            );
        }

        Ok(())
    }
}
