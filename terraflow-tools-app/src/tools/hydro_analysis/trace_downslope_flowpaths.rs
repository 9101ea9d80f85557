/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

use crate::tools::hydro_analysis::fill_depressions::{
    fill_single_cell_pits, initial_directions, resolve_flat_directions, row_metrics, DIR_NULL,
};
use crate::tools::*;
use std::env;
use std::f64;
use std::io::{Error, ErrorKind};
use std::path;
use std::time::Instant;
use terraflow_common::structures::{Array2D, Point2D};
use terraflow_common::utils::get_formatted_elapsed_time;
use terraflow_raster::*;
use terraflow_vector::{AttributeField, FieldData, FieldDataType, ShapeType, Shapefile, ShapefileGeometry};

/// What gets written along each traced path.
#[derive(Clone, Copy, PartialEq)]
pub(crate) enum TraceMode {
    MarkPath,
    CopyValues,
    AccumulateValues,
    CountCells,
}

/// Walks a single downslope path from `seed` by reading the power-of-two
/// direction code at each cell and stepping to the indicated neighbour.
/// The walk stops at the map edge, at a null or unresolved direction, or
/// when a cycle is detected (which indicates a corrupt direction raster).
pub(crate) fn trace_hydrological(
    dir: &Array2D<i32>,
    seed: (isize, isize),
) -> Result<Vec<(isize, isize)>, Error> {
    let rows = dir.rows();
    let columns = dir.columns();
    let max_steps = (rows * columns) as usize;
    let mut path = vec![seed];
    let (mut row, mut col) = seed;
    loop {
        let direction = dir.get_value(row, col);
        if direction == DIR_NULL || direction <= 0 || direction >= 256 {
            break;
        }
        let mut next_row = row;
        let mut next_col = col;
        if direction == 1 || direction == 2 || direction == 4 {
            next_col += 1;
        } else if direction == 16 || direction == 32 || direction == 64 {
            next_col -= 1;
        }
        if direction == 64 || direction == 128 || direction == 1 {
            next_row -= 1;
        } else if direction == 4 || direction == 8 || direction == 16 {
            next_row += 1;
        }
        if next_row < 0 || next_row >= rows || next_col < 0 || next_col >= columns {
            break;
        }
        path.push((next_row, next_col));
        row = next_row;
        col = next_col;
        if path.len() > max_steps {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "The direction raster contains a cycle; trace from ({}, {}) does not terminate.",
                    seed.0, seed.1
                ),
            ));
        }
    }
    Ok(path)
}

/// Walks a path over a cost-surface movement-direction raster. Each cell
/// stores a direction in degrees; multiplying by ten selects one of
/// sixteen 22.5-degree sectors, so knight's-move offsets are reachable in
/// addition to the eight ordinary neighbours.
pub(crate) fn trace_cost_surface(
    dir: &Array2D<f64>,
    nodata: f64,
    seed: (isize, isize),
) -> Result<Vec<(isize, isize)>, Error> {
    let rows = dir.rows();
    let columns = dir.columns();
    let max_steps = (rows * columns) as usize;
    let mut path = vec![seed];
    let (mut row, mut col) = seed;
    loop {
        let direction = dir.get_value(row, col);
        if direction == nodata {
            break;
        }
        let neighbour = (direction * 10.0) as i32;
        let (next_row, next_col) = match neighbour {
            225 => (row - 1, col + 2),  // ENE
            450 => (row - 1, col + 1),  // NE
            675 => (row - 2, col + 1),  // NNE
            900 => (row - 1, col),      // N
            1125 => (row - 2, col - 1), // NNW
            1350 => (row - 1, col - 1), // NW
            1575 => (row - 1, col - 2), // WNW
            1800 => (row, col - 1),     // W
            2025 => (row + 1, col - 2), // WSW
            2250 => (row + 1, col - 1), // SW
            2475 => (row + 2, col - 1), // SSW
            2700 => (row + 1, col),     // S
            2925 => (row + 2, col + 1), // SSE
            3150 => (row + 1, col + 1), // SE
            3375 => (row + 1, col + 2), // ESE
            3600 => (row, col + 1),     // E
            _ => break,
        };
        if next_row < 0 || next_row >= rows || next_col < 0 || next_col >= columns {
            break;
        }
        path.push((next_row, next_col));
        row = next_row;
        col = next_col;
        if path.len() > max_steps {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!(
                    "The direction raster contains a cycle; trace from ({}, {}) does not terminate.",
                    seed.0, seed.1
                ),
            ));
        }
    }
    Ok(path)
}

/// Computes the per-cell output values for a set of traced paths. Paths
/// are kept separate so accumulation and numbering restart at each seed.
pub(crate) fn paths_to_values(
    paths: &[Vec<(isize, isize)>],
    input: &Array2D<f64>,
    nodata: f64,
    mode: TraceMode,
) -> Vec<Vec<(isize, isize, f64)>> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        let mut values = Vec::with_capacity(path.len());
        let mut running = 0f64;
        let mut count = 0f64;
        for &(row, col) in path {
            let v = match mode {
                TraceMode::MarkPath => 1f64,
                TraceMode::CopyValues => input.get_value(row, col),
                TraceMode::AccumulateValues => {
                    let z = input.get_value(row, col);
                    if z != nodata {
                        running += z;
                    }
                    running
                }
                TraceMode::CountCells => {
                    count += 1f64;
                    count
                }
            };
            values.push((row, col, v));
        }
        out.push(values);
    }
    out
}

/// This tool traces the path that a drop of water would take from each of
/// a set of seed points over an elevation surface. In the default
/// hydrological mode the input DEM has its single-cell pits filled and
/// flat directions resolved, and the walk follows the resulting D8
/// directions; in cost-surface mode (`--cost`) a movement-direction raster
/// from a cost analysis is followed instead, including knight's-move
/// steps. Each traversed cell is written with 1, the input cell value,
/// the input accumulated downstream, or a downstream cell count, and the
/// paths may also be written as a vector line file.
pub struct TraceDownslopeFlowpaths {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl TraceDownslopeFlowpaths {
    pub fn new() -> TraceDownslopeFlowpaths {
        // public constructor
        let name = "TraceDownslopeFlowpaths".to_string();
        let toolbox = "Hydrological Analysis".to_string();
        let description =
            "Traces downslope flowpaths from one or more seed points over a DEM or cost surface."
                .to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Input Elevation File".to_owned(),
            flags: vec!["-i".to_owned(), "--dem".to_owned()],
            description: "Input raster DEM (or cost value) file.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Input Movement Direction File".to_owned(),
            flags: vec!["--indir".to_owned()],
            description:
                "Input movement direction raster associated with a cost surface (cost mode only)."
                    .to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output File".to_owned(),
            flags: vec!["-o".to_owned(), "--output".to_owned()],
            description: "Output raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Output Vector File".to_owned(),
            flags: vec!["--vector_output".to_owned()],
            description: "Optional output vector line file of the traced paths.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Vector(
                VectorGeometryType::Line,
            )),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Start Coordinates".to_owned(),
            flags: vec!["--start_coordinates".to_owned()],
            description: "Coordinates of starting point(s), as x1,y1,x2,y2,...".to_owned(),
            parameter_type: ParameterType::StringList,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Start Points Vector".to_owned(),
            flags: vec!["--start_points".to_owned()],
            description: "Name of a starting vector points file.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Vector(
                VectorGeometryType::Point,
            )),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Copy input cell values?".to_owned(),
            flags: vec!["-c".to_owned(), "--copy".to_owned()],
            description: "Copy input cell values on output.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Accumulate input values?".to_owned(),
            flags: vec!["-a".to_owned(), "--accumulate".to_owned()],
            description: "Accumulate input values along the path.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Count cells?".to_owned(),
            flags: vec!["-n".to_owned(), "--count".to_owned()],
            description: "Count cell numbers along the path.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Cost surface mode?".to_owned(),
            flags: vec!["-d".to_owned(), "--cost".to_owned()],
            description:
                "The input is a cost surface; a movement direction raster must also be specified."
                    .to_owned(),
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
            ">>.*{0} -r={1} -v --wd=\"*path*to*data*\" --dem=DEM.asc -o=path.asc --start_coordinates=450.5,1200.0",
            short_exe, name
        )
        .replace("*", &sep);

        TraceDownslopeFlowpaths {
            name: name,
            description: description,
            toolbox: toolbox,
            parameters: parameters,
            example_usage: usage,
        }
    }
}

impl TerraflowTool for TraceDownslopeFlowpaths {
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
        let mut indir_file = String::new();
        let mut output_file = String::new();
        let mut vector_file = String::new();
        let mut start_coordinates = String::new();
        let mut start_points_file = String::new();
        let mut mode = TraceMode::MarkPath;
        let mut cost_mode = false;

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
            if flag_val == "-i" || flag_val == "-input" || flag_val == "-dem" {
                input_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-indir" {
                indir_file = if keyval {
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
            } else if flag_val == "-vector_output" {
                vector_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-start_coordinates" {
                start_coordinates = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-start_points" {
                start_points_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-c" || flag_val == "-copy" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    if mode != TraceMode::MarkPath {
                        return Err(Error::new(
                            ErrorKind::InvalidInput,
                            "Specify just one of the copy, accumulate and count flags.",
                        ));
                    }
                    mode = TraceMode::CopyValues;
                }
            } else if flag_val == "-a" || flag_val == "-accumulate" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    if mode != TraceMode::MarkPath {
                        return Err(Error::new(
                            ErrorKind::InvalidInput,
                            "Specify just one of the copy, accumulate and count flags.",
                        ));
                    }
                    mode = TraceMode::AccumulateValues;
                }
            } else if flag_val == "-n" || flag_val == "-count" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    if mode != TraceMode::MarkPath {
                        return Err(Error::new(
                            ErrorKind::InvalidInput,
                            "Specify just one of the copy, accumulate and count flags.",
                        ));
                    }
                    mode = TraceMode::CountCells;
                }
            } else if flag_val == "-d" || flag_val == "-cost" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    cost_mode = true;
                }
            }
        }

        if cost_mode && indir_file.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Direction raster not specified; in cost mode a direction raster must be given.",
            ));
        }
        if !cost_mode && !indir_file.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "A direction raster should not be specified for hydrological drains.",
            ));
        }

        let sep: String = path::MAIN_SEPARATOR.to_string();
        let fix_path = |f: &mut String| {
            if !f.is_empty() && !f.contains(&sep) && !f.contains("/") {
                *f = format!("{}{}", working_directory, f);
            }
        };
        fix_path(&mut input_file);
        fix_path(&mut indir_file);
        fix_path(&mut output_file);
        fix_path(&mut vector_file);
        fix_path(&mut start_points_file);

        if verbose {
            println!("Reading data...")
        };
        let input = Raster::new(&input_file, "r")?;
        let rows = input.configs.rows as isize;
        let columns = input.configs.columns as isize;
        let nodata = input.configs.nodata;

        let start = Instant::now();

        // gather the seed cells
        let mut seeds: Vec<(isize, isize)> = vec![];
        if !start_coordinates.is_empty() {
            let coords = start_coordinates
                .split(",")
                .map(|s| s.trim().parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|_| {
                    Error::new(ErrorKind::InvalidInput, "Error parsing start coordinates.")
                })?;
            if coords.len() % 2 != 0 {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "Start coordinates must be given as x,y pairs.",
                ));
            }
            for pair in coords.chunks(2) {
                let col = input.get_column_from_x(pair[0]);
                let row = input.get_row_from_y(pair[1]);
                if row < 0 || row >= rows || col < 0 || col >= columns {
                    println!("Warning: starting point ({}, {}) is outside the current region.", pair[0], pair[1]);
                    continue;
                }
                seeds.push((row, col));
            }
        }
        if !start_points_file.is_empty() {
            let points = Shapefile::read(&start_points_file)?;
            if points.header.shape_type.base_shape_type() != ShapeType::Point {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "The start points file must be of a point base shape type.",
                ));
            }
            for record_num in 0..points.num_records {
                let record = points.get_record(record_num);
                let row = input.get_row_from_y(record.points[0].y);
                let col = input.get_column_from_x(record.points[0].x);
                if row < 0 || row >= rows || col < 0 || col >= columns {
                    continue;
                }
                seeds.push((row, col));
            }
        }
        if seeds.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "No start point(s) specified.",
            ));
        }

        let mut elev: Array2D<f64> = Array2D::new(rows, columns, nodata, nodata)?;
        for row in 0..rows {
            elev.set_row_data(row, input.get_row_data(row));
        }

        // determine the drainage paths
        let mut paths: Vec<Vec<(isize, isize)>> = Vec::with_capacity(seeds.len());
        if !cost_mode {
            if verbose {
                println!("Calculating flow directions...");
            }
            // fill one-cell pits and take a first stab at flow directions,
            // then resolve the ambiguous cases
            let metrics = row_metrics(&input.configs, input.is_in_geographic_coordinates());
            fill_single_cell_pits(&mut elev, nodata);
            let mut dir: Array2D<i32> = Array2D::new(rows, columns, 0, DIR_NULL)?;
            initial_directions(&elev, &metrics, nodata, &mut dir);
            resolve_flat_directions(&mut dir, verbose);

            for seed in &seeds {
                paths.push(trace_hydrological(&dir, *seed)?);
            }
        } else {
            let indir = Raster::new(&indir_file, "r")?;
            if indir.configs.rows as isize != rows || indir.configs.columns as isize != columns {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    "The input files must have the same number of rows and columns.",
                ));
            }
            let dir_nodata = indir.configs.nodata;
            let mut dirmap: Array2D<f64> = Array2D::new(rows, columns, dir_nodata, dir_nodata)?;
            for row in 0..rows {
                dirmap.set_row_data(row, indir.get_row_data(row));
            }
            for seed in &seeds {
                paths.push(trace_cost_surface(&dirmap, dir_nodata, *seed)?);
            }
        }

        let traced = paths_to_values(&paths, &elev, nodata, mode);

        // build the output raster; later traces overwrite earlier ones
        let mut output = Raster::initialize_using_file(&output_file, &input);
        output.configs.data_type = match mode {
            TraceMode::MarkPath | TraceMode::CountCells => DataType::I32,
            _ => input.configs.data_type,
        };
        for path in &traced {
            for &(row, col, value) in path {
                output.set_value(row, col, value);
            }
        }

        let elapsed_time = get_formatted_elapsed_time(start);
        output.add_metadata_entry(format!(
            "Created by terraflow_tools' {} tool",
            self.get_tool_name()
        ));
        output.add_metadata_entry(format!("Input file: {}", input_file));
        output.add_metadata_entry(format!("Elapsed Time (excluding I/O): {}", elapsed_time));

        if verbose {
            println!("Saving data...")
        };
        output.write()?;

        // output a vector path per trace
        if !vector_file.is_empty() {
            let mut vout = Shapefile::new(&vector_file, ShapeType::PolyLine)?;
            vout.attributes.add_field(&AttributeField::new(
                "FID",
                FieldDataType::Int,
                10u8,
                0u8,
            ));
            let mut fid = 1;
            for path in &paths {
                if path.len() < 2 {
                    continue;
                }
                let points: Vec<Point2D> = path
                    .iter()
                    .map(|&(row, col)| {
                        Point2D::new(input.get_x_from_column(col), input.get_y_from_row(row))
                    })
                    .collect();
                let mut sfg = ShapefileGeometry::new(ShapeType::PolyLine);
                sfg.add_part(&points);
                vout.add_record(sfg);
                vout.attributes.add_record(vec![FieldData::Int(fid)], false);
                fid += 1;
            }
            if vout.num_records > 0 {
                vout.write()?;
            }
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

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_trace_follows_power_of_two_codes() {
        // a 4x4 grid that routes (0,0) -> E -> SE -> S -> stop
        let mut dir: Array2D<i32> = Array2D::new(4, 4, 0, DIR_NULL).unwrap();
        dir.set_value(0, 0, 2); // E
        dir.set_value(0, 1, 4); // SE
        dir.set_value(1, 2, 8); // S
        dir.set_value(2, 2, 0); // unresolved: stop
        let path = trace_hydrological(&dir, (0, 0)).unwrap();
        assert_eq!(path, vec![(0, 0), (0, 1), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_trace_stops_at_map_edge() {
        let mut dir: Array2D<i32> = Array2D::new(3, 3, 0, DIR_NULL).unwrap();
        dir.set_value(1, 1, 128); // N
        dir.set_value(0, 1, 128); // N, off the map
        let path = trace_hydrological(&dir, (1, 1)).unwrap();
        assert_eq!(path, vec![(1, 1), (0, 1)]);
    }

    #[test]
    fn test_trace_never_revisits_a_cell() {
        let mut dir: Array2D<i32> = Array2D::new(5, 5, 0, DIR_NULL).unwrap();
        for col in 0..4 {
            dir.set_value(2, col, 2); // E across the row
        }
        let path = trace_hydrological(&dir, (2, 0)).unwrap();
        let mut seen = std::collections::HashSet::new();
        for cell in &path {
            assert!(seen.insert(*cell), "cell {:?} revisited", cell);
        }
    }

    #[test]
    fn test_trace_detects_cycles() {
        let mut dir: Array2D<i32> = Array2D::new(3, 3, 0, DIR_NULL).unwrap();
        dir.set_value(1, 1, 2); // E
        dir.set_value(1, 2, 32); // W, back again
        assert!(trace_hydrological(&dir, (1, 1)).is_err());
    }

    #[test]
    fn test_cost_surface_knights_move() {
        let nodata = -9999.0;
        let mut dir: Array2D<f64> = Array2D::new(6, 6, nodata, nodata).unwrap();
        dir.set_value(4, 1, 22.5); // ENE: one up, two right
        dir.set_value(3, 3, 67.5); // NNE: two up, one right
        let path = trace_cost_surface(&dir, nodata, (4, 1)).unwrap();
        assert_eq!(path, vec![(4, 1), (3, 3), (1, 4)]);
    }

    #[test]
    fn test_accumulate_and_count_modes() {
        let nodata = -9999.0;
        let mut input: Array2D<f64> = Array2D::new(1, 4, 0.0, nodata).unwrap();
        for col in 0..4 {
            input.set_value(0, col, (col + 1) as f64);
        }
        let paths = vec![vec![(0isize, 0isize), (0, 1), (0, 2), (0, 3)]];

        let acc = paths_to_values(&paths, &input, nodata, TraceMode::AccumulateValues);
        let acc_vals: Vec<f64> = acc[0].iter().map(|v| v.2).collect();
        assert_eq!(acc_vals, vec![1.0, 3.0, 6.0, 10.0]);

        let cnt = paths_to_values(&paths, &input, nodata, TraceMode::CountCells);
        let cnt_vals: Vec<f64> = cnt[0].iter().map(|v| v.2).collect();
        assert_eq!(cnt_vals, vec![1.0, 2.0, 3.0, 4.0]);

        let cpy = paths_to_values(&paths, &input, nodata, TraceMode::CopyValues);
        let cpy_vals: Vec<f64> = cpy[0].iter().map(|v| v.2).collect();
        assert_eq!(cpy_vals, vec![1.0, 2.0, 3.0, 4.0]);
    }
}
