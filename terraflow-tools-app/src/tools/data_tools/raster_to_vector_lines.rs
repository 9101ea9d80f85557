/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

use crate::tools::data_tools::coor_skeleton::{CoorArena, LineKind, Walk};
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

/// One finished polyline: cell-center points and the category carried.
pub(crate) struct TracedLine {
    pub points: Vec<(isize, isize)>,
    pub cat: i32,
    pub value: f64,
}

#[derive(Clone, Copy, Default)]
struct LineHdr {
    left: Option<usize>,
    center: Option<usize>,
    right: Option<usize>,
}

/// Traces a thinned raster into polylines with a three-row sweep. For
/// every non-null cell of the middle row the 3x3 neighbourhood decides
/// whether a line starts, ends, bends, passes straight through or meets a
/// junction; chains under construction hang off the per-column headers
/// (`v_list`, one slot each for lines approaching from the upper-left,
/// directly above and upper-right) and the horizontal header `h_ptr`.
pub(crate) struct LineTracer {
    arena: CoorArena,
    v_list: Vec<LineHdr>,
    h_ptr: Option<usize>,
    row: isize,
    col: isize,
    top: Vec<f64>,
    middle: Vec<f64>,
    bottom: Vec<f64>,
    nodata: f64,
    value_flag: bool,
    is_cell_type: bool,
    count: i32,
    pub lines: Vec<TracedLine>,
}

// neighbour presence in the 3x3 window around the middle cell
#[derive(Clone, Copy)]
struct Nbrs {
    tl: bool,
    tc: bool,
    tr: bool,
    ml: bool,
    mr: bool,
    bl: bool,
    bc: bool,
    br: bool,
}

impl Nbrs {
    fn count(&self) -> usize {
        [
            self.tl, self.tc, self.tr, self.ml, self.mr, self.bl, self.bc, self.br,
        ]
        .iter()
        .filter(|v| **v)
        .count()
    }
}

impl LineTracer {
    pub fn new(columns: usize, nodata: f64, value_flag: bool, is_cell_type: bool) -> LineTracer {
        LineTracer {
            arena: CoorArena::default(),
            v_list: vec![LineHdr::default(); columns + 2],
            h_ptr: None,
            row: 0,
            col: 0,
            top: vec![],
            middle: vec![],
            bottom: vec![],
            nodata,
            value_flag,
            is_cell_type,
            count: 1,
            lines: vec![],
        }
    }

    pub fn extract(&mut self, input: &Raster) -> Result<(), Error> {
        let rows = input.configs.rows as isize;
        let columns = input.configs.columns as isize;
        let scan_length = columns as usize + 2;
        let input_nodata = input.configs.nodata;
        let nodata = self.nodata;

        let padded_row = move |r: isize| -> Vec<f64> {
            let mut buf = vec![nodata; scan_length];
            if r >= 0 && r < rows {
                for c in 0..columns {
                    let z = input.get_value(r, c);
                    if z != input_nodata {
                        buf[c as usize + 1] = z;
                    }
                }
            }
            buf
        };

        self.top = padded_row(-2);
        self.middle = padded_row(-1);
        for r in 0..=rows {
            self.bottom = padded_row(r);
            self.row = r - 1;
            if self.row >= 0 {
                for col in 1..scan_length - 1 {
                    self.col = col as isize;
                    if self.middle[col] == self.nodata {
                        continue;
                    }
                    let nd = self.nodata;
                    let nbrs = Nbrs {
                        tl: self.top[col - 1] != nd,
                        tc: self.top[col] != nd,
                        tr: self.top[col + 1] != nd,
                        ml: self.middle[col - 1] != nd,
                        mr: self.middle[col + 1] != nd,
                        bl: self.bottom[col - 1] != nd,
                        bc: self.bottom[col] != nd,
                        br: self.bottom[col + 1] != nd,
                    };
                    self.update_list(&nbrs, input)?;
                }
            }
            self.top = std::mem::take(&mut self.middle);
            self.middle = std::mem::take(&mut self.bottom);
        }

        if self.arena.live_count() > 0 {
            println!(
                "Warning: {} line point(s) were left in unfinished chains.",
                self.arena.live_count()
            );
        }
        Ok(())
    }

    fn mc_val(&self) -> (i32, f64) {
        let v = self.middle[self.col as usize];
        (v as i32, v)
    }

    fn get_ptr(&mut self) -> usize {
        let (val, dval) = self.mc_val();
        let idx = self.arena.alloc(self.row, self.col - 1);
        let node = self.arena.get_mut(idx);
        node.val = val;
        node.dval = dval;
        idx
    }

    fn start_line(&mut self, node: bool) -> Option<usize> {
        let p1 = self.get_ptr();
        let p2 = self.get_ptr();
        self.arena.get_mut(p1).bptr = Some(p1);
        self.arena.get_mut(p1).fptr = Some(p2);
        self.arena.get_mut(p1).node = node;
        self.arena.get_mut(p2).bptr = Some(p1);
        Some(p2)
    }

    fn end_line(&mut self, ptr: Option<usize>, node: bool) -> Option<usize> {
        let idx = ptr.expect("end_line called with no line under construction");
        let (val, dval) = self.mc_val();
        {
            let p = self.arena.get_mut(idx);
            p.row = self.row;
            p.col = self.col - 1;
            p.node = node;
            p.val = val;
            p.dval = dval;
            p.fptr = Some(idx);
        }
        self.write_line(idx);
        None
    }

    fn extend_line(&mut self, ptr: Option<usize>, q: usize) {
        let p = match ptr {
            Some(p) => p,
            None => {
                // should never happen by the logic of the algorithm
                println!("Warning: extend_line: no line under construction.");
                self.start_line(true).unwrap()
            }
        };
        let (val, dval) = self.mc_val();
        {
            let pn = self.arena.get_mut(p);
            pn.row = self.row;
            pn.col = self.col - 1;
            pn.val = val;
            pn.dval = dval;
            pn.fptr = Some(q);
        }
        self.arena.get_mut(q).bptr = Some(p);
    }

    fn join_lines(&mut self, p: Option<usize>, q: Option<usize>) {
        let p = p.expect("join_lines: p is missing");
        let q = q.expect("join_lines: q is missing");
        let (val, dval) = self.mc_val();
        let q_pred = self.arena.get(q).bptr.expect("join_lines: q has no back link");
        {
            let pn = self.arena.get_mut(p);
            pn.row = self.row;
            pn.col = self.col - 1;
            pn.val = val;
            pn.dval = dval;
            pn.fptr = Some(q_pred);
        }
        if self.arena.get(q_pred).fptr == Some(q) {
            self.arena.get_mut(q_pred).fptr = Some(p);
        } else {
            self.arena.get_mut(q_pred).bptr = Some(p);
        }
        self.arena.retire(q);
        self.write_line(p);
    }

    fn update_list(&mut self, n: &Nbrs, input: &Raster) -> Result<(), Error> {
        let col = self.col as usize;
        match n.count() {
            0 => {} // isolated cell
            1 => {
                // begin or end a line
                if n.ml {
                    self.h_ptr = self.end_line(self.h_ptr, false);
                }
                if n.tl {
                    self.v_list[col].left = self.end_line(self.v_list[col].left, false);
                }
                if n.tc {
                    self.v_list[col].center = self.end_line(self.v_list[col].center, false);
                }
                if n.tr {
                    self.v_list[col].right = self.end_line(self.v_list[col].right, false);
                }
                if n.mr {
                    self.h_ptr = self.start_line(false);
                }
                if n.br {
                    self.v_list[col + 1].left = self.start_line(false);
                }
                if n.bc {
                    self.v_list[col].center = self.start_line(false);
                }
                if n.bl {
                    self.v_list[col - 1].right = self.start_line(false);
                }
            }
            2 => self.two_neighbours(n),
            3..=6 => {
                // a junction: end all incoming lines, start all outgoing
                // ones (diagonals only where no cardinal line takes over)
                if n.count() != 3 || (n.ml || n.tl || n.tc || (n.tr && !n.mr)) {
                    if n.ml {
                        self.h_ptr = self.end_line(self.h_ptr, true);
                    }
                    if n.tc {
                        self.v_list[col].center = self.end_line(self.v_list[col].center, true);
                    }
                    if n.tl && !n.ml && !n.tc {
                        self.v_list[col].left = self.end_line(self.v_list[col].left, true);
                    }
                    if n.tr && !n.mr && !n.tc {
                        self.v_list[col].right = self.end_line(self.v_list[col].right, true);
                    }
                }
                if n.mr {
                    self.h_ptr = self.start_line(true);
                }
                if n.bc {
                    self.v_list[col].center = self.start_line(true);
                }
                if n.br && !n.mr && !n.bc {
                    self.v_list[col + 1].left = self.start_line(true);
                }
                if n.bl && !n.ml && !n.bc {
                    self.v_list[col - 1].right = self.start_line(true);
                }
            }
            _ => {
                let x = input.configs.west
                    + (self.col as f64 - 0.5) * input.configs.resolution_x;
                let y = input.configs.north
                    - (self.row as f64 + 0.5) * input.configs.resolution_y;
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!(
                        "Crowded cell at ({}, {}): row {}, col {}, count {}. \
                         The raster map is not thinned properly; please thin it first.",
                        x,
                        y,
                        self.row,
                        self.col - 1,
                        n.count()
                    ),
                ));
            }
        }
        Ok(())
    }

    fn two_neighbours(&mut self, n: &Nbrs) {
        let col = self.col as usize;
        if n.tl && n.br {
            // slanted line (\)
            if self.value_flag && self.is_cell_type {
                let mc_val = self.middle[col] as i32;
                let br_val = self.bottom[col + 1] as i32;
                let tl_val = self.top[col - 1] as i32;
                if tl_val != mc_val || mc_val != br_val {
                    self.v_list[col].left = self.end_line(self.v_list[col].left, true);
                    self.v_list[col].left = self.start_line(false);
                }
            }
            self.v_list[col + 1].left = self.v_list[col].left;
            self.v_list[col].left = None;
        } else if n.tr && n.bl {
            // slanted line (/)
            if self.value_flag && self.is_cell_type {
                let mc_val = self.middle[col] as i32;
                let bl_val = self.bottom[col - 1] as i32;
                let tr_val = self.top[col + 1] as i32;
                if tr_val != mc_val || mc_val != bl_val {
                    self.v_list[col].right = self.end_line(self.v_list[col].right, true);
                    self.v_list[col].right = self.start_line(false);
                }
            }
            self.v_list[col - 1].right = self.v_list[col].right;
            self.v_list[col].right = None;
        } else if n.ml && n.tc {
            // bend (_|)
            self.join_lines(self.h_ptr, self.v_list[col].center);
            self.h_ptr = None;
            self.v_list[col].center = None;
        } else if n.ml && n.tr {
            // bend (_/)
            self.join_lines(self.h_ptr, self.v_list[col].right);
            self.h_ptr = None;
            self.v_list[col].right = None;
            self.v_list[col].left = None;
        } else if n.tl && n.tr {
            // bend (\/)
            self.join_lines(self.v_list[col].left, self.v_list[col].right);
            self.v_list[col].left = None;
            self.v_list[col].right = None;
        } else if n.tl && n.tc {
            // bend (\|)
            self.v_list[col].center = self.end_line(self.v_list[col].center, true);
        } else if n.tr && n.tc {
            // bend (|/)
            self.v_list[col].center = self.end_line(self.v_list[col].center, true);
        } else if n.tl && n.ml {
            self.h_ptr = self.end_line(self.h_ptr, true);
        } else if n.bl && n.ml {
            self.v_list[col].center = self.start_line(true);
        } else if n.tr && n.mr {
            self.h_ptr = self.start_line(true);
        } else if !((n.tc && n.bc) || (n.ml && n.mr)) {
            // not a straight horizontal or vertical run
            if n.ml || n.tl || n.tc || n.tr {
                // the old line bends toward a new area
                let new_ptr1 = self.get_ptr();
                if n.ml {
                    let h = self.h_ptr;
                    self.extend_line(h, new_ptr1);
                    self.h_ptr = None;
                } else if n.tl {
                    let p = self.v_list[col].left;
                    self.extend_line(p, new_ptr1);
                    self.v_list[col].left = None;
                } else if n.tc {
                    let p = self.v_list[col].center;
                    self.extend_line(p, new_ptr1);
                    self.v_list[col].center = None;
                } else {
                    // tr
                    let p = self.v_list[col].right;
                    self.extend_line(p, new_ptr1);
                    self.v_list[col].right = None;
                }

                // find out where it is going
                if n.mr {
                    self.h_ptr = Some(new_ptr1);
                } else if n.br {
                    self.v_list[col + 1].left = Some(new_ptr1);
                } else if n.bc {
                    self.v_list[col].center = Some(new_ptr1);
                } else {
                    // bl
                    self.v_list[col - 1].right = Some(new_ptr1);
                }
            } else {
                // both neighbours are in the lower half
                if n.mr && n.br {
                    self.h_ptr = self.start_line(true);
                } else if (n.br && n.bc) || (n.bl && n.bc) {
                    self.v_list[col].center = self.start_line(true);
                } else {
                    // the neighbours are not adjacent: starting in the
                    // middle of a line
                    let p1 = self.get_ptr();
                    let p2 = self.get_ptr();
                    let p3 = self.get_ptr();
                    self.arena.get_mut(p1).fptr = Some(p2);
                    self.arena.get_mut(p1).bptr = Some(p3);
                    self.arena.get_mut(p2).bptr = Some(p1);
                    self.arena.get_mut(p3).bptr = Some(p1);

                    if n.mr && n.bc {
                        self.h_ptr = Some(p2);
                        self.v_list[col].center = Some(p3);
                    } else if n.mr && n.bl {
                        self.h_ptr = Some(p2);
                        self.v_list[col - 1].right = Some(p3);
                    } else if n.bl && n.br {
                        self.v_list[col - 1].right = Some(p3);
                        self.v_list[col + 1].left = Some(p2);
                    }
                }
            }
        } else if self.value_flag && self.is_cell_type {
            // a straight horizontal or vertical run: split it where the
            // category value changes
            let mc_val = self.middle[col] as i32;
            let ml_val = self.middle[col - 1] as i32;
            let mr_val = self.middle[col + 1] as i32;
            let tc_val = self.top[col] as i32;
            let bc_val = self.bottom[col] as i32;

            if n.mr && mc_val != mr_val {
                self.h_ptr = self.end_line(self.h_ptr, true);
                self.h_ptr = self.start_line(true);
            } else if n.bc && mc_val != bc_val {
                self.v_list[col].center = self.end_line(self.v_list[col].center, true);
                self.v_list[col].center = self.start_line(true);
            }

            if n.ml && mc_val != ml_val {
                if let Some(h) = self.h_ptr {
                    let pred = self.arena.get(h).bptr.unwrap();
                    self.arena.get_mut(pred).val = mc_val;
                }
            } else if n.tc && mc_val != tc_val {
                if let Some(v) = self.v_list[col].center {
                    let pred = self.arena.get(v).bptr.unwrap();
                    self.arena.get_mut(pred).val = mc_val;
                }
            }
        }
    }

    /// Attempts to write a line; returns quietly when it is not complete.
    fn write_line(&mut self, seed: usize) {
        let (begin, n) = match self.arena.at_end(seed) {
            Some(walk) => {
                let mut steps = 0;
                let (_, kind) = self.arena.find_end(seed, walk, &mut steps);
                if kind == LineKind::Open {
                    return;
                }
                (seed, steps)
            }
            None => {
                let mut fwd_steps = 0;
                let (_, kind) = self.arena.find_end(seed, Walk::Forward, &mut fwd_steps);
                match kind {
                    LineKind::Open => return,
                    LineKind::End => {
                        let mut back_steps = 0;
                        let (begin, kind2) =
                            self.arena.find_end(seed, Walk::Backward, &mut back_steps);
                        if kind2 != LineKind::End {
                            return; // found half a loop
                        }
                        (begin.unwrap(), fwd_steps + back_steps)
                    }
                    LineKind::Loop => (seed, fwd_steps),
                }
            }
        };

        let walk = self.arena.at_end(begin).unwrap_or(Walk::Forward);
        let traced = self.arena.collect_with_values(begin, walk, n);

        // carry the category: sequential, the raster value at the start,
        // or split so each output line has a uniform value
        let mut points: Vec<(isize, isize)> = vec![(traced[0].0, traced[0].1)];
        let mut cat = if self.value_flag {
            traced[0].2
        } else {
            self.count
        };
        let mut value = traced[0].3;
        for item in traced.iter().skip(1) {
            let (r, c, val, dval) = *item;
            if self.value_flag && val != cat {
                points.push((r, c));
                self.lines.push(TracedLine {
                    points: std::mem::take(&mut points),
                    cat,
                    value,
                });
                cat = val;
                value = dval;
            }
            points.push((r, c));
        }
        if points.len() > 1 {
            self.lines.push(TracedLine { points, cat, value });
        }
        self.count += 1;
    }
}

/// This tool converts a thinned raster (every run at most one cell wide)
/// into vector polylines, one per connected chain, with junctions
/// resolved into nodes where lines meet. A cell with a single non-null
/// neighbour starts or ends a line; two neighbours continue, bend or
/// cross it; three to five neighbours form a junction that ends every
/// incoming line and starts the outgoing ones. A cell with more
/// neighbours than that means the raster was not properly thinned, which
/// is a fatal error. Line categories are sequential, or with `--value`
/// taken from the raster (splitting lines wherever the value changes).
pub struct RasterToVectorLines {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl RasterToVectorLines {
    pub fn new() -> RasterToVectorLines {
        // public constructor
        let name = "RasterToVectorLines".to_string();
        let toolbox = "Data Tools".to_string();
        let description =
            "Converts a thinned raster to vector polylines with junction nodes.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Input Raster File".to_owned(),
            flags: vec!["-i".to_owned(), "--input".to_owned()],
            description: "Input thinned raster file.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Output Vector File".to_owned(),
            flags: vec!["-o".to_owned(), "--output".to_owned()],
            description: "Output vector line file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Vector(
                VectorGeometryType::Line,
            )),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Use raster values as categories?".to_owned(),
            flags: vec!["-v".to_owned(), "--value".to_owned()],
            description:
                "Use raster values as line categories, splitting lines where the value changes."
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
            ">>.*{0} -r={1} -v --wd=\"*path*to*data*\" -i=streams.asc -o=streams.shp",
            short_exe, name
        )
        .replace("*", &sep);

        RasterToVectorLines {
            name: name,
            description: description,
            toolbox: toolbox,
            parameters: parameters,
            example_usage: usage,
        }
    }
}

impl TerraflowTool for RasterToVectorLines {
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
        let columns = input.configs.columns;
        let west = input.configs.west;
        let north = input.configs.north;
        let res_x = input.configs.resolution_x;
        let res_y = input.configs.resolution_y;
        let is_cell_type = input.configs.data_type == DataType::I32;

        let start = Instant::now();
        if verbose {
            println!("Extracting lines...");
        }
        let mut tracer = LineTracer::new(columns, input.configs.nodata, value_flag, is_cell_type);
        tracer.extract(&input)?;

        let mut vout = Shapefile::new(&output_file, ShapeType::PolyLine)?;
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
        for (i, line) in tracer.lines.iter().enumerate() {
            let points: Vec<Point2D> = line
                .points
                .iter()
                .map(|&(r, c)| {
                    Point2D::new(
                        west + (c as f64 + 0.5) * res_x,
                        north - (r as f64 + 0.5) * res_y,
                    )
                })
                .collect();
            let mut sfg = ShapefileGeometry::new(ShapeType::PolyLine);
            sfg.add_part(&points);
            vout.add_record(sfg);
            vout.attributes.add_record(
                vec![
                    FieldData::Int(i as i32 + 1),
                    FieldData::Int(line.cat),
                    FieldData::Real(line.value),
                ],
                false,
            );
        }

        let elapsed_time = get_formatted_elapsed_time(start);
        if verbose {
            println!("Saving data...")
        };
        if vout.num_records > 0 {
            vout.write()?;
        } else {
            println!("Warning: the input raster contains no lines.");
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

    const N: f64 = -9999.0;

    fn raster_from(vals: &[f64], rows: usize, columns: usize) -> Raster {
        let configs = RasterConfigs {
            rows,
            columns,
            north: rows as f64,
            south: 0.0,
            east: columns as f64,
            west: 0.0,
            resolution_x: 1.0,
            resolution_y: 1.0,
            nodata: N,
            data_type: DataType::I32,
            ..Default::default()
        };
        let mut r = Raster::initialize_using_config("test.asc", &configs);
        for row in 0..rows {
            for col in 0..columns {
                r.set_value(row as isize, col as isize, vals[row * columns + col]);
            }
        }
        r
    }

    fn trace(vals: &[f64], rows: usize, columns: usize, value_flag: bool) -> LineTracer {
        let input = raster_from(vals, rows, columns);
        let mut tracer = LineTracer::new(columns, N, value_flag, true);
        tracer.extract(&input).unwrap();
        tracer
    }

    #[test]
    fn test_straight_horizontal_line() {
        let vals = [
            N, N, N, //
            1.0, 1.0, 1.0, //
            N, N, N,
        ];
        let tracer = trace(&vals, 3, 3, false);
        assert_eq!(tracer.lines.len(), 1);
        // bends only: the straight run keeps just its two endpoints
        let mut pts = tracer.lines[0].points.clone();
        pts.sort();
        assert_eq!(pts, vec![(1, 0), (1, 2)]);
    }

    #[test]
    fn test_l_bend_records_the_corner() {
        let vals = [
            1.0, N, N, //
            1.0, 1.0, N, //
            N, N, N,
        ];
        let tracer = trace(&vals, 3, 3, false);
        assert_eq!(tracer.lines.len(), 1);
        let pts = &tracer.lines[0].points;
        assert!(
            *pts == vec![(0, 0), (1, 0), (1, 1)] || *pts == vec![(1, 1), (1, 0), (0, 0)],
            "got {:?}",
            pts
        );
    }

    #[test]
    fn test_diagonal_line() {
        let vals = [
            1.0, N, N, //
            N, 1.0, N, //
            N, N, 1.0,
        ];
        let tracer = trace(&vals, 3, 3, false);
        assert_eq!(tracer.lines.len(), 1);
        let mut pts = tracer.lines[0].points.clone();
        pts.sort();
        assert_eq!(pts, vec![(0, 0), (2, 2)]);
    }

    #[test]
    fn test_t_junction_splits_lines_at_the_node() {
        // the T:   . X .
        //          . X .
        //          X X X
        let vals = [
            N, 1.0, N, //
            N, 1.0, N, //
            1.0, 1.0, 1.0,
        ];
        let tracer = trace(&vals, 3, 3, false);
        // every line ends at a junction: four segments meet at (2,1)
        // and at the pass-through cell (1,1)
        let mut endpoints: Vec<((isize, isize), (isize, isize))> = tracer
            .lines
            .iter()
            .map(|l| (*l.points.first().unwrap(), *l.points.last().unwrap()))
            .collect();
        endpoints.sort();
        assert_eq!(tracer.lines.len(), 4);
        let touches_junction = |e: &((isize, isize), (isize, isize))| {
            e.0 == (2, 1) || e.1 == (2, 1)
        };
        assert_eq!(endpoints.iter().filter(|e| touches_junction(e)).count(), 3);
        // the union of all segments covers the five cells
        let mut cells: Vec<(isize, isize)> = tracer
            .lines
            .iter()
            .flat_map(|l| l.points.iter().copied())
            .collect();
        cells.sort();
        cells.dedup();
        assert_eq!(cells, vec![(0, 1), (1, 1), (2, 0), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_unthinned_raster_is_fatal() {
        let vals = [
            1.0, 1.0, 1.0, //
            1.0, 1.0, 1.0, //
            1.0, 1.0, 1.0,
        ];
        let input = raster_from(&vals, 3, 3);
        let mut tracer = LineTracer::new(3, N, false, true);
        assert!(tracer.extract(&input).is_err());
    }

    #[test]
    fn test_value_preserving_split() {
        // a horizontal line whose value changes midway
        let vals = [
            N, N, N, N, //
            7.0, 7.0, 9.0, 9.0, //
            N, N, N, N,
        ];
        let tracer = trace(&vals, 3, 4, true);
        assert_eq!(tracer.lines.len(), 2);
        let mut cats: Vec<i32> = tracer.lines.iter().map(|l| l.cat).collect();
        cats.sort();
        assert_eq!(cats, vec![7, 9]);
        // the two lines share the split point
        let all_pts: Vec<Vec<(isize, isize)>> =
            tracer.lines.iter().map(|l| l.points.clone()).collect();
        assert!(all_pts.iter().any(|p| p.contains(&(1, 0))));
        assert!(all_pts.iter().any(|p| p.contains(&(1, 3))));
    }
}
