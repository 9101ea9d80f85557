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
use terraflow_common::structures::{Array2D, Point2D};
use terraflow_common::utils::get_formatted_elapsed_time;
use terraflow_raster::*;
use terraflow_vector::{AttributeField, FieldData, FieldDataType, ShapeType, Shapefile, ShapefileGeometry};

const DEG2RAD: f64 = std::f64::consts::PI / 180.0;

// indices into the bounding box and epsilon tables
const COL: usize = 0;
const ROW: usize = 1;
const VERT: usize = 0;
const HORIZ: usize = 1;
const SOUTH: usize = 0;
const NORTH: usize = 1;
const WEST: usize = 0;
const EAST: usize = 1;

/// A moving point on a flowline: exact map coordinates, interpolated
/// elevation and aspect, and fractional cell coordinates.
#[derive(Clone, Copy, Debug)]
struct FlowPoint {
    x: f64,
    y: f64,
    z: f64,
    theta: f64,
    r: f64,
    c: f64,
}

/// The owned state of one flowline run. The elevation grid carries a
/// one-cell extrapolated border so bilinear interpolation stays defined at
/// the map edges.
pub(crate) struct FlowlineContext {
    rows: isize,
    columns: isize,
    ns_res: f64,
    north: f64,
    west: f64,
    nodata: f64,
    el: Array2D<f64>,           // padded by one cell on each side
    aspect: Array2D<f64>,       // degrees clockwise from north; nodata = undefined
    barrier: Option<Array2D<i8>>,
    ew_dist: Vec<f64>,
    epsilon: [Vec<f64>; 2],
    up: bool,
    l3d: bool,
    bound: usize,
    pub density: Array2D<i32>,
    pub lengths: Array2D<f64>,
}

impl FlowlineContext {
    pub fn new(
        input: &Raster,
        aspect_input: Option<&Raster>,
        barrier_input: Option<&Raster>,
        up: bool,
        l3d: bool,
        bound: usize,
    ) -> Result<FlowlineContext, Error> {
        if input.is_in_geographic_coordinates() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Lat/long regions are not supported for flowline integration; \
                 use the flow accumulation tool instead.",
            ));
        }
        let rows = input.configs.rows as isize;
        let columns = input.configs.columns as isize;
        let nodata = input.configs.nodata;

        let mut el: Array2D<f64> = Array2D::new(rows + 2, columns + 2, nodata, nodata)?;
        for row in 0..rows {
            for col in 0..columns {
                let z = input.get_value(row, col);
                if z != nodata {
                    el.set_value(row + 1, col + 1, if up { -z } else { z });
                }
            }
        }

        let aspect = match aspect_input {
            Some(asp_raster) => {
                // re-orient the published aspect convention (degrees CCW
                // from east, zero meaning undefined) into degrees CW from
                // north
                let asp_nodata = asp_raster.configs.nodata;
                let mut a: Array2D<f64> = Array2D::new(rows, columns, nodata, nodata)?;
                for row in 0..rows {
                    for col in 0..columns {
                        let mut v = asp_raster.get_value(row, col);
                        if v == asp_nodata || v == 0f64 {
                            continue;
                        }
                        if up {
                            // rotation of 180 degrees
                            v = if v <= 180.0 { v + 180.0 } else { v - 180.0 };
                        }
                        let reoriented = if v < 90.0 { 90.0 - v } else { 450.0 - v };
                        a.set_value(row, col, reoriented);
                    }
                }
                a
            }
            None => Array2D::new(rows, columns, nodata, nodata)?,
        };

        let barrier = match barrier_input {
            Some(b) => {
                let b_nodata = b.configs.nodata;
                let mut bar: Array2D<i8> = Array2D::new(rows, columns, 0, 0)?;
                for row in 0..rows {
                    for col in 0..columns {
                        let v = b.get_value(row, col);
                        if v != b_nodata && v != 0f64 {
                            bar.set_value(row, col, 1);
                        }
                    }
                }
                Some(bar)
            }
            None => None,
        };

        let ew_dist = vec![input.configs.resolution_x; rows as usize];
        let density = Array2D::new(rows, columns, 0, 0)?;
        let lengths = Array2D::new(rows, columns, nodata, nodata)?;

        let mut ctx = FlowlineContext {
            rows,
            columns,
            ns_res: input.configs.resolution_y,
            north: input.configs.north,
            west: input.configs.west,
            nodata,
            el,
            aspect,
            barrier,
            ew_dist,
            epsilon: [vec![], vec![]],
            up,
            l3d,
            bound,
            density,
            lengths,
        };
        ctx.precompute_epsilons()?;
        ctx.interpolate_border();
        if aspect_input.is_none() {
            ctx.precompute_aspects();
        }
        Ok(ctx)
    }

    fn elev(&self, row: isize, col: isize) -> f64 {
        self.el.get_value(row + 1, col + 1)
    }

    fn set_elev(&mut self, row: isize, col: isize, value: f64) {
        self.el.set_value(row + 1, col + 1, value);
    }

    /// Per-row quantization tolerances. A trajectory within half a degree
    /// of horizontal or vertical is snapped exactly onto the cell boundary
    /// so near-axis flowlines cannot oscillate between rows or columns.
    fn precompute_epsilons(&mut self) -> Result<(), Error> {
        let half_deg = 0.5 * DEG2RAD;
        for row in 0..self.rows as usize {
            let mut x = self.ew_dist[row];
            let mut y = self.ns_res;
            if x < y {
                std::mem::swap(&mut x, &mut y);
            }
            let a = y.atan2(x);
            if a <= half_deg {
                return Err(Error::new(
                    ErrorKind::InvalidInput,
                    format!(
                        "Resolution too unbalanced ({} x {}); please resample the input map.",
                        x, y
                    ),
                ));
            }
            self.epsilon[HORIZ].push(y / (a - half_deg).tan() - x);
            self.epsilon[VERT].push(x * (a + half_deg).tan() - y);
        }
        Ok(())
    }

    /// Extends the elevation surface one cell beyond the map edges by
    /// linear extrapolation.
    fn interpolate_border(&mut self) {
        let r = self.rows;
        let c = self.columns;
        for i in 0..c {
            let v = self.elev(0, i) * 2.0 - self.elev(1, i);
            self.set_elev(-1, i, v);
            let v = self.elev(r - 1, i) * 2.0 - self.elev(r - 2, i);
            self.set_elev(r, i, v);
        }
        for i in 0..r {
            let v = self.elev(i, 0) * 2.0 - self.elev(i, 1);
            self.set_elev(i, -1, v);
            let v = self.elev(i, c - 1) * 2.0 - self.elev(i, c - 2);
            self.set_elev(i, c, v);
        }
        let v = 3.0 * self.elev(0, 0) - self.elev(0, 1) - self.elev(1, 0);
        self.set_elev(-1, -1, v);
        let v = 3.0 * self.elev(0, c - 1) - self.elev(0, c - 2) - self.elev(1, c - 1);
        self.set_elev(-1, c, v);
        let v = 3.0 * self.elev(r - 1, 0) - self.elev(r - 2, 0) - self.elev(r - 1, 1);
        self.set_elev(r, -1, v);
        let v = 3.0 * self.elev(r - 1, c - 1) - self.elev(r - 2, c - 1) - self.elev(r - 1, c - 2);
        self.set_elev(r, c, v);
    }

    /// Aspect in degrees CW from north from central differences on the
    /// 3x3 neighbourhood, or nodata on perfectly level ground.
    fn aspect_fly(&self, row: isize, col: isize) -> f64 {
        let d = self.ew_dist[row.clamp(0, self.rows - 1) as usize];
        let n = |c: isize| self.elev(row - 1, c);
        let m = |c: isize| self.elev(row, c);
        let s = |c: isize| self.elev(row + 1, c);
        let xslope = ((n(col - 1) + m(col - 1) + m(col - 1) + s(col - 1))
            - (n(col + 1) + m(col + 1) + m(col + 1) + s(col + 1)))
            / (8.0 * d);
        let yslope = ((s(col - 1) + s(col) + s(col) + s(col + 1))
            - (n(col - 1) + n(col) + n(col) + n(col + 1)))
            / (8.0 * self.ns_res);

        if yslope == 0.0 {
            if xslope == 0.0 {
                return self.nodata;
            } else if xslope > 0.0 {
                return if self.up { 270.0 } else { 90.0 };
            }
            return if self.up { 90.0 } else { 270.0 };
        }
        let mut asp = xslope.atan2(yslope) / DEG2RAD;
        if asp < 0.0 {
            asp += 360.0;
        }
        asp
    }

    fn precompute_aspects(&mut self) {
        for row in 0..self.rows {
            for col in 0..self.columns {
                if self.elev(row, col) == self.nodata {
                    continue;
                }
                let a = self.aspect_fly(row, col);
                self.aspect.set_value(row, col, a);
            }
        }
    }

    fn aspect_at(&self, row: isize, col: isize) -> f64 {
        self.aspect.get_value(row, col)
    }

    /// Averages elevation and aspect at the exit point `cut` along the
    /// crossed edge, and shifts the bounding box one cell in the direction
    /// of travel.
    fn height_angle_bounding_box(
        &self,
        sub: isize,
        cut: f64,
        horiz: usize,
        p: &mut FlowPoint,
        b: &mut [[isize; 2]; 2],
    ) {
        let f = cut.floor() as isize;
        let r = cut - f as f64;

        b[horiz][horiz] = sub - 1;
        b[horiz][1 - horiz] = sub + 1;
        b[1 - horiz][horiz] = f + 1;
        b[1 - horiz][1 - horiz] = f - if r == 0.0 { 1 } else { 0 };
        let c = b[1 - horiz][1 - horiz] + 1;

        let (a1, a2) = if horiz == HORIZ {
            p.z = self.elev(sub, f) * (1.0 - r) + self.elev(sub, c) * r;
            (self.aspect_at(sub, f), self.aspect_at(sub, c))
        } else {
            p.z = self.elev(f, sub) * (1.0 - r) + self.elev(c, sub) * r;
            (self.aspect_at(f, sub), self.aspect_at(c, sub))
        };

        if a1 != self.nodata && a2 != self.nodata {
            let (mut a1, mut a2) = (a1, a2);
            let d = a1 - a2;
            if d >= 180.0 || d <= -180.0 {
                if a2 > 180.0 {
                    a2 -= 360.0;
                } else {
                    a1 -= 360.0;
                }
            }
            let a = r * a2 + (1.0 - r) * a1;
            p.theta = if a < 0.0 { a + 360.0 } else { a };
        } else {
            p.theta = self.nodata;
        }
    }

    fn on_map(&self, sub: isize, cut: f64, horiz: usize) -> bool {
        sub >= 0
            && cut >= 0.0
            && ((horiz == HORIZ && sub < self.rows && cut <= (self.columns - 1) as f64)
                || (horiz == VERT && sub < self.columns && cut <= (self.rows - 1) as f64))
    }

    /// Advances the point across one cell boundary and returns whether the
    /// line continues: the new point must be on the map, strictly lower
    /// and not inside a barrier cell.
    fn next_point(
        &mut self,
        p: &mut FlowPoint,
        a: &mut (isize, isize),
        b: &mut [[isize; 2]; 2],
        length: &mut f64,
    ) -> bool {
        let oldz = p.z;
        let oldtheta = p.theta;
        let oldr = p.r;
        let oldc = p.c;
        let ads = *a;
        let row_idx = ads.0.clamp(0, self.rows - 1) as usize;

        let mut bdy = [0f64; 2];
        let mut bdx = [0f64; 2];
        bdy[SOUTH] = (oldr - b[ROW][SOUTH] as f64) * self.ns_res;
        bdy[NORTH] = (oldr - b[ROW][NORTH] as f64) * self.ns_res;
        bdx[WEST] = (b[COL][WEST] as f64 - oldc) * self.ew_dist[row_idx];
        bdx[EAST] = (b[COL][EAST] as f64 - oldc) * self.ew_dist[row_idx];

        let mut semi = (oldtheta < 90.0 || oldtheta >= 270.0) as usize;
        let tangent = (oldtheta * DEG2RAD).tan();

        let sub: isize;
        let cut: f64;
        let horiz: usize;
        let seg_length: f64;

        let mut delta = bdy[semi] * tangent;
        if oldtheta != 90.0 && oldtheta != 270.0 && delta < bdx[EAST] && delta > bdx[WEST] {
            // crossing a horizontal cell edge
            delta = rectify(delta, &bdx, self.epsilon[HORIZ][row_idx]);
            p.x += delta;
            p.y += bdy[semi];
            p.r = b[ROW][semi] as f64;
            p.c += delta / self.ew_dist[row_idx];
            a.0 = b[ROW][semi];
            a.1 = p.c.round() as isize;
            sub = b[ROW][semi];
            cut = p.c;
            horiz = HORIZ;
            seg_length = (delta * delta + bdy[semi] * bdy[semi]).sqrt();
        } else {
            // crossing a vertical cell edge
            semi = (oldtheta < 180.0) as usize;
            delta = if oldtheta == 90.0 || oldtheta == 270.0 {
                0.0
            } else {
                let t = if tangent == 0.0 { 0.000001 } else { tangent };
                bdx[semi] / t
            };
            delta = rectify(delta, &bdy, self.epsilon[VERT][row_idx]);
            p.y += delta;
            p.x += bdx[semi];
            p.r -= delta / self.ns_res;
            p.c = b[COL][semi] as f64;
            a.0 = p.r.round() as isize;
            a.1 = b[COL][semi];
            sub = b[COL][semi];
            cut = p.r;
            horiz = VERT;
            seg_length = (bdx[semi] * bdx[semi] + delta * delta).sqrt();
        }

        if !self.on_map(sub, cut, horiz) {
            return false;
        }
        self.height_angle_bounding_box(sub, cut, horiz, p, b);
        if oldz <= p.z {
            return false;
        }
        if let Some(bar) = &self.barrier {
            if bar.get_value(a.0, a.1) != 0 {
                return false;
            }
        }

        if ads != *a {
            self.density.increment(a.0, a.1, 1);
        }
        if self.l3d {
            let deltaz = oldz - p.z;
            *length += (seg_length * seg_length + deltaz * deltaz).sqrt();
        } else {
            *length += seg_length;
        }
        true
    }

    /// Integrates one flowline from the center of the given cell. Returns
    /// the traversed points (in map coordinates) and the line length.
    pub fn integrate(&mut self, row: isize, col: isize) -> (Vec<Point2D>, f64) {
        let mut line = vec![];
        let mut length = 0f64;

        if let Some(bar) = &self.barrier {
            if bar.get_value(row, col) != 0 {
                return (line, length);
            }
        }

        let mut p = FlowPoint {
            x: self.west + (col as f64 + 0.5) * self.ew_dist[row as usize],
            y: self.north - (row as f64 + 0.5) * self.ns_res,
            z: self.elev(row, col),
            theta: self.aspect_at(row, col),
            r: row as f64,
            c: col as f64,
        };
        let mut a = (row, col);
        let mut b = [[0isize; 2]; 2];
        b[ROW][SOUTH] = row + 1;
        b[ROW][NORTH] = row - 1;
        b[COL][WEST] = col - 1;
        b[COL][EAST] = col + 1;

        loop {
            line.push(Point2D::new(p.x, p.y));
            if line.len() > self.bound
                || p.z == self.nodata
                || p.theta == self.nodata
                || p.theta < 0.0
                || p.theta > 360.0
            {
                break;
            }
            if !self.next_point(&mut p, &mut a, &mut b, &mut length) {
                break;
            }
        }

        (line, length)
    }

    /// Integrates a flowline from every cell (honouring `skip` for the
    /// vector output), filling the length and density rasters.
    pub fn calculate(
        &mut self,
        skip: usize,
        flout: bool,
        lgout: bool,
        dsout: bool,
    ) -> Vec<Vec<Point2D>> {
        let loopstep = if !dsout && !lgout && flout { skip } else { 1 };
        let mut flowlines = vec![];
        let mut row = 0isize;
        while row < self.rows {
            let mut col = 0isize;
            while col < self.columns {
                if self.elev(row, col) != self.nodata {
                    let (line, length) = self.integrate(row, col);
                    if flout
                        && line.len() > 1
                        && (loopstep == skip
                            || (row % skip as isize == 0 && col % skip as isize == 0))
                    {
                        flowlines.push(line);
                    }
                    if lgout {
                        self.lengths.set_value(row, col, length);
                    }
                }
                col += loopstep as isize;
            }
            row += loopstep as isize;
        }
        flowlines
    }
}

/// Corrects quantization problems: a step that lands within `e` of a cell
/// boundary is snapped exactly onto it.
fn rectify(delta: f64, bd: &[f64; 2], e: f64) -> f64 {
    if delta > 0.0 {
        if delta > bd[1] + e {
            return delta;
        }
    } else {
        if delta < bd[0] - e {
            return delta;
        }
    }
    if delta < bd[1] - e {
        if delta > bd[0] + e {
            delta
        } else {
            bd[0]
        }
    } else {
        bd[1]
    }
}

/// This tool constructs slope curves (flowlines) through a DEM by
/// integrating a streamline along the gradient from every Nth cell
/// center, together with rasters of flowpath length and flowline density.
/// The moving point crosses one cell boundary at a time; elevation and
/// aspect at each crossing are interpolated from the surrounding cells,
/// and integration stops when the surface no longer descends, the point
/// leaves the map or enters a barrier cell, or the segment bound is
/// reached. Aspect is taken from an input raster when given and computed
/// from central differences otherwise. The `-u` flag integrates uphill
/// instead, and `--d3` accumulates 3-D rather than planimetric lengths.
pub struct Flowlines {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl Flowlines {
    pub fn new() -> Flowlines {
        // public constructor
        let name = "Flowlines".to_string();
        let toolbox = "Hydrological Analysis".to_string();
        let description =
            "Constructs flowlines, flowpath lengths and flowline densities from a DEM.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Input Elevation File".to_owned(),
            flags: vec!["-i".to_owned(), "--dem".to_owned()],
            description: "Input raster DEM file.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Input Aspect File".to_owned(),
            flags: vec!["--aspin".to_owned()],
            description: "Optional input aspect raster map.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Input Barrier File".to_owned(),
            flags: vec!["--barin".to_owned()],
            description: "Optional input barrier raster map.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Flowline Vector".to_owned(),
            flags: vec!["--flout".to_owned()],
            description: "Output flowline vector file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Vector(
                VectorGeometryType::Line,
            )),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Flowpath Length Raster".to_owned(),
            flags: vec!["--lgout".to_owned()],
            description: "Output flowpath length raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Flowline Density Raster".to_owned(),
            flags: vec!["--dsout".to_owned()],
            description: "Output flowline density raster file.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Skip".to_owned(),
            flags: vec!["--skip".to_owned()],
            description: "Number of cells between flowlines.".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Bound".to_owned(),
            flags: vec!["--bound".to_owned()],
            description: "Maximum number of segments per flowline.".to_owned(),
            parameter_type: ParameterType::Integer,
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Integrate uphill?".to_owned(),
            flags: vec!["-u".to_owned(), "--up".to_owned()],
            description: "Compute upslope flowlines instead of downhill flowlines.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "3-D lengths?".to_owned(),
            flags: vec!["--d3".to_owned()],
            description: "3-D lengths instead of 2-D.".to_owned(),
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
            ">>.*{0} -r={1} -v --wd=\"*path*to*data*\" --dem=DEM.asc --flout=lines.shp --lgout=length.asc",
            short_exe, name
        )
        .replace("*", &sep);

        Flowlines {
            name: name,
            description: description,
            toolbox: toolbox,
            parameters: parameters,
            example_usage: usage,
        }
    }
}

impl TerraflowTool for Flowlines {
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
        let mut aspin_file = String::new();
        let mut barin_file = String::new();
        let mut flout_file = String::new();
        let mut lgout_file = String::new();
        let mut dsout_file = String::new();
        let mut skip = 0usize;
        let mut bound = 0usize;
        let mut up = false;
        let mut l3d = false;

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
            } else if flag_val == "-aspin" {
                aspin_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-barin" {
                barin_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-flout" {
                flout_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-lgout" {
                lgout_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-dsout" {
                dsout_file = if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                };
            } else if flag_val == "-skip" {
                skip = if keyval {
                    vec[1].to_string().parse::<usize>().expect(&format!("Error parsing {}", flag_val))
                } else {
                    args[i + 1].to_string().parse::<usize>().unwrap()
                };
            } else if flag_val == "-bound" {
                bound = if keyval {
                    vec[1].to_string().parse::<usize>().expect(&format!("Error parsing {}", flag_val))
                } else {
                    args[i + 1].to_string().parse::<usize>().unwrap()
                };
            } else if flag_val == "-u" || flag_val == "-up" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    up = true;
                }
            } else if flag_val == "-d3" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    l3d = true;
                }
            }
        }

        if flout_file.is_empty() && lgout_file.is_empty() && dsout_file.is_empty() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "You must select one or more outputs (flout, lgout, dsout).",
            ));
        }

        let sep: String = path::MAIN_SEPARATOR.to_string();
        let fix_path = |f: &mut String| {
            if !f.is_empty() && !f.contains(&sep) && !f.contains("/") {
                *f = format!("{}{}", working_directory, f);
            }
        };
        fix_path(&mut input_file);
        fix_path(&mut aspin_file);
        fix_path(&mut barin_file);
        fix_path(&mut flout_file);
        fix_path(&mut lgout_file);
        fix_path(&mut dsout_file);

        if verbose {
            println!("Reading data...")
        };
        let input = Raster::new(&input_file, "r")?;
        let rows = input.configs.rows as isize;
        let columns = input.configs.columns as isize;

        let aspin = if !aspin_file.is_empty() {
            Some(Raster::new(&aspin_file, "r")?)
        } else {
            None
        };
        let barin = if !barin_file.is_empty() {
            Some(Raster::new(&barin_file, "r")?)
        } else {
            None
        };

        let larger = rows.max(columns);
        if skip == 0 {
            skip = if larger < 50 { 1 } else { (larger / 50) as usize };
        }
        if bound == 0 {
            bound = (4.0 * ((rows * rows + columns * columns) as f64).sqrt()) as usize;
        }

        let start = Instant::now();
        let mut ctx = FlowlineContext::new(
            &input,
            aspin.as_ref(),
            barin.as_ref(),
            up,
            l3d,
            bound,
        )?;

        if verbose {
            println!("Calculating maps...");
        }
        let flowlines = ctx.calculate(
            skip,
            !flout_file.is_empty(),
            !lgout_file.is_empty(),
            !dsout_file.is_empty(),
        );

        let elapsed_time = get_formatted_elapsed_time(start);
        if verbose {
            println!("Saving data...")
        };

        if !flout_file.is_empty() {
            let mut vout = Shapefile::new(&flout_file, ShapeType::PolyLine)?;
            vout.attributes.add_field(&AttributeField::new(
                "FID",
                FieldDataType::Int,
                10u8,
                0u8,
            ));
            for (i, line) in flowlines.iter().enumerate() {
                let mut sfg = ShapefileGeometry::new(ShapeType::PolyLine);
                sfg.add_part(line);
                vout.add_record(sfg);
                vout.attributes
                    .add_record(vec![FieldData::Int(i as i32 + 1)], false);
            }
            if vout.num_records > 0 {
                vout.write()?;
            } else {
                println!("Warning: no flowlines were produced; vector output not written.");
            }
        }

        if !lgout_file.is_empty() {
            let mut lg_out = Raster::initialize_using_file(&lgout_file, &input);
            lg_out.configs.data_type = DataType::F32;
            for row in 0..rows {
                for col in 0..columns {
                    let v = ctx.lengths.get_value(row, col);
                    if v != ctx.lengths.nodata() {
                        lg_out.set_value(row, col, v);
                    }
                }
            }
            lg_out.add_metadata_entry(format!(
                "Created by terraflow_tools' {} tool",
                self.get_tool_name()
            ));
            lg_out.write()?;
        }

        if !dsout_file.is_empty() {
            let mut ds_out = Raster::initialize_using_file(&dsout_file, &input);
            ds_out.configs.data_type = DataType::I32;
            for row in 0..rows {
                for col in 0..columns {
                    ds_out.set_value(row, col, ctx.density.get_value(row, col) as f64);
                }
            }
            ds_out.add_metadata_entry(format!(
                "Created by terraflow_tools' {} tool",
                self.get_tool_name()
            ));
            ds_out.write()?;
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
            nodata: -9999.0,
            data_type: DataType::F32,
            projection: "planar".to_string(),
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

    fn east_dipping_plane(n: usize) -> Vec<f64> {
        let mut vals = vec![0f64; n * n];
        for r in 0..n {
            for c in 0..n {
                vals[r * n + c] = 100.0 - c as f64 * 2.0;
            }
        }
        vals
    }

    #[test]
    fn test_aspect_of_east_dipping_plane() {
        let input = raster_from(&east_dipping_plane(7), 7, 7);
        let ctx = FlowlineContext::new(&input, None, None, false, false, 100).unwrap();
        // dipping due east: aspect is 90 degrees CW from north
        assert!((ctx.aspect_at(3, 3) - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_aspect_of_north_dipping_plane() {
        let mut vals = vec![0f64; 49];
        for r in 0..7 {
            for c in 0..7 {
                vals[r * 7 + c] = 50.0 + r as f64 * 2.0;
            }
        }
        let input = raster_from(&vals, 7, 7);
        let ctx = FlowlineContext::new(&input, None, None, false, false, 100).unwrap();
        assert!(ctx.aspect_at(3, 3).abs() < 1e-9);
    }

    #[test]
    fn test_unbalanced_resolution_is_rejected() {
        let configs = RasterConfigs {
            rows: 5,
            columns: 5,
            north: 1000.0,
            south: 0.0,
            east: 5.0,
            west: 0.0,
            resolution_x: 1.0,
            resolution_y: 200.0,
            nodata: -9999.0,
            data_type: DataType::F32,
            projection: "planar".to_string(),
            ..Default::default()
        };
        let input = Raster::initialize_using_config("test.asc", &configs);
        assert!(FlowlineContext::new(&input, None, None, false, false, 100).is_err());
    }

    #[test]
    fn test_flowline_descends_east_to_map_edge() {
        let input = raster_from(&east_dipping_plane(9), 9, 9);
        let mut ctx = FlowlineContext::new(&input, None, None, false, false, 100).unwrap();
        let (line, length) = ctx.integrate(4, 1);
        assert!(line.len() > 2);
        assert!(length > 0.0);
        // x must be monotone increasing (moving east), y constant
        for w in line.windows(2) {
            assert!(w[1].x >= w[0].x);
            assert!((w[1].y - w[0].y).abs() < 1e-9);
        }
        // the line runs to the eastern part of the map
        assert!(line.last().unwrap().x > 7.0);
    }

    #[test]
    fn test_flowline_stops_at_barrier() {
        let input = raster_from(&east_dipping_plane(9), 9, 9);
        let barrier_vals: Vec<f64> = (0..81)
            .map(|i| if i % 9 == 5 { 1.0 } else { 0.0 })
            .collect();
        let barrier = raster_from(&barrier_vals, 9, 9);
        let mut ctx =
            FlowlineContext::new(&input, None, Some(&barrier), false, false, 100).unwrap();
        let (line, _) = ctx.integrate(4, 1);
        // never enters column 5 or beyond
        for p in &line {
            assert!(p.x < 5.5);
        }
    }

    #[test]
    fn test_density_counts_passing_flowlines() {
        let input = raster_from(&east_dipping_plane(9), 9, 9);
        let mut ctx = FlowlineContext::new(&input, None, None, false, false, 100).unwrap();
        ctx.calculate(1, false, true, true);
        // cells near the eastern edge of the interior rows are crossed by
        // the flowlines of every cell to their west
        let d = ctx.density.get_value(4, 7);
        assert!(d >= 5, "density at (4,7) = {}", d);
        // lengths grow toward the west
        assert!(
            ctx.lengths.get_value(4, 1) > ctx.lengths.get_value(4, 6),
            "western flowlines are longer"
        );
    }

    #[test]
    fn test_upslope_integration_climbs() {
        // dips toward the southeast, so uphill runs northwest
        let mut vals = vec![0f64; 81];
        for r in 0..9 {
            for c in 0..9 {
                vals[r * 9 + c] = 100.0 - 2.0 * c as f64 - 0.5 * r as f64;
            }
        }
        let input = raster_from(&vals, 9, 9);
        let mut ctx = FlowlineContext::new(&input, None, None, true, false, 100).unwrap();
        let (line, _) = ctx.integrate(4, 7);
        assert!(line.len() > 2);
        // moving west, uphill on the original surface
        for w in line.windows(2) {
            assert!(w[1].x <= w[0].x);
        }
    }

    #[test]
    fn test_rectify_snaps_within_epsilon() {
        let bd = [-1.0, 1.0];
        assert_eq!(rectify(0.9999, &bd, 0.001), 1.0);
        assert_eq!(rectify(-0.9999, &bd, 0.001), -1.0);
        assert_eq!(rectify(0.5, &bd, 0.001), 0.5);
        assert_eq!(rectify(1.5, &bd, 0.001), 1.5);
        assert_eq!(rectify(-1.5, &bd, 0.001), -1.5);
    }
}
