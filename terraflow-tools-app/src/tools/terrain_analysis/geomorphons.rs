/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

use crate::tools::*;
use nalgebra::{Matrix3, Vector3};
use std::env;
use std::f64;
use std::io::{Error, ErrorKind};
use std::path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use terraflow_raster::*;
use terraflow_common::utils::get_formatted_elapsed_time;

const NUM_DIRS: usize = 8;
const TERNARY_MAX: usize = 6561; // 3^8

/// Scan directions:
///  3|2|1
///  4|0|8
///  5|6|7
const NEXT_R: [isize; NUM_DIRS] = [-1, -1, -1, 0, 1, 1, 1, 0];
const NEXT_C: [isize; NUM_DIRS] = [1, 0, -1, -1, -1, 0, 1, 1];

/// Sine and cosine of each scan direction, measured from north.
const SINS: [f64; NUM_DIRS] = [
    0.7071067812, 0.0, -0.7071067812, -1.0, -0.7071067812, 0.0, 0.7071067812, 1.0,
];
const COSS: [f64; NUM_DIRS] = [
    0.7071067812, 1.0, 0.7071067812, 0.0, -0.7071067812, -1.0, -0.7071067812, 0.0,
];

/// The ten terrain forms, with 0 reserved for the impossible combinations.
pub(crate) const FORM_LABELS: [&str; 11] = [
    "ERROR",
    "flat",
    "peak",
    "ridge",
    "shoulder",
    "spur",
    "slope",
    "hollow",
    "footslope",
    "valley",
    "pit",
];

/// How the zenith and nadir angles are weighed against each other when a
/// direction's ternary value is decided.
#[derive(Clone, Copy, PartialEq)]
pub(crate) enum ComparisonMode {
    AngleV1,
    AngleV2,
    AngleV2Distance,
}

/// Returns the rotated and mirrored ternary code for any 8-digit ternary
/// number: the minimum over all eight rotations of the code and of its
/// reversal. Used to build the canonical lookup table over all 6561 codes,
/// of which 498 survive as distinct identities.
pub(crate) fn ternary_rotate(value: usize) -> u32 {
    let mut pattern = [0u32; NUM_DIRS];
    let mut rev_pattern = [0u32; NUM_DIRS];
    let mut v = value as u32;
    for i in 0..NUM_DIRS {
        pattern[i] = v % 3;
        rev_pattern[7 - i] = v % 3;
        v /= 3;
    }

    let mut code = u32::MAX;
    let mut rev_code = u32::MAX;
    for j in 0..NUM_DIRS {
        let mut power = 1u32;
        let mut tmp_code = 0u32;
        let mut tmp_rev_code = 0u32;
        for i in 0..NUM_DIRS {
            let k = (i + NUM_DIRS - j) % NUM_DIRS;
            tmp_code += pattern[k] * power;
            tmp_rev_code += rev_pattern[k] * power;
            power *= 3;
        }
        code = code.min(tmp_code);
        rev_code = rev_code.min(tmp_rev_code);
    }
    code.min(rev_code)
}

pub(crate) fn generate_ternary_codes() -> Vec<u32> {
    (0..TERNARY_MAX).map(ternary_rotate).collect()
}

/// Determine the form from the counts of negative and positive directions.
pub(crate) fn determine_form(num_minus: usize, num_plus: usize) -> u8 {
    // 1 = flat, 2 = peak, 3 = ridge, 4 = shoulder, 5 = spur, 6 = slope,
    // 7 = hollow, 8 = footslope, 9 = valley, 10 = pit, 0 = impossible
    const FORMS: [[u8; 9]; 9] = [
        /* minus ------------- plus ---------------- */
        /*       0   1   2   3   4   5   6   7   8  */
        /* 0 */ [1, 1, 1, 8, 8, 9, 9, 9, 10],
        /* 1 */ [1, 1, 8, 8, 8, 9, 9, 9, 0],
        /* 2 */ [1, 4, 6, 6, 7, 7, 9, 0, 0],
        /* 3 */ [4, 4, 6, 6, 6, 7, 0, 0, 0],
        /* 4 */ [4, 4, 5, 6, 6, 0, 0, 0, 0],
        /* 5 */ [3, 3, 5, 5, 0, 0, 0, 0, 0],
        /* 6 */ [3, 3, 3, 0, 0, 0, 0, 0, 0],
        /* 7 */ [3, 3, 0, 0, 0, 0, 0, 0, 0],
        /* 8 */ [2, 0, 0, 0, 0, 0, 0, 0, 0],
    ];
    if num_minus > 8 || num_plus > 8 {
        return 0;
    }
    FORMS[num_minus][num_plus]
}

/// A thorough comparison using factors of decreasing priority: whether
/// each angle exceeds its own threshold, then the greater angle, then
/// (optionally) the greater measurement distance. Both angles must be
/// non-negative.
fn compare_multi(
    nadir_angle: f64,
    zenith_angle: f64,
    nadir_threshold: f64,
    zenith_threshold: f64,
    nadir_distance: f64,
    zenith_distance: f64,
) -> i32 {
    let nadir_over = nadir_angle > nadir_threshold;
    let zenith_over = zenith_angle > zenith_threshold;

    if !nadir_over && !zenith_over {
        return 0;
    }
    if !nadir_over && zenith_over {
        return 1;
    }
    if nadir_over && !zenith_over {
        return -1;
    }
    if nadir_angle < zenith_angle {
        return 1;
    }
    if nadir_angle > zenith_angle {
        return -1;
    }
    if nadir_distance < zenith_distance {
        return 1;
    }
    if nadir_distance > zenith_distance {
        return -1;
    }
    // both angles exceed their thresholds and everything ties; the profile
    // is definitely not flat, so resolve with a preferred constant
    1
}

#[derive(Clone, Copy)]
pub(crate) struct Pattern {
    pub num_positives: usize,
    pub num_negatives: usize,
    pub pattern: [i32; NUM_DIRS],
    pub elevation: [f64; NUM_DIRS],
    pub distance: [f64; NUM_DIRS],
    pub x: [f64; NUM_DIRS],
    pub y: [f64; NUM_DIRS],
}

impl Pattern {
    fn new() -> Pattern {
        Pattern {
            num_positives: 0,
            num_negatives: 0,
            pattern: [0; NUM_DIRS],
            elevation: [0f64; NUM_DIRS],
            distance: [0f64; NUM_DIRS],
            x: [0f64; NUM_DIRS],
            y: [0f64; NUM_DIRS],
        }
    }

    /// Converts the per-direction search distances from radial to
    /// cartesian coordinates, origin at the central cell.
    pub fn radial_to_cartesian(&mut self) {
        for i in 0..NUM_DIRS {
            if self.distance[i] > 0f64 {
                self.x[i] = self.distance[i] * SINS[i];
                self.y[i] = self.distance[i] * COSS[i];
            } else {
                self.x[i] = 0f64;
                self.y[i] = 0f64;
            }
        }
    }

    /// Base-3 code of the raw (unrotated) pattern, digits `p + 1`.
    pub fn ternary_code(&self) -> usize {
        let mut code = 0usize;
        let mut power = 1usize;
        for i in 0..NUM_DIRS {
            code += (self.pattern[i] + 1) as usize * power;
            power *= 3;
        }
        code
    }

    /// Rotation-canonical binary code of the zenith (+1) or nadir (-1)
    /// directions.
    pub fn binary_code(&self, sign: i32) -> i32 {
        let mut binary = 0u8;
        for i in 0..NUM_DIRS {
            if self.pattern[i] == sign {
                binary |= 1 << i;
            }
        }
        rotate_binary(binary)
    }

    /// Mean relative elevation of the central cell against its visible
    /// surround.
    pub fn intensity(&self, pattern_size: usize) -> f64 {
        let mut sum_elevation = 0f64;
        for i in 0..NUM_DIRS {
            sum_elevation -= self.elevation[i];
        }
        sum_elevation / pattern_size as f64
    }

    /// The extremum relative elevation, negated.
    pub fn exposition(&self) -> f64 {
        let mut max = self.elevation[0];
        for i in 1..NUM_DIRS {
            if self.elevation[i].abs() > max.abs() {
                max = self.elevation[i];
            }
        }
        -max
    }

    /// Relative difference across the visible range.
    pub fn range(&self) -> f64 {
        let mut max = self.elevation[0];
        let mut min = self.elevation[0];
        for i in 1..NUM_DIRS {
            max = max.max(self.elevation[i]);
            min = min.min(self.elevation[i]);
        }
        max - min
    }

    /// Variance of the visible neighbourhood elevations.
    pub fn variance(&self, pattern_size: usize) -> f64 {
        let mut mean = 0f64;
        for i in 0..NUM_DIRS {
            mean += self.elevation[i];
        }
        mean /= pattern_size as f64;
        let mut var = 0f64;
        for i in 0..NUM_DIRS {
            var += (mean - self.elevation[i]) * (mean - self.elevation[i]);
        }
        var / pattern_size as f64
    }

    /// Area of the geomorphon polygon projected onto the horizontal plane.
    pub fn extends(&self) -> f64 {
        let mut area = 0f64;
        for i in 0..NUM_DIRS {
            let j = (i + 1) % NUM_DIRS;
            area += self.x[i] * self.y[j] - self.x[j] * self.y[i];
        }
        area.abs() / 2.0
    }

    /// Azimuth, elongation and width of the geomorphon polygon, found by
    /// rotating it so its regression line aligns with the x axis.
    pub fn shape(&self, pattern_size: usize) -> (f64, f64, f64) {
        let n = pattern_size as f64;
        let mut avg_x = 0f64;
        let mut avg_y = 0f64;
        let mut avg_x_y = 0f64;
        let mut avg_x_square = 0f64;
        for i in 0..NUM_DIRS {
            avg_y += self.y[i];
            avg_x += self.x[i];
            avg_x_square += self.x[i] * self.x[i];
            avg_x_y += self.x[i] * self.y[i];
        }
        avg_y /= n;
        avg_x /= n;
        avg_x_y /= n;
        avg_x_square /= n;
        let result =
            ((avg_x_y - avg_x * avg_y) / (avg_x_square - avg_x * avg_x)).atan();
        let azimuth = (f64::consts::FRAC_PI_2 - result).to_degrees();

        // rotation
        let sine = result.sin();
        let cosine = result.cos();
        let mut rx_min = self.x[0] * cosine - self.y[0] * sine;
        let mut rx_max = rx_min;
        let mut ry_min = self.x[0] * sine + self.y[0] * cosine;
        let mut ry_max = ry_min;
        for i in 1..NUM_DIRS {
            let rx = self.x[i] * cosine - self.y[i] * sine;
            let ry = self.x[i] * sine + self.y[i] * cosine;
            rx_min = rx_min.min(rx);
            rx_max = rx_max.max(rx);
            ry_min = ry_min.min(ry);
            ry_max = ry_max.max(ry);
        }
        let rx = rx_max - rx_min;
        let ry = ry_max - ry_min;
        let elongation = if rx > ry { rx / ry } else { ry / rx };
        let width = rx.min(ry);
        (azimuth, elongation, width)
    }
}

/// Minimum over all rotations of an 8-bit binary pattern.
fn rotate_binary(binary: u8) -> i32 {
    let mut result = binary;
    for i in 1..NUM_DIRS as u32 {
        let test = binary.rotate_left(i);
        result = result.min(test);
    }
    result as i32
}

/// Scan-time parameters shared by every cell.
#[derive(Clone, Copy)]
pub(crate) struct ScanParams {
    pub skip_cells: isize,
    pub search_distance: f64,
    pub flat_distance: f64,
    pub flat_threshold: f64,        // radians
    pub flat_threshold_height: f64, // metres
    pub compmode: ComparisonMode,
}

/// Computes the geomorphon pattern of one cell by a line-of-sight scan in
/// the eight directions, tracking the zenith (max) and nadir (min) angles
/// seen along each ray between the skip and search radii. Returns the
/// pattern and its size (the number of directions with a line of sight).
pub(crate) fn calc_pattern(
    params: &ScanParams,
    input: &Raster,
    row: isize,
    col: isize,
) -> (Pattern, usize) {
    let rows = input.configs.rows as isize;
    let columns = input.configs.columns as isize;
    let nodata = input.configs.nodata;
    let half_pi = f64::consts::FRAC_PI_2;
    let mut pattern = Pattern::new();
    let mut pattern_size = 0usize;

    let cur_northing = input.get_y_from_row(row);
    let cur_easting = input.get_x_from_column(col);
    let center_height = input.get_value(row, col);

    'directions: for i in 0..NUM_DIRS {
        let mut j = params.skip_cells + 1;
        let mut zenith_angle = -half_pi;
        let mut nadir_angle = half_pi;
        let mut zenith_height = 0f64;
        let mut nadir_height = 0f64;
        let mut zenith_distance = 0f64;
        let mut nadir_distance = 0f64;

        let (mut r, mut c) = (row + j * NEXT_R[i], col + j * NEXT_C[i]);
        if r < 0 || r > rows - 1 || c < 0 || c > columns - 1 {
            continue 'directions; // border: the cell is at the edge of the map
        }
        if input.get_value(row + NEXT_R[i], col + NEXT_C[i]) == nodata {
            continue 'directions; // next value is null: no line of sight
        }
        pattern_size += 1;

        let mut target_northing = input.get_y_from_row(r);
        let mut target_easting = input.get_x_from_column(c);
        let mut cur_distance = ((target_northing - cur_northing)
            * (target_northing - cur_northing)
            + (target_easting - cur_easting) * (target_easting - cur_easting))
            .sqrt();

        while cur_distance < params.search_distance {
            if r < 0 || r > rows - 1 || c < 0 || c > columns - 1 {
                break; // reached the end of the map
            }
            let z = input.get_value(r, c);
            if z != nodata {
                let height = z - center_height;
                let angle = height.atan2(cur_distance);
                if angle > zenith_angle {
                    zenith_angle = angle;
                    zenith_height = height;
                    zenith_distance = cur_distance;
                }
                if angle < nadir_angle {
                    nadir_angle = angle;
                    nadir_height = height;
                    nadir_distance = cur_distance;
                }
            }
            j += 1;
            r = row + j * NEXT_R[i];
            c = col + j * NEXT_C[i];
            target_northing = input.get_y_from_row(r);
            target_easting = input.get_x_from_column(c);
            cur_distance = ((target_northing - cur_northing) * (target_northing - cur_northing)
                + (target_easting - cur_easting) * (target_easting - cur_easting))
                .sqrt();
        }

        // lower the flatness threshold when the extreme lies beyond the
        // flatness distance
        let zenith_threshold = if params.flat_distance > 0f64
            && params.flat_distance < zenith_distance
        {
            params.flat_threshold_height.atan2(zenith_distance)
        } else {
            params.flat_threshold
        };
        let nadir_threshold = if params.flat_distance > 0f64
            && params.flat_distance < nadir_distance
        {
            params.flat_threshold_height.atan2(nadir_distance)
        } else {
            params.flat_threshold
        };

        if params.compmode != ComparisonMode::AngleV1 {
            let t = match params.compmode {
                ComparisonMode::AngleV2 => compare_multi(
                    nadir_angle.abs(),
                    zenith_angle.abs(),
                    nadir_threshold,
                    zenith_threshold,
                    0f64,
                    0f64,
                ),
                _ => compare_multi(
                    nadir_angle.abs(),
                    zenith_angle.abs(),
                    nadir_threshold,
                    zenith_threshold,
                    nadir_distance,
                    zenith_distance,
                ),
            };
            pattern.pattern[i] = t;
            match t {
                1 => {
                    pattern.elevation[i] = zenith_height;
                    pattern.distance[i] = zenith_distance;
                    pattern.num_positives += 1;
                }
                -1 => {
                    pattern.elevation[i] = nadir_height;
                    pattern.distance[i] = nadir_distance;
                    pattern.num_negatives += 1;
                }
                _ => {
                    pattern.distance[i] = params.search_distance;
                }
            }
            continue;
        }

        // the original comparison: the larger magnitude wins, ties are flat
        if zenith_angle.abs() > zenith_threshold || nadir_angle.abs() > nadir_threshold {
            if nadir_angle.abs() < zenith_angle.abs() {
                pattern.pattern[i] = 1;
                pattern.elevation[i] = zenith_height;
                pattern.distance[i] = zenith_distance;
                pattern.num_positives += 1;
            }
            if nadir_angle.abs() > zenith_angle.abs() {
                pattern.pattern[i] = -1;
                pattern.elevation[i] = nadir_height;
                pattern.distance[i] = nadir_distance;
                pattern.num_negatives += 1;
            }
        } else {
            pattern.distance[i] = params.search_distance;
        }
    }

    (pattern, pattern_size)
}

/// Classifies one cell, applying the extended small-feature correction
/// when requested: extensive unnatural ridges, peaks, shoulders and
/// footslopes are re-examined at half the search radius.
pub(crate) fn classify_cell(
    params: &ScanParams,
    input: &Raster,
    row: isize,
    col: isize,
    extended: bool,
    max_resolution: f64,
) -> (Pattern, usize, u8) {
    let (pattern, pattern_size) = calc_pattern(params, input, row, col);
    let mut cur_form = determine_form(pattern.num_negatives, pattern.num_positives);

    if extended && params.search_distance > 10.0 * max_resolution {
        if cur_form == 4 || cur_form == 8 || cur_form == 2 || cur_form == 3 {
            let small_search = if params.search_distance / 2.0 < 4.0 * max_resolution {
                4.0 * max_resolution
            } else {
                params.search_distance / 2.0
            };
            let small_params = ScanParams {
                skip_cells: 0,
                search_distance: small_search,
                flat_distance: 0f64,
                ..*params
            };
            let (small_pattern, _) = calc_pattern(&small_params, input, row, col);
            let small_form =
                determine_form(small_pattern.num_negatives, small_pattern.num_positives);
            if cur_form == 4 || cur_form == 8 {
                if small_form == 1 {
                    cur_form = 1;
                }
            } else {
                cur_form = small_form;
            }
        }
    }

    (pattern, pattern_size, cur_form)
}

// indexes of the twelve output maps
const O_FORMS: usize = 0;
const O_TERNARY: usize = 1;
const O_POSITIVE: usize = 2;
const O_NEGATIVE: usize = 3;
const O_INTENSITY: usize = 4;
const O_EXPOSITION: usize = 5;
const O_RANGE: usize = 6;
const O_VARIANCE: usize = 7;
const O_ELONGATION: usize = 8;
const O_AZIMUTH: usize = 9;
const O_EXTEND: usize = 10;
const O_WIDTH: usize = 11;
const IO_SIZE: usize = 12;

/// This tool classifies the local terrain of every cell into one of the
/// ten geomorphon forms (flat, peak, ridge, shoulder, spur, slope, hollow,
/// footslope, valley and pit) using a machine-vision line-of-sight
/// technique: elevation angles are scanned along eight rays out to a
/// search radius, each ray contributes one ternary digit depending on
/// whether its zenith or nadir angle dominates the flatness threshold, and
/// the resulting 8-digit pattern indexes the form table. The pattern's
/// rotation- and reflection-invariant ternary code, its binary positive
/// and negative codes, and a set of geometry measures (intensity,
/// exposition, range, variance, elongation, azimuth, extend and width)
/// can be written as additional rasters.
///
/// The flatness threshold optionally decays with distance beyond the flat
/// distance; the search, skip and flat radii are given in cells, or in
/// metres with `--meters`. `--extended` applies a half-radius correction
/// for narrow features, and `--residuals` detrends the DEM with a
/// least-squares plane before scanning.
pub struct Geomorphons {
    name: String,
    description: String,
    toolbox: String,
    parameters: Vec<ToolParameter>,
    example_usage: String,
}

impl Geomorphons {
    pub fn new() -> Geomorphons {
        // public constructor
        let name = "Geomorphons".to_string();
        let toolbox = "Geomorphometric Analysis".to_string();
        let description =
            "Calculates geomorphon patterns, terrain forms and geometry from a DEM.".to_string();

        let mut parameters = vec![];
        parameters.push(ToolParameter {
            name: "Input DEM File".to_owned(),
            flags: vec!["-i".to_owned(), "--dem".to_owned()],
            description: "Input raster DEM file.".to_owned(),
            parameter_type: ParameterType::ExistingFile(ParameterFileType::Raster),
            default_value: None,
            optional: false,
        });

        parameters.push(ToolParameter {
            name: "Output Forms File".to_owned(),
            flags: vec!["-o".to_owned(), "--forms".to_owned()],
            description: "Output raster of the most common geomorphic forms.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Ternary Code File".to_owned(),
            flags: vec!["--ternary".to_owned()],
            description: "Output raster of rotation-canonical ternary pattern codes.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Positive Pattern File".to_owned(),
            flags: vec!["--positive".to_owned()],
            description: "Output raster of binary positive pattern codes.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Negative Pattern File".to_owned(),
            flags: vec!["--negative".to_owned()],
            description: "Output raster of binary negative pattern codes.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Intensity File".to_owned(),
            flags: vec!["--intensity".to_owned()],
            description: "Output raster of mean relative form elevation.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Exposition File".to_owned(),
            flags: vec!["--exposition".to_owned()],
            description: "Output raster of maximum relative form elevation.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Range File".to_owned(),
            flags: vec!["--range".to_owned()],
            description: "Output raster of the elevation range of the form extent.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Variance File".to_owned(),
            flags: vec!["--variance".to_owned()],
            description: "Output raster of the variance of the form boundary.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Elongation File".to_owned(),
            flags: vec!["--elongation".to_owned()],
            description: "Output raster of local elongation.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Azimuth File".to_owned(),
            flags: vec!["--azimuth".to_owned()],
            description: "Output raster of the local azimuth of elongation.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Extend File".to_owned(),
            flags: vec!["--extend".to_owned()],
            description: "Output raster of local extend (area) of the form.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Output Width File".to_owned(),
            flags: vec!["--width".to_owned()],
            description: "Output raster of local width of the form.".to_owned(),
            parameter_type: ParameterType::NewFile(ParameterFileType::Raster),
            default_value: None,
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Search Radius".to_owned(),
            flags: vec!["--search".to_owned()],
            description: "Outer search radius, in cells (or metres with --meters).".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("3".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Skip Radius".to_owned(),
            flags: vec!["--skip".to_owned()],
            description: "Inner skip radius, in cells (or metres with --meters).".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("0".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Flatness Threshold".to_owned(),
            flags: vec!["--threshold".to_owned()],
            description: "Flatness threshold in degrees.".to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("1".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Flatness Distance".to_owned(),
            flags: vec!["--fdist".to_owned()],
            description:
                "Distance after which the flatness threshold decays, in cells (or metres with --meters)."
                    .to_owned(),
            parameter_type: ParameterType::Float,
            default_value: Some("0".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Comparison Mode".to_owned(),
            flags: vec!["--comparison".to_owned()],
            description: "Zenith/nadir comparison mode, one of 'anglev1', 'anglev2', 'anglev2_distance'."
                .to_owned(),
            parameter_type: ParameterType::OptionList(vec![
                "anglev1".to_owned(),
                "anglev2".to_owned(),
                "anglev2_distance".to_owned(),
            ]),
            default_value: Some("anglev1".to_owned()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Radii in metres?".to_owned(),
            flags: vec!["-m".to_owned(), "--meters".to_owned()],
            description: "Interpret the search, skip and flat radii as metres.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Extended correction?".to_owned(),
            flags: vec!["-e".to_owned(), "--extended".to_owned()],
            description: "Apply the extended small-feature form correction.".to_owned(),
            parameter_type: ParameterType::Boolean,
            default_value: Some("false".to_string()),
            optional: true,
        });

        parameters.push(ToolParameter {
            name: "Use residuals?".to_owned(),
            flags: vec!["--residuals".to_owned()],
            description: "Detrend the DEM with a least-squares plane before scanning.".to_owned(),
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
            ">>.*{0} -r={1} -v --wd=\"*path*to*data*\" --dem=DEM.asc --forms=forms.asc --search=15",
            short_exe, name
        )
        .replace("*", &sep);

        Geomorphons {
            name: name,
            description: description,
            toolbox: toolbox,
            parameters: parameters,
            example_usage: usage,
        }
    }
}

impl TerraflowTool for Geomorphons {
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
        let mut output_files = vec![String::new(); IO_SIZE];
        let mut search_radius = 3f64;
        let mut skip_radius = 0f64;
        let mut flat_thresh_deg = 1f64;
        let mut flat_dist_value = 0f64;
        let mut compmode = ComparisonMode::AngleV1;
        let mut meters = false;
        let mut extended = false;
        let mut use_residuals = false;

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
            let value = |i: usize| -> String {
                if keyval {
                    vec[1].to_string()
                } else {
                    args[i + 1].to_string()
                }
            };
            if flag_val == "-i" || flag_val == "-input" || flag_val == "-dem" {
                input_file = value(i);
            } else if flag_val == "-o" || flag_val == "-forms" {
                output_files[O_FORMS] = value(i);
            } else if flag_val == "-ternary" {
                output_files[O_TERNARY] = value(i);
            } else if flag_val == "-positive" {
                output_files[O_POSITIVE] = value(i);
            } else if flag_val == "-negative" {
                output_files[O_NEGATIVE] = value(i);
            } else if flag_val == "-intensity" {
                output_files[O_INTENSITY] = value(i);
            } else if flag_val == "-exposition" {
                output_files[O_EXPOSITION] = value(i);
            } else if flag_val == "-range" {
                output_files[O_RANGE] = value(i);
            } else if flag_val == "-variance" {
                output_files[O_VARIANCE] = value(i);
            } else if flag_val == "-elongation" {
                output_files[O_ELONGATION] = value(i);
            } else if flag_val == "-azimuth" {
                output_files[O_AZIMUTH] = value(i);
            } else if flag_val == "-extend" {
                output_files[O_EXTEND] = value(i);
            } else if flag_val == "-width" {
                output_files[O_WIDTH] = value(i);
            } else if flag_val == "-search" {
                search_radius = value(i)
                    .parse::<f64>()
                    .expect(&format!("Error parsing {}", flag_val));
            } else if flag_val == "-skip" {
                skip_radius = value(i)
                    .parse::<f64>()
                    .expect(&format!("Error parsing {}", flag_val));
            } else if flag_val == "-threshold" {
                flat_thresh_deg = value(i)
                    .parse::<f64>()
                    .expect(&format!("Error parsing {}", flag_val));
            } else if flag_val == "-fdist" {
                flat_dist_value = value(i)
                    .parse::<f64>()
                    .expect(&format!("Error parsing {}", flag_val));
            } else if flag_val == "-comparison" {
                let v = value(i).to_lowercase();
                compmode = if v.contains("v2_distance") || v.contains("distance") {
                    ComparisonMode::AngleV2Distance
                } else if v.contains("v2") {
                    ComparisonMode::AngleV2
                } else {
                    ComparisonMode::AngleV1
                };
            } else if flag_val == "-m" || flag_val == "-meters" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    meters = true;
                }
            } else if flag_val == "-e" || flag_val == "-extended" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    extended = true;
                }
            } else if flag_val == "-residuals" {
                if vec.len() == 1 || !vec[1].to_string().to_lowercase().contains("false") {
                    use_residuals = true;
                }
            }
        }

        if output_files.iter().all(|f| f.is_empty()) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "At least one output is required, e.g. --forms.",
            ));
        }

        let sep: String = path::MAIN_SEPARATOR.to_string();
        if !input_file.contains(&sep) && !input_file.contains("/") {
            input_file = format!("{}{}", working_directory, input_file);
        }
        for f in output_files.iter_mut() {
            if !f.is_empty() && !f.contains(&sep) && !f.contains("/") {
                *f = format!("{}{}", working_directory, f);
            }
        }

        if verbose {
            println!("Reading data...")
        };
        let mut input = Raster::new(&input_file, "r")?;

        let start = Instant::now();
        let rows = input.configs.rows as isize;
        let columns = input.configs.columns as isize;
        let nodata = input.configs.nodata;
        let max_resolution = input.configs.resolution_x.max(input.configs.resolution_y);
        let ns_resolution = input.configs.resolution_y;

        // radii, in cells and in map units
        let search_cells = if meters {
            (search_radius / max_resolution) as isize
        } else {
            search_radius as isize
        };
        if search_cells < 1 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Search radius size must cover at least 1 cell.",
            ));
        }
        let mut skip_cells = if meters {
            (skip_radius / max_resolution) as isize
        } else {
            skip_radius as isize
        };
        if skip_cells >= search_cells {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Skip radius size must be at least 1 cell lower than the search radius.",
            ));
        }
        if skip_cells < 0 {
            skip_cells = 0;
        }
        let search_distance = if meters {
            search_radius
        } else {
            ns_resolution * search_cells as f64
        };
        let skip_distance = if meters {
            skip_radius
        } else {
            ns_resolution * skip_cells as f64
        };

        if flat_thresh_deg <= 0f64 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Flatness threshold must be greater than 0.",
            ));
        }
        let flat_threshold = flat_thresh_deg.to_radians();
        let mut flat_distance = if meters {
            flat_dist_value
        } else {
            ns_resolution * flat_dist_value
        };
        let flat_threshold_height = flat_threshold.tan() * flat_distance;
        if (flat_distance > 0f64 && flat_distance <= skip_distance)
            || flat_distance >= search_distance
        {
            if flat_distance != 0f64 {
                println!(
                    "Warning: flatness distance should lie between the skip and search radii; ignored."
                );
            }
            flat_distance = 0f64;
        }

        if verbose {
            println!(
                "Search distance: {} m, {} cells; skip: {} m; flat height: {} m",
                search_distance, search_cells, skip_distance, flat_threshold_height
            );
        }

        // transform input to residuals
        if use_residuals {
            if verbose {
                println!("Calculating residuals...");
            }
            let mut sum_y = 0f64;
            let mut sum_xr_y = 0f64;
            let mut sum_xc_y = 0f64;
            let mut sum_xr = 0f64;
            let mut sum_xc = 0f64;
            let mut sum_xr_xr = 0f64;
            let mut sum_xc_xc = 0f64;
            let mut sum_xr_xc = 0f64;
            let mut n = 0f64;
            for row in 0..rows {
                let r = row as f64;
                for col in 0..columns {
                    let c = col as f64;
                    let z = input.get_value(row, col);
                    if z != nodata {
                        sum_y += z;
                        sum_xr_y += r * z;
                        sum_xc_y += c * z;
                        sum_xr += r;
                        sum_xc += c;
                        sum_xr_xr += r * r;
                        sum_xc_xc += c * c;
                        sum_xr_xc += r * c;
                        n += 1f64;
                    }
                }
            }
            //          | n         sum_xr      sum_xc    |   | b0  |           | sum_y    |
            // X'X =    | sum_xr    sum_xr_xr   sum_xr_xc | . | b1r | =  X'Y =  | sum_xr_y |
            //          | sum_xc    sum_xr_xc   sum_xc_xc |   | b1c |           | sum_xc_y |
            let yx = Vector3::new(sum_y, sum_xr_y, sum_xc_y);
            let xtx = Matrix3::new(
                n, sum_xr, sum_xc, sum_xr, sum_xr_xr, sum_xr_xc, sum_xc, sum_xr_xc, sum_xc_xc,
            );
            let solution = xtx
                .lu()
                .solve(&yx)
                .ok_or_else(|| Error::new(ErrorKind::InvalidData, "Linear resolution failed"))?;
            let b0 = solution[0];
            let b1r = solution[1];
            let b1c = solution[2];
            for row in 0..rows {
                for col in 0..columns {
                    let z = input.get_value(row, col);
                    if z != nodata {
                        input.set_value(row, col, z - (b0 + b1r * row as f64 + b1c * col as f64));
                    }
                }
            }
        }

        // generate global ternary codes
        if verbose {
            println!("Generating global ternary codes...");
        }
        let gtc = Arc::new(generate_ternary_codes());

        // main loop
        if verbose {
            println!("Computing geomorphons...");
        }
        let input = Arc::new(input);
        let params = ScanParams {
            skip_cells,
            search_distance,
            flat_distance,
            flat_threshold,
            flat_threshold_height,
            compmode,
        };
        let area_of_octagon =
            4.0 * search_distance * search_distance * (45f64.to_radians()).sin();

        let mut num_procs = num_cpus::get() as isize;
        let configs = terraflow_common::configs::get_configs()?;
        if configs.max_procs > 0 && configs.max_procs < num_procs {
            num_procs = configs.max_procs;
        }

        let (tx, rx) = mpsc::channel();
        for tid in 0..num_procs {
            let input = input.clone();
            let gtc = gtc.clone();
            let tx = tx.clone();
            thread::spawn(move || {
                let skip = params.skip_cells + 1;
                let rowslessone = rows - 1;
                let columnslessone = columns - 1;
                for row in (0..rows).filter(|r| r % num_procs == tid) {
                    let mut data = vec![vec![nodata; columns as usize]; IO_SIZE];
                    for col in 0..columns {
                        // forms near the borders are usually unnatural
                        if row < skip
                            || row > rowslessone - skip
                            || col < skip
                            || col > columnslessone - skip
                            || input.get_value(row, col) == nodata
                        {
                            continue;
                        }
                        let (mut pattern, pattern_size, form) = classify_cell(
                            &params,
                            &input,
                            row,
                            col,
                            extended,
                            max_resolution,
                        );
                        if pattern_size == 0 {
                            continue; // no line of sight in any direction
                        }
                        let c = col as usize;
                        data[O_FORMS][c] = form as f64;
                        data[O_TERNARY][c] = gtc[pattern.ternary_code()] as f64;
                        data[O_POSITIVE][c] = pattern.binary_code(1) as f64;
                        data[O_NEGATIVE][c] = pattern.binary_code(-1) as f64;
                        data[O_INTENSITY][c] = pattern.intensity(pattern_size);
                        data[O_EXPOSITION][c] = pattern.exposition();
                        data[O_RANGE][c] = pattern.range();
                        data[O_VARIANCE][c] = pattern.variance(pattern_size);
                        pattern.radial_to_cartesian();
                        let (azimuth, elongation, width) = pattern.shape(pattern_size);
                        data[O_AZIMUTH][c] = azimuth;
                        data[O_ELONGATION][c] = elongation;
                        data[O_WIDTH][c] = width;
                        data[O_EXTEND][c] = pattern.extends() / area_of_octagon;
                    }
                    tx.send((row, data)).unwrap();
                }
            });
        }
        drop(tx);

        let mut outputs: Vec<Option<Raster>> = (0..IO_SIZE)
            .map(|i| {
                if !output_files[i].is_empty() {
                    let mut r = Raster::initialize_using_file(&output_files[i], &input);
                    r.configs.data_type = match i {
                        O_FORMS | O_TERNARY | O_POSITIVE | O_NEGATIVE => DataType::I32,
                        _ => DataType::F32,
                    };
                    if i == O_FORMS {
                        r.configs.photometric_interp = PhotometricInterpretation::Categorical;
                        for (cat, label) in FORM_LABELS.iter().enumerate().skip(1) {
                            r.add_metadata_entry(format!("Category {}: {}", cat, label));
                        }
                    }
                    Some(r)
                } else {
                    None
                }
            })
            .collect();

        let mut progress: usize;
        let mut old_progress: usize = 1;
        for i in 0..rows {
            let (row, data) = rx.recv().expect("Error receiving data from thread.");
            for (map, rows_data) in outputs.iter_mut().zip(&data) {
                if let Some(r) = map {
                    r.set_row_data(row, rows_data.clone());
                }
            }
            if verbose {
                progress = (100.0_f64 * i as f64 / (rows - 1) as f64) as usize;
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
        for map in outputs.iter_mut() {
            if let Some(r) = map {
                r.add_metadata_entry(format!(
                    "Created by terraflow_tools' {} tool",
                    self.get_tool_name()
                ));
                r.add_metadata_entry(format!("Input file: {}", input_file));
                r.add_metadata_entry(format!("Search radius (cells): {}", search_cells));
                r.add_metadata_entry(format!("Elapsed Time (excluding I/O): {}", elapsed_time));
                r.write()?;
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
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;

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

    fn default_params(search_cells: isize, flat_threshold_deg: f64) -> ScanParams {
        ScanParams {
            skip_cells: 0,
            search_distance: search_cells as f64 + 1e-9,
            flat_distance: 0f64,
            flat_threshold: flat_threshold_deg.to_radians(),
            flat_threshold_height: 0f64,
            compmode: ComparisonMode::AngleV1,
        }
    }

    #[test]
    fn test_canonical_table_has_498_codes() {
        let gtc = generate_ternary_codes();
        let distinct: HashSet<u32> = gtc.iter().copied().collect();
        assert_eq!(distinct.len(), 498);
    }

    #[test]
    fn test_canonical_code_is_minimal_and_idempotent() {
        let gtc = generate_ternary_codes();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..500 {
            let c = rng.gen_range(0, TERNARY_MAX);
            assert!(gtc[c] <= c as u32);
            assert_eq!(gtc[gtc[c] as usize], gtc[c]);
        }
    }

    #[test]
    fn test_canonical_code_is_rotation_invariant() {
        let gtc = generate_ternary_codes();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..200 {
            let c = rng.gen_range(0, TERNARY_MAX);
            // rotate the 8 ternary digits by one position
            let mut digits = [0usize; 8];
            let mut v = c;
            for d in digits.iter_mut() {
                *d = v % 3;
                v /= 3;
            }
            let mut rotated = 0usize;
            let mut power = 1usize;
            for i in 0..8 {
                rotated += digits[(i + 7) % 8] * power;
                power *= 3;
            }
            assert_eq!(gtc[c], gtc[rotated]);
        }
    }

    #[test]
    fn test_form_table_corners() {
        assert_eq!(determine_form(8, 0), 2); // peak
        assert_eq!(determine_form(0, 8), 10); // pit
        assert_eq!(determine_form(0, 0), 1); // flat
        assert_eq!(determine_form(2, 2), 6); // slope
        assert_eq!(determine_form(1, 8), 0); // impossible
    }

    #[test]
    fn test_symmetric_peak_classifies_as_peak() {
        // concentric peak, center at (2,2), slope steepening outward so the
        // nadir angle of every ray beats its zenith angle
        let vals = [
            0.0, 0.0, 0.0, 0.0, 0.0, //
            0.0, 2.0, 2.0, 2.0, 0.0, //
            0.0, 2.0, 3.0, 2.0, 0.0, //
            0.0, 2.0, 2.0, 2.0, 0.0, //
            0.0, 0.0, 0.0, 0.0, 0.0,
        ];
        let input = raster_from(&vals, 5, 5);
        let params = default_params(3, 5.0);
        let (pattern, pattern_size) = calc_pattern(&params, &input, 2, 2);
        assert_eq!(pattern_size, 8);
        assert_eq!(pattern.num_negatives, 8);
        assert_eq!(pattern.num_positives, 0);
        assert_eq!(
            determine_form(pattern.num_negatives, pattern.num_positives),
            2 // peak
        );
    }

    #[test]
    fn test_level_plane_is_flat() {
        let input = raster_from(&[5.0; 49], 7, 7);
        let params = default_params(3, 1.0);
        let (pattern, _) = calc_pattern(&params, &input, 3, 3);
        assert_eq!(pattern.num_positives, 0);
        assert_eq!(pattern.num_negatives, 0);
        assert_eq!(
            determine_form(pattern.num_negatives, pattern.num_positives),
            1 // flat
        );
    }

    #[test]
    fn test_rotated_dem_rotates_the_forms() {
        // a ridge running east-west...
        let mut vals = vec![0f64; 49];
        for r in 0..7 {
            for c in 0..7 {
                vals[r * 7 + c] = 10.0 - (r as f64 - 3.0).abs() * 3.0;
            }
        }
        let input = raster_from(&vals, 7, 7);
        // ...and the same ridge rotated to run north-south
        let mut rot = vec![0f64; 49];
        for r in 0..7 {
            for c in 0..7 {
                rot[c * 7 + (6 - r)] = vals[r * 7 + c];
            }
        }
        let rotated = raster_from(&rot, 7, 7);

        let params = default_params(3, 1.0);
        let (p1, s1) = calc_pattern(&params, &input, 3, 3);
        let (p2, s2) = calc_pattern(&params, &rotated, 3, 3);
        assert_eq!(s1, s2);
        assert_eq!(p1.num_positives, p2.num_positives);
        assert_eq!(p1.num_negatives, p2.num_negatives);
        // the canonical ternary codes agree
        let gtc = generate_ternary_codes();
        assert_eq!(gtc[p1.ternary_code()], gtc[p2.ternary_code()]);
    }

    #[test]
    fn test_compare_multi_priorities() {
        let t = 0.1;
        // neither over threshold: flat
        assert_eq!(compare_multi(0.05, 0.05, t, t, 0.0, 0.0), 0);
        // only zenith over
        assert_eq!(compare_multi(0.05, 0.5, t, t, 0.0, 0.0), 1);
        // only nadir over
        assert_eq!(compare_multi(0.5, 0.05, t, t, 0.0, 0.0), -1);
        // both over: larger angle wins
        assert_eq!(compare_multi(0.3, 0.5, t, t, 0.0, 0.0), 1);
        assert_eq!(compare_multi(0.5, 0.3, t, t, 0.0, 0.0), -1);
        // equal angles: greater distance wins
        assert_eq!(compare_multi(0.5, 0.5, t, t, 1.0, 2.0), 1);
        assert_eq!(compare_multi(0.5, 0.5, t, t, 2.0, 1.0), -1);
        // full tie resolves positive
        assert_eq!(compare_multi(0.5, 0.5, t, t, 1.0, 1.0), 1);
    }

    #[test]
    fn test_shape_of_symmetric_pattern() {
        let mut p = Pattern::new();
        p.distance = [2.0; 8];
        p.radial_to_cartesian();
        let (_, elongation, width) = p.shape(8);
        // a regular octagon is not elongated
        assert!((elongation - 1.0).abs() < 1e-6);
        assert!(width > 3.0 && width < 4.1);
        // and covers most of its circumscribing octagon
        let area = p.extends();
        let octagon = 4.0 * 2.0 * 2.0 * (45f64.to_radians()).sin();
        assert!((area / octagon - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_extended_correction_reclassifies_broad_shoulder() {
        // a broad plateau falling away at the far edges classifies as
        // shoulder-like at a large radius but is locally flat
        let n = 41;
        let mut vals = vec![50.0; n * n];
        for r in 0..n {
            for c in 0..n {
                let d = (((r as f64 - 20.0).powi(2) + (c as f64 - 20.0).powi(2)) as f64).sqrt();
                if d > 15.0 {
                    vals[r * n + c] = 50.0 - (d - 15.0) * 4.0;
                }
            }
        }
        let input = raster_from(&vals, n, n);
        let params = ScanParams {
            skip_cells: 0,
            search_distance: 18.0,
            flat_distance: 0f64,
            flat_threshold: 1f64.to_radians(),
            flat_threshold_height: 0f64,
            compmode: ComparisonMode::AngleV1,
        };
        let (_, _, uncorrected) = classify_cell(&params, &input, 20, 20, false, 1.0);
        let (_, _, corrected) = classify_cell(&params, &input, 20, 20, true, 1.0);
        // the wide-radius form is one of the unnatural broad forms
        assert!(uncorrected == 2 || uncorrected == 3 || uncorrected == 4 || uncorrected == 8);
        assert_eq!(corrected, 1); // locally flat
    }
}
