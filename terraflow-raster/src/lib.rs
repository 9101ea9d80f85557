/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

extern crate num_traits;

mod arcascii_raster;
mod esri_bil;
mod grass_raster;

use self::arcascii_raster::*;
use self::esri_bil::*;
use self::grass_raster::*;
use num_traits::cast::AsPrimitive;
use std::default::Default;
use std::f64;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::io::Error;
use std::io::ErrorKind;
use std::ops::{AddAssign, Index, IndexMut, SubAssign};
use std::path::Path;
use terraflow_common::structures::Array2D;
use terraflow_common::utils::Endianness;

/// Raster is a common data structure that abstracts over the supported
/// raster file formats (GRASS ASCII, Arc ASCII, and ESRI BIL). Cell values
/// are held as f64 regardless of the file data type; the `DataType` in the
/// configs drives the precision used when the file is written. NULL cells
/// carry the format's nodata sentinel, and reads beyond the grid edges
/// return nodata rather than failing.
///
/// Example:
///
/// ```ignore
/// // Read an existing raster file.
/// let input = Raster::new(&input_file, "r")?;
///
/// // Create a new raster with the dimensions and location of an existing one.
/// let mut output = Raster::initialize_using_file(&output_file, &input);
/// ```
#[derive(Default, Clone)]
pub struct Raster {
    pub file_name: String,
    pub file_mode: String,
    pub raster_type: RasterType,
    pub configs: RasterConfigs,
    pub(crate) data: Vec<f64>,
}

impl Index<(isize, isize)> for Raster {
    type Output = f64;

    fn index(&self, index: (isize, isize)) -> &f64 {
        let (row, column) = index;
        if row < 0
            || column < 0
            || row as usize >= self.configs.rows
            || column as usize >= self.configs.columns
        {
            return &self.configs.nodata;
        }
        &self.data[row as usize * self.configs.columns + column as usize]
    }
}

impl IndexMut<(isize, isize)> for Raster {
    fn index_mut(&mut self, index: (isize, isize)) -> &mut f64 {
        let (row, column) = index;
        if row < 0
            || column < 0
            || row as usize >= self.configs.rows
            || column as usize >= self.configs.columns
        {
            return &mut self.configs.nodata;
        }
        let idx = row as usize * self.configs.columns + column as usize;
        &mut self.data[idx]
    }
}

impl Raster {
    /// Creates an in-memory `Raster`, either read from an existing file
    /// (`file_mode` 'r') or prepared for new file creation (`file_mode` 'w').
    /// The format is determined from the file extension.
    pub fn new<'a>(file_name: &'a str, file_mode: &'a str) -> Result<Raster, Error> {
        let fm: String = file_mode.to_lowercase();
        let mut r = Raster {
            file_name: file_name.to_string(),
            file_mode: fm.clone(),
            raster_type: get_raster_type_from_file(file_name.to_string(), fm.clone()),
            ..Default::default()
        };
        if r.file_mode.contains("r") {
            match r.raster_type {
                RasterType::ArcAscii => {
                    read_arcascii(&r.file_name, &mut r.configs, &mut r.data)?;
                }
                RasterType::EsriBil => {
                    read_esri_bil(&r.file_name, &mut r.configs, &mut r.data)?;
                }
                RasterType::GrassAscii => {
                    read_grass_raster(&r.file_name, &mut r.configs, &mut r.data)?;
                }
                RasterType::Unknown => {
                    return Err(Error::new(ErrorKind::Other, "Unrecognized raster type"));
                }
            }
            r.update_min_max();
        }
        Ok(r)
    }

    /// Creates a new in-memory `Raster` with grid extent and location based
    /// on the specified `RasterConfigs`.
    pub fn initialize_using_config<'a>(file_name: &'a str, configs: &'a RasterConfigs) -> Raster {
        let mut output = Raster {
            file_name: file_name.to_string(),
            file_mode: "w".to_string(),
            raster_type: get_raster_type_from_file(file_name.to_string(), "w".to_string()),
            ..Default::default()
        };

        output.configs = configs.clone();
        output.configs.minimum = f64::INFINITY;
        output.configs.maximum = f64::NEG_INFINITY;
        output.configs.display_min = f64::INFINITY;
        output.configs.display_max = f64::NEG_INFINITY;
        output.configs.metadata = vec![];
        output.data = vec![output.configs.nodata; output.configs.rows * output.configs.columns];
        output
    }

    /// Creates a new in-memory `Raster` with grid extent and location based
    /// on an existing `Raster`.
    pub fn initialize_using_file<'a>(file_name: &'a str, input: &'a Raster) -> Raster {
        Raster::initialize_using_config(file_name, &input.configs)
    }

    /// Creates a new in-memory `Raster` from an `Array2D`, taking the
    /// region from the supplied configs and nodata from the array.
    pub fn initialize_using_array2d<'a, T: AsPrimitive<f64> + Copy + AddAssign + SubAssign>(
        file_name: &'a str,
        configs: &'a RasterConfigs,
        data: &'a Array2D<T>,
    ) -> Raster {
        let mut output = Raster::initialize_using_config(file_name, configs);
        output.configs.nodata = data.nodata().as_();
        for row in 0..output.configs.rows as isize {
            for col in 0..output.configs.columns as isize {
                output.set_value(row, col, data.get_value(row, col).as_());
            }
        }
        output
    }

    pub fn get_value(&self, row: isize, column: isize) -> f64 {
        self[(row, column)]
    }

    pub fn set_value(&mut self, row: isize, column: isize, value: f64) {
        if row >= 0
            && column >= 0
            && (row as usize) < self.configs.rows
            && (column as usize) < self.configs.columns
        {
            self.data[row as usize * self.configs.columns + column as usize] = value;
        }
    }

    pub fn increment(&mut self, row: isize, column: isize, value: f64) {
        if row >= 0
            && column >= 0
            && (row as usize) < self.configs.rows
            && (column as usize) < self.configs.columns
        {
            self.data[row as usize * self.configs.columns + column as usize] += value;
        }
    }

    pub fn decrement(&mut self, row: isize, column: isize, value: f64) {
        if row >= 0
            && column >= 0
            && (row as usize) < self.configs.rows
            && (column as usize) < self.configs.columns
        {
            self.data[row as usize * self.configs.columns + column as usize] -= value;
        }
    }

    pub fn get_row_data(&self, row: isize) -> Vec<f64> {
        let mut values: Vec<f64> = vec![self.configs.nodata; self.configs.columns];
        if row >= 0 && (row as usize) < self.configs.rows {
            let start = row as usize * self.configs.columns;
            values.copy_from_slice(&self.data[start..start + self.configs.columns]);
        }
        values
    }

    pub fn set_row_data(&mut self, row: isize, values: Vec<f64>) {
        if row < 0 || row as usize >= self.configs.rows {
            return;
        }
        for column in 0..values.len().min(self.configs.columns) {
            self.data[row as usize * self.configs.columns + column] = values[column];
        }
    }

    pub fn reinitialize_values(&mut self, value: f64) {
        self.data = vec![value; self.configs.rows * self.configs.columns];
    }

    pub fn num_cells(&self) -> usize {
        self.configs.rows * self.configs.columns
    }

    /// Returns the x-coordinate of a column's cell center.
    pub fn get_x_from_column(&self, column: isize) -> f64 {
        self.configs.west + self.configs.resolution_x / 2f64
            + column as f64 * self.configs.resolution_x
    }

    /// Returns the y-coordinate of a row's cell center.
    pub fn get_y_from_row(&self, row: isize) -> f64 {
        self.configs.north - self.configs.resolution_y / 2f64
            - row as f64 * self.configs.resolution_y
    }

    pub fn get_column_from_x(&self, x: f64) -> isize {
        ((x - self.configs.west) / self.configs.resolution_x).floor() as isize
    }

    pub fn get_row_from_y(&self, y: f64) -> isize {
        ((self.configs.north - y) / self.configs.resolution_y).floor() as isize
    }

    /// Tests whether the raster region appears to be in geographic
    /// (lat/long) coordinates rather than a projected system.
    pub fn is_in_geographic_coordinates(&self) -> bool {
        let proj = self.configs.projection.to_lowercase();
        if proj.contains("ll") || proj.contains("lat") || proj.contains("4326") {
            return true;
        }
        self.configs.epsg_code == 4326
            || (self.configs.west >= -180.0
                && self.configs.east <= 180.0
                && self.configs.south >= -90.0
                && self.configs.north <= 90.0
                && self.configs.resolution_x < 1.0
                && proj.contains("not specified"))
    }

    pub fn update_min_max(&mut self) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in &self.data {
            if *v != self.configs.nodata {
                if *v < min {
                    min = *v;
                }
                if *v > max {
                    max = *v;
                }
            }
        }
        self.configs.minimum = min;
        self.configs.maximum = max;
        if self.configs.display_min == f64::INFINITY {
            self.configs.display_min = min;
        }
        if self.configs.display_max == f64::NEG_INFINITY {
            self.configs.display_max = max;
        }
    }

    pub fn add_metadata_entry(&mut self, value: String) {
        self.configs.metadata.push(value);
    }

    pub fn write(&mut self) -> Result<(), Error> {
        if self.file_mode == "r" {
            return Err(Error::new(
                ErrorKind::Other,
                "The file was opened in read-only mode.",
            ));
        }
        self.update_min_max();
        match self.raster_type {
            RasterType::ArcAscii => write_arcascii(self)?,
            RasterType::EsriBil => write_esri_bil(self)?,
            RasterType::GrassAscii => write_grass_raster(self)?,
            RasterType::Unknown => {
                return Err(Error::new(ErrorKind::Other, "Unrecognized raster type"));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct RasterConfigs {
    pub title: String,
    pub rows: usize,
    pub columns: usize,
    pub bands: u8,
    pub nodata: f64,
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub resolution_x: f64,
    pub resolution_y: f64,
    pub minimum: f64,
    pub maximum: f64,
    pub display_min: f64,
    pub display_max: f64,
    pub palette: String,
    pub projection: String,
    pub endian: Endianness,
    pub photometric_interp: PhotometricInterpretation,
    pub data_type: DataType,
    pub z_units: String,
    pub xy_units: String,
    pub epsg_code: u16,
    pub metadata: Vec<String>,
}

impl Default for RasterConfigs {
    fn default() -> RasterConfigs {
        RasterConfigs {
            title: String::from(""),
            rows: 0,
            columns: 0,
            bands: 1,
            nodata: -32768.0,
            north: f64::NEG_INFINITY,
            south: f64::INFINITY,
            east: f64::NEG_INFINITY,
            west: f64::INFINITY,
            resolution_x: f64::NEG_INFINITY,
            resolution_y: f64::NEG_INFINITY,
            minimum: f64::INFINITY,
            maximum: f64::NEG_INFINITY,
            display_min: f64::INFINITY,
            display_max: f64::NEG_INFINITY,
            palette: "not specified".to_string(),
            projection: "not specified".to_string(),
            endian: Endianness::LittleEndian,
            photometric_interp: PhotometricInterpretation::Unknown,
            data_type: DataType::Unknown,
            z_units: "not specified".to_string(),
            xy_units: "not specified".to_string(),
            epsg_code: 0u16,
            metadata: vec![],
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Copy)]
pub enum RasterType {
    #[default]
    Unknown,
    ArcAscii,
    EsriBil,
    GrassAscii,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum DataType {
    F64,
    F32,
    I32,
    #[default]
    Unknown,
}

impl DataType {
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F64 | DataType::F32)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum PhotometricInterpretation {
    Continuous,
    Categorical,
    Boolean,
    #[default]
    Unknown,
}

fn get_raster_type_from_file(file_name: String, file_mode: String) -> RasterType {
    let extension: String = match Path::new(&file_name).extension() {
        Some(n) => n.to_str().unwrap_or("").to_lowercase(),
        None => "".to_string(),
    };
    if extension == "bil" {
        return RasterType::EsriBil;
    } else if extension == "grd" {
        return RasterType::GrassAscii;
    } else if extension == "asc" || extension == "txt" || extension.is_empty() {
        if file_mode == "r" {
            // It could be an ArcAscii or a GrassAscii; sniff the header.
            if let Ok(f) = File::open(&file_name) {
                let file = BufReader::new(&f);
                for line in file.lines().take(8).flatten() {
                    if line.contains("north:")
                        || line.contains("south:")
                        || line.contains("east:")
                        || line.contains("west:")
                    {
                        return RasterType::GrassAscii;
                    }
                    if line.contains("xllcorner")
                        || line.contains("yllcorner")
                        || line.contains("cellsize")
                    {
                        return RasterType::ArcAscii;
                    }
                }
            }
        }
        return RasterType::ArcAscii;
    }
    RasterType::Unknown
}

#[cfg(test)]
mod test {
    use super::{Raster, RasterConfigs};

    fn small_configs() -> RasterConfigs {
        RasterConfigs {
            rows: 3,
            columns: 3,
            north: 3.0,
            south: 0.0,
            east: 3.0,
            west: 0.0,
            resolution_x: 1.0,
            resolution_y: 1.0,
            nodata: -32768.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_out_of_grid_reads_return_nodata() {
        let r = Raster::initialize_using_config("test.asc", &small_configs());
        assert_eq!(r.get_value(-1, 0), r.configs.nodata);
        assert_eq!(r.get_value(0, 3), r.configs.nodata);
    }

    #[test]
    fn test_map_coordinate_conversion() {
        let r = Raster::initialize_using_config("test.asc", &small_configs());
        assert_eq!(r.get_x_from_column(0), 0.5);
        assert_eq!(r.get_y_from_row(0), 2.5);
        assert_eq!(r.get_column_from_x(2.5), 2);
        assert_eq!(r.get_row_from_y(0.5), 2);
    }
}
