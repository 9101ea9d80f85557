/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

pub mod attributes;
pub mod geometry;

use crate::shapefile::attributes::*;
use crate::shapefile::geometry::*;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use chrono::prelude::*;
use std::f64;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufWriter;
use std::io::{Error, ErrorKind};
use std::path::Path;
use terraflow_common::structures::Point2D;
use terraflow_common::utils::{ByteOrderReader, Endianness};

#[derive(Default, Clone, Debug)]
pub struct ShapefileHeader {
    pub file_length: i32,
    pub version: i32,
    pub shape_type: ShapeType,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub m_min: f64,
    pub m_max: f64,
}

/// An ESRI Shapefile, comprising the .shp geometry, the .shx index and the
/// .dbf attribute table. Files are held fully in memory; `write` emits all
/// three sidecars (plus a .prj when a projection string is present).
#[derive(Default, Clone)]
pub struct Shapefile {
    pub file_name: String,
    pub file_mode: String,
    pub header: ShapefileHeader,
    pub num_records: usize,
    pub records: Vec<ShapefileGeometry>,
    pub attributes: ShapefileAttributes,
    pub projection: String,
}

impl Shapefile {
    pub fn read<'a>(file_name: &'a str) -> Result<Shapefile, Error> {
        let mut sf = Shapefile {
            file_name: file_name.to_string(),
            file_mode: "r".to_string(),
            ..Default::default()
        };
        sf.read_shp()?;
        sf.read_dbf()?;
        Ok(sf)
    }

    pub fn new<'a>(file_name: &'a str, shape_type: ShapeType) -> Result<Shapefile, Error> {
        let mut sf = Shapefile {
            file_name: file_name.to_string(),
            file_mode: "w".to_string(),
            ..Default::default()
        };
        sf.header.shape_type = shape_type;
        sf.header.version = 1000;
        Ok(sf)
    }

    pub fn initialize_using_file<'a>(
        file_name: &'a str,
        other: &'a Shapefile,
        shape_type: ShapeType,
        copy_fields: bool,
    ) -> Result<Shapefile, Error> {
        let mut sf = Shapefile::new(file_name, shape_type)?;
        sf.projection = other.projection.clone();
        if copy_fields {
            for field in &other.attributes.fields {
                sf.attributes.add_field(field);
            }
        }
        Ok(sf)
    }

    pub fn get_record<'a>(&'a self, index: usize) -> &'a ShapefileGeometry {
        if index >= self.records.len() {
            panic!("Record index out of bounds");
        }
        &self.records[index]
    }

    pub fn add_record(&mut self, geometry: ShapefileGeometry) {
        self.records.push(geometry);
        self.num_records += 1;
    }

    pub fn add_point_record(&mut self, x: f64, y: f64) {
        let mut sfg = ShapefileGeometry::new(self.header.shape_type);
        sfg.points.push(Point2D::new(x, y));
        sfg.num_points = 1;
        sfg.x_min = x;
        sfg.x_max = x;
        sfg.y_min = y;
        sfg.y_max = y;
        self.records.push(sfg);
        self.num_records += 1;
    }

    fn read_shp(&mut self) -> Result<(), Error> {
        let f = File::open(&self.file_name)?;
        let mut reader = ByteOrderReader::new(f, Endianness::BigEndian);

        let magic = reader.read_i32()?;
        if magic != 9994 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("{} is not a valid shapefile.", self.file_name),
            ));
        }
        reader.inc_pos(20); // unused bytes
        self.header.file_length = reader.read_i32()?;
        reader.set_byte_order(Endianness::LittleEndian);
        self.header.version = reader.read_i32()?;
        self.header.shape_type = ShapeType::from_int(reader.read_i32()?);
        self.header.x_min = reader.read_f64()?;
        self.header.y_min = reader.read_f64()?;
        self.header.x_max = reader.read_f64()?;
        self.header.y_max = reader.read_f64()?;
        self.header.z_min = reader.read_f64()?;
        self.header.z_max = reader.read_f64()?;
        self.header.m_min = reader.read_f64()?;
        self.header.m_max = reader.read_f64()?;

        let file_length_bytes = self.header.file_length as usize * 2;
        while reader.pos() < file_length_bytes {
            reader.set_byte_order(Endianness::BigEndian);
            reader.read_i32()?; // record number
            let content_length = reader.read_i32()?;
            reader.set_byte_order(Endianness::LittleEndian);
            let record_shape = ShapeType::from_int(reader.read_i32()?);
            let mut sfg = ShapefileGeometry::new(record_shape);
            match record_shape {
                ShapeType::Null => {}
                ShapeType::Point => {
                    let x = reader.read_f64()?;
                    let y = reader.read_f64()?;
                    sfg.points.push(Point2D::new(x, y));
                    sfg.num_points = 1;
                }
                ShapeType::PointZ => {
                    let x = reader.read_f64()?;
                    let y = reader.read_f64()?;
                    sfg.points.push(Point2D::new(x, y));
                    sfg.z_array.push(reader.read_f64()?);
                    reader.read_f64()?; // measure
                    sfg.num_points = 1;
                }
                ShapeType::PolyLine | ShapeType::Polygon => {
                    sfg.x_min = reader.read_f64()?;
                    sfg.y_min = reader.read_f64()?;
                    sfg.x_max = reader.read_f64()?;
                    sfg.y_max = reader.read_f64()?;
                    sfg.num_parts = reader.read_i32()?;
                    sfg.num_points = reader.read_i32()?;
                    for _ in 0..sfg.num_parts {
                        sfg.parts.push(reader.read_i32()?);
                    }
                    for _ in 0..sfg.num_points {
                        let x = reader.read_f64()?;
                        let y = reader.read_f64()?;
                        sfg.points.push(Point2D::new(x, y));
                    }
                }
                ShapeType::PolyLineZ | ShapeType::PolygonZ => {
                    sfg.x_min = reader.read_f64()?;
                    sfg.y_min = reader.read_f64()?;
                    sfg.x_max = reader.read_f64()?;
                    sfg.y_max = reader.read_f64()?;
                    sfg.num_parts = reader.read_i32()?;
                    sfg.num_points = reader.read_i32()?;
                    for _ in 0..sfg.num_parts {
                        sfg.parts.push(reader.read_i32()?);
                    }
                    for _ in 0..sfg.num_points {
                        let x = reader.read_f64()?;
                        let y = reader.read_f64()?;
                        sfg.points.push(Point2D::new(x, y));
                    }
                    sfg.z_min = reader.read_f64()?;
                    sfg.z_max = reader.read_f64()?;
                    for _ in 0..sfg.num_points {
                        sfg.z_array.push(reader.read_f64()?);
                    }
                    // the measure block is optional; skip it if present
                    let consumed = 4 + 32 + 8 + sfg.num_parts * 4 + sfg.num_points * 16
                        + 16
                        + sfg.num_points * 8;
                    let remaining = content_length * 2 - consumed;
                    if remaining > 0 {
                        reader.inc_pos(remaining as usize);
                    }
                }
            }
            self.records.push(sfg);
        }
        self.num_records = self.records.len();

        Ok(())
    }

    fn read_dbf(&mut self) -> Result<(), Error> {
        let dbf_file = Path::new(&self.file_name).with_extension("dbf");
        let f = match File::open(dbf_file) {
            Ok(f) => f,
            Err(_) => return Ok(()), // attribute table is optional on read
        };
        let mut reader = ByteOrderReader::new(f, Endianness::LittleEndian);

        reader.inc_pos(4); // version and date
        let num_records = reader.read_u32()? as usize;
        let header_size = reader.read_u16()? as usize;
        let record_size = reader.read_u16()? as usize;
        reader.inc_pos(20);

        let num_fields = (header_size - 33) / 32;
        for _ in 0..num_fields {
            let name = reader
                .read_utf8(11)
                .trim_end_matches(char::from(0))
                .to_string();
            let type_char = reader.read_u8()? as char;
            reader.inc_pos(4);
            let field_length = reader.read_u8()?;
            let decimal_count = reader.read_u8()?;
            reader.inc_pos(14);
            let field_type = match type_char {
                'N' => {
                    if decimal_count == 0 {
                        FieldDataType::Int
                    } else {
                        FieldDataType::Real
                    }
                }
                'F' => FieldDataType::Real,
                'D' => FieldDataType::Date,
                'L' => FieldDataType::Bool,
                _ => FieldDataType::Text,
            };
            self.attributes
                .add_field(&AttributeField::new(&name, field_type, field_length, decimal_count));
        }

        reader.seek(header_size);
        for _ in 0..num_records {
            let flag = reader.read_u8()?;
            let deleted = flag == 0x2A;
            let mut record: Vec<FieldData> = Vec::with_capacity(num_fields);
            for field in self.attributes.fields.clone() {
                let raw = reader.read_utf8(field.field_length as usize);
                let trimmed = raw.trim().to_string();
                let value = if trimmed.is_empty() {
                    FieldData::Null
                } else {
                    match field.field_type {
                        FieldDataType::Int => trimmed
                            .parse::<i32>()
                            .map(FieldData::Int)
                            .unwrap_or(FieldData::Null),
                        FieldDataType::Real => trimmed
                            .parse::<f64>()
                            .map(FieldData::Real)
                            .unwrap_or(FieldData::Null),
                        FieldDataType::Bool => {
                            FieldData::Bool(trimmed.contains('T') || trimmed.contains('Y'))
                        }
                        _ => FieldData::Text(trimmed),
                    }
                };
                record.push(value);
            }
            // keep record sizes consistent even when a row is short
            let _ = record_size;
            self.attributes.add_record(record, deleted);
        }

        Ok(())
    }

    fn calculate_extent(&mut self) {
        self.header.x_min = f64::INFINITY;
        self.header.x_max = f64::NEG_INFINITY;
        self.header.y_min = f64::INFINITY;
        self.header.y_max = f64::NEG_INFINITY;
        self.header.z_min = 0f64;
        self.header.z_max = 0f64;
        self.header.m_min = 0f64;
        self.header.m_max = 0f64;
        let has_z = self.header.shape_type.dimension() == 3;
        if has_z {
            self.header.z_min = f64::INFINITY;
            self.header.z_max = f64::NEG_INFINITY;
        }
        for sg in &self.records {
            match sg.shape_type.base_shape_type() {
                ShapeType::Point => {
                    if !sg.points.is_empty() {
                        let p = sg.points[0];
                        if p.x < self.header.x_min {
                            self.header.x_min = p.x;
                        }
                        if p.x > self.header.x_max {
                            self.header.x_max = p.x;
                        }
                        if p.y < self.header.y_min {
                            self.header.y_min = p.y;
                        }
                        if p.y > self.header.y_max {
                            self.header.y_max = p.y;
                        }
                    }
                }
                _ => {
                    if sg.x_min < self.header.x_min {
                        self.header.x_min = sg.x_min;
                    }
                    if sg.x_max > self.header.x_max {
                        self.header.x_max = sg.x_max;
                    }
                    if sg.y_min < self.header.y_min {
                        self.header.y_min = sg.y_min;
                    }
                    if sg.y_max > self.header.y_max {
                        self.header.y_max = sg.y_max;
                    }
                }
            }
            if has_z && sg.has_z_data() {
                if sg.z_min < self.header.z_min {
                    self.header.z_min = sg.z_min;
                }
                if sg.z_max > self.header.z_max {
                    self.header.z_max = sg.z_max;
                }
            }
        }
    }

    pub fn write(&mut self) -> Result<(), Error> {
        if self.file_mode == "r" {
            return Err(Error::new(
                ErrorKind::Other,
                "The file was opened in read-only mode.",
            ));
        }
        self.num_records = self.records.len();
        if self.num_records == 0 {
            return Err(Error::new(
                ErrorKind::Other,
                "The file does not currently contain any record data.",
            ));
        }

        /////////////////////////////////////////
        // Write the geometry data (.shp file) //
        /////////////////////////////////////////
        let f = File::create(&self.file_name)?;
        let mut writer = BufWriter::new(f);

        // magic number
        writer.write_i32::<BigEndian>(9994i32)?;
        for _ in 0..5 {
            writer.write_i32::<BigEndian>(0i32)?;
        }

        // file size, in 16-bit words
        let mut size = 100i32;
        for i in 0..self.num_records {
            size += 8 + self.records[i].get_length();
        }
        writer.write_i32::<BigEndian>(size / 2)?;

        writer.write_i32::<LittleEndian>(1000i32)?; // version
        writer.write_i32::<LittleEndian>(self.header.shape_type.to_int())?;

        self.calculate_extent();
        writer.write_f64::<LittleEndian>(self.header.x_min)?;
        writer.write_f64::<LittleEndian>(self.header.y_min)?;
        writer.write_f64::<LittleEndian>(self.header.x_max)?;
        writer.write_f64::<LittleEndian>(self.header.y_max)?;
        writer.write_f64::<LittleEndian>(self.header.z_min)?;
        writer.write_f64::<LittleEndian>(self.header.z_max)?;
        writer.write_f64::<LittleEndian>(self.header.m_min)?;
        writer.write_f64::<LittleEndian>(self.header.m_max)?;

        for i in 0..self.num_records {
            let sg = &self.records[i];
            writer.write_i32::<BigEndian>(i as i32 + 1)?; // record number
            writer.write_i32::<BigEndian>(sg.get_length() / 2)?; // content length in 16-bit words
            writer.write_i32::<LittleEndian>(sg.shape_type.to_int())?;
            match sg.shape_type {
                ShapeType::Null => {}
                ShapeType::Point => {
                    writer.write_f64::<LittleEndian>(sg.points[0].x)?;
                    writer.write_f64::<LittleEndian>(sg.points[0].y)?;
                }
                ShapeType::PointZ => {
                    writer.write_f64::<LittleEndian>(sg.points[0].x)?;
                    writer.write_f64::<LittleEndian>(sg.points[0].y)?;
                    writer.write_f64::<LittleEndian>(sg.z_array[0])?;
                    writer.write_f64::<LittleEndian>(0f64)?; // measure
                }
                ShapeType::PolyLine | ShapeType::Polygon => {
                    writer.write_f64::<LittleEndian>(sg.x_min)?;
                    writer.write_f64::<LittleEndian>(sg.y_min)?;
                    writer.write_f64::<LittleEndian>(sg.x_max)?;
                    writer.write_f64::<LittleEndian>(sg.y_max)?;
                    writer.write_i32::<LittleEndian>(sg.num_parts)?;
                    writer.write_i32::<LittleEndian>(sg.num_points)?;
                    for part in &sg.parts {
                        writer.write_i32::<LittleEndian>(*part)?;
                    }
                    for pt in &sg.points {
                        writer.write_f64::<LittleEndian>(pt.x)?;
                        writer.write_f64::<LittleEndian>(pt.y)?;
                    }
                }
                ShapeType::PolyLineZ | ShapeType::PolygonZ => {
                    writer.write_f64::<LittleEndian>(sg.x_min)?;
                    writer.write_f64::<LittleEndian>(sg.y_min)?;
                    writer.write_f64::<LittleEndian>(sg.x_max)?;
                    writer.write_f64::<LittleEndian>(sg.y_max)?;
                    writer.write_i32::<LittleEndian>(sg.num_parts)?;
                    writer.write_i32::<LittleEndian>(sg.num_points)?;
                    for part in &sg.parts {
                        writer.write_i32::<LittleEndian>(*part)?;
                    }
                    for pt in &sg.points {
                        writer.write_f64::<LittleEndian>(pt.x)?;
                        writer.write_f64::<LittleEndian>(pt.y)?;
                    }
                    writer.write_f64::<LittleEndian>(sg.z_min)?;
                    writer.write_f64::<LittleEndian>(sg.z_max)?;
                    for z in &sg.z_array {
                        writer.write_f64::<LittleEndian>(*z)?;
                    }
                }
            }
        }
        writer.flush()?;

        //////////////////////////////////
        // Write the index file (.shx)  //
        //////////////////////////////////
        let shx_file = Path::new(&self.file_name).with_extension("shx");
        let f = File::create(shx_file)?;
        let mut writer = BufWriter::new(f);

        writer.write_i32::<BigEndian>(9994i32)?;
        for _ in 0..5 {
            writer.write_i32::<BigEndian>(0i32)?;
        }
        writer.write_i32::<BigEndian>((100 + self.num_records as i32 * 8) / 2)?;
        writer.write_i32::<LittleEndian>(1000i32)?;
        writer.write_i32::<LittleEndian>(self.header.shape_type.to_int())?;
        writer.write_f64::<LittleEndian>(self.header.x_min)?;
        writer.write_f64::<LittleEndian>(self.header.y_min)?;
        writer.write_f64::<LittleEndian>(self.header.x_max)?;
        writer.write_f64::<LittleEndian>(self.header.y_max)?;
        writer.write_f64::<LittleEndian>(self.header.z_min)?;
        writer.write_f64::<LittleEndian>(self.header.z_max)?;
        writer.write_f64::<LittleEndian>(self.header.m_min)?;
        writer.write_f64::<LittleEndian>(self.header.m_max)?;

        let mut offset = 50i32; // in 16-bit words
        for i in 0..self.num_records {
            let content_length = self.records[i].get_length() / 2;
            writer.write_i32::<BigEndian>(offset)?;
            writer.write_i32::<BigEndian>(content_length)?;
            offset += 4 + content_length;
        }
        writer.flush()?;

        ////////////////////////////////////
        // Write the attributes (.dbf)    //
        ////////////////////////////////////
        let dbf_file = Path::new(&self.file_name).with_extension("dbf");
        let f = File::create(dbf_file)?;
        let mut writer = BufWriter::new(f);

        writer.write_u8(0x03)?; // dBASE III, no memo
        let now = Local::now();
        writer.write_u8((now.year() - 1900) as u8)?;
        writer.write_u8(now.month() as u8)?;
        writer.write_u8(now.day() as u8)?;
        writer.write_u32::<LittleEndian>(self.attributes.num_records() as u32)?;
        let header_size = 32 + self.attributes.num_fields() * 32 + 1;
        writer.write_u16::<LittleEndian>(header_size as u16)?;
        writer.write_u16::<LittleEndian>(self.attributes.record_length() as u16)?;
        for _ in 0..20 {
            writer.write_u8(0u8)?;
        }

        for field in &self.attributes.fields {
            let mut name_bytes = field.name.clone().into_bytes();
            name_bytes.resize(11, 0u8);
            writer.write_all(&name_bytes)?;
            writer.write_u8(field.field_type.to_char() as u8)?;
            writer.write_u32::<LittleEndian>(0u32)?;
            writer.write_u8(field.field_length)?;
            writer.write_u8(field.decimal_count)?;
            for _ in 0..14 {
                writer.write_u8(0u8)?;
            }
        }
        writer.write_u8(0x0D)?; // header terminator

        for i in 0..self.attributes.num_records() {
            if self.attributes.is_deleted(i) {
                writer.write_u8(0x2A)?;
            } else {
                writer.write_u8(0x20)?;
            }
            let record = self.attributes.get_record(i);
            for (j, field) in self.attributes.fields.iter().enumerate() {
                let width = field.field_length as usize;
                let s = match &record[j] {
                    FieldData::Int(v) => format!("{:>width$}", v, width = width),
                    FieldData::Real(v) => {
                        format!("{:>w$.p$}", v, w = width, p = field.decimal_count as usize)
                    }
                    FieldData::Text(v) => format!("{:<width$}", v, width = width),
                    FieldData::Bool(v) => {
                        format!("{:<width$}", if *v { "T" } else { "F" }, width = width)
                    }
                    FieldData::Null => " ".repeat(width),
                };
                let mut bytes = s.into_bytes();
                bytes.resize(width, 0x20);
                writer.write_all(&bytes)?;
            }
        }
        writer.write_u8(0x1A)?; // end of file
        writer.flush()?;

        ////////////////////////////////////
        // Write the projection (.prj)    //
        ////////////////////////////////////
        if !self.projection.is_empty() {
            let prj_file = Path::new(&self.file_name).with_extension("prj");
            let f = File::create(prj_file)?;
            let mut writer = BufWriter::new(f);
            writer.write_all(self.projection.as_bytes())?;
            writer.flush()?;
        }

        Ok(())
    }
}
