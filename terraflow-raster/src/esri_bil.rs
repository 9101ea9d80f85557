use super::*;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::f64;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Error;
use std::io::ErrorKind;
use terraflow_common::utils::{ByteOrderReader, Endianness};

pub fn read_esri_bil(
    file_name: &String,
    configs: &mut RasterConfigs,
    data: &mut Vec<f64>,
) -> Result<(), Error> {
    // read the header file
    let header_file = Path::new(&file_name).with_extension("hdr");
    let f = File::open(header_file)?;
    let f = BufReader::new(f);

    let mut nbits = 32usize;
    let mut is_float = false;
    let mut ulxmap = 0f64;
    let mut ulymap = 0f64;
    configs.nodata = -32768f64; // in case the header carries no nodata key
    configs.endian = Endianness::LittleEndian;
    for line in f.lines() {
        let line_unwrapped = line?;
        let mut parts = line_unwrapped.split_whitespace();
        let key = match parts.next() {
            Some(k) => k.to_lowercase(),
            None => continue,
        };
        let value = match parts.next() {
            Some(v) => v.to_string(),
            None => continue,
        };
        if key.contains("byteorder") {
            if value.to_lowercase().contains("m") {
                configs.endian = Endianness::BigEndian;
            }
        } else if key.contains("nrows") {
            configs.rows = value.parse::<f32>().unwrap() as usize;
        } else if key.contains("ncols") {
            configs.columns = value.parse::<f32>().unwrap() as usize;
        } else if key.contains("nbands") {
            if value.parse::<f32>().unwrap() as usize > 1 {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    "Only single-band BIL files are supported.",
                ));
            }
        } else if key.contains("nbits") {
            nbits = value.parse::<f32>().unwrap() as usize;
        } else if key.contains("pixeltype") {
            is_float = value.to_lowercase().contains("float");
        } else if key.contains("ulxmap") {
            ulxmap = value.parse::<f64>().unwrap();
        } else if key.contains("ulymap") {
            ulymap = value.parse::<f64>().unwrap();
        } else if key.contains("xdim") {
            configs.resolution_x = value.parse::<f64>().unwrap();
        } else if key.contains("ydim") {
            configs.resolution_y = value.parse::<f64>().unwrap();
        } else if key.contains("nodata") {
            configs.nodata = value.parse::<f64>().unwrap();
        }
    }

    configs.data_type = match (nbits, is_float) {
        (64, true) => DataType::F64,
        (32, true) => DataType::F32,
        (32, false) => DataType::I32,
        _ => {
            return Err(Error::new(
                ErrorKind::InvalidData,
                format!("Unsupported BIL bit depth ({} bits).", nbits),
            ));
        }
    };

    configs.north = ulymap + configs.resolution_y / 2.0;
    configs.west = ulxmap - configs.resolution_x / 2.0;
    configs.south = configs.north - configs.rows as f64 * configs.resolution_y;
    configs.east = configs.west + configs.columns as f64 * configs.resolution_x;

    // read the data file
    let f = File::open(file_name)?;
    let mut reader = ByteOrderReader::new(BufReader::new(f), configs.endian);
    let num_cells = configs.rows * configs.columns;
    data.reserve(num_cells);
    match configs.data_type {
        DataType::F64 => {
            for _ in 0..num_cells {
                data.push(reader.read_f64()?);
            }
        }
        DataType::F32 => {
            for _ in 0..num_cells {
                data.push(reader.read_f32()? as f64);
            }
        }
        _ => {
            for _ in 0..num_cells {
                data.push(reader.read_i32()? as f64);
            }
        }
    }

    configs.photometric_interp = PhotometricInterpretation::Continuous;

    Ok(())
}

pub fn write_esri_bil<'a>(r: &'a mut Raster) -> Result<(), Error> {
    // write the header file
    let header_file = Path::new(&r.file_name).with_extension("hdr");
    let f = File::create(header_file)?;
    let mut writer = BufWriter::new(f);

    match r.configs.endian {
        Endianness::LittleEndian => writer.write_all("BYTEORDER      I\n".as_bytes())?,
        Endianness::BigEndian => writer.write_all("BYTEORDER      M\n".as_bytes())?,
    }
    writer.write_all("LAYOUT         BIL\n".as_bytes())?;
    writer.write_all(format!("NROWS          {}\n", r.configs.rows).as_bytes())?;
    writer.write_all(format!("NCOLS          {}\n", r.configs.columns).as_bytes())?;
    writer.write_all("NBANDS         1\n".as_bytes())?;
    let (nbits, pixeltype) = match r.configs.data_type {
        DataType::F64 => (64, "FLOAT"),
        DataType::F32 => (32, "FLOAT"),
        _ => (32, "SIGNEDINT"),
    };
    writer.write_all(format!("NBITS          {}\n", nbits).as_bytes())?;
    writer.write_all(format!("PIXELTYPE      {}\n", pixeltype).as_bytes())?;
    writer.write_all(
        format!(
            "ULXMAP         {}\n",
            r.configs.west + r.configs.resolution_x / 2.0
        )
        .as_bytes(),
    )?;
    writer.write_all(
        format!(
            "ULYMAP         {}\n",
            r.configs.north - r.configs.resolution_y / 2.0
        )
        .as_bytes(),
    )?;
    writer.write_all(format!("XDIM           {}\n", r.configs.resolution_x).as_bytes())?;
    writer.write_all(format!("YDIM           {}\n", r.configs.resolution_y).as_bytes())?;
    writer.write_all(format!("NODATA         {}\n", r.configs.nodata).as_bytes())?;
    let _ = writer.flush();

    // write the data file
    let f = File::create(&r.file_name)?;
    let mut writer = BufWriter::new(f);
    match r.configs.endian {
        Endianness::LittleEndian => match r.configs.data_type {
            DataType::F64 => {
                for v in &r.data {
                    writer.write_f64::<LittleEndian>(*v)?;
                }
            }
            DataType::F32 => {
                for v in &r.data {
                    writer.write_f32::<LittleEndian>(*v as f32)?;
                }
            }
            _ => {
                for v in &r.data {
                    writer.write_i32::<LittleEndian>(*v as i32)?;
                }
            }
        },
        Endianness::BigEndian => match r.configs.data_type {
            DataType::F64 => {
                for v in &r.data {
                    writer.write_f64::<BigEndian>(*v)?;
                }
            }
            DataType::F32 => {
                for v in &r.data {
                    writer.write_f32::<BigEndian>(*v as f32)?;
                }
            }
            _ => {
                for v in &r.data {
                    writer.write_i32::<BigEndian>(*v as i32)?;
                }
            }
        },
    }
    let _ = writer.flush();

    Ok(())
}
