use super::*;
use std::f64;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Error;

pub fn read_grass_raster(
    file_name: &String,
    configs: &mut RasterConfigs,
    data: &mut Vec<f64>,
) -> Result<(), Error> {
    let f = File::open(file_name)?;
    let f = BufReader::new(f);

    let mut multiplier = 1.0;
    let mut null_str = String::from("*");
    let mut null_is_str = true;
    configs.nodata = -32768.0f64;
    for line in f.lines() {
        let line_unwrapped = line?;
        let vec = line_unwrapped.split(":").collect::<Vec<&str>>();
        let key = vec[0].to_lowercase();
        if vec.len() > 1 && key.contains("rows") {
            configs.rows = vec[1].trim().parse::<f32>().unwrap() as usize;
            if configs.columns > 0 {
                data.reserve(configs.rows * configs.columns);
            }
        } else if vec.len() > 1 && key.contains("cols") {
            configs.columns = vec[1].trim().parse::<f32>().unwrap() as usize;
            if configs.rows > 0 {
                data.reserve(configs.rows * configs.columns);
            }
        } else if vec.len() > 1 && key.contains("north") {
            configs.north = vec[1].trim().parse::<f64>().unwrap();
        } else if vec.len() > 1 && key.contains("south") {
            configs.south = vec[1].trim().parse::<f64>().unwrap();
        } else if vec.len() > 1 && key.contains("east") {
            configs.east = vec[1].trim().parse::<f64>().unwrap();
        } else if vec.len() > 1 && key.contains("west") {
            configs.west = vec[1].trim().parse::<f64>().unwrap();
        } else if vec.len() > 1 && key.contains("proj") {
            configs.projection = vec[1].trim().to_string();
        } else if vec.len() > 1 && key.contains("null") {
            if is_number(vec[1].trim()) {
                configs.nodata = vec[1].trim().parse::<f64>().unwrap();
                null_is_str = false;
            } else {
                null_str = vec[1].trim().to_string();
                null_is_str = true;
            }
        } else if vec.len() > 1 && key.contains("type") {
            if vec[1].contains("double") {
                configs.data_type = DataType::F64;
            } else if vec[1].contains("float") {
                configs.data_type = DataType::F32;
            } else {
                configs.data_type = DataType::I32;
            }
        } else if vec.len() > 1 && key.contains("multiplier") {
            multiplier = vec[1].trim().parse::<f64>().unwrap();
        } else {
            // it's a data line
            for val in line_unwrapped.split_whitespace() {
                let val = val.trim();
                if null_is_str && val == null_str {
                    data.push(configs.nodata);
                } else {
                    let val_num = val.parse::<f64>().unwrap();
                    if val_num != configs.nodata {
                        data.push(val_num * multiplier);
                    } else {
                        data.push(val_num);
                    }
                }
            }
        }
    }

    if configs.rows > 0 && configs.columns > 0 {
        configs.resolution_y = (configs.north - configs.south) / configs.rows as f64;
        configs.resolution_x = (configs.east - configs.west) / configs.columns as f64;
    }

    configs.photometric_interp = PhotometricInterpretation::Continuous;

    Ok(())
}

pub fn write_grass_raster<'a>(r: &'a mut Raster) -> Result<(), Error> {
    let f = File::create(&r.file_name)?;
    let mut writer = BufWriter::new(f);

    writer.write_all(format!("north: {:.2}\n", r.configs.north).as_bytes())?;
    writer.write_all(format!("south: {:.2}\n", r.configs.south).as_bytes())?;
    writer.write_all(format!("east: {:.2}\n", r.configs.east).as_bytes())?;
    writer.write_all(format!("west: {:.2}\n", r.configs.west).as_bytes())?;
    writer.write_all(format!("rows: {}\n", r.configs.rows).as_bytes())?;
    writer.write_all(format!("cols: {}\n", r.configs.columns).as_bytes())?;

    let decimals = if r.configs.data_type.is_float() { 2 } else { 0 };
    writer.write_all(format!("null: {:.*}\n", decimals, r.configs.nodata).as_bytes())?;

    match r.configs.data_type {
        DataType::F64 => writer.write_all("type: double\n".as_bytes())?,
        DataType::F32 => writer.write_all("type: float\n".as_bytes())?,
        _ => writer.write_all("type: int\n".as_bytes())?,
    }

    // write the data
    let mut s = String::new();
    for row in 0..r.configs.rows {
        for col in 0..r.configs.columns {
            let v = r.data[row * r.configs.columns + col];
            if col < r.configs.columns - 1 {
                s += &format!("{:.*} ", decimals, v);
            } else {
                s += &format!("{:.*}\n", decimals, v);
            }
        }
        writer.write_all(s.as_bytes())?;
        s = String::new();
    }

    let _ = writer.flush();

    Ok(())
}

fn is_number(value: &str) -> bool {
    value.parse::<f64>().is_ok()
}
