use super::*;
use std::f64;
use std::fs::File;
use std::io::prelude::*;
use std::io::BufReader;
use std::io::BufWriter;
use std::io::Error;

pub fn read_arcascii(
    file_name: &String,
    configs: &mut RasterConfigs,
    data: &mut Vec<f64>,
) -> Result<(), Error> {
    let f = File::open(file_name)?;
    let f = BufReader::new(f);

    let mut xllcenter = f64::NEG_INFINITY;
    let mut yllcenter = f64::NEG_INFINITY;
    let mut xllcorner = f64::NEG_INFINITY;
    let mut yllcorner = f64::NEG_INFINITY;
    for line in f.lines() {
        let line_unwrapped = line?;
        let mut vec = line_unwrapped.split_whitespace().collect::<Vec<&str>>();
        if vec.is_empty() {
            continue;
        }
        let key = vec[0].to_lowercase();
        if key.contains("nrows") {
            configs.rows = vec[vec.len() - 1].trim().parse::<f32>().unwrap() as usize;
            if configs.columns > 0 {
                data.reserve(configs.rows * configs.columns);
            }
        } else if key.contains("ncols") {
            configs.columns = vec[vec.len() - 1].trim().parse::<f32>().unwrap() as usize;
            if configs.rows > 0 {
                data.reserve(configs.rows * configs.columns);
            }
        } else if key.contains("xllcorner") {
            xllcorner = vec[vec.len() - 1].trim().parse::<f64>().unwrap();
        } else if key.contains("yllcorner") {
            yllcorner = vec[vec.len() - 1].trim().parse::<f64>().unwrap();
        } else if key.contains("xllcenter") {
            xllcenter = vec[vec.len() - 1].trim().parse::<f64>().unwrap();
        } else if key.contains("yllcenter") {
            yllcenter = vec[vec.len() - 1].trim().parse::<f64>().unwrap();
        } else if key.contains("cellsize") {
            configs.resolution_x = vec[vec.len() - 1].trim().parse::<f64>().unwrap();
            configs.resolution_y = configs.resolution_x;
        } else if key.contains("nodata_value") {
            if vec[vec.len() - 1].contains(".") {
                configs.data_type = DataType::F32;
            } else {
                configs.data_type = DataType::I32;
            }
            configs.nodata = vec[vec.len() - 1].trim().parse::<f64>().unwrap();
        } else {
            // it's a data line
            vec = line_unwrapped.split_whitespace().collect();
            for val in vec {
                data.push(val.trim().parse::<f64>().unwrap());
            }
        }
    }

    // set the North, East, South, and West coordinates
    if xllcorner != f64::NEG_INFINITY {
        configs.west = xllcorner;
        configs.east = xllcorner + (configs.columns as f64) * configs.resolution_x;
        configs.south = yllcorner;
        configs.north = yllcorner + (configs.rows as f64) * configs.resolution_y;
    } else {
        configs.west = xllcenter - 0.5 * configs.resolution_x;
        configs.east = configs.west + (configs.columns as f64) * configs.resolution_x;
        configs.south = yllcenter - 0.5 * configs.resolution_y;
        configs.north = configs.south + (configs.rows as f64) * configs.resolution_y;
    }

    configs.photometric_interp = PhotometricInterpretation::Continuous;

    Ok(())
}

pub fn write_arcascii<'a>(r: &'a mut Raster) -> Result<(), Error> {
    let f = File::create(&r.file_name)?;
    let mut writer = BufWriter::new(f);

    writer.write_all(format!("NCOLS {}\n", r.configs.columns).as_bytes())?;
    writer.write_all(format!("NROWS {}\n", r.configs.rows).as_bytes())?;
    writer.write_all(format!("XLLCORNER {}\n", r.configs.west).as_bytes())?;
    writer.write_all(format!("YLLCORNER {}\n", r.configs.south).as_bytes())?;
    writer.write_all(
        format!(
            "CELLSIZE {}\n",
            (r.configs.resolution_x + r.configs.resolution_y) / 2.0
        )
        .as_bytes(),
    )?;

    let decimals = if r.configs.data_type.is_float() { 2 } else { 0 };
    writer.write_all(
        format!("NODATA_VALUE {:.*}\n", decimals, r.configs.nodata).as_bytes(),
    )?;

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
