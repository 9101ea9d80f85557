// private sub-module defined in other files
mod byte_order_reader;

// exports identifiers from private sub-modules in the current module namespace
pub use self::byte_order_reader::ByteOrderReader;
pub use self::byte_order_reader::Endianness;

use std::f64;
use std::time::Instant;

/// Returns a formatted string of elapsed time, e.g. `1min 34.852s`
pub fn get_formatted_elapsed_time(instant: Instant) -> String {
    let dur = instant.elapsed();
    let minutes = dur.as_secs() / 60;
    let sub_sec = dur.as_secs() % 60;
    let sub_milli = dur.subsec_millis();
    if minutes > 0 {
        return format!("{}min {}.{}s", minutes, sub_sec, sub_milli);
    }
    format!("{}.{}s", sub_sec, sub_milli)
}

pub fn wrapped_print(val: &str, width: usize) {
    let paragraphs: Vec<&str> = val.split("\n\n").collect();
    for i in 0..paragraphs.len() {
        let s = paragraphs[i].replace("\n", "");
        let words: Vec<&str> = s.split(" ").collect();
        let mut line = String::new();
        for w in words {
            if line.len() + w.len() + 1 <= width {
                line = format!("{} {}", line, w).trim().to_string();
            } else {
                println!("{}", line);
                line = w.to_string();
            }
        }
        if i < paragraphs.len() - 1 {
            println!("{}\n", line);
        } else {
            println!("{}", line);
        }
    }
}

// Mean radius of the WGS84 ellipsoid, in metres.
const EARTH_RADIUS: f64 = 6_371_008.8;

/// Great-circle distance in metres between two lon/lat points given in
/// decimal degrees. Used to derive true cell dimensions in geographic
/// (lat/long) regions, where the east-west metric distance varies per row.
pub fn geodesic_distance(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin() * (d_phi / 2.0).sin()
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin() * (d_lambda / 2.0).sin();
    2.0 * EARTH_RADIUS * a.sqrt().atan2((1.0 - a).sqrt())
}

#[cfg(test)]
mod test {
    use super::geodesic_distance;

    #[test]
    fn test_geodesic_distance_one_degree_at_equator() {
        let d = geodesic_distance(0.0, 0.0, 1.0, 0.0);
        // one degree of longitude at the equator is about 111.2 km
        assert!((d - 111_195.0).abs() < 200.0, "got {}", d);
    }

    #[test]
    fn test_geodesic_distance_shrinks_with_latitude() {
        let at_equator = geodesic_distance(0.0, 0.0, 1.0, 0.0);
        let at_60n = geodesic_distance(0.0, 60.0, 1.0, 60.0);
        assert!(at_60n < at_equator * 0.52);
        assert!(at_60n > at_equator * 0.48);
    }
}
