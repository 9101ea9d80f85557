/*
This code is part of the Terraflow geospatial analysis library.
License: MIT
*/

pub mod configs;
pub mod structures;
pub mod utils;
