// private sub-module defined in other files
mod coor_skeleton;
mod raster_to_vector_lines;
mod raster_to_vector_points;
mod raster_to_vector_polygons;

// exports identifiers from private sub-modules in the current module namespace
pub use self::raster_to_vector_lines::RasterToVectorLines;
pub use self::raster_to_vector_points::RasterToVectorPoints;
pub use self::raster_to_vector_polygons::RasterToVectorPolygons;
