// private sub-module defined in other files
mod geomorphons;

// exports identifiers from private sub-modules in the current module namespace
pub use self::geomorphons::Geomorphons;
