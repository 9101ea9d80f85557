// private sub-module defined in other files
mod fill_depressions;
mod flow_accumulation;
mod flowlines;
mod trace_downslope_flowpaths;

// exports identifiers from private sub-modules in the current module namespace
pub use self::fill_depressions::FillDepressions;
pub use self::flow_accumulation::FlowAccumulation;
pub use self::flowlines::Flowlines;
pub use self::trace_downslope_flowpaths::TraceDownslopeFlowpaths;
