//! Column names of the population dataset.

/// Hexadecimal H3 cell id
pub const H3: &str = "h3";
/// Population count for the cell
pub const POPULATION: &str = "population";
