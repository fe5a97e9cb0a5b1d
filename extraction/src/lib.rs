pub mod config;
pub mod document;
pub mod embedded;
pub mod error;
pub mod fields;
pub mod ocr;
pub mod pagetext;
pub mod preprocess;
pub mod raster;
pub mod statement;
pub mod table;
pub mod tabula_wrapper;
#[cfg(test)]
mod testutil;
