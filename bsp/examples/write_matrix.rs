//! Build a sparse matrix, write it as a binsparse flat file and read it back

use std::time::Instant;

use bsp::{CsrMatrix, Result, WriteOptions};
use serde_json::json;

fn main() -> Result<()> {
    let nrows = 100_000;
    let ncols = 20_000;
    let per_row = 8;
    let path = "example_matrix.bsp";

    println!("Matrix dimensions: {nrows} x {ncols}, {per_row} entries per row");

    let start = Instant::now();
    let mut matrix = CsrMatrix::<f64, u32>::new();
    matrix.set_shape(0, ncols)?;
    matrix.reserve(nrows * per_row)?;
    let mut cols = Vec::with_capacity(per_row);
    let mut values = Vec::with_capacity(per_row);
    for row in 0..nrows {
        cols.clear();
        values.clear();
        for k in 0..per_row {
            cols.push(((row * 31 + k * 2_477) % ncols) as u32);
        }
        cols.sort_unstable();
        cols.dedup();
        values.extend(cols.iter().map(|&col| (row + col as usize) as f64 * 0.5));
        matrix.push_row(&cols, &values)?;
    }
    println!("Built {} stored values in {:?}", matrix.stored_count(), start.elapsed());

    let start = Instant::now();
    let options = WriteOptions::default().with_user_key("generator", json!("write_matrix example"));
    bsp::write_csr_file(path, &matrix.view(), &options)?;
    println!("Written to {path} in {:?}", start.elapsed());

    let start = Instant::now();
    let loaded = bsp::read_csr::<f64, u32>(path)?;
    println!("Read back in {:?}", start.elapsed());
    assert_eq!(loaded.view(), matrix.view());

    println!("{}", bsp::inspect(path)?.to_json_string()?);
    Ok(())
}
