//! Import a matrix market file straight into a persistent heap, then reopen
//! the heap and read the matrix in place
//!
//! Usage: cargo run --example resident_heap -- input.mtx matrix.heap

use bsp::heap_backend::{self, HeapContainer};
use bsp::{CsrMatrix, HeapAllocator, HeapConfig, ImportOptions, PersistentHeap, WriteOptions};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(input), Some(heap_path)) = (args.next(), args.next()) else {
        eprintln!("usage: resident_heap <input.mtx> <matrix.heap>");
        std::process::exit(2);
    };

    PersistentHeap::remove(&heap_path)?;
    {
        let heap = PersistentHeap::create(&heap_path, &HeapConfig::default())?;
        let mut matrix =
            CsrMatrix::<f64, u64, HeapAllocator<'_>>::construct_in(&heap, "binsparse-matrix")?;
        let header = bsp::read_matrix_market(&input, &ImportOptions::default(), &mut matrix)?;
        heap_backend::write_csr(&heap, &matrix.view(), &WriteOptions::default())?;
        println!(
            "Imported {}x{} ({} stored values), heap uses {} bytes",
            header.nrows,
            header.ncols,
            header.stored_entries,
            heap.used()?
        );
    }

    let heap = PersistentHeap::open_read_only(&heap_path)?;
    let resident = heap_backend::read_csr::<f64, u64>(&heap)?;
    let (nrows, ncols) = resident.shape();
    println!("Reopened {nrows}x{ncols} matrix without copying");
    let row_ptr = resident.row_ptr();
    for row in 0..nrows.min(3) {
        let (start, end) = (row_ptr[row] as usize, row_ptr[row + 1] as usize);
        println!(
            "row {row}: columns {:?} values {:?}",
            &resident.col_indices()[start..end],
            &resident.values()[start..end]
        );
    }
    Ok(())
}
