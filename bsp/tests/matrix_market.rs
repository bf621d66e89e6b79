use std::fs;
use std::path::{Path, PathBuf};

use bsp::{
    BinsparseError, CooMatrix, CsrMatrix, DenseMatrix, DenseVector, DuplicatePolicy,
    ImportOptions, MatrixView, Order, Structure, WriteOptions,
};

fn write_mtx(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

const SYMMETRIC_3X3: &str = "%%MatrixMarket matrix coordinate real symmetric\n\
                             % two off-diagonal entries and one diagonal entry\n\
                             3 3 3\n\
                             1 1 2.0\n\
                             2 1 -1.0\n\
                             3 1 0.5\n";

#[test]
fn symmetric_import_mirrors_off_diagonals() {
    let dir = tempfile::tempdir().unwrap();
    let mtx = write_mtx(dir.path(), "sym.mtx", SYMMETRIC_3X3);

    let mut csr = CsrMatrix::<f64, u32>::new();
    let header = bsp::read_matrix_market(&mtx, &ImportOptions::default(), &mut csr).unwrap();
    assert_eq!(header.declared_entries, 3);
    assert_eq!(csr.stored_count(), 5);
    assert_eq!(csr.view().get(0, 2), Some(0.5));
    assert_eq!(csr.view().get(2, 0), Some(0.5));
    assert!(csr.view().validate().is_ok());

    let mut coo = CooMatrix::<f32, u64>::new();
    bsp::read_matrix_market(&mtx, &ImportOptions::default(), &mut coo).unwrap();
    assert_eq!(coo.stored_count(), 5);
    assert_eq!(coo.row_indices(), &[0, 0, 0, 1, 2]);
    assert_eq!(coo.col_indices(), &[0, 1, 2, 0, 0]);
}

#[test]
fn kept_triangle_is_written_with_structure() {
    let dir = tempfile::tempdir().unwrap();
    let mtx = write_mtx(dir.path(), "sym.mtx", SYMMETRIC_3X3);
    let out = dir.path().join("sym.bsp");

    let mut csr = CsrMatrix::<f64, u32>::new();
    let options = ImportOptions::default().with_expand_symmetry(false);
    bsp::read_matrix_market(&mtx, &options, &mut csr).unwrap();
    bsp::write_csr_file(&out, &csr.view(), &WriteOptions::default()).unwrap();

    let descriptor = bsp::inspect(&out).unwrap().binsparse().unwrap();
    assert_eq!(descriptor.structure.as_deref(), Some("symmetric_lower"));
    assert_eq!(descriptor.number_of_stored_values, 3);
    let loaded = bsp::read_csr::<f64, u32>(&out).unwrap();
    assert_eq!(loaded.structure(), Structure::SymmetricLower);
}

#[test]
fn declared_count_disagreement_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let mtx = write_mtx(
        dir.path(),
        "short.mtx",
        "%%MatrixMarket matrix coordinate real general\n4 4 3\n1 1 1\n2 2 2\n",
    );
    let mut csr = CsrMatrix::<f64, u32>::new();
    match bsp::read_matrix_market(&mtx, &ImportOptions::default(), &mut csr) {
        Err(BinsparseError::ParseError { line, message, .. }) => {
            assert_eq!(line, 4);
            assert!(message.contains("expected 3 entries, found 2"));
        }
        other => panic!("expected ParseError, got {other:?}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut csr = CsrMatrix::<f64, u32>::new();
    assert!(matches!(
        bsp::read_matrix_market(dir.path().join("absent.mtx"), &ImportOptions::default(), &mut csr),
        Err(BinsparseError::Io { .. })
    ));
}

#[test]
fn array_import_round_trips_as_dense() {
    let dir = tempfile::tempdir().unwrap();
    let mtx = write_mtx(
        dir.path(),
        "dense.mtx",
        "%%MatrixMarket matrix array integer general\n2 3\n1\n4\n2\n5\n3\n6\n",
    );
    let out = dir.path().join("dense.bsp");

    let mut matrix = DenseMatrix::<i32>::new();
    bsp::read_matrix_market(&mtx, &ImportOptions::default(), &mut matrix).unwrap();
    assert_eq!(matrix.order(), Order::RowMajor);
    assert_eq!(matrix.values(), &[1, 2, 3, 4, 5, 6]);

    bsp::write_dense_file(&out, &matrix.view(), &WriteOptions::default()).unwrap();
    let loaded = bsp::read_dense::<i32>(&out).unwrap();
    assert_eq!(loaded.view().get(1, 2), Some(6));
    assert_eq!(loaded.view().format(), bsp::MatrixFormat::Dmatr);
}

#[test]
fn array_column_into_dense_vector() {
    let mut vector = DenseVector::<f32>::new();
    let text = "%%MatrixMarket matrix array real general\n3 1\n0.5\n1.5\n2.5\n";
    bsp::parse_matrix_market(text.as_bytes(), &ImportOptions::default(), &mut vector).unwrap();
    assert_eq!(vector.len(), 3);
    assert_eq!(vector.values(), &[0.5, 1.5, 2.5]);
}

#[test]
fn duplicate_policies_both_ways() {
    let text = "%%MatrixMarket matrix coordinate integer general\n\
                2 2 4\n\
                1 1 1\n\
                1 1 2\n\
                2 2 5\n\
                1 1 4\n";

    let mut summed = CsrMatrix::<i64, u32>::new();
    bsp::parse_matrix_market(text.as_bytes(), &ImportOptions::default(), &mut summed).unwrap();
    assert_eq!(summed.values(), &[7, 5]);

    let mut last = CsrMatrix::<i64, u32>::new();
    let options = ImportOptions::default().with_duplicates(DuplicatePolicy::KeepLast);
    bsp::parse_matrix_market(text.as_bytes(), &options, &mut last).unwrap();
    assert_eq!(last.values(), &[4, 5]);
}

#[test]
fn pattern_import_as_iso() {
    let dir = tempfile::tempdir().unwrap();
    let mtx = write_mtx(
        dir.path(),
        "pattern.mtx",
        "%%MatrixMarket matrix coordinate pattern general\n3 3 3\n1 2\n2 3\n3 1\n",
    );
    let out = dir.path().join("pattern.bsp");

    let mut csr = CsrMatrix::<f64, u32>::new();
    let options = ImportOptions::default().with_iso_pattern(true);
    bsp::read_matrix_market(&mtx, &options, &mut csr).unwrap();
    assert!(csr.is_iso());
    assert_eq!(csr.values(), &[1.0]);

    bsp::write_csr_file(&out, &csr.view(), &WriteOptions::default()).unwrap();
    let descriptor = bsp::inspect(&out).unwrap().binsparse().unwrap();
    assert_eq!(descriptor.data_types["values"], "iso[float64]");
    assert_eq!(descriptor.number_of_stored_values, 3);
}

#[test]
fn column_major_targets_get_column_major_entries() {
    let text = "%%MatrixMarket matrix coordinate real general\n\
                2 2 3\n\
                2 1 3\n\
                1 2 2\n\
                1 1 1\n";
    let mut coo = CooMatrix::<f64, u32>::new();
    coo.set_order(Order::ColumnMajor).unwrap();
    bsp::parse_matrix_market(text.as_bytes(), &ImportOptions::default(), &mut coo).unwrap();
    assert_eq!(coo.values(), &[1.0, 3.0, 2.0]);
    assert_eq!(coo.view().format(), bsp::MatrixFormat::Cooc);
}
