use bsp::heap_backend::{self, HeapContainer};
use bsp::{
    BinsparseError, CsrMatrix, CsrView, DenseVectorView, HeapAllocator, HeapConfig,
    ImportOptions, PersistentHeap, WriteOptions,
};

const MATRIX_SLOT: &str = "binsparse-matrix";

fn heap_config() -> HeapConfig {
    HeapConfig::with_capacity(4 << 20)
}

#[test]
fn flat_and_heap_reads_are_bit_identical() {
    let dir = tempfile::tempdir().unwrap();
    let values = [0.1f32, -2.5, 3.0e-7, 4.0, f32::MAX, 6.25];
    let col_index = [0u32, 2, 1, 3, 0, 3];
    let row_ptr = [0u32, 2, 3, 5, 6];
    let view = CsrView::new(4, 4, &values, &col_index, &row_ptr);

    let file = dir.path().join("m.bsp");
    bsp::write_csr_file(&file, &view, &WriteOptions::default()).unwrap();
    let from_file = bsp::read_csr::<f32, u32>(&file).unwrap();

    let heap = PersistentHeap::create(dir.path().join("m.heap"), &heap_config()).unwrap();
    drop(heap_backend::store_csr(&heap, &view, &WriteOptions::default()).unwrap());
    let from_heap = heap_backend::read_csr::<f32, u32>(&heap).unwrap();

    let bits = |values: &[f32]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(from_file.values()), bits(from_heap.values()));
    assert_eq!(from_file.col_indices(), from_heap.col_indices());
    assert_eq!(from_file.row_ptr(), from_heap.row_ptr());
    assert_eq!(from_heap.view(), view);
}

#[test]
fn heap_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reopen.heap");
    let values = [1.0f64, 2.0, 3.0];
    let cols = [2u64, 0, 1];
    let rows = [0u64, 1, 2, 3];
    let view = CsrView::new(3, 3, &values, &cols, &rows);

    {
        let heap = PersistentHeap::create(&path, &heap_config()).unwrap();
        let options = WriteOptions::default().with_user_key("run", serde_json::json!(1));
        heap_backend::store_csr(&heap, &view, &options).unwrap();
    }

    let heap = PersistentHeap::open(&path).unwrap();
    let document = heap_backend::inspect(&heap).unwrap();
    assert_eq!(document.get("run"), Some(&serde_json::json!(1)));
    let resident = heap_backend::read_csr::<f64, u64>(&heap).unwrap();
    assert_eq!(resident.view(), view);
    drop(resident);
    drop(heap);

    let read_only = PersistentHeap::open_read_only(&path).unwrap();
    assert!(!read_only.is_writable());
    let resident = heap_backend::read_csr::<f64, u64>(&read_only).unwrap();
    assert_eq!(resident.view().get(0, 2), Some(1.0));
}

#[test]
fn create_refuses_existing_heap() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("once.heap");
    let _heap = PersistentHeap::create(&path, &heap_config()).unwrap();
    assert!(matches!(
        PersistentHeap::create(&path, &heap_config()),
        Err(BinsparseError::AccessConflict { .. })
    ));
    assert!(matches!(
        PersistentHeap::open(dir.path().join("missing.heap")),
        Err(BinsparseError::Io { .. })
    ));
}

#[test]
fn one_live_handle_per_container() {
    let dir = tempfile::tempdir().unwrap();
    let heap = PersistentHeap::create(dir.path().join("m.heap"), &heap_config()).unwrap();
    let values = [5u16];
    let view = DenseVectorView::new(&values);
    drop(heap_backend::store_dense_vector(&heap, &view, &WriteOptions::default()).unwrap());

    let first = heap_backend::read_dense_vector::<u16>(&heap).unwrap();
    assert!(matches!(
        heap_backend::read_dense_vector::<u16>(&heap),
        Err(BinsparseError::AccessConflict { .. })
    ));
    drop(first);
    assert!(heap_backend::read_dense_vector::<u16>(&heap).is_ok());
}

#[test]
fn import_in_place_then_read_resident() {
    let dir = tempfile::tempdir().unwrap();
    let heap = PersistentHeap::create(dir.path().join("mm.heap"), &heap_config()).unwrap();
    let text = "%%MatrixMarket matrix coordinate integer symmetric\n\
                3 3 3\n\
                1 1 4\n\
                2 1 -1\n\
                3 2 7\n";

    {
        let mut matrix =
            CsrMatrix::<i32, u32, HeapAllocator<'_>>::construct_in(&heap, MATRIX_SLOT).unwrap();
        bsp::parse_matrix_market(text.as_bytes(), &ImportOptions::default(), &mut matrix)
            .unwrap();
        heap_backend::write_csr(&heap, &matrix.view(), &WriteOptions::default()).unwrap();
    }

    let resident = heap_backend::read_csr::<i32, u32>(&heap).unwrap();
    assert_eq!(resident.stored_count(), 5);
    assert_eq!(resident.view().get(0, 1), Some(-1));
    assert_eq!(resident.view().get(2, 1), Some(7));
    assert_eq!(resident.header().nnz, 5);
}

#[test]
fn iso_matrix_keeps_one_value_in_heap() {
    let dir = tempfile::tempdir().unwrap();
    let heap = PersistentHeap::create(dir.path().join("iso.heap"), &heap_config()).unwrap();
    let values = [1i8];
    let cols = [0u8, 1];
    let rows = [0u8, 1, 2];
    let view = CsrView::new(2, 2, &values, &cols, &rows).with_iso(true);
    drop(heap_backend::store_csr(&heap, &view, &WriteOptions::default()).unwrap());

    let resident = heap_backend::read_csr::<i8, u8>(&heap).unwrap();
    assert!(resident.is_iso());
    assert_eq!(resident.values(), &[1]);
    drop(resident);
    assert!(matches!(
        heap_backend::read_csr::<i16, u8>(&heap),
        Err(BinsparseError::InconsistentFile { .. })
    ));
}
