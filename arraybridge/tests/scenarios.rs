#![allow(missing_docs)]

use std::sync::Arc;

use arraybridge::array::{Array, ArrayBuilder, ArrayError, ChunkCompression, ChunkData, ColumnValues};
use arraybridge::filesystem::FilesystemStore;
use arraybridge::storage::store::MemoryStore;
use arraybridge::storage::ReadableWritableListableStorage;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn stores() -> Vec<(ReadableWritableListableStorage, Option<tempfile::TempDir>)> {
    let directory = tempfile::TempDir::new().unwrap();
    let memory_store: ReadableWritableListableStorage = Arc::new(MemoryStore::new());
    let filesystem_store: ReadableWritableListableStorage =
        Arc::new(FilesystemStore::new(directory.path()).unwrap());
    vec![(memory_store, None), (filesystem_store, Some(directory))]
}

fn compressions() -> Vec<ChunkCompression> {
    vec![
        ChunkCompression::None,
        ChunkCompression::Gzip { level: 6 },
        ChunkCompression::Zstd { level: 3 },
    ]
}

fn scenario_single_chunk(storage: ReadableWritableListableStorage, compression: ChunkCompression) -> TestResult {
    let array = ArrayBuilder::new("<v:int64> [i=0:9:0:10]".parse()?)
        .compression(compression)
        .create(storage.clone(), "/a")?;
    let rows = ChunkData::from_columns([
        ("v", (0..10).collect::<Vec<i64>>().into()),
        ("i", (0..10).collect::<Vec<i64>>().into()),
    ]);
    array.put_rows(&rows)?;
    array.finalize()?;

    let array = Array::open(storage, "/a")?;
    assert_eq!(array.list_chunks()?, vec![vec![0]]);
    assert_eq!(array.get_chunk(&[0])?, rows);
    Ok(())
}

fn scenario_four_chunks(storage: ReadableWritableListableStorage, compression: ChunkCompression) -> TestResult {
    let array = ArrayBuilder::new("<v:int64> [i=0:19:0:5]".parse()?)
        .compression(compression)
        .index_split_threshold(3)
        .create(storage.clone(), "/b")?;
    array.put_rows(&ChunkData::from_columns([
        ("v", (0..20).map(|i| i * 100).collect::<Vec<i64>>().into()),
        ("i", (0..20).collect::<Vec<i64>>().into()),
    ]))?;
    array.finalize()?;

    let array = Array::open(storage, "/b")?;
    assert_eq!(
        array.list_chunks()?,
        vec![vec![0], vec![5], vec![10], vec![15]]
    );
    let chunk = array.get_chunk(&[10])?;
    assert_eq!(
        chunk.column("i"),
        Some(&ColumnValues::from((10..15).collect::<Vec<i64>>()))
    );
    assert_eq!(
        chunk.column("v"),
        Some(&ColumnValues::from(vec![1000i64, 1100, 1200, 1300, 1400]))
    );
    Ok(())
}

fn scenario_filtered_chunks(storage: ReadableWritableListableStorage, compression: ChunkCompression) -> TestResult {
    let array = ArrayBuilder::new("<v:int64> [i=0:9:0:5; j=0:9:0:5]".parse()?)
        .compression(compression)
        .index_split_threshold(1)
        .create(storage.clone(), "/c")?;

    // keep cells with i < 5 or j < 3, removing every cell of chunk (5, 5)
    let (mut v, mut i, mut j) = (vec![], vec![], vec![]);
    for ci in 0..10i64 {
        for cj in 0..10i64 {
            if ci < 5 || cj < 3 {
                v.push(ci * 10 + cj);
                i.push(ci);
                j.push(cj);
            }
        }
    }
    let rows = ChunkData::from_columns([("v", v.into()), ("i", i.into()), ("j", j.into())]);
    array.put_rows(&rows)?;
    // an empty chunk is never recorded
    array.put_chunk(&[5, 5], &ChunkData::new_empty(array.schema()))?;
    array.finalize()?;

    let array = Array::open(storage, "/c")?;
    assert_eq!(
        array.list_chunks()?,
        vec![vec![0, 0], vec![0, 5], vec![5, 0]]
    );
    assert!(matches!(
        array.get_chunk(&[5, 5]),
        Err(ArrayError::ChunkNotFound(coordinate)) if coordinate == vec![5, 5]
    ));
    let chunk = array.get_chunk(&[5, 0])?;
    assert_eq!(chunk.num_rows(), 15);
    assert!(chunk
        .column("j")
        .and_then(ColumnValues::as_int64)
        .is_some_and(|j| j.iter().all(|j| *j < 3)));
    assert_eq!(
        array.list_chunks_in_region(&[0..=9, 4..=5])?,
        vec![vec![0, 0], vec![0, 5], vec![5, 0]]
    );
    assert_eq!(
        array.list_chunks_in_region(&[5..=9, 5..=9])?,
        Vec::<Vec<i64>>::new()
    );
    Ok(())
}

fn scenario_multiple_attributes(storage: ReadableWritableListableStorage, compression: ChunkCompression) -> TestResult {
    let array = ArrayBuilder::new("<a:int32,b:double,c:string,d:bool> [x=-5:4:0:5; y=0:0:0:1]".parse()?)
        .compression(compression)
        .create(storage.clone(), "/d")?;
    let chunk = ChunkData::from_columns([
        ("a", vec![1i32, -2, 3].into()),
        ("b", vec![0.25f64, 2.5, -1e-9].into()),
        ("c", vec!["first", "", "thïrd"].into()),
        ("d", vec![true, false, false].into()),
        ("x", vec![-5i64, -3, -1].into()),
        ("y", vec![0i64, 0, 0].into()),
    ]);
    array.put_chunk(&[-5, 0], &chunk)?;
    array.finalize()?;

    let array = Array::open(storage, "/d")?;
    assert_eq!(array.list_chunks()?, vec![vec![-5, 0]]);
    let decoded = array.get_chunk(&[-5, 0])?;
    assert_eq!(
        decoded.columns().iter().map(|column| column.name.as_str()).collect::<Vec<_>>(),
        vec!["a", "b", "c", "d", "x", "y"]
    );
    assert_eq!(decoded, chunk);
    Ok(())
}

#[test]
fn scenario_a_single_chunk() -> TestResult {
    for compression in compressions() {
        for (storage, _directory) in stores() {
            scenario_single_chunk(storage, compression)?;
        }
    }
    Ok(())
}

#[test]
fn scenario_b_four_chunks() -> TestResult {
    for compression in compressions() {
        for (storage, _directory) in stores() {
            scenario_four_chunks(storage, compression)?;
        }
    }
    Ok(())
}

#[test]
fn scenario_c_filtered_chunks() -> TestResult {
    for compression in compressions() {
        for (storage, _directory) in stores() {
            scenario_filtered_chunks(storage, compression)?;
        }
    }
    Ok(())
}

#[test]
fn scenario_d_multiple_attributes() -> TestResult {
    for compression in compressions() {
        for (storage, _directory) in stores() {
            scenario_multiple_attributes(storage, compression)?;
        }
    }
    Ok(())
}
