//! Library-level tests of the atomicity guarantees.

mod common;

use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use atomic_state::StateError;
use atomic_state::fs::{Encoding, UpdateOptions, WriteOptions, WriteRequest, read_text};
use atomic_state::{atomic_update, atomic_write, multi_write};
use common::leftover_temp_files;
use tempfile::TempDir;

#[test]
fn test_transaction_all_or_nothing() {
    let temp = TempDir::new().unwrap();
    let f1 = temp.path().join("f1.json");
    let f2 = temp.path().join("no-such-dir").join("f2.json");
    fs::write(&f1, "C1").unwrap();

    let result = multi_write([WriteRequest::new(&f1, "A"), WriteRequest::new(&f2, "B")]);

    assert!(matches!(result, Err(StateError::ParentDirectoryMissing(_))));
    assert_eq!(fs::read_to_string(&f1).unwrap(), "C1");
    assert!(!f2.exists());
    assert!(leftover_temp_files(temp.path()).is_empty());
}

#[test]
fn test_transaction_success_is_durable() {
    let temp = TempDir::new().unwrap();
    let f1 = temp.path().join("f1.json");
    let f2 = temp.path().join("f2.json");

    multi_write([WriteRequest::new(&f1, "x"), WriteRequest::new(&f2, "y")]).unwrap();

    assert_eq!(fs::read_to_string(&f1).unwrap(), "x");
    assert_eq!(fs::read_to_string(&f2).unwrap(), "y");
    assert!(leftover_temp_files(temp.path()).is_empty());
}

#[test]
fn test_update_composition() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("doc.txt");
    fs::write(&file, "C").unwrap();
    let opts = UpdateOptions::new();

    atomic_update(&file, |c| Ok(Some(format!("f({})", c.as_text().unwrap()).into())), &opts)
        .unwrap();
    atomic_update(&file, |c| Ok(Some(format!("g({})", c.as_text().unwrap()).into())), &opts)
        .unwrap();

    assert_eq!(fs::read_to_string(&file).unwrap(), "g(f(C))");
}

#[test]
fn test_mixed_encodings_in_one_transaction() {
    let temp = TempDir::new().unwrap();
    let wide = temp.path().join("wide.txt");
    let narrow = temp.path().join("narrow.txt");

    multi_write([
        WriteRequest::new(&wide, "ünïcödé")
            .with_options(WriteOptions::new().encoding(Encoding::Utf16Be)),
        WriteRequest::new(&narrow, "café")
            .with_options(WriteOptions::new().encoding(Encoding::Latin1)),
    ])
    .unwrap();

    assert_eq!(read_text(&wide, Encoding::Utf16Be).unwrap(), "ünïcödé");
    assert_eq!(fs::read(&narrow).unwrap(), b"caf\xE9");
}

#[test]
fn test_concurrent_same_path_writes_never_corrupt() {
    const WRITERS: usize = 8;

    let temp = TempDir::new().unwrap();
    let file = Arc::new(temp.path().join("race.json"));
    let contents: Arc<Vec<String>> = Arc::new(
        (0..WRITERS)
            .map(|i| char::from(b'a' + i as u8).to_string().repeat(64 * 1024))
            .collect(),
    );
    let barrier = Arc::new(Barrier::new(WRITERS + 1));

    let writers: Vec<_> = (0..WRITERS)
        .map(|i| {
            let (file, contents, barrier) = (file.clone(), contents.clone(), barrier.clone());
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..5 {
                    atomic_write(file.as_path(), contents[i].as_str(), &WriteOptions::new())
                        .unwrap();
                }
            })
        })
        .collect();

    barrier.wait();
    // Concurrent readers only ever see a complete write.
    for _ in 0..50 {
        if let Ok(seen) = fs::read_to_string(file.as_path()) {
            assert!(contents.contains(&seen), "observed a torn write");
        }
    }

    for writer in writers {
        writer.join().unwrap();
    }

    let survivor = fs::read_to_string(file.as_path()).unwrap();
    assert!(contents.contains(&survivor));
    assert!(leftover_temp_files(temp.path()).is_empty());
}
