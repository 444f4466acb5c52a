use std::fs;

use harvester_engine::{ensure_output_dir, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn missing_output_dir_is_created() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("output").join("images");
    ensure_output_dir(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn rewriting_a_listing_replaces_it() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().to_path_buf());

    let first = writer.write("catalog_links.txt", "Total: 1").unwrap();
    let second = writer.write("catalog_links.txt", "Total: 2").unwrap();
    assert_eq!(first, second);
    assert_eq!(fs::read_to_string(&second).unwrap(), "Total: 2");
}

#[test]
fn binary_content_round_trips() {
    let temp = TempDir::new().unwrap();
    let writer = AtomicFileWriter::new(temp.path().join("images"));
    let path = writer.write_bytes("0001_abc.jpg", &[0xFF, 0xD8, 0x00, 0x10]).unwrap();
    assert_eq!(fs::read(path).unwrap(), vec![0xFF, 0xD8, 0x00, 0x10]);
}

#[test]
fn file_in_place_of_directory_is_an_error() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("output");
    fs::write(&blocker, "x").unwrap();

    let writer = AtomicFileWriter::new(blocker.clone());
    assert!(writer.write("catalog_links.json", "{}").is_err());
    assert_eq!(fs::read_to_string(&blocker).unwrap(), "x");
}
