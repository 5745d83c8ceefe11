//! Basic integration tests for mmap-buffer.

use mmap_buffer::{
    inspect, map_file, map_loose, page_size, args::LooseArg, MmapBuffer, MmapBufferError,
    Protection, Sharing,
};
use std::fs::{self, File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

fn tmp_path(name: &str) -> PathBuf {
    let mut p = std::env::temp_dir();
    p.push(format!("mmap_buffer_test_{}_{}", name, std::process::id()));
    p
}

/// Write `contents` to a fresh temp file and reopen it read-write.
fn scratch_file(name: &str, contents: &[u8]) -> (PathBuf, File) {
    let path = tmp_path(name);
    let _ = fs::remove_file(&path);
    fs::write(&path, contents).expect("write scratch file");
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .expect("open scratch file");
    (path, file)
}

fn rw() -> Protection {
    Protection::READ | Protection::WRITE
}

#[test]
fn create_reports_requested_length() {
    // Deliberately not a page multiple: the reported length must not be rounded up.
    let contents = vec![b'x'; 5000];
    let (path, file) = scratch_file("create_reports_requested_length", &contents);

    let buf = MmapBuffer::create(5000, Protection::READ, Sharing::Shared, file.as_raw_fd(), 0)
        .expect("create");
    assert_eq!(buf.len(), 5000);
    assert!(!buf.is_empty());
    assert!(buf.is_mapped());
    assert_eq!(buf.protection(), Protection::READ);
    assert_eq!(buf.sharing(), Sharing::Shared);
    assert_eq!(buf.get(4999).expect("last byte"), b'x');

    drop(buf);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn create_full_page_scenario() {
    let (path, file) = scratch_file("create_full_page_scenario", &vec![0u8; 4096]);

    let buf = MmapBuffer::create(4096, Protection::READ, Sharing::Shared, file.as_raw_fd(), 0)
        .expect("create");
    assert_eq!(buf.len(), 4096);

    // The 4-argument form defaults the offset to zero.
    let short = MmapBuffer::options().len(4096).map(file.as_raw_fd()).expect("options");
    assert_eq!(short.len(), 4096);

    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn page_offset_is_accepted() {
    let size = 600;
    let (path, file) = scratch_file("page_offset_is_accepted", &vec![1u8; size]);

    // Mapping past EOF is legal as long as nothing touches the pages.
    let buf = MmapBuffer::create(
        size,
        Protection::READ,
        Sharing::Shared,
        file.as_raw_fd(),
        page_size() as u64,
    )
    .expect("create at page offset");
    assert_eq!(buf.len(), size);

    drop(buf);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn page_offset_maps_the_right_bytes() {
    let ps = page_size();
    let mut contents = vec![b'a'; ps];
    contents.extend_from_slice(b"second page");
    let (path, file) = scratch_file("page_offset_maps_the_right_bytes", &contents);

    let buf = MmapBuffer::create(11, Protection::READ, Sharing::Shared, file.as_raw_fd(), ps as u64)
        .expect("create");
    assert_eq!(buf.to_vec().expect("to_vec"), b"second page");

    drop(buf);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn zero_length_is_einval() {
    let (path, file) = scratch_file("zero_length_is_einval", b"abc");

    let result = MmapBuffer::create(0, Protection::READ, Sharing::Shared, file.as_raw_fd(), 0);
    match result {
        Err(e @ MmapBufferError::InvalidArgument(_)) => {
            assert_eq!(e.raw_os_error(), Some(libc::EINVAL));
            assert_eq!(e.to_string(), "invalid argument: length must be greater than zero");
        }
        other => panic!("expected InvalidArgument, got {other:?}"),
    }

    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn misaligned_offset_is_einval() {
    if page_size() == 1 {
        return;
    }
    let (path, file) = scratch_file("misaligned_offset_is_einval", &vec![0u8; 4096]);

    let result = MmapBuffer::create(4096, Protection::READ, Sharing::Shared, file.as_raw_fd(), 1);
    match result {
        Err(e) => {
            assert!(matches!(e, MmapBufferError::InvalidArgument(_)));
            assert_eq!(e.raw_os_error(), Some(libc::EINVAL));
        }
        Ok(buf) => panic!("misaligned offset accepted: {buf:?}"),
    }

    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn decode_hello_world() {
    let (path, file) = scratch_file("decode_hello_world", b"hello world, and more");

    let buf = MmapBuffer::create(21, Protection::READ, Sharing::Shared, file.as_raw_fd(), 0)
        .expect("create");
    assert_eq!(
        buf.decode(mmap_buffer::Encoding::Utf8, 0..11).expect("decode"),
        "hello world"
    );

    drop(buf);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn set_then_get_and_persist() {
    let (path, file) = scratch_file("set_then_get_and_persist", &[0u8; 64]);

    let mut buf = MmapBuffer::create(64, rw(), Sharing::Shared, file.as_raw_fd(), 0)
        .expect("create");
    for i in 0..64 {
        assert_eq!(buf.set(i, i as u8 * 3).expect("set"), i as u8 * 3);
    }
    buf.set(10, 0xAB).expect("overwrite");
    assert_eq!(buf.get(10).expect("get"), 0xAB);
    assert_eq!(buf.get(11).expect("get"), 33);
    buf.close().expect("close");

    // Shared mappings write through to the file.
    let on_disk = fs::read(&path).expect("read back");
    assert_eq!(on_disk[10], 0xAB);
    assert_eq!(on_disk[63], 189);

    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn set_on_read_only_is_denied() {
    let (path, file) = scratch_file("set_on_read_only_is_denied", b"read only!");

    let mut buf = MmapBuffer::create(10, Protection::READ, Sharing::Shared, file.as_raw_fd(), 0)
        .expect("create");
    let result = buf.set(0, b'X');
    match result {
        Err(e @ MmapBufferError::PermissionDenied(_)) => {
            assert_eq!(e.raw_os_error(), Some(libc::EACCES));
        }
        other => panic!("expected PermissionDenied, got {other:?}"),
    }
    assert!(matches!(
        buf.encode("X", 0, mmap_buffer::Encoding::Utf8),
        Err(MmapBufferError::PermissionDenied(_))
    ));
    assert_eq!(buf.get(0).expect("get"), b'r');
    assert_eq!(buf.to_vec().expect("to_vec"), b"read only!");

    drop(buf);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn prot_none_denies_reads() {
    let (path, file) = scratch_file("prot_none_denies_reads", b"hidden");

    let buf = MmapBuffer::create(6, Protection::NONE, Sharing::Private, file.as_raw_fd(), 0)
        .expect("create");
    assert!(matches!(buf.get(0), Err(MmapBufferError::PermissionDenied(_))));
    assert!(matches!(
        buf.decode(mmap_buffer::Encoding::Utf8, ..),
        Err(MmapBufferError::PermissionDenied(_))
    ));

    drop(buf);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn out_of_range_index() {
    let (path, file) = scratch_file("out_of_range_index", &[7u8; 16]);

    let mut buf = MmapBuffer::create(16, rw(), Sharing::Shared, file.as_raw_fd(), 0)
        .expect("create");
    match buf.get(16) {
        Err(MmapBufferError::IndexOutOfRange { index, len }) => {
            assert_eq!((index, len), (16, 16));
        }
        other => panic!("expected IndexOutOfRange, got {other:?}"),
    }
    assert!(matches!(
        buf.set(usize::MAX, 1),
        Err(MmapBufferError::IndexOutOfRange { .. })
    ));
    assert_eq!(
        buf.get(16).unwrap_err().to_string(),
        "index out of range: index=16, len=16"
    );

    drop(buf);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn closed_buffer_is_invalid_state() {
    let (path, file) = scratch_file("closed_buffer_is_invalid_state", b"some bytes");

    let mut buf = MmapBuffer::create(10, rw(), Sharing::Shared, file.as_raw_fd(), 0)
        .expect("create");
    buf.close().expect("close");
    assert!(!buf.is_mapped());
    assert_eq!(buf.len(), 10);

    assert!(matches!(buf.get(0), Err(MmapBufferError::InvalidState(_))));
    assert!(matches!(buf.set(0, 1), Err(MmapBufferError::InvalidState(_))));
    assert!(matches!(
        buf.decode(mmap_buffer::Encoding::Ascii, ..),
        Err(MmapBufferError::InvalidState(_))
    ));
    assert!(matches!(
        buf.encode("x", 0, mmap_buffer::Encoding::Ascii),
        Err(MmapBufferError::InvalidState(_))
    ));
    assert!(matches!(buf.slice(0, 1), Err(MmapBufferError::InvalidState(_))));

    // Idempotent.
    buf.close().expect("second close");

    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn shared_write_on_read_only_fd_fails_with_eacces() {
    let path = tmp_path("shared_write_on_read_only_fd");
    let _ = fs::remove_file(&path);
    fs::write(&path, [0u8; 32]).expect("write");
    let file = File::open(&path).expect("open ro");

    let result = MmapBuffer::create(32, rw(), Sharing::Shared, file.as_raw_fd(), 0);
    match result {
        Err(MmapBufferError::MappingFailed { op, source }) => {
            assert_eq!(op, "mmap");
            assert_eq!(source.raw_os_error(), Some(libc::EACCES));
        }
        other => panic!("expected MappingFailed, got {other:?}"),
    }

    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn bad_descriptor_fails_with_ebadf() {
    let err = MmapBuffer::create(16, Protection::READ, Sharing::Shared, -1, 0).unwrap_err();
    assert!(matches!(err, MmapBufferError::MappingFailed { .. }));
    assert_eq!(err.raw_os_error(), Some(libc::EBADF));
}

#[test]
fn inspect_shows_length() {
    let (path, file) = scratch_file("inspect_shows_length", &vec![0u8; 4096]);

    let buf = MmapBuffer::create(4096, Protection::READ, Sharing::Shared, file.as_raw_fd(), 0)
        .expect("create");
    assert_eq!(inspect(&buf), "<MmapBuffer 4096>");
    assert_eq!(format!("{buf}"), "<MmapBuffer 4096>");
    let debug = format!("{buf:?}");
    assert!(debug.contains("len: 4096"));
    assert!(debug.contains("mapped: true"));

    assert_eq!(mmap_buffer::byte_length("h\u{e9}", mmap_buffer::Encoding::Utf8), 3);
    assert_eq!(mmap_buffer::byte_length("aGk=", mmap_buffer::Encoding::Base64), 2);

    drop(buf);
    fs::remove_file(&path).expect("cleanup");
}

#[test]
fn map_file_uses_file_length() {
    let (path, file) = scratch_file("map_file_uses_file_length", b"0123456789abc");

    let buf = map_file(&file, Protection::READ, Sharing::Private).expect("map_file");
    assert_eq!(buf.len(), 13);
    assert_eq!(buf.get(12).expect("get"), b'c');
    drop(buf);

    let empty = tmp_path("map_file_empty");
    let _ = fs::remove_file(&empty);
    fs::write(&empty, b"").expect("write empty");
    let empty_file = File::open(&empty).expect("open empty");
    assert!(matches!(
        map_file(&empty_file, Protection::READ, Sharing::Shared),
        Err(MmapBufferError::InvalidArgument(_))
    ));

    fs::remove_file(&path).expect("cleanup");
    fs::remove_file(&empty).expect("cleanup empty");
}

#[test]
fn map_loose_arguments() {
    let (path, file) = scratch_file("map_loose_arguments", b"loosely typed");

    let args = [
        LooseArg::from(13_i32),
        LooseArg::from(libc::PROT_READ),
        LooseArg::from(libc::MAP_SHARED),
        LooseArg::from(file.as_raw_fd()),
    ];
    let buf = map_loose(&args).expect("map_loose");
    assert_eq!(buf.decode_loose(None::<&str>, None::<f64>, None::<f64>).expect("decode"), "loosely typed");
    drop(buf);

    let mut zero = args.to_vec();
    zero[0] = LooseArg::from(0_i32);
    let err = map_loose(&zero).unwrap_err();
    assert_eq!(err.raw_os_error(), Some(libc::EINVAL));

    if page_size() > 1 {
        let mut misaligned = args.to_vec();
        misaligned.push(LooseArg::from(1_i32));
        let err = map_loose(&misaligned).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }

    fs::remove_file(&path).expect("cleanup");
}
