use super::*;

#[test]
fn test_create_open_sync() {
    let dir = std::env::temp_dir().join("ndtsdb-util-files");
    std::fs::remove_dir_all(&dir).ok();

    let loc = dir.join("a.bin").into_os_string();
    let mut fd = create_file_rw(&loc).unwrap();
    assert!(create_file_rw(&loc).is_err()); // create_new on existing file

    sync_write(&mut fd, b"hello world").unwrap();

    let mut fd = open_file_r(&loc).unwrap();
    let data = read_file!(fd, std::io::SeekFrom::Start(0), 11, "read a.bin").unwrap();
    assert_eq!(&data, b"hello world");

    match open_file_r(&dir.join("missing.bin").into_os_string()) {
        Err(Error::FileNotFound(_, _)) => (),
        res => panic!("unexpected {:?}", res),
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_commit_file() {
    let dir = std::env::temp_dir().join("ndtsdb-util-commit");
    std::fs::remove_dir_all(&dir).ok();

    let dest = dir.join("data.bin").into_os_string();
    let temp = dir.join("data.bin.tmp").into_os_string();

    let mut fd = create_file_rw(&dest).unwrap();
    sync_write(&mut fd, b"old").unwrap();

    let mut fd = create_file_rw(&temp).unwrap();
    sync_write(&mut fd, b"new-contents").unwrap();

    commit_file(&temp, &dest).unwrap();

    assert_eq!(std::fs::read(&dest).unwrap(), b"new-contents");
    assert!(!std::path::Path::new(&temp).exists());

    remove_file(&temp).unwrap(); // missing file is ok
    std::fs::remove_dir_all(&dir).ok();
}
