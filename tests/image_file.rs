use hopscotch_image::remote::{MemoryTransport, RemoteTable};
use hopscotch_image::{Config, Error, Image, ImageFile};
use test_log::test;

fn build_image() -> hopscotch_image::Result<Image> {
    let mut table = Config::new(24, 24)
        .exponent(10)
        .record_alignment(64)
        .build()?;

    for x in 0u64..700 {
        let key = format!("user{x:020}");
        table.insert(key.as_str(), key.as_str())?;
    }

    Image::from_table(&table)
}

#[test]
fn image_file_persist_and_serve() -> hopscotch_image::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("table.img");

    let image = build_image()?;
    image.persist(&path)?;

    assert_eq!(
        image.len() as u64 + hopscotch_image::TableDescriptor::serialized_len() as u64,
        std::fs::metadata(&path)?.len()
    );

    let file = ImageFile::open(&path)?;
    file.verify()?;
    assert_eq!(700, file.descriptor().entry_count);
    assert_eq!(64, file.descriptor().record_size);

    let client = RemoteTable::connect(&file, &file.handshake())?;

    for x in 0u64..700 {
        let key = format!("user{x:020}");
        assert_eq!(Some(key.as_str().into()), client.get(key.as_bytes())?);
    }

    Ok(())
}

#[test]
fn image_file_load_and_republish() -> hopscotch_image::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("table.img");

    build_image()?.persist(&path)?;

    let image = ImageFile::open(&path)?.load()?;

    let transport = MemoryTransport::new();
    let handshake = transport.publish(&image);
    let client = RemoteTable::connect(&transport, &handshake)?;

    let key = format!("user{:020}", 123);
    assert_eq!(Some(key.as_str().into()), client.get(key.as_bytes())?);

    Ok(())
}

#[test]
fn image_file_overwrite_is_atomic() -> hopscotch_image::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("table.img");

    build_image()?.persist(&path)?;

    let mut table = Config::new(24, 24).exponent(4).build()?;
    table.insert(*b"abcdefghijklmnopqrstuvwx", "v")?;
    Image::from_table(&table)?.persist(&path)?;

    let file = ImageFile::open(&path)?;
    assert_eq!(1, file.descriptor().entry_count);
    assert_eq!(4, file.descriptor().exponent);

    Ok(())
}

#[test]
fn image_file_not_an_image() -> hopscotch_image::Result<()> {
    let folder = tempfile::tempdir()?;
    let path = folder.path().join("garbage.img");

    std::fs::write(&path, vec![7u8; 4_096])?;

    assert!(matches!(
        ImageFile::open(&path),
        Err(Error::InvalidHeader(_))
    ));

    Ok(())
}
