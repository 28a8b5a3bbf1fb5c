use kiln::archive::{MountKind, PakWriter};
use kiln::vfs::{file_id, VfsContext};

use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::tempdir;

fn write_tar(path: &Path, files: &[(&str, &[u8])]) -> std::io::Result<()> {
    let mut builder = tar::Builder::new(fs::File::create(path)?);
    for (name, data) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data)?;
    }
    builder.finish()
}

fn write_zip(path: &Path, files: &[(&str, &[u8])]) -> Result<(), Box<dyn std::error::Error>> {
    let mut zip = zip::ZipWriter::new(fs::File::create(path)?);
    for (name, data) in files {
        zip.start_file(*name, zip::write::FileOptions::default())?;
        zip.write_all(data)?;
    }
    zip.finish()?;
    Ok(())
}

#[test]
fn mixed_backends_layer_in_mount_order() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;

    let base = dir.path().join("base.tar");
    write_tar(&base, &[("ui/font.ttf", &b"base font"[..]), ("ui/logo_main.png", &b"base logo"[..])])?;

    let patch = dir.path().join("patch.zip");
    write_zip(&patch, &[("ui/main_logo.tga", &b"patched logo"[..])])?;

    let loose = dir.path().join("loose");
    fs::create_dir_all(loose.join("ui"))?;
    fs::write(loose.join("ui/readme.txt"), b"loose readme")?;

    let mut vfs = VfsContext::default();
    assert_eq!(vfs.mount(&base.to_string_lossy())?, MountKind::Tar);
    assert_eq!(vfs.mount(&patch.to_string_lossy())?, MountKind::Zip);
    assert_eq!(vfs.mount(&format!("{}/", loose.display()))?, MountKind::Directory);

    let kinds: Vec<MountKind> = vfs.mounts().map(|m| m.kind()).collect();
    assert_eq!(kinds, vec![MountKind::Directory, MountKind::Zip, MountKind::Tar]);
    assert_eq!(vfs.entries().len(), 4);

    // The patch shadows the base logo through the fuzzy id.
    assert_eq!(vfs.resolve("ui/logo_main.png"), "ui/main_logo.tga");
    assert_eq!(vfs.load("ui/logo_main.png").as_deref(), Some(&b"patched logo"[..]));
    // Untouched base content still loads.
    assert_eq!(vfs.read_to_string("ui/font.ttf").as_deref(), Some("base font"));
    assert_eq!(vfs.read_to_string("ui/readme.txt").as_deref(), Some("loose readme"));

    let mut text = String::new();
    vfs.handle("ui/font.ttf").read_to_string(&mut text)?;
    assert_eq!(text, "base font");
    Ok(())
}

#[test]
fn index_records_names_ids_and_sizes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let pak = dir.path().join("sfx.pak");
    let mut writer = PakWriter::new();
    writer.add("sfx/Jump (Short).wav", vec![7u8; 42]);
    writer.write_to(&pak)?;

    let mut vfs = VfsContext::default();
    vfs.mount(&pak.to_string_lossy())?;
    let entry = &vfs.entries()[0];
    assert_eq!(entry.name, "sfx/Jump (Short).wav");
    assert_eq!(entry.id, file_id("sfx/short_jump.ogg"));
    assert_eq!(entry.size, 42);
    assert_eq!(vfs.size("sfx/short jump.mp3"), 42);
    Ok(())
}

#[test]
fn two_contexts_do_not_share_state() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let a = dir.path().join("a.zip");
    let b = dir.path().join("b.zip");
    write_zip(&a, &[("data.txt", &b"from a"[..])])?;
    write_zip(&b, &[("data.txt", &b"from b"[..])])?;

    let mut first = VfsContext::default();
    let mut second = VfsContext::default();
    first.mount(&a.to_string_lossy())?;
    second.mount(&b.to_string_lossy())?;

    assert_eq!(first.load("data.txt").as_deref(), Some(&b"from a"[..]));
    assert_eq!(second.load("data.txt").as_deref(), Some(&b"from b"[..]));
    assert_eq!(first.load("data.txt").as_deref(), Some(&b"from a"[..]));
    assert_eq!(first.mounts().count(), 1);
    Ok(())
}
