use crate::error::Error;
use crate::model::{EntryOrigin, FileEntry, Side};
use crate::platform;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

/// Written by GitDependencies next to the Unreal Engine checkout root.
pub const MANIFEST_FILE_NAME: &str = ".uedependencies";

/// Bytes sniffed for a NUL when deciding whether a file is binary, the same
/// window git uses.
const BINARY_SNIFF_LENGTH: usize = 8000;

/// Relative paths of every `<File Name="...">` element in a manifest.
pub fn parse_manifest(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut names = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(element) | Event::Empty(element) if element.name().as_ref() == b"File" => {
                for attribute in element.attributes() {
                    let attribute = attribute?;
                    if attribute.key.as_ref() == b"Name" {
                        names.push(attribute.unescape_value()?.into_owned());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(names)
}

/// Entries for every dependency file listed in the source root's manifest.
/// Sizes come from disk, so the files must already be downloaded.
pub fn list_manifest_files(source_root: &Path) -> Result<Vec<FileEntry>, Error> {
    let manifest_path = source_root.join(MANIFEST_FILE_NAME);
    let xml = fs::read_to_string(&manifest_path).map_err(|e| {
        Error::listing(
            Side::Source,
            format!(
                "{} could not be read ({}), run Setup or GitDependencies first",
                manifest_path.display(),
                e
            ),
        )
    })?;

    let names = parse_manifest(&xml).map_err(|e| {
        Error::listing(
            Side::Source,
            format!("Invalid manifest {}: {}", manifest_path.display(), e),
        )
    })?;

    names
        .iter()
        .map(|name| {
            let path = platform::local_path(source_root, &platform::normalize_relative_path(name));
            let metadata = fs::metadata(&path).map_err(|e| {
                Error::listing(
                    Side::Source,
                    format!("Dependency file {} is missing: {}", path.display(), e),
                )
            })?;
            let is_binary = sniff_binary(&path).map_err(|e| {
                Error::listing(
                    Side::Source,
                    format!("Error reading dependency file {}: {}", path.display(), e),
                )
            })?;
            Ok(FileEntry::source(name, metadata.len(), is_binary)
                .with_origin(EntryOrigin::DependencyManifest))
        })
        .collect()
}

/// A file is binary when its first few kilobytes contain a NUL byte.
pub fn sniff_binary(path: &Path) -> std::io::Result<bool> {
    let mut buffer = Vec::with_capacity(BINARY_SNIFF_LENGTH);
    File::open(path)?
        .take(BINARY_SNIFF_LENGTH as u64)
        .read_to_end(&mut buffer)?;
    Ok(buffer.contains(&0))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<WorkingManifest xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <Files>
    <File Name="Engine/Binaries/ThirdParty/a.dll" Hash="0a1b" Timestamp="1" />
    <File Name="Engine/Content/Fonts/b &amp; c.ttf" Hash="2c3d" Timestamp="2" />
  </Files>
  <Blobs />
  <Packs />
</WorkingManifest>
"#;

    #[test]
    fn test_parse_manifest_names() {
        let names = parse_manifest(MANIFEST).unwrap();
        assert_eq!(
            names,
            [
                "Engine/Binaries/ThirdParty/a.dll",
                "Engine/Content/Fonts/b & c.ttf"
            ]
        );
    }

    #[test]
    fn test_list_manifest_files_reads_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(
            root.join(MANIFEST_FILE_NAME),
            r#"<WorkingManifest><Files><File Name="deps/lib.bin" /><File Name="deps/readme.txt" /></Files></WorkingManifest>"#,
        )
        .unwrap();
        fs::create_dir_all(root.join("deps")).unwrap();
        fs::write(root.join("deps/lib.bin"), [0u8, 1, 2, 3]).unwrap();
        fs::write(root.join("deps/readme.txt"), "hello").unwrap();

        let entries = list_manifest_files(root).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "deps/lib.bin");
        assert_eq!(entries[0].size, 4);
        assert!(entries[0].is_binary);
        assert_eq!(entries[0].origin, EntryOrigin::DependencyManifest);
        assert!(!entries[1].is_binary);
    }

    #[test]
    fn test_missing_manifest_is_listing_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = list_manifest_files(dir.path());
        assert!(matches!(
            result,
            Err(Error::Listing {
                side: Side::Source,
                ..
            })
        ));
    }

    #[test]
    fn test_missing_dependency_file_is_listing_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE_NAME),
            r#"<WorkingManifest><Files><File Name="gone.bin" /></Files></WorkingManifest>"#,
        )
        .unwrap();
        assert!(list_manifest_files(dir.path()).is_err());
    }
}
