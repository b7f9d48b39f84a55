//! Skill archive ingestion.
//!
//! Uploaded bundles are standard zip archives. Entry names are decoded as
//! UTF-8 first and retried wholesale as GBK when any name fails, which
//! handles archives produced on differently-configured Windows systems.
//! Extraction validates every resolved entry path against the target
//! directory, so a crafted entry name cannot escape it.

use std::collections::BTreeSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use skillyard_core::namespace::validate_component;
use skillyard_core::{scope, Error, Result};
use zip::ZipArchive;

fn open(bytes: &[u8]) -> Result<ZipArchive<Cursor<&[u8]>>> {
    ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::Archive(e.to_string()))
}

/// Decode raw entry names: strict UTF-8, then a wholesale GBK retry.
fn decode_entry_names(raw: &[Vec<u8>]) -> Result<Vec<String>> {
    let utf8: std::result::Result<Vec<String>, _> = raw
        .iter()
        .map(|bytes| std::str::from_utf8(bytes).map(str::to_string))
        .collect();
    if let Ok(names) = utf8 {
        return Ok(names);
    }

    let mut names = Vec::with_capacity(raw.len());
    for bytes in raw {
        let (decoded, _, had_errors) = encoding_rs::GBK.decode(bytes);
        if had_errors {
            return Err(Error::Archive(
                "entry name is neither valid UTF-8 nor GBK".to_string(),
            ));
        }
        names.push(decoded.into_owned());
    }
    Ok(names)
}

fn entry_names(archive: &mut ZipArchive<Cursor<&[u8]>>) -> Result<Vec<String>> {
    let mut raw = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| Error::Archive(e.to_string()))?;
        raw.push(entry.name_raw().to_vec());
    }
    decode_entry_names(&raw)
}

/// First pass: the top-level directory names present in the archive.
/// Each top-level directory is one skill.
///
/// Skill names are vetted as single path components here, before the
/// caller deletes same-named directories in the target layer — a crafted
/// `../` prefix must never select a deletion target.
pub fn scan_skill_names(bytes: &[u8]) -> Result<BTreeSet<String>> {
    let mut archive = open(bytes)?;
    let names = entry_names(&mut archive)?;

    let mut skills = BTreeSet::new();
    for name in names {
        let normalized = name.replace('\\', "/");
        if let Some(slash) = normalized.find('/') {
            if slash > 0 {
                let skill = &normalized[..slash];
                validate_component(skill)?;
                skills.insert(skill.to_string());
            }
        }
    }
    Ok(skills)
}

/// Second pass: extract every entry below `target_dir`, validating each
/// resolved path first.
pub fn extract_into(bytes: &[u8], target_dir: &Path) -> Result<()> {
    let mut archive = open(bytes)?;
    let names = entry_names(&mut archive)?;

    for (index, name) in names.iter().enumerate() {
        let normalized = name.replace('\\', "/");
        let entry_path = scope::validate_scope(&target_dir.join(&normalized), &[target_dir])?;

        if normalized.ends_with('/') {
            fs::create_dir_all(&entry_path).map_err(|e| Error::io(&entry_path, e))?;
            continue;
        }
        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::Archive(e.to_string()))?;
        let mut out = fs::File::create(&entry_path).map_err(|e| Error::io(&entry_path, e))?;
        std::io::copy(&mut entry, &mut out).map_err(|e| Error::io(&entry_path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_scan_finds_top_level_skills() {
        let bytes = build_zip(&[
            ("skill_a/SKILL.md", "name: A"),
            ("skill_a/scripts/main.py", "print('a')"),
            ("skill_b/SKILL.md", "name: B"),
            ("loose_root_file.txt", "ignored"),
        ]);
        let skills = scan_skill_names(&bytes).unwrap();
        assert_eq!(
            skills.into_iter().collect::<Vec<_>>(),
            vec!["skill_a".to_string(), "skill_b".to_string()]
        );
    }

    #[test]
    fn test_extract_writes_tree() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[
            ("skill_a/SKILL.md", "name: A"),
            ("skill_a/scripts/main.py", "print('a')"),
        ]);
        extract_into(&bytes, dir.path()).unwrap();
        let main = dir.path().join("skill_a/scripts/main.py");
        assert_eq!(fs::read_to_string(main).unwrap(), "print('a')");
    }

    #[test]
    fn test_zip_slip_entry_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = build_zip(&[("../evil.txt", "pwned")]);
        let err = extract_into(&bytes, &dir.path().join("target"));
        assert!(matches!(err, Err(Error::Security(_))));
        assert!(!dir.path().join("evil.txt").exists());
    }

    #[test]
    fn test_scan_rejects_traversal_skill_name() {
        // `../x/evil.txt` must not nominate `..` as a deletable skill.
        let bytes = build_zip(&[("../x/evil.txt", "pwned")]);
        assert!(matches!(scan_skill_names(&bytes), Err(Error::Security(_))));
    }

    #[test]
    fn test_garbage_bytes_are_an_archive_error() {
        let err = scan_skill_names(b"definitely not a zip");
        assert!(matches!(err, Err(Error::Archive(_))));
    }

    #[test]
    fn test_decode_falls_back_to_gbk() {
        // "中文.txt" in GBK bytes; not valid UTF-8.
        let gbk_name = vec![0xD6, 0xD0, 0xCE, 0xC4, b'.', b't', b'x', b't'];
        let names =
            decode_entry_names(&[b"skill_a/run.py".to_vec(), gbk_name]).unwrap();
        assert_eq!(names[0], "skill_a/run.py");
        assert_eq!(names[1], "中文.txt");
    }

    #[test]
    fn test_undecodable_names_fail_both_encodings() {
        // 0x81 0x20 is invalid in GBK as well as UTF-8.
        let err = decode_entry_names(&[vec![0x81, 0x20]]);
        assert!(matches!(err, Err(Error::Archive(_))));
    }
}
