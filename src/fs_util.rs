use std::fs;
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use zip::ZipArchive;

use crate::error::AcquireError;
use crate::transport::{ArchiveKind, Extracted, ExtractionNote, PayloadBody, RawPayload};

pub fn extract(
    payload: &RawPayload,
    kind: ArchiveKind,
    expected_suffix: &str,
    target_dir: &Path,
) -> Result<Extracted, AcquireError> {
    fs::create_dir_all(target_dir).map_err(|err| AcquireError::Filesystem(err.to_string()))?;
    match kind {
        ArchiveKind::Gzip => gunzip(payload, expected_suffix, target_dir),
        ArchiveKind::Zip => match &payload.body {
            PayloadBody::File(path) => {
                let file = fs::File::open(path).map_err(|err| {
                    AcquireError::Filesystem(format!("open zip {}: {err}", path.display()))
                })?;
                unzip_member(file, payload, expected_suffix, target_dir)
            }
            PayloadBody::Memory(bytes) => {
                unzip_member(Cursor::new(bytes.as_slice()), payload, expected_suffix, target_dir)
            }
        },
    }
}

pub fn select_member(
    names: &[String],
    expected_suffix: &str,
) -> Result<(String, usize, bool), AcquireError> {
    let suffix = expected_suffix.to_ascii_lowercase();
    let mut candidates = names
        .iter()
        .filter(|name| name.to_ascii_lowercase().ends_with(&suffix))
        .cloned()
        .collect::<Vec<_>>();
    candidates.sort();
    let Some(first) = candidates.first().cloned() else {
        return Err(AcquireError::Extraction(format!(
            "no archive member ends with `{expected_suffix}`"
        )));
    };
    let ambiguous = candidates.len() > 1;
    if ambiguous {
        tracing::warn!(
            chosen = %first,
            candidates = candidates.len(),
            "several archive members match, taking the first"
        );
    }
    Ok((first, candidates.len(), ambiguous))
}

fn gunzip(
    payload: &RawPayload,
    expected_suffix: &str,
    target_dir: &Path,
) -> Result<Extracted, AcquireError> {
    let archive_name = payload.file_name();
    let member = archive_name
        .strip_suffix(".gz")
        .or_else(|| archive_name.strip_suffix(".GZ"))
        .unwrap_or(&archive_name)
        .to_string();
    let (member, candidates, ambiguous) = select_member(&[member], expected_suffix)?;

    let bytes = payload.bytes()?;
    let mut decoder = GzDecoder::new(bytes.as_ref());
    let target = target_dir.join(&member);
    write_member(&mut decoder, &target)?;

    Ok(Extracted {
        payload: RawPayload::from_file(payload.origin.clone(), &target)?,
        note: ExtractionNote {
            archive: archive_name,
            member,
            archive_path: payload.path().map(Path::to_path_buf),
            member_path: target,
            candidates,
            ambiguous,
        },
    })
}

fn unzip_member<R: Read + Seek>(
    reader: R,
    payload: &RawPayload,
    expected_suffix: &str,
    target_dir: &Path,
) -> Result<Extracted, AcquireError> {
    let mut archive =
        ZipArchive::new(reader).map_err(|err| AcquireError::Extraction(err.to_string()))?;

    let mut names = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|err| AcquireError::Extraction(err.to_string()))?;
        if !entry.is_dir() {
            names.push(entry.name().to_string());
        }
    }
    let (member, candidates, ambiguous) = select_member(&names, expected_suffix)?;

    let mut entry = archive
        .by_name(&member)
        .map_err(|err| AcquireError::Extraction(err.to_string()))?;
    let entry_path: PathBuf = match entry.enclosed_name() {
        Some(path) => target_dir.join(path),
        None => {
            return Err(AcquireError::Extraction(
                "zip entry path traversal detected".to_string(),
            ));
        }
    };
    write_member(&mut entry, &entry_path)?;

    Ok(Extracted {
        payload: RawPayload::from_file(payload.origin.clone(), &entry_path)?,
        note: ExtractionNote {
            archive: payload.file_name(),
            member,
            archive_path: payload.path().map(Path::to_path_buf),
            member_path: entry_path,
            candidates,
            ambiguous,
        },
    })
}

fn write_member<R: Read>(reader: &mut R, target: &Path) -> Result<(), AcquireError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|err| AcquireError::Filesystem(err.to_string()))?;
    }
    let mut outfile =
        fs::File::create(target).map_err(|err| AcquireError::Filesystem(err.to_string()))?;
    io::copy(reader, &mut outfile).map_err(|err| {
        // Leave no truncated member behind.
        let _ = fs::remove_file(target);
        AcquireError::Extraction(format!("{}: {err}", target.display()))
    })?;
    Ok(())
}
