use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::io::{IntoInnerError, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use config::WartsConfig;
use records::{ping, trace};
use tracing::{debug, warn};
use warts::{ObjectType, WartsError, WartsObject, WartsReader, WartsWriter};

/// Counts objects by type. Undecodable records are counted and skipped.
pub fn stat(path: &Path, cfg: &WartsConfig, out: &mut impl Write) -> Result<()> {
    let mut reader = WartsReader::open(path, cfg)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut counts: BTreeMap<ObjectType, u64> = BTreeMap::new();
    let mut failed = 0u64;
    let mut ping_replies = 0u64;
    let mut trace_replies = 0u64;

    loop {
        let obj = match reader.read() {
            Ok(Some(obj)) => obj,
            Ok(None) => break,
            Err(e @ WartsError::Decode { .. }) => {
                warn!(error = %e, "undecodable object");
                failed += 1;
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        match &obj {
            WartsObject::Ping(p) => ping_replies += u64::from(p.stats().replies),
            WartsObject::Trace(t) => trace_replies += t.replies().count() as u64,
            _ => {}
        }
        *counts.entry(obj.object_type()).or_default() += 1;
    }

    for (kind, n) in &counts {
        writeln!(out, "{:<16}{n}", kind.name())?;
    }
    writeln!(out, "{:<16}{}", "skipped", reader.skipped())?;
    writeln!(out, "{:<16}{failed}", "undecodable")?;
    if counts.contains_key(&ObjectType::Ping) {
        writeln!(out, "{:<16}{ping_replies}", "ping replies")?;
    }
    if counts.contains_key(&ObjectType::Trace) {
        writeln!(out, "{:<16}{trace_replies}", "hop replies")?;
    }
    Ok(())
}

/// Re-encodes every ping and traceroute against the file's own list and
/// cycle ids and compares the result with the bytes on disk.
///
/// # Errors
///
/// Fails if any record could not be decoded or came out different.
pub fn check(path: &Path, cfg: &WartsConfig, out: &mut impl Write) -> Result<()> {
    let mut reader = WartsReader::open(path, cfg)
        .with_context(|| format!("failed to open {}", path.display()))?
        .with_filter([ObjectType::Ping, ObjectType::Trace]);

    let mut checked = 0u64;
    let mut differ = 0u64;
    let mut failed = 0u64;

    loop {
        let raw = match reader.read_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e @ WartsError::Decode { .. }) => {
                writeln!(out, "{e}")?;
                failed += 1;
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
        };
        checked += 1;

        let tables = reader.tables();
        let encoded = match &raw.object {
            WartsObject::Ping(p) => ping::encode(p, tables.ref_ids(p.list.as_ref(), p.cycle.as_ref())),
            WartsObject::Trace(t) => trace::encode(t, tables.ref_ids(t.list.as_ref(), t.cycle.as_ref())),
            _ => continue,
        };
        let kind = raw.object.object_type().name();
        match encoded {
            Ok(bytes) if bytes == raw.body => {}
            Ok(bytes) => {
                differ += 1;
                let at = first_difference(&bytes, &raw.body);
                writeln!(
                    out,
                    "{kind} at offset {}: re-encoded {} bytes, file has {}, first difference at byte {at}",
                    raw.offset,
                    bytes.len(),
                    raw.body.len()
                )?;
            }
            Err(e) => {
                differ += 1;
                writeln!(out, "{kind} at offset {}: cannot re-encode: {e}", raw.offset)?;
            }
        }
    }

    writeln!(
        out,
        "checked {checked} records: {differ} differ, {failed} undecodable"
    )?;
    if differ + failed > 0 {
        bail!("{} records failed the check", differ + failed);
    }
    Ok(())
}

fn first_difference(a: &[u8], b: &[u8]) -> usize {
    a.iter()
        .zip(b)
        .position(|(x, y)| x != y)
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// Copies the objects of the given types from `input` into `output`.
///
/// Lists and cycles the copied records refer to are written as needed. The
/// output is built in `<output>.tmp`, synced, then renamed into place.
pub fn filter(
    input: &Path,
    output: &Path,
    types: &[ObjectType],
    cfg: &WartsConfig,
    out: &mut impl Write,
) -> Result<()> {
    let tmp = tmp_path(output);
    let copied = match copy_objects(input, &tmp, types, cfg) {
        Ok(n) => n,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
    };
    fs::rename(&tmp, output)
        .with_context(|| format!("failed to rename {} to {}", tmp.display(), output.display()))?;
    writeln!(out, "copied {copied} objects to {}", output.display())?;
    Ok(())
}

fn copy_objects(input: &Path, tmp: &Path, types: &[ObjectType], cfg: &WartsConfig) -> Result<u64> {
    let mut reader = WartsReader::open(input, cfg)
        .with_context(|| format!("failed to open {}", input.display()))?
        .with_filter(types.iter().copied());
    let mut writer =
        WartsWriter::create(tmp).with_context(|| format!("failed to create {}", tmp.display()))?;

    let mut copied = 0u64;
    while let Some(obj) = reader
        .read()
        .with_context(|| format!("failed to read {}", input.display()))?
    {
        match &obj {
            WartsObject::Addr(_) => {
                debug!("legacy address objects are not copied");
                continue;
            }
            WartsObject::CycleStop(c) if writer.cycle_id(c).is_none() => {
                debug!(cycle = c.id, "cycle stop without its cycle");
                continue;
            }
            _ => {}
        }
        writer.write_object(&obj)?;
        copied += 1;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .into_inner()
        .map_err(IntoInnerError::into_error)?;
    file.sync_all()?;
    Ok(copied)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
