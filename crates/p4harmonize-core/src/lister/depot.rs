use super::{DestinationLister, IgnoreRules};
use crate::error::Error;
use crate::model::{Digest, FileEntry, Side};
use crate::p4::{self, P4Connection, ZtagRecord};
use crate::platform;
use std::time::Instant;
use tracing::{debug, info, warn};

const FSTAT_FIELDS: &str = "depotFile,clientFile,headAction,headType,fileSize,digest";

/// Head actions for files that no longer exist at head.
const DELETED_HEAD_ACTIONS: [&str; 4] = ["delete", "move/delete", "purge", "archive"];

/// Lists every file at head in a stream through `p4 fstat`.
pub struct DepotLister {
    connection: P4Connection,
    stream: String,
    root: String,
    ignore: IgnoreRules,
}

impl DepotLister {
    pub fn new(connection: P4Connection, stream: &str, root: &str, ignore: IgnoreRules) -> Self {
        Self {
            connection,
            stream: stream.trim_end_matches('/').to_string(),
            root: root.to_string(),
            ignore,
        }
    }
}

impl DestinationLister for DepotLister {
    fn list(&self) -> Result<Vec<FileEntry>, Error> {
        let start = Instant::now();
        let depot_path = format!("{}/...", self.stream);
        let (records, output) = self.connection.run_ztag([
            "fstat",
            "-T",
            FSTAT_FIELDS,
            "-Ol",
            depot_path.as_str(),
        ])?;

        let stderr = output.stderr.trim();
        if !stderr.is_empty() && !p4::is_benign_warning(stderr) {
            if records.is_empty() {
                return Err(Error::listing(Side::Destination, stderr));
            }
            for line in output.stderr_lines() {
                warn!("{}", line);
            }
        }

        let mut entries = Vec::with_capacity(records.len());
        let mut deleted = 0usize;
        for record in &records {
            match entry_from_fstat(record, &self.root, &self.stream)? {
                Some(entry) => entries.push(entry),
                None => deleted += 1,
            }
        }

        let ignored = self.ignore.retain(&mut entries);
        info!(
            "Found {} tracked files in the destination: {}",
            entries.len(),
            self.stream
        );
        debug!(
            "Skipped {} files deleted at head and {} ignored files in {:.2}s",
            deleted,
            ignored,
            start.elapsed().as_secs_f64()
        );
        Ok(entries)
    }
}

/// Convert one fstat record. Files deleted at head yield `None`.
///
/// The relative path comes from `clientFile` under the workspace root, or from
/// `depotFile` under the stream when the file is not mapped by a client.
pub fn entry_from_fstat(
    record: &ZtagRecord,
    root: &str,
    stream: &str,
) -> Result<Option<FileEntry>, Error> {
    let field = |name: &str| {
        record.get(name).ok_or_else(|| {
            Error::listing(
                Side::Destination,
                format!("fstat record is missing '{}': {:?}", name, record),
            )
        })
    };

    let depot_file = field("depotFile")?;
    let head_action = field("headAction")?;
    if DELETED_HEAD_ACTIONS.contains(&head_action.as_str()) {
        return Ok(None);
    }

    let relative_path = record
        .get("clientFile")
        .and_then(|client_file| platform::relative_to_root(client_file, root))
        .or_else(|| platform::relative_to_root(depot_file, stream))
        .ok_or_else(|| {
            Error::listing(
                Side::Destination,
                format!(
                    "{} is outside both the workspace root and the stream, make sure the destination client exists",
                    depot_file
                ),
            )
        })?;

    let head_type = field("headType")?;
    let size = field("fileSize")?.parse::<u64>().map_err(|e| {
        Error::listing(
            Side::Destination,
            format!("Invalid fileSize for {}: {}", depot_file, e),
        )
    })?;
    let digest = record.get("digest").map(|d| Digest::new(d));

    Ok(Some(
        FileEntry::destination(&relative_path, size, is_binary_file_type(head_type), digest)
            .with_file_type(head_type),
    ))
}

/// Text and utf8 types are digested with normalized line endings;
/// everything else (binary, utf16, unicode, symlink, apple) as raw bytes.
pub fn is_binary_file_type(file_type: &str) -> bool {
    !(file_type.contains("text") || file_type.contains("utf8"))
}
