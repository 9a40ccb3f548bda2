use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::Result;

pub const POLICY_INFO_FILE_NAME: &str = "compactionPolicyInfo.json";

pub(crate) fn policy_info_path(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(POLICY_INFO_FILE_NAME)
}

/// Truncates the file and writes `value` as indented JSON with a trailing newline.
// TODO write to a sibling temp file and rename so a crash mid-write can't leave half a document
pub(crate) fn write_pretty_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let file = File::options()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub(crate) fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}
